//! Reference [`RenderSurface`] backed by a pre-rendered content bitmap.
//!
//! Hosts that already rendered the preview (through whatever HTML engine
//! they pair with this crate) register the content bitmap and a shell
//! background here; the surface then answers measurement and painting for
//! the export pipeline. Cloning at a width rescales the bitmap
//! proportionally, so content is assumed to have been laid out at the
//! page content width already.

use crate::error::ExportError;
use crate::metrics::PageMetrics;
use crate::surface::{ImageLoad, RenderSurface};
use std::collections::HashMap;
use tiny_skia::{
    Color, FillRule, FilterQuality, Mask, Pixmap, PixmapPaint, Rect, Transform,
};

enum NodeData {
    /// Host-registered, pre-rendered content at its native width.
    Content(Pixmap),
    /// Host-registered page shell styling template.
    ShellTemplate { background: Color },
    StagingRoot,
    Clone {
        pixmap: Pixmap,
        clamp_px: Option<f64>,
    },
    Shell {
        background: Color,
        metrics: PageMetrics,
        slice: Option<(usize, f64)>,
    },
}

pub struct BitmapSurface {
    density_px_per_mm: f64,
    nodes: HashMap<usize, NodeData>,
    next_id: usize,
}

impl BitmapSurface {
    pub fn new(density_px_per_mm: f64) -> Self {
        Self {
            density_px_per_mm,
            nodes: HashMap::new(),
            next_id: 0,
        }
    }

    fn insert(&mut self, data: NodeData) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, data);
        id
    }

    /// Register pre-rendered preview content. Returns the node handle to
    /// pass as `preview_content`.
    pub fn register_content(&mut self, bitmap: &image::RgbaImage) -> Result<usize, ExportError> {
        let pixmap = pixmap_from_rgba(bitmap)?;
        Ok(self.insert(NodeData::Content(pixmap)))
    }

    /// Register the page shell styling (background color) to mirror into
    /// generated page shells. Returns the node handle to pass as
    /// `page_shell`.
    pub fn register_shell(&mut self, background: [u8; 4]) -> usize {
        let [r, g, b, a] = background;
        self.insert(NodeData::ShellTemplate {
            background: Color::from_rgba8(r, g, b, a),
        })
    }
}

impl RenderSurface for BitmapSurface {
    type Node = usize;

    fn probe_density_px_per_mm(&self) -> f64 {
        self.density_px_per_mm
    }

    fn create_staging_root(&mut self) -> Result<usize, ExportError> {
        Ok(self.insert(NodeData::StagingRoot))
    }

    fn clone_content(
        &mut self,
        source: &usize,
        _parent: &usize,
        width_px: f64,
    ) -> Result<usize, ExportError> {
        let src = match self.nodes.get(source) {
            Some(NodeData::Content(pixmap)) => pixmap,
            Some(NodeData::Clone { pixmap, .. }) => pixmap,
            _ => return Err(ExportError::Render("clone source is not content".into())),
        };
        if !(width_px.is_finite() && width_px >= 1.0) {
            return Err(ExportError::Render(format!(
                "invalid clone width {width_px}"
            )));
        }
        let ratio = width_px / src.width() as f64;
        let width = (width_px.round() as u32).max(1);
        let height = ((src.height() as f64 * ratio).round() as u32).max(1);
        let mut scaled = Pixmap::new(width, height).ok_or_else(|| {
            ExportError::Render(format!("invalid clone size {width}x{height}"))
        })?;
        let mut paint = PixmapPaint::default();
        paint.quality = FilterQuality::Bilinear;
        scaled.draw_pixmap(
            0,
            0,
            src.as_ref(),
            &paint,
            Transform::from_scale(ratio as f32, ratio as f32),
            None,
        );
        Ok(self.insert(NodeData::Clone {
            pixmap: scaled,
            clamp_px: None,
        }))
    }

    // Images are baked into the registered bitmap; resolution and loading
    // already happened on the host side.
    async fn resolve_image_sources(&mut self, _node: &usize) -> Result<(), ExportError> {
        Ok(())
    }

    fn image_loads(&mut self, _node: &usize) -> Vec<ImageLoad> {
        Vec::new()
    }

    fn measure_height(&mut self, node: &usize) -> f64 {
        match self.nodes.get(node) {
            Some(NodeData::Clone { pixmap, clamp_px }) => {
                let height = pixmap.height() as f64;
                clamp_px.map_or(height, |clamp| height.min(clamp))
            }
            _ => 0.0,
        }
    }

    fn clamp_height(&mut self, node: &usize, max_height_px: f64) {
        if let Some(NodeData::Clone { clamp_px, .. }) = self.nodes.get_mut(node) {
            *clamp_px = Some(max_height_px.max(0.0));
        }
    }

    fn build_page_shell(
        &mut self,
        template: &usize,
        _parent: &usize,
        metrics: &PageMetrics,
    ) -> Result<usize, ExportError> {
        let background = match self.nodes.get(template) {
            Some(NodeData::ShellTemplate { background }) => *background,
            Some(_) => Color::WHITE,
            None => return Err(ExportError::MissingPageShell),
        };
        Ok(self.insert(NodeData::Shell {
            background,
            metrics: metrics.clone(),
            slice: None,
        }))
    }

    fn mount_page_slice(
        &mut self,
        shell: &usize,
        content: &usize,
        offset_px: f64,
    ) -> Result<(), ExportError> {
        let content = *content;
        match self.nodes.get_mut(shell) {
            Some(NodeData::Shell { slice, .. }) => {
                *slice = Some((content, offset_px));
                Ok(())
            }
            _ => Err(ExportError::Render("mount target is not a page shell".into())),
        }
    }

    fn rasterize(&mut self, node: &usize, scale: f64) -> Result<image::RgbaImage, ExportError> {
        match self.nodes.get(node) {
            Some(NodeData::Shell {
                background,
                metrics,
                slice,
            }) => {
                let width = ((metrics.page_width_px * scale).round() as u32).max(1);
                let height = ((metrics.page_height_px * scale).round() as u32).max(1);
                let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
                    ExportError::Render(format!("invalid page size {width}x{height}"))
                })?;
                pixmap.fill(*background);

                if let Some((content_id, offset_px)) = slice {
                    let content = match self.nodes.get(content_id) {
                        Some(NodeData::Clone { pixmap, .. }) => pixmap,
                        _ => return Err(ExportError::Render("mounted content is gone".into())),
                    };
                    let clip = content_box_mask(metrics, scale, width, height)?;
                    let transform = Transform::from_row(
                        scale as f32,
                        0.0,
                        0.0,
                        scale as f32,
                        (metrics.margin_px * scale) as f32,
                        ((metrics.margin_px - offset_px) * scale) as f32,
                    );
                    pixmap.draw_pixmap(
                        0,
                        0,
                        content.as_ref(),
                        &PixmapPaint::default(),
                        transform,
                        Some(&clip),
                    );
                }
                Ok(rgba_from_pixmap(&pixmap))
            }
            Some(NodeData::Clone { pixmap, clamp_px }) => {
                let visible = clamp_px.map_or(pixmap.height() as f64, |clamp| {
                    (pixmap.height() as f64).min(clamp)
                });
                let width = ((pixmap.width() as f64 * scale).round() as u32).max(1);
                let height = ((visible * scale).round() as u32).max(1);
                let mut out = Pixmap::new(width, height).ok_or_else(|| {
                    ExportError::Render(format!("invalid raster size {width}x{height}"))
                })?;
                out.fill(Color::WHITE);
                out.draw_pixmap(
                    0,
                    0,
                    pixmap.as_ref(),
                    &PixmapPaint::default(),
                    Transform::from_scale(scale as f32, scale as f32),
                    None,
                );
                Ok(rgba_from_pixmap(&out))
            }
            _ => Err(ExportError::Render("node is not paintable".into())),
        }
    }

    fn remove(&mut self, node: &usize) {
        self.nodes.remove(node);
    }
}

fn content_box_mask(
    metrics: &PageMetrics,
    scale: f64,
    width: u32,
    height: u32,
) -> Result<Mask, ExportError> {
    let rect = Rect::from_xywh(
        (metrics.margin_px * scale) as f32,
        (metrics.margin_px * scale) as f32,
        (metrics.content_width_px * scale) as f32,
        (metrics.content_height_px * scale) as f32,
    )
    .ok_or_else(|| ExportError::Render("degenerate content box".into()))?;
    let mut mask = Mask::new(width, height)
        .ok_or_else(|| ExportError::Render("degenerate clip mask".into()))?;
    let path = tiny_skia::PathBuilder::from_rect(rect);
    mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
    Ok(mask)
}

fn pixmap_from_rgba(bitmap: &image::RgbaImage) -> Result<Pixmap, ExportError> {
    let mut pixmap = Pixmap::new(bitmap.width().max(1), bitmap.height().max(1))
        .ok_or_else(|| ExportError::Render("content bitmap too large".into()))?;
    for (pixel, src) in pixmap.pixels_mut().iter_mut().zip(bitmap.pixels()) {
        let [r, g, b, a] = src.0;
        *pixel = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

fn rgba_from_pixmap(pixmap: &Pixmap) -> image::RgbaImage {
    let mut out = image::RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    out
}
