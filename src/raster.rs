//! Rasterizer: measures staged content once, paginates it, and paints one
//! clipped page shell per offset.

use crate::error::ExportError;
use crate::metrics::PageMetrics;
use crate::paginate::{Pagination, paginate};
use crate::readiness::wait_for_images;
use crate::staging::StagingArea;
use crate::surface::{Progress, RenderSurface, report};
use crate::types::{DEFAULT_SCALE, PageSetup};
use image::codecs::png::PngEncoder;
use image::ImageEncoder;

/// One encoded page, index-aligned with `Pagination::offsets`.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-indexed page position.
    pub index: u32,
    pub width_px: u32,
    pub height_px: u32,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RasterizeResult {
    /// Strictly ordered by increasing offset, one entry per computed page.
    pub pages: Vec<PageImage>,
    pub pagination: Pagination,
    pub page_width_px: f64,
    pub page_height_px: f64,
}

/// Rasterize `preview_content` into fixed-size pages.
///
/// The measurement clone is always discarded before the first page shell
/// exists, and only one page shell is alive at a time. A failure on any
/// single page fails the whole call; partial page sequences are never
/// returned. Staging is torn down on every path.
pub async fn rasterize_pages<S: RenderSurface>(
    surface: &mut S,
    preview_content: &S::Node,
    page_shell: &S::Node,
    setup: &PageSetup,
    max_pages: u32,
    scale: f64,
    mut progress: Option<&mut dyn FnMut(Progress)>,
) -> Result<RasterizeResult, ExportError> {
    let mut staging = StagingArea::acquire(surface)?;
    let result = rasterize_staged(
        surface,
        &mut staging,
        preview_content,
        page_shell,
        setup,
        max_pages,
        scale,
        &mut progress,
    )
    .await;
    staging.teardown(surface);
    result
}

#[allow(clippy::too_many_arguments)]
async fn rasterize_staged<S: RenderSurface>(
    surface: &mut S,
    staging: &mut StagingArea<S>,
    preview_content: &S::Node,
    page_shell: &S::Node,
    setup: &PageSetup,
    max_pages: u32,
    scale: f64,
    progress: &mut Option<&mut dyn FnMut(Progress)>,
) -> Result<RasterizeResult, ExportError> {
    let metrics = PageMetrics::resolve(setup, surface);
    let scale = sanitize_scale(scale);

    report(progress, Progress::Measure);
    let pagination = measure_content(surface, staging, preview_content, &metrics, max_pages).await?;
    log::debug!(
        "measured {:.0}px of content: {} page(s){}",
        pagination.total_content_height_px,
        pagination.page_count,
        if pagination.clamped { " (clamped)" } else { "" }
    );

    // One resolved template clone shared by every page, so image
    // resolution runs once instead of once per page.
    let template = stage_resolved_clone(surface, staging, preview_content, metrics.content_width_px)
        .await?;

    let mut pages = Vec::with_capacity(pagination.page_count as usize);
    for (index, offset) in pagination.offsets.iter().enumerate() {
        let shell = surface.build_page_shell(page_shell, &staging.root().clone(), &metrics)?;
        let painted = surface
            .mount_page_slice(&shell, &template, *offset)
            .and_then(|_| surface.rasterize(&shell, scale));
        // The shell goes away immediately so only one page's clone tree is
        // ever materialized, even when mounting or painting fails.
        surface.remove(&shell);
        let bitmap = painted?;
        pages.push(PageImage {
            index: index as u32,
            width_px: bitmap.width(),
            height_px: bitmap.height(),
            png: encode_png(&bitmap)?,
        });
        report(
            progress,
            Progress::Render {
                page: index as u32 + 1,
                page_count: pagination.page_count,
            },
        );
    }

    Ok(RasterizeResult {
        pages,
        pagination,
        page_width_px: metrics.page_width_px,
        page_height_px: metrics.page_height_px,
    })
}

/// Stage a measurement clone, wait for readiness, measure, and compute the
/// pagination. The clone is discarded before this returns.
pub(crate) async fn measure_content<S: RenderSurface>(
    surface: &mut S,
    staging: &mut StagingArea<S>,
    preview_content: &S::Node,
    metrics: &PageMetrics,
    max_pages: u32,
) -> Result<Pagination, ExportError> {
    let clone =
        stage_resolved_clone(surface, staging, preview_content, metrics.content_width_px).await?;
    let total = surface.measure_height(&clone);
    staging.release(surface, 0);
    Ok(paginate(total, metrics.content_height_px, max_pages))
}

/// Clone content into staging at a fixed width, resolve its image sources,
/// and hold at the readiness gate until every image settles.
pub(crate) async fn stage_resolved_clone<S: RenderSurface>(
    surface: &mut S,
    staging: &mut StagingArea<S>,
    source: &S::Node,
    width_px: f64,
) -> Result<S::Node, ExportError> {
    let node = surface.clone_content(source, &staging.root().clone(), width_px)?;
    staging.track(node.clone());
    surface.resolve_image_sources(&node).await?;
    wait_for_images(surface, &node).await;
    Ok(node)
}

pub(crate) fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        DEFAULT_SCALE
    }
}

pub(crate) fn encode_png(bitmap: &image::RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut png = Vec::new();
    let encoder = PngEncoder::new(&mut png);
    encoder
        .write_image(
            bitmap.as_raw(),
            bitmap.width(),
            bitmap.height(),
            image::ColorType::Rgba8.into(),
        )
        .map_err(|e| ExportError::Render(format!("png encode failed: {e}")))?;
    Ok(png)
}
