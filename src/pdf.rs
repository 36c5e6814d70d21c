//! PDF assembler: measures like the rasterizer, confirms multi-page
//! output with the caller, rasterizes the (possibly height-capped) content
//! block once, and slices it into physical pages.

use crate::error::ExportError;
use crate::metrics::PageMetrics;
use crate::paginate::Pagination;
use crate::raster::{measure_content, sanitize_scale, stage_resolved_clone};
use crate::staging::StagingArea;
use crate::surface::{FileSink, PagePrompt, Progress, RenderSurface, report};
use crate::types::{DEFAULT_PDF_FILE_NAME, PageSetup};
use image::ImageEncoder;
use lopdf::{Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};

#[derive(Debug, Clone)]
pub struct PdfExportResult {
    pub pagination: Pagination,
    /// True only when the user declined the multi-page confirmation; no
    /// file was produced in that case.
    pub cancelled: bool,
}

/// Export the preview as a paginated PDF delivered through `sink`.
///
/// Single-page content never consults `prompt`. A declined confirmation is
/// a clean cancellation: staging is torn down and no file is produced.
#[allow(clippy::too_many_arguments)]
pub async fn export_pdf<S: RenderSurface, P: PagePrompt, K: FileSink>(
    surface: &mut S,
    prompt: &mut P,
    sink: &mut K,
    preview_content: &S::Node,
    setup: &PageSetup,
    max_pages: u32,
    scale: f64,
    file_name: Option<&str>,
    mut progress: Option<&mut dyn FnMut(Progress)>,
) -> Result<PdfExportResult, ExportError> {
    let mut staging = StagingArea::acquire(surface)?;
    let result = export_pdf_staged(
        surface,
        &mut staging,
        prompt,
        sink,
        preview_content,
        setup,
        max_pages,
        scale,
        file_name,
        &mut progress,
    )
    .await;
    staging.teardown(surface);
    result
}

#[allow(clippy::too_many_arguments)]
async fn export_pdf_staged<S: RenderSurface, P: PagePrompt, K: FileSink>(
    surface: &mut S,
    staging: &mut StagingArea<S>,
    prompt: &mut P,
    sink: &mut K,
    preview_content: &S::Node,
    setup: &PageSetup,
    max_pages: u32,
    scale: f64,
    file_name: Option<&str>,
    progress: &mut Option<&mut dyn FnMut(Progress)>,
) -> Result<PdfExportResult, ExportError> {
    let metrics = PageMetrics::resolve(setup, surface);
    let scale = sanitize_scale(scale);

    report(progress, Progress::Measure);
    let pagination = measure_content(surface, staging, preview_content, &metrics, max_pages).await?;

    if pagination.page_count > 1 && !prompt.confirm_multi_page(&pagination) {
        log::debug!("multi-page pdf export declined at {} pages", pagination.page_count);
        return Ok(PdfExportResult {
            pagination,
            cancelled: true,
        });
    }

    let block =
        stage_resolved_clone(surface, staging, preview_content, metrics.content_width_px).await?;
    if pagination.clamped {
        // Enforce the page ceiling even though the slicing below paginates
        // by physical height on its own.
        let cap_px =
            pagination.page_count as f64 * metrics.content_height_px + 2.0 * metrics.margin_px;
        surface.clamp_height(&block, cap_px);
        log::debug!("content clamped to {:.0}px for pdf export", cap_px);
    }

    report(
        progress,
        Progress::Render {
            page: 1,
            page_count: pagination.page_count,
        },
    );
    let bitmap = surface.rasterize(&block, scale)?;

    report(progress, Progress::Generate);
    let bytes = assemble_pdf(&bitmap, setup, &metrics, scale)?;
    log::debug!("assembled pdf of {} bytes", bytes.len());

    sink.save(file_name.unwrap_or(DEFAULT_PDF_FILE_NAME), bytes)?;
    report(progress, Progress::Done);

    Ok(PdfExportResult {
        pagination,
        cancelled: false,
    })
}

/// Slice the full content bitmap into physical pages and embed one image
/// per page. Slicing is driven by the bitmap height alone; the clamp
/// applied upstream is what keeps it within the page ceiling.
fn assemble_pdf(
    bitmap: &image::RgbaImage,
    setup: &PageSetup,
    metrics: &PageMetrics,
    scale: f64,
) -> Result<Vec<u8>, ExportError> {
    let width_px = bitmap.width();
    let height_px = bitmap.height();
    let strip_rows = ((metrics.content_height_px * scale).round() as u32).max(1);
    let page_count = height_px.div_ceil(strip_rows).max(1);

    let page_width_pt = setup.page_width_pt();
    let page_height_pt = setup.page_height_pt();
    let margin_pt = setup.margin_pt();
    let content_width_pt = (page_width_pt - 2.0 * margin_pt).max(1.0);
    // Map bitmap pixels to points by the width ratio so the slice keeps
    // its aspect on the page.
    let pt_per_px = content_width_pt / width_px as f64;

    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<LoObject> = Vec::with_capacity(page_count as usize);

    for index in 0..page_count {
        let y0 = index * strip_rows;
        let rows = strip_rows.min(height_px - y0);
        let strip = image::imageops::crop_imm(bitmap, 0, y0, width_px, rows).to_image();
        let jpeg = encode_jpeg_over_white(&strip)?;

        let image_id = doc.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => rows as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let slice_height_pt = rows as f64 * pt_per_px;
        let x = margin_pt;
        let y = page_height_pt - margin_pt - slice_height_pt;
        let page_content = format!(
            "q {:.4} 0 0 {:.4} {:.4} {:.4} cm /PbPage Do Q\n",
            content_width_pt, slice_height_pt, x, y
        )
        .into_bytes();
        let page_content_id = doc.add_object(LoStream::new(dictionary! {}, page_content));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => page_content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "PbPage" => image_id,
                },
            },
            "MediaBox" => vec![
                LoObject::Integer(0),
                LoObject::Integer(0),
                LoObject::Real(page_width_pt as f32),
                LoObject::Real(page_height_pt as f32),
            ],
        });
        kids.push(LoObject::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Flatten alpha onto white and encode as JPEG for DCTDecode embedding.
fn encode_jpeg_over_white(strip: &image::RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut rgb = image::RgbImage::new(strip.width(), strip.height());
    for (dst, src) in rgb.pixels_mut().zip(strip.pixels()) {
        let [r, g, b, a] = src.0;
        let a = a as u16;
        dst.0 = [
            ((r as u16 * a + 255 * (255 - a)) / 255) as u8,
            ((g as u16 * a + 255 * (255 - a)) / 255) as u8,
            ((b as u16 * a + 255 * (255 - a)) / 255) as u8,
        ];
    }
    let mut jpeg = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90);
    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ColorType::Rgb8.into(),
        )
        .map_err(|e| ExportError::Render(format!("jpeg encode failed: {e}")))?;
    Ok(jpeg)
}
