//! ZIP assembler: bundles rasterized pages into `page-NN.png` entries and
//! hands the finished archive to the download sink.

use crate::error::ExportError;
use crate::raster::{RasterizeResult, rasterize_pages};
use crate::surface::{FileSink, Progress, RenderSurface, report};
use crate::types::{DEFAULT_ZIP_FILE_NAME, PageSetup};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Rasterize the preview and deliver a ZIP of per-page PNGs.
///
/// Entry names are `page-01.png`, `page-02.png`, … (two-digit zero-padded,
/// 1-indexed) in strictly ascending page order. The archive lands at the
/// sink under `file_name` (default `markdown-pages.zip`).
#[allow(clippy::too_many_arguments)]
pub async fn export_png_zip<S: RenderSurface, K: FileSink>(
    surface: &mut S,
    sink: &mut K,
    preview_content: &S::Node,
    page_shell: &S::Node,
    setup: &PageSetup,
    max_pages: u32,
    scale: f64,
    file_name: Option<&str>,
    mut progress: Option<&mut dyn FnMut(Progress)>,
) -> Result<RasterizeResult, ExportError> {
    let result = rasterize_pages(
        surface,
        preview_content,
        page_shell,
        setup,
        max_pages,
        scale,
        progress.as_mut().map(|p| &mut **p as &mut dyn FnMut(Progress)),
    )
    .await?;

    let mut cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut cursor);
    // PNG payloads are already compressed; deflating them again wastes
    // time for no size gain.
    let entry_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for page in &result.pages {
        zip.start_file(page_entry_name(page.index), entry_options)?;
        zip.write_all(&page.png)?;
        report(
            &mut progress,
            Progress::Zip {
                page: page.index + 1,
                page_count: result.pagination.page_count,
            },
        );
    }

    report(&mut progress, Progress::Generate);
    zip.finish()?;
    let bytes = cursor.into_inner();
    log::debug!(
        "archived {} page(s) into {} bytes",
        result.pages.len(),
        bytes.len()
    );

    sink.save(file_name.unwrap_or(DEFAULT_ZIP_FILE_NAME), bytes)?;
    report(&mut progress, Progress::Done);
    Ok(result)
}

/// `index` is 0-based; entries are 1-indexed on disk.
fn page_entry_name(index: u32) -> String {
    format!("page-{:02}.png", index + 1)
}
