//! pagebound, a deterministic page-bounded export engine.
//!
//! Measures rendered preview content at the page content width, slices it
//! into fixed-height pages, rasterizes each page through a pluggable
//! [`RenderSurface`], and assembles the pages into a ZIP of per-page PNGs
//! or a paginated PDF. Markdown parsing, sanitization, theming, and image
//! caching are the host's concern; this crate starts from an
//! already-rendered content node and geometric page configuration.

mod archive;
mod bitmap;
mod error;
mod metrics;
mod paginate;
mod pdf;
mod raster;
mod readiness;
mod staging;
mod surface;
mod types;

pub use archive::export_png_zip;
pub use bitmap::BitmapSurface;
pub use error::ExportError;
pub use metrics::PageMetrics;
pub use paginate::{Pagination, paginate};
pub use pdf::{PdfExportResult, export_pdf};
pub use raster::{PageImage, RasterizeResult, rasterize_pages};
pub use readiness::{ImageSettle, wait_for_images};
pub use staging::StagingArea;
pub use surface::{FileSink, ImageLoad, ImageStatus, PagePrompt, Progress, RenderSurface};
pub use types::{
    DEFAULT_MAX_PAGES, DEFAULT_PDF_FILE_NAME, DEFAULT_SCALE, DEFAULT_ZIP_FILE_NAME,
    FALLBACK_PX_PER_MM, PT_PER_MM, PageSetup,
};

use std::cell::Cell;

/// Export facade carrying the ambient configuration and the single-flight
/// guard. Exports are not safe to overlap; a second call while one is in
/// flight returns [`ExportError::ExportInProgress`] instead of relying on
/// the caller disabling its export controls.
pub struct Exporter {
    setup: PageSetup,
    max_pages: u32,
    scale: f64,
    busy: Cell<bool>,
}

#[derive(Debug, Clone)]
pub struct ExporterBuilder {
    setup: PageSetup,
    max_pages: u32,
    scale: f64,
}

impl Default for ExporterBuilder {
    fn default() -> Self {
        Self {
            setup: PageSetup::A4,
            max_pages: DEFAULT_MAX_PAGES,
            scale: DEFAULT_SCALE,
        }
    }
}

impl ExporterBuilder {
    pub fn page_size_mm(mut self, width_mm: f64, height_mm: f64) -> Self {
        self.setup.page_width_mm = width_mm;
        self.setup.page_height_mm = height_mm;
        self
    }

    pub fn margin_mm(mut self, margin_mm: f64) -> Self {
        self.setup.margin_mm = margin_mm;
        self
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Pixel-density multiplier applied when painting pages.
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn build(self) -> Exporter {
        Exporter {
            setup: self.setup.sanitized(),
            max_pages: self.max_pages,
            scale: self.scale,
            busy: Cell::new(false),
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        ExporterBuilder::default().build()
    }
}

impl Exporter {
    pub fn builder() -> ExporterBuilder {
        ExporterBuilder::default()
    }

    pub fn page_setup(&self) -> &PageSetup {
        &self.setup
    }

    /// Rasterize the preview into ordered page images without producing a
    /// file (e.g. for a "render and show first page" consumer).
    pub async fn rasterize_pages<S: RenderSurface>(
        &self,
        surface: &mut S,
        preview_content: &S::Node,
        page_shell: &S::Node,
        progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<RasterizeResult, ExportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        raster::rasterize_pages(
            surface,
            preview_content,
            page_shell,
            &self.setup,
            self.max_pages,
            self.scale,
            progress,
        )
        .await
    }

    /// Export a ZIP of per-page PNGs through `sink`.
    pub async fn export_png_zip<S: RenderSurface, K: FileSink>(
        &self,
        surface: &mut S,
        sink: &mut K,
        preview_content: &S::Node,
        page_shell: &S::Node,
        file_name: Option<&str>,
        progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<RasterizeResult, ExportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        archive::export_png_zip(
            surface,
            sink,
            preview_content,
            page_shell,
            &self.setup,
            self.max_pages,
            self.scale,
            file_name,
            progress,
        )
        .await
    }

    /// Export a paginated PDF through `sink`, confirming multi-page output
    /// with `prompt` first.
    pub async fn export_pdf<S: RenderSurface, P: PagePrompt, K: FileSink>(
        &self,
        surface: &mut S,
        prompt: &mut P,
        sink: &mut K,
        preview_content: &S::Node,
        file_name: Option<&str>,
        progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<PdfExportResult, ExportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        pdf::export_pdf(
            surface,
            prompt,
            sink,
            preview_content,
            &self.setup,
            self.max_pages,
            self.scale,
            file_name,
            progress,
        )
        .await
    }
}

/// Single-slot export-in-progress flag, cleared on drop so a dropped
/// (cancelled) export future does not wedge the exporter.
struct BusyGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Result<Self, ExportError> {
        if flag.replace(true) {
            return Err(ExportError::ExportInProgress);
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mock::{MockPrompt, MockSink, MockSurface};
    use futures::executor::block_on;

    #[test]
    fn busy_guard_rejects_overlap_and_recovers_on_drop() {
        let busy = Cell::new(false);
        let guard = BusyGuard::acquire(&busy).unwrap();
        assert!(matches!(
            BusyGuard::acquire(&busy),
            Err(ExportError::ExportInProgress)
        ));
        drop(guard);
        assert!(BusyGuard::acquire(&busy).is_ok());
    }

    #[test]
    fn sequential_exports_share_one_exporter() {
        let _ = env_logger::builder().is_test(true).try_init();
        let exporter = Exporter::builder().scale(1.0).build();
        let mut surface = MockSurface::new(300.0);
        let preview = surface.add_source();
        let shell = surface.add_source();
        let mut sink = MockSink::default();

        block_on(exporter.export_png_zip(&mut surface, &mut sink, &preview, &shell, None, None))
            .unwrap();
        let mut prompt = MockPrompt::new(true);
        block_on(exporter.export_pdf(&mut surface, &mut prompt, &mut sink, &preview, None, None))
            .unwrap();
        assert_eq!(sink.saved.len(), 2);
        assert_eq!(surface.staged_alive(), 0);
    }

    #[test]
    fn builder_applies_page_geometry() {
        let exporter = Exporter::builder()
            .page_size_mm(148.0, 210.0)
            .margin_mm(10.0)
            .max_pages(5)
            .build();
        assert_eq!(exporter.page_setup().page_width_mm, 148.0);
        assert_eq!(exporter.page_setup().margin_mm, 10.0);
    }

    #[test]
    fn rasterize_entry_point_returns_pages_without_a_sink() {
        let exporter = Exporter::builder().scale(1.0).max_pages(3).build();
        let mut surface = MockSurface::new(500.0);
        let preview = surface.add_source();
        let shell = surface.add_source();
        let result =
            block_on(exporter.rasterize_pages(&mut surface, &preview, &shell, None)).unwrap();
        assert_eq!(result.pages.len(), result.pagination.page_count as usize);
        assert!(result.pagination.clamped);
    }
}
