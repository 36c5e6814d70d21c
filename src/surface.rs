//! Capability interface over the host layout/paint engine.
//!
//! The export pipeline never touches a live document tree directly: it
//! stages clones, measures them, and paints page slices exclusively
//! through [`RenderSurface`]. Any engine that can lay out content at a
//! fixed width and paint a node to a bitmap can back this trait: a
//! headless browser, a native layout engine, or the in-crate
//! [`crate::bitmap::BitmapSurface`].

use crate::error::ExportError;
use crate::metrics::PageMetrics;
use crate::paginate::Pagination;
use futures::future::BoxFuture;

/// Terminal state of one embedded image load. Both variants are settled:
/// a failed load never aborts an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Loaded,
    Failed,
}

/// One future per embedded image, resolving on its load-or-error event.
pub type ImageLoad = BoxFuture<'static, ImageStatus>;

pub trait RenderSurface {
    /// Handle to a staged node owned by the surface.
    type Node: Clone;

    /// Measured display density in pixels per millimetre. Return zero (or
    /// any non-finite/non-positive value) when the probe cannot measure;
    /// callers fall back to [`crate::types::FALLBACK_PX_PER_MM`].
    fn probe_density_px_per_mm(&self) -> f64;

    /// Create the offscreen, non-interactive staging container. It must
    /// not affect the visible document or intercept input.
    fn create_staging_root(&mut self) -> Result<Self::Node, ExportError>;

    /// Deep-clone `source` under `parent` with reset spacing and a fixed
    /// pixel width. The fixed width is what makes the subsequent height
    /// measurement match the eventual page content width.
    fn clone_content(
        &mut self,
        source: &Self::Node,
        parent: &Self::Node,
        width_px: f64,
    ) -> Result<Self::Node, ExportError>;

    /// Rewrite app-internal image references under `node` to real
    /// displayable sources. Opaque collaborator step; must complete
    /// before measurement or painting.
    fn resolve_image_sources(
        &mut self,
        node: &Self::Node,
    ) -> impl Future<Output = Result<(), ExportError>>;

    /// One load future per image element under `node`. An empty vector
    /// means the readiness gate resolves immediately.
    fn image_loads(&mut self, node: &Self::Node) -> Vec<ImageLoad>;

    /// Laid-out height of `node` in pixels (the scroll-height analog).
    fn measure_height(&mut self, node: &Self::Node) -> f64;

    /// Cap the visible height of `node` and clip overflow.
    fn clamp_height(&mut self, node: &Self::Node, max_height_px: f64);

    /// Build one fixed-size page shell under `parent`: page dimensions
    /// and margin from `metrics`, overflow clipped, background mirrored
    /// from `template`.
    fn build_page_shell(
        &mut self,
        template: &Self::Node,
        parent: &Self::Node,
        metrics: &PageMetrics,
    ) -> Result<Self::Node, ExportError>;

    /// Clone `content` into `shell`, shifted up by `offset_px` so only
    /// that page's slice is visible inside the clipped shell.
    fn mount_page_slice(
        &mut self,
        shell: &Self::Node,
        content: &Self::Node,
        offset_px: f64,
    ) -> Result<(), ExportError>;

    /// Paint `node` to a bitmap at the given pixel-density multiplier.
    fn rasterize(&mut self, node: &Self::Node, scale: f64) -> Result<image::RgbaImage, ExportError>;

    /// Detach and destroy a staged node.
    fn remove(&mut self, node: &Self::Node);
}

/// Download trigger. Receives the finished file exactly once per export.
pub trait FileSink {
    fn save(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<(), ExportError>;
}

/// Multi-page confirmation collaborator for the PDF path. Only consulted
/// when the computed page count exceeds one.
pub trait PagePrompt {
    fn confirm_multi_page(&mut self, pagination: &Pagination) -> bool;
}

/// Fixed progress checkpoints (not a general event bus). Callers drive UI
/// text from these; pipeline correctness never depends on them being
/// observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Measurement clone staged, readiness gate about to run.
    Measure,
    /// One page shell rasterized. 1-indexed.
    Render { page: u32, page_count: u32 },
    /// One page deposited into the archive. 1-indexed.
    Zip { page: u32, page_count: u32 },
    /// Output file being finalized.
    Generate,
    /// Download triggered.
    Done,
}

pub(crate) fn report(progress: &mut Option<&mut dyn FnMut(Progress)>, checkpoint: Progress) {
    if let Some(observer) = progress.as_mut() {
        observer(checkpoint);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use futures::FutureExt;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Copy)]
    pub enum ImageScript {
        Loads,
        Fails,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockKind {
        Source,
        StagingRoot,
        ContentClone,
        PageShell,
    }

    pub struct MockNode {
        pub kind: MockKind,
        pub alive: bool,
        pub width_px: f64,
        pub height_clamp_px: Option<f64>,
        pub metrics: Option<PageMetrics>,
    }

    /// Scripted surface: fixed content height, scripted image loads, and
    /// node-lifetime counters for staging-teardown assertions.
    pub struct MockSurface {
        pub density_px_per_mm: f64,
        pub content_height_px: f64,
        pub image_scripts: Vec<ImageScript>,
        /// 1-indexed rasterize call that should fail, if any.
        pub fail_rasterize_at: Option<usize>,
        /// 1-indexed mount call that should fail, if any.
        pub fail_mount_at: Option<usize>,
        pub rasterize_calls: usize,
        pub resolve_calls: usize,
        pub mounted_offsets: Vec<f64>,
        nodes: HashMap<usize, MockNode>,
        next_id: usize,
    }

    impl MockSurface {
        pub fn new(content_height_px: f64) -> Self {
            Self {
                // Low density keeps mock page bitmaps small: an A4 sheet
                // comes out 105x149 px.
                density_px_per_mm: 0.5,
                content_height_px,
                image_scripts: Vec::new(),
                fail_rasterize_at: None,
                fail_mount_at: None,
                rasterize_calls: 0,
                resolve_calls: 0,
                mounted_offsets: Vec::new(),
                nodes: HashMap::new(),
                next_id: 0,
            }
        }

        pub fn add_source(&mut self) -> usize {
            self.insert(MockKind::Source)
        }

        fn insert(&mut self, kind: MockKind) -> usize {
            let id = self.next_id;
            self.next_id += 1;
            self.nodes.insert(
                id,
                MockNode {
                    kind,
                    alive: true,
                    width_px: 0.0,
                    height_clamp_px: None,
                    metrics: None,
                },
            );
            id
        }

        /// Height caps applied via `clamp_height`, in no particular order.
        pub fn clamped_heights(&self) -> Vec<f64> {
            self.nodes
                .values()
                .filter_map(|n| n.height_clamp_px)
                .collect()
        }

        /// Staged nodes (everything but sources) still alive.
        pub fn staged_alive(&self) -> usize {
            self.nodes
                .values()
                .filter(|n| n.alive && n.kind != MockKind::Source)
                .count()
        }
    }

    impl RenderSurface for MockSurface {
        type Node = usize;

        fn probe_density_px_per_mm(&self) -> f64 {
            self.density_px_per_mm
        }

        fn create_staging_root(&mut self) -> Result<usize, ExportError> {
            Ok(self.insert(MockKind::StagingRoot))
        }

        fn clone_content(
            &mut self,
            _source: &usize,
            _parent: &usize,
            width_px: f64,
        ) -> Result<usize, ExportError> {
            let id = self.insert(MockKind::ContentClone);
            self.nodes.get_mut(&id).unwrap().width_px = width_px;
            Ok(id)
        }

        async fn resolve_image_sources(&mut self, _node: &usize) -> Result<(), ExportError> {
            self.resolve_calls += 1;
            Ok(())
        }

        fn image_loads(&mut self, _node: &usize) -> Vec<ImageLoad> {
            self.image_scripts
                .iter()
                .map(|script| match script {
                    ImageScript::Loads => futures::future::ready(ImageStatus::Loaded).boxed(),
                    ImageScript::Fails => futures::future::ready(ImageStatus::Failed).boxed(),
                })
                .collect()
        }

        fn measure_height(&mut self, node: &usize) -> f64 {
            let node = &self.nodes[node];
            match node.height_clamp_px {
                Some(clamp) => self.content_height_px.min(clamp),
                None => self.content_height_px,
            }
        }

        fn clamp_height(&mut self, node: &usize, max_height_px: f64) {
            self.nodes.get_mut(node).unwrap().height_clamp_px = Some(max_height_px);
        }

        fn build_page_shell(
            &mut self,
            _template: &usize,
            _parent: &usize,
            metrics: &PageMetrics,
        ) -> Result<usize, ExportError> {
            let id = self.insert(MockKind::PageShell);
            self.nodes.get_mut(&id).unwrap().metrics = Some(metrics.clone());
            Ok(id)
        }

        fn mount_page_slice(
            &mut self,
            shell: &usize,
            _content: &usize,
            offset_px: f64,
        ) -> Result<(), ExportError> {
            assert!(self.nodes[shell].alive, "mount on removed shell");
            self.mounted_offsets.push(offset_px);
            if self.fail_mount_at == Some(self.mounted_offsets.len()) {
                return Err(ExportError::Render("scripted mount failure".into()));
            }
            Ok(())
        }

        fn rasterize(&mut self, node: &usize, scale: f64) -> Result<image::RgbaImage, ExportError> {
            self.rasterize_calls += 1;
            if self.fail_rasterize_at == Some(self.rasterize_calls) {
                return Err(ExportError::Render("scripted rasterize failure".into()));
            }
            let (width, height) = {
                let node = &self.nodes[node];
                match &node.metrics {
                    Some(metrics) => (metrics.page_width_px, metrics.page_height_px),
                    None => {
                        let clamp = node.height_clamp_px.unwrap_or(f64::INFINITY);
                        (node.width_px, self.content_height_px.min(clamp))
                    }
                }
            };
            let width = ((width * scale).round() as u32).max(1);
            let height = ((height * scale).round() as u32).max(1);
            Ok(image::RgbaImage::from_pixel(
                width,
                height,
                image::Rgba([255, 255, 255, 255]),
            ))
        }

        fn remove(&mut self, node: &usize) {
            if let Some(node) = self.nodes.get_mut(node) {
                node.alive = false;
            }
        }
    }

    /// Collects saved files in memory.
    #[derive(Default)]
    pub struct MockSink {
        pub saved: Vec<(String, Vec<u8>)>,
    }

    impl FileSink for MockSink {
        fn save(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<(), ExportError> {
            self.saved.push((file_name.to_string(), bytes));
            Ok(())
        }
    }

    /// Scripted confirmation answer, counting how often it was asked.
    pub struct MockPrompt {
        pub answer: bool,
        pub asked: usize,
    }

    impl MockPrompt {
        pub fn new(answer: bool) -> Self {
            Self { answer, asked: 0 }
        }
    }

    impl PagePrompt for MockPrompt {
        fn confirm_multi_page(&mut self, _pagination: &Pagination) -> bool {
            self.asked += 1;
            self.answer
        }
    }
}
