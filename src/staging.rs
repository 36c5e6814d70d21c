//! Export staging area: scoped ownership of the offscreen clone tree.

use crate::error::ExportError;
use crate::surface::RenderSurface;

/// Tracks the offscreen staging root and every node created under it
/// during one export. The pipeline must call [`StagingArea::teardown`] on
/// every exit path (success, cancellation, or failure) so repeated
/// exports cannot accumulate invisible staged state.
pub struct StagingArea<S: RenderSurface> {
    root: S::Node,
    tracked: Vec<S::Node>,
    torn_down: bool,
}

impl<S: RenderSurface> StagingArea<S> {
    pub fn acquire(surface: &mut S) -> Result<Self, ExportError> {
        let root = surface.create_staging_root()?;
        Ok(Self {
            root,
            tracked: Vec::new(),
            torn_down: false,
        })
    }

    pub fn root(&self) -> &S::Node {
        &self.root
    }

    /// Register a node for removal at teardown. Nodes removed earlier by
    /// the pipeline (e.g. the discarded measurement clone or a per-page
    /// shell) must use [`StagingArea::release`] instead of being tracked
    /// twice.
    pub fn track(&mut self, node: S::Node) {
        self.tracked.push(node);
    }

    /// Remove one tracked node ahead of teardown.
    pub fn release(&mut self, surface: &mut S, index: usize) {
        let node = self.tracked.remove(index);
        surface.remove(&node);
    }

    /// Remove every tracked node, then the root, in creation-reverse
    /// order. Idempotence is not needed; the pipeline calls this exactly
    /// once per path.
    pub fn teardown(mut self, surface: &mut S) {
        for node in self.tracked.drain(..).rev() {
            surface.remove(&node);
        }
        surface.remove(&self.root);
        self.torn_down = true;
    }
}

impl<S: RenderSurface> Drop for StagingArea<S> {
    fn drop(&mut self) {
        if !self.torn_down {
            log::warn!("staging area dropped without teardown; staged nodes leaked");
        }
    }
}
