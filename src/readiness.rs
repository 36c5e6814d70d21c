//! Render readiness gate: the single asynchronous join point before any
//! measurement or painting happens.

use crate::surface::{ImageStatus, RenderSurface};
use futures::future::join_all;

/// Settle counts for one gate pass. Informational only; a failed image is
/// settled, not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSettle {
    pub loaded: usize,
    pub failed: usize,
}

/// Wait until every image under `node` has either loaded or failed.
///
/// Resolves immediately when the subtree contains no images. Never
/// errors: a broken image must not abort an export. There is no timeout,
/// so an image whose load never settles stalls the export indefinitely;
/// this mirrors the event-driven readiness of the host environment and is
/// a documented limitation.
pub async fn wait_for_images<S: RenderSurface>(surface: &mut S, node: &S::Node) -> ImageSettle {
    let loads = surface.image_loads(node);
    if loads.is_empty() {
        return ImageSettle::default();
    }

    let mut settle = ImageSettle::default();
    for status in join_all(loads).await {
        match status {
            ImageStatus::Loaded => settle.loaded += 1,
            ImageStatus::Failed => settle.failed += 1,
        }
    }
    if settle.failed > 0 {
        log::warn!(
            "{} of {} images failed to load; continuing export",
            settle.failed,
            settle.loaded + settle.failed
        );
    }
    settle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mock::{ImageScript, MockSurface};
    use futures::executor::block_on;

    #[test]
    fn resolves_immediately_without_images() {
        let mut surface = MockSurface::new(100.0);
        let root = surface.add_source();
        let settle = block_on(wait_for_images(&mut surface, &root));
        assert_eq!(settle, ImageSettle::default());
    }

    #[test]
    fn counts_loaded_and_failed_as_settled() {
        let mut surface = MockSurface::new(100.0);
        surface.image_scripts = vec![ImageScript::Loads, ImageScript::Fails, ImageScript::Loads];
        let root = surface.add_source();
        let settle = block_on(wait_for_images(&mut surface, &root));
        assert_eq!(settle.loaded, 2);
        assert_eq!(settle.failed, 1);
    }
}
