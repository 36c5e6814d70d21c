use crate::surface::RenderSurface;
use crate::types::{FALLBACK_PX_PER_MM, PageSetup};

/// Pixel geometry of one physical page, derived from a millimetre
/// [`PageSetup`] and the live display density. Ephemeral; recomputed at
/// the start of every export.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetrics {
    pub page_width_px: f64,
    pub page_height_px: f64,
    pub margin_px: f64,
    pub content_width_px: f64,
    pub content_height_px: f64,
}

impl PageMetrics {
    /// Resolve pixel geometry using the surface's density probe, falling
    /// back to the 96-DPI approximation when the probe yields nothing
    /// usable (zero, negative, or non-finite).
    pub fn resolve<S: RenderSurface>(setup: &PageSetup, surface: &S) -> PageMetrics {
        let probed = surface.probe_density_px_per_mm();
        let px_per_mm = if probed.is_finite() && probed > 0.0 {
            probed
        } else {
            FALLBACK_PX_PER_MM
        };
        PageMetrics::from_density(setup, px_per_mm)
    }

    pub fn from_density(setup: &PageSetup, px_per_mm: f64) -> PageMetrics {
        let setup = setup.sanitized();
        let page_width_px = setup.page_width_mm * px_per_mm;
        let page_height_px = setup.page_height_mm * px_per_mm;
        let margin_px = setup.margin_mm * px_per_mm;
        // Oversized margins would invert the content box; floor it to one
        // pixel instead of failing (same policy as the paginator).
        let content_width_px = (page_width_px - 2.0 * margin_px).max(1.0);
        let content_height_px = (page_height_px - 2.0 * margin_px).max(1.0);
        PageMetrics {
            page_width_px,
            page_height_px,
            margin_px,
            content_width_px,
            content_height_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mock::MockSurface;

    #[test]
    fn derives_content_box_from_page_and_margin() {
        let m = PageMetrics::from_density(&PageSetup::A4, 4.0);
        assert_eq!(m.page_width_px, 840.0);
        assert_eq!(m.page_height_px, 1188.0);
        assert_eq!(m.margin_px, 80.0);
        assert_eq!(m.content_width_px, 680.0);
        assert_eq!(m.content_height_px, 1028.0);
    }

    #[test]
    fn probe_result_wins_over_fallback() {
        let surface = MockSurface::new(0.0);
        let m = PageMetrics::resolve(&PageSetup::A4, &surface);
        assert_eq!(m.page_width_px, 105.0);
    }

    #[test]
    fn unusable_probe_falls_back_to_96dpi() {
        let mut surface = MockSurface::new(0.0);
        surface.density_px_per_mm = 0.0;
        let m = PageMetrics::resolve(&PageSetup::A4, &surface);
        assert!((m.page_width_px - 210.0 * crate::types::FALLBACK_PX_PER_MM).abs() < 1e-9);

        surface.density_px_per_mm = f64::NAN;
        let n = PageMetrics::resolve(&PageSetup::A4, &surface);
        assert_eq!(m, n);
    }

    #[test]
    fn inverted_content_box_is_floored_to_one_pixel() {
        let setup = PageSetup {
            page_width_mm: 50.0,
            page_height_mm: 50.0,
            margin_mm: 40.0,
        };
        let m = PageMetrics::from_density(&setup, 1.0);
        assert_eq!(m.content_width_px, 1.0);
        assert_eq!(m.content_height_px, 1.0);
    }
}
