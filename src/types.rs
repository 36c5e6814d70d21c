/// Display density used when the surface cannot measure one: the CSS
/// reference pixel at 96 DPI, expressed per millimetre.
pub const FALLBACK_PX_PER_MM: f64 = 96.0 / 25.4;

/// PDF user-space units per millimetre (72 points per inch).
pub const PT_PER_MM: f64 = 72.0 / 25.4;

pub const DEFAULT_SCALE: f64 = 2.0;
pub const DEFAULT_MAX_PAGES: u32 = 30;

pub const DEFAULT_PDF_FILE_NAME: &str = "document.pdf";
pub const DEFAULT_ZIP_FILE_NAME: &str = "markdown-pages.zip";

/// Physical page configuration in millimetres. All pixel geometry is
/// derived from this via [`crate::PageMetrics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
}

impl PageSetup {
    /// A4 portrait with 20 mm margins.
    pub const A4: PageSetup = PageSetup {
        page_width_mm: 210.0,
        page_height_mm: 297.0,
        margin_mm: 20.0,
    };

    /// Coerce non-finite or negative dimensions to zero. Degenerate but
    /// finite setups are handled downstream by the metrics floor.
    pub fn sanitized(self) -> PageSetup {
        fn clean(value: f64) -> f64 {
            if value.is_finite() && value > 0.0 { value } else { 0.0 }
        }
        PageSetup {
            page_width_mm: clean(self.page_width_mm),
            page_height_mm: clean(self.page_height_mm),
            margin_mm: clean(self.margin_mm),
        }
    }

    pub fn page_width_pt(&self) -> f64 {
        self.page_width_mm * PT_PER_MM
    }

    pub fn page_height_pt(&self) -> f64 {
        self.page_height_mm * PT_PER_MM
    }

    pub fn margin_pt(&self) -> f64 {
        self.margin_mm * PT_PER_MM
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        PageSetup::A4
    }
}
