//! Pagination: slices a measured content height into fixed-height pages.

/// Result of one pagination pass. Computed fresh per export, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub page_count: u32,
    /// Usable per-page height actually used for the computation, floored to 1.
    pub page_content_height_px: f64,
    /// Measured full content height, before any clamping.
    pub total_content_height_px: f64,
    /// `offsets[i] = i * page_content_height_px`, one entry per page.
    pub offsets: Vec<f64>,
    /// True when the unclamped page requirement exceeded `max_pages`.
    pub clamped: bool,
}

/// Compute page count, per-page offsets, and the clamp flag.
///
/// Pure and deterministic; all inputs are coerced to safe ranges rather
/// than rejected. Zero-height content still yields one page.
pub fn paginate(total_content_height_px: f64, page_content_height_px: f64, max_pages: u32) -> Pagination {
    let total = if total_content_height_px.is_finite() && total_content_height_px > 0.0 {
        total_content_height_px
    } else {
        0.0
    };
    let safe_page_height = if page_content_height_px.is_finite() {
        page_content_height_px.max(1.0)
    } else {
        1.0
    };

    let raw_count = ((total / safe_page_height).ceil() as u64).max(1);
    let safe_max = (max_pages as u64).max(1);
    let page_count = raw_count.min(safe_max) as u32;

    let offsets = (0..page_count)
        .map(|i| i as f64 * safe_page_height)
        .collect();

    Pagination {
        page_count,
        page_content_height_px: safe_page_height,
        total_content_height_px: total,
        offsets,
        clamped: raw_count != page_count as u64,
    }
}
