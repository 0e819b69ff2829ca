//! Field bounding-box overlays.
//!
//! Bounding boxes arrive in the recognizer's page coordinate space, which
//! has a bottom-left origin and page-specific dimensions. Overlays live in
//! the rendered raster's pixel space, top-left origin. The mapping scales
//! each axis and flips the vertical axis.

use serde::Serialize;
use tracing::debug;

use crate::analysis::AnalysisEnvelope;
use crate::config::FieldPalette;

const STROKE_WIDTH: u32 = 2;
const STROKE_WIDTH_HIGHLIGHTED: u32 = 4;

/// Coordinate bounds `[x1, y1, x2, y2]` of a coordinate space
#[derive(Debug, Clone, Copy)]
pub struct Extent {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Extent {
    /// Extent `[0, 0, width, height]`.
    pub fn of_size(width: f64, height: f64) -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: width,
            y2: height,
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// One field's rendered bounding polygon
#[derive(Debug, Clone, Serialize)]
pub struct FieldOverlay {
    pub field_name: String,
    /// Polygon vertices in raster pixel space.
    pub polygon: Vec<[i32; 2]>,
    pub color: String,
    pub highlighted: bool,
}

impl FieldOverlay {
    /// Stroke weight for rendering; highlighting thickens the stroke
    /// without changing color or geometry.
    pub fn stroke_width(&self) -> u32 {
        if self.highlighted {
            STROKE_WIDTH_HIGHLIGHTED
        } else {
            STROKE_WIDTH
        }
    }
}

/// Map a flat sequence of alternating x/y source coordinates into raster
/// pixel space.
///
/// Each pair scales by the extent ratio and flips vertically, because the
/// recognizer's origin is bottom-left while the raster's is top-left.
/// Rounding is `f64::round` (half away from zero).
pub fn map_bounding_box(
    points: &[f64],
    image_extent: &Extent,
    source_extent: &Extent,
) -> Vec<[i32; 2]> {
    let image_width = image_extent.width();
    let image_height = image_extent.height();
    let source_width = source_extent.width();
    let source_height = source_extent.height();

    if source_width <= 0.0 || source_height <= 0.0 {
        debug!("Degenerate source extent, skipping bounding box");
        return Vec::new();
    }

    points
        .chunks_exact(2)
        .map(|pair| {
            let x = (pair[0] / source_width * image_width).round() as i32;
            let y = ((1.0 - pair[1] / source_height) * image_height).round() as i32;
            [x, y]
        })
        .collect()
}

/// Build the overlays for one page of an analysis result.
///
/// Only fields recorded on `page` qualify; fields without a page number or
/// bounding box are skipped.
pub fn build_overlays(
    envelope: &AnalysisEnvelope,
    page: u32,
    image_extent: &Extent,
    source_extent: &Extent,
    palette: &FieldPalette,
    highlighted_field: &str,
) -> Vec<FieldOverlay> {
    let mut overlays = Vec::new();

    for (field_name, prediction) in envelope.fields().into_iter().flatten() {
        if prediction.page != Some(page) {
            continue;
        }
        let Some(points) = &prediction.bounding_box else {
            continue;
        };
        let polygon = map_bounding_box(points, image_extent, source_extent);
        if polygon.is_empty() {
            continue;
        }

        overlays.push(FieldOverlay {
            color: palette.color_for(field_name).to_string(),
            highlighted: field_name.eq_ignore_ascii_case(highlighted_field),
            field_name: field_name.clone(),
            polygon,
        });
    }

    overlays
}

/// Recompute every overlay's highlighted flag against `highlighted_field`
/// (case-insensitive). An empty name clears all highlights.
pub fn apply_highlight(overlays: &mut [FieldOverlay], highlighted_field: &str) {
    for overlay in overlays {
        overlay.highlighted =
            !highlighted_field.is_empty() && overlay.field_name.eq_ignore_ascii_case(highlighted_field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisEnvelope;

    fn square_extent(size: f64) -> Extent {
        Extent::of_size(size, size)
    }

    #[test]
    fn test_identity_mapping_flips_vertically() {
        let mapped = map_bounding_box(
            &[10.0, 10.0],
            &square_extent(100.0),
            &square_extent(100.0),
        );
        assert_eq!(mapped, vec![[10, 90]]);
    }

    #[test]
    fn test_scaling_between_extents() {
        let mapped = map_bounding_box(
            &[100.0, 50.0],
            &square_extent(100.0),
            &Extent::of_size(200.0, 100.0),
        );
        assert_eq!(mapped, vec![[50, 50]]);
    }

    #[test]
    fn test_mapped_points_stay_within_image_extent() {
        let image = Extent::of_size(640.0, 480.0);
        let source = Extent::of_size(8.5, 11.0);

        for xi in 0..=17 {
            for yi in 0..=22 {
                let x = xi as f64 * 0.5;
                let y = yi as f64 * 0.5;
                let mapped = map_bounding_box(&[x, y], &image, &source);
                let [px, py] = mapped[0];
                assert!((0..=640).contains(&px), "x out of range: {px}");
                assert!((0..=480).contains(&py), "y out of range: {py}");
            }
        }
    }

    #[test]
    fn test_degenerate_source_extent_yields_no_polygon() {
        let mapped = map_bounding_box(&[1.0, 1.0], &square_extent(100.0), &square_extent(0.0));
        assert!(mapped.is_empty());
    }

    #[test]
    fn test_odd_trailing_coordinate_is_dropped() {
        let mapped = map_bounding_box(
            &[10.0, 10.0, 20.0],
            &square_extent(100.0),
            &square_extent(100.0),
        );
        assert_eq!(mapped.len(), 1);
    }

    fn sample_envelope() -> AnalysisEnvelope {
        serde_json::from_str(
            r#"{
                "analyzeResult": {
                    "readResults": [{ "page": 1, "width": 100.0, "height": 100.0 }],
                    "documentResults": [{
                        "fields": {
                            "InvoiceDate": {
                                "text": "4/15/2021",
                                "page": 1,
                                "boundingBox": [10.0, 90.0, 30.0, 90.0, 30.0, 80.0, 10.0, 80.0],
                                "confidence": 0.99
                            },
                            "TotalTax": {
                                "text": "$12.00",
                                "page": 2,
                                "boundingBox": [1.0, 2.0, 3.0, 2.0, 3.0, 1.0, 1.0, 1.0]
                            },
                            "CustomerName": { "text": "Contoso" }
                        }
                    }]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_overlays_selects_current_page_only() {
        let envelope = sample_envelope();
        let palette = FieldPalette::default();
        let extent = square_extent(100.0);

        let overlays = build_overlays(&envelope, 1, &extent, &extent, &palette, "");
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].field_name, "InvoiceDate");
        assert_eq!(overlays[0].color, "#CC543A");
        assert_eq!(overlays[0].polygon[0], [10, 10]);
        assert!(!overlays[0].highlighted);
        assert_eq!(overlays[0].stroke_width(), 2);
    }

    #[test]
    fn test_page_without_fields_yields_no_overlays() {
        let envelope = sample_envelope();
        let palette = FieldPalette::default();
        let extent = square_extent(100.0);

        // Page 3 has no fields at all; fields without a page number never match.
        let overlays = build_overlays(&envelope, 3, &extent, &extent, &palette, "");
        assert!(overlays.is_empty());
    }

    #[test]
    fn test_highlight_matches_case_insensitively() {
        let envelope = sample_envelope();
        let palette = FieldPalette::default();
        let extent = square_extent(100.0);

        let mut overlays = build_overlays(&envelope, 1, &extent, &extent, &palette, "");
        apply_highlight(&mut overlays, "invoicedate");
        assert!(overlays[0].highlighted);
        assert_eq!(overlays[0].stroke_width(), 4);

        apply_highlight(&mut overlays, "");
        assert!(!overlays[0].highlighted);
    }
}
