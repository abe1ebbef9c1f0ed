use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, Axis, Ix2};
use tracing::debug;

use crate::boxes::BoundingBox;
use crate::error::DetectError;

/// Columns per adapter output row: `[cx, cy, w, h, objectness, class_score]`.
pub const RAW_COLUMNS: usize = 6;

/// One row of adapter output, in letterboxed-canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub objectness: f32,
    pub class_score: f32,
}

impl RawDetection {
    /// Reads the first six columns of a row. Callers guarantee the width.
    #[must_use]
    pub fn from_row(row: ArrayView1<'_, f32>) -> Self {
        Self {
            cx: row[0],
            cy: row[1],
            w: row[2],
            h: row[3],
            objectness: row[4],
            class_score: row[5],
        }
    }

    /// Detection confidence: objectness times class score, never a single channel.
    #[must_use]
    pub fn score(&self) -> f32 {
        self.objectness * self.class_score
    }

    #[must_use]
    pub fn decode(&self) -> BoundingBox {
        BoundingBox::from_center(self.cx, self.cy, self.w, self.h, self.score())
    }
}

/// Normalizes adapter output to `[N, 6]`.
///
/// Accepts `[1, N, 6]` (batch of one) or `[N, 6]`. `N = 0` is a legal empty set.
///
/// # Errors
///
/// `MalformedOutput` for any other shape or more than `max_rows` rows.
pub fn raw_rows(output: ArrayD<f32>, max_rows: usize) -> Result<Array2<f32>, DetectError> {
    let shape = output.shape().to_vec();

    let rows = match shape.as_slice() {
        [1, _, RAW_COLUMNS] => output.index_axis_move(Axis(0), 0),
        [_, RAW_COLUMNS] => output,
        _ => {
            return Err(DetectError::malformed(
                format!("[1, N, {RAW_COLUMNS}] or [N, {RAW_COLUMNS}]"),
                format!("{shape:?}"),
            ))
        }
    };

    let rows = rows
        .into_dimensionality::<Ix2>()
        .map_err(|e| DetectError::malformed("two-dimensional rows", e.to_string()))?;

    if rows.nrows() > max_rows {
        return Err(DetectError::malformed(
            format!("at most {max_rows} rows"),
            format!("{} rows", rows.nrows()),
        ));
    }

    Ok(rows)
}

/// Box Decoder: every row converted to a corner-form canvas box, no filtering.
#[must_use]
pub fn decode_rows(rows: ArrayView2<'_, f32>) -> Vec<BoundingBox> {
    rows.rows()
        .into_iter()
        .map(|row| RawDetection::from_row(row).decode())
        .collect()
}

/// Confidence Filter: keeps boxes whose score is strictly above `threshold`.
///
/// Relative order is preserved. Boxes with non-finite coordinates never pass.
#[must_use]
pub fn filter_by_confidence(boxes: Vec<BoundingBox>, threshold: f32) -> Vec<BoundingBox> {
    boxes
        .into_iter()
        .filter(|b| b.score > threshold && b.is_finite())
        .collect()
}

/// Decode and filter fused into one pass over the adapter rows.
///
/// Equivalent to `filter_by_confidence(decode_rows(rows), threshold)` without
/// materializing the rejected rows.
#[must_use]
pub fn candidates(rows: ArrayView2<'_, f32>, threshold: f32) -> Vec<BoundingBox> {
    let mut kept = Vec::new();
    let mut non_finite = 0usize;

    for row in rows.rows() {
        let raw = RawDetection::from_row(row);
        let score = raw.score();
        if score.is_nan() || score <= threshold {
            continue;
        }

        let bbox = raw.decode();
        if !bbox.is_finite() {
            non_finite += 1;
            continue;
        }

        kept.push(bbox);
    }

    if non_finite > 0 {
        debug!(non_finite, "skipped rows with non-finite box parameters");
    }

    kept
}
