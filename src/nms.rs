use std::cmp::Ordering;

use tracing::warn;

use crate::boxes::{iou_with_areas, BoundingBox};

/// Indices of `boxes` sorted by descending score. Ties keep input order.
fn order_by_score(boxes: &[BoundingBox]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| descending(boxes[a].score, boxes[b].score));
    order
}

fn descending(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}

/// Greedy non-maximum suppression.
///
/// Repeatedly keeps the highest-scoring remaining box and discards every
/// remaining box whose IoU with it is strictly greater than `iou_threshold`.
/// An IoU exactly equal to the threshold survives.
///
/// Returns indices into `boxes` in keep order (descending score).
#[must_use]
pub fn nms(boxes: &[BoundingBox], iou_threshold: f32) -> Vec<usize> {
    if boxes.is_empty() {
        return Vec::new();
    }

    let areas: Vec<f32> = boxes.iter().map(BoundingBox::area).collect();
    let order = order_by_score(boxes);

    let mut suppressed = vec![false; boxes.len()];
    let mut keep = Vec::new();

    for (pos, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);

        for &j in &order[pos + 1..] {
            if suppressed[j] {
                continue;
            }
            if iou_with_areas(&boxes[i], areas[i], &boxes[j], areas[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Convenience wrapper returning the kept boxes themselves.
#[must_use]
pub fn suppress(boxes: &[BoundingBox], iou_threshold: f32) -> Vec<BoundingBox> {
    nms(boxes, iou_threshold).into_iter().map(|i| boxes[i]).collect()
}

/// Keeps only the `max` highest-scoring candidates.
///
/// Returns `true` when candidates were dropped. Survivors are left in
/// descending score order.
pub fn cap_candidates(candidates: &mut Vec<BoundingBox>, max: usize) -> bool {
    if candidates.len() <= max {
        return false;
    }

    let total = candidates.len();
    candidates.sort_by(|a, b| descending(a.score, b.score));
    candidates.truncate(max);

    warn!(total, kept = max, "candidate cap reached, lowest scores dropped before NMS");
    true
}
