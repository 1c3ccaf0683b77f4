use std::cmp::Ordering;

use crate::detect::result::Detection;

/// Class-aware non-maximum suppression.
///
/// Keeps the highest-confidence box of every overlapping group that shares a
/// label; overlap is IoU strictly above `iou_threshold`.
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    let mut kept = 0;
    for index in 0..detections.len() {
        let suppressed = (0..kept).any(|prev| {
            detections[prev].label == detections[index].label
                && detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold
        });
        if !suppressed {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;

    #[test]
    fn overlapping_same_label_boxes_collapse() {
        let mut dets = vec![
            Detection::new("fire", 0.6, BBox::new(0.0, 0.0, 10.0, 10.0)),
            Detection::new("fire", 0.9, BBox::new(1.0, 1.0, 11.0, 11.0)),
            Detection::new("fire", 0.5, BBox::new(50.0, 50.0, 60.0, 60.0)),
        ];
        non_max_suppression(&mut dets, 0.45);
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].confidence, 0.9);
        assert_eq!(dets[1].confidence, 0.5);
    }

    #[test]
    fn different_labels_are_not_suppressed() {
        let mut dets = vec![
            Detection::new("fire", 0.9, BBox::new(0.0, 0.0, 10.0, 10.0)),
            Detection::new("smoke", 0.8, BBox::new(0.0, 0.0, 10.0, 10.0)),
        ];
        non_max_suppression(&mut dets, 0.45);
        assert_eq!(dets.len(), 2);
    }
}
