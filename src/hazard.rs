//! Hazard classification by label keyword.
//!
//! A detection is a hazard when its confidence is at least the threshold and
//! its lowercased label contains one of the hazard keywords. Matching is a
//! plain substring test, so labels such as "fireplace" or "firefly" count as
//! hazards too.

use crate::detect::Detection;

pub const DEFAULT_HAZARD_KEYWORDS: [&str; 2] = ["fire", "smoke"];
pub const DEFAULT_HAZARD_THRESHOLD: f32 = 0.35;

#[derive(Clone, Debug)]
pub struct HazardClassifier {
    keywords: Vec<String>,
    threshold: f32,
}

impl HazardClassifier {
    pub fn new<I, S>(keywords: I, threshold: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keywords,
            threshold,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Label-only half of the test.
    pub fn label_matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.keywords.iter().any(|k| label.contains(k.as_str()))
    }

    pub fn is_hazard(&self, detection: &Detection) -> bool {
        detection.confidence >= self.threshold && self.label_matches(&detection.label)
    }

    /// A frame is hazardous if any of its detections is.
    pub fn frame_is_hazardous(&self, detections: &[Detection]) -> bool {
        detections.iter().any(|d| self.is_hazard(d))
    }
}

impl Default for HazardClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HAZARD_KEYWORDS, DEFAULT_HAZARD_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(label, confidence, BBox::default())
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let c = HazardClassifier::new(["fire", "smoke"], 0.3);
        assert!(c.is_hazard(&det("Smoke_2", 0.4)));
        assert!(c.is_hazard(&det("WILDFIRE", 0.5)));
        assert!(!c.is_hazard(&det("person", 0.99)));
    }

    #[test]
    fn substring_match_accepts_lookalike_labels() {
        let c = HazardClassifier::new(["fire", "smoke"], 0.3);
        assert!(c.is_hazard(&det("fireplace", 0.9)));
        assert!(c.is_hazard(&det("firefly", 0.9)));
    }

    #[test]
    fn confidence_must_reach_threshold() {
        let c = HazardClassifier::new(["fire"], 0.5);
        assert!(!c.is_hazard(&det("fire", 0.49)));
        assert!(c.is_hazard(&det("fire", 0.5)));
    }

    #[test]
    fn frame_is_hazardous_if_any_box_is() {
        let c = HazardClassifier::default();
        assert!(!c.frame_is_hazardous(&[]));
        assert!(!c.frame_is_hazardous(&[det("car", 0.9), det("tree", 0.8)]));
        assert!(c.frame_is_hazardous(&[det("car", 0.9), det("smoke", 0.8)]));
    }

    #[test]
    fn keywords_are_normalized() {
        let c = HazardClassifier::new([" FIRE ", ""], 0.1);
        assert_eq!(c.keywords(), &["fire".to_string()]);
    }
}
