// src/matching/image.rs

use crate::domain::property::PropertyRecord;

/// Visual comparison of two listings' photos. A `true` answer makes the pair
/// a match regardless of its similarity score.
pub trait ImageSimilarity: Send + Sync {
    fn is_visual_match(&self, a: &PropertyRecord, b: &PropertyRecord) -> bool;
}

/// Default comparator: never reports a visual match.
// TODO: wrap a perceptual-hash comparator once listing photos are stored locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageSimilarity;

impl ImageSimilarity for NoImageSimilarity {
    fn is_visual_match(&self, _a: &PropertyRecord, _b: &PropertyRecord) -> bool {
        false
    }
}
