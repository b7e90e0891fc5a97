use serde::{Deserialize, Serialize};

use crate::spacer::data::gc_fraction;
use crate::spacer::landscape::Landscape;

/// A named gene (or other feature) interval, `[start, end)` on the target.
/// Only used to label output regions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl Annotation {
    pub fn new(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

fn overlapping_names(annotations: &[Annotation], start: usize, end: usize) -> Vec<String> {
    annotations
        .iter()
        .filter(|a| a.overlaps(start, end))
        .map(|a| a.name.clone())
        .collect()
}

fn region_gc(target: &[u8], start: usize, end: usize) -> Option<f64> {
    target.get(start..end.min(target.len())).and_then(gc_fraction)
}

/// Fills in GC content and overlapping annotation names for every hotspot
/// and vulnerable region.
pub fn label_regions(landscape: &mut Landscape, target: &[u8], annotations: &[Annotation]) {
    for hotspot in &mut landscape.hotspots {
        hotspot.gc_content = region_gc(target, hotspot.start, hotspot.end);
        hotspot.annotations = overlapping_names(annotations, hotspot.start, hotspot.end);
    }
    for region in &mut landscape.vulnerable_regions {
        region.gc_content = region_gc(target, region.start, region.end);
        region.annotations = overlapping_names(annotations, region.start, region.end);
    }
}
