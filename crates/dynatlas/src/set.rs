//! Per-owner atlas namespaces.

use std::collections::HashMap;

use crate::atlas::{Atlas, AtlasSnapshot};
use crate::blit::PageBlitter;
use crate::config::{PackPolicy, SizeClass};
use crate::pool::{Recycle, RecordPools};

/// A per-owner collection of atlases, one per size class in use.
///
/// Sets are pooled and reused across owners; [`Recycle`] runs only after the
/// atlases have been destroyed through [`destroy`].
///
/// [`destroy`]: AtlasSet::destroy
#[derive(Debug, Default)]
pub struct AtlasSet {
    label: String,
    atlases: HashMap<SizeClass, Atlas>,
}

impl AtlasSet {
    pub(crate) fn assign(&mut self, label: &str) {
        debug_assert!(self.atlases.is_empty(), "recycled set still holds atlases");
        self.label.push_str(label);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn atlas_count(&self) -> usize {
        self.atlases.len()
    }

    pub fn atlas(&self, size_class: SizeClass) -> Option<&Atlas> {
        self.atlases.get(&size_class)
    }

    /// The atlas serving `size_class`, created lazily on first use.
    pub fn atlas_mut(&mut self, size_class: SizeClass, policy: PackPolicy) -> &mut Atlas {
        self.atlases.entry(size_class).or_insert_with(|| {
            let name = format!("{}-{}", self.label, size_class.length());
            Atlas::new(name, size_class, policy)
        })
    }

    pub fn snapshots(&self) -> Vec<AtlasSnapshot> {
        let mut snaps: Vec<AtlasSnapshot> = self.atlases.values().map(Atlas::snapshot).collect();
        snaps.sort_by_key(|s| s.size_class.length());
        snaps
    }

    /// Release every page texture in every atlas and drop the atlases.
    pub(crate) fn destroy(&mut self, blitter: &mut dyn PageBlitter, pools: &mut RecordPools) {
        for (_, mut atlas) in self.atlases.drain() {
            // Records and requests go back to the pools before the pages die.
            atlas.clear(false, blitter, pools);
            atlas.destroy(blitter);
        }
    }
}

impl Recycle for AtlasSet {
    fn recycle(&mut self) {
        debug_assert!(self.atlases.is_empty(), "set recycled before destroy");
        self.label.clear();
        self.atlases.clear();
    }
}
