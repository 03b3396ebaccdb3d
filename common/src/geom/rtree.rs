use super::layer::LayerRange;
use super::rect::Rect;
use super::shape::TOUCH_TOLERANCE;
use crate::db::indices::ItemId;
use rstar::{AABB, RTree, RTreeObject};

// Broad-phase envelopes carry the full touch tolerance as slack: any pair
// the narrow phase would accept must come out of the tree as a candidate.
const ENVELOPE_SLACK: f64 = TOUCH_TOLERANCE;

#[derive(Clone, Debug)]
struct IndexedVolume {
    item: ItemId,
    min: [f64; 3],
    max: [f64; 3],
}

// Identity is the item handle alone. Removal probes compare by handle so a
// stale bounding box still removes the right entry once located.
impl PartialEq for IndexedVolume {
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item
    }
}

impl RTreeObject for IndexedVolume {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

fn volume(item: ItemId, bbox: Rect, layers: LayerRange) -> IndexedVolume {
    IndexedVolume {
        item,
        min: [
            bbox.min.x - ENVELOPE_SLACK,
            bbox.min.y - ENVELOPE_SLACK,
            layers.start.index() as f64,
        ],
        max: [
            bbox.max.x + ENVELOPE_SLACK,
            bbox.max.y + ENVELOPE_SLACK,
            layers.end.index() as f64,
        ],
    }
}

/// 3D R-tree over item bounding volumes: two spatial axes plus the copper
/// layer span. One structure answers both "nearby on this layer" and "any
/// layer overlap" queries.
pub struct SpatialIndex {
    tree: RTree<IndexedVolume>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The caller must not insert the same item twice without removing it
    /// first; the index does no duplicate detection.
    pub fn insert(&mut self, item: ItemId, bbox: Rect, layers: LayerRange) {
        self.tree.insert(volume(item, bbox, layers));
    }

    /// Removes the item, guided by the given bounds. If the bounds are stale
    /// (the item moved since insertion) the guided removal misses and we fall
    /// back to an exhaustive scan. Removing an item that is not indexed is a
    /// silent no-op.
    pub fn remove(&mut self, item: ItemId, bbox: Rect, layers: LayerRange) {
        let probe = volume(item, bbox, layers);
        if self.tree.remove(&probe).is_some() {
            return;
        }

        let stale = self.tree.iter().find(|v| v.item == item).cloned();
        if let Some(entry) = stale {
            self.tree.remove(&entry);
        }
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Invokes `visitor` for every indexed item whose volume intersects the
    /// query volume. The visitor returns `false` to stop the traversal.
    pub fn query<F>(&self, bbox: Rect, layers: LayerRange, mut visitor: F)
    where
        F: FnMut(ItemId) -> bool,
    {
        let probe = volume(ItemId::new(0), bbox, layers);
        let aabb = AABB::from_corners(probe.min, probe.max);
        for entry in self.tree.locate_in_envelope_intersecting(&aabb) {
            if !visitor(entry.item) {
                return;
            }
        }
    }

    pub fn collect(&self, bbox: Rect, layers: LayerRange) -> Vec<ItemId> {
        let mut out = Vec::new();
        self.query(bbox, layers, |item| {
            out.push(item);
            true
        });
        out
    }
}
