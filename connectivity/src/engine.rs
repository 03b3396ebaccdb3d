use crate::graph::{Cluster, NetConflict, NetRegistry, Phase, build_clusters};
use crate::incremental::{DirtySet, Pending};
use crate::progress::{NoProgress, ProgressReporter};
use crate::record::ShapeRecord;
use pcb_common::db::indices::{ItemId, NO_NET};
use pcb_common::db::items::Board;
use pcb_common::geom::layer::LayerRange;
use pcb_common::geom::point::Point;
use pcb_common::geom::rect::Rect;
use pcb_common::geom::rtree::SpatialIndex;
use pcb_common::util::config::ConnectivityConfig;
use pcb_common::util::profiler::ScopedTimer;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// A same-net pair left unjoined by copper; the ratsnest line consumers
/// should draw. Regenerated whole whenever the net's membership changes,
/// never mutated in place.
#[derive(Clone, Debug)]
pub struct RatsnestEdge {
    pub net_code: i32,
    pub a: ItemId,
    pub b: ItemId,
    pub length: f64,
}

#[derive(Debug, Error)]
pub enum RecalcError {
    #[error("full rebuild cancelled; prior connectivity state retained")]
    Cancelled,
}

/// Cluster storage with stable slots, so an incremental pass can splice
/// recomputed sub-clusters in without renumbering the survivors.
#[derive(Default)]
struct ClusterSlots {
    slots: Vec<Option<Cluster>>,
    free: Vec<usize>,
    item_cluster: HashMap<ItemId, usize>,
}

impl ClusterSlots {
    fn insert(&mut self, cluster: Cluster) -> usize {
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        for &member in &cluster.members {
            self.item_cluster.insert(member, idx);
        }
        self.slots[idx] = Some(cluster);
        idx
    }

    fn remove(&mut self, idx: usize) -> Option<Cluster> {
        let cluster = self.slots.get_mut(idx)?.take()?;
        for member in &cluster.members {
            if self.item_cluster.get(member) == Some(&idx) {
                self.item_cluster.remove(member);
            }
        }
        self.free.push(idx);
        Some(cluster)
    }

    fn get(&self, idx: usize) -> Option<&Cluster> {
        self.slots.get(idx).and_then(|slot| slot.as_ref())
    }

    fn slot_of(&self, item: ItemId) -> Option<usize> {
        self.item_cluster.get(&item).copied()
    }

    fn cluster_of(&self, item: ItemId) -> Option<&Cluster> {
        self.get(self.slot_of(item)?)
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &Cluster)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|c| (idx, c)))
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// The connectivity engine for one board instance. All mutation and queries
/// happen through one owner (`&mut self` makes a recompute non-re-entrant by
/// construction); consumers read via the accessor methods and never touch
/// engine-internal state.
pub struct ConnectivityEngine {
    config: ConnectivityConfig,
    index: SpatialIndex,
    records: HashMap<ItemId, ShapeRecord>,
    nets: NetRegistry,
    clusters: ClusterSlots,
    ratsnest: HashMap<i32, Vec<RatsnestEdge>>,
    dirty: DirtySet,
    phase: Phase,
}

impl ConnectivityEngine {
    pub fn new(config: ConnectivityConfig) -> Self {
        Self {
            config,
            index: SpatialIndex::new(),
            records: HashMap::new(),
            nets: NetRegistry::new(),
            clusters: ClusterSlots::default(),
            ratsnest: HashMap::new(),
            dirty: DirtySet::default(),
            phase: Phase::Idle,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConnectivityConfig::default())
    }

    pub fn mark_added(&mut self, item: ItemId) {
        self.dirty.mark_added(item);
    }

    pub fn mark_moved(&mut self, item: ItemId) {
        self.dirty.mark_moved(item);
    }

    pub fn mark_removed(&mut self, item: ItemId) {
        self.dirty.mark_removed(item);
    }

    pub fn recalculate(&mut self, board: &Board, full: bool) -> Result<(), RecalcError> {
        self.recalculate_with(board, full, &NoProgress)
    }

    /// Blocking, synchronous recompute. A full rebuild re-derives everything
    /// from the board; an incremental pass re-clusters only the closure of
    /// the dirty set. Cancellation (full rebuilds only) leaves the previous
    /// consistent state in place and keeps the dirty set for a later retry;
    /// any completed recompute clears the dirty set unconditionally.
    pub fn recalculate_with(
        &mut self,
        board: &Board,
        full: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<(), RecalcError> {
        if full {
            self.full_rebuild(board, progress)?;
            self.dirty.clear();
        } else {
            self.incremental_pass(board);
        }
        self.phase = Phase::Done;
        Ok(())
    }

    fn full_rebuild(
        &mut self,
        board: &Board,
        progress: &dyn ProgressReporter,
    ) -> Result<(), RecalcError> {
        let _t = ScopedTimer::new("connectivity full rebuild");
        self.phase = Phase::Scanning;

        // The new generation is built on the side and swapped in whole, so
        // readers of the old state (and a cancelled rebuild) never see a
        // half-built result.
        let mut index = SpatialIndex::new();
        let mut records = HashMap::new();
        let mut scope = Vec::new();
        for (id, item) in board.items() {
            let rec = ShapeRecord::build(item);
            if !rec.is_valid() {
                log::warn!("{:?} has an invalid shape; treating it as isolated", id);
            }
            index.insert(id, rec.bbox, rec.layers);
            records.insert(id, rec);
            scope.push(id);
        }

        let mut nets = self.nets.clone();
        let clusters = match build_clusters(
            &scope,
            &records,
            &index,
            &mut nets,
            &self.config,
            progress,
        ) {
            Ok(clusters) => clusters,
            Err(_) => {
                log::info!("full rebuild cancelled; prior connectivity state retained");
                self.phase = Phase::Done;
                return Err(RecalcError::Cancelled);
            }
        };

        let mut slots = ClusterSlots::default();
        for cluster in clusters {
            slots.insert(cluster);
        }
        let ratsnest = build_all_ratsnest(&slots, &records);

        self.index = index;
        self.records = records;
        self.nets = nets;
        self.clusters = slots;
        self.ratsnest = ratsnest;
        Ok(())
    }

    fn incremental_pass(&mut self, board: &Board) {
        let _t = ScopedTimer::debug("connectivity incremental update");
        let changes = self.dirty.take();
        if changes.is_empty() {
            return;
        }
        self.phase = Phase::Scanning;

        let mut seeds: BTreeSet<ItemId> = BTreeSet::new();
        let mut affected_slots: BTreeSet<usize> = BTreeSet::new();
        let mut pulled_names: BTreeSet<String> = BTreeSet::new();

        // Neighbors at the old position, before the index mutates. Items the
        // dirty item used to touch may need their cluster split.
        for (id, pending) in &changes {
            if matches!(pending, Pending::Moved | Pending::Removed) {
                if let Some(rec) = self.records.get(id) {
                    self.index.query(rec.bbox, rec.layers, |n| {
                        seeds.insert(n);
                        true
                    });
                }
                if let Some(slot) = self.clusters.slot_of(*id) {
                    affected_slots.insert(slot);
                }
            }
        }

        // Apply the changes to the index and record cache.
        let mut live_dirty: Vec<ItemId> = Vec::new();
        for (id, pending) in &changes {
            match pending {
                Pending::Removed => {
                    if let Some(old) = self.records.remove(id) {
                        self.index.remove(*id, old.bbox, old.layers);
                    }
                }
                Pending::Added | Pending::Moved => {
                    if let Some(old) = self.records.remove(id) {
                        self.index.remove(*id, old.bbox, old.layers);
                    }
                    match board.get(*id) {
                        Some(item) => {
                            let rec = ShapeRecord::build(item);
                            if !rec.is_valid() {
                                log::warn!(
                                    "{:?} has an invalid shape; treating it as isolated",
                                    id
                                );
                            }
                            if let Some(name) = rec.net_name.as_deref() {
                                pulled_names.insert(name.to_string());
                            }
                            self.index.insert(*id, rec.bbox, rec.layers);
                            self.records.insert(*id, rec);
                            live_dirty.push(*id);
                        }
                        // Marked but already gone from the board: a removal.
                        None => {}
                    }
                }
            }
        }

        // Neighbors at the new position.
        for id in &live_dirty {
            let rec = &self.records[id];
            self.index.query(rec.bbox, rec.layers, |n| {
                seeds.insert(n);
                true
            });
            seeds.insert(*id);
        }

        for id in &seeds {
            if let Some(slot) = self.clusters.slot_of(*id) {
                affected_slots.insert(slot);
            }
        }

        // Name bindings reach beyond geometry: the recomputed scope must
        // cover every cluster sharing a declared name with it, or a split
        // cluster would leave the name's other holders behind. Each name
        // lives in exactly one cluster, so one pull round settles it.
        for &slot in &affected_slots {
            if let Some(cluster) = self.clusters.get(slot) {
                for member in &cluster.members {
                    if let Some(rec) = self.records.get(member) {
                        if let Some(name) = rec.net_name.as_deref() {
                            pulled_names.insert(name.to_string());
                        }
                    }
                }
            }
        }
        if !pulled_names.is_empty() {
            for (id, rec) in &self.records {
                if let Some(name) = rec.net_name.as_deref() {
                    if pulled_names.contains(name) {
                        if let Some(slot) = self.clusters.slot_of(*id) {
                            affected_slots.insert(slot);
                        }
                    }
                }
            }
        }

        // Closure: the dirty items, their old and new neighbors, and every
        // live member of each affected cluster. Everything else keeps its
        // cluster untouched.
        let mut closure: BTreeSet<ItemId> = seeds
            .into_iter()
            .filter(|id| self.records.contains_key(id))
            .collect();
        let mut affected_nets: BTreeSet<i32> = BTreeSet::new();
        for &slot in &affected_slots {
            if let Some(cluster) = self.clusters.get(slot) {
                affected_nets.insert(cluster.net_code);
                for member in &cluster.members {
                    if self.records.contains_key(member) {
                        closure.insert(*member);
                    }
                }
            }
        }

        for &slot in &affected_slots {
            self.clusters.remove(slot);
        }

        let scope: Vec<ItemId> = closure.into_iter().collect();
        if !scope.is_empty() {
            self.phase = Phase::Clustering;
            let sub = build_clusters(
                &scope,
                &self.records,
                &self.index,
                &mut self.nets,
                &self.config,
                &NoProgress,
            )
            .expect("NoProgress never cancels");
            for cluster in sub {
                affected_nets.insert(cluster.net_code);
                self.clusters.insert(cluster);
            }
        }

        self.phase = Phase::Assigning;
        for net in affected_nets {
            if net == NO_NET {
                continue;
            }
            let edges = build_net_ratsnest(net, &self.clusters, &self.records);
            if edges.is_empty() {
                self.ratsnest.remove(&net);
            } else {
                self.ratsnest.insert(net, edges);
            }
        }
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().map(|(_, c)| c)
    }

    pub fn net_code(&self, item: ItemId) -> i32 {
        self.clusters
            .cluster_of(item)
            .map(|c| c.net_code)
            .unwrap_or(NO_NET)
    }

    pub fn net_name(&self, code: i32) -> Option<&str> {
        self.nets.name(code)
    }

    /// All items physically or logically clustered with the given one,
    /// including itself. Empty if the item is unknown.
    pub fn cluster_members(&self, item: ItemId) -> Vec<ItemId> {
        self.clusters
            .cluster_of(item)
            .map(|c| c.members.clone())
            .unwrap_or_default()
    }

    /// Pass-through to the spatial index.
    pub fn query_touching<F>(&self, bbox: Rect, layers: LayerRange, visitor: F)
    where
        F: FnMut(ItemId) -> bool,
    {
        self.index.query(bbox, layers, visitor);
    }

    pub fn ratsnest(&self, net_code: i32) -> &[RatsnestEdge] {
        self.ratsnest
            .get(&net_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_ratsnest(&self) -> impl Iterator<Item = &RatsnestEdge> {
        self.ratsnest.values().flatten()
    }

    pub fn conflicts(&self) -> Vec<&NetConflict> {
        let mut conflicts: Vec<&NetConflict> = self
            .clusters
            .iter()
            .filter_map(|(_, c)| c.conflict.as_ref())
            .collect();
        conflicts.sort_by_key(|c| c.anchor);
        conflicts
    }

    /// Items whose geometry could not be normalized; isolated singletons.
    pub fn invalid_shapes(&self) -> Vec<ItemId> {
        let mut out: Vec<ItemId> = self
            .records
            .iter()
            .filter(|(_, rec)| !rec.is_valid())
            .map(|(&id, _)| id)
            .collect();
        out.sort();
        out
    }

    pub fn record(&self, item: ItemId) -> Option<&ShapeRecord> {
        self.records.get(&item)
    }

    /// Net codes currently carried by at least one cluster.
    pub fn nets_in_use(&self) -> Vec<i32> {
        let codes: BTreeSet<i32> = self
            .clusters
            .iter()
            .map(|(_, c)| c.net_code)
            .filter(|&code| code != NO_NET)
            .collect();
        codes.into_iter().collect()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn item_count(&self) -> usize {
        self.records.len()
    }

    pub fn pending_edits(&self) -> usize {
        self.dirty.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Ratsnest for one net: Prim over the net's pad/via anchors with distance
/// zero inside a copper island, keeping only the edges that cross between
/// islands. A fully routed net (one island) yields no edges.
fn build_net_ratsnest(
    net_code: i32,
    clusters: &ClusterSlots,
    records: &HashMap<ItemId, ShapeRecord>,
) -> Vec<RatsnestEdge> {
    let mut nodes: Vec<(ItemId, Point<f64>, (usize, u32))> = Vec::new();
    for (slot, cluster) in clusters.iter() {
        if cluster.net_code != net_code {
            continue;
        }
        for (member, &island) in cluster.members.iter().zip(cluster.copper.iter()) {
            if let Some(anchor) = records.get(member).and_then(|rec| rec.anchor) {
                nodes.push((*member, anchor, (slot, island)));
            }
        }
    }

    let distinct: HashSet<(usize, u32)> = nodes.iter().map(|n| n.2).collect();
    if nodes.len() < 2 || distinct.len() < 2 {
        return Vec::new();
    }

    let mut mst = crate::mst::MinSpanTree::new(nodes.len());
    mst.build(|i, j| {
        if i == j || nodes[i].2 == nodes[j].2 {
            0.0
        } else {
            nodes[i].1.manhattan(&nodes[j].1)
        }
    });

    mst.edges()
        .filter(|&(i, j, _)| nodes[i].2 != nodes[j].2)
        .map(|(i, j, length)| RatsnestEdge {
            net_code,
            a: nodes[i].0,
            b: nodes[j].0,
            length,
        })
        .collect()
}

fn build_all_ratsnest(
    clusters: &ClusterSlots,
    records: &HashMap<ItemId, ShapeRecord>,
) -> HashMap<i32, Vec<RatsnestEdge>> {
    let codes: BTreeSet<i32> = clusters
        .iter()
        .map(|(_, c)| c.net_code)
        .filter(|&code| code != NO_NET)
        .collect();

    let mut out = HashMap::new();
    for code in codes {
        let edges = build_net_ratsnest(code, clusters, records);
        if !edges.is_empty() {
            out.insert(code, edges);
        }
    }
    out
}
