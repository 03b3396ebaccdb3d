use crate::progress::ProgressReporter;
use crate::record::ShapeRecord;
use crate::unionfind::UnionFind;
use pcb_common::db::indices::{ItemId, NO_NET};
use pcb_common::geom::rtree::SpatialIndex;
use pcb_common::util::config::{ConnectivityConfig, TieBreakPolicy};
use rayon::prelude::*;
use std::collections::HashMap;

/// Recompute cycle state, for observability. A cycle always runs the phases
/// in order and is not re-entrant; mutation during a cycle is prevented by
/// the engine holding `&mut self` for its duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Clustering,
    Assigning,
    Done,
}

/// A cluster whose members declared more than one net name. The recompute
/// still completes with the tie-broken `resolved` name; the conflict is
/// reported, never silently dropped.
#[derive(Clone, Debug)]
pub struct NetConflict {
    /// Smallest member handle, a stable identity for reporting.
    pub anchor: ItemId,
    /// Disagreeing names with their member counts, strongest claim first.
    pub candidates: Vec<(String, usize)>,
    pub resolved: String,
}

/// A connected component of physically-touching or same-net-bound items.
#[derive(Clone, Debug)]
pub struct Cluster {
    /// Ascending item handles.
    pub members: Vec<ItemId>,
    /// Copper island label per member, parallel to `members`. Equal labels
    /// mean the two are joined by actual copper; a name-bound cluster can
    /// span several islands, which is what the ratsnest bridges.
    pub copper: Vec<u32>,
    pub net_code: i32,
    pub conflict: Option<NetConflict>,
}

/// Net name to net code bindings. Codes are handed out lazily in first-use
/// order and never recycled within an engine's lifetime, so code assignments
/// stay stable across recomputes.
#[derive(Clone, Default)]
pub struct NetRegistry {
    names: Vec<String>,
    codes: HashMap<String, i32>,
}

impl NetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code_for(&mut self, name: &str) -> i32 {
        if let Some(&code) = self.codes.get(name) {
            return code;
        }
        let code = self.names.len() as i32;
        self.names.push(name.to_string());
        self.codes.insert(name.to_string(), code);
        code
    }

    pub fn code(&self, name: &str) -> Option<i32> {
        self.codes.get(name).copied()
    }

    pub fn name(&self, code: i32) -> Option<&str> {
        if code < 0 {
            return None;
        }
        self.names.get(code as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug)]
pub struct Cancelled;

/// Clusters the given scope of items: spatial scan for touching pairs,
/// union-find merge (including same-net-name bindings), then deterministic
/// net-code assignment. The scope must be sorted ascending; records and the
/// index may cover a superset of it (hits outside the scope are ignored,
/// which is what restricts an incremental pass to its closure).
pub fn build_clusters(
    scope: &[ItemId],
    records: &HashMap<ItemId, ShapeRecord>,
    index: &SpatialIndex,
    nets: &mut NetRegistry,
    config: &ConnectivityConfig,
    progress: &dyn ProgressReporter,
) -> Result<Vec<Cluster>, Cancelled> {
    log::debug!("phase {:?}: {} items", Phase::Scanning, scope.len());
    let slot_of: HashMap<ItemId, usize> = scope
        .iter()
        .enumerate()
        .map(|(slot, &id)| (id, slot))
        .collect();

    let scan_one = |slot: usize, id: ItemId| -> Vec<(u32, u32)> {
        let rec = &records[&id];
        if !rec.is_valid() {
            return Vec::new();
        }
        let mut pairs = Vec::new();
        index.query(rec.bbox, rec.layers, |other| {
            // Each unordered pair is tested once, from its lower handle.
            if other > id {
                if let Some(&other_slot) = slot_of.get(&other) {
                    if rec.collides_with(&records[&other]) {
                        pairs.push((slot as u32, other_slot as u32));
                    }
                }
            }
            true
        });
        pairs
    };

    progress.begin_phase(scope.len());
    let pairs: Vec<(u32, u32)> = if scope.len() >= config.parallel_scan_threshold {
        // Read-only against the index; each worker fills a private pair
        // list that is merged serially below.
        let pairs = scope
            .par_iter()
            .enumerate()
            .map(|(slot, &id)| {
                if progress.is_cancelled() {
                    return Vec::new();
                }
                let out = scan_one(slot, id);
                progress.advance();
                out
            })
            .flatten_iter()
            .collect();
        if progress.is_cancelled() {
            return Err(Cancelled);
        }
        pairs
    } else {
        let mut pairs = Vec::new();
        for (slot, &id) in scope.iter().enumerate() {
            if slot % config.progress_poll_interval.max(1) == 0 && progress.is_cancelled() {
                return Err(Cancelled);
            }
            pairs.extend(scan_one(slot, id));
            progress.advance();
        }
        pairs
    };

    log::debug!("phase {:?}: {} touching pairs", Phase::Clustering, pairs.len());
    let mut uf = UnionFind::new(scope.len());
    for (a, b) in pairs {
        uf.union(a as usize, b as usize);
    }

    // Snapshot the copper-only components before name unions widen the sets;
    // the ratsnest needs to tell copper islands apart inside a net.
    let copper_root: Vec<u32> = (0..scope.len()).map(|slot| uf.find(slot) as u32).collect();

    // Schematic-declared connectivity: same explicit net name joins items
    // even without copper between them. Shape-invalid items sit this out
    // too; they stay singletons no matter what they declare.
    let mut first_with_name: HashMap<&str, usize> = HashMap::new();
    for (slot, id) in scope.iter().enumerate() {
        let rec = &records[id];
        if !rec.is_valid() {
            continue;
        }
        if let Some(name) = rec.net_name.as_deref() {
            match first_with_name.get(name) {
                Some(&first) => {
                    uf.union(first, slot);
                }
                None => {
                    first_with_name.insert(name, slot);
                }
            }
        }
    }

    log::debug!("phase {:?}", Phase::Assigning);
    let sets = uf.extract_sets();
    let mut clusters = Vec::with_capacity(sets.len());
    for set in sets {
        let copper: Vec<u32> = set.iter().map(|&slot| copper_root[slot]).collect();
        let members: Vec<ItemId> = set.into_iter().map(|slot| scope[slot]).collect();
        let (net_code, conflict) = resolve_net(&members, records, nets, config.tie_break);
        clusters.push(Cluster {
            members,
            copper,
            net_code,
            conflict,
        });
    }

    log::debug!("phase {:?}: {} clusters", Phase::Done, clusters.len());
    Ok(clusters)
}

fn resolve_net(
    members: &[ItemId],
    records: &HashMap<ItemId, ShapeRecord>,
    nets: &mut NetRegistry,
    policy: TieBreakPolicy,
) -> (i32, Option<NetConflict>) {
    let mut votes: HashMap<&str, usize> = HashMap::new();
    for id in members {
        if let Some(name) = records[id].net_name.as_deref() {
            *votes.entry(name).or_insert(0) += 1;
        }
    }
    if votes.is_empty() {
        // No declared name and no netted neighbor: a valid terminal state.
        return (NO_NET, None);
    }

    let mut tally: Vec<(String, usize)> = votes
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let resolved = match policy {
        TieBreakPolicy::MembersThenName => tally[0].0.clone(),
        TieBreakPolicy::NameOnly => tally
            .iter()
            .map(|(name, _)| name.clone())
            .min()
            .unwrap_or_else(|| tally[0].0.clone()),
    };
    let code = nets.code_for(&resolved);

    let conflict = if tally.len() > 1 {
        Some(NetConflict {
            anchor: members[0],
            candidates: tally,
            resolved: resolved.clone(),
        })
    } else {
        None
    };
    (code, conflict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use pcb_common::db::items::{BoardItem, ItemGeometry};
    use pcb_common::geom::layer::{F_CU, LayerRange};
    use pcb_common::geom::point::Point;

    fn setup(
        items: Vec<BoardItem>,
    ) -> (Vec<ItemId>, HashMap<ItemId, ShapeRecord>, SpatialIndex) {
        let mut scope = Vec::new();
        let mut records = HashMap::new();
        let mut index = SpatialIndex::new();
        for (i, item) in items.iter().enumerate() {
            let id = ItemId::new(i);
            let rec = ShapeRecord::build(item);
            index.insert(id, rec.bbox, rec.layers);
            records.insert(id, rec);
            scope.push(id);
        }
        (scope, records, index)
    }

    fn pad(x: f64, y: f64, net: Option<&str>) -> BoardItem {
        BoardItem {
            geometry: ItemGeometry::Pad {
                center: Point::new(x, y),
                size: Point::new(1.0, 1.0),
                round: true,
            },
            layers: LayerRange::single(F_CU),
            net_name: net.map(str::to_string),
        }
    }

    fn track(x1: f64, y1: f64, x2: f64, y2: f64) -> BoardItem {
        BoardItem {
            geometry: ItemGeometry::Track {
                start: Point::new(x1, y1),
                end: Point::new(x2, y2),
                width: 0.3,
            },
            layers: LayerRange::single(F_CU),
            net_name: None,
        }
    }

    fn run(
        scope: &[ItemId],
        records: &HashMap<ItemId, ShapeRecord>,
        index: &SpatialIndex,
    ) -> (Vec<Cluster>, NetRegistry) {
        let mut nets = NetRegistry::new();
        let clusters = build_clusters(
            scope,
            records,
            index,
            &mut nets,
            &ConnectivityConfig::default(),
            &NoProgress,
        )
        .ok()
        .unwrap();
        (clusters, nets)
    }

    #[test]
    fn copper_joins_touching_items() {
        let (scope, records, index) = setup(vec![
            pad(0.0, 0.0, None),
            track(0.0, 0.0, 10.0, 0.0),
            pad(10.0, 0.0, None),
            pad(50.0, 50.0, None),
        ]);
        let (clusters, _) = run(&scope, &records, &index);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members.len(), 3);
        assert_eq!(clusters[1].members, vec![ItemId::new(3)]);
        assert_eq!(clusters[0].net_code, NO_NET);
    }

    #[test]
    fn explicit_net_name_joins_distant_items() {
        let (scope, records, index) = setup(vec![
            pad(0.0, 0.0, Some("GND")),
            pad(80.0, 80.0, Some("GND")),
            pad(40.0, 40.0, Some("VCC")),
        ]);
        let (clusters, nets) = run(&scope, &records, &index);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![ItemId::new(0), ItemId::new(1)]);
        // One logical cluster, but still two copper islands.
        assert_ne!(clusters[0].copper[0], clusters[0].copper[1]);
        assert_eq!(nets.name(clusters[0].net_code), Some("GND"));
        assert_eq!(nets.name(clusters[1].net_code), Some("VCC"));
        assert!(clusters.iter().all(|c| c.conflict.is_none()));
    }

    #[test]
    fn conflict_resolved_by_member_count_then_name() {
        // Two GND pads bridged to one VCC pad: GND has more members.
        let (scope, records, index) = setup(vec![
            pad(0.0, 0.0, Some("GND")),
            pad(1.0, 0.0, Some("GND")),
            pad(0.5, 0.0, Some("VCC")),
        ]);
        let (clusters, nets) = run(&scope, &records, &index);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(nets.name(cluster.net_code), Some("GND"));
        let conflict = cluster.conflict.as_ref().unwrap();
        assert_eq!(conflict.resolved, "GND");
        assert_eq!(conflict.candidates[0], ("GND".to_string(), 2));
        assert_eq!(conflict.candidates[1], ("VCC".to_string(), 1));

        // One on one: tie broken lexicographically, GND before VCC.
        let (scope, records, index) = setup(vec![
            pad(0.0, 0.0, Some("VCC")),
            pad(0.5, 0.0, Some("GND")),
        ]);
        let (clusters, nets) = run(&scope, &records, &index);
        assert_eq!(nets.name(clusters[0].net_code), Some("GND"));
    }

    #[test]
    fn shape_invalid_item_stays_singleton() {
        let bowtie = BoardItem {
            geometry: ItemGeometry::Zone {
                outline: vec![
                    Point::new(-5.0, -5.0),
                    Point::new(5.0, 5.0),
                    Point::new(5.0, -5.0),
                    Point::new(-5.0, 5.0),
                ],
            },
            layers: LayerRange::single(F_CU),
            net_name: None,
        };
        let (scope, records, index) = setup(vec![bowtie, pad(0.0, 0.0, None)]);
        let (clusters, _) = run(&scope, &records, &index);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![ItemId::new(0)]);
    }

    #[test]
    fn named_invalid_shape_does_not_join_its_net() {
        let bowtie = BoardItem {
            geometry: ItemGeometry::Zone {
                outline: vec![
                    Point::new(-5.0, -5.0),
                    Point::new(5.0, 5.0),
                    Point::new(5.0, -5.0),
                    Point::new(-5.0, 5.0),
                ],
            },
            layers: LayerRange::single(F_CU),
            net_name: Some("GND".to_string()),
        };
        let (scope, records, index) = setup(vec![
            bowtie,
            pad(40.0, 40.0, Some("GND")),
            pad(60.0, 60.0, Some("GND")),
        ]);
        let (clusters, nets) = run(&scope, &records, &index);

        // The pads merge through the declared name; the broken zone stays a
        // singleton even though it declares the same net.
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![ItemId::new(0)]);
        assert_eq!(clusters[1].members, vec![ItemId::new(1), ItemId::new(2)]);
        assert_eq!(nets.name(clusters[0].net_code), Some("GND"));
        assert_eq!(nets.name(clusters[1].net_code), Some("GND"));
    }

    #[test]
    fn identical_input_identical_output() {
        let items = vec![
            pad(0.0, 0.0, Some("A")),
            pad(0.5, 0.0, Some("B")),
            pad(10.0, 10.0, Some("B")),
            track(0.0, 0.0, 0.5, 0.0),
        ];
        let (scope, records, index) = setup(items.clone());
        let (c1, n1) = run(&scope, &records, &index);
        let (scope2, records2, index2) = setup(items);
        let (c2, n2) = run(&scope2, &records2, &index2);

        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.members, b.members);
            assert_eq!(n1.name(a.net_code), n2.name(b.net_code));
        }
    }
}
