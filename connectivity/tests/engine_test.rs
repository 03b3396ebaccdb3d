use pcb_common::db::indices::{ItemId, NO_NET};
use pcb_common::db::items::{Board, BoardItem, ItemGeometry};
use pcb_common::geom::layer::{B_CU, F_CU, LayerRange};
use pcb_common::geom::point::Point;
use pcb_common::util::config::{ConnectivityConfig, GeneratorConfig};
use pcb_common::util::generator::generate_random_board;
use pcb_connectivity::ConnectivityEngine;
use rand::prelude::*;

fn pad(x: f64, y: f64, layers: LayerRange, net: Option<&str>) -> BoardItem {
    BoardItem {
        geometry: ItemGeometry::Pad {
            center: Point::new(x, y),
            size: Point::new(1.5, 1.5),
            round: true,
        },
        layers,
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

fn full(board: &Board) -> ConnectivityEngine {
    let mut engine = ConnectivityEngine::with_defaults();
    engine.recalculate(board, true).unwrap();
    engine
}

#[test]
fn unrouted_net_gets_ratsnest_edges() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), Some("GND")));
    let b = board.add(pad(20.0, 0.0, LayerRange::single(F_CU), Some("GND")));
    let c = board.add(pad(20.0, 15.0, LayerRange::single(F_CU), Some("GND")));

    let engine = full(&board);

    // One logical net, three copper islands.
    let code = engine.net_code(a);
    assert_ne!(code, NO_NET);
    assert_eq!(engine.net_code(b), code);
    assert_eq!(engine.net_code(c), code);
    assert_eq!(engine.net_name(code), Some("GND"));
    assert_eq!(engine.cluster_members(a), vec![a, b, c]);

    // Spanning three islands takes exactly two airwires, shortest first by
    // construction of the tree: 20 across, then 15 up.
    let mut lengths: Vec<f64> = engine.ratsnest(code).iter().map(|e| e.length).collect();
    lengths.sort_by(f64::total_cmp);
    assert_eq!(lengths, vec![15.0, 20.0]);
}

#[test]
fn routed_net_has_no_ratsnest() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), Some("SIG")));
    let b = board.add(pad(10.0, 0.0, LayerRange::single(F_CU), Some("SIG")));
    board.add(track(0.0, 0.0, 10.0, 0.0));

    let engine = full(&board);
    let code = engine.net_code(a);
    assert_eq!(engine.net_code(b), code);
    assert!(engine.ratsnest(code).is_empty());
    assert_eq!(engine.cluster_count(), 1);
}

#[test]
fn layer_disjoint_overlap_stays_split() {
    let mut board = Board::new();
    let top = board.add(pad(5.0, 5.0, LayerRange::single(F_CU), None));
    let bottom = board.add(pad(5.0, 5.0, LayerRange::single(B_CU), None));

    let engine = full(&board);
    assert_eq!(engine.cluster_count(), 2);
    assert_eq!(engine.cluster_members(top), vec![top]);
    assert_eq!(engine.cluster_members(bottom), vec![bottom]);

    // A through-hole via at the same spot fuses them.
    let via = board.add(BoardItem {
        geometry: ItemGeometry::Via {
            center: Point::new(5.0, 5.0),
            diameter: 0.8,
        },
        layers: LayerRange::ALL_COPPER,
        net_name: None,
    });
    let engine = full(&board);
    assert_eq!(engine.cluster_count(), 1);
    assert_eq!(engine.cluster_members(via), vec![top, bottom, via]);
}

#[test]
fn bridged_nets_reported_as_conflict() {
    let mut board = Board::new();
    board.add(pad(0.0, 0.0, LayerRange::single(F_CU), Some("GND")));
    board.add(pad(4.0, 0.0, LayerRange::single(F_CU), Some("GND")));
    board.add(pad(2.0, 0.0, LayerRange::single(F_CU), Some("VCC")));
    board.add(track(0.0, 0.0, 4.0, 0.0));

    let engine = full(&board);
    assert_eq!(engine.cluster_count(), 1);

    let conflicts = engine.conflicts();
    assert_eq!(conflicts.len(), 1);
    let conflict = conflicts[0];
    assert_eq!(conflict.resolved, "GND");
    assert_eq!(conflict.candidates.len(), 2);
    assert_eq!(conflict.candidates[0], ("GND".to_string(), 2));

    assert_eq!(engine.net_name(engine.net_code(ItemId::new(0))), Some("GND"));
}

#[test]
fn invalid_zone_isolated_and_reported() {
    let mut board = Board::new();
    let bowtie = board.add(BoardItem {
        geometry: ItemGeometry::Zone {
            outline: vec![
                Point::new(0.0, 0.0),
                Point::new(4.0, 4.0),
                Point::new(4.0, 0.0),
                Point::new(0.0, 4.0),
            ],
        },
        layers: LayerRange::single(F_CU),
        net_name: None,
    });
    let inside = board.add(pad(2.0, 2.0, LayerRange::single(F_CU), None));

    let engine = full(&board);
    assert_eq!(engine.invalid_shapes(), vec![bowtie]);
    assert_eq!(engine.cluster_members(bowtie), vec![bowtie]);
    assert_eq!(engine.cluster_members(inside), vec![inside]);
}

#[test]
fn invalid_zone_with_net_name_stays_singleton() {
    let mut board = Board::new();
    let bowtie = board.add(BoardItem {
        geometry: ItemGeometry::Zone {
            outline: vec![
                Point::new(0.0, 0.0),
                Point::new(4.0, 4.0),
                Point::new(4.0, 0.0),
                Point::new(0.0, 4.0),
            ],
        },
        layers: LayerRange::single(F_CU),
        net_name: Some("GND".to_string()),
    });
    let pad_gnd = board.add(pad(50.0, 50.0, LayerRange::single(F_CU), Some("GND")));

    let engine = full(&board);
    // The declared name does not pull the broken zone into the net's
    // cluster; it keeps its own singleton.
    assert_eq!(engine.cluster_members(bowtie), vec![bowtie]);
    assert_eq!(engine.cluster_members(pad_gnd), vec![pad_gnd]);
    assert_eq!(engine.net_name(engine.net_code(bowtie)), Some("GND"));
}

#[test]
fn incremental_add_joins_clusters() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), Some("SIG")));
    let b = board.add(pad(10.0, 0.0, LayerRange::single(F_CU), Some("SIG")));

    let mut engine = ConnectivityEngine::with_defaults();
    engine.recalculate(&board, true).unwrap();
    let code = engine.net_code(a);
    assert_eq!(engine.ratsnest(code).len(), 1);

    let wire = board.add(track(0.0, 0.0, 10.0, 0.0));
    engine.mark_added(wire);
    engine.recalculate(&board, false).unwrap();

    assert_eq!(engine.cluster_members(a), vec![a, b, wire]);
    assert!(engine.ratsnest(code).is_empty());
}

#[test]
fn incremental_remove_splits_cluster() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), Some("SIG")));
    let b = board.add(pad(10.0, 0.0, LayerRange::single(F_CU), Some("SIG")));
    let wire = board.add(track(0.0, 0.0, 10.0, 0.0));

    let mut engine = ConnectivityEngine::with_defaults();
    engine.recalculate(&board, true).unwrap();
    assert_eq!(engine.cluster_count(), 1);

    board.remove(wire);
    engine.mark_removed(wire);
    engine.recalculate(&board, false).unwrap();

    // The name binding keeps both pads in one logical cluster, but the
    // copper link is gone so the airwire is back.
    let code = engine.net_code(a);
    assert_eq!(engine.net_name(code), Some("SIG"));
    assert_eq!(engine.net_code(b), code);
    assert_eq!(engine.cluster_members(a), vec![a, b]);
    assert_eq!(engine.ratsnest(code).len(), 1);
    assert_eq!(engine.ratsnest(code)[0].length, 10.0);
}

#[test]
fn incremental_move_rewires_neighborhood() {
    let mut board = Board::new();
    let left = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), None));
    let right = board.add(pad(30.0, 0.0, LayerRange::single(F_CU), None));
    let rover = board.add(pad(0.5, 0.0, LayerRange::single(F_CU), None));

    let mut engine = ConnectivityEngine::with_defaults();
    engine.recalculate(&board, true).unwrap();
    assert_eq!(engine.cluster_members(left), vec![left, rover]);

    board.replace(rover, pad(29.5, 0.0, LayerRange::single(F_CU), None));
    engine.mark_moved(rover);
    engine.recalculate(&board, false).unwrap();

    assert_eq!(engine.cluster_members(left), vec![left]);
    assert_eq!(engine.cluster_members(right), vec![right, rover]);
}

#[test]
fn incremental_name_change_merges_distant_clusters() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), Some("GND")));
    let b = board.add(pad(50.0, 50.0, LayerRange::single(F_CU), None));

    let mut engine = ConnectivityEngine::with_defaults();
    engine.recalculate(&board, true).unwrap();
    assert_eq!(engine.cluster_count(), 2);

    // Assigning the far pad to GND must pull in the existing GND cluster
    // even though nothing touches spatially.
    board.replace(b, pad(50.0, 50.0, LayerRange::single(F_CU), Some("GND")));
    engine.mark_moved(b);
    engine.recalculate(&board, false).unwrap();

    assert_eq!(engine.cluster_members(a), vec![a, b]);
    assert_eq!(engine.net_name(engine.net_code(b)), Some("GND"));
}

#[test]
fn marks_without_recalculate_stay_pending() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), None));

    let mut engine = ConnectivityEngine::with_defaults();
    engine.recalculate(&board, true).unwrap();

    let b = board.add(pad(0.5, 0.0, LayerRange::single(F_CU), None));
    engine.mark_added(b);
    assert_eq!(engine.pending_edits(), 1);
    // Queries still answer from the previous consistent state.
    assert_eq!(engine.cluster_members(a), vec![a]);

    engine.recalculate(&board, false).unwrap();
    assert_eq!(engine.pending_edits(), 0);
    assert_eq!(engine.cluster_members(a), vec![a, b]);
}

#[test]
fn full_rebuild_clears_pending_edits() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), None));

    let mut engine = ConnectivityEngine::with_defaults();
    engine.mark_added(a);
    engine.mark_moved(ItemId::new(99));
    engine.recalculate(&board, true).unwrap();
    assert_eq!(engine.pending_edits(), 0);
    assert_eq!(engine.item_count(), 1);
}

fn signature(engine: &ConnectivityEngine) -> Vec<(Vec<ItemId>, Option<String>)> {
    let mut rows: Vec<_> = engine
        .clusters()
        .map(|c| {
            (
                c.members.clone(),
                engine.net_name(c.net_code).map(str::to_string),
            )
        })
        .collect();
    rows.sort();
    rows
}

#[test]
fn incremental_stream_matches_full_rebuild() {
    let mut board = generate_random_board(&GeneratorConfig {
        nets: 12,
        pads_per_net: 5,
        ..GeneratorConfig::default()
    });

    let mut engine = ConnectivityEngine::with_defaults();
    engine.recalculate(&board, true).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..40 {
        let live: Vec<ItemId> = board.items().map(|(id, _)| id).collect();
        match rng.gen_range(0..3) {
            0 => {
                let id = live[rng.gen_range(0..live.len())];
                board.remove(id);
                engine.mark_removed(id);
            }
            1 => {
                let id = live[rng.gen_range(0..live.len())];
                let mut item = board.get(id).cloned().unwrap();
                if let ItemGeometry::Pad { center, .. } = &mut item.geometry {
                    center.x += rng.gen_range(-5.0..5.0);
                    center.y += rng.gen_range(-5.0..5.0);
                }
                board.replace(id, item);
                engine.mark_moved(id);
            }
            _ => {
                let x = rng.gen_range(0.0..100.0);
                let y = rng.gen_range(0.0..100.0);
                let id = board.add(track(x, y, x + 4.0, y));
                engine.mark_added(id);
            }
        }
        engine.recalculate(&board, false).unwrap();
    }

    let fresh = full(&board);
    assert_eq!(signature(&engine), signature(&fresh));
}

#[test]
fn query_touching_exposes_the_index() {
    let mut board = Board::new();
    let a = board.add(pad(0.0, 0.0, LayerRange::single(F_CU), None));
    board.add(pad(50.0, 50.0, LayerRange::single(B_CU), None));

    let engine = full(&board);
    let mut hits = Vec::new();
    engine.query_touching(
        pcb_common::geom::rect::Rect::new(Point::new(-2.0, -2.0), Point::new(2.0, 2.0)),
        LayerRange::single(F_CU),
        |id| {
            hits.push(id);
            true
        },
    );
    assert_eq!(hits, vec![a]);
}
