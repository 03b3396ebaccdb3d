use crate::engine::ConnectivityEngine;
use pcb_common::db::indices::ItemId;
use pcb_common::db::items::{Board, BoardItem, ItemGeometry};
use pcb_common::geom::layer::{F_CU, LayerRange};
use pcb_common::geom::point::Point;
use pcb_common::util::config::ConnectivityConfig;
use rand::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const EDIT_ROUNDS: usize = 64;

/// Self-verification of the connectivity result on the given board. Runs a
/// full recompute and then proves the structural properties hold: the
/// clusters partition the items, touching items share a cluster, recomputing
/// changes nothing, and an incremental pass over random edits lands on the
/// same answer as a from-scratch rebuild.
pub fn run(board: &Board, config: &ConnectivityConfig) -> Result<(), String> {
    log::info!("Starting Connectivity Verification...");

    let mut engine = ConnectivityEngine::new(config.clone());
    engine
        .recalculate(board, true)
        .map_err(|e| e.to_string())?;

    let (structure_result, replay_result) = rayon::join(
        || {
            check_partition(&engine, board)
                .and_then(|_| check_touching_share_cluster(&engine, board))
        },
        || {
            check_idempotence(&engine, board, config)
                .and_then(|_| check_incremental_matches_full(board, config))
        },
    );

    let mut msgs = Vec::new();

    match structure_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Cluster Structure Invalid");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: Clusters partition the board."),
    }

    match replay_result {
        Err(e) => {
            log::error!("\x1b[31mFAIL\x1b[0m: Recompute Divergence Detected");
            log::error!("{}", e);
            msgs.push(e);
        }
        Ok(_) => log::info!("\x1b[32mPASS\x1b[0m: Recomputes are stable and order-independent."),
    }

    if msgs.is_empty() {
        log::info!("\x1b[32mSUCCESS\x1b[0m: VALID CONNECTIVITY");
        Ok(())
    } else {
        log::error!(
            "\x1b[31mFAILURE\x1b[0m: INVALID CONNECTIVITY ({} Errors)",
            msgs.len()
        );
        Err(msgs.join("; "))
    }
}

/// Every live board item belongs to exactly one cluster.
fn check_partition(engine: &ConnectivityEngine, board: &Board) -> Result<(), String> {
    let mut seen: HashMap<ItemId, usize> = HashMap::new();
    for cluster in engine.clusters() {
        for &member in &cluster.members {
            *seen.entry(member).or_insert(0) += 1;
        }
    }

    for (id, _) in board.items() {
        match seen.get(&id) {
            Some(1) => {}
            Some(n) => return Err(format!("{:?} appears in {} clusters", id, n)),
            None => return Err(format!("{:?} missing from every cluster", id)),
        }
    }
    if seen.len() != board.len() {
        return Err(format!(
            "clusters cover {} items, board has {}",
            seen.len(),
            board.len()
        ));
    }
    Ok(())
}

/// Physically touching items must have been merged.
fn check_touching_share_cluster(
    engine: &ConnectivityEngine,
    board: &Board,
) -> Result<(), String> {
    let ids: Vec<ItemId> = board.items().map(|(id, _)| id).collect();
    let error_found = AtomicBool::new(false);
    let error_msg = Arc::new(Mutex::new(String::new()));

    ids.par_iter().for_each(|&id| {
        if error_found.load(Ordering::Relaxed) {
            return;
        }
        let Some(rec) = engine.record(id) else { return };
        engine.query_touching(rec.bbox, rec.layers, |other| {
            if other > id {
                if let Some(other_rec) = engine.record(other) {
                    if rec.collides_with(other_rec)
                        && !engine.cluster_members(id).contains(&other)
                    {
                        let msg = format!("{:?} touches {:?} but clusters differ", id, other);
                        if !error_found.swap(true, Ordering::Relaxed) {
                            *error_msg.lock().unwrap() = msg;
                        }
                        return false;
                    }
                }
            }
            true
        });
    });

    if error_found.load(Ordering::Relaxed) {
        Err(error_msg.lock().unwrap().clone())
    } else {
        Ok(())
    }
}

/// A second engine over the same board must produce the same clusters and
/// net names.
fn check_idempotence(
    engine: &ConnectivityEngine,
    board: &Board,
    config: &ConnectivityConfig,
) -> Result<(), String> {
    let mut fresh = ConnectivityEngine::new(config.clone());
    fresh
        .recalculate(board, true)
        .map_err(|e| e.to_string())?;
    compare_signatures(engine, &fresh).map_err(|e| format!("rebuild diverged: {}", e))
}

/// Random edit burst resolved incrementally must match a from-scratch
/// rebuild of the edited board. Net codes can legitimately differ between
/// the two engines, so clusters compare by resolved net name.
fn check_incremental_matches_full(
    board: &Board,
    config: &ConnectivityConfig,
) -> Result<(), String> {
    let mut edited = board.clone();
    let mut incremental = ConnectivityEngine::new(config.clone());
    incremental
        .recalculate(&edited, true)
        .map_err(|e| e.to_string())?;

    let mut rng = StdRng::seed_from_u64(0x5EED);
    for round in 0..EDIT_ROUNDS {
        apply_random_edit(&mut edited, &mut incremental, &mut rng);
        // Batch a few edits per pass to exercise dirty-set coalescing.
        if round % 3 == 0 {
            incremental
                .recalculate(&edited, false)
                .map_err(|e| e.to_string())?;
        }
    }
    incremental
        .recalculate(&edited, false)
        .map_err(|e| e.to_string())?;

    let mut full = ConnectivityEngine::new(config.clone());
    full.recalculate(&edited, true)
        .map_err(|e| e.to_string())?;

    compare_signatures(&incremental, &full)
        .map_err(|e| format!("incremental pass diverged from full rebuild: {}", e))
}

fn apply_random_edit(board: &mut Board, engine: &mut ConnectivityEngine, rng: &mut StdRng) {
    let live: Vec<ItemId> = board.items().map(|(id, _)| id).collect();
    let op = rng.gen_range(0..4);

    match op {
        0 if !live.is_empty() => {
            let id = live[rng.gen_range(0..live.len())];
            let mut item = board.get(id).cloned().unwrap();
            let delta = Point::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
            translate(&mut item.geometry, delta);
            board.replace(id, item);
            engine.mark_moved(id);
        }
        1 if !live.is_empty() => {
            let id = live[rng.gen_range(0..live.len())];
            board.remove(id);
            engine.mark_removed(id);
        }
        _ => {
            let start = Point::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0));
            let end = start + Point::new(rng.gen_range(-8.0..8.0), rng.gen_range(-8.0..8.0));
            let net = match rng.gen_range(0..3) {
                0 => Some("GND".to_string()),
                1 => Some("VCC".to_string()),
                _ => None,
            };
            let id = board.add(BoardItem {
                geometry: ItemGeometry::Track {
                    start,
                    end,
                    width: 0.3,
                },
                layers: LayerRange::single(F_CU),
                net_name: net,
            });
            engine.mark_added(id);
        }
    }
}

fn translate(geometry: &mut ItemGeometry, delta: Point<f64>) {
    match geometry {
        ItemGeometry::Pad { center, .. }
        | ItemGeometry::Via { center, .. }
        | ItemGeometry::Arc { center, .. } => *center += delta,
        ItemGeometry::Track { start, end, .. } => {
            *start += delta;
            *end += delta;
        }
        ItemGeometry::Zone { outline } => {
            for p in outline.iter_mut() {
                *p += delta;
            }
        }
        ItemGeometry::Graphic(_) => {}
    }
}

/// Clusters as `(members, net name)` rows, sorted by smallest member.
fn signature(engine: &ConnectivityEngine) -> Vec<(Vec<ItemId>, Option<String>)> {
    let mut rows: Vec<(Vec<ItemId>, Option<String>)> = engine
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

fn compare_signatures(
    a: &ConnectivityEngine,
    b: &ConnectivityEngine,
) -> Result<(), String> {
    let sa = signature(a);
    let sb = signature(b);
    if sa.len() != sb.len() {
        return Err(format!("{} clusters vs {}", sa.len(), sb.len()));
    }
    for (ra, rb) in sa.iter().zip(sb.iter()) {
        if ra != rb {
            return Err(format!(
                "cluster {:?} net {:?} vs cluster {:?} net {:?}",
                ra.0, ra.1, rb.0, rb.1
            ));
        }
    }
    Ok(())
}
