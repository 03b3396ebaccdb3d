use crate::db::items::{Board, BoardItem, ItemGeometry};
use crate::geom::layer::{B_CU, F_CU, Layer, LayerRange, copper_stack};
use crate::geom::point::Point;
use crate::util::config::GeneratorConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PAD_SIZE: f64 = 1.2;
const TRACK_WIDTH: f64 = 0.3;
const VIA_DIAMETER: f64 = 0.8;

fn net_name(i: usize) -> String {
    match i {
        0 => "GND".to_string(),
        1 => "VCC".to_string(),
        n => format!("NET{}", n),
    }
}

/// Builds a reproducible random board: pads on named nets, a fraction of the
/// pad pairs routed with L-shaped track runs (through vias where the layers
/// differ), plus a few zones. Unrouted pairs leave work for the ratsnest.
pub fn generate_random_board(cfg: &GeneratorConfig) -> Board {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut board = Board::new();
    let stack = copper_stack(cfg.copper_layers.clamp(2, 32));
    let size = cfg.board_size.max(20.0);

    let mut num_tracks = 0usize;
    let mut num_vias = 0usize;

    for n in 0..cfg.nets {
        let name = net_name(n);
        let mut pads: Vec<(Point<f64>, LayerRange)> = Vec::with_capacity(cfg.pads_per_net);

        for _ in 0..cfg.pads_per_net {
            let center = Point::new(
                rng.gen_range(5.0..size - 5.0),
                rng.gen_range(5.0..size - 5.0),
            );
            let through = rng.gen_bool(cfg.through_hole_fraction.clamp(0.0, 1.0));
            let layers = if through {
                LayerRange::ALL_COPPER
            } else if rng.gen_bool(0.5) {
                LayerRange::single(F_CU)
            } else {
                LayerRange::single(B_CU)
            };

            board.add(BoardItem {
                geometry: ItemGeometry::Pad {
                    center,
                    size: Point::new(PAD_SIZE, PAD_SIZE),
                    round: through,
                },
                layers,
                net_name: Some(name.clone()),
            });
            pads.push((center, layers));
        }

        for i in 1..pads.len() {
            if !rng.gen_bool(cfg.routed_fraction.clamp(0.0, 1.0)) {
                continue;
            }
            let (a, la) = pads[i - 1];
            let (b, lb) = pads[i];
            let corner = Point::new(a.x, b.y);

            let (layer_a, layer_b) = if la.overlaps(&lb) {
                let shared = Layer(la.start.0.max(lb.start.0));
                (shared, shared)
            } else {
                (la.start, lb.start)
            };

            board.add(BoardItem {
                geometry: ItemGeometry::Track {
                    start: a,
                    end: corner,
                    width: TRACK_WIDTH,
                },
                layers: LayerRange::single(layer_a),
                net_name: Some(name.clone()),
            });
            board.add(BoardItem {
                geometry: ItemGeometry::Track {
                    start: corner,
                    end: b,
                    width: TRACK_WIDTH,
                },
                layers: LayerRange::single(layer_b),
                net_name: Some(name.clone()),
            });
            num_tracks += 2;

            if layer_a != layer_b {
                board.add(BoardItem {
                    geometry: ItemGeometry::Via {
                        center: corner,
                        diameter: VIA_DIAMETER,
                    },
                    layers: LayerRange::ALL_COPPER,
                    net_name: Some(name.clone()),
                });
                num_vias += 1;
            }
        }
    }

    for n in 0..cfg.zone_nets.min(cfg.nets) {
        let w = rng.gen_range(10.0..size * 0.4);
        let h = rng.gen_range(10.0..size * 0.4);
        let x = rng.gen_range(0.0..size - w);
        let y = rng.gen_range(0.0..size - h);
        let layer = stack[n % stack.len()];

        board.add(BoardItem {
            geometry: ItemGeometry::Zone {
                outline: vec![
                    Point::new(x, y),
                    Point::new(x + w, y),
                    Point::new(x + w, y + h),
                    Point::new(x, y + h),
                ],
            },
            layers: LayerRange::single(layer),
            net_name: Some(net_name(n)),
        });
    }

    log::info!(
        "Generated board: {} nets, {} pads, {} tracks, {} vias, {} zones ({}x{}mm, {} copper layers, seed {})",
        cfg.nets,
        cfg.nets * cfg.pads_per_net,
        num_tracks,
        num_vias,
        cfg.zone_nets.min(cfg.nets),
        size,
        size,
        stack.len(),
        cfg.seed
    );

    board
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::GeneratorConfig;

    #[test]
    fn same_seed_same_board() {
        let cfg = GeneratorConfig::default();
        let a = generate_random_board(&cfg);
        let b = generate_random_board(&cfg);
        assert_eq!(a.len(), b.len());

        for ((_, ia), (_, ib)) in a.items().zip(b.items()) {
            assert_eq!(ia.net_name, ib.net_name);
            assert_eq!(ia.layers, ib.layers);
            assert_eq!(ia.kind(), ib.kind());
        }
    }

    #[test]
    fn tracks_land_on_pad_centers() {
        let cfg = GeneratorConfig {
            nets: 4,
            pads_per_net: 3,
            routed_fraction: 1.0,
            ..GeneratorConfig::default()
        };
        let board = generate_random_board(&cfg);
        assert!(board.len() > cfg.nets * cfg.pads_per_net);
    }
}
