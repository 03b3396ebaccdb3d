use clap::{Parser, Subcommand};
use pcb_common::db::items::{BoardItem, ItemGeometry};
use pcb_common::geom::layer::{F_CU, LayerRange};
use pcb_common::geom::point::Point;
use pcb_common::util::config::Config;
use pcb_common::util::{generator, logger, viz};
use pcb_connectivity::{ConnectivityEngine, LogProgress, check};
use rand::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a board, compute connectivity, print the net report.
    Report,
    /// Run the self-verification suite against a generated board.
    Check,
    /// Compare full rebuild cost against an incremental edit stream.
    Bench {
        #[arg(long, default_value_t = 200)]
        edits: usize,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Report);

    match command {
        Commands::Report => run_report(&config)?,
        Commands::Check => {
            let board = generator::generate_random_board(&config.generator);
            if check::run(&board, &config.connectivity).is_err() {
                std::process::exit(1);
            }
        }
        Commands::Bench { edits } => run_bench(&config, edits)?,
    }

    Ok(())
}

fn run_report(config: &Config) -> anyhow::Result<()> {
    let board = generator::generate_random_board(&config.generator);

    let mut engine = ConnectivityEngine::new(config.connectivity.clone());
    engine
        .recalculate_with(&board, true, &LogProgress::default())
        .map_err(|e| anyhow::anyhow!(e))?;

    log::info!(
        "Connectivity: {} items, {} clusters, {} nets",
        engine.item_count(),
        engine.cluster_count(),
        engine.nets_in_use().len()
    );

    for code in engine.nets_in_use() {
        let name = engine.net_name(code).unwrap_or("?");
        let clusters = engine.clusters().filter(|c| c.net_code == code).count();
        let airwires = engine.ratsnest(code);
        let unrouted: f64 = airwires.iter().map(|e| e.length).sum();
        if airwires.is_empty() {
            log::info!("  {:<12} {} cluster(s), fully routed", name, clusters);
        } else {
            log::info!(
                "  {:<12} {} cluster(s), {} airwire(s), {:.2}mm unrouted",
                name,
                clusters,
                airwires.len(),
                unrouted
            );
        }
    }

    for conflict in engine.conflicts() {
        let names: Vec<&str> = conflict
            .candidates
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        log::warn!(
            "Net conflict near {:?}: {} shorted together, resolved as '{}'",
            conflict.anchor,
            names.join(" / "),
            conflict.resolved
        );
    }

    for id in engine.invalid_shapes() {
        log::warn!("{:?} has invalid geometry and was isolated", id);
    }

    prepare_output_dir(&config.output.png_file)?;
    let airwires: Vec<(Point<f64>, Point<f64>)> = engine
        .all_ratsnest()
        .filter_map(|e| {
            let a = engine.record(e.a)?.anchor?;
            let b = engine.record(e.b)?.anchor?;
            Some((a, b))
        })
        .collect();
    log::info!("Writing visualization to {}", config.output.png_file);
    viz::draw_board(&board, &airwires, &config.output.png_file, config.output.png_size);

    Ok(())
}

fn run_bench(config: &Config, edits: usize) -> anyhow::Result<()> {
    let mut board = generator::generate_random_board(&config.generator);

    let mut engine = ConnectivityEngine::new(config.connectivity.clone());
    let start = Instant::now();
    engine
        .recalculate(&board, true)
        .map_err(|e| anyhow::anyhow!(e))?;
    let full_time = start.elapsed();
    log::info!(
        "Full rebuild: {} items in {:?}",
        engine.item_count(),
        full_time
    );

    let mut rng = StdRng::seed_from_u64(config.generator.seed);
    let size = config.generator.board_size;
    let start = Instant::now();
    for _ in 0..edits {
        let live: Vec<_> = board.items().map(|(id, _)| id).collect();
        match rng.gen_range(0..3) {
            0 if !live.is_empty() => {
                let id = live[rng.gen_range(0..live.len())];
                board.remove(id);
                engine.mark_removed(id);
            }
            1 if !live.is_empty() => {
                let id = live[rng.gen_range(0..live.len())];
                let mut item = board.get(id).cloned().unwrap();
                nudge(&mut item, &mut rng);
                board.replace(id, item);
                engine.mark_moved(id);
            }
            _ => {
                let x = rng.gen_range(0.0..size);
                let y = rng.gen_range(0.0..size);
                let id = board.add(BoardItem {
                    geometry: ItemGeometry::Track {
                        start: Point::new(x, y),
                        end: Point::new(x + 3.0, y),
                        width: 0.3,
                    },
                    layers: LayerRange::single(F_CU),
                    net_name: None,
                });
                engine.mark_added(id);
            }
        }
        engine
            .recalculate(&board, false)
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    let incr_time = start.elapsed();
    log::info!(
        "{} incremental edits in {:?} ({:?}/edit)",
        edits,
        incr_time,
        incr_time / edits.max(1) as u32
    );

    Ok(())
}

fn nudge(item: &mut BoardItem, rng: &mut StdRng) {
    let delta = Point::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
    match &mut item.geometry {
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

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            log::info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
