//! cellgraph command-line driver.
//!
//! Builds a small demo graph on the cellgraph engine, evaluates it and prints
//! the computed values, fingerprints and engine statistics as JSON on stdout.
//! Image tiles are evaluated in parallel on a rayon pool sharing one engine.
//! Every run also makes one edit and reports the cells it dirtied, so
//! invalidation can be inspected by hand.
//!
//! Logging goes to stderr and follows `RUST_LOG`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde_json::{json, Value as Json};
use tracing_subscriber::EnvFilter;

use cellgraph_core::{Box2i, Context, Format, V2i};
use cellgraph_engine::{dirty_set, Engine, EngineConfig, EngineError};
use cellgraph_image::{connect_image, tile_origins, Constant, Reformat, ReformatMode, RenderManOptions};

/// Lazy dataflow graph evaluator.
#[derive(Parser)]
#[command(name = "cellgraph", about = "Lazy dataflow graph evaluator")]
struct Cli {
    /// JSON engine configuration file (default: CELLGRAPH_* environment variables).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the number of memoized values kept.
    #[arg(long, global = true)]
    memo_capacity: Option<usize>,

    /// Worker threads for tile evaluation (default: one per core).
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Reformat a constant image and evaluate every output tile.
    Reformat {
        #[arg(long, default_value_t = 1920)]
        in_width: i32,

        #[arg(long, default_value_t = 1080)]
        in_height: i32,

        #[arg(long, default_value_t = 1280)]
        out_width: i32,

        #[arg(long, default_value_t = 720)]
        out_height: i32,

        #[arg(long, value_enum, default_value_t = Mode::Width)]
        mode: Mode,

        /// Offset the scale origin by minus half the input data window along
        /// the axis not driving the scale (none in distort mode).
        #[arg(long)]
        center: bool,

        /// Fill value of the constant source.
        #[arg(long, default_value_t = 0.5)]
        value: f32,
    },

    /// Layer renderer search paths onto an empty globals map.
    Options {
        /// Search path to enable, as NAME=PATH (e.g. shader=/opt/shaders).
        #[arg(long = "set", value_name = "NAME=PATH")]
        settings: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Width,
    Height,
    Fit,
    Fill,
    Distort,
}

impl From<Mode> for ReformatMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Width => ReformatMode::Width,
            Mode::Height => ReformatMode::Height,
            Mode::Fit => ReformatMode::Fit,
            Mode::Fill => ReformatMode::Fill,
            Mode::Distort => ReformatMode::Distort,
        }
    }
}

struct ReformatArgs {
    input: Format,
    output: Format,
    mode: ReformatMode,
    center: bool,
    value: f32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let engine = match build_engine(&cli) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    // 0 lets rayon pick one thread per core.
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads.unwrap_or(0))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Error: failed to start worker pool: {}", e);
            process::exit(2);
        }
    };

    let result = match cli.command {
        Commands::Reformat {
            in_width,
            in_height,
            out_width,
            out_height,
            mode,
            center,
            value,
        } => run_reformat(
            &engine,
            &pool,
            ReformatArgs {
                input: Format::new(in_width, in_height),
                output: Format::new(out_width, out_height),
                mode: mode.into(),
                center,
                value,
            },
        ),
        Commands::Options { settings } => run_options(&engine, &settings),
    };

    let exit_code = match result {
        Ok(report) => {
            let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize report: {}\"}}", e)
            });
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    };
    process::exit(exit_code);
}

/// Exit code for a failed run: 2 = configuration error, 1 = evaluation error.
fn exit_code(err: &EngineError) -> i32 {
    match err {
        EngineError::Config { .. } => 2,
        _ => 1,
    }
}

/// Loads the engine config from `--config` or the environment, then applies
/// command-line overrides.
fn build_engine(cli: &Cli) -> Result<Engine, EngineError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::from_env()?,
    };
    if let Some(capacity) = cli.memo_capacity {
        config.memo_capacity = capacity;
    }
    tracing::info!(
        "engine config: memo_capacity={} cache_policy={:?} hash_cache_limit={}",
        config.memo_capacity,
        config.cache_policy,
        config.hash_cache_limit
    );
    Engine::new(config)
}

/// Execute the reformat subcommand.
fn run_reformat(engine: &Engine, pool: &ThreadPool, args: ReformatArgs) -> Result<Json, EngineError> {
    let constant = engine.add_node("constant", Constant::build);
    let reformat = engine.add_node("reformat", Reformat::build);
    connect_image(engine, &constant.out, &reformat.input)?;
    engine.set_value(constant.format, args.input)?;
    engine.set_value(constant.value, args.value)?;
    engine.set_value(reformat.format, args.output)?;
    engine.set_value(reformat.mode, args.mode.as_i32())?;
    engine.set_value(reformat.center_enabled, args.center)?;

    let ctx = Context::new();
    let geometry = json!({
        "scale": [engine.get(reformat.scale_x, &ctx)?, engine.get(reformat.scale_y, &ctx)?],
        "origin": [engine.get(reformat.origin_x, &ctx)?, engine.get(reformat.origin_y, &ctx)?],
        "format": engine.get(reformat.out.format, &ctx)?,
        "data_window": engine.get(reformat.out.data_window, &ctx)?,
        "data_window_fingerprint": engine.hash(reformat.out.data_window, &ctx)?.to_hex(),
    });

    let window = engine.get(reformat.out.data_window, &ctx)?;
    let tiles = evaluate_tiles(engine, pool, &reformat, &window)?;
    let first_pass = engine.stats();

    // Changing the fill value dirties pixel data only; geometry stays memoized.
    let dirtied: Vec<String> = dirty_set(&engine.snapshot(), constant.value.cell())?
        .into_iter()
        .map(|cell| engine.cell_name(cell))
        .collect();
    engine.set_value(constant.value, args.value + 1.0)?;
    engine.reset_stats();
    engine.get(reformat.out.data_window, &ctx)?;
    let retiled = evaluate_tiles(engine, pool, &reformat, &window)?;

    Ok(json!({
        "geometry": geometry,
        "tiles": tiles,
        "stats": first_pass,
        "edit": {
            "cell": engine.cell_name(constant.value),
            "dirtied": dirtied,
            "tiles": retiled,
            "stats": engine.stats(),
        },
    }))
}

/// Evaluates `reformat.out.channelData` for every channel and tile of
/// `window` on `pool`, summarized per channel.
fn evaluate_tiles(
    engine: &Engine,
    pool: &ThreadPool,
    reformat: &Reformat,
    window: &Box2i,
) -> Result<Json, EngineError> {
    let channels = engine.get(reformat.out.channel_names, &Context::new())?;
    let origins = tile_origins(window);
    let requests: Vec<(&str, V2i)> = channels
        .iter()
        .flat_map(|channel| origins.iter().map(move |&origin| (channel.as_str(), origin)))
        .collect();
    tracing::debug!("evaluating {} tiles on {} threads", requests.len(), pool.current_num_threads());

    let results: Vec<(&str, String, f32)> = pool.install(|| {
        requests
            .par_iter()
            .map(|&(channel, origin)| {
                let ctx = Context::tile(channel, origin);
                let fingerprint = engine.hash(reformat.out.channel_data, &ctx)?;
                let tile = engine.get(reformat.out.channel_data, &ctx)?;
                let sample = tile.first().copied().unwrap_or_default();
                Ok((channel, fingerprint.to_hex(), sample))
            })
            .collect::<Result<_, EngineError>>()
    })?;

    let mut summary: BTreeMap<&str, (usize, BTreeSet<String>, f32)> = BTreeMap::new();
    for (channel, fingerprint, sample) in results {
        let entry = summary
            .entry(channel)
            .or_insert_with(|| (0, BTreeSet::new(), sample));
        entry.0 += 1;
        entry.1.insert(fingerprint);
    }
    Ok(summary
        .into_iter()
        .map(|(channel, (count, fingerprints, sample))| {
            (
                channel.to_string(),
                json!({
                    "tiles": count,
                    "fingerprints": fingerprints,
                    "sample": sample,
                }),
            )
        })
        .collect::<serde_json::Map<_, _>>()
        .into())
}

/// Execute the options subcommand.
fn run_options(engine: &Engine, settings: &[String]) -> Result<Json, EngineError> {
    let options = engine.add_node("options", RenderManOptions::build);
    let ctx = Context::new();
    let upstream = engine.hash(options.input, &ctx)?;

    for setting in settings {
        let (name, path) = setting.split_once('=').ok_or_else(|| EngineError::Config {
            reason: format!("expected NAME=PATH, got '{}'", setting),
        })?;
        let option = format!("ri:searchpath:{}", name);
        let member = *options.member(&option).ok_or_else(|| EngineError::Config {
            reason: format!("unknown search path '{}'", name),
        })?;
        let dirtied = dirty_set(&engine.snapshot(), member.enabled.cell())?;
        tracing::debug!("{} dirties {} cells", option, dirtied.len());
        engine.set_value(member.enabled, true)?;
        engine.set_value(member.value, path.to_string())?;
    }

    let globals = engine.get(options.out, &ctx)?;
    let fingerprint = engine.hash(options.out, &ctx)?;
    Ok(json!({
        "globals": &*globals,
        "fingerprint": fingerprint.to_hex(),
        "passes_through": fingerprint == upstream,
        "stats": engine.stats(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    fn pool() -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "cellgraph",
            "reformat",
            "--mode",
            "fit",
            "--center",
            "--memo-capacity",
            "16",
            "--threads",
            "2",
        ]);
        assert_eq!(cli.memo_capacity, Some(16));
        assert_eq!(cli.threads, Some(2));
        assert!(matches!(
            cli.command,
            Commands::Reformat {
                mode: Mode::Fit,
                center: true,
                ..
            }
        ));
    }

    #[test]
    fn test_center_help_describes_data_window_offset() {
        use clap::CommandFactory;

        let mut cli = Cli::command();
        let reformat = cli.find_subcommand_mut("reformat").unwrap();
        let center = reformat
            .get_arguments()
            .find(|arg| arg.get_id() == "center")
            .unwrap();
        let help = center.get_help().unwrap().to_string();
        assert!(help.contains("input data window"));
        assert!(!help.contains("target format"));
    }

    #[test]
    fn test_exit_codes() {
        let config = EngineError::Config {
            reason: "bad".into(),
        };
        assert_eq!(exit_code(&config), 2);
        assert_eq!(exit_code(&EngineError::Cancelled), 1);
    }

    #[test]
    fn test_zero_memo_capacity_is_config_error() {
        let cli = Cli::parse_from(["cellgraph", "--memo-capacity", "0", "options"]);
        let err = build_engine(&cli).err().unwrap();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_reformat_report() {
        let report = run_reformat(
            &engine(),
            &pool(),
            ReformatArgs {
                input: Format::new(128, 64),
                output: Format::new(64, 32),
                mode: ReformatMode::Width,
                center: false,
                value: 0.5,
            },
        )
        .unwrap();

        assert_eq!(report["geometry"]["scale"], json!([0.5, 0.5]));
        // 64x32 output data window is a single tile per channel.
        assert_eq!(report["tiles"]["R"]["tiles"], 1);
        assert_eq!(report["tiles"]["A"]["sample"], 0.5);
        assert_eq!(report["edit"]["tiles"]["A"]["sample"], 1.5);
        assert_eq!(report["edit"]["dirtied"][0], "constant.value");
        // Only pixel data recomputes after the edit: one source tile and one
        // scaled tile per channel.
        assert_eq!(report["edit"]["stats"]["computes"], 8);
        assert_eq!(report["geometry"]["data_window"]["max"], json!({"x": 64, "y": 32}));
    }

    #[test]
    fn test_options_report() {
        let report = run_options(&engine(), &["shader=/opt/shaders".to_string()]).unwrap();
        assert_eq!(
            report["globals"]["option:ri:searchpath:shader"],
            "/opt/shaders"
        );
        assert_eq!(report["passes_through"], false);

        let report = run_options(&engine(), &[]).unwrap();
        assert_eq!(report["passes_through"], true);

        let err = run_options(&engine(), &["bogus=/x".to_string()]).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }
}
