//! void CLI
//!
//! Command-line front-end for the void memory manager.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use void_core::{EventKind, ManagerConfig, MemoryManager};
use void_probe::{AnomalyThresholds, DriveConfig};

/// Baseline memories seeded into a fresh store so probe/telemetry commands
/// have something to drive when no snapshot exists yet.
const SEED_MEMORY: &[(&str, &str)] = &[
    (
        "telemetry-alpha",
        "Baseline trace describing vacuum resonance calibration and reward decay.",
    ),
    (
        "telemetry-beta",
        "Queue management protocol for asynchronous reinforcement batches.",
    ),
    (
        "telemetry-gamma",
        "Centroid drift notebook logging territory churn thresholds and splits.",
    ),
    (
        "telemetry-delta",
        "Condensation heuristics for semantic clustering during focus recovery.",
    ),
];

/// void - Void Dynamics memory manager CLI
#[derive(Parser)]
#[command(name = "void")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the void self-organising memory manager")]
struct Cli {
    /// Snapshot file the command reads its working state from and, for
    /// mutating commands, writes it back to.
    #[arg(long, global = true, default_value = "void-snapshot.json")]
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a chunk, or a batch of chunks from a JSON file
    Register {
        /// Memory id (omit when using --file)
        id: Option<String>,
        /// Memory text (omit when using --file)
        text: Option<String>,
        /// Load a batch of chunks from a JSON file shaped
        /// `{"ids": [...], "texts": [...], "embeddings": [...]}`
        #[arg(long, conflicts_with_all = ["id", "text"])]
        file: Option<PathBuf>,
        /// Comma-separated embedding vector for a single chunk
        #[arg(long, requires = "id")]
        embedding: Option<String>,
    },

    /// Reinforce a batch of ids at given distances
    Reinforce {
        /// Comma-separated ids
        ids: String,
        /// Comma-separated distances, one per id
        distances: String,
        #[arg(long, default_value_t = 0.8)]
        heat_gain: f64,
        #[arg(long, default_value_t = 180)]
        ttl_boost: i64,
    },

    /// Degrade a batch of ids
    Degrade {
        /// Comma-separated ids
        ids: String,
        #[arg(long, default_value_t = 30)]
        ttl_floor: i64,
    },

    /// Register a pre-condensed engram over existing members
    Engram {
        /// Id for the new engram
        summary_id: String,
        /// Comma-separated member ids
        members: String,
        /// Engram summary text
        text: String,
    },

    /// Show the top-k traces by composite score
    Top {
        #[arg(default_value_t = 10)]
        k: usize,
    },

    /// Show aggregate manager stats
    Stats,

    /// Show recorded events
    Events {
        /// Inspect without draining the event log
        #[arg(long)]
        peek: bool,
        /// When peeking, how many of the oldest events to show
        #[arg(long, default_value_t = 1024)]
        limit: usize,
    },

    /// Snapshot management
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Telemetry probe
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// Write the working snapshot out to another path
    Save {
        output: PathBuf,
    },
    /// Load a snapshot from another path and make it the working snapshot
    Load {
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum TelemetryCommands {
    /// Drive the manager through synthetic reinforcement windows and report
    Run {
        #[arg(long, default_value = "reports/void-telemetry-latest.json")]
        output: PathBuf,
        #[arg(long, default_value = "reports/void-telemetry-latest.md")]
        markdown: PathBuf,
        #[arg(long, default_value_t = 24)]
        iterations: usize,
        #[arg(long, default_value_t = 4)]
        batch_size: usize,
        #[arg(long, default_value_t = 6)]
        degrade_interval: usize,
        #[arg(long, default_value_t = 24)]
        ttl_floor: i64,
        #[arg(long, default_value_t = 1.0)]
        heat_gain: f64,
        #[arg(long, default_value_t = 120)]
        ttl_boost: i64,
        #[arg(long)]
        reward_floor: Option<f64>,
        #[arg(long)]
        max_avg_heat_delta: Option<f64>,
        #[arg(long)]
        max_heat: Option<f64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Register { id, text, file, embedding } => {
            run_register(&cli.snapshot, id, text, file, embedding)
        }
        Commands::Reinforce { ids, distances, heat_gain, ttl_boost } => {
            run_reinforce(&cli.snapshot, &ids, &distances, heat_gain, ttl_boost)
        }
        Commands::Degrade { ids, ttl_floor } => run_degrade(&cli.snapshot, &ids, ttl_floor),
        Commands::Engram { summary_id, members, text } => {
            run_engram(&cli.snapshot, &summary_id, &members, &text)
        }
        Commands::Top { k } => run_top(&cli.snapshot, k),
        Commands::Stats => run_stats(&cli.snapshot),
        Commands::Events { peek, limit } => run_events(&cli.snapshot, peek, limit),
        Commands::Snapshot { command } => match command {
            SnapshotCommands::Save { output } => run_snapshot_save(&cli.snapshot, &output),
            SnapshotCommands::Load { input } => run_snapshot_load(&cli.snapshot, &input),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Run {
                output,
                markdown,
                iterations,
                batch_size,
                degrade_interval,
                ttl_floor,
                heat_gain,
                ttl_boost,
                reward_floor,
                max_avg_heat_delta,
                max_heat,
            } => run_telemetry(
                &cli.snapshot,
                &output,
                &markdown,
                iterations,
                batch_size,
                degrade_interval,
                ttl_floor,
                heat_gain,
                ttl_boost,
                reward_floor,
                max_avg_heat_delta,
                max_heat,
            ),
        },
    }
}

/// The config used for a freshly-created store when no snapshot exists yet.
fn default_config() -> ManagerConfig {
    ManagerConfig {
        capacity: 64,
        base_ttl: 120,
        decay_half_life: 16,
        prune_sample: 32,
        prune_target_ratio: 0.25,
        seed: Some(19),
        diffusion_interval: 12,
        condensation_boredom: 0.25,
        condensation_conf: 0.4,
        condensation_mass: 1.5,
        ..ManagerConfig::default()
    }
}

fn load_or_new(path: &Path) -> anyhow::Result<MemoryManager> {
    if path.exists() {
        MemoryManager::load_json(path).with_context(|| format!("loading snapshot from {}", path.display()))
    } else {
        MemoryManager::new(default_config()).map_err(|e| anyhow::anyhow!("{e}"))
    }
}

fn save(manager: &MemoryManager, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    manager
        .save_json(path)
        .with_context(|| format!("saving snapshot to {}", path.display()))
}

/// Ensure a fresh store has something to probe/report on.
fn bootstrap_if_empty(manager: &MemoryManager) {
    if manager.stats().count > 0 {
        return;
    }
    let ids: Vec<String> = SEED_MEMORY.iter().map(|(id, _)| id.to_string()).collect();
    let texts: Vec<String> = SEED_MEMORY.iter().map(|(_, text)| text.to_string()).collect();
    let _ = manager.register_chunks(&ids, &texts, None, None);
}

fn parse_csv(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

fn parse_csv_f64(s: &str) -> anyhow::Result<Vec<f64>> {
    s.split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().with_context(|| format!("parsing distance '{p}'")))
        .collect()
}

fn run_register(
    snapshot: &Path,
    id: Option<String>,
    text: Option<String>,
    file: Option<PathBuf>,
    embedding: Option<String>,
) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;

    if let Some(file) = file {
        #[derive(serde::Deserialize)]
        struct Batch {
            ids: Vec<String>,
            texts: Vec<String>,
            #[serde(default)]
            embeddings: Option<Vec<Option<Vec<f64>>>>,
        }
        let content = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
        let batch: Batch = serde_json::from_str(&content)?;
        manager
            .register_chunks(&batch.ids, &batch.texts, batch.embeddings.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("{} {} chunks registered", "OK".green().bold(), batch.ids.len());
    } else {
        let id = id.context("id is required unless --file is given")?;
        let text = text.context("text is required unless --file is given")?;
        let embedding: Option<Vec<f64>> = match embedding {
            Some(raw) => Some(parse_csv_f64(&raw)?),
            None => None,
        };
        let embeddings = embedding.map(|e| vec![Some(e)]);
        manager
            .register_chunks(&[id.clone()], &[text], embeddings.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("{} registered {}", "OK".green().bold(), id);
    }

    save(&manager, snapshot)
}

fn run_reinforce(
    snapshot: &Path,
    ids: &str,
    distances: &str,
    heat_gain: f64,
    ttl_boost: i64,
) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    let ids = parse_csv(ids);
    let distances = parse_csv_f64(distances)?;
    manager
        .reinforce(&[ids.clone()], &[distances], heat_gain, ttl_boost)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{} reinforced {} ids", "OK".green().bold(), ids.len());
    save(&manager, snapshot)
}

fn run_degrade(snapshot: &Path, ids: &str, ttl_floor: i64) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    let ids = parse_csv(ids);
    manager.degrade(&ids, ttl_floor).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{} degraded {} ids", "OK".green().bold(), ids.len());
    save(&manager, snapshot)
}

fn run_engram(snapshot: &Path, summary_id: &str, members: &str, text: &str) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    let members = parse_csv(members);
    let created = manager.register_engram(summary_id, &members, text);
    if created {
        println!("{} engram {} over {} members", "OK".green().bold(), summary_id, members.len());
    } else {
        println!(
            "{} engram {} not created: fewer than two members survive",
            "SKIP".yellow().bold(),
            summary_id
        );
    }
    save(&manager, snapshot)
}

fn run_top(snapshot: &Path, k: usize) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    let top = manager.top(k);
    println!("{}", format!("=== Top {} ===", top.len()).cyan().bold());
    for (rank, (id, score)) in top.iter().enumerate() {
        println!("  {:>3}. {:<24} {:.4}", rank + 1, id, score);
    }
    Ok(())
}

fn run_stats(snapshot: &Path) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    let stats = manager.stats();
    println!("{}", "=== void stats ===".cyan().bold());
    println!("{}: {}", "tick".white().bold(), stats.tick);
    println!("{}: {}", "count".white().bold(), stats.count);
    println!("{}: {}", "territories".white().bold(), stats.territory_count);
    println!("{}: {:.4}", "reward_ema".white().bold(), stats.reward_ema);
    println!("{}: {}", "frontier_size".white().bold(), stats.frontier_size);
    println!("{}: {}", "pending_condense".white().bold(), stats.pending_condense);
    println!("{}: {:.4}", "average_heat".white().bold(), stats.average_heat);
    println!("{}: {:.4}", "avg_confidence".white().bold(), stats.avg_confidence);
    println!("{}: {:.4}", "avg_novelty".white().bold(), stats.avg_novelty);
    println!("{}: {:.4}", "avg_boredom".white().bold(), stats.avg_boredom);
    println!("{}: {:.4}", "avg_mass".white().bold(), stats.avg_mass);
    println!("{}: {}", "max_territory_span".white().bold(), stats.max_territory_span);
    Ok(())
}

fn run_events(snapshot: &Path, peek: bool, limit: usize) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    let events = if peek { manager.peek_events(limit) } else { manager.consume_events() };
    println!("{}", format!("=== {} events ===", events.len()).cyan().bold());
    for event in &events {
        let label = match &event.kind {
            EventKind::Register { id, territory } => format!("register {id} territory={territory:?}"),
            EventKind::Reinforce { count } => format!("reinforce x{count}"),
            EventKind::Degrade { count } => format!("degrade x{count}"),
            EventKind::Engram { id, members } => format!("engram {id} members={}", members.len()),
            EventKind::Evict { id } => format!("evict {id}"),
            EventKind::Prune { count } => format!("prune x{count}"),
            EventKind::TerritoryCreate { id } => format!("territory_create {id}"),
            EventKind::TerritoryMerge { from, to } => format!("territory_merge {from}->{to}"),
            EventKind::TerritorySplit { from, to, count } => {
                format!("territory_split {from}->{to} x{count}")
            }
        };
        println!("  [{}] {}", event.tick, label);
    }
    Ok(())
}

fn run_snapshot_save(snapshot: &Path, output: &Path) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    save(&manager, output)?;
    println!("{} snapshot saved to {}", "OK".green().bold(), output.display());
    Ok(())
}

fn run_snapshot_load(snapshot: &Path, input: &Path) -> anyhow::Result<()> {
    let manager = MemoryManager::load_json(input).with_context(|| format!("loading {}", input.display()))?;
    save(&manager, snapshot)?;
    println!(
        "{} loaded {} ({} traces) as working snapshot {}",
        "OK".green().bold(),
        input.display(),
        manager.stats().count,
        snapshot.display()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_telemetry(
    snapshot: &Path,
    output: &Path,
    markdown: &Path,
    iterations: usize,
    batch_size: usize,
    degrade_interval: usize,
    ttl_floor: i64,
    heat_gain: f64,
    ttl_boost: i64,
    reward_floor: Option<f64>,
    max_avg_heat_delta: Option<f64>,
    max_heat: Option<f64>,
) -> anyhow::Result<()> {
    let manager = load_or_new(snapshot)?;
    bootstrap_if_empty(&manager);

    let ids: Vec<String> = manager
        .top(manager.stats().count.max(1))
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    let drive_config = DriveConfig {
        iterations,
        batch_size: batch_size.max(1),
        degrade_interval,
        heat_gain,
        ttl_boost,
        ttl_floor,
    };
    let run = void_probe::drive_manager_for_telemetry(&manager, &ids, &drive_config);

    let default_thresholds = AnomalyThresholds::default();
    let thresholds = AnomalyThresholds {
        min_reward_ema: reward_floor.unwrap_or(default_thresholds.min_reward_ema),
        max_avg_heat_delta: max_avg_heat_delta.unwrap_or(default_thresholds.max_avg_heat_delta),
        max_heat: max_heat.unwrap_or(default_thresholds.max_heat),
    };

    let totals = void_probe::tally_events(&run.events);
    let report = void_probe::generate_report(&run.samples, totals, &thresholds);

    void_probe::ensure_reports_directory(output.parent().unwrap_or_else(|| Path::new(".")))?;
    void_probe::ensure_reports_directory(markdown.parent().unwrap_or_else(|| Path::new(".")))?;
    std::fs::write(output, void_probe::render_json_report(&report)?)?;
    std::fs::write(markdown, void_probe::render_markdown_report(&report))?;

    save(&manager, snapshot)?;

    println!("{}", "=== void telemetry ===".cyan().bold());
    println!("{}: {}", "status".white().bold(), report.status);
    println!("{}: {:.4}", "heat_trend".white().bold(), report.heat_trend);
    println!("{}: {:.4}", "final_reward_ema".white().bold(), report.final_reward_ema);
    println!("{}: {}", "report".white().bold(), output.display());
    println!("{}: {}", "markdown".white().bold(), markdown.display());

    if !report.anomalies.is_empty() {
        eprintln!();
        eprintln!("{}", "Detected telemetry anomalies during probe:".red().bold());
        for anomaly in &report.anomalies {
            eprintln!(
                "- [{:?}] {} at window {}: {}",
                anomaly.severity, anomaly.metric, anomaly.window, anomaly.detail
            );
        }
        std::process::exit(2);
    }

    Ok(())
}
