// Volleyscope command-line entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, so stdout stays clean for report output)
// 2. Ensure config files exist and load config
// 3. Load the player dataset
// 4. Run the requested subcommand

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use volleyscope_core::archetype::ArchetypeRules;
use volleyscope_core::config::{self, Config};
use volleyscope_core::dataset;
use volleyscope_core::features::FeatureScheme;
use volleyscope_core::model::Player;
use volleyscope_core::report::{build_season_report, ReportOptions, SeasonReport};
use volleyscope_core::similarity::Neighbor;

#[derive(Parser)]
#[command(name = "volleyscope")]
#[command(about = "Season profiles, archetypes and look-alikes for volleyball players", long_about = None)]
struct Cli {
    /// Project directory containing config/ and defaults/ (defaults to cwd)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Player data JSON file (overrides data_paths.players)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the season report: projections and archetypes for every qualifying player
    Report {
        #[command(flatten)]
        pool: PoolArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Most and least similar players to one player
    Similar {
        #[command(flatten)]
        pool: PoolArgs,

        /// Player id to compare against
        #[arg(long, required_unless_present = "row", conflicts_with = "row")]
        player: Option<u64>,

        /// Row position in the season population (for players sharing an id)
        #[arg(long)]
        row: Option<usize>,

        /// How many nearest neighbors to list
        #[arg(long, default_value_t = 5)]
        k: usize,

        /// Output format (csv is not supported here)
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List the seasons present in the player data
    Seasons,

    /// List every built-in archetype
    Archetypes,
}

/// Options selecting the season population.
#[derive(Args, Clone)]
struct PoolArgs {
    /// Season to analyze (defaults to config, then the latest season in the data)
    #[arg(long)]
    season: Option<u32>,

    /// Minimum sets played to qualify (overrides pool.min_sets_played)
    #[arg(long)]
    min_sets: Option<u64>,

    /// Feature scheme: v1 or v2 (overrides features.scheme)
    #[arg(long)]
    scheme: Option<FeatureScheme>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;

    let cli = Cli::parse();

    if let Commands::Archetypes = cli.command {
        return print_archetypes();
    }

    // 2. Load config
    let base_dir = match &cli.base_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };
    let config = config::load_config_in(&base_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: scheme={}, min {} sets",
        config.scheme, config.min_sets_played
    );

    // 3. Load players
    let data_path = resolve_data_path(&base_dir, cli.data.as_deref(), &config);
    let players = dataset::load_players(&data_path)
        .with_context(|| format!("failed to load players from {}", data_path.display()))?;

    // 4. Dispatch
    match cli.command {
        Commands::Report { pool, format } => {
            let report = build_report(&players, &config, &pool)?;
            match format {
                OutputFormat::Table => print_report_table(&report),
                OutputFormat::Json => print_json(&report),
                OutputFormat::Csv => print_report_csv(&report),
            }
        }
        Commands::Similar {
            pool,
            player,
            row,
            k,
            format,
        } => {
            let report = build_report(&players, &config, &pool)?;
            let row = resolve_row(&report, player, row)?;
            print_similar(&report, row, k, format)
        }
        Commands::Seasons => {
            let seasons = dataset::available_seasons(&players);
            if seasons.is_empty() {
                println!("No seasons found in {}", data_path.display());
            }
            for season in seasons {
                println!("{season}");
            }
            Ok(())
        }
        Commands::Archetypes => print_archetypes(),
    }
}

/// Initialize tracing to stderr. `RUST_LOG` overrides the default filter.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("volleyscope=info,volleyscope_core=info,warn")),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

fn resolve_data_path(base_dir: &Path, cli_data: Option<&Path>, config: &Config) -> PathBuf {
    match cli_data {
        Some(path) => path.to_path_buf(),
        None => {
            let configured = PathBuf::from(&config.data_paths.players);
            if configured.is_absolute() {
                configured
            } else {
                base_dir.join(configured)
            }
        }
    }
}

/// Pick the season: CLI flag, then config default, then the latest season
/// present in the data.
fn resolve_season(players: &[Player], config: &Config, pool: &PoolArgs) -> anyhow::Result<u32> {
    if let Some(season) = pool.season.or(config.default_season) {
        return Ok(season);
    }
    match dataset::available_seasons(players).last() {
        Some(season) => Ok(*season),
        None => bail!("no seasons found in player data; pass --season explicitly"),
    }
}

fn build_report(players: &[Player], config: &Config, pool: &PoolArgs) -> anyhow::Result<SeasonReport> {
    let season = resolve_season(players, config, pool)?;
    let mut options = ReportOptions::from_config(config);
    if let Some(min_sets) = pool.min_sets {
        options.min_sets_played = min_sets;
    }
    if let Some(scheme) = pool.scheme {
        options.scheme = scheme;
    }
    Ok(build_season_report(players, season, &options))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to write JSON")?;
    writeln!(out)?;
    Ok(())
}

fn print_report_table(report: &SeasonReport) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(
        out,
        "Season {} ({}, min {} sets): {} players",
        report.season,
        report.scheme,
        report.min_sets_played,
        report.len()
    )?;
    if report.is_empty() {
        return Ok(());
    }

    let ratios = report.pca.explained_variance_ratio();
    for (i, (axis, loadings)) in ["x", "y", "z"].iter().zip(report.axis_loadings()).enumerate() {
        let share = ratios.get(i).copied().unwrap_or(0.0);
        let top: Vec<String> = loadings
            .iter()
            .map(|l| format!("{} {:+.2}", l.label, l.weight))
            .collect();
        writeln!(out, "  {axis}: {:>5.1}%  {}", share * 100.0, top.join(", "))?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "{:>6}  {:<24} {:>5}  {:>7} {:>7} {:>7}  {}",
        "ID", "Player", "Sets", "X", "Y", "Z", "Archetype"
    )?;
    for profile in report.profiles() {
        let archetype = profile.archetype.map(|a| a.name.as_str()).unwrap_or("-");
        writeln!(
            out,
            "{:>6}  {:<24} {:>5}  {:>7.3} {:>7.3} {:>7.3}  {}",
            profile.row.player_id,
            truncate(&profile.row.player_name, 24),
            profile.row.sets_played,
            profile.coords.x,
            profile.coords.y,
            profile.coords.z,
            archetype
        )?;
    }
    Ok(())
}

fn print_report_csv(report: &SeasonReport) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());

    let labels = report.scheme.labels();
    let mut header: Vec<String> = [
        "player_id",
        "player_name",
        "season",
        "sets_played",
        "archetype",
        "x",
        "y",
        "z",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(labels.iter().map(|l| format!("{l} per set")));
    wtr.write_record(&header).context("failed to write CSV header")?;

    for profile in report.profiles() {
        let mut record = vec![
            profile.row.player_id.to_string(),
            profile.row.player_name.clone(),
            profile.row.season.to_string(),
            profile.row.sets_played.to_string(),
            profile.archetype.map(|a| a.id.clone()).unwrap_or_default(),
            format!("{:.6}", profile.coords.x),
            format!("{:.6}", profile.coords.y),
            format!("{:.6}", profile.coords.z),
        ];
        record.extend(profile.row.raw_features.iter().map(|v| format!("{v:.6}")));
        wtr.write_record(&record).context("failed to write CSV row")?;
    }

    wtr.flush().context("failed to flush CSV output")?;
    Ok(())
}

/// Turn `--player` / `--row` into a row position. An id shared by several
/// rows is ambiguous and must be narrowed with `--row`.
fn resolve_row(report: &SeasonReport, player: Option<u64>, row: Option<usize>) -> anyhow::Result<usize> {
    if let Some(row) = row {
        if row >= report.len() {
            bail!(
                "row {row} is out of range; season {} has {} qualifying players",
                report.season,
                report.len()
            );
        }
        return Ok(row);
    }
    let Some(player_id) = player else {
        bail!("either --player or --row is required");
    };
    match report.rows_for(player_id).as_slice() {
        [] => bail!(
            "player {player_id} is not in the season {} population (min {} sets)",
            report.season,
            report.min_sets_played
        ),
        [row] => Ok(*row),
        rows => bail!("player id {player_id} is shared by rows {rows:?}; pass --row instead"),
    }
}

fn print_similar(report: &SeasonReport, row: usize, k: usize, format: OutputFormat) -> anyhow::Result<()> {
    let Some(profile) = report.profile_at(row) else {
        bail!("row {row} is not in the season {} population", report.season);
    };
    let similar = report.similar_to_row(row);
    let neighbors = report.nearest_to_row(row, k);

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "player": profile,
            "similar": similar,
            "nearest": neighbors,
        })),
        OutputFormat::Csv => bail!("csv output is only supported by the report command"),
        OutputFormat::Table => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            writeln!(
                out,
                "{} (#{}), season {}",
                profile.row.player_name, profile.row.player_id, report.season
            )?;
            writeln!(out, "  most similar:  {}", describe(similar.most_similar.as_ref()))?;
            writeln!(out, "  least similar: {}", describe(similar.least_similar.as_ref()))?;
            if !neighbors.is_empty() {
                writeln!(out)?;
                writeln!(out, "Nearest {}:", neighbors.len())?;
                for (rank, n) in neighbors.iter().enumerate() {
                    writeln!(
                        out,
                        "  {:>2}. {:<24} #{:<6} {:.3}",
                        rank + 1,
                        truncate(&n.player_name, 24),
                        n.player_id,
                        n.distance
                    )?;
                }
            }
            Ok(())
        }
    }
}

fn describe(neighbor: Option<&Neighbor>) -> String {
    match neighbor {
        Some(n) => format!(
            "{} (#{}, row {}) at {:.3}",
            n.player_name, n.player_id, n.row, n.distance
        ),
        None => "-".to_string(),
    }
}

fn print_archetypes() -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for def in ArchetypeRules::standard().catalog() {
        writeln!(
            out,
            "{:<20} {:<20} {}  {}",
            def.id, def.name, def.color, def.description
        )?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('~');
        t
    }
}
