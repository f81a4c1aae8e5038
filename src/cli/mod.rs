//! Command-line interface for the survey traversal tool.

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders;
use crate::processors::discovery;
use crate::processors::traversal::{self, Traversal, TraversalOptions};
use crate::visualization;
use crate::SurveyConfig;

#[derive(Parser)]
#[command(name = "survey-traverse")]
#[command(about = "Total-station survey traversal and topography plots", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    inputs: InputArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Where to find survey files.
#[derive(Args, Clone, Default)]
struct InputArgs {
    /// Folder to scan for survey files (defaults to the current directory)
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Survey files to process instead of scanning a folder
    files: Vec<PathBuf>,
}

impl InputArgs {
    /// Prefer values given after the subcommand, fall back to the top level.
    fn or(self, fallback: &InputArgs) -> InputArgs {
        InputArgs {
            folder: self.folder.or_else(|| fallback.folder.clone()),
            files: if self.files.is_empty() {
                fallback.files.clone()
            } else {
                self.files
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute coordinates and draw a PNG chart per file (default)
    Plot {
        #[command(flatten)]
        inputs: InputArgs,
        /// Directory for PNG charts (defaults to each input's folder)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Skip caption, axis and point labels
        #[arg(long)]
        no_text: bool,
        /// Retry records whose station is resolved later in the sheet
        #[arg(long)]
        retry_deferred: bool,
    },

    /// Print computed coordinates and connections
    Points {
        #[command(flatten)]
        inputs: InputArgs,
        /// Retry records whose station is resolved later in the sheet
        #[arg(long)]
        retry_deferred: bool,
    },

    /// Write the default configuration to a YAML file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            let head: String = value.chars().take(35).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match SurveyConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                SurveyConfig::default()
            }
        },
        None => SurveyConfig::default(),
    };

    let command = cli.command.unwrap_or(Commands::Plot {
        inputs: InputArgs::default(),
        output_dir: None,
        no_text: false,
        retry_deferred: false,
    });

    // Dispatch to subcommands
    match command {
        Commands::Plot {
            inputs,
            output_dir,
            no_text,
            retry_deferred,
        } => {
            let inputs = collect_or_exit(inputs.or(&cli.inputs), &config);
            cmd_plot(&inputs, output_dir.as_deref(), no_text, retry_deferred, &config);
        }
        Commands::Points {
            inputs,
            retry_deferred,
        } => {
            let inputs = collect_or_exit(inputs.or(&cli.inputs), &config);
            cmd_points(&inputs, retry_deferred, &config);
        }
        Commands::InitConfig { path } => cmd_init_config(&path, &config),
    }
}

fn collect_or_exit(inputs: InputArgs, config: &SurveyConfig) -> Vec<PathBuf> {
    match discovery::collect_inputs(
        &inputs.files,
        inputs.folder.as_deref(),
        &config.discovery.extensions,
    ) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("File discovery failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn traversal_options(retry_deferred: bool, config: &SurveyConfig) -> TraversalOptions {
    TraversalOptions {
        retry_deferred: retry_deferred || config.traversal.retry_deferred,
    }
}

/// Read one file and traverse it. Per-file failures are logged and yield `None`.
fn process_file(
    path: &Path,
    options: TraversalOptions,
    config: &SurveyConfig,
) -> Option<(usize, Traversal)> {
    let records = match loaders::load_survey(path, &config.sheet, &config.document) {
        Ok(records) => records,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    if records.is_empty() {
        warn!("No valid measurements found in {}", path.display());
        return None;
    }
    info!("{}: {} measurement rows", path.display(), records.len());

    let result = traversal::traverse(&records, options);

    if !result.skipped.is_empty() {
        warn!(
            "{}: {} of {} records skipped (station not resolved)",
            path.display(),
            result.skipped.len(),
            records.len()
        );
    }

    if result.is_empty() {
        warn!("No coordinates computed for {}", path.display());
        return None;
    }

    Some((records.len(), result))
}

fn cmd_plot(
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
    no_text: bool,
    retry_deferred: bool,
    config: &SurveyConfig,
) {
    if inputs.is_empty() {
        println!("No survey files found to process.");
        return;
    }

    println!("Files found: {}", inputs.len());

    let options = traversal_options(retry_deferred, config);
    let mut plot_config = config.plot.clone();
    if no_text {
        plot_config.show_text = false;
    }

    for (i, path) in inputs.iter().enumerate() {
        let start = Instant::now();
        println!("=== Processing file {}/{}: {} ===", i + 1, inputs.len(), path.display());

        let spinner = create_spinner("Computing coordinates...");
        let Some((measurements, result)) = process_file(path, options, config) else {
            spinner.finish_and_clear();
            continue;
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "survey".to_string());
        let output_path = match output_dir {
            Some(dir) => dir.join(format!("{}.png", stem)),
            None => path.with_extension("png"),
        };

        spinner.set_message("Drawing chart...");
        let plotted = visualization::plot_topography(&output_path, &result, &stem, &plot_config);
        spinner.finish_and_clear();

        let output = match plotted {
            Ok(()) => output_path.display().to_string(),
            Err(e) => {
                error!("Plotting {} failed: {}", path.display(), e);
                "(not written)".to_string()
            }
        };

        print_summary(
            &format!("Summary for {}", stem),
            &[
                ("File", path.display().to_string()),
                ("Total points", result.points.len().to_string()),
                ("Total measurements", measurements.to_string()),
                ("Connections", result.connections.len().to_string()),
                ("Skipped records", result.skipped.len().to_string()),
                ("Output", output),
                ("Duration", format!("{:.2?}", start.elapsed())),
            ],
        );
    }
}

fn cmd_points(inputs: &[PathBuf], retry_deferred: bool, config: &SurveyConfig) {
    if inputs.is_empty() {
        println!("No survey files found to process.");
        return;
    }

    let options = traversal_options(retry_deferred, config);

    for path in inputs {
        let Some((measurements, result)) = process_file(path, options, config) else {
            continue;
        };

        println!("=== {} ===", path.display());
        println!("{:<12} {:>12} {:>12} {:>8} {:>8}", "point", "x", "y", "HT", "HB");
        for point in result.sorted_points() {
            println!(
                "{:<12} {:>12.3} {:>12.3} {:>8.2} {:>8.2}",
                point.id, point.x, point.y, point.target_height, point.instrument_height
            );
        }

        println!();
        println!("{:<12} {:<12} {:>10} {:>10}", "from", "to", "DI", "angle");
        for connection in &result.connections {
            println!(
                "{:<12} {:<12} {:>10.3} {:>10.4}",
                connection.from_id, connection.to_id, connection.distance, connection.angle_deg
            );
        }

        println!(
            "Total points: {}  Total measurements: {}  Skipped: {}",
            result.points.len(),
            measurements,
            result.skipped.len()
        );
        println!();
    }
}

fn cmd_init_config(path: &Path, config: &SurveyConfig) {
    match config.to_yaml(path) {
        Ok(()) => println!("Configuration written to {}", path.display()),
        Err(e) => {
            error!("Failed to write config to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
