use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sheetslim_core::steps::registry;
use sheetslim_core::{LightenConfig, Lightener, Progress, ProgressEvent, RunOutcome};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

mod formatter;

#[derive(Parser)]
#[command(name = "sheetslim")]
#[command(about = "Shrinks bloated Excel workbooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the workbook to lighten; prompted for when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Keep formulas instead of freezing them to their cached values
    #[arg(long)]
    keep_formulas: bool,

    /// Directory for the lightened copy (defaults to the desktop)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Suppress the progress display
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripting
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = match cli.file {
        Some(file) => file,
        None => prompt_for_file()?,
    };

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        LightenConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        // Try to load default config from current directory if it exists
        let default_config_path = PathBuf::from("sheetslim.toml");
        if default_config_path.exists() {
            LightenConfig::from_file(&default_config_path).with_context(|| {
                format!(
                    "Failed to load config from {}",
                    default_config_path.display()
                )
            })?
        } else {
            LightenConfig::default()
        }
    };

    if cli.keep_formulas {
        config.convert_formulas = false;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = Some(dir);
    }

    config
        .validate_steps(&registry::valid_step_ids())
        .context("Invalid configuration")?;

    let lightener = Lightener::with_config(config);

    // Progress renders on this thread while the workbook is processed
    // on a worker, so a slow fixup never freezes the display.
    let show_progress = !cli.quiet && matches!(cli.format, OutputFormat::Human);

    let outcome = if show_progress {
        let (tx, rx) = mpsc::channel::<ProgressEvent>();
        thread::scope(|scope| {
            let worker = scope.spawn(|| {
                let mut progress = Progress::channel(tx);
                lightener.lighten_file(&file, &mut progress)
            });
            for event in rx {
                print!("\r[{:>3}%] {:<50}", event.percent, event.message);
                let _ = io::stdout().flush();
            }
            println!();
            match worker.join() {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(_) => Err(anyhow::anyhow!("worker thread panicked")),
            }
        })
    } else {
        let mut progress = Progress::sink();
        lightener
            .lighten_file(&file, &mut progress)
            .map_err(anyhow::Error::from)
    };

    let outcome = outcome.with_context(|| format!("Failed to lighten {}", file.display()))?;

    match cli.format {
        OutputFormat::Human => {
            formatter::print_human(&file, &outcome);
        }
        OutputFormat::Json => {
            formatter::print_json(&file, &outcome)?;
        }
    }

    // Exit with appropriate code
    let exit_code = match outcome {
        RunOutcome::Lightened { .. } => 0,
        RunOutcome::Salvaged { .. } => 1,
    };

    std::process::exit(exit_code);
}

/// Interactive fallback when no file argument was given. Paths pasted
/// from a file manager often arrive quoted; strip that.
fn prompt_for_file() -> Result<PathBuf> {
    print!("Workbook to lighten: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let trimmed = line.trim().trim_matches('"').trim_matches('\'');
    if trimmed.is_empty() {
        anyhow::bail!("No file given");
    }
    Ok(PathBuf::from(trimmed))
}
