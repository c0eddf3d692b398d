//! Output formatters for run outcomes

use anyhow::Result;
use colored::*;
use sheetslim_core::{LightenReport, RunOutcome};
use std::path::Path;

/// Print the outcome in human-readable format with colors
pub fn print_human(file_path: &Path, outcome: &RunOutcome) {
    println!("{}", format!("Lightening: {}", file_path.display()).bold());
    println!();

    match outcome {
        RunOutcome::Lightened {
            output,
            fallback_format_used,
            report,
            ..
        } => {
            println!("{}", "✓ Workbook lightened".green().bold());
            if *fallback_format_used {
                println!(
                    "  {}",
                    "Native format could not be saved; wrote plain xlsx instead".yellow()
                );
            }
            println!("  {} {}", "Output:".bold(), output.display());
            println!();
            print_report(report);
        }
        RunOutcome::Salvaged { output, cause } => {
            println!(
                "{}",
                "⚠ Optimization failed; cached values were salvaged".yellow().bold()
            );
            println!("  {} {}", "Cause:".bold(), cause);
            println!("  {} {}", "Output:".bold(), output.display());
        }
    }
}

fn print_report(report: &LightenReport) {
    println!("{}", "Summary:".bold().underline());
    print_count("Sheets processed", report.sheets_processed);
    print_count("External links cut", report.links_cut);
    print_count("Defined names deleted", report.names_deleted);
    print_count("Images recompressed", report.images_recompressed);
    print_count("Formulas frozen", report.formulas_flattened);
    print_count("Ghost rows deleted", report.ghost_rows_deleted);
    print_count("Ghost columns deleted", report.ghost_cols_deleted);
    print_count("Trailing formats cleared", report.cells_format_cleared);
    print_count("Comments removed", report.comments_removed);
    print_count("Hyperlinks removed", report.hyperlinks_removed);
    print_count("Named styles cut", report.styles_removed);

    if report.input_bytes > 0 && report.output_bytes > 0 {
        let percent = 100.0 * report.output_bytes as f64 / report.input_bytes as f64;
        println!(
            "  {} {} -> {} ({:.0}% of original)",
            "Size:".bold(),
            human_size(report.input_bytes),
            human_size(report.output_bytes),
            percent
        );
    }

    if !report.skipped.is_empty() {
        println!();
        println!("{}", "Skipped fixups:".bold().underline());
        for skip in &report.skipped {
            println!("  {} [{}] {}", "SKIP".yellow().bold(), skip.step.bright_black(), skip.detail);
        }
    }
}

fn print_count(label: &str, count: usize) {
    if count > 0 {
        println!("  {} {}", format!("{}:", label).bold(), count);
    }
}

fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Print the outcome in JSON format
pub fn print_json(file_path: &Path, outcome: &RunOutcome) -> Result<()> {
    let output = serde_json::json!({
        "file": file_path.display().to_string(),
        "outcome": outcome,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
