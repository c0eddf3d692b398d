//! The per-sheet optimization pass
//!
//! Walks the sheets in workbook order and applies each fixup in a fixed
//! sequence: images, formulas, ghost-area trim, trailing formats,
//! comments, hyperlinks. Every fixup is individually best-effort; a
//! sheet that resists one fixup still gets the others.

use anyhow::Result;

use super::{CleanupStep, StepContext};
use crate::host::WorkbookHost;

pub struct SheetPassStep;

impl CleanupStep for SheetPassStep {
    fn id(&self) -> &str {
        "sheets"
    }

    fn name(&self) -> &str {
        "Optimize sheets"
    }

    fn run(&self, host: &mut dyn WorkbookHost, ctx: &mut StepContext) -> Result<()> {
        // Without the sheet list there is nothing left to optimize;
        // let the error escape so the caller can fall back to salvage.
        let sheets = host.sheet_names()?;
        let total = sheets.len().max(1);

        for (i, sheet) in sheets.iter().enumerate() {
            // 10..=80, advancing per sheet
            let percent = 10 + (70 * (i + 1) / total) as u8;
            ctx.progress.set(
                percent,
                format!("Optimizing sheet {}/{}: {}", i + 1, sheets.len(), sheet),
            );

            if ctx.config.is_step_enabled("images") {
                match host.recompress_images(sheet, ctx.config.jpeg_quality) {
                    Ok(n) => ctx.report.images_recompressed += n,
                    Err(e) => ctx.report.skip("images", format!("{}: {}", sheet, e)),
                }
            }

            if ctx.config.convert_formulas && ctx.config.is_step_enabled("formulas") {
                match host.flatten_formulas(sheet) {
                    Ok(n) => ctx.report.formulas_flattened += n,
                    Err(e) => ctx.report.skip("formulas", format!("{}: {}", sheet, e)),
                }
            }

            if ctx.config.is_step_enabled("trim") {
                match host.trim_ghost_area(sheet) {
                    Ok(outcome) => {
                        ctx.report.ghost_rows_deleted += outcome.rows_deleted;
                        ctx.report.ghost_cols_deleted += outcome.cols_deleted;
                    }
                    Err(e) => ctx.report.skip("trim", format!("{}: {}", sheet, e)),
                }
            }

            if ctx.config.is_step_enabled("formats") {
                match host.clear_trailing_formats(sheet) {
                    Ok(n) => ctx.report.cells_format_cleared += n,
                    Err(e) => ctx.report.skip("formats", format!("{}: {}", sheet, e)),
                }
            }

            if ctx.config.is_step_enabled("comments") {
                match host.remove_comments(sheet) {
                    Ok(n) => ctx.report.comments_removed += n,
                    Err(e) => ctx.report.skip("comments", format!("{}: {}", sheet, e)),
                }
            }

            if ctx.config.is_step_enabled("hyperlinks") {
                match host.remove_hyperlinks(sheet) {
                    Ok(n) => ctx.report.hyperlinks_removed += n,
                    Err(e) => ctx.report.skip("hyperlinks", format!("{}: {}", sheet, e)),
                }
            }

            ctx.report.sheets_processed += 1;
        }
        Ok(())
    }
}
