//! Counters reported back to the user at the end of a run

use serde::Serialize;

/// A fixup that failed and was skipped without aborting the run
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFixup {
    pub step: String,
    pub detail: String,
}

/// Running counters for one lightening run
#[derive(Debug, Clone, Default, Serialize)]
pub struct LightenReport {
    pub links_cut: usize,
    pub names_deleted: usize,
    pub images_recompressed: usize,
    pub formulas_flattened: usize,
    pub ghost_rows_deleted: usize,
    pub ghost_cols_deleted: usize,
    pub cells_format_cleared: usize,
    pub comments_removed: usize,
    pub hyperlinks_removed: usize,
    pub styles_removed: usize,
    pub sheets_processed: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub skipped: Vec<SkippedFixup>,
}

impl LightenReport {
    /// Record a best-effort fixup failure and carry on
    pub fn skip(&mut self, step: &str, detail: impl ToString) {
        self.skipped.push(SkippedFixup {
            step: step.to_string(),
            detail: detail.to_string(),
        });
    }
}
