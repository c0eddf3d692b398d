//! The cleanup pipeline
//!
//! Each stage of the lightening run is a [`CleanupStep`]. The registry
//! creates the enabled steps in their fixed execution order; the
//! orchestration in the crate root drives them against a host.

pub mod break_links;
pub mod defined_names;
pub mod registry;
pub mod sheet_pass;
pub mod style_cap;

pub use break_links::BreakLinksStep;
pub use defined_names::DefinedNamesStep;
pub use sheet_pass::SheetPassStep;
pub use style_cap::StyleCapStep;

use anyhow::Result;

use crate::config::LightenConfig;
use crate::host::WorkbookHost;
use crate::progress::Progress;
use crate::report::LightenReport;

/// Shared mutable state threaded through the pipeline
pub struct StepContext<'a> {
    pub config: &'a LightenConfig,
    pub report: &'a mut LightenReport,
    pub progress: &'a mut Progress,
}

/// One stage of the cleanup pipeline.
///
/// A step swallows per-item failures itself and records them as skips
/// in the report. An `Err` from `run` means the workbook is in a state
/// the pipeline cannot continue from; the orchestration then falls over
/// into the salvage path.
pub trait CleanupStep: Send + Sync {
    /// Stable id, matchable against `disabled_steps`
    fn id(&self) -> &str;

    /// Short human-readable name for progress messages
    fn name(&self) -> &str;

    fn run(&self, host: &mut dyn WorkbookHost, ctx: &mut StepContext) -> Result<()>;
}
