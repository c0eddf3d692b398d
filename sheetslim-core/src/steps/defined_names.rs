//! Defined-name removal

use anyhow::Result;

use super::{CleanupStep, StepContext};
use crate::host::WorkbookHost;

/// Deletes every workbook-level defined name, including internal ones
/// such as print areas.
///
/// Names are deleted back to front so each deletion cannot shift the
/// position of names still pending.
pub struct DefinedNamesStep;

impl CleanupStep for DefinedNamesStep {
    fn id(&self) -> &str {
        "names"
    }

    fn name(&self) -> &str {
        "Delete defined names"
    }

    fn run(&self, host: &mut dyn WorkbookHost, ctx: &mut StepContext) -> Result<()> {
        ctx.progress.set(10, "Deleting defined names");

        let names = match host.defined_names() {
            Ok(names) => names,
            Err(e) => {
                ctx.report.skip("names", format!("could not enumerate names: {}", e));
                return Ok(());
            }
        };

        for name in names.iter().rev() {
            match host.delete_defined_name(name) {
                Ok(()) => ctx.report.names_deleted += 1,
                Err(e) => ctx.report.skip("names", format!("{}: {}", name, e)),
            }
        }
        Ok(())
    }
}
