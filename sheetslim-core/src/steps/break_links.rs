//! External link severing

use anyhow::Result;

use super::{CleanupStep, StepContext};
use crate::host::WorkbookHost;

/// Severs every link to another workbook, freezing dependent formulas
/// to their cached values.
///
/// Runs first: once the link parts are gone, nothing later in the
/// pipeline can resurrect a reference to them.
pub struct BreakLinksStep;

impl CleanupStep for BreakLinksStep {
    fn id(&self) -> &str {
        "links"
    }

    fn name(&self) -> &str {
        "Break external links"
    }

    fn run(&self, host: &mut dyn WorkbookHost, ctx: &mut StepContext) -> Result<()> {
        ctx.progress.set(5, "Breaking external links");

        // A workbook without readable link metadata still gets the rest
        // of the treatment.
        let sources = match host.link_sources() {
            Ok(sources) => sources,
            Err(e) => {
                ctx.report.skip("links", format!("could not enumerate links: {}", e));
                return Ok(());
            }
        };

        for source in sources {
            match host.break_link(&source) {
                Ok(()) => ctx.report.links_cut += 1,
                Err(e) => ctx.report.skip("links", format!("{}: {}", source, e)),
            }
        }
        Ok(())
    }
}
