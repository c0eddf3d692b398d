//! Named-style capping
//!
//! Workbooks that have been copy-pasted between for years accumulate
//! thousands of named cell styles. Everything past the configured cap
//! is cut from the end of the style table.

use anyhow::Result;

use super::{CleanupStep, StepContext};
use crate::host::WorkbookHost;

pub struct StyleCapStep;

impl CleanupStep for StyleCapStep {
    fn id(&self) -> &str {
        "styles"
    }

    fn name(&self) -> &str {
        "Cap named styles"
    }

    fn run(&self, host: &mut dyn WorkbookHost, ctx: &mut StepContext) -> Result<()> {
        ctx.progress.set(86, "Capping named styles");

        let count = match host.named_style_count() {
            Ok(count) => count,
            Err(e) => {
                ctx.report.skip("styles", format!("could not count styles: {}", e));
                return Ok(());
            }
        };

        if count > ctx.config.style_cap {
            match host.truncate_named_styles(ctx.config.style_cap) {
                Ok(removed) => ctx.report.styles_removed += removed,
                Err(e) => ctx.report.skip("styles", e.to_string()),
            }
        }
        Ok(())
    }
}
