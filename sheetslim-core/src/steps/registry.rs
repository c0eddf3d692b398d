//! Step registry
//!
//! Execution order is fixed: links first (so frozen formulas stop
//! referencing dead parts), then names, then the per-sheet pass, then
//! the style cap. Configuration can disable steps but never reorder
//! them.

use std::collections::HashSet;

use super::{BreakLinksStep, CleanupStep, DefinedNamesStep, SheetPassStep, StyleCapStep};
use crate::config::LightenConfig;

/// Every id accepted in `disabled_steps`: the four pipeline steps plus
/// the per-sheet fixups gated inside the sheet pass
pub fn valid_step_ids() -> HashSet<String> {
    [
        "links",
        "names",
        "sheets",
        "styles",
        "images",
        "formulas",
        "trim",
        "formats",
        "comments",
        "hyperlinks",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Create the enabled steps, in execution order
pub fn create_enabled_steps(config: &LightenConfig) -> Vec<Box<dyn CleanupStep>> {
    let all: Vec<Box<dyn CleanupStep>> = vec![
        Box::new(BreakLinksStep),
        Box::new(DefinedNamesStep),
        Box::new(SheetPassStep),
        Box::new(StyleCapStep),
    ];

    all.into_iter()
        .filter(|step| config.is_step_enabled(step.id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let config = LightenConfig::default();
        let steps = create_enabled_steps(&config);
        let ids: Vec<String> = steps.iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec!["links", "names", "sheets", "styles"]);
    }

    #[test]
    fn test_disabled_step_is_dropped() {
        let mut config = LightenConfig::default();
        config.disabled_steps.insert("names".to_string());
        let steps = create_enabled_steps(&config);
        let ids: Vec<String> = steps.iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec!["links", "sheets", "styles"]);
    }

    #[test]
    fn test_sub_ids_are_valid() {
        let valid = valid_step_ids();
        assert!(valid.contains("formulas"));
        assert!(valid.contains("hyperlinks"));
        assert!(!valid.contains("frobnicate"));
    }
}
