//! Pipeline tests against a scripted in-memory host
//!
//! These exercise step ordering and the best-effort error policy
//! without a real package on disk.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

use sheetslim_core::host::{TrimOutcome, WorkbookHost};
use sheetslim_core::{FileKind, LightenConfig, Lightener, Progress};

#[derive(Default)]
struct MockHost {
    sheets: Vec<String>,
    links: Vec<String>,
    names: Vec<String>,
    style_count: usize,

    fail_link: Option<String>,
    fail_sheet_names: bool,
    fail_first_save: bool,

    broken_links: Vec<String>,
    deleted_names: Vec<String>,
    truncated_to: Option<usize>,
    saves: Vec<PathBuf>,
    calls: Vec<String>,
}

impl MockHost {
    fn call(&mut self, name: &str) {
        self.calls.push(name.to_string());
    }
}

impl WorkbookHost for MockHost {
    fn sheet_names(&mut self) -> Result<Vec<String>> {
        self.call("sheet_names");
        if self.fail_sheet_names {
            return Err(anyhow!("workbook structure unreadable"));
        }
        Ok(self.sheets.clone())
    }

    fn link_sources(&mut self) -> Result<Vec<String>> {
        self.call("link_sources");
        Ok(self.links.clone())
    }

    fn break_link(&mut self, source: &str) -> Result<()> {
        self.call("break_link");
        if self.fail_link.as_deref() == Some(source) {
            return Err(anyhow!("link is locked"));
        }
        self.broken_links.push(source.to_string());
        Ok(())
    }

    fn defined_names(&mut self) -> Result<Vec<String>> {
        self.call("defined_names");
        Ok(self.names.clone())
    }

    fn delete_defined_name(&mut self, name: &str) -> Result<()> {
        self.deleted_names.push(name.to_string());
        Ok(())
    }

    fn recompress_images(&mut self, _sheet: &str, _jpeg_quality: u8) -> Result<usize> {
        self.call("recompress_images");
        Ok(1)
    }

    fn flatten_formulas(&mut self, _sheet: &str) -> Result<usize> {
        self.call("flatten_formulas");
        Ok(2)
    }

    fn trim_ghost_area(&mut self, _sheet: &str) -> Result<TrimOutcome> {
        self.call("trim_ghost_area");
        Ok(TrimOutcome { rows_deleted: 3, cols_deleted: 1 })
    }

    fn clear_trailing_formats(&mut self, _sheet: &str) -> Result<usize> {
        self.call("clear_trailing_formats");
        Ok(4)
    }

    fn remove_comments(&mut self, _sheet: &str) -> Result<usize> {
        self.call("remove_comments");
        Ok(1)
    }

    fn remove_hyperlinks(&mut self, _sheet: &str) -> Result<usize> {
        self.call("remove_hyperlinks");
        Ok(2)
    }

    fn named_style_count(&mut self) -> Result<usize> {
        self.call("named_style_count");
        Ok(self.style_count)
    }

    fn truncate_named_styles(&mut self, cap: usize) -> Result<usize> {
        let removed = self.style_count.saturating_sub(cap);
        self.truncated_to = Some(cap);
        Ok(removed)
    }

    fn save_as(&mut self, path: &Path, _kind: FileKind) -> Result<()> {
        if self.fail_first_save && self.saves.is_empty() {
            self.saves.push(path.to_path_buf());
            return Err(anyhow!("format rejected"));
        }
        self.saves.push(path.to_path_buf());
        Ok(())
    }
}

fn basic_host() -> MockHost {
    MockHost {
        sheets: vec!["One".to_string(), "Two".to_string()],
        links: vec!["ext_a.xlsx".to_string(), "ext_b.xlsx".to_string()],
        names: vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
        style_count: 100,
        ..Default::default()
    }
}

#[test]
fn test_step_order() {
    let mut host = basic_host();
    let lightener = Lightener::new();
    lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();

    let first = |name: &str| host.calls.iter().position(|c| c == name).unwrap();
    assert!(first("link_sources") < first("defined_names"));
    assert!(first("defined_names") < first("recompress_images"));
    assert!(first("recompress_images") < first("named_style_count"));
}

#[test]
fn test_names_deleted_back_to_front() {
    let mut host = basic_host();
    let lightener = Lightener::new();
    let report = lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();

    assert_eq!(host.deleted_names, vec!["gamma", "beta", "alpha"]);
    assert_eq!(report.names_deleted, 3);
}

#[test]
fn test_failed_link_is_skipped_not_fatal() {
    let mut host = basic_host();
    host.fail_link = Some("ext_a.xlsx".to_string());
    let lightener = Lightener::new();
    let report = lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();

    assert_eq!(report.links_cut, 1);
    assert_eq!(host.broken_links, vec!["ext_b.xlsx"]);
    assert!(report.skipped.iter().any(|s| s.step == "links"));
    // Later steps still ran
    assert_eq!(report.names_deleted, 3);
    assert_eq!(report.sheets_processed, 2);
}

#[test]
fn test_unreadable_sheet_list_escapes() {
    let mut host = basic_host();
    host.fail_sheet_names = true;
    let lightener = Lightener::new();
    assert!(lightener.run_cleanup(&mut host, &mut Progress::sink()).is_err());
}

#[test]
fn test_per_sheet_counters_accumulate() {
    let mut host = basic_host();
    let lightener = Lightener::new();
    let report = lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();

    // Two sheets, fixed per-sheet yields from the mock
    assert_eq!(report.images_recompressed, 2);
    assert_eq!(report.formulas_flattened, 4);
    assert_eq!(report.ghost_rows_deleted, 6);
    assert_eq!(report.ghost_cols_deleted, 2);
    assert_eq!(report.cells_format_cleared, 8);
    assert_eq!(report.comments_removed, 2);
    assert_eq!(report.hyperlinks_removed, 4);
}

#[test]
fn test_keep_formulas_config() {
    let mut host = basic_host();
    let mut config = LightenConfig::default();
    config.convert_formulas = false;
    let lightener = Lightener::with_config(config);
    let report = lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();

    assert_eq!(report.formulas_flattened, 0);
    assert!(!host.calls.iter().any(|c| c == "flatten_formulas"));
    // Other fixups unaffected
    assert_eq!(report.hyperlinks_removed, 4);
}

#[test]
fn test_disabled_top_level_step() {
    let mut host = basic_host();
    let mut config = LightenConfig::default();
    config.disabled_steps.insert("names".to_string());
    let lightener = Lightener::with_config(config);
    let report = lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();

    assert!(host.deleted_names.is_empty());
    assert_eq!(report.names_deleted, 0);
    assert_eq!(report.links_cut, 2);
}

#[test]
fn test_style_cap_applies_only_above_cap() {
    let lightener = Lightener::new();

    let mut host = basic_host();
    host.style_count = 1000;
    let report = lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();
    assert_eq!(host.truncated_to, Some(256));
    assert_eq!(report.styles_removed, 744);

    let mut host = basic_host();
    host.style_count = 100;
    let report = lightener.run_cleanup(&mut host, &mut Progress::sink()).unwrap();
    assert_eq!(host.truncated_to, None);
    assert_eq!(report.styles_removed, 0);
}

#[test]
fn test_save_fallback_takes_fix_path() {
    let mut host = basic_host();
    host.fail_first_save = true;
    let lightener = Lightener::new();

    let light = PathBuf::from("/tmp/book_light.xlsm");
    let fix = PathBuf::from("/tmp/book_fix.xlsx");
    let (written, fallback) = lightener
        .save_with_fallback(&mut host, &light, &fix, FileKind::Xlsm, &mut Progress::sink())
        .unwrap();

    assert!(fallback);
    assert_eq!(written, fix);
}

#[test]
fn test_save_native_format_first() {
    let mut host = basic_host();
    let lightener = Lightener::new();

    let light = PathBuf::from("/tmp/book_light.xlsx");
    let fix = PathBuf::from("/tmp/book_fix.xlsx");
    let (written, fallback) = lightener
        .save_with_fallback(&mut host, &light, &fix, FileKind::Xlsx, &mut Progress::sink())
        .unwrap();

    assert!(!fallback);
    assert_eq!(written, light);
    assert_eq!(host.saves, vec![light]);
}
