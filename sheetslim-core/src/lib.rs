//! Core library for shrinking bloated spreadsheet workbooks.
//!
//! A lightening run opens a workbook package, drives a fixed pipeline
//! of cleanup steps over it (severing external links, deleting defined
//! names, trimming ghost rows and columns, recompressing embedded
//! images, flattening formulas, removing comments and hyperlinks,
//! capping named styles) and saves the result next to the original
//! with a `_light` suffix. If the run fails midway, a values-only
//! salvage copy is written instead so the data is never lost.

pub mod cellref;
pub mod config;
pub mod error;
pub mod format;
pub mod host;
pub mod images;
pub mod progress;
pub mod report;
pub mod salvage;
pub mod salvage_writer;
pub mod steps;

pub use config::LightenConfig;
pub use error::{LightenError, SalvageError};
pub use format::FileKind;
pub use progress::{Progress, ProgressEvent};
pub use report::LightenReport;

use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use host::{PackageHost, WorkbookHost};
use steps::{CleanupStep, StepContext, registry};

/// How a run ended: the real cleanup went through, or the salvage
/// fallback kicked in
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    Lightened {
        output: PathBuf,
        format: FileKind,
        /// True when the native format could not be saved and the copy
        /// was written as plain xlsx under the `_fix` name
        fallback_format_used: bool,
        report: LightenReport,
    },
    Salvaged {
        output: PathBuf,
        /// What sank the cleanup run
        cause: String,
    },
}

/// The lightening pipeline, configured once and reusable across files
pub struct Lightener {
    config: LightenConfig,
    steps: Vec<Box<dyn CleanupStep>>,
}

impl Default for Lightener {
    fn default() -> Self {
        Self::new()
    }
}

impl Lightener {
    pub fn new() -> Self {
        Self::with_config(LightenConfig::default())
    }

    pub fn with_config(config: LightenConfig) -> Self {
        let steps = registry::create_enabled_steps(&config);
        Self { config, steps }
    }

    pub fn config(&self) -> &LightenConfig {
        &self.config
    }

    /// Run the full pipeline against one file.
    ///
    /// Failures before the workbook is open are returned as errors.
    /// Failures after that point fall back to the values-only salvage
    /// path; only when salvage itself fails does the run error out.
    pub fn lighten_file(
        &self,
        input: &Path,
        progress: &mut Progress,
    ) -> Result<RunOutcome, LightenError> {
        if !input.is_file() {
            return Err(LightenError::InvalidInput(input.to_path_buf()));
        }
        let kind = FileKind::from_path(input)
            .ok_or_else(|| LightenError::UnsupportedExtension(input.to_path_buf()))?;

        let out_dir = self
            .config
            .output_dir
            .clone()
            .unwrap_or_else(format::desktop_dir);
        let input_bytes = fs::metadata(input).map(|m| m.len()).unwrap_or(0);

        progress.set(0, "Opening workbook");

        // Legacy .xls files are not zip packages, so this is also where
        // they bow out.
        let mut host = PackageHost::open(input).map_err(|e| LightenError::OpenFailed {
            path: input.to_path_buf(),
            reason: e.to_string(),
        })?;

        let attempt = self.run_cleanup(&mut host, progress).and_then(|mut report| {
            let light = format::light_path(input, &out_dir, kind);
            let fix = format::fix_path(input, &out_dir);
            let (output, fallback) =
                self.save_with_fallback(&mut host, &light, &fix, kind, progress)?;
            report.input_bytes = input_bytes;
            report.output_bytes = fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
            Ok((output, fallback, report))
        });

        match attempt {
            Ok((output, fallback_format_used, report)) => {
                progress.set(100, "Done");
                Ok(RunOutcome::Lightened {
                    output,
                    format: if fallback_format_used { FileKind::Xlsx } else { kind },
                    fallback_format_used,
                    report,
                })
            }
            Err(cause) => {
                progress.reset("Optimization failed; salvaging values");
                let output = format::salvage_path(input, &out_dir);
                match salvage::salvage(input, &output) {
                    Ok(()) => {
                        progress.set(100, "Salvage complete");
                        Ok(RunOutcome::Salvaged {
                            output,
                            cause: cause.to_string(),
                        })
                    }
                    Err(e) => Err(LightenError::Unrecoverable {
                        cause: cause.to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }

    /// Drive every enabled step over an open workbook.
    ///
    /// Public so tests can run the pipeline against a mock host without
    /// a real package on disk.
    pub fn run_cleanup(
        &self,
        host: &mut dyn WorkbookHost,
        progress: &mut Progress,
    ) -> Result<LightenReport> {
        let mut report = LightenReport::default();
        for step in &self.steps {
            let mut ctx = StepContext {
                config: &self.config,
                report: &mut report,
                progress,
            };
            step.run(host, &mut ctx)?;
        }
        Ok(report)
    }

    /// Save in the workbook's native format, retrying as plain xlsx
    /// under the fallback name when the first attempt fails. Returns
    /// the path written and whether the fallback was taken.
    pub fn save_with_fallback(
        &self,
        host: &mut dyn WorkbookHost,
        light: &Path,
        fix: &Path,
        kind: FileKind,
        progress: &mut Progress,
    ) -> Result<(PathBuf, bool)> {
        progress.set(97, "Saving");
        match host.save_as(light, kind) {
            Ok(()) => Ok((light.to_path_buf(), false)),
            Err(first) => match host.save_as(fix, FileKind::Xlsx) {
                Ok(()) => Ok((fix.to_path_buf(), true)),
                Err(second) => Err(anyhow::anyhow!(
                    "could not save ({}); xlsx fallback also failed ({})",
                    first,
                    second
                )),
            },
        }
    }
}
