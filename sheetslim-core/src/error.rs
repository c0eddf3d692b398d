//! Error taxonomy for the lightening run

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a lightening run.
///
/// Fixup sub-step failures are not errors: they are recorded in the
/// report and the run continues.
#[derive(Debug, Error)]
pub enum LightenError {
    /// The input path does not exist or is not a file
    #[error("not a valid Excel file: {}", .0.display())]
    InvalidInput(PathBuf),

    /// The extension is not one of .xls/.xlsx/.xlsm/.xlsb
    #[error("unrecognized spreadsheet extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    /// The workbook package could not be opened; nothing was written
    #[error("could not open workbook {}: {reason}", path.display())]
    OpenFailed { path: PathBuf, reason: String },

    /// Both the optimization pass and the salvage fallback failed
    #[error("optimization failed ({cause}); salvage also failed: {reason}")]
    Unrecoverable { cause: String, reason: String },
}

/// Errors from the values-only salvage path
#[derive(Debug, Error)]
pub enum SalvageError {
    /// Salvage reads cached values through the xlsx reader only
    #[error("salvage supports only .xlsx files: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("salvage failed: {0}")]
    Failed(String),
}
