//! Values-only salvage path
//!
//! When the main cleanup run falls over, the original file is read back
//! through calamine and its cached values are written to a fresh
//! workbook. Formulas, formatting, images and every other feature are
//! lost; the data survives.

use calamine::{Reader, Xlsx, XlsxError, open_workbook};
use std::path::Path;

use crate::error::SalvageError;
use crate::format::FileKind;
use crate::salvage_writer::{self, SalvageSheet};

/// Extract cached values from `input` and write them to `output`.
///
/// Only plain `.xlsx` inputs are supported; anything else fails with
/// [`SalvageError::Unsupported`] before any file is created.
pub fn salvage(input: &Path, output: &Path) -> Result<(), SalvageError> {
    if FileKind::from_path(input) != Some(FileKind::Xlsx) {
        return Err(SalvageError::Unsupported(input.to_path_buf()));
    }

    let mut workbook: Xlsx<_> =
        open_workbook(input).map_err(|e: XlsxError| SalvageError::Failed(e.to_string()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| SalvageError::Failed(format!("sheet '{}': {}", name, e)))?;
        sheets.push(SalvageSheet { name, range });
    }

    salvage_writer::write_values_workbook(output, &sheets)
        .map_err(|e| SalvageError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_non_xlsx() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("book.xlsb");
        std::fs::write(&input, b"whatever").unwrap();
        let output = dir.path().join("salvage_book.xlsb");

        let err = salvage(&input, &output).unwrap_err();
        assert!(matches!(err, SalvageError::Unsupported(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_unreadable_input_creates_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("corrupt.xlsx");
        std::fs::write(&input, b"not a zip at all").unwrap();
        let output = dir.path().join("salvage_corrupt.xlsx");

        let err = salvage(&input, &output).unwrap_err();
        assert!(matches!(err, SalvageError::Failed(_)));
        assert!(!output.exists());
    }
}
