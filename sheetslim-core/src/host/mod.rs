//! Workbook host abstraction
//!
//! Cleanup steps never touch the package directly; they talk to a
//! [`WorkbookHost`] so the pipeline can be exercised against a mock in
//! tests. [`PackageHost`] is the real implementation backed by the
//! zip/XML package format.

pub mod package;
pub(crate) mod paths;
pub mod sheet_xml;
pub mod workbook_xml;

pub use package::PackageHost;

use anyhow::Result;
use std::path::Path;

use crate::format::FileKind;

/// Result of deleting a sheet's ghost area
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimOutcome {
    pub rows_deleted: usize,
    pub cols_deleted: usize,
}

/// Mutating access to an open workbook.
///
/// Methods return `Err` when the workbook cannot satisfy the request;
/// callers decide whether that is fatal or just a skipped fixup.
pub trait WorkbookHost {
    /// Sheet names in workbook order
    fn sheet_names(&mut self) -> Result<Vec<String>>;

    /// External workbook sources this workbook links to
    fn link_sources(&mut self) -> Result<Vec<String>>;

    /// Sever one external link, freezing dependent formulas to their
    /// cached values
    fn break_link(&mut self, source: &str) -> Result<()>;

    /// Workbook-level defined names, in document order
    fn defined_names(&mut self) -> Result<Vec<String>>;

    fn delete_defined_name(&mut self, name: &str) -> Result<()>;

    /// Re-encode the images anchored on a sheet; returns how many were
    /// replaced with smaller bytes
    fn recompress_images(&mut self, sheet: &str, jpeg_quality: u8) -> Result<usize>;

    /// Replace every formula on a sheet with its cached value
    fn flatten_formulas(&mut self, sheet: &str) -> Result<usize>;

    /// Delete rows and columns past the sheet's real data extent
    fn trim_ghost_area(&mut self, sheet: &str) -> Result<TrimOutcome>;

    /// Drop formatting that extends past the data extent
    fn clear_trailing_formats(&mut self, sheet: &str) -> Result<usize>;

    fn remove_comments(&mut self, sheet: &str) -> Result<usize>;

    fn remove_hyperlinks(&mut self, sheet: &str) -> Result<usize>;

    fn named_style_count(&mut self) -> Result<usize>;

    /// Keep only the first `cap` named styles; returns how many were cut
    fn truncate_named_styles(&mut self, cap: usize) -> Result<usize>;

    /// Write the workbook out in the given format
    fn save_as(&mut self, path: &Path, kind: FileKind) -> Result<()>;
}
