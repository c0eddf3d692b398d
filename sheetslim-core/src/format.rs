//! Spreadsheet format recognition and output path derivation

use serde::Serialize;
use std::path::{Path, PathBuf};

/// The four recognized workbook formats.
///
/// The numeric codes are the host application's SaveAs format codes,
/// kept so reports stay comparable with the legacy tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Xls,
    Xlsx,
    Xlsm,
    Xlsb,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "xls" => Some(FileKind::Xls),
            "xlsx" => Some(FileKind::Xlsx),
            "xlsm" => Some(FileKind::Xlsm),
            "xlsb" => Some(FileKind::Xlsb),
            _ => None,
        }
    }

    pub fn format_code(&self) -> u32 {
        match self {
            FileKind::Xls => 56,
            FileKind::Xlsx => 51,
            FileKind::Xlsm => 52,
            FileKind::Xlsb => 50,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Xls => "xls",
            FileKind::Xlsx => "xlsx",
            FileKind::Xlsm => "xlsm",
            FileKind::Xlsb => "xlsb",
        }
    }

    /// Whether the format is an OOXML zip package the host can rewrite
    pub fn is_package(&self) -> bool {
        !matches!(self, FileKind::Xls)
    }
}

/// Where lightened copies land when no output directory is configured
pub fn desktop_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Desktop")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn stem_of(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workbook")
        .to_string()
}

/// Primary destination: `<stem>_light<ext>` in `out_dir`
pub fn light_path(input: &Path, out_dir: &Path, kind: FileKind) -> PathBuf {
    out_dir.join(format!("{}_light.{}", stem_of(input), kind.extension()))
}

/// Fallback destination when the primary save fails: `<stem>_fix.xlsx`
pub fn fix_path(input: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}_fix.xlsx", stem_of(input)))
}

/// Salvage destination: `salvage_<original filename>`
pub fn salvage_path(input: &Path, out_dir: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("workbook.xlsx");
    out_dir.join(format!("salvage_{}", file_name))
}
