//! Purpose: Hold the run-wide output and open-mode configuration.
//! Exports: `OpenMode`, `Settings`.
//! Invariants: Separators and stand-ins are already escape-decoded raw bytes.

use bstr::BString;

/// How each target database file is opened.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    ReadWriteCreate,
}

/// Immutable run configuration, built once in `main` and passed by reference.
#[derive(Clone, Debug)]
pub struct Settings {
    pub open_mode: OpenMode,
    pub field_sep: BString,
    pub record_sep: BString,
    pub null_stand_in: BString,
    /// When absent, BLOB columns are escape-encoded instead.
    pub blob_stand_in: Option<BString>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            open_mode: OpenMode::ReadOnly,
            field_sep: BString::from("\t"),
            record_sep: BString::from("\n"),
            null_stand_in: BString::from("[NULL]"),
            blob_stand_in: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OpenMode, Settings};

    #[test]
    fn defaults_match_documented_behavior() {
        let settings = Settings::default();
        assert_eq!(settings.open_mode, OpenMode::ReadOnly);
        assert_eq!(settings.field_sep.as_slice(), b"\t");
        assert_eq!(settings.record_sep.as_slice(), b"\n");
        assert_eq!(settings.null_stand_in.as_slice(), b"[NULL]");
        assert!(settings.blob_stand_in.is_none());
    }
}
