//! Per-dialect configuration file readers
//!
//! Each dialect walks its own file set and produces sentinel-valued
//! partial records; the resolution engine merges them.
// (c) 2025 Ross Younger

pub(crate) mod hdb;
pub(crate) mod taylor;
pub(crate) mod v2;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::errors::{Error, Result};

/// The configuration dialects, in resolution priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Dialect {
    /// The structured keyword/value format
    #[strum(serialize = "Taylor")]
    Taylor,
    /// The legacy fixed-field format (`L.sys`, `L-devices`)
    #[strum(serialize = "V2")]
    V2,
    /// The System V format (`Systems`, `Devices`, `Dialers`, `Permissions`)
    #[strum(serialize = "HDB")]
    Hdb,
}

/// Opens a configuration file; a missing file is not an error, merely an
/// absent source.
pub(crate) fn open_optional(path: &Path) -> Result<Option<BufReader<File>>> {
    match File::open(path) {
        Ok(f) => Ok(Some(BufReader::new(f))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::from(e).in_file(path)),
    }
}

/// Whether a legacy-format line is blank or a comment
pub(crate) fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}
