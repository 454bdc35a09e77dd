//! Container file naming: `<base>-NNNNNN.pgr`

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::{Result, StreamError};

/// Largest index that still fits the six digit pattern
pub const MAX_FILE_INDEX: u32 = 999_999;

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(.+)-(\d{6})\.pgr$").expect("file name pattern is valid")
    })
}

/// Name of file `index` of the stream `base`
#[must_use]
pub fn pgr_filename(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("-{index:06}.pgr"));
    PathBuf::from(name)
}

/// Split a full file name into stream base and file index
///
/// # Errors
///
/// Returns error if the name does not follow the pattern
pub fn parse_base_name_and_index(filename: &Path) -> Result<(PathBuf, u32)> {
    let name = filename
        .to_str()
        .ok_or_else(|| StreamError::InvalidFileName(filename.display().to_string()))?;

    let captures = file_name_pattern()
        .captures(name)
        .ok_or_else(|| StreamError::InvalidFileName(name.to_string()))?;

    let index = captures[2]
        .parse()
        .map_err(|_| StreamError::InvalidFileName(name.to_string()))?;

    Ok((PathBuf::from(&captures[1]), index))
}

/// Find the first existing file of a stream
///
/// `name` is either a stream base name or the name of one of its files.
///
/// # Errors
///
/// Returns error if neither interpretation names an existing file
pub fn resolve_stream(name: &Path, index: u32) -> Result<(PathBuf, u32)> {
    let canonical = pgr_filename(name, index);
    if canonical.exists() {
        return Ok((name.to_path_buf(), index));
    }

    let Ok((base, parsed_index)) = parse_base_name_and_index(name) else {
        return Err(StreamError::FileNotFound(canonical));
    };

    let filename = pgr_filename(&base, parsed_index);
    if !filename.exists() {
        return Err(StreamError::FileNotFound(filename));
    }

    Ok((base, parsed_index))
}
