//! Format detection and the common loader interface.

use std::path::Path;

use crate::block::TapeItem;
use crate::error::ParseError;
use crate::tap::TapLoader;
use crate::tzx::TzxLoader;
use crate::z80::Z80Loader;

/// A tape image parser: bytes in, item sequence out.
pub trait TapeLoader: std::fmt::Debug {
    /// Parse a complete in-memory image into an ordered item sequence.
    ///
    /// # Errors
    ///
    /// Any [`ParseError`] the format's validation rules produce.
    fn load(&self, data: &[u8]) -> Result<Vec<TapeItem>, ParseError>;
}

/// Pick a loader from a file extension (case-insensitive).
///
/// # Errors
///
/// `UnknownFormat` when the extension is missing or not one of the
/// supported image types.
pub fn loader_for_path(path: &Path) -> Result<&'static dyn TapeLoader, ParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "tap" => Ok(&TapLoader),
        "tzx" => Ok(&TzxLoader),
        "z80" => Ok(&Z80Loader),
        _ => Err(ParseError::UnknownFormat(path.display().to_string())),
    }
}

/// Load a tape image from disk, picking the loader from the extension.
///
/// # Errors
///
/// `UnknownFormat` for an unrecognized extension, `Io` if the file
/// cannot be read, or any [`ParseError`] from the format itself.
pub fn load_path(path: &Path) -> Result<Vec<TapeItem>, ParseError> {
    let loader = loader_for_path(path)?;
    let data = std::fs::read(path)
        .map_err(|e| ParseError::Io(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "loading tape image");
    loader.load(&data)
}
