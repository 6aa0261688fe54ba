use std::fmt::Debug;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::{Error, Result};

/// Persists a rendered report at a destination.
///
/// The meaning of the destination is up to the implementation. [`FileWriter`] treats it as
/// a file path.
#[cfg_attr(test, mockall::automock)]
pub trait Writer: Debug + Send + Sync + 'static {
    /// Writes the bytes to the destination, replacing anything already there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the bytes cannot be persisted.
    fn write(&self, bytes: &[u8], destination: &Path) -> Result<()>;
}

/// Writes reports to files, creating any missing parent directories.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileWriter;

impl Writer for FileWriter {
    fn write(&self, bytes: &[u8], destination: &Path) -> Result<()> {
        let to_write_error = |source: std::io::Error| Error::Write {
            destination: destination.to_path_buf(),
            source,
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(to_write_error)?;
        }

        fs::write(destination, bytes).map_err(to_write_error)?;

        debug!(destination = %destination.display(), bytes = bytes.len(), "report written");

        Ok(())
    }
}
