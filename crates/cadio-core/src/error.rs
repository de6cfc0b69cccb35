//! Error types for CAD I/O operations
//!
//! Reader and writer implementations return these; the orchestrators in
//! `cadio-system` translate them into the fixed user-facing diagnostics sent
//! through the messenger while the underlying detail goes to the `log`
//! facade.

use crate::format::Format;
use std::path::PathBuf;
use thiserror::Error;

/// Error conditions raised by CAD I/O building blocks
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error while probing, reading or writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither content probing nor suffix fallback produced a format
    #[error("unknown format: '{}'", .0.display())]
    UnknownFormat(PathBuf),

    /// No registered factory advertises the format for reading
    #[error("no supporting reader for format {0}")]
    NoReader(Format),

    /// No registered factory advertises the format for writing
    #[error("no supporting writer for format {0}")]
    NoWriter(Format),

    /// A reader failed to parse its input file
    #[error("failed reading '{path}': {message}", path = .path.display())]
    Read {
        /// Path of the file being read
        path: PathBuf,
        /// Reader-specific detail
        message: String,
    },

    /// A writer could not gather the requested items
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// A writer failed to serialise its output file
    #[error("failed writing '{path}': {message}", path = .path.display())]
    Write {
        /// Path of the file being written
        path: PathBuf,
        /// Writer-specific detail
        message: String,
    },
}

impl Error {
    /// Create a read failure for `path`
    pub fn read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Read {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a write failure for `path`
    pub fn write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias for results with [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("expected Io variant"),
        }
    }

    #[test]
    fn test_display_texts() {
        let err = Error::NoReader(Format::Step);
        assert_eq!(err.to_string(), "no supporting reader for format STEP");

        let err = Error::UnknownFormat(PathBuf::from("part.xyz"));
        assert_eq!(err.to_string(), "unknown format: 'part.xyz'");

        let err = Error::read("a.step", "truncated entity section");
        assert_eq!(
            err.to_string(),
            "failed reading 'a.step': truncated entity section"
        );
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<()> {
            Err(Error::NoWriter(Format::Obj))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        match outer() {
            Err(Error::NoWriter(format)) => assert_eq!(format, Format::Obj),
            _ => panic!("expected NoWriter to propagate"),
        }
    }
}
