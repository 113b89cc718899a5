use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort reading or writing a mapping source.
///
/// Note that a malformed *line* is not an error: the parsers skip it with a
/// diagnostic and keep going. Only the underlying reader failing ends the
/// parse.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
