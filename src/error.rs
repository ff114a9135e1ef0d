//! Crate-wide error type.
//!
//! A small, closed set of variants covering the handful of ways the
//! compiler can actually fail to produce output, with a `From` conversion
//! from the standard library error type we touch at the edges (file I/O).
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    /// Reading the input file or writing the output file failed.
    Io(io::Error),
    /// The input file does not exist or could not be opened.
    MissingInput(String),
    /// One of the fixed-size startup allocations (code buffer, data buffer,
    /// compiler record) could not be made.
    OutOfMemory(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{err}"),
            Error::MissingInput(path) => write!(f, "error: cannot open input file '{path}'"),
            Error::OutOfMemory(what) => write!(f, "error: out of memory allocating {what}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
