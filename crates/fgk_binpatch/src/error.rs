//! Error types for the binary patch engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("zip error")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid diff magic: {found:#010x} (expected 0xd1ffd1ff)")]
    InvalidMagic { found: u32 },

    #[error("unsupported diff version: {0} (expected 4)")]
    UnsupportedVersion(u8),

    #[error("diff stream ended in the middle of an instruction at offset {at}")]
    TruncatedDiff { at: u64 },

    #[error("negative operand {value} in instruction at diff offset {at}")]
    NegativeOperand { value: i64, at: u64 },

    #[error(
        "copy of {len} bytes at source offset {offset} overruns the original \
         ({size} bytes), instruction at diff offset {at}"
    )]
    SourceOverrun {
        offset: u64,
        len: u64,
        size: usize,
        at: u64,
    },

    #[error("checksum mismatch for `{class}`: expected {expected:#010x}, input hashes to {actual:#010x}")]
    ChecksumMismatch {
        class: String,
        expected: u32,
        actual: u32,
    },

    #[error("patch record `{name}` is malformed: {detail}")]
    MalformedRecord { name: String, detail: String },
}

pub type Result<T> = std::result::Result<T, Error>;
