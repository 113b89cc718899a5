use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, rewriting or re-serializing a class file.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying reader failed or the buffer ended mid-structure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The buffer does not start with `0xCAFEBABE`.
    #[error("invalid class file magic: {0:#010x}")]
    InvalidMagic(u32),

    /// A constant pool index points outside the pool or at the unusable
    /// second slot of a long/double entry.
    #[error("constant pool index {0} out of range")]
    BadPoolIndex(u16),

    /// An unknown constant pool tag was encountered during parsing.
    #[error("unknown constant pool tag {tag} at entry {index}")]
    BadPoolTag { tag: u8, index: u16 },

    /// A pool entry had a different kind than the structure requires.
    #[error("constant pool entry {index} is not a {expected}")]
    WrongPoolEntry { index: u16, expected: &'static str },

    /// A modified-UTF-8 pool entry is not valid UTF-8.
    #[error("constant pool entry {0} is not valid UTF-8")]
    MalformedUtf8(u16),

    /// Interning pushed the pool past the `u16` index space.
    #[error("constant pool overflow (more than 65534 entries)")]
    PoolOverflow,

    /// An attribute payload with constant pool references cannot be carried
    /// across pools because its layout is unknown.
    #[error("cannot transplant unknown attribute '{name}' on {owner}")]
    UnknownAttribute { name: String, owner: String },

    /// An `invokedynamic` constant cannot be carried across class files
    /// because its bootstrap index points into the donor's BootstrapMethods
    /// attribute, which is not merged.
    #[error("cannot transplant invokedynamic constant at pool index {0}")]
    UnsupportedConstant(u16),

    /// An opcode outside the JVM instruction set was found while walking code.
    #[error("unknown opcode {opcode:#04x} at code offset {offset}")]
    BadOpcode { opcode: u8, offset: usize },

    /// A structured attribute payload did not match its documented layout.
    #[error("malformed '{name}' attribute: {detail}")]
    MalformedAttribute { name: &'static str, detail: String },
}
