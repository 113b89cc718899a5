use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("zip error")]
    Zip(#[from] zip::result::ZipError),

    #[error("classfile error")]
    ClassFile(#[from] fgk_classfile::Error),

    #[error("timed out waiting for the archive reader for `{path}`")]
    ReaderStalled { path: String },

    #[error("the archive reader for `{path}` terminated without a result")]
    ReaderDied { path: String },
}

pub type Result<T> = std::result::Result<T, Error>;
