use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}: {detail}")]
    Grammar {
        file: String,
        line: usize,
        detail: String,
    },

    #[error("classfile error")]
    ClassFile(#[from] fgk_classfile::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
