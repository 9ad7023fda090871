use thiserror::Error;

/// Error kinds surfaced by the scanner, the materializer, and the CLI.
///
/// Only [`Error::Usage`] is fatal to an entire run; it is raised by the CLI
/// binary (destination exists without `--force`, input cannot be opened or
/// mapped) and turned into a nonzero exit. Every other variant is scoped to
/// one candidate node or one directory entry: the scanner logs
/// [`Error::Structural`] (header CRC mismatch or short buffer at a
/// candidate position) and [`Error::Decompress`] and moves on to the next
/// candidate, and the materializer logs [`Error::Io`], [`Error::Corruption`]
/// and [`Error::Encoding`] and moves on to the next dirent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("header CRC mismatch at offset {offset:#x}")]
    Structural { offset: usize },

    #[error("corruption in node at offset {offset:#x}: {detail}")]
    Corruption { offset: usize, detail: String },

    #[error("decompression failed (compr={compr:#04x}): {detail}")]
    Decompress { compr: u8, detail: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),

    #[error("path component is not valid UTF-8: {0:?}")]
    Encoding(Vec<u8>),
}

pub type Result<T> = std::result::Result<T, Error>;
