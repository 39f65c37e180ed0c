use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::soc::memory::Memory;

#[derive(Debug)]
pub enum LoaderError {
    Io { path: PathBuf, source: io::Error },
    Empty { path: PathBuf },
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::Io { path, source } => {
                write!(f, "failed to read image '{}': {source}", path.display())
            }
            LoaderError::Empty { path } => write!(f, "image '{}' is empty", path.display()),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoaderError::Io { source, .. } => Some(source),
            LoaderError::Empty { .. } => None,
        }
    }
}

/// Copies `bytes` into memory starting at `address` and returns the count.
pub fn load_bytes(memory: &mut Memory, address: u64, bytes: &[u8]) -> usize {
    let written = memory.write_bytes(address, bytes);
    tracing::debug!(address, bytes = written, "image loaded");
    written
}

/// Reads a raw binary image from disk and loads it at `address`.
pub fn load_image<P: AsRef<Path>>(
    memory: &mut Memory,
    address: u64,
    path: P,
) -> Result<usize, LoaderError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(LoaderError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(load_bytes(memory, address, &bytes))
}
