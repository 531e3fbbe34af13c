//! MD5 content identity of build artifacts.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{BuildError, Result};

/// MD5 of a file's bytes as a lowercase hex string.
pub fn file_md5(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| BuildError::fs(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Md5::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| BuildError::fs(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn bytes_md5(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}
