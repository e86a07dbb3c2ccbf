//! Archive layer sources.
//!
//! A layer is a sequential tar stream (optionally gzip-compressed) that can
//! be re-opened from the start any number of times but never rewound.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use layercheck_core::error::{CheckError, Result};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

/// Read buffer used for every layer stream.
pub const LAYER_BUFFER_SIZE: usize = 64 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One ordered layer of a container image.
pub trait Layer {
    /// Content digest identifying the layer (e.g. "sha256:abc...").
    fn digest(&self) -> &str;

    /// Open a fresh stream of the uncompressed tar archive.
    fn open(&self) -> Result<Box<dyn Read + '_>>;
}

/// Wrap a buffered reader with a gzip decoder when the magic bytes match.
fn decompressing<'a, R: BufRead + 'a>(mut reader: R) -> Result<Box<dyn Read + 'a>> {
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// A layer stream that stops yielding bytes once `cancel` fires.
///
/// Lets a long entry copy or the trailing drain of a stream stop promptly
/// instead of waiting for the next tar header.
pub struct CancellableReader<'a, R> {
    inner: R,
    cancel: &'a CancellationToken,
}

impl<'a, R: Read> CancellableReader<'a, R> {
    pub fn new(inner: R, cancel: &'a CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl<R: Read> Read for CancellableReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, "operation cancelled"));
        }
        self.inner.read(buf)
    }
}

/// Error for a failed read of layer `layer`, or `Cancelled` if that is why it failed.
pub fn stream_error(
    cancel: &CancellationToken,
    layer: usize,
    err: impl std::fmt::Display,
) -> CheckError {
    if cancel.is_cancelled() {
        CheckError::Cancelled
    } else {
        CheckError::layer_read(layer, err)
    }
}

/// A layer blob stored on disk (`.tar` or `.tar.gz`).
#[derive(Debug, Clone)]
pub struct FileLayer {
    path: PathBuf,
    digest: String,
}

impl FileLayer {
    /// Create a layer with a digest already known (e.g. from a manifest).
    pub fn new(path: impl Into<PathBuf>, digest: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            digest: digest.into(),
        }
    }

    /// Create a layer from a file, computing its sha256 digest.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| {
            CheckError::OciImage(format!(
                "Failed to open layer file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut reader = BufReader::with_capacity(LAYER_BUFFER_SIZE, file);
        let mut hasher = Sha256::new();
        loop {
            let chunk = reader.fill_buf()?;
            if chunk.is_empty() {
                break;
            }
            hasher.update(chunk);
            let consumed = chunk.len();
            reader.consume(consumed);
        }
        let digest = format!("sha256:{}", hex::encode(hasher.finalize()));

        Ok(Self { path, digest })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Layer for FileLayer {
    fn digest(&self) -> &str {
        &self.digest
    }

    fn open(&self) -> Result<Box<dyn Read + '_>> {
        let file = File::open(&self.path).map_err(|e| {
            CheckError::OciImage(format!(
                "Failed to open layer file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        decompressing(BufReader::with_capacity(LAYER_BUFFER_SIZE, file))
    }
}

/// A layer held in memory.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    digest: String,
    bytes: Vec<u8>,
}

impl MemoryLayer {
    pub fn new(digest: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            digest: digest.into(),
            bytes,
        }
    }
}

impl Layer for MemoryLayer {
    fn digest(&self) -> &str {
        &self.digest
    }

    fn open(&self) -> Result<Box<dyn Read + '_>> {
        decompressing(self.bytes.as_slice())
    }
}
