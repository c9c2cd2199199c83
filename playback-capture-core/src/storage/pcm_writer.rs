use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::format::AudioFormat;

/// Buffered writer for a raw, headerless PCM capture file.
///
/// Bytes are written verbatim, never widened or re-encoded. Writes are kept
/// frame-aligned: a trailing partial frame is held back until the next write
/// completes it, so the file length is always a whole number of frames.
///
/// ## File Format
///
/// ```text
/// [sample 0][sample 1]...   (format.bits_per_sample wide, native byte order)
/// ```
pub struct PcmFileWriter {
    file_path: PathBuf,
    output: BufWriter<File>,
    frame_bytes: usize,
    pending: Vec<u8>,
    hasher: Sha256,
    bytes_written: u64,
}

impl PcmFileWriter {
    /// Create (or truncate) the destination, creating missing parent directories.
    pub fn create(file_path: PathBuf, format: &AudioFormat, buffer_capacity: usize) -> Result<Self, CaptureError> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::WriteFailed(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&file_path).map_err(|e| {
            CaptureError::WriteFailed(format!("failed to create {}: {}", file_path.display(), e))
        })?;

        Ok(Self {
            file_path,
            output: BufWriter::with_capacity(buffer_capacity.max(1), file),
            frame_bytes: format.bytes_per_frame().max(1),
            pending: Vec::new(),
            hasher: Sha256::new(),
            bytes_written: 0,
        })
    }

    /// Append captured bytes, keeping the file frame-aligned.
    pub fn write(&mut self, mut data: &[u8]) -> Result<(), CaptureError> {
        if !self.pending.is_empty() {
            let take = (self.frame_bytes - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() < self.frame_bytes {
                return Ok(());
            }
            let frame = std::mem::take(&mut self.pending);
            self.write_raw(&frame)?;
        }

        let whole = data.len() - data.len() % self.frame_bytes;
        self.write_raw(&data[..whole])?;
        self.pending.extend_from_slice(&data[whole..]);
        Ok(())
    }

    /// Push buffered bytes to the file.
    pub fn flush(&mut self) -> Result<(), CaptureError> {
        self.output
            .flush()
            .map_err(|e| CaptureError::WriteFailed(format!("flush failed: {}", e)))
    }

    /// Flush and close the file.
    ///
    /// Returns the byte count on disk and its SHA-256 hex digest. A partial
    /// frame still held back is discarded. If the flush fails the buffered
    /// bytes are dropped, not flushed again on close.
    pub fn finish(mut self) -> Result<(u64, String), CaptureError> {
        if !self.pending.is_empty() {
            log::debug!(
                "Discarding {} byte(s) of incomplete frame at end of {}",
                self.pending.len(),
                self.file_path.display()
            );
        }

        if let Err(e) = self.flush() {
            self.abandon();
            return Err(e);
        }

        let checksum = hex_encode(&self.hasher.finalize());
        Ok((self.bytes_written, checksum))
    }

    /// Close the file after a failed write without flushing again.
    ///
    /// Bytes still buffered are discarded. Returns the bytes that reached
    /// the file.
    pub fn abandon(self) -> u64 {
        let (_file, buffered) = self.output.into_parts();
        let unflushed = buffered.unwrap_or_else(|panicked| panicked.into_inner()).len() as u64;
        if unflushed > 0 {
            log::debug!(
                "Dropping {} unflushed byte(s) of {}",
                unflushed,
                self.file_path.display()
            );
        }
        self.bytes_written.saturating_sub(unflushed)
    }

    /// Bytes accepted so far, buffered or on disk (excluding a held-back
    /// partial frame).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        if data.is_empty() {
            return Ok(());
        }
        self.output
            .write_all(data)
            .map_err(|e| CaptureError::WriteFailed(format!("write failed: {}", e)))?;
        self.hasher.update(data);
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
