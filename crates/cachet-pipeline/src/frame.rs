//! Separator-delimited record framing.
//!
//! Records carry no length prefix; the reader scans for the token. A
//! ciphertext record that happens to contain the token verbatim would split
//! wrongly — a latent risk of the format, documented and unchanged.

use std::io::{Read, Write};

use cachet_core::{CachetError, CachetResult};

/// Token written after the IV and after every ciphertext record.
pub const SEPARATOR: &[u8] = b"cachet-cipher-block-separator";

const FILL_SIZE: usize = 64 * 1024;

/// Writes `record + SEPARATOR` sequences.
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, record: &[u8]) -> CachetResult<()> {
        self.inner.write_all(record)?;
        self.inner.write_all(SEPARATOR)?;
        Ok(())
    }

    pub fn flush(&mut self) -> CachetResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Scans a byte stream for SEPARATOR-delimited records, buffering at most
/// one record (plus read-ahead) at a time.
pub struct RecordReader<R: Read> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// The next record, or `None` at a clean end of stream. Bytes after the
    /// last separator are an error: the file was truncated mid-record.
    pub fn next_record(&mut self) -> CachetResult<Option<Vec<u8>>> {
        let mut scanned = 0usize;
        loop {
            // Resume the scan just before the unscanned tail so a separator
            // straddling two fills is still found.
            let start = scanned.saturating_sub(SEPARATOR.len() - 1);
            if let Some(rel) = find_token(&self.buf[start..]) {
                let pos = start + rel;
                let record = self.buf[..pos].to_vec();
                self.buf.drain(..pos + SEPARATOR.len());
                return Ok(Some(record));
            }
            scanned = self.buf.len();

            let mut fill = [0u8; FILL_SIZE];
            let n = self.inner.read(&mut fill)?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(CachetError::MalformedFrame(format!(
                    "{} trailing bytes with no separator (truncated file?)",
                    self.buf.len()
                )));
            }
            self.buf.extend_from_slice(&fill[..n]);
        }
    }
}

fn find_token(haystack: &[u8]) -> Option<usize> {
    if haystack.len() < SEPARATOR.len() {
        return None;
    }
    haystack
        .windows(SEPARATOR.len())
        .position(|w| w == SEPARATOR)
}
