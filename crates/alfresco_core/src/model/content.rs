//! Content stream carrier.
//!
//! # Invariants
//! - The underlying reader is owned; dropping the stream closes it.
//! - `length`, when known, is the exact byte count the reader yields.

use std::fmt::{Debug, Formatter};
use std::io::{Cursor, Read};

/// Document content with its metadata.
pub struct ContentStream {
    pub file_name: Option<String>,
    pub length: Option<u64>,
    pub mime_type: String,
    stream: Box<dyn Read + Send>,
}

impl ContentStream {
    pub fn new(
        file_name: Option<String>,
        length: Option<u64>,
        mime_type: impl Into<String>,
        stream: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            file_name,
            length,
            mime_type: mime_type.into(),
            stream,
        }
    }

    /// Wraps in-memory bytes; `length` is set to `bytes.len()`.
    pub fn from_bytes(
        file_name: Option<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let length = bytes.len() as u64;
        Self::new(
            file_name,
            Some(length),
            mime_type,
            Box::new(Cursor::new(bytes)),
        )
    }

    /// Consumes the stream, yielding the raw reader.
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.stream
    }

    /// Reads the whole stream into memory. The reader is dropped on every path.
    pub fn read_to_vec(self) -> std::io::Result<Vec<u8>> {
        let capacity = self.length.unwrap_or(0).min(16 * 1024 * 1024) as usize;
        let mut reader = self.stream;
        let mut bytes = Vec::with_capacity(capacity);
        reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl Debug for ContentStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStream")
            .field("file_name", &self.file_name)
            .field("length", &self.length)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}
