use std::io::{self, ErrorKind, Read};

use bytes::{Buf, BytesMut};

use crate::registry::{Decoded, MessageRegistry};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// One item read back from a raw channel stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<M> {
    /// A decoded record and its offset in the stream.
    Record { offset: u64, message: M },
    /// An unrecognized type code that was skipped.
    Unknown { offset: u64, code: u16 },
    /// Trailing bytes that never formed a complete record.
    Trailing { offset: u64, bytes: usize },
}

/// Reads records from any `Read` source carrying one channel's raw bytes,
/// such as a raw log file.
///
/// Handles partial reads internally; callers always get whole records.
pub struct RecordReader<T, M> {
    inner: T,
    registry: MessageRegistry<M>,
    buf: BytesMut,
    offset: u64,
    eof: bool,
}

impl<T: Read, M> RecordReader<T, M> {
    pub fn new(inner: T, registry: MessageRegistry<M>) -> Self {
        Self {
            inner,
            registry,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            offset: 0,
            eof: false,
        }
    }

    /// Read the next item, or `Ok(None)` once the source is exhausted.
    pub fn next_item(&mut self) -> io::Result<Option<StreamItem<M>>> {
        loop {
            let decoded = self
                .registry
                .decode_next(&self.buf)
                .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;

            match decoded {
                Decoded::Message { message, consumed } => {
                    let offset = self.advance(consumed);
                    return Ok(Some(StreamItem::Record { offset, message }));
                }
                Decoded::Unknown { code, skipped } => {
                    let offset = self.advance(skipped.max(1));
                    return Ok(Some(StreamItem::Unknown { offset, code }));
                }
                Decoded::Incomplete { .. } if self.eof => {
                    if self.buf.is_empty() {
                        return Ok(None);
                    }
                    let bytes = self.buf.len();
                    let offset = self.advance(bytes);
                    return Ok(Some(StreamItem::Trailing { offset, bytes }));
                }
                Decoded::Incomplete { .. } => self.fill()?,
            }
        }
    }

    pub fn registry(&self) -> &MessageRegistry<M> {
        &self.registry
    }

    /// Bytes of the source consumed so far.
    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn advance(&mut self, n: usize) -> u64 {
        let start = self.offset;
        let n = n.min(self.buf.len());
        self.buf.advance(n);
        self.offset += n as u64;
        start
    }
}

impl<T: Read, M> Iterator for RecordReader<T, M> {
    type Item = io::Result<StreamItem<M>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_item().transpose()
    }
}
