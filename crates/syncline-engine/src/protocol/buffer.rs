//! Per-stream record buffer.

use std::io;

use serde::Serialize;

use crate::sink::Sink;

/// Buffered size past which records are written through without a flush.
pub const WRITE_THROUGH_BYTES: usize = 4096;

/// Accumulates encoded record lines for one stream.
///
/// Lines are written to the shared [`Sink`] in one call, so a stream's
/// records never interleave with another stream's lines mid-batch.
#[derive(Debug)]
pub struct RecordBuffer {
    buf: Vec<u8>,
    sink: Sink,
}

impl RecordBuffer {
    pub fn new(sink: Sink) -> Self {
        Self { buf: Vec::with_capacity(WRITE_THROUGH_BYTES * 2), sink }
    }

    /// Append one message as a JSON line.
    pub fn push<T: Serialize + ?Sized>(&mut self, message: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.buf, message)?;
        self.buf.push(b'\n');
        Ok(())
    }

    /// Write the buffer through when it is over threshold or `force` is set.
    ///
    /// Returns whether anything was written. An empty buffer never touches
    /// the sink.
    pub fn flush(&mut self, force: bool) -> io::Result<bool> {
        if self.buf.is_empty() || (!force && self.buf.len() <= WRITE_THROUGH_BYTES) {
            return Ok(false);
        }
        self.sink.write_all(&self.buf)?;
        self.buf.clear();
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::CaptureWriter;
    use serde_json::json;

    fn buffer() -> (RecordBuffer, CaptureWriter) {
        let capture = CaptureWriter::default();
        (RecordBuffer::new(Sink::new(capture.clone())), capture)
    }

    #[test]
    fn small_batches_stay_buffered() {
        let (mut buf, capture) = buffer();
        buf.push(&json!({"id": 1})).unwrap();
        assert!(!buf.flush(false).unwrap());
        assert_eq!(capture.write_count(), 0);
        assert!(!buf.is_empty());
    }

    #[test]
    fn crossing_threshold_writes_through_once() {
        let (mut buf, capture) = buffer();
        let record = json!({"payload": "x".repeat(100)});
        while buf.len() <= WRITE_THROUGH_BYTES {
            assert!(!buf.flush(false).unwrap());
            buf.push(&record).unwrap();
        }
        assert!(buf.flush(false).unwrap());
        assert!(!buf.flush(false).unwrap());
        assert_eq!(capture.write_count(), 1);
        assert!(buf.is_empty());
        assert!(capture.lines().iter().all(|l| l == &record));
    }

    #[test]
    fn forced_flush_writes_remaining_records() {
        let (mut buf, capture) = buffer();
        buf.push(&json!({"id": 1})).unwrap();
        buf.push(&json!({"id": 2})).unwrap();
        assert!(buf.flush(true).unwrap());
        assert_eq!(capture.write_count(), 1);
        assert_eq!(capture.lines(), vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn forced_flush_of_empty_buffer_is_a_no_op() {
        let (mut buf, capture) = buffer();
        assert!(!buf.flush(true).unwrap());
        assert_eq!(capture.write_count(), 0);
    }
}
