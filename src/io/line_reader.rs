use std::io::{self, ErrorKind, Read};

use log::warn;

pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

const READ_CHUNK: usize = 256;

/// Splits a byte stream into `\n` terminated records.
///
/// Bytes are accumulated until a terminator shows up. A read timeout is not a
/// fault: `next_line` just reports that no complete line is available yet.
/// End of stream and any other I/O error are reported as errors, after which
/// the reader (and the partial line it holds) should be dropped.
pub struct FramedLineReader<R> {
    reader: R,
    pending: Vec<u8>,
    max_line_len: usize,
    overflowing: bool,
}

impl<R: Read> FramedLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_line_len(reader, DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(reader: R, max_line_len: usize) -> Self {
        Self {
            reader,
            pending: Vec::with_capacity(READ_CHUNK),
            max_line_len,
            overflowing: false,
        }
    }

    /// Returns the next complete line without its terminator, `Ok(None)` if
    /// the underlying read timed out before a full line arrived.
    pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "telemetry stream closed",
                    ));
                }
                Ok(n) => self.push(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Bytes received since the last complete line.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let pos = self.pending.iter().position(|b| *b == b'\n')?;

            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();

            if self.overflowing {
                // Tail of an oversized record, already reported
                self.overflowing = false;
                continue;
            }

            if line.len() > self.max_line_len {
                warn!("Discarding {} byte record (limit {})", line.len(), self.max_line_len);
                continue;
            }

            return Some(line);
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        if self.pending.len() > self.max_line_len && !self.pending.contains(&b'\n') {
            if !self.overflowing {
                warn!(
                    "Discarding record longer than {} bytes without terminator",
                    self.max_line_len
                );
            }

            self.pending.clear();
            self.overflowing = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::io::transport::scripted::{Chunk, ScriptedStream};

    use super::*;

    #[test]
    fn test_split_lines() {
        let stream = ScriptedStream::data(b"first\nsecond\nthi");
        let mut reader = FramedLineReader::new(stream);

        assert_eq!(reader.next_line().unwrap(), Some(b"first".to_vec()));
        assert_eq!(reader.next_line().unwrap(), Some(b"second".to_vec()));

        // Partial line stays buffered while the port is idle
        assert_eq!(reader.next_line().unwrap(), None);
        assert_eq!(reader.pending(), b"thi");
    }

    #[test]
    fn test_line_across_reads() {
        let stream = ScriptedStream::new(vec![
            Chunk::Data(b"{\"key\":".to_vec()),
            Chunk::Data(b" \"/a\"}".to_vec()),
            Chunk::Data(b"\n".to_vec()),
        ]);
        let mut reader = FramedLineReader::new(stream);

        assert_eq!(
            reader.next_line().unwrap(),
            Some(b"{\"key\": \"/a\"}".to_vec())
        );
    }

    #[test]
    fn test_empty_line() {
        let mut reader = FramedLineReader::new(ScriptedStream::data(b"\nx\n"));

        assert_eq!(reader.next_line().unwrap(), Some(vec![]));
        assert_eq!(reader.next_line().unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_eof_is_error() {
        let mut reader = FramedLineReader::new(&b"partial"[..]);

        let err = reader.next_line().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_fault_is_error() {
        let stream = ScriptedStream::new(vec![
            Chunk::Data(b"ok\npart".to_vec()),
            Chunk::Fault(ErrorKind::BrokenPipe),
        ]);
        let mut reader = FramedLineReader::new(stream);

        assert_eq!(reader.next_line().unwrap(), Some(b"ok".to_vec()));
        assert_eq!(reader.next_line().unwrap_err().kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let stream = ScriptedStream::new(vec![
            Chunk::Fault(ErrorKind::Interrupted),
            Chunk::Data(b"x\n".to_vec()),
        ]);
        let mut reader = FramedLineReader::new(stream);

        assert_eq!(reader.next_line().unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_oversized_record_is_dropped() {
        let stream = ScriptedStream::new(vec![
            Chunk::Data(b"0123456789".to_vec()),
            Chunk::Data(b"abcdef\nok\n".to_vec()),
            Chunk::Data(b"0123456789ab\nfine\n".to_vec()),
        ]);
        let mut reader = FramedLineReader::with_max_line_len(stream, 8);

        assert_eq!(reader.next_line().unwrap(), Some(b"ok".to_vec()));
        assert_eq!(reader.next_line().unwrap(), Some(b"fine".to_vec()));
        assert_eq!(reader.next_line().unwrap(), None);
    }
}
