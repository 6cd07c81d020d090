//! Backward scan for the last line of the log.
//!
//! The appender needs only the final record's `chain_hash`, so instead of
//! reading the whole file it seeks to the end and reads fixed-size blocks
//! backwards until it has seen a newline in front of the last non-blank line.

use std::io::{self, Read, Seek, SeekFrom};

use serde_json::Value;

use chainlog_contracts::record::fields;

/// Bytes read per step of the backward scan.
pub const TAIL_BLOCK_SIZE: usize = 4096;

/// The end of a log file, as seen by the backward scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tail {
    /// The last non-blank line, trimmed, or `None` if the file is blank.
    pub last_line: Option<Vec<u8>>,
    /// Whether the file is empty or ends in `\n`. When false, a new record
    /// must be preceded by a newline to start on its own line.
    pub terminated: bool,
}

/// Read the tail of `reader` in blocks of `block_size` bytes.
///
/// Each block is searched once, so the cost is linear in the length of the
/// last line plus any trailing blank bytes.
pub fn read_tail<R: Read + Seek>(reader: &mut R, block_size: usize) -> io::Result<Tail> {
    let block_size = block_size.max(1) as u64;
    let end = reader.seek(SeekFrom::End(0))?;

    // Blocks holding part of the last line, newest first. Together they
    // cover `pos..` up to at least `content_end`.
    let mut blocks: Vec<Vec<u8>> = Vec::new();
    let mut pos = end;
    let mut terminated = true;
    let mut content_end: Option<u64> = None;
    let mut line_start = 0u64;

    while pos > 0 {
        let step = block_size.min(pos);
        pos -= step;
        reader.seek(SeekFrom::Start(pos))?;
        let mut block = vec![0u8; step as usize];
        reader.read_exact(&mut block)?;

        if pos + step == end {
            terminated = block.last() == Some(&b'\n');
        }

        let search_to = match content_end {
            Some(_) => block.len(),
            None => match block.iter().rposition(|b| !b.is_ascii_whitespace()) {
                Some(i) => {
                    content_end = Some(pos + i as u64 + 1);
                    i
                }
                // Trailing blank block: nothing of the last line in it.
                None => continue,
            },
        };

        let newline = block[..search_to].iter().rposition(|&b| b == b'\n');
        blocks.push(block);
        if let Some(nl) = newline {
            line_start = pos + nl as u64 + 1;
            break;
        }
    }

    let Some(content_end) = content_end else {
        return Ok(Tail {
            last_line: None,
            terminated,
        });
    };

    let mut joined = Vec::with_capacity(blocks.iter().map(Vec::len).sum());
    for block in blocks.iter().rev() {
        joined.extend_from_slice(block);
    }
    let line = &joined[(line_start - pos) as usize..(content_end - pos) as usize];
    let skip = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());

    Ok(Tail {
        last_line: Some(line[skip..].to_vec()),
        terminated,
    })
}

/// What the appender found when looking up the previous chain hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailLookup {
    /// The file holds no non-blank line.
    Empty { terminated: bool },
    /// The last record's `chain_hash`.
    Found { chain_hash: String, terminated: bool },
    /// The last line parses but predates chain hashing.
    Legacy { terminated: bool },
    /// The last line could not be read or parsed.
    Unreadable { reason: String, terminated: bool },
}

impl TailLookup {
    /// Whether a separating newline must be written before the next record.
    pub fn needs_separator(&self) -> bool {
        match self {
            TailLookup::Empty { terminated }
            | TailLookup::Found { terminated, .. }
            | TailLookup::Legacy { terminated }
            | TailLookup::Unreadable { terminated, .. } => !terminated,
        }
    }
}

/// Locate the `chain_hash` of the last record readable from `log`.
///
/// Never fails: every problem is classified so the caller can decide whether
/// to restart the chain or refuse the append.
pub fn lookup_prev_chain_hash<R: Read + Seek>(log: &mut R, block_size: usize) -> TailLookup {
    let tail = match read_tail(log, block_size) {
        Ok(tail) => tail,
        Err(e) => {
            return TailLookup::Unreadable {
                reason: format!("cannot read log tail: {}", e),
                terminated: true,
            }
        }
    };
    let terminated = tail.terminated;

    let Some(line) = tail.last_line else {
        return TailLookup::Empty { terminated };
    };

    let value: Value = match serde_json::from_slice(&line) {
        Ok(value) => value,
        Err(e) => {
            return TailLookup::Unreadable {
                reason: format!("last line is not valid JSON: {}", e),
                terminated,
            }
        }
    };

    match value.get(fields::CHAIN_HASH) {
        Some(Value::String(hash)) => TailLookup::Found {
            chain_hash: hash.clone(),
            terminated,
        },
        None if value.is_object() => TailLookup::Legacy { terminated },
        _ => TailLookup::Unreadable {
            reason: "last line has no string chain_hash".to_string(),
            terminated,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn tail_of(data: &str, block: usize) -> Tail {
        read_tail(&mut Cursor::new(data.as_bytes().to_vec()), block).unwrap()
    }

    #[test]
    fn empty_input_has_no_line() {
        let tail = tail_of("", 8);
        assert_eq!(tail.last_line, None);
        assert!(tail.terminated);
    }

    #[test]
    fn blank_input_has_no_line() {
        let tail = tail_of("\n  \n\n", 2);
        assert_eq!(tail.last_line, None);
        assert!(tail.terminated);
    }

    #[test]
    fn finds_last_line_across_blocks() {
        let data = format!("{}\n{}\n\n", "a".repeat(50), "b".repeat(37));
        for block in [1, 3, 7, 16, 4096] {
            let tail = tail_of(&data, block);
            assert_eq!(tail.last_line, Some("b".repeat(37).into_bytes()), "block size {block}");
            assert!(tail.terminated);
        }
    }

    #[test]
    fn single_line_without_newline() {
        let tail = tail_of("  {\"a\":1}", 4);
        assert_eq!(tail.last_line, Some(b"{\"a\":1}".to_vec()));
        assert!(!tail.terminated);
    }

    #[test]
    fn trailing_partial_line_is_the_last_line() {
        let tail = tail_of("{\"chain_hash\":\"x\"}\n{\"trunc", 5);
        assert_eq!(tail.last_line, Some(b"{\"trunc".to_vec()));
        assert!(!tail.terminated);
    }

    /// Counts the bytes handed out by the wrapped reader.
    struct CountingReader {
        inner: Cursor<Vec<u8>>,
        bytes_read: usize,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.bytes_read += n;
            Ok(n)
        }
    }

    impl Seek for CountingReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn long_last_line_is_scanned_in_linear_time() {
        let payload = "y".repeat(8 * 1024 * 1024);
        let last = format!("{{\"x\":\"{}\"}}", payload);
        let data = format!("{{\"a\":1}}\n{}\n", last);
        let mut reader = CountingReader {
            inner: Cursor::new(data.into_bytes()),
            bytes_read: 0,
        };

        let started = std::time::Instant::now();
        let tail = read_tail(&mut reader, TAIL_BLOCK_SIZE).unwrap();
        let elapsed = started.elapsed();

        assert_eq!(tail.last_line.as_deref(), Some(last.as_bytes()));
        assert!(tail.terminated);
        // Only the last line, its newline, and at most one block of the
        // previous line are read.
        assert!(reader.bytes_read <= last.len() + 1 + TAIL_BLOCK_SIZE);
        assert!(elapsed < std::time::Duration::from_secs(5), "took {elapsed:?}");
    }

    #[test]
    fn lookup_classifies_tails() {
        let lookup = |data: &str| lookup_prev_chain_hash(&mut Cursor::new(data.as_bytes()), 16);

        assert_eq!(lookup(""), TailLookup::Empty { terminated: true });
        assert_eq!(
            lookup("{\"event\":\"old\"}\n"),
            TailLookup::Legacy { terminated: true }
        );
        assert_eq!(
            lookup("{\"event\":\"old\"}\n{\"chain_hash\":\"abc\"}\n"),
            TailLookup::Found {
                chain_hash: "abc".into(),
                terminated: true
            }
        );

        let partial = lookup("{\"chain_hash\":\"abc\"}\n{\"chain_");
        assert!(matches!(partial, TailLookup::Unreadable { terminated: false, .. }));
        assert!(partial.needs_separator());
    }
}
