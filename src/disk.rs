//! Page-granular disk access.
//!
//! All run files are read and written one page at a time, where a page is exactly `b` records
//! (the blocking factor). Every page transfer is counted; these counts are the cost metric of a
//! sort.

use std::fmt;
use std::io::{self, prelude::*};

use log;

use crate::record::{Record, Slot, RECORD_SIZE};

/// In-memory page buffer holding up to `b` slots.
#[derive(Debug, Clone)]
pub struct Page {
    capacity: usize,
    slots: Vec<Slot>,
}

impl Page {
    /// Creates an empty page buffer for a blocking factor of `capacity`.
    pub fn new(capacity: usize) -> Self {
        Page {
            capacity,
            slots: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Number of slots holding real records.
    pub fn valid_len(&self) -> usize {
        self.slots.iter().filter(|slot| matches!(slot, Slot::Record(_))).count()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get(&self, idx: usize) -> Option<&Slot> {
        self.slots.get(idx)
    }

    /// Appends a record. The caller is responsible for not overfilling the page.
    pub fn push(&mut self, record: Record) {
        debug_assert!(!self.is_full());
        self.slots.push(Slot::Record(record));
    }

    /// Fills the remaining slots with padding.
    pub fn pad(&mut self) {
        self.slots.resize(self.capacity, Slot::Padding);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Iterates over the real records of the page.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.slots.iter().filter_map(Slot::record)
    }
}

/// Page I/O counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IoStats {
    pub pages_read: u64,
    pub pages_written: u64,
}

impl fmt::Display for IoStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pages read: {}, pages written: {}", self.pages_read, self.pages_written)
    }
}

/// Disk manager. Transfers whole pages between streams and page buffers and keeps track of the
/// number of pages moved. It never owns a stream beyond the duration of a call.
#[derive(Debug)]
pub struct DiskManager {
    blocking_factor: usize,
    buf: Vec<u8>,
    stats: IoStats,
}

impl DiskManager {
    /// Creates a disk manager for pages of `blocking_factor` records.
    pub fn new(blocking_factor: usize) -> Self {
        DiskManager {
            blocking_factor,
            buf: vec![0; blocking_factor * RECORD_SIZE],
            stats: IoStats::default(),
        }
    }

    pub fn blocking_factor(&self) -> usize {
        self.blocking_factor
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.blocking_factor * RECORD_SIZE
    }

    pub fn stats(&self) -> IoStats {
        self.stats
    }

    /// Reads the next page from the stream into `page`.
    ///
    /// Returns `Ok(false)` only if the stream has no more bytes. A short page is completed with
    /// padding; trailing bytes that do not form a whole record are dropped. Any I/O failure is
    /// returned as an error rather than being taken for the end of the stream.
    pub fn read_page<R: Read>(&mut self, reader: &mut R, page: &mut Page) -> io::Result<bool> {
        let page_size = self.page_size();
        let bytes_read = read_full(reader, &mut self.buf[..page_size])?;
        if bytes_read == 0 {
            return Ok(false);
        }

        page.clear();
        for chunk in self.buf[..bytes_read].chunks_exact(RECORD_SIZE) {
            page.slots.push(Slot::decode(chunk));
        }
        page.pad();

        self.stats.pages_read += 1;
        log::trace!("page read ({} bytes, {} valid records)", bytes_read, page.valid_len());

        return Ok(true);
    }

    /// Writes a full page to the stream. The page must already be padded to the blocking factor.
    pub fn write_page<W: Write>(&mut self, writer: &mut W, page: &Page) -> io::Result<()> {
        if page.len() != self.blocking_factor {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "partial page write ({} of {} records)",
                    page.len(),
                    self.blocking_factor
                ),
            ));
        }

        let page_size = self.page_size();
        for (slot, chunk) in page.slots.iter().zip(self.buf[..page_size].chunks_exact_mut(RECORD_SIZE)) {
            slot.encode(chunk);
        }
        writer.write_all(&self.buf[..page_size])?;

        self.stats.pages_written += 1;
        log::trace!("page written ({} valid records)", page.valid_len());

        return Ok(());
    }
}

/// Reads until `buf` is full or the stream is exhausted; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    return Ok(filled);
}
