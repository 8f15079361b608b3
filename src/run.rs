//! Run files.
//!
//! A run is a file of whole pages whose valid records are sorted by heat. Padding only ever
//! occupies the tail of the last page.

use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use crate::disk::{DiskManager, Page};
use crate::record::{Record, Slot};

/// Name of the file the final run is promoted to.
pub const OUTPUT_FILE_NAME: &str = "output.bin";

/// Path of the `idx`-th run produced by run generation.
pub fn initial_run_path(dir: &Path, idx: usize) -> PathBuf {
    dir.join(format!("run_{}.bin", idx))
}

/// Path of the `idx`-th run produced by merge pass `phase`.
pub fn phase_run_path(dir: &Path, phase: usize, idx: usize) -> PathBuf {
    dir.join(format!("phase_{}_run_{}.bin", phase, idx))
}

/// Sequential reader over a run holding exactly one page in memory.
pub struct RunReader {
    file: fs::File,
    page: Page,
    cursor: usize,
    exhausted: bool,
}

impl RunReader {
    pub fn open(path: &Path, blocking_factor: usize) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let page = Page::new(blocking_factor);

        return Ok(RunReader {
            file,
            cursor: page.capacity(),
            page,
            exhausted: false,
        });
    }

    /// Returns the next valid record of the run, fetching the next page once the current one
    /// has been consumed. Padding slots are stepped over.
    pub fn next_record(&mut self, disk: &mut DiskManager) -> io::Result<Option<Record>> {
        while !self.exhausted {
            if self.cursor >= self.page.capacity() {
                if !disk.read_page(&mut self.file, &mut self.page)? {
                    self.exhausted = true;
                    break;
                }
                self.cursor = 0;
            }

            let slot = self.page.get(self.cursor).copied();
            self.cursor += 1;
            if let Some(Slot::Record(record)) = slot {
                return Ok(Some(record));
            }
        }

        return Ok(None);
    }
}

/// Run writer holding exactly one output page in memory.
pub struct RunWriter {
    writer: io::BufWriter<fs::File>,
    page: Page,
    records: u64,
}

impl RunWriter {
    pub fn create(path: &Path, blocking_factor: usize) -> io::Result<Self> {
        let file = fs::File::create(path)?;

        return Ok(RunWriter {
            writer: io::BufWriter::new(file),
            page: Page::new(blocking_factor),
            records: 0,
        });
    }

    /// Appends a record, writing the page out as soon as it is full.
    pub fn push(&mut self, record: Record, disk: &mut DiskManager) -> io::Result<()> {
        self.page.push(record);
        self.records += 1;

        if self.page.is_full() {
            disk.write_page(&mut self.writer, &self.page)?;
            self.page.clear();
        }

        return Ok(());
    }

    /// Pads and writes a partially filled page, then flushes the file.
    /// Returns the number of records written to the run.
    pub fn finish(mut self, disk: &mut DiskManager) -> io::Result<u64> {
        if !self.page.is_empty() {
            self.page.pad();
            disk.write_page(&mut self.writer, &self.page)?;
            self.page.clear();
        }
        self.writer.flush()?;

        return Ok(self.records);
    }
}
