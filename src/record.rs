//! Fixed-size record codec.
//!
//! A record is stored as three consecutive little-endian `f64` values: mass, specific heat and
//! temperature difference. There is no header and no length prefix. A stored record whose mass is
//! not strictly positive is a padding sentinel and carries no data.

use std::cmp::Ordering;
use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

/// Size of an encoded record in bytes.
pub const RECORD_SIZE: usize = 24;

/// A single data tuple. Records are ordered by their derived [`Record::heat`] key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub mass: f64,
    pub specific_heat: f64,
    pub temperature_difference: f64,
}

impl Record {
    pub fn new(mass: f64, specific_heat: f64, temperature_difference: f64) -> Self {
        Record {
            mass,
            specific_heat,
            temperature_difference,
        }
    }

    /// Sort key: `mass * specific_heat * temperature_difference`.
    pub fn heat(&self) -> f64 {
        self.mass * self.specific_heat * self.temperature_difference
    }

    /// Sort key of the record, totally ordered.
    pub fn heat_key(&self) -> HeatKey {
        HeatKey(self.heat())
    }

    /// Only records with a strictly positive mass hold data.
    pub fn is_valid(&self) -> bool {
        self.mass > 0.0
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.mass.to_le_bytes());
        buf[8..16].copy_from_slice(&self.specific_heat.to_le_bytes());
        buf[16..24].copy_from_slice(&self.temperature_difference.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Self {
        Record {
            mass: read_f64(&buf[0..8]),
            specific_heat: read_f64(&buf[8..16]),
            temperature_difference: read_f64(&buf[16..24]),
        }
    }
}

/// Heat ordered by [`f64::total_cmp`], so that NaN heats (e.g. infinite specific heat times a zero
/// temperature difference) have a fixed place. Run generation and merging both order by this key.
#[derive(Debug, Clone, Copy)]
pub struct HeatKey(pub f64);

impl PartialEq for HeatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeatKey {}

impl PartialOrd for HeatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

fn read_f64(bytes: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    f64::from_le_bytes(raw)
}

/// One record position inside a page.
///
/// Padding is encoded on disk as an all-zero record. In memory it is kept apart from real data so
/// that nothing downstream has to look at the mass field to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    Record(Record),
    Padding,
}

impl Slot {
    pub fn encode(&self, buf: &mut [u8]) {
        match self {
            Slot::Record(record) => record.encode(buf),
            Slot::Padding => buf[..RECORD_SIZE].fill(0),
        }
    }

    pub fn decode(buf: &[u8]) -> Self {
        let record = Record::decode(buf);
        if record.is_valid() {
            Slot::Record(record)
        } else {
            Slot::Padding
        }
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Slot::Record(record) => Some(record),
            Slot::Padding => None,
        }
    }
}

/// Writes records one after another, without any page structure.
/// This is how an initial unsorted data set is handed over to the sorter.
pub fn write_records<P, I>(path: P, records: I) -> io::Result<u64>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Record>,
{
    let mut writer = io::BufWriter::new(fs::File::create(path)?);
    let mut buf = [0u8; RECORD_SIZE];
    let mut written = 0;

    for record in records {
        record.encode(&mut buf);
        writer.write_all(&buf)?;
        written += 1;
    }
    writer.flush()?;

    return Ok(written);
}

/// Opens a record file for sequential reading of its valid records.
/// Padding is skipped. Reads through this iterator are not accounted as page I/O.
pub fn read_records<P: AsRef<Path>>(path: P) -> io::Result<RecordIter> {
    let file = fs::File::open(path)?;
    return Ok(RecordIter {
        reader: io::BufReader::new(file),
    });
}

/// Iterator over the valid records of a record file.
pub struct RecordIter {
    reader: io::BufReader<fs::File>,
}

impl Iterator for RecordIter {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = [0u8; RECORD_SIZE];
        loop {
            match self.reader.read_exact(&mut buf) {
                Ok(()) => {
                    if let Slot::Record(record) = Slot::decode(&buf) {
                        return Some(Ok(record));
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
