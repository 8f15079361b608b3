//! `page-sort` is a page-granular external k-way merge sort.
//!
//! External sorting handles data sets that do not fit into main memory. Here memory is modelled
//! the way a database engine sees it: as `n` page buffers, each holding `b` fixed-size records
//! (the blocking factor). Sorting is done in two phases. The first phase reads the input `n`
//! pages at a time, sorts every batch in memory and writes it out as a sorted run. The second
//! phase repeatedly merges groups of up to `n - 1` runs with a binary min-heap, one buffer being
//! reserved for the output page, until a single run is left. Every page transfer is counted, so
//! the I/O cost of a sort can be reported. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Record format
//!
//! Records are three little-endian `f64` values (mass, specific heat, temperature difference),
//! 24 bytes in total, and are ordered by their heat `mass * specific_heat * temperature_difference`.
//! Run files consist of whole pages only; the last page of a run is completed with all-zero
//! padding records.
//!
//! # Example
//!
//! ```no_run
//! use std::path;
//!
//! use page_sort::{read_records, ExternalSorterBuilder, Record};
//!
//! fn main() {
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_buffers(4)
//!         .with_blocking_factor(8)
//!         .with_work_dir(path::Path::new("./work"))
//!         .build()
//!         .unwrap();
//!
//!     let records = vec![Record::new(2.0, 0.5, 10.0), Record::new(1.0, 4.0, -3.0)];
//!     let report = sorter.sort(records).unwrap();
//!     println!("{}", report);
//!
//!     for record in read_records(&report.output).unwrap().map(Result::unwrap) {
//!         println!("{:?} heat={}", record, record.heat());
//!     }
//! }
//! ```

pub mod disk;
pub mod generator;
pub mod heap;
pub mod merger;
pub mod record;
pub mod run;
pub mod sort;
pub mod source;

pub use disk::{DiskManager, IoStats, Page};
pub use generator::generate_runs;
pub use heap::MinHeap;
pub use merger::merge_batch;
pub use record::{read_records, write_records, HeatKey, Record, Slot, RECORD_SIZE};
pub use run::{RunReader, RunWriter, OUTPUT_FILE_NAME};
pub use sort::{merge_all, ExternalSorter, ExternalSorterBuilder, SortError, SortReport};
pub use source::{read_keyboard_records, read_text_records};
