//! K-way run merger.

use std::io;
use std::path::{Path, PathBuf};

use log;

use crate::disk::DiskManager;
use crate::heap::MinHeap;
use crate::record::Record;
use crate::run::{RunReader, RunWriter};

/// Candidate record and the index of the run it was taken from.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    record: Record,
    run: usize,
}

/// Merges sorted runs into a single sorted run.
///
/// Each input run contributes one page buffer and the output one more, so merging `k` runs holds
/// `k + 1` pages in memory. Records with equal heat coming from different runs are emitted in
/// unspecified order. Time complexity is *m* \* log(*k*) where *m* is the number of records.
///
/// # Arguments
/// * `disk` - Disk manager all page transfers go through
/// * `inputs` - Sorted runs to be merged
/// * `output` - Path of the resulting run
pub fn merge_batch(disk: &mut DiskManager, inputs: &[PathBuf], output: &Path) -> io::Result<u64> {
    let blocking_factor = disk.blocking_factor();

    let mut runs = Vec::with_capacity(inputs.len());
    for path in inputs {
        runs.push(RunReader::open(path, blocking_factor)?);
    }
    let mut writer = RunWriter::create(output, blocking_factor)?;
    let mut heap = MinHeap::with_capacity(runs.len());

    for (idx, run) in runs.iter_mut().enumerate() {
        if let Some(record) = run.next_record(disk)? {
            heap.push(record.heat_key(), HeapEntry { record, run: idx });
        }
    }

    while let Some((_, entry)) = heap.pop() {
        writer.push(entry.record, disk)?;

        if let Some(record) = runs[entry.run].next_record(disk)? {
            heap.push(
                record.heat_key(),
                HeapEntry {
                    record,
                    run: entry.run,
                },
            );
        }
    }

    let records = writer.finish(disk)?;
    log::debug!(
        "merged {} runs into {} ({} records)",
        inputs.len(),
        output.display(),
        records
    );

    return Ok(records);
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use rstest::*;

    use super::merge_batch;
    use crate::disk::DiskManager;
    use crate::record::{read_records, Record, RECORD_SIZE};
    use crate::run::RunWriter;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write_run(disk: &mut DiskManager, path: &Path, heats: &[f64]) {
        let mut writer = RunWriter::create(path, disk.blocking_factor()).unwrap();
        for heat in heats {
            writer.push(Record::new(1.0, 1.0, *heat), disk).unwrap();
        }
        writer.finish(disk).unwrap();
    }

    #[rstest]
    #[case(2, vec![vec![4.0, 5.0, 7.0], vec![1.0, 6.0], vec![3.0]], vec![1.0, 3.0, 4.0, 5.0, 6.0, 7.0])]
    #[case(3, vec![vec![-2.0, 0.5], vec![], vec![-9.0, 1.0, 2.0, 8.0]], vec![-9.0, -2.0, 0.5, 1.0, 2.0, 8.0])]
    #[case(1, vec![vec![2.0, 2.0], vec![2.0]], vec![2.0, 2.0, 2.0])]
    #[case(4, vec![vec![1.0, 2.0, 3.0]], vec![1.0, 2.0, 3.0])]
    #[case(2, vec![vec![], vec![]], vec![])]
    fn test_merge_batch(
        tmp_dir: tempfile::TempDir,
        #[case] b: usize,
        #[case] runs: Vec<Vec<f64>>,
        #[case] expected: Vec<f64>,
    ) {
        let mut disk = DiskManager::new(b);
        let inputs: Vec<PathBuf> = Vec::from_iter((0..runs.len()).map(|i| tmp_dir.path().join(format!("in_{}.bin", i))));
        for (path, heats) in inputs.iter().zip(&runs) {
            write_run(&mut disk, path, heats);
        }
        let input_pages = disk.stats().pages_written;

        let output = tmp_dir.path().join("out.bin");
        let records = merge_batch(&mut disk, &inputs, &output).unwrap();
        assert_eq!(records, expected.len() as u64);

        let actual: Vec<f64> = read_records(&output).unwrap().map(|r| r.unwrap().heat()).collect();
        assert_eq!(actual, expected);

        let output_pages = (expected.len() + b - 1) / b;
        assert_eq!(
            fs::metadata(&output).unwrap().len(),
            (output_pages * b * RECORD_SIZE) as u64
        );
        assert_eq!(disk.stats().pages_read, input_pages);
        assert_eq!(disk.stats().pages_written, input_pages + output_pages as u64);
    }

    #[rstest]
    fn test_padding_confined_to_last_page(tmp_dir: tempfile::TempDir) {
        let b = 3;
        let mut disk = DiskManager::new(b);
        let inputs = vec![tmp_dir.path().join("a.bin"), tmp_dir.path().join("b.bin")];
        // the first input ends with a padded page
        write_run(&mut disk, &inputs[0], &[1.0, 3.0, 5.0, 7.0]);
        write_run(&mut disk, &inputs[1], &[2.0, 4.0, 6.0]);

        let output = tmp_dir.path().join("out.bin");
        merge_batch(&mut disk, &inputs, &output).unwrap();

        let bytes = fs::read(&output).unwrap();
        let masses: Vec<f64> = bytes.chunks_exact(RECORD_SIZE).map(|chunk| Record::decode(chunk).mass).collect();
        assert_eq!(masses, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[rstest]
    fn test_nan_heat_merged_last(tmp_dir: tempfile::TempDir) {
        let mut disk = DiskManager::new(2);
        let inputs = vec![tmp_dir.path().join("a.bin"), tmp_dir.path().join("b.bin")];
        // the first candidate pushed to the heap has a NaN heat
        write_run(&mut disk, &inputs[0], &[f64::NAN]);
        write_run(&mut disk, &inputs[1], &[1.0, 2.0, 3.0]);

        let output = tmp_dir.path().join("out.bin");
        merge_batch(&mut disk, &inputs, &output).unwrap();

        let heats: Vec<f64> = read_records(&output).unwrap().map(|r| r.unwrap().heat()).collect();
        assert_eq!(&heats[..3], &[1.0, 2.0, 3.0]);
        assert!(heats[3].is_nan());
    }

    #[rstest]
    fn test_missing_input_run(tmp_dir: tempfile::TempDir) {
        let mut disk = DiskManager::new(2);
        let inputs = vec![tmp_dir.path().join("absent.bin")];
        assert!(merge_batch(&mut disk, &inputs, &tmp_dir.path().join("out.bin")).is_err());
    }
}
