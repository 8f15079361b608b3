//! Run generation.

use std::fs;
use std::io;
use std::path::Path;

use log;

use crate::disk::{DiskManager, Page};
use crate::record::Record;
use crate::run::{initial_run_path, RunWriter};

/// Splits the input file into sorted runs.
///
/// The input is consumed in batches of `buffer_count` pages. Valid records of a batch are sorted
/// in memory by heat and written to `run_<i>.bin` in `work_dir`; padding found in the input is
/// dropped. Returns the number of runs created, which is zero for an empty input. A
/// `buffer_count` of zero is rejected with [`io::ErrorKind::InvalidInput`].
///
/// # Arguments
/// * `input` - File to be sorted
/// * `work_dir` - Directory the runs are written to
/// * `disk` - Disk manager all page transfers go through
/// * `buffer_count` - Number of page buffers available for a batch
pub fn generate_runs(input: &Path, work_dir: &Path, disk: &mut DiskManager, buffer_count: usize) -> io::Result<usize> {
    if buffer_count == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "run generation needs at least one page buffer",
        ));
    }

    let blocking_factor = disk.blocking_factor();
    let mut input_file = fs::File::open(input)?;
    let mut page = Page::new(blocking_factor);
    let mut batch: Vec<Record> = Vec::with_capacity(buffer_count * blocking_factor);
    let mut runs_number = 0;
    let mut more_input = true;

    while more_input {
        batch.clear();
        for _ in 0..buffer_count {
            if !disk.read_page(&mut input_file, &mut page)? {
                more_input = false;
                break;
            }
            batch.extend(page.records().copied());
        }

        // a batch made of padding only produces no run
        if batch.is_empty() {
            continue;
        }

        batch.sort_unstable_by_key(Record::heat_key);

        let run_path = initial_run_path(work_dir, runs_number);
        let mut writer = RunWriter::create(&run_path, blocking_factor)?;
        for record in batch.iter() {
            writer.push(*record, disk)?;
        }
        writer.finish(disk)?;

        log::debug!("run {} created ({} records)", run_path.display(), batch.len());
        runs_number += 1;
    }

    log::info!("run generation done ({} runs)", runs_number);

    return Ok(runs_number);
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io;

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::generate_runs;
    use crate::disk::DiskManager;
    use crate::record::{read_records, write_records, Record, RECORD_SIZE};
    use crate::run::initial_run_path;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn shuffled_records(n: usize) -> Vec<Record> {
        let mut records = Vec::from_iter((1..=n).map(|i| Record::new(i as f64, 0.5, 2.0)));
        records.shuffle(&mut rand::thread_rng());
        records
    }

    #[rstest]
    #[case(0, 3, 2, 0)]
    #[case(1, 3, 2, 1)]
    #[case(6, 3, 2, 1)]
    #[case(7, 3, 2, 2)]
    #[case(20, 3, 3, 3)]
    #[case(20, 1, 2, 10)]
    fn test_generate_runs(
        tmp_dir: tempfile::TempDir,
        #[case] records_number: usize,
        #[case] b: usize,
        #[case] buffers: usize,
        #[case] expected_runs: usize,
    ) {
        let input = tmp_dir.path().join("input.bin");
        let records = shuffled_records(records_number);
        write_records(&input, records.clone()).unwrap();

        let mut disk = DiskManager::new(b);
        let runs = generate_runs(&input, tmp_dir.path(), &mut disk, buffers).unwrap();
        assert_eq!(runs, expected_runs);

        let mut restored = Vec::new();
        let mut expected_pages_written = 0;
        for idx in 0..runs {
            let path = initial_run_path(tmp_dir.path(), idx);
            let len = fs::metadata(&path).unwrap().len();
            assert_eq!(len % (b * RECORD_SIZE) as u64, 0);
            expected_pages_written += len / (b * RECORD_SIZE) as u64;

            let run: Vec<Record> = read_records(&path).unwrap().map(Result::unwrap).collect();
            assert!(run.len() <= buffers * b);
            assert!(run.windows(2).all(|pair| pair[0].heat() <= pair[1].heat()));
            restored.extend(run);
        }
        assert!(!initial_run_path(tmp_dir.path(), runs).exists());
        assert_eq!(disk.stats().pages_written, expected_pages_written);

        let mut expected = Vec::from_iter(records.iter().map(|r| r.mass));
        let mut actual = Vec::from_iter(restored.iter().map(|r| r.mass));
        expected.sort_by(f64::total_cmp);
        actual.sort_by(f64::total_cmp);
        assert_eq!(actual, expected);
    }

    #[rstest]
    fn test_padding_in_input_dropped(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.bin");
        let padding = Record::new(0.0, 0.0, 0.0);
        write_records(
            &input,
            vec![
                Record::new(3.0, 1.0, 1.0),
                padding,
                Record::new(1.0, 1.0, 1.0),
                padding,
            ],
        )
        .unwrap();

        let mut disk = DiskManager::new(2);
        let runs = generate_runs(&input, tmp_dir.path(), &mut disk, 4).unwrap();
        assert_eq!(runs, 1);

        let run: Vec<f64> = read_records(initial_run_path(tmp_dir.path(), 0))
            .unwrap()
            .map(|record| record.unwrap().mass)
            .collect();
        assert_eq!(run, vec![1.0, 3.0]);
        assert_eq!(disk.stats().pages_read, 2);
        assert_eq!(disk.stats().pages_written, 1);
    }

    #[rstest]
    fn test_padding_only_batch_skipped(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.bin");
        let padding = Record::new(0.0, 0.0, 0.0);
        write_records(&input, vec![padding, padding, Record::new(2.0, 1.0, 1.0)]).unwrap();

        let mut disk = DiskManager::new(1);
        let runs = generate_runs(&input, tmp_dir.path(), &mut disk, 2).unwrap();
        assert_eq!(runs, 1);

        let run: Vec<Record> = read_records(initial_run_path(tmp_dir.path(), 0))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(run, vec![Record::new(2.0, 1.0, 1.0)]);
    }

    #[rstest]
    fn test_zero_buffers_rejected(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.bin");
        write_records(&input, shuffled_records(4)).unwrap();

        let mut disk = DiskManager::new(2);
        let err = generate_runs(&input, tmp_dir.path(), &mut disk, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(disk.stats().pages_read, 0);
        assert!(!initial_run_path(tmp_dir.path(), 0).exists());
    }

    #[rstest]
    fn test_nan_heat_sorted_last(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.bin");
        write_records(
            &input,
            vec![
                Record::new(1.0, f64::NAN, 1.0),
                Record::new(5.0, 1.0, 1.0),
                Record::new(2.0, 1.0, 1.0),
            ],
        )
        .unwrap();

        let mut disk = DiskManager::new(3);
        assert_eq!(generate_runs(&input, tmp_dir.path(), &mut disk, 1).unwrap(), 1);

        let heats: Vec<f64> = read_records(initial_run_path(tmp_dir.path(), 0))
            .unwrap()
            .map(|record| record.unwrap().heat())
            .collect();
        assert_eq!(&heats[..2], &[2.0, 5.0]);
        assert!(heats[2].is_nan());
    }

    #[rstest]
    fn test_missing_input(tmp_dir: tempfile::TempDir) {
        let mut disk = DiskManager::new(2);
        assert!(generate_runs(&tmp_dir.path().join("absent.bin"), tmp_dir.path(), &mut disk, 2).is_err());
    }
}
