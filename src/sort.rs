//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::disk::{DiskManager, IoStats};
use crate::generator::generate_runs;
use crate::merger::merge_batch;
use crate::record::{write_records, Record};
use crate::run::{initial_run_path, phase_run_path, OUTPUT_FILE_NAME};

/// Name of the file records handed to [`ExternalSorter::sort`] are staged in.
pub const INPUT_FILE_NAME: &str = "input.bin";

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Work directory creation error.
    TempDir(io::Error),
    /// Common I/O error.
    IO(io::Error),
    /// Sorter configuration is not usable.
    InvalidConfig(String),
    /// More than one run has to be merged but the merge fan-in is below two.
    MergeStalled { buffers: usize },
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::InvalidConfig(_) => None,
            SortError::MergeStalled { .. } => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "work directory not created: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::InvalidConfig(msg) => write!(f, "invalid sorter configuration: {}", msg),
            SortError::MergeStalled { buffers } => write!(
                f,
                "{} buffers give a merge fan-in below 2, runs can not be merged",
                buffers
            ),
        }
    }
}

/// Sorting summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortReport {
    /// Number of runs created by run generation.
    pub runs: usize,
    /// Number of merge passes.
    pub phases: usize,
    /// Sorted output file.
    pub output: PathBuf,
    /// Page I/O performed by the whole sort.
    pub io: IoStats,
}

impl Display for SortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs: {}, phases: {}, {}, output: {}",
            self.runs,
            self.phases,
            self.io,
            self.output.display()
        )
    }
}

/// Merges runs `run_0.bin` .. `run_<run_count - 1>.bin` of `work_dir` until one is left and moves
/// it to `output`. Returns the number of merge passes.
///
/// Every pass merges consecutive groups of at most `buffer_count - 1` runs, one buffer being taken
/// by the output page. Inputs of a group are deleted once the group is merged. With no runs at all
/// nothing is done and `output` is left untouched.
///
/// If an observer is given it is called with phase `0` and the runs of run generation before the
/// first pass, then with phase `p` and the runs produced by pass `p`. It is always called while
/// the listed files still exist.
///
/// # Arguments
/// * `disk` - Disk manager all page transfers go through
/// * `work_dir` - Directory holding the runs
/// * `run_count` - Number of runs produced by run generation
/// * `buffer_count` - Number of page buffers available for merging
/// * `output` - Path the final run is moved to
/// * `observer` - Callback receiving the runs present after each phase
pub fn merge_all(
    disk: &mut DiskManager,
    work_dir: &Path,
    run_count: usize,
    buffer_count: usize,
    output: &Path,
    mut observer: Option<&mut dyn FnMut(usize, &[PathBuf])>,
) -> Result<usize, SortError> {
    if run_count == 0 {
        log::info!("nothing to merge");
        return Ok(0);
    }

    let fan_in = buffer_count.saturating_sub(1);
    if run_count > 1 && fan_in < 2 {
        return Err(SortError::MergeStalled { buffers: buffer_count });
    }

    let mut runs = Vec::from_iter((0..run_count).map(|idx| initial_run_path(work_dir, idx)));
    let mut phase = 0;
    if let Some(observe) = observer.as_deref_mut() {
        observe(phase, runs.as_slice());
    }

    while runs.len() > 1 {
        let mut merged = Vec::with_capacity((runs.len() + fan_in - 1) / fan_in);

        for (idx, group) in runs.chunks(fan_in).enumerate() {
            let run_path = phase_run_path(work_dir, phase, idx);
            merge_batch(disk, group, &run_path).map_err(|err| SortError::IO(err))?;

            for path in group {
                fs::remove_file(path).map_err(|err| SortError::IO(err))?;
            }
            merged.push(run_path);
        }

        phase += 1;
        log::info!("merge phase {} done ({} runs left)", phase, merged.len());
        if let Some(observe) = observer.as_deref_mut() {
            observe(phase, merged.as_slice());
        }
        runs = merged;
    }

    if output.exists() {
        fs::remove_file(output).map_err(|err| SortError::IO(err))?;
    }
    fs::rename(&runs[0], output).map_err(|err| SortError::IO(err))?;

    return Ok(phase);
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone, Debug)]
pub struct ExternalSorterBuilder {
    /// Number of page buffers.
    buffers: usize,
    /// Number of records per page.
    blocking_factor: usize,
    /// Directory to be used to store runs and the output.
    work_dir: Option<Box<Path>>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(self.buffers, self.blocking_factor, self.work_dir.as_deref())
    }

    /// Sets number of page buffers available for sorting and merging.
    pub fn with_buffers(mut self, buffers: usize) -> ExternalSorterBuilder {
        self.buffers = buffers;
        return self;
    }

    /// Sets number of records per page.
    pub fn with_blocking_factor(mut self, blocking_factor: usize) -> ExternalSorterBuilder {
        self.blocking_factor = blocking_factor;
        return self;
    }

    /// Sets directory to be used to store runs and the output.
    pub fn with_work_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.work_dir = Some(path.into());
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            buffers: 3,
            blocking_factor: 4,
            work_dir: None,
        }
    }
}

enum WorkDir {
    Temp(tempfile::TempDir),
    Given(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            WorkDir::Temp(dir) => dir.path(),
            WorkDir::Given(path) => path,
        }
    }
}

/// External sorter.
///
/// Sorts record files by heat using `buffers` page buffers of `blocking_factor` records each.
/// Runs and the `output.bin` result are placed in the work directory. If no work directory was
/// given a temporary one is created, and it is removed together with the sorter.
pub struct ExternalSorter {
    buffers: usize,
    blocking_factor: usize,
    work_dir: WorkDir,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `buffers` - Number of page buffers, at least 2.
    /// * `blocking_factor` - Number of records per page, at least 1.
    /// * `work_dir` - Directory to be used to store runs and the output. If the parameter is [`None`]
    ///   a temporary directory is created in the default OS temporary directory.
    pub fn new(buffers: usize, blocking_factor: usize, work_dir: Option<&Path>) -> Result<Self, SortError> {
        if buffers < 2 {
            return Err(SortError::InvalidConfig(format!(
                "at least 2 buffers required, got {}",
                buffers
            )));
        }
        if blocking_factor < 1 {
            return Err(SortError::InvalidConfig("blocking factor must be positive".to_string()));
        }

        let work_dir = match work_dir {
            Some(path) => {
                fs::create_dir_all(path).map_err(|err| SortError::TempDir(err))?;
                WorkDir::Given(path.to_path_buf())
            }
            None => WorkDir::Temp(tempfile::tempdir().map_err(|err| SortError::TempDir(err))?),
        };
        log::info!(
            "using {} as a work directory (buffers: {}, blocking factor: {})",
            work_dir.path().display(),
            buffers,
            blocking_factor
        );

        return Ok(ExternalSorter {
            buffers,
            blocking_factor,
            work_dir,
        });
    }

    pub fn buffers(&self) -> usize {
        self.buffers
    }

    pub fn blocking_factor(&self) -> usize {
        self.blocking_factor
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Path of the sorted output file.
    pub fn output_path(&self) -> PathBuf {
        self.work_dir().join(OUTPUT_FILE_NAME)
    }

    /// Sorts records handed over in memory.
    /// They are written to a staging file in the work directory first, then sorted as a file.
    ///
    /// # Arguments
    /// * `records` - Records to be sorted
    pub fn sort<I>(&self, records: I) -> Result<SortReport, SortError>
    where
        I: IntoIterator<Item = Record>,
    {
        let input = self.work_dir().join(INPUT_FILE_NAME);
        let written = write_records(&input, records).map_err(|err| SortError::IO(err))?;
        log::debug!("{} records staged in {}", written, input.display());

        self.sort_file(&input)
    }

    /// Sorts a record file. The result is written to [`ExternalSorter::output_path`].
    ///
    /// # Arguments
    /// * `input` - File to be sorted
    pub fn sort_file(&self, input: &Path) -> Result<SortReport, SortError> {
        self.sort_file_observed(input, None)
    }

    /// Sorts a record file calling `observer` with the runs present after run generation
    /// (phase `0`) and after every merge pass. See [`merge_all`].
    ///
    /// # Arguments
    /// * `input` - File to be sorted
    /// * `observer` - Callback receiving a phase number and the runs of that phase
    pub fn sort_file_with_observer<F>(&self, input: &Path, mut observer: F) -> Result<SortReport, SortError>
    where
        F: FnMut(usize, &[PathBuf]),
    {
        self.sort_file_observed(input, Some(&mut observer))
    }

    fn sort_file_observed(
        &self,
        input: &Path,
        observer: Option<&mut dyn FnMut(usize, &[PathBuf])>,
    ) -> Result<SortReport, SortError> {
        let mut disk = DiskManager::new(self.blocking_factor);
        let output = self.output_path();

        log::info!("creating runs from {} ...", input.display());
        let runs = generate_runs(input, self.work_dir(), &mut disk, self.buffers).map_err(|err| SortError::IO(err))?;

        log::info!("merging {} runs ...", runs);
        let phases = merge_all(&mut disk, self.work_dir(), runs, self.buffers, &output, observer)?;

        if runs == 0 {
            // an empty input still gives an (empty) output file
            fs::File::create(&output).map_err(|err| SortError::IO(err))?;
        }

        let report = SortReport {
            runs,
            phases,
            output,
            io: disk.stats(),
        };
        log::info!("external sort done ({})", report);

        return Ok(report);
    }
}
