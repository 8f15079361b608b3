use std::fs;
use std::io;
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;
use rand::Rng;

use page_sort::{
    read_keyboard_records, read_records, read_text_records, write_records, ExternalSorter, ExternalSorterBuilder,
    Record, SortReport,
};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let buffers: usize = arg_parser.value_of_t_or_exit("buffers");
    let blocking_factor: usize = arg_parser.value_of_t_or_exit("blocking_factor");
    let source: Source = arg_parser.value_of_t_or_exit("source");
    let work_dir = arg_parser.value_of("work_dir").expect("value has default");
    let dump = arg_parser.is_present("dump");
    let dump_runs = arg_parser.is_present("dump_runs");

    let sorter: ExternalSorter = match ExternalSorterBuilder::new()
        .with_buffers(buffers)
        .with_blocking_factor(blocking_factor)
        .with_work_dir(path::Path::new(work_dir))
        .build()
    {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let records = match source {
        Source::Random => {
            let count: usize = arg_parser.value_of_t_or_exit("count");
            generate_random_records(count)
        }
        Source::Stdin => {
            println!("Enter records as [mass] [specific heat] [temperature difference] separated by spaces");
            println!("a zero mass or any non-number ends the input");
            match read_keyboard_records(io::stdin().lock()) {
                Ok(records) => records,
                Err(err) => {
                    log::error!("keyboard input error: {}", err);
                    process::exit(1);
                }
            }
        }
        Source::Text => {
            let input = arg_parser.value_of("input").unwrap_or("dane_testowe.txt");
            match fs::File::open(input).and_then(read_text_records) {
                Ok(records) => records,
                Err(err) => {
                    log::error!("input file reading error: {}", err);
                    process::exit(1);
                }
            }
        }
        Source::Binary => {
            let input = match arg_parser.value_of("input") {
                Some(input) => input,
                None => {
                    log::error!("binary source requires an input file");
                    process::exit(1);
                }
            };
            match read_records(input).and_then(|records| records.collect::<io::Result<Vec<Record>>>()) {
                Ok(records) => records,
                Err(err) => {
                    log::error!("input file reading error: {}", err);
                    process::exit(1);
                }
            }
        }
    };

    if records.is_empty() {
        log::warn!("no records loaded, nothing to sort");
        return;
    }

    let input = sorter.work_dir().join("dane.bin");
    if let Err(err) = write_records(&input, records) {
        log::error!("input file creation error: {}", err);
        process::exit(1);
    }
    log::info!("input file {} created ({})", input.display(), file_size(&input));
    if dump {
        dump_file(&input);
    }

    let sorted = if dump_runs {
        sorter.sort_file_with_observer(&input, dump_phase)
    } else {
        sorter.sort_file(&input)
    };
    let report = match sorted {
        Ok(report) => report,
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    };

    if dump {
        dump_file(&report.output);
    }
    print_report(&sorter, &report);
}

fn generate_random_records(count: usize) -> Vec<Record> {
    log::info!("generating {} random records", count);
    let mut rng = rand::thread_rng();

    Vec::from_iter((0..count).map(|_| {
        Record::new(
            rng.gen_range(1.0..100.0),
            rng.gen_range(0.1..5.0),
            rng.gen_range(-50.0..50.0),
        )
    }))
}

fn dump_phase(phase: usize, runs: &[path::PathBuf]) {
    if phase == 0 {
        println!("\n--- Runs after run generation: {} ---", runs.len());
    } else {
        println!("\n--- Phase number: {} has ended, {} runs left ---", phase, runs.len());
    }
    for run in runs {
        dump_file(run);
    }
}

fn dump_file(path: &path::Path) {
    println!("\n--- Reading binary file: {} ---", path.display());
    let records = match read_records(path) {
        Ok(records) => records,
        Err(err) => {
            log::error!("file dumping error: {}", err);
            return;
        }
    };

    for (idx, record) in records.enumerate() {
        match record {
            Ok(r) => println!(
                "[{}] M={:.4} C={:.4} dT={:.4} | Q={:.4}",
                idx,
                r.mass,
                r.specific_heat,
                r.temperature_difference,
                r.heat()
            ),
            Err(err) => {
                log::error!("file dumping error: {}", err);
                break;
            }
        }
    }
    println!("-----------------------------------");
}

fn file_size(path: &path::Path) -> String {
    match fs::metadata(path) {
        Ok(meta) => ByteSize::b(meta.len()).to_string(),
        Err(_) => "unknown size".to_string(),
    }
}

fn print_report(sorter: &ExternalSorter, report: &SortReport) {
    println!("\nSorting Stats:");
    println!("Buffers: {}, blocking factor: {}", sorter.buffers(), sorter.blocking_factor());
    println!("Runs created: {}", report.runs);
    println!("Page readings: {}", report.io.pages_read);
    println!("Page writings: {}", report.io.pages_written);
    println!("Number of phases: {}", report.phases);
    println!("Output: {} ({})", report.output.display(), file_size(&report.output));
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Source {
    Random,
    Stdin,
    Text,
    Binary,
}

impl Source {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Source::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Source as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("page-sort")
        .about("page-granular external merge sort")
        .arg(
            clap::Arg::new("buffers")
                .short('n')
                .long("buffers")
                .help("number of page buffers available for sorting")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("blocking_factor")
                .short('b')
                .long("blocking-factor")
                .help("number of records per page")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("source")
                .short('s')
                .long("source")
                .help("data source")
                .takes_value(true)
                .default_value("random")
                .possible_values(Source::possible_values()),
        )
        .arg(
            clap::Arg::new("count")
                .short('c')
                .long("count")
                .help("number of records to generate")
                .takes_value(true)
                .default_value("1000"),
        )
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("text or binary file to read records from")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("work_dir")
                .short('d')
                .long("work-dir")
                .help("directory to store runs and the output in")
                .takes_value(true)
                .default_value("."),
        )
        .arg(
            clap::Arg::new("dump")
                .long("dump")
                .help("print input and output files"),
        )
        .arg(
            clap::Arg::new("dump_runs")
                .long("dump-runs")
                .help("print the runs left after run generation and after every merge phase"),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
