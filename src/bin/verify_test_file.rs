//! Reads a dataset back from a (possibly concatenated) numerology fixture and confirms it is
//! exactly the monotonic run `start, start+1, ..., start+len-1`, reporting the first offending
//! index and value on mismatch.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hdf5::File;

#[derive(Debug, Parser)]
#[command(name = "verify-test-file", about = "Verify a numerology test fixture")]
struct Args {
    /// Path of the HDF5 file to check.
    path: PathBuf,

    /// Name of the dataset to read.
    #[arg(long, default_value = "data")]
    dataset: String,

    /// Expected first value of the sequence.
    #[arg(long, default_value_t = 0)]
    start: i64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(len) => {
            println!("{}: {} rows, {} OK, starting at {}", args.path.display(), args.dataset, len, args.start);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {err}", args.path.display());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<usize, String> {
    let file = File::open(&args.path).map_err(|e| e.to_string())?;
    let values = file
        .dataset(&args.dataset)
        .map_err(|e| format!("{}: {e}", args.dataset))?
        .read_1d::<i64>()
        .map_err(|e| format!("{}: {e}", args.dataset))?;

    for (i, &v) in values.iter().enumerate() {
        let expected = args.start + i as i64;
        if v != expected {
            return Err(format!(
                "mismatch at row {i}: expected {expected}, got {v}"
            ));
        }
    }
    Ok(values.len())
}
