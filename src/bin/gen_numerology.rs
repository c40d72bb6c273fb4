//! Generates one HDF5 fixture per row count given on the command line, each holding a single
//! chunked `data` dataset that continues one running integer sequence across files — so
//! concatenating the files back together and reading `data` sequentially reproduces the
//! original run exactly.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hdf5::File;

#[derive(Debug, Parser)]
#[command(name = "gen-numerology", about = "Generate numerology test fixtures")]
struct Args {
    /// Row counts, one output file per value, in order.
    #[arg(required = true)]
    nrows: Vec<usize>,

    /// Chunk size used for every generated `data` dataset.
    #[arg(short = 'c', long = "chunk-size", default_value_t = 16)]
    chunk_size: usize,

    /// Basename stem; file i is written to `<stem>_<i>.h5`.
    #[arg(short = 'o', long = "output-file-stem")]
    output_file_stem: PathBuf,

    /// First value of the running sequence.
    #[arg(short = 'v', long = "starting-value", default_value_t = 0)]
    starting_value: i64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> hdf5::Result<()> {
    let mut cursor = args.starting_value;
    for (index, &nrows) in args.nrows.iter().enumerate() {
        let path = file_path(&args.output_file_stem, index);
        let values: Vec<i64> = (0..nrows as i64).map(|i| cursor + i).collect();

        let file = File::create(&path)?;
        file.new_dataset::<i64>()
            .chunk(args.chunk_size)
            .shape(hdf5::SimpleExtents::resizable(vec![nrows]))
            .create("data")?
            .write(&values)?;
        file.close()?;

        println!("{}: rows {}..{} -> data", path.display(), cursor, cursor + nrows as i64 - 1);
        cursor += nrows as i64;
    }
    Ok(())
}

fn file_path(stem: &std::path::Path, index: usize) -> PathBuf {
    let mut name = stem
        .file_name()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    name.push('_');
    name.push_str(&index.to_string());
    name.push_str(".h5");
    stem.with_file_name(name)
}
