//! Benchmark driver: insert 64-bit keys from a binary file into the index,
//! query every inserted key back, and report accumulated wall-clock
//! nanoseconds for both phases as CSV on stdout.

use std::{fs, path::PathBuf, process::ExitCode, time::Instant};

use argh::FromArgs;

use tart::{visitor::TreeStatsCollector, ArtIndex, BigEndianU64};

/// Insert 64-bit keys from a binary file and query them back, printing
/// `insert_ns,query_ns` on stdout.
#[derive(FromArgs)]
struct BenchArgs {
    /// print human-readable timings and tree statistics
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// number of keys to insert (default: 1000000)
    #[argh(option, short = 'N', long = "num-keys", default = "1_000_000")]
    num_keys: usize,

    /// path to a binary file of little-endian 64-bit integers
    #[argh(option, short = 'f', long = "file")]
    file: PathBuf,
}

fn read_keys(path: &PathBuf) -> std::io::Result<Vec<u64>> {
    let contents = fs::read(path)?;
    Ok(contents
        .chunks_exact(8)
        .map(|chunk| {
            // PANIC SAFETY: `chunks_exact(8)` only yields 8 byte chunks.
            u64::from_le_bytes(chunk.try_into().unwrap())
        })
        .collect())
}

fn main() -> ExitCode {
    let args: BenchArgs = argh::from_env();

    let keys = match read_keys(&args.file) {
        Ok(keys) => keys,
        Err(err) => {
            eprintln!("unable to read {}: {err}", args.file.display());
            return ExitCode::FAILURE;
        },
    };
    let num_keys = args.num_keys.min(keys.len());

    let mut index = ArtIndex::new(BigEndianU64);

    let mut insert_ns: u128 = 0;
    for &key in &keys[..num_keys] {
        let key_bytes = key.to_be_bytes();
        let start = Instant::now();
        index
            .insert(&key_bytes, key as usize)
            .expect("fixed-width keys cannot prefix one another");
        insert_ns += start.elapsed().as_nanos();
    }

    if args.verbose {
        println!("Insertion time: {insert_ns} ns");
    }

    let mut query_ns: u128 = 0;
    for &key in &keys[..num_keys] {
        let key_bytes = key.to_be_bytes();
        let start = Instant::now();
        let found = index.get(&key_bytes);
        query_ns += start.elapsed().as_nanos();
        assert_eq!(found, Some(key as usize), "inserted key {key:#x} not found");
    }

    if args.verbose {
        println!("Query time: {query_ns} ns");
        println!("Tree: {}", TreeStatsCollector::collect(&index));
    }

    println!("{insert_ns},{query_ns}");

    ExitCode::SUCCESS
}
