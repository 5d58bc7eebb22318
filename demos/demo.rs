//! Demo application timing thread-cached adders against shared atomics.
//!
//! Every worker thread adds `delta32` to a `u32` adder and `delta64` to a
//! `u64` adder, then the same work is repeated with `fetch_add` on shared
//! atomics. A second pass records latency-style samples into `Min`/`Max`
//! accumulators. The results are rendered with the table or JSON observers.
//!
//! Run with:
//! ```bash
//! cargo run --example demo --features demo -- --help
//! ```

use accumulatori::observers::json::JsonObserver;
use accumulatori::observers::table::{TableObserver, TableStyle};
use accumulatori::{Accumulator, Adder, Max, Min, Observable, Pool};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

/// Output format for the results.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty table (standard two-column format)
    Table,
    /// Compact table with multiple columns
    Compact,
    /// JSON format
    Json,
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Modern,
    Markdown,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Demo application for accumulatori - thread-cached accumulators.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of worker threads (defaults to the available parallelism)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=64))]
    threads: Option<u32>,

    /// Iterations per thread
    #[arg(short, long, default_value = "1000000", value_parser = clap::value_parser!(u32).range(1..=4_000_000))]
    iterations: u32,

    /// Derive both deltas from this seed instead of taking them from the
    /// command line
    #[arg(long, conflicts_with_all = ["delta32", "delta64"])]
    seed: Option<u64>,

    /// Value added to the u32 adder on every iteration
    #[arg(long, default_value = "7", value_parser = clap::value_parser!(u32).range(0..=0xf))]
    delta32: u32,

    /// Value added to the u64 adder on every iteration
    #[arg(long, default_value = "11259375", value_parser = clap::value_parser!(u64).range(0..=0xff_ffff))]
    delta64: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Table style (for table/compact formats)
    #[arg(short, long, value_enum, default_value = "rounded")]
    style: StyleChoice,

    /// Number of columns (for compact format)
    #[arg(short, long, default_value = "2")]
    columns: usize,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// Include timestamp in JSON output
    #[arg(long)]
    timestamp: bool,

    /// Add a title to the output (table formats)
    #[arg(long)]
    title: Option<String>,

    /// Hide header in standard table mode
    #[arg(long)]
    no_header: bool,
}

/// Adds the deltas through per-thread shards and returns the elapsed milliseconds.
fn run_adders(
    pool: &Pool,
    narrow: &Adder<u32>,
    wide: &Adder<u64>,
    args: &Args,
    threads: u32,
) -> u64 {
    let begin = Instant::now();
    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                let mut narrow_registry = pool.registry::<u32>();
                let mut wide_registry = pool.registry::<u64>();
                let mut narrow_local = narrow.local(&mut narrow_registry).unwrap();
                let mut wide_local = wide.local(&mut wide_registry).unwrap();
                for _ in 0..args.iterations {
                    narrow_local.update(args.delta32);
                    wide_local.update(args.delta64);
                }
            });
        }
    });
    begin.elapsed().as_millis() as u64
}

/// Adds the deltas with `fetch_add` on shared atomics.
fn run_atomics(narrow: &AtomicU32, wide: &AtomicU64, args: &Args, threads: u32) -> u64 {
    let begin = Instant::now();
    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                for _ in 0..args.iterations {
                    narrow.fetch_add(args.delta32, Ordering::Relaxed);
                    wide.fetch_add(args.delta64, Ordering::Relaxed);
                }
            });
        }
    });
    begin.elapsed().as_millis() as u64
}

/// Records simulated latencies into `Min`/`Max` accumulators.
fn run_latencies(
    pool: &Pool,
    fastest: &Accumulator<u32, Min>,
    slowest: &Accumulator<u32, Max>,
    args: &Args,
    threads: u32,
) {
    thread::scope(|s| {
        for worker in 0..threads {
            s.spawn(move || {
                let mut registry = pool.registry::<u32>();
                for j in 0..args.iterations.min(10_000) {
                    let latency = 10 + worker + (j % 200);
                    // One registry serves both accumulators.
                    fastest.update(&mut registry, latency).unwrap();
                    slowest.update(&mut registry, latency).unwrap();
                }
            });
        }
    });
}

/// Derives the per-iteration deltas: 4 bits for `u32`, 24 bits for `u64`.
fn deltas_from_seed(seed: u64) -> (u32, u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    (rng.random::<u32>() & 0xf, rng.random::<u64>() & 0xff_ffff)
}

fn render_output(args: &Args, accumulators: Vec<&dyn Observable>) -> String {
    match args.format {
        OutputFormat::Table => {
            let mut observer = TableObserver::new()
                .with_style(args.style.into())
                .with_header(!args.no_header);
            if let Some(ref title) = args.title {
                observer = observer.with_title(title.clone());
            }
            observer.render(accumulators.into_iter())
        }

        OutputFormat::Compact => {
            let mut observer = TableObserver::new()
                .compact(true)
                .columns(args.columns)
                .with_style(args.style.into());
            if let Some(ref title) = args.title {
                observer = observer.with_title(title.clone());
            }
            observer.render(accumulators.into_iter())
        }

        OutputFormat::Json => JsonObserver::new()
            .pretty(args.pretty)
            .wrap_in_snapshot(args.timestamp)
            .include_timestamp(args.timestamp)
            .to_json(accumulators.into_iter())
            .unwrap_or_else(|e| format!("Error: {}", e)),
    }
}

fn main() {
    let mut args = Args::parse();
    if let Some(seed) = args.seed {
        (args.delta32, args.delta64) = deltas_from_seed(seed);
    }
    let threads = args.threads.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(|n| n.get().min(64) as u32)
            .unwrap_or(1)
    });

    eprintln!("delta32:    {}", args.delta32);
    eprintln!("delta64:    {}", args.delta64);
    eprintln!("threads:    {}", threads);
    eprintln!("iterations: {}\n", args.iterations);

    let pool = Pool::new();

    let u32_adder = pool.adder::<u32>().with_name("u32_adder");
    let u64_adder = pool.adder::<u64>().with_name("u64_adder");
    let adder_ms = run_adders(&pool, &u32_adder, &u64_adder, &args, threads);

    let u32_atomic = AtomicU32::new(0);
    let u64_atomic = AtomicU64::new(0);
    let atomic_ms = run_atomics(&u32_atomic, &u64_atomic, &args, threads);

    let latency_min = pool.accumulator::<u32, Min>().with_name("latency_min");
    let latency_max = pool.accumulator::<u32, Max>().with_name("latency_max");
    run_latencies(&pool, &latency_min, &latency_max, &args, threads);

    // Seeded so the atomic baselines render alongside the accumulators.
    let u32_atomic = pool
        .adder::<u32>()
        .with_name("u32_atomic")
        .with_initial(u32_atomic.load(Ordering::Relaxed));
    let u64_atomic = pool
        .adder::<u64>()
        .with_name("u64_atomic")
        .with_initial(u64_atomic.load(Ordering::Relaxed));
    let adder_ms = pool.adder::<u64>().with_name("adder_ms").with_initial(adder_ms);
    let atomic_ms = pool.adder::<u64>().with_name("atomic_ms").with_initial(atomic_ms);

    let accumulators: Vec<&dyn Observable> = vec![
        &u32_adder,
        &u64_adder,
        &u32_atomic,
        &u64_atomic,
        &adder_ms,
        &atomic_ms,
        &latency_min,
        &latency_max,
    ];
    println!("{}", render_output(&args, accumulators));

    eprintln!("\n{:?}", pool.stats());
}
