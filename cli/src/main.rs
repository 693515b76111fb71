use std::path::PathBuf;

use anyhow::{Context, Result};
use cache_sim::{config::CacheConfig, sim::Simulator, trace::TraceReader};
use clap::Parser;

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

/// Replays a valgrind memory trace against an LRU set-associative cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of set index bits (S = 2^s sets)
    #[arg(short = 's', value_name = "num")]
    set_bits: u32,
    /// Number of lines per set
    #[arg(short = 'E', value_name = "num")]
    lines_per_set: usize,
    /// Number of block offset bits (B = 2^b bytes per block)
    #[arg(short = 'b', value_name = "num")]
    block_bits: u32,
    /// Trace file
    #[arg(short = 't', value_name = "file")]
    trace: PathBuf,
    /// Print the outcome of every trace record
    #[arg(short, long)]
    verbose: bool,
    /// File the `hits misses evictions` triple is written to
    #[arg(long, default_value = ".csim_results")]
    results: PathBuf,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
    let config = CacheConfig::new(args.block_bits, args.set_bits, args.lines_per_set)?;
    let trace = TraceReader::open(&args.trace)?;
    let mut sim = Simulator::new(config);
    let verbose = args.verbose;
    sim.replay(trace, |record, outcome| {
        if verbose {
            println!("{record} {outcome}");
        }
    })?;
    log::info!("finished replaying {}.", args.trace.display());
    output_stat(&sim);

    let summary = sim.summary();
    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{summary}");
    }
    summary
        .write_results(&args.results)
        .with_context(|| format!("failed to write {}", args.results.display()))?;
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    log::info!("statistics:\n{}", sim.collect_stat().view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}
