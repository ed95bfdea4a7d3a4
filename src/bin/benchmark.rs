// Head-to-head benchmark driver for the Best-Fit and MKC allocators.

use clap::Parser;
use log::error;

use allocbench::best_fit::BestFitAllocator;
use allocbench::harness::{self, BenchResult, WorkloadConfig};
use allocbench::mkc::MkcAllocator;

// Compare the Best-Fit and McKusick-Karels allocators on an identical,
// reproducible randomized workload.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    // Number of alloc/free operations to run per allocator.
    #[arg(long, default_value_t = 100_000)]
    num_operations: usize,

    // Upper bound (inclusive) on a single request's size, in bytes.
    #[arg(long, default_value_t = 128)]
    max_block_size: usize,

    // Bytes of backing region mapped for each allocator.
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    region_size: usize,

    // PRNG seed driving the request-size sequence.
    #[arg(long, default_value_t = 1_234_567)]
    seed: u64,

    // Raise the log level to show per-phase diagnostics.
    #[arg(short, long)]
    verbose: bool,
}

fn report(name: &str, result: &BenchResult) {
    println!("=== {} ===", name);
    println!("alloc:       {:?}", result.alloc_time);
    println!("free:        {:?}", result.free_time);
    println!("utilization: {:.2}%", result.utilization_pct);
    println!();
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = WorkloadConfig {
        num_operations: args.num_operations,
        max_block_size: args.max_block_size,
        region_size: args.region_size,
        seed: args.seed,
    };

    println!("Allocator comparison");
    println!("====================\n");

    let best_fit = harness::run::<BestFitAllocator>(&config);
    let mkc = harness::run::<MkcAllocator>(&config);

    let mut failed = false;
    match best_fit {
        Ok(result) => report("Best-Fit", &result),
        Err(e) => {
            error!("Best-Fit allocator failed: {}", e);
            failed = true;
        }
    }
    match mkc {
        Ok(result) => report("McKusick-Karels", &result),
        Err(e) => {
            error!("MKC allocator failed: {}", e);
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
}
