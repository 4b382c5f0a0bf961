//! Builds an AVL tree from random keys and prints it.
//!
//! Usage:
//!   cordyceps_avl [--count <n>] [--max <n>] [--seed <n>] [--rebalance path|root-only] [-v...]

use anyhow::Context;
use clap::{Parser, ValueEnum};
use cordyceps_avl::{AvlSet, Rebalance};
use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Parser)]
#[command(name = "cordyceps_avl")]
#[command(about = "Builds an AVL tree from random keys and prints it")]
struct Cli {
    /// Number of random draws; repeated values are skipped
    #[arg(long, default_value_t = 50)]
    count: usize,

    /// Exclusive upper bound of the drawn keys
    #[arg(long, default_value_t = 500)]
    max: u32,

    /// Seed for the random generator, for reproducible trees
    #[arg(long)]
    seed: Option<u64>,

    /// Which nodes are rebalanced after an insertion
    #[arg(long, value_enum, default_value_t = Policy::Path)]
    rebalance: Policy,

    /// Log more; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Policy {
    Path,
    RootOnly,
}

impl From<Policy> for Rebalance {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Path => Rebalance::Path,
            Policy::RootOnly => Rebalance::RootOnly,
        }
    }
}

fn draw_keys(rng: &mut impl Rng, count: usize, max: u32) -> Vec<u32> {
    let mut keys = Vec::with_capacity(count);

    for _ in 0..count {
        let key = rng.gen_range(0..max);

        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    keys
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("failed to install the logger")?;

    anyhow::ensure!(cli.max > 0, "--max must be at least 1");
    anyhow::ensure!(cli.count > 0, "--count must be at least 1");

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let keys = draw_keys(&mut rng, cli.count, cli.max);
    info!("drew {} distinct keys out of {} draws", keys.len(), cli.count);

    let (&seed, rest) = keys.split_first().context("no keys were drawn")?;

    let mut tree = AvlSet::with_rebalance(seed, cli.rebalance.into());
    for &key in rest {
        debug!("inserting {key}");
        tree.insert(key)?;
    }

    info!(
        "built a tree of {} keys with height {}",
        tree.len(),
        tree.tree_height()
    );

    println!("{}\n", tree.visualize());

    Ok(())
}
