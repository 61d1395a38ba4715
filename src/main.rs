use allocator::evolution::allocation_evolution::generational::best_of_runs;
use allocator::logging::init_tracing;
use allocator::pricing::PriceRange;
use allocator::report::{AllocationReport, BestSummary, ConvergenceChart, PriceList, TargetReport};
use allocator::{EvolutionConfig, EvolutionResult, GenerationalEvolution, PricingTable};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::{fs, time::Instant};
use tracing::info;

const STOCK_PRICES: PriceRange = PriceRange {
    low: 30.,
    high: 30.,
};
const FUND_PRICES: PriceRange = PriceRange {
    low: 120.,
    high: 120.,
};

#[derive(Parser)]
#[command(name = "allocator-bin", version)]
#[command(about = "Genetic-algorithm search for a stock and fund allocation")]
struct Args {
    /// JSON file overriding the default evolution config.
    config: Option<PathBuf>,

    /// Where the full run result is written as JSON.
    #[arg(long, default_value = "ga_result.json")]
    output: PathBuf,

    /// Where the convergence chart is written as SVG.
    #[arg(long, default_value = "ga_convergence.svg")]
    chart: PathBuf,
}

fn load_config(path: &Path) -> Result<EvolutionConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config `{}`", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config `{}`", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EvolutionConfig::default(),
    };
    config.validate()?;

    let mut rng = config.make_rng();
    let pricing = PricingTable::placeholder(STOCK_PRICES, FUND_PRICES, &mut rng)?;

    println!("{}", TargetReport::new(&pricing, &config.targets));
    println!("{}", PriceList(&pricing));

    let engine = GenerationalEvolution::new(&pricing);
    let start = Instant::now();
    let result: EvolutionResult = if config.independent_runs > 1 {
        let results = engine.run_independent(&config, config.independent_runs)?;
        best_of_runs(&results).cloned().unwrap_or_default()
    } else {
        engine.evolve_with_rng(&config, None, &mut rng)?
    };
    info!(elapsed = ?start.elapsed(), "Search complete.");

    println!("{}", BestSummary::new(&pricing, &result));
    if let Some(best) = &result.best {
        println!("{}", AllocationReport::new(&pricing, best));
    }
    println!("{}", PriceList(&pricing));

    if ConvergenceChart::from_result(&result).render(&args.chart)? {
        info!(path = %args.chart.display(), "Convergence chart written.");
    }

    let json = serde_json::to_string_pretty(&result)?;
    fs::write(&args.output, json)
        .with_context(|| format!("writing `{}`", args.output.display()))?;
    info!(path = %args.output.display(), "Result written.");

    Ok(())
}
