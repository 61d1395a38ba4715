//! Console rendering of targets and allocations, and the convergence chart.
//! Nothing here feeds back into the search.

use crate::allocation::Allocation;
use crate::consts::FLOAT_COMPARISON_EPSILON;
use crate::evolution::allocation_evolution::EvolutionResult;
use crate::evolution::objective::FitnessTargets;
use crate::pricing::{AssetClass, Investment, PricingTable};
use itertools::Itertools;
use plotters::prelude::*;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHART_SIZE: (u32, u32) = (1024, 640);
const CLASSES: [AssetClass; 2] = [AssetClass::Stocks, AssetClass::Funds];

fn class_label(class: AssetClass) -> &'static str {
    match class {
        AssetClass::Stocks => "Stocks",
        AssetClass::Funds => "Funds",
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0. {
        part / whole * 100.
    } else {
        0.
    }
}

/// The split the search is aiming for.
pub struct TargetReport<'a> {
    pricing: &'a PricingTable,
    targets: &'a FitnessTargets,
}

impl<'a> TargetReport<'a> {
    pub fn new(pricing: &'a PricingTable, targets: &'a FitnessTargets) -> Self {
        TargetReport { pricing, targets }
    }
}

impl fmt::Display for TargetReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Target Portfolio ===")?;
        for class in CLASSES {
            writeln!(
                f,
                "% {}: {:.2}%",
                class_label(class),
                self.targets.proportion(class) * 100.
            )?;
        }
        for class in CLASSES {
            let instruments = self.pricing.class(class);
            if instruments.is_empty() {
                continue;
            }
            let ideal = self.targets.proportion(class) * 100. / instruments.len() as f64;
            for instrument in instruments {
                writeln!(
                    f,
                    "{}: {:.2}% of {}",
                    instrument.ticker,
                    ideal,
                    class_label(class)
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub ticker: String,
    pub units: u32,
    pub percent_of_class: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassBreakdown {
    pub class: AssetClass,
    pub invested: f64,
    pub percent_of_total: f64,
    /// Empty when nothing was invested in the class.
    pub holdings: Vec<Holding>,
}

/// Where the money of one allocation actually goes.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub investment: Investment,
    pub classes: Vec<ClassBreakdown>,
}

impl AllocationReport {
    pub fn new(pricing: &PricingTable, allocation: &Allocation) -> Self {
        let genes = allocation.genes();
        let investment = pricing.total_investment(genes);

        let classes = CLASSES
            .iter()
            .map(|&class| {
                let invested = investment.of(class);
                let class_genes = genes.get(pricing.offset(class)..).unwrap_or_default();
                let holdings = if invested > 0. {
                    pricing
                        .class(class)
                        .iter()
                        .zip(class_genes.iter())
                        .map(|(instrument, &units)| Holding {
                            ticker: instrument.ticker.clone(),
                            units,
                            percent_of_class: percent(units as f64 * instrument.price, invested),
                        })
                        .collect()
                } else {
                    vec![]
                };
                ClassBreakdown {
                    class,
                    invested,
                    percent_of_total: percent(invested, investment.total),
                    holdings,
                }
            })
            .collect();

        AllocationReport {
            investment,
            classes,
        }
    }
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Final Portfolio ===")?;
        for breakdown in &self.classes {
            writeln!(
                f,
                "% {}: {:.2}%",
                class_label(breakdown.class),
                breakdown.percent_of_total
            )?;
        }
        for breakdown in &self.classes {
            let label = class_label(breakdown.class);
            if breakdown.holdings.is_empty() {
                writeln!(f, "No investment in {}.", label.to_lowercase())?;
                continue;
            }
            for holding in &breakdown.holdings {
                writeln!(
                    f,
                    "{}: {:.2}% of {} ({} units)",
                    holding.ticker, holding.percent_of_class, label, holding.units
                )?;
            }
        }
        Ok(())
    }
}

pub struct PriceList<'a>(pub &'a PricingTable);

impl fmt::Display for PriceList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in CLASSES {
            writeln!(f, "=== {} Prices ===", class_label(class))?;
            for instrument in self.0.class(class) {
                writeln!(f, "{}: R$ {:.2}", instrument.ticker, instrument.price)?;
            }
        }
        Ok(())
    }
}

/// One-paragraph summary of a run's global best.
pub struct BestSummary<'a> {
    pricing: &'a PricingTable,
    result: &'a EvolutionResult,
}

impl<'a> BestSummary<'a> {
    pub fn new(pricing: &'a PricingTable, result: &'a EvolutionResult) -> Self {
        BestSummary { pricing, result }
    }
}

impl fmt::Display for BestSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(best), Some(generation)) =
            (&self.result.best, self.result.best_generation_index())
        else {
            return writeln!(f, "No generations were run, there is no best allocation.");
        };
        let investment = self.pricing.total_investment(best.genes());

        writeln!(f, "=== Global Best ===")?;
        writeln!(f, "Found in generation: {}", generation + 1)?;
        writeln!(f, "Best fitness: {:.2}", best.fitness().unwrap_or(0.))?;
        writeln!(f, "Total investment: R$ {:.2}", investment.total)?;
        writeln!(f, "Allocation: [{}]", best.genes().iter().join(", "))
    }
}

#[derive(Error, Debug)]
#[error("Failed to draw convergence chart `{}`: {message}", .path.display())]
pub struct ChartError {
    pub path: PathBuf,
    pub message: String,
}

/// Line chart of mean and best fitness per generation, rendered as SVG.
pub struct ConvergenceChart<'a> {
    mean: &'a [f64],
    best: &'a [f64],
}

impl<'a> ConvergenceChart<'a> {
    pub fn new(mean: &'a [f64], best: &'a [f64]) -> Self {
        ConvergenceChart { mean, best }
    }

    pub fn from_result(result: &'a EvolutionResult) -> Self {
        ConvergenceChart::new(
            &result.mean_fitness_per_generation,
            &result.best_fitness_per_generation,
        )
    }

    fn points(&self) -> usize {
        self.mean.len().min(self.best.len())
    }

    /// Fitness bounds over both series, widened when they are flat.
    fn fitness_range(&self) -> Range<f64> {
        let points = self.points();
        let (low, high) = self.mean[..points]
            .iter()
            .chain(&self.best[..points])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &value| {
                (low.min(value), high.max(value))
            });
        if high - low < FLOAT_COMPARISON_EPSILON {
            low - 1.0..high + 1.0
        } else {
            low..high
        }
    }

    /// Writes the chart to `path`. Returns `false`, writing nothing, when there
    /// is no generation to plot.
    pub fn render(&self, path: &Path) -> Result<bool, ChartError> {
        if self.points() == 0 {
            return Ok(false);
        }
        self.draw(path).map_err(|err| ChartError {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(true)
    }

    fn draw(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let points = self.points();
        let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Genetic Algorithm Convergence", ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(1.0..(points as f64).max(2.), self.fitness_range())?;

        chart
            .configure_mesh()
            .x_desc("Generation")
            .y_desc("Fitness")
            .draw()?;

        for (series, label, color) in [
            (self.mean, "Mean fitness", &BLUE),
            (self.best, "Best fitness", &RED),
        ] {
            chart
                .draw_series(LineSeries::new(
                    series[..points]
                        .iter()
                        .enumerate()
                        .map(|(generation, &fitness)| ((generation + 1) as f64, fitness)),
                    color,
                ))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }
}
