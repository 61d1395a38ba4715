use crate::consts::{
    BUDGET, CLASS_A_PROPORTION, CLASS_B_BONUS_RATE, CLASS_B_PROPORTION, DISTRIBUTION_WEIGHT,
    FLOAT_COMPARISON_EPSILON, PROPORTION_WEIGHT,
};
use crate::evolution::allocation_evolution::EvolutionError;
use crate::pricing::{AssetClass, Investment, PricingTable};
use serde::{Deserialize, Serialize};
use tracing::warn;

fn default_fund_bonus_rate() -> f64 {
    CLASS_B_BONUS_RATE
}

/// What a good allocation looks like: the budget, the split between classes,
/// and how much each error term weighs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FitnessTargets {
    pub budget: f64,
    pub stock_proportion: f64,
    pub fund_proportion: f64,
    pub proportion_weight: f64,
    pub distribution_weight: f64,
    /// Share of the fund investment added on top of the base score.
    #[serde(default = "default_fund_bonus_rate")]
    pub fund_bonus_rate: f64,
}

impl Default for FitnessTargets {
    fn default() -> Self {
        FitnessTargets {
            budget: BUDGET,
            stock_proportion: CLASS_A_PROPORTION,
            fund_proportion: CLASS_B_PROPORTION,
            proportion_weight: PROPORTION_WEIGHT,
            distribution_weight: DISTRIBUTION_WEIGHT,
            fund_bonus_rate: CLASS_B_BONUS_RATE,
        }
    }
}

impl FitnessTargets {
    pub fn proportion(&self, class: AssetClass) -> f64 {
        match class {
            AssetClass::Stocks => self.stock_proportion,
            AssetClass::Funds => self.fund_proportion,
        }
    }

    pub fn validate(&self) -> Result<(), EvolutionError> {
        if !(self.budget.is_finite() && self.budget > 0.) {
            return Err(EvolutionError::InvalidBudget(self.budget));
        }
        for (name, value) in [
            ("stock_proportion", self.stock_proportion),
            ("fund_proportion", self.fund_proportion),
            ("fund_bonus_rate", self.fund_bonus_rate),
        ] {
            if !(value.is_finite() && value >= 0.) {
                return Err(EvolutionError::Negative { name, value });
            }
        }
        for (name, value) in [
            ("proportion_weight", self.proportion_weight),
            ("distribution_weight", self.distribution_weight),
        ] {
            if !(0. ..=1.).contains(&value) {
                return Err(EvolutionError::OutOfUnitRange { name, value });
            }
        }

        let proportion_sum = self.stock_proportion + self.fund_proportion;
        if (proportion_sum - 1.).abs() > FLOAT_COMPARISON_EPSILON {
            warn!(
                proportion_sum,
                "Target class proportions do not sum to 1, the proportion error can never reach 0."
            );
        }
        Ok(())
    }
}

/// Every intermediate term of a fitness computation, mostly for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub investment: Investment,
    pub feasible: bool,
    pub proportion_error: f64,
    pub stock_distribution_error: f64,
    pub fund_distribution_error: f64,
    pub weighted_error: f64,
    pub base_score: f64,
    pub bonus: f64,
    pub fitness: f64,
}

impl FitnessBreakdown {
    fn infeasible(investment: Investment) -> Self {
        FitnessBreakdown {
            investment,
            feasible: false,
            proportion_error: 0.,
            stock_distribution_error: 0.,
            fund_distribution_error: 0.,
            weighted_error: 0.,
            base_score: 0.,
            bonus: 0.,
            fitness: 0.,
        }
    }
}

/// Scores allocations against a pricing table. Pure: same genes, same score.
#[derive(Debug, Clone, Copy)]
pub struct FitnessEvaluator<'a> {
    pricing: &'a PricingTable,
    targets: &'a FitnessTargets,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(pricing: &'a PricingTable, targets: &'a FitnessTargets) -> Self {
        FitnessEvaluator { pricing, targets }
    }

    pub fn evaluate(&self, genes: &[u32]) -> f64 {
        self.breakdown(genes).fitness
    }

    pub fn breakdown(&self, genes: &[u32]) -> FitnessBreakdown {
        let investment = self.pricing.total_investment(genes);

        // Over budget is penalized, and an empty allocation has no proportions to speak of.
        if investment.total > self.targets.budget || investment.total <= 0. {
            return FitnessBreakdown::infeasible(investment);
        }

        let proportion_error = [AssetClass::Stocks, AssetClass::Funds]
            .iter()
            .map(|&class| {
                (self.targets.proportion(class) - investment.of(class) / investment.total).abs()
            })
            .sum::<f64>();

        let stock_distribution_error =
            self.distribution_error(AssetClass::Stocks, genes, &investment);
        let fund_distribution_error =
            self.distribution_error(AssetClass::Funds, genes, &investment);

        let weighted_error = self.targets.proportion_weight * proportion_error
            + self.targets.distribution_weight
                * (stock_distribution_error + fund_distribution_error);
        let base_score = (investment.total / 2.) * (-weighted_error).exp();
        let bonus = investment.funds * self.targets.fund_bonus_rate;

        FitnessBreakdown {
            investment,
            feasible: true,
            proportion_error,
            stock_distribution_error,
            fund_distribution_error,
            weighted_error,
            base_score,
            bonus,
            fitness: base_score + bonus,
        }
    }

    /// Sum of absolute deviations between each instrument's share of its class
    /// and the ideal `proportion / instrument_count`. Zero when nothing is invested
    /// in the class.
    pub fn distribution_error(
        &self,
        class: AssetClass,
        genes: &[u32],
        investment: &Investment,
    ) -> f64 {
        let class_investment = investment.of(class);
        if class_investment <= 0. {
            return 0.;
        }

        let instruments = self.pricing.class(class);
        let ideal_share = self.targets.proportion(class) / instruments.len() as f64;
        let class_genes = genes.get(self.pricing.offset(class)..).unwrap_or_default();

        instruments
            .iter()
            .zip(class_genes.iter())
            .map(|(instrument, &units)| {
                (ideal_share - units as f64 * instrument.price / class_investment).abs()
            })
            .sum()
    }
}
