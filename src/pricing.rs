use rand::distributions::Uniform;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub const STOCK_TICKERS: [&str; 10] = [
    "PETR4", "VALE3", "ITUB4", "BBDC4", "ABEV3", "WEGE3", "BBAS3", "SUZB3", "LREN3", "MGLU3",
];
pub const FUND_TICKERS: [&str; 5] = ["HGLG11", "KNRI11", "MXRF11", "XPLG11", "VISC11"];

/// The two disjoint groups an instrument can belong to.
/// Stocks are always laid out before funds in an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Stocks,
    Funds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub price: f64,
}

impl Instrument {
    pub fn new(ticker: impl Into<String>, price: f64) -> Self {
        Instrument {
            ticker: ticker.into(),
            price,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PricingError {
    #[error("Pricing table must contain at least one instrument.")]
    Empty,
    #[error("Instrument `{0}` has an invalid price: {1}")]
    InvalidPrice(String, f64),
    #[error("Instrument `{0}` is listed more than once.")]
    DuplicateInstrument(String),
    #[error("Invalid price range [{low}, {high}]")]
    InvalidPriceRange { low: f64, high: f64 },
}

/// Money spent on each class by an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub stocks: f64,
    pub funds: f64,
    pub total: f64,
}

impl Investment {
    pub fn of(&self, class: AssetClass) -> f64 {
        match class {
            AssetClass::Stocks => self.stocks,
            AssetClass::Funds => self.funds,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

impl PriceRange {
    pub fn fixed(price: f64) -> Self {
        PriceRange {
            low: price,
            high: price,
        }
    }
}

/// Immutable price list for both asset classes, loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable {
    stocks: Vec<Instrument>,
    funds: Vec<Instrument>,
}

impl PricingTable {
    pub fn new(stocks: Vec<Instrument>, funds: Vec<Instrument>) -> Result<Self, PricingError> {
        if stocks.is_empty() && funds.is_empty() {
            return Err(PricingError::Empty);
        }

        let mut seen = HashSet::new();
        for instrument in stocks.iter().chain(funds.iter()) {
            if !(instrument.price.is_finite() && instrument.price > 0.) {
                return Err(PricingError::InvalidPrice(
                    instrument.ticker.clone(),
                    instrument.price,
                ));
            }
            if !seen.insert(instrument.ticker.as_str()) {
                return Err(PricingError::DuplicateInstrument(instrument.ticker.clone()));
            }
        }

        Ok(PricingTable { stocks, funds })
    }

    /// Stand-in price source: every ticker gets a price drawn from its class range,
    /// rounded to cents.
    pub fn placeholder<R: Rng + ?Sized>(
        stock_range: PriceRange,
        fund_range: PriceRange,
        rng: &mut R,
    ) -> Result<Self, PricingError> {
        let stocks = sample_prices(&STOCK_TICKERS, stock_range, rng)?;
        let funds = sample_prices(&FUND_TICKERS, fund_range, rng)?;
        PricingTable::new(stocks, funds)
    }

    pub fn stocks(&self) -> &[Instrument] {
        &self.stocks
    }

    pub fn funds(&self) -> &[Instrument] {
        &self.funds
    }

    pub fn class(&self, class: AssetClass) -> &[Instrument] {
        match class {
            AssetClass::Stocks => &self.stocks,
            AssetClass::Funds => &self.funds,
        }
    }

    /// Offset of the first gene belonging to `class`.
    pub fn offset(&self, class: AssetClass) -> usize {
        match class {
            AssetClass::Stocks => 0,
            AssetClass::Funds => self.stocks.len(),
        }
    }

    /// Number of genes an allocation over this table must have.
    pub fn len(&self) -> usize {
        self.stocks.len() + self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn price_of(&self, ticker: &str) -> Option<f64> {
        self.stocks
            .iter()
            .chain(self.funds.iter())
            .find(|instrument| instrument.ticker == ticker)
            .map(|instrument| instrument.price)
    }

    pub fn total_investment(&self, genes: &[u32]) -> Investment {
        debug_assert_eq!(genes.len(), self.len(), "allocation length mismatch");
        let stocks = class_investment(&self.stocks, &genes[..self.stocks.len().min(genes.len())]);
        let funds = class_investment(
            &self.funds,
            genes.get(self.stocks.len()..).unwrap_or_default(),
        );
        Investment {
            stocks,
            funds,
            total: stocks + funds,
        }
    }
}

fn class_investment(instruments: &[Instrument], genes: &[u32]) -> f64 {
    instruments
        .iter()
        .zip(genes.iter())
        .map(|(instrument, &units)| units as f64 * instrument.price)
        .sum()
}

fn sample_prices<R: Rng + ?Sized>(
    tickers: &[&str],
    range: PriceRange,
    rng: &mut R,
) -> Result<Vec<Instrument>, PricingError> {
    let PriceRange { low, high } = range;
    if !(low.is_finite() && high.is_finite() && low > 0. && low <= high) {
        return Err(PricingError::InvalidPriceRange { low, high });
    }
    let uniform = Uniform::new_inclusive(low, high);

    Ok(tickers
        .iter()
        .map(|ticker| {
            let price = (uniform.sample(rng) * 100.).round() / 100.;
            Instrument::new(*ticker, price)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn reference_table() -> PricingTable {
        let mut rng = StdRng::seed_from_u64(7);
        PricingTable::placeholder(PriceRange::fixed(30.), PriceRange::fixed(120.), &mut rng)
            .unwrap()
    }

    #[test]
    fn test_placeholder_fixed_ranges() {
        let table = reference_table();
        assert_eq!(table.stocks().len(), 10);
        assert_eq!(table.funds().len(), 5);
        assert!(
            table.stocks().iter().all(|i| i.price == 30.),
            "Fixed range should yield the same price for every stock"
        );
        assert_eq!(table.price_of("KNRI11"), Some(120.));
        assert_eq!(table.price_of("NOPE3"), None);
    }

    #[test]
    fn test_placeholder_rounds_to_cents() {
        let mut rng = StdRng::seed_from_u64(11);
        let range = PriceRange {
            low: 10.,
            high: 50.,
        };
        let table = PricingTable::placeholder(range, range, &mut rng).unwrap();
        for instrument in table.stocks().iter().chain(table.funds()) {
            let cents = instrument.price * 100.;
            assert!(
                (cents - cents.round()).abs() < 1e-6,
                "Price {} is not rounded to cents",
                instrument.price
            );
            assert!(instrument.price >= 10. && instrument.price <= 50.);
        }
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert_eq!(PricingTable::new(vec![], vec![]).unwrap_err(), PricingError::Empty);
        assert!(matches!(
            PricingTable::new(vec![Instrument::new("A", 0.)], vec![]),
            Err(PricingError::InvalidPrice(..))
        ));
        assert!(matches!(
            PricingTable::new(
                vec![Instrument::new("A", 1.)],
                vec![Instrument::new("A", 2.)]
            ),
            Err(PricingError::DuplicateInstrument(_))
        ));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            PricingTable::placeholder(
                PriceRange { low: 5., high: 1. },
                PriceRange::fixed(1.),
                &mut rng
            ),
            Err(PricingError::InvalidPriceRange { .. })
        ));
    }

    #[test]
    fn test_total_investment_is_additive() {
        let table = reference_table();
        let mut genes = vec![0; table.len()];
        genes[0] = 2;
        genes[9] = 1;
        genes[10] = 3;
        let investment = table.total_investment(&genes);
        assert_eq!(investment.stocks, 90.);
        assert_eq!(investment.funds, 360.);
        assert_eq!(investment.total, investment.stocks + investment.funds);
        assert_eq!(table.offset(AssetClass::Funds), 10);
    }
}
