use serde::Serialize;

/// Longest holding period or loan term, in years.
pub const MAX_HORIZON_YEARS: u32 = 200;
pub const MAX_SIMULATIONS: u32 = 100_000;
pub const MAX_SWEEP_POINTS: u32 = 10_000;
pub const MAX_HISTOGRAM_BINS: u32 = 1_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigurationMode {
    Simple,
    IndiaRealWorld,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RentInitialOutlay {
    MirrorBuy,
    Zero,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HorizonSpec {
    SellAfter { years: u32 },
    /// No resale. `None` runs to loan maturity.
    Hold { years: Option<u32> },
}

#[derive(Debug, Clone, Copy)]
pub struct LoanTerms {
    pub price: f64,
    pub down_payment_fraction: f64,
    pub annual_rate: f64,
    pub term_years: u32,
}

impl LoanTerms {
    pub fn down_payment(&self) -> f64 {
        self.price * self.down_payment_fraction
    }

    pub fn principal(&self) -> f64 {
        self.price - self.down_payment()
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate / 12.0
    }

    pub fn installments(&self) -> u32 {
        self.term_years * 12
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarketAssumptions {
    pub monthly_rent: f64,
    pub rent_growth: f64,
    pub house_growth: f64,
    pub discount_rate: f64,
    pub investment_return: f64,
    pub inflation: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct CostSchedule {
    pub buy_commission: f64,
    pub stamp_duty: f64,
    pub fixed_fees: f64,
    pub monthly_carrying_cost: f64,
    pub sell_commission: f64,
}

impl CostSchedule {
    pub fn acquisition_costs(&self, price: f64) -> f64 {
        price * (self.buy_commission + self.stamp_duty) + self.fixed_fees
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HraRule {
    pub monthly_hra_received: f64,
    pub monthly_basic_salary: f64,
    pub metro: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TaxRegime {
    pub marginal_rate: f64,
    pub interest_deduction_cap: f64,
    pub principal_deduction_cap: f64,
    pub capital_gains_rate: f64,
    pub hra: Option<HraRule>,
}

#[derive(Debug, Clone, Copy)]
pub struct RentPathOptions {
    pub initial_outlay: RentInitialOutlay,
    /// Start the invested balance at the mirrored initial outlay.
    pub seed_investment: bool,
    pub invest_difference: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub mode: ConfigurationMode,
    pub rent_path: RentPathOptions,
    pub inflation_adjusted: bool,
}

#[derive(Debug, Clone)]
pub struct Inputs {
    pub loan: LoanTerms,
    pub market: MarketAssumptions,
    pub horizon: HorizonSpec,
    pub costs: CostSchedule,
    pub tax: Option<TaxRegime>,
    pub config: EngineConfig,
}

/// Per-call substitutions used by the drivers. Rates are fractions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub house_growth: Option<f64>,
    pub rent_growth: Option<f64>,
    pub years: Option<u32>,
    pub hold_to_maturity: bool,
}

impl Overrides {
    pub fn growth(house_growth: f64, rent_growth: f64) -> Self {
        Self {
            house_growth: Some(house_growth),
            rent_growth: Some(rent_growth),
            ..Self::default()
        }
    }

    pub fn years(years: u32) -> Self {
        Self {
            years: Some(years),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CashFlows {
    pub buy: Vec<f64>,
    pub rent: Vec<f64>,
    pub equity: Vec<f64>,
    pub monthly_discount_rate: f64,
    pub installment: f64,
    pub resale: Option<ResaleOutcome>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResaleOutcome {
    pub resale_price: f64,
    pub sale_costs: f64,
    pub outstanding_balance: f64,
    pub capital_gains_tax: f64,
    pub net_proceeds: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpvResult {
    pub buy_pv: f64,
    pub rent_pv: f64,
    pub advantage: f64,
    pub months: u32,
    pub equity_trace: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationRow {
    pub month: u32,
    pub interest: f64,
    pub principal: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOneBreakdown {
    pub interest: f64,
    pub principal: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRow {
    pub name: String,
    pub house_growth: f64,
    pub rent_growth: f64,
    pub buy_pv: f64,
    pub rent_pv: f64,
    pub advantage: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepPoint {
    pub house_growth: f64,
    pub buy_pv: f64,
    pub rent_pv: f64,
    pub advantage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityCurve {
    pub points: Vec<SweepPoint>,
    pub crossings: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearPoint {
    pub years: u32,
    pub buy_pv: f64,
    pub rent_pv: f64,
    pub advantage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEvenHorizon {
    pub break_even_years: Option<u32>,
    pub searched_years: u32,
    pub series: Vec<YearPoint>,
}
