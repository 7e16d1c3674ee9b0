use super::amortization::monthly_installment;
use super::error::{
    EngineResult, NpvError, ensure_finite, ensure_fraction, ensure_non_negative, ensure_rate,
};
use super::types::{
    CashFlows, ConfigurationMode, HorizonSpec, HraRule, Inputs, NpvResult, Overrides,
    MAX_HORIZON_YEARS, RentInitialOutlay, ResaleOutcome, TaxRegime,
};

#[derive(Debug, Clone, Copy)]
struct ResolvedHorizon {
    years: u32,
    months: u32,
    sale: bool,
}

pub fn compute_npv(inputs: &Inputs, overrides: &Overrides) -> EngineResult<NpvResult> {
    let flows = build_cash_flows(inputs, overrides)?;
    let buy_pv = present_value(flows.monthly_discount_rate, &flows.buy);
    let rent_pv = present_value(flows.monthly_discount_rate, &flows.rent);

    Ok(NpvResult {
        buy_pv,
        rent_pv,
        advantage: buy_pv - rent_pv,
        months: flows.equity.len() as u32,
        equity_trace: flows.equity,
    })
}

/// Discounts `cash_flows[i]` by `(1 + rate)^i`; index 0 is undiscounted.
pub fn present_value(monthly_rate: f64, cash_flows: &[f64]) -> f64 {
    cash_flows
        .iter()
        .enumerate()
        .map(|(month, cf)| cf / (1.0 + monthly_rate).powi(month as i32))
        .sum()
}

pub fn build_cash_flows(inputs: &Inputs, overrides: &Overrides) -> EngineResult<CashFlows> {
    let house_growth = overrides.house_growth.unwrap_or(inputs.market.house_growth);
    let rent_growth = overrides.rent_growth.unwrap_or(inputs.market.rent_growth);
    validate_inputs(inputs, house_growth, rent_growth)?;

    let horizon = resolve_horizon(inputs, overrides)?;
    let tax = active_tax_regime(inputs)?;
    let monthly_discount_rate = monthly_discount_rate(inputs)?;

    let loan = &inputs.loan;
    let costs = &inputs.costs;
    let principal = loan.principal();
    let monthly_rate = loan.monthly_rate();
    let installments = loan.installments();
    let installment = monthly_installment(principal, monthly_rate, installments)?;
    let initial_outlay = loan.down_payment() + costs.acquisition_costs(loan.price);

    let months = horizon.months as usize;
    let mut buy = Vec::with_capacity(months + 1);
    let mut equity = Vec::with_capacity(months);
    buy.push(-initial_outlay);

    let mut balance = principal;
    for month in 1..=horizon.months {
        let mut outflow = costs.monthly_carrying_cost;
        if month <= installments {
            let interest = balance * monthly_rate;
            let repaid = installment - interest;
            balance -= repaid;
            outflow += installment;
            if let Some(tax) = tax {
                outflow -= ownership_tax_benefit(tax, interest, repaid);
            }
        }
        buy.push(-outflow);
        equity.push(loan.price - balance);
    }

    let resale = if horizon.sale {
        let resale_price = loan.price * (1.0 + house_growth).powf(horizon.years as f64);
        let capital_gains_tax = tax
            .map(|t| (resale_price - loan.price).max(0.0) * t.capital_gains_rate)
            .unwrap_or(0.0);
        let net_proceeds =
            resale_price * (1.0 - costs.sell_commission) - balance - capital_gains_tax;
        if let Some(last) = buy.last_mut() {
            *last += net_proceeds;
        }
        Some(ResaleOutcome {
            resale_price,
            sale_costs: resale_price * costs.sell_commission,
            outstanding_balance: balance,
            capital_gains_tax,
            net_proceeds,
        })
    } else {
        None
    };

    let rent_path = inputs.config.rent_path;
    let mut rent = Vec::with_capacity(months + 1);
    rent.push(match rent_path.initial_outlay {
        RentInitialOutlay::MirrorBuy => -initial_outlay,
        RentInitialOutlay::Zero => 0.0,
    });

    let monthly_investment_rate = inputs.market.investment_return / 12.0;
    let monthly_rent_growth = rent_growth / 12.0;
    let hra = tax.and_then(|t| t.hra.map(|rule| (t.marginal_rate, rule)));
    let mut invested = if rent_path.seed_investment {
        initial_outlay
    } else {
        0.0
    };
    let mut current_rent = inputs.market.monthly_rent;
    for month in 1..=horizon.months {
        invested *= 1.0 + monthly_investment_rate;
        current_rent *= 1.0 + monthly_rent_growth;

        let mut outflow = current_rent;
        if let Some((marginal_rate, rule)) = hra {
            outflow -= hra_exemption(&rule, current_rent) * marginal_rate;
        }
        if rent_path.invest_difference {
            let installment_due = if month <= installments {
                installment
            } else {
                0.0
            };
            let contribution = (installment_due - current_rent).max(0.0);
            invested += contribution;
            outflow += contribution;
        }
        rent.push(-outflow);
    }
    if let Some(last) = rent.last_mut() {
        *last += invested;
    }

    Ok(CashFlows {
        buy,
        rent,
        equity,
        monthly_discount_rate,
        installment,
        resale,
    })
}

fn resolve_horizon(inputs: &Inputs, overrides: &Overrides) -> EngineResult<ResolvedHorizon> {
    let horizon = match (overrides.years, overrides.hold_to_maturity) {
        (Some(years), true) => {
            return Err(NpvError::AmbiguousHorizon(format!(
                "a {years}-year override and hold-to-maturity were both requested"
            )));
        }
        (Some(years), false) => HorizonSpec::SellAfter { years },
        (None, true) => HorizonSpec::Hold { years: None },
        (None, false) => inputs.horizon,
    };

    let (years, sale) = match horizon {
        HorizonSpec::SellAfter { years } => (years, true),
        HorizonSpec::Hold { years: Some(years) } => (years, false),
        HorizonSpec::Hold { years: None } => (inputs.loan.term_years, false),
    };
    if years == 0 {
        return Err(NpvError::invalid("horizon_years", "must be >= 1"));
    }
    if years > MAX_HORIZON_YEARS {
        return Err(NpvError::invalid(
            "horizon_years",
            format!("must be <= {MAX_HORIZON_YEARS}, got {years}"),
        ));
    }

    Ok(ResolvedHorizon {
        years,
        months: years * 12,
        sale,
    })
}

fn monthly_discount_rate(inputs: &Inputs) -> EngineResult<f64> {
    let nominal = inputs.market.discount_rate;
    if !inputs.config.inflation_adjusted {
        return Ok(nominal / 12.0);
    }

    let inflation = inputs.market.inflation.ok_or_else(|| {
        NpvError::invalid("inflation", "is required when inflation adjustment is enabled")
    })?;
    ensure_rate("inflation", inflation)?;
    let real = (1.0 + nominal) / (1.0 + inflation) - 1.0;
    ensure_rate("real_discount_rate", real)?;
    Ok(real / 12.0)
}

fn active_tax_regime(inputs: &Inputs) -> EngineResult<Option<&TaxRegime>> {
    match inputs.config.mode {
        ConfigurationMode::Simple => Ok(None),
        ConfigurationMode::IndiaRealWorld => {
            let tax = inputs.tax.as_ref().ok_or(NpvError::MissingTaxRegime)?;
            validate_tax_regime(tax)?;
            Ok(Some(tax))
        }
    }
}

/// Monthly share of the annual interest and principal deductions, each capped.
fn ownership_tax_benefit(tax: &TaxRegime, interest: f64, principal_repaid: f64) -> f64 {
    (interest * 12.0).min(tax.interest_deduction_cap) * tax.marginal_rate / 12.0
        + (principal_repaid * 12.0).min(tax.principal_deduction_cap) * tax.marginal_rate / 12.0
}

fn hra_exemption(rule: &HraRule, rent: f64) -> f64 {
    let basic = rule.monthly_basic_salary;
    let salary_cap = basic * if rule.metro { 0.5 } else { 0.4 };
    rule.monthly_hra_received
        .min((rent - 0.1 * basic).max(0.0))
        .min(salary_cap)
}

fn validate_inputs(inputs: &Inputs, house_growth: f64, rent_growth: f64) -> EngineResult<()> {
    let loan = &inputs.loan;
    ensure_finite("price", loan.price)?;
    if loan.price <= 0.0 {
        return Err(NpvError::invalid(
            "price",
            format!("must be > 0, got {}", loan.price),
        ));
    }
    ensure_fraction("down_payment", loan.down_payment_fraction)?;
    if loan.term_years == 0 {
        return Err(NpvError::invalid("term_years", "must be >= 1"));
    }
    if loan.term_years > MAX_HORIZON_YEARS {
        return Err(NpvError::invalid(
            "term_years",
            format!("must be <= {MAX_HORIZON_YEARS}, got {}", loan.term_years),
        ));
    }

    let market = &inputs.market;
    ensure_non_negative("monthly_rent", market.monthly_rent)?;
    ensure_rate("house_growth", house_growth)?;
    ensure_rate("rent_growth", rent_growth)?;
    ensure_rate("discount_rate", market.discount_rate)?;
    ensure_rate("investment_return", market.investment_return)?;

    let costs = &inputs.costs;
    ensure_fraction("buy_commission", costs.buy_commission)?;
    ensure_fraction("stamp_duty", costs.stamp_duty)?;
    ensure_fraction("sell_commission", costs.sell_commission)?;
    ensure_non_negative("fixed_fees", costs.fixed_fees)?;
    ensure_non_negative("monthly_carrying_cost", costs.monthly_carrying_cost)?;
    Ok(())
}

fn validate_tax_regime(tax: &TaxRegime) -> EngineResult<()> {
    ensure_fraction("marginal_tax_rate", tax.marginal_rate)?;
    ensure_non_negative("interest_deduction_cap", tax.interest_deduction_cap)?;
    ensure_non_negative("principal_deduction_cap", tax.principal_deduction_cap)?;
    ensure_fraction("capital_gains_rate", tax.capital_gains_rate)?;
    if let Some(hra) = &tax.hra {
        ensure_non_negative("hra_received", hra.monthly_hra_received)?;
        ensure_non_negative("basic_salary", hra.monthly_basic_salary)?;
    }
    Ok(())
}
