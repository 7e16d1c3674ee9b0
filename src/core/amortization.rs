use super::error::{EngineResult, NpvError, ensure_finite};
use super::types::{AmortizationRow, YearOneBreakdown};

/// Level installment that repays `principal` over `installments` periods.
pub fn monthly_installment(
    principal: f64,
    monthly_rate: f64,
    installments: u32,
) -> EngineResult<f64> {
    validate(principal, monthly_rate, installments)?;

    if monthly_rate == 0.0 {
        return Ok(principal / installments as f64);
    }

    let growth = (1.0 + monthly_rate).powi(installments as i32);
    Ok(principal * monthly_rate * growth / (growth - 1.0))
}

pub fn amortization_schedule(
    principal: f64,
    monthly_rate: f64,
    installments: u32,
) -> EngineResult<Vec<AmortizationRow>> {
    let installment = monthly_installment(principal, monthly_rate, installments)?;

    let mut balance = principal;
    let mut rows = Vec::with_capacity(installments as usize);
    for month in 1..=installments {
        let interest = balance * monthly_rate;
        let repaid = installment - interest;
        balance -= repaid;
        rows.push(AmortizationRow {
            month,
            interest,
            principal: repaid,
            balance,
        });
    }
    Ok(rows)
}

/// Interest vs principal paid over the first twelve installments.
pub fn year_one_breakdown(
    principal: f64,
    monthly_rate: f64,
    installments: u32,
) -> EngineResult<YearOneBreakdown> {
    let schedule = amortization_schedule(principal, monthly_rate, installments)?;
    let (interest, repaid) = schedule
        .iter()
        .take(12)
        .fold((0.0, 0.0), |(i, p), row| (i + row.interest, p + row.principal));
    Ok(YearOneBreakdown {
        interest,
        principal: repaid,
    })
}

fn validate(principal: f64, monthly_rate: f64, installments: u32) -> EngineResult<()> {
    ensure_finite("principal", principal)?;
    ensure_finite("monthly_rate", monthly_rate)?;
    if principal <= 0.0 {
        return Err(NpvError::invalid(
            "principal",
            format!("must be > 0, got {principal}"),
        ));
    }
    if monthly_rate < 0.0 {
        return Err(NpvError::invalid(
            "monthly_rate",
            format!("must be >= 0, got {monthly_rate}"),
        ));
    }
    if installments == 0 {
        return Err(NpvError::invalid("installments", "must be >= 1"));
    }
    Ok(())
}
