use thiserror::Error;

pub type EngineResult<T> = Result<T, NpvError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NpvError {
    #[error("invalid input: {field} {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("ambiguous horizon: {0}")]
    AmbiguousHorizon(String),

    #[error("india-real-world mode requires a tax regime")]
    MissingTaxRegime,
}

impl NpvError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        NpvError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NpvError::invalid(field, format!("must be finite, got {value}")))
    }
}

/// Growth and discount rates at or below -100% make compounding factors non-positive.
pub(crate) fn ensure_rate(field: &'static str, rate: f64) -> EngineResult<()> {
    ensure_finite(field, rate)?;
    if rate <= -1.0 {
        return Err(NpvError::invalid(
            field,
            format!("must be > -100%, got {:.4}%", rate * 100.0),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_fraction(field: &'static str, value: f64) -> EngineResult<()> {
    ensure_finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(NpvError::invalid(
            field,
            format!("must be between 0% and 100%, got {:.4}%", value * 100.0),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> EngineResult<()> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(NpvError::invalid(field, format!("must be >= 0, got {value}")));
    }
    Ok(())
}
