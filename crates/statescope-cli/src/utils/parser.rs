use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid range '{0}'. Expected 'MIN:MAX' (e.g., '-1.5:3.0').")]
    InvalidRangeFormat(String),

    #[error("Invalid number '{value}' in range '{range}'.")]
    InvalidNumber { value: String, range: String },

    #[error("Empty range '{0}': the lower end must be below the upper end.")]
    EmptyRange(String),
}

/// Parses `MIN:MAX` into a finite, non-empty interval.
pub fn parse_range(s: &str) -> Result<(f64, f64), ParseError> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| ParseError::InvalidRangeFormat(s.to_string()))?;

    let number = |part: &str| -> Result<f64, ParseError> {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::InvalidNumber {
                value: part.trim().to_string(),
                range: s.to_string(),
            })
    };

    let (lo, hi) = (number(lo)?, number(hi)?);
    if lo >= hi {
        return Err(ParseError::EmptyRange(s.to_string()));
    }
    Ok((lo, hi))
}
