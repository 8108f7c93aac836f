use std::fmt;
use std::str::FromStr;

use super::DensityError;

/// Rule for the scalar factor that scales the sample covariance into the kernel covariance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BandwidthMethod {
    /// `n_eff^(-1/(d+4))`
    #[default]
    Scott,
    /// `(n_eff * (d + 2) / 4)^(-1/(d+4))`
    Silverman,
    /// A fixed, caller-supplied factor.
    Factor(f64),
}

impl BandwidthMethod {
    pub fn factor(&self, effective_sample_size: f64, dim: usize) -> Result<f64, DensityError> {
        let d = dim as f64;
        let exponent = -1.0 / (d + 4.0);
        match *self {
            BandwidthMethod::Scott => Ok(effective_sample_size.powf(exponent)),
            BandwidthMethod::Silverman => {
                Ok((effective_sample_size * (d + 2.0) / 4.0).powf(exponent))
            }
            BandwidthMethod::Factor(f) => {
                if f.is_finite() && f > 0.0 {
                    Ok(f)
                } else {
                    Err(DensityError::InvalidInput(format!(
                        "bandwidth factor must be positive and finite, got {f}"
                    )))
                }
            }
        }
    }
}

impl FromStr for BandwidthMethod {
    type Err = DensityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scott" => Ok(BandwidthMethod::Scott),
            "silverman" => Ok(BandwidthMethod::Silverman),
            other => other
                .parse::<f64>()
                .map(BandwidthMethod::Factor)
                .map_err(|_| {
                    DensityError::InvalidInput(format!(
                        "unknown bandwidth method '{s}', expected 'scott', 'silverman' or a number"
                    ))
                }),
        }
    }
}

impl fmt::Display for BandwidthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandwidthMethod::Scott => write!(f, "scott"),
            BandwidthMethod::Silverman => write!(f, "silverman"),
            BandwidthMethod::Factor(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn scott_factor_matches_reference_formula() {
        let factor = BandwidthMethod::Scott.factor(1000.0, 2).unwrap();
        assert!((factor - 1000f64.powf(-1.0 / 6.0)).abs() < TOLERANCE);
    }

    #[test]
    fn silverman_factor_matches_reference_formula() {
        let factor = BandwidthMethod::Silverman.factor(100.0, 1).unwrap();
        let expected = (100.0 * 3.0 / 4.0f64).powf(-0.2);
        assert!((factor - expected).abs() < TOLERANCE);
    }

    #[test]
    fn scott_and_silverman_coincide_in_two_dimensions() {
        let scott = BandwidthMethod::Scott.factor(250.0, 2).unwrap();
        let silverman = BandwidthMethod::Silverman.factor(250.0, 2).unwrap();
        assert!((scott - silverman).abs() < TOLERANCE);
    }

    #[test]
    fn explicit_factor_is_returned_verbatim() {
        assert_eq!(BandwidthMethod::Factor(0.3).factor(10.0, 3).unwrap(), 0.3);
    }

    #[test]
    fn non_positive_factor_is_rejected() {
        assert!(matches!(
            BandwidthMethod::Factor(0.0).factor(10.0, 1),
            Err(DensityError::InvalidInput(_))
        ));
        assert!(matches!(
            BandwidthMethod::Factor(f64::NAN).factor(10.0, 1),
            Err(DensityError::InvalidInput(_))
        ));
    }

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("Scott".parse::<BandwidthMethod>().unwrap(), BandwidthMethod::Scott);
        assert_eq!(
            "silverman".parse::<BandwidthMethod>().unwrap(),
            BandwidthMethod::Silverman
        );
        assert_eq!(
            "0.25".parse::<BandwidthMethod>().unwrap(),
            BandwidthMethod::Factor(0.25)
        );
        assert!("wide".parse::<BandwidthMethod>().is_err());
    }
}
