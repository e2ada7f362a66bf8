//! Ancestry-specific attenuation of polygenic score accuracy.
//!
//! Scores trained in European-ancestry samples predict less well elsewhere. The
//! attenuation is expressed as a divisor of the European R².

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ancestry {
    Eur,
    Amr,
    Eas,
    Afr,
}

impl Ancestry {
    /// Reporting order of the between-family driver.
    pub const ALL: [Ancestry; 4] = [Ancestry::Eur, Ancestry::Amr, Ancestry::Eas, Ancestry::Afr];

    pub fn code(self) -> &'static str {
        match self {
            Self::Eur => "EUR",
            Self::Amr => "AMR",
            Self::Eas => "EAS",
            Self::Afr => "AFR",
        }
    }
}

impl fmt::Display for Ancestry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown ancestry '{0}'. Expected one of EUR, AMR, EAS, AFR.")]
pub struct UnknownAncestry(pub String);

impl FromStr for Ancestry {
    type Err = UnknownAncestry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ancestry::ALL
            .into_iter()
            .find(|a| a.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAncestry(s.to_string()))
    }
}

/// Factors by which the European R² is divided for each other ancestry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AncestryScaling {
    pub amr: f64,
    pub eas: f64,
    pub afr: f64,
}

impl Default for AncestryScaling {
    fn default() -> Self {
        Self {
            amr: 1.6,
            eas: 2.0,
            afr: 4.5,
        }
    }
}

impl AncestryScaling {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("scale_AMR", self.amr),
            ("scale_EAS", self.eas),
            ("scale_AFR", self.afr),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::OutOfRange {
                    name,
                    value,
                    range: "(0, inf)",
                });
            }
        }
        Ok(())
    }

    pub fn factor(&self, ancestry: Ancestry) -> f64 {
        match ancestry {
            Ancestry::Eur => 1.0,
            Ancestry::Amr => self.amr,
            Ancestry::Eas => self.eas,
            Ancestry::Afr => self.afr,
        }
    }

    pub fn scaled_r2(&self, eur_r2: f64, ancestry: Ancestry) -> f64 {
        eur_r2 / self.factor(ancestry)
    }

    /// R² for every ancestry, in [`Ancestry::ALL`] order.
    pub fn table(&self, eur_r2: f64) -> Vec<(Ancestry, f64)> {
        Ancestry::ALL
            .into_iter()
            .map(|a| (a, self.scaled_r2(eur_r2, a)))
            .collect()
    }
}
