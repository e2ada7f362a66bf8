//! # Simulation Configuration
//!
//! The single, validated description of one simulation run: how many families,
//! how many embryos per family, which genetic architecture generates them, and
//! how outcomes are rescaled or binarized afterwards.
//!
//! - One Tagged Entry Point: every architecture is a variant of [`ModelVariant`],
//!   so decomposition and generation dispatch on one tag.
//! - Eager Validation: [`SimulationConfig::validate`] rejects infeasible parameter
//!   combinations before a single number is drawn. Nothing is clamped.
//! - Serializable: the structs double as the schema of TOML scenario files.

use itertools::izip;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Every way a configuration can be rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("The cohort must contain at least one family (got {0}).")]
    NoFamilies(usize),

    #[error("Selection needs at least two embryos per family (got {0}).")]
    TooFewEmbryos(usize),

    #[error("Parameter '{name}' = {value} is invalid; it must lie in {range}.")]
    OutOfRange {
        name: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error(
        "SNP heritability ({snp}) must be less than or equal to broad-sense heritability ({broad})."
    )]
    SnpExceedsBroad { snp: f64, broad: f64 },

    #[error(
        "The MZ twin correlation ({correlation_mz}) must be at least the heritability ({heritability})."
    )]
    TwinCorrelationBelowHeritability {
        correlation_mz: f64,
        heritability: f64,
    },

    #[error(
        "Infeasible parameters: the variance of the {term} would be {radicand:.6e}. Requires {requirement}."
    )]
    NegativeRadicand {
        term: &'static str,
        radicand: f64,
        requirement: &'static str,
    },

    #[error(
        "Your lists aren't the same length: '{list}' has {found} entries but '{reference}' has {expected}."
    )]
    MismatchedLists {
        list: &'static str,
        found: usize,
        reference: &'static str,
        expected: usize,
    },
}

/// How a continuous liability is turned into an affected/unaffected status.
///
/// The pleiotropic variant counts the upper tail by default, the
/// liability-threshold variant the lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdConvention {
    /// Affected iff liability > Φ⁻¹(1 − prevalence).
    UpperTail,
    /// Affected iff liability <= Φ⁻¹(prevalence).
    LowerTail,
}

impl ThresholdConvention {
    pub fn describe(self) -> &'static str {
        match self {
            Self::UpperTail => "liability above the (1 - prevalence) quantile",
            Self::LowerTail => "liability at or below the prevalence quantile",
        }
    }
}

impl fmt::Display for ThresholdConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A secondary trait genetically correlated with the main phenotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pleiotropy {
    /// Genetic correlation `r_g` between the main trait and the pleiotropic trait.
    pub genetic_correlation: f64,
    /// Heritability of the pleiotropic trait.
    pub heritability: f64,
    /// Population prevalence of the pleiotropic trait. When present, a liability
    /// layer is drawn and the trait is reported as binary.
    #[serde(default)]
    pub prevalence: Option<f64>,
}

/// The genetic architecture generating each cohort, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelVariant {
    /// Embryos drawn with no shared-parent structure.
    BetweenFamily { heritability: f64, r2: f64 },
    /// Embryos share parental genetic and environmental means.
    WithinFamily {
        heritability_broad: f64,
        heritability_snp: f64,
        r2: f64,
    },
    /// Within-family, plus a trait correlated with the main phenotype.
    WithinFamilyPleiotropic {
        heritability_broad: f64,
        heritability_snp: f64,
        r2: f64,
        pleiotropy: Pleiotropy,
    },
    /// Binary clinical condition on the liability scale, with heritability and
    /// shared environment taken from MZ twin correlations.
    LiabilityThreshold {
        heritability: f64,
        correlation_mz: f64,
        r2: f64,
        prevalence: f64,
    },
}

impl ModelVariant {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BetweenFamily { .. } => "between_family",
            Self::WithinFamily { .. } => "within_family",
            Self::WithinFamilyPleiotropic { .. } => "within_family_pleiotropic",
            Self::LiabilityThreshold { .. } => "liability_threshold",
        }
    }

    /// The accuracy R² of the polygenic score in this architecture.
    pub fn r2(&self) -> f64 {
        match self {
            Self::BetweenFamily { r2, .. }
            | Self::WithinFamily { r2, .. }
            | Self::WithinFamilyPleiotropic { r2, .. }
            | Self::LiabilityThreshold { r2, .. } => *r2,
        }
    }

    /// Binarization convention applied when none is configured, or `None`
    /// when the variant never binarizes anything.
    pub fn default_convention(&self) -> Option<ThresholdConvention> {
        match self {
            Self::BetweenFamily { .. } | Self::WithinFamily { .. } => None,
            Self::WithinFamilyPleiotropic { pleiotropy, .. } => pleiotropy
                .prevalence
                .map(|_| ThresholdConvention::UpperTail),
            Self::LiabilityThreshold { .. } => Some(ThresholdConvention::LowerTail),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_sd_pheno() -> f64 {
    1.0
}

/// The complete description of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of independent parent pairs (rows).
    pub families: usize,
    /// Number of embryos per parent pair (columns).
    pub embryos: usize,
    pub variant: ModelVariant,
    /// Population standard deviation of the main phenotype. Continuous
    /// differences are reported in these units.
    #[serde(default = "default_sd_pheno")]
    pub sd_pheno: f64,
    /// Overrides the variant's default binarization convention.
    #[serde(default)]
    pub threshold_convention: Option<ThresholdConvention>,
}

impl SimulationConfig {
    pub fn new(families: usize, embryos: usize, variant: ModelVariant) -> Self {
        Self {
            families,
            embryos,
            variant,
            sd_pheno: default_sd_pheno(),
            threshold_convention: None,
        }
    }

    pub fn with_sd_pheno(mut self, sd_pheno: f64) -> Self {
        self.sd_pheno = sd_pheno;
        self
    }

    pub fn with_threshold_convention(mut self, convention: ThresholdConvention) -> Self {
        self.threshold_convention = Some(convention);
        self
    }

    /// The convention actually applied to liabilities in this run.
    pub fn threshold_convention(&self) -> Option<ThresholdConvention> {
        self.threshold_convention
            .or_else(|| self.variant.default_convention())
    }

    /// Checks shape and parameter-range requirements. Radicand feasibility is
    /// checked separately by the decomposer, which knows the formulas.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.families == 0 {
            return Err(ConfigError::NoFamilies(self.families));
        }
        if self.embryos < 2 {
            return Err(ConfigError::TooFewEmbryos(self.embryos));
        }
        if !(self.sd_pheno.is_finite() && self.sd_pheno > 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "sd_pheno",
                value: self.sd_pheno,
                range: "(0, inf)",
            });
        }

        match &self.variant {
            ModelVariant::BetweenFamily { heritability, r2 } => {
                check_positive_unit("heritability", *heritability)?;
                check_positive_unit("r2", *r2)?;
            }
            ModelVariant::WithinFamily {
                heritability_broad,
                heritability_snp,
                r2,
            } => {
                check_within_family(*heritability_broad, *heritability_snp, *r2)?;
            }
            ModelVariant::WithinFamilyPleiotropic {
                heritability_broad,
                heritability_snp,
                r2,
                pleiotropy,
            } => {
                check_within_family(*heritability_broad, *heritability_snp, *r2)?;
                // The pleiotropic mean divides by the broad heritability.
                check_positive_unit("heritability_broad", *heritability_broad)?;
                check_unit("heritability_pleio", pleiotropy.heritability)?;
                check_closed(
                    "correlation_pleio",
                    pleiotropy.genetic_correlation,
                    -1.0,
                    1.0,
                    "[-1, 1]",
                )?;
                if let Some(prevalence) = pleiotropy.prevalence {
                    check_prevalence("prevalence_pleio", prevalence)?;
                }
            }
            ModelVariant::LiabilityThreshold {
                heritability,
                correlation_mz,
                r2,
                prevalence,
            } => {
                check_unit("heritability", *heritability)?;
                check_unit("correlation_mz", *correlation_mz)?;
                check_positive_unit("r2", *r2)?;
                check_prevalence("prevalence", *prevalence)?;
                if correlation_mz < heritability {
                    return Err(ConfigError::TwinCorrelationBelowHeritability {
                        correlation_mz: *correlation_mz,
                        heritability: *heritability,
                    });
                }
            }
        }

        Ok(())
    }
}

fn check_within_family(broad: f64, snp: f64, r2: f64) -> Result<(), ConfigError> {
    check_unit("heritability_broad", broad)?;
    check_unit("heritability_snp", snp)?;
    check_positive_unit("r2", r2)?;
    if snp > broad {
        return Err(ConfigError::SnpExceedsBroad { snp, broad });
    }
    Ok(())
}

fn check_closed(
    name: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
    range: &'static str,
) -> Result<(), ConfigError> {
    if (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value, range })
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    check_closed(name, value, 0.0, 1.0, "[0, 1]")
}

fn check_positive_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            range: "(0, 1]",
        })
    }
}

fn check_prevalence(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            range: "(0, 1)",
        })
    }
}

/// One clinical condition assembled from the driver's parallel lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalCondition {
    pub name: String,
    pub heritability: f64,
    pub r2: f64,
    pub correlation_mz: f64,
    pub prevalence: f64,
}

impl ClinicalCondition {
    pub fn variant(&self) -> ModelVariant {
        ModelVariant::LiabilityThreshold {
            heritability: self.heritability,
            correlation_mz: self.correlation_mz,
            r2: self.r2,
            prevalence: self.prevalence,
        }
    }
}

/// Zips index-aligned parameter lists into conditions. The heritability list is
/// the reference length; any other list of a different length is rejected.
pub fn conditions_from_lists(
    names: &[String],
    heritability: &[f64],
    r2: &[f64],
    correlation_mz: &[f64],
    prevalence: &[f64],
) -> Result<Vec<ClinicalCondition>, ConfigError> {
    let expected = heritability.len();
    let lengths = [
        ("rsquared", r2.len()),
        ("correlation_mz", correlation_mz.len()),
        ("prevalence", prevalence.len()),
        ("condition", names.len()),
    ];
    for (list, found) in lengths {
        if found != expected {
            return Err(ConfigError::MismatchedLists {
                list,
                found,
                reference: "heritability",
                expected,
            });
        }
    }

    Ok(izip!(names, heritability, r2, correlation_mz, prevalence)
        .map(|(name, &h, &r, &mz, &p)| ClinicalCondition {
            name: name.clone(),
            heritability: h,
            r2: r,
            correlation_mz: mz,
            prevalence: p,
        })
        .collect())
}
