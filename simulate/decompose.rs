//! # Variance Decomposition
//!
//! Turns heritability, R², twin-correlation and pleiotropy parameters into the
//! standard deviations of every conditional-normal layer of the generative model.
//!
//! All variances are on a unit phenotypic scale. Every square root goes through
//! [`checked_sqrt`], so an infeasible parameter combination is reported as a
//! [`ConfigError::NegativeRadicand`] naming the offending layer instead of
//! surfacing as a NaN at draw time.

use crate::config::{ConfigError, ModelVariant, SimulationConfig};

/// Scales for the between-family model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetweenFamilyScales {
    /// SD of the true genetic value of each embryo, √h.
    pub genetic: f64,
    /// SD of the PGS around the true genetic value, √(h²/r2 − h).
    pub pgs_noise: f64,
    /// SD of the phenotype around the true genetic value, √(1 − h).
    pub phenotype_noise: f64,
}

/// Scales shared by both within-family models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithinFamilyScales {
    /// SD of the parental mean of the SNP-captured genetic component.
    pub family_genetic: f64,
    /// SD of the parental mean of the remaining (broad − SNP) component.
    pub family_environment: f64,
    /// SD of an embryo's SNP-captured component around the parental mean.
    pub embryo_genetic: f64,
    /// SD of an embryo's remaining component around the parental mean.
    pub embryo_environment: f64,
    /// SD of the PGS around the embryo's SNP-captured component.
    pub pgs_noise: f64,
}

/// The pleiotropic trait given the main phenotype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PleiotropyScales {
    /// Regression slope on the main phenotype, r_g·√(h_pleio/h_broad).
    pub slope: f64,
    /// Residual SD, √(h_pleio·(1 − r_g²)).
    pub residual: f64,
    /// SD of the pleiotropic liability around the pleiotropic trait, √(1 − h_pleio).
    /// Only present when the trait is binarized.
    pub liability_noise: Option<f64>,
}

/// Scales for the MZ-twin liability-threshold model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiabilityScales {
    pub family_additive: f64,
    /// Shared environment, constant within a family, √(corr_mz − h).
    pub shared_environment: f64,
    pub embryo_additive: f64,
    pub pgs_noise: f64,
    /// Unshared residual, √(1 − corr_mz).
    pub liability_noise: f64,
}

/// The frozen per-variant parameter set consumed by the cohort generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecomposedParameters {
    BetweenFamily(BetweenFamilyScales),
    WithinFamily(WithinFamilyScales),
    WithinFamilyPleiotropic {
        family: WithinFamilyScales,
        pleiotropy: PleiotropyScales,
    },
    LiabilityThreshold(LiabilityScales),
}

/// Validates `config` and derives the scales of its variant.
pub fn decompose(config: &SimulationConfig) -> Result<DecomposedParameters, ConfigError> {
    config.validate()?;

    let params = match &config.variant {
        ModelVariant::BetweenFamily { heritability, r2 } => {
            let h = *heritability;
            DecomposedParameters::BetweenFamily(BetweenFamilyScales {
                genetic: checked_sqrt("true genetic value", h, "heritability >= 0")?,
                pgs_noise: pgs_noise_scale(h, *r2, "r2 <= heritability")?,
                phenotype_noise: checked_sqrt(
                    "phenotype given genetic value",
                    1.0 - h,
                    "heritability <= 1",
                )?,
            })
        }
        ModelVariant::WithinFamily {
            heritability_broad,
            heritability_snp,
            r2,
        } => DecomposedParameters::WithinFamily(within_family_scales(
            *heritability_broad,
            *heritability_snp,
            *r2,
        )?),
        ModelVariant::WithinFamilyPleiotropic {
            heritability_broad,
            heritability_snp,
            r2,
            pleiotropy,
        } => {
            let family = within_family_scales(*heritability_broad, *heritability_snp, *r2)?;
            let h_pleio = pleiotropy.heritability;
            let r_g = pleiotropy.genetic_correlation;
            let liability_noise = match pleiotropy.prevalence {
                Some(_) => Some(checked_sqrt(
                    "pleiotropic liability given pleiotropic trait",
                    1.0 - h_pleio,
                    "heritability_pleio <= 1",
                )?),
                None => None,
            };
            DecomposedParameters::WithinFamilyPleiotropic {
                family,
                pleiotropy: PleiotropyScales {
                    slope: r_g * (h_pleio / heritability_broad).sqrt(),
                    residual: checked_sqrt(
                        "pleiotropic trait given main phenotype",
                        h_pleio * (1.0 - r_g * r_g),
                        "heritability_pleio >= 0 and |correlation_pleio| <= 1",
                    )?,
                    liability_noise,
                },
            }
        }
        ModelVariant::LiabilityThreshold {
            heritability,
            correlation_mz,
            r2,
            ..
        } => {
            let h = *heritability;
            let additive = checked_sqrt("additive component", h / 2.0, "heritability >= 0")?;
            DecomposedParameters::LiabilityThreshold(LiabilityScales {
                family_additive: additive,
                shared_environment: checked_sqrt(
                    "shared environment",
                    correlation_mz - h,
                    "correlation_mz >= heritability",
                )?,
                embryo_additive: additive,
                pgs_noise: pgs_noise_scale(h, *r2, "rsquared <= heritability")?,
                liability_noise: checked_sqrt(
                    "liability given additive and shared components",
                    1.0 - correlation_mz,
                    "correlation_mz <= 1",
                )?,
            })
        }
    };

    log::debug!("Decomposed {} parameters: {params:?}", config.variant);
    Ok(params)
}

fn within_family_scales(
    broad: f64,
    snp: f64,
    r2: f64,
) -> Result<WithinFamilyScales, ConfigError> {
    let genetic = checked_sqrt("SNP genetic component", snp / 2.0, "heritability_snp >= 0")?;
    let environment = checked_sqrt(
        "non-SNP component",
        (broad - snp) / 2.0,
        "heritability_snp <= heritability_broad",
    )?;
    Ok(WithinFamilyScales {
        family_genetic: genetic,
        family_environment: environment,
        embryo_genetic: genetic,
        embryo_environment: environment,
        pgs_noise: pgs_noise_scale(snp, r2, "attenuated_rsquared <= heritability_snp")?,
    })
}

/// √(h²/r2 − h), evaluated as √(h·(h − r2)/r2) so that `r2 == h` is exactly zero.
fn pgs_noise_scale(h: f64, r2: f64, requirement: &'static str) -> Result<f64, ConfigError> {
    checked_sqrt("polygenic score given genetic value", h * (h - r2) / r2, requirement)
}

/// Square root that treats a negative (or NaN) argument as a configuration error.
pub fn checked_sqrt(
    term: &'static str,
    radicand: f64,
    requirement: &'static str,
) -> Result<f64, ConfigError> {
    if radicand >= 0.0 {
        Ok(radicand.sqrt())
    } else {
        Err(ConfigError::NegativeRadicand {
            term,
            radicand,
            requirement,
        })
    }
}
