//! # Outcome Evaluation
//!
//! Compares the outcomes of embryos picked by polygenic score against embryos
//! picked at random.
//!
//! Continuous traits are summarized as the mean per-family difference with a
//! 95% *prediction* interval radius (1.96 sample standard deviations of the
//! per-family differences). The radius describes the spread of outcomes for an
//! individual family and is not divided by √n.
//!
//! Binary traits are summarized as the percentage of affected embryos in each
//! group, after thresholding liabilities at a standard-normal quantile chosen by
//! a [`ThresholdConvention`].

use crate::config::ThresholdConvention;
use ndarray::ArrayView1;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

/// Two-sided 95% standard-normal critical value used for the interval radius.
pub const PREDICTION_INTERVAL_Z: f64 = 1.96;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error(
        "Selected and random outcome vectors differ in length ({selected} vs {random})."
    )]
    LengthMismatch { selected: usize, random: usize },

    #[error("At least {required} families are needed to summarize outcomes, found {found}.")]
    TooFewFamilies { found: usize, required: usize },

    #[error("Prevalence must lie strictly between 0 and 1, got {0}.")]
    InvalidPrevalence(f64),
}

/// Gain of score-based selection on a continuous trait, in phenotype units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousComparison {
    pub mean_diff: f64,
    pub ci_radius: f64,
}

/// Percentage affected among score-selected and randomly selected embryos.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryComparison {
    pub pct_selected: f64,
    pub pct_random: f64,
}

impl BinaryComparison {
    /// Percentage-point change in prevalence caused by selection.
    pub fn absolute_change(&self) -> f64 {
        self.pct_selected - self.pct_random
    }
}

/// Φ⁻¹(p) for the standard normal.
pub fn standard_normal_quantile(p: f64) -> f64 {
    Normal::standard().inverse_cdf(p)
}

/// A liability cut-off together with the side of it that counts as affected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffectionThreshold {
    pub value: f64,
    pub convention: ThresholdConvention,
}

impl AffectionThreshold {
    pub fn new(prevalence: f64, convention: ThresholdConvention) -> Result<Self, EvaluationError> {
        if !(prevalence > 0.0 && prevalence < 1.0) {
            return Err(EvaluationError::InvalidPrevalence(prevalence));
        }
        let value = match convention {
            ThresholdConvention::UpperTail => standard_normal_quantile(1.0 - prevalence),
            ThresholdConvention::LowerTail => standard_normal_quantile(prevalence),
        };
        Ok(Self { value, convention })
    }

    #[inline]
    pub fn is_affected(&self, liability: f64) -> bool {
        match self.convention {
            ThresholdConvention::UpperTail => liability > self.value,
            ThresholdConvention::LowerTail => liability <= self.value,
        }
    }

    /// Percentage of `liabilities` on the affected side of the threshold.
    pub fn affected_percentage(&self, liabilities: ArrayView1<f64>) -> f64 {
        let affected = liabilities.iter().filter(|&&l| self.is_affected(l)).count();
        100.0 * affected as f64 / liabilities.len() as f64
    }
}

/// Mean and 95% prediction-interval radius of `(selected − random) · sd_pheno`.
pub fn compare_continuous(
    selected: ArrayView1<f64>,
    random: ArrayView1<f64>,
    sd_pheno: f64,
) -> Result<ContinuousComparison, EvaluationError> {
    check_lengths(selected, random, 2)?;

    let diffs = (&selected - &random) * sd_pheno;
    let mean_diff = diffs.sum() / diffs.len() as f64;
    let ci_radius = PREDICTION_INTERVAL_Z * diffs.std(1.0);

    log::debug!(
        "Continuous comparison over {} families: mean {mean_diff:.4}, radius {ci_radius:.4}",
        diffs.len()
    );
    Ok(ContinuousComparison {
        mean_diff,
        ci_radius,
    })
}

/// Percentage affected in each group after binarizing at the `prevalence` quantile.
pub fn compare_binary(
    selected: ArrayView1<f64>,
    random: ArrayView1<f64>,
    prevalence: f64,
    convention: ThresholdConvention,
) -> Result<BinaryComparison, EvaluationError> {
    check_lengths(selected, random, 1)?;
    let threshold = AffectionThreshold::new(prevalence, convention)?;

    let comparison = BinaryComparison {
        pct_selected: threshold.affected_percentage(selected),
        pct_random: threshold.affected_percentage(random),
    };
    log::debug!(
        "Binary comparison at threshold {:.4} ({convention}): {comparison:?}",
        threshold.value
    );
    Ok(comparison)
}

fn check_lengths(
    selected: ArrayView1<f64>,
    random: ArrayView1<f64>,
    required: usize,
) -> Result<(), EvaluationError> {
    if selected.len() != random.len() {
        return Err(EvaluationError::LengthMismatch {
            selected: selected.len(),
            random: random.len(),
        });
    }
    if selected.len() < required {
        return Err(EvaluationError::TooFewFamilies {
            found: selected.len(),
            required,
        });
    }
    Ok(())
}
