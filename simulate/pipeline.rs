// ========================================================================================
//
//                        The run orchestrator: one simulation
//
// ========================================================================================
//
// Conducts one configuration through every stage, in one direction only:
//
//     SimulationConfig -> decompose -> generate -> select -> evaluate -> SimulationResult
//
// The cohort is dropped as soon as the selected outcome vectors have been gathered.
// The random source is threaded explicitly: `run` borrows a caller-owned generator,
// `run_seeded` derives every stream it needs from a single seed.

use crate::cohort::{CohortLayer, FamilyCohortMatrix, block_seed, generate, generate_parallel};
use crate::config::{ConfigError, ModelVariant, SimulationConfig, ThresholdConvention};
use crate::decompose::decompose;
use crate::evaluate::{
    BinaryComparison, ContinuousComparison, EvaluationError, compare_binary, compare_continuous,
};
use crate::select::{SelectionError, SelectionIndex, gather, select_by_max, select_random};
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Stream index reserved for the random-embryo draw in [`run_seeded`]. Cohort
/// blocks use indices from zero upwards, so the two never overlap.
const RANDOM_SELECTION_STREAM: u64 = u64::MAX;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Embryo selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("Outcome evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("The {variant} model produced no '{layer}' layer.")]
    MissingLayer {
        layer: CohortLayer,
        variant: &'static str,
    },
}

/// Summary of one trait under score-based versus random selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Continuous(ContinuousComparison),
    Binary(BinaryComparison),
}

/// Everything a driver needs to report one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub variant: &'static str,
    pub families: usize,
    pub embryos: usize,
    /// The main trait: continuous gain, or clinical prevalence.
    pub outcome: Outcome,
    /// The pleiotropic trait, when one is modelled: prevalence if a prevalence
    /// was configured, otherwise its continuous shift on the unit scale.
    pub pleiotropic: Option<Outcome>,
}

/// Runs one configuration, drawing everything from `rng`: first the cohort,
/// then the random-embryo index.
pub fn run<R: Rng + ?Sized>(
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<SimulationResult, PipelineError> {
    let params = decompose(config)?;
    let cohort = generate(config, &params, rng);
    let random_index = select_random(config.embryos, config.families, rng)?;
    summarize(config, &cohort, &random_index)
}

/// Runs one configuration with parallel, seed-derived cohort generation.
/// Identical seeds give identical results on any number of threads.
pub fn run_seeded(config: &SimulationConfig, seed: u64) -> Result<SimulationResult, PipelineError> {
    let params = decompose(config)?;
    let cohort = generate_parallel(config, &params, seed);
    let mut rng = StdRng::seed_from_u64(block_seed(seed, RANDOM_SELECTION_STREAM));
    let random_index = select_random(config.embryos, config.families, &mut rng)?;
    summarize(config, &cohort, &random_index)
}

fn summarize(
    config: &SimulationConfig,
    cohort: &FamilyCohortMatrix,
    random_index: &SelectionIndex,
) -> Result<SimulationResult, PipelineError> {
    let max_index = select_by_max(cohort.pgs_estimate.view());
    log::info!(
        "Selected embryos for {} families by maximum polygenic score",
        max_index.len()
    );

    let outcome = match &config.variant {
        ModelVariant::LiabilityThreshold { prevalence, .. } => {
            let liability = layer_of(cohort, CohortLayer::Liability, config)?;
            let convention = config
                .threshold_convention()
                .unwrap_or(ThresholdConvention::LowerTail);
            Outcome::Binary(binary_outcome(
                liability,
                &max_index,
                random_index,
                *prevalence,
                convention,
            )?)
        }
        ModelVariant::BetweenFamily { .. }
        | ModelVariant::WithinFamily { .. }
        | ModelVariant::WithinFamilyPleiotropic { .. } => {
            let phenotype = layer_of(cohort, CohortLayer::Phenotype, config)?;
            Outcome::Continuous(continuous_outcome(
                phenotype,
                &max_index,
                random_index,
                config.sd_pheno,
            )?)
        }
    };

    let pleiotropic = match &config.variant {
        ModelVariant::WithinFamilyPleiotropic { pleiotropy, .. } => {
            Some(match pleiotropy.prevalence {
                Some(prevalence) => {
                    let liability = layer_of(cohort, CohortLayer::Liability, config)?;
                    let convention = config
                        .threshold_convention()
                        .unwrap_or(ThresholdConvention::UpperTail);
                    Outcome::Binary(binary_outcome(
                        liability,
                        &max_index,
                        random_index,
                        prevalence,
                        convention,
                    )?)
                }
                None => {
                    let trait_values =
                        layer_of(cohort, CohortLayer::PleiotropicPhenotype, config)?;
                    Outcome::Continuous(continuous_outcome(
                        trait_values,
                        &max_index,
                        random_index,
                        1.0,
                    )?)
                }
            })
        }
        _ => None,
    };

    Ok(SimulationResult {
        variant: config.variant.name(),
        families: config.families,
        embryos: config.embryos,
        outcome,
        pleiotropic,
    })
}

fn layer_of<'a>(
    cohort: &'a FamilyCohortMatrix,
    layer: CohortLayer,
    config: &SimulationConfig,
) -> Result<ArrayView2<'a, f64>, PipelineError> {
    cohort.layer(layer).ok_or(PipelineError::MissingLayer {
        layer,
        variant: config.variant.name(),
    })
}

fn continuous_outcome(
    values: ArrayView2<f64>,
    max_index: &SelectionIndex,
    random_index: &SelectionIndex,
    sd_pheno: f64,
) -> Result<ContinuousComparison, PipelineError> {
    let selected = gather(values, max_index.view())?;
    let random = gather(values, random_index.view())?;
    Ok(compare_continuous(
        selected.view(),
        random.view(),
        sd_pheno,
    )?)
}

fn binary_outcome(
    liability: ArrayView2<f64>,
    max_index: &SelectionIndex,
    random_index: &SelectionIndex,
    prevalence: f64,
    convention: ThresholdConvention,
) -> Result<BinaryComparison, PipelineError> {
    let selected = gather(liability, max_index.view())?;
    let random = gather(liability, random_index.view())?;
    Ok(compare_binary(
        selected.view(),
        random.view(),
        prevalence,
        convention,
    )?)
}
