//! # Cohort Generation
//!
//! Draws the `families x embryos` matrices of one simulated cohort from the
//! scales produced by [`crate::decompose`].
//!
//! Family-level latent terms are drawn first (one value per row); each embryo
//! column is then drawn conditionally on them. Every cell is `mean + scale * z`
//! with `z` a fresh standard normal, so a zero scale reproduces its mean exactly.
//!
//! The random source is always injected. [`generate`] consumes a caller-owned
//! generator; [`generate_parallel`] derives one independent stream per block of
//! rows from a seed, so its output depends on the seed alone and never on the
//! number of worker threads.

use crate::config::SimulationConfig;
use crate::decompose::{
    BetweenFamilyScales, DecomposedParameters, LiabilityScales, PleiotropyScales,
    WithinFamilyScales,
};
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use std::fmt;

/// Number of families generated from one derived random stream in
/// [`generate_parallel`]. Changing it changes the output for a given seed.
pub const ROW_BLOCK_SIZE: usize = 16_384;

/// Names of the matrices a cohort can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CohortLayer {
    TrueGenetic,
    PgsEstimate,
    Phenotype,
    PleiotropicPhenotype,
    Liability,
}

impl CohortLayer {
    pub fn describe(self) -> &'static str {
        match self {
            Self::TrueGenetic => "true_genetic",
            Self::PgsEstimate => "pgs_estimate",
            Self::Phenotype => "phenotype",
            Self::PleiotropicPhenotype => "pleiotropic_phenotype",
            Self::Liability => "liability",
        }
    }
}

impl fmt::Display for CohortLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// One simulated cohort. Rows are independent families, columns are embryos.
/// Every present layer has the same `(families, embryos)` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyCohortMatrix {
    /// Genetic value the polygenic score is centred on (g, or a in the liability model).
    pub true_genetic: Array2<f64>,
    pub pgs_estimate: Array2<f64>,
    /// Continuous phenotype; absent in the liability-threshold model.
    pub phenotype: Option<Array2<f64>>,
    pub pleiotropic_phenotype: Option<Array2<f64>>,
    /// Liability of the clinical condition, or of the pleiotropic trait when it is binarized.
    pub liability: Option<Array2<f64>>,
}

impl FamilyCohortMatrix {
    pub fn families(&self) -> usize {
        self.true_genetic.nrows()
    }

    pub fn embryos(&self) -> usize {
        self.true_genetic.ncols()
    }

    pub fn layer(&self, layer: CohortLayer) -> Option<ArrayView2<'_, f64>> {
        match layer {
            CohortLayer::TrueGenetic => Some(self.true_genetic.view()),
            CohortLayer::PgsEstimate => Some(self.pgs_estimate.view()),
            CohortLayer::Phenotype => self.phenotype.as_ref().map(|m| m.view()),
            CohortLayer::PleiotropicPhenotype => {
                self.pleiotropic_phenotype.as_ref().map(|m| m.view())
            }
            CohortLayer::Liability => self.liability.as_ref().map(|m| m.view()),
        }
    }

    /// Allocates every layer the decomposed model produces, once, at full size.
    fn zeroed(params: &DecomposedParameters, families: usize, embryos: usize) -> Self {
        let zeros = || Array2::zeros((families, embryos));
        let (phenotype, pleiotropic_phenotype, liability) = match params {
            DecomposedParameters::BetweenFamily(_) | DecomposedParameters::WithinFamily(_) => {
                (Some(zeros()), None, None)
            }
            DecomposedParameters::WithinFamilyPleiotropic { pleiotropy, .. } => (
                Some(zeros()),
                Some(zeros()),
                pleiotropy.liability_noise.map(|_| zeros()),
            ),
            DecomposedParameters::LiabilityThreshold(_) => (None, None, Some(zeros())),
        };
        Self {
            true_genetic: zeros(),
            pgs_estimate: zeros(),
            phenotype,
            pleiotropic_phenotype,
            liability,
        }
    }

    fn views_mut(&mut self) -> LayerViews<'_> {
        LayerViews {
            true_genetic: self.true_genetic.view_mut(),
            pgs_estimate: self.pgs_estimate.view_mut(),
            phenotype: self.phenotype.as_mut().map(|m| m.view_mut()),
            pleiotropic_phenotype: self.pleiotropic_phenotype.as_mut().map(|m| m.view_mut()),
            liability: self.liability.as_mut().map(|m| m.view_mut()),
        }
    }

    /// Splits every present layer into aligned, disjoint blocks of `rows` families.
    /// The last block holds the remainder.
    fn row_blocks(&mut self, rows: usize) -> Vec<LayerViews<'_>> {
        let mut true_genetic = self.true_genetic.axis_chunks_iter_mut(Axis(0), rows);
        let mut pgs_estimate = self.pgs_estimate.axis_chunks_iter_mut(Axis(0), rows);
        let mut phenotype = self
            .phenotype
            .as_mut()
            .map(|m| m.axis_chunks_iter_mut(Axis(0), rows));
        let mut pleiotropic_phenotype = self
            .pleiotropic_phenotype
            .as_mut()
            .map(|m| m.axis_chunks_iter_mut(Axis(0), rows));
        let mut liability = self
            .liability
            .as_mut()
            .map(|m| m.axis_chunks_iter_mut(Axis(0), rows));

        let mut blocks = Vec::new();
        while let (Some(genetic), Some(pgs)) = (true_genetic.next(), pgs_estimate.next()) {
            blocks.push(LayerViews {
                true_genetic: genetic,
                pgs_estimate: pgs,
                phenotype: phenotype.as_mut().and_then(|it| it.next()),
                pleiotropic_phenotype: pleiotropic_phenotype.as_mut().and_then(|it| it.next()),
                liability: liability.as_mut().and_then(|it| it.next()),
            });
        }
        blocks
    }
}

/// Writable views over the same rows of every present layer.
struct LayerViews<'a> {
    true_genetic: ArrayViewMut2<'a, f64>,
    pgs_estimate: ArrayViewMut2<'a, f64>,
    phenotype: Option<ArrayViewMut2<'a, f64>>,
    pleiotropic_phenotype: Option<ArrayViewMut2<'a, f64>>,
    liability: Option<ArrayViewMut2<'a, f64>>,
}

/// Draws one cohort of `config.families x config.embryos` from `rng`.
pub fn generate<R: Rng + ?Sized>(
    config: &SimulationConfig,
    params: &DecomposedParameters,
    rng: &mut R,
) -> FamilyCohortMatrix {
    log::info!(
        "Generating {} cohort: {} families x {} embryos",
        config.variant,
        config.families,
        config.embryos
    );
    let mut cohort = FamilyCohortMatrix::zeroed(params, config.families, config.embryos);
    draw_block(params, cohort.views_mut(), rng);
    cohort
}

/// Draws one cohort on the rayon pool, one derived `StdRng` stream per
/// [`ROW_BLOCK_SIZE`] families. Reproducible from `seed` regardless of thread count.
///
/// Each layer is allocated once and every block writes its rows in place.
pub fn generate_parallel(
    config: &SimulationConfig,
    params: &DecomposedParameters,
    seed: u64,
) -> FamilyCohortMatrix {
    let families = config.families;
    let embryos = config.embryos;
    log::info!(
        "Generating {} cohort: {} families x {} embryos in {} row blocks",
        config.variant,
        families,
        embryos,
        families.div_ceil(ROW_BLOCK_SIZE)
    );

    let mut cohort = FamilyCohortMatrix::zeroed(params, families, embryos);
    cohort
        .row_blocks(ROW_BLOCK_SIZE)
        .into_par_iter()
        .enumerate()
        .for_each(|(block, views)| {
            let mut rng = StdRng::seed_from_u64(block_seed(seed, block as u64));
            draw_block(params, views, &mut rng);
        });
    cohort
}

/// Seed of the stream for one row block (splitmix64 over seed and block index).
pub fn block_seed(seed: u64, block: u64) -> u64 {
    const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut z = seed.wrapping_add(GOLDEN_GAMMA.wrapping_mul(block.wrapping_add(1)));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn draw<R: Rng + ?Sized>(rng: &mut R, mean: f64, scale: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + scale * z
}

fn draw_family_terms<R: Rng + ?Sized>(rng: &mut R, families: usize, scale: f64) -> Array1<f64> {
    (0..families).map(|_| draw(rng, 0.0, scale)).collect()
}

// Fills the rows behind `views`. Layers the model does not produce are absent
// from the views and skipped.
fn draw_block<R: Rng + ?Sized>(params: &DecomposedParameters, views: LayerViews<'_>, rng: &mut R) {
    match params {
        DecomposedParameters::BetweenFamily(scales) => draw_between_family(scales, views, rng),
        DecomposedParameters::WithinFamily(scales) => draw_within_family(scales, None, views, rng),
        DecomposedParameters::WithinFamilyPleiotropic { family, pleiotropy } => {
            draw_within_family(family, Some(pleiotropy), views, rng)
        }
        DecomposedParameters::LiabilityThreshold(scales) => draw_liability(scales, views, rng),
    }
}

fn draw_between_family<R: Rng + ?Sized>(
    scales: &BetweenFamilyScales,
    views: LayerViews<'_>,
    rng: &mut R,
) {
    let LayerViews {
        true_genetic: mut genetic,
        pgs_estimate: mut pgs,
        mut phenotype,
        ..
    } = views;

    for embryo in 0..genetic.ncols() {
        for g in genetic.column_mut(embryo).iter_mut() {
            *g = draw(rng, 0.0, scales.genetic);
        }
        for (score, &g) in pgs.column_mut(embryo).iter_mut().zip(genetic.column(embryo)) {
            *score = draw(rng, g, scales.pgs_noise);
        }
        if let Some(phenotype) = phenotype.as_mut() {
            for (y, &g) in phenotype
                .column_mut(embryo)
                .iter_mut()
                .zip(genetic.column(embryo))
            {
                *y = draw(rng, g, scales.phenotype_noise);
            }
        }
    }
}

fn draw_within_family<R: Rng + ?Sized>(
    scales: &WithinFamilyScales,
    pleiotropy: Option<&PleiotropyScales>,
    views: LayerViews<'_>,
    rng: &mut R,
) {
    let LayerViews {
        true_genetic: mut genetic,
        pgs_estimate: mut pgs,
        mut phenotype,
        mut pleiotropic_phenotype,
        mut liability,
    } = views;

    let families = genetic.nrows();
    let genetic_mean = draw_family_terms(rng, families, scales.family_genetic);
    let environment_mean = draw_family_terms(rng, families, scales.family_environment);

    for embryo in 0..genetic.ncols() {
        for (g, &mean) in genetic.column_mut(embryo).iter_mut().zip(&genetic_mean) {
            *g = draw(rng, mean, scales.embryo_genetic);
        }
        // Phenotype is the SNP component plus the remaining broad-sense component.
        if let Some(phenotype) = phenotype.as_mut() {
            for ((y, &g), &mean) in phenotype
                .column_mut(embryo)
                .iter_mut()
                .zip(genetic.column(embryo))
                .zip(&environment_mean)
            {
                *y = g + draw(rng, mean, scales.embryo_environment);
            }
        }
        for (score, &g) in pgs.column_mut(embryo).iter_mut().zip(genetic.column(embryo)) {
            *score = draw(rng, g, scales.pgs_noise);
        }

        let (Some(p), Some(phenotype), Some(trait_values)) = (
            pleiotropy,
            phenotype.as_ref(),
            pleiotropic_phenotype.as_mut(),
        ) else {
            continue;
        };
        for (value, &y) in trait_values
            .column_mut(embryo)
            .iter_mut()
            .zip(phenotype.column(embryo))
        {
            *value = draw(rng, p.slope * y, p.residual);
        }
        if let (Some(noise), Some(liab)) = (p.liability_noise, liability.as_mut()) {
            for (l, &t) in liab
                .column_mut(embryo)
                .iter_mut()
                .zip(trait_values.column(embryo))
            {
                *l = draw(rng, t, noise);
            }
        }
    }
}

fn draw_liability<R: Rng + ?Sized>(scales: &LiabilityScales, views: LayerViews<'_>, rng: &mut R) {
    let LayerViews {
        true_genetic: mut additive,
        pgs_estimate: mut pgs,
        mut liability,
        ..
    } = views;

    let families = additive.nrows();
    let additive_mean = draw_family_terms(rng, families, scales.family_additive);
    let shared = draw_family_terms(rng, families, scales.shared_environment);

    for embryo in 0..additive.ncols() {
        for (a, &mean) in additive.column_mut(embryo).iter_mut().zip(&additive_mean) {
            *a = draw(rng, mean, scales.embryo_additive);
        }
        for (score, &a) in pgs.column_mut(embryo).iter_mut().zip(additive.column(embryo)) {
            *score = draw(rng, a, scales.pgs_noise);
        }
        if let Some(liability) = liability.as_mut() {
            for ((l, &a), &c) in liability
                .column_mut(embryo)
                .iter_mut()
                .zip(additive.column(embryo))
                .zip(&shared)
            {
                *l = draw(rng, a + c, scales.liability_noise);
            }
        }
    }
}
