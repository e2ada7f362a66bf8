//! # Reporting
//!
//! Turns [`SimulationResult`]s into the sentences printed by the drivers and
//! into a tab-separated summary with one row per run. Values in sentences are
//! rounded to two decimals; the TSV keeps full precision.

use crate::ancestry::Ancestry;
use crate::evaluate::{BinaryComparison, ContinuousComparison};
use crate::pipeline::{Outcome, SimulationResult};
use serde::Serialize;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write the summary table: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error while writing the summary table: {0}")]
    Io(#[from] io::Error),
}

pub fn between_family_sentence(ancestry: Ancestry, gain: &ContinuousComparison) -> String {
    format!(
        "For {ancestry} ancestry, the between-family 95-percent prediction interval for the phenotype of interest is {:.2} +/- {:.2}.",
        gain.mean_diff, gain.ci_radius
    )
}

pub fn within_family_sentence(
    ancestry: &str,
    main_pheno: &str,
    gain: &ContinuousComparison,
) -> String {
    format!(
        "For parents of {ancestry} ancestry, the within-family 95-percent prediction interval for the difference in {main_pheno} between random and selected embryos is {:.2} +/- {:.2}.",
        gain.mean_diff, gain.ci_radius
    )
}

pub fn pleiotropic_prevalence_sentence(
    ancestry: &str,
    pleiotropic_trait: &str,
    main_pheno: &str,
    prevalence: &BinaryComparison,
) -> String {
    format!(
        "For parents of {ancestry} ancestry, {pleiotropic_trait} has a within-family prevalence of {:.2}% in embryos selected using the polygenic score for {main_pheno} and a within-family prevalence of {:.2}% for randomly selected embryos.",
        prevalence.pct_selected, prevalence.pct_random
    )
}

pub fn pleiotropic_shift_sentence(
    ancestry: &str,
    pleiotropic_trait: &str,
    main_pheno: &str,
    shift: &ContinuousComparison,
) -> String {
    format!(
        "For parents of {ancestry} ancestry, selecting on the polygenic score for {main_pheno} shifts {pleiotropic_trait} by {:.2} +/- {:.2} standard deviations within families.",
        shift.mean_diff, shift.ci_radius
    )
}

pub fn clinical_sentence(condition: &str, prevalence: &BinaryComparison) -> String {
    format!(
        "For {condition}, the within-family prevalence is {:.2}% in random embryos and {:.2}% in selected embryos.",
        prevalence.pct_random, prevalence.pct_selected
    )
}

/// A one-line summary of any run, used for scenario batches.
pub fn scenario_sentence(label: &str, result: &SimulationResult) -> String {
    let mut sentence = format!(
        "{label} ({}, {} families, {} embryos): {}",
        result.variant,
        result.families,
        result.embryos,
        describe_outcome(&result.outcome)
    );
    if let Some(pleiotropic) = &result.pleiotropic {
        sentence.push_str("; pleiotropic trait: ");
        sentence.push_str(&describe_outcome(pleiotropic));
    }
    sentence.push('.');
    sentence
}

fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Continuous(gain) => {
            format!("gain {:.2} +/- {:.2}", gain.mean_diff, gain.ci_radius)
        }
        Outcome::Binary(prevalence) => format!(
            "prevalence {:.2}% selected vs {:.2}% random",
            prevalence.pct_selected, prevalence.pct_random
        ),
    }
}

/// One row of the summary table. Columns that do not apply to a run stay empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub label: String,
    pub variant: &'static str,
    pub families: usize,
    pub embryos: usize,
    pub mean_diff: Option<f64>,
    pub ci_radius: Option<f64>,
    pub pct_selected: Option<f64>,
    pub pct_random: Option<f64>,
    pub pleio_mean_diff: Option<f64>,
    pub pleio_ci_radius: Option<f64>,
    pub pleio_pct_selected: Option<f64>,
    pub pleio_pct_random: Option<f64>,
}

impl SummaryRow {
    pub fn new(label: impl Into<String>, result: &SimulationResult) -> Self {
        let mut row = Self {
            label: label.into(),
            variant: result.variant,
            families: result.families,
            embryos: result.embryos,
            mean_diff: None,
            ci_radius: None,
            pct_selected: None,
            pct_random: None,
            pleio_mean_diff: None,
            pleio_ci_radius: None,
            pleio_pct_selected: None,
            pleio_pct_random: None,
        };
        match result.outcome {
            Outcome::Continuous(gain) => {
                row.mean_diff = Some(gain.mean_diff);
                row.ci_radius = Some(gain.ci_radius);
            }
            Outcome::Binary(prevalence) => {
                row.pct_selected = Some(prevalence.pct_selected);
                row.pct_random = Some(prevalence.pct_random);
            }
        }
        match result.pleiotropic {
            Some(Outcome::Continuous(shift)) => {
                row.pleio_mean_diff = Some(shift.mean_diff);
                row.pleio_ci_radius = Some(shift.ci_radius);
            }
            Some(Outcome::Binary(prevalence)) => {
                row.pleio_pct_selected = Some(prevalence.pct_selected);
                row.pleio_pct_random = Some(prevalence.pct_random);
            }
            None => {}
        }
        row
    }
}

/// Writes `rows` with a header line, tab-delimited, to any writer.
pub fn write_summary<W: io::Write>(writer: W, rows: &[SummaryRow]) -> Result<(), ReportError> {
    let mut tsv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for row in rows {
        tsv.serialize(row)?;
    }
    tsv.flush()?;
    Ok(())
}

pub fn write_summary_tsv(path: &Path, rows: &[SummaryRow]) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    write_summary(io::BufWriter::new(file), rows)?;
    log::info!("Wrote {} summary rows to '{}'", rows.len(), path.display());
    Ok(())
}
