//! TOML scenario files: a batch of labelled simulation configurations run under
//! one seed.

use crate::config::{ConfigError, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Could not read scenario file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("The scenario file defines no [[scenario]] entries.")]
    Empty,

    #[error("Scenario '{label}' is invalid: {source}")]
    Invalid {
        label: String,
        #[source]
        source: ConfigError,
    },
}

/// One labelled configuration. The configuration fields sit directly in the
/// `[[scenario]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    #[serde(flatten)]
    pub config: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    /// Base seed. Scenario `i` runs with `seed + i`.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Where to write the TSV summary, if anywhere.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub scenario: Vec<Scenario>,
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: Self = text.parse()?;
        log::info!(
            "Loaded {} scenarios from '{}'",
            file.scenario.len(),
            path.display()
        );
        Ok(file)
    }

    /// Checks every scenario up front so a batch never fails halfway through.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.scenario.is_empty() {
            return Err(ScenarioError::Empty);
        }
        for scenario in &self.scenario {
            crate::decompose::decompose(&scenario.config).map_err(|source| {
                ScenarioError::Invalid {
                    label: scenario.label.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Seed for the scenario at `position`, derived from `base`.
    pub fn scenario_seed(base: u64, position: usize) -> u64 {
        base.wrapping_add(position as u64)
    }
}

impl std::str::FromStr for ScenarioFile {
    type Err = ScenarioError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelVariant, ThresholdConvention};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BATCH: &str = r#"
seed = 42
output = "summary.tsv"

[[scenario]]
label = "EA, EUR"
families = 1000
embryos = 10
sd_pheno = 3.2
[scenario.variant]
kind = "between_family"
heritability = 0.2
r2 = 0.1

[[scenario]]
label = "schizophrenia"
families = 500
embryos = 5
threshold_convention = "upper_tail"
[scenario.variant]
kind = "liability_threshold"
heritability = 0.8
correlation_mz = 0.85
r2 = 0.07
prevalence = 0.01

[[scenario]]
label = "EA with ADHD"
families = 200
embryos = 2
[scenario.variant]
kind = "within_family_pleiotropic"
heritability_broad = 0.4
heritability_snp = 0.25
r2 = 0.05
[scenario.variant.pleiotropy]
genetic_correlation = -0.3
heritability = 0.7
prevalence = 0.05
"#;

    #[test]
    fn parses_every_variant_kind() {
        let file: ScenarioFile = BATCH.parse().unwrap();
        assert_eq!(file.seed, Some(42));
        assert_eq!(file.output, Some(PathBuf::from("summary.tsv")));
        assert_eq!(file.scenario.len(), 3);

        let first = &file.scenario[0];
        assert_eq!(first.label, "EA, EUR");
        assert_eq!(first.config.families, 1000);
        assert_eq!(first.config.sd_pheno, 3.2);
        assert_eq!(
            first.config.variant,
            ModelVariant::BetweenFamily {
                heritability: 0.2,
                r2: 0.1
            }
        );

        let second = &file.scenario[1];
        assert_eq!(second.config.sd_pheno, 1.0);
        assert_eq!(
            second.config.threshold_convention(),
            Some(ThresholdConvention::UpperTail)
        );

        match &file.scenario[2].config.variant {
            ModelVariant::WithinFamilyPleiotropic { pleiotropy, .. } => {
                assert_eq!(pleiotropy.genetic_correlation, -0.3);
                assert_eq!(pleiotropy.prevalence, Some(0.05));
            }
            other => panic!("unexpected variant {other}"),
        }
        file.validate().unwrap();
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let text = r#"
[[scenario]]
label = "x"
families = 10
embryos = 2
[scenario.variant]
kind = "across_galaxies"
"#;
        assert!(matches!(
            text.parse::<ScenarioFile>(),
            Err(ScenarioError::Parse(_))
        ));
    }

    #[test]
    fn validation_names_the_failing_scenario() {
        let text = r#"
[[scenario]]
label = "too accurate"
families = 10
embryos = 2
[scenario.variant]
kind = "between_family"
heritability = 0.1
r2 = 0.3
"#;
        let file: ScenarioFile = text.parse().unwrap();
        match file.validate() {
            Err(ScenarioError::Invalid { label, source }) => {
                assert_eq!(label, "too accurate");
                assert!(matches!(source, ConfigError::NegativeRadicand { .. }));
            }
            other => panic!("expected an invalid scenario, got {other:?}"),
        }

        let empty: ScenarioFile = "seed = 1".parse().unwrap();
        assert!(matches!(empty.validate(), Err(ScenarioError::Empty)));
    }

    #[test]
    fn loads_from_disk_and_reports_missing_files() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(BATCH.as_bytes()).unwrap();
        let loaded = ScenarioFile::load(file.path()).unwrap();
        assert_eq!(loaded.scenario.len(), 3);

        let missing = file.path().with_extension("absent");
        assert!(matches!(
            ScenarioFile::load(&missing),
            Err(ScenarioError::Io { .. })
        ));
    }

    #[test]
    fn scenario_seeds_are_offsets_of_the_base() {
        assert_eq!(ScenarioFile::scenario_seed(42, 0), 42);
        assert_eq!(ScenarioFile::scenario_seed(42, 3), 45);
        assert_eq!(ScenarioFile::scenario_seed(u64::MAX, 1), 0);
    }
}
