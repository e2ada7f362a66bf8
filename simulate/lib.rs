#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod ancestry;
pub mod cohort;
pub mod config;
pub mod decompose;
pub mod evaluate;
pub mod pipeline;
pub mod report;
pub mod scenario;
pub mod select;

pub use cohort::{CohortLayer, FamilyCohortMatrix, generate, generate_parallel};
pub use config::{ConfigError, ModelVariant, Pleiotropy, SimulationConfig, ThresholdConvention};
pub use decompose::{DecomposedParameters, decompose};
pub use evaluate::{BinaryComparison, ContinuousComparison, compare_binary, compare_continuous};
pub use select::{SelectedOutcomeVector, SelectionIndex, gather, select_by_max, select_random};
