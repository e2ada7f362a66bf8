use approx::assert_abs_diff_eq;
use polyselect::cohort::block_seed;
use polyselect::pipeline::{Outcome, PipelineError, SimulationResult, run, run_seeded};
use polyselect::{
    ConfigError, ModelVariant, SimulationConfig, ThresholdConvention, decompose, generate,
    generate_parallel, select_by_max,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// E[max of 10 iid N(0, 1)].
const EXPECTED_MAX_OF_TEN: f64 = 1.538_753;

fn continuous(result: &SimulationResult) -> (f64, f64) {
    match result.outcome {
        Outcome::Continuous(gain) => (gain.mean_diff, gain.ci_radius),
        Outcome::Binary(other) => panic!("expected a continuous outcome, got {other:?}"),
    }
}

fn binary(result: &SimulationResult) -> (f64, f64) {
    match result.outcome {
        Outcome::Binary(prevalence) => (prevalence.pct_selected, prevalence.pct_random),
        Outcome::Continuous(other) => panic!("expected a binary outcome, got {other:?}"),
    }
}

#[test]
fn perfect_score_recovers_the_expected_maximum_of_ten() {
    let config = SimulationConfig::new(
        100_000,
        10,
        ModelVariant::BetweenFamily {
            heritability: 1.0,
            r2: 1.0,
        },
    );
    let result = run_seeded(&config, 2024).unwrap();
    let (mean_diff, ci_radius) = continuous(&result);
    assert_abs_diff_eq!(mean_diff, EXPECTED_MAX_OF_TEN, epsilon = 0.02);
    // The random pick is the maximum one time in ten, so Cov(max, random) = 0.1
    // and the sd of (max - random) is √(0.3443 + 1 - 0.2) ≈ 1.0697.
    assert_abs_diff_eq!(ci_radius, 1.96 * 1.0697, epsilon = 0.05);

    let scaled = run_seeded(&config.clone().with_sd_pheno(3.2), 2024).unwrap();
    let (scaled_mean, scaled_radius) = continuous(&scaled);
    assert_abs_diff_eq!(scaled_mean, 3.2 * mean_diff, epsilon = 1e-9);
    assert_abs_diff_eq!(scaled_radius, 3.2 * ci_radius, epsilon = 1e-9);
}

#[test]
fn noiseless_score_selects_the_best_genetic_value() {
    let config = SimulationConfig::new(
        5_000,
        6,
        ModelVariant::WithinFamily {
            heritability_broad: 0.5,
            heritability_snp: 0.3,
            r2: 0.3,
        },
    );
    let params = decompose(&config).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let cohort = generate(&config, &params, &mut rng);

    assert_eq!(cohort.pgs_estimate, cohort.true_genetic);
    assert_eq!(
        select_by_max(cohort.pgs_estimate.view()),
        select_by_max(cohort.true_genetic.view())
    );
}

#[test]
fn identical_seeds_give_identical_results() {
    let config = SimulationConfig::new(
        20_000,
        4,
        ModelVariant::LiabilityThreshold {
            heritability: 0.6,
            correlation_mz: 0.7,
            r2: 0.1,
            prevalence: 0.05,
        },
    );
    let params = decompose(&config).unwrap();

    let first = generate_parallel(&config, &params, 77);
    let second = generate_parallel(&config, &params, 77);
    assert_eq!(first, second);
    assert_ne!(first, generate_parallel(&config, &params, 78));

    let mut a = StdRng::seed_from_u64(block_seed(9, 0));
    let mut b = StdRng::seed_from_u64(block_seed(9, 0));
    assert_eq!(run(&config, &mut a).unwrap(), run(&config, &mut b).unwrap());
}

fn clinical(convention: Option<ThresholdConvention>) -> SimulationConfig {
    let config = SimulationConfig::new(
        60_000,
        5,
        ModelVariant::LiabilityThreshold {
            heritability: 0.5,
            correlation_mz: 0.6,
            r2: 0.1,
            prevalence: 0.1,
        },
    );
    match convention {
        Some(convention) => config.with_threshold_convention(convention),
        None => config,
    }
}

#[test]
fn random_embryos_match_the_population_prevalence() {
    for convention in [None, Some(ThresholdConvention::UpperTail)] {
        let result = run_seeded(&clinical(convention), 11).unwrap();
        let (_, pct_random) = binary(&result);
        assert_abs_diff_eq!(pct_random, 10.0, epsilon = 0.7);
    }
}

#[test]
fn selection_moves_prevalence_in_the_direction_of_the_convention() {
    // The default lower tail counts low liability as affected, so picking the
    // highest score lowers the affected share.
    let lower = run_seeded(&clinical(None), 5).unwrap();
    let (selected, random) = binary(&lower);
    assert!(selected < random - 1.0, "{selected} vs {random}");

    let upper = run_seeded(&clinical(Some(ThresholdConvention::UpperTail)), 5).unwrap();
    let (selected, random) = binary(&upper);
    assert!(selected > random + 1.0, "{selected} vs {random}");
}

#[test]
fn within_family_gain_grows_with_score_accuracy() {
    let gain = |r2: f64| {
        let config = SimulationConfig::new(
            50_000,
            10,
            ModelVariant::WithinFamily {
                heritability_broad: 0.4,
                heritability_snp: 0.25,
                r2,
            },
        )
        .with_sd_pheno(3.2);
        continuous(&run_seeded(&config, 99).unwrap()).0
    };
    let weak = gain(0.02);
    let strong = gain(0.2);
    assert!(weak > 0.0);
    assert!(strong > weak + 0.2, "{strong} vs {weak}");
}

#[test]
fn infeasible_parameters_are_rejected_before_simulation() {
    let cases = [
        ModelVariant::WithinFamily {
            heritability_broad: 0.2,
            heritability_snp: 0.3,
            r2: 0.1,
        },
        ModelVariant::LiabilityThreshold {
            heritability: 0.7,
            correlation_mz: 0.5,
            r2: 0.1,
            prevalence: 0.1,
        },
        ModelVariant::BetweenFamily {
            heritability: 0.2,
            r2: 0.25,
        },
    ];
    for variant in cases {
        let config = SimulationConfig::new(100, 5, variant);
        assert!(matches!(
            run_seeded(&config, 1),
            Err(PipelineError::Config(_))
        ));
    }

    let one_embryo = SimulationConfig::new(
        100,
        1,
        ModelVariant::BetweenFamily {
            heritability: 0.2,
            r2: 0.1,
        },
    );
    assert!(matches!(
        run_seeded(&one_embryo, 1),
        Err(PipelineError::Config(ConfigError::TooFewEmbryos(1)))
    ));
}
