#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use polyselect::ancestry::AncestryScaling;
use polyselect::config::{ClinicalCondition, conditions_from_lists};
use polyselect::pipeline::{Outcome, SimulationResult, run_seeded};
use polyselect::report::{
    SummaryRow, between_family_sentence, clinical_sentence, pleiotropic_prevalence_sentence,
    pleiotropic_shift_sentence, scenario_sentence, within_family_sentence, write_summary_tsv,
};
use polyselect::scenario::ScenarioFile;
use polyselect::{ModelVariant, Pleiotropy, SimulationConfig, ThresholdConvention};

#[derive(Clone, Copy, ValueEnum)]
pub enum ConventionCli {
    /// Affected when liability exceeds the (1 - prevalence) quantile
    UpperTail,
    /// Affected when liability is at or below the prevalence quantile
    LowerTail,
}

impl From<ConventionCli> for ThresholdConvention {
    fn from(value: ConventionCli) -> Self {
        match value {
            ConventionCli::UpperTail => ThresholdConvention::UpperTail,
            ConventionCli::LowerTail => ThresholdConvention::LowerTail,
        }
    }
}

/// Options shared by every simulation subcommand.
#[derive(Args)]
pub struct RunArgs {
    /// Number of parent pairs to simulate
    #[arg(long, default_value_t = 1_000_000)]
    pub n: usize,

    /// Number of embryos from which to choose
    #[arg(long, default_value_t = 10)]
    pub embryos: usize,

    /// Base random seed. A fresh seed is drawn and logged when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write a tab-separated summary with one row per run
    #[arg(long, value_name = "TSV")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct BetweenArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Naive heritability, or between-family heritability
    #[arg(long, default_value_t = 0.2)]
    pub hsquared_bf: f64,

    /// Between-family R² of the polygenic score in EUR ancestry
    #[arg(long, default_value_t = 0.1)]
    pub eur_bf_rsquared: f64,

    /// Standard deviation of the phenotype of interest (3.2 for years of education)
    #[arg(long, default_value_t = 3.2)]
    pub sd_pheno: f64,

    /// Factor converting EUR R² to AMR
    #[arg(long, default_value_t = 1.6)]
    pub scale_amr: f64,

    /// Factor converting EUR R² to EAS
    #[arg(long, default_value_t = 2.0)]
    pub scale_eas: f64,

    /// Factor converting EUR R² to AFR
    #[arg(long, default_value_t = 4.5)]
    pub scale_afr: f64,
}

#[derive(Args)]
pub struct WithinArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Ancestry of the parents
    #[arg(long)]
    pub ancestry: String,

    /// Standard deviation of the main phenotype
    #[arg(long)]
    pub sd_pheno: f64,

    /// Broad-sense heritability of the main phenotype
    #[arg(long)]
    pub heritability_broad: f64,

    /// SNP heritability of the main phenotype; at most the broad-sense heritability
    #[arg(long)]
    pub heritability_snp: f64,

    /// Attenuated (within-family) R² of the polygenic score
    #[arg(long)]
    pub attenuated_rsquared: f64,

    /// Heritability of the pleiotropic trait
    #[arg(long)]
    pub heritability_pleio: Option<f64>,

    /// Genetic correlation between the main trait and the pleiotropic trait
    #[arg(long)]
    pub correlation_pleio: Option<f64>,

    /// Population prevalence of the pleiotropic trait
    #[arg(long)]
    pub prevalence_pleio: Option<f64>,

    /// Name of the binary pleiotropic trait
    #[arg(long)]
    pub pleiotropic_trait: Option<String>,

    /// Name of the continuous main trait
    #[arg(long, default_value = "Educational Attainment")]
    pub main_pheno: String,

    /// Overrides the default upper-tail reading of the pleiotropic liability
    #[arg(long, value_enum)]
    pub threshold_convention: Option<ConventionCli>,
}

#[derive(Args)]
pub struct ClinicalArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Ancestry of the parents
    #[arg(long)]
    pub ancestry: String,

    /// Liability-scale heritabilities, one per condition
    #[arg(long, num_args = 1.., required = true)]
    pub heritability: Vec<f64>,

    /// Polygenic score R², one per condition
    #[arg(long, num_args = 1.., required = true)]
    pub rsquared: Vec<f64>,

    /// Liability-scale MZ twin correlations, one per condition
    #[arg(long, num_args = 1.., required = true)]
    pub correlation_mz: Vec<f64>,

    /// Population prevalences, one per condition
    #[arg(long, num_args = 1.., required = true)]
    pub prevalence: Vec<f64>,

    /// Condition names
    #[arg(long, num_args = 1.., required = true)]
    pub condition: Vec<String>,

    /// Overrides the default lower-tail reading of the liability
    #[arg(long, value_enum)]
    pub threshold_convention: Option<ConventionCli>,
}

#[derive(Args)]
pub struct ScenarioArgs {
    /// Path to a TOML scenario file
    pub path: PathBuf,

    /// Overrides the seed in the file
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overrides the output path in the file
    #[arg(long, value_name = "TSV")]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "polyselect",
    version,
    about = "Monte Carlo simulation of embryo selection on polygenic scores",
    long_about = "Simulates families of embryos under between-family, within-family and \
                 liability-threshold models, selects the embryo with the highest polygenic \
                 score, and compares its outcome with a randomly chosen sibling."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Gain of selection without family structure, for each ancestry
    #[command(about = "Between-family simulation across EUR, AMR, EAS and AFR")]
    Between(BetweenArgs),

    /// Gain of selection among siblings, optionally with a pleiotropic trait
    #[command(about = "Within-family simulation for a continuous trait")]
    Within(WithinArgs),

    /// Prevalence of clinical conditions among selected and random siblings
    #[command(about = "Within-family liability-threshold simulation for binary conditions")]
    Clinical(ClinicalArgs),

    /// Runs every scenario of a TOML file
    #[command(about = "Run a batch of scenarios from a TOML file")]
    Scenario(ScenarioArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Between(args)) => run_between(args),
        Some(Commands::Within(args)) => run_within(args),
        Some(Commands::Clinical(args)) => run_clinical(args),
        Some(Commands::Scenario(args)) => run_scenarios(args),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) =
        ProgressStyle::with_template("> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

// A hidden bar discards its `println` output, so off a terminal the line goes to stdout.
fn print_result(pb: &ProgressBar, line: String) {
    if pb.is_hidden() {
        println!("{line}");
    } else {
        pb.println(line);
    }
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            log::info!("No seed given; using {seed}. Pass --seed {seed} to replay this run.");
            seed
        }
    }
}

fn write_rows(output: Option<&PathBuf>, rows: &[SummaryRow]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        write_summary_tsv(path, rows)?;
        println!("Summary written to {}", path.display());
    }
    Ok(())
}

fn run_between(args: BetweenArgs) -> Result<(), Box<dyn std::error::Error>> {
    let BetweenArgs {
        run,
        hsquared_bf,
        eur_bf_rsquared,
        sd_pheno,
        scale_amr,
        scale_eas,
        scale_afr,
    } = args;
    let scaling = AncestryScaling {
        amr: scale_amr,
        eas: scale_eas,
        afr: scale_afr,
    };
    scaling.validate()?;
    let seed = resolve_seed(run.seed);

    println!(
        "This is a between-family simulation for {} parent pairs choosing between {} embryos.",
        run.n, run.embryos
    );

    let table = scaling.table(eur_bf_rsquared);
    let pb = create_progress_bar(table.len() as u64, "ancestries");
    let mut rows = Vec::with_capacity(table.len());
    for (position, (ancestry, r2)) in table.into_iter().enumerate() {
        pb.set_message(ancestry.code());
        let config = SimulationConfig::new(
            run.n,
            run.embryos,
            ModelVariant::BetweenFamily {
                heritability: hsquared_bf,
                r2,
            },
        )
        .with_sd_pheno(sd_pheno);
        let result = run_seeded(&config, ScenarioFile::scenario_seed(seed, position))?;
        if let Outcome::Continuous(gain) = &result.outcome {
            print_result(&pb, between_family_sentence(ancestry, gain));
        }
        rows.push(SummaryRow::new(ancestry.code(), &result));
        pb.inc(1);
    }
    pb.finish_and_clear();

    write_rows(run.output.as_ref(), &rows)
}

fn run_within(args: WithinArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pleiotropy = match (
        args.heritability_pleio,
        args.correlation_pleio,
        args.prevalence_pleio,
        args.pleiotropic_trait.as_deref(),
    ) {
        (Some(heritability), Some(genetic_correlation), Some(prevalence), Some(name)) => {
            Some((
                name.to_string(),
                Pleiotropy {
                    genetic_correlation,
                    heritability,
                    prevalence: Some(prevalence),
                },
            ))
        }
        (None, None, None, None) => None,
        _ => {
            log::warn!(
                "Ignoring the pleiotropic trait: --heritability-pleio, --correlation-pleio, \
                 --prevalence-pleio and --pleiotropic-trait must all be given together."
            );
            None
        }
    };

    println!(
        "This is a within-family simulation for embryo selection using the polygenic score for {}.",
        args.main_pheno
    );
    println!(
        "This analysis is done for {} parents of {} ancestry choosing between {} embryos.",
        args.run.n, args.ancestry, args.run.embryos
    );

    let variant = match &pleiotropy {
        Some((name, pleiotropy)) => {
            println!("Note: we are considering the pleiotropic trait of {name} in this analysis.");
            ModelVariant::WithinFamilyPleiotropic {
                heritability_broad: args.heritability_broad,
                heritability_snp: args.heritability_snp,
                r2: args.attenuated_rsquared,
                pleiotropy: pleiotropy.clone(),
            }
        }
        None => {
            println!("Note: there is no pleiotropic trait considered in this simulation.");
            ModelVariant::WithinFamily {
                heritability_broad: args.heritability_broad,
                heritability_snp: args.heritability_snp,
                r2: args.attenuated_rsquared,
            }
        }
    };

    let mut config =
        SimulationConfig::new(args.run.n, args.run.embryos, variant).with_sd_pheno(args.sd_pheno);
    if let Some(convention) = args.threshold_convention {
        config = config.with_threshold_convention(convention.into());
    }

    let seed = resolve_seed(args.run.seed);
    let result = run_seeded(&config, seed)?;
    print_within_result(&args, pleiotropy.as_ref().map(|(name, _)| name.as_str()), &result);
    println!("End of analysis.");

    write_rows(
        args.run.output.as_ref(),
        &[SummaryRow::new(args.main_pheno.as_str(), &result)],
    )
}

fn print_within_result(args: &WithinArgs, pleiotropic_trait: Option<&str>, result: &SimulationResult) {
    if let Outcome::Continuous(gain) = &result.outcome {
        println!(
            "{}",
            within_family_sentence(&args.ancestry, &args.main_pheno, gain)
        );
    }
    let Some(name) = pleiotropic_trait else {
        return;
    };
    match &result.pleiotropic {
        Some(Outcome::Binary(prevalence)) => println!(
            "{}",
            pleiotropic_prevalence_sentence(&args.ancestry, name, &args.main_pheno, prevalence)
        ),
        Some(Outcome::Continuous(shift)) => println!(
            "{}",
            pleiotropic_shift_sentence(&args.ancestry, name, &args.main_pheno, shift)
        ),
        None => {}
    }
}

fn run_clinical(args: ClinicalArgs) -> Result<(), Box<dyn std::error::Error>> {
    let conditions = conditions_from_lists(
        &args.condition,
        &args.heritability,
        &args.rsquared,
        &args.correlation_mz,
        &args.prevalence,
    )?;
    let seed = resolve_seed(args.run.seed);

    println!("This is a simulation for within-family selection of embryos.");
    println!(
        "This analysis is for parents of {} ancestry who are choosing from {} embryos.",
        args.ancestry, args.run.embryos
    );

    let pb = create_progress_bar(conditions.len() as u64, "conditions");
    let mut rows = Vec::with_capacity(conditions.len());
    for (position, condition) in conditions.iter().enumerate() {
        pb.set_message(condition.name.clone());
        let result = run_condition(
            condition,
            &args.run,
            args.threshold_convention,
            ScenarioFile::scenario_seed(seed, position),
        )?;
        if let Outcome::Binary(prevalence) = &result.outcome {
            print_result(&pb, clinical_sentence(&condition.name, prevalence));
        }
        rows.push(SummaryRow::new(condition.name.as_str(), &result));
        pb.inc(1);
    }
    pb.finish_and_clear();

    write_rows(args.run.output.as_ref(), &rows)
}

fn run_condition(
    condition: &ClinicalCondition,
    run: &RunArgs,
    convention: Option<ConventionCli>,
    seed: u64,
) -> Result<SimulationResult, Box<dyn std::error::Error>> {
    let mut config = SimulationConfig::new(run.n, run.embryos, condition.variant());
    if let Some(convention) = convention {
        config = config.with_threshold_convention(convention.into());
    }
    Ok(run_seeded(&config, seed)?)
}

fn run_scenarios(args: ScenarioArgs) -> Result<(), Box<dyn std::error::Error>> {
    let file = ScenarioFile::load(&args.path)?;
    file.validate()?;
    let seed = resolve_seed(args.seed.or(file.seed));
    let output = args.output.or_else(|| file.output.clone());

    let pb = create_progress_bar(file.scenario.len() as u64, "scenarios");
    let mut rows = Vec::with_capacity(file.scenario.len());
    for (position, scenario) in file.scenario.iter().enumerate() {
        pb.set_message(scenario.label.clone());
        let result = run_seeded(
            &scenario.config,
            ScenarioFile::scenario_seed(seed, position),
        )?;
        print_result(&pb, scenario_sentence(&scenario.label, &result));
        rows.push(SummaryRow::new(scenario.label.as_str(), &result));
        pb.inc(1);
    }
    pb.finish_and_clear();

    write_rows(output.as_ref(), &rows)
}
