use std::fs;
use std::process::{Command, Output};

use tempfile::tempdir;

fn polyselect(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_polyselect"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run polyselect cli")
}

#[test]
fn clinical_lists_of_different_lengths_exit_with_an_error() {
    let output = polyselect(&[
        "clinical",
        "--ancestry",
        "EUR",
        "--heritability",
        "0.5",
        "0.4",
        "--rsquared",
        "0.1",
        "--correlation-mz",
        "0.6",
        "0.5",
        "--prevalence",
        "0.1",
        "0.05",
        "--condition",
        "A",
        "B",
        "--n",
        "200",
        "--seed",
        "1",
    ]);

    assert_eq!(output.status.code(), Some(1), "status {:?}", output.status);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {stderr}");
    assert!(
        stderr.contains("Your lists aren't the same length: 'rsquared' has 1 entries"),
        "stderr: {stderr}"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("This is a simulation"), "stdout: {stdout}");
}

#[test]
fn clinical_run_prints_one_sentence_per_condition_and_writes_the_summary() {
    let tmp = tempdir().expect("temporary directory");
    let summary_path = tmp.path().join("summary.tsv");

    let output = polyselect(&[
        "clinical",
        "--ancestry",
        "EUR",
        "--heritability",
        "0.5",
        "0.4",
        "--rsquared",
        "0.1",
        "0.05",
        "--correlation-mz",
        "0.6",
        "0.5",
        "--prevalence",
        "0.1",
        "0.05",
        "--condition",
        "A",
        "B",
        "--n",
        "200",
        "--embryos",
        "2",
        "--seed",
        "1",
        "--output",
        summary_path.to_str().expect("path str"),
    ]);

    assert!(output.status.success(), "CLI exited with status {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("parents of EUR ancestry who are choosing from 2 embryos"),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("For A, the within-family prevalence is"), "stdout: {stdout}");
    assert!(stdout.contains("For B, the within-family prevalence is"), "stdout: {stdout}");

    let summary = fs::read_to_string(&summary_path).expect("read summary");
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3, "summary: {summary}");
    assert!(lines[0].starts_with("label\tvariant\tfamilies\tembryos"));
    assert!(lines[1].starts_with("A\t"));
    assert!(lines[2].starts_with("B\t"));
}

#[test]
fn same_seed_prints_the_same_results() {
    let args = [
        "clinical",
        "--ancestry",
        "EAS",
        "--heritability",
        "0.6",
        "--rsquared",
        "0.1",
        "--correlation-mz",
        "0.7",
        "--prevalence",
        "0.1",
        "--condition",
        "A",
        "--n",
        "500",
        "--embryos",
        "3",
        "--seed",
        "42",
    ];
    let first = polyselect(&args);
    let second = polyselect(&args);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn missing_scenario_file_exits_with_an_error() {
    let tmp = tempdir().expect("temporary directory");
    let missing = tmp.path().join("absent.toml");

    let output = polyselect(&["scenario", missing.to_str().expect("path str")]);

    assert_eq!(output.status.code(), Some(1), "status {:?}", output.status);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {stderr}");
}
