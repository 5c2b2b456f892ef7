use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::io::Write;

fn bondeng() -> Command {
    Command::cargo_bin("bondeng").unwrap()
}

const REFERENCE_FLAGS: [&str; 8] = [
    "--principal",
    "10000",
    "--term",
    "24",
    "--rate",
    "12",
    "--start-date",
    "2025-01-15",
];

fn run_json(args: &[&str]) -> Value {
    let output = bondeng().args(args).write_stdin("").output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_version() {
    bondeng()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("bondeng "));
}

#[test]
fn test_evaluate_from_flags() {
    let mut args = vec!["evaluate"];
    args.extend(REFERENCE_FLAGS);
    let json = run_json(&args);

    assert_eq!(json["result"]["schedule"].as_array().unwrap().len(), 24);
    let trea: f64 = json["result"]["indicators"]["effective_yield_rate_annual"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((trea - 0.12).abs() < 1e-6, "TREA {trea}");
    assert_eq!(json["result"]["indicators"]["cost_rate_converged"], true);
}

#[test]
fn test_evaluate_with_compliance() {
    let mut args = vec!["evaluate", "--with-compliance", "--currency", "CUR_B", "--rate", "50"];
    args.extend(["--principal", "10000", "--term", "24", "--start-date", "2025-01-15"]);
    let json = run_json(&args);

    assert_eq!(json["result"]["compliance"]["overall_status"], "partial");
    assert!(json["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w.as_str().unwrap().contains("interest_rate_cap")));
}

#[test]
fn test_schedule_csv_has_one_row_per_period() {
    let mut args = vec!["schedule", "--output", "csv", "--grace-kind", "partial", "--grace-periods", "2"];
    args.extend(REFERENCE_FLAGS);
    let output = bondeng().args(&args).write_stdin("").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 25);
    assert!(lines[0].contains("due_date") && lines[0].contains("remaining_balance"));
    assert!(lines[1].contains("partial_grace"));
}

#[test]
fn test_schedule_table_output() {
    let mut args = vec!["schedule", "--output", "table"];
    args.extend(REFERENCE_FLAGS);
    bondeng()
        .args(&args)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("remaining_balance"));
}

#[test]
fn test_compliance_term_violation() {
    let json = run_json(&[
        "compliance",
        "--principal",
        "5000",
        "--term",
        "4",
        "--rate",
        "20",
        "--start-date",
        "2025-01-15",
    ]);
    assert_eq!(json["result"]["overall_status"], "partial");
    assert_eq!(json["result"]["rules"][1]["name"], "term_bounds");
    assert_eq!(json["result"]["rules"][1]["is_compliant"], false);
}

#[test]
fn test_convert_rate_minimal() {
    bondeng()
        .args([
            "convert-rate",
            "--rate",
            "12",
            "--basis",
            "nominal",
            "--capitalization",
            "monthly",
            "--output",
            "minimal",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("0.126825"));
}

#[test]
fn test_input_file_and_yaml_config() {
    let dir = tempfile::tempdir().unwrap();

    let input_path = dir.path().join("bond.json");
    let mut input = std::fs::File::create(&input_path).unwrap();
    write!(
        input,
        r#"{{
            "principal": "10000",
            "term_periods": 12,
            "rate_value_percent": "10",
            "start_date": "2025-02-01",
            "include_service_fee": true
        }}"#
    )
    .unwrap();

    let config_path = dir.path().join("engine.yaml");
    std::fs::write(&config_path, "costs:\n  service_fee: \"5\"\n").unwrap();

    let json = run_json(&[
        "evaluate",
        "--input",
        input_path.to_str().unwrap(),
        "--config",
        config_path.to_str().unwrap(),
    ]);
    assert_eq!(json["result"]["summary"]["total_service_fees"], "60");
}

#[test]
fn test_stdin_parameters() {
    bondeng()
        .args(["schedule", "--output", "minimal"])
        .write_stdin(r#"{"principal": "1200", "term_periods": 6, "rate_value_percent": "6", "start_date": "2025-01-01"}"#)
        .assert()
        .success();
}

#[test]
fn test_missing_principal_fails() {
    bondeng()
        .args(["evaluate", "--term", "12", "--rate", "10"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--principal is required"));
}

#[test]
fn test_invalid_grace_rejected() {
    let mut args = vec!["evaluate", "--grace-kind", "total", "--grace-periods", "24"];
    args.extend(REFERENCE_FLAGS);
    bondeng()
        .args(&args)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid parameter: grace_periods"));
}

#[test]
fn test_compliance_flag_only_on_evaluate() {
    for subcommand in ["schedule", "compliance"] {
        let mut args = vec![subcommand, "--with-compliance"];
        args.extend(REFERENCE_FLAGS);
        bondeng()
            .args(&args)
            .write_stdin("")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--with-compliance"));
    }
}
