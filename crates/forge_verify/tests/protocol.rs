use assert_cmd::Command;
use predicates::str::contains;
use serde_json::{json, Value};

fn engine(margin: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_forge_verify"));
    cmd.args(["--margin", margin]);
    cmd
}

fn rat(num: i64, den: i64) -> Value {
    json!({ "num": num, "den": den })
}

fn decay_request(t0: Value, tmin: Value, tmax: Value) -> String {
    json!({
        "system_type": "decay",
        "state_dimension": 1,
        "state_variables": ["x"],
        "equations": { "x": "-lambda * x" },
        "parameters": { "lambda": rat(1, 1) },
        "initial_condition": { "t0": t0, "x0": rat(5, 1) },
        "interval": { "tmin": tmin, "tmax": tmax },
        "proof_type": "picard_lindelof",
    })
    .to_string()
}

fn respond(margin: &str, stdin: impl Into<Vec<u8>>) -> Value {
    let output = engine(margin).write_stdin(stdin).output().expect("run engine");
    assert!(output.status.success(), "engine exited with {:?}", output.status);
    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    assert_eq!(stdout.lines().count(), 1, "expected one line, got {stdout:?}");
    serde_json::from_str(&stdout).expect("stdout is JSON")
}

#[test]
fn reference_request_is_verified() {
    for margin in ["zero", "half-width"] {
        let result = respond(margin, decay_request(rat(0, 1), rat(-1, 10), rat(1, 10)));
        assert_eq!(result["success"], json!(true), "{result}");
        assert_eq!(result["error_code"], Value::Null);
        assert_eq!(result["certificate"]["a"], rat(6, 1));
        assert_eq!(result["certificate"]["L"], rat(11, 1));
        assert_eq!(result["certificate"]["K"], rat(1, 1));
    }
}

#[test]
fn wide_interval_is_infeasible() {
    let result = respond("zero", decay_request(rat(0, 1), rat(-1, 1), rat(1, 1)));
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["error_code"], Value::Null);
    assert!(result["certificate"].is_object());
}

#[test]
fn non_json_is_a_parse_error() {
    let result = respond("zero", "definitely not json");
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["error_code"], json!("PARSE_ERROR"));
}

#[test]
fn missing_parameters_is_a_parse_error() {
    let body = json!({
        "system_type": "decay",
        "initial_condition": { "t0": rat(0, 1), "x0": rat(5, 1) },
        "interval": { "tmin": rat(-1, 10), "tmax": rat(1, 10) },
    });
    let result = respond("zero", body.to_string());
    assert_eq!(result["error_code"], json!("PARSE_ERROR"));
    assert!(result["details"].as_str().unwrap_or_default().contains("parameters"));
}

#[test]
fn t0_outside_interval_is_a_validation_error() {
    let result = respond("half-width", decay_request(rat(1, 5), rat(-1, 10), rat(1, 10)));
    assert_eq!(result["error_code"], json!("VALIDATION_ERROR"));
    assert_eq!(
        result["details"],
        json!("Expected t0 in [-1/10, 1/10], got t0 = 1/5")
    );
}

#[test]
fn margin_flag_is_required() {
    Command::new(env!("CARGO_BIN_EXE_forge_verify"))
        .write_stdin("{}")
        .assert()
        .failure()
        .stderr(contains("--margin"));
}
