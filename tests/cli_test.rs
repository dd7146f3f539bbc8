use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const ENV_VARS: [&str; 6] = [
    "PAYMENT_GATEWAY",
    "PAYMENT_GATEWAY_URL",
    "PAYMENT_GATEWAY_API_KEY",
    "DATABASE_URL",
    "COURSES_CSV",
    "ADMIN_TOKEN",
];

fn command() -> Command {
    let mut cmd = Command::new(cargo_bin!("akin-university"));
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_configuration() {
    command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--gateway-api-key"))
        .stdout(predicate::str::contains("PAYMENT_GATEWAY_API_KEY"))
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn test_http_gateway_without_api_key_refuses_to_start() {
    command()
        .args(["--gateway", "http", "--gateway-url", "https://pay.example.com/charge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PAYMENT_GATEWAY_API_KEY"));
}

#[test]
fn test_blank_api_key_from_environment_is_rejected() {
    command()
        .env("PAYMENT_GATEWAY_URL", "https://pay.example.com/charge")
        .env("PAYMENT_GATEWAY_API_KEY", "   ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PAYMENT_GATEWAY_API_KEY"));
}

#[test]
fn test_invalid_policy_refuses_to_start() {
    command()
        .args(["--gateway", "mock", "--scholarship-discount-percent", "120"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Scholarship discount"));
}
