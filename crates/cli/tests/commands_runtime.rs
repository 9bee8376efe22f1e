use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use skillmatch_cli::commands::{config, migrate, seed};

const VALID_ENV: &[(&str, &str)] = &[
    ("SKILLMATCH_SLACK_BOT_TOKEN", "xoxb-test"),
    ("SKILLMATCH_DATABASE_URL", "sqlite::memory:"),
    ("SKILLMATCH_DATABASE_MAX_CONNECTIONS", "1"),
];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "applied pending migrations (1 total)");
    });
}

#[test]
fn migrate_returns_config_failure_without_bot_token() {
    with_env(&[], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_returns_employee_summary() {
    with_env(VALID_ENV, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("skill directory fixture loaded for 3 employees:"));
        assert!(message.contains("  - emp-jane-doe: Jane Doe (holds Go at level 2)"));
        assert!(message.contains("  - emp-new-hire: Alex Kim (holds no skills yet)"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(VALID_ENV, || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn config_reports_sources_and_redacts_tokens() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("skillmatch.toml");
    fs::write(&path, "[gateway]\nmax_retries = 4\n\n[slack]\nchannels = [\"skillmatch\"]\n")
        .expect("write config");

    with_env(VALID_ENV, || {
        let result = config::run(Some(path.clone()));
        assert_eq!(result.exit_code, 0, "expected config inspection success");

        let output = result.output;
        assert!(output.contains("- slack.bot_token = xoxb-*** (source: env (SKILLMATCH_SLACK_BOT_TOKEN))"));
        assert!(output.contains(&format!(
            "- gateway.max_retries = 4 (source: file ({}))",
            path.display()
        )));
        assert!(output.contains("- slack.channels = [skillmatch]"));
        assert!(output.contains("- slack.signing_secret = <unset> (source: default)"));
        assert!(!output.contains("xoxb-test"));
    });
}

#[test]
fn config_fails_when_the_requested_file_is_missing() {
    let dir = tempfile::tempdir().expect("tempdir");

    with_env(VALID_ENV, || {
        let result = config::run(Some(dir.path().join("absent.toml")));
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("config validation failed"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SKILLMATCH_DATABASE_URL",
        "SKILLMATCH_DATABASE_MAX_CONNECTIONS",
        "SKILLMATCH_DATABASE_TIMEOUT_SECS",
        "SKILLMATCH_SLACK_BOT_TOKEN",
        "SKILLMATCH_SLACK_USER_TOKEN",
        "SKILLMATCH_SLACK_SIGNING_SECRET",
        "SKILLMATCH_SLACK_API_BASE_URL",
        "SKILLMATCH_SLACK_CHANNELS",
        "SKILLMATCH_GATEWAY_MAX_RETRIES",
        "SKILLMATCH_CHATBOT_IDLE_TIMEOUT_SECS",
        "SKILLMATCH_SERVER_BIND_ADDRESS",
        "SKILLMATCH_SERVER_PORT",
        "SKILLMATCH_LOGGING_LEVEL",
        "SKILLMATCH_LOGGING_FORMAT",
        "SKILLMATCH_LOG_LEVEL",
        "SKILLMATCH_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
