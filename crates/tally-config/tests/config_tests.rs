// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tally configuration system.

use serial_test::serial;
use tally_config::diagnostic::ConfigError;
use tally_config::model::TallyConfig;
use tally_config::{
    CompletionMode, CounterBackend, load_and_validate_str, load_config_from_path,
    load_config_from_str,
};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tally_config() {
    let toml = r#"
[server]
host = "127.0.0.1"
port = 3000
max_concurrent_requests = 64
log_level = "debug"

[counter]
backend = "memory"
url = "redis://localhost:6379/2"
call_timeout_ms = 250

[storage]
database_path = "/tmp/tally-test.db"
wal_mode = false
call_timeout_ms = 1000

[dispatch]
completion = "persist"
queue = "numbers"

[startup]
probe_attempts = 3
probe_backoff_ms = 10

[worker]
enabled = false
poll_interval_ms = 50
max_retries = 2
reconcile_interval_secs = 5
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.max_concurrent_requests, 64);
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.counter.backend, CounterBackend::Memory);
    assert_eq!(config.counter.url, "redis://localhost:6379/2");
    assert_eq!(config.counter.call_timeout_ms, 250);
    assert_eq!(config.storage.database_path, "/tmp/tally-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.call_timeout_ms, 1000);
    assert_eq!(config.dispatch.completion, CompletionMode::Persist);
    assert_eq!(config.dispatch.queue, "numbers");
    assert_eq!(config.startup.probe_attempts, 3);
    assert_eq!(config.startup.probe_backoff_ms, 10);
    assert!(!config.worker.enabled);
    assert_eq!(config.worker.poll_interval_ms, 50);
    assert_eq!(config.worker.max_retries, 2);
    assert_eq!(config.worker.reconcile_interval_secs, 5);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.max_concurrent_requests, 25);
    assert_eq!(config.counter.backend, CounterBackend::Redis);
    assert_eq!(config.counter.url, "redis://redis:6379/1");
    assert_eq!(config.counter.call_timeout_ms, 5000);
    assert_eq!(config.storage.call_timeout_ms, 5000);
    assert!(config.storage.wal_mode);
    assert_eq!(config.dispatch.completion, CompletionMode::Dispatch);
    assert_eq!(config.dispatch.queue, "default");
    assert_eq!(config.startup.probe_attempts, 30);
    assert_eq!(config.startup.probe_backoff_ms, 2000);
    assert!(config.worker.enabled);
    assert_eq!(config.worker.max_retries, 5);
}

#[test]
fn figment_tuple_override_wins_over_file() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: TallyConfig = Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::string("[dispatch]\ncompletion = \"dispatch\"\n"))
        .merge(("dispatch.completion", "persist"))
        .extract()
        .expect("should merge override");
    assert_eq!(config.dispatch.completion, CompletionMode::Persist);
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[metrics]
enabled = true
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn unknown_completion_mode_is_rejected() {
    let toml = r#"
[dispatch]
completion = "eventually"
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// Error output from load_and_validate_str includes the unknown key name.
#[test]
fn diagnostic_error_includes_unknown_key_and_suggestion() {
    let toml = r#"
[server]
prot = 9000
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "prot"
                && suggestion.as_deref() == Some("port")
                && valid_keys.contains("max_concurrent_requests")
        })
    });
    assert!(
        has_unknown_key,
        "should have UnknownKey error for 'prot' with suggestion 'port', got: {errors:?}"
    );
}

/// A misspelled enum value names the dotted setting and the closest variant.
#[test]
fn misspelled_completion_mode_suggests_variant() {
    let toml = r#"
[dispatch]
completion = "persit"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject variant");
    let error = errors
        .iter()
        .find(|e| matches!(e, ConfigError::InvalidValue { .. }))
        .unwrap_or_else(|| panic!("expected InvalidValue, got {errors:?}"));
    let ConfigError::InvalidValue {
        key,
        suggestion,
        expected,
        span,
        ..
    } = error
    else {
        unreachable!()
    };
    assert_eq!(key, "dispatch.completion");
    assert_eq!(suggestion.as_deref(), Some("persist"));
    assert!(expected.contains("dispatch"));
    let span = span.expect("inline source should be located");
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "completion");
}

/// Unknown keys in inline configuration point at the offending line.
#[test]
fn unknown_key_is_located_in_inline_source() {
    let toml = "[server]
port = 8080

[worker]
max_retrys = 2
";

    let errors = load_and_validate_str(toml).expect_err("should reject key");
    let span = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey { key, span, .. } if key == "max_retrys" => *span,
            _ => None,
        })
        .unwrap_or_else(|| panic!("expected located UnknownKey, got {errors:?}"));
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "max_retrys");
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[worker]
max_retries = "many"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("max_retries"),
        "error should mention type mismatch, got: {err_str}"
    );
}

#[test]
fn config_error_implements_diagnostic() {
    use miette::Diagnostic;

    let error = ConfigError::UnknownKey {
        key: "qeueu".to_string(),
        suggestion: Some("queue".to_string()),
        valid_keys: "completion, queue".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().expect("should have help text").to_string();
    assert!(
        help.contains("did you mean `queue`"),
        "help should contain suggestion, got: {help}"
    );
}

#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::Validation {
        message: "dispatch.queue must not be empty".to_string(),
    };

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("dispatch.queue"));
}

#[test]
fn validation_runs_after_successful_parse() {
    let toml = r#"
[counter]
url = "memcached://cache:11211"
"#;

    let errors = load_and_validate_str(toml).expect_err("bad url should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("counter.url"))
    ));
}

#[test]
#[serial]
fn defaults_load_and_validate_without_files() {
    let config = tally_config::load_and_validate().expect("defaults should validate");
    assert!(!config.dispatch.queue.is_empty());
}

#[test]
#[serial]
fn env_vars_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.toml");
    std::fs::write(
        &path,
        "[server]\nport = 3000\n\n[worker]\nmax_retries = 1\n",
    )
    .unwrap();

    // SAFETY: test-only env mutation, serialized with #[serial].
    unsafe {
        std::env::set_var("TALLY_WORKER_MAX_RETRIES", "9");
        std::env::set_var("TALLY_DISPATCH_COMPLETION", "persist");
    }
    let config = load_config_from_path(&path);
    unsafe {
        std::env::remove_var("TALLY_WORKER_MAX_RETRIES");
        std::env::remove_var("TALLY_DISPATCH_COMPLETION");
    }

    let config = config.expect("should load");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.worker.max_retries, 9);
    assert_eq!(config.dispatch.completion, CompletionMode::Persist);
}

#[test]
#[serial]
fn platform_port_and_redis_url_are_honored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.toml");
    std::fs::write(&path, "[server]\nport = 3000\n").unwrap();

    // SAFETY: test-only env mutation, serialized with #[serial].
    unsafe {
        std::env::set_var("PORT", "4567");
        std::env::set_var("REDIS_URL", "redis://cache.internal:6380/0");
    }
    let config = load_config_from_path(&path);
    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("REDIS_URL");
    }

    let config = config.expect("should load");
    assert_eq!(config.server.port, 4567);
    assert_eq!(config.counter.url, "redis://cache.internal:6380/0");
}

#[test]
#[serial]
fn explicit_path_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.toml");
    std::fs::write(&path, "[startup]\nprobe_attempts = 0\n").unwrap();

    let errors = tally_config::load_and_validate_path(&path).expect_err("zero attempts");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("probe_attempts"))
    ));
}

/// The rendered effective configuration parses back to the same values.
#[test]
#[serial]
fn effective_config_renders_as_loadable_toml() {
    let mut config = TallyConfig::default();
    config.server.port = 9090;
    config.dispatch.completion = CompletionMode::Dispatch;
    config.dispatch.queue = "bulk".to_string();

    let rendered = config.to_toml().unwrap();
    assert!(rendered.contains("[dispatch]"));

    let reloaded = load_and_validate_str(&rendered).unwrap();
    assert_eq!(reloaded.server.port, 9090);
    assert_eq!(reloaded.dispatch.completion, CompletionMode::Dispatch);
    assert_eq!(reloaded.dispatch.queue, "bulk");
}

#[test]
#[serial]
fn mysql_connection_vars_are_reported_as_ignored() {
    // SAFETY: test-only env mutation, serialized with #[serial].
    unsafe {
        std::env::set_var("MYSQL_HOST", "mysql");
        std::env::set_var("MYSQL_PASSWORD", "password");
    }
    let ignored = tally_config::ignored_store_vars();
    let config = tally_config::load_and_validate();
    unsafe {
        std::env::remove_var("MYSQL_HOST");
        std::env::remove_var("MYSQL_PASSWORD");
    }

    assert_eq!(ignored, vec!["MYSQL_HOST", "MYSQL_PASSWORD"]);
    assert!(config.is_ok(), "MySQL variables must not break loading");
    assert!(tally_config::ignored_store_vars().is_empty());
}
