//! Integration tests for CLI argument handling
//!
//! Runs the binary for argument validation and offline cache commands, and
//! exercises the parser directly for the rest.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_lyrix"))
        .args(args)
        .env_remove("LYRIX_LOG")
        .output()
        .expect("Failed to execute lyrix")
}

/// Writes a config pointing the session snapshot at `dir`
fn config_with_session_dir(dir: &TempDir) -> std::path::PathBuf {
    let session_dir = dir.path().join("session");
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "api_base_url = \"http://127.0.0.1:1/api\"\nsession_dir = {:?}\n",
            session_dir.to_string_lossy()
        ),
    )
    .expect("Should write config");
    config_path
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("lyrix"), "Help should mention lyrix");
    assert!(stdout.contains("theme"), "Help should mention the theme command");
}

#[test]
fn test_invalid_language_prints_error_and_exits() {
    let output = run_cli(&["theme", "42", "--lang", "fr", "--no-persist"]);
    assert!(!output.status.success(), "Expected invalid language to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid language"),
        "Should print error message about invalid language: {}",
        stderr
    );
}

#[test]
fn test_cache_list_without_persistence_is_empty() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_with_session_dir(&dir);
    let output = run_cli(&["--config", config.to_str().unwrap(), "--no-persist", "cache", "list"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No cached themes"), "stdout: {}", stdout);
}

#[test]
fn test_cache_list_reads_session_snapshot() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_with_session_dir(&dir);
    let session_dir = dir.path().join("session");
    fs::create_dir_all(&session_dir).unwrap();

    let now = chrono::Utc::now().timestamp_millis();
    fs::write(
        session_dir.join("lyrix-theme-cache.json"),
        format!(
            r#"{{"42_urd": {{"theme": "ishq", "timestamp": {}, "expires": {}}},
                "9_en": {{"theme": "gone", "timestamp": {}, "expires": {}}}}}"#,
            now,
            now + 600_000,
            now - 600_000,
            now - 1_000
        ),
    )
    .unwrap();

    let output = run_cli(&["--config", config.to_str().unwrap(), "cache", "list"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("42_urd"), "stdout: {}", stdout);
    assert!(!stdout.contains("9_en"), "expired entry should be dropped: {}", stdout);
}

#[test]
fn test_cache_clear_removes_snapshot() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_with_session_dir(&dir);
    let snapshot = dir.path().join("session").join("lyrix-theme-cache.json");
    fs::create_dir_all(snapshot.parent().unwrap()).unwrap();
    fs::write(&snapshot, "{}").unwrap();

    let output = run_cli(&["--config", config.to_str().unwrap(), "cache", "clear"]);

    assert!(output.status.success());
    assert!(!snapshot.exists());
}

#[test]
fn test_unreachable_backend_reports_retryable_failure() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_with_session_dir(&dir);
    let output = run_cli(&["--config", config.to_str().unwrap(), "theme", "42", "--no-persist"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to generate theme, try again"),
        "stderr: {}",
        stderr
    );
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use lyrix::cli::{parse_language_arg, CacheAction, Cli, Command};
    use lyrix::config::LyrixConfig;
    use lyrix::Language;

    #[test]
    fn test_theme_requires_song_id() {
        assert!(Cli::try_parse_from(["lyrix", "theme"]).is_err());
    }

    #[test]
    fn test_theme_short_language_flag() {
        let cli = Cli::parse_from(["lyrix", "theme", "7", "-l", "urd"]);
        match cli.command {
            Command::Theme { lang, .. } => assert_eq!(lang, Language::Urdu),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_preload_parses_song_id() {
        let cli = Cli::parse_from(["lyrix", "preload", "12"]);
        assert_eq!(
            cli.command,
            Command::Preload {
                song_id: "12".to_string()
            }
        );
    }

    #[test]
    fn test_cache_list_parses() {
        let cli = Cli::parse_from(["lyrix", "cache", "list"]);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheAction::List
            }
        );
    }

    #[test]
    fn test_parse_language_arg_rejects_aliases() {
        assert!(parse_language_arg("hi").is_err());
        assert!(parse_language_arg("ur").is_err());
        assert!(parse_language_arg("HIN").is_err());
    }

    #[test]
    fn test_overrides_leave_unset_values_alone() {
        let cli = Cli::parse_from(["lyrix", "cache", "list"]);
        let config = cli.apply_overrides(LyrixConfig::default()).unwrap();
        assert_eq!(config, LyrixConfig::default());
    }
}
