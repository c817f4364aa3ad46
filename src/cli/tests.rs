use super::*;
use crate::cli::tools::{format_stats, format_tool, parse_key_values};
use crate::cli::watch::WatchPrinter;
use crate::mcp::catalog::Tool;
use crate::mcp::engine::EngineSnapshot;
use crate::mcp::log_buffer::{LogCategory, LogEntry};
use crate::mcp::session::{ConnectionStatus, SessionState};
use crate::mcp::stats::{ToolStats, UsageStats};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    pub(super) fn words(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    pub(super) fn entry(seq: u64, message: &str) -> LogEntry {
        LogEntry {
            seq,
            timestamp: chrono::Local::now(),
            category: LogCategory::Mcp,
            message: message.to_string(),
        }
    }

    /// Newest-first logs, the way the engine publishes them.
    pub(super) fn snapshot(status: ConnectionStatus, logs: Vec<LogEntry>) -> EngineSnapshot {
        EngineSnapshot {
            state: if status.connected {
                SessionState::Ready
            } else {
                SessionState::Connecting
            },
            status,
            submission_address: None,
            protocol_version: None,
            tools: Arc::from(Vec::<Tool>::new()),
            catalog_generation: 0,
            stats: UsageStats::default(),
            logs,
            last_result: None,
            pending_calls: 0,
        }
    }
}

use test_helpers::{entry, parse_args, snapshot, words};

#[test]
fn no_subcommand_defaults_to_watch() {
    let args = parse_args(&["mcp-tester"]);
    assert!(args.command.is_none());
    assert!(args.url.is_none());
    assert!(args.log.is_none());
}

#[test]
fn global_flags_parse_after_subcommand() {
    let argv = [
        "mcp-tester",
        "tools",
        "--url",
        "http://example.com/sse",
        "--token",
        "abc",
        "--timeout",
        "5",
        "--log",
        "engine.log",
    ];
    let args = parse_args(&argv);
    assert!(matches!(args.command, Some(Commands::Tools)));
    assert_eq!(args.url.as_deref(), Some("http://example.com/sse"));
    assert_eq!(args.token.as_deref(), Some("abc"));
    assert_eq!(args.timeout, Some(5));
    assert_eq!(args.log, Some(PathBuf::from("engine.log")));
}

#[test]
fn call_collects_key_value_arguments() {
    let args = parse_args(&["mcp-tester", "call", "get_weather", "city=Paris", "days=3"]);
    match args.command {
        Some(Commands::Call { tool, arguments }) => {
            assert_eq!(tool, "get_weather");
            assert_eq!(arguments, words(&["city=Paris", "days=3"]));
        }
        _ => panic!("expected call subcommand"),
    }
}

#[test]
fn set_without_key_parses() {
    let args = parse_args(&["mcp-tester", "set"]);
    match args.command {
        Some(Commands::Set { key, value }) => {
            assert!(key.is_none());
            assert!(value.is_empty());
        }
        _ => panic!("expected set subcommand"),
    }
}

#[test]
fn timeout_must_be_numeric() {
    assert!(Args::try_parse_from(["mcp-tester", "--timeout", "soon"]).is_err());
}

#[test]
fn flags_override_stored_config() {
    let stored = Config {
        sse_url: Some("http://file.example/sse".to_string()),
        auth_token: Some("file-token".to_string()),
        call_timeout_seconds: Some(90),
        ..Config::default()
    };

    let args = parse_args(&["mcp-tester"]);
    let resolved = resolve_engine_config(&args, &stored).expect("resolve stored");
    assert_eq!(resolved.sse_url, "http://file.example/sse");
    assert_eq!(resolved.auth_token.as_deref(), Some("file-token"));
    assert_eq!(resolved.call_timeout, Duration::from_secs(90));

    let args = parse_args(&[
        "mcp-tester",
        "--url",
        "https://flag.example/sse",
        "--token",
        "flag-token",
        "--timeout",
        "7",
    ]);
    let resolved = resolve_engine_config(&args, &stored).expect("resolve flags");
    assert_eq!(resolved.sse_url, "https://flag.example/sse");
    assert_eq!(resolved.auth_token.as_deref(), Some("flag-token"));
    assert_eq!(resolved.call_timeout, Duration::from_secs(7));
}

#[test]
fn zero_timeout_flag_is_rejected() {
    let args = parse_args(&["mcp-tester", "--timeout", "0"]);
    assert!(resolve_engine_config(&args, &Config::default()).is_err());
}

#[test]
fn set_and_unset_round_trip_through_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");

    handle_set(
        &config_path,
        Some("sse-url"),
        &words(&["https://tools.example/sse"]),
    )
    .expect("set sse-url");
    handle_set(&config_path, Some("call-timeout"), &words(&["45"])).expect("set timeout");
    handle_set(&config_path, Some("protocol-version"), &words(&["2025-06-18"]))
        .expect("set protocol version");

    let config = Config::load_from_path(&config_path).expect("load config");
    assert_eq!(config.sse_url.as_deref(), Some("https://tools.example/sse"));
    assert_eq!(config.call_timeout_seconds, Some(45));
    assert_eq!(config.protocol_version.as_deref(), Some("2025-06-18"));

    handle_unset(&config_path, "call-timeout").expect("unset timeout");
    let config = Config::load_from_path(&config_path).expect("reload config");
    assert_eq!(config.call_timeout_seconds, None);
    assert_eq!(config.sse_url.as_deref(), Some("https://tools.example/sse"));
}

#[test]
fn set_rejects_bad_values_without_writing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");

    let err = handle_set(&config_path, Some("sse-url"), &words(&["not a url"]))
        .expect_err("invalid url");
    assert!(matches!(
        err,
        SettingError::InvalidValue { key: "sse-url", .. }
    ));

    let err = handle_set(&config_path, Some("call-timeout"), &words(&["0"]))
        .expect_err("zero timeout");
    assert!(matches!(
        err,
        SettingError::InvalidValue {
            key: "call-timeout",
            ..
        }
    ));

    let err = handle_set(&config_path, Some("auth-token"), &[]).expect_err("missing value");
    assert!(matches!(err, SettingError::MissingArgs { .. }));
    assert_eq!(err.exit_code(), 2);

    assert!(!config_path.exists());
}

#[test]
fn unknown_keys_are_reported() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");

    let err = handle_set(&config_path, Some("theme"), &words(&["dark"])).expect_err("unknown");
    assert_eq!(err.to_string(), "Unknown config key: theme");
    assert!(handle_unset(&config_path, "theme").is_err());
}

#[test]
fn listing_masks_the_token() {
    let registry = SettingRegistry::new();
    let config = Config {
        auth_token: Some("supersecret".to_string()),
        ..Config::default()
    };

    let lines = format_all(&registry, &config);
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "  sse-url: (unset, default: http://localhost:8000/sse)"
    );
    assert_eq!(lines[1], "  auth-token: *******cret");
    assert_eq!(lines[2], "  call-timeout: (unset, default: 30s)");
    assert!(lines[3].starts_with("  protocol-version: (unset"));
}

#[test]
fn watch_printer_only_emits_new_entries() {
    let mut printer = WatchPrinter::default();
    let connecting = ConnectionStatus {
        connected: false,
        status_text: "Connecting...",
    };
    let connected = ConnectionStatus {
        connected: true,
        status_text: "Connected",
    };

    let first = printer.observe(&snapshot(
        connecting.clone(),
        vec![entry(2, "Endpoint received: /messages"), entry(1, "SSE connected")],
    ));
    assert_eq!(first.len(), 3);
    assert!(first[0].contains("Connecting..."));
    assert!(first[1].ends_with("MCP: SSE connected"));
    assert!(first[2].ends_with("MCP: Endpoint received: /messages"));

    let unchanged = printer.observe(&snapshot(
        connecting,
        vec![entry(2, "Endpoint received: /messages"), entry(1, "SSE connected")],
    ));
    assert!(unchanged.is_empty());

    let next = printer.observe(&snapshot(
        connected,
        vec![entry(3, "Session ready"), entry(2, "Endpoint received: /messages")],
    ));
    assert_eq!(next.len(), 2);
    assert!(next[0].contains("Connected"));
    assert!(next[1].ends_with("MCP: Session ready"));
}

#[test]
fn key_value_arguments_split_on_first_equals() {
    let pairs = parse_key_values(&words(&["query=a=b", "limit=5", "empty="])).expect("parse");
    assert_eq!(
        pairs,
        vec![
            ("query".to_string(), "a=b".to_string()),
            ("limit".to_string(), "5".to_string()),
            ("empty".to_string(), String::new()),
        ]
    );

    let err = parse_key_values(&words(&["novalue"])).expect_err("missing equals");
    assert_eq!(err, "Expected KEY=VALUE, got 'novalue'");
    assert!(parse_key_values(&words(&["=x"])).is_err());
}

#[test]
fn tool_listing_marks_required_parameters() {
    let tool: Tool = serde_json::from_value(json!({
        "name": "get_weather",
        "description": "Current conditions",
        "inputSchema": {
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "City name"},
                "days": {"type": "integer"}
            },
            "required": ["city"]
        }
    }))
    .expect("tool");

    let rendered = format_tool(&tool);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "🔧 get_weather: Current conditions");
    assert_eq!(lines[1], "   * city (string): City name");
    assert_eq!(lines[2], "     days (integer)");
}

#[test]
fn stats_line_reports_all_counters() {
    let stats = ToolStats {
        count: 3,
        success: 2,
        failure: 1,
    };
    assert_eq!(
        format_stats("echo", stats),
        "📊 echo: 3 calls, 2 succeeded, 1 failed"
    );
}
