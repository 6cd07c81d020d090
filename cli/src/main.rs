//! chainlog: command-line appender and verifier for tamper-evident audit logs.
//!
//! Usage:
//!   chainlog append staff_assign --actor-id 42 --actor-label alice --details '{"role":"mod"}'
//!   chainlog --log logs/audit.log verify
//!   chainlog --config audit.toml verify
//!
//! Configuration is layered: defaults, then `--config` TOML, then the
//! `CHAINLOG_*` environment variables, then `--log`. The signing secret is
//! only read from `CHAINLOG_HMAC_SECRET`.
//!
//! Exit codes: 0 on success, 1 when verification finds a divergence, 2 on
//! configuration, input, or I/O errors.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use chainlog_audit::{FileAppender, FileVerifier};
use chainlog_contracts::{
    config::AuditConfig,
    error::{AuditError, AuditResult},
    record::{Actor, ActorId, AuditEntry},
};
use chainlog_core::AuditRecorder;

// ── CLI definition ────────────────────────────────────────────────────────────

/// chainlog: hash-chained, HMAC-signed JSON Lines audit log.
#[derive(Parser)]
#[command(
    name = "chainlog",
    about = "Append to and verify a tamper-evident audit log",
    long_about = "Appends hash-chained, optionally HMAC-signed records to a JSON Lines\n\
                  audit log and verifies the chain offline."
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log file path. Overrides the config file and CHAINLOG_PATH.
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append one record and print it as a JSON line.
    Append {
        /// Symbolic event name, e.g. permission_denied.
        event: String,

        /// Acting principal id. Numeric ids are stored as numbers.
        #[arg(long)]
        actor_id: Option<String>,

        /// Display label of the acting principal. Defaults to the id.
        #[arg(long, requires = "actor_id")]
        actor_label: Option<String>,

        /// Details as a JSON object.
        #[arg(long)]
        details: Option<String>,

        /// Flag the record for escalation.
        #[arg(long)]
        critical: bool,
    },
    /// Verify the hash chain (and signatures, if a secret is set).
    Verify,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    process::exit(exit_code(run(cli, |key| std::env::var(key).ok())));
}

/// Load the configuration and run the chosen subcommand.
///
/// `env` stands in for the process environment.
fn run<F>(cli: Cli, env: F) -> AuditResult<i32>
where
    F: Fn(&str) -> Option<String>,
{
    let config = load_config(&cli, env)?;

    match cli.command {
        Command::Append {
            event,
            actor_id,
            actor_label,
            details,
            critical,
        } => run_append(&config, event, actor_id, actor_label, details, critical),
        Command::Verify => run_verify(&config),
    }
}

/// Map a run result to the process exit code. Errors are reported on stderr
/// and exit with 2.
fn exit_code(result: AuditResult<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("chainlog: {}", e);
            2
        }
    }
}

fn load_config<F>(cli: &Cli, env: F) -> AuditResult<AuditConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match &cli.config {
        Some(path) => AuditConfig::from_file(path)?,
        None => AuditConfig::default(),
    };
    let mut config = base.apply_env_from(env)?;
    if let Some(log) = &cli.log {
        config.log_path = log.clone();
    }
    Ok(config)
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn run_append(
    config: &AuditConfig,
    event: String,
    actor_id: Option<String>,
    actor_label: Option<String>,
    details: Option<String>,
    critical: bool,
) -> AuditResult<i32> {
    if !config.is_signing() {
        warn!("no signing secret configured; record will be chained but unsigned");
    }

    let mut entry = AuditEntry::new(event).critical(critical);
    if let Some(id) = actor_id {
        entry = entry.actor(parse_actor(id, actor_label));
    }
    if let Some(raw) = details {
        entry = entry.details(parse_details(&raw)?);
    }

    let recorder = AuditRecorder::new(Box::new(FileAppender::new(config)));
    let record = recorder.record(entry)?;
    println!("{}", record.to_json_line()?);
    Ok(0)
}

fn run_verify(config: &AuditConfig) -> AuditResult<i32> {
    let report = FileVerifier::from_config(config).verify(&config.log_path)?;
    println!("{}", report);
    if !config.is_signing() {
        println!("note: no signing secret configured; signatures were not checked");
    }
    Ok(if report.is_success() { 0 } else { 1 })
}

// ── Argument parsing ──────────────────────────────────────────────────────────

/// Ids written in canonical decimal form are stored as numbers. Anything
/// else, including `007`, is kept verbatim as a string.
fn parse_actor(id: String, label: Option<String>) -> Actor {
    let label = label.unwrap_or_else(|| id.clone());
    let id = match id.parse::<u64>() {
        Ok(numeric) if numeric.to_string() == id => ActorId::Numeric(numeric),
        _ => ActorId::Text(id),
    };
    Actor { id, label }
}

fn parse_details(raw: &str) -> AuditResult<Map<String, Value>> {
    let invalid = |problem: String| AuditError::Config {
        reason: format!("--details must be a JSON object: {}", problem),
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(invalid(format!("got {}", other))),
        Err(e) => Err(invalid(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chainlog_contracts::config::ENV_STRICT_TAIL;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("chainlog").chain(args.iter().copied())).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn log_arg(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    fn append(path: &Path, event: &str, details: &str) {
        let code = run(
            cli(&["--log", log_arg(path), "append", event, "--details", details]),
            no_env,
        );
        assert_eq!(code.unwrap(), 0);
    }

    // ── Argument parsing ─────────────────────────────────────────────────────

    #[test]
    fn numeric_actor_ids_are_stored_as_numbers() {
        let actor = parse_actor("42".to_string(), Some("alice".to_string()));
        assert_eq!(actor.id, ActorId::Numeric(42));
        assert_eq!(actor.label, "alice");
    }

    #[test]
    fn actor_label_defaults_to_id() {
        let actor = parse_actor("svc-backup".to_string(), None);
        assert_eq!(actor.id, ActorId::Text("svc-backup".to_string()));
        assert_eq!(actor.label, "svc-backup");
    }

    #[test]
    fn non_canonical_numeric_ids_are_kept_verbatim() {
        for raw in ["007", "+5", "0042"] {
            let actor = parse_actor(raw.to_string(), None);
            assert_eq!(actor.id, ActorId::Text(raw.to_string()));
            assert_eq!(actor.id.to_string(), actor.label);
        }
        assert_eq!(parse_actor("0".to_string(), None).id, ActorId::Numeric(0));
    }

    #[test]
    fn details_must_be_an_object() {
        assert!(parse_details(r#"{"ip":"10.0.0.1"}"#).is_ok());

        for raw in ["[1,2]", "\"text\"", "{"] {
            let err = parse_details(raw).unwrap_err();
            assert!(matches!(err, AuditError::Config { .. }), "{raw}: {err:?}");
            assert!(
                err.to_string().contains("--details must be a JSON object"),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn cli_accepts_global_log_after_subcommand() {
        let cli = Cli::try_parse_from(["chainlog", "verify", "--log", "x.log"]).unwrap();
        assert_eq!(cli.log, Some(PathBuf::from("x.log")));
        assert!(matches!(cli.command, Command::Verify));
    }

    #[test]
    fn cli_label_requires_id() {
        assert!(Cli::try_parse_from(["chainlog", "append", "login", "--actor-label", "alice"]).is_err());
    }

    // ── Exit codes ───────────────────────────────────────────────────────────

    #[test]
    fn verify_intact_log_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        append(&path, "login", r#"{"ip":"10.0.0.1"}"#);
        append(&path, "logout", "{}");

        let code = exit_code(run(cli(&["--log", log_arg(&path), "verify"]), no_env));
        assert_eq!(code, 0);
    }

    #[test]
    fn verify_tampered_details_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        append(&path, "login", r#"{"ip":"10.0.0.1"}"#);
        append(&path, "logout", "{}");

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut first: Value = serde_json::from_str(&lines[0]).unwrap();
        first["details"]["ip"] = Value::from("10.0.0.2");
        lines[0] = first.to_string();
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();

        let code = exit_code(run(cli(&["--log", log_arg(&path), "verify"]), no_env));
        assert_eq!(code, 1);
    }

    #[test]
    fn verify_missing_log_exits_two() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.log");

        let result = run(cli(&["--log", log_arg(&path), "verify"]), no_env);
        assert!(matches!(result, Err(AuditError::Io { .. })));
        assert_eq!(exit_code(result), 2);
    }

    #[test]
    fn invalid_strict_tail_flag_exits_two() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let env = |key: &str| (key == ENV_STRICT_TAIL).then(|| "maybe".to_string());

        let result = run(cli(&["--log", log_arg(&path), "verify"]), env);
        assert!(matches!(result, Err(AuditError::Config { .. })));
        assert_eq!(exit_code(result), 2);
        assert!(!path.exists());
    }

    #[test]
    fn invalid_details_exits_two_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let result = run(
            cli(&["--log", log_arg(&path), "append", "login", "--details", "[1]"]),
            no_env,
        );
        assert_eq!(exit_code(result), 2);
        assert!(!path.exists());
    }
}
