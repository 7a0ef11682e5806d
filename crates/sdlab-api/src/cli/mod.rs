//! CLI command definitions for the `sdlab` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod operations;
pub mod purge;
pub mod run;
pub mod status;
pub mod validate;
pub mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use sdlab_infra::controller::FaultSpec;

/// Run lab workflows with checkpoint-based recovery.
#[derive(Parser)]
#[command(name = "sdlab", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory (defaults to $SDLAB_DATA_DIR or ~/.sdlab).
    #[arg(long, global = true, env = "SDLAB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Export tracing spans to stdout via OpenTelemetry. Cannot be combined
    /// with `--json`, which owns stdout.
    #[arg(long, global = true, conflicts_with = "json")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a workflow file against the simulated lab.
    Run {
        /// Workflow JSON file.
        file: PathBuf,

        /// Run every step once, without retries or checkpoints.
        #[arg(long)]
        no_recovery: bool,

        /// Attempt budget for recoverable steps (overrides config).
        #[arg(long)]
        max_retries: Option<u32>,

        /// Run identifier (defaults to the envelope id or a generated one).
        #[arg(long)]
        workflow_id: Option<String>,

        /// Fail an operation on purpose: OP[:COUNT[:KIND]], repeatable.
        #[arg(long = "inject-fault", value_name = "OP[:COUNT[:KIND]]")]
        inject_fault: Vec<FaultSpec>,
    },

    /// Check that every step in a workflow file has a known type.
    Validate {
        /// Workflow JSON file.
        file: PathBuf,
    },

    /// List supported step types.
    #[command(alias = "ops")]
    Operations,

    /// Show configuration and checkpoint storage status.
    Status,

    /// Delete checkpoint files and dumps older than the configured age.
    Purge {
        /// Maximum age in hours (overrides config).
        #[arg(long)]
        max_age_hours: Option<u64>,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to (overrides config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Watch the workflow inbox folder and process dropped-in files.
    Watch {
        /// Execute claimed workflows (overrides `[watch] auto_execute`).
        #[arg(long)]
        execute: bool,

        /// Process files already waiting, then exit.
        #[arg(long)]
        once: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn otel_and_json_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["sdlab", "--json", "--otel", "status"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let err = Cli::try_parse_from(["sdlab", "status", "--otel", "--json"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn otel_alone_and_json_alone_parse() {
        let cli = Cli::try_parse_from(["sdlab", "--otel", "operations"]).unwrap();
        assert!(cli.otel && !cli.json);
        let cli = Cli::try_parse_from(["sdlab", "--json", "operations"]).unwrap();
        assert!(cli.json && !cli.otel);
    }

    #[test]
    fn serve_flags_are_optional_overrides() {
        let cli = Cli::try_parse_from(["sdlab", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: None, host: None }));

        let cli = Cli::try_parse_from(["sdlab", "serve", "-p", "9100", "--host", "0.0.0.0"]).unwrap();
        let Commands::Serve { port, host } = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(port, Some(9100));
        assert_eq!(host.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn inject_fault_specs_parse() {
        let cli = Cli::try_parse_from([
            "sdlab",
            "run",
            "wf.json",
            "--inject-fault",
            "aspirate:2",
            "--inject-fault",
            "home:1:comm",
        ])
        .unwrap();
        let Commands::Run { inject_fault, .. } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(inject_fault.len(), 2);
        assert_eq!(inject_fault[0].count, 2);
    }
}
