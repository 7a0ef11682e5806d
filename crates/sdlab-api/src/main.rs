//! sdlab CLI entry point.
//!
//! Binary name: `sdlab`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then
//! dispatches to the command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,sdlab=debug",
        _ => "trace",
    };
    sdlab_observe::init_tracing(filter, cli.otel, cli.json)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "sdlab", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.data_dir.clone()).await?;

    let success = match cli.command {
        Commands::Run {
            file,
            no_recovery,
            max_retries,
            workflow_id,
            inject_fault,
        } => {
            let options = cli::run::RunOptions {
                no_recovery,
                max_retries,
                workflow_id,
                inject_fault,
            };
            cli::run::run_workflow(&state, &file, options, cli.json, cli.quiet).await?
        }

        Commands::Validate { file } => cli::validate::validate(&file, cli.json).await?,

        Commands::Operations => {
            cli::operations::list_operations(cli.json)?;
            true
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
            true
        }

        Commands::Purge { max_age_hours } => {
            cli::purge::purge(&state, max_age_hours, cli.json).await?;
            true
        }

        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} sdlab API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(%addr, "http server started");

            let router = http::router::build_router(state.http());
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
            true
        }

        Commands::Watch { execute, once } => {
            let options = cli::watch::WatchOptions { execute, once };
            cli::watch::watch(&state, options, shutdown_signal(), cli.json, cli.quiet).await?
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    sdlab_observe::shutdown_tracing();
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM. A signal that can't be installed is logged
/// and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
