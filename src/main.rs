//! lambda-local: run a Go Lambda function locally.
//!
//! `api` serves the routes of a SAM template and forwards each request to the
//! function; `event` invokes it once with a prepared event.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, CliCommand};
use lambda_local::format::divider;
use lambda_local::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let invoke_config = cli.invoke_config();
    info!(
        address = %invoke_config.address,
        execution_limit = ?invoke_config.execution_limit,
        "function endpoint"
    );
    let invoker = Arc::new(RpcInvoker::new(invoke_config));

    match &cli.command {
        CliCommand::Api(args) => {
            println!("{}", divider());
            info!("Starting local API Gateway for Lambda");

            let routes = parse_template(&args.template)
                .with_context(|| format!("loading template {}", args.template.display()))?;
            let config = GatewayConfig::new()
                .port(args.port)
                .parse_json(cli.parse_json);
            let server = GatewayServer::new(config, routes, invoker).context("configuring gateway")?;
            server.run().await.context("running gateway")?;
        }
        CliCommand::Event(args) => {
            let event = args.event()?;
            run_event(invoker.as_ref(), &event, cli.parse_json, &mut std::io::stdout())
                .await
                .context("invoking function")?;
        }
    }
    Ok(())
}
