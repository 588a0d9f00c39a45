use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{ArgGroup, Parser, Subcommand};

use lambda_local::invoke::InvokeConfig;

/// Run a Go Lambda function locally, behind an API gateway or with a single event.
#[derive(Debug, Parser)]
#[command(name = "lambda-local", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Address of the function's RPC listener (host:port)
    #[arg(short, long, value_name = "ADDR")]
    pub address: Option<String>,

    /// Port the function listens on when no address is given
    #[arg(long, env = "_LAMBDA_SERVER_PORT", hide = true)]
    pub lambda_server_port: Option<String>,

    /// Expand stringified JSON fields when printing the function's reply
    #[arg(short, long)]
    pub parse_json: bool,

    /// Execution limit in seconds, sent to the function as a deadline
    #[arg(short, long, default_value_t = 5, value_name = "SECONDS")]
    pub execution_limit: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Serve the descriptor's API routes over HTTP
    Api(ApiArgs),
    /// Invoke the function once with an event
    Event(EventArgs),
}

#[derive(Debug, Parser)]
pub struct ApiArgs {
    /// Port for the local gateway (four digits)
    #[arg(short, long, default_value = "8080", value_parser = parse_port)]
    pub port: u16,

    /// SAM template declaring the API routes
    #[arg(short, long, default_value = "./template.yaml", value_parser = existing_file)]
    pub template: PathBuf,
}

#[derive(Debug, Parser)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "string"])))]
pub struct EventArgs {
    /// File holding the event JSON
    #[arg(short, long, value_name = "FILE", value_parser = existing_file)]
    pub file: Option<PathBuf>,

    /// Event JSON given inline
    #[arg(short, long, value_name = "JSON")]
    pub string: Option<String>,
}

impl EventArgs {
    /// The event text, read from the file when one was given.
    pub fn event(&self) -> Result<String> {
        match (&self.file, &self.string) {
            (Some(path), _) => std::fs::read_to_string(path)
                .with_context(|| format!("reading event file {}", path.display())),
            (None, Some(event)) => Ok(event.clone()),
            (None, None) => anyhow::bail!("no event given"),
        }
    }
}

impl Cli {
    pub fn invoke_config(&self) -> InvokeConfig {
        let defaults = InvokeConfig::default();
        let address = resolve_address(self.address.clone(), self.lambda_server_port.clone())
            .unwrap_or(defaults.address);
        InvokeConfig::new(address).execution_limit(Duration::from_secs(self.execution_limit))
    }
}

/// An explicit address wins, then `localhost:$_LAMBDA_SERVER_PORT`.
pub fn resolve_address(address: Option<String>, server_port: Option<String>) -> Option<String> {
    address
        .filter(|a| !a.is_empty())
        .or_else(|| {
            server_port
                .filter(|p| !p.is_empty())
                .map(|port| format!("localhost:{port}"))
        })
}

fn parse_port(value: &str) -> std::result::Result<u16, String> {
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("port must be exactly four digits, got {value:?}"));
    }
    value.parse().map_err(|e| format!("invalid port {value:?}: {e}"))
}

fn existing_file(value: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("file {value} does not exist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("8080"), Ok(8080));
        assert_eq!(parse_port("0300"), Ok(300));
        assert!(parse_port("80").is_err());
        assert!(parse_port("80800").is_err());
        assert!(parse_port("80a0").is_err());
    }

    #[test]
    fn test_resolve_address() {
        assert_eq!(
            resolve_address(Some("10.0.0.1:9000".into()), Some("8001".into())),
            Some("10.0.0.1:9000".to_string())
        );
        assert_eq!(
            resolve_address(None, Some("8001".into())),
            Some("localhost:8001".to_string())
        );
        assert_eq!(resolve_address(None, None), None);
    }

    #[test]
    fn test_event_flags_are_exclusive() {
        let result = Cli::try_parse_from(["lambda-local", "event", "-s", "{}", "-f", "Cargo.toml"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["lambda-local", "event"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_event_string() {
        let cli = Cli::try_parse_from(["lambda-local", "-p", "-e", "30", "event", "-s", "{\"a\":1}"]).unwrap();
        assert!(cli.parse_json);
        assert_eq!(cli.invoke_config().execution_limit, Duration::from_secs(30));
        match cli.command {
            CliCommand::Event(args) => assert_eq!(args.event().unwrap(), "{\"a\":1}"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_api_rejects_missing_template() {
        let result = Cli::try_parse_from(["lambda-local", "api", "-t", "/nonexistent/template.yaml"]);
        assert!(result.is_err());
    }
}
