mod config;
mod inspect;
mod logging;
mod statsd;

use clap::{Args, Parser};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "courier", version, about = "Session file login and bulk message relay")]
enum CliCommand {
    /// Run the HTTP gateway
    Serve(ServeArgs),
    /// Decode a session file and print what it contains
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// YAML config file. Without one, configuration is read from the environment.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    /// Session file: Telethon SQLite database, string session, or exported JSON
    file: PathBuf,
    /// Print the full record as JSON, auth key included
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    match CliCommand::parse() {
        CliCommand::Serve(args) => serve(args),
        CliCommand::Inspect(args) => match inspect::inspect(&args.file, args.json) {
            Ok(output) => {
                println!("{}", output.trim_end());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn serve(args: ServeArgs) -> ExitCode {
    let config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    };
    let config = match config.and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = logging::init(config.common.logging.as_ref());

    if let Err(e) = statsd::init(config.common.metrics.as_ref()) {
        tracing::error!(error = %e, "could not set up metrics");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "could not start runtime");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Starting gateway");
    match runtime.block_on(gateway::run(config.gateway)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gateway stopped");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli() {
        CliCommand::command().debug_assert();

        let cli = CliCommand::try_parse_from(["courier", "serve", "--config", "courier.yaml"]).unwrap();
        assert!(matches!(cli, CliCommand::Serve(ServeArgs { config: Some(p) }) if p == PathBuf::from("courier.yaml")));

        let cli = CliCommand::try_parse_from(["courier", "inspect", "me.session", "--json"]).unwrap();
        assert!(matches!(cli, CliCommand::Inspect(InspectArgs { json: true, .. })));

        assert!(CliCommand::try_parse_from(["courier", "inspect"]).is_err());
    }
}
