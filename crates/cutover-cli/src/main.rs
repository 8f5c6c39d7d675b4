//! cutover CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cutover_cli::cli::{Cli, Commands, LogFormat};
use cutover_cli::commands::{
    DnsCommand, MongoConnectionsCommand, MongoPrimaryCommand, MongoSizeCommand, ScaleCommand, SecretCommand,
    ToolsCommand, UptimeCommand,
};
use cutover_cli::output::OutputFormat;
use cutover_cli::settings::{Context, Settings};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Default filter for a `-v` count; `RUST_LOG` wins when set.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), cutover_cli::CliError> {
    let settings = Settings::load_optional(cli.config.as_deref())?.with_overrides(&cli);
    let context = Context::new(settings);
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Tools => {
            let cmd = ToolsCommand::new(&context);
            cmd.execute(&mut stdout, &format).await?;
        }
        Commands::Dns(args) => {
            let cmd = DnsCommand::new(&context);
            cmd.execute(&mut stdout, &format, args).await?;
        }
        Commands::Uptime(args) => {
            let cmd = UptimeCommand::new(&context);
            cmd.execute(&mut stdout, &format, args).await?;
        }
        Commands::Secret(args) => {
            let cmd = SecretCommand::new(&context);
            cmd.execute(&mut stdout, &format, args).await?;
        }
        Commands::MongoConnections(args) => {
            let cmd = MongoConnectionsCommand::new(&context);
            cmd.execute(&mut stdout, &format, args).await?;
        }
        Commands::MongoSize(args) => {
            let cmd = MongoSizeCommand::new(&context);
            cmd.execute(&mut stdout, &format, args).await?;
        }
        Commands::MongoPrimary(args) => {
            let cmd = MongoPrimaryCommand::new(&context);
            cmd.execute(&mut stdout, &format, args).await?;
        }
        Commands::Scale(args) => {
            let cmd = ScaleCommand::new(&context);
            cmd.execute(&mut stdout, &format, args).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(0), "warn");
        assert_eq!(default_filter(1), "info");
        assert_eq!(default_filter(2), "debug");
        assert_eq!(default_filter(7), "trace");
    }

    #[test]
    fn test_cli_parse_uptime() {
        let cli = Cli::parse_from(["cutover", "uptime", "https://shop.example.com/health", "--static-ip", "10.1.2.3"]);
        let Commands::Uptime(args) = cli.command else {
            unreachable!("parsed uptime");
        };
        assert_eq!(args.urls, ["https://shop.example.com/health"]);
        assert_eq!(args.static_ip.as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn test_cli_log_format() {
        let cli = Cli::parse_from(["cutover", "--log-format", "json", "tools"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
