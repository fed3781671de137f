//! fanrun CLI - runs a lookup concurrently across many inputs.

use std::io::BufRead;

use clap::{ArgAction, Args, Parser, Subcommand};
use fanrun_core::{CancellationToken, Inputs, RunConfig, TaskRunner};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod output;
mod resolve;

use output::{OutputFormat, WriterPipeline};
use resolve::Family;

/// fanrun - concurrent fan-out over a list of inputs
#[derive(Parser)]
#[command(name = "fanrun")]
#[command(about = "Run a lookup concurrently across many inputs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve host names, one lookup per host
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// Host names to resolve (localhost if none)
    hosts: Vec<String>,

    /// Read host names from stdin, one per line
    #[arg(long, conflicts_with = "hosts")]
    stdin: bool,

    /// Port attached to every resolved address
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Address family to keep
    #[arg(long, value_enum, default_value_t = Family::Any)]
    family: Family,

    /// Report failed lookups on stderr
    #[arg(long, env = "FANRUN_WRITE_ERRORS")]
    write_errors: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Resolve(args) => {
            resolve_hosts(args).await?;
        }
    }

    Ok(())
}

async fn resolve_hosts(args: ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = if args.stdin {
        Inputs::Piped(read_lines(std::io::stdin().lock())?)
    } else if args.hosts.is_empty() {
        Inputs::None
    } else {
        Inputs::Named(args.hosts)
    };

    // Lookups are best-effort unless errors are asked for.
    let config = RunConfig::default().with_write_errors(args.write_errors);
    let runner = TaskRunner::new(config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping invocation");
            on_interrupt.cancel();
        }
    });

    let (port, family) = (args.port, args.family);
    let mut pipeline = WriterPipeline::stdio(args.format);

    let summary = runner
        .invoke(
            inputs,
            move |host| resolve::resolve(host, port, family),
            &mut pipeline,
            resolve::deliver_lookup,
            &cancel,
        )
        .await;

    if let Err(e) = pipeline.flush() {
        if !e.is_lifecycle() {
            warn!(error = %e, "Failed to flush output");
        }
    }

    info!(
        delivered = summary.delivered,
        errors_reported = summary.errors_reported,
        errors_discarded = summary.errors_discarded,
        stopped = summary.stopped,
        "Resolve finished"
    );

    Ok(())
}

/// Non-empty trimmed lines of `reader`.
fn read_lines(reader: impl BufRead) -> std::io::Result<Vec<String>> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            items.push(line.to_string());
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_lines_skips_blanks() {
        let input = "db-1\n\n  web-2  \n\t\ncache\n";
        let items = read_lines(input.as_bytes()).unwrap();
        assert_eq!(items, vec!["db-1", "web-2", "cache"]);
    }

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::try_parse_from([
            "fanrun", "resolve", "a", "b", "--port", "443", "--family", "v4", "--write-errors",
        ])
        .unwrap();

        let Commands::Resolve(args) = cli.command;
        assert_eq!(args.hosts, vec!["a", "b"]);
        assert_eq!(args.port, 443);
        assert_eq!(args.family, Family::V4);
        assert!(args.write_errors);
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn test_stdin_conflicts_with_hosts() {
        let result = Cli::try_parse_from(["fanrun", "resolve", "a", "--stdin"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
