use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use sas_dates::cli::{Cli, Commands};
use sas_dates::{dates, output, schema, Result};

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the dates or the JSON
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command() {
        Commands::Dates { input } => {
            dates::print_dates(&input)?;
        }
        Commands::Schema { input, out } => {
            let schema = schema::extract_schema(&input)?;
            if let Some(out_path) = out {
                output::write_json_file(&schema, &out_path)?;
                eprintln!("Schema written to: {}", out_path.display());
            } else {
                output::write_json_stdout(&schema)?;
            }
        }
    }

    Ok(())
}
