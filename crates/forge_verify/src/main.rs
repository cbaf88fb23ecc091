use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use forge_core::certificate::MarginPolicy;
use forge_core::{engine, logging};
use std::io::{self, Read, Write};

/// Reads one verification request on stdin and writes one JSON result line on stdout.
#[derive(Parser, Debug)]
#[command(name = "forge_verify", version, about)]
struct Cli {
    /// Safety margin `r` used by the decay certificate.
    #[arg(long, value_enum)]
    margin: Margin,

    /// Log filter used when RUST_LOG is unset. Logs go to stderr.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Margin {
    /// r = 0
    Zero,
    /// r = max(t0 - tmin, tmax - t0)
    HalfWidth,
}

impl From<Margin> for MarginPolicy {
    fn from(margin: Margin) -> Self {
        match margin {
            Margin::Zero => MarginPolicy::Zero,
            Margin::HalfWidth => MarginPolicy::IntervalHalfWidth,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .context("failed to read request from stdin")?;

    let result = engine::handle(&input, cli.margin.into());
    let line = serde_json::to_string(&result).context("failed to encode result")?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}").context("failed to write result")?;
    stdout.flush()?;
    Ok(())
}
