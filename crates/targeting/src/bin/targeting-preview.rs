//! targeting-preview — validate a targeting rule tree from the command line.
//!
//! Reads a raw rule tree (JSON array) from a file or stdin and prints
//! the warnings, the flattened ACL rows and the compiled limitation
//! expression without touching any storage.

use std::fs;
use std::io::Read;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use adlimit_targeting::validate;

/// Validate a targeting rule tree and print the compiled expression.
#[derive(Parser, Debug)]
#[command(name = "targeting-preview", version, about)]
struct Cli {
    /// Path to the rule tree JSON file, or "-" for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// Emit the full preview payload as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let raw = if cli.input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read rule tree from stdin")?;
        buf
    } else {
        fs::read_to_string(&cli.input).with_context(|| format!("read {}", cli.input))?
    };

    let nodes: Vec<serde_json::Value> =
        serde_json::from_str(&raw).context("rule tree must be a JSON array")?;
    let out = validate(&nodes);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if out.warnings.is_empty() {
        println!("warnings: none");
    } else {
        println!("warnings:");
        for w in &out.warnings {
            println!("  - {w}");
        }
    }

    println!("acl rows:");
    for row in &out.acl_preview {
        println!(
            "  {:>3}. {} {} {} {}",
            row.execution_order,
            row.logical.as_str(),
            row.rule_type,
            row.comparison.as_str(),
            row.data
        );
    }

    println!("compiled: {}", out.compiled);
    Ok(())
}
