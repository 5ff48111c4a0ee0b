//! Callsample - CLI Entry Point
//!
//! Inspect and validate recorded sample documents.

use anyhow::Result;
use callsample::SampleDocument;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "callsample",
    about = "Inspect and validate recorded sample documents",
    version
)]
struct Args {
    /// Path to a sample document (.json, .yaml or .yml)
    file: PathBuf,

    /// Validate the document and exit without printing call records
    #[arg(long)]
    validate: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "warn")]
    log_level: Level,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let document = SampleDocument::read(&args.file)?;

    if args.validate {
        println!(
            "Document is valid ({} sample(s), {} call(s))",
            document.samples.len(),
            document.samples.values().map(|entry| entry.calls.len()).sum::<usize>()
        );
        return Ok(());
    }

    println!("version: {}", document.version);
    for (sample_id, entry) in &document.samples {
        println!("{sample_id}: {} ({} call(s))", entry.method, entry.calls.len());
        for (index, call) in entry.calls.iter().enumerate() {
            let args: Vec<String> = call
                .args
                .iter()
                .map(|arg| serde_json::to_string(arg).unwrap_or_else(|_| "?".to_string()))
                .collect();
            let returns =
                serde_json::to_string(&call.returns).unwrap_or_else(|_| "?".to_string());
            println!("  [{index}] ({}) -> {returns}", args.join(", "));
        }
    }

    Ok(())
}
