//! # OralCanvas CLI
//!
//! Renders and inspects stored canvas snapshots.

use clap::Parser;
use oral_canvas_cli::{inspect, render, CliArgs, Command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,oral_canvas=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,oral_canvas=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    match args.command {
        Command::Render(args) => {
            let summary = render(&args).await?;
            println!(
                "{} ({}x{}, {} bytes, {} elements)",
                summary.output.display(),
                summary.width,
                summary.height,
                summary.bytes,
                summary.elements
            );
            for failure in &summary.failed {
                eprintln!("missing image: {}", failure.src);
            }
        }
        Command::Inspect(args) => {
            let inspection = inspect(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
            } else {
                println!("{inspection}");
            }
        }
    }
    Ok(())
}
