//! # OralCanvas CLI
//!
//! Host-side companion to the embedded canvas. Renders a stored snapshot
//! off-screen with the same compositor the WebViewer uses, and summarizes
//! snapshots without rendering them.
//!
//! ## Usage
//!
//! ```bash
//! oral-canvas render chart.json -o chart.png --asset-root ./web
//! oral-canvas inspect chart.json --json
//! ```
//!
//! Options can also come from `ORAL_CANVAS_*` environment variables.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use oral_canvas_core::{CanvasConfig, ExportFormat, FitPolicy, LicenseTier, Snapshot};
use oral_canvas_renderer::{CanvasSession, LoadFailure};
use serde::Serialize;

/// Command-line arguments for oral-canvas.
#[derive(Debug, Clone, Parser)]
#[command(name = "oral-canvas")]
#[command(about = "Render and inspect OralCanvas snapshots")]
#[command(version)]
pub struct CliArgs {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Render a snapshot to an image file.
    Render(RenderArgs),
    /// Print a summary of a snapshot.
    Inspect(InspectArgs),
}

/// Arguments of `render`.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Snapshot JSON file.
    pub snapshot: PathBuf,

    /// Output image path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Canvas width in pixels (default: from config, else 800)
    #[arg(long, env = "ORAL_CANVAS_WIDTH")]
    pub width: Option<u32>,

    /// Canvas height in pixels (default: from config, else 600)
    #[arg(long, env = "ORAL_CANVAS_HEIGHT")]
    pub height: Option<u32>,

    /// Image encoding, `png` or `jpeg` (default: from the output extension)
    #[arg(long)]
    pub format: Option<ExportFormat>,

    /// Directory that asset paths in the snapshot resolve against.
    #[arg(long, env = "ORAL_CANVAS_ASSET_ROOT")]
    pub asset_root: Option<PathBuf>,

    /// License tier used for the background check.
    #[arg(long, env = "ORAL_CANVAS_LICENSE_TIER")]
    pub license_tier: Option<LicenseTier>,

    /// Canvas configuration JSON file.
    #[arg(long, env = "ORAL_CANVAS_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments of `inspect`.
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Snapshot JSON file.
    pub snapshot: PathBuf,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Read a snapshot file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a snapshot.
pub fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    Snapshot::from_json(&json).with_context(|| format!("Invalid snapshot {}", path.display()))
}

/// Build the canvas configuration for `render`.
///
/// Starts from the config file (or defaults), then applies command-line
/// overrides. Recovery is always off: rendering must not touch the host's
/// recovery record.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or the result is
/// invalid.
pub fn load_config(args: &RenderArgs) -> anyhow::Result<CanvasConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            CanvasConfig::from_json(&json)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => CanvasConfig::default(),
    };

    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(root) = &args.asset_root {
        config.asset_root.clone_from(root);
    }
    if let Some(tier) = args.license_tier {
        config.license_tier = tier;
    }
    config.export_format = args
        .format
        .or_else(|| format_from_extension(&args.output))
        .unwrap_or(config.export_format);
    config.recovery_dir = None;

    config.validate()?;
    Ok(config)
}

fn format_from_extension(path: &Path) -> Option<ExportFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
}

/// Result of `render`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSummary {
    /// Written file.
    pub output: PathBuf,
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Encoded size in bytes.
    pub bytes: usize,
    /// Elements rendered.
    pub elements: usize,
    /// Images that could not be loaded.
    pub failed: Vec<LoadFailure>,
}

/// Render a snapshot and write the flattened image.
///
/// Missing images do not fail the render; they are reported in
/// [`RenderSummary::failed`], and a missing background shows as white.
///
/// # Errors
///
/// Returns an error if the snapshot or config is invalid, or if encoding or
/// writing the image fails.
pub async fn render(args: &RenderArgs) -> anyhow::Result<RenderSummary> {
    let snapshot = read_snapshot(&args.snapshot)?;
    let config = load_config(args)?;
    let (width, height, format) = (config.width, config.height, config.export_format);

    tracing::info!(
        "Rendering {} at {width}x{height} from {}",
        args.snapshot.display(),
        config.asset_root.display()
    );

    let elements = snapshot.element_count();
    let mut session = CanvasSession::new(config)?;
    session.import(snapshot);
    let report = session.settle().await;
    for failure in &report.failed {
        tracing::warn!("Could not load {}: {}", failure.src, failure.reason);
    }

    let bytes = session.export_image()?;
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::debug!("Wrote {} bytes as {}", bytes.len(), format.mime_type());

    Ok(RenderSummary {
        output: args.output.clone(),
        width,
        height,
        bytes: bytes.len(),
        elements,
        failed: report.failed,
    })
}

/// Summary of a snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    /// Producer format version.
    pub version: String,
    /// Producing session.
    pub session_id: String,
    /// Export time, milliseconds since the epoch.
    pub timestamp: u64,
    /// Freehand strokes.
    pub strokes: usize,
    /// Stamps.
    pub stamps: usize,
    /// Text labels.
    pub labels: usize,
    /// Background image source.
    pub background: String,
    /// Background fit policy.
    pub fit: FitPolicy,
}

impl From<&Snapshot> for Inspection {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            version: snapshot.version.clone(),
            session_id: snapshot.session_id.clone(),
            timestamp: snapshot.timestamp,
            strokes: snapshot.strokes.len(),
            stamps: snapshot.stamps.len(),
            labels: snapshot.labels.len(),
            background: abbreviate(&snapshot.background.src),
            fit: snapshot.background.options,
        }
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version:    {}", self.version)?;
        writeln!(f, "session:    {}", self.session_id)?;
        writeln!(f, "timestamp:  {}", self.timestamp)?;
        writeln!(f, "strokes:    {}", self.strokes)?;
        writeln!(f, "stamps:     {}", self.stamps)?;
        writeln!(f, "labels:     {}", self.labels)?;
        write!(
            f,
            "background: {} ({:?}, aspect {})",
            self.background,
            self.fit.fit_method,
            if self.fit.maintain_aspect_ratio { "kept" } else { "ignored" }
        )
    }
}

/// Summarize a snapshot file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a snapshot.
pub fn inspect(args: &InspectArgs) -> anyhow::Result<Inspection> {
    let snapshot = read_snapshot(&args.snapshot)?;
    Ok(Inspection::from(&snapshot))
}

fn abbreviate(src: &str) -> String {
    const MAX: usize = 64;
    if src.chars().count() <= MAX {
        src.to_string()
    } else {
        let head: String = src.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r##"{
        "strokes": [{"id": "s1", "path": [{"x": 1, "y": 1, "type": "moveTo"}, {"x": 30, "y": 30, "type": "lineTo"}], "color": "#ff0000", "lineWidth": 4}],
        "stamps": [{"id": "p1", "src": "Tool/Stamps/hook.svg", "x": 40, "y": 40, "width": 16, "height": 16}],
        "labels": [],
        "background": {"src": "Tool/DefaultBack.svg", "options": {"maintainAspectRatio": true, "fitMethod": "cover"}},
        "version": "4.0",
        "sessionId": "chart-7",
        "timestamp": 1700000000000
    }"##;

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><rect width="8" height="8" fill="#336699"/></svg>"##;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Tool/Stamps")).unwrap();
        std::fs::write(dir.path().join("Tool/DefaultBack.svg"), SVG).unwrap();
        std::fs::write(dir.path().join("Tool/Stamps/hook.svg"), SVG).unwrap();
        std::fs::write(dir.path().join("chart.json"), SNAPSHOT).unwrap();
        dir
    }

    fn render_args(dir: &Path, output: &str) -> RenderArgs {
        let args = CliArgs::try_parse_from([
            "oral-canvas",
            "render",
            dir.join("chart.json").to_str().unwrap(),
            "-o",
            dir.join(output).to_str().unwrap(),
            "--width",
            "64",
            "--height",
            "48",
            "--asset-root",
            dir.to_str().unwrap(),
        ])
        .unwrap();
        match args.command {
            Command::Render(args) => args,
            Command::Inspect(_) => panic!("expected render"),
        }
    }

    #[test]
    fn test_parse_inspect() {
        let args = CliArgs::try_parse_from(["oral-canvas", "inspect", "chart.json", "--json"]).unwrap();
        match args.command {
            Command::Inspect(inspect) => {
                assert_eq!(inspect.snapshot, PathBuf::from("chart.json"));
                assert!(inspect.json);
            }
            Command::Render(_) => panic!("expected inspect"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        let result = CliArgs::try_parse_from([
            "oral-canvas", "render", "a.json", "-o", "a.png", "--format", "gif",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_overrides() {
        let dir = workspace();
        let args = render_args(dir.path(), "chart.jpg");
        let config = load_config(&args).unwrap();
        assert_eq!((config.width, config.height), (64, 48));
        assert_eq!(config.export_format, ExportFormat::Jpeg);
        assert_eq!(config.asset_root, dir.path());
        assert!(config.recovery_dir.is_none());
    }

    #[test]
    fn test_config_file_is_base() {
        let dir = workspace();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"width": 300, "licenseTier": "premium", "jpegQuality": 70}"#).unwrap();
        let mut args = render_args(dir.path(), "chart.png");
        args.width = None;
        args.config = Some(path);

        let config = load_config(&args).unwrap();
        assert_eq!((config.width, config.height), (300, 48));
        assert_eq!(config.license_tier, LicenseTier::Premium);
        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.export_format, ExportFormat::Png);
    }

    #[test]
    fn test_zero_size_rejected() {
        let dir = workspace();
        let mut args = render_args(dir.path(), "chart.png");
        args.width = Some(0);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_inspect_counts() {
        let dir = workspace();
        let inspection = inspect(&InspectArgs {
            snapshot: dir.path().join("chart.json"),
            json: false,
        })
        .unwrap();
        assert_eq!((inspection.strokes, inspection.stamps, inspection.labels), (1, 1, 0));
        assert_eq!(inspection.session_id, "chart-7");
        assert_eq!(inspection.background, "Tool/DefaultBack.svg");
        assert!(inspection.to_string().contains("Cover"));
    }

    #[test]
    fn test_inspect_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = inspect(&InspectArgs {
            snapshot: dir.path().join("nope.json"),
            json: true,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_abbreviate_long_data_uri() {
        let src = format!("data:image/png;base64,{}", "A".repeat(200));
        let short = abbreviate(&src);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), 67);
    }

    #[tokio::test]
    async fn test_render_writes_png() {
        let dir = workspace();
        let args = render_args(dir.path(), "chart.png");
        let summary = render(&args).await.unwrap();

        assert_eq!(summary.elements, 2);
        assert!(summary.failed.is_empty());
        let bytes = std::fs::read(dir.path().join("chart.png")).unwrap();
        assert_eq!(bytes.len(), summary.bytes);
        assert_eq!(&bytes[0..4], &[137, 80, 78, 71]);
    }

    #[tokio::test]
    async fn test_render_reports_missing_stamp() {
        let dir = workspace();
        std::fs::remove_file(dir.path().join("Tool/Stamps/hook.svg")).unwrap();
        let args = render_args(dir.path(), "chart.jpeg");
        let summary = render(&args).await.unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].src, "Tool/Stamps/hook.svg");
        let bytes = std::fs::read(dir.path().join("chart.jpeg")).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }
}
