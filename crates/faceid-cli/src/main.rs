use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use faceid_capture::{CaptureRegion, CaptureSession, FileFrameSource};
use faceid_core::{
    Config, ConfigError, DirectoryGallery, GallerySource, OnnxPairScorer, VerificationReport,
    Verifier,
};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

mod dbus_client;

const EXIT_UNVERIFIED: u8 = 1;
const EXIT_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "faceid", about = "One-shot face verification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a probe image against the enrolled gallery
    Verify {
        #[command(flatten)]
        overrides: Overrides,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
        /// Ask the running faceidd instead of loading the model in-process.
        /// The daemon uses its own configuration, so per-call overrides are rejected.
        #[arg(
            long,
            conflicts_with_all = ["probe", "gallery", "model", "detection_threshold", "verification_threshold"]
        )]
        daemon: bool,
        /// With --daemon, capture a fresh probe before verifying
        #[arg(long, requires = "daemon")]
        capture: bool,
    },
    /// Crop a camera frame and store it as the probe
    Capture {
        /// Frame image written by the camera helper
        #[arg(long)]
        frame: PathBuf,
        /// Where to write the probe
        #[arg(long)]
        probe: Option<PathBuf>,
    },
    /// List gallery references in scoring order
    Gallery {
        #[arg(long)]
        gallery: Option<PathBuf>,
    },
    /// Show daemon status
    Status,
}

/// Per-invocation settings layered over the environment for in-process verification.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Probe image (defaults to the configured probe location)
    #[arg(long)]
    probe: Option<PathBuf>,
    /// Gallery directory of reference images
    #[arg(long)]
    gallery: Option<PathBuf>,
    /// Siamese ONNX model
    #[arg(long)]
    model: Option<PathBuf>,
    /// Per-pair score a comparison must exceed to count as positive
    #[arg(long)]
    detection_threshold: Option<f32>,
    /// Proportion of positives that must be exceeded to verify
    #[arg(long)]
    verification_threshold: Option<f32>,
}

impl Overrides {
    /// The flag standing in for a `FACEID_*` variable, if given.
    fn lookup(&self, key: &str) -> Option<String> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().into_owned());
        match key {
            "FACEID_PROBE_PATH" => path(&self.probe),
            "FACEID_GALLERY_DIR" => path(&self.gallery),
            "FACEID_MODEL_PATH" => path(&self.model),
            "FACEID_DETECTION_THRESHOLD" => self.detection_threshold.map(|t| t.to_string()),
            "FACEID_VERIFICATION_THRESHOLD" => self.verification_threshold.map(|t| t.to_string()),
            _ => None,
        }
    }

    /// Load configuration with flags taking precedence over `env`. Validation
    /// runs once, on the combined values.
    fn load_config(&self, env: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        Config::from_sources(|key| self.lookup(key).or_else(|| env(key)))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Verify {
            overrides,
            json,
            daemon,
            capture,
        } => {
            let report = if daemon {
                let raw = if capture {
                    dbus_client::verify().await?
                } else {
                    dbus_client::verify_probe().await?
                };
                serde_json::from_str(&raw).context("daemon returned a malformed report")?
            } else {
                let config = overrides.load_config(|key| std::env::var(key).ok())?;
                verify_local(&config)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }
            Ok(if report.result.is_verified() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_UNVERIFIED)
            })
        }
        Commands::Capture { frame, probe } => {
            let config = Config::load()?;
            let probe = probe.unwrap_or(config.probe_path.clone());
            let mut session = CaptureSession::new(
                FileFrameSource::new(frame),
                CaptureRegion::from(&config.capture),
                probe,
                config.capture.dark_ratio,
            );
            let path = session.capture_probe()?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Gallery { gallery } => {
            let dir = match gallery {
                Some(g) => g,
                None => Config::load()?.gallery_dir,
            };
            let images = DirectoryGallery::new(&dir).list_images()?;
            if images.is_empty() {
                println!("No reference images in {}", dir.display());
            }
            for image in &images {
                println!("{}", image.name());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let status = dbus_client::status().await?;
            let value: serde_json::Value =
                serde_json::from_str(&status).context("daemon returned malformed status")?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn verify_local(config: &Config) -> Result<VerificationReport> {
    tracing::debug!(model = %config.model_path.display(), "loading scorer in-process");
    let scorer = OnnxPairScorer::load(&config.model_path, config.scorer_threads)?;
    let mut verifier = Verifier::new(scorer, config.thresholds)?;
    let gallery = DirectoryGallery::new(&config.gallery_dir);
    verifier
        .verify(&config.probe_path, &gallery)
        .map_err(|e| anyhow::anyhow!("{}: {e}", e.kind()))
}

/// Human-readable verdict with every per-reference score.
fn render_report(report: &VerificationReport) -> String {
    let result = &report.result;
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.label());
    let _ = writeln!(
        out,
        "  positives: {}/{} ({:.2})",
        result.positive_count(),
        result.raw_scores().len(),
        result.positive_proportion()
    );
    let _ = writeln!(
        out,
        "  thresholds: detection {:.2}, verification {:.2}",
        report.thresholds.detection, report.thresholds.verification
    );
    let _ = writeln!(out, "  scores:");
    for (reference, score) in report.references.iter().zip(result.raw_scores().iter()) {
        let _ = writeln!(out, "    {reference}: {score:.4}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn verify_overrides(args: &[&str]) -> Overrides {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Verify { overrides, .. } => overrides,
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn test_daemon_rejects_local_overrides() {
        for flag in [
            ["--probe", "/tmp/p.jpg"],
            ["--gallery", "/tmp/g"],
            ["--model", "/tmp/m.onnx"],
            ["--detection-threshold", "0.9"],
            ["--verification-threshold", "0.9"],
        ] {
            let args = ["faceid", "verify", "--daemon", flag[0], flag[1]];
            let err = Cli::try_parse_from(args).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict, "{flag:?}");
        }
    }

    #[test]
    fn test_daemon_alone_parses() {
        assert!(Cli::try_parse_from(["faceid", "verify", "--daemon", "--capture", "--json"]).is_ok());
        assert!(Cli::try_parse_from(["faceid", "verify", "--capture"]).is_err());
    }

    #[test]
    fn test_flag_overrides_invalid_env_threshold() {
        let overrides = verify_overrides(&["faceid", "verify", "--detection-threshold", "0.7"]);
        let config = overrides
            .load_config(env_of(&[
                ("HOME", "/h"),
                ("FACEID_DETECTION_THRESHOLD", "1.5"),
            ]))
            .unwrap();
        assert_eq!(config.thresholds.detection, 0.7);

        let config = overrides
            .load_config(env_of(&[
                ("HOME", "/h"),
                ("FACEID_DETECTION_THRESHOLD", "high"),
            ]))
            .unwrap();
        assert_eq!(config.thresholds.detection, 0.7);
    }

    #[test]
    fn test_invalid_env_threshold_without_flag_fails() {
        let overrides = verify_overrides(&["faceid", "verify"]);
        let result = overrides.load_config(env_of(&[
            ("HOME", "/h"),
            ("FACEID_VERIFICATION_THRESHOLD", "1.5"),
        ]));
        assert!(matches!(result, Err(ConfigError::Threshold(_))));
    }

    #[test]
    fn test_path_flags_override_env() {
        let overrides = verify_overrides(&[
            "faceid",
            "verify",
            "--probe",
            "/p/probe.jpg",
            "--gallery",
            "/p/gallery",
            "--model",
            "/p/model.onnx",
        ]);
        let config = overrides
            .load_config(env_of(&[("HOME", "/h"), ("FACEID_GALLERY_DIR", "/env/gallery")]))
            .unwrap();
        assert_eq!(config.probe_path, PathBuf::from("/p/probe.jpg"));
        assert_eq!(config.gallery_dir, PathBuf::from("/p/gallery"));
        assert_eq!(config.model_path, PathBuf::from("/p/model.onnx"));
    }

    #[test]
    fn test_render_report_lists_scores_per_reference() {
        let report: VerificationReport = serde_json::from_value(serde_json::json!({
            "attempt_id": "6f1c1f0e-8a4b-4c39-9f34-2a6b7c1d9e01",
            "completed_at": "2026-10-16T12:00:00Z",
            "probe": null,
            "references": ["a.jpg", "b.jpg", "c.jpg"],
            "thresholds": { "detection": 0.5, "verification": 0.5 },
            "result": {
                "raw_scores": [0.91, 0.5, 0.875],
                "positive_count": 2,
                "positive_proportion": 0.6666667,
                "verified": true
            }
        }))
        .unwrap();

        let text = render_report(&report);

        assert!(text.starts_with("Verified\n"));
        assert!(text.contains("  positives: 2/3 (0.67)\n"));
        assert!(text.contains("    a.jpg: 0.9100\n"));
        assert!(text.contains("    b.jpg: 0.5000\n"));
        assert!(text.contains("    c.jpg: 0.8750\n"));
    }
}
