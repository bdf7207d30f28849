//! glTF texture transcoder and GPU memory estimator CLI

use clap::{Parser, Subcommand};
use gltex_core::{
    estimate, format_bytes, transcode_file, Document, ProcessEncoder, TargetFormat, TranscodeConfig,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gltex")]
#[command(about = "Role-aware texture transcoding and GPU memory estimation for glTF models.")]
#[command(version = concat!("v", env!("CARGO_PKG_VERSION")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (TOML). Command-line values take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-encode every embedded texture with role-specific settings
    Transcode {
        /// Input model (.glb or .gltf)
        input: PathBuf,
        /// Output model; .glb writes a binary container, anything else .gltf + .bin
        output: PathBuf,
        /// Encoder quality (0-100). Default 80
        quality: Option<u8>,
        /// Output image format: avif or webp
        #[arg(long)]
        format: Option<String>,
        /// Encoder speed (0-10). Default 2
        #[arg(long)]
        speed: Option<u8>,
    },
    /// Estimate GPU memory for every texture in a model
    Estimate {
        /// Input model (.glb or .gltf)
        input: PathBuf,
        /// Output JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout is reserved for reports.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("gltex_core=debug,gltex=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Transcode {
            input,
            output,
            quality,
            format,
            speed,
        } => {
            let config = resolve_config(cli.config.as_deref(), format.as_deref(), quality, speed)?;
            cmd_transcode(&input, &output, &config)
        }
        Commands::Estimate { input, json } => cmd_estimate(&input, json),
    }
}

/// Load the config file (if any) and apply command-line overrides on top.
fn resolve_config(
    path: Option<&Path>,
    format: Option<&str>,
    quality: Option<u8>,
    speed: Option<u8>,
) -> Result<TranscodeConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => TranscodeConfig::load(path)?,
        None => TranscodeConfig::default(),
    };
    if let Some(format) = format {
        config.format = TargetFormat::from_str(format)?;
    }
    if let Some(quality) = quality {
        config.quality = quality;
    }
    if let Some(speed) = speed {
        config.speed = speed;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_transcode(
    input: &Path,
    output: &Path,
    config: &TranscodeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = transcode_file(input, output, config, &ProcessEncoder)?;
    println!(
        "Wrote {} ({} texture(s) transcoded to {}, {} skipped, {} -> {})",
        output.display(),
        summary.transcoded.len(),
        config.format.mime_type(),
        summary.skipped.len(),
        format_bytes(summary.original_bytes() as u64),
        format_bytes(summary.encoded_bytes() as u64),
    );
    Ok(())
}

fn render_estimate(input: &Path, json: bool) -> Result<String, Box<dyn std::error::Error>> {
    let doc = Document::read(input)?;
    let report = estimate(&doc);
    if json {
        Ok(report.to_json()?)
    } else {
        Ok(report.to_text())
    }
}

fn cmd_estimate(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_estimate(input, json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A .gltf with two external PNG images: base color and normal map.
    fn create_test_model() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let albedo = image::RgbaImage::from_raw(64, 32, vec![200u8; 64 * 32 * 4]).unwrap();
        albedo.save(tmp.path().join("albedo.png")).unwrap();
        let normal = image::RgbaImage::from_pixel(16, 16, image::Rgba([128, 128, 255, 255]));
        normal.save(tmp.path().join("normal.png")).unwrap();

        let gltf = serde_json::json!({
            "asset": { "version": "2.0" },
            "images": [
                { "name": "albedo", "uri": "albedo.png" },
                { "name": "normal", "uri": "normal.png" }
            ],
            "textures": [ { "source": 0 }, { "source": 1 } ],
            "materials": [ {
                "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
                "normalTexture": { "index": 1 }
            } ]
        });
        let path = tmp.path().join("model.gltf");
        std::fs::write(&path, serde_json::to_vec_pretty(&gltf).unwrap()).unwrap();
        (tmp, path)
    }

    #[test]
    fn cli_parses_transcode_positionals() {
        let cli = Cli::try_parse_from(["gltex", "transcode", "in.glb", "out.glb", "60"]).unwrap();
        match cli.command {
            Commands::Transcode { quality, format, .. } => {
                assert_eq!(quality, Some(60));
                assert!(format.is_none());
            }
            _ => panic!("expected transcode"),
        }
    }

    #[test]
    fn missing_positional_is_usage_error() {
        let err = Cli::try_parse_from(["gltex", "transcode", "in.glb"]).err().unwrap();
        assert!(err.use_stderr());
        let err = Cli::try_parse_from(["gltex", "estimate"]).err().unwrap();
        assert!(err.use_stderr());
    }

    #[test]
    fn command_line_overrides_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gltex.toml");
        std::fs::write(&path, "format = \"webp\"\nquality = 50\nspeed = 6\n").unwrap();

        let from_file = resolve_config(Some(&path), None, None, None).unwrap();
        assert_eq!(from_file.format, TargetFormat::Webp);
        assert_eq!(from_file.quality, 50);

        let merged = resolve_config(Some(&path), Some("avif"), Some(90), None).unwrap();
        assert_eq!(merged.format, TargetFormat::Avif);
        assert_eq!(merged.quality, 90);
        assert_eq!(merged.speed, 6);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        assert!(resolve_config(None, Some("jpeg"), None, None).is_err());
        assert!(resolve_config(None, None, Some(101), None).is_err());
        assert!(resolve_config(None, None, None, Some(11)).is_err());
    }

    #[test]
    fn estimate_reports_each_texture() {
        let (_tmp, path) = create_test_model();

        let text = render_estimate(&path, false).unwrap();
        assert!(text.contains("albedo"), "{}", text);
        assert!(text.contains("[normalTexture]"), "{}", text);
        assert!(text.contains("Total GPU (high quality)"));

        let json = render_estimate(&path, true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let textures = parsed["textures"].as_array().expect("expected textures array");
        assert_eq!(textures.len(), 2);
        assert_eq!(textures[0]["width"], 64);
        assert_eq!(textures[0]["height"], 32);
        assert_eq!(textures[1]["category"], "normal");
        assert_eq!(parsed["totals"]["uncompressed_bytes"], 64 * 32 * 4 + 16 * 16 * 4);
    }

    #[test]
    fn failed_transcode_writes_nothing() {
        let (tmp, path) = create_test_model();
        let output = tmp.path().join("out.glb");
        let config = TranscodeConfig {
            avifenc: "gltex-no-such-encoder".into(),
            ..TranscodeConfig::default()
        };

        let result = cmd_transcode(&path, &output, &config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("gltex-no-such-encoder"));
        assert!(!output.exists());
    }
}
