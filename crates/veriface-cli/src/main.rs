use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use veriface_core::engine::{self, EngineError};
use veriface_core::frame::Frame;
use veriface_core::quality;
use veriface_core::verifier::VerifyRequest;
use veriface_core::{Config, ImageSource, Verifier};

#[derive(Parser)]
#[command(name = "veriface", about = "Face verification against an identity document photo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a live capture against a document photo
    Verify {
        /// Live camera capture
        camera: PathBuf,
        /// Photo extracted from the identity document
        document: PathBuf,
        /// Embedding distance tolerance override (lower is stricter)
        #[arg(short, long)]
        tolerance: Option<f32>,
        /// Subject metadata attached to the record, as key=value
        #[arg(short, long = "subject", value_parser = parse_key_val)]
        subject: Vec<(String, String)>,
    },
    /// Run the quality gate on a single image
    Quality {
        /// Image to inspect
        image: PathBuf,
    },
    /// Locate face regions in a single image
    Detect {
        /// Image to scan
        image: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            camera,
            document,
            tolerance,
            subject,
        } => {
            let handle = engine::spawn_engine(&config)?;
            let request = VerifyRequest {
                tolerance,
                subject: subject.into_iter().collect::<BTreeMap<_, _>>(),
            };
            let outcome = handle
                .verify(
                    ImageSource::Path(camera),
                    ImageSource::Path(document),
                    request,
                )
                .await;
            match outcome {
                Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                Err(EngineError::Verify(failure)) => {
                    println!("{}", serde_json::to_string_pretty(&failure.to_json())?);
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Quality { image } => {
            let frame = Frame::from_path(&image)?;
            let report = quality::validate(&frame, &config.quality);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                std::process::exit(1);
            }
        }
        Commands::Detect { image } => {
            let mut verifier = Verifier::new(&config)?;
            match verifier.locate_faces(&ImageSource::Path(image)) {
                Ok(faces) => {
                    let body = serde_json::json!({
                        "face_count": faces.len(),
                        "faces": faces,
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(failure) => {
                    println!("{}", serde_json::to_string_pretty(&failure.to_json())?);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
