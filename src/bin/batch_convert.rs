//! Batch converter: turn a folder of RAW files into JPEGs, written next
//! to the originals.

use dotenvy::dotenv;
use raw_convert_backend::config::ConverterConfig;
use raw_convert_backend::services::pipeline;
use raw_convert_backend::utils::validation::{is_raw_extension, output_filename};
use std::env;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batch_convert=info,raw_convert_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("📷 Starting RAW Batch Converter...");

    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let config = ConverterConfig::from_env();

    let mut files: Vec<(PathBuf, String)> = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && is_raw_extension(name) {
            files.push((path.clone(), name.to_string()));
        }
    }

    if files.is_empty() {
        info!(
            "No RAW files found in {}. Point the tool at a folder of photos.",
            dir.display()
        );
        return Ok(());
    }

    info!("Found {} photos to convert...", files.len());

    let mut converted = 0usize;
    for (path, name) in files {
        info!("Processing {}...", name);
        let payload = match std::fs::read(&path) {
            Ok(data) => bytes::Bytes::from(data),
            Err(e) => {
                error!("❌ Could not read {}: {}", name, e);
                continue;
            }
        };
        match pipeline::convert_upload(&config, &name, payload, config.default_quality).await {
            Ok(result) => {
                let output = path.with_file_name(output_filename(&name));
                std::fs::write(&output, &result.jpeg)?;
                info!("✅ Saved: {} ({})", output.display(), result.camera.model);
                converted += 1;
            }
            Err(e) => error!("❌ Error converting {}: {}", name, e),
        }
    }

    info!("🏁 Conversion complete! {} file(s) written.", converted);
    Ok(())
}
