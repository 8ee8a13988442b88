//! Sends a local image to a running server and prints the JSON reply.
//!
//! Usage: `predict-client <image-path> [url]`

use std::path::Path;
use std::process::ExitCode;

use reqwest::multipart::{Form, Part};

const DEFAULT_URL: &str = "http://127.0.0.1:5002/predict";

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

async fn send(path: &Path, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let part = Part::bytes(bytes).file_name(file_name).mime_str(mime_for(path))?;
    let form = Form::new().part("file", part);

    println!("Sending image to {}...", url);
    let response = reqwest::Client::new().post(url).multipart(form).send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    println!("\nServer response ({}):", status);
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        eprintln!("usage: predict-client <image-path> [url]");
        return ExitCode::from(2);
    };
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());

    let path = Path::new(&image_path);
    if !path.exists() {
        eprintln!("Error: test image not found at {}", path.display());
        return ExitCode::FAILURE;
    }

    match send(path, &url).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Request to {} failed: {}", url, e);
            eprintln!("\nError: could not get a prediction from {}: {}", url, e);
            ExitCode::FAILURE
        }
    }
}
