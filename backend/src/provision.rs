use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use log::{error, info, warn};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{ModelSpec, ModelsConfig};
use crate::inference::{Ensemble, InferenceError, load_classifier};

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("download of model {model} failed: {source}")]
    Http {
        model: String,
        source: reqwest::Error,
    },
    #[error("download of model {model} returned HTTP {status}")]
    Status { model: String, status: u16 },
    #[error("model {model} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        model: String,
        expected: String,
        actual: String,
    },
    #[error("model {model} not found at {path} and no url is configured")]
    MissingArtifact { model: String, path: String },
}

/// A model file on local disk, ready to be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    pub name: String,
    pub path: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProvisionError + '_ {
    move |source| ProvisionError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// In-memory counterpart of [`hash_file`]: lowercase hex SHA-256 of `data`.
pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Streams a file through SHA-256 without loading it whole.
pub async fn hash_file(path: &Path) -> Result<String, ProvisionError> {
    let mut file = fs::File::open(path).await.map_err(io_error(path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buffer).await.map_err(io_error(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn check_digest(spec: &ModelSpec, actual: &str) -> Result<(), ProvisionError> {
    match &spec.sha256 {
        Some(expected) if !expected.eq_ignore_ascii_case(actual) => {
            Err(ProvisionError::ChecksumMismatch {
                model: spec.name.clone(),
                expected: expected.to_ascii_lowercase(),
                actual: actual.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Makes sure every configured model is present on disk and matches its checksum.
///
/// Missing artifacts with a `url` are downloaded; anything that cannot be
/// provided or verified aborts with an error so the server never starts with
/// a partial or corrupt ensemble.
pub async fn ensure_models(
    config: &ModelsConfig,
    client: &reqwest::Client,
) -> Result<Vec<ModelArtifact>, ProvisionError> {
    fs::create_dir_all(&config.dir)
        .await
        .map_err(io_error(&config.dir))?;

    let mut artifacts = Vec::with_capacity(config.members.len());
    for spec in &config.members {
        let path = spec.path_in(&config.dir);

        if fs::try_exists(&path).await.map_err(io_error(&path))? {
            info!("Model {} already present at {}", spec.name, path.display());
            if spec.sha256.is_some() {
                let actual = hash_file(&path).await?;
                check_digest(spec, &actual)?;
            } else {
                warn!("Model {} has no sha256 configured; skipping verification", spec.name);
            }
        } else {
            match &spec.url {
                Some(url) => download(spec, url, &path, client).await?,
                None => {
                    return Err(ProvisionError::MissingArtifact {
                        model: spec.name.clone(),
                        path: path.display().to_string(),
                    });
                }
            }
        }

        artifacts.push(ModelArtifact {
            name: spec.name.clone(),
            path,
        });
    }
    Ok(artifacts)
}

async fn download(
    spec: &ModelSpec,
    url: &str,
    path: &Path,
    client: &reqwest::Client,
) -> Result<(), ProvisionError> {
    info!("Downloading model {} from {}", spec.name, url);
    let http_error = |source: reqwest::Error| ProvisionError::Http {
        model: spec.name.clone(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_error)?;
    if !response.status().is_success() {
        return Err(ProvisionError::Status {
            model: spec.name.clone(),
            status: response.status().as_u16(),
        });
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    // Nothing but the final rename may leave a file behind.
    if let Err(e) = write_verified(spec, response, &partial).await {
        discard(&partial).await;
        return Err(e);
    }

    fs::rename(&partial, path).await.map_err(io_error(path))?;
    info!("Model {} saved to {}", spec.name, path.display());
    Ok(())
}

async fn write_verified(
    spec: &ModelSpec,
    response: reqwest::Response,
    partial: &Path,
) -> Result<(), ProvisionError> {
    let mut file = fs::File::create(partial).await.map_err(io_error(partial))?;
    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| ProvisionError::Http {
            model: spec.name.clone(),
            source,
        })?;
        hasher.update(&chunk);
        file.write_all(&chunk).await.map_err(io_error(partial))?;
    }
    file.flush().await.map_err(io_error(partial))?;
    drop(file);

    check_digest(spec, &hex::encode(hasher.finalize()))
}

async fn discard(partial: &Path) {
    match fs::remove_file(partial).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            error!("Failed to remove partial download {}: {}", partial.display(), e);
        }
        _ => {}
    }
}

/// Loads every artifact; any failure aborts instead of serving a smaller ensemble.
pub fn load_ensemble(artifacts: &[ModelArtifact]) -> Result<Ensemble, InferenceError> {
    let mut members = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let model = load_classifier(&artifact.name, &artifact.path)?;
        info!("Loaded model {} from {}", artifact.name, artifact.path.display());
        members.push(model);
    }
    Ensemble::new(members)
}
