use crate::{
    completion::is_valid_file,
    config::Config,
    document::WorkItem,
    engine::{ConvertIn, Engine, ImagePayload},
    payload,
    util::available_cores,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Parallelism hints handed to the converter; it schedules its own work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHints {
    pub workers: usize,
    pub batch_size: usize,
}

impl ResourceHints {
    /// Half the cores (at least one), batches no larger than `max_batch`.
    pub fn from_cores(cores: usize, max_batch: usize) -> Self {
        Self::with_workers((cores / 2).max(1), max_batch)
    }

    pub fn from_config(cfg: &Config) -> Self {
        if cfg.convert.max_workers > 0 {
            Self::with_workers(cfg.convert.max_workers, cfg.convert.max_batch_size)
        } else {
            Self::from_cores(available_cores(), cfg.convert.max_batch_size)
        }
    }

    fn with_workers(workers: usize, max_batch: usize) -> Self {
        Self {
            workers,
            batch_size: max_batch.min(workers).max(1),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionResult {
    pub text_written: bool,
    pub images_received: usize,
    pub images_saved: usize,
    /// Already present and non-empty, left untouched.
    pub images_kept: usize,
    pub image_failures: Vec<ImageFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("converter failed: {0:#}")]
    Engine(anyhow::Error),
    #[error("converter reported failure: {0}")]
    Rejected(String),
    #[error("{action} {}: {err}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        err: std::io::Error,
    },
}

/// Runs the converter for one work item and persists what is missing.
pub struct Invoker<'a, E: Engine> {
    cfg: &'a Config,
    engine: &'a E,
    model_dir: PathBuf,
    hints: ResourceHints,
}

impl<'a, E: Engine> Invoker<'a, E> {
    pub fn new(cfg: &'a Config, engine: &'a E, model_dir: &Path, hints: ResourceHints) -> Self {
        Self {
            cfg,
            engine,
            model_dir: model_dir.to_path_buf(),
            hints,
        }
    }

    pub fn convert(&self, item: &WorkItem) -> Result<ConversionResult, ConvertError> {
        let artifacts = &item.artifacts;
        std::fs::create_dir_all(&artifacts.dir).map_err(|err| ConvertError::Io {
            action: "create output dir",
            path: artifacts.dir.clone(),
            err,
        })?;

        let req = ConvertIn {
            input_pdf: item.document.path.display().to_string(),
            model_dir: self.model_dir.display().to_string(),
            max_workers: self.hints.workers,
            batch_size: self.hints.batch_size,
            extract_images: item.probe.needs_images,
            image_extraction_mode: self.cfg.convert.image_extraction_mode.clone(),
        };
        info!(
            "converting {} workers={} batch_size={} extract_images={}",
            req.input_pdf, req.max_workers, req.batch_size, req.extract_images
        );

        let out = self.engine.convert(&req).map_err(ConvertError::Engine)?;
        if !out.ok {
            return Err(ConvertError::Rejected(
                out.error.unwrap_or_else(|| "ok=false without error".to_string()),
            ));
        }

        let mut result = ConversionResult {
            text_written: write_once(&artifacts.text, out.markdown.as_bytes())?,
            images_received: out.images.len(),
            ..Default::default()
        };
        if result.text_written {
            info!("saved markdown {}", artifacts.text.display());
        } else {
            info!("markdown already exists {}", artifacts.text.display());
        }

        if !item.probe.needs_images {
            debug!("images already extracted; skipping image output");
        } else if out.images.is_empty() {
            info!("converter returned no images for {}", req.input_pdf);
        } else {
            self.save_images(&artifacts.images, &out.images, &mut result)?;
        }

        Ok(result)
    }

    fn save_images(
        &self,
        dir: &Path,
        images: &BTreeMap<String, ImagePayload>,
        result: &mut ConversionResult,
    ) -> Result<(), ConvertError> {
        std::fs::create_dir_all(dir).map_err(|err| ConvertError::Io {
            action: "create image dir",
            path: dir.to_path_buf(),
            err,
        })?;

        for (name, payload) in images {
            let Some(file_name) = image_file_name(name) else {
                warn!("rejecting image name {name:?}");
                result.image_failures.push(ImageFailure {
                    name: name.clone(),
                    error: "invalid image name".to_string(),
                });
                continue;
            };
            let target = dir.join(file_name);
            if is_valid_file(&target) {
                result.images_kept += 1;
                continue;
            }
            let written = payload::to_bytes(payload, self.cfg.convert.jpeg_quality)
                .map_err(|e| e.to_string())
                .and_then(|bytes| std::fs::write(&target, bytes).map_err(|e| e.to_string()));
            match written {
                Ok(()) => result.images_saved += 1,
                Err(error) => {
                    warn!("error saving image {name}: {error}");
                    result.image_failures.push(ImageFailure {
                        name: name.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "saved {}/{} images to {}",
            result.images_saved,
            images.len(),
            dir.display()
        );
        Ok(())
    }
}

/// Create `path` with `bytes` unless it already exists. Returns whether it wrote.
fn write_once(path: &Path, bytes: &[u8]) -> Result<bool, ConvertError> {
    let io_err = |err: std::io::Error| ConvertError::Io {
        action: "write",
        path: path.to_path_buf(),
        err,
    };
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(io_err(err)),
    };
    file.write_all(bytes).map_err(io_err)?;
    Ok(true)
}

/// Final path component only, so a payload name cannot leave the image dir.
fn image_file_name(name: &str) -> Option<&str> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
}
