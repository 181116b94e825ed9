use crate::{
    completion::{self, ArtifactPaths, Completion, CompletionProbe},
    config::Config,
    inspect, sanitize,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub raw_name: String,
    pub id: String,
    pub expected_images: usize,
}

impl Document {
    /// Open the PDF once to count its embedded raster images.
    pub fn discover(path: &Path) -> Result<Self> {
        let expected_images = inspect::count_images(path)?;
        Ok(Self::with_image_count(path, expected_images))
    }

    pub fn with_image_count(path: &Path, expected_images: usize) -> Self {
        let raw_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            id: sanitize::document_id(path),
            raw_name,
            expected_images,
        }
    }
}

/// A document plus what is still missing from its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub document: Document,
    pub artifacts: ArtifactPaths,
    pub probe: CompletionProbe,
}

impl WorkItem {
    pub fn plan(cfg: &Config, document: Document, out_dir: &Path) -> Self {
        let artifacts = ArtifactPaths::new(cfg, out_dir, &document.id);
        let probe = completion::detect(&artifacts.text, &artifacts.images, document.expected_images);
        Self {
            document,
            artifacts,
            probe,
        }
    }

    pub fn status(&self) -> Completion {
        self.probe.status()
    }
}
