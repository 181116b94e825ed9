use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where one document's artifacts live under the output tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub text: PathBuf,
    pub images: PathBuf,
}

impl ArtifactPaths {
    /// `<out_dir>/<id>/<id>.<ext>` and `<out_dir>/<id>/<id><suffix>/`.
    pub fn new(cfg: &Config, out_dir: &Path, id: &str) -> Self {
        let dir = out_dir.join(id);
        Self {
            text: dir.join(format!("{id}.{}", cfg.convert.text_extension)),
            images: dir.join(format!("{id}{}", cfg.convert.images_suffix)),
            dir,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionProbe {
    pub needs_text: bool,
    pub needs_images: bool,
    pub valid_image_count: usize,
    pub expected_images: usize,
}

/// What the driver has to do for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Complete,
    NeedsText { with_images: bool },
    NeedsImages,
}

impl CompletionProbe {
    pub fn status(&self) -> Completion {
        match (self.needs_text, self.needs_images) {
            (false, false) => Completion::Complete,
            (true, with_images) => Completion::NeedsText { with_images },
            (false, true) => Completion::NeedsImages,
        }
    }
}

/// Probe existing output for a document expected to carry `expected` images.
pub fn detect(text_path: &Path, image_dir: &Path, expected: usize) -> CompletionProbe {
    let valid_image_count = count_valid_images(image_dir);
    CompletionProbe {
        needs_text: !text_path.exists(),
        needs_images: expected > 0 && valid_image_count < expected,
        valid_image_count,
        expected_images: expected,
    }
}

/// Regular files (symlinks followed) directly under `dir` with non-zero size.
pub fn count_valid_images(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!("cannot read image dir {}: {err}", dir.display());
            }
            return 0;
        }
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| is_valid_file(&e.path()))
        .count()
}

pub fn is_valid_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_flags() {
        let mut p = CompletionProbe {
            needs_text: false,
            needs_images: false,
            valid_image_count: 0,
            expected_images: 0,
        };
        assert_eq!(p.status(), Completion::Complete);
        p.needs_images = true;
        assert_eq!(p.status(), Completion::NeedsImages);
        p.needs_text = true;
        assert_eq!(p.status(), Completion::NeedsText { with_images: true });
    }

    #[test]
    fn artifact_layout() {
        let cfg = Config::default();
        let a = ArtifactPaths::new(&cfg, Path::new("out/sub"), "report");
        assert_eq!(a.dir, Path::new("out/sub/report"));
        assert_eq!(a.text, Path::new("out/sub/report/report.md"));
        assert_eq!(a.images, Path::new("out/sub/report/report_images"));
    }
}
