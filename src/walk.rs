use crate::config::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Yield the input root itself as a batch (relative path "").
    pub include_root: bool,
    pub follow_links: bool,
}

impl WalkOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            include_root: cfg.scan.include_root,
            follow_links: cfg.scan.follow_links,
        }
    }
}

/// PDFs found directly inside one directory of the input tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirBatch {
    pub rel: PathBuf,
    pub dir: PathBuf,
    pub documents: Vec<PathBuf>,
}

/// Lazily walk `root` one directory at a time, in sorted order.
///
/// Every directory is yielded, including those without PDFs, so callers can
/// mirror the tree. Re-invoking restarts from scratch.
pub fn walk(root: &Path, opts: WalkOptions) -> impl Iterator<Item = Result<DirBatch>> + '_ {
    WalkDir::new(root)
        .follow_links(opts.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    return Some(Err(anyhow::Error::new(err)
                        .context(format!("walking {}", root.display()))));
                }
            };
            if !entry.file_type().is_dir() {
                return None;
            }
            if entry.depth() == 0 && !opts.include_root {
                return None;
            }
            Some(batch_for(root, entry.path()))
        })
}

/// Every PDF in the tree, root included.
pub fn discover(root: &Path, follow_links: bool) -> Result<Vec<PathBuf>> {
    let opts = WalkOptions {
        include_root: true,
        follow_links,
    };
    let mut out = Vec::new();
    for batch in walk(root, opts) {
        out.extend(batch?.documents);
    }
    Ok(out)
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn batch_for(root: &Path, dir: &Path) -> Result<DirBatch> {
    let rel = dir.strip_prefix(root).unwrap_or(dir).to_path_buf();
    let mut documents = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read_dir entry in {}", dir.display()))?
            .path();
        if is_pdf(&path) && path.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(DirBatch {
        rel,
        dir: dir.to_path_buf(),
        documents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_ignores_case() {
        assert!(is_pdf(Path::new("a/B.PDF")));
        assert!(is_pdf(Path::new("c.Pdf")));
        assert!(!is_pdf(Path::new("d.pdf.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }
}
