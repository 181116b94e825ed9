use crate::{
    completion::Completion,
    config::{Config, Layout},
    convert::{Invoker, ResourceHints},
    document::{Document, WorkItem},
    engine::Engine,
    inspect,
    report::{InspectionFailure, InspectionReport, Outcome, RunSummary, Survey, SurveyDir, display_rel},
    util::{available_cores, ensure_dir},
    walk::{self, DirBatch, WalkOptions},
};
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

pub struct Pipeline<E: Engine> {
    cfg: Config,
    layout: Layout,
    engine: E,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedDir {
    pub rel: String,
    pub items: Vec<PlannedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlannedItem {
    Ready { status: Completion, item: WorkItem },
    Unreadable { path: String, error: String },
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, layout: &Layout, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            layout: layout.clone(),
            engine,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Fail fast when the converter cannot load its models.
    pub fn check_models(&self) -> Result<()> {
        ensure_dir(&self.layout.models)?;
        info!("checking model availability in {}", self.layout.models.display());
        let out = self
            .engine
            .prepare_models()
            .with_context(|| "model availability check")?;
        if !out.ok {
            bail!(
                "model availability check failed: {}",
                out.error.as_deref().unwrap_or("no error reported")
            );
        }
        info!(
            "models are available (cache dir: {})",
            out.model_cache_dir.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    pub fn run(&self) -> Result<RunSummary> {
        let input = require_input(&self.layout)?;
        ensure_dir(&self.layout.output)?;

        if self.cfg.global.check_models_on_start {
            self.check_models()?;
        }

        let hints = ResourceHints::from_config(&self.cfg);
        info!(
            "cpu cores={} converter workers={} batch_size={}",
            available_cores(),
            hints.workers,
            hints.batch_size
        );
        let invoker = Invoker::new(&self.cfg, &self.engine, &self.layout.models, hints);

        let mut summary = RunSummary::new();
        let batches = walk::walk(input, WalkOptions::from_config(&self.cfg)).filter_map(skip_unreadable);
        for batch in batches {
            let rel = rel_string(&batch.rel);
            let out_dir = self.layout.output.join(&batch.rel);
            ensure_dir(&out_dir)?;
            summary.enter_dir(&rel);
            info!("processing directory {}", display_rel(&rel));

            for path in &batch.documents {
                let outcome = self.process_document(&invoker, path, &out_dir);
                summary.record(&rel, outcome);
            }

            if let Some(t) = summary.dir(&rel).filter(|t| t.discovered > 0) {
                info!(
                    "{}: {} newly processed, {} already completed, {} failed",
                    display_rel(&rel),
                    t.processed,
                    t.skipped,
                    t.failed
                );
            }
        }

        summary.finish();
        Ok(summary)
    }

    fn process_document(&self, invoker: &Invoker<'_, E>, path: &Path, out_dir: &Path) -> Outcome {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let doc = match Document::discover(path) {
            Ok(d) => d,
            Err(err) => {
                error!("{name} - cannot open: {err:#}");
                return Outcome::Failed;
            }
        };
        let item = WorkItem::plan(&self.cfg, doc, out_dir);
        let probe = item.probe;

        match item.status() {
            Completion::Complete => {
                info!(
                    "{name} - already processed (images: {}/{})",
                    probe.valid_image_count, probe.expected_images
                );
                return Outcome::Skipped;
            }
            Completion::NeedsImages => info!(
                "{name} - extracting images (found {}, expected {})",
                probe.valid_image_count, probe.expected_images
            ),
            Completion::NeedsText { .. } => info!(
                "{name} - processing (images detected: {})",
                probe.expected_images
            ),
        }

        match invoker.convert(&item) {
            Ok(result) => {
                info!(
                    "{name} - done (text written: {}, images: {} received, {} saved, {} kept, {} failed)",
                    result.text_written,
                    result.images_received,
                    result.images_saved,
                    result.images_kept,
                    result.image_failures.len()
                );
                Outcome::Processed {
                    image_failures: result.image_failures.len(),
                }
            }
            Err(err) => {
                error!("error processing {}: {err}", path.display());
                Outcome::Failed
            }
        }
    }
}

/// Count directories and PDFs across the whole input tree, root included.
pub fn survey(cfg: &Config, layout: &Layout) -> Result<Survey> {
    let input = require_input(layout)?;
    let opts = WalkOptions {
        include_root: true,
        follow_links: cfg.scan.follow_links,
    };
    let mut survey = Survey {
        input: input.display().to_string(),
        ..Default::default()
    };
    for batch in walk::walk(input, opts).filter_map(skip_unreadable) {
        let is_root = batch.rel.as_os_str().is_empty();
        if is_root && batch.documents.is_empty() {
            continue;
        }
        survey.total_dirs += 1;
        survey.total_pdfs += batch.documents.len();
        survey.dirs.push(SurveyDir {
            rel: rel_string(&batch.rel),
            files: batch
                .documents
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
        });
    }
    Ok(survey)
}

/// Discovery and completion detection without converting anything.
pub fn plan(cfg: &Config, layout: &Layout) -> Result<Vec<PlannedDir>> {
    let input = require_input(layout)?;
    let mut out = Vec::new();
    let batches = walk::walk(input, WalkOptions::from_config(cfg)).filter_map(skip_unreadable);
    for batch in batches {
        let out_dir = layout.output.join(&batch.rel);
        let items = batch
            .documents
            .iter()
            .map(|path| match Document::discover(path) {
                Ok(doc) => {
                    let item = WorkItem::plan(cfg, doc, &out_dir);
                    PlannedItem::Ready {
                        status: item.status(),
                        item,
                    }
                }
                Err(err) => PlannedItem::Unreadable {
                    path: path.display().to_string(),
                    error: format!("{err:#}"),
                },
            })
            .collect();
        out.push(PlannedDir {
            rel: rel_string(&batch.rel),
            items,
        });
    }
    Ok(out)
}

/// Log a directory the walker could not read and drop it from the pass.
fn skip_unreadable(batch: Result<DirBatch>) -> Option<DirBatch> {
    batch
        .inspect_err(|err| warn!("skipping unreadable directory: {err:#}"))
        .ok()
}

fn require_input(layout: &Layout) -> Result<&Path> {
    let input = layout.input.as_path();
    if !input.is_dir() {
        return Err(anyhow!("input directory not found: {}", input.display()));
    }
    Ok(input)
}

/// Inspect one PDF, or every PDF under a directory.
pub fn inspect_target(target: &Path, follow_links: bool) -> Result<InspectionReport> {
    let paths = if target.is_file() {
        vec![target.to_path_buf()]
    } else if target.is_dir() {
        walk::discover(target, follow_links)?
    } else {
        bail!("input not found: {}", target.display());
    };

    let mut report = InspectionReport {
        input: target.display().to_string(),
        ..Default::default()
    };
    for path in paths {
        match inspect::inspect_pdf(&path) {
            Ok(i) => report.files.push(i),
            Err(err) => {
                warn!("error analyzing {}: {err:#}", path.display());
                report.failures.push(InspectionFailure {
                    path: path.display().to_string(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
    Ok(report)
}

fn rel_string(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
