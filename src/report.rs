use crate::{
    engine::{GpuReport, SmokeTest},
    inspect::{ImageKind, PdfInspection},
    util::now_rfc3339,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const RULE: &str = "--------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Converted this run; image writes that failed are counted separately.
    Processed { image_failures: usize },
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTally {
    pub discovered: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DirTally {
    fn add(&mut self, outcome: Outcome) {
        self.discovered += 1;
        match outcome {
            Outcome::Processed { .. } => self.processed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started: String,
    pub finished: Option<String>,
    pub total_dirs: usize,
    pub totals: DirTally,
    pub image_failures: usize,
    pub dirs: BTreeMap<String, DirTally>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started: now_rfc3339(),
            finished: None,
            total_dirs: 0,
            totals: DirTally::default(),
            image_failures: 0,
            dirs: BTreeMap::new(),
        }
    }

    pub fn enter_dir(&mut self, rel: &str) {
        self.total_dirs += 1;
        self.dirs.entry(rel.to_string()).or_default();
    }

    pub fn record(&mut self, rel: &str, outcome: Outcome) {
        self.dirs.entry(rel.to_string()).or_default().add(outcome);
        self.totals.add(outcome);
        if let Outcome::Processed { image_failures } = outcome {
            self.image_failures += image_failures;
        }
    }

    pub fn dir(&self, rel: &str) -> Option<&DirTally> {
        self.dirs.get(rel)
    }

    /// `(processed + skipped) / discovered` in percent; `None` when nothing was found.
    pub fn completion_rate(&self) -> Option<f64> {
        let t = &self.totals;
        (t.discovered > 0).then(|| (t.processed + t.skipped) as f64 / t.discovered as f64 * 100.0)
    }

    pub fn finish(&mut self) {
        self.finished = Some(now_rfc3339());
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.totals;
        writeln!(f, "Processing Summary:")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Directories processed: {}", self.total_dirs)?;
        writeln!(f, "Total PDF files: {}", t.discovered)?;
        writeln!(f, "Successfully processed: {}", t.processed + t.skipped)?;
        writeln!(f, "Newly processed: {}", t.processed)?;
        writeln!(f, "Already completed (skipped): {}", t.skipped)?;
        writeln!(f, "Failed: {}", t.failed)?;
        if self.image_failures > 0 {
            writeln!(f, "Image write failures: {}", self.image_failures)?;
        }
        if let Some(rate) = self.completion_rate() {
            writeln!(
                f,
                "Processing rate: {}/{} ({rate:.1}%)",
                t.processed + t.skipped,
                t.discovered
            )?;
        }
        Ok(())
    }
}

pub fn display_rel(rel: &str) -> &str {
    if rel.is_empty() { "." } else { rel }
}

/// First-pass view of the input tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Survey {
    pub input: String,
    pub total_dirs: usize,
    pub total_pdfs: usize,
    pub dirs: Vec<SurveyDir>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyDir {
    pub rel: String,
    pub files: Vec<String>,
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input Structure Analysis: {}", self.input)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Total directories: {}", self.total_dirs)?;
        writeln!(f, "Total PDF files: {}", self.total_pdfs)?;
        if !self.dirs.is_empty() {
            writeln!(f, "\nDirectories:")?;
        }
        for d in &self.dirs {
            writeln!(f, "  * {} ({} PDFs)", display_rel(&d.rel), d.files.len())?;
            for file in &d.files {
                writeln!(f, "    - {file}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for GpuReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PyTorch version: {}", self.torch_version)?;
        writeln!(f, "CUDA available: {}", self.cuda_available)?;
        writeln!(
            f,
            "CUDA version: {}",
            self.cuda_version.as_deref().unwrap_or("N/A")
        )?;
        writeln!(f, "CUDA devices count: {}", self.device_count)?;
        writeln!(f)?;
        match (self.cuda_available, self.current_device, &self.device_name) {
            (true, Some(dev), Some(name)) => {
                writeln!(f, "Current device: {dev}")?;
                writeln!(f, "Device name: {name}")?;
            }
            (true, _, _) => writeln!(f, "Device details unavailable")?,
            (false, _, _) => writeln!(f, "No CUDA GPU available. Using CPU.")?,
        }
        writeln!(f)?;
        write_smoke(f, "PyTorch basic functionality test", &self.tensor_test)?;
        if let Some(gpu) = &self.gpu_test {
            write_smoke(f, "GPU functionality test", gpu)?;
        }
        writeln!(f)?;
        writeln!(f, "=== Conclusion ===")?;
        if self.gpu_ready() {
            writeln!(f, "Recommendation: Use GPU-accelerated scripts for better performance.")?;
            writeln!(f, "Your system is ready for GPU-based processing.")?;
        } else {
            writeln!(f, "Recommendation: Use CPU-only scripts as no GPU is available.")?;
            writeln!(f, "Your system will use CPU for all processing tasks.")?;
        }
        Ok(())
    }
}

impl GpuReport {
    pub fn gpu_ready(&self) -> bool {
        self.cuda_available
    }
}

fn write_smoke(f: &mut fmt::Formatter<'_>, label: &str, test: &SmokeTest) -> fmt::Result {
    if test.ok {
        writeln!(f, "{label} passed.")
    } else {
        writeln!(
            f,
            "{label} failed: {}",
            test.error.as_deref().unwrap_or("unknown error")
        )
    }
}

/// Image census across a set of PDFs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectionReport {
    pub input: String,
    pub files: Vec<PdfInspection>,
    pub failures: Vec<InspectionFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionFailure {
    pub path: String,
    pub error: String,
}

impl InspectionReport {
    pub fn total_images(&self) -> usize {
        self.files.iter().map(|f| f.raster_images).sum()
    }
}

impl fmt::Display for InspectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            writeln!(f, "Analyzing PDF: {}", file.path)?;
            writeln!(f, "{}", "=".repeat(60))?;
            writeln!(f, "PDF contains {} pages", file.page_count)?;
            writeln!(f)?;
            for page in &file.pages {
                writeln!(f, "Page {}: {} images", page.page, page.images.len())?;
                for (i, img) in page.images.iter().enumerate() {
                    writeln!(f, "  Image {}:", i + 1)?;
                    writeln!(f, "    Format: {}", img.format)?;
                    writeln!(f, "    Dimensions: {}x{}", img.width, img.height)?;
                    writeln!(f, "    Size: {:.2} KB", img.bytes as f64 / 1024.0)?;
                    writeln!(f, "    XREF: {}", img.object)?;
                    match img.kind {
                        ImageKind::Raster => writeln!(f, "    Type: Raster")?,
                        ImageKind::Vector => writeln!(f, "    Type: Vector (Form XObject)")?,
                    }
                    writeln!(f)?;
                }
            }
            writeln!(f, "{}", "=".repeat(60))?;
            writeln!(f, "Total images found: {}", file.raster_images)?;
            if file.vector_images > 0 {
                writeln!(f, "Vector forms found: {}", file.vector_images)?;
            }
            writeln!(f)?;
        }
        for fail in &self.failures {
            writeln!(f, "Error analyzing {}: {}", fail.path, fail.error)?;
        }
        writeln!(f, "=== Final Summary ===")?;
        writeln!(
            f,
            "Total PDF files analyzed: {}",
            self.files.len() + self.failures.len()
        )?;
        writeln!(f, "Total images found: {}", self.total_images())
    }
}
