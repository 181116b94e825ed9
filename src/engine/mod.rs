pub mod python;
pub mod types;

use anyhow::Result;

pub use types::{ConvertIn, ConvertOut, DocDiag, GpuReport, ImagePayload, PrepareOut, SmokeTest};

/// The out-of-process collaborators: document converter and numeric runtime.
pub trait Engine {
    fn doctor(&self) -> Result<DocDiag>;
    fn gpu_report(&self) -> Result<GpuReport>;
    /// Load (downloading if needed) the converter's models into the model dir.
    fn prepare_models(&self) -> Result<PrepareOut>;
    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut>;
}
