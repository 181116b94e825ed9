use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocDiag {
    pub python_exe: String,
    pub python_version: String,
    pub marker_version: Option<String>,
    pub torch_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeTest {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuReport {
    pub torch_version: String,
    pub cuda_available: bool,
    #[serde(default)]
    pub cuda_version: Option<String>,
    pub device_count: u32,
    #[serde(default)]
    pub current_device: Option<u32>,
    #[serde(default)]
    pub device_name: Option<String>,
    pub tensor_test: SmokeTest,
    /// Absent when no accelerator is available.
    #[serde(default)]
    pub gpu_test: Option<SmokeTest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareOut {
    pub ok: bool,
    #[serde(default)]
    pub model_cache_dir: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertIn {
    pub input_pdf: String,
    pub model_dir: String,
    pub max_workers: usize,
    pub batch_size: usize,
    pub extract_images: bool,
    pub image_extraction_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOut {
    pub ok: bool,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub meta: serde_json::Value,
    #[serde(default)]
    pub images: BTreeMap<String, ImagePayload>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One rendered image as shipped back by the converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImagePayload {
    /// Encoded file bytes, base64 for transport.
    Bytes { data: String },
    /// Decoded pixels (base64) in a PIL-style mode such as `RGB` or `RGBA`.
    Bitmap {
        mode: String,
        width: u32,
        height: u32,
        pixels: String,
    },
    DataUri { uri: String },
    #[serde(other)]
    Unknown,
}
