use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub scan: Scan,
    #[serde(default)]
    pub convert: Convert,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Resolve the directory convention against a project root.
    ///
    /// `root_override` wins over `paths.root`; an empty `paths.root` means the
    /// current working directory. Relative sub-paths hang off the root,
    /// absolute ones are kept as-is.
    pub fn layout(&self, root_override: Option<&Path>) -> Result<Layout> {
        let root = match root_override {
            Some(p) => p.to_path_buf(),
            None if !self.paths.root.trim().is_empty() => PathBuf::from(&self.paths.root),
            None => std::env::current_dir().with_context(|| "current_dir")?,
        };
        Ok(Layout {
            input: root.join(&self.paths.input_dir),
            output: root.join(&self.paths.output_dir),
            models: root.join(&self.paths.models_dir),
            scripts: root.join(&self.paths.scripts_dir),
            root,
        })
    }
}

/// Concrete directories for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub root: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub models: PathBuf,
    pub scripts: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub print_summary: bool,
    pub check_models_on_start: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            check_models_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub root: String,
    pub input_dir: String,
    pub output_dir: String,
    pub models_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            root: "".into(),
            input_dir: "pdf/input".into(),
            output_dir: "pdf/output".into(),
            models_dir: "models".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scan {
    pub include_root: bool,
    pub follow_links: bool,
}
impl Default for Scan {
    fn default() -> Self {
        Self {
            include_root: true,
            follow_links: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Convert {
    /// 0 = half of the detected cores.
    pub max_workers: usize,
    pub max_batch_size: usize,
    pub image_extraction_mode: String,
    pub jpeg_quality: u8,
    pub text_extension: String,
    pub images_suffix: String,
}
impl Default for Convert {
    fn default() -> Self {
        Self {
            max_workers: 0,
            max_batch_size: 4,
            image_extraction_mode: "highres".into(),
            jpeg_quality: 90,
            text_extension: "md".into(),
            images_suffix: "_images".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub python_exe: String,
    pub doctor_timeout_seconds: u64,
    pub prepare_timeout_seconds: u64,
    pub convert_timeout_seconds: u64,
    pub gpu_timeout_seconds: u64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            python_exe: "auto".into(),
            doctor_timeout_seconds: 120,
            prepare_timeout_seconds: 0,
            convert_timeout_seconds: 0,
            gpu_timeout_seconds: 120,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_python_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
            dump_effective_config: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            pin_scripts_dir: true,
        }
    }
}
