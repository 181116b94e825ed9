use super::{Engine, types::*};
use crate::config::{Config, Layout};
use anyhow::{Context, Result, anyhow};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MARKER_RUNNER: &str = "marker_runner.py";
const GPU_PROBE: &str = "gpu_probe.py";

/// Drives the Python helper scripts over JSON stdin/stdout.
///
/// The model directory is fixed at construction and sent with every
/// converter request; the runner applies it before Marker is imported.
pub struct PythonEngine {
    cfg: Config,
    scripts_dir: PathBuf,
    model_dir: PathBuf,
    python_exe: PathBuf,
}

impl PythonEngine {
    pub fn new(cfg: &Config, layout: &Layout) -> Result<Self> {
        let scripts_dir = layout.scripts.clone();
        if cfg.security.pin_scripts_dir {
            let root = layout
                .root
                .canonicalize()
                .with_context(|| format!("canonicalize root: {}", layout.root.display()))?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&root) {
                return Err(anyhow!(
                    "scripts_dir is outside the project root while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        for script in [MARKER_RUNNER, GPU_PROBE] {
            let path = scripts_dir.join(script);
            if !path.exists() {
                return Err(anyhow!("missing script: {}", path.display()));
            }
        }
        let python_exe = resolve_python_exe(&cfg.engine.python_exe, &layout.root);
        Ok(Self {
            cfg: cfg.clone(),
            scripts_dir,
            model_dir: layout.models.clone(),
            python_exe,
        })
    }

    fn script(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
        &self,
        script: &Path,
        input: &I,
        timeout_seconds: u64,
    ) -> Result<O> {
        let timeout = (timeout_seconds > 0).then(|| Duration::from_secs(timeout_seconds));
        debug!("python run {} timeout={:?}", script.display(), timeout);
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(script);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (k, v) in &self.cfg.engine.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python: {}", script.display()))?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let bytes = serde_json::to_vec(input)?;
            use std::io::Write;
            stdin.write_all(&bytes)?;
            stdin.flush().ok();
        }

        let output = match timeout {
            Some(t) => wait_with_timeout(&mut child, t)?,
            None => child
                .wait_with_output()
                .with_context(|| "waiting for python")?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "python script failed: {}\n{}",
                script.display(),
                stderr
            ));
        }

        if self.cfg.debug.keep_python_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("python stderr {}: {}", script.display(), stderr.trim());
        }

        let out: O = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing python JSON output: {}", script.display()))?;
        Ok(out)
    }
}

/// `auto` tries `$PDFMILL_PYTHON`, then the project's `venv`/`.venv`, then
/// `python3` on PATH.
pub fn resolve_python_exe(raw: &str, root: &Path) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("PDFMILL_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        for venv in ["venv", ".venv"] {
            for rel in ["bin/python", "Scripts/python.exe"] {
                let candidate = root.join(venv).join(rel);
                if candidate.exists() {
                    return candidate;
                }
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl Engine for PythonEngine {
    fn doctor(&self) -> Result<DocDiag> {
        let script = self.script(MARKER_RUNNER);
        self.run_json(
            &script,
            &serde_json::json!({"cmd": "doctor", "model_dir": self.model_dir}),
            self.cfg.engine.doctor_timeout_seconds,
        )
    }

    fn gpu_report(&self) -> Result<GpuReport> {
        let script = self.script(GPU_PROBE);
        self.run_json(
            &script,
            &serde_json::json!({}),
            self.cfg.engine.gpu_timeout_seconds,
        )
    }

    fn prepare_models(&self) -> Result<PrepareOut> {
        let script = self.script(MARKER_RUNNER);
        let out: PrepareOut = self.run_json(
            &script,
            &serde_json::json!({"cmd": "prepare", "model_dir": self.model_dir}),
            self.cfg.engine.prepare_timeout_seconds,
        )?;
        if !out.ok {
            warn!("model preparation returned ok=false");
        }
        Ok(out)
    }

    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut> {
        let script = self.script(MARKER_RUNNER);
        let out: ConvertOut = self.run_json(
            &script,
            &serde_json::json!({"cmd": "convert", "req": req}),
            self.cfg.engine.convert_timeout_seconds,
        )?;
        if !out.ok {
            warn!("marker convert returned ok=false for {}", req.input_pdf);
        }
        Ok(out)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting; a chatty model download would otherwise block
    // the child on a full stdout/stderr buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("python process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "python process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_python_is_kept() {
        let p = resolve_python_exe("/opt/py/bin/python3", Path::new("/nowhere"));
        assert_eq!(p, PathBuf::from("/opt/py/bin/python3"));
    }

    #[test]
    fn auto_prefers_project_venv() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = tmp.path().join("venv").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("python"), b"").unwrap();
        if std::env::var("PDFMILL_PYTHON").is_err() {
            assert_eq!(resolve_python_exe("auto", tmp.path()), bin.join("python"));
        }
    }
}
