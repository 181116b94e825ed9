use crate::{
    config::{Config, Layout},
    engine::{Engine, python::PythonEngine},
    pipeline::{self, Pipeline},
    util::{ensure_dir, looks_like_url},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdfmill")]
#[command(about = "Resumable PDF to Markdown batch orchestrator (Marker + image census + GPU report)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pdfmill.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Project root holding pdf/input, pdf/output, models and scripts.
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the converter toolkit can be imported.
    Doctor {},
    /// Report accelerator availability of the numeric runtime.
    Gpu {
        #[arg(long)]
        json: bool,
    },
    /// Report images embedded in PDFs.
    Inspect {
        /// PDF file or directory; defaults to the input tree.
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show what `run` would do without converting.
    Plan {
        #[arg(long)]
        json: bool,
    },
    /// Convert every PDF that still lacks Markdown or images.
    Run {
        #[arg(long)]
        json: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(p) => Config::load(&p)?,
        None => Config::default(),
    };
    let layout = cfg.layout(args.root.as_deref())?;
    let log_path = resolve_log_path(&cfg, &layout);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg, &layout),
        Command::Gpu { json } => gpu(&cfg, &layout, *json),
        Command::Inspect { input, json } => inspect(&cfg, &layout, input.as_deref(), *json),
        Command::Plan { json } => plan(&cfg, &layout, *json),
        Command::Run { json } => run(&cfg, &layout, *json),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["pdfmill.toml", "pdfmill.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config, layout: &Layout) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(layout.output.join("pdfmill.log"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn doctor(cfg: &Config, layout: &Layout) -> Result<()> {
    let engine = PythonEngine::new(cfg, layout)?;
    let diag = engine.doctor()?;
    print_json(&diag)
}

fn gpu(cfg: &Config, layout: &Layout, json: bool) -> Result<()> {
    let engine = PythonEngine::new(cfg, layout)?;
    info!("checking numeric runtime and GPU configuration");
    let report = engine.gpu_report()?;
    if json {
        print_json(&report)
    } else {
        print!("{report}");
        Ok(())
    }
}

fn inspect(cfg: &Config, layout: &Layout, input: Option<&Path>, json: bool) -> Result<()> {
    let target = input.unwrap_or(layout.input.as_path());
    validate_input(cfg, target)?;
    info!("starting PDF image analysis: {}", target.display());
    let report = pipeline::inspect_target(target, cfg.scan.follow_links)?;
    if json {
        print_json(&report)
    } else {
        print!("{report}");
        Ok(())
    }
}

fn plan(cfg: &Config, layout: &Layout, json: bool) -> Result<()> {
    let survey = pipeline::survey(cfg, layout)?;
    let planned = pipeline::plan(cfg, layout)?;
    if json {
        print_json(&serde_json::json!({
            "survey": survey,
            "plan": planned,
        }))
    } else {
        print!("{survey}");
        for dir in &planned {
            println!("\n{}", crate::report::display_rel(&dir.rel));
            for item in &dir.items {
                match item {
                    pipeline::PlannedItem::Ready { status, item } => println!(
                        "  {} -> {:?} (images {}/{})",
                        item.document.raw_name,
                        status,
                        item.probe.valid_image_count,
                        item.probe.expected_images
                    ),
                    pipeline::PlannedItem::Unreadable { path, error } => {
                        println!("  {path} -> unreadable: {error}")
                    }
                }
            }
        }
        Ok(())
    }
}

fn run(cfg: &Config, layout: &Layout, json: bool) -> Result<()> {
    info!("project root: {}", layout.root.display());
    info!("input directory: {}", layout.input.display());
    info!("output directory: {}", layout.output.display());
    info!("model directory: {}", layout.models.display());

    if cfg.debug.dump_effective_config {
        ensure_dir(&layout.output)?;
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(layout.output.join("effective-config.toml"), raw)?;
    }

    let engine = PythonEngine::new(cfg, layout)?;
    let mill = Pipeline::new(cfg, layout, engine);

    let survey = pipeline::survey(cfg, layout)?;
    if !json {
        print!("{survey}");
    }

    let summary = mill.run()?;

    if cfg.global.print_summary {
        if json {
            print_json(&serde_json::json!({
                "survey": survey,
                "summary": summary,
            }))?;
        } else {
            println!();
            print!("{summary}");
        }
    }
    Ok(())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();
    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    Ok(())
}
