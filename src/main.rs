//! Upload File Manager - Command-Line Interface
//! Created: 2025-06-06
//!
//! Runs an upload through the full pipeline against a throwaway in-memory
//! record store, or exposes the classifier and the provenance detector on
//! their own.

use clap::{Arg, ArgAction, ArgMatches, Command, ValueEnum};
use filemanager::config::load_config_file;
use filemanager::scanner::{ContentClassifier, TexProducedDetector};
use filemanager::types::{Type, UploadStatus};
use filemanager::{InMemoryWorkspaceStore, Payload, PipelineConfig, UploadPipeline, UploadRequest};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages (default)
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and all messages
    Debug,
    /// Trace and all messages (most verbose)
    Trace,
}

#[derive(Debug, Serialize)]
struct ClassifyReport {
    path: String,
    tag: &'static str,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct ProvenanceReport {
    path: String,
    provenance: filemanager::Provenance,
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let log_level = matches.get_one::<LogLevel>("verbose").unwrap_or(&LogLevel::Warn);
    init_logging(log_level);

    let code = match matches.subcommand() {
        Some(("upload", sub)) => run_upload(sub).await,
        Some(("classify", sub)) => run_classify(sub),
        Some(("tex-produced", sub)) => run_tex_produced(sub),
        _ => {
            error!("❌ No command given; see --help");
            1
        }
    };
    process::exit(code);
}

fn build_cli() -> Command {
    Command::new("filemanager")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Submission upload file manager")
        .long_about("Unpacks and classifies submission uploads, reports per-file diagnostics \
                    and flags PDF/PostScript that appears to have been produced by TeX.")
        .subcommand_required(true)
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .global(true)
            .value_parser(clap::builder::EnumValueParser::<LogLevel>::new())
            .default_value("warn")
            .help("Set logging verbosity"))

        .subcommand(Command::new("upload")
            .about("Process one file or archive into a fresh workspace")
            .arg(Arg::new("file")
                .value_name("FILE")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("File or archive to upload"))
            .arg(Arg::new("category")
                .long("category")
                .value_name("CATEGORY")
                .help("Target category; selects size limits"))
            .arg(Arg::new("owner")
                .long("owner")
                .value_name("OWNER")
                .default_value("cli")
                .help("Owner recorded on the workspace"))
            .arg(Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Configuration file (JSON/YAML)"))
            .arg(Arg::new("workspace-root")
                .long("workspace-root")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory holding workspace file areas"))
            .arg(Arg::new("sequential")
                .long("sequential")
                .action(ArgAction::SetTrue)
                .help("Classify on the calling thread instead of the worker pool")))

        .subcommand(Command::new("classify")
            .about("Print the detected type of each file")
            .arg(Arg::new("files")
                .value_name("FILE")
                .required(true)
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf))))

        .subcommand(Command::new("tex-produced")
            .about("Check PDF/PostScript files for signs of TeX provenance")
            .arg(Arg::new("files")
                .value_name("FILE")
                .required(true)
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf))))
}

fn init_logging(level: &LogLevel) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter_level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!("filemanager={}", filter_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn load_config(matches: &ArgMatches) -> Result<PipelineConfig, String> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => load_config_file(path).map_err(|e| e.to_string())?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = matches.get_one::<PathBuf>("workspace-root") {
        config.workspace_root = root.clone();
    }
    if matches.get_flag("sequential") {
        config.parallel_classification = false;
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}

async fn run_upload(matches: &ArgMatches) -> i32 {
    let result = async {
        let config = load_config(matches)?;
        let path = matches
            .get_one::<PathBuf>("file")
            .ok_or_else(|| "missing FILE".to_string())?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("🚀 Uploading {} ({} bytes)", path.display(), data.len());
        let pipeline = UploadPipeline::new(config, Arc::new(InMemoryWorkspaceStore::new()))
            .map_err(|e| e.to_string())?;
        let request = UploadRequest {
            workspace_id: None,
            owner: matches.get_one::<String>("owner").cloned().unwrap_or_default(),
            category: matches.get_one::<String>("category").cloned(),
            payload: Some(Payload { name, data }),
        };
        let summary = pipeline.process(request).await.map_err(|e| e.to_string())?;
        print_json(&summary)?;
        Ok::<_, String>(summary.status)
    }
    .await;

    match result {
        Ok(UploadStatus::Errors) => 2,
        Ok(_) => 0,
        Err(e) => {
            error!("❌ Upload failed: {}", e);
            1
        }
    }
}

fn files_arg(matches: &ArgMatches) -> Vec<&Path> {
    matches
        .get_many::<PathBuf>("files")
        .map(|files| files.map(PathBuf::as_path).collect())
        .unwrap_or_default()
}

fn run_classify(matches: &ArgMatches) -> i32 {
    let classifier = ContentClassifier::new();
    let reports: Vec<ClassifyReport> = files_arg(matches)
        .into_iter()
        .map(|path| {
            let file_type = classifier.classify_path(path);
            ClassifyReport {
                path: path.display().to_string(),
                tag: file_type.tag(),
                name: file_type.display_name(),
            }
        })
        .collect();

    match print_json(&reports) {
        Ok(()) => 0,
        Err(e) => {
            error!("❌ {}", e);
            1
        }
    }
}

fn run_tex_produced(matches: &ArgMatches) -> i32 {
    let classifier = ContentClassifier::new();
    let detector = TexProducedDetector::default();
    let reports: Vec<ProvenanceReport> = files_arg(matches)
        .into_iter()
        .map(|path| {
            let provenance = match classifier.classify_path(path) {
                Type::Postscript | Type::PsPc | Type::DosEps => detector.check_ps(path),
                _ => detector.check_pdf(path),
            };
            ProvenanceReport {
                path: path.display().to_string(),
                provenance,
            }
        })
        .collect();

    match print_json(&reports) {
        Ok(()) => 0,
        Err(e) => {
            error!("❌ {}", e);
            1
        }
    }
}
