use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

use web_vision::analyze::{Analyzer, DisabledAnalyzer, VlmAnalyzer, VlmConfig};
use web_vision::baseline::{auto_select, BaselineStore, UpdateOptions, DEFAULT_SELECT_THRESHOLD};
use web_vision::capture::{
    CaptureOptions, CaptureRequest, CaptureSource, InteractionStep, Orchestrator,
};
use web_vision::capture::types::{DeviceProfile, EngineType, RenderProfile, ViewportSpec};
use web_vision::compare::{compare_directories, CompareOptions, DEFAULT_THRESHOLD};
use web_vision::report::{render, ReportFormat};
use web_vision::session::Session;

/// Web Vision - visual regression testing for web pages
#[derive(Parser, Debug)]
#[command(
    name = "web-vision",
    about = "Screenshot capture, pixel diffing, and baseline management for web pages",
    after_help = "ENVIRONMENT VARIABLES:\n\
        WEB_VISION_MAX_SESSIONS       Max concurrent rendering sessions\n\
        WEB_VISION_MEMORY_LIMIT_MB    Memory pressure threshold (MB)\n\
        WEB_VISION_BASELINE_DIR       Baseline store root directory\n\
        WEB_VISION_SESSION_DIR        Base directory for sessions\n\
        WEB_VISION_VLM_ENDPOINT       Analyzer API endpoint URL\n\
        WEB_VISION_VLM_MODEL          Analyzer model name"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture screenshots of a URL or local HTML file
    Capture {
        /// URL to capture (or local path with --file)
        source: String,

        /// Treat the source as a local file path
        #[arg(long)]
        file: bool,

        /// Engines to render with (comma-separated: chromium, firefox, webkit)
        #[arg(short, long, value_delimiter = ',', default_value = "chromium")]
        engines: Vec<String>,

        /// Viewports as name=WxH (e.g. desktop=1920x1080); repeatable
        #[arg(short, long)]
        viewport: Vec<String>,

        /// Device presets (iphone-12, pixel-7, ipad, desktop-hd); repeatable
        #[arg(short, long)]
        device: Vec<String>,

        /// Capture the full scrollable page
        #[arg(long)]
        full_page: bool,

        /// CSS selector to wait for after navigation
        #[arg(long)]
        selector: Option<String>,

        /// Interaction script: JSON array of steps, inline or @path
        #[arg(long)]
        script: Option<String>,

        /// Retry attempts for transient failures
        #[arg(long, env = "WEB_VISION_MAX_RETRIES", default_value = "2")]
        retries: u32,

        /// Output directory (default: auto-generated in session dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep screenshots after completion (default: cleanup unless --output is specified)
        #[arg(long, short = 'k')]
        keep: bool,

        /// Analyze each screenshot with the vision model
        #[arg(long)]
        analyze: bool,

        /// Vision model endpoint URL
        #[arg(
            long,
            env = "WEB_VISION_VLM_ENDPOINT",
            default_value = "http://127.0.0.1:8080/v1/chat/completions"
        )]
        vlm_endpoint: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare two capture directories pixel by pixel
    Compare {
        /// Reference capture directory
        dir_a: PathBuf,

        /// Candidate capture directory
        dir_b: PathBuf,

        /// Maximum passing difference ratio (0.0 to 1.0)
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Directory for diff rasters (default: <dir_b>/diffs)
        #[arg(long)]
        diff_dir: Option<PathBuf>,

        /// Report format: text, json, html, markdown, csv
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Analyze failing pairs with the vision model
        #[arg(long)]
        analyze: bool,

        /// Vision model endpoint URL
        #[arg(
            long,
            env = "WEB_VISION_VLM_ENDPOINT",
            default_value = "http://127.0.0.1:8080/v1/chat/completions"
        )]
        vlm_endpoint: String,
    },

    /// Manage the version-controlled baseline
    Baseline {
        /// Baseline store root directory
        #[arg(long, env = "WEB_VISION_BASELINE_DIR", default_value = "./baseline")]
        dir: PathBuf,

        #[command(subcommand)]
        action: BaselineAction,
    },
}

#[derive(Subcommand, Debug)]
enum BaselineAction {
    /// Snapshot the working baseline as a new version
    CreateVersion {
        /// Version name
        name: String,

        /// Version description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Overwrite the working baseline from a capture directory
    Update {
        /// Source capture directory
        source: PathBuf,

        /// Skip the safety backup of the working baseline
        #[arg(long)]
        no_backup: bool,

        /// Copy only these files (comma-separated)
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,
    },

    /// Snapshot the working baseline into a named branch
    Branch {
        /// Branch name
        name: String,
    },

    /// Replace the working baseline with a branch snapshot
    Switch {
        /// Branch name
        name: String,
    },

    /// Restore a version snapshot over the working baseline
    Rollback {
        /// Version id (v_<millis>_<seq>)
        version_id: String,
    },

    /// Delete versions older than the cutoff
    Cleanup {
        /// Days of versions to keep
        #[arg(long, default_value = "30")]
        days: u64,
    },

    /// Pick the stored snapshot matching a fresh capture directory best
    AutoSelect {
        /// Fresh capture directory
        fresh_dir: PathBuf,

        /// Score a candidate must exceed to displace current
        #[arg(long, default_value_t = DEFAULT_SELECT_THRESHOLD)]
        threshold: f64,
    },

    /// List versions and branches
    List,
}

fn parse_engines(names: &[String]) -> Result<Vec<EngineType>, String> {
    names
        .iter()
        .map(|n| EngineType::from_str(n).ok_or_else(|| format!("Unknown engine '{}'", n)))
        .collect()
}

fn parse_profiles(viewports: &[String], devices: &[String]) -> Result<Vec<RenderProfile>, String> {
    let mut profiles = Vec::new();
    for spec in viewports {
        let (name, dims) = match spec.split_once('=') {
            Some((name, dims)) => (name, dims),
            None => (spec.as_str(), spec.as_str()),
        };
        let viewport = ViewportSpec::from_dimensions_str(name, dims)
            .ok_or_else(|| format!("Invalid viewport '{}'. Use name=WxH", spec))?;
        profiles.push(RenderProfile::Viewport(viewport));
    }
    for name in devices {
        let device = DeviceProfile::preset(name)
            .ok_or_else(|| format!("Unknown device preset '{}'", name))?;
        profiles.push(RenderProfile::Device(device));
    }
    if profiles.is_empty() {
        profiles.push(RenderProfile::Viewport(ViewportSpec::new(
            "desktop", 1280, 800,
        )));
    }
    Ok(profiles)
}

fn parse_script(script: &str) -> Result<Vec<InteractionStep>, Box<dyn Error>> {
    let json = if let Some(path) = script.strip_prefix('@') {
        std::fs::read_to_string(path)?
    } else {
        script.to_string()
    };
    Ok(serde_json::from_str(&json)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Capture {
            source,
            file,
            engines,
            viewport,
            device,
            full_page,
            selector,
            script,
            retries,
            output,
            keep,
            analyze,
            vlm_endpoint,
            json,
        } => {
            let capture_source = if file {
                CaptureSource::File(PathBuf::from(&source))
            } else {
                CaptureSource::Url(source.clone())
            };

            let request = CaptureRequest {
                source: capture_source,
                engines: parse_engines(&engines)?,
                profiles: parse_profiles(&viewport, &device)?,
            };

            let options = CaptureOptions {
                full_page,
                wait_for_selector: selector,
                interact: script.as_deref().map(parse_script).transpose()?.unwrap_or_default(),
                analyze,
                max_retries: retries,
                ..Default::default()
            };

            let session = if let Some(ref dir) = output {
                Session::in_dir(dir).keep(true)
            } else {
                Session::with_name("capture").keep(keep)
            };
            session.init()?;

            let analyzer: Box<dyn Analyzer> = if analyze {
                Box::new(VlmAnalyzer::new(VlmConfig::new(vlm_endpoint)))
            } else {
                Box::new(DisabledAnalyzer)
            };

            let orchestrator = Orchestrator::new();
            let artifacts =
                orchestrator.capture(&request, &options, &session.dir, Some(analyzer.as_ref()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&artifacts)?);
            } else {
                for artifact in &artifacts {
                    println!("Captured {}", artifact.file_path.display());
                    if let Some(analysis) = &artifact.analysis {
                        println!("  {}", analysis.summary);
                    }
                }
            }

        }

        Commands::Compare {
            dir_a,
            dir_b,
            threshold,
            diff_dir,
            format,
            output,
            analyze,
            vlm_endpoint,
        } => {
            let format: ReportFormat = format.parse()?;
            let options = CompareOptions {
                threshold,
                diff_dir,
                analyze,
            };

            let analyzer: Box<dyn Analyzer> = if analyze {
                Box::new(VlmAnalyzer::new(VlmConfig::new(vlm_endpoint)))
            } else {
                Box::new(DisabledAnalyzer)
            };

            let report = compare_directories(&dir_a, &dir_b, &options, Some(analyzer.as_ref()))?;
            let rendered = render(&report, format);

            match output {
                Some(path) => std::fs::write(&path, rendered)?,
                None => print!("{}", rendered),
            }

            if !report.passed {
                std::process::exit(1);
            }
        }

        Commands::Baseline { dir, action } => {
            let store = BaselineStore::new(dir);
            match action {
                BaselineAction::CreateVersion { name, description } => {
                    let version = store.create_version(&name, &description)?;
                    println!("Created version {} ({})", version.id, version.name);
                }
                BaselineAction::Update {
                    source,
                    no_backup,
                    files,
                } => {
                    let options = UpdateOptions {
                        backup: !no_backup,
                        selective: !files.is_empty(),
                        files,
                    };
                    store.update_baseline(&source, &options)?;
                    println!("Baseline updated from {}", source.display());
                }
                BaselineAction::Branch { name } => {
                    let branch = store.create_branch(&name)?;
                    println!("Created branch {} (parent: {})", branch.name, branch.parent);
                }
                BaselineAction::Switch { name } => {
                    store.switch_branch(&name)?;
                    println!("Switched to branch {}", name);
                }
                BaselineAction::Rollback { version_id } => {
                    store.rollback(&version_id)?;
                    println!("Rolled back to version {}", version_id);
                }
                BaselineAction::Cleanup { days } => {
                    let removed = store.cleanup_old_versions(days)?;
                    println!("Removed {} old version(s)", removed);
                }
                BaselineAction::AutoSelect {
                    fresh_dir,
                    threshold,
                } => {
                    let pick = auto_select(&store, &fresh_dir, threshold)?;
                    println!(
                        "Selected {} (score {:.2}): {}",
                        pick.name,
                        pick.score,
                        pick.snapshot_location.display()
                    );
                }
                BaselineAction::List => {
                    let metadata = store.load_metadata()?;
                    println!("Current pointer: {}", metadata.current_pointer);
                    println!("Versions:");
                    for version in &metadata.versions {
                        println!(
                            "  {}  {}  {}  ({})",
                            version.id,
                            version.created_at.format("%Y-%m-%d %H:%M"),
                            version.name,
                            version.source_control_branch
                        );
                    }
                    println!("Branches:");
                    for (name, branch) in &metadata.branches {
                        println!(
                            "  {}  {}  (parent: {})",
                            name,
                            branch.created_at.format("%Y-%m-%d %H:%M"),
                            branch.parent
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
