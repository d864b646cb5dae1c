use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use coverage_comment::comment::{build_comment, CommentRequest};
use coverage_comment::config::{Config, RenderOptions};
use coverage_comment::coverage::parse_coverage;
use coverage_comment::junit::parse_junit_string;
use coverage_comment::limits::{truncate_summary, Trigger};
use coverage_comment::source::FsSource;

const CONFIG_FILE: &str = "coverage-comment.toml";

#[derive(Parser)]
#[command(name = "coverage-comment")]
#[command(about = "Render coverage and JUnit reports as a pull request comment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: coverage-comment.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the comment body and outputs
    Comment(CommentArgs),

    /// Parse a single report and print it as JSON
    Inspect {
        /// Coverage (.txt or .xml) or JUnit XML file
        path: PathBuf,

        /// Treat the file as a JUnit report
        #[arg(long)]
        junit: bool,

        /// Leave fully covered classes out of Cobertura reports
        #[arg(long)]
        skip_covered: bool,
    },
}

#[derive(Args)]
struct CommentArgs {
    /// Coverage report: coverage-tool text output or Cobertura XML
    #[arg(long)]
    coverage: Option<String>,

    /// JUnit XML report (repeatable)
    #[arg(long)]
    junit: Vec<String>,

    /// JUnit XML report of the default branch, for diffs (repeatable)
    #[arg(long)]
    baseline_junit: Vec<String>,

    /// `title, coverage-path[, junit-path]` line (repeatable)
    #[arg(long)]
    multiple_files: Vec<String>,

    /// Triggering event name, e.g. pull_request or push
    #[arg(long)]
    event: Option<String>,

    /// Directory relative report paths are resolved against
    #[arg(long)]
    base_dir: Option<PathBuf>,

    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    badge_title: Option<String>,
    #[arg(long)]
    xml_title: Option<String>,
    #[arg(long)]
    repo_url: Option<String>,
    #[arg(long)]
    commit: Option<String>,
    #[arg(long)]
    default_branch: Option<String>,
    #[arg(long)]
    prefix: Option<String>,
    #[arg(long)]
    path_prefix: Option<String>,

    /// Changed file path (repeatable)
    #[arg(long)]
    changed_files: Vec<String>,

    #[arg(long)]
    hide_badge: bool,
    #[arg(long)]
    hide_report: bool,
    #[arg(long)]
    report_only_changed_files: bool,
    #[arg(long)]
    remove_link_from_badge: bool,
    #[arg(long)]
    remove_links_to_files: bool,
    #[arg(long)]
    remove_links_to_lines: bool,
    #[arg(long)]
    xml_skip_covered: bool,

    /// Write the body here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write all outputs as JSON
    #[arg(long)]
    outputs_json: Option<PathBuf>,

    /// Append the body to a run summary file (size limited)
    #[arg(long)]
    summary_file: Option<PathBuf>,
}

impl CommentArgs {
    /// Flags win over config file values
    fn apply(&self, config: &mut Config) {
        let render = &mut config.render;
        let strings = [
            (&self.title, &mut render.title),
            (&self.badge_title, &mut render.badge_title),
            (&self.xml_title, &mut render.xml_title),
            (&self.repo_url, &mut render.repo_url),
            (&self.commit, &mut render.commit),
            (&self.default_branch, &mut render.default_branch),
            (&self.prefix, &mut render.prefix),
            (&self.path_prefix, &mut render.path_prefix),
        ];
        for (flag, value) in strings {
            if let Some(flag) = flag {
                value.clone_from(flag);
            }
        }

        let flags = [
            (self.hide_badge, &mut render.hide_badge),
            (self.hide_report, &mut render.hide_report),
            (self.report_only_changed_files, &mut render.report_only_changed_files),
            (self.remove_link_from_badge, &mut render.remove_link_from_badge),
            (self.remove_links_to_files, &mut render.remove_links_to_files),
            (self.remove_links_to_lines, &mut render.remove_links_to_lines),
            (self.xml_skip_covered, &mut render.xml_skip_covered),
        ];
        for (flag, value) in flags {
            *value |= flag;
        }
        render.changed_files.extend(self.changed_files.iter().cloned());

        let inputs = &mut config.inputs;
        if self.coverage.is_some() {
            inputs.coverage.clone_from(&self.coverage);
        }
        if self.event.is_some() {
            inputs.event.clone_from(&self.event);
        }
        if !self.junit.is_empty() {
            inputs.junit.clone_from(&self.junit);
        }
        if !self.baseline_junit.is_empty() {
            inputs.baseline_junit.clone_from(&self.baseline_junit);
        }
        if !self.multiple_files.is_empty() {
            inputs.multiple_files.clone_from(&self.multiple_files);
        }
    }
}

fn main() {
    init_logging();

    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout only carries the rendered body
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let (config, base_dir) = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Comment(args) => cmd_comment(config, &base_dir, &args),
        Commands::Inspect {
            path,
            junit,
            skip_covered,
        } => cmd_inspect(&path, junit, skip_covered || config.render.xml_skip_covered),
    }
}

/// Explicit config must exist; the default file is optional
fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    let cwd = std::env::current_dir().context("Could not determine current directory")?;

    let config_path = match path {
        Some(path) => std::fs::canonicalize(path)
            .with_context(|| format!("Could not find config file: {}", path.display()))?,
        None => {
            let default = cwd.join(CONFIG_FILE);
            if !default.exists() {
                return Ok((Config::default(), cwd));
            }
            default
        }
    };

    let config = Config::load(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;
    let base_dir = config_path.parent().map(Path::to_path_buf).unwrap_or(cwd);

    Ok((config, base_dir))
}

fn cmd_comment(mut config: Config, base_dir: &Path, args: &CommentArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let base_dir = args.base_dir.clone().unwrap_or_else(|| base_dir.to_path_buf());
    let source = FsSource::new(base_dir);
    let options: &RenderOptions = &config.render;

    let request = CommentRequest {
        coverage: config.inputs.coverage.clone(),
        junit: config.inputs.junit.clone(),
        baseline_junit: config.inputs.baseline_junit.clone(),
        multiple_files: config.inputs.multiple_files.clone(),
        trigger: config
            .inputs
            .event
            .as_deref()
            .map(Trigger::from_event_name)
            .unwrap_or(Trigger::PullRequest),
    };

    let outputs = build_comment(&request, options, &source);

    if let Some(path) = &args.outputs_json {
        let json = serde_json::to_string_pretty(&outputs)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if outputs.is_empty() {
        eprintln!("{}", "Nothing to report".yellow());
        return Ok(());
    }

    if let Some(path) = &args.summary_file {
        append_summary(path, &outputs.body)?;
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &outputs.body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} Comment written: {} ({} coverage, {})",
                "✓".green(),
                path.display().to_string().green(),
                outputs.coverage.bold(),
                outputs.color.as_str()
            );
        }
        None => println!("{}", outputs.body),
    }

    for advice in &outputs.advice {
        eprintln!("  {} {}", "•".yellow(), advice);
    }

    Ok(())
}

fn append_summary(path: &Path, body: &str) -> Result<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open summary file {}", path.display()))?;
    writeln!(file, "{}", truncate_summary(body))?;
    Ok(())
}

fn cmd_inspect(path: &Path, junit: bool, skip_covered: bool) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let json = if junit {
        serde_json::to_string_pretty(&parse_junit_string(&content)?)?
    } else {
        let source = path.to_string_lossy();
        serde_json::to_string_pretty(&parse_coverage(&source, &content, skip_covered)?)?
    };

    println!("{}", json);
    Ok(())
}
