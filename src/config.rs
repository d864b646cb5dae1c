use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Options shared by parsing and rendering
///
/// One value is built per run and passed by reference; per-call variations
/// (another title, links to the default branch) are derived copies.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderOptions {
    /// Stripped from report paths before display and linking
    pub prefix: String,
    /// Prepended to repository-relative paths in file links
    pub path_prefix: String,
    /// e.g. `https://github.com/owner/repo`
    pub repo_url: String,
    pub commit: String,
    /// Branch used for the link-stable `coverage_html` output
    pub default_branch: String,
    pub hide_badge: bool,
    pub hide_report: bool,
    pub report_only_changed_files: bool,
    pub changed_files: BTreeSet<String>,
    pub remove_link_from_badge: bool,
    pub remove_links_to_files: bool,
    pub remove_links_to_lines: bool,
    /// Omit fully covered classes from Cobertura reports
    pub xml_skip_covered: bool,
    pub badge_title: String,
    pub title: String,
    /// Heading of the JUnit summary; no heading when empty
    pub xml_title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            path_prefix: String::new(),
            repo_url: String::new(),
            commit: String::new(),
            default_branch: "main".to_string(),
            hide_badge: false,
            hide_report: false,
            report_only_changed_files: false,
            changed_files: BTreeSet::new(),
            remove_link_from_badge: false,
            remove_links_to_files: false,
            remove_links_to_lines: false,
            xml_skip_covered: false,
            badge_title: "Coverage".to_string(),
            title: "Coverage Report".to_string(),
            xml_title: String::new(),
        }
    }
}

impl RenderOptions {
    /// Same options with links pointing at another commit or branch
    pub fn with_commit(&self, commit: &str) -> Self {
        Self {
            commit: commit.to_string(),
            ..self.clone()
        }
    }

    /// Report path with the configured prefix removed
    pub fn relative_path<'a>(&self, name: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            return name;
        }
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }

    /// A file counts as changed when a changed-files entry contains its path
    pub fn is_changed(&self, relative: &str) -> bool {
        self.changed_files.iter().any(|changed| changed.contains(relative))
    }

    pub fn blob_url(&self, path: &str) -> String {
        format!(
            "{}/blob/{}/{}",
            self.repo_url.trim_end_matches('/'),
            self.commit,
            path
        )
    }

    /// Link to a report file in the repository browser
    pub fn file_url(&self, relative: &str) -> String {
        self.blob_url(&format!("{}{}", self.path_prefix, relative))
    }
}

/// Report sources, normally supplied by the CI wiring
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Inputs {
    pub coverage: Option<String>,
    pub junit: Vec<String>,
    /// JUnit reports from the default branch, for inline diffs
    pub baseline_junit: Vec<String>,
    /// `title, coverage-path[, junit-path]` lines
    pub multiple_files: Vec<String>,
    /// Triggering event name (`pull_request`, `push`, ...)
    pub event: Option<String>,
}

impl Inputs {
    pub fn is_empty(&self) -> bool {
        self.coverage.is_none() && self.junit.is_empty() && self.multiple_files.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub inputs: Inputs,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            anyhow::bail!(
                "Nothing to report: set a coverage file, a JUnit file or multiple-files lines"
            );
        }

        for line in &self.inputs.multiple_files {
            if !line.contains(',') {
                anyhow::bail!(
                    "Invalid multiple-files line '{}': expected 'title, coverage-path[, junit-path]'",
                    line
                );
            }
        }

        Ok(())
    }
}
