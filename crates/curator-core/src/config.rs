//! Per-root configuration.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use derive_builder::Builder;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::matcher::PathMatcher;

/// Hard cap on the bounded in-flight I/O limit.
pub const MAX_IN_FLIGHT: usize = 10;

static TEMPLATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/((\{year\}|\{month\}|\{day\})/?)+$").expect("static template pattern")
});

/// An analyzer that may be enabled for a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    PreCleanup,
    Duplicates,
    Orphans,
    Reorganize,
    Permissions,
    Ownership,
    PostCleanup,
}

fn default_actions() -> Vec<Action> {
    vec![
        Action::PreCleanup,
        Action::Duplicates,
        Action::Orphans,
        Action::Reorganize,
        Action::Permissions,
        Action::PostCleanup,
    ]
}

fn default_template() -> String {
    "/{year}/{month}/".to_string()
}

fn default_hash_byte_limit() -> u64 {
    131_072
}

fn default_dupe_set_extensions() -> Vec<String> {
    ["jpg", "jpeg", "mp4", "avi"]
        .map(str::to_string)
        .to_vec()
}

fn default_orphan_file_extensions() -> Vec<String> {
    [".aae", ".xml", ".ini"].map(str::to_string).to_vec()
}

fn default_date_threshold() -> NaiveDate {
    NaiveDate::from_ymd_opt(1995, 1, 1).expect("valid literal date")
}

fn default_ignore_directories() -> Vec<String> {
    ["@eaDir", "@*"].map(str::to_string).to_vec()
}

fn default_ignore_files() -> Vec<String> {
    vec!["*.ini".to_string()]
}

fn default_remove_files() -> Vec<String> {
    ["*picasa.ini", "Thumbs.db"].map(str::to_string).to_vec()
}

fn default_file_perm() -> String {
    "664".to_string()
}

fn default_dir_perm() -> String {
    "775".to_string()
}

fn default_concurrency() -> usize {
    5
}

/// Everything curator needs to know about one managed root.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::check"))]
#[serde(rename_all = "camelCase")]
pub struct RootConfig {
    /// Root to analyze.
    pub scan_path: PathBuf,

    /// Base for reorganize targets; defaults to `scan_path`.
    #[builder(default)]
    #[serde(default)]
    pub relative_path: Option<PathBuf>,

    /// Destination for everything "deleted".
    pub recycle_bin_path: PathBuf,

    /// Directory layout for reorganized files.
    #[builder(default = "default_template()")]
    #[serde(default = "default_template")]
    pub reorganize_template: String,

    /// Bytes hashed per file chunk.
    #[builder(default = "default_hash_byte_limit()")]
    #[serde(default = "default_hash_byte_limit")]
    pub hash_byte_limit: u64,

    /// Master extensions that anchor a fileset.
    #[builder(default = "default_dupe_set_extensions()")]
    #[serde(default = "default_dupe_set_extensions")]
    pub dupe_set_extensions: Vec<String>,

    /// Legacy orphan-prone extensions, kept for a future filter mode.
    #[builder(default = "default_orphan_file_extensions()")]
    #[serde(default = "default_orphan_file_extensions")]
    pub orphan_file_extensions: Vec<String>,

    /// Candidate dates at or before this day are rejected.
    #[builder(default = "default_date_threshold()")]
    #[serde(default = "default_date_threshold")]
    pub date_threshold: NaiveDate,

    /// A directory totalling at most this many bytes counts as empty.
    #[builder(default)]
    #[serde(default)]
    pub empty_threshold: u64,

    /// Directory names never descended into.
    #[builder(default = "default_ignore_directories()")]
    #[serde(default = "default_ignore_directories")]
    pub ignore_directories: Vec<String>,

    /// File names recorded but excluded from aggregates and analysis.
    #[builder(default = "default_ignore_files()")]
    #[serde(default = "default_ignore_files")]
    pub ignore_files: Vec<String>,

    /// File names forced into cleanup. Overrides `ignore_files`.
    #[builder(default = "default_remove_files()")]
    #[serde(default = "default_remove_files")]
    pub remove_files: Vec<String>,

    /// Desired file mode, octal (`664` or `0o664`).
    #[builder(default = "default_file_perm()")]
    #[serde(default = "default_file_perm")]
    pub file_perm: String,

    /// Desired directory mode, octal.
    #[builder(default = "default_dir_perm()")]
    #[serde(default = "default_dir_perm")]
    pub dir_perm: String,

    /// Desired owning user; required iff the ownership action is enabled.
    #[builder(default)]
    #[serde(default)]
    pub owner_user: Option<String>,

    /// Desired owning group; required iff the ownership action is enabled.
    #[builder(default)]
    #[serde(default)]
    pub owner_group: Option<String>,

    /// Enabled analyzers.
    #[builder(default = "default_actions()")]
    #[serde(default = "default_actions")]
    pub actions: Vec<Action>,

    /// Bounded in-flight limit for per-file I/O.
    #[builder(default = "default_concurrency()")]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl RootConfig {
    pub fn builder() -> RootConfigBuilder {
        RootConfigBuilder::default()
    }

    /// Whether an analyzer is enabled for this root.
    pub fn has_action(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// The base directory reorganize targets are resolved against.
    pub fn reorganize_base(&self) -> &Path {
        self.relative_path.as_deref().unwrap_or(&self.scan_path)
    }

    /// Desired file mode as numeric bits.
    pub fn file_mode(&self) -> Result<u32, ConfigError> {
        parse_perm(&self.file_perm)
    }

    /// Desired directory mode as numeric bits.
    pub fn dir_mode(&self) -> Result<u32, ConfigError> {
        parse_perm(&self.dir_perm)
    }

    /// The in-flight limit, clamped to the hard cap.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_IN_FLIGHT)
    }

    /// Compiled matcher for `ignore_directories`.
    pub fn ignore_dir_matcher(&self) -> Result<PathMatcher, ConfigError> {
        PathMatcher::new(&self.ignore_directories)
    }

    /// Compiled matcher for `ignore_files`.
    pub fn ignore_file_matcher(&self) -> Result<PathMatcher, ConfigError> {
        PathMatcher::new(&self.ignore_files)
    }

    /// Compiled matcher for `remove_files`.
    pub fn remove_file_matcher(&self) -> Result<PathMatcher, ConfigError> {
        PathMatcher::new(&self.remove_files)
    }

    /// Validate a config that arrived through deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, path) in [
            ("scanPath", Some(&self.scan_path)),
            ("recycleBinPath", Some(&self.recycle_bin_path)),
            ("relativePath", self.relative_path.as_ref()),
        ] {
            if let Some(path) = path {
                if !path.is_absolute() {
                    return Err(ConfigError::RelativePath {
                        key,
                        path: path.clone(),
                    });
                }
            }
        }

        if !TEMPLATE_SHAPE.is_match(&self.reorganize_template) {
            return Err(ConfigError::Template {
                template: self.reorganize_template.clone(),
            });
        }

        self.file_mode()?;
        self.dir_mode()?;
        self.ignore_dir_matcher()?;
        self.ignore_file_matcher()?;
        self.remove_file_matcher()?;

        if self.has_action(Action::Ownership)
            && (self.owner_user.is_none() || self.owner_group.is_none())
        {
            return Err(ConfigError::MissingOwner);
        }

        Ok(())
    }
}

impl RootConfigBuilder {
    fn check(&self) -> Result<(), String> {
        let built = RootConfig {
            scan_path: self.scan_path.clone().ok_or("scanPath is required")?,
            relative_path: self.relative_path.clone().flatten(),
            recycle_bin_path: self
                .recycle_bin_path
                .clone()
                .ok_or("recycleBinPath is required")?,
            reorganize_template: self
                .reorganize_template
                .clone()
                .unwrap_or_else(default_template),
            hash_byte_limit: self.hash_byte_limit.unwrap_or_else(default_hash_byte_limit),
            dupe_set_extensions: self
                .dupe_set_extensions
                .clone()
                .unwrap_or_else(default_dupe_set_extensions),
            orphan_file_extensions: self
                .orphan_file_extensions
                .clone()
                .unwrap_or_else(default_orphan_file_extensions),
            date_threshold: self.date_threshold.unwrap_or_else(default_date_threshold),
            empty_threshold: self.empty_threshold.unwrap_or_default(),
            ignore_directories: self
                .ignore_directories
                .clone()
                .unwrap_or_else(default_ignore_directories),
            ignore_files: self.ignore_files.clone().unwrap_or_else(default_ignore_files),
            remove_files: self.remove_files.clone().unwrap_or_else(default_remove_files),
            file_perm: self.file_perm.clone().unwrap_or_else(default_file_perm),
            dir_perm: self.dir_perm.clone().unwrap_or_else(default_dir_perm),
            owner_user: self.owner_user.clone().flatten(),
            owner_group: self.owner_group.clone().flatten(),
            actions: self.actions.clone().unwrap_or_else(default_actions),
            concurrency: self.concurrency.unwrap_or_else(default_concurrency),
        };
        built.validate().map_err(|e| e.to_string())
    }
}

/// Parse an octal permission string, with or without the `0o` prefix.
pub fn parse_perm(value: &str) -> Result<u32, ConfigError> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| ConfigError::Perm {
        value: value.to_string(),
    })?;
    if mode > 0o777 {
        return Err(ConfigError::Perm {
            value: value.to_string(),
        });
    }
    Ok(mode)
}

/// The whole config file: an ordered list of roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub roots: Vec<RootConfig>,
}

impl Config {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for root in &config.roots {
            root.validate()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RootConfigBuilder {
        let mut builder = RootConfig::builder();
        builder
            .scan_path("/volume1/photos")
            .recycle_bin_path("/volume1/photos/#recycle");
        builder
    }

    #[test]
    fn builder_fills_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.reorganize_template, "/{year}/{month}/");
        assert_eq!(config.hash_byte_limit, 131_072);
        assert_eq!(config.empty_threshold, 0);
        assert_eq!(config.date_threshold, NaiveDate::from_ymd_opt(1995, 1, 1).unwrap());
        assert_eq!(config.effective_concurrency(), 5);
        assert!(config.has_action(Action::Duplicates));
        assert!(!config.has_action(Action::Ownership));
    }

    #[test]
    fn reorganize_base_falls_back_to_scan_path() {
        let config = minimal().build().unwrap();
        assert_eq!(config.reorganize_base(), Path::new("/volume1/photos"));

        let config = minimal()
            .relative_path(Some(PathBuf::from("/volume1/sorted")))
            .build()
            .unwrap();
        assert_eq!(config.reorganize_base(), Path::new("/volume1/sorted"));
    }

    #[test]
    fn parse_perm_accepts_both_spellings() {
        assert_eq!(parse_perm("664").unwrap(), 0o664);
        assert_eq!(parse_perm("0o775").unwrap(), 0o775);
        assert!(parse_perm("9z").is_err());
        assert!(parse_perm("7777").is_err());
    }

    #[test]
    fn template_shape_is_validated() {
        let err = minimal()
            .reorganize_template("{year}/{month}")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("template"));

        assert!(minimal()
            .reorganize_template("/{year}/{month}/{day}/")
            .build()
            .is_ok());
    }

    #[test]
    fn relative_scan_path_is_rejected() {
        let mut builder = RootConfig::builder();
        builder
            .scan_path("photos")
            .recycle_bin_path("/volume1/#recycle");
        assert!(builder.build().is_err());
    }

    #[test]
    fn ownership_action_requires_owner() {
        let err = minimal()
            .actions(vec![Action::Ownership])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("owner_user"));

        assert!(minimal()
            .actions(vec![Action::Ownership])
            .owner_user(Some("media".to_string()))
            .owner_group(Some("users".to_string()))
            .build()
            .is_ok());
    }

    #[test]
    fn config_deserializes_camel_case_keys() {
        let json = r#"{
            "roots": [{
                "scanPath": "/volume1/photos",
                "recycleBinPath": "/volume1/photos/#recycle",
                "emptyThreshold": 4096,
                "actions": ["pre-cleanup", "duplicates"]
            }]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.roots.len(), 1);
        let root = &config.roots[0];
        assert_eq!(root.empty_threshold, 4096);
        assert_eq!(root.actions, vec![Action::PreCleanup, Action::Duplicates]);
        root.validate().unwrap();
    }
}
