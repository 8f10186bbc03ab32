//! Config file loading and resolution of the run settings.
//!
//! Precedence for every value: command line, then config file, then the
//! built-in default.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bibfetch_core::{CitationFormat, CitationLayout, FetchConfig};
use serde::Deserialize;

use crate::cli::Args;

const MAX_RATE_LIMIT: u32 = 1000;

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) format: Option<String>,
    pub(crate) rate_limit: Option<u32>,
    pub(crate) rate_burst: Option<u32>,
    pub(crate) request_timeout_secs: Option<u64>,
    pub(crate) download_timeout_secs: Option<u64>,
    pub(crate) mailto: Option<String>,
    pub(crate) crossref_url: Option<String>,
    pub(crate) doi_registry_url: Option<String>,
    pub(crate) catalog_path: Option<String>,
    pub(crate) allow_insecure_mirrors: Option<bool>,
    pub(crate) verbosity: Option<VerbositySetting>,
    #[serde(default)]
    pub(crate) mirrors: MirrorSection,
}

/// The `[mirrors]` table: ordered mirror lists per identifier kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MirrorSection {
    #[serde(default)]
    pub(crate) document: Vec<String>,
    #[serde(default)]
    pub(crate) catalog: Vec<String>,
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(rate_limit) = self.rate_limit
            && rate_limit > MAX_RATE_LIMIT
        {
            bail!(
                "Invalid config value for `rate_limit`: {rate_limit}. Expected range: 0..={MAX_RATE_LIMIT}"
            );
        }
        if let Some(burst) = self.rate_burst
            && burst == 0
        {
            bail!("Invalid config value for `rate_burst`: 0. Expected at least 1");
        }
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_timeout_secs("download_timeout_secs", self.download_timeout_secs)?;
        self.citation_format()?;
        if let Some(mailto) = &self.mailto
            && !mailto.contains('@')
        {
            bail!("Invalid config value for `mailto`: '{mailto}'. Expected an email address");
        }
        Ok(())
    }

    fn citation_format(&self) -> Result<Option<CitationFormat>> {
        self.format
            .as_deref()
            .map(|name| {
                name.parse::<CitationFormat>()
                    .context("Invalid config value for `format`")
            })
            .transpose()
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadedConfig {
    /// Config path consulted, if one could be determined.
    pub(crate) path: Option<PathBuf>,
    /// Parsed file config when the file existed and was valid.
    pub(crate) config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/bibfetch/config.toml`
/// 2. `$HOME/.config/bibfetch/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    default_config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn default_config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg_config_home) = xdg_config_home {
        return Some(PathBuf::from(xdg_config_home).join("bibfetch").join("config.toml"));
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("bibfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; a missing default file just means no config.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path) if path.exists() => Some(load_file_config(path)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Everything the binary needs after merging CLI, file and defaults.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) fetch: FetchConfig,
    pub(crate) log_level: &'static str,
    /// A verbosity flag was given, so `RUST_LOG` is ignored.
    pub(crate) force_cli_log_level: bool,
}

/// Merges command line, config file and defaults into run settings.
pub(crate) fn resolve_settings(args: &Args, file: Option<&FileConfig>) -> Result<Settings> {
    let empty = FileConfig::default();
    let file = file.unwrap_or(&empty);
    let mut fetch = FetchConfig::default();

    if let Some(mode) = args.mode {
        fetch.mode = mode;
    }
    if let Some(format) = args.format.or(file.citation_format()?) {
        fetch.format = format;
    }
    if let Some(output_dir) = args.output_dir.as_ref().or(file.output_dir.as_ref()) {
        fetch.output_dir.clone_from(output_dir);
    }
    fetch.citation_layout = if args.separate {
        CitationLayout::Separate
    } else if let Some(path) = &args.citation_file {
        CitationLayout::CombinedAt(path.clone())
    } else {
        CitationLayout::Combined
    };
    fetch.append = args.append;

    if let Some(rate_limit) = args.rate_limit.or(file.rate_limit) {
        fetch.rate_limit = rate_limit;
    }
    fetch.rate_burst = file.rate_burst;
    if let Some(secs) = args.timeout.or(file.request_timeout_secs) {
        fetch.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.download_timeout_secs {
        fetch.download_timeout = Duration::from_secs(secs);
    }

    fetch.mailto = args.mailto.clone().or_else(|| file.mailto.clone());
    if let Some(url) = &file.crossref_url {
        fetch.crossref_url.clone_from(url);
    }
    if let Some(url) = &file.doi_registry_url {
        fetch.doi_registry_url.clone_from(url);
    }
    if let Some(path) = &file.catalog_path {
        fetch.catalog_path.clone_from(path);
    }
    fetch.allow_insecure_mirrors = file.allow_insecure_mirrors.unwrap_or(false);

    fetch.document_mirrors = if args.mirrors.is_empty() {
        file.mirrors.document.clone()
    } else {
        args.mirrors.clone()
    };
    fetch.catalog_mirrors = if args.catalog_mirrors.is_empty() {
        file.mirrors.catalog.clone()
    } else {
        args.catalog_mirrors.clone()
    };

    let force_cli_log_level = args.quiet || args.verbose > 0;
    let log_level = if args.quiet {
        "error"
    } else if args.verbose > 0 {
        if args.verbose == 1 { "debug" } else { "trace" }
    } else {
        file.verbosity.unwrap_or(VerbositySetting::Default).log_level()
    };

    Ok(Settings {
        fetch,
        log_level,
        force_cli_log_level,
    })
}
