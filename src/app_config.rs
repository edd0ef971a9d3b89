//! Config file defaults for the CLI.
//!
//! The file uses `key = value` lines with `#` comments; strings are
//! double-quoted. Command-line flags override every value read here.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use coursezip_core::PortalEndpoints;

/// Values read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Directory the archive is written to.
    pub output_dir: Option<PathBuf>,
    /// Netscape cookie export with the portal session.
    pub cookies: Option<String>,
    /// Concurrent portal requests (1..=100).
    pub concurrency: Option<u8>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Override of the material list handler.
    pub material_list_url: Option<String>,
    /// Override of the dropbox list handler.
    pub dropbox_list_url: Option<String>,
    /// Override of the file host base.
    pub file_base_url: Option<String>,
    /// Override of the identity-provider page.
    pub identity_redirect_url: Option<String>,
}

impl FileConfig {
    /// Checks values against the ranges the CLI accepts.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        for (field, value) in [
            ("material_list_url", &self.material_list_url),
            ("dropbox_list_url", &self.dropbox_list_url),
            ("file_base_url", &self.file_base_url),
            ("identity_redirect_url", &self.identity_redirect_url),
        ] {
            if let Some(value) = value {
                url::Url::parse(value)
                    .with_context(|| format!("Invalid config value for `{field}`: '{value}'"))?;
            }
        }
        Ok(())
    }

    /// Production endpoints with this file's overrides applied.
    #[must_use]
    pub fn endpoints(&self) -> PortalEndpoints {
        let mut endpoints = PortalEndpoints::default();
        let overrides = [
            (&mut endpoints.material_list_url, &self.material_list_url),
            (&mut endpoints.dropbox_list_url, &self.dropbox_list_url),
            (&mut endpoints.file_base_url, &self.file_base_url),
            (&mut endpoints.identity_redirect_url, &self.identity_redirect_url),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
        endpoints
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

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/coursezip/config.toml`
/// 2. `$HOME/.config/coursezip/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("coursezip").join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("coursezip")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "cookies" => cfg.cookies = Some(parse_string_literal(value).with_context(context)?),
            "concurrency" => cfg.concurrency = Some(parse_integer_u8(value).with_context(context)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "material_list_url" => {
                cfg.material_list_url = Some(parse_string_literal(value).with_context(context)?);
            }
            "dropbox_list_url" => {
                cfg.dropbox_list_url = Some(parse_string_literal(value).with_context(context)?);
            }
            "file_base_url" => {
                cfg.file_base_url = Some(parse_string_literal(value).with_context(context)?);
            }
            "identity_redirect_url" => {
                cfg.identity_redirect_url =
                    Some(parse_string_literal(value).with_context(context)?);
            }
            unknown => bail!("Unknown configuration key: '{unknown}' on line {line_number}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let value = parse_integer_u64(raw_value)?;
    u8::try_from(value).map_err(|_| anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    if token.starts_with('-') {
        bail!("Expected non-negative integer");
    }
    Ok(token.parse::<u64>()?)
}
