use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::model::settings::Settings;

/// Error type for settings file I/O and key edits
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse settings: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not edit settings: {0}")]
    EditError(#[from] toml_edit::TomlError),
    #[error("unknown setting: {0} (expected section.key)")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Settings file path, respecting XDG_CONFIG_HOME
pub fn settings_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".config"));
    config_dir.join("todour").join("settings.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Read settings, returning both the parsed values and the toml_edit
/// document for round-trip-safe editing. A missing file yields defaults.
pub fn read_settings(path: &Path) -> Result<(Settings, toml_edit::DocumentMut), SettingsError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            String::new()
        }
        Err(e) => {
            return Err(SettingsError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let settings: Settings = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((settings, doc))
}

/// Write the settings document back to disk, preserving formatting.
pub fn write_settings(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| SettingsError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    atomic_write(path, doc.to_string().as_bytes()).map_err(|e| SettingsError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve a file named in settings against the settings file's directory.
pub fn resolve_file(settings_path: &Path, name: &str) -> PathBuf {
    let p = Path::new(name);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match settings_path.parent() {
        Some(dir) => dir.join(p),
        None => p.to_path_buf(),
    }
}

fn split_key(key: &str) -> Result<(&str, &str), SettingsError> {
    key.split_once('.')
        .filter(|(section, field)| !section.is_empty() && !field.is_empty())
        .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
}

/// Look up `section.key` in the effective settings (defaults included),
/// rendered the way it would appear in the TOML file.
pub fn get_value(settings: &Settings, key: &str) -> Result<String, SettingsError> {
    let (section, field) = split_key(key)?;
    let table = toml::Value::try_from(settings)
        .ok()
        .and_then(|v| match v {
            toml::Value::Table(t) => Some(t),
            _ => None,
        })
        .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
    let value = table
        .get(section)
        .and_then(|s| s.get(field))
        .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
    Ok(match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Set `section.key` in the document, keeping the value type of the
/// known setting. Comments and unrelated keys are left alone.
pub fn set_value(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    raw: &str,
) -> Result<(), SettingsError> {
    let current = get_value(&Settings::default(), key)?;
    let (section, field) = split_key(key)?;

    let invalid = || SettingsError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    };
    let item = if current == "true" || current == "false" {
        toml_edit::value(raw.parse::<bool>().map_err(|_| invalid())?)
    } else if current.parse::<i64>().is_ok() {
        toml_edit::value(raw.parse::<i64>().map_err(|_| invalid())?)
    } else {
        toml_edit::value(raw)
    };

    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][field] = item;
    Ok(())
}

/// Read, edit one key, write back.
pub fn update_setting(path: &Path, key: &str, raw: &str) -> Result<(), SettingsError> {
    let (_, mut doc) = read_settings(path)?;
    set_value(&mut doc, key, raw)?;
    write_settings(path, &doc)
}
