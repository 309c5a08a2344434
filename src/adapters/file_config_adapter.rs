//! INI file configuration adapter.
//!
//! Section and key lookups are case-insensitive; values keep their case.
//! Numeric getters fall back to the caller's default on unparsable input,
//! so callers that must reject bad values read them with `get_string`.

use configparser::ini::Ini;
use std::path::Path;

use crate::domain::error::RegimetraderError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug)]
pub struct FileConfigAdapter {
    ini: Ini,
    source: String,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegimetraderError> {
        let source = path.as_ref().display().to_string();
        let mut ini = Ini::new();
        ini.load(path.as_ref())
            .map_err(|reason| RegimetraderError::ConfigParse {
                file: source.clone(),
                reason,
            })?;
        Ok(Self { ini, source })
    }

    pub fn from_string(content: &str) -> Result<Self, RegimetraderError> {
        let source = "<string>".to_string();
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|reason| RegimetraderError::ConfigParse {
                file: source.clone(),
                reason,
            })?;
        Ok(Self { ini, source })
    }

    /// Where the configuration was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Section names present in the file, sorted.
    pub fn sections(&self) -> Vec<String> {
        let mut names = self.ini.sections();
        names.sort();
        names
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.ini
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}
