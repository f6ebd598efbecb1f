//! INI file configuration adapter.

use crate::domain::error::NestradeError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, NestradeError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| NestradeError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, NestradeError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| NestradeError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).filter(|v| !v.trim().is_empty())
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}
