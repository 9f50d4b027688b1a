use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MalltaxError, Result};
use crate::export::ExportFormat;
use crate::header::HEADER_SCAN_ROWS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub default_format: ExportFormat,
    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,
    #[serde(default = "default_tax_exempt_values")]
    pub tax_exempt_values: Vec<String>,
    #[serde(default = "default_taxable_values")]
    pub taxable_values: Vec<String>,
}

fn default_output_dir() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("malltax")
        .to_string_lossy()
        .to_string()
}

fn default_header_scan_rows() -> usize {
    HEADER_SCAN_ROWS
}

fn default_tax_exempt_values() -> Vec<String> {
    ["면세", "FREE", "비과세", "영세"].map(String::from).to_vec()
}

fn default_taxable_values() -> Vec<String> {
    ["과세", "TAX"].map(String::from).to_vec()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_format: ExportFormat::default(),
            header_scan_rows: default_header_scan_rows(),
            tax_exempt_values: default_tax_exempt_values(),
            taxable_values: default_taxable_values(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("malltax")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| MalltaxError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            output_dir: "/tmp/out".to_string(),
            default_format: ExportFormat::Csv,
            header_scan_rows: 15,
            tax_exempt_values: vec!["면세".to_string()],
            taxable_values: vec!["과세".to_string()],
        };
        save_settings_to(&settings, &path).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.output_dir, "/tmp/out");
        assert_eq!(loaded.default_format, ExportFormat::Csv);
        assert_eq!(loaded.header_scan_rows, 15);
        assert_eq!(loaded.tax_exempt_values, vec!["면세"]);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(s.header_scan_rows, 10);
        assert_eq!(s.default_format, ExportFormat::Xlsx);
        assert!(s.taxable_values.contains(&"과세".to_string()));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"output_dir": "/tmp/test", "taxable_values": ["TAXABLE"]}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.output_dir, "/tmp/test");
        assert_eq!(s.taxable_values, vec!["TAXABLE"]);
        assert_eq!(s.tax_exempt_values, default_tax_exempt_values());
    }

    #[test]
    fn test_save_creates_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("settings.json");
        save_settings_to(&Settings::default(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_shellexpand_leaves_plain_paths() {
        assert_eq!(shellexpand_path("/data/mall.xlsx"), "/data/mall.xlsx");
    }
}
