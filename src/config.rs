use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use url::Url;

use crate::model::SummaryMode;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
const ENV_PREFIX: &str = "PDFSUM_";

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    pub api_url: Option<Url>,
    pub default_mode: Option<SummaryMode>,
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigEnv {
    api_url: Option<Url>,
    default_mode: Option<SummaryMode>,
    export_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: Url,
    pub default_mode: SummaryMode,
    pub export_dir: PathBuf,
}

fn merge_config(base: ConfigFile, override_config: ConfigEnv) -> Result<Config> {
    let api_url = match override_config.api_url.or(base.api_url) {
        Some(url) => url,
        None => Url::parse(DEFAULT_API_URL)?,
    };

    let default_mode = override_config
        .default_mode
        .or(base.default_mode)
        .unwrap_or_default();

    let export_dir = override_config
        .export_dir
        .or(base.export_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(Config {
        api_url,
        default_mode,
        export_dir,
    })
}

fn config_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "pdfsum", "pdfsum")
        .ok_or(anyhow!("Unable to determine home directory"))?;
    Ok(project_dirs.config_dir().join("config.toml"))
}

pub fn read_config_file() -> Result<ConfigFile> {
    let config_file = config_path()?;
    match fs::read_to_string(&config_file) {
        Ok(config) => toml::from_str(&config)
            .with_context(|| format!("Failed to parse {}", config_file.display())),
        Err(_) => Ok(ConfigFile::default()),
    }
}

pub fn read_config() -> Result<Config> {
    let _ = dotenv();
    let env_config = envy::prefixed(ENV_PREFIX)
        .from_env::<ConfigEnv>()
        .context("Invalid PDFSUM_* environment variable")?;

    merge_config(read_config_file()?, env_config)
}

pub fn write_config(config: ConfigFile) -> Result<PathBuf> {
    let config_file = config_path()?;
    if let Some(parent) = config_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&config_file, toml::to_string_pretty(&config)?)
        .with_context(|| format!("Failed to write {}", config_file.display()))?;
    Ok(config_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> ConfigEnv {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .unwrap()
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = merge_config(ConfigFile::default(), ConfigEnv::default()).unwrap();
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.default_mode, SummaryMode::Medium);
        assert_eq!(config.export_dir, PathBuf::from("."));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            api_url = "https://summaries.example.com/api/"
            default_mode = "detailed"
            export_dir = "/srv/exports"
            "#,
        )
        .unwrap();
        let env = env(&[
            ("PDFSUM_DEFAULT_MODE", "short"),
            ("UNRELATED", "ignored"),
        ]);

        let config = merge_config(file, env).unwrap();
        assert_eq!(config.api_url.as_str(), "https://summaries.example.com/api/");
        assert_eq!(config.default_mode, SummaryMode::Short);
        assert_eq!(config.export_dir, PathBuf::from("/srv/exports"));
    }

    #[test]
    fn test_invalid_mode_in_environment() {
        let result = envy::prefixed(ENV_PREFIX).from_iter::<_, ConfigEnv>(vec![(
            "PDFSUM_DEFAULT_MODE".to_string(),
            "verbose".to_string(),
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_round_trips_through_toml() {
        let file = ConfigFile {
            api_url: Some(Url::parse("http://10.0.0.5:8000/api/").unwrap()),
            default_mode: Some(SummaryMode::Short),
            export_dir: None,
        };
        let text = toml::to_string_pretty(&file).unwrap();
        assert_eq!(toml::from_str::<ConfigFile>(&text).unwrap(), file);
    }
}
