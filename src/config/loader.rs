use crate::config::schema::{OutputConfig, ScraperConfig};
use crate::error::{Error, Result};
use crate::extractor::Extractor;
use crate::fetcher::Fetcher;
use crate::output::{console::ConsoleOutput, csv::CsvOutput, json::JsonOutput, OutputHandler};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ScraperConfig> {
        let path = path.as_ref();
        let mut visited = HashSet::new();
        Self::load_with_inheritance(path, &mut visited, false)
    }

    fn load_with_inheritance(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        is_parent_load: bool,
    ) -> Result<ScraperConfig> {
        let path = fs::canonicalize(path).map_err(|e| {
            Error::Config(format!("{}: {}", path.display(), e))
        })?;

        if !visited.insert(path.clone()) {
            return Err(Error::Config(format!(
                "Circular inheritance detected involving {}",
                path.display()
            )));
        }

        let config = Self::load_file(&path)?;

        let final_config = if let Some(parent_path_str) = &config.extends {
            let parent_path = path.parent()
                .ok_or_else(|| Error::Config(format!(
                    "Cannot determine parent directory for {}",
                    path.display()
                )))?
                .join(parent_path_str);

            log::debug!("{} extends {}", path.display(), parent_path.display());
            let parent_config = Self::load_with_inheritance(&parent_path, visited, true)?;
            Self::merge_configs(parent_config, config)
        } else {
            config
        };

        if !is_parent_load {
            final_config.validate()?;
        }

        Ok(final_config)
    }

    fn load_file(path: &Path) -> Result<ScraperConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    /// Child values win wherever they differ from the built-in defaults.
    fn merge_configs(mut parent: ScraperConfig, child: ScraperConfig) -> ScraperConfig {
        let defaults = ScraperConfig::default();

        if child.name != defaults.name {
            parent.name = child.name;
        }
        if child.base_url != defaults.base_url {
            parent.base_url = child.base_url;
        }
        if child.listings_path != defaults.listings_path {
            parent.listings_path = child.listings_path;
        }
        if child.user_agent != defaults.user_agent {
            parent.user_agent = child.user_agent;
        }
        if child.delay_secs != defaults.delay_secs {
            parent.delay_secs = child.delay_secs;
        }
        if child.jitter_min_secs != defaults.jitter_min_secs {
            parent.jitter_min_secs = child.jitter_min_secs;
        }
        if child.jitter_max_secs != defaults.jitter_max_secs {
            parent.jitter_max_secs = child.jitter_max_secs;
        }
        if child.timeout_secs != defaults.timeout_secs {
            parent.timeout_secs = child.timeout_secs;
        }
        if child.max_attempts != defaults.max_attempts {
            parent.max_attempts = child.max_attempts;
        }
        if child.rate_limit_penalty_secs != defaults.rate_limit_penalty_secs {
            parent.rate_limit_penalty_secs = child.rate_limit_penalty_secs;
        }
        if child.max_backoff_wait_secs.is_some() {
            parent.max_backoff_wait_secs = child.max_backoff_wait_secs;
        }
        if child.jitter_on_retry.is_some() {
            parent.jitter_on_retry = child.jitter_on_retry;
        }
        if child.check_robots.is_some() {
            parent.check_robots = child.check_robots;
        }
        if child.listing != defaults.listing {
            parent.listing = child.listing;
        }
        if child.outputs != defaults.outputs {
            parent.outputs = child.outputs;
        }

        parent.extends = None;
        parent
    }

    pub fn create_extractor(config: &ScraperConfig) -> Result<Extractor> {
        let fetcher = Fetcher::from_config(config)?;
        Ok(Extractor::new(fetcher, &config.listing)?.with_listings_path(&config.listings_path))
    }

    pub fn create_outputs(
        config: &ScraperConfig,
        multi: Option<Arc<indicatif::MultiProgress>>,
    ) -> Vec<Box<dyn OutputHandler>> {
        config
            .outputs
            .iter()
            .map(|out_config| -> Box<dyn OutputHandler> {
                match out_config {
                    OutputConfig::Console => Box::new(ConsoleOutput::new(multi.clone())),
                    OutputConfig::Json { path } => Box::new(JsonOutput::new(PathBuf::from(path))),
                    OutputConfig::Csv { path } => Box::new(CsvOutput::new(PathBuf::from(path))),
                }
            })
            .collect()
    }
}
