//! Configuration loading.
//!
//! Settings come from an INI file (by default `config.ini` at the project root),
//! and can be overridden by environment variables of the form `SCRC__SECTION__KEY`
//! (e.g. `SCRC__NLP__CHUNK_SIZE=500`).
//!
//! Every key has a default, so a missing file yields a usable configuration.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use log::{debug, warn};
use serde::Deserialize;

use crate::error::Error;
use crate::lang::{default_models, DEFAULT_DISABLED_PIPES, DEFAULT_LANGUAGES};

/// Environment variable prefix.
const ENV_PREFIX: &str = "SCRC";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub dir: DirSettings,
    #[serde(default)]
    pub dataset_construction: DatasetConstruction,
    #[serde(default)]
    pub nlp: NlpSettings,
    #[serde(default = "default_models")]
    pub models: HashMap<String, String>,
    #[serde(default)]
    pub extractors: ExtractorSettings,
    #[serde(default)]
    pub alert: AlertSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_progress_dir")]
    pub progress_dir: PathBuf,
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConstruction {
    /// Comma separated language codes.
    #[serde(default = "default_languages")]
    pub languages: String,
    #[serde(default = "default_split_subdir")]
    pub split_subdir: String,
    #[serde(default = "default_spacy_subdir")]
    pub spacy_subdir: String,
    #[serde(default = "default_extracted_subdir")]
    pub extracted_subdir: String,
}

/// How an interrupted chamber is detected on rerun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// A chamber whose chunk 0 exists is skipped as a whole.
    #[default]
    FirstChunk,
    /// Every chunk is checked individually, missing ones are (re)computed.
    EveryChunk,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NlpSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Number of worker threads used by the model, 0 means one per core.
    #[serde(default)]
    pub n_process: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Comma separated pipe names.
    #[serde(default = "default_disable_pipes")]
    pub disable_pipes: String,
    #[serde(default, rename = "override")]
    pub override_chunks: bool,
    #[serde(default)]
    pub resume: ResumeMode,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExtractorSettings {
    /// Fail at startup when a spider has no extraction function.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_progress_dir() -> PathBuf {
    PathBuf::from("progress")
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_languages() -> String {
    DEFAULT_LANGUAGES.join(",")
}

fn default_split_subdir() -> String {
    "split".to_string()
}

fn default_spacy_subdir() -> String {
    "spacy".to_string()
}

fn default_extracted_subdir() -> String {
    "extracted".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_batch_size() -> usize {
    1
}

fn default_max_length() -> usize {
    2_000_000
}

fn default_disable_pipes() -> String {
    DEFAULT_DISABLED_PIPES.join(",")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dir: DirSettings::default(),
            dataset_construction: DatasetConstruction::default(),
            nlp: NlpSettings::default(),
            models: default_models(),
            extractors: ExtractorSettings::default(),
            alert: AlertSettings::default(),
        }
    }
}

impl Default for DirSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            progress_dir: default_progress_dir(),
            models_dir: default_models_dir(),
        }
    }
}

impl Default for DatasetConstruction {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            split_subdir: default_split_subdir(),
            spacy_subdir: default_spacy_subdir(),
            extracted_subdir: default_extracted_subdir(),
        }
    }
}

impl Default for NlpSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            batch_size: default_batch_size(),
            n_process: 0,
            max_length: default_max_length(),
            disable_pipes: default_disable_pipes(),
            override_chunks: false,
            resume: ResumeMode::default(),
        }
    }
}

impl NlpSettings {
    pub fn disable_pipes(&self) -> Vec<String> {
        split_list(&self.disable_pipes)
    }
}

impl AlertSettings {
    /// Webhook url, ignoring blank values.
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Split a comma separated list, dropping blank items.
fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

impl Settings {
    /// Load settings from the INI file at `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            warn!("config file {:?} not found, using defaults", path);
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        debug!("settings\n{:#?}", settings);
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.nlp.chunk_size == 0 {
            return Err(Error::Custom("nlp.chunk_size must be at least 1".to_string()));
        }
        if self.nlp.batch_size == 0 {
            return Err(Error::Custom("nlp.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn languages(&self) -> Vec<String> {
        split_list(&self.dataset_construction.languages)
    }

    /// `<data_dir>/<split_subdir>`: one directory per language holding chamber partitions.
    pub fn split_dir(&self) -> PathBuf {
        self.dir
            .data_dir
            .join(&self.dataset_construction.split_subdir)
    }

    /// `<data_dir>/<spacy_subdir>`: enriched chunks, ledgers and vocabularies.
    pub fn spacy_dir(&self) -> PathBuf {
        self.dir
            .data_dir
            .join(&self.dataset_construction.spacy_subdir)
    }

    /// `<data_dir>/<extracted_subdir>`: extractor outputs.
    pub fn extracted_dir(&self) -> PathBuf {
        self.dir
            .data_dir
            .join(&self.dataset_construction.extracted_subdir)
    }
}
