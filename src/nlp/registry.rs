//! Language → model package resolution.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::info;

use super::{Language, LanguageBuilder};
use crate::error::Error;

/// Maps language codes to model package names, looked up in `models_dir`.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models_dir: PathBuf,
    models: HashMap<String, String>,
}

impl ModelRegistry {
    pub fn new(models_dir: &Path, models: HashMap<String, String>) -> Self {
        Self {
            models_dir: models_dir.to_path_buf(),
            models,
        }
    }

    pub fn model_name(&self, lang: &str) -> Result<&str, Error> {
        self.models
            .get(lang)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownLang(lang.to_string()))
    }

    pub fn model_path(&self, lang: &str) -> Result<PathBuf, Error> {
        Ok(self.models_dir.join(self.model_name(lang)?))
    }

    /// Load the model of `lang` with the settings of `builder`.
    ///
    /// Fails if no model is registered for `lang` or if its package is missing.
    pub fn load(&self, lang: &str, builder: &mut LanguageBuilder) -> Result<Language, Error> {
        let path = self.model_path(lang)?;
        if !path.is_dir() {
            return Err(Error::ModelNotFound {
                lang: lang.to_string(),
                path,
            });
        }

        info!("[{}] loading model {:?}", lang, path);
        let model = builder.path(&path).build()?;

        if model.lang() != lang {
            return Err(Error::ModelMeta(format!(
                "model {:?} is for language {}, expected {}",
                path,
                model.lang(),
                lang
            )));
        }
        Ok(model)
    }
}
