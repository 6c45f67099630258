//! Languages of the corpus and the model packages used for each of them.
use std::collections::HashMap;

use lazy_static::lazy_static;

lazy_static! {
    /// Default language code → model package mapping.
    /// Can be overridden by the `[models]` config section.
    pub static ref DEFAULT_MODELS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("de", "de_core_news_lg");
        m.insert("fr", "fr_core_news_lg");
        m.insert("it", "it_core_news_lg");
        m
    };
}

/// Languages processed when none are configured.
pub const DEFAULT_LANGUAGES: [&str; 3] = ["de", "fr", "it"];

/// Pipes disabled by default: tag, pos and lemma are enough for now.
pub const DEFAULT_DISABLED_PIPES: [&str; 4] = ["senter", "ner", "attribute_ruler", "textcat"];

/// Owned copy of [DEFAULT_MODELS].
pub fn default_models() -> HashMap<String, String> {
    DEFAULT_MODELS
        .iter()
        .map(|(lang, model)| (lang.to_string(), model.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_default_languages() {
        let models = default_models();
        for lang in DEFAULT_LANGUAGES {
            assert!(models.contains_key(lang), "{lang} has no default model");
        }
    }
}
