/*! Pipeline components.

Each [Pipe] fills one kind of token attribute. Pipes are run in the order declared
by the model package metadata.
!*/
use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

use super::doc::{Doc, Pos};

/// A pipeline component, run on each document after tokenization.
pub trait Pipe {
    fn name(&self) -> &'static str;
    fn process(&self, doc: &mut Doc);
}

/// Sets [Pos] from character classes.
#[derive(Default)]
pub struct Tagger;

impl Tagger {
    fn is_punct(c: char) -> bool {
        c.is_ascii_punctuation()
            || matches!(
                c,
                '«' | '»' | '‹' | '›' | '„' | '“' | '”' | '‘' | '’' | '–' | '—' | '…' | '§' | '¶'
            )
    }

    fn tag(text: &str) -> Pos {
        if text.chars().all(char::is_whitespace) {
            Pos::Space
        } else if text.chars().any(char::is_alphabetic) {
            Pos::Word
        } else if text.chars().any(|c| c.is_numeric())
            && text
                .chars()
                .all(|c| c.is_numeric() || matches!(c, '.' | ',' | '\'' | '’'))
        {
            Pos::Num
        } else if text.chars().all(Self::is_punct) {
            Pos::Punct
        } else {
            Pos::Sym
        }
    }
}

impl Pipe for Tagger {
    fn name(&self) -> &'static str {
        "tagger"
    }

    fn process(&self, doc: &mut Doc) {
        for token in doc.tokens_mut() {
            token.pos = Some(Self::tag(&token.text));
        }
    }
}

/// Lookup based lemmatizer.
///
/// Lemmas come from the model's lookup table (keyed by lowercased form),
/// falling back to the lowercased form itself.
#[derive(Default)]
pub struct Lemmatizer {
    lookup: HashMap<String, String>,
}

impl Lemmatizer {
    pub fn new(lookup: HashMap<String, String>) -> Self {
        Self { lookup }
    }

    pub fn lemma(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        match self.lookup.get(&lower) {
            Some(lemma) => lemma.clone(),
            None => lower,
        }
    }
}

impl Pipe for Lemmatizer {
    fn name(&self) -> &'static str {
        "lemmatizer"
    }

    fn process(&self, doc: &mut Doc) {
        for token in doc.tokens_mut().iter_mut().filter(|t| !t.is_space()) {
            token.lemma = Some(self.lemma(&token.text));
        }
    }
}

/// Sentence boundaries from unicode sentence segmentation.
///
/// The first non-space token at or after each boundary starts a sentence.
#[derive(Default)]
pub struct Senter;

impl Pipe for Senter {
    fn name(&self) -> &'static str {
        "senter"
    }

    fn process(&self, doc: &mut Doc) {
        let text = doc.text();
        let mut boundaries = text.split_sentence_bound_indices().map(|(idx, _)| idx);
        let mut next_boundary = boundaries.next();

        for token in doc.tokens_mut() {
            if token.is_space() {
                continue;
            }
            let mut starts = false;
            while let Some(b) = next_boundary {
                if b > token.idx {
                    break;
                }
                starts = true;
                next_boundary = boundaries.next();
            }
            token.sent_start = Some(starts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagger_classes() {
        let mut doc = Doc::tokenize("Art. 29 BV: 1'000 Fr. § 3 + x");
        Tagger.process(&mut doc);

        let tags: Vec<(String, Pos)> = doc
            .tokens()
            .iter()
            .map(|t| (t.text.clone(), t.pos.unwrap()))
            .collect();
        assert!(tags.contains(&("Art".to_string(), Pos::Word)));
        assert!(tags.contains(&(".".to_string(), Pos::Punct)));
        assert!(tags.contains(&("29".to_string(), Pos::Num)));
        assert!(tags.contains(&("1'000".to_string(), Pos::Num)));
        assert!(tags.contains(&("§".to_string(), Pos::Punct)));
        assert!(tags.contains(&("+".to_string(), Pos::Punct)));
    }

    #[test]
    fn lemmatizer_uses_lookup_then_lowercase() {
        let mut lookup = HashMap::new();
        lookup.insert("erwägungen".to_string(), "erwägung".to_string());
        let lemmatizer = Lemmatizer::new(lookup);

        let mut doc = Doc::tokenize("Erwägungen Gericht");
        lemmatizer.process(&mut doc);

        assert_eq!(doc.tokens()[0].lemma.as_deref(), Some("erwägung"));
        assert_eq!(doc.tokens()[1].lemma.as_deref(), Some("gericht"));
    }

    #[test]
    fn senter_marks_sentence_starts() {
        let mut doc = Doc::tokenize("Der Rekurs ist begründet. Die Kosten trägt der Staat.");
        Senter.process(&mut doc);

        let starts: Vec<&str> = doc
            .tokens()
            .iter()
            .filter(|t| t.sent_start == Some(true))
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(starts, vec!["Der", "Die"]);
        assert_eq!(doc.sents().len(), 2);
    }
}
