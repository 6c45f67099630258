/*! Processed documents.

A [Doc] is a sequence of [Token]s covering the whole source text: every token
keeps its text and whether it is followed by a single space, so that the
original text can be rebuilt from the tokens alone.

Attributes filled by pipes (`pos`, `lemma`, `sent_start`) stay [None] when the
pipe is disabled.
!*/
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Error;

/// Coarse part of speech, derived from character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pos {
    Word,
    Num,
    Punct,
    Sym,
    Space,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// byte offset in the source text
    pub idx: usize,
    pub text: String,
    /// followed by a single space
    pub whitespace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Pos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_start: Option<bool>,
}

impl Token {
    fn new(idx: usize, text: &str) -> Self {
        Self {
            idx,
            text: text.to_string(),
            whitespace: false,
            pos: None,
            lemma: None,
            sent_start: None,
        }
    }

    pub fn is_space(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Doc {
    tokens: Vec<Token>,
}

impl Doc {
    /// Tokenize `text` on unicode word boundaries.
    ///
    /// A single space following a token is folded into the token's `whitespace` flag,
    /// any other whitespace run becomes its own token.
    pub fn tokenize(text: &str) -> Self {
        let mut tokens: Vec<Token> = Vec::new();

        for (idx, segment) in text.split_word_bound_indices() {
            if segment == " " {
                if let Some(last) = tokens.last_mut() {
                    if !last.whitespace && !last.is_space() {
                        last.whitespace = true;
                        continue;
                    }
                }
            }
            tokens.push(Token::new(idx, segment));
        }

        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Rebuild the source text.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for token in &self.tokens {
            text.push_str(&token.text);
            if token.whitespace {
                text.push(' ');
            }
        }
        text
    }

    /// Sentences, as token slices. Only meaningful if sentence starts have been set.
    pub fn sents(&self) -> Vec<&[Token]> {
        let mut sents = Vec::new();
        let mut start = 0;
        for (i, token) in self.tokens.iter().enumerate() {
            if i > start && token.sent_start == Some(true) {
                sents.push(&self.tokens[start..i]);
                start = i;
            }
        }
        if start < self.tokens.len() {
            sents.push(&self.tokens[start..]);
        }
        sents
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_folds_single_spaces() {
        let doc = Doc::tokenize("Das Bundesgericht zieht in Erwägung:");
        let texts: Vec<&str> = doc.tokens().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Das", "Bundesgericht", "zieht", "in", "Erwägung", ":"]
        );
        assert!(doc.tokens()[0].whitespace);
        assert!(!doc.tokens()[4].whitespace);
        assert_eq!(doc.tokens()[1].idx, 4);
    }

    #[test]
    fn text_is_rebuilt_exactly() {
        let texts = [
            "",
            " leading space",
            "two  spaces and\na newline",
            "trailing space ",
            "Art. 29 Abs. 2 BV;  l'arrêt du 3 mai 2019.\n\n",
        ];
        for text in texts {
            assert_eq!(Doc::tokenize(text).text(), text);
        }
    }

    #[test]
    fn bytes_reload_same_doc() {
        let mut doc = Doc::tokenize("Le recours est rejeté.");
        doc.tokens_mut()[0].lemma = Some("le".to_string());

        let bytes = doc.to_bytes().unwrap();
        assert_eq!(Doc::from_bytes(&bytes).unwrap(), doc);
    }

    #[test]
    fn sents_without_starts_is_one_sentence() {
        let doc = Doc::tokenize("Eins. Zwei.");
        assert_eq!(doc.sents().len(), 1);
    }
}
