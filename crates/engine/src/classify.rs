//! Preamble selection.
//!
//! The completion prompt opens with a persona preamble in the language the
//! user appears to be writing. "Appears" is doing a lot of work: the
//! default classifier only inspects the first character of the question —
//! an ASCII letter selects the English preamble, anything else (CJK,
//! digits, punctuation, emoji, empty input) selects the Chinese one.
//!
//! This is a crude script detector, not a language classifier, and it is
//! kept deliberately: replacing it with real language detection would
//! change which preamble users see for established inputs. It sits behind
//! a trait so a deployment that wants something smarter can swap it in.

/// The two prompt languages the bot ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Chinese,
    English,
}

impl Language {
    /// The instruction preamble opening every prompt.
    pub fn preamble(self) -> &'static str {
        match self {
            Language::Chinese => {
                "你是 ChatGPT, 一个由 OpenAI 训练的大型语言模型, 你旨在回答并解决人们的任何问题，并且可以使用多种语言与人交流。\n请回答我下面的问题\n"
            }
            Language::English => {
                "You are ChatGPT, a LLM model trained by OpenAI. \nplease answer my following question\n"
            }
        }
    }
}

/// Chooses the preamble language for a question.
pub trait PreambleClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Language;
}

/// First-character script heuristic: ASCII letter → English, everything
/// else → Chinese. Empty input has no first character and falls through to
/// Chinese.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCharClassifier;

impl PreambleClassifier for FirstCharClassifier {
    fn classify(&self, question: &str) -> Language {
        match question.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => Language::English,
            _ => Language::Chinese,
        }
    }
}
