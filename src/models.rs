use serde::{Deserialize, Serialize};

/// Body of `POST /api/extract`: a link to fetch, or text to pass through.
/// Exactly one of the two keys; anything else is rejected.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExtractRequest {
    Url(UrlBody),
    Text(TextBody),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlBody {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub content: String,
}

/// Flat text produced by any extraction strategy. May be empty.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// The structured reply the provider is asked to produce.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SummaryResult {
    pub summary: String,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
}
