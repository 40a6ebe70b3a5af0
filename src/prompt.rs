//! Prompt templates keyed by requested summary length.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

const SHORT_INSTRUCTION: &str = "You are an AI summarizer. Provide a very concise, one-paragraph summary of the following text, highlighting the key points:";
const MEDIUM_INSTRUCTION: &str = "You are an AI summarizer. Create a summary of the following document, capturing the essential information and main ideas. Create: 1. A short narrative summary (1 paragraph), 2. Then include at least 3 points, don't bold the text:";
const LONG_INSTRUCTION: &str = "You are an AI summarizer. Read the following document text and create: 1. A short narrative summary (2-3 paragraphs), 2. Then provide a list of key takeaways, do not bold the text:";

/// Summary length selected by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthMode {
    /// One concise paragraph.
    Short,
    /// One paragraph plus at least three points.
    #[default]
    Medium,
    /// Two to three paragraphs plus key takeaways.
    Long,
}

impl LengthMode {
    /// Resolve an optional caller value, falling back to [`LengthMode::Medium`].
    pub fn from_request(value: Option<&str>) -> Self {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    /// Lowercase name as accepted on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    const fn instruction(self) -> &'static str {
        match self {
            Self::Short => SHORT_INSTRUCTION,
            Self::Medium => MEDIUM_INSTRUCTION,
            Self::Long => LONG_INSTRUCTION,
        }
    }
}

impl FromStr for LengthMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LengthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options derived from the request that shape the summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryRequest {
    /// Template selector.
    pub length_mode: LengthMode,
}

impl SummaryRequest {
    /// Build a request from the raw `summaryLength` form value.
    pub fn from_form_value(value: Option<&str>) -> Self {
        Self {
            length_mode: LengthMode::from_request(value),
        }
    }
}

/// Instruction template paired with the document text it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Fixed instruction chosen by length mode.
    pub instruction: &'static str,
    /// Extracted document text, forwarded verbatim.
    pub body: String,
}

impl Prompt {
    /// Render the final prompt string sent to the model.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.instruction, self.body)
    }
}

/// Pair the template for `mode` with the full extracted text.
pub fn build_prompt(mode: LengthMode, extracted_text: &str) -> Prompt {
    Prompt {
        instruction: mode.instruction(),
        body: extracted_text.to_string(),
    }
}
