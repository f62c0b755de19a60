use crate::doc_processor::Document;
use crate::llm::{Credentials, OptimizePromptRequest};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an experienced medical scribe with 15 years of clinical experience and expertise in clinical documentation across multiple medical specialties. Using standard medical intake forms and your documentation skills, create a structured clinical note in JSON format based on the provided voice dictation.";

pub const DEFAULT_INSTRUCTIONS: &str = "Focus on factual information and avoid speculation.";

pub const DEFAULT_EXAMPLE_OUTPUT: &str = "## Summary
[Brief overview of the document]

## Key Findings
• Finding 1
• Finding 2

## Recommendations
1. Action item 1
2. Action item 2";

pub const VOICE_DICTATION_PLACEHOLDER: &str = "voice_dictation";

/// Quick picks offered next to each editor field.
pub mod presets {
    pub const SYSTEM_PROMPTS: [&str; 5] = [
        "Analyze this document and extract key insights, themes, and important information.",
        "Summarize the main points and provide actionable recommendations.",
        "Extract all data points, metrics, and statistics from this document.",
        "Identify potential risks, issues, or areas of concern mentioned in the document.",
        "Create a structured outline of the document's content and hierarchy.",
    ];

    pub const INSTRUCTIONS: [&str; 5] = [
        "Focus on factual information and avoid speculation.",
        "Organize the response in clear sections with headings.",
        "Include specific quotes or references from the document.",
        "Highlight any actionable items or recommendations.",
        "Maintain objectivity and professional tone throughout.",
    ];

    pub const EXAMPLE_OUTPUTS: [&str; 4] = [
        "## Summary\n[Brief overview of the document]\n\n## Key Findings\n• Finding 1\n• Finding 2\n\n## Recommendations\n1. Action item 1\n2. Action item 2",
        "**Document Type:** [Type]\n**Main Topic:** [Topic]\n**Key Metrics:** [Numbers/Statistics]\n**Action Items:** [What needs to be done]",
        "### Executive Summary\n[High-level overview]\n\n### Detailed Analysis\n[In-depth findings]\n\n### Next Steps\n[Recommended actions]",
        "## Risk Assessment\n**High Priority Issues:**\n- Issue 1\n- Issue 2\n\n**Medium Priority Issues:**\n- Issue 3\n\n**Recommendations:**\n- Solution 1\n- Solution 2",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptField {
    SystemPrompt,
    Instructions,
    ExampleOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub system_prompt: String,
    pub instructions: String,
    pub example_output: String,
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            example_output: DEFAULT_EXAMPLE_OUTPUT.to_string(),
        }
    }
}

impl PromptSpec {
    pub fn field_mut(&mut self, field: PromptField) -> &mut String {
        match field {
            PromptField::SystemPrompt => &mut self.system_prompt,
            PromptField::Instructions => &mut self.instructions,
            PromptField::ExampleOutput => &mut self.example_output,
        }
    }

    /// Append dictated text to a field. Blank transcripts are ignored.
    pub fn apply_dictation(&mut self, field: PromptField, transcript: &str) -> bool {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return false;
        }
        let target = self.field_mut(field);
        if !target.trim().is_empty() {
            target.push('\n');
        }
        target.push_str(transcript);
        true
    }

    /// Replace a field with one of its presets. Returns false for an unknown index.
    pub fn apply_preset(&mut self, field: PromptField, index: usize) -> bool {
        let preset = match field {
            PromptField::SystemPrompt => presets::SYSTEM_PROMPTS.get(index),
            PromptField::Instructions => presets::INSTRUCTIONS.get(index),
            PromptField::ExampleOutput => presets::EXAMPLE_OUTPUTS.get(index),
        };
        match preset {
            Some(text) => {
                *self.field_mut(field) = text.to_string();
                true
            }
            None => false,
        }
    }
}

/// Everything the optimize-prompt call sends.
pub type PromptPayload = OptimizePromptRequest;

/// Build the optimize-prompt payload. Pure; the caller supplies the config snapshot.
pub fn assemble(spec: &PromptSpec, document: &Document, credentials: Credentials) -> PromptPayload {
    OptimizePromptRequest {
        system_prompt: spec.system_prompt.clone(),
        instructions: spec.instructions.clone(),
        example_output: spec.example_output.clone(),
        document_name: document.name.clone(),
        document_bytes: document.bytes.clone(),
        credentials,
    }
}

/// True when the first single-line `{...}` group in `prompt` is the voice dictation slot.
/// A `{` whose group would span a line break is skipped.
pub fn expects_voice_dictation(prompt: &str) -> bool {
    let mut rest = prompt;
    while let Some(open) = rest.find('{') {
        let inner = &rest[open + 1..];
        match inner.find(['}', '\n', '\r']) {
            Some(end) if inner[end..].starts_with('}') => {
                return &inner[..end] == VOICE_DICTATION_PLACEHOLDER;
            }
            Some(_) => rest = inner,
            None => return false,
        }
    }
    false
}
