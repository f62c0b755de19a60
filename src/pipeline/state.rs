use crate::doc_processor::DocumentInfo;
use crate::llm::GatewayError;
use crate::prompt::PromptSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ValidatingKey,
    OptimizingPrompt,
    PromptReady,
    GeneratingResponse,
    ResponseReady,
    OptimizingResponse,
    Failed,
}

impl Stage {
    /// A gateway call is outstanding.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Stage::ValidatingKey
                | Stage::OptimizingPrompt
                | Stage::GeneratingResponse
                | Stage::OptimizingResponse
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ValidatingKey => "validating key",
            Stage::OptimizingPrompt => "optimizing prompt",
            Stage::PromptReady => "prompt ready",
            Stage::GeneratingResponse => "generating response",
            Stage::ResponseReady => "response ready",
            Stage::OptimizingResponse => "optimizing response",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    OptimizedPrompt,
    Response,
    OptimizedResponse,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferKind::OptimizedPrompt => "optimized prompt",
            BufferKind::Response => "response",
            BufferKind::OptimizedResponse => "optimized response",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    Validation,
    InvalidKey,
    Remote,
}

/// Last failure of the run, kept for display until the next stage starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
}

impl RunError {
    pub fn validation(message: impl fmt::Display) -> Self {
        Self {
            kind: RunErrorKind::Validation,
            message: message.to_string(),
        }
    }
}

impl From<&GatewayError> for RunError {
    fn from(err: &GatewayError) -> Self {
        let kind = if err.is_invalid_key() {
            RunErrorKind::InvalidKey
        } else {
            RunErrorKind::Remote
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub id: Uuid,
    pub generation: u64,
    pub stage: Stage,
    pub optimized_prompt: Option<String>,
    pub response: Option<String>,
    pub optimized_response: Option<String>,
    pub last_error: Option<RunError>,
    pub dictation_expected: bool,
}

impl PipelineRun {
    pub fn new(generation: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            stage: Stage::Idle,
            optimized_prompt: None,
            response: None,
            optimized_response: None,
            last_error: None,
            dictation_expected: false,
        }
    }

    pub fn buffer(&self, kind: BufferKind) -> Option<&str> {
        match kind {
            BufferKind::OptimizedPrompt => self.optimized_prompt.as_deref(),
            BufferKind::Response => self.response.as_deref(),
            BufferKind::OptimizedResponse => self.optimized_response.as_deref(),
        }
    }

    pub(crate) fn buffer_mut(&mut self, kind: BufferKind) -> &mut Option<String> {
        match kind {
            BufferKind::OptimizedPrompt => &mut self.optimized_prompt,
            BufferKind::Response => &mut self.response,
            BufferKind::OptimizedResponse => &mut self.optimized_response,
        }
    }

    fn has_text(&self, kind: BufferKind) -> bool {
        self.buffer(kind).is_some_and(|b| !b.trim().is_empty())
    }

    pub fn allowed_actions(&self, has_document: bool, has_api_key: bool) -> AllowedActions {
        let idle = !self.stage.is_busy();
        let can_generate = has_document && has_api_key && self.has_text(BufferKind::OptimizedPrompt);
        let mut actions = AllowedActions {
            edit_buffers: idle,
            select_document: idle,
            clear_all: true,
            ..AllowedActions::default()
        };
        match self.stage {
            Stage::Idle => {
                actions.start_analysis = has_document && has_api_key;
            }
            Stage::PromptReady => {
                actions.generate_response = can_generate;
            }
            Stage::ResponseReady => {
                actions.generate_response = can_generate;
                actions.optimize_response = has_api_key && self.has_text(BufferKind::Response);
                actions.apply_optimized_response = self.optimized_response.is_some();
            }
            Stage::ValidatingKey
            | Stage::OptimizingPrompt
            | Stage::GeneratingResponse
            | Stage::OptimizingResponse
            | Stage::Failed => {}
        }
        actions
    }
}

/// Which user affordances are live right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedActions {
    pub start_analysis: bool,
    pub generate_response: bool,
    pub optimize_response: bool,
    pub apply_optimized_response: bool,
    pub edit_buffers: bool,
    pub select_document: bool,
    pub clear_all: bool,
}

/// Read-only view of the session handed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub generation: u64,
    pub stage: Stage,
    pub optimized_prompt: Option<String>,
    pub response: Option<String>,
    pub optimized_response: Option<String>,
    pub last_error: Option<RunError>,
    pub dictation_expected: bool,
    pub document: Option<DocumentInfo>,
    pub prompt: PromptSpec,
    pub actions: AllowedActions,
}
