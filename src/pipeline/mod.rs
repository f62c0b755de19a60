//! Sequences the gateway calls of one prompt run.
//!
//! The session lives behind a mutex that is never held across an `.await`.
//! Each stage-advancing action takes a ticket (the run generation) before its
//! call goes out and presents it again when the reply lands; `clear_all` bumps
//! the generation, so a reply that outlives its run is dropped instead of
//! being written into the next one.

mod state;

pub use state::{
    AllowedActions, BufferKind, PipelineRun, RunError, RunErrorKind, RunSnapshot, Stage,
};

use crate::config::{ConfigError, ConfigStore, DEFAULT_GATEWAY_TIMEOUT_SECS};
use crate::doc_processor::{self, Document, DocumentError, DocumentInfo, SelectedFile};
use crate::llm::{
    Credentials, GatewayError, GenerateRequest, InferenceGateway, OptimizeResponseRequest,
};
use crate::prompt::{self, PromptField, PromptSpec};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartAnalysis,
    GenerateResponse,
    OptimizeResponse,
    ApplyOptimizedResponse,
    EditBuffer,
    ExportBuffer,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::StartAnalysis => "start analysis",
            Action::GenerateResponse => "generate a response",
            Action::OptimizeResponse => "optimize the response",
            Action::ApplyOptimizedResponse => "apply the optimized response",
            Action::EditBuffer => "edit a result",
            Action::ExportBuffer => "export a result",
        };
        f.write_str(name)
    }
}

/// Rejected before any remote call; the stage does not change.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select a document first")]
    MissingDocument,
    #[error("Please enter a system prompt")]
    EmptySystemPrompt,
    #[error("Please enter an API key")]
    MissingApiKey,
    #[error("The {0} is empty")]
    EmptyBuffer(BufferKind),
    #[error("{0}")]
    Extraction(#[source] DocumentError),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("A request is already in progress ({0})")]
    Busy(Stage),
    #[error("Cannot {action} while the run is {stage}")]
    NotAllowed { action: Action, stage: Stage },
    #[error("The run was cleared before the reply arrived")]
    Superseded,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    generation: u64,
}

struct Session {
    run: PipelineRun,
    document: Option<Document>,
    prompt: PromptSpec,
}

impl Session {
    fn new(generation: u64) -> Self {
        Self {
            run: PipelineRun::new(generation),
            document: None,
            prompt: PromptSpec::default(),
        }
    }

    fn ensure(&self, action: Action, allowed: &[Stage]) -> Result<(), PipelineError> {
        let stage = self.run.stage;
        if stage.is_busy() {
            return Err(PipelineError::Busy(stage));
        }
        if !allowed.contains(&stage) {
            return Err(PipelineError::NotAllowed { action, stage });
        }
        Ok(())
    }

    fn ensure_not_busy(&self) -> Result<(), PipelineError> {
        match self.run.stage {
            stage if stage.is_busy() => Err(PipelineError::Busy(stage)),
            _ => Ok(()),
        }
    }

    /// Everything `start_analysis` checks before any call, in order. Returns the document id.
    fn check_start(&self) -> Result<Uuid, PipelineError> {
        self.ensure(Action::StartAnalysis, &[Stage::Idle])?;
        let document = self
            .document
            .as_ref()
            .ok_or(ValidationError::MissingDocument)?;
        if self.prompt.system_prompt.trim().is_empty() {
            return Err(ValidationError::EmptySystemPrompt.into());
        }
        Ok(document.id)
    }

    fn check_generate(&self) -> Result<(String, Uuid), PipelineError> {
        self.ensure(
            Action::GenerateResponse,
            &[Stage::PromptReady, Stage::ResponseReady],
        )?;
        let prompt = self
            .run
            .optimized_prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ValidationError::EmptyBuffer(BufferKind::OptimizedPrompt))?;
        let document = self
            .document
            .as_ref()
            .ok_or(ValidationError::MissingDocument)?;
        Ok((prompt, document.id))
    }

    /// The document was swapped while its text was being extracted.
    fn check_document(&self, id: Uuid) -> Result<(), PipelineError> {
        if self.document.as_ref().map(|d| d.id) != Some(id) {
            warn!(document_id = %id, "document replaced during extraction");
            return Err(PipelineError::Superseded);
        }
        Ok(())
    }

    fn transition(&mut self, to: Stage) {
        debug!(
            run_id = %self.run.id,
            generation = self.run.generation,
            from = %self.run.stage,
            to = %to,
            "stage transition"
        );
        self.run.stage = to;
    }

    fn begin(&mut self, stage: Stage) -> Ticket {
        self.run.last_error = None;
        self.transition(stage);
        Ticket {
            generation: self.run.generation,
        }
    }

    fn check(&self, ticket: Ticket) -> Result<(), PipelineError> {
        if ticket.generation != self.run.generation {
            warn!(
                stale_generation = ticket.generation,
                generation = self.run.generation,
                "discarding reply for a cleared run"
            );
            return Err(PipelineError::Superseded);
        }
        Ok(())
    }

    fn fail(&mut self, error: RunError) {
        warn!(
            run_id = %self.run.id,
            stage = %self.run.stage,
            kind = ?error.kind,
            message = %error.message,
            "run failed"
        );
        self.run.last_error = Some(error);
        self.transition(Stage::Failed);
    }
}

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS);

/// Owns the one active run of a session and drives the gateway for it.
pub struct Pipeline {
    session: Mutex<Session>,
    config: ConfigStore,
    gateway: Arc<dyn InferenceGateway>,
    call_timeout: Duration,
}

impl Pipeline {
    pub fn new(config: ConfigStore, gateway: Arc<dyn InferenceGateway>) -> Self {
        Self {
            session: Mutex::new(Session::new(0)),
            config,
            gateway,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn credentials(&self) -> Result<Credentials, PipelineError> {
        Ok(self
            .config
            .get()?
            .credentials()
            .ok_or(ValidationError::MissingApiKey)?)
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        match tokio::time::timeout(self.call_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.call_timeout)),
        }
    }

    /// Text of the selected document, extracted off the executor and without the
    /// session lock, then cached on the document it came from.
    async fn document_text(&self, id: Uuid) -> Result<String, PipelineError> {
        let (kind, bytes) = {
            let session = self.session();
            session.check_document(id)?;
            let Some(document) = session.document.as_ref() else {
                return Err(ValidationError::MissingDocument.into());
            };
            if let Some(text) = document.extracted_text() {
                return Ok(text.to_string());
            }
            (document.kind, document.bytes.clone())
        };

        let text = doc_processor::extract_text(kind, bytes)
            .await
            .map_err(ValidationError::Extraction)?;

        let mut session = self.session();
        if let Some(document) = session.document.as_mut().filter(|d| d.id == id) {
            document.cache_text(text.clone());
        }
        Ok(text)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let has_api_key = match self.config.get() {
            Ok(config) => config.api_key.is_some(),
            Err(e) => {
                warn!(error = %e, "could not read configuration");
                false
            }
        };
        let session = self.session();
        let run = &session.run;
        RunSnapshot {
            run_id: run.id,
            generation: run.generation,
            stage: run.stage,
            optimized_prompt: run.optimized_prompt.clone(),
            response: run.response.clone(),
            optimized_response: run.optimized_response.clone(),
            last_error: run.last_error.clone(),
            dictation_expected: run.dictation_expected,
            document: session.document.as_ref().map(Document::info),
            prompt: session.prompt.clone(),
            actions: run.allowed_actions(session.document.is_some(), has_api_key),
        }
    }

    pub fn stage(&self) -> Stage {
        self.session().run.stage
    }

    // ── Inputs ──

    pub fn select_document(&self, file: SelectedFile) -> Result<DocumentInfo, PipelineError> {
        let mut session = self.session();
        session.ensure_not_busy()?;
        let document = doc_processor::select(file)?;
        let info = document.info();
        info!(name = %info.name, kind = ?info.kind, size = info.size, "document selected");
        session.document = Some(document);
        Ok(info)
    }

    pub fn select_document_path(&self, path: &Path) -> Result<DocumentInfo, PipelineError> {
        self.select_document(SelectedFile::from_path(path)?)
    }

    pub fn clear_document(&self) -> Result<(), PipelineError> {
        let mut session = self.session();
        session.ensure_not_busy()?;
        session.document = None;
        Ok(())
    }

    pub fn prompt_spec(&self) -> PromptSpec {
        self.session().prompt.clone()
    }

    /// Editable at any time; a run captures the fields when it starts.
    pub fn update_prompt_spec(&self, spec: PromptSpec) {
        self.session().prompt = spec;
    }

    pub fn apply_dictation(&self, field: PromptField, transcript: &str) -> bool {
        self.session().prompt.apply_dictation(field, transcript)
    }

    pub fn apply_preset(&self, field: PromptField, index: usize) -> bool {
        self.session().prompt.apply_preset(field, index)
    }

    // ── Stages ──

    /// Validate the key, then turn the prompt fields and document into an optimized prompt.
    ///
    /// The prompt fields are captured when the run starts; later edits apply to the next run.
    pub async fn start_analysis(&self) -> Result<RunSnapshot, PipelineError> {
        let document_id = self.session().check_start()?;
        self.credentials()?;
        self.document_text(document_id).await?;

        let (ticket, credentials, spec) = {
            let mut session = self.session();
            session.check_document(document_id)?;
            session.check_start()?;
            let credentials = self.credentials()?;
            let spec = session.prompt.clone();
            let ticket = session.begin(Stage::ValidatingKey);
            info!(
                run_id = %session.run.id,
                model = %credentials.model,
                "starting analysis"
            );
            (ticket, credentials, spec)
        };

        let outcome = self
            .call(self.gateway.validate_key(credentials.model, &credentials.api_key))
            .await;

        let payload = {
            let mut guard = self.session();
            let session = &mut *guard;
            session.check(ticket)?;
            if let Err(e) = outcome {
                session.run.response = None;
                session.fail(RunError::from(&e));
                return Err(e.into());
            }
            let credentials = match self.credentials() {
                Ok(credentials) => credentials,
                Err(e) => {
                    session.fail(RunError::validation(&e));
                    return Err(e);
                }
            };
            let Some(document) = session.document.as_ref() else {
                session.fail(RunError::validation(ValidationError::MissingDocument));
                return Err(ValidationError::MissingDocument.into());
            };
            let payload = prompt::assemble(&spec, document, credentials);
            session.transition(Stage::OptimizingPrompt);
            payload
        };

        let outcome = self.call(self.gateway.optimize_prompt(&payload)).await;

        let mut session = self.session();
        session.check(ticket)?;
        match outcome {
            Ok(text) => {
                session.run.optimized_prompt = Some(text);
                session.transition(Stage::PromptReady);
                info!(run_id = %session.run.id, "optimized prompt ready");
            }
            Err(e) => {
                session.fail(RunError::from(&e));
                return Err(e.into());
            }
        }
        drop(session);
        Ok(self.snapshot())
    }

    /// Run the optimized prompt, as currently edited, against the document.
    pub async fn generate_response(&self) -> Result<RunSnapshot, PipelineError> {
        let (_, document_id) = self.session().check_generate()?;
        let document_text = self.document_text(document_id).await?;

        let (ticket, request) = {
            let mut session = self.session();
            session.check_document(document_id)?;
            let (prompt, _) = session.check_generate()?;
            let credentials = self.credentials()?;

            session.run.dictation_expected = prompt::expects_voice_dictation(&prompt);
            if session.run.dictation_expected {
                info!(run_id = %session.run.id, "prompt expects voice dictation");
            }
            let ticket = session.begin(Stage::GeneratingResponse);
            let request = GenerateRequest {
                prompt,
                document_text: Some(document_text),
                credentials,
            };
            (ticket, request)
        };

        let outcome = self.call(self.gateway.generate_response(&request)).await;

        let mut session = self.session();
        session.check(ticket)?;
        match outcome {
            Ok(text) => {
                session.run.response = Some(text);
                session.run.optimized_response = None;
                session.transition(Stage::ResponseReady);
                info!(run_id = %session.run.id, "response ready");
            }
            Err(e) => {
                session.fail(RunError::from(&e));
                return Err(e.into());
            }
        }
        drop(session);
        Ok(self.snapshot())
    }

    /// Polish the response. Failure leaves the response untouched.
    pub async fn optimize_response(&self) -> Result<RunSnapshot, PipelineError> {
        let (ticket, request) = {
            let mut session = self.session();
            session.ensure(Action::OptimizeResponse, &[Stage::ResponseReady])?;
            let response = session
                .run
                .response
                .clone()
                .filter(|r| !r.trim().is_empty())
                .ok_or(ValidationError::EmptyBuffer(BufferKind::Response))?;
            let credentials = self.credentials()?;
            let ticket = session.begin(Stage::OptimizingResponse);
            (
                ticket,
                OptimizeResponseRequest {
                    response,
                    credentials,
                },
            )
        };

        let outcome = self.call(self.gateway.optimize_response(&request)).await;

        let mut session = self.session();
        session.check(ticket)?;
        session.transition(Stage::ResponseReady);
        match outcome {
            Ok(text) => {
                session.run.optimized_response = Some(text);
                info!(run_id = %session.run.id, "optimized response ready");
            }
            Err(e) => {
                warn!(run_id = %session.run.id, error = %e, "response optimization failed");
                session.run.last_error = Some(RunError::from(&e));
                return Err(e.into());
            }
        }
        drop(session);
        Ok(self.snapshot())
    }

    // ── Result buffers ──

    /// Overwrite a populated buffer; the next stage reads the edited text.
    pub fn edit_buffer(&self, kind: BufferKind, text: String) -> Result<(), PipelineError> {
        let mut session = self.session();
        session.ensure_not_busy()?;
        let stage = session.run.stage;
        match session.run.buffer_mut(kind) {
            Some(buffer) => {
                *buffer = text;
                Ok(())
            }
            None => Err(PipelineError::NotAllowed {
                action: Action::EditBuffer,
                stage,
            }),
        }
    }

    pub fn apply_optimized_response(&self) -> Result<(), PipelineError> {
        let mut session = self.session();
        session.ensure(Action::ApplyOptimizedResponse, &[Stage::ResponseReady])?;
        match session.run.optimized_response.take() {
            Some(optimized) => {
                session.run.response = Some(optimized);
                Ok(())
            }
            None => Err(PipelineError::NotAllowed {
                action: Action::ApplyOptimizedResponse,
                stage: Stage::ResponseReady,
            }),
        }
    }

    pub fn export_buffer(&self, kind: BufferKind, path: &Path) -> Result<(), PipelineError> {
        let text = {
            let session = self.session();
            session
                .run
                .buffer(kind)
                .map(str::to_string)
                .ok_or(PipelineError::NotAllowed {
                    action: Action::ExportBuffer,
                    stage: session.run.stage,
                })?
        };
        std::fs::write(path, text)?;
        info!(buffer = %kind, path = %path.display(), "buffer exported");
        Ok(())
    }

    /// Back to a fresh idle run. Configuration is left alone.
    pub fn clear_all(&self) -> RunSnapshot {
        {
            let mut session = self.session();
            let generation = session.run.generation + 1;
            info!(
                run_id = %session.run.id,
                stage = %session.run.stage,
                generation,
                "clearing session"
            );
            *session = Session::new(generation);
        }
        self.snapshot()
    }
}
