//! Shared fixtures: an in-memory gateway with scripted replies and a pipeline
//! backed by a throwaway settings database.

#![allow(dead_code)]

use prompt_scribe_lib::config::ConfigStore;
use prompt_scribe_lib::db::Database;
use prompt_scribe_lib::doc_processor::SelectedFile;
use prompt_scribe_lib::llm::{
    GatewayError, GenerateRequest, InferenceGateway, ModelId, OptimizePromptRequest,
    OptimizeResponseRequest,
};
use prompt_scribe_lib::pipeline::Pipeline;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ValidateKey,
    OptimizePrompt,
    GenerateResponse,
    OptimizeResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ValidateKey { model: ModelId, api_key: String },
    OptimizePrompt(OptimizePromptRequest),
    GenerateResponse(GenerateRequest),
    OptimizeResponse(OptimizeResponseRequest),
}

/// Parks a call until the test lets it go.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct ScriptedGateway {
    validate: Mutex<VecDeque<Result<(), GatewayError>>>,
    prompts: Mutex<VecDeque<Result<String, GatewayError>>>,
    responses: Mutex<VecDeque<Result<String, GatewayError>>>,
    optimized: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: Mutex<Vec<Call>>,
    gated: Mutex<Option<Op>>,
    hung: Mutex<Option<Op>>,
    pub gate: Gate,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn validate_with(&self, reply: Result<(), GatewayError>) {
        self.validate.lock().unwrap().push_back(reply);
    }

    pub fn optimize_prompt_with(&self, reply: Result<String, GatewayError>) {
        self.prompts.lock().unwrap().push_back(reply);
    }

    pub fn generate_with(&self, reply: Result<String, GatewayError>) {
        self.responses.lock().unwrap().push_back(reply);
    }

    pub fn optimize_response_with(&self, reply: Result<String, GatewayError>) {
        self.optimized.lock().unwrap().push_back(reply);
    }

    /// The next call of `op` waits on `gate.release`.
    pub fn gate_on(&self, op: Op) {
        *self.gated.lock().unwrap() = Some(op);
    }

    /// Calls of `op` never complete.
    pub fn hang_on(&self, op: Op) {
        *self.hung.lock().unwrap() = Some(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> Vec<GenerateRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::GenerateResponse(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    async fn enter(&self, op: Op, call: Call) {
        self.calls.lock().unwrap().push(call);
        let hang = *self.hung.lock().unwrap() == Some(op);
        if hang {
            std::future::pending::<()>().await;
        }
        let gated = {
            let mut gated = self.gated.lock().unwrap();
            if *gated == Some(op) {
                *gated = None;
                true
            } else {
                false
            }
        };
        if gated {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
        }
    }

    fn next_text(
        queue: &Mutex<VecDeque<Result<String, GatewayError>>>,
        fallback: &str,
    ) -> Result<String, GatewayError> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(fallback.to_string()))
    }
}

#[async_trait::async_trait]
impl InferenceGateway for ScriptedGateway {
    async fn validate_key(&self, model: ModelId, api_key: &str) -> Result<(), GatewayError> {
        self.enter(
            Op::ValidateKey,
            Call::ValidateKey {
                model,
                api_key: api_key.to_string(),
            },
        )
        .await;
        self.validate.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn optimize_prompt(
        &self,
        request: &OptimizePromptRequest,
    ) -> Result<String, GatewayError> {
        self.enter(Op::OptimizePrompt, Call::OptimizePrompt(request.clone()))
            .await;
        Self::next_text(&self.prompts, "OPTIMIZED PROMPT")
    }

    async fn generate_response(&self, request: &GenerateRequest) -> Result<String, GatewayError> {
        self.enter(Op::GenerateResponse, Call::GenerateResponse(request.clone()))
            .await;
        Self::next_text(&self.responses, "RESPONSE")
    }

    async fn optimize_response(
        &self,
        request: &OptimizeResponseRequest,
    ) -> Result<String, GatewayError> {
        self.enter(Op::OptimizeResponse, Call::OptimizeResponse(request.clone()))
            .await;
        Self::next_text(&self.optimized, "OPTIMIZED RESPONSE")
    }
}

pub fn config_store() -> ConfigStore {
    ConfigStore::new(Arc::new(Database::open_in_memory().unwrap()))
}

/// Pipeline with API key `k1` on the default model.
pub fn pipeline_with(gateway: Arc<dyn InferenceGateway>) -> Pipeline {
    let config = config_store();
    config.set_api_key("k1").unwrap();
    Pipeline::new(config, gateway)
}

pub fn pipeline(gateway: Arc<ScriptedGateway>) -> Pipeline {
    pipeline_with(gateway)
}

pub fn clinical_note() -> SelectedFile {
    SelectedFile {
        name: "note.txt".into(),
        content_type: Some("text/plain".into()),
        bytes: b"Patient reports headache.".to_vec(),
    }
}
