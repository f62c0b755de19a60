use crate::doc_processor::DocumentInfo;
use crate::pipeline::{BufferKind, Pipeline, PipelineError, RunSnapshot};
use crate::prompt::{PromptField, PromptSpec};
use std::path::Path;
use tauri::State;

#[tauri::command]
pub fn get_run(pipeline: State<'_, Pipeline>) -> RunSnapshot {
    pipeline.snapshot()
}

#[tauri::command]
pub fn select_document(
    pipeline: State<'_, Pipeline>,
    file_path: String,
) -> Result<DocumentInfo, PipelineError> {
    pipeline.select_document_path(Path::new(&file_path))
}

#[tauri::command]
pub fn clear_document(pipeline: State<'_, Pipeline>) -> Result<(), PipelineError> {
    pipeline.clear_document()
}

#[tauri::command]
pub fn update_prompt_spec(pipeline: State<'_, Pipeline>, spec: PromptSpec) {
    pipeline.update_prompt_spec(spec)
}

#[tauri::command]
pub fn apply_dictation(
    pipeline: State<'_, Pipeline>,
    field: PromptField,
    transcript: String,
) -> PromptSpec {
    pipeline.apply_dictation(field, &transcript);
    pipeline.prompt_spec()
}

#[tauri::command]
pub fn apply_preset(pipeline: State<'_, Pipeline>, field: PromptField, index: usize) -> PromptSpec {
    pipeline.apply_preset(field, index);
    pipeline.prompt_spec()
}

#[tauri::command]
pub async fn start_analysis(pipeline: State<'_, Pipeline>) -> Result<RunSnapshot, PipelineError> {
    pipeline.start_analysis().await
}

#[tauri::command]
pub async fn generate_response(
    pipeline: State<'_, Pipeline>,
) -> Result<RunSnapshot, PipelineError> {
    pipeline.generate_response().await
}

#[tauri::command]
pub async fn optimize_response(
    pipeline: State<'_, Pipeline>,
) -> Result<RunSnapshot, PipelineError> {
    pipeline.optimize_response().await
}

#[tauri::command]
pub fn edit_buffer(
    pipeline: State<'_, Pipeline>,
    kind: BufferKind,
    text: String,
) -> Result<RunSnapshot, PipelineError> {
    pipeline.edit_buffer(kind, text)?;
    Ok(pipeline.snapshot())
}

#[tauri::command]
pub fn apply_optimized_response(
    pipeline: State<'_, Pipeline>,
) -> Result<RunSnapshot, PipelineError> {
    pipeline.apply_optimized_response()?;
    Ok(pipeline.snapshot())
}

#[tauri::command]
pub fn export_buffer(
    pipeline: State<'_, Pipeline>,
    kind: BufferKind,
    file_path: String,
) -> Result<(), PipelineError> {
    pipeline.export_buffer(kind, Path::new(&file_path))
}

#[tauri::command]
pub fn clear_all(pipeline: State<'_, Pipeline>) -> RunSnapshot {
    pipeline.clear_all()
}
