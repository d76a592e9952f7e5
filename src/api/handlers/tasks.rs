use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::agent::{AgentConfig, AgentLoop};
use crate::api::state::{AppState, TaskRecord, TaskStatus};
use crate::browser::ChromiumPage;
use crate::config::LlmEnvCredentials;
use crate::llm::{GenaiClient, LlmOptions};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task: String,
    pub start_url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub headless: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    pub success: Option<bool>,
    pub data: Option<String>,
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<CreateTaskResponse>, (StatusCode, String)> {
    let creds = LlmEnvCredentials::from_env();
    let model = req
        .model
        .or(creds.model)
        .ok_or((StatusCode::BAD_REQUEST, "no model configured".to_string()))?;

    let llm = Arc::new(GenaiClient::new(LlmOptions {
        model,
        api_key: creds.api_key,
        base_url: creds.base_url,
    }));

    let page = ChromiumPage::launch(&req.start_url, req.headless.unwrap_or(true))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("could not launch browser: {e}")))?;

    let task_id = uuid::Uuid::new_v4().to_string();
    let mut agent = AgentLoop::new(Box::new(page), llm, AgentConfig::default());
    let handle = agent.handle();

    let record = Arc::new(TaskRecord {
        handle,
        status: Mutex::new(TaskStatus::Running),
        result: Mutex::new(None),
    });
    state.tasks.insert(task_id.clone(), record.clone());

    tokio::spawn(async move {
        let result = agent.execute(&req.task).await;
        *record.result.lock().await = Some(result);
        *record.status.lock().await = TaskStatus::Done;
    });

    Ok(Json(CreateTaskResponse { task_id }))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, StatusCode> {
    let record = state.tasks.get(&task_id).ok_or(StatusCode::NOT_FOUND)?;
    let status = *record.status.lock().await;
    let result = record.result.lock().await;
    Ok(Json(TaskStatusResponse {
        status,
        success: result.as_ref().map(|r| r.success),
        data: result.as_ref().map(|r| r.data.clone()),
    }))
}

pub async fn pause_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> StatusCode {
    match state.tasks.get(&task_id) {
        Some(record) => {
            record.handle.pause();
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

pub async fn resume_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> StatusCode {
    match state.tasks.get(&task_id) {
        Some(record) => {
            record.handle.resume();
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

pub async fn abort_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> StatusCode {
    match state.tasks.get(&task_id) {
        Some(record) => {
            record.handle.abort("aborted via API");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
