/// Task endpoints
///
/// JSON and multipart front door to [`TaskActions`](crate::actions::TaskActions).
/// Every endpoint acts on the caller's own tasks only.
///
/// # Endpoints
///
/// - `GET /v1/tasks` - List tasks, newest first
/// - `POST /v1/tasks` - Create a task (multipart)
/// - `PUT /v1/tasks/:id` - Edit title and description
/// - `DELETE /v1/tasks/:id` - Delete a task
///
/// Updating or deleting a task that does not exist or belongs to someone
/// else succeeds with `affected: 0`.

use crate::{
    actions::{Attachment, CreateTaskForm},
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::AccessToken,
};
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use worklog_shared::models::task::Task;
use worklog_shared::validation::INVALID_FORM_DATA;

/// Edit request
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,
}

/// Update and delete response
#[derive(Debug, Serialize, Deserialize)]
pub struct MutationResponse {
    /// Rows changed; 0 when the task is missing or not owned by the caller
    pub affected: u64,
}

/// List the caller's tasks
///
/// # Errors
///
/// - `401 Unauthorized`: No valid session
/// - `502 Bad Gateway`: Store unavailable
pub async fn list_tasks(
    State(state): State<AppState>,
    token: AccessToken,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = state.actions.list(token.as_deref()).await?;
    Ok(Json(tasks))
}

/// Create a task
///
/// # Endpoint
///
/// ```text
/// POST /v1/tasks
/// Content-Type: multipart/form-data
///
/// title=...&description=...&image=<file>&excel=<file>
/// ```
///
/// Empty file parts count as no attachment.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Title or description out of bounds
/// - `401 Unauthorized`: No valid session
/// - `502 Bad Gateway`: Upload or insert failed
pub async fn create_task(
    State(state): State<AppState>,
    token: AccessToken,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let form = read_create_form(multipart).await?;
    let task = state.actions.create(token.as_deref(), form).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Edit a task's title and description
pub async fn update_task(
    State(state): State<AppState>,
    token: AccessToken,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<MutationResponse>> {
    let affected = state
        .actions
        .update(token.as_deref(), &task_id, &req.title, &req.description)
        .await?;

    Ok(Json(MutationResponse { affected }))
}

/// Delete a task
pub async fn delete_task(
    State(state): State<AppState>,
    token: AccessToken,
    Path(task_id): Path<String>,
) -> ApiResult<Json<MutationResponse>> {
    let affected = state.actions.delete(token.as_deref(), &task_id).await?;

    Ok(Json(MutationResponse { affected }))
}

/// Reads the create form fields; unknown fields are ignored
pub(crate) async fn read_create_form(mut multipart: Multipart) -> ApiResult<CreateTaskForm> {
    let mut form = CreateTaskForm::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "title" => form.title = field.text().await.map_err(form_error)?,
            "description" => form.description = field.text().await.map_err(form_error)?,
            "image" => form.image = Some(read_attachment(field, "image").await?),
            "excel" => form.excel = Some(read_attachment(field, "excel").await?),
            _ => {}
        }
    }

    Ok(form)
}

async fn read_attachment(field: Field<'_>, fallback_name: &str) -> ApiResult<Attachment> {
    let file_name = field
        .file_name()
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback_name)
        .to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(form_error)?;

    Ok(Attachment {
        file_name,
        content_type,
        bytes,
    })
}

fn form_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    tracing::debug!(error = %err, "Unreadable multipart body");

    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BadRequest(err.body_text())
    } else {
        ApiError::BadRequest(INVALID_FORM_DATA.to_string())
    }
}
