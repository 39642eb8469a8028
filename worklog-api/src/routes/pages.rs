/// Server-rendered pages
///
/// The auth page and the dashboard work without JavaScript: every form
/// posts back to the server and a successful mutation redirects to the
/// dashboard (post/redirect/get). Failures re-render the page with the
/// translated message. `/assets/dashboard.js` adds the live refresh on top.
///
/// A missing or expired session on any dashboard route redirects to `/auth`.

use crate::{
    actions::ActionError,
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::AccessToken,
    routes::{
        auth::{session_cookie_for, sign_in_error, sign_up_error},
        tasks::read_create_form,
    },
};
use askama::Template;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use worklog_shared::{
    auth::middleware::clear_session_cookie,
    backend::Credentials,
    messages,
    models::task::Task,
};

/// Refresh cadence of the dashboard's polling fallback
pub const POLL_INTERVAL_MS: u64 = 3000;

const DASHBOARD_SCRIPT: &str = include_str!("../../assets/dashboard.js");

#[derive(Template)]
#[template(path = "auth.html")]
struct AuthTemplate {
    login: bool,
    email: String,
    message: String,
    /// Non-empty triggers a delayed client-side redirect
    redirect_to: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    poll_interval_ms: u64,
    draft_title: String,
    draft_description: String,
    error: String,
    tasks: Vec<TaskView>,
}

/// A task as the dashboard prints it; empty strings mean absent
struct TaskView {
    id: String,
    title: String,
    description: String,
    image_url: String,
    excel_url: String,
    created_at: String,
    fingerprint: String,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let fingerprint = task_fingerprint(&task);

        Self {
            id: task.id.to_string(),
            title: task.title,
            description: task.description.unwrap_or_default(),
            image_url: task.image_url.unwrap_or_default(),
            excel_url: task.excel_url.unwrap_or_default(),
            created_at: task.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            fingerprint,
        }
    }
}

/// Every displayed field as a JSON array
///
/// `dashboard.js` builds the same string from `GET /v1/tasks` with
/// `JSON.stringify` and reloads when any card differs.
fn task_fingerprint(task: &Task) -> String {
    let fields = [
        task.id.to_string(),
        task.title.clone(),
        task.description.clone().unwrap_or_default(),
        task.image_url.clone().unwrap_or_default(),
        task.excel_url.clone().unwrap_or_default(),
    ];
    serde_json::to_string(&fields).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthForm {
    #[serde(default)]
    pub mode: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EditForm {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,
}

/// `GET /`
pub async fn index() -> Redirect {
    Redirect::to("/dashboard")
}

/// `GET /auth`, sign-in by default, sign-up with `?mode=signup`
pub async fn auth_page(Query(query): Query<AuthQuery>) -> ApiResult<Html<String>> {
    render(&AuthTemplate {
        login: query.mode.as_deref() != Some("signup"),
        email: String::new(),
        message: String::new(),
        redirect_to: String::new(),
    })
}

/// `POST /auth`
pub async fn auth_submit(
    State(state): State<AppState>,
    Form(form): Form<AuthForm>,
) -> ApiResult<Response> {
    let login = form.mode != "signup";
    let credentials = Credentials::new(form.email.clone(), form.password);

    let page = |message: String, redirect_to: &str| AuthTemplate {
        login,
        email: form.email.clone(),
        message,
        redirect_to: redirect_to.to_string(),
    };

    if login {
        return match state.identity.sign_in(&credentials).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "User signed in");
                let cookie = session_cookie_for(&state, &session);
                Ok((
                    AppendHeaders([(header::SET_COOKIE, cookie)]),
                    Redirect::to("/dashboard"),
                )
                    .into_response())
            }
            Err(e) => {
                let message = sign_in_error(e).user_message();
                Ok(render(&page(message, ""))?.into_response())
            }
        };
    }

    let redirect_to = state.config.auth_callback_url();
    match state.identity.sign_up(&credentials, Some(&redirect_to)).await {
        Ok(outcome) => match outcome.session {
            Some(session) => {
                tracing::info!(user_id = %session.user.id, "Account created");
                let cookie = session_cookie_for(&state, &session);
                let body = render(&page(messages::SIGNUP_SUCCESSFUL.to_string(), "/dashboard"))?;
                Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), body).into_response())
            }
            None => {
                tracing::info!("Account created, awaiting email confirmation");
                Ok(render(&page(messages::CONFIRM_EMAIL_SENT.to_string(), ""))?.into_response())
            }
        },
        Err(e) => {
            let message = sign_up_error(e).user_message();
            Ok(render(&page(message, ""))?.into_response())
        }
    }
}

/// `POST /auth/sign-out`
pub async fn sign_out(State(state): State<AppState>, token: AccessToken) -> Response {
    if let Some(token) = token.as_deref() {
        if let Err(e) = state.identity.sign_out(token).await {
            tracing::warn!(error = %e, "Sign-out failed at the identity provider");
        }
    }

    (
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(state.secure_cookies()),
        )]),
        Redirect::to("/auth"),
    )
        .into_response()
}

/// `GET /dashboard`
pub async fn dashboard(State(state): State<AppState>, token: AccessToken) -> ApiResult<Response> {
    match state.actions.list(token.as_deref()).await {
        Ok(tasks) => dashboard_page(StatusCode::OK, tasks, String::new(), Draft::default()),
        Err(ActionError::Unauthorized) => Ok(Redirect::to("/auth").into_response()),
        Err(e) => {
            let status = ApiError::from(e.clone()).status();
            dashboard_page(status, Vec::new(), e.to_string(), Draft::default())
        }
    }
}

/// `POST /dashboard/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    token: AccessToken,
    multipart: Multipart,
) -> ApiResult<Response> {
    let form = read_create_form(multipart).await?;
    let draft = Draft {
        title: form.title.clone(),
        description: form.description.clone(),
    };

    let result = state.actions.create(token.as_deref(), form).await.map(|_| ());
    after_action(&state, token, result, draft).await
}

/// `POST /dashboard/tasks/:id`
pub async fn update_task(
    State(state): State<AppState>,
    token: AccessToken,
    Path(task_id): Path<String>,
    Form(form): Form<EditForm>,
) -> ApiResult<Response> {
    let result = state
        .actions
        .update(token.as_deref(), &task_id, &form.title, &form.description)
        .await
        .map(|_| ());
    after_action(&state, token, result, Draft::default()).await
}

/// `POST /dashboard/tasks/:id/delete`
pub async fn delete_task(
    State(state): State<AppState>,
    token: AccessToken,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    let result = state
        .actions
        .delete(token.as_deref(), &task_id)
        .await
        .map(|_| ());
    after_action(&state, token, result, Draft::default()).await
}

/// `GET /assets/dashboard.js`
pub async fn dashboard_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        DASHBOARD_SCRIPT,
    )
}

/// Create form contents kept across a failed submit
#[derive(Debug, Default)]
struct Draft {
    title: String,
    description: String,
}

async fn after_action(
    state: &AppState,
    token: AccessToken,
    result: Result<(), ActionError>,
    draft: Draft,
) -> ApiResult<Response> {
    let err = match result {
        Ok(()) => return Ok(Redirect::to("/dashboard").into_response()),
        Err(ActionError::Unauthorized) => return Ok(Redirect::to("/auth").into_response()),
        Err(e) => e,
    };

    let status = ApiError::from(err.clone()).status();
    let tasks = match state.actions.list(token.as_deref()).await {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::warn!(error = %e, "Could not reload tasks after a failed action");
            Vec::new()
        }
    };

    dashboard_page(status, tasks, err.to_string(), draft)
}

fn dashboard_page(
    status: StatusCode,
    tasks: Vec<Task>,
    error: String,
    draft: Draft,
) -> ApiResult<Response> {
    let body = render(&DashboardTemplate {
        poll_interval_ms: POLL_INTERVAL_MS,
        draft_title: draft.title,
        draft_description: draft.description,
        error,
        tasks: tasks.into_iter().map(TaskView::from).collect(),
    })?;

    Ok((status, body).into_response())
}

fn render(template: &impl Template) -> ApiResult<Html<String>> {
    template
        .render()
        .map(Html)
        .map_err(|e| ApiError::InternalError(format!("Template render failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_auth_template_modes() {
        let html = AuthTemplate {
            login: true,
            email: "user@example.com".to_string(),
            message: "Invalid email or password.".to_string(),
            redirect_to: String::new(),
        }
        .render()
        .unwrap();

        assert!(html.contains("Sign In"));
        assert!(html.contains("Invalid email or password."));
        assert!(html.contains(r#"value="user@example.com""#));
        assert!(!html.contains("http-equiv"));

        let html = AuthTemplate {
            login: false,
            email: String::new(),
            message: messages::SIGNUP_SUCCESSFUL.to_string(),
            redirect_to: "/dashboard".to_string(),
        }
        .render()
        .unwrap();

        assert!(html.contains("Create Account"));
        assert!(html.contains(r#"http-equiv="refresh""#));
    }

    #[test]
    fn test_dashboard_escapes_task_text() {
        let task = Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "<b>Deploy</b>".to_string(),
            description: Some("Shipped the release".to_string()),
            image_url: None,
            excel_url: Some("memory://task-files/u/excel/1-report.xlsx".to_string()),
            created_at: Utc::now(),
        };
        let id = task.id.to_string();

        let html = DashboardTemplate {
            poll_interval_ms: POLL_INTERVAL_MS,
            draft_title: String::new(),
            draft_description: String::new(),
            error: String::new(),
            tasks: vec![TaskView::from(task)],
        }
        .render()
        .unwrap();

        assert!(html.contains("&lt;b&gt;Deploy"));
        assert!(!html.contains("<b>Deploy"));
        assert!(html.contains(&format!("/dashboard/tasks/{}/delete", id)));
        assert!(html.contains("Download Excel"));
        assert!(!html.contains("Task image"));
        assert!(html.contains(r#"data-poll-interval="3000""#));
        assert!(html.contains("data-fingerprint=\"[&quot;"));
    }

    #[test]
    fn test_fingerprint_covers_description_and_attachments() {
        let task = Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Standup".to_string(),
            description: Some("Line one\n\"quoted\"".to_string()),
            image_url: None,
            excel_url: None,
            created_at: Utc::now(),
        };

        assert_eq!(
            task_fingerprint(&task),
            format!(r#"["{}","Standup","Line one\n\"quoted\"","",""]"#, task.id)
        );

        let mut edited = task.clone();
        edited.description = Some("Line two".to_string());
        assert_ne!(task_fingerprint(&edited), task_fingerprint(&task));

        let mut attached = task.clone();
        attached.image_url = Some("memory://task-files/u/images/1-shot.png".to_string());
        assert_ne!(task_fingerprint(&attached), task_fingerprint(&task));
    }

    #[test]
    fn test_empty_dashboard() {
        let html = DashboardTemplate {
            poll_interval_ms: POLL_INTERVAL_MS,
            draft_title: "ab".to_string(),
            draft_description: String::new(),
            error: "Title must be at least 3 characters".to_string(),
            tasks: Vec::new(),
        }
        .render()
        .unwrap();

        assert!(html.contains("No logs yet. Add your first work entry."));
        assert!(html.contains("Title must be at least 3 characters"));
        assert!(html.contains(r#"value="ab""#));
    }
}
