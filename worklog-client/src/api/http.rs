//! HTTP client for the worklog server
//!
//! Holds the access token returned by sign-in and sends it as a bearer
//! token on every task call. Error bodies (`{ "error", "message" }`) become
//! [`ClientError::Api`] carrying the server's display message.

use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt as _;
use reqwest::{multipart, Client, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use worklog_shared::backend::{AuthSession, Credentials};
use worklog_shared::events::ChangeEvent;
use worklog_shared::models::task::Task;

use super::{
    AuthApi, ClientError, ClientResult, FeedEvent, FeedStream, FileUpload, NewTaskForm,
    SignUpReply, TaskActions, TaskSource,
};

/// Client for the worklog JSON API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Arc<RwLock<Option<String>>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct MutationBody {
    affected: u64,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    title: &'a str,
    description: &'a str,
}

impl ApiClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> ClientResult<Self> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClientError::Transport(format!("Invalid API URL: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Current access token, if signed in
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Adopts a token obtained elsewhere
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Transport(format!("Invalid API URL: {}", e)))
    }

    async fn authorized(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        let token = self.token().await.ok_or(ClientError::NotSignedIn)?;
        Ok(request.bearer_auth(token))
    }
}

/// Passes a 2xx response through, turns anything else into an API error
async fn ensure_success(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);

    debug!(status = status.as_u16(), %message, "API request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn ok_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

fn file_part(upload: FileUpload) -> ClientResult<multipart::Part> {
    let part = multipart::Part::bytes(upload.bytes.to_vec()).file_name(upload.file_name);

    match upload.content_type {
        Some(content_type) => Ok(part.mime_str(&content_type)?),
        None => Ok(part),
    }
}

fn feed_event(event: eventsource_stream::Event) -> Option<ClientResult<FeedEvent>> {
    match event.event.as_str() {
        "subscribed" => Some(Ok(FeedEvent::Subscribed)),
        "resync" => Some(Ok(FeedEvent::Resync)),
        "change" => Some(
            ChangeEvent::from_payload(&event.data)
                .map(FeedEvent::Change)
                .map_err(|e| ClientError::Decode(e.to_string())),
        ),
        other => {
            debug!(event = other, "Ignoring unknown feed event");
            None
        }
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthSession> {
        let response = self
            .http
            .post(self.endpoint("v1/auth/sign-in")?)
            .json(&Credentials::new(email, password))
            .send()
            .await?;

        let session: AuthSession = ok_json(response).await?;
        self.set_token(Some(session.access_token.clone())).await;

        debug!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> ClientResult<SignUpReply> {
        let response = self
            .http
            .post(self.endpoint("v1/auth/sign-up")?)
            .json(&Credentials::new(email, password))
            .send()
            .await?;

        let reply: SignUpReply = ok_json(response).await?;
        if let Some(session) = &reply.session {
            self.set_token(Some(session.access_token.clone())).await;
        }

        Ok(reply)
    }

    async fn sign_out(&self) -> ClientResult<()> {
        let Some(token) = self.token.write().await.take() else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.endpoint("v1/auth/sign-out")?)
            .bearer_auth(token)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskSource for ApiClient {
    async fn fetch_tasks(&self) -> ClientResult<Vec<Task>> {
        let request = self.authorized(self.http.get(self.endpoint("v1/tasks")?)).await?;
        ok_json(request.send().await?).await
    }

    async fn changes(&self) -> ClientResult<FeedStream> {
        let request = self
            .authorized(self.http.get(self.endpoint("v1/tasks/changes")?))
            .await?;
        let response = ensure_success(request.send().await?).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|item| async move {
                match item {
                    Ok(event) => feed_event(event),
                    Err(e) => {
                        warn!(error = %e, "Change feed broke");
                        Some(Err(ClientError::Transport(e.to_string())))
                    }
                }
            });

        Ok(stream.boxed())
    }
}

#[async_trait]
impl TaskActions for ApiClient {
    async fn create_task(&self, form: NewTaskForm) -> ClientResult<Task> {
        let mut body = multipart::Form::new()
            .text("title", form.title)
            .text("description", form.description);
        if let Some(image) = form.image {
            body = body.part("image", file_part(image)?);
        }
        if let Some(excel) = form.excel {
            body = body.part("excel", file_part(excel)?);
        }

        let request = self
            .authorized(self.http.post(self.endpoint("v1/tasks")?))
            .await?;
        ok_json(request.multipart(body).send().await?).await
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        title: &str,
        description: &str,
    ) -> ClientResult<u64> {
        let request = self
            .authorized(self.http.put(self.endpoint(&format!("v1/tasks/{}", task_id))?))
            .await?;
        let body: MutationBody = ok_json(
            request
                .json(&UpdateBody { title, description })
                .send()
                .await?,
        )
        .await?;

        Ok(body.affected)
    }

    async fn delete_task(&self, task_id: Uuid) -> ClientResult<u64> {
        let request = self
            .authorized(self.http.delete(self.endpoint(&format!("v1/tasks/{}", task_id))?))
            .await?;
        let body: MutationBody = ok_json(request.send().await?).await?;

        Ok(body.affected)
    }
}
