//! In-memory backend
//!
//! Stand-ins for the hosted collaborators, used by the test suites and by
//! `WORKLOG_BACKEND=memory` for local development without a hosted project.
//! They mimic the hosted services' observable behavior, including their
//! error wording, so message translation is exercised end to end.
//!
//! Each one can be told to fail its next calls with a given message
//! (`set_failure`), and counts the calls that reach it.
//!
//! # Example
//!
//! ```
//! use worklog_shared::backend::memory::MemoryIdentity;
//! use worklog_shared::backend::{Credentials, IdentityProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = MemoryIdentity::new("a-secret-of-at-least-32-characters");
//! let credentials = Credentials::new("dev@example.com", "hunter22");
//!
//! identity.sign_up(&credentials, None).await?;
//! let session = identity.sign_in(&credentials).await?;
//! assert!(identity.get_user(&session.access_token).await?.is_some());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    AuthSession, BackendError, BackendResult, Credentials, IdentityProvider, ObjectStorage,
    SignUpOutcome, TaskStore, UploadObject,
};
use crate::auth::jwt::{create_token, validate_token, Claims};
use crate::auth::password::{hash_password, verify_password};
use crate::events::{ChangeEvent, ChangeHub, ChangeKind};
use crate::models::task::{NewTask, Task, TaskChanges};
use crate::models::user::User;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Pending failure message injected by tests
#[derive(Debug, Default)]
struct FailureSwitch(Mutex<Option<String>>);

impl FailureSwitch {
    async fn set(&self, message: Option<String>) {
        *self.0.lock().await = message;
    }

    async fn check(&self) -> BackendResult<()> {
        match self.0.lock().await.as_ref() {
            Some(message) => Err(BackendError::new(message.clone())),
            None => Ok(()),
        }
    }
}

struct Account {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct IdentityState {
    /// Keyed by lowercase email
    accounts: HashMap<String, Account>,
    revoked_sessions: HashSet<Uuid>,
}

/// Identity provider holding accounts in memory and issuing HS256 tokens
pub struct MemoryIdentity {
    secret: String,
    require_confirmation: bool,
    state: Mutex<IdentityState>,
    failure: FailureSwitch,
    get_user_calls: AtomicUsize,
}

impl MemoryIdentity {
    /// Accounts are confirmed immediately
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            require_confirmation: false,
            state: Mutex::new(IdentityState::default()),
            failure: FailureSwitch::default(),
            get_user_calls: AtomicUsize::new(0),
        }
    }

    /// Accounts must be confirmed with [`confirm_email`](Self::confirm_email)
    /// before they can sign in
    pub fn with_email_confirmation(secret: impl Into<String>) -> Self {
        Self {
            require_confirmation: true,
            ..Self::new(secret)
        }
    }

    /// Marks an account as confirmed; returns false for an unknown email
    pub async fn confirm_email(&self, email: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(&email.to_lowercase()) {
            Some(account) => {
                account.user.email_confirmed_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn set_failure(&self, message: Option<&str>) {
        self.failure.set(message.map(str::to_string)).await;
    }

    /// Number of `get_user` calls so far
    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }

    fn issue_session(&self, user: &User) -> BackendResult<AuthSession> {
        let claims = Claims::new(user.id, user.email.clone());
        let access_token =
            create_token(&claims, &self.secret).map_err(|e| BackendError::new(e.to_string()))?;

        Ok(AuthSession {
            access_token,
            refresh_token: None,
            expires_in: claims.expires_in(),
            user: user.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(
        &self,
        credentials: &Credentials,
        redirect_to: Option<&str>,
    ) -> BackendResult<SignUpOutcome> {
        self.failure.check().await?;

        let email = credentials.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(BackendError::with_status(
                400,
                "Unable to validate email address: invalid format",
            ));
        }
        if credentials.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(BackendError::with_status(
                422,
                format!("Password should be at least {} characters.", MIN_PASSWORD_LENGTH),
            ));
        }

        let password = credentials.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| BackendError::new(e.to_string()))?
            .map_err(|e| BackendError::new(e.to_string()))?;

        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&email) {
            return Err(BackendError::with_status(422, "User already registered"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.clone()),
            email_confirmed_at: (!self.require_confirmation).then_some(now),
            created_at: Some(now),
        };

        state.accounts.insert(
            email,
            Account {
                user: user.clone(),
                password_hash,
            },
        );

        info!(user_id = %user.id, ?redirect_to, "Account created");

        let session = if self.require_confirmation {
            None
        } else {
            Some(self.issue_session(&user)?)
        };

        Ok(SignUpOutcome {
            user: Some(user),
            session,
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<AuthSession> {
        self.failure.check().await?;

        let (user, password_hash) = {
            let state = self.state.lock().await;
            let account = state
                .accounts
                .get(&credentials.email.trim().to_lowercase())
                .ok_or_else(|| BackendError::with_status(400, "Invalid login credentials"))?;
            (account.user.clone(), account.password_hash.clone())
        };

        // Argon2 runs off the async workers with the state unlocked
        let password = credentials.password.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| BackendError::new(e.to_string()))?
            .map_err(|e| BackendError::new(e.to_string()))?;
        if !matches {
            return Err(BackendError::with_status(400, "Invalid login credentials"));
        }

        if !user.is_confirmed() {
            return Err(BackendError::with_status(400, "Email not confirmed"));
        }

        debug!(user_id = %user.id, "Signed in");
        self.issue_session(&user)
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        self.failure.check().await?;

        if let Ok(claims) = validate_token(access_token, &self.secret) {
            self.state
                .lock()
                .await
                .revoked_sessions
                .insert(claims.session_id);
            debug!(user_id = %claims.sub, "Signed out");
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<Option<User>> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.failure.check().await?;

        let claims = match validate_token(access_token, &self.secret) {
            Ok(claims) => claims,
            Err(_) => return Ok(None),
        };

        let state = self.state.lock().await;
        if state.revoked_sessions.contains(&claims.session_id) {
            return Ok(None);
        }

        Ok(state
            .accounts
            .values()
            .find(|a| a.user.id == claims.sub)
            .map(|a| a.user.clone()))
    }
}

/// Object store keeping uploads in memory
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, (Bytes, Option<String>)>>,
    failure: FailureSwitch,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public_url(bucket: &str, path: &str) -> String {
        format!("memory://{}/{}", bucket, path)
    }

    /// Stored keys as `{bucket}/{path}`, sorted
    pub async fn paths(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .await
            .get(&format!("{}/{}", bucket, path))
            .map(|(bytes, _)| bytes.clone())
    }

    pub async fn set_failure(&self, message: Option<&str>) {
        self.failure.set(message.map(str::to_string)).await;
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, access_token: &str, object: UploadObject) -> BackendResult<String> {
        self.failure.check().await?;

        if access_token.is_empty() {
            return Err(BackendError::with_status(400, "Invalid Compact JWS"));
        }

        let key = format!("{}/{}", object.bucket, object.path);
        let mut objects = self.objects.lock().await;
        if objects.contains_key(&key) {
            return Err(BackendError::with_status(409, "The resource already exists"));
        }
        objects.insert(key, (object.bytes, object.content_type));

        Ok(Self::public_url(&object.bucket, &object.path))
    }
}

/// Task table kept in memory
///
/// Publishes the same change events the database trigger would.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    hub: Option<ChangeHub>,
    failure: FailureSwitch,
    calls: AtomicUsize,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hub(hub: ChangeHub) -> Self {
        Self {
            hub: Some(hub),
            ..Self::default()
        }
    }

    pub async fn set_failure(&self, message: Option<&str>) {
        self.failure.set(message.map(str::to_string)).await;
    }

    /// Number of calls that reached the store
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every stored row regardless of owner
    pub async fn all(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    fn publish(&self, kind: ChangeKind, task_id: Uuid, user_id: Uuid) {
        if let Some(hub) = &self.hub {
            hub.publish(ChangeEvent::new(kind, task_id, user_id));
        }
    }

    async fn begin(&self) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failure.check().await
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Task>> {
        self.begin().await?;

        // Rows are kept newest first; the stable sort keeps that order on ties
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn insert(&self, task: NewTask) -> BackendResult<Task> {
        self.begin().await?;

        let task = Task::from(task);
        self.tasks.lock().await.insert(0, task.clone());
        self.publish(ChangeKind::Insert, task.id, task.user_id);
        Ok(task)
    }

    async fn update_for_user(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        changes: &TaskChanges,
    ) -> BackendResult<u64> {
        self.begin().await?;

        let updated = {
            let mut tasks = self.tasks.lock().await;
            match tasks
                .iter_mut()
                .find(|t| t.id == task_id && t.user_id == user_id)
            {
                Some(task) => {
                    task.apply(changes);
                    1
                }
                None => 0,
            }
        };

        if updated > 0 {
            self.publish(ChangeKind::Update, task_id, user_id);
        }
        Ok(updated)
    }

    async fn delete_for_user(&self, user_id: Uuid, task_id: Uuid) -> BackendResult<u64> {
        self.begin().await?;

        let deleted = {
            let mut tasks = self.tasks.lock().await;
            let before = tasks.len();
            tasks.retain(|t| !(t.id == task_id && t.user_id == user_id));
            (before - tasks.len()) as u64
        };

        if deleted > 0 {
            self.publish(ChangeKind::Delete, task_id, user_id);
        }
        Ok(deleted)
    }
}
