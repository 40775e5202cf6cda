//! Best-effort audit trail of every question/answer pair.
//!
//! Delivery is at-most-once: one insert attempt, no retry, no queue. Callers
//! get a `LogOutcome` back and turn failures into a warning; the answer the
//! user already sees is never touched.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::gate::Identity;
use crate::options::{LengthHint, Model, UiMode};
use crate::state::Notice;

/// Settings that travel with every logged exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMetadata {
    pub rubric: &'static str,
    pub length_hint: LengthHint,
    pub model: Model,
    pub ui: UiMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditMeta {
    pub rubric: String,
    pub length_hint: LengthHint,
    pub model: Model,
    pub tz: String,
    pub ts: DateTime<FixedOffset>,
    pub ui: UiMode,
}

/// One row of the audit table. Serializes to the table's column layout.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub user_id: String,
    #[serde(rename = "user_name")]
    pub display_name: String,
    pub question: String,
    pub answer: String,
    pub rubric: String,
    pub length_hint: LengthHint,
    pub model: Model,
    pub meta: AuditMeta,
}

impl AuditRecord {
    pub fn ui_mode(&self) -> UiMode {
        self.meta.ui
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn insert(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Which key the store writes with. Only the access rights differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Anonymous,
    ServiceRole,
}

/// Inserts rows through the Supabase REST interface.
#[derive(Clone)]
pub struct SupabaseAuditStore {
    client: Client,
    endpoint: String,
    key: String,
    access: AccessLevel,
}

impl SupabaseAuditStore {
    /// Prefers the service-role key when one is configured.
    pub fn new(config: &AuditConfig) -> Self {
        let (key, access) = match &config.service_role_key {
            Some(key) => (key.clone(), AccessLevel::ServiceRole),
            None => (config.anon_key.clone(), AccessLevel::Anonymous),
        };
        Self {
            client: Client::new(),
            endpoint: format!("{}/rest/v1/{}", config.url, config.table),
            key,
            access,
        }
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access
    }
}

#[async_trait]
impl AuditSink for SupabaseAuditStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AuditError::Rejected { status, message: message.trim().to_string() });
        }
        Ok(())
    }
}

/// Result of one logging attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl LogOutcome {
    pub fn saved() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }

    /// What to tell the user. Form mode confirms saves; chat mode only
    /// speaks up on failure. Failures are always warnings, never errors.
    pub fn notice(&self, ui: UiMode) -> Option<Notice> {
        match (self.success, ui) {
            (true, UiMode::Form) => Some(Notice::Success("Log saved".to_string())),
            (true, UiMode::Chat) => None,
            (false, _) => Some(Notice::Warning(format!(
                "Log save failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ))),
        }
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    timezone: String,
    utc_offset: FixedOffset,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, timezone: impl Into<String>, utc_offset: FixedOffset) -> Self {
        Self { sink, timezone: timezone.into(), utc_offset }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        let store = SupabaseAuditStore::new(config);
        tracing::info!(access = ?store.access_level(), table = %config.table, "audit store ready");
        Self::new(Arc::new(store), config.timezone.clone(), config.utc_offset)
    }

    /// Builds a record stamped with the current time in the configured zone.
    pub fn record(
        &self,
        identity: &Identity,
        question: &str,
        answer: &str,
        metadata: LogMetadata,
    ) -> AuditRecord {
        let ts = Utc::now().with_timezone(&self.utc_offset);
        AuditRecord {
            user_id: identity.user_id.clone(),
            display_name: identity.display_name.clone(),
            question: question.to_string(),
            answer: answer.to_string(),
            rubric: metadata.rubric.to_string(),
            length_hint: metadata.length_hint,
            model: metadata.model,
            meta: AuditMeta {
                rubric: metadata.rubric.to_string(),
                length_hint: metadata.length_hint,
                model: metadata.model,
                tz: self.timezone.clone(),
                ts,
                ui: metadata.ui,
            },
        }
    }

    /// Exactly one insert attempt.
    pub async fn log(&self, record: &AuditRecord) -> LogOutcome {
        match self.sink.insert(record).await {
            Ok(()) => {
                tracing::debug!(user_id = %record.user_id, ui = record.ui_mode().as_str(), "audit row saved");
                LogOutcome::saved()
            }
            Err(err) => {
                tracing::warn!(user_id = %record.user_id, %err, "audit row not saved");
                LogOutcome::failed(err.to_string())
            }
        }
    }

    /// Fire-and-forget: runs `log` on its own task. Must be called inside a
    /// tokio runtime.
    pub fn spawn(&self, record: AuditRecord) -> JoinHandle<LogOutcome> {
        let logger = self.clone();
        tokio::spawn(async move { logger.log(&record).await })
    }
}
