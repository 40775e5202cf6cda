//! Mode controller: login, mode switching and the two submission cycles.
//!
//! Every operation takes the `Session` explicitly. Submissions are split into
//! `prepare_*` (validate, snapshot what the request needs), `run_*` (talk to
//! the model and kick off the audit write) and, for chat, `commit_chat`
//! (append the finished turn). Front ends that generate on a background task
//! use the pieces; `submit_form` and `chat_turn` chain them.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::ai::{generate_once, generate_stream, CompletionService, OpenAIClient};
use crate::audit::{AuditLogger, LogMetadata, LogOutcome};
use crate::config::Config;
use crate::error::{AuthError, CompletionError, SessionError};
use crate::gate::{CredentialGate, Identity};
use crate::options::{LengthHint, Model, UiMode, GENERAL_ESSAY_RUBRIC};
use crate::prompt::{build_multi_turn, build_single_shot, FeedbackRequest};
use crate::session::{Mode, Session};
use crate::state::ChatMessage;

/// Snapshot of a validated form submission.
#[derive(Debug, Clone)]
pub struct FormJob {
    identity: Identity,
    request: FeedbackRequest,
}

#[derive(Debug)]
pub struct FormOutcome {
    /// Text to show: the feedback, or a readable error message.
    pub feedback: String,
    pub failed: bool,
    /// Pending audit write. `None` when generation failed, since nothing
    /// was exchanged.
    pub audit: Option<JoinHandle<LogOutcome>>,
}

/// Snapshot of a validated chat turn, history included.
#[derive(Debug, Clone)]
pub struct ChatJob {
    identity: Identity,
    input: String,
    messages: Vec<ChatMessage>,
    model: Model,
    length_hint: LengthHint,
}

impl ChatJob {
    pub fn input(&self) -> &str {
        &self.input
    }
}

#[derive(Debug)]
pub struct ChatOutcome {
    pub user_id: String,
    pub input: String,
    /// Full streamed reply, or the error message that replaced it.
    pub answer: String,
    pub failed: bool,
    pub audit: JoinHandle<LogOutcome>,
}

#[derive(Clone)]
pub struct ModeController {
    gate: Arc<CredentialGate>,
    completion: Arc<dyn CompletionService>,
    audit: AuditLogger,
}

impl ModeController {
    pub fn new(gate: CredentialGate, completion: Arc<dyn CompletionService>, audit: AuditLogger) -> Self {
        Self { gate: Arc::new(gate), completion, audit }
    }

    pub fn from_config(config: &Config) -> Self {
        let completion = OpenAIClient::new(&config.openai_api_key, &config.openai_base_url);
        Self::new(
            CredentialGate::new(config.shared_passphrase.clone()),
            Arc::new(completion),
            AuditLogger::from_config(&config.audit),
        )
    }

    /// On success the session is authenticated, lands in `destination` and
    /// starts with an empty conversation. On failure it is left untouched.
    pub fn login(
        &self,
        session: &mut Session,
        name: &str,
        passphrase: &str,
        destination: UiMode,
    ) -> Result<(), AuthError> {
        let identity = self.gate.login(name, passphrase)?;
        session.authenticate(identity, destination);
        Ok(())
    }

    pub fn logout(&self, session: &mut Session) {
        if let Some(identity) = session.identity() {
            tracing::info!(user_id = %identity.user_id, "logged out");
        }
        session.reset();
    }

    /// Switches between form and chat. Never touches the conversation and
    /// never logs anything.
    pub fn select_mode(&self, session: &mut Session, ui: UiMode) -> Result<(), SessionError> {
        if !session.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        session.set_mode(ui);
        Ok(())
    }

    /// The "new conversation" action.
    pub fn new_conversation(&self, session: &mut Session) -> Result<(), SessionError> {
        if !session.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        session.conversation_mut().clear();
        Ok(())
    }

    pub fn prepare_form(&self, session: &Session, essay: &str) -> Result<FormJob, SessionError> {
        let identity = require_mode(session, UiMode::Form)?;
        if essay.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        Ok(FormJob {
            identity: identity.clone(),
            request: FeedbackRequest::new(essay, session.length_hint, session.model),
        })
    }

    /// One blocking generation. Successful exchanges are handed to the audit
    /// logger on a separate task; failures are shown but not logged.
    pub async fn run_form(&self, job: FormJob) -> FormOutcome {
        let FormJob { identity, request } = job;
        let messages = build_single_shot(&request);

        match generate_once(self.completion.as_ref(), messages, request.model).await {
            Ok(feedback) => {
                let record = self.audit.record(
                    &identity,
                    &request.essay_text,
                    &feedback,
                    LogMetadata {
                        rubric: request.rubric,
                        length_hint: request.length_hint,
                        model: request.model,
                        ui: UiMode::Form,
                    },
                );
                let audit = self.audit.spawn(record);
                FormOutcome { feedback, failed: false, audit: Some(audit) }
            }
            Err(err) => {
                tracing::warn!(user_id = %identity.user_id, %err, "form feedback generation failed");
                FormOutcome {
                    feedback: format!("Feedback generation failed: {err}"),
                    failed: true,
                    audit: None,
                }
            }
        }
    }

    pub async fn submit_form(&self, session: &Session, essay: &str) -> Result<FormOutcome, SessionError> {
        let job = self.prepare_form(session, essay)?;
        Ok(self.run_form(job).await)
    }

    /// Snapshots the history as it is now; the new input is not part of it.
    pub fn prepare_chat(&self, session: &Session, input: &str) -> Result<ChatJob, SessionError> {
        let identity = require_mode(session, UiMode::Chat)?;
        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        let messages = build_multi_turn(
            session.conversation().history(),
            GENERAL_ESSAY_RUBRIC,
            session.length_hint,
            input,
        );
        Ok(ChatJob {
            identity: identity.clone(),
            input: input.to_string(),
            messages,
            model: session.model,
            length_hint: session.length_hint,
        })
    }

    /// Streams the reply, handing each fragment to `on_fragment` as it
    /// arrives. A failure at any point replaces the answer with a readable
    /// error message, which is what gets logged and recorded.
    pub async fn run_chat<F>(&self, job: ChatJob, mut on_fragment: F) -> ChatOutcome
    where
        F: FnMut(&str) + Send,
    {
        let ChatJob { identity, input, messages, model, length_hint } = job;
        let mut answer = String::new();

        let streamed = async {
            let mut fragments = generate_stream(self.completion.as_ref(), messages, model).await?;
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment?;
                on_fragment(&fragment);
                answer.push_str(&fragment);
            }
            Ok::<(), CompletionError>(())
        }
        .await;

        let failed = match streamed {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(user_id = %identity.user_id, %err, "chat reply generation failed");
                answer = format!("An error occurred while generating the response: {err}");
                true
            }
        };

        let record = self.audit.record(
            &identity,
            &input,
            &answer,
            LogMetadata { rubric: GENERAL_ESSAY_RUBRIC, length_hint, model, ui: UiMode::Chat },
        );
        let audit = self.audit.spawn(record);

        ChatOutcome { user_id: identity.user_id, input, answer, failed, audit }
    }

    /// Appends a finished turn. Returns false, leaving the session alone, if
    /// the turn belongs to a different login.
    pub fn commit_chat(&self, session: &mut Session, outcome: &ChatOutcome) -> bool {
        let same_user = session
            .identity()
            .is_some_and(|identity| identity.user_id == outcome.user_id);
        if !same_user {
            tracing::debug!("dropping chat turn from an earlier session");
            return false;
        }
        session.conversation_mut().record_turn(outcome.input.clone(), outcome.answer.clone());
        true
    }

    pub async fn chat_turn<F>(
        &self,
        session: &mut Session,
        input: &str,
        on_fragment: F,
    ) -> Result<ChatOutcome, SessionError>
    where
        F: FnMut(&str) + Send,
    {
        let job = self.prepare_chat(session, input)?;
        let outcome = self.run_chat(job, on_fragment).await;
        self.commit_chat(session, &outcome);
        Ok(outcome)
    }
}

fn require_mode(session: &Session, expected: UiMode) -> Result<&Identity, SessionError> {
    let identity = session.identity().ok_or(SessionError::NotAuthenticated)?;
    if session.mode() != Mode::from(expected) {
        return Err(SessionError::WrongMode { expected });
    }
    Ok(identity)
}
