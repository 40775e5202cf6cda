//! End-to-end flows through the controller with in-memory services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::FixedOffset;
use futures_util::stream;

use essay_core::ai::FORM_TEMPERATURE;
use essay_core::{
    AuditError, AuditLogger, AuditRecord, AuditSink, AuthError, ChatRole, CompletionError,
    CompletionRequest, CompletionService, CredentialGate, FragmentStream, Mode, ModeController,
    Notice, Session, SessionError, UiMode,
};

const PASSPHRASE: &str = "writing-101";

#[derive(Default)]
struct FakeCompletion {
    fail_once: Option<String>,
    fail_stream_after: Option<(usize, String)>,
    fail_open: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.fail_once {
            Some(message) => Err(CompletionError::Api { status: 503, message: message.clone() }),
            None => Ok("  Overall: a clear start. Strengths: concise.  ".to_string()),
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream, CompletionError> {
        let turn = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = &self.fail_open {
            return Err(CompletionError::Api { status: 401, message: message.clone() });
        }

        let mut items: Vec<Result<String, CompletionError>> = vec![
            Ok(format!("Reply {turn}: ")),
            Ok(String::new()),
            Ok("looks ".to_string()),
            Ok("good.".to_string()),
        ];
        if let Some((keep, message)) = &self.fail_stream_after {
            items.truncate(*keep);
            items.push(Err(CompletionError::Stream(message.clone())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

#[derive(Default)]
struct MemorySink {
    rows: Mutex<Vec<AuditRecord>>,
    fail: bool,
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::Other("connection refused".into()));
        }
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn controller(completion: Arc<FakeCompletion>, sink: Arc<MemorySink>) -> ModeController {
    let audit = AuditLogger::new(sink, "Asia/Seoul", FixedOffset::east_opt(9 * 3600).unwrap());
    ModeController::new(CredentialGate::new(PASSPHRASE), completion, audit)
}

fn logged_in(controller: &ModeController, ui: UiMode) -> Session {
    let mut session = Session::new();
    controller.login(&mut session, "Kim", PASSPHRASE, ui).unwrap();
    session
}

#[tokio::test]
async fn form_submission_returns_feedback_and_logs_once() {
    let completion = Arc::new(FakeCompletion::default());
    let sink = Arc::new(MemorySink::default());
    let controller = controller(completion.clone(), sink.clone());
    let session = logged_in(&controller, UiMode::Form);

    let outcome = controller.submit_form(&session, "short text").await.unwrap();
    assert!(!outcome.failed);
    assert_eq!(outcome.feedback, "Overall: a clear start. Strengths: concise.");

    let logged = outcome.audit.expect("audit task").await.unwrap();
    assert!(logged.success);
    assert_eq!(logged.notice(UiMode::Form), Some(Notice::Success("Log saved".into())));

    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ui_mode(), UiMode::Form);
    assert_eq!(rows[0].question, "short text");
    assert_eq!(rows[0].answer, outcome.feedback);
    assert_eq!(rows[0].display_name, "Kim");

    let requests = completion.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[0].temperature, FORM_TEMPERATURE);
}

#[tokio::test]
async fn two_chat_turns_build_history_and_log_each() {
    let completion = Arc::new(FakeCompletion::default());
    let sink = Arc::new(MemorySink::default());
    let controller = controller(completion.clone(), sink.clone());
    let mut session = logged_in(&controller, UiMode::Chat);

    let mut seen = Vec::new();
    let first = controller
        .chat_turn(&mut session, "Hi", |fragment| seen.push(fragment.to_string()))
        .await
        .unwrap();
    assert_eq!(seen, vec!["Reply 1: ", "looks ", "good."]);
    assert_eq!(first.answer, seen.concat());

    let second = controller.chat_turn(&mut session, "Check my thesis", |_| {}).await.unwrap();
    assert_eq!(second.answer, "Reply 2: looks good.");

    let history = session.conversation().history();
    assert_eq!(history.len(), 4);
    let roles: Vec<ChatRole> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::User, ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]
    );
    assert_eq!(history[0].content, "Hi");
    assert_eq!(history[3].content, "Reply 2: looks good.");

    assert!(first.audit.await.unwrap().success);
    assert!(second.audit.await.unwrap().success);
    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.ui_mode() == UiMode::Chat));

    // Second request replays turn one, then the hint, then the new input.
    let requests = completion.requests.lock().unwrap();
    let replayed = &requests[1].messages;
    assert_eq!(replayed.len(), 1 + 2 + 2);
    assert_eq!(replayed[0].role, ChatRole::System);
    assert_eq!(replayed[1].content, "Hi");
    assert_eq!(replayed[2].content, "Reply 1: looks good.");
    assert!(replayed[3].content.starts_with("[Rubric]"));
    assert_eq!(replayed[4].content, "Check my thesis");
}

#[tokio::test]
async fn form_generation_failure_shows_error_and_keeps_session() {
    let completion = Arc::new(FakeCompletion {
        fail_once: Some("model overloaded".into()),
        ..Default::default()
    });
    let sink = Arc::new(MemorySink::default());
    let controller = controller(completion, sink.clone());
    let session = logged_in(&controller, UiMode::Form);

    let outcome = controller.submit_form(&session, "short text").await.unwrap();
    assert!(outcome.failed);
    assert!(outcome.feedback.contains("model overloaded"));
    assert!(outcome.audit.is_none());

    assert!(session.is_authenticated());
    assert_eq!(session.mode(), Mode::Form);
    assert!(sink.rows.lock().unwrap().is_empty());

    // The session keeps working afterwards.
    assert!(controller.submit_form(&session, "again").await.unwrap().failed);
}

#[tokio::test]
async fn logging_failure_leaves_feedback_untouched() {
    let completion = Arc::new(FakeCompletion::default());
    let sink = Arc::new(MemorySink { fail: true, ..Default::default() });
    let controller = controller(completion, sink);
    let session = logged_in(&controller, UiMode::Form);

    let outcome = controller.submit_form(&session, "short text").await.unwrap();
    let shown = outcome.feedback.clone();
    let logged = outcome.audit.unwrap().await.unwrap();

    assert!(!outcome.failed);
    assert_eq!(shown, "Overall: a clear start. Strengths: concise.");
    assert!(!logged.success);
    assert_eq!(
        logged.notice(UiMode::Form),
        Some(Notice::Warning("Log save failed: connection refused".into()))
    );
}

#[tokio::test]
async fn switching_modes_has_no_side_effects() {
    let completion = Arc::new(FakeCompletion::default());
    let sink = Arc::new(MemorySink::default());
    let controller = controller(completion.clone(), sink.clone());
    let mut session = logged_in(&controller, UiMode::Chat);

    let outcome = controller.chat_turn(&mut session, "Hi", |_| {}).await.unwrap();
    outcome.audit.await.unwrap();
    let before = session.conversation().clone();

    for _ in 0..3 {
        controller.select_mode(&mut session, UiMode::Form).unwrap();
        assert_eq!(session.mode(), Mode::Form);
        controller.select_mode(&mut session, UiMode::Chat).unwrap();
        assert_eq!(session.mode(), Mode::Chat);
    }
    tokio::task::yield_now().await;

    assert_eq!(session.conversation(), &before);
    assert!(session.is_authenticated());
    assert_eq!(sink.rows.lock().unwrap().len(), 1);
    assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mid_stream_failure_becomes_the_assistant_turn() {
    let completion = Arc::new(FakeCompletion {
        fail_stream_after: Some((1, "connection reset".into())),
        ..Default::default()
    });
    let sink = Arc::new(MemorySink::default());
    let controller = controller(completion, sink.clone());
    let mut session = logged_in(&controller, UiMode::Chat);

    let outcome = controller.chat_turn(&mut session, "Hi", |_| {}).await.unwrap();
    assert!(outcome.failed);
    assert!(outcome.answer.contains("connection reset"));
    assert!(!outcome.answer.contains("Reply 1"));

    let history = session.conversation().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, outcome.answer);

    outcome.audit.await.unwrap();
    assert_eq!(sink.rows.lock().unwrap()[0].answer, outcome.answer);
}

#[tokio::test]
async fn stream_that_fails_to_open_is_recorded_and_logged() {
    let completion = Arc::new(FakeCompletion {
        fail_open: Some("invalid api key".into()),
        ..Default::default()
    });
    let sink = Arc::new(MemorySink::default());
    let controller = controller(completion, sink.clone());
    let mut session = logged_in(&controller, UiMode::Chat);

    let mut seen = Vec::new();
    let outcome = controller
        .chat_turn(&mut session, "Hi", |fragment| seen.push(fragment.to_string()))
        .await
        .unwrap();
    assert!(seen.is_empty());
    assert!(outcome.failed);
    assert!(outcome.answer.contains("invalid api key"));

    let history = session.conversation().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "Hi");
    assert_eq!(history[1].role, ChatRole::Assistant);
    assert_eq!(history[1].content, outcome.answer);

    assert!(outcome.audit.await.unwrap().success);
    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].answer, outcome.answer);
    assert_eq!(rows[0].ui_mode(), UiMode::Chat);
}

#[tokio::test]
async fn submissions_are_rejected_without_side_effects() {
    let completion = Arc::new(FakeCompletion::default());
    let sink = Arc::new(MemorySink::default());
    let controller = controller(completion.clone(), sink.clone());

    let mut session = Session::new();
    assert_eq!(
        controller.submit_form(&session, "text").await.unwrap_err(),
        SessionError::NotAuthenticated
    );
    assert_eq!(
        controller.select_mode(&mut session, UiMode::Chat),
        Err(SessionError::NotAuthenticated)
    );

    controller.login(&mut session, "Kim", PASSPHRASE, UiMode::Chat).unwrap();
    assert_eq!(
        controller.submit_form(&session, "text").await.unwrap_err(),
        SessionError::WrongMode { expected: UiMode::Form }
    );
    assert_eq!(
        controller.chat_turn(&mut session, "   \n", |_| {}).await.unwrap_err(),
        SessionError::EmptyInput
    );

    assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    assert!(session.conversation().is_empty());
    assert!(sink.rows.lock().unwrap().is_empty());
}

#[test]
fn wrong_passphrase_keeps_session_logged_out() {
    let controller = controller(Arc::new(FakeCompletion::default()), Arc::new(MemorySink::default()));
    let mut session = Session::new();

    assert_eq!(
        controller.login(&mut session, "Kim", "guess", UiMode::Form),
        Err(AuthError::WrongPassphrase)
    );
    assert_eq!(
        controller.login(&mut session, "  ", PASSPHRASE, UiMode::Form),
        Err(AuthError::EmptyName)
    );
    assert!(!session.is_authenticated());
    assert_eq!(session.mode(), Mode::LoggedOut);
}

#[tokio::test]
async fn login_and_reset_clear_the_conversation() {
    let controller = controller(Arc::new(FakeCompletion::default()), Arc::new(MemorySink::default()));
    let mut session = logged_in(&controller, UiMode::Chat);
    let first_id = session.identity().unwrap().user_id.clone();

    controller.chat_turn(&mut session, "Hi", |_| {}).await.unwrap();
    controller.new_conversation(&mut session).unwrap();
    assert!(session.conversation().is_empty());

    controller.chat_turn(&mut session, "Hi again", |_| {}).await.unwrap();
    controller.login(&mut session, "Kim", PASSPHRASE, UiMode::Form).unwrap();
    assert!(session.conversation().is_empty());
    assert_eq!(session.mode(), Mode::Form);
    assert_ne!(session.identity().unwrap().user_id, first_id);

    controller.logout(&mut session);
    assert!(!session.is_authenticated());
    assert_eq!(session.mode(), Mode::LoggedOut);
}

#[tokio::test]
async fn turn_from_an_earlier_login_is_not_committed() {
    let controller = controller(Arc::new(FakeCompletion::default()), Arc::new(MemorySink::default()));
    let mut session = logged_in(&controller, UiMode::Chat);

    let job = controller.prepare_chat(&session, "Hi").unwrap();
    assert_eq!(job.input(), "Hi");
    let outcome = controller.run_chat(job, |_| {}).await;

    controller.logout(&mut session);
    controller.login(&mut session, "Kim", PASSPHRASE, UiMode::Chat).unwrap();

    assert!(!controller.commit_chat(&mut session, &outcome));
    assert!(session.conversation().is_empty());
}
