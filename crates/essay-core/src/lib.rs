pub mod ai;
pub mod audit;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod gate;
pub mod guide;
pub mod options;
pub mod prompt;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use ai::{CompletionRequest, CompletionService, FragmentStream, OpenAIClient};
pub use audit::{AuditLogger, AuditRecord, AuditSink, LogMetadata, LogOutcome, SupabaseAuditStore};
pub use config::Config;
pub use controller::{ChatJob, ChatOutcome, FormJob, FormOutcome, ModeController};
pub use conversation::Conversation;
pub use error::{AuditError, AuthError, CompletionError, ConfigError, SessionError};
pub use gate::{CredentialGate, Identity};
pub use options::{LengthHint, Model, UiMode, GENERAL_ESSAY_RUBRIC};
pub use session::{Mode, Session};
pub use state::{ChatMessage, ChatRole, Notice};
