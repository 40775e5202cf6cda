use serde::{Deserialize, Serialize};

/// Evaluation lens applied to every request. Not user configurable.
pub const GENERAL_ESSAY_RUBRIC: &str = "general essay";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Model {
    #[default]
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Gpt4o => "gpt-4o",
        }
    }

    pub fn all() -> Vec<Model> {
        vec![Model::Gpt4oMini, Model::Gpt4o]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Model::Gpt4oMini => "GPT-4o mini (fast)",
            Model::Gpt4o => "GPT-4o",
        }
    }
}

/// Coarse verbosity signal passed along with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthHint {
    Short,
    #[default]
    Normal,
    Long,
}

impl LengthHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            LengthHint::Short => "short",
            LengthHint::Normal => "normal",
            LengthHint::Long => "long",
        }
    }

    /// Next level, wrapping from long back to short.
    pub fn next(&self) -> Self {
        match self {
            LengthHint::Short => LengthHint::Normal,
            LengthHint::Normal => LengthHint::Long,
            LengthHint::Long => LengthHint::Short,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LengthHint::Short => "Short",
            LengthHint::Normal => "Normal",
            LengthHint::Long => "Long",
        }
    }
}

/// Which front-end mode produced an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    #[default]
    Form,
    Chat,
}

impl UiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiMode::Form => "form",
            UiMode::Chat => "chat",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            UiMode::Form => UiMode::Chat,
            UiMode::Chat => UiMode::Form,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            UiMode::Form => "Form",
            UiMode::Chat => "Chat",
        }
    }
}
