use serde::{Deserialize, Serialize};

/// Discrete step of the scripted discovery conversation. Strictly
/// forward-advancing; `Completed` is terminal for field collection and the
/// entry condition for tool-enabled turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Initial,
    AskEmail,
    AskEmpresa,
    AskNecessidade,
    AskPrazo,
    ConfirmInterest,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AskEmail => "ask_email",
            Self::AskEmpresa => "ask_empresa",
            Self::AskNecessidade => "ask_necessidade",
            Self::AskPrazo => "ask_prazo",
            Self::ConfirmInterest => "confirm_interest",
            Self::Completed => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
}
