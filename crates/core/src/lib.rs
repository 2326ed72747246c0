pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use domain::lead::{Lead, LeadInfo, ParsedLeadInfo};
pub use domain::session::{ChatMessage, ChatRole, Session, SessionId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{advance, Stage, StageTransition};
