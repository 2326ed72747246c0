pub mod engine;
pub mod states;

pub use engine::advance;
pub use states::{Stage, StageTransition};
