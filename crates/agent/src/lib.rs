//! Agent runtime - session state, LLM orchestration and tool dispatch
//!
//! This crate is the "brain" of the selly backend:
//! - Holds live conversations in a TTL-bounded session store
//! - Drives the discovery stage machine from structured LLM output
//! - Dispatches LLM-issued function calls against the CRM card tracker and
//!   the meeting calendar
//! - Runs the per-turn orchestration loop (first pass, optional forced tool
//!   pass, sequential dispatch, follow-up text generation)
//!
//! # Key Types
//!
//! - `TurnOrchestrator` - one-user-turn state machine (see `orchestrator`)
//! - `LlmClient` - pluggable completion seam (`GeminiClient` is the default)
//! - `ToolDispatcher` - executes one function call into an `ActionRecord`
//! - `SessionStore` - per-session exclusive access keyed by session id
//!
//! # Safety Principle
//!
//! The LLM extracts fields and picks tools; it never owns state. Stage
//! advancement and every external side effect are decided by deterministic
//! code in this crate.

pub mod gemini;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod sessions;
pub mod tools;
