//! One-user-turn state machine.
//!
//! A turn walks `FirstPass -> ForcedToolPass? -> Dispatching? -> Followup?
//! -> Done`. Tools are offered only once discovery is complete; before that
//! the model answers under the JSON `{reply, info}` contract and the stage
//! machine advances from the validated `info`. At most one forced
//! tool-enabled retry and at most one follow-up completion happen per turn.
//!
//! Audit-log writes are best-effort: a failed write is logged and the turn
//! continues, since the log is never read back into orchestration.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use selly_core::domain::lead::LeadInfo;
use selly_core::domain::session::{ChatMessage, ChatRole, Session, SessionId};
use selly_core::errors::ApplicationError;
use selly_core::flows::advance;
use selly_db::ConversationLog;
use selly_db::LeadRepository;

use crate::llm::{tool_specs, ChatRequest, LlmClient, LlmError, LlmOutput, TOOL_GET_AVAILABLE_SLOTS};
use crate::sessions::SessionStore;
use crate::tools::{ActionRecord, ToolDispatcher, SLOT_SAMPLE_SIZE};

/// What one user turn produced: the concatenated assistant text plus every
/// action dispatched along the way, successes and failures alike.
#[derive(Clone, Debug)]
pub struct TurnReply {
    pub reply: String,
    pub actions: Vec<ActionRecord>,
}

#[derive(Clone, Debug)]
pub struct SessionOpening {
    pub session_id: SessionId,
    pub greeting: String,
}

pub struct TurnOrchestrator {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    store: Arc<SessionStore>,
    log: Arc<dyn ConversationLog>,
    leads: Arc<dyn LeadRepository>,
    system_prompt: String,
}

impl TurnOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        dispatcher: ToolDispatcher,
        store: Arc<SessionStore>,
        log: Arc<dyn ConversationLog>,
        leads: Arc<dyn LeadRepository>,
        system_prompt: String,
    ) -> Self {
        Self { llm, dispatcher, store, log, leads, system_prompt }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Opens a session and seeds the greeting with a system-prompt-only
    /// completion, so the persona introduces itself before any user input.
    pub async fn start_session(&self) -> Result<SessionOpening, ApplicationError> {
        let session_id = self.store.create().await;
        if let Err(error) = self.log.create_session(&session_id).await {
            warn!(session_id = %session_id, %error, "could not persist new session");
        }

        let request = ChatRequest {
            system_prompt: self.system_prompt.clone(),
            messages: vec![ChatMessage {
                role: ChatRole::System,
                content: self.system_prompt.clone(),
            }],
            tools: None,
        };
        let output = self.llm.chat(request).await.map_err(map_llm_error)?;

        if let Some(handle) = self.store.checkout(&session_id).await {
            handle.lock().await.push_message(ChatMessage::assistant(output.reply.clone()));
        }
        self.persist(&session_id, ChatRole::Assistant, &output.reply).await;

        info!(event_name = "chat.session.created", session_id = %session_id, "session opened");
        Ok(SessionOpening { session_id, greeting: output.reply })
    }

    pub async fn handle_message(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<TurnReply, ApplicationError> {
        let handle = self
            .store
            .checkout(session_id)
            .await
            .ok_or_else(|| ApplicationError::SessionNotFound(session_id.clone()))?;

        // Held for the whole turn: concurrent requests against the same
        // session serialize here instead of interleaving state mutations.
        let mut session = handle.lock().await;
        session.touch(self.store.ttl());

        session.push_message(ChatMessage::user(text));
        self.persist(session_id, ChatRole::User, text).await;

        let tool_eligible = session.stage.is_completed();
        let first = self.complete(&session, tool_eligible).await?;
        self.record_assistant(&mut session, &first.reply).await;

        if let Some(info_value) = &first.info {
            self.merge_info(&mut session, info_value).await;
        }

        // Forced tool pass: the funnel just completed (or the model skipped
        // an expected call) and the eligible response carried neither a tool
        // call nor a structured payload. One retry, never more.
        let mut active = first;
        if session.stage.is_completed()
            && active.tool_calls.is_empty()
            && (!tool_eligible || !active.structured)
        {
            debug!(session_id = %session_id, "forcing tool-enabled retry");
            match self.complete(&session, true).await {
                Ok(retry) => {
                    self.record_assistant(&mut session, &retry.reply).await;
                    active = retry;
                }
                Err(error) => {
                    warn!(session_id = %session_id, %error, "forced tool retry failed");
                }
            }
        }

        let mut actions = Vec::new();
        for call in &active.tool_calls {
            let mut record = self.dispatcher.dispatch(call, &mut session.lead).await;
            cap_slot_offer(&mut record);
            let line = record.render();
            session.push_message(ChatMessage::assistant(line.clone()));
            self.persist(session_id, ChatRole::Assistant, &line).await;
            actions.push(record);
        }
        if !actions.is_empty() {
            // Dispatch may have written meeting details into the lead.
            self.snapshot_lead(&session).await;
        }

        let mut reply = active.reply.clone();
        if !actions.is_empty() {
            match self.complete(&session, false).await {
                Ok(followup) if !followup.reply.is_empty() => {
                    self.record_assistant(&mut session, &followup.reply).await;
                    if !reply.is_empty() {
                        reply.push(' ');
                    }
                    reply.push_str(&followup.reply);
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(session_id = %session_id, %error, "follow-up completion failed");
                }
            }
        }

        info!(
            event_name = "chat.turn.completed",
            session_id = %session_id,
            stage = session.stage.as_str(),
            actions = actions.len(),
            "turn completed"
        );
        Ok(TurnReply { reply, actions })
    }

    async fn complete(
        &self,
        session: &Session,
        with_tools: bool,
    ) -> Result<LlmOutput, ApplicationError> {
        let request = ChatRequest {
            system_prompt: self.system_prompt.clone(),
            messages: session.messages.clone(),
            tools: with_tools.then(tool_specs),
        };
        self.llm.chat(request).await.map_err(map_llm_error)
    }

    /// Validates and merges one turn's extracted `info`, advancing the stage
    /// when the current stage's trigger field arrived. Malformed payloads
    /// are dropped with a warning; the reply already went out.
    async fn merge_info(&self, session: &mut Session, info_value: &Value) {
        let parsed = match LeadInfo::from_value(info_value) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(session_id = %session.id, %error, "discarding malformed info payload");
                return;
            }
        };
        if !parsed.unknown_keys.is_empty() {
            warn!(
                session_id = %session.id,
                keys = ?parsed.unknown_keys,
                "ignoring unknown info fields"
            );
        }

        let email_was_known = session.lead.email.is_some();
        if let Some(transition) = advance(session, &parsed.info) {
            info!(
                event_name = "chat.stage.advanced",
                session_id = %session.id,
                from = transition.from.as_str(),
                to = transition.to.as_str(),
                "stage advanced"
            );
        }

        if !email_was_known {
            if let Some(email) = session.lead.email.clone() {
                if let Err(error) = self.log.set_lead_email(&session.id, &email).await {
                    warn!(session_id = %session.id, %error, "lead email write failed");
                }
            }
        }
        self.snapshot_lead(session).await;
    }

    async fn snapshot_lead(&self, session: &Session) {
        if session.lead.email.is_none() {
            return;
        }
        if let Err(error) = self.leads.upsert(&session.lead).await {
            warn!(session_id = %session.id, %error, "lead snapshot failed");
        }
    }

    async fn record_assistant(&self, session: &mut Session, content: &str) {
        if content.is_empty() {
            return;
        }
        let session_id = session.id.clone();
        session.push_message(ChatMessage::assistant(content));
        self.persist(&session_id, ChatRole::Assistant, content).await;
    }

    async fn persist(&self, session_id: &SessionId, role: ChatRole, content: &str) {
        if content.is_empty() {
            return;
        }
        if let Err(error) = self.log.append_message(session_id, role, content).await {
            warn!(session_id = %session_id, %error, "audit log write failed");
        }
    }
}

/// Re-truncates the slot offer a turn surfaces. The dispatcher already
/// samples the lookup down; the bound holds here too, where the record
/// enters the transcript and the turn reply.
fn cap_slot_offer(record: &mut ActionRecord) {
    if record.name != TOOL_GET_AVAILABLE_SLOTS {
        return;
    }
    if let Some(slots) = record.result.get_mut("slots").and_then(Value::as_array_mut) {
        slots.truncate(SLOT_SAMPLE_SIZE);
    }
}

fn map_llm_error(error: LlmError) -> ApplicationError {
    match error {
        LlmError::Transport(message) => ApplicationError::Integration(message),
        LlmError::Protocol(message) => ApplicationError::LlmProtocol(message),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;

    use selly_core::domain::lead::Lead;
    use selly_core::domain::session::SessionId;
    use selly_core::errors::ApplicationError;
    use selly_core::flows::Stage;
    use selly_db::{InMemoryConversationLog, InMemoryLeadRepository};

    use crate::llm::{
        ChatRequest, LlmClient, LlmError, LlmOutput, ToolCall, TOOL_CREATE_OR_UPDATE_CARD,
        TOOL_GET_AVAILABLE_SLOTS,
    };
    use crate::sessions::SessionStore;
    use crate::tools::{
        ActionRecord, BookingOutcome, CalendarProvider, CardRef, CardTracker, ProviderError,
        Slot, ToolDispatcher,
    };

    use super::{cap_slot_offer, TurnOrchestrator};

    struct ScriptedLlm {
        outputs: Mutex<VecDeque<LlmOutput>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        fn new(outputs: Vec<LlmOutput>) -> Self {
            Self { outputs: Mutex::new(outputs.into()), requests: Mutex::new(Vec::new()) }
        }

        fn request_tools(&self) -> Vec<bool> {
            self.requests
                .lock()
                .expect("requests lock")
                .iter()
                .map(ChatRequest::tool_enabled)
                .collect()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, request: ChatRequest) -> Result<LlmOutput, LlmError> {
            self.requests.lock().expect("requests lock").push(request);
            self.outputs
                .lock()
                .expect("outputs lock")
                .pop_front()
                .ok_or_else(|| LlmError::Transport("script exhausted".to_string()))
        }
    }

    struct StubTracker;

    #[async_trait]
    impl CardTracker for StubTracker {
        async fn find_card_by_email(&self, _email: &str) -> Result<Option<CardRef>, ProviderError> {
            Ok(None)
        }

        async fn create_card(
            &self,
            _fields: &[(&'static str, String)],
        ) -> Result<CardRef, ProviderError> {
            Ok(CardRef { id: "card-1".to_string() })
        }

        async fn update_card(
            &self,
            _card: &CardRef,
            _fields: &[(&'static str, String)],
        ) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    struct StubCalendar;

    #[async_trait]
    impl CalendarProvider for StubCalendar {
        async fn available_slots_next_7_days(&self) -> Result<Vec<Slot>, ProviderError> {
            Ok(vec![Slot { start: "2026-08-24T14:00:00Z".to_string(), end: None }])
        }

        async fn schedule(
            &self,
            _slot: &Slot,
            _lead: &Lead,
        ) -> Result<BookingOutcome, ProviderError> {
            Ok(BookingOutcome {
                meeting_url: Some("https://meet.example/abc".to_string()),
                start_time: None,
            })
        }
    }

    struct Harness {
        orchestrator: TurnOrchestrator,
        llm: Arc<ScriptedLlm>,
        store: Arc<SessionStore>,
        log: Arc<InMemoryConversationLog>,
        leads: Arc<InMemoryLeadRepository>,
    }

    fn harness(outputs: Vec<LlmOutput>) -> Harness {
        let llm = Arc::new(ScriptedLlm::new(outputs));
        let store = Arc::new(SessionStore::new(Duration::minutes(30)));
        let log = Arc::new(InMemoryConversationLog::new());
        let leads = Arc::new(InMemoryLeadRepository::new());
        let orchestrator = TurnOrchestrator::new(
            llm.clone(),
            ToolDispatcher::new(Arc::new(StubTracker), Arc::new(StubCalendar)),
            store.clone(),
            log.clone(),
            leads.clone(),
            "persona".to_string(),
        );
        Harness { orchestrator, llm, store, log, leads }
    }

    fn structured(reply: &str, info: serde_json::Value) -> LlmOutput {
        LlmOutput {
            reply: reply.to_string(),
            info: Some(info),
            structured: true,
            tool_calls: Vec::new(),
        }
    }

    fn tool_pass(reply: &str, calls: Vec<ToolCall>) -> LlmOutput {
        LlmOutput { reply: reply.to_string(), tool_calls: calls, ..LlmOutput::default() }
    }

    async fn open_session(harness: &Harness, stage: Stage, lead: Lead) -> SessionId {
        let id = harness.store.create().await;
        let handle = harness.store.checkout(&id).await.expect("live session");
        let mut session = handle.lock().await;
        session.stage = stage;
        session.lead = lead;
        id
    }

    fn completed_lead() -> Lead {
        Lead {
            nome: Some("Ana".to_string()),
            email: Some("ana@empresa.com".to_string()),
            empresa: Some("Acme".to_string()),
            necessidade: Some("automação".to_string()),
            prazo: Some("2 meses".to_string()),
            interesse_confirmado: Some(true),
            ..Lead::default()
        }
    }

    #[tokio::test]
    async fn start_session_seeds_a_greeting() {
        let harness = harness(vec![structured("Olá! Qual é o seu nome?", json!({}))]);

        let opening = harness.orchestrator.start_session().await.expect("opening");
        assert_eq!(opening.greeting, "Olá! Qual é o seu nome?");
        assert_eq!(harness.store.len().await, 1);
        assert_eq!(harness.log.session_count(), 1);

        let handle = harness.store.checkout(&opening.session_id).await.expect("live session");
        assert_eq!(handle.lock().await.messages.len(), 1);
    }

    #[tokio::test]
    async fn info_gathering_turn_advances_stage_without_tools() {
        let harness =
            harness(vec![structured("Prazer, Ana! Qual é o seu e-mail?", json!({"nome": "Ana"}))]);
        let id = open_session(&harness, Stage::Initial, Lead::default()).await;

        let turn = harness.orchestrator.handle_message(&id, "Oi, sou a Ana").await.expect("turn");

        assert_eq!(turn.reply, "Prazer, Ana! Qual é o seu e-mail?");
        assert!(turn.actions.is_empty());
        assert_eq!(harness.llm.request_tools(), vec![false]);

        let handle = harness.store.checkout(&id).await.expect("live session");
        let session = handle.lock().await;
        assert_eq!(session.stage, Stage::AskEmail);
        assert_eq!(session.lead.nome.as_deref(), Some("Ana"));
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn extracted_email_reaches_the_audit_log_and_lead_table() {
        let harness = harness(vec![structured(
            "Obrigada! Qual é a sua empresa?",
            json!({"email": "ana@empresa.com"}),
        )]);
        let id = open_session(&harness, Stage::AskEmail, Lead::default()).await;

        harness.orchestrator.handle_message(&id, "ana@empresa.com").await.expect("turn");

        assert_eq!(harness.log.lead_email(&id).as_deref(), Some("ana@empresa.com"));
        assert_eq!(harness.leads.lead_count(), 1);
    }

    #[tokio::test]
    async fn completed_stage_turn_dispatches_tools_and_follows_up() {
        let calls = vec![
            ToolCall { name: TOOL_CREATE_OR_UPDATE_CARD.to_string(), args: json!({ "lead": {} }) },
            ToolCall { name: TOOL_GET_AVAILABLE_SLOTS.to_string(), args: json!({}) },
        ];
        let harness = harness(vec![
            tool_pass("Um momento.", calls),
            structured("Aqui estão os horários disponíveis.", json!({})),
        ]);
        let id = open_session(&harness, Stage::Completed, completed_lead()).await;

        let turn = harness.orchestrator.handle_message(&id, "sim, pode agendar").await.expect("turn");

        assert_eq!(turn.actions.len(), 2);
        assert!(turn.actions.iter().all(|action| action.succeeded()));
        assert_eq!(turn.reply, "Um momento. Aqui estão os horários disponíveis.");
        // tool-enabled first pass, tools-disabled follow-up
        assert_eq!(harness.llm.request_tools(), vec![true, false]);

        let handle = harness.store.checkout(&id).await.expect("live session");
        let session = handle.lock().await;
        let action_lines = session
            .messages
            .iter()
            .filter(|message| message.content.starts_with("Action: "))
            .count();
        assert_eq!(action_lines, 2);
    }

    #[tokio::test]
    async fn stage_completing_mid_turn_forces_one_tool_retry() {
        let calls =
            vec![ToolCall { name: TOOL_CREATE_OR_UPDATE_CARD.to_string(), args: json!({}) }];
        let harness = harness(vec![
            structured("Perfeito, vou agendar!", json!({"interesse_confirmado": true})),
            tool_pass("", calls),
            structured("Lead registrado com sucesso.", json!({})),
        ]);
        let id = open_session(
            &harness,
            Stage::ConfirmInterest,
            Lead { interesse_confirmado: None, ..completed_lead() },
        )
        .await;

        let turn = harness.orchestrator.handle_message(&id, "sim, quero").await.expect("turn");

        assert_eq!(harness.llm.request_tools(), vec![false, true, false]);
        assert_eq!(turn.actions.len(), 1);

        let handle = harness.store.checkout(&id).await.expect("live session");
        assert_eq!(handle.lock().await.stage, Stage::Completed);
    }

    #[tokio::test]
    async fn tool_eligible_turn_without_calls_retries_once_then_returns_text() {
        let harness = harness(vec![
            tool_pass("Posso ajudar em algo mais?", Vec::new()),
            tool_pass("Obrigada pelo contato!", Vec::new()),
        ]);
        let id = open_session(&harness, Stage::Completed, completed_lead()).await;

        let turn = harness.orchestrator.handle_message(&id, "obrigado").await.expect("turn");

        assert_eq!(harness.llm.request_tools(), vec![true, true]);
        assert!(turn.actions.is_empty());
        assert_eq!(turn.reply, "Obrigada pelo contato!");
    }

    #[test]
    fn slot_offer_is_capped_at_three_even_for_an_oversized_record() {
        let starts: Vec<serde_json::Value> =
            (10..15).map(|hour| json!({ "start": format!("2026-08-24T{hour}:00:00Z") })).collect();
        let mut record = ActionRecord {
            name: TOOL_GET_AVAILABLE_SLOTS.to_string(),
            result: json!({ "status": "sucesso", "slots": starts }),
        };

        cap_slot_offer(&mut record);

        let slots = record.result["slots"].as_array().expect("slots array");
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0]["start"], "2026-08-24T10:00:00Z");
    }

    #[test]
    fn slot_cap_leaves_other_records_alone() {
        let mut record = ActionRecord {
            name: TOOL_CREATE_OR_UPDATE_CARD.to_string(),
            result: json!({ "status": "sucesso", "slots": [1, 2, 3, 4, 5] }),
        };

        cap_slot_offer(&mut record);

        assert_eq!(record.result["slots"].as_array().expect("slots array").len(), 5);
    }

    #[tokio::test]
    async fn turn_never_surfaces_more_than_three_slots() {
        struct WideCalendar;

        #[async_trait]
        impl CalendarProvider for WideCalendar {
            async fn available_slots_next_7_days(&self) -> Result<Vec<Slot>, ProviderError> {
                Ok((10..20)
                    .map(|hour| Slot { start: format!("2026-08-24T{hour}:00:00Z"), end: None })
                    .collect())
            }

            async fn schedule(
                &self,
                _slot: &Slot,
                _lead: &Lead,
            ) -> Result<BookingOutcome, ProviderError> {
                Ok(BookingOutcome { meeting_url: None, start_time: None })
            }
        }

        let calls = vec![ToolCall { name: TOOL_GET_AVAILABLE_SLOTS.to_string(), args: json!({}) }];
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_pass("Um momento.", calls),
            structured("Seguem os horários.", json!({})),
        ]));
        let store = Arc::new(SessionStore::new(Duration::minutes(30)));
        let orchestrator = TurnOrchestrator::new(
            llm,
            ToolDispatcher::new(Arc::new(StubTracker), Arc::new(WideCalendar)),
            store.clone(),
            Arc::new(InMemoryConversationLog::new()),
            Arc::new(InMemoryLeadRepository::new()),
            "persona".to_string(),
        );
        let id = store.create().await;
        {
            let handle = store.checkout(&id).await.expect("live session");
            let mut session = handle.lock().await;
            session.stage = Stage::Completed;
            session.lead = completed_lead();
        }

        let turn = orchestrator.handle_message(&id, "quais horários?").await.expect("turn");

        assert_eq!(turn.actions.len(), 1);
        let slots = turn.actions[0].result["slots"].as_array().expect("slots array");
        assert!(slots.len() <= 3);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected_without_side_effects() {
        let harness = harness(Vec::new());
        let id = SessionId::random();

        let error = harness.orchestrator.handle_message(&id, "olá").await.expect_err("must fail");
        assert!(matches!(error, ApplicationError::SessionNotFound(_)));
        assert!(harness.llm.requests.lock().expect("requests lock").is_empty());
        assert!(harness.log.recorded_messages(&id).is_empty());
    }

    #[tokio::test]
    async fn malformed_info_payload_is_dropped_but_reply_survives() {
        let harness = harness(vec![structured("Qual é o seu nome?", json!("não é objeto"))]);
        let id = open_session(&harness, Stage::Initial, Lead::default()).await;

        let turn = harness.orchestrator.handle_message(&id, "oi").await.expect("turn");

        assert_eq!(turn.reply, "Qual é o seu nome?");
        let handle = harness.store.checkout(&id).await.expect("live session");
        assert_eq!(handle.lock().await.stage, Stage::Initial);
    }
}
