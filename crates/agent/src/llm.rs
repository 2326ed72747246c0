use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use selly_core::domain::session::ChatMessage;

pub const TOOL_CREATE_OR_UPDATE_CARD: &str = "create_or_update_card_pipefy";
pub const TOOL_GET_AVAILABLE_SLOTS: &str = "get_available_slots_next_7_days";
pub const TOOL_SCHEDULE_MEETING: &str = "schedule_meeting";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm transport failure: {0}")]
    Transport(String),
    #[error("llm returned an unexpected payload: {0}")]
    Protocol(String),
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Option<Vec<ToolSpec>>,
}

impl ChatRequest {
    pub fn tool_enabled(&self) -> bool {
        self.tools.as_ref().map(|tools| !tools.is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

/// Normalized model output for one completion: the user-facing text, the
/// structured `info` object when the JSON contract was honored, and any
/// function calls, in the order the model produced them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LlmOutput {
    pub reply: String,
    pub info: Option<Value>,
    /// Whether the text came from a parseable `{reply, info?}` payload.
    pub structured: bool,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<LlmOutput, LlmError>;
}

/// Parses the JSON-mode `{reply, info?}` contract. Malformed output is never
/// a hard failure: the raw text becomes the reply and `structured` stays
/// false. Models routinely wrap the object in a markdown code fence, so the
/// fence is stripped before parsing.
pub fn parse_structured_reply(raw: &str) -> LlmOutput {
    let candidate = strip_code_fence(raw.trim());

    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) {
        if let Some(reply) = object.get("reply").and_then(Value::as_str) {
            return LlmOutput {
                reply: reply.to_string(),
                info: object.get("info").filter(|info| !info.is_null()).cloned(),
                structured: true,
                tool_calls: Vec::new(),
            };
        }
    }

    LlmOutput { reply: raw.trim().to_string(), ..LlmOutput::default() }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim().strip_suffix("```").map(str::trim_end).unwrap_or(rest).trim()
}

/// The function declarations offered to the model once the discovery funnel
/// is complete. Parameter schemas mirror the card tracker and calendar
/// contracts.
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: TOOL_CREATE_OR_UPDATE_CARD,
            description: "Cria ou atualiza o card do lead no Pipefy com as informações \
                          coletadas (nome, email, empresa, necessidade, prazo, \
                          interesse_confirmado, meeting_link). Chame quando o cliente \
                          confirmar interesse, quando a conversa terminar sem interesse e \
                          para registrar o meeting_link após o agendamento.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "lead": {
                        "type": "object",
                        "description": "Objeto com os dados do lead: nome, email, empresa, \
                                        necessidade, prazo, interesse_confirmado, meeting_link."
                    }
                },
                "required": ["lead"]
            }),
        },
        ToolSpec {
            name: TOOL_GET_AVAILABLE_SLOTS,
            description: "Busca os horários disponíveis para reunião nos próximos 7 dias. \
                          Use apenas quando o cliente confirmar explicitamente o interesse.",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolSpec {
            name: TOOL_SCHEDULE_MEETING,
            description: "Agenda a reunião de pré-vendas no horário escolhido pelo cliente. \
                          O slot deve vir de get_available_slots_next_7_days e conter 'start' \
                          em ISO 8601; o lead deve conter nome, email, empresa e necessidade.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "slot": {
                        "type": "object",
                        "description": "Slot escolhido, com 'start' (início em ISO 8601)."
                    },
                    "lead": {
                        "type": "object",
                        "description": "Dados do lead: nome, email, empresa, necessidade."
                    }
                },
                "required": ["slot", "lead"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_structured_reply, tool_specs};

    #[test]
    fn structured_payload_yields_reply_and_info() {
        let output = parse_structured_reply(
            r#"{"reply": "Perfeito, Ana!", "info": {"nome": "Ana"}}"#,
        );
        assert!(output.structured);
        assert_eq!(output.reply, "Perfeito, Ana!");
        assert_eq!(output.info, Some(json!({"nome": "Ana"})));
    }

    #[test]
    fn code_fenced_payload_is_unwrapped() {
        let output =
            parse_structured_reply("```json\n{\"reply\": \"Qual é o seu e-mail?\"}\n```");
        assert!(output.structured);
        assert_eq!(output.reply, "Qual é o seu e-mail?");
        assert!(output.info.is_none());
    }

    #[test]
    fn malformed_payload_falls_back_to_raw_text() {
        let output = parse_structured_reply("Qual é o seu e-mail?");
        assert!(!output.structured);
        assert_eq!(output.reply, "Qual é o seu e-mail?");
    }

    #[test]
    fn json_without_reply_key_is_treated_as_raw_text() {
        let raw = r#"{"text": "sem contrato"}"#;
        let output = parse_structured_reply(raw);
        assert!(!output.structured);
        assert_eq!(output.reply, raw);
    }

    #[test]
    fn null_info_is_dropped() {
        let output = parse_structured_reply(r#"{"reply": "ok", "info": null}"#);
        assert!(output.structured);
        assert!(output.info.is_none());
    }

    #[test]
    fn three_tools_are_declared() {
        let specs = tool_specs();
        let names: Vec<&str> = specs.iter().map(|spec| spec.name).collect();
        assert_eq!(
            names,
            vec![
                "create_or_update_card_pipefy",
                "get_available_slots_next_7_days",
                "schedule_meeting"
            ]
        );
        for spec in &specs {
            assert!(spec.parameters.get("type").is_some());
        }
    }
}
