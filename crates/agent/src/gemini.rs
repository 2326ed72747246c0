//! Thin reqwest adapter for the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};

use selly_core::config::LlmConfig;
use selly_core::domain::session::ChatRole;

use crate::llm::{parse_structured_reply, ChatRequest, LlmClient, LlmError, LlmOutput, ToolCall};

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::Transport("llm api key is not configured".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, request: ChatRequest) -> Result<LlmOutput, LlmError> {
        let tool_enabled = request.tool_enabled();
        let body = build_request_body(&request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|error| LlmError::Protocol(format!("non-JSON response body: {error}")))?;

        if !status.is_success() {
            return Err(LlmError::Transport(format!(
                "generateContent returned {status}: {payload}"
            )));
        }

        parse_response_body(&payload, tool_enabled)
    }
}

/// Gemini has no assistant role; transcript assistant turns map to `model`
/// and everything else (including system) rides as `user` content. The
/// system prompt itself travels as `system_instruction`.
fn build_request_body(request: &ChatRequest) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .filter(|message| !message.content.is_empty())
        .map(|message| {
            let role = match message.role {
                ChatRole::Assistant => "model",
                ChatRole::User | ChatRole::System => "user",
            };
            json!({ "role": role, "parts": [{ "text": message.content }] })
        })
        .collect();

    let mut body = Map::new();
    body.insert(
        "system_instruction".to_string(),
        json!({ "parts": [{ "text": request.system_prompt }] }),
    );
    body.insert("contents".to_string(), Value::Array(contents));

    let mut generation_config = Map::new();
    generation_config.insert("temperature".to_string(), json!(0.5));

    match &request.tools {
        Some(tools) if !tools.is_empty() => {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            body.insert(
                "tools".to_string(),
                json!([{ "functionDeclarations": declarations }]),
            );
        }
        _ => {
            // Without tools the model is pinned to the {reply, info?} JSON
            // contract so stage extraction stays machine-readable.
            generation_config.insert("responseMimeType".to_string(), json!("application/json"));
            generation_config.insert(
                "responseSchema".to_string(),
                json!({
                    "type": "object",
                    "properties": {
                        "reply": { "type": "string" },
                        "info": {
                            "type": "object",
                            "properties": {
                                "nome": { "type": "string" },
                                "email": { "type": "string" },
                                "empresa": { "type": "string" },
                                "necessidade": { "type": "string" },
                                "prazo": { "type": "string" },
                                "interesse_confirmado": { "type": "boolean" }
                            }
                        }
                    },
                    "required": ["reply"]
                }),
            );
        }
    }

    body.insert("generationConfig".to_string(), Value::Object(generation_config));
    Value::Object(body)
}

fn parse_response_body(payload: &Value, tool_enabled: bool) -> Result<LlmOutput, LlmError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::Protocol("response carries no candidate parts".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        if let Some(fragment) = part.get("text").and_then(Value::as_str) {
            text.push_str(fragment);
        }
        if let Some(function_call) = part.get("functionCall") {
            let name = function_call
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::Protocol("functionCall without a name".to_string()))?;
            let args = function_call.get("args").cloned().unwrap_or_else(|| json!({}));
            tool_calls.push(ToolCall { name: name.to_string(), args });
        }
    }

    if tool_enabled {
        return Ok(LlmOutput { reply: text.trim().to_string(), tool_calls, ..LlmOutput::default() });
    }

    let mut output = parse_structured_reply(&text);
    output.tool_calls = tool_calls;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use selly_core::domain::session::ChatMessage;

    use crate::llm::{tool_specs, ChatRequest};

    use super::{build_request_body, parse_response_body};

    fn request(tools: bool) -> ChatRequest {
        ChatRequest {
            system_prompt: "persona".to_string(),
            messages: vec![
                ChatMessage::user("olá"),
                ChatMessage::assistant("Olá! Qual é o seu nome?"),
            ],
            tools: tools.then(tool_specs),
        }
    }

    #[test]
    fn body_maps_assistant_turns_to_model_role() {
        let body = build_request_body(&request(false));
        let contents = body["contents"].as_array().expect("contents");
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tool_enabled_body_skips_json_mode_and_declares_functions() {
        let body = build_request_body(&request(true));
        assert!(body["generationConfig"].get("responseMimeType").is_none());
        let declarations =
            body["tools"][0]["functionDeclarations"].as_array().expect("declarations");
        assert_eq!(declarations.len(), 3);
    }

    #[test]
    fn response_with_function_call_is_normalized() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Um momento." },
                        { "functionCall": {
                            "name": "get_available_slots_next_7_days",
                            "args": {}
                        }}
                    ]
                }
            }]
        });

        let output = parse_response_body(&payload, true).expect("parse");
        assert_eq!(output.reply, "Um momento.");
        assert_eq!(output.tool_calls.len(), 1);
        assert_eq!(output.tool_calls[0].name, "get_available_slots_next_7_days");
    }

    #[test]
    fn json_mode_response_is_parsed_into_reply_and_info() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "{\"reply\": \"Qual é a sua empresa?\", \"info\": {\"email\": \"ana@empresa.com\"}}" }
                    ]
                }
            }]
        });

        let output = parse_response_body(&payload, false).expect("parse");
        assert!(output.structured);
        assert_eq!(output.reply, "Qual é a sua empresa?");
        assert_eq!(output.info, Some(json!({"email": "ana@empresa.com"})));
    }

    #[test]
    fn empty_candidates_are_a_protocol_error() {
        assert!(parse_response_body(&json!({ "candidates": [] }), false).is_err());
    }
}
