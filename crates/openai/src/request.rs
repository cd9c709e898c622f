use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const API_VERSION: &str = "2023-10-01-preview";
pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const OPENAI_PUBLIC_HOST: &str = "api.openai.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion body using the legacy `functions` / `function_call` fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<String>,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(
        system_prompt: &str,
        user_prompt: &str,
        function_schema: Option<Value>,
        model: Option<String>,
    ) -> Self {
        let function_call = function_schema.as_ref().map(|_| "auto".to_string());
        Self {
            model,
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            functions: function_schema.map(|schema| vec![schema]),
            function_call,
            temperature: 0.0,
        }
    }
}

/// Deployment-scoped path for gateway providers, generic path otherwise.
pub fn completions_path(deployment_id: Option<&str>) -> String {
    match deployment_id.filter(|id| !id.is_empty()) {
        Some(id) => format!(
            "/openai/deployments/{}/chat/completions?api-version={API_VERSION}",
            urlencoding::encode(id)
        ),
        None => COMPLETIONS_PATH.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>`
    ApiKeyHeader,
}

impl AuthScheme {
    pub fn for_base_url(base_url: &str) -> Self {
        if base_url.to_ascii_lowercase().contains(OPENAI_PUBLIC_HOST) {
            Self::Bearer
        } else {
            Self::ApiKeyHeader
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_without_schema_omits_function_fields() {
        let request = CompletionRequest::new("sys", "usr", None, Some("gpt-4o".into()));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert!(body.get("functions").is_none());
        assert!(body.get("function_call").is_none());
        assert_eq!(body["temperature"].as_f64(), Some(0.0));
        assert_eq!(
            body["messages"],
            json!([
                { "role": "system", "content": "sys" },
                { "role": "user", "content": "usr" }
            ])
        );
    }

    #[test]
    fn body_with_schema_selects_auto() {
        let schema = json!({ "name": "fill", "parameters": { "type": "object" } });
        let request = CompletionRequest::new("sys", "usr", Some(schema.clone()), None);
        let body = serde_json::to_value(&request).unwrap();

        assert!(body.get("model").is_none());
        assert_eq!(body["functions"], json!([schema]));
        assert_eq!(body["function_call"], "auto");
        assert_eq!(body["temperature"].as_f64(), Some(0.0));
    }

    #[test]
    fn prompts_are_passed_verbatim() {
        let system = "  Reply with JSON.\n";
        let user = "I'm \"Ann\" {not json}";
        let request = CompletionRequest::new(system, user, None, None);
        assert_eq!(request.messages[0], ChatMessage::system(system));
        assert_eq!(request.messages[1], ChatMessage::user(user));
    }

    #[test]
    fn deployment_path_uses_fixed_api_version() {
        assert_eq!(
            completions_path(Some("gpt4dep")),
            "/openai/deployments/gpt4dep/chat/completions?api-version=2023-10-01-preview"
        );
        assert_eq!(completions_path(None), "/v1/chat/completions");
        assert_eq!(completions_path(Some("")), "/v1/chat/completions");
    }

    #[test]
    fn deployment_id_is_encoded_as_given() {
        assert_eq!(
            completions_path(Some(" dep ")),
            "/openai/deployments/%20dep%20/chat/completions?api-version=2023-10-01-preview"
        );
        assert_eq!(
            completions_path(Some("team/gpt4?x")),
            "/openai/deployments/team%2Fgpt4%3Fx/chat/completions?api-version=2023-10-01-preview"
        );
    }

    #[test]
    fn auth_scheme_follows_host() {
        assert_eq!(AuthScheme::for_base_url("https://API.OpenAI.com"), AuthScheme::Bearer);
        assert_eq!(
            AuthScheme::for_base_url("https://contoso.openai.azure.com/"),
            AuthScheme::ApiKeyHeader
        );
    }
}
