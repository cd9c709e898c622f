use assist_core::config::{AppConfig, OpenAiConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::LlmError;
use crate::extract::extract_structured;
use crate::request::{completions_path, AuthScheme, CompletionRequest};

/// Everything one structured-completion call needs.
#[derive(Debug, Clone, Default)]
pub struct StructuredPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
    pub function_schema: Option<Value>,
    pub model: Option<String>,
    pub deployment_id: Option<String>,
}

impl StructuredPrompt {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_function_schema(mut self, schema: Value) -> Self {
        self.function_schema = Some(schema);
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_deployment(mut self, deployment_id: Option<String>) -> Self {
        self.deployment_id = deployment_id;
        self
    }
}

/// Sends one completion and hands back the raw response document.
#[async_trait]
pub trait StructuredCompletion: Send + Sync {
    async fn complete(&self, prompt: &StructuredPrompt) -> Result<Value, LlmError>;
}

/// Runs `prompt` through `completion` and decodes the first choice into `T`.
///
/// Transport failures are errors; an unusable reply is `Ok(None)`.
pub async fn structured_result<T, C>(
    completion: &C,
    prompt: &StructuredPrompt,
) -> Result<Option<T>, LlmError>
where
    T: DeserializeOwned,
    C: StructuredCompletion + ?Sized,
{
    let response = completion.complete(prompt).await?;
    Ok(decode_response(&response))
}

fn decode_response<T>(response: &Value) -> Option<T>
where
    T: DeserializeOwned,
{
    let result = extract_structured::<T>(response);
    if result.is_none() {
        info!("completion carried no usable structured result");
    }
    result
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
    auth: AuthScheme,
}

impl OpenAiClient {
    pub fn from_app_config(config: &AppConfig) -> anyhow::Result<Self> {
        let openai = config.require_openai_config()?.clone();
        Ok(Self::new(openai)?)
    }

    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        config
            .validate()
            .map_err(|err| LlmError::Config(err.to_string()))?;

        let auth = AuthScheme::for_base_url(&config.base_url);
        let mut headers = HeaderMap::new();
        match auth {
            AuthScheme::Bearer => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            AuthScheme::ApiKeyHeader => {
                let mut value = HeaderValue::from_str(&config.api_key)?;
                value.set_sensitive(true);
                headers.insert("api-key", value);
            }
        }

        let http = Client::builder()
            .user_agent("profile-assist/0.1")
            .default_headers(headers)
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { http, config, auth })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        self.auth
    }

    /// Ask the model for a `T`, preferring function-call arguments over free text.
    pub async fn get_structured_result<T>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        function_schema: Option<Value>,
        model: Option<&str>,
        deployment_id: Option<&str>,
    ) -> Result<Option<T>, LlmError>
    where
        T: DeserializeOwned,
    {
        let prompt = StructuredPrompt {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            function_schema,
            model: model.map(str::to_string),
            deployment_id: deployment_id.map(str::to_string),
        };
        structured_result(self, &prompt).await
    }

    /// Like [`OpenAiClient::get_structured_result`] with a per-call deadline.
    pub async fn get_structured_result_with_timeout<T>(
        &self,
        prompt: &StructuredPrompt,
        timeout: Duration,
    ) -> Result<Option<T>, LlmError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(prompt, timeout).await?;
        Ok(decode_response(&response))
    }

    fn endpoint(&self, deployment_id: Option<&str>) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            completions_path(deployment_id)
        )
    }

    #[instrument(skip(self, prompt), fields(auth = ?self.auth))]
    async fn send(&self, prompt: &StructuredPrompt, timeout: Duration) -> Result<Value, LlmError> {
        let model = prompt.model.clone().or_else(|| self.config.model.clone());
        let deployment_id = prompt
            .deployment_id
            .as_deref()
            .or(self.config.deployment_id.as_deref());

        let request = CompletionRequest::new(
            &prompt.system_prompt,
            &prompt.user_prompt,
            prompt.function_schema.clone(),
            model,
        );
        let request_json = serde_json::to_string(&request)?;

        info!(
            model = request.model.as_deref().unwrap_or("<default>"),
            deployment_id = deployment_id.unwrap_or("<none>"),
            functions = request.functions.is_some(),
            "sending chat completion request"
        );
        if self.config.log_payloads {
            debug!(request_json = %request_json, "chat completion request body");
        }

        let url = self.endpoint(deployment_id);
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .timeout(timeout)
            .body(request_json)
            .send()
            .await
            .map_err(|err| map_send_error(err, timeout))?;

        let status = response.status();
        info!(status = %status, "chat completion response status");

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            warn!(status = %status, "chat completion request rejected");
            return Err(LlmError::HttpStatus { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|err| map_send_error(err, timeout))?;
        if self.config.log_payloads {
            debug!(response_body = %body, "chat completion response body");
        }

        serde_json::from_str(&body).map_err(|err| LlmError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl StructuredCompletion for OpenAiClient {
    async fn complete(&self, prompt: &StructuredPrompt) -> Result<Value, LlmError> {
        self.send(prompt, self.config.timeout()).await
    }
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::HttpClient(err)
    }
}
