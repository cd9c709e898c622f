use assist_core::types::PROFILE_SYSTEM_PROMPT;
use assist_core::{Address, UserProfile};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use openai_client::{structured_result, LlmError, StructuredPrompt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::routes::ApiResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(put_profile))
        .route("/profile/form", post(submit_form))
        .route("/profile/extract", post(extract_profile))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredProfile {
    pub profile: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Flat form fields as posted by an HTML form.
#[derive(Debug, Deserialize, Default)]
pub struct ProfileForm {
    name: Option<String>,
    age: Option<String>,
    email: Option<String>,
    street: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

impl ProfileForm {
    fn into_profile(self) -> Result<UserProfile, String> {
        let age = match non_blank(self.age) {
            Some(raw) => Some(
                raw.parse::<i32>()
                    .map_err(|_| format!("age must be a whole number, got {raw:?}"))?,
            ),
            None => None,
        };

        let address = Address {
            street: non_blank(self.street),
            city: non_blank(self.city),
            country: non_blank(self.country),
        };

        Ok(UserProfile {
            name: non_blank(self.name),
            age,
            email: non_blank(self.email),
            address: (!address.is_empty()).then_some(address),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    text: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    deployment_id: Option<String>,
    /// Merge the suggestion into the stored profile; typed values win.
    #[serde(default)]
    apply: bool,
}

async fn get_profile(State(state): State<AppState>) -> impl IntoResponse {
    let stored = state.profile.read().await.clone();
    Json(ApiResponse::ok(stored))
}

async fn put_profile(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> impl IntoResponse {
    let stored = store(&state, profile).await;
    info!("profile replaced via json");
    Json(ApiResponse::ok(stored))
}

async fn submit_form(
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> impl IntoResponse {
    match form.into_profile() {
        Ok(profile) => {
            let stored = store(&state, profile).await;
            info!("profile submitted via form");
            (StatusCode::OK, Json(ApiResponse::ok(stored)))
        }
        Err(message) => {
            warn!(%message, "rejected profile form");
            (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)))
        }
    }
}

async fn extract_profile(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> impl IntoResponse {
    let Some(completion) = state.completion.clone() else {
        tracing::error!("OpenAI client not initialised");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<Option<UserProfile>>::error(
                "OpenAI is not configured: set OPENAI_BASE_URL and OPENAI_API_KEY",
            )),
        );
    };

    if request.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("text must not be empty")),
        );
    }

    let prompt = StructuredPrompt::new(PROFILE_SYSTEM_PROMPT, request.text)
        .with_function_schema(UserProfile::function_schema())
        .with_model(request.model)
        .with_deployment(request.deployment_id);

    let suggestion = match structured_result::<UserProfile, _>(completion.as_ref(), &prompt).await {
        Ok(suggestion) => suggestion,
        Err(err) => {
            tracing::error!(error = %err, "profile extraction failed");
            return (error_status(&err), Json(ApiResponse::error(err.to_string())));
        }
    };

    info!(
        found = suggestion.is_some(),
        apply = request.apply,
        "profile extraction completed"
    );

    if request.apply {
        if let Some(suggested) = suggestion.clone() {
            let current = state.profile.read().await.profile.clone();
            store(&state, current.merge(suggested)).await;
        }
    }

    (StatusCode::OK, Json(ApiResponse::ok(suggestion)))
}

async fn store(state: &AppState, profile: UserProfile) -> StoredProfile {
    let mut guard = state.profile.write().await;
    *guard = StoredProfile {
        profile,
        updated_at: Some(current_timestamp_iso()),
    };
    guard.clone()
}

fn error_status(err: &LlmError) -> StatusCode {
    match err {
        LlmError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        err if err.is_transport() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn current_timestamp_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
