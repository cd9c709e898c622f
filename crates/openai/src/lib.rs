pub mod client;
pub mod error;
pub mod extract;
pub mod request;

pub use client::{structured_result, OpenAiClient, StructuredCompletion, StructuredPrompt};
pub use error::LlmError;
pub use extract::{extract_json_span, extract_structured};
pub use request::{completions_path, AuthScheme, ChatMessage, CompletionRequest, API_VERSION};
