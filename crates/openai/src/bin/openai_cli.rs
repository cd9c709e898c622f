use anyhow::{Context, Result};
use assist_core::config::AppConfig;
use assist_core::types::PROFILE_SYSTEM_PROMPT;
use assist_core::UserProfile;
use clap::{Parser, Subcommand};
use openai_client::{completions_path, OpenAiClient};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "openai-cli",
    about = "Structured chat-completion smoke tests",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a prompt pair and print the structured result (or null)
    Extract {
        /// System prompt
        #[arg(long, short = 's')]
        system: String,
        /// User prompt
        #[arg(long, short = 'u')]
        user: String,
        /// Function schema (JSON string)
        #[arg(long, conflicts_with = "profile_schema")]
        schema: Option<String>,
        /// Use the built-in user profile function schema
        #[arg(long, default_value_t = false)]
        profile_schema: bool,
        /// Model name, overrides OPENAI_MODEL
        #[arg(long, short = 'm')]
        model: Option<String>,
        /// Deployment id, overrides OPENAI_DEPLOYMENT_ID
        #[arg(long, short = 'd')]
        deployment: Option<String>,
    },
    /// Extract a user profile from a free-text description
    Profile {
        /// Text describing the user
        #[arg(long, short = 't')]
        text: String,
    },
    /// Print the completions path that would be requested
    Path {
        #[arg(long, short = 'd')]
        deployment: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            system,
            user,
            schema,
            profile_schema,
            model,
            deployment,
        } => {
            let function_schema = match (schema, profile_schema) {
                (Some(raw), _) => Some(parse_json(&raw, "schema")?),
                (None, true) => Some(UserProfile::function_schema()),
                (None, false) => None,
            };

            let client = build_client()?;
            let result: Option<Value> = client
                .get_structured_result(
                    &system,
                    &user,
                    function_schema,
                    model.as_deref(),
                    deployment.as_deref(),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Profile { text } => {
            let client = build_client()?;
            let profile: Option<UserProfile> = client
                .get_structured_result(
                    PROFILE_SYSTEM_PROMPT,
                    &text,
                    Some(UserProfile::function_schema()),
                    None,
                    None,
                )
                .await?;
            match profile {
                Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                None => println!("model returned no usable profile"),
            }
        }
        Command::Path { deployment } => {
            println!("{}", completions_path(deployment.as_deref()));
        }
    }

    Ok(())
}

fn build_client() -> Result<OpenAiClient> {
    let app_config = AppConfig::load_from_env()?;
    OpenAiClient::from_app_config(&app_config)
}

fn init_tracing() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        // tracing already initialised; ignore.
    }
    Ok(())
}

fn parse_json(input: &str, field: &str) -> Result<Value> {
    serde_json::from_str(input).with_context(|| format!("{field} is not valid JSON: {input}"))
}
