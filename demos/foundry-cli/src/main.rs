//! Command-line front end for the tool foundry.
//!
//! Reads configuration from the environment (and `.env`), then creates,
//! invokes or administers tools in the configured data directory.

use agent_foundry::catalog::{CredentialRecord, CredentialSource};
use agent_foundry::config::FoundryConfig;
use agent_foundry::kernel::{CreateToolRequest, FactoryError, InvokeError};
use agent_foundry::primitives::{AgentId, CredentialName, ToolId};
use agent_foundry::telemetry::init_tracing;
use agent_foundry::Foundry;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

#[derive(Parser)]
#[command(name = "foundry", about = "Synthesize, review and run agent tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a tool from a natural-language request.
    Create {
        /// What the tool should do.
        prompt: String,
        /// Preferred identifier.
        #[arg(long)]
        name: Option<String>,
        /// Agent to link the new tool to.
        #[arg(long)]
        agent: Option<AgentId>,
    },
    /// Run a persisted tool with JSON arguments.
    Invoke {
        /// Tool identifier.
        tool: String,
        /// Arguments as a JSON object.
        #[arg(default_value = "{}")]
        arguments: String,
        /// Restrict lookup to this agent's tools.
        #[arg(long)]
        agent: Option<AgentId>,
    },
    /// Send one chat message to an agent.
    Chat {
        /// User message.
        message: String,
        /// Agent to talk to; the default agent when omitted.
        #[arg(long)]
        agent: Option<AgentId>,
    },
    /// List catalogued tools.
    Tools,
    /// Delete a tool, its agent links and its source file.
    DeleteTool {
        /// Tool identifier.
        tool: ToolId,
    },
    /// Manage credential records.
    #[command(subcommand)]
    Credentials(CredentialCommand),
}

#[derive(Subcommand)]
enum CredentialCommand {
    /// Show every record with masked values.
    List,
    /// Create or replace a record.
    Set {
        /// Credential name, e.g. `WEATHER_KEY`.
        name: CredentialName,
        /// Secret value.
        value: String,
        /// Human description.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a record.
    Delete {
        /// Credential name.
        name: CredentialName,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FoundryConfig::from_env().context("reading configuration")?;
    init_tracing(&config.telemetry)?;
    debug!(?config, "configuration loaded");

    let foundry = Foundry::from_config(&config)
        .await
        .context("assembling the foundry")?;

    match cli.command {
        Command::Create {
            prompt,
            name,
            agent,
        } => create(&foundry, prompt, name, agent).await,
        Command::Invoke {
            tool,
            arguments,
            agent,
        } => invoke(&foundry, &tool, &arguments, agent).await,
        Command::Chat { message, agent } => {
            let outcome = foundry.chat(agent, &message).await?;
            for call in &outcome.tool_calls {
                println!("[{}] {} -> {}", call.name, call.arguments, call.result);
            }
            println!("{}", outcome.reply);
            Ok(())
        }
        Command::Tools => {
            for record in foundry.catalog().list_tools().await {
                let credentials: Vec<&str> =
                    record.credentials().iter().map(CredentialName::as_str).collect();
                println!(
                    "{}\t{}\t[{}]",
                    record.id(),
                    record.description(),
                    credentials.join(", ")
                );
            }
            Ok(())
        }
        Command::DeleteTool { tool } => {
            if !foundry.catalog().delete_tool(&tool).await? {
                bail!("no tool named `{tool}`");
            }
            println!("deleted {tool}");
            Ok(())
        }
        Command::Credentials(command) => credentials(&foundry, command).await,
    }
}

async fn create(
    foundry: &Foundry,
    prompt: String,
    name: Option<String>,
    agent: Option<AgentId>,
) -> Result<()> {
    let mut request = CreateToolRequest::new(prompt);
    if let Some(name) = name {
        request = request.with_name_hint(name);
    }
    if let Some(agent) = agent {
        request = request.with_owner(agent);
    }

    match foundry.create_tool(request).await {
        Ok(created) => {
            println!("created {}", created.record.id());
            if !created.record.credentials().is_empty() {
                let names: Vec<&str> = created
                    .record
                    .credentials()
                    .iter()
                    .map(CredentialName::as_str)
                    .collect();
                println!("credentials: {}", names.join(", "));
            }
            if created.attempts > 1 {
                println!("passed review after {} attempts", created.attempts);
            }
            Ok(())
        }
        Err(FactoryError::SafetyRejected { reasons }) => {
            eprintln!("rejected by the safety review:");
            for reason in &reasons {
                eprintln!("  - {reason}");
            }
            bail!("tool was not created")
        }
        Err(err) if err.is_retryable() => {
            bail!("generation capacity exhausted, try again later: {err}")
        }
        Err(err) => Err(err.into()),
    }
}

async fn invoke(
    foundry: &Foundry,
    tool: &str,
    arguments: &str,
    agent: Option<AgentId>,
) -> Result<()> {
    let arguments: Value =
        serde_json::from_str(arguments).context("arguments must be valid JSON")?;
    match foundry.invoke_tool(tool, agent, arguments).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err @ InvokeError::MissingCredential { .. }) => {
            eprintln!("{err}");
            bail!("register the credentials with `foundry credentials set`")
        }
        Err(err) => Err(err.into()),
    }
}

async fn credentials(foundry: &Foundry, command: CredentialCommand) -> Result<()> {
    let catalog = foundry.catalog();
    match command {
        CredentialCommand::List => {
            for summary in catalog.list_credentials().await {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    summary.name, summary.masked_value, summary.source, summary.description
                );
            }
        }
        CredentialCommand::Set {
            name,
            value,
            description,
        } => {
            let record = CredentialRecord::new(name, value, description, CredentialSource::Admin);
            let summary = catalog.upsert_credential(&record).await?;
            println!("stored {} ({})", summary.name, summary.masked_value);
        }
        CredentialCommand::Delete { name } => {
            if !catalog.delete_credential(&name).await? {
                bail!("no credential named `{name}`");
            }
            println!("deleted {name}");
        }
    }
    Ok(())
}
