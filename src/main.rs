//! podctl - inspect and share chat conversations stored in a Solid Pod
//!
//! Uses a static bearer token from the config file or `POD_ACCESS_TOKEN`.
//! `read-shared` always reads without credentials.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use pod_storage::logging::{filter_for_level, init_logging};
use pod_storage::transport::HttpFetch;
use pod_storage::{
    ConversationId, ConversationQuery, ConversationStore, MessageId, MessageStore, PodConfig,
    PodIdentity, PodStorage, PublicShareReader,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebID of the Pod owner
    #[arg(long, env = "POD_WEB_ID")]
    web_id: Option<String>,

    /// Opaque user id stored as the record owner
    #[arg(long, env = "POD_USER_ID")]
    user_id: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List conversations, newest first
    List {
        #[arg(long)]
        archived: bool,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Print one conversation and its messages as JSON
    Show { id: String },
    /// Make a conversation publicly readable
    Share { id: String },
    /// Withdraw public access from a conversation
    Unshare { id: String },
    /// Read a shared conversation without credentials
    ReadShared {
        conversation_url: String,
        messages_url: String,
        /// Stop at this message
        #[arg(long)]
        target: Option<String>,
    },
    /// Delete conversations and their messages
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PodConfig> {
    match path {
        Some(path) => PodConfig::load_from(path),
        None => PodConfig::from_env().context("Invalid POD_* environment"),
    }
}

async fn connect(args: &Args, config: PodConfig) -> Result<PodStorage> {
    let web_id = args
        .web_id
        .clone()
        .context("--web-id (or POD_WEB_ID) is required")?;
    let user_id = args.user_id.clone().unwrap_or_else(|| web_id.clone());
    let token = config
        .static_token()
        .map(str::to_string)
        .or_else(|| std::env::var("POD_ACCESS_TOKEN").ok())
        .context("an access token is required (credential_source or POD_ACCESS_TOKEN)")?;

    let fetch = HttpFetch::with_token(token, config.request_timeout())?;
    let storage = PodStorage::connect(config, Arc::new(fetch), PodIdentity::new(user_id, web_id))
        .await?;
    Ok(storage)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&filter_for_level(&args.log_level));

    let config = load_config(args.config.as_ref())?;

    match &args.command {
        Command::List {
            archived,
            search,
            limit,
        } => {
            let storage = connect(&args, config).await?;
            let query = ConversationQuery {
                is_archived: *archived,
                search: search.clone(),
                ..Default::default()
            }
            .with_limit(*limit);
            let page = storage.conversations().list_by_cursor(&query).await?;
            for conversation in &page.conversations {
                println!(
                    "{}\t{}\t{}",
                    conversation.conversation_id,
                    conversation.updated_at.to_rfc3339(),
                    conversation.title.as_deref().unwrap_or("(untitled)")
                );
            }
            if let Some(cursor) = page.next_cursor {
                println!("next: {}", cursor);
            }
        }
        Command::Show { id } => {
            let storage = connect(&args, config).await?;
            let id = ConversationId::from(id.as_str());
            let conversation = storage
                .conversations()
                .get(&id)
                .await?
                .with_context(|| format!("conversation {} not found", id))?;
            let messages = storage.messages().list_by_conversation(&id).await?;
            let output = serde_json::json!({
                "conversation": conversation,
                "messages": messages,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Share { id } => {
            let storage = connect(&args, config).await?;
            let id = ConversationId::from(id.as_str());
            let report = storage.access().share_conversation(&id).await?;
            let (conversation_url, messages_url) = storage.shared_locations(&id);
            println!("shared ({} applied, {} failed)", report.applied, report.failed);
            println!("conversation: {}", conversation_url);
            println!("messages:     {}", messages_url);
        }
        Command::Unshare { id } => {
            let storage = connect(&args, config).await?;
            let report = storage
                .access()
                .unshare_conversation(&ConversationId::from(id.as_str()))
                .await?;
            println!("unshared ({} applied, {} failed)", report.applied, report.failed);
        }
        Command::ReadShared {
            conversation_url,
            messages_url,
            target,
        } => {
            let reader = PublicShareReader::new(Arc::new(HttpFetch::public(config.request_timeout())?));
            let target = target.as_deref().map(MessageId::from);
            let shared = reader
                .read_shared_conversation(conversation_url, messages_url, target.as_ref())
                .await
                .context("conversation is not publicly readable")?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "conversation": shared.conversation,
                "messages": shared.messages,
            }))?);
        }
        Command::Delete { ids } => {
            let storage = connect(&args, config).await?;
            let ids: Vec<ConversationId> = ids.iter().map(|id| ConversationId::from(id.as_str())).collect();
            let deleted = storage.conversations().delete_batch(&ids).await?;
            println!("deleted {} of {}", deleted, ids.len());
        }
    }

    Ok(())
}
