use anyhow::{Context, Result};
use clap::Args;
use shared::models::IngestMessageRequest;
use uuid::Uuid;

use cli::api::ApiClient;

use super::session;

#[derive(Args, Debug)]
#[command(about = "Send a message into a conversation")]
pub struct SendArgs {
    /// Conversation identifier
    #[arg(long, alias = "conv")]
    pub conversation: Uuid,

    /// Message text
    #[arg()]
    pub text: String,

    /// Idempotency key; retries with the same key return the original message
    #[arg(long)]
    pub client_id: Option<String>,

    /// Participants to mention explicitly
    #[arg(long = "mention")]
    pub mentions: Vec<Uuid>,
}

pub async fn handle_send(args: SendArgs) -> Result<()> {
    let stored = session::load_session()?;
    let api = ApiClient::new(stored.server, stored.token).context("failed to build API client")?;

    let request = IngestMessageRequest {
        client_id: args
            .client_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        content: args.text,
        mentions: args.mentions,
    };

    let message = api.send_message(args.conversation, &request).await?;
    println!(
        "Message stored: id={} seq={} clientId={}",
        message.id, message.seq, message.client_id
    );
    Ok(())
}

#[derive(Args, Debug)]
#[command(about = "Advance the read cursor for a conversation")]
pub struct ReadArgs {
    /// Conversation identifier
    #[arg(long, alias = "conv")]
    pub conversation: Uuid,

    /// Highest seq the client has displayed
    #[arg(long)]
    pub seq: i64,
}

pub async fn handle_read(args: ReadArgs) -> Result<()> {
    let stored = session::load_session()?;
    let api = ApiClient::new(stored.server, stored.token).context("failed to build API client")?;

    api.advance_read_state(args.conversation, args.seq).await?;
    let summary = api.conversation(args.conversation).await?;
    let unread = api.conversation_unread(args.conversation).await?;
    println!(
        "Cursor advanced in '{}' (latest seq {}); {} unread remaining",
        summary.title, summary.latest_seq, unread
    );
    Ok(())
}
