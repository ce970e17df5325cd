use anyhow::{Context, Result, bail};
use clap::Args;
use shared::models::NotificationCategory;
use uuid::Uuid;

use cli::api::ApiClient;

use super::session;

#[derive(Args, Debug)]
#[command(about = "Mark notifications read or unread")]
pub struct MarkArgs {
    /// Notification to mark
    #[arg(long, conflicts_with = "all")]
    pub id: Option<Uuid>,

    /// Mark the notification unread instead of read
    #[arg(long, requires = "id")]
    pub unread: bool,

    /// Mark everything read
    #[arg(long)]
    pub all: bool,

    /// Restrict --all to one category
    #[arg(long, requires = "all")]
    pub category: Option<String>,
}

pub async fn handle_mark(args: MarkArgs) -> Result<()> {
    let stored = session::load_session()?;
    let api = ApiClient::new(stored.server, stored.token).context("failed to build API client")?;

    if args.all {
        let category = args
            .category
            .as_deref()
            .map(|raw| {
                NotificationCategory::try_from(raw)
                    .map_err(|_| anyhow::anyhow!("unknown category '{raw}'"))
            })
            .transpose()?;

        let updated = api.mark_all_read(category).await?;
        println!("Marked {updated} notifications read");
        return Ok(());
    }

    let Some(id) = args.id else {
        bail!("pass --id <uuid> or --all");
    };

    let view = if args.unread {
        api.mark_unread(id).await?
    } else {
        api.mark_read(id).await?
    };

    println!(
        "{}: {}",
        view.id,
        if view.read_at.is_some() { "read" } else { "unread" }
    );
    Ok(())
}
