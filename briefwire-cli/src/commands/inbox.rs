use anyhow::{Context, Result};
use clap::Args;
use shared::models::NotificationCategory;
use std::sync::Arc;

use cli::api::ApiClient;
use cli::inbox::InboxStore;
use shared::config::server::{Config, Profile};

use super::session;

#[derive(Args, Debug)]
#[command(about = "List notifications and unread counts")]
pub struct InboxArgs {
    /// Restrict to one category (message, system, payment, intake, matter)
    #[arg(long)]
    pub category: Option<String>,

    /// Show only unread notifications
    #[arg(long)]
    pub unread_only: bool,

    /// Number of pages to fetch
    #[arg(long, default_value_t = 1)]
    pub pages: u32,
}

pub async fn handle_inbox(args: InboxArgs) -> Result<()> {
    let stored = session::load_session()?;
    let api = ApiClient::new(stored.server, stored.token).context("failed to build API client")?;

    let category = args
        .category
        .as_deref()
        .map(|raw| {
            NotificationCategory::try_from(raw)
                .map_err(|_| anyhow::anyhow!("unknown category '{raw}'"))
        })
        .transpose()?;

    let config = Config::default_for_profile(Profile::Dev);
    let mut store = InboxStore::new(Arc::new(api.clone()), &config.notifications);
    store.refresh_counts().await;

    for target in category.map_or_else(|| NotificationCategory::ALL.to_vec(), |c| vec![c]) {
        println!(
            "{} ({} unread)",
            target.as_str(),
            store.unread_count(target)
        );

        for _ in 0..args.pages {
            store.load_more(target).await;
        }

        let cache = store.category(target);
        if let Some(error) = &cache.error {
            eprintln!("  warning: {error}");
        }
        for item in &cache.items {
            if args.unread_only && !item.is_unread() {
                continue;
            }
            let marker = if item.is_unread() { "*" } else { " " };
            println!(
                "  {} [{}] {} - {}",
                marker,
                item.created_at.0.format("%Y-%m-%d %H:%M"),
                item.title,
                item.body
            );
        }
        if cache.has_more {
            println!("  (more available; pass --pages {})", args.pages + 1);
        }
        println!();
    }

    Ok(())
}
