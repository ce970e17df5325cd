use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use shared::config::server::{Config, Profile};
use shared::models::NotificationCategory;
use tokio::sync::mpsc;

use cli::api::ApiClient;
use cli::inbox::InboxStore;
use cli::stream::{NotificationStream, StreamStatus};

use super::session;

#[derive(Args, Debug)]
#[command(about = "Follow the live notification stream")]
pub struct WatchArgs {}

pub async fn handle_watch(_args: WatchArgs) -> Result<()> {
    let stored = session::load_session()?;
    let api = ApiClient::new(stored.server, stored.token).context("failed to build API client")?;

    let config = Config::default_for_profile(Profile::Dev);
    let mut store = InboxStore::new(Arc::new(api.clone()), &config.notifications);

    // Initial load over REST; the stream only signals what changed.
    store.refresh_counts().await;
    store.refresh_conversation_unread().await;
    print_counts(&store);

    let (events_tx, mut events_rx) = mpsc::channel(32);
    let stream = NotificationStream::spawn(Arc::new(api), config.stream.clone(), events_tx);
    let mut status = stream.status_watch();

    println!("Watching for notifications... (press Ctrl+C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow();
                println!("[stream {current:?}]");
                if current == StreamStatus::Stopped {
                    break;
                }
            }
            event = events_rx.recv() => {
                let Some(push) = event else { break };
                println!(
                    "[{}] {}",
                    push.category.as_str(),
                    push.title.as_deref().unwrap_or("(no title)")
                );
                store.handle_stream_event(&push).await;
                print_counts(&store);
            }
        }
    }

    stream.stop().await;
    Ok(())
}

fn print_counts(store: &InboxStore) {
    let summary: Vec<String> = NotificationCategory::ALL
        .into_iter()
        .map(|category| format!("{}={}", category.as_str(), store.unread_count(category)))
        .collect();
    println!("unread: {}", summary.join(" "));

    if !store.conversation_unread().is_empty() {
        for (conversation, count) in store.conversation_unread() {
            println!("  conversation {conversation}: {count} unread");
        }
    }
}
