use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::Args;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Stored session: the server origin and the bearer token issued by the
/// platform's auth layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub server: Url,
    pub token: Uuid,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: Url,

    /// Session token issued at sign-in
    #[arg(long)]
    pub token: Uuid,
}

pub fn login(args: &LoginArgs) -> Result<()> {
    let path = session_path();
    ensure_parent(&path)?;

    let session = StoredSession {
        server: args.server.clone(),
        token: args.token,
    };
    fs::write(&path, serde_json::to_string_pretty(&session)?)
        .with_context(|| format!("failed to write session file {}", path.display()))?;

    println!("Session saved to {}", path.display());
    Ok(())
}

pub fn show() -> Result<()> {
    let session = load_session()?;
    println!("Server: {}", session.server);
    println!("Token:  {}", session.token);
    Ok(())
}

pub fn logout() -> Result<()> {
    let path = session_path();
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove session file {}", path.display()))?;
        println!("Removed session at {}", path.display());
    } else {
        println!("No session found at {}", path.display());
    }
    Ok(())
}

pub fn session_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("briefwire").join("session.json"))
        .unwrap_or_else(|| PathBuf::from(".briefwire-session.json"))
}

pub fn load_session() -> Result<StoredSession> {
    let path = session_path();
    let content = fs::read_to_string(&path).with_context(|| {
        format!(
            "no session found at {}; run `briefwire session login` first",
            path.display()
        )
    })?;

    let session: StoredSession =
        serde_json::from_str(&content).context("session file is corrupt; log in again")?;
    Ok(session)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
            Ok(())
        }
        None => bail!("session path has no parent directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_session_round_trips_through_json() {
        let session = StoredSession {
            server: Url::parse("http://localhost:8080").unwrap(),
            token: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&session).unwrap();
        let back: StoredSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server, session.server);
        assert_eq!(back.token, session.token);
    }
}
