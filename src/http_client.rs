use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

/// Feed calls carry their own timeout so a stalled collaborator degrades to
/// "no data" instead of hanging the batch.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Scoreboard endpoints reject the default library agent string.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client; every feed request goes through it, so the agent
/// and timeout are set once here.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")
    })
}
