//! `gatehouse fetch-cards`: refresh the local card file.

use anyhow::{Context, Result, bail};
use gatehouse_controller::GateConfig;
use gatehouse_network::fetch_card_uids;
use gatehouse_storage::AuthorizationSet;
use tracing::info;

use super::rest_client;

pub async fn fetch_cards(config: &GateConfig) -> Result<()> {
    let path = &config.gate.card_file;
    let client = rest_client(config)?;
    let uids = fetch_card_uids(&client)
        .await
        .context("failed to fetch card identifiers")?;

    let fetched: AuthorizationSet = uids.into_iter().collect();
    if fetched.is_empty() {
        bail!("remote returned no card identifiers, keeping {}", path.display());
    }

    let previous = AuthorizationSet::load_json(path).map(|set| set.len()).unwrap_or(0);
    fetched
        .save_json(path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), previous, cards = fetched.len(), "Card file replaced");
    println!("Saved {} cards to {} (was {previous})", fetched.len(), path.display());
    Ok(())
}
