//! Authorized card list download.

use crate::client::RestClient;
use crate::error::Result;
use gatehouse_core::CardUid;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CardRow {
    card_uid: Option<String>,
}

/// Card identifiers of every person in the directory.
///
/// Persons without a card are ignored; unparseable identifiers are skipped
/// with a warning. Duplicates are collapsed, first occurrence kept.
pub async fn fetch_card_uids(client: &RestClient) -> Result<Vec<CardUid>> {
    let table = &client.config().tables.persons;
    let rows: Vec<CardRow> = client
        .select(
            table,
            &[
                ("select", "card_uid".to_string()),
                ("card_uid", "not.is.null".to_string()),
            ],
        )
        .await?;

    let uids = collect_uids(rows);
    info!(count = uids.len(), "Fetched authorized cards");
    Ok(uids)
}

fn collect_uids(rows: Vec<CardRow>) -> Vec<CardUid> {
    let mut seen = HashSet::new();
    let mut uids = Vec::new();
    for raw in rows.into_iter().filter_map(|row| row.card_uid) {
        if raw.trim().is_empty() {
            continue;
        }
        match CardUid::parse(&raw) {
            Ok(uid) => {
                if seen.insert(uid.clone()) {
                    uids.push(uid);
                }
            }
            Err(e) => warn!(card_uid = %raw, error = %e, "Skipping invalid card identifier"),
        }
    }
    uids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(uid: Option<&str>) -> CardRow {
        CardRow {
            card_uid: uid.map(str::to_string),
        }
    }

    #[test]
    fn test_collect_skips_missing_and_invalid() {
        let uids = collect_uids(vec![
            row(Some("0xA1B2C3")),
            row(None),
            row(Some("")),
            row(Some("not-a-card")),
            row(Some("0x0102")),
        ]);
        let rendered: Vec<_> = uids.iter().map(CardUid::as_str).collect();
        assert_eq!(rendered, vec!["0xa1b2c3", "0x0102"]);
    }

    #[test]
    fn test_collect_collapses_case_duplicates() {
        let uids = collect_uids(vec![row(Some("0xa1b2c3")), row(Some("0XA1B2C3"))]);
        assert_eq!(uids.len(), 1);
    }
}
