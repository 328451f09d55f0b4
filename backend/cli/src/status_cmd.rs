//! `pantry status`: one health probe against the relay.

use anyhow::Result;

use pantry_client::{BackoffPolicy, ScanClient};

use crate::terminal_output::{note_error, note_success};

pub async fn run(api_url: &str) -> Result<bool> {
    let client = ScanClient::new(api_url).with_backoff(BackoffPolicy {
        max_attempts: 1,
        ..Default::default()
    });

    match client.check_health().await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.services.model_backend {
                note_success("Relay is up");
            } else {
                note_error("Relay is up, but no model credential is configured");
            }
            Ok(true)
        }
        Err(_) => {
            note_error(&format!("Relay is not reachable at {}", client.base_url()));
            Ok(false)
        }
    }
}
