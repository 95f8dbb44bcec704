use crate::utils::format_duration;

use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Remembers the creation time of the most recently applied stream record so
/// the status display can show how far behind the source the writer is.
#[derive(Debug, Default)]
pub struct LatencyLock {
    timestamp: RwLock<Option<DateTime<Utc>>>,
}

impl LatencyLock {
    pub fn update(&self, last_seen: DateTime<Utc>) {
        let mut timestamp = self
            .timestamp
            .write()
            .unwrap_or_else(|err| err.into_inner());
        *timestamp = Some(last_seen);
    }

    pub fn status(&self) -> String {
        let timestamp = self.timestamp.read().unwrap_or_else(|err| err.into_inner());

        match *timestamp {
            Some(last_seen) => {
                let age = (Utc::now() - last_seen).to_std().unwrap_or_default();
                format!("~{}", format_duration(age))
            }
            None => "--".to_owned(),
        }
    }
}
