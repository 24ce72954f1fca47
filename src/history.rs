//! Recently checked locations, newest first

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::{self, PersistentCache};
use crate::models::Coordinates;

pub const MAX_RECENT: usize = 5;

const HISTORY_KEY: &str = "history:recent";
const HISTORY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentLocation {
    pub label: String,
    pub coordinates: Coordinates,
    pub checked_at: DateTime<Utc>,
}

impl RecentLocation {
    #[must_use]
    pub fn new(label: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            label: label.into(),
            coordinates,
            checked_at: Utc::now(),
        }
    }

    fn same_place(&self, other: &RecentLocation) -> bool {
        self.label == other.label && self.coordinates == other.coordinates
    }
}

/// Insert `entry` at the top; an existing entry for the same place moves up
/// and keeps its original timestamp.
#[must_use]
pub fn push_recent(mut recent: Vec<RecentLocation>, entry: RecentLocation) -> Vec<RecentLocation> {
    let entry = match recent.iter().position(|r| r.same_place(&entry)) {
        Some(index) => recent.remove(index),
        None => entry,
    };
    recent.insert(0, entry);
    recent.truncate(MAX_RECENT);
    recent
}

pub async fn load(cache: &PersistentCache) -> Result<Vec<RecentLocation>> {
    Ok(cache.get(HISTORY_KEY).await?.unwrap_or_default())
}

pub async fn record_in(cache: &PersistentCache, entry: RecentLocation) -> Result<()> {
    let recent = push_recent(load(cache).await?, entry);
    cache.put(HISTORY_KEY, recent, HISTORY_TTL).await
}

/// Record a visit in the global cache; no-op when the cache is disabled
pub async fn record(entry: RecentLocation) -> Result<()> {
    match cache::global() {
        Some(cache) => record_in(cache, entry).await,
        None => Ok(()),
    }
}

/// Recent locations from the global cache; empty when the cache is disabled
pub async fn list() -> Result<Vec<RecentLocation>> {
    match cache::global() {
        Some(cache) => load(cache).await,
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(label: &str, lat: f64) -> RecentLocation {
        RecentLocation::new(label, Coordinates::new(lat, -46.0))
    }

    #[test]
    fn test_newest_first_and_capped() {
        let mut recent = Vec::new();
        for i in 0..7 {
            recent = push_recent(recent, place(&format!("Place {i}"), -20.0 - f64::from(i)));
        }

        assert_eq!(recent.len(), MAX_RECENT);
        assert_eq!(recent[0].label, "Place 6");
        assert_eq!(recent[4].label, "Place 2");
    }

    #[test]
    fn test_revisit_moves_to_top() {
        let mut recent = Vec::new();
        recent = push_recent(recent, place("Santos", -23.9));
        recent = push_recent(recent, place("Campinas", -22.9));
        recent = push_recent(recent, place("Sorocaba", -23.5));

        let first_visit = recent[2].checked_at;
        recent = push_recent(recent, place("Santos", -23.9));

        let labels: Vec<_> = recent.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["Santos", "Sorocaba", "Campinas"]);
        assert_eq!(recent[0].checked_at, first_visit);
    }

    #[test]
    fn test_same_label_different_coordinates_is_distinct() {
        let mut recent = Vec::new();
        recent = push_recent(recent, place("Centro", -10.0));
        recent = push_recent(recent, place("Centro", -11.0));
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn test_record_persists_in_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::open(dir.path()).unwrap();

        record_in(&cache, place("Recife", -8.05)).await.unwrap();
        record_in(&cache, place("Natal", -5.79)).await.unwrap();

        let recent = load(&cache).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].label, "Natal");
    }
}
