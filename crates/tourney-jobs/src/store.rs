//! Persistence seam used by the tournament jobs.
//!
//! The jobs only talk to tournaments, notifications and scores through
//! [`TournamentStore`]. [`InMemoryTournamentStore`] backs tests and the
//! daemon's fixture mode; a database-backed store lives with the web service.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{Notification, NotificationKind, ScoreEntry, Tournament, TournamentStatus};

/// Storage operations needed by the jobs.
#[async_trait]
pub trait TournamentStore: Send + Sync {
    /// All tournaments currently in `status`.
    async fn list_by_status(&self, status: TournamentStatus)
        -> Result<Vec<Tournament>, StoreError>;

    /// Set the status of a tournament.
    async fn update_status(
        &self,
        tournament_id: &str,
        status: TournamentStatus,
    ) -> Result<(), StoreError>;

    /// Whether `user_id` received a `kind` notification for the tournament at or after `since`.
    async fn has_notification_since(
        &self,
        user_id: &str,
        tournament_id: &str,
        kind: NotificationKind,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn create_notification(&self, notification: Notification) -> Result<(), StoreError>;

    /// Whether `user_id` logged a score for `day`.
    async fn has_score_on(
        &self,
        tournament_id: &str,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<bool, StoreError>;
}

/// JSON fixture format accepted by [`InMemoryTournamentStore::from_json`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub tournaments: Vec<Tournament>,
    #[serde(default)]
    pub scores: Vec<ScoreEntry>,
}

/// Tournament store held entirely in memory.
#[derive(Default)]
pub struct InMemoryTournamentStore {
    tournaments: RwLock<HashMap<String, Tournament>>,
    notifications: RwLock<Vec<Notification>>,
    scores: RwLock<HashSet<ScoreEntry>>,
}

impl InMemoryTournamentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a fixture.
    pub fn from_fixture(fixture: StoreFixture) -> Self {
        Self {
            tournaments: RwLock::new(
                fixture
                    .tournaments
                    .into_iter()
                    .map(|t| (t.id.clone(), t))
                    .collect(),
            ),
            notifications: RwLock::new(Vec::new()),
            scores: RwLock::new(fixture.scores.into_iter().collect()),
        }
    }

    /// Build a store from a JSON fixture string.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(Self::from_fixture(serde_json::from_str(json)?))
    }

    /// Build a store from a JSON fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Storage(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub async fn insert_tournament(&self, tournament: Tournament) {
        self.tournaments
            .write()
            .await
            .insert(tournament.id.clone(), tournament);
    }

    pub async fn record_score(&self, entry: ScoreEntry) {
        self.scores.write().await.insert(entry);
    }

    pub async fn tournament(&self, tournament_id: &str) -> Option<Tournament> {
        self.tournaments.read().await.get(tournament_id).cloned()
    }

    /// Snapshot of every notification created so far.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl TournamentStore for InMemoryTournamentStore {
    async fn list_by_status(
        &self,
        status: TournamentStatus,
    ) -> Result<Vec<Tournament>, StoreError> {
        let mut matching: Vec<Tournament> = self
            .tournaments
            .read()
            .await
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(matching)
    }

    async fn update_status(
        &self,
        tournament_id: &str,
        status: TournamentStatus,
    ) -> Result<(), StoreError> {
        let mut tournaments = self.tournaments.write().await;
        let tournament = tournaments
            .get_mut(tournament_id)
            .ok_or_else(|| StoreError::NotFound(tournament_id.to_string()))?;
        tournament.status = status;
        Ok(())
    }

    async fn has_notification_since(
        &self,
        user_id: &str,
        tournament_id: &str,
        kind: NotificationKind,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.notifications.read().await.iter().any(|n| {
            n.user_id == user_id
                && n.tournament_id == tournament_id
                && n.kind == kind
                && n.created_at >= since
        }))
    }

    async fn create_notification(&self, notification: Notification) -> Result<(), StoreError> {
        self.notifications.write().await.push(notification);
        Ok(())
    }

    async fn has_score_on(
        &self,
        tournament_id: &str,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<bool, StoreError> {
        Ok(self.scores.read().await.contains(&ScoreEntry {
            tournament_id: tournament_id.to_string(),
            user_id: user_id.to_string(),
            day,
        }))
    }
}
