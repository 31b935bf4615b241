//! Tournament domain types seen by the jobs.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a tournament.
///
/// The jobs only move `Pending -> InProgress -> Completed`. `Cancelled` is
/// set by users and never touched here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// Membership state of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Joined,
    Invited,
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub status: ParticipantStatus,
}

impl Participant {
    pub fn joined(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: ParticipantStatus::Joined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub status: TournamentStatus,
    pub start_date: DateTime<Utc>,
    pub duration_days: u32,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl Tournament {
    /// When the tournament is due to complete, or `None` if that lies
    /// beyond the representable range.
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        Duration::try_days(i64::from(self.duration_days))
            .and_then(|duration| self.start_date.checked_add_signed(duration))
    }

    /// Pending and its start date has been reached.
    pub fn should_start(&self, now: DateTime<Utc>) -> bool {
        self.status == TournamentStatus::Pending && now >= self.start_date
    }

    /// In progress and its duration has elapsed.
    pub fn should_complete(&self, now: DateTime<Utc>) -> bool {
        self.status == TournamentStatus::InProgress && self.end_date().is_some_and(|end| now >= end)
    }

    /// Ids of participants who have joined, without duplicates.
    pub fn joined_participants(&self) -> BTreeSet<&str> {
        self.participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::Joined)
            .map(|p| p.user_id.as_str())
            .collect()
    }

    /// Joined participants plus the creator, without duplicates.
    pub fn audience(&self) -> BTreeSet<&str> {
        let mut audience = self.joined_participants();
        audience.insert(self.creator_id.as_str());
        audience
    }
}

/// Kind of notification created by the jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TournamentStart,
    TournamentEnd,
    DailyReminder,
    UpcomingReminder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub tournament_id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        tournament_id: impl Into<String>,
        kind: NotificationKind,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            tournament_id: tournament_id.into(),
            kind,
            message: message.into(),
            created_at,
        }
    }
}

/// A score logged by a participant for one day of a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub tournament_id: String,
    pub user_id: String,
    pub day: NaiveDate,
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}
