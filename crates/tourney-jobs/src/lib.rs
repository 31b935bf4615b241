//! Scheduled jobs for the tournament service.
//!
//! - [`TournamentLifecycleJob`] (`tournament-status-update`): starts and
//!   completes tournaments as their dates pass
//! - [`ReminderJob`] (`tournament-reminders`): daily score reminders and
//!   upcoming-tournament announcements
//!
//! Both read and write through [`TournamentStore`] and are registered with a
//! [`tourney_scheduler::SchedulerService`] via [`register_tournament_lifecycle_job`]
//! and [`register_reminder_job`].

mod error;
mod lifecycle;
mod notify;
mod reminders;
mod store;
mod types;

pub use error::StoreError;
pub use lifecycle::{
    register_tournament_lifecycle_job, LifecycleStats, TournamentLifecycleJob,
    TournamentLifecycleJobConfig, TOURNAMENT_LIFECYCLE_JOB_ID,
};
pub use notify::notify_once;
pub use reminders::{
    register_reminder_job, ReminderJob, ReminderJobConfig, ReminderStats, REMINDER_JOB_ID,
};
pub use store::{InMemoryTournamentStore, StoreFixture, TournamentStore};
pub use types::{
    start_of_day, Notification, NotificationKind, Participant, ParticipantStatus, ScoreEntry,
    Tournament, TournamentStatus,
};
