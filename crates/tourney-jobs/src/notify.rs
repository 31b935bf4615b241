//! Once-per-day notification delivery.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreError;
use crate::store::TournamentStore;
use crate::types::{start_of_day, Notification, NotificationKind};

/// Create a `kind` notification for `user_id` unless one already exists
/// for the same tournament since the start of `now`'s UTC day.
///
/// Returns `true` if a notification was created.
pub async fn notify_once(
    store: &dyn TournamentStore,
    user_id: &str,
    tournament_id: &str,
    kind: NotificationKind,
    message: &str,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if store
        .has_notification_since(user_id, tournament_id, kind, start_of_day(now))
        .await?
    {
        debug!(user = %user_id, tournament = %tournament_id, ?kind, "Already notified today");
        return Ok(false);
    }

    store
        .create_notification(Notification::new(user_id, tournament_id, kind, message, now))
        .await?;
    Ok(true)
}
