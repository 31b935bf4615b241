//! Cron expression handling.
//!
//! Accepts standard 5-field expressions (`min hour dom month dow`) and the
//! 6-field form with a leading seconds field. Expressions are normalized to
//! the 6-field form, which is what the timer backend receives. Parsing uses
//! croner configured exactly as tokio-cron-scheduler configures it (seconds
//! required, day-of-month AND day-of-week), so validation, the reported next
//! execution time and firing agree on every expression. All evaluation
//! happens in UTC.

use chrono::{DateTime, Utc};
use croner::parser::{CronParser, Seconds};
use croner::Cron;

use crate::SchedulerError;

/// Normalize a cron expression to the 6-field (seconds-first) form.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidSchedule` if the expression does not have
/// 5 or 6 fields.
pub fn normalize_cron_expression(expr: &str) -> Result<String, SchedulerError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 => Ok(fields.join(" ")),
        n => Err(SchedulerError::InvalidSchedule(format!(
            "'{}': expected 5 or 6 fields, found {}",
            expr, n
        ))),
    }
}

fn parse(expr: &str) -> Result<Cron, SchedulerError> {
    let normalized = normalize_cron_expression(expr)?;
    CronParser::builder()
        .seconds(Seconds::Required)
        .dom_and_dow(true)
        .build()
        .parse(&normalized)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("'{}': {}", expr, e)))
}

/// Validate a cron expression.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidSchedule` if the expression is not valid.
///
/// # Example
///
/// ```
/// use tourney_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 * * * *").is_ok());    // Every hour
/// assert!(validate_cron_expression("0 0 9 * * *").is_ok());  // 9 AM daily
///
/// assert!(validate_cron_expression("* * * *").is_err());     // Missing field
/// assert!(validate_cron_expression("99 * * * *").is_err());  // Minute out of range
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    parse(expr).map(|_| ())
}

/// Compute the next UTC instant strictly after `after` matching `expr`.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidSchedule` if the expression is invalid or
/// has no future occurrence.
pub fn next_execution_time(
    expr: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedulerError> {
    parse(expr)?
        .find_next_occurrence(&after, false)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("'{}': {}", expr, e)))
}
