//! Result arbitration: slack filtering followed by median selection.

use tracing::{info, warn};

use crate::errors::{Result, TimeSourceError};
use crate::types::{NtpReading, QueryOutcome, TimeSyncInfo};

/// Reclassify successes slower than `max_round_trip_ms` as failures.
///
/// The returned list has the same length and order as the input.
pub fn filter_slow(outcomes: Vec<QueryOutcome>, max_round_trip_ms: u64) -> Vec<QueryOutcome> {
    let max_rtt = i64::try_from(max_round_trip_ms).unwrap_or(i64::MAX);
    outcomes
        .into_iter()
        .map(|outcome| match outcome {
            QueryOutcome::Success(reading) if reading.round_trip_time_ms > max_rtt => {
                warn!(
                    "Discarding NTP reading: round trip {} ms exceeds {} ms",
                    reading.round_trip_time_ms, max_round_trip_ms
                );
                QueryOutcome::Failure {
                    cause: None,
                    message: format!(
                        "Round trip time {} ms exceeds allowed maximum of {} ms",
                        reading.round_trip_time_ms, max_round_trip_ms
                    ),
                }
            }
            other => other,
        })
        .collect()
}

/// Pick the reading at sorted index `n / 2` by round trip.
///
/// For an even count this is the upper of the two middle readings; two
/// time/uptime pairs are never averaged. Ties keep launch order.
pub fn median_reading(mut readings: Vec<NtpReading>) -> Option<NtpReading> {
    if readings.is_empty() {
        return None;
    }
    readings.sort_by_key(|reading| reading.round_trip_time_ms);
    Some(readings[readings.len() / 2])
}

/// Select the median success, or fail with every failure message aggregated.
pub fn select(outcomes: Vec<QueryOutcome>) -> Result<TimeSyncInfo> {
    let mut readings = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            QueryOutcome::Success(reading) => readings.push(reading),
            QueryOutcome::Failure { cause, message } => failures.push((cause, message)),
        }
    }

    let success_count = readings.len();
    if let Some(chosen) = median_reading(readings) {
        info!(
            "Selected NTP reading with {} ms round trip from {} successful requests",
            chosen.round_trip_time_ms, success_count
        );
        return Ok(TimeSyncInfo::from(&chosen));
    }

    let messages: Vec<&str> = failures.iter().map(|(_, message)| message.as_str()).collect();
    let message = format!("All NTP requests failed: [{}]", messages.join("; "));
    warn!("{}", message);
    let cause = failures.into_iter().find_map(|(cause, _)| cause);

    Err(TimeSourceError::AllRequestsFailed { message, cause })
}

/// Filter then select.
pub fn arbitrate(outcomes: Vec<QueryOutcome>, max_round_trip_ms: u64) -> Result<TimeSyncInfo> {
    select(filter_slow(outcomes, max_round_trip_ms))
}
