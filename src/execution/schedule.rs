use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::models::time::{format_gmt8, gmt8};
use crate::models::CandleInterval;

/// 1970-01-05 was a Monday; weekly bars open Monday 00:00 local
const WEEK_ORIGIN_SECS: i64 = 4 * 86_400;

/// Next interval boundary strictly after `now`, at least `ahead` away
///
/// Boundaries are aligned in GMT+8 wall-clock time, so a 15m interval fires
/// at :00/:15/:30/:45 and 1D at local midnight. If the nearest boundary is
/// closer than `ahead`, the one after it is returned.
pub fn next_run_time(now: DateTime<Utc>, interval: CandleInterval, ahead: Duration) -> DateTime<Utc> {
    let step = interval.seconds();
    let origin = match interval {
        CandleInterval::Weeks(_) => WEEK_ORIGIN_SECS,
        _ => 0,
    };
    let offset = gmt8().local_minus_utc() as i64;

    let now_secs = now.trunc_subsecs(0);
    let local = now_secs.timestamp() + offset - origin;
    let mut boundary = (local.div_euclid(step) + 1) * step + origin - offset;

    if boundary - now.timestamp() < ahead.num_seconds() {
        boundary += step;
    }

    now_secs + Duration::seconds(boundary - now_secs.timestamp())
}

/// Open time of the bar in progress at `now`
pub fn current_bar_start(now: DateTime<Utc>, interval: CandleInterval) -> DateTime<Utc> {
    next_run_time(now, interval, Duration::zero()) - interval.duration()
}

/// Sleep until `run_time`; returns immediately if it already passed
pub async fn sleep_until(run_time: DateTime<Utc>) {
    let wait = (run_time - Utc::now()).to_std().unwrap_or_default();
    tracing::info!(
        "⏰ Next run at {} (GMT+8), sleeping {:.1}s",
        format_gmt8(&run_time),
        wait.as_secs_f64()
    );
    tokio::time::sleep(wait).await;
}
