use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "focusdeck-time.toml";
const TIMEZONE_ENV_VAR: &str = "FOCUSDECK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "FOCUSDECK_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str = "UTC";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

/// The timezone day-keyed state (daily focus minutes) and target-time math
/// live in. Resolved once per process: env var, then config file, then UTC.
pub fn project_timezone() -> &'static Tz {
    static PROJECT_TZ: OnceLock<Tz> = OnceLock::new();
    PROJECT_TZ.get_or_init(resolve_project_timezone)
}

/// Day key for the daily accumulator, e.g. "2026-08-07".
#[must_use]
pub fn project_day_key(now: DateTime<Utc>) -> String {
    now.with_timezone(project_timezone())
        .format("%Y-%m-%d")
        .to_string()
}

/// Seconds until the next wall-clock occurrence of `target` in the project
/// timezone. A target at or before `now` rolls forward to the same time
/// tomorrow, so the result is always >= 0.
#[must_use]
pub fn seconds_until_target(target: NaiveTime, now: DateTime<Utc>) -> u32 {
    let tz = project_timezone();
    let local_now = now.with_timezone(tz);

    for day_offset in 0..3 {
        let date = local_now.date_naive() + Duration::days(day_offset);
        let candidate = match tz.from_local_datetime(&date.and_time(target)) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(first, _) => first,
            // The target falls in a DST gap on this date; try the next day.
            LocalResult::None => continue,
        };
        if candidate > local_now {
            let secs = (candidate - local_now).num_seconds();
            return secs.max(0) as u32;
        }
    }

    0
}

fn resolve_project_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR) {
        if let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR) {
            return tz;
        }
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    parse_timezone(DEFAULT_PROJECT_TIMEZONE, "DEFAULT_PROJECT_TIMEZONE")
        .unwrap_or(chrono_tz::UTC)
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed reading timezone config file"
            );
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed parsing timezone config file"
            );
            return None;
        }
    };

    let name = parsed
        .timezone
        .or(parsed.time.and_then(|section| section.timezone))?;
    parse_timezone(&name, "timezone config file")
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    match raw.trim().parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(err) => {
            tracing::error!(source, value = raw, error = %err, "invalid timezone");
            None
        }
    }
}
