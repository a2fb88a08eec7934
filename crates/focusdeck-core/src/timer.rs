use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::datetime::{project_day_key, seconds_until_target};
use crate::store::{self, Store};

const DAILY_FOCUS_KEY: &str = "daily-focus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Focus,
    Short,
    Long,
}

impl Preset {
    pub fn duration_secs(self) -> u32 {
        match self {
            Preset::Focus => 25 * 60,
            Preset::Short => 5 * 60,
            Preset::Long => 15 * 60,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::Focus => "Focus · 25m",
            Preset::Short => "Short Break · 5m",
            Preset::Long => "Long Break · 15m",
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(Preset::Focus),
            "short" => Ok(Preset::Short),
            "long" => Ok(Preset::Long),
            other => Err(anyhow::anyhow!("unknown preset: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerMode {
    Countdown(Preset),
    Target(NaiveTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

/// System notification port. Permission is requested only while
/// undetermined; a denied permission is a no-op, never an error.
pub trait Notifier {
    fn permission(&self) -> Permission;
    fn request_permission(&mut self) -> Permission;
    fn notify(&mut self, message: &str);
}

/// Completion tone port.
pub trait Alarm {
    fn ring(&mut self);
}

/// Daily focus accumulator, keyed by calendar day in the project timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFocus {
    pub date: String,
    pub minutes: u32,
}

/// Dual-mode countdown / target-time timer.
///
/// States: Idle -> Running -> Idle (pause) or Done (remaining hits 0);
/// Done -> Idle on reset or restart. Time is injected through `now`
/// parameters so tests drive virtual time.
#[derive(Debug)]
pub struct TimerEngine {
    mode: TimerMode,
    /// Duration the current run was initialized with; the completion
    /// accrual is computed from this, not from tick counting.
    configured_secs: u32,
    remaining_secs: u32,
    is_running: bool,
    is_done: bool,
    daily: DailyFocus,
}

impl TimerEngine {
    /// Loads the daily accumulator (resetting it on day rollover) and
    /// starts idle on the Focus preset.
    #[tracing::instrument(skip(store, now))]
    pub fn load(store: &mut dyn Store, now: DateTime<Utc>) -> Self {
        let today = project_day_key(now);
        let daily = match store::load_json::<DailyFocus>(store, DAILY_FOCUS_KEY) {
            Some(stored) if stored.date == today => stored,
            Some(stale) => {
                debug!(stored = %stale.date, today = %today, "day rolled over; daily focus reset");
                let fresh = DailyFocus {
                    date: today,
                    minutes: 0,
                };
                store::save_json(store, DAILY_FOCUS_KEY, &fresh);
                fresh
            }
            None => DailyFocus {
                date: today,
                minutes: 0,
            },
        };

        let preset = Preset::Focus;
        Self {
            mode: TimerMode::Countdown(preset),
            configured_secs: preset.duration_secs(),
            remaining_secs: preset.duration_secs(),
            is_running: false,
            is_done: false,
            daily,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_done(&self) -> bool {
        self.is_done
    }

    pub fn daily_minutes(&self) -> u32 {
        self.daily.minutes
    }

    /// Selecting a preset re-initializes the countdown and returns to Idle.
    pub fn select_preset(&mut self, preset: Preset) {
        self.mode = TimerMode::Countdown(preset);
        self.configured_secs = preset.duration_secs();
        self.remaining_secs = self.configured_secs;
        self.is_running = false;
        self.is_done = false;
    }

    /// Target-time mode: duration runs to the next wall-clock occurrence
    /// of `target`, rolling to tomorrow when it already passed today.
    pub fn set_target(&mut self, target: NaiveTime, now: DateTime<Utc>) {
        self.mode = TimerMode::Target(target);
        self.configured_secs = seconds_until_target(target, now);
        self.remaining_secs = self.configured_secs;
        self.is_running = false;
        self.is_done = false;
    }

    /// Toggles Running <-> Idle without touching `remaining`, except that
    /// resuming from Done (or from an exhausted countdown) re-initializes
    /// the run from the current mode first.
    pub fn start_pause(&mut self, now: DateTime<Utc>) {
        if self.is_done || (!self.is_running && self.remaining_secs == 0) {
            self.is_done = false;
            self.reinitialize(now);
            self.is_running = true;
            return;
        }
        self.is_running = !self.is_running;
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.is_running = false;
        self.is_done = false;
        self.reinitialize(now);
    }

    /// One-second tick. Returns true exactly once per run, on the tick
    /// that exhausts the countdown; later ticks at zero are no-ops.
    pub fn tick(
        &mut self,
        store: &mut dyn Store,
        notifier: &mut dyn Notifier,
        alarm: &mut dyn Alarm,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_running {
            return false;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return false;
        }

        self.is_running = false;
        self.is_done = true;
        self.complete(store, notifier, alarm, now);
        true
    }

    fn reinitialize(&mut self, now: DateTime<Utc>) {
        match self.mode {
            TimerMode::Countdown(preset) => {
                self.configured_secs = preset.duration_secs();
            }
            TimerMode::Target(target) => {
                self.configured_secs = seconds_until_target(target, now);
            }
        }
        self.remaining_secs = self.configured_secs;
    }

    fn complete(
        &mut self,
        store: &mut dyn Store,
        notifier: &mut dyn Notifier,
        alarm: &mut dyn Alarm,
        now: DateTime<Utc>,
    ) {
        info!(configured_secs = self.configured_secs, "timer finished");

        let minutes = self.configured_secs / 60;
        if minutes > 0 {
            let today = project_day_key(now);
            if self.daily.date != today {
                self.daily = DailyFocus {
                    date: today,
                    minutes: 0,
                };
            }
            self.daily.minutes += minutes;
            store::save_json(store, DAILY_FOCUS_KEY, &self.daily);
        }

        alarm.ring();

        let permission = match notifier.permission() {
            Permission::Default => notifier.request_permission(),
            other => other,
        };
        match permission {
            Permission::Granted => notifier.notify("Time's up!"),
            Permission::Denied | Permission::Default => {
                debug!("notification skipped: permission not granted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveTime, TimeZone, Utc};

    use super::{Alarm, DailyFocus, Notifier, Permission, Preset, TimerEngine};
    use crate::store::{MemoryStore, Store, load_json};

    #[derive(Default)]
    struct FakeNotifier {
        permission: Option<Permission>,
        requests: u32,
        messages: Vec<String>,
    }

    impl Notifier for FakeNotifier {
        fn permission(&self) -> Permission {
            self.permission.unwrap_or(Permission::Default)
        }

        fn request_permission(&mut self) -> Permission {
            self.requests += 1;
            let granted = Permission::Granted;
            self.permission = Some(granted);
            granted
        }

        fn notify(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }
    }

    #[derive(Default)]
    struct FakeAlarm {
        rings: u32,
    }

    impl Alarm for FakeAlarm {
        fn ring(&mut self) {
            self.rings += 1;
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn short_preset_runs_to_done_exactly_once() {
        let mut store = MemoryStore::new();
        let mut notifier = FakeNotifier::default();
        let mut alarm = FakeAlarm::default();
        let mut timer = TimerEngine::load(&mut store, now());

        timer.select_preset(Preset::Short);
        timer.start_pause(now());

        let mut completions = 0;
        let mut t = now();
        for _ in 0..300 {
            t += Duration::seconds(1);
            if timer.tick(&mut store, &mut notifier, &mut alarm, t) {
                completions += 1;
            }
        }

        assert_eq!(completions, 1);
        assert!(timer.is_done());
        assert!(!timer.is_running());
        assert_eq!(timer.daily_minutes(), 5);
        assert_eq!(alarm.rings, 1);
        assert_eq!(notifier.messages.len(), 1);

        // Extra ticks at zero change nothing.
        t += Duration::seconds(1);
        assert!(!timer.tick(&mut store, &mut notifier, &mut alarm, t));
        assert_eq!(timer.daily_minutes(), 5);
        assert_eq!(alarm.rings, 1);
    }

    #[test]
    fn pause_preserves_remaining() {
        let mut store = MemoryStore::new();
        let mut notifier = FakeNotifier::default();
        let mut alarm = FakeAlarm::default();
        let mut timer = TimerEngine::load(&mut store, now());

        timer.start_pause(now());
        let mut t = now();
        for _ in 0..10 {
            t += Duration::seconds(1);
            timer.tick(&mut store, &mut notifier, &mut alarm, t);
        }
        timer.start_pause(t);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_secs(), 25 * 60 - 10);

        timer.start_pause(t);
        assert!(timer.is_running());
        assert_eq!(timer.remaining_secs(), 25 * 60 - 10);
    }

    #[test]
    fn resuming_from_done_reinitializes_first() {
        let mut store = MemoryStore::new();
        let mut notifier = FakeNotifier::default();
        let mut alarm = FakeAlarm::default();
        let mut timer = TimerEngine::load(&mut store, now());

        timer.select_preset(Preset::Short);
        timer.start_pause(now());
        let mut t = now();
        for _ in 0..300 {
            t += Duration::seconds(1);
            timer.tick(&mut store, &mut notifier, &mut alarm, t);
        }
        assert!(timer.is_done());

        timer.start_pause(t);
        assert!(timer.is_running());
        assert!(!timer.is_done());
        assert_eq!(timer.remaining_secs(), 5 * 60);
    }

    #[test]
    fn target_mode_accrues_configured_duration() {
        let mut store = MemoryStore::new();
        let mut notifier = FakeNotifier::default();
        let mut alarm = FakeAlarm::default();
        let mut timer = TimerEngine::load(&mut store, now());

        // 9:02 is 120 seconds away.
        let target = NaiveTime::from_hms_opt(9, 2, 0).expect("valid time");
        timer.set_target(target, now());
        assert_eq!(timer.remaining_secs(), 120);

        timer.start_pause(now());
        let mut t = now();
        for _ in 0..120 {
            t += Duration::seconds(1);
            timer.tick(&mut store, &mut notifier, &mut alarm, t);
        }
        assert!(timer.is_done());
        assert_eq!(timer.daily_minutes(), 2);
    }

    #[test]
    fn sub_minute_run_accrues_nothing() {
        let mut store = MemoryStore::new();
        let mut notifier = FakeNotifier::default();
        let mut alarm = FakeAlarm::default();
        let mut timer = TimerEngine::load(&mut store, now());

        let target = NaiveTime::from_hms_opt(9, 0, 30).expect("valid time");
        timer.set_target(target, now());
        timer.start_pause(now());
        let mut t = now();
        for _ in 0..30 {
            t += Duration::seconds(1);
            timer.tick(&mut store, &mut notifier, &mut alarm, t);
        }
        assert!(timer.is_done());
        assert_eq!(timer.daily_minutes(), 0);
        // The alarm still fires even when nothing accrues.
        assert_eq!(alarm.rings, 1);
    }

    #[test]
    fn stale_daily_focus_resets_on_load() {
        let mut store = MemoryStore::new();
        store
            .put_raw(
                "daily-focus",
                "{\"date\":\"2026-08-06\",\"minutes\":75}",
            )
            .expect("put");

        let timer = TimerEngine::load(&mut store, now());
        assert_eq!(timer.daily_minutes(), 0);

        let stored: Option<DailyFocus> = load_json(&store, "daily-focus");
        assert_eq!(
            stored,
            Some(DailyFocus {
                date: "2026-08-07".to_string(),
                minutes: 0,
            })
        );
    }

    #[test]
    fn permission_is_requested_only_when_undetermined() {
        let mut store = MemoryStore::new();
        let mut notifier = FakeNotifier {
            permission: Some(Permission::Denied),
            ..FakeNotifier::default()
        };
        let mut alarm = FakeAlarm::default();
        let mut timer = TimerEngine::load(&mut store, now());

        timer.select_preset(Preset::Short);
        timer.start_pause(now());
        let mut t = now();
        for _ in 0..300 {
            t += Duration::seconds(1);
            timer.tick(&mut store, &mut notifier, &mut alarm, t);
        }

        assert_eq!(notifier.requests, 0);
        assert!(notifier.messages.is_empty());
        // Denied is a no-op, not an error: the run still completed.
        assert!(timer.is_done());
    }
}
