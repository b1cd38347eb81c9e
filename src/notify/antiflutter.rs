// src/notify/antiflutter.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Cooldown gate against repeated alerts for the same watch.
/// - First alert always allowed.
/// - Inside cooldown, alerts are suppressed.
/// - State is updated explicitly via `record_alert` after a successful send.
#[derive(Debug, Clone, Default)]
pub struct AntiFlutter {
    cooldown: ChronoDuration,
    last_alert_ts: Option<DateTime<Utc>>,
}

impl AntiFlutter {
    /// `cooldown_secs` <= 0 disables the gate.
    pub fn new(cooldown_secs: i64) -> Self {
        Self {
            cooldown: ChronoDuration::seconds(cooldown_secs.max(0)),
            last_alert_ts: None,
        }
    }

    /// Check if we may alert at `now`. Does NOT mutate state.
    pub fn should_alert(&self, now: DateTime<Utc>) -> bool {
        match self.last_alert_ts {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.cooldown,
        }
    }

    pub fn record_alert(&mut self, now: DateTime<Utc>) {
        self.last_alert_ts = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_alert_passes() {
        let af = AntiFlutter::new(10_800);
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        assert!(af.should_alert(now));
    }

    #[test]
    fn inside_cooldown_blocked() {
        let mut af = AntiFlutter::new(10_800);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        af.record_alert(t0);
        assert!(!af.should_alert(t0 + ChronoDuration::seconds(120)));
        assert!(af.should_alert(t0 + ChronoDuration::seconds(10_800)));
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let mut af = AntiFlutter::new(0);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        af.record_alert(t0);
        assert!(af.should_alert(t0));
    }
}
