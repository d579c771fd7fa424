//! Randomized pacing and human-input timing.
//!
//! Pure leaf module: no browser state, just delays with jitter so interaction
//! timing never looks machine-regular.

use std::ops::Range;
use std::time::Duration;

use rand::Rng;

use crate::config::Mode;

/// Sleep for a random duration within `[min_ms, max_ms]`.
pub async fn random_delay(min_ms: u64, max_ms: u64) {
    let delay = rand::thread_rng().gen_range(min_ms..=max_ms);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}

/// Sleep for `base_ms` plus random variance, with a small extra micro-jitter.
pub async fn human_delay(base_ms: u64, variance_ms: u64) {
    let delay = base_ms + rand::thread_rng().gen_range(0..=variance_ms);
    let micro = rand::thread_rng().gen_range(0..=100);
    tokio::time::sleep(Duration::from_millis(delay + micro)).await;
}

/// Pacing profile derived from the run mode.
///
/// Stealth keeps the slow human rhythm of a real visitor; fast collapses
/// every wait to near-zero for test runs.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Settle window after navigation.
    pub settle_ms: Range<u64>,
    /// Pause between discrete interactions (field to field, scroll steps).
    pub action_ms: Range<u64>,
    /// Per-keystroke delay while typing.
    pub keystroke_ms: Range<u64>,
}

impl Pacing {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Stealth => Self {
                settle_ms: 2000..4000,
                action_ms: 500..1500,
                keystroke_ms: 60..180,
            },
            Mode::Fast => Self {
                settle_ms: 300..600,
                action_ms: 50..150,
                keystroke_ms: 5..15,
            },
        }
    }

    pub async fn settle(&self) {
        random_delay(self.settle_ms.start, self.settle_ms.end).await;
    }

    pub async fn pause(&self) {
        random_delay(self.action_ms.start, self.action_ms.end).await;
    }

    /// One keystroke delay, with an occasional longer "thinking" pause the
    /// way real typists hesitate between words.
    pub fn keystroke_delay(&self) -> Duration {
        let mut rng = rand::thread_rng();
        let base = rng.gen_range(self.keystroke_ms.start..self.keystroke_ms.end);
        let delay = if rng.gen_bool(0.08) { base + 200 } else { base };
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn random_delay_stays_within_bounds() {
        let start = std::time::Instant::now();
        random_delay(10, 30).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn keystroke_delay_is_bounded() {
        let pacing = Pacing::for_mode(Mode::Stealth);
        for _ in 0..100 {
            let d = pacing.keystroke_delay();
            assert!(d >= Duration::from_millis(60));
            assert!(d <= Duration::from_millis(380));
        }
    }

    #[test]
    fn fast_mode_is_faster_than_stealth() {
        let fast = Pacing::for_mode(Mode::Fast);
        let stealth = Pacing::for_mode(Mode::Stealth);
        assert!(fast.settle_ms.end <= stealth.settle_ms.start);
    }
}
