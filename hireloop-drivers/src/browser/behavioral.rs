use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use hireloop_config::BrowserConfig;
use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Keystroke delay bounds in milliseconds.
const KEYSTROKE_DELAY_MS: (u64, u64) = (30, 150);

#[derive(Debug, Clone)]
/// Produces human‑like delays and typing behavior between browser actions.
pub struct BehavioralEngine {
    min_ms: u64,
    max_ms: u64,
}

impl BehavioralEngine {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(config.min_action_delay_ms, config.max_action_delay_ms)
    }

    /// Sleep for the configured action delay.
    pub async fn pause(&self) {
        self.random_delay(self.min_ms, self.max_ms).await;
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        sleep(pick_delay(min, max)).await;
    }

    /// Type the provided text with small random delays between characters.
    pub async fn type_text_human_like(&self, element: &Element, text: &str) -> Result<(), CmdError> {
        for ch in text.chars() {
            element.send_keys(&ch.to_string()).await?;
            self.random_delay(KEYSTROKE_DELAY_MS.0, KEYSTROKE_DELAY_MS.1)
                .await;
        }
        Ok(())
    }
}

/// Uniform delay in `[min, max]` milliseconds; swapped bounds are tolerated.
pub fn pick_delay(min: u64, max: u64) -> Duration {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    Duration::from_millis(OsRng.gen_range(low..=high))
}
