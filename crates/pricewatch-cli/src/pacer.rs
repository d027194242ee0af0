//! Spaces out requests to the same retailer.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum gap between request starts per retailer. Different
/// retailers never wait on each other.
#[derive(Debug)]
pub(crate) struct RetailerPacer {
    delay: Duration,
    last_start: HashMap<String, Mutex<Option<Instant>>>,
}

impl RetailerPacer {
    pub(crate) fn new<'a>(delay: Duration, retailers: impl IntoIterator<Item = &'a str>) -> Self {
        let last_start = retailers
            .into_iter()
            .map(|r| (r.to_owned(), Mutex::new(None)))
            .collect();
        Self { delay, last_start }
    }

    /// Waits until `delay` has passed since the previous request to
    /// `retailer`, then claims the current instant. Unknown retailers pass
    /// straight through.
    pub(crate) async fn wait_turn(&self, retailer: &str) {
        if self.delay.is_zero() {
            return;
        }
        let Some(slot) = self.last_start.get(retailer) else {
            return;
        };

        // Held across the sleep so callers for one retailer queue up.
        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.delay).await;
        }
        *last = Some(Instant::now());
    }
}
