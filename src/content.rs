//! Dynamic content loading
//!
//! Pages that render content lazily grow their document height as the
//! viewport approaches the bottom. The loader keeps scrolling to the bottom
//! and pausing until the height stops changing (convergence): two equal
//! consecutive readings mean no further content arrived during the pause.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Progress of one convergence loop. `target_height` is the most recent
/// height observation the loop is trying to confirm as stable.
#[derive(Debug, Clone, Copy)]
pub struct ScrollState {
    pub current_height: f64,
    pub target_height: f64,
    pub elapsed: Duration,
}

/// Run the scroll-growth convergence loop over abstract observe/scroll
/// actions. Returns the number of scroll rounds performed.
///
/// Each round scrolls to the bottom, suspends for `pause` so asynchronous
/// content can render, and re-reads the height. The loop stops when a round
/// leaves the height unchanged. Without `max_rounds` this never terminates
/// on pages with perpetually growing content, so callers get a ceiling by
/// default; hitting it is logged and treated as success.
pub(crate) async fn settle_height<H, HFut, S, SFut>(
    pause: Duration,
    max_rounds: Option<u32>,
    mut read_height: H,
    mut scroll_to_bottom: S,
) -> Result<u32>
where
    H: FnMut() -> HFut,
    HFut: Future<Output = Result<f64>>,
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<()>>,
{
    let mut state = ScrollState {
        current_height: read_height().await?,
        target_height: 0.0,
        elapsed: Duration::ZERO,
    };
    let mut rounds = 0u32;

    loop {
        scroll_to_bottom().await?;
        tokio::time::sleep(pause).await;
        rounds += 1;

        state.target_height = read_height().await?;
        state.elapsed += pause;
        tracing::debug!(?state, rounds, "Scroll round complete");

        if state.target_height == state.current_height {
            tracing::debug!(height = state.current_height, rounds, "Content height converged");
            return Ok(rounds);
        }

        if let Some(cap) = max_rounds {
            if rounds >= cap {
                tracing::warn!(
                    rounds,
                    height = state.target_height,
                    "Content still growing at round ceiling, stopping"
                );
                return Ok(rounds);
            }
        }

        state.current_height = state.target_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    async fn run_sequence(heights: Vec<f64>, max_rounds: Option<u32>) -> (u32, u32) {
        let heights = RefCell::new(heights.into_iter());
        let scrolls = Cell::new(0u32);

        let rounds = settle_height(
            Duration::from_millis(10),
            max_rounds,
            || {
                let h = heights.borrow_mut().next().expect("height sequence exhausted");
                async move { Ok(h) }
            },
            || {
                scrolls.set(scrolls.get() + 1);
                async { Ok(()) }
            },
        )
        .await
        .unwrap();

        (rounds, scrolls.get())
    }

    #[tokio::test(start_paused = true)]
    async fn converges_when_height_stabilizes() {
        let start = tokio::time::Instant::now();
        let (rounds, scrolls) = run_sequence(vec![100.0, 300.0, 300.0], None).await;

        // Heights [100, 300, 300]: grow once, confirm once.
        assert_eq!(rounds, 2);
        assert_eq!(scrolls, 2);
        // One pause per round.
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn already_stable_page_takes_one_round() {
        let (rounds, scrolls) = run_sequence(vec![500.0, 500.0], None).await;
        assert_eq!(rounds, 1);
        assert_eq!(scrolls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn round_ceiling_stops_growing_pages() {
        // Strictly growing heights would loop forever without the cap.
        let growing: Vec<f64> = (0..20).map(|i| (i * 100) as f64).collect();
        let (rounds, scrolls) = run_sequence(growing, Some(5)).await;
        assert_eq!(rounds, 5);
        assert_eq!(scrolls, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_error_propagates() {
        let result = settle_height(
            Duration::from_millis(10),
            None,
            || async { Ok(100.0) },
            || async { Err(crate::error::Error::transport("socket gone")) },
        )
        .await;
        assert!(result.is_err());
    }
}
