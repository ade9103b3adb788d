//! Human-behavior emulation
//!
//! Scripted input is easy to fingerprint: instant pointer teleports,
//! metronomic keystrokes, single-jump scrolls. `Human` replays the same
//! page operations through generated trajectories, cadences and pauses
//! that look like a person at the keyboard.
//!
//! Randomness flows through a per-emulator [`StdRng`] so behavior can be
//! pinned with [`Page::human_seeded`](crate::Page::human_seeded) in tests.

pub mod trajectory;
pub mod typing;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cdp::{KeyEventType, MouseButton, MouseEventType};
use crate::error::{Error, Result};
use crate::page::Page;

pub use trajectory::{bezier_path, Point, Trajectory};
pub use typing::{Keystroke, TypingCadence, TypingPlan};

const VISIBILITY_BUDGET: Duration = Duration::from_secs(10);
const DEFAULT_MOVE_DURATION_MS: u64 = 800;
const DEFAULT_SCROLL_AMOUNT: f64 = 500.0;
const DEFAULT_SCROLL_DURATION_MS: u64 = 1000;

/// Human-like input driver for one page.
pub struct Human<'a> {
    page: &'a Page,
    rng: StdRng,
}

impl<'a> Human<'a> {
    pub(crate) fn new(page: &'a Page) -> Self {
        Self {
            page,
            rng: StdRng::from_entropy(),
        }
    }

    pub(crate) fn seeded(page: &'a Page, seed: u64) -> Self {
        Self {
            page,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Move the pointer along a curved path to `selector` and click it.
    pub async fn move_and_click(&mut self, selector: &str) -> Result<()> {
        self.move_and_click_with(selector, DEFAULT_MOVE_DURATION_MS)
            .await
    }

    /// `move_and_click` with an explicit travel time in milliseconds.
    pub async fn move_and_click_with(&mut self, selector: &str, duration_ms: u64) -> Result<()> {
        let element = self
            .page
            .wait_for_visible(selector, VISIBILITY_BUDGET)
            .await
            .map_err(|e| match e {
                Error::Timeout(_) => Error::ElementNotFound(selector.to_string()),
                other => other,
            })?;
        let (bx, by, bw, bh) = element.bounding_box().await?;

        // Aim inside the element but off its exact center.
        let target = (
            bx + bw * self.rng.gen_range(0.3..0.7),
            by + bh * self.rng.gen_range(0.3..0.7),
        );

        let (vw, vh) = self.page.viewport_size().await?;
        let start = (
            self.rng.gen_range(0.0..vw.max(1.0)),
            self.rng.gen_range(0.0..vh.max(1.0)),
        );

        tracing::debug!(selector, ?start, ?target, "Moving pointer");
        let path = bezier_path(start, target, duration_ms, &mut self.rng);
        for (x, y) in path {
            self.page
                .session()
                .dispatch_mouse_event(MouseEventType::MouseMoved, x, y, None, None)
                .await?;
            let step = self.rng.gen_range(15..=25);
            tokio::time::sleep(Duration::from_millis(step)).await;
        }

        self.page
            .session()
            .dispatch_mouse_event(
                MouseEventType::MousePressed,
                target.0,
                target.1,
                Some(MouseButton::Left),
                Some(1),
            )
            .await?;
        let dwell = self.rng.gen_range(60..=180);
        tokio::time::sleep(Duration::from_millis(dwell)).await;
        self.page
            .session()
            .dispatch_mouse_event(
                MouseEventType::MouseReleased,
                target.0,
                target.1,
                Some(MouseButton::Left),
                Some(1),
            )
            .await
    }

    /// Click `selector` to focus it, then type `text` with human cadence
    /// and occasional corrected typos.
    pub async fn type_like_human(&mut self, selector: &str, text: &str) -> Result<()> {
        self.type_with_cadence(selector, text, TypingCadence::default())
            .await
    }

    /// `type_like_human` with explicit timing and error parameters.
    pub async fn type_with_cadence(
        &mut self,
        selector: &str,
        text: &str,
        cadence: TypingCadence,
    ) -> Result<()> {
        self.page.click(selector).await?;

        let plan = TypingPlan::generate(text, cadence.error_rate, &mut self.rng);
        tracing::debug!(selector, chars = plan.len(), "Typing");

        for stroke in plan.strokes() {
            match *stroke {
                Keystroke::Plain(ch) => {
                    self.emit_char(ch).await?;
                }
                Keystroke::Fumbled { wrong, intended } => {
                    self.emit_char(wrong).await?;
                    self.fumble_pause().await;
                    self.press_backspace().await?;
                    self.fumble_pause().await;
                    self.emit_char(intended).await?;
                }
            }
            // Keystroke delay plus a settle pause of half that.
            let delay = self
                .rng
                .gen_range(cadence.min_delay.as_millis()..=cadence.max_delay.as_millis())
                as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            tokio::time::sleep(Duration::from_millis(delay / 2)).await;
        }
        Ok(())
    }

    async fn emit_char(&mut self, ch: char) -> Result<()> {
        let mut buf = [0u8; 4];
        let text = ch.encode_utf8(&mut buf);
        self.page
            .session()
            .dispatch_key_event(KeyEventType::Char, None, Some(text), None, None)
            .await
    }

    async fn press_backspace(&mut self) -> Result<()> {
        self.page
            .session()
            .dispatch_key_event(
                KeyEventType::KeyDown,
                Some("Backspace"),
                None,
                Some("Backspace"),
                Some(8),
            )
            .await?;
        self.page
            .session()
            .dispatch_key_event(
                KeyEventType::KeyUp,
                Some("Backspace"),
                None,
                Some("Backspace"),
                Some(8),
            )
            .await
    }

    /// Short reaction pause around a typo correction.
    async fn fumble_pause(&mut self) {
        let ms = self.rng.gen_range(50..=150);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Scroll down ~500px in uneven steps with reading pauses.
    pub async fn scroll_human_like(&mut self) -> Result<()> {
        self.scroll_human_like_with(DEFAULT_SCROLL_AMOUNT, DEFAULT_SCROLL_DURATION_MS)
            .await
    }

    /// `scroll_human_like` with an explicit distance and time budget.
    ///
    /// Steps are 20 to 80px with 50 to 150ms pauses. About one step in ten
    /// hesitates for 200 to 500ms, and half of those hesitations scroll
    /// back up 10 to 30px before continuing. The loop stops at the time
    /// budget or the target position, then snaps to the target.
    pub async fn scroll_human_like_with(&mut self, amount: f64, duration_ms: u64) -> Result<()> {
        let origin = self.page.scroll_y().await?;
        let target = origin + amount;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(duration_ms);

        while tokio::time::Instant::now() < deadline && self.page.scroll_y().await? < target {
            let step = self.rng.gen_range(20.0..=80.0);
            self.page.scroll_by(step).await?;
            let pause = self.rng.gen_range(50..=150);
            tokio::time::sleep(Duration::from_millis(pause)).await;

            if self.rng.gen_bool(0.1) {
                let hesitation = self.rng.gen_range(200..=500);
                tokio::time::sleep(Duration::from_millis(hesitation)).await;
                if self.rng.gen_bool(0.5) {
                    let back = self.rng.gen_range(10.0..=30.0);
                    self.page.scroll_by(-back).await?;
                    let pause = self.rng.gen_range(50..=100);
                    tokio::time::sleep(Duration::from_millis(pause)).await;
                }
            }
        }

        self.page.scroll_to(target).await
    }
}
