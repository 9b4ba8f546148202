//! User button debouncing and hold detection.
//!
//! The raw level is sampled once per service tick. The debounced level only
//! flips after the raw level disagrees with it for a full debounce interval
//! of consecutive ticks. A debounced press held past the test threshold
//! emits exactly one self-test request per physical press; a shorter press
//! asks for a status refresh on release.

use crate::config::ReceiverConfig;

/// Action distilled from the debounced button this tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonAction {
    /// Hold threshold crossed: the user wants a self-test.
    SelfTestRequested,
    /// Short press released: refresh the status output.
    StatusRequested,
}

/// Debounce and hold tracker for the physical user button.
#[derive(Copy, Clone, Debug)]
pub struct ButtonMonitor {
    stable_pressed: bool,
    disagreement_ticks: u32,
    held_ticks: u32,
    test_emitted: bool,
}

impl ButtonMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stable_pressed: false,
            disagreement_ticks: 0,
            held_ticks: 0,
            test_emitted: false,
        }
    }

    /// Debounced button level.
    #[must_use]
    pub const fn pressed(&self) -> bool {
        self.stable_pressed
    }

    /// Folds in one raw sample. Call exactly once per service tick.
    pub fn update(&mut self, raw_pressed: bool, config: &ReceiverConfig) -> Option<ButtonAction> {
        if raw_pressed == self.stable_pressed {
            self.disagreement_ticks = 0;
        } else {
            self.disagreement_ticks += 1;
            if self.disagreement_ticks >= config.button_debounce_ticks() {
                self.disagreement_ticks = 0;
                self.stable_pressed = raw_pressed;
                if raw_pressed {
                    self.held_ticks = 0;
                    self.test_emitted = false;
                } else if !self.test_emitted {
                    return Some(ButtonAction::StatusRequested);
                }
            }
        }

        if self.stable_pressed {
            self.held_ticks = self.held_ticks.saturating_add(1);
            if !self.test_emitted && self.held_ticks >= config.button_test_delay_ticks() {
                self.test_emitted = true;
                return Some(ButtonAction::SelfTestRequested);
            }
        }

        None
    }
}

impl Default for ButtonMonitor {
    fn default() -> Self {
        Self::new()
    }
}
