//! Pointer input primitives and double-press detection.

use kurbo::Point;
use serde::{Deserialize, Serialize};

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    /// Primary button: drag, double-press to copy.
    Left,
    /// Secondary button: delete.
    Right,
    /// Auxiliary button: copy.
    Middle,
}

/// Identifies one physical pointer (mouse, or a single touch contact).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointerId(pub u32);

impl PointerId {
    /// The mouse pointer.
    pub const MOUSE: PointerId = PointerId(0);
}

/// Double-click detection constants.
const DOUBLE_CLICK_TIME_MS: u128 = 500;
const DOUBLE_CLICK_DISTANCE: f64 = 5.0;

/// Counts consecutive primary presses so a double-press can be told apart
/// from two unrelated clicks.
#[derive(Debug, Clone, Default)]
pub struct ClickTracker {
    /// Last primary press time.
    last_click_time: Option<Instant>,
    /// Last primary press position.
    last_click_position: Option<Point>,
}

impl ClickTracker {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a press and return its click count (1 or 2).
    ///
    /// Only the primary button takes part in multi-click detection; other
    /// buttons always report a single click and reset the sequence.
    pub fn register(&mut self, position: Point, button: MouseButton, now: Instant) -> u32 {
        if button != MouseButton::Left {
            self.reset();
            return 1;
        }

        if let (Some(last_time), Some(last_pos)) = (self.last_click_time, self.last_click_position) {
            let elapsed = now.duration_since(last_time).as_millis();
            let distance = (position - last_pos).hypot();

            if elapsed < DOUBLE_CLICK_TIME_MS && distance < DOUBLE_CLICK_DISTANCE {
                // Reset to prevent a triple press from counting as another double
                self.reset();
                return 2;
            }
        }

        self.last_click_time = Some(now);
        self.last_click_position = Some(position);
        1
    }

    /// Forget the press sequence.
    pub fn reset(&mut self) {
        self.last_click_time = None;
        self.last_click_position = None;
    }
}
