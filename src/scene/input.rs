use std::collections::HashSet;

use winit::keyboard::KeyCode;

/// Keys currently held down, as reported by window events.
#[derive(Debug, Default, Clone)]
pub struct KeyboardState {
    pressed: HashSet<KeyCode>,
}

impl KeyboardState {
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    pub fn press(&mut self, key: KeyCode) {
        self.pressed.insert(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.press(key);
        } else {
            self.release(key);
        }
    }

    /// Forget every held key, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.pressed.clear();
    }
}

/// Turns absolute cursor positions into look deltas.
#[derive(Debug, Clone)]
pub struct MouseTracker {
    last_x: f64,
    last_y: f64,
    first_sample: bool,
}

impl Default for MouseTracker {
    fn default() -> Self {
        Self {
            last_x: 0.0,
            last_y: 0.0,
            first_sample: true,
        }
    }
}

impl MouseTracker {
    /// Records a cursor position and returns the offset from the previous one.
    ///
    /// The y offset is inverted since window coordinates grow downwards. The first sample
    /// only primes the tracker and yields `None`.
    pub fn track(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let last = (self.last_x, self.last_y);
        self.last_x = x;
        self.last_y = y;

        if self.first_sample {
            self.first_sample = false;
            return None;
        }
        Some((x - last.0, last.1 - y))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn last_position(&self) -> (f64, f64) {
        (self.last_x, self.last_y)
    }

    pub fn is_first_sample(&self) -> bool {
        self.first_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut keyboard = KeyboardState::default();
        keyboard.set(KeyCode::KeyW, true);
        assert!(keyboard.is_pressed(KeyCode::KeyW));
        keyboard.set(KeyCode::KeyW, false);
        assert!(!keyboard.is_pressed(KeyCode::KeyW));

        keyboard.press(KeyCode::KeyA);
        keyboard.clear();
        assert!(!keyboard.is_pressed(KeyCode::KeyA));
    }

    #[test]
    fn test_first_sample_primes_tracker() {
        let mut mouse = MouseTracker::default();
        assert_eq!(mouse.track(100.0, 50.0), None);
        assert!(!mouse.is_first_sample());
        assert_eq!(mouse.track(110.0, 40.0), Some((10.0, 10.0)));
        assert_eq!(mouse.last_position(), (110.0, 40.0));

        mouse.reset();
        assert_eq!(mouse.track(0.0, 0.0), None);
    }
}
