//! Local control sampling
//!
//! Raw control events are folded into the sampler as they happen; once per
//! input tick `sample` turns the held state into one timestamped `Input`.

use shared::Input;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    ButtonDown(u16),
    ButtonUp(u16),
    Axis { x: i8, y: i8 },
}

/// Held controller state for one local player
#[derive(Debug, Clone, Default)]
pub struct InputSampler {
    buttons: u16,
    axis_x: i8,
    axis_y: i8,
    last_timestamp: Option<u32>,
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::ButtonDown(flags) => self.buttons |= flags,
            ControlEvent::ButtonUp(flags) => self.buttons &= !flags,
            ControlEvent::Axis { x, y } => {
                self.axis_x = x;
                self.axis_y = y;
            }
        }
    }

    /// Snapshot of the held state
    ///
    /// Timestamps are strictly increasing: a clock reading at or behind the
    /// previous sample is bumped one millisecond past it.
    pub fn sample(&mut self, timestamp: u32) -> Input {
        let timestamp = match self.last_timestamp {
            Some(last) if timestamp <= last => last.wrapping_add(1),
            _ => timestamp,
        };
        self.last_timestamp = Some(timestamp);

        Input {
            timestamp,
            buttons: self.buttons,
            axis_x: self.axis_x,
            axis_y: self.axis_y,
        }
    }

    /// Releases every button and centres the stick
    pub fn release_all(&mut self) {
        self.buttons = 0;
        self.axis_x = 0;
        self.axis_y = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::button;

    #[test]
    fn test_buttons_fold_into_sample() {
        let mut sampler = InputSampler::new();
        sampler.handle_event(ControlEvent::ButtonDown(button::UP));
        sampler.handle_event(ControlEvent::ButtonDown(button::LEFT));
        sampler.handle_event(ControlEvent::ButtonUp(button::UP));

        let input = sampler.sample(10);
        assert_eq!(input.timestamp, 10);
        assert!(input.pressed(button::LEFT));
        assert!(!input.pressed(button::UP));
    }

    #[test]
    fn test_axis_and_release() {
        let mut sampler = InputSampler::new();
        sampler.handle_event(ControlEvent::Axis { x: -40, y: 90 });
        let input = sampler.sample(1);
        assert_eq!((input.axis_x, input.axis_y), (-40, 90));

        sampler.release_all();
        assert!(sampler.sample(2).is_neutral());
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut sampler = InputSampler::new();
        assert_eq!(sampler.sample(100).timestamp, 100);
        assert_eq!(sampler.sample(100).timestamp, 101);
        assert_eq!(sampler.sample(90).timestamp, 102);
        assert_eq!(sampler.sample(200).timestamp, 200);
    }
}
