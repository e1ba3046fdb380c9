use crate::sensor::Sensor;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Time spent red in a signal head's own cycle, in s.
const RED_DWELL: f64 = 5.0;

/// Time spent green in a signal head's own cycle, in s.
const GREEN_DWELL: f64 = 7.0;

/// Time spent yellow in a signal head's own cycle, in s.
const YELLOW_DWELL: f64 = 2.0;

/// In adaptive mode, queues longer than this hold the green.
const EXTEND_QUEUE_THRESHOLD: u32 = 2;

/// How long an adaptive green is held per extension, in s.
const GREEN_EXTENSION: f64 = 3.0;

/// A single traffic signal.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalHead {
    /// The colour currently shown.
    color: LightColor,
    /// The timing behaviour of the head's own cycle.
    mode: LightMode,
    /// The time left in the current colour, in s. May briefly go negative.
    remaining: f64,
    /// The detector on the lane this head controls.
    sensor: Option<Sensor>,
}

/// The colour of a signal head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightColor {
    Red,
    Green,
    Yellow,
}

/// How a signal head times its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightMode {
    /// Every colour lasts its fixed dwell time.
    #[default]
    Fixed,
    /// A green is held while its lane still has a queue.
    Adaptive,
}

impl LightColor {
    /// The colour that follows this one in the cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Red => Self::Green,
            Self::Green => Self::Yellow,
            Self::Yellow => Self::Red,
        }
    }

    /// The fixed time spent in this colour, in s.
    pub fn dwell(self) -> f64 {
        match self {
            Self::Red => RED_DWELL,
            Self::Green => GREEN_DWELL,
            Self::Yellow => YELLOW_DWELL,
        }
    }
}

impl LightMode {
    /// The mode for an `adaptive` flag.
    pub fn from_adaptive(adaptive: bool) -> Self {
        if adaptive {
            Self::Adaptive
        } else {
            Self::Fixed
        }
    }
}

impl SignalHead {
    /// Creates a signal head showing `color`.
    pub fn new(color: LightColor, mode: LightMode, sensor: Option<Sensor>) -> Self {
        Self {
            color,
            mode,
            remaining: color.dwell(),
            sensor,
        }
    }

    /// The colour currently shown.
    pub fn color(&self) -> LightColor {
        self.color
    }

    /// The timing mode.
    pub fn mode(&self) -> LightMode {
        self.mode
    }

    /// The time left in the current colour, never below zero.
    pub fn remaining_time(&self) -> f64 {
        f64::max(self.remaining, 0.0)
    }

    /// The sensor on the controlled lane, if there is one.
    pub fn sensor(&self) -> Option<&Sensor> {
        self.sensor.as_ref()
    }

    /// Mutable access to the sensor, for feeding detector counts.
    pub fn sensor_mut(&mut self) -> Option<&mut Sensor> {
        self.sensor.as_mut()
    }

    /// Attaches a sensor, replacing any previous one.
    pub fn set_sensor(&mut self, sensor: Sensor) {
        self.sensor = Some(sensor);
    }

    /// Sets the timing mode. The current colour and timer are unaffected.
    pub fn set_mode(&mut self, mode: LightMode) {
        self.mode = mode;
    }

    /// Overrides the colour and restarts its dwell time.
    pub fn set_color(&mut self, color: LightColor) {
        self.color = color;
        self.remaining = color.dwell();
    }

    /// Overrides the time left in the current colour.
    pub(crate) fn set_remaining_time(&mut self, remaining: f64) {
        self.remaining = remaining;
    }

    /// Holds the green for `seconds` longer.
    /// Has no effect unless the head is green.
    pub fn extend_green(&mut self, seconds: f64) {
        if self.color == LightColor::Green && seconds > 0.0 {
            self.remaining += seconds;
        }
    }

    /// Advances the head's own colour cycle by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.advance();
        }
    }

    /// Moves on from a colour whose time has run out.
    fn advance(&mut self) {
        let queue = self.sensor.as_ref().map_or(0, Sensor::queue_length);
        match (self.mode, self.color) {
            (LightMode::Adaptive, LightColor::Green) if queue > EXTEND_QUEUE_THRESHOLD => {
                log::trace!("queue of {} holds green for {}s", queue, GREEN_EXTENSION);
                self.extend_green(GREEN_EXTENSION);
            }
            (_, color) => self.set_color(color.next()),
        }
    }
}
