use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Queue length at which a lane is classified as [CongestionLevel::Medium].
pub const MEDIUM_THRESHOLD: u32 = 3;

/// Queue length at which a lane is classified as [CongestionLevel::High].
pub const HIGH_THRESHOLD: u32 = 8;

/// Queue length at which a lane is classified as [CongestionLevel::Jammed].
pub const JAMMED_THRESHOLD: u32 = 12;

/// Flow windows shorter than this report a flow rate of zero.
const FLOW_EPSILON: f64 = 0.0001; // s

/// A per-lane traffic detector.
///
/// The queue length is never derived internally; it is overwritten each tick
/// by the world layer through [Sensor::set_queue_length].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sensor {
    /// The sensor identifier, matched against emergency directions.
    id: String,
    /// The number of vehicles ever detected.
    total_vehicles: u64,
    /// The most recently reported queue length.
    queue_length: u32,
    /// The number of vehicles detected since the flow window started.
    window_count: u64,
    /// The simulated time at which the flow window started, in s.
    window_start: f64,
    /// The sensor's simulated clock, in s.
    clock: f64,
}

/// A coarse classification of a lane's queue length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    Jammed,
}

impl CongestionLevel {
    /// Classifies a queue length.
    pub fn from_queue_length(queue_length: u32) -> Self {
        match queue_length {
            q if q >= JAMMED_THRESHOLD => Self::Jammed,
            q if q >= HIGH_THRESHOLD => Self::High,
            q if q >= MEDIUM_THRESHOLD => Self::Medium,
            _ => Self::Low,
        }
    }

    /// The display label of the level.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Jammed => "JAMMED",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Sensor {
    /// Creates a new sensor with an empty queue and a fresh flow window.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            total_vehicles: 0,
            queue_length: 0,
            window_count: 0,
            window_start: 0.0,
            clock: 0.0,
        }
    }

    /// The sensor identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The number of vehicles detected over the sensor's lifetime.
    pub fn total_vehicles(&self) -> u64 {
        self.total_vehicles
    }

    /// The most recently reported queue length.
    pub fn queue_length(&self) -> u32 {
        self.queue_length
    }

    /// The number of vehicles detected in the current flow window.
    pub fn window_count(&self) -> u64 {
        self.window_count
    }

    /// The simulated time elapsed since the flow window started, in s.
    pub fn window_elapsed(&self) -> f64 {
        self.clock - self.window_start
    }

    /// Records a vehicle passing the detector.
    pub fn record_arrival(&mut self) {
        self.total_vehicles += 1;
        self.window_count += 1;
    }

    /// Overwrites the queue length. Negative counts are rejected and
    /// the previous value is kept.
    pub fn set_queue_length(&mut self, queue_length: i64) {
        match u32::try_from(queue_length) {
            Ok(queue_length) => self.queue_length = queue_length,
            Err(_) if queue_length < 0 => {
                log::warn!(
                    "sensor {}: ignoring negative queue length {}",
                    self.id,
                    queue_length
                );
            }
            Err(_) => self.queue_length = u32::MAX,
        }
    }

    /// Advances the sensor's simulated clock by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        if dt > 0.0 {
            self.clock += dt;
        }
    }

    /// The number of vehicles detected per minute over the current flow window.
    pub fn flow_rate(&self) -> f64 {
        let elapsed = self.window_elapsed();
        if elapsed < FLOW_EPSILON {
            return 0.0;
        }
        self.window_count as f64 / elapsed * 60.0
    }

    /// Zeros the windowed counter and restarts the window at the current time.
    pub fn reset_window(&mut self) {
        self.window_count = 0;
        self.window_start = self.clock;
    }

    /// Classifies the current queue length.
    pub fn congestion_level(&self) -> CongestionLevel {
        CongestionLevel::from_queue_length(self.queue_length)
    }

    /// Whether the lane is jammed.
    pub fn is_jammed(&self) -> bool {
        self.congestion_level() == CongestionLevel::Jammed
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sensor: {} ===", self.id)?;
        writeln!(f, "  Total vehicles: {}", self.total_vehicles)?;
        writeln!(f, "  Queue: {} vehicles", self.queue_length)?;
        writeln!(f, "  Flow: {:.1} veh/min", self.flow_rate())?;
        write!(f, "  Level: {}", self.congestion_level())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn arrivals_are_counted() {
        let mut sensor = Sensor::new("S_NS");
        sensor.record_arrival();
        sensor.record_arrival();
        assert_eq!(sensor.total_vehicles(), 2);
        assert_eq!(sensor.window_count(), 2);
    }

    #[test]
    fn negative_queue_length_is_ignored() {
        let mut sensor = Sensor::new("S_NS");
        sensor.set_queue_length(5);
        sensor.set_queue_length(-1);
        assert_eq!(sensor.queue_length(), 5);
        sensor.set_queue_length(0);
        assert_eq!(sensor.queue_length(), 0);
    }

    #[test]
    fn congestion_breakpoints() {
        let cases = [
            (0, CongestionLevel::Low),
            (2, CongestionLevel::Low),
            (3, CongestionLevel::Medium),
            (7, CongestionLevel::Medium),
            (8, CongestionLevel::High),
            (11, CongestionLevel::High),
            (12, CongestionLevel::Jammed),
            (40, CongestionLevel::Jammed),
        ];
        let mut sensor = Sensor::new("S");
        for (queue, level) in cases {
            sensor.set_queue_length(queue);
            assert_eq!(sensor.congestion_level(), level, "queue length {}", queue);
        }
    }

    #[test]
    fn jammed_matches_level() {
        let mut sensor = Sensor::new("S");
        sensor.set_queue_length(11);
        assert!(!sensor.is_jammed());
        sensor.set_queue_length(12);
        assert!(sensor.is_jammed());
    }

    #[test]
    fn flow_rate_without_elapsed_time_is_zero() {
        let mut sensor = Sensor::new("S");
        sensor.record_arrival();
        assert_eq!(sensor.flow_rate(), 0.0);
        sensor.advance(0.00001);
        assert_eq!(sensor.flow_rate(), 0.0);
    }

    #[test]
    fn flow_rate_is_per_minute() {
        let mut sensor = Sensor::new("S");
        for _ in 0..5 {
            sensor.record_arrival();
        }
        sensor.advance(30.0);
        assert_approx_eq!(sensor.flow_rate(), 10.0);
    }

    #[test]
    fn flow_window_accumulates_without_reset() {
        let mut sensor = Sensor::new("S");
        sensor.record_arrival();
        sensor.advance(60.0);
        sensor.record_arrival();
        sensor.advance(60.0);
        assert_approx_eq!(sensor.flow_rate(), 1.0);
        assert_eq!(sensor.total_vehicles(), 2);
    }

    #[test]
    fn reset_window_restarts_flow() {
        let mut sensor = Sensor::new("S");
        sensor.record_arrival();
        sensor.record_arrival();
        sensor.advance(10.0);
        sensor.reset_window();
        assert_eq!(sensor.window_count(), 0);
        assert_eq!(sensor.flow_rate(), 0.0);
        assert_eq!(sensor.total_vehicles(), 2);

        sensor.record_arrival();
        sensor.advance(6.0);
        assert_approx_eq!(sensor.flow_rate(), 10.0);
    }
}
