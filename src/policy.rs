//! The adaptive timing policy shared by every intersection.

use crate::sensor::{CongestionLevel, Sensor};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The tunable constants of an [AdaptivePolicy].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolicyConfig {
    /// The shortest green phase, in s.
    pub min_green: u32,
    /// The longest green phase, in s.
    pub max_green: u32,
    /// The green phase before congestion adjustments, in s.
    pub default_green: u32,
    /// The yellow phase, in s.
    pub yellow: u32,
    /// Green multiplier for a [CongestionLevel::Low] lane.
    pub low_factor: f64,
    /// Green multiplier for a [CongestionLevel::High] lane.
    pub high_factor: f64,
    /// Green multiplier for a [CongestionLevel::Jammed] lane.
    pub jammed_factor: f64,
    /// How often the night mode predicate is re-evaluated, in s.
    pub night_mode_interval: f64,
    /// Average queue length below which night mode should engage.
    /// `None` keeps night mode from ever engaging on its own.
    pub night_mode_threshold: Option<f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_green: 10,
            max_green: 90,
            default_green: 30,
            yellow: 3,
            low_factor: 0.7,
            high_factor: 1.5,
            jammed_factor: 2.0,
            night_mode_interval: 5.0,
            night_mode_threshold: None,
        }
    }
}

/// A change of the policy's special modes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PolicyEvent {
    EmergencyActivated { direction: String },
    EmergencyDeactivated,
    NightModeActivated,
    NightModeDeactivated,
}

/// Receives [PolicyEvent]s, e.g. to give the operator feedback.
pub trait PolicyListener {
    fn on_policy_event(&mut self, event: &PolicyEvent);
}

impl<F: FnMut(&PolicyEvent)> PolicyListener for F {
    fn on_policy_event(&mut self, event: &PolicyEvent) {
        self(event)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("no sensor matches emergency direction {direction:?}")]
    NoMatch { direction: String },
    #[error("no sensors to choose from")]
    Empty,
}

/// The recommended timing for one lane.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Recommendation {
    pub sensor_id: String,
    pub level: CongestionLevel,
    pub green_duration: u32,
    pub priority_score: u64,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> green {}s (priority {})",
            self.sensor_id, self.level, self.green_duration, self.priority_score
        )
    }
}

/// Decides green durations and lane priorities from sensor readings,
/// and tracks the emergency and night modes.
///
/// One instance is shared by all intersections of a session. Its mutable
/// state is only written through its own entry points.
#[derive(Default)]
pub struct AdaptivePolicy {
    config: PolicyConfig,
    emergency: Option<String>,
    night_mode: bool,
    night_mode_timer: f64,
    listeners: Vec<Box<dyn PolicyListener>>,
}

impl AdaptivePolicy {
    /// Creates a policy with the default constants.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a policy with the given constants.
    pub fn with_config(config: PolicyConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// The policy's constants.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Registers a listener for mode changes.
    pub fn subscribe(&mut self, listener: Box<dyn PolicyListener>) {
        self.listeners.push(listener);
    }

    /// The yellow phase duration, in s.
    pub fn yellow_duration(&self) -> u32 {
        self.config.yellow
    }

    /// Computes the green duration for a single lane, in s.
    ///
    /// Returns `0` while night mode is active, meaning the normal cycle
    /// should be skipped in favour of caution signals.
    pub fn green_duration(&self, sensor: &Sensor) -> u32 {
        let cfg = &self.config;
        if self.night_mode {
            return 0;
        }
        if let Some(direction) = &self.emergency {
            return if sensor.id().contains(direction.as_str()) {
                cfg.max_green
            } else {
                cfg.min_green
            };
        }

        let base = f64::from(cfg.default_green);
        let duration = match sensor.congestion_level() {
            CongestionLevel::Low => (base * cfg.low_factor) as u32,
            CongestionLevel::Medium => cfg.default_green,
            CongestionLevel::High => (base * cfg.high_factor) as u32,
            CongestionLevel::Jammed => (base * cfg.jammed_factor) as u32,
        };
        let duration = duration.saturating_add(sensor.queue_length() / 3);
        // Tolerates a misconfigured range, where the maximum wins.
        duration.max(cfg.min_green).min(cfg.max_green)
    }

    /// Scores how urgently a lane needs green. Higher is more urgent.
    pub fn priority_score(&self, sensor: &Sensor) -> u64 {
        let jammed_bonus = if sensor.is_jammed() { 50 } else { 0 };
        u64::from(sensor.queue_length()) * 10 + jammed_bonus + (sensor.flow_rate() / 2.0) as u64
    }

    /// Picks the lane that should be served next.
    ///
    /// Under emergency mode this is the first sensor naming the emergency
    /// direction; otherwise the highest priority score, ties going to the
    /// earliest sensor.
    pub fn pick_priority_lane<S: Borrow<Sensor>>(&self, sensors: &[S]) -> Result<usize, PolicyError> {
        if sensors.is_empty() {
            return Err(PolicyError::Empty);
        }

        if let Some(direction) = &self.emergency {
            return sensors
                .iter()
                .position(|s| s.borrow().id().contains(direction.as_str()))
                .ok_or_else(|| PolicyError::NoMatch {
                    direction: direction.clone(),
                });
        }

        let mut best = (0, self.priority_score(sensors[0].borrow()));
        for (idx, sensor) in sensors.iter().enumerate().skip(1) {
            let score = self.priority_score(sensor.borrow());
            if score > best.1 {
                best = (idx, score);
            }
        }
        Ok(best.0)
    }

    /// Builds a timing recommendation for each sensor.
    pub fn recommendations<S: Borrow<Sensor>>(&self, sensors: &[S]) -> Vec<Recommendation> {
        sensors
            .iter()
            .map(|s| {
                let sensor = s.borrow();
                Recommendation {
                    sensor_id: sensor.id().to_owned(),
                    level: sensor.congestion_level(),
                    green_duration: self.green_duration(sensor),
                    priority_score: self.priority_score(sensor),
                }
            })
            .collect()
    }

    /// Gives absolute priority to lanes whose sensor identifier contains `direction`.
    pub fn activate_emergency(&mut self, direction: &str) {
        if self.emergency.as_deref() == Some(direction) {
            return;
        }
        log::info!("emergency mode activated, priority direction {:?}", direction);
        self.emergency = Some(direction.to_owned());
        self.emit(PolicyEvent::EmergencyActivated {
            direction: direction.to_owned(),
        });
    }

    /// Leaves emergency mode.
    pub fn deactivate_emergency(&mut self) {
        if self.emergency.take().is_some() {
            log::info!("emergency mode deactivated");
            self.emit(PolicyEvent::EmergencyDeactivated);
        }
    }

    /// Whether emergency mode is active.
    pub fn is_emergency(&self) -> bool {
        self.emergency.is_some()
    }

    /// The current emergency direction, if any.
    pub fn emergency_direction(&self) -> Option<&str> {
        self.emergency.as_deref()
    }

    /// Switches every intersection to flashing caution signals.
    pub fn activate_night_mode(&mut self) {
        if !self.night_mode {
            log::info!("night mode activated, signals flashing yellow");
            self.night_mode = true;
            self.emit(PolicyEvent::NightModeActivated);
        }
    }

    /// Returns to the normal signal cycle.
    pub fn deactivate_night_mode(&mut self) {
        if self.night_mode {
            log::info!("night mode deactivated, resuming normal cycle");
            self.night_mode = false;
            self.emit(PolicyEvent::NightModeDeactivated);
        }
    }

    /// Whether night mode is active.
    pub fn is_night_mode(&self) -> bool {
        self.night_mode
    }

    /// The time accumulated towards the next night mode evaluation, in s.
    pub fn night_mode_timer(&self) -> f64 {
        self.night_mode_timer
    }

    /// Whether traffic is light enough for night mode.
    ///
    /// The average queue is compared against the configured threshold; with
    /// no threshold this never holds.
    pub fn should_activate_night_mode<S: Borrow<Sensor>>(&self, sensors: &[S]) -> bool {
        if sensors.is_empty() {
            return false;
        }
        let total: u64 = sensors
            .iter()
            .map(|s| u64::from(s.borrow().queue_length()))
            .sum();
        let average = total as f64 / sensors.len() as f64;
        match self.config.night_mode_threshold {
            Some(threshold) => average < threshold,
            None => false,
        }
    }

    /// Advances the night mode debounce timer and, once per interval,
    /// re-evaluates whether night mode should be on.
    /// Does nothing while emergency mode is active.
    pub fn evaluate_night_mode<S: Borrow<Sensor>>(&mut self, sensors: &[S], elapsed: f64) {
        if self.is_emergency() {
            return;
        }

        self.night_mode_timer += elapsed;
        if self.night_mode_timer < self.config.night_mode_interval {
            return;
        }
        self.night_mode_timer = 0.0;

        let should_be_night = self.should_activate_night_mode(sensors);
        if should_be_night && !self.night_mode {
            self.activate_night_mode();
        } else if !should_be_night && self.night_mode {
            self.deactivate_night_mode();
        }
    }

    fn emit(&mut self, event: PolicyEvent) {
        for listener in &mut self.listeners {
            listener.on_policy_event(&event);
        }
    }
}

impl fmt::Debug for AdaptivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptivePolicy")
            .field("config", &self.config)
            .field("emergency", &self.emergency)
            .field("night_mode", &self.night_mode)
            .field("night_mode_timer", &self.night_mode_timer)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
