use crate::light::{LightColor, LightMode, SignalHead};
use crate::policy::{AdaptivePolicy, PolicyError};
use crate::sensor::Sensor;
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The duration of each all-red clearance phase, in s.
const ALL_RED_DURATION: f64 = 2.0;

/// The green phase duration in fixed mode, in s.
const FIXED_GREEN_DURATION: f64 = 10.0;

/// The signal heads governing one axis of an intersection.
pub type SignalGroup = SmallVec<[SignalHead; 1]>;

/// An axis of travel through an intersection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    NorthSouth,
    EastWest,
}

/// A phase of the intersection's crossing cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    AllRedToNs,
    NsGreen,
    NsYellow,
    AllRedToEw,
    EwGreen,
    EwYellow,
}

impl Axis {
    /// The perpendicular axis.
    pub fn cross(self) -> Self {
        match self {
            Self::NorthSouth => Self::EastWest,
            Self::EastWest => Self::NorthSouth,
        }
    }
}

impl Phase {
    /// The phases in cycle order.
    pub const CYCLE: [Phase; 6] = [
        Phase::AllRedToNs,
        Phase::NsGreen,
        Phase::NsYellow,
        Phase::AllRedToEw,
        Phase::EwGreen,
        Phase::EwYellow,
    ];

    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            Self::AllRedToNs => Self::NsGreen,
            Self::NsGreen => Self::NsYellow,
            Self::NsYellow => Self::AllRedToEw,
            Self::AllRedToEw => Self::EwGreen,
            Self::EwGreen => Self::EwYellow,
            Self::EwYellow => Self::AllRedToNs,
        }
    }

    /// The colour shown to the given axis during this phase.
    pub fn color(self, axis: Axis) -> LightColor {
        use LightColor::*;
        match (self, axis) {
            (Self::NsGreen, Axis::NorthSouth) | (Self::EwGreen, Axis::EastWest) => Green,
            (Self::NsYellow, Axis::NorthSouth) | (Self::EwYellow, Axis::EastWest) => Yellow,
            _ => Red,
        }
    }
}

/// Runs the signal cycle of one junction.
#[derive(Clone, Debug)]
pub struct IntersectionController {
    /// The intersection's name.
    name: String,
    /// The heads facing north-south traffic.
    ns: SignalGroup,
    /// The heads facing east-west traffic.
    ew: SignalGroup,
    /// Whether green phases are sized from the sensors.
    adaptive: bool,
    /// The current phase.
    phase: Phase,
    /// The time left in the current phase, in s.
    timer: f64,
    /// Whether the heads are showing night-mode caution.
    caution: bool,
    /// The index into [Self::sensors] of the most urgent lane.
    priority_lane: Option<usize>,
}

impl IntersectionController {
    /// Creates an intersection in fixed mode, at the start of the all-red
    /// phase preceding north-south green.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ns: SmallVec::new(),
            ew: SmallVec::new(),
            adaptive: false,
            phase: Phase::AllRedToNs,
            timer: ALL_RED_DURATION,
            caution: false,
            priority_lane: None,
        }
    }

    /// The intersection's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The time left in the current phase, in s.
    pub fn phase_timer(&self) -> f64 {
        self.timer
    }

    /// Whether green phases are sized adaptively.
    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Whether the heads are frozen on night-mode caution.
    pub fn is_caution(&self) -> bool {
        self.caution
    }

    /// The signal heads for an axis.
    pub fn group(&self, axis: Axis) -> &[SignalHead] {
        match axis {
            Axis::NorthSouth => &self.ns,
            Axis::EastWest => &self.ew,
        }
    }

    fn group_mut(&mut self, axis: Axis) -> &mut SignalGroup {
        match axis {
            Axis::NorthSouth => &mut self.ns,
            Axis::EastWest => &mut self.ew,
        }
    }

    /// The colour facing traffic on `axis`, taken from the group's first head.
    pub fn color(&self, axis: Axis) -> Option<LightColor> {
        self.group(axis).first().map(SignalHead::color)
    }

    /// Adds a signal head to a group and returns its index in the group.
    /// The head is immediately set to the colour of the current phase.
    pub fn add_signal_head(&mut self, mut head: SignalHead, axis: Axis) -> usize {
        let color = if self.caution {
            LightColor::Yellow
        } else {
            self.phase.color(axis)
        };
        head.set_color(color);
        head.set_remaining_time(self.timer);
        head.set_mode(LightMode::from_adaptive(self.adaptive));
        let group = self.group_mut(axis);
        group.push(head);
        group.len() - 1
    }

    /// All sensors, north-south group first.
    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> + '_ {
        self.ns.iter().chain(self.ew.iter()).filter_map(SignalHead::sensor)
    }

    /// The sensors of one group.
    pub fn group_sensors(&self, axis: Axis) -> impl Iterator<Item = &Sensor> + '_ {
        self.group(axis).iter().filter_map(SignalHead::sensor)
    }

    /// The sensors of one group, for feeding detector readings.
    pub fn group_sensors_mut(&mut self, axis: Axis) -> impl Iterator<Item = &mut Sensor> + '_ {
        self.group_mut(axis).iter_mut().filter_map(SignalHead::sensor_mut)
    }

    /// Reports the number of vehicles queued on `axis` to every sensor of that group.
    pub fn set_queue_length(&mut self, axis: Axis, queue_length: i64) {
        for sensor in self.group_sensors_mut(axis) {
            sensor.set_queue_length(queue_length);
        }
    }

    /// Records a vehicle arriving on `axis` with every sensor of that group.
    pub fn record_arrival(&mut self, axis: Axis) {
        for sensor in self.group_sensors_mut(axis) {
            sensor.record_arrival();
        }
    }

    /// The index into [Self::sensors] of the lane the policy deems most urgent.
    pub fn priority_lane(&self) -> Option<usize> {
        self.priority_lane
    }

    /// Switches between fixed and adaptive timing.
    /// The current phase and its timer are kept.
    pub fn switch_mode(&mut self, adaptive: bool) {
        self.adaptive = adaptive;
        let mode = LightMode::from_adaptive(adaptive);
        for head in self.ns.iter_mut().chain(self.ew.iter_mut()) {
            head.set_mode(mode);
        }
        log::info!(
            "intersection {} switched to {} mode",
            self.name,
            if adaptive { "adaptive" } else { "fixed" }
        );
    }

    /// The green duration for a group, in s.
    ///
    /// In adaptive mode this is the longest green any of the group's sensors
    /// asks for; otherwise, or for an empty group, the fixed duration.
    pub fn calculate_group_duration(&self, axis: Axis, policy: &AdaptivePolicy) -> f64 {
        let group = self.group(axis);
        if !self.adaptive || group.is_empty() {
            return FIXED_GREEN_DURATION;
        }
        let longest = group
            .iter()
            .filter_map(SignalHead::sensor)
            .map(|sensor| policy.green_duration(sensor))
            .fold(policy.config().min_green, u32::max);
        f64::from(longest)
    }

    /// Advances the intersection by `dt` seconds, first letting the policy
    /// re-evaluate night mode from this intersection's sensors.
    pub fn update(&mut self, dt: f64, policy: &mut AdaptivePolicy) {
        {
            let sensors = self.sensors().collect::<SmallVec<[_; 2]>>();
            policy.evaluate_night_mode(&sensors, dt);
        }
        self.run_cycle(dt, policy);
    }

    /// Advances the sensor clocks and the phase machine by `dt` seconds
    /// without touching the policy's night mode state.
    pub(crate) fn run_cycle(&mut self, dt: f64, policy: &AdaptivePolicy) {
        for sensor in self.group_sensors_mut(Axis::NorthSouth) {
            sensor.advance(dt);
        }
        for sensor in self.group_sensors_mut(Axis::EastWest) {
            sensor.advance(dt);
        }

        if policy.is_night_mode() {
            self.show_caution();
            return;
        }
        if self.caution {
            self.caution = false;
            self.apply_phase_colors();
        }

        self.refresh_priority_lane(policy);

        self.timer -= dt;
        if self.timer <= 0.0 {
            self.advance_phase(policy);
        }
        self.sync_head_timers();
    }

    /// Ends the current phase immediately and enters the next one.
    pub fn advance_phase(&mut self, policy: &AdaptivePolicy) {
        let next = self.phase.next();
        self.timer = match next {
            Phase::AllRedToNs | Phase::AllRedToEw => ALL_RED_DURATION,
            Phase::NsGreen => self.calculate_group_duration(Axis::NorthSouth, policy),
            Phase::EwGreen => self.calculate_group_duration(Axis::EastWest, policy),
            Phase::NsYellow | Phase::EwYellow => f64::from(policy.yellow_duration()),
        };
        self.phase = next;
        self.apply_phase_colors();
        log::debug!(
            "intersection {} -> {:?} for {}s",
            self.name,
            self.phase,
            self.timer
        );
    }

    /// Shows every head the colour its axis gets in the current phase.
    fn apply_phase_colors(&mut self) {
        for axis in [Axis::NorthSouth, Axis::EastWest] {
            let color = self.phase.color(axis);
            for head in self.group_mut(axis) {
                head.set_color(color);
            }
        }
        self.sync_head_timers();
    }

    /// Freezes both groups on yellow.
    fn show_caution(&mut self) {
        self.caution = true;
        for head in self.ns.iter_mut().chain(self.ew.iter_mut()) {
            if head.color() != LightColor::Yellow {
                head.set_color(LightColor::Yellow);
            }
        }
    }

    fn sync_head_timers(&mut self) {
        let timer = self.timer;
        for head in self.ns.iter_mut().chain(self.ew.iter_mut()) {
            head.set_remaining_time(timer);
        }
    }

    fn refresh_priority_lane(&mut self, policy: &AdaptivePolicy) {
        let picked = {
            let sensors = self.sensors().collect::<SmallVec<[_; 2]>>();
            policy.pick_priority_lane(&sensors)
        };
        match picked {
            Ok(idx) => self.priority_lane = Some(idx),
            Err(PolicyError::NoMatch { direction }) => {
                log::warn!(
                    "intersection {}: no lane matches emergency direction {:?}",
                    self.name,
                    direction
                );
            }
            Err(PolicyError::Empty) => self.priority_lane = None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::policy::PolicyConfig;
    use assert_approx_eq::assert_approx_eq;

    fn junction(name: &str) -> IntersectionController {
        let mut junction = IntersectionController::new(name);
        junction.add_signal_head(
            SignalHead::new(
                LightColor::Red,
                LightMode::Fixed,
                Some(Sensor::new(format!("S_NS{}", name))),
            ),
            Axis::NorthSouth,
        );
        junction.add_signal_head(
            SignalHead::new(
                LightColor::Green,
                LightMode::Fixed,
                Some(Sensor::new(format!("S_EW{}", name))),
            ),
            Axis::EastWest,
        );
        junction
    }

    fn never_both_green(junction: &IntersectionController) -> bool {
        let ns = junction.group(Axis::NorthSouth).iter();
        let ew = junction.group(Axis::EastWest).iter();
        !(ns.clone().any(|h| h.color() == LightColor::Green)
            && ew.clone().any(|h| h.color() == LightColor::Green))
    }

    #[test]
    fn new_heads_follow_the_phase() {
        let junction = junction("Inter_0");
        assert_eq!(junction.phase(), Phase::AllRedToNs);
        assert_eq!(junction.color(Axis::NorthSouth), Some(LightColor::Red));
        assert_eq!(junction.color(Axis::EastWest), Some(LightColor::Red));
    }

    #[test]
    fn phase_cycle_is_total_and_cyclic() {
        let policy = AdaptivePolicy::new();
        for start in Phase::CYCLE {
            let mut junction = junction("Inter_0");
            while junction.phase() != start {
                junction.advance_phase(&policy);
            }
            let mut visited = vec![];
            for _ in 0..6 {
                junction.advance_phase(&policy);
                assert!(never_both_green(&junction));
                visited.push(junction.phase());
            }
            assert_eq!(junction.phase(), start);
            let offset = Phase::CYCLE.iter().position(|p| *p == start).unwrap();
            let expected = (1..=6).map(|i| Phase::CYCLE[(offset + i) % 6]).collect::<Vec<_>>();
            assert_eq!(visited, expected);
        }
    }

    #[test]
    fn phase_colours() {
        let policy = AdaptivePolicy::new();
        let mut junction = junction("Inter_0");
        let expected = [
            (LightColor::Green, LightColor::Red),
            (LightColor::Yellow, LightColor::Red),
            (LightColor::Red, LightColor::Red),
            (LightColor::Red, LightColor::Green),
            (LightColor::Red, LightColor::Yellow),
            (LightColor::Red, LightColor::Red),
        ];
        for (ns, ew) in expected {
            junction.advance_phase(&policy);
            assert_eq!(junction.color(Axis::NorthSouth), Some(ns));
            assert_eq!(junction.color(Axis::EastWest), Some(ew));
        }
    }

    #[test]
    fn fixed_mode_timers() {
        let mut policy = AdaptivePolicy::new();
        let mut junction = junction("Inter_0");
        junction.update(2.0, &mut policy);
        assert_eq!(junction.phase(), Phase::NsGreen);
        assert_approx_eq!(junction.phase_timer(), 10.0);
        assert_approx_eq!(junction.group(Axis::EastWest)[0].remaining_time(), 10.0);

        junction.update(10.0, &mut policy);
        assert_eq!(junction.phase(), Phase::NsYellow);
        assert_approx_eq!(junction.phase_timer(), 3.0);
    }

    #[test]
    fn empty_group_uses_fixed_duration() {
        let policy = AdaptivePolicy::new();
        let mut junction = IntersectionController::new("empty");
        assert_approx_eq!(junction.calculate_group_duration(Axis::NorthSouth, &policy), 10.0);
        junction.switch_mode(true);
        assert_approx_eq!(junction.calculate_group_duration(Axis::NorthSouth, &policy), 10.0);
        assert_approx_eq!(junction.calculate_group_duration(Axis::EastWest, &policy), 10.0);
    }

    #[test]
    fn empty_intersection_still_cycles() {
        let mut policy = AdaptivePolicy::new();
        let mut junction = IntersectionController::new("empty");
        for _ in 0..100 {
            junction.update(1.0, &mut policy);
        }
        assert_eq!(junction.priority_lane(), None);
    }

    #[test]
    fn adaptive_group_takes_longest_green() {
        let policy = AdaptivePolicy::new();
        let mut junction = junction("Inter_0");
        junction.add_signal_head(
            SignalHead::new(LightColor::Red, LightMode::Fixed, Some(Sensor::new("S_NS_b"))),
            Axis::NorthSouth,
        );
        junction.add_signal_head(
            SignalHead::new(LightColor::Red, LightMode::Fixed, None),
            Axis::NorthSouth,
        );
        junction.switch_mode(true);
        let mut sensors = junction.group_sensors_mut(Axis::NorthSouth);
        sensors.next().unwrap().set_queue_length(0);
        sensors.next().unwrap().set_queue_length(12);
        drop(sensors);

        assert_approx_eq!(junction.calculate_group_duration(Axis::NorthSouth, &policy), 64.0);
        assert_approx_eq!(junction.calculate_group_duration(Axis::EastWest, &policy), 21.0);
    }

    #[test]
    fn switch_mode_keeps_phase() {
        let mut policy = AdaptivePolicy::new();
        let mut junction = junction("Inter_0");
        junction.update(2.5, &mut policy);
        let (phase, timer) = (junction.phase(), junction.phase_timer());
        junction.switch_mode(true);
        assert_eq!(junction.phase(), phase);
        assert_approx_eq!(junction.phase_timer(), timer);
        assert!(junction
            .group(Axis::EastWest)
            .iter()
            .all(|h| h.mode() == LightMode::Adaptive));
    }

    #[test]
    fn emergency_sizes_greens_in_adaptive_mode() {
        let mut policy = AdaptivePolicy::new();
        let mut junction = junction("Inter_0");
        junction.switch_mode(true);
        policy.activate_emergency("S_EW");
        junction.update(2.0, &mut policy);
        assert_eq!(junction.phase(), Phase::NsGreen);
        assert_approx_eq!(junction.phase_timer(), 10.0);
        assert_eq!(junction.priority_lane(), Some(1));

        junction.advance_phase(&policy);
        junction.advance_phase(&policy);
        junction.advance_phase(&policy);
        assert_eq!(junction.phase(), Phase::EwGreen);
        assert_approx_eq!(junction.phase_timer(), 90.0);
    }

    #[test]
    fn priority_lane_kept_when_emergency_matches_nothing() {
        let mut policy = AdaptivePolicy::new();
        let mut junction = junction("Inter_0");
        junction.set_queue_length(Axis::EastWest, 9);
        junction.update(0.1, &mut policy);
        assert_eq!(junction.priority_lane(), Some(1));

        policy.activate_emergency("Nowhere");
        junction.set_queue_length(Axis::NorthSouth, 20);
        junction.update(0.1, &mut policy);
        assert_eq!(junction.priority_lane(), Some(1));
    }

    #[test]
    fn night_mode_freezes_cycle_on_caution() {
        let mut policy = AdaptivePolicy::with_config(PolicyConfig {
            night_mode_threshold: Some(1.0),
            ..Default::default()
        });
        let mut junction = junction("Inter_0");
        junction.update(2.0, &mut policy);
        assert_eq!(junction.phase(), Phase::NsGreen);

        // Empty lanes: the next evaluation engages night mode.
        junction.update(3.0, &mut policy);
        assert!(policy.is_night_mode());
        assert!(junction.is_caution());
        assert_eq!(junction.color(Axis::NorthSouth), Some(LightColor::Yellow));
        assert_eq!(junction.color(Axis::EastWest), Some(LightColor::Yellow));
        let timer = junction.phase_timer();

        for _ in 0..4 {
            junction.update(1.0, &mut policy);
            assert_eq!(junction.phase(), Phase::NsGreen);
            assert_approx_eq!(junction.phase_timer(), timer);
        }

        junction.set_queue_length(Axis::NorthSouth, 4);
        junction.update(1.0, &mut policy);
        assert!(!policy.is_night_mode());
        assert!(!junction.is_caution());
        assert_eq!(junction.color(Axis::NorthSouth), Some(LightColor::Green));
        assert_eq!(junction.color(Axis::EastWest), Some(LightColor::Red));
    }
}
