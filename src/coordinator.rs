use crate::intersection::IntersectionController;
use crate::policy::AdaptivePolicy;
use crate::IntersectionId;
use slotmap::SlotMap;

/// The intersections of a session, advanced together.
#[derive(Clone, Debug, Default)]
pub struct Coordinator {
    /// The intersections.
    intersections: SlotMap<IntersectionId, IntersectionController>,
    /// The intersections in the order they were added.
    order: Vec<IntersectionId>,
}

impl Coordinator {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an intersection. Intersections are updated in the order they are added.
    pub fn add_intersection(&mut self, intersection: IntersectionController) -> IntersectionId {
        let id = self.intersections.insert(intersection);
        self.order.push(id);
        id
    }

    /// Advances every intersection by `dt` seconds.
    ///
    /// Night mode is evaluated once per call over the sensors of every
    /// intersection, so its debounce runs on simulated time however many
    /// intersections share the policy.
    pub fn update_all(&mut self, dt: f64, policy: &mut AdaptivePolicy) {
        if self.order.is_empty() {
            return;
        }
        {
            let sensors = self
                .order
                .iter()
                .flat_map(|id| self.intersections[*id].sensors())
                .collect::<Vec<_>>();
            policy.evaluate_night_mode(&sensors, dt);
        }
        for id in &self.order {
            self.intersections[*id].run_cycle(dt, policy);
        }
    }

    /// Switches every intersection between fixed and adaptive timing.
    pub fn switch_mode_all(&mut self, adaptive: bool) {
        for id in &self.order {
            self.intersections[*id].switch_mode(adaptive);
        }
    }

    /// The number of intersections.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there are no intersections.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Gets an intersection.
    pub fn get(&self, id: IntersectionId) -> Option<&IntersectionController> {
        self.intersections.get(id)
    }

    /// Gets an intersection mutably.
    pub fn get_mut(&mut self, id: IntersectionId) -> Option<&mut IntersectionController> {
        self.intersections.get_mut(id)
    }

    /// The intersection IDs in addition order.
    pub fn ids(&self) -> &[IntersectionId] {
        &self.order
    }

    /// Iterates over the intersections in addition order.
    pub fn iter(&self) -> impl Iterator<Item = (IntersectionId, &IntersectionController)> + '_ {
        self.order.iter().map(move |id| (*id, &self.intersections[*id]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::intersection::{Axis, Phase};
    use crate::light::{LightColor, LightMode, SignalHead};
    use crate::policy::PolicyConfig;
    use crate::sensor::Sensor;
    use assert_approx_eq::assert_approx_eq;

    fn junction(idx: usize) -> IntersectionController {
        let name = format!("Inter_{}", idx);
        let mut junction = IntersectionController::new(name.clone());
        let ns = Sensor::new(format!("S_NS{}", name));
        let ew = Sensor::new(format!("S_EW{}", name));
        junction.add_signal_head(
            SignalHead::new(LightColor::Red, LightMode::Fixed, Some(ns)),
            Axis::NorthSouth,
        );
        junction.add_signal_head(
            SignalHead::new(LightColor::Green, LightMode::Fixed, Some(ew)),
            Axis::EastWest,
        );
        junction
    }

    #[test]
    fn keeps_addition_order() {
        let mut coordinator = Coordinator::new();
        let ids = (0..4)
            .map(|i| coordinator.add_intersection(junction(i)))
            .collect::<Vec<_>>();
        assert_eq!(coordinator.ids(), &ids[..]);
        let names = coordinator
            .iter()
            .map(|(_, j)| j.name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Inter_0", "Inter_1", "Inter_2", "Inter_3"]);
    }

    #[test]
    fn advances_all_uniformly() {
        let mut policy = AdaptivePolicy::new();
        let mut coordinator = Coordinator::new();
        for i in 0..3 {
            coordinator.add_intersection(junction(i));
        }
        coordinator.update_all(2.0, &mut policy);
        assert!(coordinator.iter().all(|(_, j)| j.phase() == Phase::NsGreen));
    }

    #[test]
    fn night_debounce_runs_once_per_update() {
        let mut policy = AdaptivePolicy::with_config(PolicyConfig {
            night_mode_threshold: Some(1.0),
            ..Default::default()
        });
        let mut coordinator = Coordinator::new();
        for i in 0..3 {
            coordinator.add_intersection(junction(i));
        }
        for _ in 0..4 {
            coordinator.update_all(1.0, &mut policy);
        }
        assert!(!policy.is_night_mode());
        assert_approx_eq!(policy.night_mode_timer(), 4.0);

        coordinator.update_all(1.0, &mut policy);
        assert!(policy.is_night_mode());
        assert!(coordinator.iter().all(|(_, j)| j.is_caution()));
        assert!(coordinator
            .iter()
            .all(|(_, j)| j.color(Axis::NorthSouth) == Some(LightColor::Yellow)));
    }

    #[test]
    fn switch_mode_reaches_every_intersection() {
        let mut coordinator = Coordinator::new();
        let a = coordinator.add_intersection(junction(0));
        let b = coordinator.add_intersection(junction(1));
        coordinator.switch_mode_all(true);
        assert!(coordinator.get(a).unwrap().is_adaptive());
        assert!(coordinator.get(b).unwrap().is_adaptive());
        coordinator.switch_mode_all(false);
        assert!(!coordinator.get(b).unwrap().is_adaptive());
    }
}
