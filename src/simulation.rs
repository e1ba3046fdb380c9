use crate::coordinator::Coordinator;
use crate::grid::{GridAttributes, GridLayout};
use crate::intersection::{Axis, IntersectionController};
use crate::light::{LightColor, LightMode, SignalHead};
use crate::policy::AdaptivePolicy;
use crate::sensor::Sensor;
use crate::vehicle::{Behavior, SignalView, Vehicle, VehicleAttributes};
use crate::{IntersectionId, VehicleId, VehicleSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use slotmap::SecondaryMap;

/// An operator command, applied at the start of the next [Simulation::step].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Puts every intersection in adaptive (`true`) or fixed (`false`) mode.
    SetModeAll(bool),
    /// Flips every intersection to the opposite of the first one's mode.
    ToggleModeAll,
    /// Sets the mode of a single intersection.
    SetMode(IntersectionId, bool),
    /// Switches between the day and night spawn rates.
    ToggleNightCycle,
    /// Gives priority to the lanes matching a direction.
    ActivateEmergency(String),
    DeactivateEmergency,
}

/// A traffic simulation over a grid of signalised intersections.
pub struct Simulation {
    /// Where the intersections and lanes are.
    grid: GridLayout,
    /// The intersections, indexed in the same order as the grid.
    coordinator: Coordinator,
    /// The shared timing policy.
    policy: AdaptivePolicy,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The detection zone each vehicle occupied on the previous frame.
    zones: SecondaryMap<VehicleId, (usize, Axis)>,
    /// Commands waiting for the next frame.
    commands: Vec<Command>,
    /// Drives spawning.
    rng: StdRng,
    /// The cruising speeds of spawned vehicles.
    speeds: Uniform<f64>,
    /// The time since the last spawn in s.
    spawn_timer: f64,
    /// Whether the slower night spawn rate is in use.
    night_cycle: bool,
    /// The current frame of simulation.
    frame: usize,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(&GridAttributes::default())
    }
}

impl Simulation {
    /// Creates a simulation of a grid with the default policy.
    pub fn new(attributes: &GridAttributes) -> Self {
        Self::with_policy(attributes, AdaptivePolicy::new())
    }

    /// Creates a simulation of a grid governed by `policy`.
    ///
    /// Every intersection starts in fixed mode with one sensed head per axis.
    pub fn with_policy(attributes: &GridAttributes, policy: AdaptivePolicy) -> Self {
        let grid = GridLayout::new(attributes);
        let mut coordinator = Coordinator::new();
        for idx in 0..grid.len() {
            coordinator.add_intersection(Self::build_intersection(idx));
        }
        let rng = match attributes.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (lo, hi) = (attributes.min_speed, attributes.max_speed);
        log::info!("created {}x{} grid", attributes.rows, attributes.cols);
        Self {
            grid,
            coordinator,
            policy,
            vehicles: VehicleSet::with_key(),
            zones: SecondaryMap::new(),
            commands: vec![],
            rng,
            speeds: Uniform::new_inclusive(lo.min(hi), hi.max(lo)),
            spawn_timer: 0.0,
            night_cycle: false,
            frame: 0,
        }
    }

    fn build_intersection(idx: usize) -> IntersectionController {
        let name = format!("Inter_{}", idx);
        let mut intersection = IntersectionController::new(name.clone());
        intersection.add_signal_head(
            SignalHead::new(
                LightColor::Red,
                LightMode::Fixed,
                Some(Sensor::new(format!("S_NS{}", name))),
            ),
            Axis::NorthSouth,
        );
        intersection.add_signal_head(
            SignalHead::new(
                LightColor::Green,
                LightMode::Fixed,
                Some(Sensor::new(format!("S_EW{}", name))),
            ),
            Axis::EastWest,
        );
        intersection
    }

    /// Queues a command for the next frame.
    pub fn send(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Adds a vehicle to the simulation.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes) -> VehicleId {
        self.vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes))
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        self.vehicles.remove(id);
        self.zones.remove(id);
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.apply_commands();
        self.refresh_sensors();
        self.coordinator.update_all(dt, &mut self.policy);
        self.spawn_vehicles(dt);
        self.update_vehicles(dt);
        self.remove_exited();
        self.frame += 1;
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn grid(&self) -> &GridLayout {
        &self.grid
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator {
        &mut self.coordinator
    }

    pub fn policy(&self) -> &AdaptivePolicy {
        &self.policy
    }

    /// Mutable access to the policy, e.g. to subscribe to its events.
    pub fn policy_mut(&mut self) -> &mut AdaptivePolicy {
        &mut self.policy
    }

    /// Whether the slower night spawn rate is in use.
    pub fn is_night_cycle(&self) -> bool {
        self.night_cycle
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// Applies the queued commands in the order they were sent.
    fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            log::debug!("applying {:?}", command);
            match command {
                Command::SetModeAll(adaptive) => self.coordinator.switch_mode_all(adaptive),
                Command::ToggleModeAll => {
                    let adaptive = self
                        .coordinator
                        .iter()
                        .next()
                        .map_or(false, |(_, i)| i.is_adaptive());
                    self.coordinator.switch_mode_all(!adaptive);
                }
                Command::SetMode(id, adaptive) => match self.coordinator.get_mut(id) {
                    Some(intersection) => intersection.switch_mode(adaptive),
                    None => log::warn!("no intersection {:?}", id),
                },
                Command::ToggleNightCycle => {
                    self.night_cycle = !self.night_cycle;
                    log::info!("night cycle {}", if self.night_cycle { "on" } else { "off" });
                }
                Command::ActivateEmergency(direction) => self.policy.activate_emergency(&direction),
                Command::DeactivateEmergency => self.policy.deactivate_emergency(),
            }
        }
    }

    /// Counts the vehicles in every detection zone and reports them to the sensors.
    fn refresh_sensors(&mut self) {
        let mut counts = vec![[0_i64; 2]; self.grid.len()];
        let ids = self.coordinator.ids().to_vec();

        for (vehicle_id, vehicle) in &self.vehicles {
            let zone = (0..self.grid.len())
                .find_map(|idx| self.grid.detection_zone(idx, vehicle).map(|axis| (idx, axis)));
            let previous = self.zones.get(vehicle_id).copied();
            match zone {
                Some((idx, axis)) => {
                    counts[idx][axis_slot(axis)] += 1;
                    if previous != zone {
                        if let Some(id) = ids.get(idx) {
                            if let Some(intersection) = self.coordinator.get_mut(*id) {
                                intersection.record_arrival(axis);
                            }
                        }
                        self.zones.insert(vehicle_id, (idx, axis));
                    }
                }
                None => {
                    self.zones.remove(vehicle_id);
                }
            }
        }

        // Intersections added outside the grid have no detection zones.
        for (id, [ns, ew]) in ids.iter().zip(counts) {
            if let Some(intersection) = self.coordinator.get_mut(*id) {
                intersection.set_queue_length(Axis::NorthSouth, ns);
                intersection.set_queue_length(Axis::EastWest, ew);
            }
        }
    }

    /// Spawns a vehicle at a random edge when the spawn interval has passed.
    fn spawn_vehicles(&mut self, dt: f64) {
        let a = self.grid.attributes();
        if !a.auto_spawn || self.grid.is_empty() {
            return;
        }
        let interval = if self.night_cycle {
            a.night_spawn_interval
        } else {
            a.day_spawn_interval
        };
        self.spawn_timer += dt;
        if self.spawn_timer <= interval {
            return;
        }
        self.spawn_timer = 0.0;

        let (rows, cols) = (a.rows, a.cols);
        let behavior = Behavior::ALL[self.rng.gen_range(0..Behavior::ALL.len())];
        let row = self.rng.gen_range(0..rows);
        let col = self.rng.gen_range(0..cols);
        let attributes = VehicleAttributes {
            position: self.grid.spawn_point(behavior, row, col),
            max_speed: self.speeds.sample(&mut self.rng),
            behavior,
        };
        let id = self.add_vehicle(&attributes);
        log::debug!("spawned {:?} vehicle {:?}", behavior, id);
    }

    /// Moves every vehicle against the positions all vehicles had at the
    /// start of the pass.
    fn update_vehicles(&mut self, dt: f64) {
        let snapshot = self
            .vehicles
            .values()
            .map(Vehicle::snapshot)
            .collect::<Vec<_>>();
        let ids = self.coordinator.ids();
        let light_range = self.grid.attributes().light_range;

        for vehicle in self.vehicles.values_mut() {
            let signal = match self.grid.approach(vehicle) {
                Some(approach) => {
                    let color = if approach.stop_distance < light_range {
                        ids.get(approach.index)
                            .and_then(|id| self.coordinator.get(*id))
                            .and_then(|i| i.color(vehicle.axis()))
                            .unwrap_or(LightColor::Green)
                    } else {
                        LightColor::Green
                    };
                    SignalView {
                        color,
                        stop_distance: approach.stop_distance,
                    }
                }
                None => SignalView::clear(),
            };
            let junction = self.grid.next_turn(vehicle);
            vehicle.update(dt, &snapshot, signal, junction);
        }
    }

    /// Removes vehicles that have left the world.
    fn remove_exited(&mut self) {
        let exited = self
            .vehicles
            .iter()
            .filter(|(_, v)| self.grid.has_exited(v.position()))
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        for vehicle_id in exited {
            log::debug!("vehicle {:?} exited", vehicle_id);
            self.remove_vehicle(vehicle_id);
        }
    }
}

fn axis_slot(axis: Axis) -> usize {
    match axis {
        Axis::NorthSouth => 0,
        Axis::EastWest => 1,
    }
}
