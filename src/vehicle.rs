use self::following::must_stop_for_vehicle;
use self::turning::turn_target;
use crate::intersection::Axis;
use crate::light::LightColor;
use crate::math::{Point2d, Vector2d};
use crate::VehicleId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod following;
mod turning;

pub use turning::TurnGeometry;

/// The vehicle's extent along its direction of travel.
pub const VEHICLE_LENGTH: f64 = 35.0;

/// The vehicle's extent across its direction of travel.
pub const VEHICLE_WIDTH: f64 = 20.0;

/// A red light only stops a vehicle within this distance of the stop line.
const STOP_SNAP: f64 = 10.0;

/// Lateral offset from the road's near edge of southbound and westbound lanes.
pub const NEAR_LANE_OFFSET: f64 = 15.0;

/// Lateral offset from the road's near edge of northbound and eastbound lanes.
pub const FAR_LANE_OFFSET: f64 = 45.0;

/// A simulated vehicle.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vehicle {
    /// The vehicle's ID.
    pub(crate) id: VehicleId,
    /// The top-left corner of the vehicle's footprint.
    pos: Point2d,
    /// The current speed in units/s.
    speed: f64,
    /// The cruising speed in units/s.
    max_speed: f64,
    /// Which signal group governs the vehicle.
    axis: Axis,
    /// The vehicle's route through the grid.
    behavior: Behavior,
    /// Whether the vehicle has completed its turn.
    has_turned: bool,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleAttributes {
    /// The initial position of the footprint's top-left corner.
    pub position: Point2d,
    /// The cruising speed in units/s.
    pub max_speed: f64,
    /// The route the vehicle will take.
    pub behavior: Behavior,
}

/// How a vehicle travels through the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Behavior {
    /// Straight ahead, left to right.
    Eastbound,
    /// Straight ahead, right to left.
    Westbound,
    /// Straight ahead, top to bottom.
    Southbound,
    /// Straight ahead, bottom to top.
    Northbound,
    /// Eastbound, then turns south at the next intersection.
    TurnEastToSouth,
    /// Westbound, then turns north at the next intersection.
    TurnWestToNorth,
}

/// A direction of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Heading {
    East,
    West,
    South,
    North,
}

/// The signal a vehicle is approaching.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalView {
    /// The colour shown to the vehicle.
    pub color: LightColor,
    /// The distance to the stop line, negative once past it.
    pub stop_distance: f64,
}

/// The parts of a vehicle's state that other vehicles may read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub pos: Point2d,
    pub heading: Heading,
}

impl Behavior {
    /// Every behavior, in spawn-table order.
    pub const ALL: [Behavior; 6] = [
        Behavior::Southbound,
        Behavior::Northbound,
        Behavior::Westbound,
        Behavior::Eastbound,
        Behavior::TurnEastToSouth,
        Behavior::TurnWestToNorth,
    ];

    /// The direction of travel before any turn.
    pub fn heading(self) -> Heading {
        match self {
            Self::Eastbound | Self::TurnEastToSouth => Heading::East,
            Self::Westbound | Self::TurnWestToNorth => Heading::West,
            Self::Southbound => Heading::South,
            Self::Northbound => Heading::North,
        }
    }

    /// Whether this behavior includes a turn.
    pub fn is_turning(self) -> bool {
        matches!(self, Self::TurnEastToSouth | Self::TurnWestToNorth)
    }
}

impl Heading {
    /// The axis this heading travels along.
    pub fn axis(self) -> Axis {
        match self {
            Self::East | Self::West => Axis::EastWest,
            Self::South | Self::North => Axis::NorthSouth,
        }
    }

    /// A unit vector in the direction of travel. `y` grows southwards.
    pub fn unit(self) -> Vector2d {
        match self {
            Self::East => Vector2d::new(1.0, 0.0),
            Self::West => Vector2d::new(-1.0, 0.0),
            Self::South => Vector2d::new(0.0, 1.0),
            Self::North => Vector2d::new(0.0, -1.0),
        }
    }

    /// The lane's lateral offset from the near edge of its road.
    pub fn lane_offset(self) -> f64 {
        match self {
            Self::South | Self::West => NEAR_LANE_OFFSET,
            Self::North | Self::East => FAR_LANE_OFFSET,
        }
    }
}

impl SignalView {
    /// A view for a vehicle with no signal ahead.
    pub fn clear() -> Self {
        Self {
            color: LightColor::Green,
            stop_distance: f64::INFINITY,
        }
    }

    /// Whether the vehicle must halt at the stop line.
    fn must_stop(&self) -> bool {
        self.color == LightColor::Red && self.stop_distance >= 0.0 && self.stop_distance < STOP_SNAP
    }
}

impl Vehicle {
    /// Creates a new vehicle travelling at its cruising speed.
    pub(crate) fn new(id: VehicleId, attributes: &VehicleAttributes) -> Self {
        Self {
            id,
            pos: attributes.position,
            speed: attributes.max_speed,
            max_speed: attributes.max_speed,
            axis: attributes.behavior.heading().axis(),
            behavior: attributes.behavior,
            has_turned: false,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The top-left corner of the vehicle's footprint.
    pub fn position(&self) -> Point2d {
        self.pos
    }

    /// The current speed in units/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The cruising speed in units/s.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The signal group that governs the vehicle.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// The current direction of travel.
    pub fn heading(&self) -> Heading {
        self.behavior.heading()
    }

    /// Whether the vehicle has made its turn.
    pub fn has_turned(&self) -> bool {
        self.has_turned
    }

    /// Whether the vehicle still has a turn ahead of it.
    pub fn is_turning(&self) -> bool {
        self.behavior.is_turning() && !self.has_turned
    }

    /// Whether the vehicle is stopped.
    pub fn has_stopped(&self) -> bool {
        self.speed == 0.0
    }

    /// The footprint's width and height in world space.
    pub fn size(&self) -> Vector2d {
        match self.axis {
            Axis::NorthSouth => Vector2d::new(VEHICLE_WIDTH, VEHICLE_LENGTH),
            Axis::EastWest => Vector2d::new(VEHICLE_LENGTH, VEHICLE_WIDTH),
        }
    }

    /// The state other vehicles see during a tick.
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            id: self.id,
            pos: self.pos,
            heading: self.heading(),
        }
    }

    /// Advances the vehicle by `dt` seconds.
    ///
    /// # Parameters
    /// * `others` - Every vehicle as it was at the start of the tick
    /// * `signal` - The signal the vehicle is approaching
    /// * `junction` - The intersection ahead, where a turn would happen
    pub(crate) fn update(
        &mut self,
        dt: f64,
        others: &[VehicleSnapshot],
        signal: SignalView,
        junction: Option<TurnGeometry>,
    ) {
        let stop_for_vehicle = must_stop_for_vehicle(&self.snapshot(), others);
        let stop_for_light = signal.must_stop();

        self.speed = if stop_for_vehicle || stop_for_light {
            0.0
        } else {
            self.max_speed
        };

        if self.is_turning() {
            if let Some(junction) = junction {
                self.try_turn(&junction);
            }
        }

        self.pos += self.heading().unit() * (self.speed * dt);
    }

    /// Makes the turn if the vehicle has reached its trigger point.
    fn try_turn(&mut self, junction: &TurnGeometry) {
        if let Some((pos, behavior)) = turn_target(self.behavior, self.pos, self.size(), junction) {
            self.pos = pos;
            self.behavior = behavior;
            self.axis = behavior.heading().axis();
            self.has_turned = true;
            log::trace!("vehicle {:?} turned to {:?}", self.id, behavior);
        }
    }
}
