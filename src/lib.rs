pub use cgmath;
pub use coordinator::Coordinator;
pub use grid::{Approach, GridAttributes, GridLayout};
pub use intersection::{Axis, IntersectionController, Phase, SignalGroup};
pub use light::{LightColor, LightMode, SignalHead};
pub use policy::{
    AdaptivePolicy, PolicyConfig, PolicyError, PolicyEvent, PolicyListener, Recommendation,
};
pub use sensor::{CongestionLevel, Sensor};
pub use simulation::{Command, Simulation};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use vehicle::{
    Behavior, Heading, SignalView, TurnGeometry, Vehicle, VehicleAttributes, VehicleSnapshot,
};

mod coordinator;
mod grid;
mod intersection;
mod light;
pub mod math;
mod policy;
pub mod sensor;
mod simulation;
mod vehicle;

new_key_type! {
    /// Unique ID of an [IntersectionController].
    pub struct IntersectionId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
