use super::{Behavior, FAR_LANE_OFFSET, NEAR_LANE_OFFSET};
use crate::math::{Point2d, Vector2d};

/// Westbound vehicles turn north once they are this close to clearing the road.
const WEST_TURN_CLEARANCE: f64 = 20.0;

/// The intersection a turning vehicle is approaching.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnGeometry {
    /// The x coordinate of the left edge of the crossing road.
    pub x: f64,
    /// The width of the crossing road.
    pub road_width: f64,
}

/// Checks whether a turning vehicle has reached its trigger point, and if so
/// returns its position and behavior after the turn.
///
/// # Parameters
/// * `behavior` - The vehicle's current behavior
/// * `pos` - The top-left corner of the vehicle's footprint
/// * `size` - The footprint's extent before turning
/// * `junction` - The intersection being approached
pub(super) fn turn_target(
    behavior: Behavior,
    pos: Point2d,
    size: Vector2d,
    junction: &TurnGeometry,
) -> Option<(Point2d, Behavior)> {
    match behavior {
        Behavior::TurnEastToSouth => {
            let trigger = junction.x + 0.5 * junction.road_width;
            (pos.x + size.x >= trigger).then(|| {
                let pos = Point2d::new(junction.x + NEAR_LANE_OFFSET, pos.y);
                (pos, Behavior::Southbound)
            })
        }
        Behavior::TurnWestToNorth => {
            let trigger = junction.x + junction.road_width + WEST_TURN_CLEARANCE;
            (pos.x <= trigger).then(|| {
                let pos = Point2d::new(junction.x + FAR_LANE_OFFSET, pos.y);
                (pos, Behavior::Northbound)
            })
        }
        _ => None,
    }
}
