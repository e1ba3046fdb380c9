use super::{Heading, VehicleSnapshot};

/// A vehicle stops when another is this close ahead in its lane.
const FOLLOW_DISTANCE: f64 = 45.0;

/// Vehicles further apart than this laterally are in different lanes.
const LANE_TOLERANCE: f64 = 10.0;

/// Determines whether a vehicle ahead in the same lane is too close.
///
/// Only vehicles travelling the same way are considered, so oncoming and
/// crossing traffic never cause braking.
pub(super) fn must_stop_for_vehicle(own: &VehicleSnapshot, others: &[VehicleSnapshot]) -> bool {
    others
        .iter()
        .filter(|other| other.id != own.id && other.heading == own.heading)
        .filter(|other| lateral_gap(own, other) <= LANE_TOLERANCE)
        .map(|other| forward_gap(own, other))
        .any(|gap| gap > 0.0 && gap < FOLLOW_DISTANCE)
}

/// The distance between two vehicles across their direction of travel.
fn lateral_gap(own: &VehicleSnapshot, other: &VehicleSnapshot) -> f64 {
    match own.heading {
        Heading::East | Heading::West => (other.pos.y - own.pos.y).abs(),
        Heading::South | Heading::North => (other.pos.x - own.pos.x).abs(),
    }
}

/// How far `other` is ahead of `own`, negative if behind.
fn forward_gap(own: &VehicleSnapshot, other: &VehicleSnapshot) -> f64 {
    let delta = other.pos - own.pos;
    match own.heading {
        Heading::East => delta.x,
        Heading::West => -delta.x,
        Heading::South => delta.y,
        Heading::North => -delta.y,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;
    use crate::VehicleId;
    use slotmap::SlotMap;

    fn snapshots(specs: &[(f64, f64, Heading)]) -> Vec<VehicleSnapshot> {
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        specs
            .iter()
            .map(|(x, y, heading)| VehicleSnapshot {
                id: ids.insert(()),
                pos: Point2d::new(*x, *y),
                heading: *heading,
            })
            .collect()
    }

    #[test]
    fn stops_behind_close_leader() {
        let vs = snapshots(&[(0.0, 0.0, Heading::East), (40.0, 0.0, Heading::East)]);
        assert!(must_stop_for_vehicle(&vs[0], &vs));
        assert!(!must_stop_for_vehicle(&vs[1], &vs));
    }

    #[test]
    fn ignores_distant_leader() {
        let vs = snapshots(&[(0.0, 0.0, Heading::East), (45.0, 0.0, Heading::East)]);
        assert!(!must_stop_for_vehicle(&vs[0], &vs));
    }

    #[test]
    fn ignores_other_lanes_and_directions() {
        let vs = snapshots(&[
            (0.0, 0.0, Heading::East),
            (20.0, 11.0, Heading::East),
            (20.0, 0.0, Heading::West),
            (20.0, 0.0, Heading::South),
        ]);
        assert!(!must_stop_for_vehicle(&vs[0], &vs));

        let vs = snapshots(&[(0.0, 0.0, Heading::East), (20.0, 10.0, Heading::East)]);
        assert!(must_stop_for_vehicle(&vs[0], &vs));
    }

    #[test]
    fn forward_is_relative_to_heading() {
        let vs = snapshots(&[(0.0, 100.0, Heading::North), (0.0, 70.0, Heading::North)]);
        assert!(must_stop_for_vehicle(&vs[0], &vs));
        assert!(!must_stop_for_vehicle(&vs[1], &vs));

        let vs = snapshots(&[(100.0, 0.0, Heading::West), (80.0, 0.0, Heading::West)]);
        assert!(must_stop_for_vehicle(&vs[0], &vs));
    }

    #[test]
    fn overlapping_vehicles_do_not_block() {
        let vs = snapshots(&[(0.0, 0.0, Heading::South), (0.0, 0.0, Heading::South)]);
        assert!(!must_stop_for_vehicle(&vs[0], &vs));
    }
}
