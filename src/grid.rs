//! The grid of roads the intersections sit on.
//!
//! The layout turns vehicle positions into the inputs the signal controllers
//! need: queue counts per detection zone, the stop line each vehicle is
//! approaching, and where vehicles enter and leave the world.

use crate::intersection::Axis;
use crate::math::Point2d;
use crate::vehicle::{Behavior, Heading, TurnGeometry, Vehicle, VEHICLE_LENGTH};
use arrayvec::ArrayVec;
use itertools::iproduct;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The attributes of a grid of intersections.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridAttributes {
    /// The number of east-west roads.
    pub rows: usize,
    /// The number of north-south roads.
    pub cols: usize,
    /// The width of every road.
    pub road_width: f64,
    /// The size of the blocks between roads.
    pub tile: f64,
    /// The width of the visible world.
    pub world_width: f64,
    /// The height of the visible world.
    pub world_height: f64,
    /// How far before an intersection vehicles are counted.
    pub detection_range: f64,
    /// The gap between a stop line and the intersection.
    pub stop_gap: f64,
    /// The lateral distance within which a vehicle is considered in a lane.
    pub lane_match: f64,
    /// Signals further away than this are not yet visible to a vehicle.
    pub light_range: f64,
    /// How far outside the world a vehicle may go before it is removed.
    pub despawn_margin: f64,
    /// How far outside the world vehicles are spawned.
    pub spawn_offset: f64,
    /// Whether vehicles are spawned automatically.
    pub auto_spawn: bool,
    /// The time between spawns by day, in s.
    pub day_spawn_interval: f64,
    /// The time between spawns by night, in s.
    pub night_spawn_interval: f64,
    /// The slowest cruising speed of a spawned vehicle.
    pub min_speed: f64,
    /// The fastest cruising speed of a spawned vehicle.
    pub max_speed: f64,
    /// Seeds the spawn generator, for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for GridAttributes {
    fn default() -> Self {
        Self {
            rows: 1,
            cols: 1,
            road_width: 80.0,
            tile: 140.0,
            world_width: 1000.0,
            world_height: 900.0,
            detection_range: 120.0,
            stop_gap: 10.0,
            lane_match: 25.0,
            light_range: 140.0,
            despawn_margin: 200.0,
            spawn_offset: 50.0,
            auto_spawn: true,
            day_spawn_interval: 1.0,
            night_spawn_interval: 3.0,
            min_speed: 150.0,
            max_speed: 220.0,
            seed: None,
        }
    }
}

/// The stop line a vehicle is approaching.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Approach {
    /// The index of the intersection.
    pub index: usize,
    /// The distance to the stop line.
    pub stop_distance: f64,
}

/// The placement of a grid of intersections in world space.
#[derive(Clone, Debug)]
pub struct GridLayout {
    attributes: GridAttributes,
    /// The top-left corner of the first intersection.
    origin: Point2d,
}

impl GridLayout {
    /// Centres a grid in the world.
    pub fn new(attributes: &GridAttributes) -> Self {
        let a = attributes;
        let spacing = a.road_width + a.tile;
        let width = a.cols as f64 * spacing - a.tile;
        let height = a.rows as f64 * spacing - a.tile;
        Self {
            attributes: a.clone(),
            origin: Point2d::new(
                0.5 * (a.world_width - width),
                0.5 * (a.world_height - height),
            ),
        }
    }

    pub fn attributes(&self) -> &GridAttributes {
        &self.attributes
    }

    /// The distance between neighbouring intersections.
    pub fn spacing(&self) -> f64 {
        self.attributes.road_width + self.attributes.tile
    }

    /// The number of intersections.
    pub fn len(&self) -> usize {
        self.attributes.rows * self.attributes.cols
    }

    /// Whether the grid has no intersections.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The row and column of every intersection, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        iproduct!(0..self.attributes.rows, 0..self.attributes.cols)
    }

    /// The top-left corner of an intersection's road box.
    pub fn intersection_origin(&self, index: usize) -> Point2d {
        let cols = self.attributes.cols.max(1);
        self.road_origin(index / cols, index % cols)
    }

    /// The top-left corner of the north-south road in column `col`
    /// and the east-west road in row `row`.
    fn road_origin(&self, row: usize, col: usize) -> Point2d {
        Point2d::new(
            self.origin.x + col as f64 * self.spacing(),
            self.origin.y + row as f64 * self.spacing(),
        )
    }

    /// Where a vehicle with the given behavior enters the world on the given row or column.
    pub fn spawn_point(&self, behavior: Behavior, row: usize, col: usize) -> Point2d {
        let a = &self.attributes;
        let road = self.road_origin(row, col);
        let heading = behavior.heading();
        let lane = heading.lane_offset();
        match heading {
            Heading::South => Point2d::new(road.x + lane, -a.spawn_offset),
            Heading::North => Point2d::new(road.x + lane, a.world_height + a.spawn_offset),
            Heading::West => Point2d::new(a.world_width + a.spawn_offset, road.y + lane),
            Heading::East => Point2d::new(-a.spawn_offset, road.y + lane),
        }
    }

    /// Every spawn point on the given row and column.
    pub fn spawn_points(&self, row: usize, col: usize) -> ArrayVec<(Behavior, Point2d), 6> {
        Behavior::ALL
            .iter()
            .map(|b| (*b, self.spawn_point(*b, row, col)))
            .collect()
    }

    /// Whether a vehicle has left the world.
    pub fn has_exited(&self, pos: Point2d) -> bool {
        let a = &self.attributes;
        let m = a.despawn_margin;
        pos.x < -m || pos.x > a.world_width + m || pos.y < -m || pos.y > a.world_height + m
    }

    /// Whether the lateral position `lat` is in the lane of `heading` on a
    /// road whose near edge is at `edge`.
    fn in_lane(&self, lat: f64, edge: f64, heading: Heading) -> bool {
        (lat - (edge + heading.lane_offset())).abs() < self.attributes.lane_match
    }

    /// The detection zone of the intersection at `index` that the vehicle is in, if any.
    pub fn detection_zone(&self, index: usize, vehicle: &Vehicle) -> Option<Axis> {
        let a = &self.attributes;
        let o = self.intersection_origin(index);
        let p = vehicle.position();
        let heading = vehicle.heading();
        let (dist, lat, edge) = match heading {
            Heading::South => (o.y - p.y, p.x, o.x),
            Heading::North => (p.y - (o.y + a.road_width), p.x, o.x),
            Heading::East => (o.x - p.x, p.y, o.y),
            Heading::West => (p.x - (o.x + a.road_width), p.y, o.y),
        };
        let inside = dist > 0.0 && dist < a.detection_range && self.in_lane(lat, edge, heading);
        inside.then(|| heading.axis())
    }

    /// The stop line ahead of the vehicle at the intersection at `index`, if it
    /// is in that intersection's lane and has not yet passed the line.
    fn stop_distance(&self, index: usize, vehicle: &Vehicle) -> Option<f64> {
        let a = &self.attributes;
        let o = self.intersection_origin(index);
        let p = vehicle.position();
        let heading = vehicle.heading();
        let dist = match heading {
            Heading::East if p.x < o.x => (o.x - a.stop_gap - VEHICLE_LENGTH) - p.x,
            Heading::West if p.x > o.x + a.road_width => p.x - (o.x + a.road_width + a.stop_gap),
            Heading::South if p.y < o.y => (o.y - a.stop_gap - VEHICLE_LENGTH) - p.y,
            Heading::North if p.y > o.y + a.road_width => p.y - (o.y + a.road_width + a.stop_gap),
            _ => return None,
        };
        let (lat, edge) = match heading.axis() {
            Axis::EastWest => (p.y, o.y),
            Axis::NorthSouth => (p.x, o.x),
        };
        (self.in_lane(lat, edge, heading) && dist >= 0.0).then(|| dist)
    }

    /// The nearest stop line ahead of the vehicle.
    pub fn approach(&self, vehicle: &Vehicle) -> Option<Approach> {
        (0..self.len())
            .filter_map(|index| {
                self.stop_distance(index, vehicle)
                    .map(|stop_distance| Approach { index, stop_distance })
            })
            .min_by(|a, b| a.stop_distance.total_cmp(&b.stop_distance))
    }

    /// The intersection a turning vehicle will turn at next.
    pub fn next_turn(&self, vehicle: &Vehicle) -> Option<TurnGeometry> {
        let a = &self.attributes;
        let p = vehicle.position();
        let heading = vehicle.heading();
        let candidates = (0..self.len())
            .map(|index| self.intersection_origin(index))
            .filter(|o| self.in_lane(p.y, o.y, heading));
        let x = match heading {
            // Front not yet past the far edge.
            Heading::East => candidates
                .map(|o| o.x)
                .filter(|x| p.x + VEHICLE_LENGTH < x + a.road_width)
                .min_by(f64::total_cmp),
            Heading::West => candidates
                .map(|o| o.x)
                .filter(|x| p.x > *x)
                .max_by(f64::total_cmp),
            Heading::South | Heading::North => None,
        }?;
        Some(TurnGeometry {
            x,
            road_width: a.road_width,
        })
    }
}
