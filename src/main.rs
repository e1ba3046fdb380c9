use serde_json::json;
use signal_grid::{Axis, Command, GridAttributes, Simulation};
use std::time::Instant;

/// Frames per simulated second.
const FRAME_RATE: f64 = 60.0;

/// Simulated seconds to run for.
const DURATION: f64 = 120.0;

fn main() {
    env_logger::init();

    let mut sim = Simulation::new(&GridAttributes {
        rows: 2,
        cols: 3,
        ..Default::default()
    });

    let dt = 1.0 / FRAME_RATE;
    let num_frames = (DURATION * FRAME_RATE) as usize;
    let start = Instant::now();

    for frame in 0..num_frames {
        if frame == num_frames / 2 {
            println!("Switching to adaptive mode");
            sim.send(Command::SetModeAll(true));
        }
        sim.step(dt);
        if frame % (10 * FRAME_RATE as usize) == 0 {
            print_status(&sim);
        }
    }
    print_status(&sim);

    println!(
        "Simulated {} frames in {:?} ({} vehicles remaining)",
        num_frames,
        start.elapsed(),
        sim.iter_vehicles().count()
    );
}

fn print_status(sim: &Simulation) {
    for (_, intersection) in sim.coordinator().iter() {
        let sensors = intersection
            .sensors()
            .map(|s| {
                json!({
                    "id": s.id(),
                    "queue": s.queue_length(),
                    "total": s.total_vehicles(),
                    "flow": s.flow_rate(),
                    "congestion": s.congestion_level().label(),
                })
            })
            .collect::<Vec<_>>();
        let status = json!({
            "frame": sim.frame(),
            "name": intersection.name(),
            "adaptive": intersection.is_adaptive(),
            "phase": format!("{:?}", intersection.phase()),
            "timer": intersection.phase_timer(),
            "ns": intersection.color(Axis::NorthSouth).map(|c| format!("{:?}", c)),
            "ew": intersection.color(Axis::EastWest).map(|c| format!("{:?}", c)),
            "sensors": sensors,
        });
        println!("{}", status);
    }
}
