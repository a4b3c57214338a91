//! Simulation loop tests

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use congestion_sim::simulation::{
    AdmissionError, Cell, CityGrid, CsvHistorySink, HistorySink, MemoryHistorySink, Path, SimConfig, SimWorld,
    StalePathPolicy, Vehicle, VehicleId, VehicleStatus,
};

fn default_world() -> SimWorld {
    SimWorld::from_config(SimConfig::default()).expect("default config is valid")
}

/// Run the default scenario once and check every per-tick invariant on the
/// emitted history
#[test]
fn test_history_invariants_hold_every_tick() {
    let mut world = default_world();
    let initial = world.vehicles().len();
    assert!(world
        .vehicles()
        .iter()
        .all(|v| v.is_moving() && v.distance_to_dest > 0));

    let mut sink = MemoryHistorySink::new();
    let summary = world.run(&mut sink).unwrap();
    assert!(sink.is_finished());

    let mut last_status: HashMap<VehicleId, VehicleStatus> = HashMap::new();
    for tick in 0..summary.ticks_run {
        let rows: Vec<_> = sink.rows_for_tick(tick).collect();
        let moving = rows.iter().filter(|r| r.status == VehicleStatus::Moving).count();
        let arrived = rows.iter().filter(|r| r.status == VehicleStatus::Arrived).count();
        assert_eq!(moving + arrived, rows.len());

        let expected = if tick >= world.config().rush_hour_tick {
            initial + world.config().rush_hour_batch_size
        } else {
            initial
        };
        assert_eq!(rows.len(), expected, "row count at tick {}", tick);

        for row in rows {
            let vehicle = &world.vehicles()[row.vehicle_id.0];
            assert_eq!(
                row.distance_to_dest,
                row.cell().manhattan(&vehicle.destination()),
                "distance drifted for vehicle {} at tick {}",
                row.vehicle_id,
                tick
            );
            if last_status.get(&row.vehicle_id) == Some(&VehicleStatus::Arrived) {
                assert_eq!(row.status, VehicleStatus::Arrived, "status reverted");
            }
            last_status.insert(row.vehicle_id, row.status);
        }
    }

    assert_eq!(summary.total_vehicles, world.vehicles().len());
    assert_eq!(summary.arrived + summary.still_moving, summary.total_vehicles);
}

#[test]
fn test_runs_are_reproducible() {
    let mut first = default_world();
    let mut second = default_world();

    let a = first.run(&mut MemoryHistorySink::new()).unwrap();
    let b = second.run(&mut MemoryHistorySink::new()).unwrap();

    assert_eq!(a, b);
    let positions = |world: &SimWorld| -> Vec<Cell> {
        world.vehicles().iter().map(|v| v.position()).collect()
    };
    assert_eq!(positions(&first), positions(&second));
}

#[test]
fn test_rush_hour_injects_batch_once() {
    let config = SimConfig {
        rush_hour_tick: 3,
        rush_hour_batch_size: 12,
        max_ticks: 50,
        ..SimConfig::default()
    };
    let mut world = SimWorld::from_config(config).unwrap();
    let mut sink = MemoryHistorySink::new();

    for _ in 0..3 {
        assert_eq!(world.tick(&mut sink).unwrap().spawned, 0);
    }
    let before = world.vehicles().len();
    let max_id_before = world.vehicles().iter().map(|v| v.id).max().unwrap();

    let report = world.tick(&mut sink).unwrap();
    assert_eq!(report.tick, 3);
    assert_eq!(report.spawned, 12);
    assert!(world.rush_hour_fired());
    assert_eq!(world.vehicles().len(), before + 12);
    for vehicle in &world.vehicles()[before..] {
        assert!(vehicle.id > max_id_before);
    }

    // Revisiting the rush-hour tick must not inject again.
    world.set_current_tick(3);
    let report = world.tick(&mut sink).unwrap();
    assert_eq!(report.spawned, 0);
    assert_eq!(world.vehicles().len(), before + 12);
}

#[test]
fn test_rush_hour_vehicles_routed_on_repath_tick() {
    let config = SimConfig {
        rush_hour_tick: 5,
        repath_interval: 5,
        ..SimConfig::default()
    };
    let mut world = SimWorld::from_config(config).unwrap();
    let mut sink = MemoryHistorySink::new();

    for _ in 0..=5 {
        world.tick(&mut sink).unwrap();
    }

    let newcomers: Vec<&Vehicle> = world.vehicles().iter().filter(|v| v.id.0 >= 100).collect();
    assert_eq!(newcomers.len(), 30);
    let routed = newcomers
        .iter()
        .filter(|v| world.path_cache().contains(v.id))
        .count();
    assert!(routed > 0, "rush-hour vehicles were not routed");
}

/// Small open city with a short trip: the loop stops as soon as nothing moves
#[test]
fn test_stops_early_when_everyone_arrives() {
    let grid = CityGrid::open(5).unwrap();
    let vehicles = vec![
        Vehicle::new(VehicleId(0), Cell::new(0, 0), Cell::new(4, 4), 1),
        Vehicle::new(VehicleId(1), Cell::new(4, 0), Cell::new(4, 2), 1),
    ];
    let config = SimConfig {
        grid_size: 5,
        max_ticks: 100,
        rush_hour_tick: 50,
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(grid, vehicles, config, StdRng::seed_from_u64(0)).unwrap();
    let mut sink = MemoryHistorySink::new();

    let summary = world.run(&mut sink).unwrap();

    assert_eq!(summary.ticks_run, 8);
    assert_eq!(summary.arrived, 2);
    assert_eq!(summary.still_moving, 0);
    assert_eq!(summary.shortest_trip, Some(2));
    assert_eq!(summary.longest_trip, Some(8));
    assert_eq!(summary.avg_trip_ticks, Some(5.0));
    assert!(!world.rush_hour_fired());
    assert!(world.is_finished());
    assert!(sink.is_finished());
    assert_eq!(sink.rows().len(), 16);
}

fn small_config() -> SimConfig {
    SimConfig {
        grid_size: 5,
        rush_hour_tick: 100,
        ..SimConfig::default()
    }
}

/// A vehicle that starts at its destination never enters the population
#[test]
fn test_start_at_destination_is_excluded() {
    let grid = CityGrid::open(5).unwrap();
    let vehicles = vec![
        Vehicle::new(VehicleId(0), Cell::new(2, 2), Cell::new(2, 2), 1),
        Vehicle::new(VehicleId(1), Cell::new(0, 0), Cell::new(0, 3), 1),
    ];
    let mut world =
        SimWorld::new(grid, vehicles, small_config(), StdRng::seed_from_u64(0)).unwrap();

    assert_eq!(world.vehicles().len(), 1);
    assert_eq!(world.vehicles()[0].id, VehicleId(1));
    assert!(world
        .vehicles()
        .iter()
        .all(|v| v.is_moving() && v.distance_to_dest > 0));

    let mut sink = MemoryHistorySink::new();
    let summary = world.run(&mut sink).unwrap();

    assert_eq!(summary.total_vehicles, 1);
    assert_eq!(summary.arrived, 1);
    assert_eq!(summary.shortest_trip, Some(3));
    assert!(sink.rows().iter().all(|row| row.vehicle_id == VehicleId(1)));
    assert_eq!(sink.rows().len(), 3);
}

#[test]
fn test_vehicle_outside_grid_is_rejected() {
    let grid = CityGrid::open(5).unwrap();
    let vehicles = vec![Vehicle::new(VehicleId(0), Cell::new(7, 0), Cell::new(0, 0), 1)];

    let err = SimWorld::new(grid, vehicles, small_config(), StdRng::seed_from_u64(0))
        .err()
        .expect("off-grid start must be refused");

    assert_eq!(
        err.downcast_ref::<AdmissionError>(),
        Some(&AdmissionError::OutOfGrid {
            id: VehicleId(0),
            what: "start",
            cell: Cell::new(7, 0),
            size: 5,
        })
    );
}

#[test]
fn test_destination_outside_grid_is_rejected() {
    let grid = CityGrid::open(5).unwrap();
    let vehicles = vec![Vehicle::new(VehicleId(0), Cell::new(0, 0), Cell::new(0, 5), 1)];

    let err = SimWorld::new(grid, vehicles, small_config(), StdRng::seed_from_u64(0))
        .err()
        .expect("off-grid destination must be refused");

    assert!(matches!(
        err.downcast_ref::<AdmissionError>(),
        Some(AdmissionError::OutOfGrid {
            what: "destination",
            ..
        })
    ));
}

#[test]
fn test_non_dense_ids_are_rejected() {
    let grid = CityGrid::open(5).unwrap();
    let vehicles = vec![
        Vehicle::new(VehicleId(0), Cell::new(0, 0), Cell::new(4, 4), 1),
        Vehicle::new(VehicleId(2), Cell::new(1, 0), Cell::new(4, 4), 1),
    ];

    let err = SimWorld::new(grid, vehicles, small_config(), StdRng::seed_from_u64(0))
        .err()
        .expect("gap in ids must be refused");

    assert_eq!(
        err.downcast_ref::<AdmissionError>(),
        Some(&AdmissionError::NonDenseId {
            index: 1,
            id: VehicleId(2),
        })
    );
}

/// A walled-in vehicle stalls forever without aborting the run
#[test]
fn test_unreachable_destination_stalls() {
    let grid = CityGrid::parse(
        "
        .....
        ..#..
        .#.#.
        ..#..
        .....
        ",
    )
    .unwrap();
    let vehicles = vec![
        Vehicle::new(VehicleId(0), Cell::new(0, 0), Cell::new(2, 2), 1),
        Vehicle::new(VehicleId(1), Cell::new(0, 0), Cell::new(4, 0), 1),
    ];
    let config = SimConfig {
        grid_size: 5,
        max_ticks: 20,
        rush_hour_tick: 100,
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(grid, vehicles, config, StdRng::seed_from_u64(0)).unwrap();

    let summary = world.run(&mut MemoryHistorySink::new()).unwrap();

    assert_eq!(summary.ticks_run, 20);
    assert_eq!(summary.arrived, 1);
    let stuck = &world.vehicles()[0];
    assert!(stuck.is_moving());
    assert_eq!(stuck.position(), Cell::new(0, 0));
    assert_eq!(stuck.ticks_traveled, 20);
    assert!(!world.path_cache().contains(VehicleId(0)));
}

#[test]
fn test_empty_population_terminates_immediately() {
    let grid = CityGrid::open(5).unwrap();
    let config = SimConfig {
        grid_size: 5,
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(grid, Vec::new(), config, StdRng::seed_from_u64(0)).unwrap();
    let mut sink = MemoryHistorySink::new();

    let summary = world.run(&mut sink).unwrap();

    assert_eq!(summary.ticks_run, 1);
    assert_eq!(summary.total_vehicles, 0);
    assert!(sink.rows().is_empty());
    assert_eq!(summary.busiest_tick, None);
    assert_eq!(summary.hotspot, None);
}

/// An off-path vehicle holds for one tick, is repathed on the next tick and
/// then carries on
#[test]
fn test_off_path_vehicle_is_repathed_next_tick() {
    let grid = CityGrid::open(5).unwrap();
    let vehicles = vec![Vehicle::new(VehicleId(0), Cell::new(0, 4), Cell::new(4, 4), 1)];
    let config = SimConfig {
        grid_size: 5,
        repath_interval: 100,
        rush_hour_tick: 100,
        stale_path_policy: StalePathPolicy::HoldAndRepath,
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(grid, vehicles, config, StdRng::seed_from_u64(0)).unwrap();
    let mut sink = MemoryHistorySink::new();

    // Tick 0 routes everyone; replace the route with one that misses the
    // vehicle's cell before tick 1.
    world.tick(&mut sink).unwrap();
    assert_eq!(world.vehicles()[0].position(), Cell::new(1, 4));
    world.path_cache_mut().insert(
        VehicleId(0),
        Path::new((0..5).map(|x| Cell::new(x, 0)).collect()),
    );

    let report = world.tick(&mut sink).unwrap();
    assert_eq!(report.motion.held, 1);
    assert_eq!(world.vehicles()[0].position(), Cell::new(1, 4));
    assert!(!world.path_cache().contains(VehicleId(0)));

    let report = world.tick(&mut sink).unwrap();
    assert!(!report.repathed);
    assert_eq!(report.motion.moved, 1);
    assert_eq!(world.vehicles()[0].position(), Cell::new(2, 4));
}

#[test]
fn test_snapshot_congestion_is_pre_move() {
    let grid = CityGrid::open(4).unwrap();
    let vehicles = vec![
        Vehicle::new(VehicleId(0), Cell::new(0, 0), Cell::new(3, 0), 1),
        Vehicle::new(VehicleId(1), Cell::new(1, 0), Cell::new(1, 3), 1),
    ];
    let config = SimConfig {
        grid_size: 4,
        rush_hour_tick: 100,
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(grid, vehicles, config, StdRng::seed_from_u64(0)).unwrap();
    let mut sink = MemoryHistorySink::new();

    world.tick(&mut sink).unwrap();

    // Vehicle 0 moved onto (1, 0), where vehicle 1 stood before the tick.
    let row = sink.rows()[0];
    assert_eq!(row.cell(), Cell::new(1, 0));
    assert_eq!(row.local_congestion, 1);
    let row = sink.rows()[1];
    assert_eq!(row.cell(), Cell::new(1, 1));
    assert_eq!(row.local_congestion, 0);
}

#[test]
fn test_csv_history_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");

    let grid = CityGrid::open(3).unwrap();
    let vehicles = vec![Vehicle::new(VehicleId(0), Cell::new(0, 0), Cell::new(2, 0), 2)];
    let config = SimConfig {
        grid_size: 3,
        rush_hour_tick: 100,
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(grid, vehicles, config, StdRng::seed_from_u64(0)).unwrap();
    let mut sink = CsvHistorySink::create(&path).unwrap();

    world.run(&mut sink).unwrap();
    assert_eq!(sink.rows_written(), 2);
    sink.finish().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(
        lines,
        vec![
            "tick,car_id,x,y,status,ticks_traveled,distance_to_dest,speed,local_congestion",
            "0,0,1,0,moving,1,1,2,0",
            "1,0,2,0,arrived,2,0,2,0",
        ]
    );
}
