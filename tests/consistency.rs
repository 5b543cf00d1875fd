//! End-to-end checks that the decomposed solver reproduces the single-rank
//! trajectory: the physics must not depend on how many ranks the z-axis is
//! cut into.

use std::thread;

use slabflow::advection::RADIUS;
use slabflow::field::Field3;
use slabflow::mesh::{Decomposition, Mesh};
use slabflow::message::comm::Communicator;
use slabflow::message::local::channel_mesh;
use slabflow::solver::{RunStats, Solver, WorkShape};

fn pulse(mesh: &Mesh, i: usize, j: usize, k: usize) -> f64 {
    let (dx, dy, dz) = mesh.cell_spacing();
    let (l, w, h) = mesh.extent;
    let x = i as f64 * dx;
    let y = j as f64 * dy;
    let z = (k as f64 - RADIUS as f64) * dz;
    let r2 = (x - 0.5 * l).powi(2) + (y - 0.5 * w).powi(2) + (z - 0.5 * h).powi(2);
    f64::exp(-100.0 * r2 / (l * l + w * w + h * h))
}

fn global_initial(mesh: &Mesh) -> Field3 {
    Field3::from_function(mesh.size.0, mesh.size.1, mesh.padded_nz(), |i, j, k| {
        pulse(mesh, i, j, k)
    })
}

/// Run the full pipeline on `ranks` in-process ranks and return the merged
/// global field from the coordinator, together with its run statistics.
///
fn run_case(ranks: usize, mesh: Mesh, t_end: f64, cfl: f64) -> (Field3, RunStats) {
    let procs: Vec<_> = channel_mesh(ranks)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let dec = Decomposition::new(mesh.size.2, comm.size(), comm.rank()).unwrap();

                let global = global_initial(&mesh);
                let origin = dec.origin();
                let sub = Field3::from_data(
                    mesh.size.0,
                    mesh.size.1,
                    dec.padded(),
                    global.extract_k(origin..origin + dec.padded()),
                );

                let mut solver = Solver::new(comm, mesh, dec, cfl, WorkShape::default(), sub);
                let stats = solver.run(t_end);

                if solver.decomposition().rank == 0 {
                    let mut merged = global;
                    solver.merge_results(&mut merged);
                    Some((merged, stats))
                } else {
                    solver.send_result();
                    None
                }
            })
        })
        .collect();

    procs
        .into_iter()
        .filter_map(|p| p.join().unwrap())
        .next()
        .unwrap()
}

fn max_abs_difference(a: &Field3, b: &Field3) -> f64 {
    assert_eq!(a.data().len(), b.data().len());
    a.data()
        .iter()
        .zip(b.data())
        .fold(0.0_f64, |m, (x, y)| m.max((x - y).abs()))
}

fn test_mesh() -> Mesh {
    Mesh {
        extent: (1.0, 1.0, 1.0),
        size: (16, 16, 16),
    }
}

/// Four ranks need six physical layers each to keep the exchange edges
/// disjoint, so the four-way case runs on a taller z-axis.
fn tall_mesh() -> Mesh {
    Mesh {
        extent: (1.0, 1.0, 1.5),
        size: (16, 16, 24),
    }
}

#[test]
fn the_trajectory_does_not_depend_on_the_rank_count() {
    let mesh = test_mesh();
    let (serial, stats1) = run_case(1, mesh, 0.25, 0.4);
    let (two, stats2) = run_case(2, mesh, 0.25, 0.4);

    assert_eq!(stats1.steps, 10);
    assert_eq!(stats2.steps, 10);
    assert!(max_abs_difference(&serial, &two) < 1e-6);
}

#[test]
fn four_way_decompositions_reproduce_the_serial_trajectory_too() {
    let mesh = tall_mesh();
    let (serial, _) = run_case(1, mesh, 0.25, 0.4);
    let (two, _) = run_case(2, mesh, 0.25, 0.4);
    let (four, _) = run_case(4, mesh, 0.25, 0.4);

    assert!(max_abs_difference(&serial, &two) < 1e-6);
    assert!(max_abs_difference(&serial, &four) < 1e-6);
}

#[test]
fn the_final_step_lands_exactly_on_the_end_time() {
    let mesh = test_mesh();
    let (_, stats) = run_case(2, mesh, 0.25, 0.4);

    assert_eq!(stats.time, 0.25);
    assert!(stats.last_dt > 0.0);
    assert!(stats.last_dt <= 0.4 / 15.0 + 1e-15);
}

#[test]
fn a_zero_length_run_reproduces_the_initial_condition_through_the_gather() {
    let mesh = tall_mesh();
    let (merged, stats) = run_case(4, mesh, 0.0, 0.4);

    assert_eq!(stats.steps, 0);
    assert_eq!(max_abs_difference(&merged, &global_initial(&mesh)), 0.0);
}

#[test]
fn the_initial_condition_file_has_one_entry_per_padded_cell() {
    let mesh = test_mesh();
    let path = std::env::temp_dir().join("slabflow_initial_entries.bin");

    slabflow::output::save_scalar_field(&global_initial(&mesh), &path).unwrap();
    let bytes = std::fs::metadata(&path).unwrap().len();
    assert_eq!(
        bytes,
        (mesh.size.0 * mesh.size.1 * (mesh.size.2 + 2 * RADIUS) * 8) as u64
    );
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn something_actually_happens_when_time_passes() {
    let mesh = test_mesh();
    let (merged, _) = run_case(2, mesh, 0.25, 0.4);

    let difference = max_abs_difference(&merged, &global_initial(&mesh));
    assert!(difference > 1e-3);
    assert!(merged.data().iter().all(|x| x.is_finite()));
}
