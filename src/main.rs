use std::thread;
use std::time::Instant;

use clap::{AppSettings, Clap};
use core_affinity::CoreId;
use log::{debug, error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;

use slabflow::advection::RADIUS;
use slabflow::field::Field3;
use slabflow::mesh::{Decomposition, Mesh};
use slabflow::message::comm::Communicator;
use slabflow::message::local::{channel_mesh, ChannelCommunicator};
use slabflow::output;
use slabflow::report::{Summary, Timings};
use slabflow::solver::{Solver, WorkShape};

#[derive(Debug, Clap)]
#[clap(version = "0.1.0")]
#[clap(setting = AppSettings::ColoredHelp)]
struct Opts {
    /// Simulation end time
    t_end: f64,

    /// CFL stability number
    cfl: f64,

    /// Domain length (x)
    length: f64,

    /// Domain width (y)
    width: f64,

    /// Domain height (z)
    height: f64,

    /// Number of cells in the x-direction
    nx: usize,

    /// Number of cells in the y-direction
    ny: usize,

    /// Number of cells in the z-direction
    nz: usize,

    /// Work-unit size in the i-direction
    block_x: usize,

    /// Work-unit size in the j-direction
    block_y: usize,

    /// Work-unit size in the k-direction
    block_z: usize,

    /// Number of ranks to decompose the z-axis over
    #[clap(short = 'r', long, default_value = "1")]
    ranks: usize,
}

#[derive(Clone, Copy)]
struct Config {
    t_end: f64,
    cfl: f64,
    shape: WorkShape,
}

/// The initial profile: a smooth pulse centered in the domain, scaled to
/// the unit amplitude the CFL condition assumes. Evaluated over the padded
/// global index space, so the outermost ghost layers hold boundary values
/// that stay frozen for the whole run.
///
fn initial_value(mesh: &Mesh, i: usize, j: usize, k: usize) -> f64 {
    let (dx, dy, dz) = mesh.cell_spacing();
    let (l, w, h) = mesh.extent;
    let x = i as f64 * dx;
    let y = j as f64 * dy;
    let z = (k as f64 - RADIUS as f64) * dz;
    let r2 = (x - 0.5 * l).powi(2) + (y - 0.5 * w).powi(2) + (z - 0.5 * h).powi(2);
    f64::exp(-100.0 * r2 / (l * l + w * w + h * h))
}

fn main() {
    SimpleLogger::new().with_level(LevelFilter::Info).init().unwrap();
    let opts = Opts::parse();

    let mesh = Mesh {
        extent: (opts.length, opts.width, opts.height),
        size: (opts.nx, opts.ny, opts.nz),
    };
    let config = Config {
        t_end: opts.t_end,
        cfl: opts.cfl,
        shape: WorkShape {
            block: (opts.block_x, opts.block_y, opts.block_z),
        },
    };

    // Fail on unsupported decompositions before any rank spins up.
    if let Err(e) = Decomposition::new(opts.nz, opts.ranks, 0) {
        error!("{}", e);
        std::process::exit(1);
    }

    let (dx, dy, dz) = mesh.cell_spacing();
    info!("dx: {:.6}, dy: {:.6}, dz: {:.6}, final time: {}", dx, dy, dz, opts.t_end);

    let cores = core_affinity::get_core_ids().unwrap_or_default();
    if cores.len() < opts.ranks {
        warn!(
            "{} ranks on {} cores; ranks will share cores",
            opts.ranks,
            cores.len()
        );
    }

    let procs: Vec<_> = channel_mesh(opts.ranks)
        .into_iter()
        .map(|comm| {
            let core = if cores.is_empty() {
                None
            } else {
                Some(cores[comm.rank() % cores.len()])
            };
            thread::spawn(move || run_rank(comm, mesh, config, core))
        })
        .collect();

    for process in procs {
        process.join().unwrap();
    }
}

fn run_rank(comm: ChannelCommunicator, mesh: Mesh, config: Config, core: Option<CoreId>) {
    if let Some(core) = core {
        core_affinity::set_for_current(core);
    }
    let rank = comm.rank();
    let dec = match Decomposition::new(mesh.size.2, comm.size(), rank) {
        Ok(dec) => dec,
        Err(e) => {
            error!("rank {}: {}", rank, e);
            std::process::exit(1);
        }
    };

    // Every rank evaluates the same deterministic profile over the full
    // padded grid and cuts out its own slab, so initialization needs no
    // scatter traffic.
    let global = Field3::from_function(mesh.size.0, mesh.size.1, mesh.padded_nz(), |i, j, k| {
        initial_value(&mesh, i, j, k)
    });
    debug!("domain initialized on rank {}", rank);

    if rank == 0 {
        if let Err(e) = output::save_scalar_field(&global, "initial.bin") {
            error!("could not write initial.bin: {}", e);
            std::process::exit(1);
        }
        info!("initial condition saved by rank {}", rank);
    }

    let mut timings = Timings::default();

    comm.barrier();
    let clock = Instant::now();
    let origin = dec.origin();
    let sub = Field3::from_data(
        mesh.size.0,
        mesh.size.1,
        dec.padded(),
        global.extract_k(origin..origin + dec.padded()),
    );
    comm.barrier();
    timings.load = clock.elapsed().as_secs_f64();
    debug!("subdomain {} initialized", rank);

    let mut solver = Solver::new(comm, mesh, dec, config.cfl, config.shape, sub);

    solver.communicator().barrier();
    let clock = Instant::now();
    let stats = solver.run(config.t_end);
    solver.communicator().barrier();
    timings.compute = clock.elapsed().as_secs_f64();

    if rank == 0 {
        info!(
            "dt: {:.6}, iterations: {}, final time: {:.6}",
            stats.last_dt, stats.steps, stats.time
        );
    }

    let clock = Instant::now();
    if rank == 0 {
        let mut merged = global;
        solver.merge_results(&mut merged);
        timings.gather = clock.elapsed().as_secs_f64();

        if let Err(e) = output::save_scalar_field(&merged, "result.bin") {
            error!("could not write result.bin: {}", e);
            std::process::exit(1);
        }
        Summary {
            title: String::from("slabflow: Burgers-3D WENO5 / SSP-RK3"),
            size: (mesh.size.0, mesh.size.1, mesh.padded_nz()),
            steps: stats.steps,
            last_dt: stats.last_dt,
            time: stats.time,
            timings,
        }
        .print();
    } else {
        solver.send_result();
    }
}
