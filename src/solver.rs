use log::debug;

use crate::advection::{self, Axis, RADIUS};
use crate::field::{Field3, SlabMut};
use crate::halo::HaloLink;
use crate::mesh::{Decomposition, Mesh, Placement};
use crate::message::comm::{Communicator, Tag};
use crate::rk::{self, StepControl};


/**
 * The bound on |u| the initial profile is scaled to; the CFL condition is
 * evaluated against it.
 */
const REFERENCE_WAVE_SPEED: f64 = 1.0;




#[derive(Clone, Copy, Debug)]

/**
 * Sizing of the units of concurrent work, taken from the launcher's block
 * arguments. The z block is the thickness the interior slab is split into
 * for the worker queues; the block volume sizes the chunks of the stage
 * combine. Neither affects the computed solution.
 */
pub struct WorkShape {
    pub block: (usize, usize, usize),
}

impl WorkShape {
    pub fn slab_thickness(&self) -> usize {
        self.block.2.max(1)
    }

    pub fn combine_chunk(&self) -> usize {
        (self.block.0 * self.block.1 * self.block.2).max(1)
    }
}

impl Default for WorkShape {
    fn default() -> Self {
        Self { block: (16, 16, 4) }
    }
}




#[derive(Clone, Copy, Debug)]

/**
 * What a completed run did.
 */
pub struct RunStats {
    pub steps: usize,
    pub time: f64,
    pub last_dt: f64,
}




/**
 * One rank's share of the time integration: the subdomain state fields,
 * the exchange links toward whichever neighbors exist, and the stage
 * machinery that overlaps boundary computation and traffic with the
 * interior sweep.
 */
pub struct Solver<C> {
    comm: C,
    mesh: Mesh,
    dec: Decomposition,
    shape: WorkShape,
    control: StepControl,
    state: Field3,
    snapshot: Field3,
    rate: Field3,
    left: Option<HaloLink>,
    right: Option<HaloLink>,
}




/**
 * The per-stage decomposition of the rate field into disjoint mutable
 * slabs: ghost layers on the outside, exchange edges where a neighbor
 * exists, and the interior between them. Splitting the one allocation is
 * what lets the boundary and interior work items run concurrently without
 * locks.
 */
struct StageSlabs<'a> {
    left_ghost: SlabMut<'a>,
    left_edge: Option<SlabMut<'a>>,
    interior: SlabMut<'a>,
    right_edge: Option<SlabMut<'a>>,
    right_ghost: SlabMut<'a>,
}


fn partition<'a>(rate: &'a mut Field3, dec: &Decomposition) -> StageSlabs<'a> {
    let r = RADIUS;
    let s = dec.slab;

    match dec.placement {
        Placement::Solo => {
            let mut it = rate.split_k_mut(&[r, s + r]).into_iter();
            StageSlabs {
                left_ghost: it.next().unwrap(),
                left_edge: None,
                interior: it.next().unwrap(),
                right_edge: None,
                right_ghost: it.next().unwrap(),
            }
        }
        Placement::Leftmost => {
            let mut it = rate.split_k_mut(&[r, s, s + r]).into_iter();
            StageSlabs {
                left_ghost: it.next().unwrap(),
                left_edge: None,
                interior: it.next().unwrap(),
                right_edge: Some(it.next().unwrap()),
                right_ghost: it.next().unwrap(),
            }
        }
        Placement::Interior => {
            let mut it = rate.split_k_mut(&[r, 2 * r, s, s + r]).into_iter();
            StageSlabs {
                left_ghost: it.next().unwrap(),
                left_edge: Some(it.next().unwrap()),
                interior: it.next().unwrap(),
                right_edge: Some(it.next().unwrap()),
                right_ghost: it.next().unwrap(),
            }
        }
        Placement::Rightmost => {
            let mut it = rate.split_k_mut(&[r, 2 * r, s + r]).into_iter();
            StageSlabs {
                left_ghost: it.next().unwrap(),
                left_edge: Some(it.next().unwrap()),
                interior: it.next().unwrap(),
                right_edge: None,
                right_ghost: it.next().unwrap(),
            }
        }
    }
}


/**
 * The three directional sweeps over one slab. Contributions accumulate, so
 * the order is immaterial for the result; it is kept x, y, z everywhere so
 * runs are reproducible to the bit.
 */
fn sweep(u: &Field3, rate: &mut SlabMut, spacing: (f64, f64, f64)) {
    advection::add_flux_divergence(Axis::X, u, rate, spacing.0);
    advection::add_flux_divergence(Axis::Y, u, rate, spacing.1);
    advection::add_flux_divergence(Axis::Z, u, rate, spacing.2);
}




// ============================================================================
impl<C: Communicator> Solver<C> {


    /**
     * Wrap an initialized subdomain state (padded extent along z) together
     * with the fabric and decomposition it will advance under. The
     * snapshot and rate fields are allocated here, once, and reused every
     * stage.
     */
    pub fn new(
        comm: C,
        mesh: Mesh,
        dec: Decomposition,
        cfl: f64,
        shape: WorkShape,
        state: Field3,
    ) -> Self {
        assert_eq!(state.nx(), mesh.size.0);
        assert_eq!(state.ny(), mesh.size.1);
        assert_eq!(state.nz(), dec.padded());

        let (dx, _, _) = mesh.cell_spacing();
        let snapshot = Field3::with_pitch(state.nx(), state.ny(), state.nz(), state.pitch());
        let rate = Field3::with_pitch(state.nx(), state.ny(), state.nz(), state.pitch());
        let left = HaloLink::left(&dec, state.nx(), state.ny());
        let right = HaloLink::right(&dec, state.nx(), state.ny());

        Self {
            comm,
            mesh,
            dec,
            shape,
            control: StepControl {
                cfl,
                dx,
                wave_speed: REFERENCE_WAVE_SPEED,
            },
            state,
            snapshot,
            rate,
            left,
            right,
        }
    }


    pub fn communicator(&self) -> &C {
        &self.comm
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.dec
    }

    pub fn state(&self) -> &Field3 {
        &self.state
    }


    /**
     * Advance until the simulation clock reaches `t_end`. The step size is
     * re-evaluated every iteration and the last step shrinks to land on
     * the end time exactly; a zero-length run leaves the state untouched.
     */
    pub fn run(&mut self, t_end: f64) -> RunStats {
        let mut t = 0.0;
        let mut steps = 0;
        let mut last_dt = 0.0;

        while t < t_end {
            let dt = self.control.next(t, t_end);
            self.advance(dt);
            t += dt;
            steps += 1;
            last_dt = dt;
            debug!("rank {} completed step {} at t = {:.6}", self.comm.rank(), steps, t);
        }
        RunStats {
            steps,
            time: t,
            last_dt,
        }
    }


    /**
     * One full time step: snapshot the state, then run the three
     * Runge-Kutta stages. Each stage zeroes the accumulator, overlaps
     * boundary and interior sweeps with the halo traffic, settles the
     * exchange, and only then blends the stage update.
     */
    pub fn advance(&mut self, dt: f64) {
        self.snapshot.assign(&self.state);

        for stage in rk::STAGES.iter() {
            self.rate.fill(0.0);
            self.accumulate();
            self.settle();
            rk::combine(
                *stage,
                dt,
                &mut self.state,
                &self.snapshot,
                &self.rate,
                self.shape.combine_chunk(),
            );
        }
    }


    /**
     * Dispatch the stage's independent work items onto the worker pool:
     * the edge sweeps (each of which packs and ships its slab as soon as
     * it is done) and the interior sweep, split into sub-slabs of the
     * configured thickness. The scope join is the stage's device-wide
     * barrier for compute.
     */
    fn accumulate(&mut self) {
        let spacing = self.mesh.cell_spacing();
        let u = &self.state;
        let comm = &self.comm;
        let thickness = self.shape.slab_thickness();
        let slabs = partition(&mut self.rate, &self.dec);
        let left = self.left.as_mut();
        let right = self.right.as_mut();

        rayon::scope(|scope| {
            if let (Some(link), Some(mut edge)) = (right, slabs.right_edge) {
                scope.spawn(move |_| {
                    sweep(u, &mut edge, spacing);
                    link.ship(comm, &edge);
                });
            }
            if let (Some(link), Some(mut edge)) = (left, slabs.left_edge) {
                scope.spawn(move |_| {
                    sweep(u, &mut edge, spacing);
                    link.ship(comm, &edge);
                });
            }
            for mut piece in slabs.interior.split_thickness(thickness) {
                scope.spawn(move |_| sweep(u, &mut piece, spacing));
            }
        });
    }


    /**
     * Post the receives for whichever neighbors exist, then block on each
     * and deposit the arrived slabs into the ghost regions of the rate
     * field. After this returns the accumulator is fully assembled and
     * the stage combine may read it.
     */
    fn settle(&mut self) {
        let posted_left = self.left.as_ref().map(HaloLink::post);
        let posted_right = self.right.as_ref().map(HaloLink::post);

        let slabs = partition(&mut self.rate, &self.dec);
        let StageSlabs {
            mut left_ghost,
            mut right_ghost,
            ..
        } = slabs;

        if let Some(posted) = posted_right {
            posted.settle(&self.comm, &mut right_ghost);
        }
        if let Some(posted) = posted_left {
            posted.settle(&self.comm, &mut left_ghost);
        }
    }


    /**
     * Coordinator side of the gather: overlay this rank's physical slab,
     * then receive every other rank's in rank order and deposit each at
     * its z offset. Slabs tile the global grid by construction, so no
     * overlap handling is needed.
     */
    pub fn merge_results(&self, global: &mut Field3) {
        assert_eq!(self.dec.rank, 0);
        assert_eq!(global.nz(), self.mesh.padded_nz());

        let slab = self.dec.slab;
        global.fill_k(
            RADIUS..RADIUS + slab,
            &self.state.extract_k(self.dec.physical()),
        );
        for rank in 1..self.dec.ranks {
            let buffer = self.comm.recv(rank, Tag::Gather);
            let z0 = RADIUS + rank * slab;
            global.fill_k(z0..z0 + slab, &buffer);
        }
    }


    /**
     * Every non-coordinating rank ships its physical slab to rank 0.
     */
    pub fn send_result(&self) {
        assert_ne!(self.dec.rank, 0);
        self.comm
            .send(0, Tag::Gather, self.state.extract_k(self.dec.physical()));
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::thread;

    use super::{Solver, WorkShape};
    use crate::advection::RADIUS;
    use crate::field::Field3;
    use crate::mesh::{Decomposition, Mesh};
    use crate::message::comm::Communicator;
    use crate::message::local::channel_mesh;

    fn test_mesh(nz: usize) -> Mesh {
        Mesh {
            extent: (1.0, 1.0, 1.0),
            size: (8, 8, nz),
        }
    }

    fn subdomain(mesh: &Mesh, dec: &Decomposition) -> Field3 {
        let origin = dec.origin();
        Field3::from_function(mesh.size.0, mesh.size.1, dec.padded(), |i, j, k| {
            let kg = origin + k;
            0.5 * f64::sin(0.3 * i as f64 + 0.2 * j as f64 + 0.1 * kg as f64)
        })
    }

    #[test]
    fn a_solo_rank_advances_without_sending_any_messages() {
        let comm = channel_mesh(1).remove(0);
        let mesh = test_mesh(16);
        let dec = Decomposition::new(16, 1, 0).unwrap();
        let state = subdomain(&mesh, &dec);

        let mut solver = Solver::new(comm, mesh, dec, 0.4, WorkShape::default(), state);
        let stats = solver.run(0.05);

        assert!(stats.steps > 0);
        assert_eq!(solver.communicator().messages_sent(), 0);
    }

    #[test]
    fn a_zero_length_run_leaves_the_state_untouched() {
        let comm = channel_mesh(1).remove(0);
        let mesh = test_mesh(16);
        let dec = Decomposition::new(16, 1, 0).unwrap();
        let state = subdomain(&mesh, &dec);
        let initial = state.data().to_vec();

        let mut solver = Solver::new(comm, mesh, dec, 0.4, WorkShape::default(), state);
        let stats = solver.run(0.0);

        assert_eq!(stats.steps, 0);
        assert_eq!(solver.state().data(), &initial[..]);
        assert_eq!(solver.communicator().messages_sent(), 0);
    }

    #[test]
    fn nothing_leaks_from_one_step_into_the_next() {
        let mesh = test_mesh(16);
        let dec = Decomposition::new(16, 1, 0).unwrap();

        let mut first = Solver::new(
            channel_mesh(1).remove(0),
            mesh,
            dec,
            0.4,
            WorkShape::default(),
            subdomain(&mesh, &dec),
        );
        first.advance(0.01);

        // A solver rebuilt from the intermediate state must continue on
        // the identical trajectory; any accumulator carry-over between
        // steps would make the two diverge.
        let resumed_state = Field3::from_data(
            mesh.size.0,
            mesh.size.1,
            dec.padded(),
            first.state().data().to_vec(),
        );
        let mut second = Solver::new(
            channel_mesh(1).remove(0),
            mesh,
            dec,
            0.4,
            WorkShape::default(),
            resumed_state,
        );

        first.advance(0.01);
        second.advance(0.01);
        assert_eq!(first.state().data(), second.state().data());
    }

    #[test]
    fn ghost_layers_track_the_neighbor_after_a_step() {
        let procs: Vec<_> = channel_mesh(2)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let mesh = test_mesh(24);
                    let dec = Decomposition::new(24, 2, comm.rank()).unwrap();
                    let state = subdomain(&mesh, &dec);

                    let mut solver =
                        Solver::new(comm, mesh, dec, 0.4, WorkShape::default(), state);
                    solver.advance(0.01);

                    let dec = *solver.decomposition();
                    let state = solver.state();
                    (
                        state.extract_k(dec.left_ghost()),
                        state.extract_k(RADIUS..2 * RADIUS),
                        state.extract_k(dec.slab..dec.slab + RADIUS),
                        state.extract_k(dec.right_ghost()),
                    )
                })
            })
            .collect();

        let results: Vec<_> = procs.into_iter().map(|p| p.join().unwrap()).collect();
        let (ref _lg0, ref _fp0, ref lp0, ref rg0) = results[0];
        let (ref lg1, ref fp1, ref _lp1, ref _rg1) = results[1];

        // Rank 1's left ghost holds the cells rank 0 owns at its upper
        // boundary, and vice versa, to the bit.
        assert_eq!(lg1, lp0);
        assert_eq!(rg0, fp1);
    }
}
