use rayon::prelude::*;

use crate::field::Field3;




#[derive(Clone, Copy, Debug)]

/**
 * Blend weights for one Runge-Kutta stage: the updated state is `carry *
 * snapshot + update * (state + dt * rate)`.
 */
pub struct Stage {
    pub carry: f64,
    pub update: f64,
}


/**
 * The three stages of the strong-stability-preserving third-order scheme:
 * a forward-Euler predictor followed by two convex recombinations with the
 * step-start snapshot.
 */
pub const STAGES: [Stage; 3] = [
    Stage { carry: 0.0, update: 1.0 },
    Stage { carry: 0.75, update: 0.25 },
    Stage { carry: 1.0 / 3.0, update: 2.0 / 3.0 },
];




/**
 * Apply one stage update over the full padded extent. Ghost layers take
 * part on purpose: their rate values arrived from the neighbor, so after
 * the combine they track the neighbor's adjacent physical cells without a
 * separate state exchange. The work is chunked for the worker pool; the
 * chunk size has no effect on the result.
 */
pub fn combine(stage: Stage, dt: f64, state: &mut Field3, snapshot: &Field3, rate: &Field3, chunk: usize) {
    assert_eq!(state.data().len(), snapshot.data().len());
    assert_eq!(state.data().len(), rate.data().len());
    let chunk = chunk.max(1);

    state
        .data_mut()
        .par_chunks_mut(chunk)
        .zip(snapshot.data().par_chunks(chunk))
        .zip(rate.data().par_chunks(chunk))
        .for_each(|((u, u0), lu)| {
            for n in 0..u.len() {
                u[n] = stage.carry * u0[n] + stage.update * (u[n] + dt * lu[n]);
            }
        });
}




#[derive(Clone, Copy, Debug)]

/**
 * Recomputes the step size every iteration from the CFL stability bound,
 * shortening the final step to land exactly on the end time. The reference
 * wave speed is the unit bound the initial profile is scaled to.
 */
pub struct StepControl {
    pub cfl: f64,
    pub dx: f64,
    pub wave_speed: f64,
}

impl StepControl {

    pub fn next(&self, t: f64, t_end: f64) -> f64 {
        let dt = self.cfl * self.dx / self.wave_speed;
        if t + dt > t_end {
            t_end - t
        } else {
            dt
        }
    }
}
