use crate::field::{Field3, SlabMut};




/**
 * Stencil half-width of the reconstruction below, and therefore the number
 * of ghost layers every subdomain carries on each side of the z-axis.
 */
pub const RADIUS: usize = 3;

const EPSILON: f64 = 1e-6;




#[derive(Clone, Copy, Debug, PartialEq, Eq)]

/**
 * Identifier for a Cartesian axis.
 */
pub enum Axis {
    X,
    Y,
    Z,
}




/**
 * The scalar flux of the transported quantity.
 */
fn flux(u: f64) -> f64 {
    0.5 * u * u
}


/**
 * Fifth-order WENO reconstruction of an interface value from five
 * cell-centered values, `v2` being the cell adjacent to the interface on
 * the upwind side.
 */
fn weno5(v0: f64, v1: f64, v2: f64, v3: f64, v4: f64) -> f64 {
    let b0 = 13.0 / 12.0 * (v0 - 2.0 * v1 + v2).powi(2) + 0.25 * (v0 - 4.0 * v1 + 3.0 * v2).powi(2);
    let b1 = 13.0 / 12.0 * (v1 - 2.0 * v2 + v3).powi(2) + 0.25 * (v1 - v3).powi(2);
    let b2 = 13.0 / 12.0 * (v2 - 2.0 * v3 + v4).powi(2) + 0.25 * (3.0 * v2 - 4.0 * v3 + v4).powi(2);

    let w0 = 0.1 / (EPSILON + b0).powi(2);
    let w1 = 0.6 / (EPSILON + b1).powi(2);
    let w2 = 0.3 / (EPSILON + b2).powi(2);

    let q0 = (2.0 * v0 - 7.0 * v1 + 11.0 * v2) / 6.0;
    let q1 = (-v1 + 5.0 * v2 + 2.0 * v3) / 6.0;
    let q2 = (2.0 * v2 + 5.0 * v3 - v4) / 6.0;

    (w0 * q0 + w1 * q1 + w2 * q2) / (w0 + w1 + w2)
}


/**
 * Numerical flux through the interface between `w[2]` and `w[3]`, from the
 * six cell values straddling it. Lax-Friedrichs splitting with the
 * dissipation speed taken locally over the stencil; both adjacent cells
 * evaluate the identical expression, which keeps the scheme conservative.
 */
fn interface_flux(w: &[f64; 6]) -> f64 {
    let alpha = w.iter().fold(0.0_f64, |a, &u| a.max(u.abs()));

    let fp = |u: f64| 0.5 * (flux(u) + alpha * u);
    let fm = |u: f64| 0.5 * (flux(u) - alpha * u);

    weno5(fp(w[0]), fp(w[1]), fp(w[2]), fp(w[3]), fp(w[4]))
        + weno5(fm(w[5]), fm(w[4]), fm(w[3]), fm(w[2]), fm(w[1]))
}


fn wrap(i: usize, offset: isize, n: usize) -> usize {
    (i as isize + offset).rem_euclid(n as isize) as usize
}


/**
 * One point of the stencil along the given axis. The in-plane axes wrap
 * periodically; along z the caller's k-range contract guarantees the read
 * stays inside the padded array.
 */
fn sample(u: &Field3, axis: Axis, i: usize, j: usize, k: usize, offset: isize) -> f64 {
    match axis {
        Axis::X => u.get(wrap(i, offset, u.nx()), j, k),
        Axis::Y => u.get(i, wrap(j, offset, u.ny()), k),
        Axis::Z => u.get(i, j, (k as isize + offset) as usize),
    }
}




/**
 * Accumulate the directional flux-divergence `-(F_plus - F_minus) / h` of
 * the state field into the rate slab, over the slab's k-range and the full
 * in-plane extent. Contributions add to whatever the slab already holds,
 * so the three axis sweeps combine into a single rate-of-change estimate.
 *
 * The z sweep reads `RADIUS` layers past either end of the k-range; every
 * range issued by the solver keeps those reads inside the padded array.
 */
pub fn add_flux_divergence(axis: Axis, u: &Field3, rate: &mut SlabMut, h: f64) {
    let nx = rate.nx();
    let ny = rate.ny();

    for k in rate.k_range() {
        for j in 0..ny {
            for i in 0..nx {
                let mut w = [0.0; 7];
                for (m, x) in w.iter_mut().enumerate() {
                    *x = sample(u, axis, i, j, k, m as isize - 3);
                }
                let minus = interface_flux(&[w[0], w[1], w[2], w[3], w[4], w[5]]);
                let plus = interface_flux(&[w[1], w[2], w[3], w[4], w[5], w[6]]);
                rate.add(i, j, k, -(plus - minus) / h);
            }
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{add_flux_divergence, interface_flux, Axis, RADIUS};
    use crate::field::Field3;

    fn rate_of(u: &Field3, axis: Axis) -> Field3 {
        let mut rate = Field3::zeros(u.nx(), u.ny(), u.nz());
        let nz = u.nz();
        {
            let mut slabs = rate.split_k_mut(&[RADIUS, nz - RADIUS]);
            add_flux_divergence(axis, u, &mut slabs[1], 0.1);
        }
        rate
    }

    #[test]
    fn interface_flux_of_a_constant_state_is_the_flux_of_that_state() {
        let f = interface_flux(&[0.7; 6]);
        assert!((f - 0.5 * 0.7 * 0.7).abs() < 1e-12);
    }

    #[test]
    fn constant_fields_have_zero_divergence() {
        let u = Field3::from_function(8, 8, 8 + 2 * RADIUS, |_, _, _| 0.4);
        for axis in [Axis::X, Axis::Y, Axis::Z].iter() {
            let rate = rate_of(&u, *axis);
            for &r in rate.data() {
                assert!(r.abs() < 1e-12);
            }
        }
    }

    #[test]
    fn the_rate_depends_only_on_a_radius_wide_neighborhood() {
        let u0 = Field3::from_function(16, 4, 4 + 2 * RADIUS, |i, _, _| {
            f64::exp(-0.1 * (i as f64 - 8.0).powi(2))
        });
        let mut u1 = Field3::from_data(16, 4, 4 + 2 * RADIUS, u0.data().to_vec());
        u1.set(12, 0, RADIUS, 9.0);

        let r0 = rate_of(&u0, Axis::X);
        let r1 = rate_of(&u1, Axis::X);

        // A perturbation at i = 12 cannot reach i = 5 through a radius-3
        // stencil.
        assert_eq!(r0.get(5, 0, RADIUS), r1.get(5, 0, RADIUS));
        assert_ne!(r0.get(12, 0, RADIUS), r1.get(12, 0, RADIUS));
    }

    #[test]
    fn sweeps_accumulate_rather_than_overwrite() {
        let u = Field3::from_function(6, 6, 6 + 2 * RADIUS, |i, j, k| {
            (i + 2 * j + 3 * k) as f64 * 0.01
        });
        let mut once = Field3::zeros(6, 6, 6 + 2 * RADIUS);
        let mut twice = Field3::zeros(6, 6, 6 + 2 * RADIUS);
        {
            let mut slabs = once.split_k_mut(&[RADIUS, 6 + RADIUS]);
            add_flux_divergence(Axis::X, &u, &mut slabs[1], 0.1);
        }
        {
            let mut slabs = twice.split_k_mut(&[RADIUS, 6 + RADIUS]);
            add_flux_divergence(Axis::X, &u, &mut slabs[1], 0.1);
            add_flux_divergence(Axis::X, &u, &mut slabs[1], 0.1);
        }
        let n = once.offset(3, 3, RADIUS + 1);
        assert!((twice.data()[n] - 2.0 * once.data()[n]).abs() < 1e-12);
    }

    #[test]
    fn writes_are_confined_to_the_requested_range() {
        let u = Field3::from_function(6, 6, 6 + 2 * RADIUS, |i, _, _| (i as f64).sin());
        let mut rate = Field3::zeros(6, 6, 6 + 2 * RADIUS);
        {
            let mut slabs = rate.split_k_mut(&[RADIUS + 1, RADIUS + 3]);
            add_flux_divergence(Axis::X, &u, &mut slabs[1], 0.1);
        }
        for k in 0..RADIUS + 1 {
            for j in 0..6 {
                for i in 0..6 {
                    assert_eq!(rate.get(i, j, k), 0.0);
                }
            }
        }
        assert_ne!(rate.get(2, 2, RADIUS + 1), 0.0);
    }
}
