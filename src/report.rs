/**
 * Wall-clock seconds for the phases of a run, each measured between fabric
 * barriers so every rank agrees on the interval.
 */
#[derive(Clone, Copy, Debug, Default)]
pub struct Timings {
    pub load: f64,
    pub compute: f64,
    pub gather: f64,
}




/**
 * End-of-run report printed by the coordinating rank.
 */
pub struct Summary {
    pub title: String,
    pub size: (usize, usize, usize),
    pub steps: usize,
    pub last_dt: f64,
    pub time: f64,
    pub timings: Timings,
}




// ============================================================================
impl Summary {


    /**
     * Cell updates per second of compute time, counting every padded cell
     * once per Runge-Kutta stage.
     */
    pub fn updates_per_second(&self) -> f64 {
        let cells = (self.size.0 * self.size.1 * self.size.2) as f64;
        3.0 * cells * self.steps as f64 / self.compute_or_epsilon()
    }

    fn compute_or_epsilon(&self) -> f64 {
        if self.timings.compute > 0.0 {
            self.timings.compute
        } else {
            f64::EPSILON
        }
    }


    pub fn print(&self) {
        println!();
        println!("{}", self.title);
        println!("grid .................. {} x {} x {}", self.size.0, self.size.1, self.size.2);
        println!("steps ................. {}", self.steps);
        println!("final dt .............. {:.6}", self.last_dt);
        println!("final time ............ {:.6}", self.time);
        println!("subdomain load ........ {:.4}s", self.timings.load);
        println!("compute ............... {:.4}s", self.timings.compute);
        println!("gather ................ {:.4}s", self.timings.gather);
        println!("cell updates / s ...... {:.3e}", self.updates_per_second());
    }
}
