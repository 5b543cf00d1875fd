//! Slabflow advances an explicit finite-difference model of the 3D Burgers
//! equation on a structured grid that is decomposed into z-axis slabs, one
//! per rank of a message-passing group. Each rank computes the WENO5 flux
//! divergence of its slab while the contributions its neighbors need are
//! packed and shipped concurrently, so the halo traffic hides behind the
//! interior sweep; a three-stage strong-stability-preserving Runge-Kutta
//! scheme then blends each stage into the state once the exchange has
//! settled. Ranks can run as threads over an in-process channel mesh or as
//! processes over the included TCP transport.

pub mod advection;
pub mod field;
pub mod halo;
pub mod mesh;
pub mod message;
pub mod output;
pub mod report;
pub mod rk;
pub mod solver;
