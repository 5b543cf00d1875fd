use log::debug;

use crate::advection::RADIUS;
use crate::field::SlabMut;
use crate::mesh::Decomposition;
use crate::message::comm::{Communicator, Tag};




/**
 * Copy a boundary slab of the rate field into a tightly packed transfer
 * buffer, preserving (i, j, k) ordering and stripping the row pitch.
 */
pub fn pack(slab: &SlabMut, buffer: &mut [f64]) {
    assert_eq!(buffer.len(), slab.nx() * slab.ny() * slab.k_range().len());
    let mut rows = buffer.chunks_exact_mut(slab.nx());
    for k in slab.k_range() {
        for j in 0..slab.ny() {
            rows.next().unwrap().copy_from_slice(slab.row(j, k));
        }
    }
}


/**
 * The inverse of `pack`: deposit a received transfer buffer into a ghost
 * slab.
 */
pub fn unpack(buffer: &[f64], slab: &mut SlabMut) {
    assert_eq!(buffer.len(), slab.nx() * slab.ny() * slab.k_range().len());
    let mut rows = buffer.chunks_exact(slab.nx());
    for k in slab.k_range() {
        for j in 0..slab.ny() {
            slab.row_mut(j, k).copy_from_slice(rows.next().unwrap());
        }
    }
}




/**
 * The exchange state toward one neighbor: the peer's rank, the tags either
 * direction of traffic carries, and the staging buffer boundary slabs are
 * packed into before the wire copy. The staging buffer is allocated once
 * and reused every stage.
 */
pub struct HaloLink {
    peer: usize,
    outbound: Tag,
    inbound: Tag,
    staging: Vec<f64>,
}




// ============================================================================
impl HaloLink {


    /**
     * The link toward the lower-numbered neighbor, if the decomposition
     * gives this rank one.
     */
    pub fn left(dec: &Decomposition, nx: usize, ny: usize) -> Option<Self> {
        dec.left_neighbor().map(|peer| Self {
            peer,
            outbound: Tag::Leftward,
            inbound: Tag::Rightward,
            staging: vec![0.0; nx * ny * RADIUS],
        })
    }


    /**
     * The link toward the higher-numbered neighbor.
     */
    pub fn right(dec: &Decomposition, nx: usize, ny: usize) -> Option<Self> {
        dec.right_neighbor().map(|peer| Self {
            peer,
            outbound: Tag::Rightward,
            inbound: Tag::Leftward,
            staging: vec![0.0; nx * ny * RADIUS],
        })
    }


    pub fn peer(&self) -> usize {
        self.peer
    }


    /**
     * Pack the freshly computed edge slab and issue the non-blocking send.
     * Must run after the advection sweeps for the edge's k-range have
     * finished, which the caller guarantees by shipping from the same work
     * item that computed the slab. The wire buffer's ownership moves to
     * the transport, so no completion wait is needed before the staging
     * buffer is reused next stage.
     */
    pub fn ship<C: Communicator>(&mut self, comm: &C, edge: &SlabMut) {
        pack(edge, &mut self.staging);
        comm.send(self.peer, self.outbound, self.staging.clone());
        debug!("rank {} shipped {:?} boundary to {}", comm.rank(), self.outbound, self.peer);
    }


    /**
     * Post the receive for the neighbor's boundary contribution. Posting
     * returns immediately; the transport makes progress in the background
     * until the returned handle is settled.
     */
    pub fn post(&self) -> PostedReceive {
        PostedReceive {
            peer: self.peer,
            tag: self.inbound,
        }
    }
}




/**
 * A receive that has been posted but not yet completed.
 */
#[must_use = "a posted receive must be settled before the stage combine"]
pub struct PostedReceive {
    peer: usize,
    tag: Tag,
}

impl PostedReceive {

    /**
     * Block until the message arrives, then deposit it into the ghost
     * slab.
     */
    pub fn settle<C: Communicator>(self, comm: &C, ghost: &mut SlabMut) {
        let wire = comm.recv(self.peer, self.tag);
        unpack(&wire, ghost);
    }
}
