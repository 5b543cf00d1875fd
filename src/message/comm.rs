use serde::{Deserialize, Serialize};

/// Identifies the role of a message between two peers, so that traffic
/// flowing in both directions at once is matched to the right receive.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    /// Boundary data travelling toward the higher-numbered neighbor.
    Rightward,
    /// Boundary data travelling toward the lower-numbered neighbor.
    Leftward,
    /// A finished subdomain on its way to the coordinating rank.
    Gather,
    /// Internal traffic of the tree collectives.
    Collective,
}

/// Interface for a group of processes that can exchange messages over some
/// fabric. The underlying transport can in principle be shared-memory
/// channels, TCP, or a higher level abstraction like MPI.
///
pub trait Communicator: Send + Sync {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peer processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately; it is not allowed to block until a matching
    /// receive is posted. Ownership of the buffer moves to the transport,
    /// so completion of the send needs no further synchronization on the
    /// caller's side.
    fn send(&self, peer: usize, tag: Tag, data: Vec<f64>);

    /// Must be implemented to receive the message carrying `tag` from the
    /// given peer, blocking until it has arrived. Successive messages with
    /// the same peer and tag are delivered in the order they were sent.
    fn recv(&self, peer: usize, tag: Tag) -> Vec<f64>;

    /// Implements a binomial tree broadcast from rank 0. The value must be
    /// `Some` on rank 0 and `None` elsewhere.
    ///
    fn broadcast(&self, value: Option<Vec<f64>>) -> Vec<f64> {
        let r = self.rank();
        let p = self.size();
        let mut value = value;

        for level in (0..ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == one {
                value = Some(self.recv(r - one, Tag::Collective));
            } else if r % two == 0 && r + one < p {
                let v = value.as_ref().expect("broadcast value not yet received");
                self.send(r + one, Tag::Collective, v.clone());
            }
        }
        value.expect("broadcast delivered no value")
    }

    /// Implements a binomial tree reduce over a commutative binary
    /// operator. All ranks return `None` except for rank 0.
    ///
    fn reduce<F>(&self, f: F, mut value: Vec<f64>) -> Option<Vec<f64>>
    where
        F: Fn(Vec<f64>, Vec<f64>) -> Vec<f64>,
    {
        let r = self.rank();
        let p = self.size();

        for level in 0..ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv(r + one, Tag::Collective));
                }
            } else {
                self.send(r - one, Tag::Collective, value);
                return None;
            }
        }
        Some(value)
    }

    /// Implements an all-reduce (symmetric fold) operation over a
    /// commutative binary operator.
    ///
    fn all_reduce<F>(&self, f: F, value: Vec<f64>) -> Vec<f64>
    where
        F: Fn(Vec<f64>, Vec<f64>) -> Vec<f64>,
    {
        self.broadcast(self.reduce(f, value))
    }

    /// Block until every rank has entered the barrier. A single-rank group
    /// passes through without sending anything.
    ///
    fn barrier(&self) {
        self.all_reduce(|a, _| a, Vec::new());
    }
}

/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}
