use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::Sender;
use log::error;

use super::comm::{Communicator, Tag};
use super::mailbox::{Envelope, Mailbox};

/// A communicator backed by a full mesh of in-process channels. Every rank
/// holds a sender into every peer's mailbox, so a send completes as soon as
/// the envelope is enqueued. This is the transport used when ranks run as
/// threads of one process.
///
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    mailbox: Mailbox,
    sent: AtomicUsize,
}

/// Build the communicators for a group of `size` ranks. The returned
/// vector is indexed by rank; each element is intended to move into that
/// rank's thread.
///
pub fn channel_mesh(size: usize) -> Vec<ChannelCommunicator> {
    assert!(size > 0);
    let (sinks, sources): (Vec<_>, Vec<_>) =
        (0..size).map(|_| crossbeam_channel::unbounded()).unzip();

    sources
        .into_iter()
        .enumerate()
        .map(|(rank, source)| ChannelCommunicator {
            rank,
            peers: sinks.clone(),
            mailbox: Mailbox::new(source),
            sent: AtomicUsize::new(0),
        })
        .collect()
}

impl ChannelCommunicator {
    /// The number of sends issued by this rank so far. A solo run must
    /// leave this at zero.
    ///
    pub fn messages_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, peer: usize, tag: Tag, data: Vec<f64>) {
        self.sent.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope {
            from: self.rank,
            tag,
            data,
        };
        if self.peers[peer].send(envelope).is_err() {
            error!("rank {} failed to reach rank {}: peer is gone", self.rank, peer);
            panic!("message fabric disconnected");
        }
    }

    fn recv(&self, peer: usize, tag: Tag) -> Vec<f64> {
        self.mailbox.claim(peer, tag)
    }
}
