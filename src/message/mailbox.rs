use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::error;
use serde::{Deserialize, Serialize};

use super::comm::Tag;

const POLL_PERIOD: Duration = Duration::from_millis(10);

/// A message together with the addressing a receiver matches on.
///
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub from: usize,
    pub tag: Tag,
    pub data: Vec<f64>,
}

/// Matches incoming envelopes against posted receives. A message that
/// arrives before anyone asked for it is held until the matching claim;
/// same-source, same-tag messages are claimed in arrival order, which
/// preserves the transport's per-pair ordering guarantee.
///
pub struct Mailbox {
    source: Receiver<Envelope>,
    held: Mutex<Vec<Envelope>>,
}

impl Mailbox {
    pub fn new(source: Receiver<Envelope>) -> Self {
        Self {
            source,
            held: Mutex::new(Vec::new()),
        }
    }

    /// Block until the message addressed (`from`, `tag`) is available and
    /// take it. Unrelated messages drained while waiting are held for
    /// later claims.
    ///
    pub fn claim(&self, from: usize, tag: Tag) -> Vec<f64> {
        loop {
            {
                let mut held = self.held.lock().unwrap();
                if let Some(n) = held.iter().position(|e| e.from == from && e.tag == tag) {
                    return held.remove(n).data;
                }
            }
            match self.source.recv_timeout(POLL_PERIOD) {
                Ok(env) if env.from == from && env.tag == tag => return env.data,
                Ok(env) => self.held.lock().unwrap().push(env),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    error!("transport hung up while rank awaited {:?} from {}", tag, from);
                    panic!("message fabric disconnected");
                }
            }
        }
    }
}
