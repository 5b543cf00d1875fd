use std::io::prelude::*;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use super::comm::{Communicator, Tag};
use super::mailbox::{Envelope, Mailbox};

const RETRY_LIMIT: usize = 3;
const RETRY_WAIT: Duration = Duration::from_millis(250);

/// Background threads moving envelopes over TCP: one serial sender owning a
/// connection per peer, and one listener accepting a connection per peer.
/// A send is complete from the caller's point of view once the envelope is
/// handed to the sender thread; delivery failures are fatal because the
/// stage protocol cannot make progress without the message.
///
pub struct TcpHost {
    send_thread: Option<thread::JoinHandle<()>>,
    _listen_thread: thread::JoinHandle<()>,
}

impl TcpHost {
    /// Stand up the transport for this rank and return it together with
    /// the communicator bound to it.
    ///
    pub fn new(rank: usize, peers: Vec<SocketAddr>) -> (Self, TcpCommunicator) {
        let (send_sink, send_src) = crossbeam_channel::unbounded::<(usize, Envelope)>();
        let (recv_sink, recv_src) = crossbeam_channel::unbounded();

        let send_thread = Self::start_serial_sender(peers.clone(), send_src);
        let listen_thread = Self::start_listener(peers[rank], recv_sink);

        let host = TcpHost {
            send_thread: Some(send_thread),
            _listen_thread: listen_thread,
        };
        let comm = TcpCommunicator {
            rank,
            num_peers: peers.len(),
            send_sink: Some(send_sink),
            mailbox: Mailbox::new(recv_src),
        };
        (host, comm)
    }

    fn start_serial_sender(
        peers: Vec<SocketAddr>,
        send_src: crossbeam_channel::Receiver<(usize, Envelope)>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut table: Vec<Option<TcpStream>> = peers.iter().map(|_| None).collect();

            for (peer, envelope) in send_src {
                if table[peer].is_none() {
                    table[peer] = Some(connect_with_retry(peers[peer]));
                }
                let stream = table[peer].as_mut().unwrap();
                let wire = rmp_serde::encode::to_vec(&envelope)
                    .unwrap_or_else(|e| panic!("failed to encode envelope: {}", e));

                let sent = stream
                    .write_all(&wire.len().to_le_bytes())
                    .and_then(|()| stream.write_all(&wire))
                    .and_then(|()| read_usize(stream));
                match sent {
                    Ok(ack) if ack == wire.len() => (),
                    Ok(ack) => {
                        error!("peer {} acked {} of {} bytes", peer, ack, wire.len());
                        panic!("message fabric corrupted a transfer");
                    }
                    Err(e) => {
                        error!("failed to send to {}: {}", peers[peer], e);
                        panic!("message fabric disconnected");
                    }
                }
            }
            debug!("sender thread shutting down");
        })
    }

    fn start_listener(
        addr: SocketAddr,
        recv_sink: crossbeam_channel::Sender<Envelope>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            info!("listening to {}", addr);
            let listener = TcpListener::bind(addr)
                .unwrap_or_else(|e| panic!("could not bind {}: {}", addr, e));
            loop {
                match listener.accept() {
                    Ok((stream, remote)) => {
                        Self::handle_connection(stream, remote, recv_sink.clone());
                    }
                    Err(e) => {
                        error!("accept failed on {}: {}", addr, e);
                        panic!("message fabric disconnected");
                    }
                }
            }
        })
    }

    fn handle_connection(
        mut stream: TcpStream,
        remote: SocketAddr,
        recv_sink: crossbeam_channel::Sender<Envelope>,
    ) -> thread::JoinHandle<()> {
        info!("receiving connection from {}", remote);
        thread::spawn(move || loop {
            let size = match read_usize(&mut stream) {
                Ok(size) => size,
                Err(_) => {
                    debug!("connection from {} closed", remote);
                    break;
                }
            };
            let mut wire = vec![0; size];
            if let Err(e) = stream.read_exact(&mut wire) {
                error!("truncated message from {}: {}", remote, e);
                panic!("message fabric disconnected");
            }
            let envelope: Envelope = rmp_serde::decode::from_slice(&wire)
                .unwrap_or_else(|e| panic!("failed to decode envelope from {}: {}", remote, e));

            recv_sink.send(envelope).expect("mailbox is gone");
            if let Err(e) = stream.write_all(&size.to_le_bytes()) {
                error!("failed to ack {}: {}", remote, e);
                panic!("message fabric disconnected");
            }
        })
    }

    /// Join the sender thread once all communicators sharing it are done.
    ///
    pub fn join(&mut self) {
        if let Some(thread) = self.send_thread.take() {
            thread.join().unwrap()
        }
    }
}

fn connect_with_retry(addr: SocketAddr) -> TcpStream {
    let mut wait = RETRY_WAIT;
    for attempt in 0..=RETRY_LIMIT {
        match TcpStream::connect(addr) {
            Ok(stream) => return stream,
            Err(e) if attempt < RETRY_LIMIT => {
                info!("connect to {} failed ({}), retrying in {:?}", addr, e, wait);
                thread::sleep(wait);
                wait *= 2;
            }
            Err(e) => {
                error!("could not connect to {} after {} attempts: {}", addr, RETRY_LIMIT + 1, e);
                panic!("message fabric unreachable");
            }
        }
    }
    unreachable!()
}

fn read_usize<R: Read>(stream: &mut R) -> std::io::Result<usize> {
    let mut buffer = [0; 8];
    stream.read_exact(&mut buffer)?;
    Ok(usize::from_le_bytes(buffer))
}

/// A `Communicator` whose fabric is the pair of background threads in
/// `TcpHost`. Dropping the communicator closes the outbound channel, which
/// lets the sender thread drain and exit.
///
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    send_sink: Option<crossbeam_channel::Sender<(usize, Envelope)>>,
    mailbox: Mailbox,
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, peer: usize, tag: Tag, data: Vec<f64>) {
        let envelope = Envelope {
            from: self.rank,
            tag,
            data,
        };
        self.send_sink
            .as_ref()
            .unwrap()
            .send((peer, envelope))
            .expect("sender thread is gone");
    }

    fn recv(&self, peer: usize, tag: Tag) -> Vec<f64> {
        self.mailbox.claim(peer, tag)
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.send_sink.take();
    }
}
