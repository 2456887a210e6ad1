// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Hand-off from the single accept loop to the worker reactors. The
// original ring buffer this is modeled on (`channel.rs`) moves messages
// between processes over shared memory, which needs its own lock-free
// slot array and epoch bookkeeping. Here sender and receiver are two
// threads of the same process trading ownership of a `TcpStream`, so a
// bounded `mpsc` channel gives the same bounded, non-blocking hand-off
// with none of the shared-memory machinery.

use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use mio::net::TcpStream;

pub type Accepted = (TcpStream, SocketAddr);

/// Lives on the accept-loop thread. Round-robins across worker rings,
/// falling through to the next worker if the preferred one's ring is
/// momentarily full.
pub struct AcceptProducer {
    senders: Vec<SyncSender<Accepted>>,
    next: usize,
}

impl AcceptProducer {
    /// Attempt to hand `accepted` to a worker. Returns `false` only if
    /// every worker's ring is full or every worker has exited — the
    /// caller drops the connection in that case.
    pub fn dispatch(&mut self, mut accepted: Accepted) -> bool {
        let n = self.senders.len();
        for i in 0..n {
            let idx = (self.next + i) % n;
            match self.senders[idx].try_send(accepted) {
                Ok(()) => {
                    self.next = (idx + 1) % n;
                    return true;
                }
                Err(TrySendError::Full(back)) => accepted = back,
                Err(TrySendError::Disconnected(_)) => continue,
            }
        }
        false
    }
}

/// Lives on one worker thread; drains accepted connections handed to it.
pub struct AcceptConsumer {
    receiver: Receiver<Accepted>,
}

impl AcceptConsumer {
    pub fn try_recv(&self) -> Option<Accepted> {
        self.receiver.try_recv().ok()
    }
}

/// Build one ring per worker, each bounded to `capacity` pending
/// connections.
pub fn new_ring(num_workers: usize, capacity: usize) -> (AcceptProducer, Vec<AcceptConsumer>) {
    let mut senders = Vec::with_capacity(num_workers);
    let mut consumers = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        senders.push(tx);
        consumers.push(AcceptConsumer { receiver: rx });
    }
    (AcceptProducer { senders, next: 0 }, consumers)
}
