//! Message passing between reach groups.
//!
//! When the reach network is split into groups that run on separate
//! threads, a group whose outlet reach drains into another group posts the
//! outlet's outflow for each time step. The receiving group blocks until the
//! value for the step it is about to route has arrived.

use crossbeam_channel::{unbounded, Receiver, Sender};
use rivulet_core::{Error, Result};
use std::collections::HashMap;
use tracing::debug;

enum Envelope<T> {
    Value { step: usize, key: usize, value: T },
    Abort { group: usize },
}

/// Channels connecting `n_groups` workers.
pub struct BoundaryExchange<T> {
    senders: Vec<Sender<Envelope<T>>>,
    receivers: Vec<Receiver<Envelope<T>>>,
}

impl<T: Send> BoundaryExchange<T> {
    pub fn new(n_groups: usize) -> Self {
        let (senders, receivers) = (0..n_groups).map(|_| unbounded()).unzip();
        Self { senders, receivers }
    }

    pub fn n_groups(&self) -> usize {
        self.senders.len()
    }

    /// Split into one (`Postman`, `Mailbox`) pair per group.
    pub fn into_endpoints(self) -> Vec<(Postman<T>, Mailbox<T>)> {
        let senders = self.senders;
        self.receivers
            .into_iter()
            .enumerate()
            .map(|(group, rx)| {
                (
                    Postman {
                        group,
                        senders: senders.clone(),
                    },
                    Mailbox {
                        group,
                        rx,
                        pending: HashMap::new(),
                    },
                )
            })
            .collect()
    }
}

/// Sending side held by one group.
#[derive(Clone)]
pub struct Postman<T> {
    group: usize,
    senders: Vec<Sender<Envelope<T>>>,
}

impl<T> Postman<T> {
    /// Deliver `value` for reach `key` at `step` to group `to`.
    pub fn send(&self, to: usize, step: usize, key: usize, value: T) -> Result<()> {
        let sender = self
            .senders
            .get(to)
            .ok_or_else(|| Error::Exchange(format!("no group {to}")))?;
        sender
            .send(Envelope::Value { step, key, value })
            .map_err(|_| Error::Exchange(format!("group {to} hung up")))
    }

    /// Tell every other group that this one has failed.
    pub fn abort_all(&self) {
        debug!(group = self.group, "broadcasting abort");
        for (to, sender) in self.senders.iter().enumerate() {
            if to != self.group {
                let _ = sender.send(Envelope::Abort { group: self.group });
            }
        }
    }
}

/// Receiving side held by one group.
pub struct Mailbox<T> {
    group: usize,
    rx: Receiver<Envelope<T>>,
    pending: HashMap<(usize, usize), T>,
}

impl<T> Mailbox<T> {
    pub fn group(&self) -> usize {
        self.group
    }

    /// Block until the value for reach `key` at `step` is available.
    ///
    /// Messages for other steps or reaches that arrive first are kept for
    /// later calls.
    pub fn receive(&mut self, step: usize, key: usize) -> Result<T> {
        if let Some(value) = self.pending.remove(&(step, key)) {
            return Ok(value);
        }
        loop {
            match self.rx.recv() {
                Ok(Envelope::Value { step: s, key: k, value }) => {
                    if s == step && k == key {
                        return Ok(value);
                    }
                    self.pending.insert((s, k), value);
                }
                Ok(Envelope::Abort { group }) => {
                    return Err(Error::Exchange(format!(
                        "group {group} failed while group {} waited for reach {key} at step {step}",
                        self.group
                    )));
                }
                Err(_) => {
                    return Err(Error::Exchange(format!(
                        "all senders to group {} disconnected",
                        self.group
                    )));
                }
            }
        }
    }
}
