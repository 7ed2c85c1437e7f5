//! Name ownership and message routing shared by both bus backends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use busprims_message::names::{is_unique_name, validate_bus_name};
use busprims_message::{Message, MessageKind};
use tracing::{debug, info};

use crate::connection::NameReply;
use crate::error::{BusError, Result};
use crate::match_rule::MatchRule;

/// Name the bus itself uses as sender of the errors it generates.
pub const BUS_NAME: &str = "org.busprims.Bus";

/// Error name for calls to a destination nobody owns.
pub const ERROR_SERVICE_UNKNOWN: &str = "org.busprims.Error.ServiceUnknown";

/// Where the router hands messages for one connection.
pub(crate) trait Deliver: Send + Sync {
    fn deliver(&self, msg: Message) -> Result<()>;
}

struct Peer {
    outbox: Arc<dyn Deliver>,
    rules: Vec<MatchRule>,
}

#[derive(Default)]
struct RouterState {
    next_id: u64,
    peers: HashMap<String, Peer>,
    /// well-known name -> unique name of its owner
    owners: HashMap<String, String>,
}

impl RouterState {
    fn resolve(&self, name: &str) -> Option<&Peer> {
        if is_unique_name(name) {
            self.peers.get(name)
        } else {
            self.owners.get(name).and_then(|unique| self.peers.get(unique))
        }
    }
}

#[derive(Default)]
pub(crate) struct Router {
    state: Mutex<RouterState>,
}

impl Router {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection and return its unique name.
    pub(crate) fn register(&self, outbox: Arc<dyn Deliver>) -> String {
        let mut state = self.state();
        state.next_id += 1;
        let unique = format!(":1.{}", state.next_id);
        state.peers.insert(
            unique.clone(),
            Peer {
                outbox,
                rules: Vec::new(),
            },
        );
        debug!(unique_name = %unique, "connection registered");
        unique
    }

    /// Drop a connection and release every name it owned.
    pub(crate) fn disconnect(&self, unique: &str) {
        let mut state = self.state();
        if state.peers.remove(unique).is_none() {
            return;
        }
        state.owners.retain(|name, owner| {
            let keep = owner != unique;
            if !keep {
                info!(name = %name, owner = %unique, "name released");
            }
            keep
        });
        debug!(unique_name = %unique, "connection removed");
    }

    pub(crate) fn request_name(&self, unique: &str, name: &str) -> Result<NameReply> {
        validate_bus_name(name)?;
        if is_unique_name(name) {
            return Err(BusError::Refused(format!(
                "cannot request unique name {name}"
            )));
        }

        let mut state = self.state();
        if !state.peers.contains_key(unique) {
            return Err(BusError::Disconnected(unique.to_string()));
        }
        let reply = match state.owners.get(name) {
            Some(owner) if owner == unique => NameReply::AlreadyOwner,
            Some(_) => NameReply::NotOwner,
            None => {
                state.owners.insert(name.to_string(), unique.to_string());
                NameReply::PrimaryOwner
            }
        };
        info!(name, unique_name = unique, %reply, "name requested");
        Ok(reply)
    }

    pub(crate) fn add_match(&self, unique: &str, rule: MatchRule) -> Result<()> {
        let mut state = self.state();
        let peer = state
            .peers
            .get_mut(unique)
            .ok_or_else(|| BusError::Disconnected(unique.to_string()))?;
        debug!(unique_name = unique, %rule, "match rule added");
        peer.rules.push(rule);
        Ok(())
    }

    /// Unique name of the owner of `name`, if any.
    pub(crate) fn owner_of(&self, name: &str) -> Option<String> {
        self.state().owners.get(name).cloned()
    }

    /// Stamp `sender` on `msg` and hand it to every connection that should see it.
    pub(crate) fn route(&self, sender: &str, mut msg: Message) {
        msg.set_sender(sender);

        let mut targets: Vec<Arc<dyn Deliver>> = Vec::new();
        let mut bounce: Option<(Arc<dyn Deliver>, Message)> = None;
        {
            let state = self.state();
            match (msg.kind(), msg.destination()) {
                (_, Some(dest)) => match state.resolve(dest) {
                    Some(peer) => targets.push(Arc::clone(&peer.outbox)),
                    None if msg.kind() == MessageKind::MethodCall => {
                        if let Some(origin) = state.peers.get(sender) {
                            bounce = service_unknown(&msg, dest)
                                .map(|err| (Arc::clone(&origin.outbox), err));
                        }
                    }
                    None => debug!(destination = dest, %msg, "dropping message for unknown destination"),
                },
                (MessageKind::Signal, None) => {
                    targets.extend(
                        state
                            .peers
                            .values()
                            .filter(|peer| peer.rules.iter().any(|rule| rule.matches(&msg)))
                            .map(|peer| Arc::clone(&peer.outbox)),
                    );
                }
                (_, None) => debug!(%msg, "dropping non-signal message without destination"),
            }
        }

        debug!(sender, %msg, recipients = targets.len(), "routing message");
        if let Some((last, rest)) = targets.split_last() {
            for outbox in rest {
                deliver_logged(outbox.as_ref(), msg.clone());
            }
            deliver_logged(last.as_ref(), msg);
        }
        if let Some((outbox, err)) = bounce {
            deliver_logged(outbox.as_ref(), err);
        }
    }
}

fn service_unknown(call: &Message, dest: &str) -> Option<Message> {
    let text = format!("the name {dest} was not provided by any connection");
    match Message::new_error(call, ERROR_SERVICE_UNKNOWN, &text) {
        Ok(mut err) => {
            err.set_sender(BUS_NAME);
            Some(err)
        }
        Err(err) => {
            debug!(error = %err, "could not build service-unknown error");
            None
        }
    }
}

fn deliver_logged(outbox: &dyn Deliver, msg: Message) {
    if let Err(err) = outbox.deliver(msg) {
        debug!(error = %err, "delivery failed");
    }
}
