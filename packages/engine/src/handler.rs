//! # Message handler
//!
//! Binds client connections to preview keys and routes commands to the
//! [`Preview`] coordinator. Every connection owns a bounded outbound queue;
//! fan-out never waits on a slow client, a full queue drops the message.

use crate::key::PreviewKey;
use crate::message::{Command, InboundMessage, MessageError, OutboundMessage, Role};
use crate::preview::Preview;
use draftview_crawler::FragmentDiff;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Connection {
    sender: mpsc::Sender<OutboundMessage>,
    session: Option<(PreviewKey, Role)>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    sessions: HashMap<PreviewKey, Vec<ConnectionId>>,
}

impl Registry {
    /// Bind `id` to `key`, leaving any previous key. Returns whether other
    /// connections were already bound to `key`, and the previous key if no
    /// connection remains on it. `None` if the connection is gone.
    fn join(&mut self, id: ConnectionId, key: &PreviewKey, role: Role) -> Option<(bool, Option<PreviewKey>)> {
        if !self.connections.contains_key(&id) {
            return None;
        }
        let left = self.leave(id).filter(|left| left != key);
        let connection = self.connections.get_mut(&id)?;
        connection.session = Some((key.clone(), role));

        let members = self.sessions.entry(key.clone()).or_default();
        let other = !members.is_empty();
        members.push(id);
        Some((other, left))
    }

    /// Unbind `id`. Returns the key it left if no connection remains on it.
    fn leave(&mut self, id: ConnectionId) -> Option<PreviewKey> {
        let (key, _) = self.connections.get_mut(&id)?.session.take()?;
        let members = self.sessions.get_mut(&key)?;
        members.retain(|member| *member != id);
        if members.is_empty() {
            self.sessions.remove(&key);
            return Some(key);
        }
        None
    }

    /// Unbind every connection from `key` and return them
    fn close(&mut self, key: &PreviewKey) -> Vec<ConnectionId> {
        let members = self.sessions.remove(key).unwrap_or_default();
        for id in &members {
            if let Some(connection) = self.connections.get_mut(id) {
                connection.session = None;
            }
        }
        members
    }

    fn members(&self, key: &PreviewKey, role: Option<Role>, except: ConnectionId) -> Vec<ConnectionId> {
        self.sessions
            .get(key)
            .into_iter()
            .flatten()
            .copied()
            .filter(|member| *member != except)
            .filter(|member| match role {
                Some(role) => self
                    .connections
                    .get(member)
                    .and_then(|c| c.session.as_ref())
                    .is_some_and(|(_, r)| *r == role),
                None => true,
            })
            .collect()
    }

    fn send(&self, id: ConnectionId, message: OutboundMessage) {
        let Some(connection) = self.connections.get(&id) else {
            return;
        };
        match connection.sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                tracing::warn!(connection = %id, command = %message.command, "outbound queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection = %id, "connection closed");
            }
        }
    }
}

pub struct MessageHandler {
    preview: Arc<Preview>,
    capacity: usize,
    next_id: AtomicU64,
    registry: Mutex<Registry>,
}

impl MessageHandler {
    /// `capacity` bounds each connection's outbound queue
    pub fn new(preview: Arc<Preview>, capacity: usize) -> Self {
        Self {
            preview,
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    /// Register a new connection and hand back the receiving end of its queue.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<OutboundMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.registry().connections.insert(
            id,
            Connection {
                sender,
                session: None,
            },
        );
        tracing::debug!(connection = %id, "connected");
        (id, receiver)
    }

    /// Drop a connection. The last connection leaving a key stops its preview.
    pub async fn disconnect(&self, id: ConnectionId) {
        let left = {
            let mut registry = self.registry();
            let left = registry.leave(id);
            registry.connections.remove(&id);
            left
        };
        tracing::debug!(connection = %id, "disconnected");

        if let Some(key) = left {
            self.release(&key).await;
        }
    }

    /// Stop `key` unless a connection is bound to it. The check runs under
    /// the key lock, so a start racing with the release either binds first
    /// and keeps the draft, or warms it again afterwards.
    async fn release(&self, key: &PreviewKey) {
        match self
            .preview
            .stop_if(key, || !self.registry().sessions.contains_key(key))
            .await
        {
            Ok(true) => tracing::debug!(key = %key, "released unbound preview"),
            Ok(false) => {}
            Err(e) => tracing::debug!(key = %key, error = %e, "no preview to release"),
        }
    }

    /// Handle one raw client message. Replies and notifications are queued on
    /// the connections; errors only reach the sender.
    pub async fn handle(&self, id: ConnectionId, raw: &str) {
        let message = match InboundMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "malformed message");
                self.registry().send(id, OutboundMessage::error(raw_command(raw), &e));
                return;
            }
        };

        let command = message.command.clone();
        if let Err(e) = self.dispatch(id, message).await {
            tracing::warn!(connection = %id, command = %command, code = e.code(), error = %e, "command failed");
            self.registry().send(id, OutboundMessage::error(command, &e));
        }
    }

    async fn dispatch(&self, id: ConnectionId, message: InboundMessage) -> Result<(), MessageError> {
        let command = message.command()?;
        let key = message.key()?;
        let template_key = message.template_key.as_deref();

        match command {
            Command::Start => {
                let role = message.role.unwrap_or(Role::Form);
                let (started, joined) = self
                    .preview
                    .start_with(&key, template_key, || self.registry().join(id, &key, role))
                    .await;

                let other = match joined.flatten() {
                    Some((other, left)) => {
                        if let Some(left) = left {
                            self.release(&left).await;
                        }
                        other
                    }
                    // nobody was bound: the start failed early or the connection is gone
                    None => {
                        self.release(&key).await;
                        false
                    }
                };
                started?;

                let registry = self.registry();
                registry.send(
                    id,
                    OutboundMessage::ok(command.as_str())
                        .with_content(&key.content_id)
                        .with_other(other),
                );
                for member in registry.members(&key, None, id) {
                    registry.send(
                        member,
                        OutboundMessage::ok(command.as_str())
                            .with_content(&key.content_id)
                            .with_other(true),
                    );
                }
            }
            Command::Update => {
                let changes = message.changes.ok_or(MessageError::MissingField("changes"))?;
                let forwarded = Value::Object(changes.clone());
                self.preview.update(&key, changes, template_key).await?;

                let previewers = {
                    let registry = self.registry();
                    registry.send(id, OutboundMessage::ok(command.as_str()).with_content(&key.content_id));
                    for member in registry.members(&key, Some(Role::Form), id) {
                        registry.send(
                            member,
                            OutboundMessage::ok(command.as_str())
                                .with_content(&key.content_id)
                                .with_changes(forwarded.clone()),
                        );
                    }
                    registry.members(&key, Some(Role::Preview), id)
                };

                if !previewers.is_empty() {
                    self.push_changes(id, &key, &previewers).await;
                }
            }
            Command::Render => {
                let html = self
                    .preview
                    .render(&key, message.partial.unwrap_or(false))
                    .await?;
                self.registry().send(
                    id,
                    OutboundMessage::ok(command.as_str())
                        .with_content(&key.content_id)
                        .with_data(json!({ "html": html })),
                );
            }
            Command::Changes => {
                let changes = self.preview.get_changes(&key).await?;
                self.registry().send(
                    id,
                    OutboundMessage::ok(command.as_str())
                        .with_content(&key.content_id)
                        .with_changes(changes_to_json(changes)),
                );
            }
            Command::Stop => {
                let mut members = Vec::new();
                self.preview
                    .stop_if(&key, || {
                        members = self.registry().close(&key);
                        true
                    })
                    .await?;

                let registry = self.registry();
                registry.send(id, OutboundMessage::ok(command.as_str()).with_content(&key.content_id));
                for member in members.into_iter().filter(|member| *member != id) {
                    registry.send(member, OutboundMessage::ok(command.as_str()).with_content(&key.content_id));
                }
            }
        }
        Ok(())
    }

    /// Diff the draft and push the result to preview connections. A failed
    /// render is reported to the editor that caused it.
    async fn push_changes(&self, origin: ConnectionId, key: &PreviewKey, previewers: &[ConnectionId]) {
        match self.preview.get_changes(key).await {
            Ok(changes) if changes.is_empty() => {}
            Ok(changes) => {
                let message = OutboundMessage::ok(Command::Changes.as_str())
                    .with_content(&key.content_id)
                    .with_changes(changes_to_json(changes));
                let registry = self.registry();
                for member in previewers {
                    registry.send(*member, message.clone());
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "preview push failed");
                let e = MessageError::from(e);
                self.registry()
                    .send(origin, OutboundMessage::error(Command::Changes.as_str(), &e));
            }
        }
    }

    /// Connections currently bound to `key`
    pub fn connections(&self, key: &PreviewKey) -> Vec<ConnectionId> {
        self.registry().sessions.get(key).cloned().unwrap_or_default()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn changes_to_json(changes: FragmentDiff) -> Value {
    Value::Object(
        changes
            .into_inner()
            .into_iter()
            .map(|(path, fragments)| (path, Value::from(fragments)))
            .collect::<Map<String, Value>>(),
    )
}

/// Best-effort command name of a message that failed to parse
fn raw_command(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v.get("command")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "error".to_string())
}
