// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent durable mailboxes.
//!
//! One JSON file per agent under `messages/`, holding
//! `{ "messages": [...] }` in insertion order. Every mutation is a
//! locked read → modify → atomic-replace, so a crash at any point leaves
//! a parseable file.

use crate::error::StorageError;
use crate::fsio::{read_json_opt, write_json_atomic, FileLock};
use chrono::{DateTime, Utc};
use cpost_core::{AgentId, Message, MessageId, MessageType, Priority, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct MailboxFile {
    #[serde(default)]
    messages: Vec<Message>,
}

/// Filters for [`MailboxStore::query`]; all present filters must match.
#[derive(Debug, Default, Clone)]
pub struct MessageQuery {
    pub message_type: Option<MessageType>,
    pub from: Option<AgentId>,
    pub read: Option<bool>,
    pub priority: Option<Priority>,
}

impl MessageQuery {
    fn matches(&self, msg: &Message) -> bool {
        self.message_type.map_or(true, |t| msg.message_type == t)
            && self.from.as_ref().map_or(true, |f| &msg.from == f)
            && self.read.map_or(true, |r| msg.read == r)
            && self.priority.map_or(true, |p| msg.priority == p)
    }
}

/// Policy inputs for [`MailboxStore::send`].
#[derive(Debug, Default, Clone)]
pub struct SendOptions {
    pub lateral_messaging_enabled: bool,
    pub cc_orchestrator: bool,
    /// Orchestrator to CC on lateral messages
    pub orchestrator: Option<AgentId>,
    /// Known agents and their roles. When present, recipients are
    /// validated against it and lateral policy can see recipient roles.
    pub known_agents: Option<HashMap<AgentId, Role>>,
}

/// Store of per-agent mailbox files.
#[derive(Debug, Clone)]
pub struct MailboxStore {
    dir: PathBuf,
}

impl MailboxStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn mailbox_path(&self, agent: &AgentId) -> PathBuf {
        self.dir.join(format!("{}.json", agent))
    }

    fn load(&self, path: &Path) -> Result<MailboxFile, StorageError> {
        Ok(read_json_opt(path)?.unwrap_or_default())
    }

    /// All messages for an agent in insertion order; empty if no mailbox
    /// exists yet.
    pub fn read(&self, agent: &AgentId) -> Result<Vec<Message>, StorageError> {
        Ok(self.load(&self.mailbox_path(agent))?.messages)
    }

    pub fn get(&self, agent: &AgentId, id: &MessageId) -> Result<Option<Message>, StorageError> {
        Ok(self.read(agent)?.into_iter().find(|m| &m.id == id))
    }

    pub fn query(
        &self,
        agent: &AgentId,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, StorageError> {
        Ok(self
            .read(agent)?
            .into_iter()
            .filter(|m| query.matches(m))
            .collect())
    }

    /// Append a fully-formed message to one mailbox.
    pub fn append(&self, agent: &AgentId, message: Message) -> Result<(), StorageError> {
        if message.id.as_str().is_empty() {
            return Err(StorageError::Validation(
                "message has no id; route through send()".to_string(),
            ));
        }
        let path = self.mailbox_path(agent);
        let _lock = FileLock::acquire(&path)?;
        let mut file = self.load(&path)?;
        file.messages.push(message);
        write_json_atomic(&path, &file)
    }

    /// Flip the `read` flag on one message.
    pub fn mark_read(&self, agent: &AgentId, id: &MessageId) -> Result<(), StorageError> {
        self.mutate(agent, id, |msg| msg.read = true)
    }

    /// Remove one message after processing.
    pub fn delete(&self, agent: &AgentId, id: &MessageId) -> Result<(), StorageError> {
        let path = self.mailbox_path(agent);
        let _lock = FileLock::acquire(&path)?;
        let mut file = self.load(&path)?;
        let before = file.messages.len();
        file.messages.retain(|m| &m.id != id);
        if file.messages.len() == before {
            return Err(StorageError::not_found("message", id.as_str()));
        }
        write_json_atomic(&path, &file)
    }

    fn mutate(
        &self,
        agent: &AgentId,
        id: &MessageId,
        f: impl FnOnce(&mut Message),
    ) -> Result<(), StorageError> {
        let path = self.mailbox_path(agent);
        let _lock = FileLock::acquire(&path)?;
        let mut file = self.load(&path)?;
        let msg = file
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| StorageError::not_found("message", id.as_str()))?;
        f(msg);
        write_json_atomic(&path, &file)
    }

    /// Validated send: assigns id and timestamp, enforces the role →
    /// message-type matrix and the lateral-messaging policy, validates
    /// the recipient when a known-agent set is supplied, and fans out to
    /// CC recipients without double-delivering to the primary.
    ///
    /// A policy violation returns `Validation` and writes nothing.
    pub fn send(
        &self,
        mut message: Message,
        sender_role: Role,
        options: &SendOptions,
        now: DateTime<Utc>,
    ) -> Result<MessageId, StorageError> {
        if !sender_role.may_send(message.message_type) {
            let allowed: Vec<String> = sender_role
                .allowed_message_types()
                .iter()
                .map(|t| t.to_string())
                .collect();
            return Err(StorageError::Validation(format!(
                "role {} may not send {}; allowed types: [{}]",
                sender_role,
                message.message_type,
                allowed.join(", ")
            )));
        }

        let recipient_role = match &options.known_agents {
            Some(known) => match known.get(&message.to) {
                Some(role) => Some(*role),
                None => {
                    return Err(StorageError::Validation(format!(
                        "unknown recipient: {}",
                        message.to
                    )))
                }
            },
            None => None,
        };

        // Lateral policy: worker→worker traffic is peer_message only, and
        // only when enabled.
        let sender_is_worker = matches!(sender_role, Role::Worker | Role::Specialist);
        let recipient_is_worker =
            matches!(recipient_role, Some(Role::Worker) | Some(Role::Specialist));
        let lateral = sender_is_worker && recipient_is_worker;
        if lateral {
            if !options.lateral_messaging_enabled {
                return Err(StorageError::Validation(
                    "lateral messaging is disabled".to_string(),
                ));
            }
            if message.message_type != MessageType::PeerMessage {
                return Err(StorageError::Validation(format!(
                    "lateral messages must be peer_message, got {}",
                    message.message_type
                )));
            }
            if options.cc_orchestrator {
                if let Some(orch) = &options.orchestrator {
                    if !message.cc.contains(orch) {
                        message.cc.push(orch.clone());
                    }
                }
            }
        }

        message.id = MessageId::generate();
        message.timestamp = now;

        let id = message.id.clone();
        let primary = message.to.clone();
        self.append(&primary, message.clone())?;

        for cc in message.cc.clone() {
            if cc == primary {
                continue;
            }
            let mut copy = message.clone();
            copy.to = cc.clone();
            self.append(&cc, copy)?;
        }

        tracing::debug!(
            from = %message.from,
            to = %primary,
            message_type = %message.message_type,
            "message delivered"
        );
        Ok(id)
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
