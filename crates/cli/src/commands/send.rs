// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cpost send` — operator message into an agent's inbox.
//!
//! The operator supplies a sender identity; the role → message-type
//! matrix and lateral policy are enforced exactly as for agents.

use crate::exit_error::ExitError;
use clap::Args;
use cpost_core::{utc_now_rfc3339, ConfigFile, Message, MessageType, Priority, Role};
use cpost_storage::{MailboxStore, SendOptions, StateDir};

#[derive(Args)]
pub struct SendArgs {
    /// Sender agent id
    #[arg(long)]
    pub from: String,
    /// Sender role (decides which message types are allowed)
    #[arg(long, value_parser = parse_role)]
    pub role: Role,
    /// Recipient agent id
    #[arg(long)]
    pub to: String,
    /// Message type
    #[arg(long = "type", value_parser = parse_message_type)]
    pub message_type: MessageType,
    /// JSON body
    #[arg(long, default_value = "{}")]
    pub body: String,
    /// Priority: low, normal, high, critical
    #[arg(long, default_value = "normal", value_parser = parse_priority)]
    pub priority: Priority,
}

pub fn run(state: &StateDir, args: SendArgs) -> Result<(), ExitError> {
    let config = ConfigFile::load(&state.config_path())
        .map_err(|e| ExitError::new(crate::exit_error::EXIT_VALIDATION, e.to_string()))?;

    let body: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&args.body)
        .map_err(|e| {
            ExitError::new(
                crate::exit_error::EXIT_VALIDATION,
                format!("body is not a JSON object: {e}"),
            )
        })?;

    let message = Message::new(args.from.as_str(), args.to.as_str(), args.message_type)
        .with_priority(args.priority)
        .with_body(body);
    let options = SendOptions {
        lateral_messaging_enabled: config.supervisor.lateral_messaging_enabled,
        cc_orchestrator: config.supervisor.cc_orchestrator,
        orchestrator: None,
        known_agents: None,
    };

    let id = MailboxStore::new(state.messages_dir()).send(
        message,
        args.role,
        &options,
        chrono_now(),
    )?;
    println!("sent {id} at {}", utc_now_rfc3339());
    Ok(())
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

fn parse_role(s: &str) -> Result<Role, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown role: {s}"))
}

fn parse_message_type(s: &str) -> Result<MessageType, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown message type: {s}"))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown priority: {s}"))
}
