//! Maps one parsed chat message onto a manager operation and renders the
//! JSON reply.

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::command::{parse_command, Command, ParsedCommand};
use crate::manager::{InspirationManager, PendingImage};
use crate::tags::compose_text;

/// Reply to one message plus the held image it consumed or dropped, if any.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub command: Command,
    pub body: Value,
    pub released_image: Option<PendingImage>,
}

pub async fn dispatch_message(
    manager: &InspirationManager,
    user_id: &str,
    text: &str,
) -> Dispatched {
    let parsed = parse_command(text);
    debug!(
        "dispatching {} for user {}",
        parsed.command.as_str(),
        user_id
    );
    let mut released_image = None;

    let (command, body) = match parsed.command {
        Command::Save => {
            let (body, consumed) = save(manager, user_id, &parsed).await;
            released_image = consumed;
            (Command::Save, body)
        }
        Command::None if parsed.auto_save => {
            let (mut body, consumed) = save(manager, user_id, &parsed).await;
            released_image = consumed;
            with_field(&mut body, "autoSave", Value::Bool(true));
            (Command::Save, body)
        }
        Command::None => (Command::None, failure("no command", "no_command")),
        Command::List => {
            let tag = Some(parsed.params.as_str()).filter(|tag| !tag.is_empty());
            (Command::List, manager.list(user_id, tag, None).await.to_json())
        }
        Command::Edit => {
            let body = if parsed.params.is_empty() {
                failure("usage: <id> <new text> /e", "format")
            } else {
                let text = compose_text(&parsed.content, &parsed.tags);
                manager
                    .edit(user_id, &parsed.params, &text)
                    .await
                    .to_json_with(|record| json!({ "inspiration": record }))
            };
            (Command::Edit, body)
        }
        Command::Delete => {
            let body = if parsed.params.is_empty() {
                failure("usage: <id> /d", "format")
            } else {
                manager
                    .delete(user_id, &parsed.params)
                    .await
                    .to_json_with(|record| json!({ "inspiration": record }))
            };
            (Command::Delete, body)
        }
        Command::Temp => {
            let body = match manager.pending_image(user_id) {
                Some(image) => {
                    let age = (Utc::now() - image.created_at).num_seconds().max(0);
                    json!({ "success": true, "image": image, "ageSeconds": age })
                }
                None => json!({ "success": true, "image": Value::Null }),
            };
            (Command::Temp, body)
        }
        Command::Drop => {
            let dropped = manager.drop_image(user_id);
            let body = json!({ "success": true, "dropped": dropped.is_some() });
            released_image = dropped;
            (Command::Drop, body)
        }
        Command::Profile => (
            Command::Profile,
            manager
                .profile(user_id)
                .await
                .to_json_with(|profile| json!({ "profile": profile })),
        ),
        Command::Search => {
            let keyword = if parsed.content.is_empty() {
                parsed.tags.first().cloned().unwrap_or_default()
            } else {
                parsed.content.clone()
            };
            let body = if keyword.is_empty() {
                failure("usage: <keyword> /f", "format")
            } else {
                manager.search(user_id, &keyword).await.to_json()
            };
            (Command::Search, body)
        }
    };

    let mut body = body;
    with_field(
        &mut body,
        "command",
        Value::String(command.as_str().to_string()),
    );
    Dispatched {
        command,
        body,
        released_image,
    }
}

/// Run a save and report which held image it used up. A parked save keeps
/// the image for the replay, so nothing is released then.
async fn save(
    manager: &InspirationManager,
    user_id: &str,
    parsed: &ParsedCommand,
) -> (Value, Option<PendingImage>) {
    let held = manager.pending_image(user_id);
    let text = compose_text(&parsed.content, &parsed.tags);
    let outcome = manager.save(user_id, &text).await;
    let consumed = if outcome.is_success() { held } else { None };
    let body = outcome.to_json_with(|record| json!({ "inspiration": record }));
    (body, consumed)
}

fn failure(message: &str, kind: &str) -> Value {
    json!({ "success": false, "error": message, "errorKind": kind })
}

fn with_field(body: &mut Value, key: &str, value: Value) {
    if let Value::Object(fields) = body {
        fields.insert(key.to_string(), value);
    } else {
        let mut fields = Map::new();
        fields.insert(key.to_string(), value);
        *body = Value::Object(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAllGate;
    use crate::record_store::MemoryRecordStore;
    use std::sync::Arc;

    fn manager() -> (Arc<MemoryRecordStore>, InspirationManager) {
        let store = Arc::new(MemoryRecordStore::new());
        let manager = InspirationManager::new(store.clone(), Arc::new(AllowAllGate));
        (store, manager)
    }

    #[tokio::test]
    async fn plain_text_is_not_a_command() {
        let (store, manager) = manager();
        let reply = dispatch_message(&manager, "U1", "just chatting").await;
        assert_eq!(reply.command, Command::None);
        assert_eq!(reply.body["success"], false);
        assert_eq!(reply.body["error"], "no command");
        assert_eq!(reply.body["command"], "none");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn tagged_text_auto_saves() {
        let (store, manager) = manager();
        let reply = dispatch_message(&manager, "U1", "#design brainstorm").await;
        assert_eq!(reply.command, Command::Save);
        assert_eq!(reply.body["success"], true);
        assert_eq!(reply.body["autoSave"], true);
        assert_eq!(reply.body["inspiration"]["content"], "brainstorm");
        assert_eq!(store.records("U1").len(), 1);
    }

    #[tokio::test]
    async fn edit_without_id_is_a_format_error() {
        let (_, manager) = manager();
        let reply = dispatch_message(&manager, "U1", "new words /e").await;
        assert_eq!(reply.body["success"], false);
        assert_eq!(reply.body["errorKind"], "format");
        assert_eq!(reply.body["command"], "edit");
    }

    #[tokio::test]
    async fn save_reports_consumed_image() {
        let (_, manager) = manager();
        manager.hold_image("U1", "/tmp/x.jpg", "x.jpg");
        let reply = dispatch_message(&manager, "U1", "sketch /s").await;
        assert_eq!(reply.body["success"], true);
        assert_eq!(
            reply.released_image.map(|image| image.local_ref),
            Some("/tmp/x.jpg".to_string())
        );
    }

    #[tokio::test]
    async fn temp_and_drop_report_held_image() {
        let (_, manager) = manager();
        let empty = dispatch_message(&manager, "U1", "/t").await;
        assert!(empty.body["image"].is_null());

        manager.hold_image("U1", "/tmp/x.jpg", "x.jpg");
        let held = dispatch_message(&manager, "U1", "/temp").await;
        assert_eq!(held.body["image"]["displayName"], "x.jpg");

        let dropped = dispatch_message(&manager, "U1", "/x").await;
        assert_eq!(dropped.body["dropped"], true);
        assert!(dropped.released_image.is_some());
        assert!(manager.pending_image("U1").is_none());
    }

    #[tokio::test]
    async fn search_falls_back_to_tag_keyword() {
        let (_, manager) = manager();
        dispatch_message(&manager, "U1", "coffee layout #cafe /s").await;
        let reply = dispatch_message(&manager, "U1", "#cafe /f").await;
        assert_eq!(reply.body["keyword"], "cafe");
        assert_eq!(reply.body["inspirations"].as_array().map(Vec::len), Some(1));
    }
}
