#![allow(clippy::unwrap_used, clippy::expect_used)]

use parley_core::{Message, ParleyError, Role, ToolCallRef};
use parley_session::{ClearMode, ConversationStore};

fn tool_round(store: &mut ConversationStore, ids: &[&str]) {
    let calls = ids
        .iter()
        .map(|id| ToolCallRef::new(*id, "get_date", "{}"))
        .collect();
    store
        .append(Message::assistant_turn(None, None, calls))
        .unwrap();
}

#[test]
fn full_tool_turn_is_accepted_in_order() {
    let mut store = ConversationStore::new("You are a helpful assistant");
    store.append(Message::user("What's the date?")).unwrap();
    tool_round(&mut store, &["call_0"]);
    store.append(Message::tool("call_0", "2025-12-01")).unwrap();
    store
        .append(Message::assistant("Today is 2025-12-01."))
        .unwrap();

    let roles: Vec<Role> = store.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant
        ]
    );
}

#[test]
fn no_tool_append_survives_a_clear_in_either_mode() {
    for mode in [ClearMode::KeepSystem, ClearMode::Empty] {
        let mut store = ConversationStore::with_clear_mode("sys", mode);
        store.append(Message::user("hi")).unwrap();
        tool_round(&mut store, &["call_0", "call_1"]);
        store.append(Message::tool("call_0", "a")).unwrap();

        store.clear();

        for id in ["call_0", "call_1"] {
            let err = store.append(Message::tool(id, "late")).unwrap_err();
            assert!(matches!(err, ParleyError::InvalidMessage(_)));
        }
        assert!(store.messages().iter().all(|m| m.role == Role::System));
    }
}

#[test]
fn parallel_calls_answered_in_any_order() {
    let mut store = ConversationStore::new("sys");
    store.append(Message::user("weather and date")).unwrap();
    tool_round(&mut store, &["call_a", "call_b"]);
    store.append(Message::tool("call_b", "cloudy")).unwrap();
    store.append(Message::tool("call_a", "2025-12-01")).unwrap();
    assert_eq!(store.len(), 5);
}

#[test]
fn misplaced_linkage_fields_are_rejected() {
    let mut store = ConversationStore::new("sys");

    let mut user = Message::user("hi");
    user.tool_call_id = Some("call_0".into());
    assert!(store.append(user).is_err());

    let mut user = Message::user("hi");
    user.tool_calls.push(ToolCallRef::new("call_0", "get_date", "{}"));
    assert!(store.append(user).is_err());

    assert_eq!(store.len(), 1);
}
