use std::time::Duration;

use journal_sync_model::{
    ApiErrorKind, ConversationPatch, Message, MessageId, Role,
};
use journal_sync_test_api::{ApiOp, ReplyStyle, TestConversationApi};

use super::*;
use crate::StoreConfigBuilder;
use crate::error::ErrorKind;
use crate::reconciler::FALLBACK_REPLY;

fn build_store(api: &TestConversationApi) -> ConversationStore {
    StoreBuilder::with_api(api.clone()).build()
}

fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

fn count_role(messages: &[Message], role: Role) -> usize {
    messages.iter().filter(|m| m.role == role).count()
}

fn is_settled(messages: &[Message]) -> bool {
    messages.iter().all(|m| !m.id.is_provisional())
}

/// Two conversations, "Morning" being the most recent one.
fn two_conversations() -> (TestConversationApi, String, String) {
    let api = TestConversationApi::default();
    let evening = api.add_conversation("Evening");
    api.add_message(&evening.id, Role::User, "Long day");
    api.add_message(&evening.id, Role::Assistant, "Tell me about it.");
    let morning = api.add_conversation("Morning");
    api.add_message(&morning.id, Role::User, "Slept well");
    (api, morning.id, evening.id)
}

#[tokio::test(start_paused = true)]
async fn test_initialize_activates_most_recent() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    assert_eq!(store.snapshot().stage, Stage::Uninitialized);

    store.initialize().await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.stage, Stage::Ready);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.current_id(), Some(morning.as_str()));
    let ids: Vec<_> = snapshot.conversations.iter().map(|c| &c.id).collect();
    assert_eq!(ids, vec![&morning, &evening]);
    assert_eq!(contents(&snapshot.messages), vec!["Slept well"]);
}

#[tokio::test(start_paused = true)]
async fn test_initialize_creates_when_empty() {
    let api = TestConversationApi::default();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    let created = api.conversations();
    assert_eq!(created.len(), 1);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(created[0].id.as_str()));
    assert_eq!(snapshot.conversations, created);
    assert!(snapshot.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_initialize_failure() {
    let api = TestConversationApi::default();
    api.fail(ApiOp::ListConversations, ApiErrorKind::Unauthorized);
    let store = build_store(&api);

    let err = store.initialize().await.unwrap_err();
    assert!(err.needs_reauth());
    let snapshot = store.snapshot();
    assert_eq!(snapshot.stage, Stage::Ready);
    assert_eq!(snapshot.error, Some(err));
    assert_eq!(api.calls(ApiOp::CreateConversation), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_switches() {
    let api = TestConversationApi::default();
    let targets: Vec<_> = (0..4)
        .map(|i| {
            let conversation = api.add_conversation(&format!("Day {i}"));
            api.add_message(&conversation.id, Role::User, format!("note {i}"));
            // Earlier requests answer later.
            api.set_conversation_delay(
                &conversation.id,
                Duration::from_secs(4 - i),
            );
            conversation.id
        })
        .collect();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    let mut rx = store.subscribe();
    let switches: Vec<_> = targets
        .iter()
        .map(|id| store.switch_conversation(id.clone()))
        .collect();
    let watcher = tokio::spawn(async move {
        let mut seen = vec![];
        while rx.changed().await.is_ok() {
            let current = rx.borrow_and_update().current_id().map(str::to_owned);
            seen.push(current);
        }
        seen
    });
    for switch in switches {
        switch.await.unwrap();
    }

    let snapshot = store.snapshot();
    let last = &targets[3];
    assert_eq!(snapshot.current_id(), Some(last.as_str()));
    assert_eq!(contents(&snapshot.messages), vec!["note 3"]);
    assert!(!snapshot.is_loading);

    store.teardown().await;
    drop(store);
    let seen = watcher.await.unwrap();
    // Nothing but the last target was ever activated after the switches.
    assert!(seen.iter().flatten().all(|id| id == last));
}

#[tokio::test(start_paused = true)]
async fn test_switch_then_switch_back() {
    for slow_first in [true, false] {
        let (api, morning, evening) = two_conversations();
        let store = build_store(&api);
        store.initialize().await.unwrap();

        let (slow, fast) = if slow_first {
            (&evening, &morning)
        } else {
            (&morning, &evening)
        };
        api.set_conversation_delay(slow, Duration::from_secs(3));
        api.set_conversation_delay(fast, Duration::from_secs(1));

        let to_evening = store.switch_conversation(evening.clone());
        let to_morning = store.switch_conversation(morning.clone());
        to_morning.await.unwrap();
        to_evening.await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.current_id(), Some(morning.as_str()));
        assert_eq!(contents(&snapshot.messages), vec!["Slept well"]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_switch_failure_keeps_state() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();
    let before = store.snapshot();

    api.fail(ApiOp::GetConversation, ApiErrorKind::Network);
    let err = store.switch_conversation(evening).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(morning.as_str()));
    assert_eq!(snapshot.messages, before.messages);
    assert_eq!(snapshot.error, Some(err));
}

#[tokio::test(start_paused = true)]
async fn test_switch_to_missing_conversation() {
    let (api, morning, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    let err = store.switch_conversation("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.snapshot().current_id(), Some(morning.as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_switch_timeout_is_silent() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_conversation_delay(&evening, Duration::from_secs(20));
    store.switch_conversation(evening).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(morning.as_str()));
    assert_eq!(snapshot.error, None);
    assert!(!snapshot.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_switch_with_partial_history() {
    let (api, _, evening) = two_conversations();
    for i in 0..3 {
        api.add_message(&evening, Role::User, format!("more {i}"));
    }
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_page_size(2);
    api.fail_after(ApiOp::ListMessagesPage, 1, ApiErrorKind::Server);
    let err = store.switch_conversation(evening.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert_eq!(
        contents(&snapshot.messages),
        vec!["Long day", "Tell me about it."]
    );
    assert_eq!(snapshot.error, Some(err));
}

#[tokio::test(start_paused = true)]
async fn test_embedded_messages_skip_pagination() {
    let (api, _, evening) = two_conversations();
    api.set_embed_messages(true);
    let store = build_store(&api);
    store.initialize().await.unwrap();
    store.switch_conversation(evening).await.unwrap();

    assert_eq!(api.calls(ApiOp::ListMessagesPage), 0);
    assert_eq!(store.snapshot().messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_send_message() {
    let (api, morning, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();
    let before = store.snapshot().messages;

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(2));
    let mut rx = store.subscribe();
    let send = store.send_message("hello");

    let optimistic = rx.wait_for(|s| s.is_sending).await.unwrap().clone();
    let n = optimistic.messages.len();
    assert_eq!(n, before.len() + 2);
    assert!(matches!(optimistic.messages[n - 2].id, MessageId::Temporary(_)));
    assert_eq!(optimistic.messages[n - 2].content, "hello");
    assert!(optimistic.messages[n - 1].is_placeholder());

    send.await.unwrap();

    let snapshot = store.snapshot();
    assert!(!snapshot.is_sending);
    let stored = api.messages(&morning);
    let (user, assistant) = (&stored[stored.len() - 2], &stored[stored.len() - 1]);
    assert_eq!(snapshot.messages[..before.len()], before[..]);
    assert_eq!(snapshot.messages[before.len()..], [user.clone(), assistant.clone()]);
    assert_eq!(assistant.content, "You said hello");

    let updated = api.conversation(&morning).unwrap();
    assert_eq!(snapshot.conversations[0], updated);
    assert_eq!(snapshot.current_conversation, Some(updated));
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_rolls_back() {
    let (api, _, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();
    let before = store.snapshot();

    api.fail(ApiOp::SendMessage, ApiErrorKind::Server);
    let err = store.send_message("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.messages, before.messages);
    assert_eq!(snapshot.conversations, before.conversations);
    assert!(!snapshot.is_sending);
    assert_eq!(snapshot.error, Some(err));
}

#[tokio::test(start_paused = true)]
async fn test_send_timeout_is_silent() {
    let (api, morning, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();
    let before = store.snapshot();

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(60));
    store.send_message("hello").await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.messages, before.messages);
    assert!(is_settled(&snapshot.messages));
    assert!(!snapshot.is_sending);
    assert_eq!(snapshot.error, None);
    assert_eq!(api.messages(&morning).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_send_timeout() {
    let (api, _, _) = two_conversations();
    let config = StoreConfigBuilder::new()
        .with_send_timeout(Duration::from_secs(1))
        .build();
    let store = StoreBuilder::with_api(api.clone())
        .with_config(config)
        .build();
    store.initialize().await.unwrap();

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(2));
    store.send_message("hello").await.unwrap();
    assert!(!store.snapshot().is_sending);
    assert_eq!(count_role(&store.snapshot().messages, Role::Assistant), 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_is_single_flight() {
    let (api, morning, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(2));
    let first = store.send_message("one");
    let err = store.send_message("two").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    first.await.unwrap();

    assert_eq!(api.calls(ApiOp::SendMessage), 1);
    assert_eq!(store.snapshot().error, None);
    let messages = store.snapshot().messages;
    assert_eq!(count_role(&messages, Role::User), 2);
    assert_eq!(api.messages(&morning).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_send_validation() {
    let (api, _, _) = two_conversations();
    let store = build_store(&api);

    let err = store.send_message("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    store.initialize().await.unwrap();
    let before = store.snapshot();
    let too_long = "a".repeat(2001);
    for content in ["", "  \n ", too_long.as_str()] {
        let err = store.send_message(content).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    store.send_message("a".repeat(2000)).await.unwrap();

    assert_eq!(api.calls(ApiOp::SendMessage), 1);
    assert_eq!(store.snapshot().messages.len(), before.messages.len() + 2);
    assert_eq!(store.snapshot().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_replies() {
    let (api, _, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_reply_style(ReplyStyle::Empty);
    store.send_message("anyone there?").await.unwrap();
    let messages = store.snapshot().messages;
    let n = messages.len();
    assert!(is_settled(&messages));
    assert_eq!(messages[n - 2].content, "anyone there?");
    assert_eq!(messages[n - 1].role, Role::Assistant);
    assert_eq!(messages[n - 1].content, FALLBACK_REPLY);

    api.set_reply_style(ReplyStyle::Legacy);
    store.send_message("hello").await.unwrap();
    let messages = store.snapshot().messages;
    let n = messages.len();
    assert!(matches!(messages[n - 1].id, MessageId::Synthesized(_)));
    assert_eq!(messages[n - 1].content, "You said hello");
    assert_eq!(count_role(&messages, Role::User), 3);
    assert_eq!(count_role(&messages, Role::Assistant), 2);
}

#[tokio::test(start_paused = true)]
async fn test_switch_mid_send() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(3));
    let send = store.send_message("hello");
    store.switch_conversation(evening.clone()).await.unwrap();
    send.await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert_eq!(
        contents(&snapshot.messages),
        vec!["Long day", "Tell me about it."]
    );
    let entry = snapshot
        .conversations
        .iter()
        .find(|c| c.id == morning)
        .unwrap();
    assert_eq!(entry.message_count, 3);

    store.switch_conversation(morning).await.unwrap();
    let messages = store.snapshot().messages;
    assert_eq!(contents(&messages), vec!["Slept well", "hello", "You said hello"]);
}

#[tokio::test(start_paused = true)]
async fn test_reload_during_send() {
    let (api, morning, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(3));
    let send = store.send_message("hello");
    store.switch_conversation(morning).await.unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.is_sending);
    assert_eq!(snapshot.messages.len(), 3);
    assert!(snapshot.messages[2].is_placeholder());

    send.await.unwrap();
    let messages = store.snapshot().messages;
    assert!(is_settled(&messages));
    assert_eq!(contents(&messages), vec!["Slept well", "hello", "You said hello"]);
}

#[tokio::test(start_paused = true)]
async fn test_create_with_initial_message() {
    let (api, _, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    store
        .create_new_conversation(Some("First entry".to_owned()))
        .await
        .unwrap();

    let snapshot = store.snapshot();
    let created = snapshot.conversations[0].clone();
    assert_eq!(snapshot.conversations.len(), 3);
    assert_eq!(snapshot.current_conversation, Some(created.clone()));
    assert_eq!(created.message_count, 2);
    assert_eq!(
        contents(&snapshot.messages),
        vec!["First entry", "You said First entry"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_rejects_invalid_message() {
    let (api, _, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    let err = store
        .create_new_conversation(Some(" ".to_owned()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(api.calls(ApiOp::CreateConversation), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_title() {
    let (api, morning, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    store
        .update_current_conversation(ConversationPatch::title("Sunrise"))
        .await
        .unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_conversation.unwrap().title, "Sunrise");
    let entry = snapshot
        .conversations
        .iter()
        .find(|c| c.id == morning)
        .unwrap();
    assert_eq!(entry.title, "Sunrise");

    let err = store
        .update_current_conversation(ConversationPatch::title(""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(api.calls(ApiOp::UpdateConversation), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_active_conversation() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    store.delete_conversation(morning.clone()).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert_eq!(snapshot.conversations.len(), 1);
    assert_eq!(contents(&snapshot.messages), vec!["Long day", "Tell me about it."]);
    assert!(api.conversation(&morning).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_inactive_conversation() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    store.delete_conversation(evening).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(morning.as_str()));
    assert_eq!(snapshot.conversations.len(), 1);
    assert_eq!(api.calls(ApiOp::GetConversation), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_only_conversation() {
    let api = TestConversationApi::default();
    let only = api.add_conversation("Only");
    let store = build_store(&api);
    store.initialize().await.unwrap();

    store.delete_conversation(only.id.clone()).await.unwrap();

    let snapshot = store.snapshot();
    let current = snapshot.current_conversation.unwrap();
    assert_ne!(current.id, only.id);
    assert_eq!(snapshot.conversations, vec![current]);
    assert!(snapshot.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_failure() {
    let (api, morning, _) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.fail(ApiOp::DeleteConversation, ApiErrorKind::Server);
    let err = store.delete_conversation(morning.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(morning.as_str()));
    assert_eq!(snapshot.conversations.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_archive_active_conversation() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    store.archive_conversation(morning.clone(), true).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert!(snapshot.conversations.iter().all(|c| c.id != morning));
    assert!(api.conversation(&morning).unwrap().archived);

    store.archive_conversation(evening.clone(), true).await.unwrap();
    let snapshot = store.snapshot();
    let current = snapshot.current_conversation.unwrap();
    assert!(current.id != morning && current.id != evening);
    assert!(!current.archived);
    assert_eq!(snapshot.conversations, vec![current]);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_show_archived() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();
    store.archive_conversation(evening.clone(), true).await.unwrap();

    store.toggle_show_archived().await.unwrap();
    let snapshot = store.snapshot();
    assert!(snapshot.show_archived);
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert_eq!(snapshot.conversations.len(), 1);

    // Restoring it moves it out of the archive view, which is now empty.
    store.archive_conversation(evening.clone(), false).await.unwrap();
    let snapshot = store.snapshot();
    assert!(snapshot.conversations.is_empty());
    assert_eq!(snapshot.current_conversation, None);
    assert_eq!(api.calls(ApiOp::CreateConversation), 0);

    store.toggle_show_archived().await.unwrap();
    let snapshot = store.snapshot();
    assert!(!snapshot.show_archived);
    assert_eq!(snapshot.conversations.len(), 2);
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert!(snapshot.conversations.iter().any(|c| c.id == morning));
}

#[tokio::test(start_paused = true)]
async fn test_teardown() {
    let (api, _, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(3));
    let send = store.send_message("hello");
    store.teardown().await;

    let err = send.await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TornDown);
    let err = store.switch_conversation(evening).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TornDown);
    assert_eq!(store.snapshot().stage, Stage::TornDown);
    assert!(store.is_torn_down());
}

#[tokio::test(start_paused = true)]
async fn test_initialize_then_switch() {
    let (api, morning, evening) = two_conversations();
    api.set_delay(ApiOp::ListConversations, Duration::from_secs(2));
    let store = build_store(&api);

    let initialize = store.initialize();
    store.switch_conversation(evening.clone()).await.unwrap();
    assert_eq!(store.snapshot().current_id(), Some(evening.as_str()));

    // The list arrives after the switch and must not undo it.
    initialize.await.unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert_eq!(contents(&snapshot.messages), vec!["Long day", "Tell me about it."]);
    let ids: Vec<_> = snapshot.conversations.iter().map(|c| &c.id).collect();
    assert_eq!(ids, vec![&morning, &evening]);
    assert_eq!(snapshot.stage, Stage::Ready);
    assert_eq!(api.calls(ApiOp::GetConversation), 1);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_then_switch() {
    let (api, morning, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();
    store.archive_conversation(evening.clone(), true).await.unwrap();

    api.set_delay(ApiOp::ListConversations, Duration::from_secs(2));
    let toggle = store.toggle_show_archived();
    let switch = store.switch_conversation(morning.clone());
    switch.await.unwrap();
    toggle.await.unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.show_archived);
    assert_eq!(snapshot.current_id(), Some(morning.as_str()));
    assert_eq!(contents(&snapshot.messages), vec!["Slept well"]);
    let ids: Vec<_> = snapshot.conversations.iter().map(|c| &c.id).collect();
    assert_eq!(ids, vec![&evening]);
}

#[tokio::test(start_paused = true)]
async fn test_archive_during_newer_switch() {
    let (api, morning, evening) = two_conversations();
    let night = api.add_conversation("Night");
    let store = build_store(&api);
    store.initialize().await.unwrap();
    assert_eq!(store.snapshot().current_id(), Some(night.id.as_str()));

    api.set_delay(ApiOp::UpdateConversation, Duration::from_secs(2));
    api.set_conversation_delay(&evening, Duration::from_secs(5));
    let archive = store.archive_conversation(night.id.clone(), true);
    let switch = store.switch_conversation(evening.clone());
    archive.await.unwrap();
    switch.await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    assert!(snapshot.conversations.iter().all(|c| c.id != night.id));
    assert!(snapshot.conversations.iter().any(|c| c.id == morning));
    // Only the initial load and the requested switch hit the server.
    assert_eq!(api.calls(ApiOp::GetConversation), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_during_newer_switch() {
    let (api, morning, evening) = two_conversations();
    let night = api.add_conversation("Night");
    let store = build_store(&api);
    store.initialize().await.unwrap();

    api.set_delay(ApiOp::DeleteConversation, Duration::from_secs(1));
    api.set_conversation_delay(&evening, Duration::from_secs(5));
    let delete = store.delete_conversation(night.id.clone());
    let switch = store.switch_conversation(evening.clone());
    delete.await.unwrap();
    switch.await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_id(), Some(evening.as_str()));
    let ids: Vec<_> = snapshot.conversations.iter().map(|c| &c.id).collect();
    assert_eq!(ids, vec![&morning, &evening]);
}

#[tokio::test(start_paused = true)]
async fn test_stage_stays_ready_while_busy() {
    let (api, _, evening) = two_conversations();
    let store = build_store(&api);
    store.initialize().await.unwrap();
    let mut rx = store.subscribe();

    api.set_conversation_delay(&evening, Duration::from_secs(1));
    let switch = store.switch_conversation(evening.clone());
    let snapshot = rx.wait_for(|s| s.is_loading).await.unwrap().clone();
    assert_eq!(snapshot.stage, Stage::Ready);
    switch.await.unwrap();

    api.set_delay(ApiOp::SendMessage, Duration::from_secs(1));
    let send = store.send_message("hello");
    let snapshot = rx.wait_for(|s| s.is_sending).await.unwrap().clone();
    assert_eq!(snapshot.stage, Stage::Ready);
    assert!(!snapshot.is_loading);
    send.await.unwrap();
    assert!(!store.snapshot().is_sending);
}
