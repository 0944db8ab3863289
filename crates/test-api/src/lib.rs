//! An in-memory conversation backend for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use journal_sync_model::{
    ApiError, ApiErrorKind, Conversation, ConversationApi, ConversationDetail,
    ConversationPatch, CreateConversation, Message, MessageId, MessagePage,
    MessagePreview, PageToken, Role, SendMessageRequest, SendMessageResponse,
};
use tokio::time::sleep;

pub use preset::*;

const DEFAULT_PAGE_SIZE: usize = 50;
const DEFAULT_TITLE: &str = "New Conversation";
/// 2024-01-01T00:00:00Z
const EPOCH_SECS: i64 = 1_704_067_200;

#[derive(Debug)]
pub struct Error {
    kind: ApiErrorKind,
    message: String,
}

impl Error {
    fn new<S: Into<String>>(kind: ApiErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ApiError for Error {
    #[inline]
    fn kind(&self) -> ApiErrorKind {
        self.kind
    }
}

/// The operations of [`ConversationApi`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiOp {
    ListConversations,
    GetConversation,
    CreateConversation,
    UpdateConversation,
    DeleteConversation,
    SendMessage,
    ListMessagesPage,
}

#[derive(Clone, Copy, Debug)]
struct ScriptedFailure {
    /// Calls numbered above this fail.
    after_call: u64,
    kind: ApiErrorKind,
}

struct StoredConversation {
    conversation: Conversation,
    messages: Vec<Message>,
}

#[derive(Default)]
struct Backend {
    ticks: i64,
    next_id: u64,
    conversations: Vec<StoredConversation>,

    delays: HashMap<ApiOp, Duration>,
    conversation_delays: HashMap<String, Duration>,
    failures: HashMap<ApiOp, ScriptedFailure>,
    calls: HashMap<ApiOp, u64>,
    page_size: Option<usize>,
    page_order: PageOrder,
    embed_messages: bool,
    reply_style: ReplyStyle,
}

impl Backend {
    /// Advances the fake clock by one second.
    fn tick(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        DateTime::<Utc>::from_timestamp(EPOCH_SECS, 0).unwrap_or_default()
            + TimeDelta::seconds(self.ticks)
    }

    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn find(&mut self, id: &str) -> Result<&mut StoredConversation, Error> {
        self.conversations
            .iter_mut()
            .find(|c| c.conversation.id == id)
            .ok_or_else(|| {
                Error::new(ApiErrorKind::NotFound, format!("no conversation {id}"))
            })
    }

    fn insert_conversation(&mut self, title: &str, archived: bool) -> Conversation {
        let id = self.mint_id("c");
        let now = self.tick();
        let conversation = Conversation {
            id,
            title: title.to_owned(),
            created_at: now,
            updated_at: now,
            archived,
            message_count: 0,
            last_message: None,
        };
        self.conversations.push(StoredConversation {
            conversation: conversation.clone(),
            messages: vec![],
        });
        conversation
    }

    fn append_message(
        &mut self,
        conversation_id: &str,
        role: Role,
        content: String,
    ) -> Result<(Message, Conversation), Error> {
        let id = self.mint_id("m");
        let now = self.tick();
        let stored = self.find(conversation_id)?;
        let message = Message {
            id: MessageId::canonical(id),
            role,
            content,
            created_at: now,
            conversation_id: conversation_id.to_owned(),
            metadata: None,
        };
        stored.messages.push(message.clone());
        let conversation = &mut stored.conversation;
        conversation.message_count += 1;
        conversation.last_message = Some(MessagePreview::from_message(&message));
        conversation.updated_at = now;
        Ok((message, conversation.clone()))
    }

    fn page(
        &mut self,
        conversation_id: &str,
        page: Option<&PageToken>,
    ) -> Result<MessagePage, Error> {
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let order = self.page_order;
        let stored = self.find(conversation_id)?;

        let index = match page {
            None => 0,
            Some(PageToken(token)) => token
                .strip_prefix("page:")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| {
                    Error::new(ApiErrorKind::Rejected, format!("bad page {token}"))
                })?,
        };
        let mut chunks: Vec<Vec<Message>> = stored
            .messages
            .chunks(page_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        if order == PageOrder::Reversed {
            chunks.reverse();
            for chunk in &mut chunks {
                chunk.reverse();
            }
        }

        let messages = chunks.get(index).cloned().unwrap_or_default();
        let next_page = (index + 1 < chunks.len())
            .then(|| PageToken(format!("page:{}", index + 1)));
        Ok(MessagePage {
            messages,
            next_page,
        })
    }
}

/// An in-memory conversation backend for testing purpose.
///
/// Clones share the same backend, so a test can keep one handle to
/// script and inspect the backend while the code under test owns
/// another.
///
/// Requests are counted when they start. Scripted delays are applied
/// before a request touches the backend, so a request dropped while it
/// is delayed has no effect.
#[derive(Clone, Default)]
pub struct TestConversationApi {
    backend: Arc<Mutex<Backend>>,
}

impl TestConversationApi {
    /// Creates a backend seeded with the given conversations.
    pub fn with_presets(presets: impl IntoIterator<Item = PresetConversation>) -> Self {
        let api = Self::default();
        for preset in presets {
            let conversation = api.with_backend(|b| {
                b.insert_conversation(&preset.title, preset.archived)
            });
            for msg in preset.messages {
                api.add_message(&conversation.id, msg.role, msg.content);
            }
        }
        api
    }

    #[inline]
    fn with_backend<R>(&self, f: impl FnOnce(&mut Backend) -> R) -> R {
        let mut backend =
            self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut backend)
    }

    /// Adds an active conversation.
    pub fn add_conversation(&self, title: &str) -> Conversation {
        self.with_backend(|b| b.insert_conversation(title, false))
    }

    /// Adds an archived conversation.
    pub fn add_archived_conversation(&self, title: &str) -> Conversation {
        self.with_backend(|b| b.insert_conversation(title, true))
    }

    /// Appends a message to a conversation.
    ///
    /// # Panics
    ///
    /// Panics if the conversation does not exist.
    pub fn add_message<S: Into<String>>(
        &self,
        conversation_id: &str,
        role: Role,
        content: S,
    ) -> Message {
        let content = content.into();
        match self.with_backend(|b| b.append_message(conversation_id, role, content)) {
            Ok((message, _)) => message,
            Err(err) => panic!("cannot add message: {err}"),
        }
    }

    /// Delays every request of an operation.
    pub fn set_delay(&self, op: ApiOp, delay: Duration) {
        self.with_backend(|b| b.delays.insert(op, delay));
    }

    /// Delays loading a specific conversation, on top of the per-operation
    /// delays.
    pub fn set_conversation_delay(&self, conversation_id: &str, delay: Duration) {
        self.with_backend(|b| {
            b.conversation_delays
                .insert(conversation_id.to_owned(), delay)
        });
    }

    /// Lets the next `successes` requests of an operation succeed and
    /// fails all later ones.
    pub fn fail_after(&self, op: ApiOp, successes: u64, kind: ApiErrorKind) {
        self.with_backend(|b| {
            let calls = b.calls.get(&op).copied().unwrap_or_default();
            b.failures.insert(
                op,
                ScriptedFailure {
                    after_call: calls + successes,
                    kind,
                },
            );
        });
    }

    /// Fails all further requests of an operation.
    #[inline]
    pub fn fail(&self, op: ApiOp, kind: ApiErrorKind) {
        self.fail_after(op, 0, kind);
    }

    /// Removes scripted failures of an operation.
    pub fn recover(&self, op: ApiOp) {
        self.with_backend(|b| b.failures.remove(&op));
    }

    /// Sets how many messages a page holds.
    pub fn set_page_size(&self, size: usize) {
        self.with_backend(|b| b.page_size = Some(size));
    }

    /// Sets the order in which pages are served.
    pub fn set_page_order(&self, order: PageOrder) {
        self.with_backend(|b| b.page_order = order);
    }

    /// Makes conversation details embed their messages instead of
    /// requiring pagination.
    pub fn set_embed_messages(&self, embed: bool) {
        self.with_backend(|b| b.embed_messages = embed);
    }

    /// Sets how sent messages are answered.
    pub fn set_reply_style(&self, style: ReplyStyle) {
        self.with_backend(|b| b.reply_style = style);
    }

    /// Returns how many requests of an operation have been made.
    pub fn calls(&self, op: ApiOp) -> u64 {
        self.with_backend(|b| b.calls.get(&op).copied().unwrap_or_default())
    }

    /// Returns every stored conversation, archived or not, in creation
    /// order.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.with_backend(|b| {
            b.conversations
                .iter()
                .map(|c| c.conversation.clone())
                .collect()
        })
    }

    /// Returns a stored conversation.
    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.with_backend(|b| b.find(id).ok().map(|c| c.conversation.clone()))
    }

    /// Returns the stored messages of a conversation.
    pub fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.with_backend(|b| {
            b.find(conversation_id)
                .map(|c| c.messages.clone())
                .unwrap_or_default()
        })
    }

    /// Counts the request, then waits out its delays and fails it if a
    /// failure is scripted.
    async fn begin(
        &self,
        op: ApiOp,
        conversation_id: Option<&str>,
    ) -> Result<(), Error> {
        let (delay, failure) = self.with_backend(|b| {
            let calls = b.calls.entry(op).or_default();
            *calls += 1;
            let call = *calls;

            let mut delay = b.delays.get(&op).copied().unwrap_or_default();
            if let Some(id) = conversation_id {
                delay += b
                    .conversation_delays
                    .get(id)
                    .copied()
                    .unwrap_or_default();
            }
            let failure = b
                .failures
                .get(&op)
                .filter(|f| call > f.after_call)
                .map(|f| f.kind);
            (delay, failure)
        });

        if !delay.is_zero() {
            sleep(delay).await;
        }
        match failure {
            Some(kind) => Err(Error::new(kind, format!("scripted {op:?} failure"))),
            None => Ok(()),
        }
    }
}

impl ConversationApi for TestConversationApi {
    type Error = Error;

    fn list_conversations(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static
    {
        let this = self.clone();
        async move {
            this.begin(ApiOp::ListConversations, None).await?;
            Ok(this.with_backend(|b| {
                let mut list: Vec<_> = b
                    .conversations
                    .iter()
                    .filter(|c| c.conversation.archived == archived)
                    .map(|c| c.conversation.clone())
                    .collect();
                list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                list
            }))
        }
    }

    fn get_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ConversationDetail, Self::Error>> + Send + 'static
    {
        let this = self.clone();
        let id = id.to_owned();
        async move {
            this.begin(ApiOp::GetConversation, Some(&id)).await?;
            this.with_backend(|b| {
                let embed = b.embed_messages;
                let stored = b.find(&id)?;
                Ok(ConversationDetail {
                    conversation: stored.conversation.clone(),
                    messages: embed.then(|| stored.messages.clone()),
                })
            })
        }
    }

    fn create_conversation(
        &self,
        opts: &CreateConversation,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let this = self.clone();
        let opts = opts.clone();
        async move {
            this.begin(ApiOp::CreateConversation, None).await?;
            this.with_backend(|b| {
                let title = opts.title.as_deref().unwrap_or(DEFAULT_TITLE);
                let mut conversation = b.insert_conversation(title, false);
                if let Some(content) = opts.initial_message {
                    let reply = format!("You said {content}");
                    b.append_message(&conversation.id, Role::User, content)?;
                    (_, conversation) = b.append_message(
                        &conversation.id,
                        Role::Assistant,
                        reply,
                    )?;
                }
                Ok(conversation)
            })
        }
    }

    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let this = self.clone();
        let id = id.to_owned();
        let patch = patch.clone();
        async move {
            this.begin(ApiOp::UpdateConversation, Some(&id)).await?;
            this.with_backend(|b| {
                let now = b.tick();
                let conversation = &mut b.find(&id)?.conversation;
                if let Some(title) = patch.title {
                    conversation.title = title;
                }
                if let Some(archived) = patch.archived {
                    conversation.archived = archived;
                }
                conversation.updated_at = now;
                Ok(conversation.clone())
            })
        }
    }

    fn delete_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let this = self.clone();
        let id = id.to_owned();
        async move {
            this.begin(ApiOp::DeleteConversation, Some(&id)).await?;
            this.with_backend(|b| {
                b.find(&id)?;
                b.conversations.retain(|c| c.conversation.id != id);
                Ok(())
            })
        }
    }

    fn send_message(
        &self,
        req: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageResponse, Self::Error>> + Send + 'static
    {
        let this = self.clone();
        let req = req.clone();
        async move {
            this.begin(ApiOp::SendMessage, Some(&req.conversation_id))
                .await?;
            if req.content.trim().is_empty() {
                return Err(Error::new(ApiErrorKind::Rejected, "message is empty"));
            }
            this.with_backend(|b| {
                let reply = format!("You said {}", req.content);
                let (user_message, _) = b.append_message(
                    &req.conversation_id,
                    Role::User,
                    req.content,
                )?;
                let (assistant_message, conversation) = b.append_message(
                    &req.conversation_id,
                    Role::Assistant,
                    reply,
                )?;
                let conversation = Some(conversation);
                Ok(match b.reply_style {
                    ReplyStyle::Full => SendMessageResponse {
                        user_message: Some(user_message),
                        assistant_message: Some(assistant_message),
                        reply_text: None,
                        conversation,
                    },
                    ReplyStyle::Legacy => SendMessageResponse {
                        reply_text: Some(assistant_message.content),
                        conversation,
                        ..Default::default()
                    },
                    ReplyStyle::UserOnly => SendMessageResponse {
                        user_message: Some(user_message),
                        conversation,
                        ..Default::default()
                    },
                    ReplyStyle::Empty => SendMessageResponse {
                        conversation,
                        ..Default::default()
                    },
                })
            })
        }
    }

    fn list_messages_page(
        &self,
        conversation_id: &str,
        page: Option<&PageToken>,
    ) -> impl Future<Output = Result<MessagePage, Self::Error>> + Send + 'static
    {
        let this = self.clone();
        let conversation_id = conversation_id.to_owned();
        let page = page.cloned();
        async move {
            this.begin(ApiOp::ListMessagesPage, Some(&conversation_id))
                .await?;
            this.with_backend(|b| b.page(&conversation_id, page.as_ref()))
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_list_is_filtered_and_ordered() {
        let api = TestConversationApi::default();
        let older = api.add_conversation("Older");
        let archived = api.add_archived_conversation("Archived");
        let newer = api.add_conversation("Newer");

        let list = api.list_conversations(false).await.unwrap();
        let ids: Vec<_> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

        let list = api.list_conversations(true).await.unwrap();
        assert_eq!(list, vec![archived]);
    }

    #[tokio::test]
    async fn test_send_message() {
        let api = TestConversationApi::default();
        let conversation = api.add_conversation("Today");
        let req = SendMessageRequest {
            conversation_id: conversation.id.clone(),
            content: "hello".to_owned(),
        };

        let resp = api.send_message(&req).await.unwrap();
        assert_eq!(resp.user_message.unwrap().content, "hello");
        assert_eq!(resp.assistant_message.unwrap().content, "You said hello");
        let updated = resp.conversation.unwrap();
        assert_eq!(updated.message_count, 2);
        assert!(updated.updated_at > conversation.updated_at);

        api.set_reply_style(ReplyStyle::Legacy);
        let resp = api.send_message(&req).await.unwrap();
        assert!(resp.user_message.is_none());
        assert_eq!(resp.reply_text.as_deref(), Some("You said hello"));
        assert_eq!(api.messages(&conversation.id).len(), 4);
    }

    #[tokio::test]
    async fn test_pages() {
        let api = TestConversationApi::default();
        let conversation = api.add_conversation("Today");
        for i in 0..5 {
            api.add_message(&conversation.id, Role::User, format!("{i}"));
        }
        api.set_page_size(2);

        let first = api.list_messages_page(&conversation.id, None).await.unwrap();
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].content, "0");
        let last = api
            .list_messages_page(&conversation.id, Some(&PageToken("page:2".to_owned())))
            .await
            .unwrap();
        assert_eq!(last.messages.len(), 1);
        assert_eq!(last.next_page, None);

        api.set_page_order(PageOrder::Reversed);
        let first = api.list_messages_page(&conversation.id, None).await.unwrap();
        let contents: Vec<_> =
            first.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["4"]);
        assert_eq!(first.next_page, Some(PageToken("page:1".to_owned())));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let api = TestConversationApi::default();
        api.fail_after(ApiOp::ListConversations, 1, ApiErrorKind::Network);

        assert!(api.list_conversations(false).await.is_ok());
        let err = api.list_conversations(false).await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::Network);

        api.recover(ApiOp::ListConversations);
        assert!(api.list_conversations(false).await.is_ok());
        assert_eq!(api.calls(ApiOp::ListConversations), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_request_has_no_effect() {
        let api = TestConversationApi::default();
        let conversation = api.add_conversation("Today");
        api.set_delay(ApiOp::DeleteConversation, Duration::from_secs(5));

        let res =
            timeout(Duration::from_secs(1), api.delete_conversation(&conversation.id))
                .await;
        assert!(res.is_err());
        assert_eq!(api.calls(ApiOp::DeleteConversation), 1);
        assert!(api.conversation(&conversation.id).is_some());
    }

    #[tokio::test]
    async fn test_presets() {
        let api = TestConversationApi::with_presets([
            PresetConversation::new("Work").with_message(Role::User, "Busy day"),
            PresetConversation::new("Old").archived(),
        ]);
        let all = api.conversations();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message_count, 1);
        assert!(all[1].archived);
        assert_eq!(api.messages(&all[0].id)[0].content, "Busy day");
    }
}
