use journal_sync_actor::{Context, Message as ActorMessage, Reply};
use journal_sync_model::{
    Conversation, ConversationPatch, CreateConversation, Message,
    SendMessageRequest, SendMessageResponse,
};
use tokio::sync::watch;

use super::{Stage, StoreSnapshot};
use crate::api_client::ApiClient;
use crate::config::StoreConfig;
use crate::coordinator::{CancelToken, Coordinator, OpKind};
use crate::error::{Error, ErrorKind};
use crate::pagination::{PartialHistory, fetch_history, order_history};
use crate::reconciler::{PendingSend, Reconciler};

type OpReply = Reply<Result<(), Error>>;
type Ctx<'a> = Context<'a, StoreState>;

/// Whether a conversation must be activated after the list is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Activation {
    Always,
    IfNeeded,
}

pub struct StoreState {
    api: ApiClient,
    config: StoreConfig,
    coordinator: Coordinator,
    reconciler: Reconciler,

    conversations: Vec<Conversation>,
    current: Option<Conversation>,
    messages: Vec<Message>,
    pending_send: Option<PendingSend>,
    show_archived: bool,
    error: Option<Error>,
    stage: Stage,

    snapshot_tx: watch::Sender<StoreSnapshot>,
}

impl StoreState {
    pub fn new(
        api: ApiClient,
        config: StoreConfig,
    ) -> (Self, watch::Receiver<StoreSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(StoreSnapshot::default());
        let state = Self {
            api,
            config,
            coordinator: Coordinator::new(),
            reconciler: Reconciler::default(),
            conversations: vec![],
            current: None,
            messages: vec![],
            pending_send: None,
            show_archived: false,
            error: None,
            stage: Stage::Uninitialized,
            snapshot_tx,
        };
        (state, snapshot_rx)
    }

    #[inline]
    fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.id.as_str())
    }

    #[inline]
    fn is_loading(&self) -> bool {
        self.coordinator.in_flight(OpKind::Switch)
            || self.coordinator.in_flight(OpKind::Refresh)
    }

    /// Pushes the current state to subscribers.
    fn publish(&mut self) {
        if self.stage == Stage::Loading && !self.is_loading() {
            self.stage = Stage::Ready;
        }
        let snapshot = StoreSnapshot {
            conversations: self.conversations.clone(),
            current_conversation: self.current.clone(),
            messages: self.messages.clone(),
            is_loading: self.is_loading(),
            is_sending: self.pending_send.is_some(),
            error: self.error.clone(),
            show_archived: self.show_archived,
            stage: self.stage,
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Records a failure and hands it to the caller. Cancellations are
    /// swallowed.
    fn fail(&mut self, err: Error, reply: OpReply) {
        if err.is_cancelled() {
            debug!("operation dropped: {err}");
            reply.send(Ok(()));
            return;
        }
        self.error = Some(err.clone());
        reply.send(Err(err));
    }

    /// Mirrors a conversation returned by the server into the list and
    /// the active slot. Returns `false` if it does not match the archive
    /// filter.
    fn apply_conversation(&mut self, conversation: Conversation) -> bool {
        let visible = conversation.archived == self.show_archived;
        if self.current_id() == Some(conversation.id.as_str()) {
            self.current = Some(conversation.clone());
        }
        let pos = self
            .conversations
            .iter()
            .position(|c| c.id == conversation.id);
        match pos {
            Some(pos) if visible => self.conversations[pos] = conversation,
            Some(pos) => {
                self.conversations.remove(pos);
            }
            None if visible => self.conversations.insert(0, conversation),
            None => {}
        }
        visible
    }

    /// Whether a switch or create was started after `switch_gen` was
    /// read. The newer request then decides the active conversation.
    #[inline]
    fn switched_since(&self, switch_gen: u64) -> bool {
        self.coordinator.latest(OpKind::Switch) != switch_gen
    }

    fn spawn_refresh(
        &mut self,
        activation: Activation,
        switch_gen: u64,
        reply: OpReply,
        ctx: &mut Ctx<'_>,
    ) {
        let token = self
            .coordinator
            .issue(OpKind::Refresh, self.config.refresh_timeout);
        let archived = self.show_archived;
        let api = self.api.clone();
        let actor = ctx.actor().clone();
        ctx.spawn(async move {
            let result = api.list_conversations(archived, &token).await;
            actor
                .send(ConversationsListed {
                    token,
                    result,
                    activation,
                    switch_gen,
                    reply,
                })
                .ok();
        });
    }

    fn spawn_switch(&mut self, id: String, reply: OpReply, ctx: &mut Ctx<'_>) {
        let token = self
            .coordinator
            .issue(OpKind::Switch, self.config.switch_timeout);
        debug!("switching to {id} with {token}");
        let api = self.api.clone();
        let actor = ctx.actor().clone();
        ctx.spawn(async move {
            let result = load_conversation(&api, &id, &token).await;
            actor
                .send(ConversationLoaded {
                    id,
                    token,
                    result,
                    reply,
                })
                .ok();
        });
    }

    fn spawn_create(
        &mut self,
        initial_message: Option<String>,
        reply: OpReply,
        ctx: &mut Ctx<'_>,
    ) {
        let token = self
            .coordinator
            .issue(OpKind::Switch, self.config.switch_timeout);
        let api = self.api.clone();
        let actor = ctx.actor().clone();
        ctx.spawn(async move {
            let opts = CreateConversation::default();
            let result = api.create_conversation(&opts, &token).await;
            actor
                .send(ConversationCreated {
                    token,
                    result,
                    initial_message,
                    reply,
                })
                .ok();
        });
    }

    fn spawn_update(
        &mut self,
        id: String,
        patch: ConversationPatch,
        reply: OpReply,
        ctx: &mut Ctx<'_>,
    ) {
        let switch_gen = self.coordinator.latest(OpKind::Switch);
        let token = self
            .coordinator
            .issue(OpKind::Detached, self.config.switch_timeout);
        let api = self.api.clone();
        let actor = ctx.actor().clone();
        ctx.spawn(async move {
            let result = api.update_conversation(&id, &patch, &token).await;
            actor
                .send(ConversationUpdated {
                    result,
                    switch_gen,
                    reply,
                })
                .ok();
        });
    }

    /// Checks a message before anything is sent.
    fn validate_content(&self, content: &str) -> Result<(), Error> {
        if content.trim().is_empty() {
            return Err(Error::validation().with_reason("message is empty"));
        }
        let len = content.chars().count();
        if len > self.config.max_message_len {
            return Err(Error::validation().with_reason(format!(
                "message is too long ({len} > {} characters)",
                self.config.max_message_len
            )));
        }
        Ok(())
    }

    fn start_send(
        &mut self,
        content: String,
        reply: OpReply,
        ctx: &mut Ctx<'_>,
    ) {
        if let Err(err) = self.validate_content(&content) {
            reply.send(Err(err));
            return;
        }
        let Some(conversation_id) = self.current_id().map(str::to_owned) else {
            reply.send(Err(
                Error::validation().with_reason("no active conversation")
            ));
            return;
        };
        if self.pending_send.is_some() {
            reply.send(Err(
                Error::busy().with_reason("another message is being sent")
            ));
            return;
        }

        let content = content.trim().to_owned();
        let token = self
            .coordinator
            .issue(OpKind::Send, self.config.send_timeout);
        let pending =
            self.reconciler
                .begin(&mut self.messages, &conversation_id, &content);
        self.pending_send = Some(pending.clone());
        self.error = None;
        debug!("sending to {conversation_id} with {token}");

        let api = self.api.clone();
        let actor = ctx.actor().clone();
        ctx.spawn(async move {
            let req = SendMessageRequest {
                conversation_id,
                content,
            };
            let result = api.send_message(&req, &token).await;
            actor
                .send(MessageSent {
                    token,
                    pending,
                    result,
                    reply,
                })
                .ok();
        });
    }

    /// Activates the most recent listed conversation, or creates one.
    fn activate_fallback(&mut self, reply: OpReply, ctx: &mut Ctx<'_>) {
        if let Some(first) = self.conversations.first() {
            let id = first.id.clone();
            self.spawn_switch(id, reply, ctx);
        } else if !self.show_archived {
            debug!("no conversation left, creating one");
            self.spawn_create(None, reply, ctx);
        } else {
            debug!("no archived conversation to show");
            self.current = None;
            self.messages.clear();
            reply.send(Ok(()));
        }
    }
}

/// Fetches a conversation with its complete history.
async fn load_conversation(
    api: &ApiClient,
    id: &str,
    token: &CancelToken,
) -> Result<LoadedConversation, Error> {
    let detail = api.get_conversation(id, token).await?;
    if let Some(messages) = detail.messages {
        return Ok(LoadedConversation {
            conversation: detail.conversation,
            messages: order_history(messages),
            error: None,
        });
    }
    match fetch_history(api, id, token).await {
        Ok(messages) => Ok(LoadedConversation {
            conversation: detail.conversation,
            messages,
            error: None,
        }),
        Err(PartialHistory { error, .. }) if error.is_cancelled() => Err(error),
        Err(PartialHistory { messages, error }) => {
            warn!("history of {id} is incomplete: {error}");
            Ok(LoadedConversation {
                conversation: detail.conversation,
                messages,
                error: Some(error),
            })
        }
    }
}

#[derive(Debug)]
struct LoadedConversation {
    conversation: Conversation,
    messages: Vec<Message>,
    /// Set if only part of the history could be fetched.
    error: Option<Error>,
}

// User operations.

#[derive(Debug)]
pub struct Initialize(pub OpReply);

impl ActorMessage<StoreState> for Initialize {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        state.stage = Stage::Loading;
        state.error = None;
        let switch_gen = state.coordinator.latest(OpKind::Switch);
        state.spawn_refresh(Activation::Always, switch_gen, self.0, ctx);
        state.publish();
    }
}

#[derive(Debug)]
pub struct SwitchConversation {
    pub id: String,
    pub reply: OpReply,
}

impl ActorMessage<StoreState> for SwitchConversation {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        state.error = None;
        state.spawn_switch(self.id, self.reply, ctx);
        state.publish();
    }
}

#[derive(Debug)]
pub struct SendMessage {
    pub content: String,
    pub reply: OpReply,
}

impl ActorMessage<StoreState> for SendMessage {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        state.start_send(self.content, self.reply, ctx);
        state.publish();
    }
}

#[derive(Debug)]
pub struct NewConversation {
    pub initial_message: Option<String>,
    pub reply: OpReply,
}

impl ActorMessage<StoreState> for NewConversation {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        if let Some(content) = &self.initial_message {
            let checked = state.validate_content(content).and_then(|_| {
                if state.pending_send.is_some() {
                    Err(Error::busy().with_reason("another message is being sent"))
                } else {
                    Ok(())
                }
            });
            if let Err(err) = checked {
                self.reply.send(Err(err));
                return;
            }
        }
        state.error = None;
        state.spawn_create(self.initial_message, self.reply, ctx);
        state.publish();
    }
}

#[derive(Debug)]
pub struct UpdateConversation {
    pub patch: ConversationPatch,
    pub reply: OpReply,
}

impl ActorMessage<StoreState> for UpdateConversation {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        let Self { patch, reply } = self;
        let Some(id) = state.current_id().map(str::to_owned) else {
            reply.send(Err(
                Error::validation().with_reason("no active conversation")
            ));
            return;
        };
        if patch.is_empty() {
            reply.send(Ok(()));
            return;
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            reply.send(Err(Error::validation().with_reason("title is empty")));
            return;
        }
        state.error = None;
        state.spawn_update(id, patch, reply, ctx);
        state.publish();
    }
}

#[derive(Debug)]
pub struct ArchiveConversation {
    pub id: String,
    pub archived: bool,
    pub reply: OpReply,
}

impl ActorMessage<StoreState> for ArchiveConversation {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        state.error = None;
        let patch = ConversationPatch::archived(self.archived);
        state.spawn_update(self.id, patch, self.reply, ctx);
        state.publish();
    }
}

#[derive(Debug)]
pub struct DeleteConversation {
    pub id: String,
    pub reply: OpReply,
}

impl ActorMessage<StoreState> for DeleteConversation {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        let Self { id, reply } = self;
        state.error = None;
        let switch_gen = state.coordinator.latest(OpKind::Switch);
        let token = state
            .coordinator
            .issue(OpKind::Detached, state.config.switch_timeout);
        let api = state.api.clone();
        let actor = ctx.actor().clone();
        ctx.spawn(async move {
            let result = api.delete_conversation(&id, &token).await;
            actor
                .send(ConversationDeleted {
                    id,
                    result,
                    switch_gen,
                    reply,
                })
                .ok();
        });
        state.publish();
    }
}

#[derive(Debug)]
pub struct ToggleShowArchived(pub OpReply);

impl ActorMessage<StoreState> for ToggleShowArchived {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        state.show_archived = !state.show_archived;
        debug!("show archived: {}", state.show_archived);
        state.stage = Stage::Loading;
        state.error = None;
        let switch_gen = state.coordinator.latest(OpKind::Switch);
        state.spawn_refresh(Activation::Always, switch_gen, self.0, ctx);
        state.publish();
    }
}

#[derive(Debug)]
pub struct Teardown(pub Reply<()>);

impl ActorMessage<StoreState> for Teardown {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        debug!("tearing down, {} task(s) running", ctx.running_tasks());
        state.coordinator.cancel_all();
        state.pending_send = None;
        state.stage = Stage::TornDown;
        state.publish();
        ctx.stop();
        self.0.send(());
    }
}

// Completions.

#[derive(Debug)]
struct ConversationsListed {
    token: CancelToken,
    result: Result<Vec<Conversation>, Error>,
    activation: Activation,
    /// Switch generation when the refresh was requested.
    switch_gen: u64,
    reply: OpReply,
}

impl ActorMessage<StoreState> for ConversationsListed {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        let Self {
            token,
            result,
            activation,
            switch_gen,
            reply,
        } = self;
        if !state.coordinator.settle(&token) {
            warn!("dropping conversation list of superseded {token}");
            reply.send(Ok(()));
            return;
        }

        match result {
            Ok(mut conversations) => {
                conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                debug!("listed {} conversation(s)", conversations.len());
                state.conversations = conversations;

                let current_listed = state.current_id().is_some_and(|id| {
                    state.conversations.iter().any(|c| c.id == id)
                });
                if state.switched_since(switch_gen) {
                    debug!("a newer switch decides the active conversation");
                    reply.send(Ok(()));
                } else if activation == Activation::Always || !current_listed {
                    state.activate_fallback(reply, ctx);
                } else {
                    reply.send(Ok(()));
                }
            }
            Err(err) => state.fail(err, reply),
        }
        state.publish();
    }
}

#[derive(Debug)]
struct ConversationLoaded {
    id: String,
    token: CancelToken,
    result: Result<LoadedConversation, Error>,
    reply: OpReply,
}

impl ActorMessage<StoreState> for ConversationLoaded {
    fn handle(self, state: &mut StoreState, _ctx: &mut Ctx<'_>) {
        let Self {
            id,
            token,
            result,
            reply,
        } = self;
        if !state.coordinator.settle(&token) {
            warn!("dropping {id} loaded by superseded {token}");
            reply.send(Ok(()));
            return;
        }

        match result {
            Ok(LoadedConversation {
                conversation,
                mut messages,
                error,
            }) => {
                debug!("activated {id} with {} message(s)", messages.len());
                if let Some(pending) = &state.pending_send {
                    if pending.conversation_id == id {
                        Reconciler::attach(&mut messages, pending);
                    }
                }
                state.current = Some(conversation.clone());
                state.apply_conversation(conversation);
                state.messages = messages;
                match error {
                    Some(err) => state.fail(err, reply),
                    None => reply.send(Ok(())),
                }
            }
            Err(err) => {
                if err.kind() == ErrorKind::NotFound {
                    state.conversations.retain(|c| c.id != id);
                }
                state.fail(err, reply);
            }
        }
        state.publish();
    }
}

#[derive(Debug)]
struct ConversationCreated {
    token: CancelToken,
    result: Result<Conversation, Error>,
    initial_message: Option<String>,
    reply: OpReply,
}

impl ActorMessage<StoreState> for ConversationCreated {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        let Self {
            token,
            result,
            initial_message,
            reply,
        } = self;
        let owned = state.coordinator.settle(&token);

        match result {
            Ok(conversation) => {
                debug!("created conversation {}", conversation.id);
                let id = conversation.id.clone();
                // The conversation exists no matter who won.
                state.apply_conversation(conversation.clone());
                if !owned {
                    warn!("not activating {id}, {token} was superseded");
                    reply.send(Ok(()));
                } else {
                    state.current = Some(conversation);
                    state.messages.clear();
                    match initial_message {
                        Some(content) => state.start_send(content, reply, ctx),
                        None => reply.send(Ok(())),
                    }
                }
            }
            Err(_) if !owned => reply.send(Ok(())),
            Err(err) => state.fail(err, reply),
        }
        state.publish();
    }
}

#[derive(Debug)]
struct MessageSent {
    token: CancelToken,
    pending: PendingSend,
    result: Result<SendMessageResponse, Error>,
    reply: OpReply,
}

impl ActorMessage<StoreState> for MessageSent {
    fn handle(self, state: &mut StoreState, _ctx: &mut Ctx<'_>) {
        let Self {
            token,
            pending,
            result,
            reply,
        } = self;
        if !state.coordinator.settle(&token) {
            warn!("dropping reply to superseded {token}");
            reply.send(Ok(()));
            return;
        }
        state.pending_send = None;
        let active =
            state.current_id() == Some(pending.conversation_id.as_str());

        match result {
            Ok(mut resp) => {
                if let Some(conversation) = resp.conversation.take() {
                    state.apply_conversation(conversation);
                }
                if active {
                    state
                        .reconciler
                        .commit(&mut state.messages, &pending, resp);
                } else {
                    debug!(
                        "{} is no longer active, skipping its messages",
                        pending.conversation_id
                    );
                }
                reply.send(Ok(()));
            }
            Err(err) => {
                if active {
                    Reconciler::rollback(&mut state.messages);
                }
                state.fail(err, reply);
            }
        }
        state.publish();
    }
}

#[derive(Debug)]
struct ConversationUpdated {
    result: Result<Conversation, Error>,
    switch_gen: u64,
    reply: OpReply,
}

impl ActorMessage<StoreState> for ConversationUpdated {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        let Self {
            result,
            switch_gen,
            reply,
        } = self;
        match result {
            Ok(conversation) => {
                let id = conversation.id.clone();
                let is_current = state.current_id() == Some(id.as_str());
                let visible = state.apply_conversation(conversation);
                if is_current && !visible && state.switched_since(switch_gen) {
                    debug!("{id} left the filter, a newer switch is pending");
                    reply.send(Ok(()));
                } else if is_current && !visible {
                    debug!("{id} left the filter, switching away");
                    state.activate_fallback(reply, ctx);
                } else {
                    reply.send(Ok(()));
                }
            }
            Err(err) => state.fail(err, reply),
        }
        state.publish();
    }
}

#[derive(Debug)]
struct ConversationDeleted {
    id: String,
    result: Result<(), Error>,
    switch_gen: u64,
    reply: OpReply,
}

impl ActorMessage<StoreState> for ConversationDeleted {
    fn handle(self, state: &mut StoreState, ctx: &mut Ctx<'_>) {
        let Self {
            id,
            result,
            switch_gen,
            reply,
        } = self;
        match result {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                state.fail(err, reply);
            }
            _ => {
                debug!("deleted {id}");
                state.conversations.retain(|c| c.id != id);
                if state.current_id() == Some(id.as_str()) {
                    state.current = None;
                    state.messages.clear();
                }
                state.spawn_refresh(Activation::IfNeeded, switch_gen, reply, ctx);
            }
        }
        state.publish();
    }
}
