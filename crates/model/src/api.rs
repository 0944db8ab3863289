use crate::conversation::{
    Conversation, ConversationDetail, ConversationPatch, CreateConversation,
    SendMessageRequest, SendMessageResponse,
};
use crate::error::ApiError;
use crate::message::{MessagePage, PageToken};

/// A type that represents a remote conversation service.
///
/// Once the backend is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the backend should be prepared for being dropped anytime.
///
/// Every returned future must be independent of `self`, and dropping it
/// must abort the underlying request. Callers implement cancellation and
/// timeouts by dropping futures, so implementations must not retry.
pub trait ConversationApi: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: ApiError;

    /// Lists all conversations with the given archived flag, most
    /// recently updated first.
    fn list_conversations(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static;

    /// Fetches a conversation, with its messages if the server embeds
    /// them.
    fn get_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ConversationDetail, Self::Error>> + Send + 'static;

    /// Creates a conversation.
    fn create_conversation(
        &self,
        opts: &CreateConversation,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static;

    /// Applies a metadata patch to a conversation.
    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static;

    /// Deletes a conversation.
    fn delete_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Sends a user message and waits for the assistant reply.
    fn send_message(
        &self,
        req: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageResponse, Self::Error>> + Send + 'static;

    /// Fetches one page of a conversation's messages. `None` requests
    /// the first page.
    fn list_messages_page(
        &self,
        conversation_id: &str,
        page: Option<&PageToken>,
    ) -> impl Future<Output = Result<MessagePage, Self::Error>> + Send + 'static;
}
