use std::pin::Pin;
use std::sync::Arc;

use journal_sync_model::{
    Conversation, ConversationApi, ConversationDetail, ConversationPatch,
    CreateConversation, MessagePage, PageToken, SendMessageRequest,
    SendMessageResponse,
};
use tokio::select;
use tracing::Instrument;

use crate::coordinator::CancelToken;
use crate::error::Error;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;

/// A wrapper around a conversation backend that erases its type and
/// makes every request observe a [`CancelToken`].
///
/// The client performs no retries. A request whose token is cancelled is
/// dropped, which aborts it, and resolves to a `Cancelled` error.
#[derive(Clone)]
pub(crate) struct ApiClient {
    api: Arc<dyn ApiObject>,
}

impl ApiClient {
    #[inline]
    pub fn new<A: ConversationApi + 'static>(api: A) -> Self {
        Self {
            api: Arc::new(AnyApi(api)),
        }
    }

    pub async fn list_conversations(
        &self,
        archived: bool,
        token: &CancelToken,
    ) -> Result<Vec<Conversation>, Error> {
        let fut = self.api.list_conversations(archived);
        guarded("list conversations", fut, token).await
    }

    pub async fn get_conversation(
        &self,
        id: &str,
        token: &CancelToken,
    ) -> Result<ConversationDetail, Error> {
        let fut = self.api.get_conversation(id);
        guarded("get conversation", fut, token).await
    }

    pub async fn create_conversation(
        &self,
        opts: &CreateConversation,
        token: &CancelToken,
    ) -> Result<Conversation, Error> {
        let fut = self.api.create_conversation(opts);
        guarded("create conversation", fut, token).await
    }

    pub async fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
        token: &CancelToken,
    ) -> Result<Conversation, Error> {
        let fut = self.api.update_conversation(id, patch);
        guarded("update conversation", fut, token).await
    }

    pub async fn delete_conversation(
        &self,
        id: &str,
        token: &CancelToken,
    ) -> Result<(), Error> {
        let fut = self.api.delete_conversation(id);
        guarded("delete conversation", fut, token).await
    }

    pub async fn send_message(
        &self,
        req: &SendMessageRequest,
        token: &CancelToken,
    ) -> Result<SendMessageResponse, Error> {
        let fut = self.api.send_message(req);
        guarded("send message", fut, token).await
    }

    pub async fn list_messages_page(
        &self,
        conversation_id: &str,
        page: Option<&PageToken>,
        token: &CancelToken,
    ) -> Result<MessagePage, Error> {
        let fut = self.api.list_messages_page(conversation_id, page);
        guarded("list messages", fut, token).await
    }
}

async fn guarded<T>(
    what: &'static str,
    fut: BoxedFuture<T>,
    token: &CancelToken,
) -> Result<T, Error> {
    let span = trace_span!("api request", what, token = %token);
    async move {
        trace!("sending");
        let result = select! {
            biased;

            err = token.cancelled() => {
                debug!("aborted: {err}");
                return Err(err);
            }
            result = fut => result,
        };
        if let Err(err) = &result {
            error!("failed: {err}");
        }
        result
    }
    .instrument(span)
    .await
}

trait ApiObject: Send + Sync + 'static {
    fn list_conversations(&self, archived: bool) -> BoxedFuture<Vec<Conversation>>;

    fn get_conversation(&self, id: &str) -> BoxedFuture<ConversationDetail>;

    fn create_conversation(
        &self,
        opts: &CreateConversation,
    ) -> BoxedFuture<Conversation>;

    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> BoxedFuture<Conversation>;

    fn delete_conversation(&self, id: &str) -> BoxedFuture<()>;

    fn send_message(
        &self,
        req: &SendMessageRequest,
    ) -> BoxedFuture<SendMessageResponse>;

    fn list_messages_page(
        &self,
        conversation_id: &str,
        page: Option<&PageToken>,
    ) -> BoxedFuture<MessagePage>;
}

struct AnyApi<A>(A);

#[inline]
fn boxed<T, E, F>(fut: F) -> BoxedFuture<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    E: journal_sync_model::ApiError,
{
    Box::pin(async move { fut.await.map_err(|err| Error::from_api(&err)) })
}

impl<A: ConversationApi + 'static> ApiObject for AnyApi<A> {
    #[inline]
    fn list_conversations(&self, archived: bool) -> BoxedFuture<Vec<Conversation>> {
        boxed(self.0.list_conversations(archived))
    }

    #[inline]
    fn get_conversation(&self, id: &str) -> BoxedFuture<ConversationDetail> {
        boxed(self.0.get_conversation(id))
    }

    #[inline]
    fn create_conversation(
        &self,
        opts: &CreateConversation,
    ) -> BoxedFuture<Conversation> {
        boxed(self.0.create_conversation(opts))
    }

    #[inline]
    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> BoxedFuture<Conversation> {
        boxed(self.0.update_conversation(id, patch))
    }

    #[inline]
    fn delete_conversation(&self, id: &str) -> BoxedFuture<()> {
        boxed(self.0.delete_conversation(id))
    }

    #[inline]
    fn send_message(
        &self,
        req: &SendMessageRequest,
    ) -> BoxedFuture<SendMessageResponse> {
        boxed(self.0.send_message(req))
    }

    #[inline]
    fn list_messages_page(
        &self,
        conversation_id: &str,
        page: Option<&PageToken>,
    ) -> BoxedFuture<MessagePage> {
        boxed(self.0.list_messages_page(conversation_id, page))
    }
}
