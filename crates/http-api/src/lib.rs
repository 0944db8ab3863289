//! A conversation backend for the journal REST API.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use journal_sync_model::{
    ApiError, ApiErrorKind, Conversation, ConversationApi, ConversationDetail,
    ConversationPatch, CreateConversation, MessagePage, PageToken,
    SendMessageRequest, SendMessageResponse,
};
use mime::Mime;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;

pub use config::{HttpApiConfig, HttpApiConfigBuilder};
use proto::{ConversationPayload, Listing, MessagePayload, SendReplyPayload};

/// Error type for [`HttpConversationApi`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ApiErrorKind,
    status: Option<StatusCode>,
}

impl Error {
    fn new(message: impl Into<String>, kind: ApiErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ApiErrorKind::Unauthorized
            }
            StatusCode::NOT_FOUND => ApiErrorKind::NotFound,
            s if s.is_client_error() => ApiErrorKind::Rejected,
            s if s.is_server_error() => ApiErrorKind::Server,
            _ => ApiErrorKind::Other,
        };
        let mut message = format!("server answered {status}");
        let body = body.trim();
        if !body.is_empty() {
            message.push_str(": ");
            message.extend(body.chars().take(200));
        }
        Self {
            message,
            kind,
            status: Some(status),
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            ApiErrorKind::InvalidResponse
        } else if err.is_timeout() || err.is_connect() || err.is_request() {
            ApiErrorKind::Network
        } else {
            ApiErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the server answered at all.
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ApiError for Error {
    #[inline]
    fn kind(&self) -> ApiErrorKind {
        self.kind
    }
}

/// Conversation backend talking to the journal REST API.
#[derive(Clone, Debug)]
pub struct HttpConversationApi {
    client: Client,
    config: Arc<HttpApiConfig>,
}

impl HttpConversationApi {
    /// Creates a new `HttpConversationApi` with the given configuration.
    #[inline]
    pub fn new(config: HttpApiConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        trace!("{method} {url}");
        let req = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header(header::ACCEPT, "application/json");
        match self.config.request_timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        }
    }

    #[inline]
    fn conversation_url(&self, id: &str) -> String {
        self.config.url(&format!("/conversations/{id}/"))
    }
}

/// Sends the request and fails on error statuses.
async fn send(req: RequestBuilder) -> Result<Response, Error> {
    let resp = req.send().await.map_err(Error::from_reqwest)?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::from_status(status, &body))
}

/// Sends the request and decodes a JSON body.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, Error> {
    let resp = send(req).await?;

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let is_json = content_type
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| {
            m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
        })
        .unwrap_or(false);
    if !is_json {
        return Err(Error::new(
            format!("Unexpected content type: {content_type:?}"),
            ApiErrorKind::InvalidResponse,
        ));
    }

    resp.json().await.map_err(Error::from_reqwest)
}

/// Returns the next page link unless it was fetched already.
fn unseen_page(seen: &HashSet<String>, next: Option<String>) -> Option<String> {
    let next = next?;
    if seen.contains(&next) {
        warn!("page {next} was already fetched, stop paginating");
        return None;
    }
    Some(next)
}

impl ConversationApi for HttpConversationApi {
    type Error = Error;

    fn list_conversations(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static
    {
        let this = self.clone();
        let first_page =
            self.config.url(&format!("/conversations/?archived={archived}"));
        async move {
            let mut conversations = vec![];
            let mut seen_pages = HashSet::new();
            let mut next = Some(first_page);
            while let Some(url) = next.take() {
                seen_pages.insert(url.clone());
                let listing: Listing<ConversationPayload> =
                    fetch_json(this.request(Method::GET, url)).await?;
                let (items, next_url) = listing.into_parts();
                conversations.extend(
                    items.into_iter().map(ConversationPayload::into_conversation),
                );
                next = unseen_page(&seen_pages, next_url);
            }
            debug!("listed {} conversation(s)", conversations.len());
            Ok(conversations)
        }
    }

    fn get_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ConversationDetail, Self::Error>> + Send + 'static
    {
        let req = self.request(Method::GET, self.conversation_url(id));
        async move {
            let payload: ConversationPayload = fetch_json(req).await?;
            Ok(payload.into_detail())
        }
    }

    fn create_conversation(
        &self,
        opts: &CreateConversation,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let req = self
            .request(Method::POST, self.config.url("/conversations/"))
            .json(&proto::create_body(opts));
        async move {
            let payload: ConversationPayload = fetch_json(req).await?;
            Ok(payload.into_conversation())
        }
    }

    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let req = self
            .request(Method::PATCH, self.conversation_url(id))
            .json(&proto::patch_body(patch));
        async move {
            let payload: ConversationPayload = fetch_json(req).await?;
            Ok(payload.into_conversation())
        }
    }

    fn delete_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let req = self.request(Method::DELETE, self.conversation_url(id));
        async move {
            send(req).await?;
            Ok(())
        }
    }

    fn send_message(
        &self,
        req: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageResponse, Self::Error>> + Send + 'static
    {
        let conversation_id = req.conversation_id.clone();
        let http_req = self
            .request(Method::POST, self.config.url("/conversation/"))
            .json(&proto::send_body(&req.conversation_id, &req.content));
        async move {
            let payload: SendReplyPayload = fetch_json(http_req).await?;
            Ok(payload.into_response(&conversation_id))
        }
    }

    fn list_messages_page(
        &self,
        conversation_id: &str,
        page: Option<&PageToken>,
    ) -> impl Future<Output = Result<MessagePage, Self::Error>> + Send + 'static
    {
        let url = match page {
            // Page tokens are the server's `next` links.
            Some(PageToken(url)) => url.clone(),
            None => self
                .config
                .url(&format!("/conversations/{conversation_id}/messages/")),
        };
        let req = self.request(Method::GET, url);
        let conversation_id = conversation_id.to_owned();
        async move {
            let listing: Listing<MessagePayload> = fetch_json(req).await?;
            let (items, next) = listing.into_parts();
            Ok(MessagePage {
                messages: items
                    .into_iter()
                    .map(|msg| msg.into_message(&conversation_id))
                    .collect(),
                next_page: next.map(PageToken),
            })
        }
    }
}
