//! Gathers the complete message history of a conversation.

use std::collections::HashSet;

use journal_sync_model::{Message, PageToken};

use crate::api_client::ApiClient;
use crate::coordinator::CancelToken;
use crate::error::Error;

/// The history gathered before a page request failed.
#[derive(Debug)]
pub(crate) struct PartialHistory {
    pub messages: Vec<Message>,
    pub error: Error,
}

/// Fetches every page of messages of a conversation and returns them in
/// chronological order.
///
/// Stops at the first failing page. Pages fetched before it are not
/// discarded but returned along with the error.
pub(crate) async fn fetch_history(
    api: &ApiClient,
    conversation_id: &str,
    token: &CancelToken,
) -> Result<Vec<Message>, PartialHistory> {
    let mut messages = vec![];
    let mut seen_pages = HashSet::new();
    let mut page: Option<PageToken> = None;
    loop {
        let resp = match api
            .list_messages_page(conversation_id, page.as_ref(), token)
            .await
        {
            Ok(resp) => resp,
            Err(error) => {
                return Err(PartialHistory {
                    messages: order_history(messages),
                    error,
                });
            }
        };
        trace!(
            "got {} message(s), next page: {:?}",
            resp.messages.len(),
            resp.next_page
        );
        messages.extend(resp.messages);

        let Some(next_page) = resp.next_page else {
            break;
        };
        if !seen_pages.insert(next_page.clone()) {
            warn!("page {next_page:?} was already fetched, stop paginating");
            break;
        }
        page = Some(next_page);
    }
    Ok(order_history(messages))
}

/// Sorts messages by creation time, keeping arrival order for ties, and
/// drops repeated canonical ids.
pub(crate) fn order_history(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut messages: Vec<_> = messages
        .into_iter()
        .filter(|msg| match msg.id.as_canonical() {
            Some(id) => seen.insert(id.to_owned()),
            None => true,
        })
        .collect();
    // `sort_by_key` is stable.
    messages.sort_by_key(|msg| msg.created_at);
    messages
}
