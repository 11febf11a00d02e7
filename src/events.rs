//! Search events and their text/event-stream framing.
//!
//! A streamed search is `meta`, zero or more `chunk`s in arrival order, and
//! exactly one terminal `done` or `error`.

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::offer::{AggregateResult, Offer};
use crate::orchestrator::{SearchError, SearchOrchestrator};
use crate::query::SearchQuery;

pub const EVENT_META: &str = "meta";
pub const EVENT_CHUNK: &str = "chunk";
pub const EVENT_DONE: &str = "done";
pub const EVENT_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Meta { query: SearchQuery },
    Chunk { group_size: u32, items: Vec<Offer> },
    Done { result: AggregateResult },
    Error { message: String },
}

#[derive(Serialize)]
struct MetaPayload<'a> {
    query: &'a SearchQuery,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkPayload<'a> {
    group_size: u32,
    items: &'a [Offer],
}

#[derive(Serialize)]
struct DonePayload<'a> {
    total: usize,
    items: &'a [Offer],
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: &'a str,
}

impl SearchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SearchEvent::Meta { .. } => EVENT_META,
            SearchEvent::Chunk { .. } => EVENT_CHUNK,
            SearchEvent::Done { .. } => EVENT_DONE,
            SearchEvent::Error { .. } => EVENT_ERROR,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchEvent::Done { .. } | SearchEvent::Error { .. })
    }

    /// JSON body carried on the event's `data:` line.
    pub fn data(&self) -> String {
        let encoded = match self {
            SearchEvent::Meta { query } => serde_json::to_string(&MetaPayload { query }),
            SearchEvent::Chunk { group_size, items } => serde_json::to_string(&ChunkPayload {
                group_size: *group_size,
                items,
            }),
            SearchEvent::Done { result } => serde_json::to_string(&DonePayload {
                total: result.len(),
                items: result.offers(),
            }),
            SearchEvent::Error { message } => serde_json::to_string(&ErrorPayload { error: message }),
        };
        encoded.unwrap_or_default()
    }

    /// One complete record: event line, data line, blank line.
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.data())
    }
}

/// Drives one streamed search.
///
/// `orchestrator` is the result of constructing the fan-out for this request;
/// a construction failure is reported as the terminal `error` after `meta`.
/// Dropping the returned stream cancels the search, and once `cancel` fires
/// no further events are produced.
pub fn search_events(
    orchestrator: Result<SearchOrchestrator, SearchError>,
    query: SearchQuery,
    cancel: CancellationToken,
) -> impl Stream<Item = SearchEvent> + Send + 'static {
    async_stream::stream! {
        let _cancel_on_drop = cancel.clone().drop_guard();

        yield SearchEvent::Meta { query: query.clone() };

        let orchestrator = match orchestrator {
            Ok(orchestrator) => orchestrator,
            Err(err) => {
                yield SearchEvent::Error { message: err.to_string() };
                return;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let search = {
            let cancel = cancel.clone();
            let query = query.clone();
            tokio::spawn(async move { orchestrator.search_progressive(&query, &tx, &cancel).await })
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = rx.recv() => chunk,
            };
            let Some(chunk) = next else { break };
            yield SearchEvent::Chunk { group_size: chunk.group_size, items: chunk.items };
        }

        if cancel.is_cancelled() {
            debug!("event stream closed by cancellation");
            return;
        }

        match search.await {
            Ok(Ok(result)) => yield SearchEvent::Done { result },
            Ok(Err(SearchError::Cancelled)) => {}
            Ok(Err(err)) => yield SearchEvent::Error { message: err.to_string() },
            Err(err) => yield SearchEvent::Error { message: format!("search aborted: {}", err) },
        }
    }
}
