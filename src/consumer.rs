// Client side of the search stream: frame parsing, incremental merge and the read loop

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{EVENT_CHUNK, EVENT_DONE, EVENT_ERROR, EVENT_META};
use crate::offer::{sort_by_price, Offer};
use crate::query::{SearchQuery, ValidationError};

const DEFAULT_EVENT_NAME: &str = "message";
const DEFAULT_ERROR_MESSAGE: &str = "Search error";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeParseError {
    #[error("invalid JSON in {event} event: {message}")]
    InvalidJson { event: String, message: String },

    #[error("{0} event payload is not an object")]
    NotAnObject(String),

    #[error("invalid query in meta event: {0}")]
    InvalidQuery(ValidationError),
}

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ConsumerError {
    fn from(err: reqwest::Error) -> Self {
        ConsumerError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitingEventName,
    AwaitingData,
    EventComplete,
}

// One complete record, up to and including its terminating blank line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub event: String,
    pub data: String,
}

/// Reassembles event records from arbitrarily split reads.
///
/// Bytes are buffered until a full line is available, so a read may end
/// anywhere, including inside a multi-byte character.
#[derive(Debug)]
pub struct FrameParser {
    buffer: BytesMut,
    event: Option<String>,
    data: String,
    state: ParserState,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            event: None,
            data: String::new(),
            state: ParserState::AwaitingEventName,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<RawRecord> {
        self.buffer.extend_from_slice(bytes);

        let mut records = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(newline + 1);
            let mut line = &raw[..newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if let Some(record) = self.process_line(&String::from_utf8_lossy(line)) {
                records.push(record);
            }
        }
        records
    }

    fn process_line(&mut self, line: &str) -> Option<RawRecord> {
        if self.state == ParserState::EventComplete {
            self.state = ParserState::AwaitingEventName;
        }

        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                // Nothing accumulated: keep-alive or a stray blank line
                return None;
            }
            self.state = ParserState::EventComplete;
            return Some(RawRecord {
                event: self
                    .event
                    .take()
                    .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
                data: std::mem::take(&mut self.data),
            });
        }

        if line.starts_with(':') {
            return None;
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.event = Some(name.trim().to_string());
            self.state = ParserState::AwaitingData;
        } else if let Some(data) = line.strip_prefix("data:") {
            self.data.push_str(data.trim());
            self.state = ParserState::AwaitingData;
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    QueryReplaced,
    Updated,
    Completed,
    Failed(String),
    Ignored,
}

/// Running, deduplicated, price-sorted view of a streamed search.
#[derive(Debug, Default, Clone)]
pub struct IncrementalMerger {
    query: Option<SearchQuery>,
    offers: Vec<Offer>,
}

impl IncrementalMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> Option<&SearchQuery> {
        self.query.as_ref()
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn apply(&mut self, record: &RawRecord) -> Result<MergeOutcome, MergeParseError> {
        if record.data.is_empty() {
            return Ok(MergeOutcome::Ignored);
        }

        let event = record.event.as_str();
        if ![EVENT_META, EVENT_CHUNK, EVENT_DONE, EVENT_ERROR].contains(&event) {
            debug!(event, "ignoring unknown event");
            return Ok(MergeOutcome::Ignored);
        }

        let payload = parse_payload(event, &record.data)?;
        match event {
            EVENT_META => {
                let query = SearchQuery::from_request(&Value::Object(payload))
                    .map_err(MergeParseError::InvalidQuery)?;
                self.query = Some(query);
                Ok(MergeOutcome::QueryReplaced)
            }
            EVENT_CHUNK => {
                self.merge_chunk(decode_items(payload.get("items")));
                Ok(MergeOutcome::Updated)
            }
            EVENT_DONE => {
                self.replace_all(decode_items(payload.get("items")));
                Ok(MergeOutcome::Completed)
            }
            _ => {
                let message = payload
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_ERROR_MESSAGE)
                    .to_string();
                Ok(MergeOutcome::Failed(message))
            }
        }
    }

    // Later arrivals overwrite earlier ones with the same dedup key
    pub fn merge_chunk(&mut self, items: Vec<Offer>) {
        let previous = std::mem::take(&mut self.offers);
        self.offers = dedup_sorted(previous.into_iter().chain(items));
    }

    // The final payload is authoritative over anything merged from chunks
    pub fn replace_all(&mut self, items: Vec<Offer>) {
        self.offers = dedup_sorted(items);
    }
}

fn dedup_sorted(offers: impl IntoIterator<Item = Offer>) -> Vec<Offer> {
    let mut positions = HashMap::new();
    let mut merged: Vec<Offer> = Vec::new();
    for offer in offers {
        match positions.entry(offer.dedup_key()) {
            Entry::Occupied(slot) => merged[*slot.get()] = offer,
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(offer);
            }
        }
    }
    sort_by_price(&mut merged);
    merged
}

fn parse_payload(event: &str, data: &str) -> Result<Map<String, Value>, MergeParseError> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(MergeParseError::NotAnObject(event.to_string())),
        Err(e) => Err(MergeParseError::InvalidJson {
            event: event.to_string(),
            message: e.to_string(),
        }),
    }
}

fn decode_items(items: Option<&Value>) -> Vec<Offer> {
    match items {
        Some(Value::Array(items)) => items
            .iter()
            .cloned()
            .filter_map(Offer::from_loose_value)
            .collect(),
        _ => Vec::new(),
    }
}

/// Receives progressive updates, synchronously, one record at a time.
pub trait SearchObserver {
    fn on_query(&mut self, _query: &SearchQuery) {}

    fn on_results(&mut self, offers: &[Offer]);

    fn on_complete(&mut self) {}

    fn on_error(&mut self, _message: &str) {}
}

// What a results screen needs: current list, loading flag, last error
#[derive(Debug, Clone, Default)]
pub struct SearchView {
    pub query: Option<SearchQuery>,
    pub offers: Vec<Offer>,
    pub loading: bool,
    pub error: Option<String>,
    pub updates: usize,
}

impl SearchView {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }
}

impl SearchObserver for SearchView {
    fn on_query(&mut self, query: &SearchQuery) {
        self.query = Some(query.clone());
    }

    fn on_results(&mut self, offers: &[Offer]) {
        self.offers = offers.to_vec();
        self.updates += 1;
    }

    fn on_complete(&mut self) {
        self.loading = false;
    }

    fn on_error(&mut self, message: &str) {
        self.loading = false;
        self.error = Some(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
    Cancelled,
    // Transport closed before any terminal event
    Ended,
}

#[derive(Debug, Default)]
pub struct StreamConsumer {
    parser: FrameParser,
    merger: IncrementalMerger,
    finished: Option<StreamOutcome>,
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merger(&self) -> &IncrementalMerger {
        &self.merger
    }

    pub fn parser_state(&self) -> ParserState {
        self.parser.state()
    }

    // Handles one read. Returns the outcome once a terminal event has been seen;
    // anything after it is ignored.
    pub fn feed<O: SearchObserver>(&mut self, bytes: &[u8], observer: &mut O) -> Option<StreamOutcome> {
        if self.finished.is_some() {
            return self.finished.clone();
        }

        for record in self.parser.feed(bytes) {
            match self.merger.apply(&record) {
                Ok(MergeOutcome::QueryReplaced) => {
                    if let Some(query) = self.merger.query() {
                        observer.on_query(query);
                    }
                }
                Ok(MergeOutcome::Updated) => observer.on_results(self.merger.offers()),
                Ok(MergeOutcome::Completed) => {
                    observer.on_results(self.merger.offers());
                    observer.on_complete();
                    self.finished = Some(StreamOutcome::Completed);
                    break;
                }
                Ok(MergeOutcome::Failed(message)) => {
                    observer.on_error(&message);
                    self.finished = Some(StreamOutcome::Failed(message));
                    break;
                }
                Ok(MergeOutcome::Ignored) => {}
                Err(err) => warn!(error = %err, "discarding malformed event record"),
            }
        }
        self.finished.clone()
    }

    /// Drives the consumer from a byte stream until a terminal event, the end
    /// of the stream, or cancellation. Cancellation is an outcome, not an error.
    pub async fn run<S, E, O>(
        &mut self,
        stream: S,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, ConsumerError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
        O: SearchObserver,
    {
        tokio::pin!(stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                next = stream.next() => next,
            };
            let Some(read) = next else {
                return Ok(StreamOutcome::Ended);
            };
            let bytes = match read {
                Ok(bytes) => bytes,
                Err(_) if cancel.is_cancelled() => return Ok(StreamOutcome::Cancelled),
                Err(err) => return Err(ConsumerError::Transport(err.to_string())),
            };
            if let Some(outcome) = self.feed(&bytes, observer) {
                return Ok(outcome);
            }
        }
    }
}

/// HTTP client for the search endpoints. Starting a search supersedes the one
/// still in flight.
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    current: Mutex<Option<CancellationToken>>,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            current: Mutex::new(None),
        }
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    pub fn cancel_current(&self) {
        if let Some(current) = self.current.lock().take() {
            current.cancel();
        }
    }

    pub async fn search_stream<O: SearchObserver>(
        &self,
        query: &SearchQuery,
        observer: &mut O,
    ) -> Result<StreamOutcome, ConsumerError> {
        let cancel = self.begin();
        let request = self
            .http
            .post(format!("{}/api/search/stream", self.base_url))
            .json(&json!({ "query": query }))
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            response = request => response?,
        };
        if !response.status().is_success() {
            return Err(ConsumerError::HttpStatus(response.status().as_u16()));
        }

        let mut consumer = StreamConsumer::new();
        consumer.run(response.bytes_stream(), observer, &cancel).await
    }

    // Non-streaming search: one response once every provider call has settled
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Offer>, ConsumerError> {
        let response = self
            .http
            .post(format!("{}/api/search", self.base_url))
            .json(&json!({ "query": query }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConsumerError::HttpStatus(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        let mut offers = decode_items(body.get("items"));
        sort_by_price(&mut offers);
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SearchEvent;
    use crate::offer::test_support::offer;
    use crate::offer::AggregateResult;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn chunk_frame(group_size: u32, items: Vec<Offer>) -> String {
        SearchEvent::Chunk { group_size, items }.to_frame()
    }

    fn done_frame(items: Vec<Offer>) -> String {
        SearchEvent::Done {
            result: AggregateResult::from_offers(items),
        }
        .to_frame()
    }

    fn room_ids(offers: &[Offer]) -> Vec<&str> {
        offers.iter().map(|o| o.room_id.as_str()).collect()
    }

    fn record(event: &str, data: &str) -> RawRecord {
        RawRecord {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_parser_reassembles_record_split_mid_data_line() {
        let frame = chunk_frame(9, vec![offer("A", "R1", 120.0)]);
        let split = frame.find("data:").unwrap() + 12;

        let mut parser = FrameParser::new();
        assert!(parser.feed(frame[..split].as_bytes()).is_empty());
        assert_eq!(parser.state(), ParserState::AwaitingData);

        let records = parser.feed(frame[split..].as_bytes());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, "chunk");
        assert_eq!(records[0].data, SearchEvent::Chunk {
            group_size: 9,
            items: vec![offer("A", "R1", 120.0)],
        }
        .data());
        assert_eq!(parser.state(), ParserState::EventComplete);
    }

    #[test]
    fn test_parser_survives_split_multibyte_character() {
        let mut item = offer("A", "R1", 10.0);
        item.hotel_name = "Hôtel Mont Blanc".to_string();
        let frame = chunk_frame(2, vec![item]);
        let bytes = frame.as_bytes();
        let accent = frame.find('ô').unwrap() + 1;

        let mut parser = FrameParser::new();
        let mut records = parser.feed(&bytes[..accent]);
        records.extend(parser.feed(&bytes[accent..]));

        assert_eq!(records.len(), 1);
        assert!(records[0].data.contains("Hôtel Mont Blanc"));
    }

    #[test]
    fn test_parser_byte_by_byte_matches_single_read() {
        let stream = format!(
            "{}{}",
            chunk_frame(3, vec![offer("A", "R1", 10.0)]),
            done_frame(vec![offer("A", "R1", 10.0)])
        );

        let whole = FrameParser::new().feed(stream.as_bytes());
        let mut parser = FrameParser::new();
        let pieces: Vec<RawRecord> = stream
            .as_bytes()
            .iter()
            .flat_map(|b| parser.feed(std::slice::from_ref(b)))
            .collect();

        assert_eq!(whole.len(), 2);
        assert_eq!(whole, pieces);
    }

    #[test]
    fn test_parser_handles_crlf_comments_and_defaults() {
        let mut parser = FrameParser::new();
        let records = parser.feed(b":\n\n: keep-alive\r\nevent: meta\r\ndata: {\"a\":\r\ndata: 1}\r\n\r\ndata: {}\n\n");

        assert_eq!(
            records,
            vec![record("meta", "{\"a\":1}"), record("message", "{}")]
        );
    }

    #[test]
    fn test_parser_returns_to_awaiting_event_name_after_dispatch() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(b"event: meta\ndata: {}\n\n").len(), 1);
        assert_eq!(parser.state(), ParserState::EventComplete);

        assert!(parser.feed(b"\n").is_empty());
        assert_eq!(parser.state(), ParserState::AwaitingEventName);

        assert_eq!(parser.feed(b"event: done\ndata: {}\n\n").len(), 1);
        assert!(parser.feed(b": keep-alive\n").is_empty());
        assert_eq!(parser.state(), ParserState::AwaitingEventName);

        parser.feed(b"event: chunk\n");
        assert_eq!(parser.state(), ParserState::AwaitingData);
    }

    #[test]
    fn test_parser_holds_incomplete_record() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"event: done\ndata: {\"total\":0,\"items\":[]}\n").is_empty());
        assert_eq!(parser.feed(b"\n").len(), 1);
    }

    #[test]
    fn test_merge_sorts_and_later_arrival_wins() {
        let mut merger = IncrementalMerger::new();
        merger.merge_chunk(vec![offer("A", "R1", 120.0), offer("A", "R2", 90.0)]);

        let mut replacement = offer("A", "R1", 60.0);
        replacement.hotel_name = "Updated".to_string();
        merger.merge_chunk(vec![replacement, offer("B", "R1", 100.0)]);

        assert_eq!(room_ids(merger.offers()), vec!["R1", "R2", "R1"]);
        assert_eq!(merger.offers()[0].hotel_name, "Updated");
        assert_eq!(merger.offers()[2].provider_name, "B");
    }

    #[test]
    fn test_merging_same_chunk_twice_is_idempotent() {
        let chunk = vec![offer("A", "R1", 50.0), offer("A", "R2", 40.0)];
        let mut once = IncrementalMerger::new();
        once.merge_chunk(chunk.clone());
        let mut twice = IncrementalMerger::new();
        twice.merge_chunk(chunk.clone());
        twice.merge_chunk(chunk);

        assert_eq!(once.offers(), twice.offers());
    }

    #[test]
    fn test_merge_order_does_not_change_result() {
        let c1 = vec![offer("A", "R1", 70.0), offer("A", "R2", 30.0)];
        let c2 = vec![offer("B", "R9", 50.0), offer("A", "R3", 90.0)];

        let mut forward = IncrementalMerger::new();
        forward.merge_chunk(c1.clone());
        forward.merge_chunk(c2.clone());
        let mut backward = IncrementalMerger::new();
        backward.merge_chunk(c2);
        backward.merge_chunk(c1);

        assert_eq!(forward.offers(), backward.offers());
        assert_eq!(room_ids(forward.offers()), vec!["R2", "R9", "R1", "R3"]);
    }

    #[test]
    fn test_done_payload_overrides_chunks() {
        let mut merger = IncrementalMerger::new();
        merger.merge_chunk(vec![offer("A", "R1", 10.0), offer("A", "STALE", 5.0)]);

        let done = SearchEvent::Done {
            result: AggregateResult::from_offers(vec![offer("A", "R1", 25.0), offer("A", "R2", 15.0)]),
        };
        let outcome = merger.apply(&record("done", &done.data())).unwrap();

        assert_eq!(outcome, MergeOutcome::Completed);
        assert_eq!(room_ids(merger.offers()), vec!["R2", "R1"]);
        assert_eq!(merger.offers()[1].price, 25.0);
    }

    #[test]
    fn test_meta_replaces_query_only() {
        let mut merger = IncrementalMerger::new();
        merger.merge_chunk(vec![offer("A", "R1", 10.0)]);

        let query = SearchQuery::new(
            2,
            NaiveDate::from_ymd_opt(2026, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            5,
        )
        .unwrap();
        let meta = SearchEvent::Meta { query: query.clone() };

        assert_eq!(merger.apply(&record("meta", &meta.data())).unwrap(), MergeOutcome::QueryReplaced);
        assert_eq!(merger.query(), Some(&query));
        assert_eq!(merger.offers().len(), 1);
    }

    #[test]
    fn test_malformed_records_are_reported_and_leave_state_alone() {
        let mut merger = IncrementalMerger::new();
        merger.merge_chunk(vec![offer("A", "R1", 10.0)]);

        assert!(matches!(
            merger.apply(&record("chunk", "{\"items\": [")),
            Err(MergeParseError::InvalidJson { .. })
        ));
        assert_eq!(
            merger.apply(&record("chunk", "[1]")),
            Err(MergeParseError::NotAnObject("chunk".to_string()))
        );
        assert_eq!(merger.apply(&record("ping", "{}")), Ok(MergeOutcome::Ignored));
        assert_eq!(merger.apply(&record("chunk", "")), Ok(MergeOutcome::Ignored));
        assert_eq!(merger.offers().len(), 1);
    }

    #[test]
    fn test_chunk_items_are_decoded_leniently() {
        let mut merger = IncrementalMerger::new();
        let data = r#"{"groupSize":3,"items":["junk",{"provider":"A","roomId":"R1","price":"12.5"},7]}"#;
        merger.apply(&record("chunk", data)).unwrap();

        assert_eq!(merger.offers().len(), 1);
        assert_eq!(merger.offers()[0].provider_name, "A");
        assert_eq!(merger.offers()[0].price, 12.5);
        assert_eq!(merger.offers()[0].currency, "EUR");
    }

    #[test]
    fn test_error_keeps_published_results_and_stops() {
        let mut consumer = StreamConsumer::new();
        let mut view = SearchView::loading();
        let stream = format!(
            "{}{}{}",
            chunk_frame(4, vec![offer("A", "R1", 10.0)]),
            SearchEvent::Error {
                message: "upstream down".to_string()
            }
            .to_frame(),
            chunk_frame(5, vec![offer("A", "R2", 5.0)]),
        );

        let outcome = consumer.feed(stream.as_bytes(), &mut view);

        assert_eq!(outcome, Some(StreamOutcome::Failed("upstream down".to_string())));
        assert_eq!(view.error.as_deref(), Some("upstream down"));
        assert!(!view.loading);
        assert_eq!(room_ids(&view.offers), vec!["R1"]);
        assert_eq!(view.updates, 1);
    }

    #[test]
    fn test_bad_chunk_does_not_abort_stream() {
        let mut consumer = StreamConsumer::new();
        let mut view = SearchView::loading();
        let stream = format!(
            "event: chunk\ndata: {{oops\n\n{}{}",
            chunk_frame(4, vec![offer("A", "R1", 10.0)]),
            done_frame(vec![offer("A", "R1", 10.0)]),
        );

        assert_eq!(consumer.feed(stream.as_bytes(), &mut view), Some(StreamOutcome::Completed));
        assert_eq!(view.updates, 2);
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_run_reads_split_stream_to_completion() {
        let frame = format!(
            "{}{}",
            chunk_frame(9, vec![offer("A", "R1", 120.0)]),
            done_frame(vec![offer("A", "R1", 120.0), offer("A", "R2", 80.0)])
        );
        let split = frame.find("data:").unwrap() + 7;
        let reads: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::copy_from_slice(frame[..split].as_bytes())),
            Ok(Bytes::copy_from_slice(frame[split..].as_bytes())),
        ];

        let mut consumer = StreamConsumer::new();
        let mut view = SearchView::loading();
        let outcome = consumer
            .run(futures::stream::iter(reads), &mut view, &CancellationToken::new())
            .await;

        let outcome = tokio_test::assert_ok!(outcome);
        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(room_ids(&view.offers), vec!["R2", "R1"]);
    }

    #[tokio::test]
    async fn test_run_reports_stream_end_without_terminal() {
        let reads: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from(chunk_frame(3, vec![offer("A", "R1", 1.0)])))];

        let mut consumer = StreamConsumer::new();
        let mut view = SearchView::loading();
        let outcome = consumer
            .run(futures::stream::iter(reads), &mut view, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Ended);
        assert_eq!(view.offers.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_is_not_an_error() {
        let first: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from(chunk_frame(3, vec![offer("A", "R1", 1.0)])))];
        let stream = futures::stream::iter(first).chain(futures::stream::pending());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut consumer = StreamConsumer::new();
        let mut view = SearchView::loading();
        let outcome = consumer.run(stream, &mut view, &cancel).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert!(view.error.is_none());
        assert_eq!(view.offers.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let reads: Vec<Result<Bytes, std::io::Error>> = vec![Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ))];

        let mut consumer = StreamConsumer::new();
        let mut view = SearchView::loading();
        let outcome = consumer
            .run(futures::stream::iter(reads), &mut view, &CancellationToken::new())
            .await;

        tokio_test::assert_err!(outcome);
    }

    #[test]
    fn test_new_search_supersedes_previous() {
        let client = SearchClient::new("http://localhost:3001/");
        let first = client.begin();
        let second = client.begin();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        client.cancel_current();
        assert!(second.is_cancelled());
    }
}
