// Fan-out orchestrator: one search becomes one task per (provider, group size)

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::offer::{AggregateResult, Offer};
use crate::provider::HotelsProvider;
use crate::query::SearchQuery;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("No providers configured")]
    NoProviders,

    #[error("Search cancelled")]
    Cancelled,
}

// One unit of fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub provider_index: usize,
    pub provider_name: String,
    pub group_size: u32,
}

// Settled result of a task; failures never escape the task boundary
#[derive(Debug)]
pub enum TaskOutcome {
    Offers(Vec<Offer>),
    Failed(String),
}

// Offers from one completed task, surfaced as soon as it lands
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub provider_name: String,
    pub group_size: u32,
    pub items: Vec<Offer>,
}

#[derive(Clone)]
pub struct SearchOrchestrator {
    providers: Vec<Arc<dyn HotelsProvider>>,
    max_in_flight: Option<usize>,
}

impl SearchOrchestrator {
    pub fn new(providers: Vec<Arc<dyn HotelsProvider>>) -> Result<Self, SearchError> {
        if providers.is_empty() {
            return Err(SearchError::NoProviders);
        }
        Ok(Self {
            providers,
            max_in_flight: None,
        })
    }

    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.filter(|n| *n > 0);
        self
    }

    // Provider-major, then ascending group size
    pub fn plan(&self, query: &SearchQuery) -> Vec<Task> {
        self.providers
            .iter()
            .enumerate()
            .flat_map(|(provider_index, provider)| {
                query.group_sizes().map(move |group_size| Task {
                    provider_index,
                    provider_name: provider.name().to_string(),
                    group_size,
                })
            })
            .collect()
    }

    // Waits for every task and returns only the final sorted aggregate
    pub async fn search(&self, query: &SearchQuery) -> AggregateResult {
        // A token nobody holds can never fire
        let never = CancellationToken::new();
        self.run(query, None, &never).await.unwrap_or_default()
    }

    // Pushes a chunk per successful task as it completes, then returns the final aggregate.
    // A closed receiver only stops chunk delivery; the search still runs to completion.
    pub async fn search_progressive(
        &self,
        query: &SearchQuery,
        chunks: &mpsc::UnboundedSender<Chunk>,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult, SearchError> {
        self.run(query, Some(chunks), cancel).await
    }

    async fn run(
        &self,
        query: &SearchQuery,
        chunks: Option<&mpsc::UnboundedSender<Chunk>>,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult, SearchError> {
        let started = Instant::now();
        let tasks = self.plan(query);
        let limiter = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));

        let mut running = JoinSet::new();
        for (index, task) in tasks.iter().enumerate() {
            let provider = Arc::clone(&self.providers[task.provider_index]);
            let task_query = query.with_group_size(task.group_size);
            let limiter = limiter.clone();

            debug!(provider = %task.provider_name, group_size = task.group_size, "launching task");
            running.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = match AssertUnwindSafe(provider.search(&task_query))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(offers)) => TaskOutcome::Offers(offers),
                    Ok(Err(err)) => TaskOutcome::Failed(err.to_string()),
                    Err(_) => TaskOutcome::Failed("provider task panicked".to_string()),
                };
                (index, outcome)
            });
        }

        let mut settled: Vec<Option<Vec<Offer>>> = vec![None; tasks.len()];
        let mut failed = 0usize;

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    running.abort_all();
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "search cancelled with tasks outstanding"
                    );
                    return Err(SearchError::Cancelled);
                }
                joined = running.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            match joined {
                Ok((index, TaskOutcome::Offers(offers))) => {
                    let task = &tasks[index];
                    debug!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        provider = %task.provider_name,
                        group_size = task.group_size,
                        items = offers.len(),
                        "chunk ready"
                    );
                    if let Some(chunks) = chunks {
                        // Receiver gone means nobody is listening for progress any more
                        let _ = chunks.send(Chunk {
                            provider_name: task.provider_name.clone(),
                            group_size: task.group_size,
                            items: offers.clone(),
                        });
                    }
                    settled[index] = Some(offers);
                }
                Ok((index, TaskOutcome::Failed(reason))) => {
                    let task = &tasks[index];
                    warn!(
                        provider = %task.provider_name,
                        group_size = task.group_size,
                        error = %reason,
                        "provider task failed, continuing without its offers"
                    );
                    failed += 1;
                }
                Err(err) => {
                    warn!(error = %err, "provider task did not settle");
                    failed += 1;
                }
            }
        }

        // Task order, not arrival order, keeps the final result deterministic
        let offers: Vec<Offer> = settled.into_iter().flatten().flatten().collect();
        let result = AggregateResult::from_offers(offers);

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            tasks = tasks.len(),
            succeeded = tasks.len() - failed,
            failed,
            offers = result.len(),
            "search settled"
        );
        Ok(result)
    }
}
