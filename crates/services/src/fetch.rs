//! # Fetchers
//!
//! One-shot reads against the data service, exposed as `{data, loading,
//! error}` snapshots. Nothing here subscribes to changes: a caller that
//! mutates a table and wants to see the result calls `refetch`.
//!
//! Every invocation bumps a generation counter. A response that comes back
//! after a newer invocation started is dropped instead of overwriting the
//! newer state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use domains::{DataClient, DataError, FetchOptions, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a fetch produced no data. The `Display` text is what pages show.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("document id is missing")]
    MissingId,

    #[error("document not found")]
    NotFound,

    #[error("could not load {table}")]
    Collection { table: String },

    #[error("could not load {table} document")]
    Document { table: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T: Default> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            loading: false,
            error: None,
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(table: &str, row: Row) -> Result<T, DataError> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| DataError::Malformed {
        table: table.to_string(),
        message: e.to_string(),
    })
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CollectionInner<T> {
    table: String,
    options: FetchOptions,
    generation: u64,
    state: FetchState<Vec<T>>,
}

/// All rows of one table, ordered and limited as requested.
pub struct CollectionFetcher<T> {
    client: Arc<dyn DataClient>,
    inner: Arc<Mutex<CollectionInner<T>>>,
}

impl<T> Clone for CollectionFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> CollectionFetcher<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    pub fn new(client: Arc<dyn DataClient>, table: impl Into<String>, options: FetchOptions) -> Self {
        Self {
            client,
            inner: Arc::new(Mutex::new(CollectionInner {
                table: table.into(),
                options,
                generation: 0,
                state: FetchState::default(),
            })),
        }
    }

    pub fn table(&self) -> String {
        lock(&self.inner).table.clone()
    }

    /// Latest snapshot without issuing a request.
    pub fn state(&self) -> FetchState<Vec<T>> {
        lock(&self.inner).state.clone()
    }

    /// Issues one select and settles into exactly one terminal state.
    pub async fn fetch(&self) -> FetchState<Vec<T>> {
        let (generation, table, options) = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            inner.state.loading = true;
            (inner.generation, inner.table.clone(), inner.options.clone())
        };

        debug!(table = %table, ?options, generation, "fetching collection");
        let outcome = match self.client.select(&table, &options).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| decode::<T>(&table, row))
                .collect::<Result<Vec<_>, _>>(),
            Err(e) => Err(e),
        };

        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            debug!(table = %table, generation, "dropping superseded collection response");
            return inner.state.clone();
        }
        inner.state = match outcome {
            Ok(data) => FetchState {
                data,
                loading: false,
                error: None,
            },
            Err(e) => {
                warn!(table = %table, error = %e, "collection fetch failed");
                FetchState {
                    data: Vec::new(),
                    loading: false,
                    error: Some(FetchError::Collection { table }),
                }
            }
        };
        inner.state.clone()
    }

    /// Manual refresh handle for callers that just wrote to the table.
    pub async fn refetch(&self) -> FetchState<Vec<T>> {
        self.fetch().await
    }

    /// Points the fetcher at a new table or options. Fetches only when
    /// either actually changed.
    pub async fn reconfigure(&self, table: &str, options: FetchOptions) -> FetchState<Vec<T>> {
        let changed = {
            let mut inner = lock(&self.inner);
            if inner.table == table && inner.options == options {
                false
            } else {
                inner.table = table.to_string();
                inner.options = options;
                true
            }
        };
        if changed {
            self.fetch().await
        } else {
            self.state()
        }
    }
}

struct DocumentInner<T> {
    table: String,
    id: String,
    generation: u64,
    state: FetchState<Option<T>>,
}

/// One row of one table, by id.
pub struct DocumentFetcher<T> {
    client: Arc<dyn DataClient>,
    inner: Arc<Mutex<DocumentInner<T>>>,
}

impl<T> Clone for DocumentFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> DocumentFetcher<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    pub fn new(client: Arc<dyn DataClient>, table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            client,
            inner: Arc::new(Mutex::new(DocumentInner {
                table: table.into(),
                id: id.into(),
                generation: 0,
                state: FetchState::default(),
            })),
        }
    }

    pub fn state(&self) -> FetchState<Option<T>> {
        lock(&self.inner).state.clone()
    }

    /// Fetches the current `(table, id)`. An empty id settles immediately
    /// into [`FetchError::MissingId`] without touching the data service.
    pub async fn fetch(&self) -> FetchState<Option<T>> {
        let (generation, table, id) = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            if inner.id.trim().is_empty() {
                inner.state = FetchState {
                    data: None,
                    loading: false,
                    error: Some(FetchError::MissingId),
                };
                return inner.state.clone();
            }
            inner.state.loading = true;
            (inner.generation, inner.table.clone(), inner.id.clone())
        };

        debug!(table = %table, id = %id, generation, "fetching document");
        let outcome = match self.client.select_one(&table, &id).await {
            Ok(row) => decode::<T>(&table, row),
            Err(e) => Err(e),
        };

        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            debug!(table = %table, id = %id, generation, "dropping superseded document response");
            return inner.state.clone();
        }
        inner.state = match outcome {
            Ok(doc) => FetchState {
                data: Some(doc),
                loading: false,
                error: None,
            },
            Err(e) if e.is_not_found() => {
                warn!(table = %table, id = %id, "document not found");
                FetchState {
                    data: None,
                    loading: false,
                    error: Some(FetchError::NotFound),
                }
            }
            Err(e) => {
                warn!(table = %table, id = %id, error = %e, "document fetch failed");
                FetchState {
                    data: None,
                    loading: false,
                    error: Some(FetchError::Document { table }),
                }
            }
        };
        inner.state.clone()
    }

    pub async fn refetch(&self) -> FetchState<Option<T>> {
        self.fetch().await
    }

    /// Re-targets the fetcher; fetches only when table or id changed.
    pub async fn reconfigure(&self, table: &str, id: &str) -> FetchState<Option<T>> {
        let changed = {
            let mut inner = lock(&self.inner);
            if inner.table == table && inner.id == id {
                false
            } else {
                inner.table = table.to_string();
                inner.id = id.to_string();
                true
            }
        };
        if changed {
            self.fetch().await
        } else {
            self.state()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gated::GatedClient;
    use domains::{Event, MockDataClient, OrderBy};
    use serde_json::json;
    use storage_adapters::memory::MemoryDataClient;

    fn events_client() -> Arc<MemoryDataClient> {
        let client = Arc::new(MemoryDataClient::new());
        client.seed(
            "events",
            [
                json!({ "id": "e1", "order": 2, "title_en": "Kathina" }),
                json!({ "id": "e2", "order": 0, "title_en": "Vesak Bochea" }),
                json!({ "id": "e3", "order": 1, "title_en": "Pchum Ben" }),
                json!({ "id": "e4", "order": 1, "title_en": "Meak Bochea" }),
            ],
        );
        client
    }

    #[tokio::test]
    async fn collection_is_sorted_ascending_by_default() {
        let fetcher = CollectionFetcher::<Event>::new(
            events_client(),
            "events",
            FetchOptions::ordered(OrderBy {
                column: "order".into(),
                ascending: None,
            }),
        );

        let state = fetcher.fetch().await;

        assert!(!state.loading);
        assert_eq!(state.error, None);
        let ids: Vec<_> = state.data.iter().map(|e| e.id.as_str()).collect();
        // Ties on `order` keep insertion order.
        assert_eq!(ids, ["e2", "e3", "e4", "e1"]);
    }

    #[tokio::test]
    async fn collection_honours_descending_and_limit() {
        let fetcher = CollectionFetcher::<Event>::new(
            events_client(),
            "events",
            FetchOptions::ordered(OrderBy::desc("order")).with_limit(2),
        );

        let state = fetcher.fetch().await;

        let orders: Vec<_> = state.data.iter().map(|e| e.order).collect();
        assert_eq!(orders, [2, 1]);
    }

    #[tokio::test]
    async fn collection_failure_empties_data_and_names_table() {
        let mut mock = MockDataClient::new();
        mock.expect_select()
            .times(1)
            .returning(|table, _| Err(DataError::backend(table, "connection reset")));
        let fetcher = CollectionFetcher::<Event>::new(Arc::new(mock), "events", FetchOptions::default());

        let state = fetcher.fetch().await;

        assert!(state.data.is_empty());
        assert!(!state.loading);
        assert_eq!(state.error.map(|e| e.to_string()).as_deref(), Some("could not load events"));
    }

    #[tokio::test]
    async fn reconfigure_with_same_inputs_does_not_refetch() {
        let mut mock = MockDataClient::new();
        mock.expect_select().times(1).returning(|_, _| Ok(Vec::new()));
        let fetcher = CollectionFetcher::<Event>::new(Arc::new(mock), "events", FetchOptions::default());

        fetcher.fetch().await;
        let state = fetcher.reconfigure("events", FetchOptions::default()).await;

        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn superseded_response_does_not_overwrite_newer_state() {
        let gated = Arc::new(GatedClient::new("slow"));
        let fetcher = CollectionFetcher::<serde_json::Map<String, serde_json::Value>>::new(
            gated.clone(),
            "slow",
            FetchOptions::default(),
        );

        let first = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch().await })
        };
        gated.wait_until_blocked().await;

        let newer = fetcher.reconfigure("fast", FetchOptions::default()).await;
        assert_eq!(newer.data.len(), 1);

        gated.release();
        first.await.unwrap();

        let state = fetcher.state();
        assert_eq!(state.data.len(), 1);
        assert_eq!(state.data[0]["table"], "fast");
    }

    #[tokio::test]
    async fn in_flight_fetch_keeps_previous_rows() {
        let gated = Arc::new(GatedClient::new("slow"));
        let fetcher = CollectionFetcher::<serde_json::Map<String, serde_json::Value>>::new(
            gated.clone(),
            "fast",
            FetchOptions::default(),
        );
        let settled = fetcher.fetch().await;
        assert_eq!(settled.data[0]["table"], "fast");

        let second = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.reconfigure("slow", FetchOptions::default()).await })
        };
        gated.wait_until_blocked().await;

        let pending = fetcher.state();
        assert!(pending.loading);
        assert_eq!(pending.error, None);
        assert_eq!(pending.data, settled.data);

        gated.release();
        let done = second.await.unwrap();
        assert!(!done.loading);
        assert_eq!(done.data[0]["table"], "slow");
    }

    #[tokio::test]
    async fn document_found_and_not_found() {
        let fetcher = DocumentFetcher::<Event>::new(events_client(), "events", "e3");

        let found = fetcher.fetch().await;
        assert_eq!(found.error, None);
        assert_eq!(found.data.map(|e| e.title_en), Some("Pchum Ben".to_string()));

        let missing = fetcher.reconfigure("events", "nope").await;
        assert_eq!(missing.data, None);
        assert_eq!(missing.error, Some(FetchError::NotFound));
    }

    #[tokio::test]
    async fn document_with_empty_id_never_calls_backend() {
        let mut mock = MockDataClient::new();
        mock.expect_select_one().never();
        let fetcher = DocumentFetcher::<Event>::new(Arc::new(mock), "events", "");

        let state = fetcher.fetch().await;

        assert_eq!(state.error, Some(FetchError::MissingId));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn document_backend_failure_is_not_a_not_found() {
        let mut mock = MockDataClient::new();
        mock.expect_select_one()
            .returning(|table, _| Err(DataError::backend(table, "503")));
        let fetcher = DocumentFetcher::<Event>::new(Arc::new(mock), "events", "e1");

        let state = fetcher.fetch().await;

        assert_eq!(
            state.error,
            Some(FetchError::Document {
                table: "events".into()
            })
        );
    }

    /// A data client whose first select on a given table blocks until
    /// released, so a later fetch can overtake it.
    mod gated {
        use std::sync::atomic::{AtomicBool, Ordering};

        use domains::{DataClient, DataError, FetchOptions, Row};
        use tokio::sync::Notify;

        pub struct GatedClient {
            slow_table: &'static str,
            blocked: Notify,
            is_blocked: AtomicBool,
            gate: Notify,
        }

        impl GatedClient {
            pub fn new(slow_table: &'static str) -> Self {
                Self {
                    slow_table,
                    blocked: Notify::new(),
                    is_blocked: AtomicBool::new(false),
                    gate: Notify::new(),
                }
            }

            pub async fn wait_until_blocked(&self) {
                while !self.is_blocked.load(Ordering::SeqCst) {
                    self.blocked.notified().await;
                }
            }

            pub fn release(&self) {
                self.gate.notify_one();
            }
        }

        #[async_trait::async_trait]
        impl DataClient for GatedClient {
            async fn select(&self, table: &str, _: &FetchOptions) -> Result<Vec<Row>, DataError> {
                if table == self.slow_table {
                    self.is_blocked.store(true, Ordering::SeqCst);
                    self.blocked.notify_one();
                    self.gate.notified().await;
                }
                let mut row = Row::new();
                row.insert("table".into(), table.into());
                Ok(vec![row])
            }

            async fn select_one(&self, table: &str, id: &str) -> Result<Row, DataError> {
                Err(DataError::not_found(table, id))
            }

            async fn insert(&self, _: &str, row: Row) -> Result<Row, DataError> {
                Ok(row)
            }

            async fn update(&self, _: &str, _: &str, _: Row) -> Result<(), DataError> {
                Ok(())
            }

            async fn upsert(&self, _: &str, _: &str, _: Row) -> Result<(), DataError> {
                Ok(())
            }

            async fn delete(&self, _: &str, _: &str, _: &str) -> Result<(), DataError> {
                Ok(())
            }
        }
    }
}
