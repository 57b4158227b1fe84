use std::collections::HashMap;

use dify_relay_common::{AsyncRecord, AsyncStatus};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// In-memory status of every asynchronous request accepted by this process.
///
/// Records are never evicted; they live as long as the process. Writers take
/// the exclusive lock only for the map access itself, never across I/O.
#[derive(Default)]
pub struct AsyncRegistry {
    records: RwLock<HashMap<String, AsyncRecord>>,
}

impl AsyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `pending` record. A missing or empty id gets a fresh UUID v4.
    /// An id that is already taken keeps its record; the new request is
    /// registered under the id with a random suffix instead.
    pub async fn register(&self, request_id: Option<&str>, message: &str) -> AsyncRecord {
        let requested = request_id.map(str::trim).filter(|id| !id.is_empty());

        let mut records = self.records.write().await;
        let request_id = match requested {
            None => Uuid::new_v4().to_string(),
            Some(id) => match records.get(id) {
                None => id.to_string(),
                Some(existing) => {
                    let renamed = format!("{id}-{}", Uuid::new_v4().simple());
                    if existing.status.is_terminal() {
                        info!(request_id = id, renamed = %renamed, "Request id reused after completion");
                    } else {
                        warn!(
                            request_id = id,
                            renamed = %renamed,
                            existing_status = %existing.status,
                            "Request id still in flight"
                        );
                    }
                    renamed
                }
            },
        };

        let record = AsyncRecord {
            request_id: request_id.clone(),
            status: AsyncStatus::Pending,
            message: message.to_string(),
        };
        records.insert(request_id, record.clone());

        record
    }

    /// Overwrite status and message of an existing record. Returns `false`
    /// (and changes nothing) when the id was never registered.
    pub async fn update_status(
        &self,
        request_id: &str,
        status: AsyncStatus,
        message: impl Into<String>,
    ) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(request_id) {
            Some(record) => {
                record.status = status;
                record.message = message.into();
                debug!(request_id, status = %status, "Async status updated");
                true
            }
            None => {
                warn!(request_id, status = %status, "Status update for unknown request id ignored");
                false
            }
        }
    }

    pub async fn get(&self, request_id: &str) -> Option<AsyncRecord> {
        self.records.read().await.get(request_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
