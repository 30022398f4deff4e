use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::{BlobError, BlobResult};

const UNIT_BYTES: u64 = 1024;

/// Process-wide cap on bytes buffered by concurrent transfers.
///
/// Reservations are tracked in KiB units, rounded up, and wait until enough
/// of the budget has been released by other transfers.
#[derive(Debug, Clone)]
pub struct TransferBudget {
    permits: Arc<Semaphore>,
    total_units: usize,
}

/// Share of a [`TransferBudget`] held for the lifetime of one transfer
#[derive(Debug)]
pub struct TransferPermit {
    _permit: OwnedSemaphorePermit,
    bytes: u64,
}

impl TransferPermit {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl TransferBudget {
    pub fn new(max_inflight_bytes: u64) -> Self {
        let total_units = usize::try_from(units_for(max_inflight_bytes))
            .unwrap_or(usize::MAX)
            .min(Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(total_units)),
            total_units,
        }
    }

    /// Bytes currently free for new transfers
    pub fn available_bytes(&self) -> u64 {
        self.permits.available_permits() as u64 * UNIT_BYTES
    }

    /// Wait for `bytes` of budget. Fails at once if the request could never fit.
    pub async fn reserve(&self, bytes: u64) -> BlobResult<TransferPermit> {
        let units = units_for(bytes);
        if units > self.total_units as u64 {
            return Err(BlobError::configuration(format!(
                "transfer of {bytes} bytes exceeds in-flight budget of {} bytes",
                self.total_units as u64 * UNIT_BYTES
            )));
        }
        // total_units bounds units, and acquire_many takes u32
        let units = u32::try_from(units).map_err(|_| {
            BlobError::configuration(format!("transfer of {bytes} bytes is too large to reserve"))
        })?;

        if (self.permits.available_permits() as u64) < units as u64 {
            debug!("Waiting for {} bytes of transfer budget", bytes);
        }
        let permit = self
            .permits
            .clone()
            .acquire_many_owned(units)
            .await
            .map_err(|_| BlobError::configuration("transfer budget closed"))?;

        Ok(TransferPermit {
            _permit: permit,
            bytes,
        })
    }
}

fn units_for(bytes: u64) -> u64 {
    bytes.div_ceil(UNIT_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reserve_and_release() {
        let budget = TransferBudget::new(8 * 1024);
        assert_eq!(budget.available_bytes(), 8 * 1024);

        let permit = budget.reserve(3000).await.unwrap();
        assert_eq!(permit.bytes(), 3000);
        assert_eq!(budget.available_bytes(), 5 * 1024);

        drop(permit);
        assert_eq!(budget.available_bytes(), 8 * 1024);
    }

    #[tokio::test]
    async fn test_zero_bytes_needs_no_budget() {
        let budget = TransferBudget::new(1024);
        let _held = budget.reserve(1024).await.unwrap();
        let empty = tokio::time::timeout(Duration::from_millis(100), budget.reserve(0)).await;
        assert!(empty.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_oversized_request_fails_fast() {
        let budget = TransferBudget::new(4 * 1024);
        let result = budget.reserve(4 * 1024 + 1).await;
        assert!(matches!(result, Err(BlobError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_reserve_waits_for_release() {
        let budget = TransferBudget::new(4 * 1024);
        let first = budget.reserve(3 * 1024).await.unwrap();

        let waiter = {
            let budget = budget.clone();
            tokio::spawn(async move { budget.reserve(2 * 1024).await.map(|p| p.bytes()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        assert_eq!(waiter.await.unwrap().unwrap(), 2 * 1024);
    }
}
