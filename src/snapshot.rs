//! The single live [`StatusSnapshot`], shared between the poll loop, the
//! status API and the chat command responder.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::StatusSnapshot;

/// Lock-guarded handle to the latest snapshot. Cloning shares the same
/// underlying snapshot.
#[derive(Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in `next` under the lock and returns the previous snapshot.
    pub async fn publish(&self, next: StatusSnapshot) -> StatusSnapshot {
        let mut guard = self.inner.lock().await;
        std::mem::replace(&mut *guard, next)
    }

    /// Consistent copy of the current snapshot.
    pub async fn read(&self) -> StatusSnapshot {
        self.inner.lock().await.clone()
    }

    /// Copy with the block age fields recomputed against `now`.
    pub async fn read_at(&self, now: i64) -> StatusSnapshot {
        let mut snap = self.read().await;
        snap.block.refresh(now);
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DnsSeederStatus;

    fn cycle(n: i64) -> StatusSnapshot {
        StatusSnapshot {
            dns_seeders: (0..n as usize % 7 + 1)
                .map(|i| DnsSeederStatus { name: format!("seed-{i}"), node_count: n as usize, ..Default::default() })
                .collect(),
            status: format!("cycle-{n}"),
            last_updated: n,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn publish_returns_previous() {
        let shared = SharedSnapshot::new();
        let prev = shared.publish(cycle(1)).await;
        assert!(!prev.is_populated());
        let prev = shared.publish(cycle(2)).await;
        assert_eq!(prev.last_updated, 1);
        assert_eq!(shared.read().await.last_updated, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_mixed_cycles() {
        let shared = SharedSnapshot::new();
        shared.publish(cycle(1)).await;

        let mut readers = Vec::new();
        for _ in 0..4 {
            let shared = shared.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let snap = shared.read().await;
                    let n = snap.last_updated;
                    assert_eq!(snap.status, format!("cycle-{n}"));
                    assert_eq!(snap.dns_seeders.len(), n as usize % 7 + 1);
                    assert!(snap.dns_seeders.iter().all(|s| s.node_count == n as usize));
                    tokio::task::yield_now().await;
                }
            }));
        }

        for n in 2..300 {
            shared.publish(cycle(n)).await;
            tokio::task::yield_now().await;
        }

        for r in readers {
            r.await.unwrap();
        }
    }

    #[tokio::test]
    async fn read_at_refreshes_block_age() {
        let shared = SharedSnapshot::new();
        let mut snap = cycle(1);
        snap.block.block_time = 1_000;
        shared.publish(snap).await;
        let seen = shared.read_at(1_700).await;
        assert_eq!(seen.block.time_elapsed, 700);
        assert_eq!(seen.block.status, "Block not found within 10 minutes.");
    }
}
