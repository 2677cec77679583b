// SPDX-License-Identifier: Apache-2.0

use chulha_model::CollectionRef;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One FIFO lane per collection. Holding the guard serialises every
/// mutation on that collection; tokio mutexes hand the lock out in request
/// order, so writes reach the backend in the order they were issued.
#[derive(Default)]
pub struct WriteQueue {
    lanes: Mutex<HashMap<CollectionRef, Arc<Mutex<()>>>>,
}

impl WriteQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, collection: &CollectionRef) -> OwnedMutexGuard<()> {
        let lane = {
            let mut lanes = self.lanes.lock().await;
            Arc::clone(
                lanes
                    .entry(collection.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lane.lock_owned().await
    }
}
