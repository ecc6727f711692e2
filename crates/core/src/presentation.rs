//! Observable "loading or image" cell shared with the display layer
//!
//! One writer ([`PresentationStore`], owned by the pipeline) and any number
//! of readers ([`PresentationView`]). The matrix is published as a whole
//! behind an `Arc`, so readers never see a partially built image.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::barcode::BarcodeMatrix;

/// What the display should show
#[derive(Debug, Clone, Default)]
pub enum PresentationState {
    /// No image yet (spinner)
    #[default]
    Pending,
    /// Rendered code
    Ready(Arc<BarcodeMatrix>),
}

impl PresentationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, PresentationState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PresentationState::Ready(_))
    }

    pub fn matrix(&self) -> Option<&Arc<BarcodeMatrix>> {
        match self {
            PresentationState::Ready(matrix) => Some(matrix),
            PresentationState::Pending => None,
        }
    }
}

/// Writer half of the presentation cell
#[derive(Debug)]
pub struct PresentationStore {
    tx: watch::Sender<PresentationState>,
}

impl Default for PresentationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationStore {
    /// Create a store in the `Pending` state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PresentationState::Pending);
        Self { tx }
    }

    /// New reader observing this store
    pub fn view(&self) -> PresentationView {
        PresentationView {
            rx: self.tx.subscribe(),
        }
    }

    /// Current state snapshot
    pub fn current(&self) -> PresentationState {
        self.tx.borrow().clone()
    }

    /// Publish the rendered matrix
    ///
    /// Only the first call transitions `Pending → Ready`; later calls are
    /// ignored and return `false`.
    pub fn publish(&self, matrix: BarcodeMatrix) -> bool {
        let matrix = Arc::new(matrix);
        let published = self.tx.send_if_modified(|state| {
            if state.is_pending() {
                *state = PresentationState::Ready(matrix);
                true
            } else {
                false
            }
        });

        if published {
            debug!("Presentation state is now Ready");
        } else {
            warn!("Presentation already Ready, ignoring second publish");
        }
        published
    }
}

/// Reader half of the presentation cell
#[derive(Debug, Clone)]
pub struct PresentationView {
    rx: watch::Receiver<PresentationState>,
}

impl PresentationView {
    /// Current state snapshot
    pub fn current(&self) -> PresentationState {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_ready()
    }

    /// Wait until the image is published
    ///
    /// Returns `None` if the store is dropped while still pending, i.e. the
    /// pipeline ended without an image.
    pub async fn wait_ready(&mut self) -> Option<Arc<BarcodeMatrix>> {
        let state = self.rx.wait_for(PresentationState::is_ready).await.ok()?;
        state.matrix().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_store_starts_pending() {
        let store = PresentationStore::new();
        assert!(store.current().is_pending());
        assert!(!store.view().is_ready());
        assert!(store.current().matrix().is_none());
    }

    #[test]
    fn test_publish_transitions_once() {
        let store = PresentationStore::new();
        let view = store.view();

        assert!(store.publish(barcode::encode("FIRST").unwrap()));
        assert!(view.is_ready());

        let first = view.current().matrix().cloned().unwrap();
        assert!(!store.publish(barcode::encode("SECOND").unwrap()));

        let after = view.current().matrix().cloned().unwrap();
        assert!(Arc::ptr_eq(&first, &after));
    }

    #[test]
    fn test_publish_without_readers() {
        let store = PresentationStore::new();
        assert!(store.publish(barcode::encode("X").unwrap()));
        assert!(store.current().is_ready());
        // Views created later still see Ready
        assert!(store.view().is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_receives_published_matrix() {
        let store = PresentationStore::new();
        let mut view = store.view();
        let expected = barcode::encode("TOKEN42").unwrap();

        let publisher = {
            let expected = expected.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                store.publish(expected);
                store
            })
        };

        let matrix = timeout(Duration::from_secs(5), view.wait_ready())
            .await
            .expect("wait_ready timed out")
            .expect("matrix published");
        assert_eq!(*matrix, expected);
        drop(publisher.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_ready_returns_none_when_store_dropped() {
        let store = PresentationStore::new();
        let mut view = store.view();
        drop(store);
        assert!(view.wait_ready().await.is_none());
    }

    #[tokio::test]
    async fn test_many_readers_observe_same_matrix() {
        let store = PresentationStore::new();
        let views: Vec<_> = (0..4).map(|_| store.view()).collect();
        store.publish(barcode::encode("SHARED").unwrap());

        let matrices: Vec<_> = views
            .iter()
            .map(|v| v.current().matrix().cloned().unwrap())
            .collect();
        for m in &matrices[1..] {
            assert!(Arc::ptr_eq(&matrices[0], m));
        }
    }
}
