//! Flow events — broadcast stream the host UI subscribes to.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::flow::state::FlowState;
use crate::services::payments::crypto::CryptoPaymentStatus;
use crate::status::OnboardingStatus;

/// Default broadcast channel capacity.
pub(crate) const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Why the flow closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Card payment settled; the contribution is on the account.
    PaymentSettled,
    /// A wire/bank/crypto transfer was initiated; funds are pending
    /// external confirmation.
    TransferPending,
    /// The user backed out to the portfolio or the host dismissed the flow.
    Dismissed,
}

/// Events published by the controller as the flow progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum FlowEvent {
    /// A new screen became active.
    ScreenEntered { state: FlowState },
    /// A fresh status snapshot was read back after a flag mutation.
    StatusRefreshed { status: OnboardingStatus },
    /// The verification countdown elapsed and the override was applied.
    KycOverrideApplied { session_id: Uuid },
    /// Out-of-band crypto invoice status update from the poll task.
    CryptoPayment {
        payment_id: Uuid,
        status: CryptoPaymentStatus,
    },
    /// The host should re-fetch the account balance.
    BalanceRefreshRequested,
    /// The flow ended.
    Closed { reason: CloseReason },
}

/// Fan-out handle for flow events.
pub(crate) struct EventBus {
    tx: broadcast::Sender<FlowEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event. A send with no subscribers is fine.
    pub(crate) fn publish(&self, event: FlowEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.tx.subscribe()
    }

    /// Clone the raw sender for background tasks that publish events.
    pub(crate) fn sender(&self) -> broadcast::Sender<FlowEvent> {
        self.tx.clone()
    }

    /// Subscribe as a `Stream` for hosts that prefer stream combinators.
    pub(crate) fn stream(&self) -> BroadcastStream<FlowEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }
}
