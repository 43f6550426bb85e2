//! FlowController — sequences the onboarding/funding screens.
//!
//! The controller owns which single screen is active and executes the
//! transition when a screen reports done, back, or an error. Screens are
//! rendered by the host; the host forwards user actions into the
//! controller carrying the [`ScreenToken`] it was handed when the screen
//! became active. Dispatch is expected to come from a single UI event
//! loop; the token makes a completion that arrives after the controller
//! has already moved on a harmless no-op.
//!
//! Persistence policy is explicit per call site: completion-flag writes
//! (documents completed, KYC verified) are fire-and-forget with logged
//! failures and a follow-up status re-read, while payment settlement and
//! verification-session starts block and surface their errors inline.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::FlowConfig;
use crate::error::{Error, FlowError, Result};
use crate::flow::events::{CloseReason, EventBus, FlowEvent};
use crate::flow::state::{FlowState, PaymentMethod};
use crate::screens::card::CardDetails;
use crate::screens::documents::DocumentSubmission;
use crate::screens::funding::FundingRequest;
use crate::services::documents::{DocumentService, SignedDocumentRecord};
use crate::services::kyc::{KycService, KycSession};
use crate::services::payments::crypto::CryptoPaymentUpdate;
use crate::services::payments::wire;
use crate::services::payments::{PaymentAssets, PaymentServices, crypto};
use crate::status::StatusProvider;

/// Reason string written on the override compliance record.
const OVERRIDE_REASON: &str = "verification window elapsed";

/// Opaque handle identifying one activation of a screen. Handed out when a
/// screen becomes active; every completion/back/prepare call must present
/// it. A token from a screen the controller has left is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenToken {
    epoch: u64,
}

/// The currently active screen and its token.
#[derive(Debug, Clone, Copy)]
pub struct ActiveScreen {
    pub state: FlowState,
    pub token: ScreenToken,
}

/// What a screen reports through its completion callback.
#[derive(Debug)]
pub enum Completion {
    /// EmptyState CTA: re-evaluate the entry branch against fresh status.
    FundRequested,
    /// All required documents signed.
    DocumentsSigned(DocumentSubmission),
    /// The user dismissed the congratulations interstitial.
    CelebrationAcknowledged,
    /// The embedded verification page signalled completion.
    KycFinished,
    /// Amount and method chosen on the funding form.
    ContributionChosen(FundingRequest),
    /// Card details confirmed; charge now.
    CardPaymentConfirmed(CardDetails),
    /// The user confirmed a wire/bank/crypto transfer is underway.
    TransferInitiated,
}

impl Completion {
    fn label(&self) -> &'static str {
        match self {
            Self::FundRequested => "fund_requested",
            Self::DocumentsSigned(_) => "documents_signed",
            Self::CelebrationAcknowledged => "celebration_acknowledged",
            Self::KycFinished => "kyc_finished",
            Self::ContributionChosen(_) => "contribution_chosen",
            Self::CardPaymentConfirmed(_) => "card_payment_confirmed",
            Self::TransferInitiated => "transfer_initiated",
        }
    }
}

/// Method-specific input for preparing a payment screen's assets.
#[derive(Debug)]
pub enum PaymentPrep {
    Card,
    Wire,
    Bank,
    Crypto { pay_currency: String },
}

impl PaymentPrep {
    fn method(&self) -> PaymentMethod {
        match self {
            Self::Card => PaymentMethod::Card,
            Self::Wire => PaymentMethod::Wire,
            Self::Bank => PaymentMethod::Bank,
            Self::Crypto { .. } => PaymentMethod::Crypto,
        }
    }
}

/// External collaborators the controller drives.
#[derive(Clone)]
pub struct FlowDeps {
    pub status: Arc<dyn StatusProvider>,
    pub documents: Arc<dyn DocumentService>,
    pub kyc: Arc<dyn KycService>,
    pub payments: PaymentServices,
}

struct Inner {
    state: FlowState,
    epoch: u64,
    pending_amount: Option<Decimal>,
    kyc_session: Option<KycSession>,
    kyc_timer: Option<JoinHandle<()>>,
    payment_assets: Option<PaymentAssets>,
}

impl Inner {
    fn abort_timer(&mut self) {
        if let Some(timer) = self.kyc_timer.take() {
            timer.abort();
        }
    }
}

/// The flow controller. Construct with [`FlowController::open`]; share via
/// `Arc` with whatever forwards screen events.
pub struct FlowController {
    user_id: String,
    config: FlowConfig,
    status: Arc<dyn StatusProvider>,
    documents: Arc<dyn DocumentService>,
    kyc: Arc<dyn KycService>,
    payments: PaymentServices,
    events: EventBus,
    inner: RwLock<Inner>,
}

impl FlowController {
    /// Open the flow for a user: read the status snapshot once, enter the
    /// computed entry screen, and return the controller with the active
    /// screen. Entering verification starts a session and arms the
    /// override countdown.
    pub async fn open(
        deps: FlowDeps,
        config: FlowConfig,
        user_id: impl Into<String>,
    ) -> Result<(Arc<Self>, ActiveScreen)> {
        let controller = Arc::new(Self {
            user_id: user_id.into(),
            config,
            status: deps.status,
            documents: deps.documents,
            kyc: deps.kyc,
            payments: deps.payments,
            events: EventBus::new(),
            inner: RwLock::new(Inner {
                state: FlowState::EmptyState,
                epoch: 0,
                pending_amount: None,
                kyc_session: None,
                kyc_timer: None,
                payment_assets: None,
            }),
        });

        let status = controller
            .status
            .status(&controller.user_id)
            .await
            .map_err(Error::Status)?;
        let entry = FlowState::entry_for(&status);
        let active = controller.enter(0, entry).await?;
        info!(user = %controller.user_id, state = %active.state, "Funding flow opened");
        Ok((controller, active))
    }

    /// The currently active screen.
    pub async fn active(&self) -> ActiveScreen {
        let inner = self.inner.read().await;
        ActiveScreen {
            state: inner.state,
            token: ScreenToken { epoch: inner.epoch },
        }
    }

    /// Contribution amount chosen on the funding form, if any.
    pub async fn pending_amount(&self) -> Option<Decimal> {
        self.inner.read().await.pending_amount
    }

    /// The verification session backing the active verification screen.
    pub async fn kyc_session(&self) -> Option<KycSession> {
        self.inner.read().await.kyc_session.clone()
    }

    /// Subscribe to flow events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    /// Subscribe to flow events as a `Stream`.
    pub fn events(&self) -> tokio_stream::wrappers::BroadcastStream<FlowEvent> {
        self.events.stream()
    }

    /// Forward a screen's completion callback.
    pub async fn complete(
        self: &Arc<Self>,
        token: ScreenToken,
        completion: Completion,
    ) -> Result<ActiveScreen> {
        let state = self.guard(token).await?;

        match (state, completion) {
            (FlowState::EmptyState, Completion::FundRequested) => {
                // Same branching as entry, re-evaluated against current
                // status.
                let status = self.status.status(&self.user_id).await.map_err(Error::Status)?;
                self.enter(token.epoch, FlowState::entry_for(&status)).await
            }

            (FlowState::DocumentSigning, Completion::DocumentsSigned(submission)) => {
                submission.validate().map_err(Error::Validation)?;
                let records = submission.into_records();
                // Claim the transition first so a duplicate completion
                // cannot spawn a second persist.
                let active = self.enter(token.epoch, FlowState::Congratulations).await?;
                self.spawn_optimistic_document_persist(records);
                Ok(active)
            }

            (FlowState::Congratulations, Completion::CelebrationAcknowledged) => {
                self.enter(token.epoch, FlowState::KycVerification).await
            }

            (FlowState::KycVerification, Completion::KycFinished) => {
                let active = self.enter(token.epoch, FlowState::FundingForm).await?;
                self.spawn_optimistic_kyc_mark();
                Ok(active)
            }

            (FlowState::FundingForm, Completion::ContributionChosen(request)) => {
                request
                    .validate(self.config.min_contribution)
                    .map_err(Error::Validation)?;
                let active = self
                    .enter(token.epoch, FlowState::PaymentMethod(request.method))
                    .await?;
                self.inner.write().await.pending_amount = Some(request.amount);
                info!(amount = %request.amount, method = %request.method, "Contribution chosen");
                Ok(active)
            }

            (
                FlowState::PaymentMethod(PaymentMethod::Card),
                Completion::CardPaymentConfirmed(card),
            ) => {
                card.validate().map_err(Error::Validation)?;
                let Some(amount) = self.inner.read().await.pending_amount else {
                    self.degrade("card payment confirmed without a pending amount")
                        .await;
                    return Err(FlowError::PaymentNotPrepared.into());
                };
                // Blocking policy: an irreversible charge must settle
                // before the screen is left. Declines surface inline.
                let charge = self
                    .payments
                    .card
                    .create_charge(&self.user_id, amount, &card)
                    .await
                    .map_err(Error::Payment)?;
                info!(charge = %charge.charge_id, %amount, "Card charge settled");
                self.events.publish(FlowEvent::BalanceRefreshRequested);
                self.close(CloseReason::PaymentSettled).await;
                Ok(self.active().await)
            }

            (FlowState::PaymentMethod(method), Completion::TransferInitiated)
                if method != PaymentMethod::Card =>
            {
                if self.inner.read().await.payment_assets.is_none() {
                    return Err(FlowError::PaymentNotPrepared.into());
                }
                info!(%method, "Transfer initiated; funds pending external confirmation");
                self.close(CloseReason::TransferPending).await;
                Ok(self.active().await)
            }

            (state, completion) => {
                let label = completion.label();
                self.degrade(label).await;
                Err(FlowError::UnexpectedCompletion {
                    state,
                    completion: label.to_string(),
                }
                .into())
            }
        }
    }

    /// Forward a screen's back callback. Targets come from the fixed
    /// predecessor table, recomputed against a fresh status read; a screen
    /// with no predecessor leaves the flow.
    pub async fn go_back(self: &Arc<Self>, token: ScreenToken) -> Result<ActiveScreen> {
        let state = self.guard(token).await?;

        let status = self.status.status(&self.user_id).await.map_err(Error::Status)?;
        match state.back_target(&status) {
            Some(target) => {
                debug!(from = %state, to = %target, "Back navigation");
                self.enter(token.epoch, target).await
            }
            None => {
                self.close(CloseReason::Dismissed).await;
                Ok(self.active().await)
            }
        }
    }

    /// Retry from the degraded failure screen: recompute entry from a
    /// fresh snapshot and start over.
    pub async fn retry(self: &Arc<Self>, token: ScreenToken) -> Result<ActiveScreen> {
        let state = self.guard(token).await?;
        if state != FlowState::Failure {
            return Err(FlowError::NotInFailure { state }.into());
        }
        let status = self.status.status(&self.user_id).await.map_err(Error::Status)?;
        self.enter(token.epoch, FlowState::entry_for(&status)).await
    }

    /// Fetch the assets a payment screen displays. Card needs none; wire
    /// registers an intent and returns deposit instructions; bank initiates
    /// the transfer; crypto creates an invoice and starts the out-of-band
    /// status watcher. Errors leave the screen active for retry.
    pub async fn prepare_payment(
        self: &Arc<Self>,
        token: ScreenToken,
        prep: PaymentPrep,
    ) -> Result<PaymentAssets> {
        let state = self.guard(token).await?;
        let FlowState::PaymentMethod(method) = state else {
            self.degrade("prepare_payment outside a payment screen").await;
            return Err(FlowError::UnexpectedCompletion {
                state,
                completion: "prepare_payment".to_string(),
            }
            .into());
        };
        if prep.method() != method {
            self.degrade("payment preparation does not match the active method")
                .await;
            return Err(FlowError::UnexpectedCompletion {
                state,
                completion: format!("prepare:{}", prep.method()),
            }
            .into());
        }
        let Some(amount) = self.inner.read().await.pending_amount else {
            return Err(FlowError::PaymentNotPrepared.into());
        };

        let assets = match prep {
            PaymentPrep::Card => PaymentAssets::Card,
            PaymentPrep::Wire => {
                let reference = wire::generate_reference();
                let instructions = self
                    .payments
                    .wire
                    .create_wire_instructions(&self.user_id, amount, &reference)
                    .await
                    .map_err(Error::Payment)?;
                PaymentAssets::Wire { instructions }
            }
            PaymentPrep::Bank => {
                let transfer = self
                    .payments
                    .bank
                    .initiate_transfer(&self.user_id, amount)
                    .await
                    .map_err(Error::Payment)?;
                PaymentAssets::Bank { transfer }
            }
            PaymentPrep::Crypto { pay_currency } => {
                let invoice = self
                    .payments
                    .crypto
                    .create_invoice(&self.user_id, amount, &pay_currency)
                    .await
                    .map_err(Error::Payment)?;
                self.spawn_crypto_watch(invoice.payment_id);
                PaymentAssets::Crypto { invoice }
            }
        };

        let mut inner = self.inner.write().await;
        if inner.epoch != token.epoch {
            return Err(FlowError::StaleScreen {
                submitted: token.epoch,
                current: inner.epoch,
            }
            .into());
        }
        inner.payment_assets = Some(assets.clone());
        Ok(assets)
    }

    /// Close the flow. Idempotent; aborts the override countdown, clears
    /// per-flow state, and refuses all further dispatch. Background
    /// persistence and the crypto watcher are abandoned, not cancelled:
    /// their writes are externally owned and idempotent.
    pub async fn close(&self, reason: CloseReason) {
        let mut inner = self.inner.write().await;
        if inner.state == FlowState::Closed {
            return;
        }
        inner.abort_timer();
        inner.epoch += 1;
        inner.state = FlowState::Closed;
        inner.pending_amount = None;
        inner.kyc_session = None;
        inner.payment_assets = None;
        drop(inner);
        info!(?reason, "Funding flow closed");
        self.events.publish(FlowEvent::Closed { reason });
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Validate a dispatch: the flow must be open and the token current.
    /// Returns the active state.
    async fn guard(&self, token: ScreenToken) -> Result<FlowState> {
        let inner = self.inner.read().await;
        if inner.state == FlowState::Closed {
            return Err(FlowError::Closed.into());
        }
        if inner.epoch != token.epoch {
            return Err(FlowError::StaleScreen {
                submitted: token.epoch,
                current: inner.epoch,
            }
            .into());
        }
        Ok(inner.state)
    }

    /// Transition into `target`, claiming the move against `from_epoch`.
    /// Entering verification first starts a session (blocking, errors leave
    /// the current screen active) and arms the override countdown.
    async fn enter(self: &Arc<Self>, from_epoch: u64, target: FlowState) -> Result<ActiveScreen> {
        let session = if target == FlowState::KycVerification {
            let session = self
                .kyc
                .start_session(&self.user_id)
                .await
                .map_err(Error::Kyc)?;
            info!(session = %session.session_id, "Verification session started");
            Some(session)
        } else {
            None
        };

        let active = {
            let mut inner = self.inner.write().await;
            if inner.epoch != from_epoch {
                return Err(FlowError::StaleScreen {
                    submitted: from_epoch,
                    current: inner.epoch,
                }
                .into());
            }
            inner.abort_timer();
            inner.epoch += 1;
            inner.state = target;
            inner.kyc_session = session;
            inner.payment_assets = None;
            ActiveScreen {
                state: target,
                token: ScreenToken { epoch: inner.epoch },
            }
        };

        if target == FlowState::KycVerification {
            self.arm_override_timer(active.token.epoch).await;
        }
        debug!(state = %target, epoch = active.token.epoch, "Screen entered");
        self.events.publish(FlowEvent::ScreenEntered { state: target });
        Ok(active)
    }

    /// Force the degraded failure screen. Used when the host wires a
    /// completion to the wrong screen; the flow must never strand with no
    /// active screen.
    async fn degrade(&self, context: &str) {
        error!(context, "Degrading to failure screen");
        let mut inner = self.inner.write().await;
        if inner.state == FlowState::Closed {
            return;
        }
        inner.abort_timer();
        inner.epoch += 1;
        inner.state = FlowState::Failure;
        inner.kyc_session = None;
        inner.payment_assets = None;
        drop(inner);
        self.events.publish(FlowEvent::ScreenEntered {
            state: FlowState::Failure,
        });
    }

    /// Arm the availability-override countdown for one verification
    /// entry. The task is aborted when the screen is left for any reason;
    /// the epoch check makes a late firing a no-op.
    async fn arm_override_timer(self: &Arc<Self>, epoch: u64) {
        let controller = Arc::clone(self);
        let after = self.config.kyc_override_after;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            controller.apply_kyc_override(epoch).await;
        });

        let mut inner = self.inner.write().await;
        if inner.epoch == epoch && inner.state == FlowState::KycVerification {
            inner.abort_timer();
            inner.kyc_timer = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// The availability override: the verification window elapsed without
    /// a user-driven completion, so the user is admitted to the funding
    /// form and a compliance record of the override is written.
    async fn apply_kyc_override(self: &Arc<Self>, epoch: u64) {
        let session_id = {
            let inner = self.inner.read().await;
            if inner.state != FlowState::KycVerification || inner.epoch != epoch {
                debug!(epoch, "Override countdown lapsed after screen was left; ignoring");
                return;
            }
            match inner.kyc_session.as_ref() {
                Some(session) => session.session_id,
                None => {
                    warn!("Verification screen active without a session; skipping override");
                    return;
                }
            }
        };

        info!(session = %session_id, "Verification window elapsed; applying availability override");
        // Availability policy: admission proceeds even if the compliance
        // write fails; the failure is logged for reconciliation.
        if let Err(e) = self
            .kyc
            .record_override(&self.user_id, session_id, OVERRIDE_REASON)
            .await
        {
            warn!(session = %session_id, "Failed to record verification override: {e}");
        }

        let advanced = {
            let mut inner = self.inner.write().await;
            if inner.state != FlowState::KycVerification || inner.epoch != epoch {
                // The user's own completion won the race while the
                // override record was being written.
                false
            } else {
                inner.kyc_timer = None;
                inner.epoch += 1;
                inner.state = FlowState::FundingForm;
                inner.kyc_session = None;
                true
            }
        };

        if advanced {
            self.spawn_optimistic_kyc_mark();
            self.events
                .publish(FlowEvent::KycOverrideApplied { session_id });
            self.events.publish(FlowEvent::ScreenEntered {
                state: FlowState::FundingForm,
            });
        }
    }

    /// Optimistic persistence policy for signed documents: the flow moves
    /// on while the records and the completion flag are written in the
    /// background. Failures are logged, never swallowed, and a fresh
    /// status snapshot is published once the writes finish.
    fn spawn_optimistic_document_persist(self: &Arc<Self>, records: Vec<SignedDocumentRecord>) {
        let documents = Arc::clone(&self.documents);
        let status = Arc::clone(&self.status);
        let events = self.events.sender();
        let user_id = self.user_id.clone();

        tokio::spawn(async move {
            let results = futures::future::join_all(
                records
                    .iter()
                    .map(|record| documents.save_signed_document(&user_id, record)),
            )
            .await;
            for (record, result) in records.iter().zip(results) {
                if let Err(e) = result {
                    warn!(doc = %record.doc_id, "Background document save failed: {e}");
                }
            }

            if let Err(e) = status.mark_documents_completed(&user_id).await {
                warn!("Failed to mark documents completed: {e}");
            }

            match status.status(&user_id).await {
                Ok(snapshot) => {
                    let _ = events.send(FlowEvent::StatusRefreshed { status: snapshot });
                }
                Err(e) => warn!("Status re-read after document persist failed: {e}"),
            }
        });
    }

    /// Optimistic persistence policy for the verified flag, shared by the
    /// user-driven completion and the override path.
    fn spawn_optimistic_kyc_mark(self: &Arc<Self>) {
        let status = Arc::clone(&self.status);
        let events = self.events.sender();
        let user_id = self.user_id.clone();

        tokio::spawn(async move {
            if let Err(e) = status.mark_kyc_verified(&user_id).await {
                warn!("Failed to mark KYC verified: {e}");
            }
            match status.status(&user_id).await {
                Ok(snapshot) => {
                    let _ = events.send(FlowEvent::StatusRefreshed { status: snapshot });
                }
                Err(e) => warn!("Status re-read after KYC mark failed: {e}"),
            }
        });
    }

    /// Bridge the crypto watcher's updates onto the flow event stream. The
    /// watcher outlives the payment screen by design: settlement is
    /// out-of-band.
    fn spawn_crypto_watch(self: &Arc<Self>, payment_id: uuid::Uuid) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<CryptoPaymentUpdate>();
        crypto::spawn_status_poll(
            Arc::clone(&self.payments.crypto),
            payment_id,
            self.config.crypto_poll_interval,
            self.config.crypto_poll_attempts,
            tx,
        );

        let events = self.events.sender();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                let _ = events.send(FlowEvent::CryptoPayment {
                    payment_id: update.payment_id,
                    status: update.status,
                });
            }
        });
    }
}
