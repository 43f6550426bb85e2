//! End-to-end scenarios for the funding flow.
//!
//! Each test wires the controller to in-memory stub services and walks a
//! full user journey through the real dispatch path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::timeout;
use uuid::Uuid;

use fundflow::config::FlowConfig;
use fundflow::error::{DocumentError, KycError, PaymentError, StatusError};
use fundflow::flow::{
    CloseReason, Completion, FlowController, FlowDeps, FlowEvent, FlowState, PaymentMethod,
    PaymentPrep,
};
use fundflow::screens::card::CardDetails;
use fundflow::screens::documents::{
    DocumentSubmission, ExhibitA, ExhibitB, ExhibitC, ExhibitD,
};
use fundflow::screens::funding::FundingRequest;
use fundflow::services::documents::{DocumentService, SignedDocumentRecord};
use fundflow::services::kyc::{KycService, KycSession};
use fundflow::services::payments::bank::{BankLink, BankTransfer};
use fundflow::services::payments::card::{CardCharge, CardGateway};
use fundflow::services::payments::crypto::{CryptoGateway, CryptoInvoice, CryptoPaymentStatus};
use fundflow::services::payments::wire::{WireInstructions, WireService};
use fundflow::services::payments::PaymentServices;
use fundflow::services::payments::PaymentAssets;
use fundflow::status::{KycStatus, OnboardingStatus, StatusProvider};

/// Maximum time any non-paused test is allowed to run before we consider
/// it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ── Stub backend ────────────────────────────────────────────────────

/// Shared stub backend: status flags plus call counters for every write.
struct StubBackend {
    snapshot: std::sync::Mutex<OnboardingStatus>,
    documents_saved: AtomicUsize,
    overrides_recorded: AtomicUsize,
    sessions_started: AtomicUsize,
    charges_created: AtomicUsize,
    crypto_status: std::sync::Mutex<CryptoPaymentStatus>,
}

impl StubBackend {
    fn new(snapshot: OnboardingStatus) -> Arc<Self> {
        Arc::new(Self {
            snapshot: std::sync::Mutex::new(snapshot),
            documents_saved: AtomicUsize::new(0),
            overrides_recorded: AtomicUsize::new(0),
            sessions_started: AtomicUsize::new(0),
            charges_created: AtomicUsize::new(0),
            crypto_status: std::sync::Mutex::new(CryptoPaymentStatus::Waiting),
        })
    }

    fn deps(self: &Arc<Self>) -> FlowDeps {
        FlowDeps {
            status: Arc::clone(self) as Arc<dyn StatusProvider>,
            documents: Arc::clone(self) as Arc<dyn DocumentService>,
            kyc: Arc::clone(self) as Arc<dyn KycService>,
            payments: PaymentServices {
                card: Arc::clone(self) as Arc<dyn CardGateway>,
                wire: Arc::clone(self) as Arc<dyn WireService>,
                bank: Arc::clone(self) as Arc<dyn BankLink>,
                crypto: Arc::clone(self) as Arc<dyn CryptoGateway>,
            },
        }
    }
}

#[async_trait]
impl StatusProvider for StubBackend {
    async fn status(&self, _user_id: &str) -> Result<OnboardingStatus, StatusError> {
        Ok(*self.snapshot.lock().unwrap())
    }

    async fn mark_documents_completed(&self, _user_id: &str) -> Result<(), StatusError> {
        self.snapshot.lock().unwrap().documents_completed = true;
        Ok(())
    }

    async fn mark_kyc_verified(&self, _user_id: &str) -> Result<(), StatusError> {
        self.snapshot.lock().unwrap().kyc_status = KycStatus::Verified;
        Ok(())
    }

    async fn balance(&self, _user_id: &str) -> Result<Decimal, StatusError> {
        Ok(dec!(0))
    }
}

#[async_trait]
impl DocumentService for StubBackend {
    async fn save_signed_document(
        &self,
        _user_id: &str,
        _record: &SignedDocumentRecord,
    ) -> Result<(), DocumentError> {
        self.documents_saved.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl KycService for StubBackend {
    async fn start_session(&self, _user_id: &str) -> Result<KycSession, KycError> {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
        Ok(KycSession {
            session_id: Uuid::new_v4(),
            session_url: "https://verify.example/session".to_string(),
        })
    }

    async fn record_override(
        &self,
        _user_id: &str,
        _session_id: Uuid,
        _reason: &str,
    ) -> Result<(), KycError> {
        self.overrides_recorded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CardGateway for StubBackend {
    async fn create_charge(
        &self,
        _user_id: &str,
        amount: Decimal,
        _card: &CardDetails,
    ) -> Result<CardCharge, PaymentError> {
        self.charges_created.fetch_add(1, Ordering::SeqCst);
        Ok(CardCharge {
            charge_id: Uuid::new_v4(),
            amount,
            settled_at: Utc::now(),
        })
    }
}

#[async_trait]
impl WireService for StubBackend {
    async fn create_wire_instructions(
        &self,
        _user_id: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<WireInstructions, PaymentError> {
        Ok(WireInstructions {
            bank_name: "First Fund Bank".to_string(),
            account_name: "Fund LP".to_string(),
            account_number: "000123".to_string(),
            routing_number: "026000000".to_string(),
            swift_code: "FFBKUS33".to_string(),
            reference: reference.to_string(),
            amount,
        })
    }
}

#[async_trait]
impl BankLink for StubBackend {
    async fn initiate_transfer(
        &self,
        _user_id: &str,
        amount: Decimal,
    ) -> Result<BankTransfer, PaymentError> {
        Ok(BankTransfer {
            transfer_id: Uuid::new_v4(),
            authorization_url: "https://bank.example/authorize".to_string(),
            amount,
        })
    }
}

#[async_trait]
impl CryptoGateway for StubBackend {
    async fn create_invoice(
        &self,
        _user_id: &str,
        amount: Decimal,
        pay_currency: &str,
    ) -> Result<CryptoInvoice, PaymentError> {
        Ok(CryptoInvoice {
            payment_id: Uuid::new_v4(),
            address: "bc1qscenario".to_string(),
            pay_amount: amount,
            pay_currency: pay_currency.to_string(),
        })
    }

    async fn payment_status(
        &self,
        _payment_id: Uuid,
    ) -> Result<CryptoPaymentStatus, PaymentError> {
        Ok(*self.crypto_status.lock().unwrap())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn signed_packet() -> DocumentSubmission {
    DocumentSubmission {
        exhibit_a: ExhibitA {
            legal_name: "Jane Investor".into(),
            mailing_address: "1 Fund St".into(),
            tax_id: "12-3456789".into(),
        },
        exhibit_b: ExhibitB {
            accreditation_basis: vec!["net_worth".into()],
            confirmed: true,
        },
        exhibit_c: ExhibitC {
            source_of_funds: "employment income".into(),
            expected_contribution_range: "10k-50k".into(),
        },
        exhibit_d: ExhibitD {
            acknowledges_illiquidity: true,
            acknowledges_loss_risk: true,
            acknowledges_no_guarantee: true,
        },
        signature: "Jane Investor".into(),
    }
}

fn test_card() -> CardDetails {
    CardDetails {
        number: "4242424242424242".into(),
        exp_month: 12,
        exp_year: Utc::now().year() + 2,
        cvc: "123".into(),
        cardholder: "Jane Investor".into(),
    }
}

/// Give spawned background tasks a chance to run.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

/// Scenario 1: a brand-new user signs, verifies, and funds $10,000 by
/// card; the flow closes and requests a balance refresh.
#[tokio::test]
async fn new_user_funds_by_card() -> anyhow::Result<()> {
    timeout(TEST_TIMEOUT, async {
        let backend = StubBackend::new(OnboardingStatus::new_user());
        let (controller, active) =
            FlowController::open(backend.deps(), FlowConfig::default(), "user-1").await?;
        let mut events = controller.subscribe();
        assert_eq!(active.state, FlowState::DocumentSigning);

        let active = controller
            .complete(active.token, Completion::DocumentsSigned(signed_packet()))
            .await?;
        assert_eq!(active.state, FlowState::Congratulations);

        let active = controller
            .complete(active.token, Completion::CelebrationAcknowledged)
            .await?;
        assert_eq!(active.state, FlowState::KycVerification);
        assert!(controller.kyc_session().await.is_some());

        let active = controller
            .complete(active.token, Completion::KycFinished)
            .await?;
        assert_eq!(active.state, FlowState::FundingForm);

        let active = controller
            .complete(
                active.token,
                Completion::ContributionChosen(FundingRequest {
                    amount: dec!(10_000),
                    method: PaymentMethod::Card,
                }),
            )
            .await?;
        assert_eq!(active.state, FlowState::PaymentMethod(PaymentMethod::Card));

        let active = controller
            .complete(active.token, Completion::CardPaymentConfirmed(test_card()))
            .await?;
        assert_eq!(active.state, FlowState::Closed);

        settle().await;
        assert_eq!(backend.documents_saved.load(Ordering::SeqCst), 5);
        assert_eq!(backend.charges_created.load(Ordering::SeqCst), 1);
        assert_eq!(backend.overrides_recorded.load(Ordering::SeqCst), 0);
        // The background writes landed on the backend flags.
        let snapshot = *backend.snapshot.lock().unwrap();
        assert!(snapshot.documents_completed);
        assert_eq!(snapshot.kyc_status, KycStatus::Verified);

        let mut saw_refresh = false;
        let mut saw_settled_close = false;
        while let Ok(event) = events.try_recv() {
            match event {
                FlowEvent::BalanceRefreshRequested => saw_refresh = true,
                FlowEvent::Closed {
                    reason: CloseReason::PaymentSettled,
                } => saw_settled_close = true,
                _ => {}
            }
        }
        assert!(saw_refresh, "balance refresh should be requested");
        assert!(saw_settled_close, "flow should close as settled");
        Ok(())
    })
    .await?
}

/// Scenario 2: a returning verified user lands directly on the funding
/// form with no intermediate screens and no verification session.
#[tokio::test]
async fn verified_user_lands_on_funding_form() -> anyhow::Result<()> {
    timeout(TEST_TIMEOUT, async {
        let backend = StubBackend::new(OnboardingStatus {
            documents_completed: true,
            kyc_status: KycStatus::Verified,
        });
        let (_controller, active) =
            FlowController::open(backend.deps(), FlowConfig::default(), "user-2").await?;

        assert_eq!(active.state, FlowState::FundingForm);
        assert_eq!(backend.sessions_started.load(Ordering::SeqCst), 0);
        Ok(())
    })
    .await?
}

/// Scenario 3: a user who never acts on the verification screen is
/// auto-overridden into the funding form exactly once.
#[tokio::test(start_paused = true)]
async fn silent_user_is_overridden_exactly_once() -> anyhow::Result<()> {
    let backend = StubBackend::new(OnboardingStatus {
        documents_completed: true,
        kyc_status: KycStatus::Pending,
    });
    let config = FlowConfig::default();
    let (controller, _active) =
        FlowController::open(backend.deps(), config, "user-3").await?;
    let mut events = controller.subscribe();

    // Let the countdown task register its sleep before advancing.
    settle().await;

    // Just short of the window: nothing happens.
    tokio::time::advance(Duration::from_secs(119)).await;
    settle().await;
    assert_eq!(controller.active().await.state, FlowState::KycVerification);
    assert_eq!(backend.overrides_recorded.load(Ordering::SeqCst), 0);

    // The window elapses.
    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(controller.active().await.state, FlowState::FundingForm);
    assert_eq!(backend.overrides_recorded.load(Ordering::SeqCst), 1);

    let mut override_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, FlowEvent::KycOverrideApplied { .. }) {
            override_events += 1;
        }
    }
    assert_eq!(override_events, 1);

    // No second override without a fresh verification activation.
    tokio::time::advance(Duration::from_secs(1200)).await;
    settle().await;
    assert_eq!(backend.overrides_recorded.load(Ordering::SeqCst), 1);
    assert_eq!(backend.snapshot.lock().unwrap().kyc_status, KycStatus::Verified);
    Ok(())
}

/// A crypto contribution: invoice is prepared, the flow closes pending,
/// and the out-of-band watcher keeps reporting settlement progress.
#[tokio::test(start_paused = true)]
async fn crypto_contribution_reports_settlement_after_close() -> anyhow::Result<()> {
    let backend = StubBackend::new(OnboardingStatus {
        documents_completed: true,
        kyc_status: KycStatus::Verified,
    });
    let (controller, active) =
        FlowController::open(backend.deps(), FlowConfig::default(), "user-4").await?;
    let mut events = controller.subscribe();

    let active = controller
        .complete(
            active.token,
            Completion::ContributionChosen(FundingRequest {
                amount: dec!(5_000),
                method: PaymentMethod::Crypto,
            }),
        )
        .await?;
    assert_eq!(active.state, FlowState::PaymentMethod(PaymentMethod::Crypto));

    let assets = controller
        .prepare_payment(
            active.token,
            PaymentPrep::Crypto {
                pay_currency: "btc".to_string(),
            },
        )
        .await?;
    let payment_id = match assets {
        PaymentAssets::Crypto { invoice } => {
            assert_eq!(invoice.pay_currency, "btc");
            invoice.payment_id
        }
        other => panic!("expected a crypto invoice, got {other:?}"),
    };

    let active = controller
        .complete(active.token, Completion::TransferInitiated)
        .await?;
    assert_eq!(active.state, FlowState::Closed);

    // The watcher keeps polling after the flow closed; settle the invoice.
    settle().await;
    tokio::time::advance(Duration::from_secs(20)).await;
    settle().await;
    *backend.crypto_status.lock().unwrap() = CryptoPaymentStatus::Finished;
    tokio::time::advance(Duration::from_secs(20)).await;
    settle().await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let FlowEvent::CryptoPayment {
            payment_id: id,
            status,
        } = event
        {
            assert_eq!(id, payment_id);
            seen.push(status);
        }
    }
    assert_eq!(
        seen,
        vec![CryptoPaymentStatus::Waiting, CryptoPaymentStatus::Finished]
    );
    Ok(())
}

/// Mutating status mid-flow changes where back from the funding form
/// lands: the target is recomputed, not remembered.
#[tokio::test]
async fn back_target_tracks_live_status() -> anyhow::Result<()> {
    timeout(TEST_TIMEOUT, async {
        let backend = StubBackend::new(OnboardingStatus {
            documents_completed: true,
            kyc_status: KycStatus::Verified,
        });
        let (controller, active) =
            FlowController::open(backend.deps(), FlowConfig::default(), "user-5").await?;
        assert_eq!(active.state, FlowState::FundingForm);

        // Compliance revoked the documents flag mid-session.
        backend.snapshot.lock().unwrap().documents_completed = false;
        let active = controller.go_back(active.token).await?;
        assert_eq!(active.state, FlowState::EmptyState);
        Ok(())
    })
    .await?
}
