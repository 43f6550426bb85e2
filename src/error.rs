//! Error types for fundflow.

use uuid::Uuid;

use crate::flow::state::FlowState;

/// Top-level error type for the funding flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Status provider error: {0}")]
    Status(#[from] StatusError),

    #[error("Document service error: {0}")]
    Document(#[from] DocumentError),

    #[error("KYC service error: {0}")]
    Kyc(#[from] KycError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Controller dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A completion or back request carried a token from a screen the
    /// controller has already left. Benign: the request is dropped with no
    /// side effects.
    #[error("Stale screen token (epoch {submitted}, current {current})")]
    StaleScreen { submitted: u64, current: u64 },

    /// The completion payload does not match the active screen. This is a
    /// host wiring bug; the controller degrades to the Failure screen.
    #[error("Completion {completion} does not match active screen {state}")]
    UnexpectedCompletion { state: FlowState, completion: String },

    #[error("Flow is closed")]
    Closed,

    #[error("Retry is only available from the failure screen (current: {state})")]
    NotInFailure { state: FlowState },

    #[error("Payment screen assets have not been prepared")]
    PaymentNotPrepared,
}

/// Recoverable input/validation errors. No backend call is made; the
/// current screen stays active.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Signature is required")]
    MissingSignature,

    #[error("Exhibit {exhibit} is incomplete: {missing}")]
    IncompleteExhibit { exhibit: char, missing: String },

    #[error("Contribution amount must be positive")]
    NonPositiveAmount,

    #[error("Contribution amount {amount} is below the minimum {minimum}")]
    AmountBelowMinimum { amount: String, minimum: String },

    #[error("Invalid card number")]
    InvalidCardNumber,

    #[error("Card is expired")]
    ExpiredCard,

    #[error("Invalid card security code")]
    InvalidSecurityCode,

    #[error("Cardholder name is required")]
    MissingCardholder,
}

/// Status provider errors.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Status request failed: {0}")]
    RequestFailed(String),

    #[error("Status response was malformed: {0}")]
    InvalidResponse(String),

    #[error("Unknown user: {user_id}")]
    UnknownUser { user_id: String },
}

/// Document service errors.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to save document {doc_id}: {reason}")]
    SaveFailed { doc_id: String, reason: String },

    #[error("Document response was malformed: {0}")]
    InvalidResponse(String),
}

/// KYC service errors.
#[derive(Debug, thiserror::Error)]
pub enum KycError {
    #[error("Failed to start verification session: {0}")]
    SessionStartFailed(String),

    #[error("Failed to record verification override for session {session_id}: {reason}")]
    OverrideFailed { session_id: Uuid, reason: String },

    #[error("KYC response was malformed: {0}")]
    InvalidResponse(String),
}

/// Payment gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Card charge was declined: {reason}")]
    ChargeDeclined { reason: String },

    #[error("Payment request failed: {0}")]
    RequestFailed(String),

    #[error("Payment response was malformed: {0}")]
    InvalidResponse(String),

    #[error("Crypto invoice {payment_id} expired before payment")]
    InvoiceExpired { payment_id: Uuid },

    #[error("Unsupported payout currency: {currency}")]
    UnsupportedCurrency { currency: String },
}

/// Result type alias for the flow.
pub type Result<T> = std::result::Result<T, Error>;
