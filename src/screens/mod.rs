//! Screen form models — local form state and validation for the screens
//! that collect input. Rendering lives in the host; these models are what
//! a screen submits through its completion callback.

pub mod card;
pub mod documents;
pub mod funding;

pub use card::CardDetails;
pub use documents::DocumentSubmission;
pub use funding::FundingRequest;
