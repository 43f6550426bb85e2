//! External collaborator contracts and their HTTP implementations.

pub mod documents;
pub mod kyc;
pub mod payments;

pub use documents::{DocumentService, HttpDocumentService, SignedDocumentRecord};
pub use kyc::{HttpKycService, KycService, KycSession};
pub use payments::PaymentServices;
