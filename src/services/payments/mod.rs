//! Payment gateways — one contract per funding method.
//!
//! Each gateway mirrors the external processor the method rides on. New
//! methods implement their own contract here and register a transition in
//! the flow controller; the dispatch logic itself does not change.

pub mod bank;
pub mod card;
pub mod crypto;
pub mod wire;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use bank::{BankLink, BankTransfer, HttpBankLink};
pub use card::{CardCharge, CardGateway, HttpCardGateway};
pub use crypto::{CryptoGateway, CryptoInvoice, CryptoPaymentStatus, HttpCryptoGateway};
pub use wire::{HttpWireService, WireInstructions, WireService};

/// The bundle of gateways the controller dispatches to.
#[derive(Clone)]
pub struct PaymentServices {
    pub card: Arc<dyn CardGateway>,
    pub wire: Arc<dyn WireService>,
    pub bank: Arc<dyn BankLink>,
    pub crypto: Arc<dyn CryptoGateway>,
}

/// Screen assets fetched on entering a payment screen. Card collects its
/// details on-screen and needs nothing up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PaymentAssets {
    Card,
    Wire { instructions: WireInstructions },
    Bank { transfer: BankTransfer },
    Crypto { invoice: CryptoInvoice },
}
