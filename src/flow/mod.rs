//! The funding flow — state machine, controller, and event stream.
//!
//! The flow is a sequence of mutually exclusive screens driven by user
//! actions and external async outcomes (document persistence, identity
//! verification, payment settlement). The controller selects exactly one
//! screen at a time; the host renders it and forwards its callbacks back
//! in.

pub mod controller;
pub mod events;
pub mod state;

pub use controller::{
    ActiveScreen, Completion, FlowController, FlowDeps, PaymentPrep, ScreenToken,
};
pub use events::{CloseReason, FlowEvent};
pub use state::{FlowState, PaymentMethod};
