// src/lib.rs

//! Atelier: the cart and order core of a multi-store fashion marketplace.
//!
//! The crate covers:
//!  - A device-local cart store with per-store grouping and clearing.
//!  - Synchronization of persisted cart rows with catalog data, grouped by store,
//!    with optimistic mutations that restore a snapshot when a write fails.
//!  - One-store-at-a-time order submission with pickup codes and atomic stock decrements.
//!  - The order status state machine and the merchant actions that drive it.
//!
//! Multi-step operations run on a small async workflow engine ([`flow`]), and every
//! read and write goes through the [`gateway::Gateway`] trait.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod models;
pub mod orders;
pub mod service;
pub mod settings;

// --- Re-exports for the Public API ---

pub use crate::cart::{CartStore, GroupedCart, OptimisticCart, StoreCartGroup};
pub use crate::error::{MarketError, Result};
pub use crate::flow::{Flow, FlowContext, FlowError, FlowOutcome, FlowRegistry, StepControl};
pub use crate::gateway::{memory::MemoryGateway, Gateway, SharedGateway};
pub use crate::orders::{MerchantAction, OrderSubmission};
pub use crate::service::Marketplace;
pub use crate::settings::CheckoutSettings;
