// core/src/orders/mod.rs

//! Order submission, pickup codes and the order status state machine.

pub mod pickup;
pub mod status;
pub mod submission;

pub use status::MerchantAction;
pub use submission::{build_order_submission_flow, submit_order, OrderSubmission, OrderSubmissionCtx};
