// core/src/cart/mod.rs

//! The device-local cart store and its synchronization with the remote cart table.

pub mod store;
pub mod sync;

pub use store::CartStore;
pub use sync::{
  add_to_cart, build_cart_sync_flow, load_grouped_cart, CartSyncCtx, GroupedCart, MergedCartItem, OptimisticCart,
  StoreCartGroup,
};
