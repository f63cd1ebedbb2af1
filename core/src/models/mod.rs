// core/src/models/mod.rs

//! Data structures for cart lines, catalog rows, stores, orders and users.

pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod store;
pub mod user;

pub use cart_item::{CartLineItem, NewCartLine, RemoteCartItem};
pub use order::{NewOrder, Order, OrderDetail, OrderStatus, PlacedOrder};
pub use order_item::{OrderItem, OrderLineInput};
pub use product::{Product, ProductListing, ProductPatch};
pub use store::{Store, StoreSummary};
pub use user::{UserIdentity, UserRole};
