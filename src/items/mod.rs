//! Item Service Module
//!
//! The synchronous half of the pipeline: item records are validated and written straight to
//! the `KeyValueStore` inside the request, and read back by key.
//!
//! ## Rules
//! - **Validation**: `title` must be non-empty after trimming; `itemId` must be non-empty and bounded.
//! - **Collisions**: creating an item whose `itemId` already exists is rejected, never overwritten.
//!   The check and the write are one `PutMode::CreateOnly` store call.

pub mod service;
pub mod types;

pub use service::ItemService;
pub use types::{Item, ItemError};
