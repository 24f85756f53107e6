//! Smartsheet client, wire model, and the SheetStore seam

pub mod client;
pub mod models;
pub mod traits;

pub use client::SmartsheetClient;
pub use models::*;
pub use traits::SheetStore;

#[cfg(test)]
pub(crate) mod mock;
