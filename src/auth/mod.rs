//! Authentication module — device-code OAuth + persisted token cache
//!
//! Provides:
//! - OAuth device-code and refresh-token flows (`manager` submodule)
//! - Per-identity persisted token cache (`cache` submodule)
//! - Device-code display collaborator interface (`display` submodule)

pub mod cache;
pub mod display;
pub mod manager;

pub use cache::{CachedToken, TokenCache};
pub use display::{DeviceCodeDisplay, TracingDisplay};
pub use manager::{AuthManager, StaticTokenProvider, TokenProvider};
