//! Device-code display collaborator interface.
//!
//! The core never formats terminal output itself; whoever embeds it decides
//! how the user code is shown. The CLI ships a tracing-backed default.

/// Collaborator that surfaces device-code prompts to the user.
pub trait DeviceCodeDisplay: Send + Sync {
    /// Show the user code and where to enter it.
    fn display(&self, user_code: &str, verification_url: &str);

    /// Sign-in completed.
    fn show_success(&self);

    /// Sign-in failed with an OAuth error code.
    fn show_error(&self, code: &str, message: Option<&str>);

    /// A silent token refresh is in progress.
    fn show_token_refresh(&self);
}

/// Default display that logs through `tracing`.
pub struct TracingDisplay;

impl DeviceCodeDisplay for TracingDisplay {
    fn display(&self, user_code: &str, verification_url: &str) {
        tracing::info!(
            user_code,
            verification_url,
            "sign in: open the verification URL and enter the code"
        );
    }

    fn show_success(&self) {
        tracing::info!("authentication succeeded");
    }

    fn show_error(&self, code: &str, message: Option<&str>) {
        tracing::error!(code, message = message.unwrap_or(""), "authentication failed");
    }

    fn show_token_refresh(&self) {
        tracing::debug!("refreshing access token");
    }
}
