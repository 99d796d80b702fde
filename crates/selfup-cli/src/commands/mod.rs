//! Subcommand implementations.

mod self_update;
mod version;

use anyhow::Result;
use selfup_updater::UpdateError;

pub use self_update::{SelfUpdateCommand, SelfUpdateOptions};
pub use version::VersionCommand;

/// A runnable subcommand.
pub trait Command {
    /// Name the command is invoked by.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn about(&self) -> &'static str;

    /// Run the command and return the process exit code.
    fn execute(&self) -> Result<i32>;
}

/// Short follow-up lines for a failed command.
///
/// Updater errors get their user-facing summary, plus a retry suggestion when
/// the failure may be transient. Other errors get none.
#[must_use]
pub fn error_hints(error: &anyhow::Error) -> Vec<&'static str> {
    let Some(update_error) = error.downcast_ref::<UpdateError>() else {
        return Vec::new();
    };
    let mut hints = vec![update_error.user_message()];
    if update_error.is_retryable() {
        hints.push("This may be temporary. Running the command again can help.");
    }
    hints
}
