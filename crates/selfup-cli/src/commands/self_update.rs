use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use selfup_updater::{
    HttpTransport, InstallContext, InstallEvent, InstallStatus, StabilityPolicy, UpdaterConfig,
    self_update,
};
use tracing::{debug, info_span};

use crate::cli::SelfUpdateArgs;
use crate::commands::Command;

/// Release channel flags as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfUpdateOptions {
    pub stable: bool,
    pub preview: bool,
}

impl SelfUpdateOptions {
    /// `--preview` wins over `--stable`; neither means stable.
    #[must_use]
    pub fn policy(&self) -> StabilityPolicy {
        if self.preview {
            StabilityPolicy::Preview
        } else {
            StabilityPolicy::Stable
        }
    }
}

/// `selfup self-update`
pub struct SelfUpdateCommand {
    options: SelfUpdateOptions,
    config: UpdaterConfig,
}

impl SelfUpdateCommand {
    pub fn new(options: SelfUpdateOptions, config: UpdaterConfig) -> Self {
        Self { options, config }
    }

    pub fn from_args(args: &SelfUpdateArgs) -> Self {
        let options = SelfUpdateOptions {
            stable: args.stable,
            preview: args.preview,
        };
        let config = UpdaterConfig::new(args.repository.as_str(), env!("CARGO_PKG_VERSION"))
            .with_api_base_url(args.api_url.as_str());
        Self::new(options, config)
    }

    #[must_use]
    pub fn options(&self) -> SelfUpdateOptions {
        self.options
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }
}

impl Command for SelfUpdateCommand {
    fn name(&self) -> &'static str {
        "self-update"
    }

    fn about(&self) -> &'static str {
        "Replace this executable with the newest release"
    }

    fn execute(&self) -> Result<i32> {
        let policy = self.options.policy();
        let _span = info_span!(
            "self_update",
            %policy,
            repository = %self.config.repository
        )
        .entered();

        let context =
            InstallContext::current().context("failed to locate the running executable")?;
        debug!("Running from {}", context.executable_path().display());
        let transport = HttpTransport::new(&self.config)?;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let result = self_update(&transport, &self.config, &context, policy, |event| {
            report(&spinner, event);
        });
        spinner.finish_and_clear();

        match result? {
            InstallStatus::Updated { version } => {
                println!("{} was updated to {version}", self.config.app_name);
                // The old image is gone from disk; nothing else may run in this process.
                std::process::exit(0);
            }
            InstallStatus::NoUpdateNeeded { version } => {
                println!("{} {version} is already up to date", self.config.app_name);
                Ok(0)
            }
            InstallStatus::CorruptDownload { reason } => {
                eprintln!("warning: the downloaded file is corrupt ({reason}) and was removed");
                eprintln!(
                    "warning: please run `{} self-update` again",
                    self.config.app_name
                );
                Ok(1)
            }
        }
    }
}

/// Render installer progress for the user.
fn report(spinner: &ProgressBar, event: InstallEvent<'_>) {
    match event {
        InstallEvent::DownloadStarted { version, url } => {
            println!("Downloading {version}...");
            debug!("Downloading from {url}");
            spinner.set_message(format!("downloading {version}"));
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        InstallEvent::DownloadFinished { bytes } => {
            spinner.finish_and_clear();
            println!("Download finished ({bytes} bytes)");
        }
        InstallEvent::Swapped { path } => debug!("Installed at {}", path.display()),
        InstallEvent::Cleaned { path } => debug!("Removed {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults_to_stable() {
        assert_eq!(SelfUpdateOptions::default().policy(), StabilityPolicy::Stable);
        let stable = SelfUpdateOptions {
            stable: true,
            preview: false,
        };
        assert_eq!(stable.policy(), StabilityPolicy::Stable);
    }

    #[test]
    fn test_preview_wins() {
        let both = SelfUpdateOptions {
            stable: true,
            preview: true,
        };
        assert_eq!(both.policy(), StabilityPolicy::Preview);
    }
}
