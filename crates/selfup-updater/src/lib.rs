//! In-place self-update for command-line executables.
//!
//! This crate replaces the running executable with a newer build published
//! as a GitHub release asset.
//!
//! # Overview
//!
//! An update runs in three steps:
//!
//! - `Installer::preflight()` - refuses development builds and non-writable
//!   install locations before any network access
//! - `ReleaseResolver::resolve()` - picks the first release with an asset
//!   that the [`StabilityPolicy`] accepts
//! - `Installer::install()` - downloads next to the executable, validates the
//!   file as a native executable and swaps it in for the old one
//!
//! [`self_update()`] chains the three.
//!
//! # Example
//!
//! ```no_run
//! use selfup_updater::{
//!     HttpTransport, InstallContext, InstallStatus, StabilityPolicy, UpdaterConfig, self_update,
//! };
//!
//! fn update() -> selfup_updater::Result<()> {
//!     let config = UpdaterConfig::new("selfup-rs/selfup", selfup_updater::VERSION);
//!     let transport = HttpTransport::new(&config)?;
//!     let context = InstallContext::current()?;
//!
//!     match self_update(&transport, &config, &context, StabilityPolicy::Stable, |_| {})? {
//!         InstallStatus::Updated { version } => {
//!             println!("Updated to {version}");
//!             std::process::exit(0);
//!         }
//!         InstallStatus::NoUpdateNeeded { .. } => println!("Already up to date"),
//!         InstallStatus::CorruptDownload { reason } => eprintln!("Download rejected: {reason}"),
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod installer;
pub mod permissions;
pub mod release;
pub mod resolver;
pub mod stability;
pub mod transport;

pub use artifact::{ArtifactError, ArtifactFormat, ValidArtifact, validate_artifact};
pub use config::{StabilityPolicy, UpdaterConfig};
pub use context::InstallContext;
pub use error::{Result, UpdateError, WriteTarget};
pub use installer::{InstallEvent, InstallStatus, Installer, Preflight, self_update};
pub use release::{Asset, Release, ResolvedRelease};
pub use resolver::{ReleaseResolver, parse_releases};
pub use stability::{Stability, classify};
pub use transport::{HttpTransport, Transport};

/// Application name, used in the `User-Agent` header by default.
pub const APP_NAME: &str = "selfup";

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Repository that publishes `selfup` releases.
pub const DEFAULT_REPOSITORY: &str = "selfup-rs/selfup";
