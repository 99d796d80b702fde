//! Download, validate and swap in a new executable.
//!
//! The sequence is
//!
//! ```text
//! preflight -> compare versions -> download to temp -> chmod -> validate -> rename
//! ```
//!
//! The live executable is only touched by the final swap. On Unix that is a
//! `rename`, which replaces the directory entry in one step because the temp
//! file is a sibling on the same filesystem. A process that already has the
//! old file open keeps reading the old inode. Windows refuses to overwrite
//! the image of a running process, so there the running executable is swapped
//! through `self_replace`.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::artifact::validate_artifact;
use crate::config::{StabilityPolicy, UpdaterConfig};
use crate::context::InstallContext;
use crate::error::{Result, UpdateError, WriteTarget};
use crate::permissions::{is_writable, relax_permissions};
use crate::release::ResolvedRelease;
use crate::resolver::ReleaseResolver;
use crate::transport::Transport;

/// Outcome of an install attempt that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    /// The executable was replaced. The caller must exit now.
    Updated {
        /// Version that was installed.
        version: String,
    },
    /// The running version is already the resolved one.
    NoUpdateNeeded {
        /// The running version.
        version: String,
    },
    /// The download was not a valid executable and has been deleted.
    CorruptDownload {
        /// Why validation rejected it.
        reason: String,
    },
}

impl InstallStatus {
    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Updated { .. } | Self::NoUpdateNeeded { .. } => 0,
            Self::CorruptDownload { .. } => 1,
        }
    }
}

/// Progress notifications emitted while installing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallEvent<'a> {
    /// The download of `version` from `url` begins.
    DownloadStarted {
        /// Version being downloaded.
        version: &'a str,
        /// Source URL.
        url: &'a str,
    },
    /// The download completed.
    DownloadFinished {
        /// Bytes written to the temp file.
        bytes: u64,
    },
    /// The new executable is in place.
    Swapped {
        /// Path that now holds the new version.
        path: &'a Path,
    },
    /// A corrupt download was removed.
    Cleaned {
        /// Temp file that was deleted.
        path: &'a Path,
    },
}

/// Proof that the preflight checks passed for a context.
#[derive(Debug)]
pub struct Preflight<'c> {
    context: &'c InstallContext,
}

impl Preflight<'_> {
    /// The checked context.
    #[must_use]
    pub fn context(&self) -> &InstallContext {
        self.context
    }
}

type Observer<'o> = Box<dyn Fn(InstallEvent<'_>) + 'o>;

/// Replaces the running executable with a downloaded release.
pub struct Installer<'o, T: Transport> {
    transport: T,
    current_version: String,
    observer: Option<Observer<'o>>,
}

impl<'o, T: Transport> Installer<'o, T> {
    /// Creates an installer for a process running `current_version`.
    pub fn new(transport: T, current_version: impl Into<String>) -> Self {
        Self {
            transport,
            current_version: current_version.into(),
            observer: None,
        }
    }

    /// Receive [`InstallEvent`]s while installing.
    #[must_use]
    pub fn with_observer(mut self, observer: impl Fn(InstallEvent<'_>) + 'o) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn emit(&self, event: InstallEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    /// Checks that an install could succeed, without any network access.
    pub fn preflight<'c>(&self, context: &'c InstallContext) -> Result<Preflight<'c>> {
        if !context.is_packaged() {
            return Err(UpdateError::NotPackaged {
                path: context.executable_path().to_path_buf(),
            });
        }

        let temp_dir = context
            .temp_path()
            .parent()
            .unwrap_or(context.executable_dir());
        if !is_writable(temp_dir) {
            return Err(UpdateError::PermissionDenied {
                path: temp_dir.to_path_buf(),
                target: WriteTarget::Directory,
            });
        }

        if !is_writable(context.executable_path()) {
            return Err(UpdateError::PermissionDenied {
                path: context.executable_path().to_path_buf(),
                target: WriteTarget::Executable,
            });
        }

        debug!(
            "Preflight passed for {}",
            context.executable_path().display()
        );
        Ok(Preflight { context })
    }

    /// Installs `release` over the executable checked by `preflight`.
    pub fn install(
        &self,
        release: &ResolvedRelease,
        preflight: &Preflight<'_>,
    ) -> Result<InstallStatus> {
        let context = preflight.context;

        if release.version == self.current_version {
            info!("Already running {}", self.current_version);
            return Ok(InstallStatus::NoUpdateNeeded {
                version: self.current_version.clone(),
            });
        }

        let temp_path = context.temp_path();
        info!(
            "Updating {} -> {} via {}",
            self.current_version,
            release.version,
            temp_path.display()
        );

        self.emit(InstallEvent::DownloadStarted {
            version: &release.version,
            url: &release.download_url,
        });
        let bytes = match self.transport.download(&release.download_url, temp_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                remove_quietly(temp_path);
                return Err(err);
            }
        };
        self.emit(InstallEvent::DownloadFinished { bytes });

        if let Err(err) = relax_permissions(temp_path) {
            warn!(
                "Could not update permissions of {}: {}",
                temp_path.display(),
                err
            );
        }

        match validate_artifact(temp_path) {
            Ok(artifact) => {
                debug!(
                    "Download is a valid {} image ({} bytes)",
                    artifact.format, artifact.size
                );
            }
            Err(err) if err.is_corrupt() => {
                warn!("Rejecting download of {}: {}", release.version, err);
                fs::remove_file(temp_path)?;
                self.emit(InstallEvent::Cleaned { path: temp_path });
                return Ok(InstallStatus::CorruptDownload {
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                remove_quietly(temp_path);
                return Err(UpdateError::Io(err.to_string()));
            }
        }

        if let Err(err) = swap_executable(temp_path, context.executable_path()) {
            remove_quietly(temp_path);
            return Err(err.into());
        }
        info!(
            "Replaced {} with {}",
            context.executable_path().display(),
            release.version
        );
        self.emit(InstallEvent::Swapped {
            path: context.executable_path(),
        });

        Ok(InstallStatus::Updated {
            version: release.version.clone(),
        })
    }
}

/// Run a complete self-update of the executable in `context`.
///
/// Preflight runs before any request is made, so a non-writable install
/// fails without touching the network.
pub fn self_update<T: Transport + ?Sized>(
    transport: &T,
    config: &UpdaterConfig,
    context: &InstallContext,
    policy: StabilityPolicy,
    observer: impl Fn(InstallEvent<'_>),
) -> Result<InstallStatus> {
    let installer =
        Installer::new(transport, config.current_version.as_str()).with_observer(observer);
    let preflight = installer.preflight(context)?;
    let release = ReleaseResolver::new(transport, config).resolve(policy)?;
    installer.install(&release, &preflight)
}

/// Move the validated download over the executable.
#[cfg(not(windows))]
fn swap_executable(temp_path: &Path, executable_path: &Path) -> io::Result<()> {
    fs::rename(temp_path, executable_path)
}

/// Move the validated download over the executable.
#[cfg(windows)]
fn swap_executable(temp_path: &Path, executable_path: &Path) -> io::Result<()> {
    if is_running_executable(executable_path) {
        debug!("Replacing the running image via self_replace");
        self_replace::self_replace(temp_path)?;
        remove_quietly(temp_path);
        return Ok(());
    }
    fs::rename(temp_path, executable_path)
}

/// Whether `path` is the image of the current process.
#[cfg(any(windows, test))]
fn is_running_executable(path: &Path) -> bool {
    let Ok(running) = std::env::current_exe().and_then(|exe| exe.canonicalize()) else {
        return false;
    };
    path.canonicalize().is_ok_and(|path| path == running)
}

/// Best-effort removal of a stale temp file.
fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("Could not remove {}: {}", path.display(), err),
    }
}
