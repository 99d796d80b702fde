//! Paths involved in replacing the running executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpdateError};

/// Suffix appended to the executable stem for the download target.
const TEMP_SUFFIX: &str = "-temp";

/// Where the running executable lives and where its replacement is staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallContext {
    executable_path: PathBuf,
    executable_dir: PathBuf,
    executable_stem: OsString,
    temp_path: PathBuf,
}

impl InstallContext {
    /// Context for the executable of the current process.
    pub fn current() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let exe = exe.canonicalize().unwrap_or(exe);
        Self::for_executable(exe)
    }

    /// Context for an executable at `path`.
    ///
    /// The temp file is a sibling of the executable so that the final rename
    /// never crosses a filesystem boundary.
    pub fn for_executable(path: impl Into<PathBuf>) -> Result<Self> {
        let executable_path = path.into();
        let invalid = || {
            UpdateError::Io(format!(
                "{} is not a path to an executable file",
                executable_path.display()
            ))
        };

        let executable_dir = executable_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(invalid)?;
        let executable_stem = executable_path
            .file_stem()
            .map(ToOwned::to_owned)
            .ok_or_else(invalid)?;

        let mut temp_name = executable_stem.clone();
        temp_name.push(TEMP_SUFFIX);
        if let Some(extension) = executable_path.extension() {
            temp_name.push(".");
            temp_name.push(extension);
        }
        let temp_path = executable_dir.join(temp_name);

        Ok(Self {
            executable_path,
            executable_dir,
            executable_stem,
            temp_path,
        })
    }

    /// Path of the executable that gets replaced.
    #[must_use]
    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    /// Directory holding the executable.
    #[must_use]
    pub fn executable_dir(&self) -> &Path {
        &self.executable_dir
    }

    /// Executable file name without extension.
    #[must_use]
    pub fn executable_stem(&self) -> &std::ffi::OsStr {
        &self.executable_stem
    }

    /// Where the new version is downloaded before the swap.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Whether the executable is an installed artifact rather than a cargo
    /// build output.
    #[must_use]
    pub fn is_packaged(&self) -> bool {
        cargo_build_root(&self.executable_path).is_none()
    }
}

/// The crate root of the cargo `target` directory containing `path`, if any.
fn cargo_build_root(path: &Path) -> Option<&Path> {
    path.ancestors()
        .filter(|ancestor| ancestor.file_name().is_some_and(|name| name == "target"))
        .filter_map(Path::parent)
        .find(|root| root.join("Cargo.toml").is_file())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_temp_path_without_extension() {
        let ctx = InstallContext::for_executable("/usr/local/bin/selfup").unwrap();
        assert_eq!(ctx.executable_dir(), Path::new("/usr/local/bin"));
        assert_eq!(ctx.executable_stem(), "selfup");
        assert_eq!(ctx.temp_path(), Path::new("/usr/local/bin/selfup-temp"));
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        let ctx = InstallContext::for_executable("/opt/tools/selfup.exe").unwrap();
        assert_eq!(ctx.executable_stem(), "selfup");
        assert_eq!(ctx.temp_path(), Path::new("/opt/tools/selfup-temp.exe"));
    }

    #[test]
    fn test_temp_path_multiple_dots() {
        let ctx = InstallContext::for_executable("/opt/tools/selfup.v2.bin").unwrap();
        assert_eq!(ctx.temp_path(), Path::new("/opt/tools/selfup.v2-temp.bin"));
    }

    #[test]
    fn test_rejects_root() {
        assert!(InstallContext::for_executable("/").is_err());
    }

    #[test]
    fn test_installed_binary_is_packaged() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = InstallContext::for_executable(dir.path().join("bin").join("selfup")).unwrap();
        assert!(ctx.is_packaged());
    }

    #[test]
    fn test_cargo_build_output_is_not_packaged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"selfup\"\n").unwrap();
        let exe = dir.path().join("target").join("release").join("selfup");

        let ctx = InstallContext::for_executable(&exe).unwrap();
        assert!(!ctx.is_packaged());
    }

    #[test]
    fn test_target_dir_without_manifest_is_packaged() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("target").join("selfup");

        let ctx = InstallContext::for_executable(exe).unwrap();
        assert!(ctx.is_packaged());
    }
}
