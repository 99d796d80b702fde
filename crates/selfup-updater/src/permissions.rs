//! Filesystem permission helpers.

use std::io;
use std::path::Path;

/// Check whether the current process may write to `path`.
///
/// Works for both files and directories. A missing path is not writable.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

/// Check whether the current process may write to `path`.
///
/// Directories are checked by creating an anonymous temp file in them.
#[cfg(not(unix))]
pub fn is_writable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => tempfile::tempfile_in(path).is_ok(),
        Ok(meta) => !meta.permissions().readonly(),
        Err(_) => false,
    }
}

/// The process file-creation mask.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn current_umask() -> u32 {
    // SAFETY: umask cannot fail; the previous mask is restored immediately.
    let mask = unsafe {
        let mask = libc::umask(0o022);
        libc::umask(mask);
        mask
    };
    u32::from(mask)
}

/// Mode bits a freshly created file would get with mode `0o777`.
#[cfg(unix)]
pub fn default_mode() -> u32 {
    0o777 & !current_umask()
}

/// Reset `path` to `0o777` minus the umask.
///
/// Downloads are created with `0o666 & !umask`, which loses the executable
/// bits the release build had.
#[cfg(unix)]
pub fn relax_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(default_mode()))
}

/// No executable bit to restore outside Unix.
#[cfg(not(unix))]
pub fn relax_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
