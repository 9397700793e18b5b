//! Path expansion for user-supplied relative paths.
//!
//! Handles the forms a user types at a prompt: `.`, `./x`, `~`, `~/x`,
//! `~user` and `~user/x`. No commands are run; other user's home
//! directories come from the password database.

use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Expand `input` against the current working directory.
///
/// If the working directory can't be read, `.` forms are returned as given.
pub fn expand_path(input: &str) -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => expand_path_in(input, &cwd),
        Err(_) => PathBuf::from(trim_trailing_separators(input)),
    }
}

/// Expand `input` relative to `cwd`.
///
/// Trailing separators are dropped (a lone `/` is kept). Tilde forms whose
/// home directory can't be determined are returned unchanged.
pub fn expand_path_in(input: &str, cwd: &Path) -> PathBuf {
    let path = trim_trailing_separators(input);

    if path == "." {
        return cwd.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("./") {
        return cwd.join(rest.trim_start_matches('/'));
    }

    if let Some(tilde) = path.strip_prefix('~') {
        let (user, rest) = match tilde.split_once('/') {
            Some((user, rest)) => (user, Some(rest)),
            None => (tilde, None),
        };
        let home = if user.is_empty() {
            current_home()
        } else {
            home_of(user)
        };
        return match (home, rest) {
            (Some(home), Some(rest)) if !rest.is_empty() => home.join(rest),
            (Some(home), _) => home,
            (None, _) => {
                trace!(input, "no home directory for tilde path");
                PathBuf::from(path)
            }
        };
    }

    PathBuf::from(path)
}

fn trim_trailing_separators(input: &str) -> &str {
    let trimmed = input.trim_end_matches('/');
    if trimmed.is_empty() && input.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Home directory of the invoking user.
fn current_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

/// Home directory of `user` from the password database.
#[cfg(unix)]
pub fn home_of(user: &str) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStrExt;

    let name = CString::new(user).ok()?;
    let dir = passwd_field(
        PASSWD_BUFFER_LEN,
        |entry, buffer, len, result| unsafe {
            libc::getpwnam_r(name.as_ptr(), entry, buffer, len, result)
        },
        |entry| entry.pw_dir,
    )?;
    let dir = std::ffi::OsStr::from_bytes(&dir);
    (!dir.is_empty()).then(|| PathBuf::from(dir))
}

#[cfg(not(unix))]
pub fn home_of(_user: &str) -> Option<PathBuf> {
    None
}

/// Login name of the invoking user, if the password database knows it.
#[cfg(unix)]
pub fn current_user() -> Option<String> {
    let uid = unsafe { libc::getuid() };
    let name = passwd_field(
        PASSWD_BUFFER_LEN,
        |entry, buffer, len, result| unsafe { libc::getpwuid_r(uid, entry, buffer, len, result) },
        |entry| entry.pw_name,
    )?;
    String::from_utf8(name).ok().filter(|name| !name.is_empty())
}

#[cfg(not(unix))]
pub fn current_user() -> Option<String> {
    None
}

#[cfg(unix)]
const PASSWD_BUFFER_LEN: usize = 4096;

#[cfg(unix)]
const PASSWD_BUFFER_MAX: usize = 1 << 20;

/// Run a reentrant `getpw*_r` lookup, growing the string buffer on ERANGE,
/// and copy out one string field of the entry.
#[cfg(unix)]
fn passwd_field<L, F>(initial_len: usize, lookup: L, field: F) -> Option<Vec<u8>>
where
    L: Fn(*mut libc::passwd, *mut libc::c_char, usize, *mut *mut libc::passwd) -> libc::c_int,
    F: Fn(&libc::passwd) -> *mut libc::c_char,
{
    let mut buffer = vec![0 as libc::c_char; initial_len.max(1)];

    loop {
        let mut entry = std::mem::MaybeUninit::<libc::passwd>::uninit();
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = lookup(entry.as_mut_ptr(), buffer.as_mut_ptr(), buffer.len(), &mut result as *mut _);

        if rc == libc::ERANGE && buffer.len() < PASSWD_BUFFER_MAX {
            let grown = (buffer.len() * 2).min(PASSWD_BUFFER_MAX);
            buffer.resize(grown, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }

        // result points into `entry`, whose strings live in `buffer`
        let value = field(unsafe { &*result });
        if value.is_null() {
            return None;
        }
        return Some(unsafe { CStr::from_ptr(value) }.to_bytes().to_vec());
    }
}
