//! Unix helpers: user database lookups, sparse files, timestamps and ownership.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::GeneratorError;

/// Numeric identity of a system user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIds {
    pub uid: u32,
    pub gid: u32,
}

const INITIAL_PWD_BUFFER: usize = 1024;

/// Looks a user up by name. Returns `Ok(None)` when no such user exists.
pub fn lookup_user(name: &str) -> io::Result<Option<UserIds>> {
    let c_name =
        CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut buf: Vec<libc::c_char> = vec![0; INITIAL_PWD_BUFFER];

    loop {
        // SAFETY: all pointers reference live, correctly sized buffers for
        // the duration of the call; `result` is only read after it returns.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe {
            libc::getpwnam_r(
                c_name.as_ptr(),
                &mut pwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };

        match rc {
            0 if result.is_null() => return Ok(None),
            0 => {
                return Ok(Some(UserIds {
                    uid: pwd.pw_uid,
                    gid: pwd.pw_gid,
                }))
            }
            libc::ERANGE => buf.resize(buf.len() * 2, 0),
            libc::ENOENT | libc::ESRCH => return Ok(None),
            code => return Err(io::Error::from_raw_os_error(code)),
        }
    }
}

/// Login name of the user running the process.
pub fn current_username() -> Option<String> {
    // SAFETY: getuid never fails.
    let uid = unsafe { libc::getuid() };
    let mut buf: Vec<libc::c_char> = vec![0; INITIAL_PWD_BUFFER];

    loop {
        // SAFETY: see `lookup_user`.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };

        match rc {
            0 if result.is_null() => return None,
            // SAFETY: on success pw_name points into `buf`, NUL terminated.
            0 => {
                let name = unsafe { CStr::from_ptr(pwd.pw_name) };
                return Some(name.to_string_lossy().into_owned());
            }
            libc::ERANGE => buf.resize(buf.len() * 2, 0),
            _ => return None,
        }
    }
}

/// Resolves every owner name up front so unknown users fail before any
/// filesystem change.
pub fn resolve_owners(owners: &[String]) -> Result<HashMap<String, UserIds>, GeneratorError> {
    let mut resolved = HashMap::with_capacity(owners.len());
    for owner in owners {
        if resolved.contains_key(owner) {
            continue;
        }
        let ids = lookup_user(owner)?.ok_or_else(|| GeneratorError::UnknownOwner(owner.clone()))?;
        resolved.insert(owner.clone(), ids);
    }
    Ok(resolved)
}

/// Creates a new file of `size` bytes by writing a single `0` byte at the
/// last offset; the filesystem keeps the rest as a hole.
pub fn create_sparse_file(path: &Path, size: u64) -> io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    if size > 0 {
        file.seek(SeekFrom::Start(size - 1))?;
        file.write_all(b"0")?;
    }
    Ok(())
}

/// Sets access and modification times (epoch seconds). With `follow` unset
/// a symlink's own times are changed.
pub fn set_times(path: &Path, atime: i64, mtime: i64, follow: bool) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let times = [
        libc::timespec {
            tv_sec: atime as libc::time_t,
            tv_nsec: 0,
        },
        libc::timespec {
            tv_sec: mtime as libc::time_t,
            tv_nsec: 0,
        },
    ];
    let flags = if follow { 0 } else { libc::AT_SYMLINK_NOFOLLOW };

    // SAFETY: `c_path` is NUL terminated and `times` holds two timespecs.
    let rc = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), flags) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Changes ownership; symlinks themselves are changed when `follow` is unset.
pub fn set_owner(path: &Path, ids: UserIds, follow: bool) -> io::Result<()> {
    if follow {
        std::os::unix::fs::chown(path, Some(ids.uid), Some(ids.gid))
    } else {
        std::os::unix::fs::lchown(path, Some(ids.uid), Some(ids.gid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    #[test]
    fn test_current_user_resolves() {
        let name = current_username().expect("current user should have a passwd entry");
        let ids = lookup_user(&name)
            .expect("lookup should succeed")
            .expect("user should exist");
        // SAFETY: getuid never fails.
        assert_eq!(ids.uid, unsafe { libc::getuid() });
    }

    #[test]
    fn test_unknown_user() {
        let result = lookup_user("no-such-user-tree-forge").expect("lookup should succeed");
        assert!(result.is_none());

        let err = resolve_owners(&["no-such-user-tree-forge".to_string()]).unwrap_err();
        assert!(matches!(err, GeneratorError::UnknownOwner(_)));
    }

    #[test]
    fn test_sparse_file_has_requested_size() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("sparse.bin");
        create_sparse_file(&path, 4096 * 16).expect("create");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096 * 16);
        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.last(), Some(&b'0'));

        let empty = temp_dir.path().join("empty.bin");
        create_sparse_file(&empty, 0).expect("create");
        assert_eq!(std::fs::metadata(&empty).unwrap().len(), 0);

        assert!(create_sparse_file(&path, 1).is_err());
    }

    #[test]
    fn test_set_times_on_file_and_symlink() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("file");
        std::fs::write(&path, b"x").unwrap();
        set_times(&path, 1_600_000_000, 1_500_000_000, true).expect("set times");
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.atime(), 1_600_000_000);
        assert_eq!(meta.mtime(), 1_500_000_000);

        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&path, &link).unwrap();
        set_times(&link, 1_400_000_000, 1_300_000_000, false).expect("set link times");
        let link_meta = std::fs::symlink_metadata(&link).unwrap();
        assert_eq!(link_meta.mtime(), 1_300_000_000);
        // target untouched
        assert_eq!(std::fs::metadata(&path).unwrap().mtime(), 1_500_000_000);
    }

    #[test]
    fn test_set_owner_to_self() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("file");
        std::fs::write(&path, b"x").unwrap();
        let name = current_username().expect("current user");
        let ids = lookup_user(&name).unwrap().unwrap();
        set_owner(&path, ids, true).expect("chown to self");
        assert_eq!(std::fs::metadata(&path).unwrap().uid(), ids.uid);
    }
}
