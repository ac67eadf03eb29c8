//! Page locking for secret buffers so key material is not swapped to disk.
//!
//! Uses `mlock`/`munlock` on Unix and `VirtualLock`/`VirtualUnlock` on Windows when the
//! `memlock` feature is enabled. Otherwise both calls succeed without doing anything.
//! Locking is best effort; callers log a failure and keep going.
//!
//! The OS does not count locks per page: one `munlock` releases a page no matter how many
//! secrets share it. Locks are therefore tracked per page here, and a page is only handed
//! back to the OS when the last buffer on it unlocks.

#[cfg(feature = "memlock")]
use std::collections::HashMap;

#[cfg(feature = "memlock")]
use once_cell::sync::Lazy;
#[cfg(feature = "memlock")]
use parking_lot::Mutex;

#[cfg(all(windows, feature = "memlock"))]
use winapi::shared::minwindef::LPVOID;
#[cfg(all(windows, feature = "memlock"))]
use winapi::um::memoryapi::{VirtualLock, VirtualUnlock};

/// Page start address -> number of live locks on that page.
#[cfg(feature = "memlock")]
static LOCKED_PAGES: Lazy<Mutex<HashMap<usize, usize>>> = Lazy::new(|| Mutex::new(HashMap::new()));

#[cfg(feature = "memlock")]
static PAGE_SIZE: Lazy<usize> = Lazy::new(page_size);

#[cfg(all(unix, feature = "memlock"))]
fn page_size() -> usize {
    // safety: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

#[cfg(all(not(unix), feature = "memlock"))]
fn page_size() -> usize {
    4096
}

#[cfg(all(unix, feature = "memlock"))]
fn sys_lock(page: usize, len: usize) -> Result<(), std::io::Error> {
    // safety: the page belongs to a live allocation owned by the caller.
    let res = unsafe { libc::mlock(page as *const libc::c_void, len as libc::size_t) };
    if res != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(unix, feature = "memlock"))]
fn sys_unlock(page: usize, len: usize) -> Result<(), std::io::Error> {
    let res = unsafe { libc::munlock(page as *const libc::c_void, len as libc::size_t) };
    if res != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(windows, feature = "memlock"))]
fn sys_lock(page: usize, len: usize) -> Result<(), std::io::Error> {
    let res = unsafe { VirtualLock(page as LPVOID, len) };
    if res == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(windows, feature = "memlock"))]
fn sys_unlock(page: usize, len: usize) -> Result<(), std::io::Error> {
    let res = unsafe { VirtualUnlock(page as LPVOID, len) };
    if res == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(not(any(unix, windows)), feature = "memlock"))]
fn sys_lock(_page: usize, _len: usize) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(all(not(any(unix, windows)), feature = "memlock"))]
fn sys_unlock(_page: usize, _len: usize) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(feature = "memlock")]
fn pages(ptr: *const u8, len: usize) -> impl Iterator<Item = usize> {
    let size = *PAGE_SIZE;
    let start = ptr as usize / size * size;
    let end = (ptr as usize).saturating_add(len.max(1));
    (start..end).step_by(size)
}

/// Locks every page of `ptr..ptr+len`. On failure no page count is changed.
#[cfg(feature = "memlock")]
pub fn lock_memory(ptr: *const u8, len: usize) -> Result<(), std::io::Error> {
    let size = *PAGE_SIZE;
    let mut counts = LOCKED_PAGES.lock();
    let mut newly_locked = Vec::new();
    for page in pages(ptr, len) {
        if counts.get(&page).copied().unwrap_or(0) == 0 {
            if let Err(e) = sys_lock(page, size) {
                for locked in newly_locked {
                    let _ = sys_unlock(locked, size);
                }
                return Err(e);
            }
            newly_locked.push(page);
        }
    }
    for page in pages(ptr, len) {
        *counts.entry(page).or_insert(0) += 1;
    }
    Ok(())
}

/// Releases one lock on every page of `ptr..ptr+len`; pages still shared stay locked.
#[cfg(feature = "memlock")]
pub fn unlock_memory(ptr: *const u8, len: usize) -> Result<(), std::io::Error> {
    let size = *PAGE_SIZE;
    let mut counts = LOCKED_PAGES.lock();
    let mut result = Ok(());
    for page in pages(ptr, len) {
        let Some(count) = counts.get_mut(&page) else { continue };
        *count -= 1;
        if *count == 0 {
            counts.remove(&page);
            if let Err(e) = sys_unlock(page, size) {
                result = Err(e);
            }
        }
    }
    result
}

#[cfg(all(test, feature = "memlock"))]
fn page_lock_count(ptr: *const u8) -> usize {
    let size = *PAGE_SIZE;
    let page = ptr as usize / size * size;
    LOCKED_PAGES.lock().get(&page).copied().unwrap_or(0)
}

#[cfg(not(feature = "memlock"))]
pub fn lock_memory(_ptr: *const u8, _len: usize) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(not(feature = "memlock"))]
pub fn unlock_memory(_ptr: *const u8, _len: usize) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_unlock_roundtrip_is_best_effort() {
        let buf = Box::new([7u8; 32]);
        // RLIMIT_MEMLOCK may be zero in CI containers; only check that the calls return.
        let locked = lock_memory(buf.as_ptr(), buf.len());
        if locked.is_ok() {
            assert!(unlock_memory(buf.as_ptr(), buf.len()).is_ok());
        }
        assert_eq!(buf[0], 7);
    }

    #[cfg(feature = "memlock")]
    #[test]
    fn test_shared_page_stays_locked_until_last_unlock() {
        let buf = Box::new([0u8; 64]);
        let first = buf.as_ptr();
        let second = buf[32..].as_ptr();
        if lock_memory(first, 32).is_err() {
            return;
        }
        if lock_memory(second, 32).is_err() {
            let _ = unlock_memory(first, 32);
            return;
        }
        assert!(page_lock_count(second) >= 1);

        unlock_memory(first, 32).expect("unlock first");
        assert!(page_lock_count(second) >= 1, "second secret still holds its page");
        unlock_memory(second, 32).expect("unlock second");
    }
}
