//! POSIX resource limits applied to the sandboxed child process.
//!
//! Constants pinned from the original runtime's `_sandbox_preexec`: CPU
//! seconds at `ceil(timeout) + 1` headroom, address space at
//! `memory_limit_mb`, 5 MB file size, 64 open files, 64 child processes,
//! zero core dumps. Each limit is applied best-effort — a platform that
//! rejects a particular `setrlimit` call is skipped rather than failing the
//! whole sandbox.

#[cfg(unix)]
pub fn apply(memory_limit_mb: u32, timeout_seconds: f64) {
    use crate::model::Bounds;

    let cpu_seconds = (timeout_seconds.ceil() as u64).max(1) + 1;
    set_limit(libc::RLIMIT_CPU, cpu_seconds, cpu_seconds);
    let address_space = u64::from(memory_limit_mb) * 1024 * 1024;
    set_limit(libc::RLIMIT_AS, address_space, address_space);
    set_limit(
        libc::RLIMIT_FSIZE,
        Bounds::FILE_SIZE_LIMIT_BYTES,
        Bounds::FILE_SIZE_LIMIT_BYTES,
    );
    set_limit(
        libc::RLIMIT_NOFILE,
        Bounds::OPEN_FILES_LIMIT,
        Bounds::OPEN_FILES_LIMIT,
    );
    set_limit(
        libc::RLIMIT_NPROC,
        Bounds::CHILD_PROCESS_LIMIT,
        Bounds::CHILD_PROCESS_LIMIT,
    );
    set_limit(libc::RLIMIT_CORE, 0, 0);
}

#[cfg(unix)]
fn set_limit(resource: libc::c_int, soft: u64, hard: u64) {
    let limit = libc::rlimit {
        rlim_cur: soft,
        rlim_max: hard,
    };
    // Best-effort: an unsupported resource kind on this platform is skipped,
    // never fatal to the sandbox run.
    unsafe {
        let _ = libc::setrlimit(resource, &raw const limit);
    }
}

#[cfg(not(unix))]
pub fn apply(_memory_limit_mb: u32, _timeout_seconds: f64) {}
