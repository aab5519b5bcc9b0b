//! Pinning actor threads to CPU cores (Linux).
//!
//! Two spinning actors on one core take turns burning each other's time
//! slice; giving each its own core keeps the polling loops from stalling.
//!
//! ```rust,ignore
//! use handoff::affinity::pin_to_core;
//! pin_to_core(2).unwrap();
//! ```

use std::io;

/// Pin the calling thread to `core_id`.
#[cfg(target_os = "linux")]
pub fn pin_to_core(core_id: usize) -> io::Result<()> {
    use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_SETSIZE, CPU_ZERO};

    if core_id >= CPU_SETSIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core {core_id} outside cpu_set_t"),
        ));
    }

    let mut set: cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        CPU_ZERO(&mut set);
        CPU_SET(core_id, &mut set);

        if sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &set) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_core(_core_id: usize) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "Linux only"))
}

/// Core the calling thread is running on right now, if the OS says.
#[cfg(target_os = "linux")]
pub fn current_core() -> Option<usize> {
    let cpu = unsafe { libc::sched_getcpu() };
    usize::try_from(cpu).ok()
}

#[cfg(not(target_os = "linux"))]
pub fn current_core() -> Option<usize> {
    None
}

/// Number of cores this process may run on.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
