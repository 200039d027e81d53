//! Scheduling setup for the audio threads.
//!
//! Every stream owns two threads: the worker that holds the cpal stream,
//! which only needs a name, and the callback thread, which additionally
//! wants realtime scheduling. Promotion runs once per stream thread, from
//! the first callback, guarded by the callback's own init flag; it can
//! recur when a stream restarts, so the failure report stays cheap.

use std::ffi::CString;
use std::io;

/// SCHED_FIFO priority for the stream callbacks.
const REALTIME_PRIORITY: libc::c_int = 99;

pub fn set_name(name: &str) {
    let Ok(name) = CString::new(name) else {
        return;
    };

    unsafe {
        libc::pthread_setname_np(libc::pthread_self(), name.as_ptr());
    }
}

/// Names the current thread and lifts it onto the realtime scheduler.
/// Failure leaves the thread at normal priority, which still plays audio
/// but tolerates less scheduling jitter.
pub fn promote(name: &str) {
    set_name(name);

    let param = libc::sched_param {
        sched_priority: REALTIME_PRIORITY,
    };

    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } < 0 {
        let err = io::Error::last_os_error();
        log::warn!("audio thread stays at normal priority: {err}");

        if err.kind() == io::ErrorKind::PermissionDenied {
            let hint = std::env::current_exe()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|_| "<binary>".into());

            log::warn!("grant the capability with: setcap cap_sys_nice=ep {hint}");
        }
    }
}
