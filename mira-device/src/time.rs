use nix::sys::time::TimeValLike;
use nix::time::ClockId;

/// Monotonic wall-clock nanoseconds. Both audio threads stamp their
/// callback arrivals with this clock.
pub fn now() -> i64 {
    let timespec = nix::time::clock_gettime(ClockId::CLOCK_MONOTONIC_RAW)
        .expect("clock_gettime(CLOCK_MONOTONIC_RAW) failed, are we on Linux?");

    timespec.num_nanoseconds()
}
