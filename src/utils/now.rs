use chrono::Utc;

/// Current wall-clock time in microseconds since the UNIX epoch.
///
/// Pending requests are stamped with it so a supervising layer can spot the
/// ones that have waited too long. A clock set before the epoch yields `0`.
///
/// ```rust
/// use bookmux::utils::now;
/// assert!(now() > 0);
/// ```
pub fn now() -> u64 {
    u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0)
}
