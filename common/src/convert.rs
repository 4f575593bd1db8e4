//! Mapping between the 0-100 dial and the auto-off countdown.

/// Dial values above this mean "stay on" when the always-on zone is enabled.
pub const ALWAYS_ON_THRESHOLD_PCT: u8 = 95;

pub const MAX_PERCENT: u8 = 100;

/// Countdown length for `percent` at `rate` seconds per 1%.
pub fn percent_to_duration_ms(percent: u8, rate: u32) -> u64 {
    let seconds = u64::from(percent) * u64::from(rate);
    seconds * 1_000
}

/// Dial value shown for a countdown with `remaining_ms` left.
///
/// A live countdown reads at least 1%: whole seconds are divided by `rate`
/// and biased up by one, so the dial never shows empty before the deadline.
/// Once nothing is left the dial jumps to its terminal value, 100 while the
/// output is held on by the always-on zone and 0 otherwise.
pub fn remaining_to_percent(
    remaining_ms: u64,
    rate: u32,
    output_on: bool,
    always_on_enabled: bool,
) -> u8 {
    if remaining_ms == 0 {
        return if output_on && always_on_enabled {
            MAX_PERCENT
        } else {
            0
        };
    }

    let remaining_secs = (remaining_ms / 1_000) as i64;
    let Some(whole) = remaining_secs.checked_div(i64::from(rate)) else {
        // A countdown cannot be armed with rate 0; report it as disabled.
        return 0;
    };

    (whole + 1).clamp(0, i64::from(MAX_PERCENT)) as u8
}
