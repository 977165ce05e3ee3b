//! `printf`-style debug output, bounded to
//! `PRINTF_BUFFER_SIZE` bytes, truncated silently past that bound, and
//! routed through `log::info!` rather than a raw file descriptor write,
//! since a hosted process already has a structured logger and this is a
//! debug convenience rather than a wire-format guarantee.

use std::fmt::Write as _;

use crate::config::PRINTF_BUFFER_SIZE;

/// Formats `args` the way [`format!`] would, truncates to
/// `PRINTF_BUFFER_SIZE` bytes (at a UTF-8 boundary), and logs the
/// result at `info` level. Prefer the [`os_printf!`] macro over calling
/// this directly.
pub fn os_printf_args(args: std::fmt::Arguments<'_>) {
    let mut buf = String::new();
    if buf.write_fmt(args).is_err() {
        return;
    }
    let truncated = if buf.len() > PRINTF_BUFFER_SIZE {
        let mut end = PRINTF_BUFFER_SIZE;
        while !buf.is_char_boundary(end) {
            end -= 1;
        }
        &buf[..end]
    } else {
        &buf[..]
    };
    log::info!("{truncated}");
}

/// `printf`-style variadic output.
#[macro_export]
macro_rules! os_printf {
    ($($arg:tt)*) => {
        $crate::io::os_printf_args(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_past_buffer_size() {
        let _ = env_logger::try_init();
        let long = "x".repeat(PRINTF_BUFFER_SIZE * 2);
        os_printf!("{long}");
    }
}
