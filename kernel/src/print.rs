// SPDX-License-Identifier: GPL-2.0

//! Printing facilities.
//!
//! C header: [`include/linux/printk.h`](../../../../include/linux/printk.h)
//!
//! Lines are written to the host console (stderr) prefixed with their log
//! level, the way `dmesg` shows them.

use core::{cmp, fmt};
use std::io::Write;

/// Log levels, same numbering as the `KERN_*` constants.
pub mod format_strings {
    pub const KERN_ERR: u8 = 3;
    pub const KERN_WARNING: u8 = 4;
    pub const KERN_INFO: u8 = 6;
    pub const KERN_DEBUG: u8 = 7;
}

// From kernel/printk/printk.c
const LOG_LINE_MAX: usize = 1024 - 32;

#[doc(hidden)]
pub fn printk(level: u8, s: &[u8]) {
    let mut console = std::io::stderr().lock();
    // Nothing sensible to do when the console itself fails.
    let _ = console.write_all(b"<");
    let _ = console.write_all(&[b'0' + level]);
    let _ = console.write_all(b">");
    let _ = console.write_all(s);
    if !s.ends_with(b"\n") {
        let _ = console.write_all(b"\n");
    }
}

#[doc(hidden)]
pub struct LogLineWriter {
    data: [u8; LOG_LINE_MAX],
    pos: usize,
}

#[allow(clippy::new_without_default)]
impl LogLineWriter {
    pub fn new() -> LogLineWriter {
        LogLineWriter {
            data: [0u8; LOG_LINE_MAX],
            pos: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.pos]
    }
}

impl fmt::Write for LogLineWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let copy_len = cmp::min(LOG_LINE_MAX - self.pos, s.len());
        self.data[self.pos..self.pos + copy_len].copy_from_slice(&s.as_bytes()[..copy_len]);
        self.pos += copy_len;
        Ok(())
    }
}

#[doc(hidden)]
pub fn call_printk(level: u8, args: fmt::Arguments<'_>) {
    let mut writer = LogLineWriter::new();
    // `LogLineWriter` truncates instead of failing.
    let _ = fmt::write(&mut writer, args);
    printk(level, writer.as_bytes());
}

#[doc(hidden)]
#[macro_export]
macro_rules! print_macro {
    ($level:path, $($arg:tt)+) => {
        $crate::print::call_printk($level, ::core::format_args!($($arg)+))
    };
}

/// Prints an error-level message (level 3).
///
/// Equivalent to the kernel's [`pr_err`] macro.
///
/// [`pr_err`]: https://www.kernel.org/doc/html/latest/core-api/printk-basics.html#c.pr_err
#[macro_export]
macro_rules! pr_err (
    ($($arg:tt)*) => (
        $crate::print_macro!($crate::print::format_strings::KERN_ERR, $($arg)*)
    )
);

/// Prints a warning-level message (level 4).
#[macro_export]
macro_rules! pr_warn (
    ($($arg:tt)*) => (
        $crate::print_macro!($crate::print::format_strings::KERN_WARNING, $($arg)*)
    )
);

/// Prints an info-level message (level 6).
#[macro_export]
macro_rules! pr_info (
    ($($arg:tt)*) => (
        $crate::print_macro!($crate::print::format_strings::KERN_INFO, $($arg)*)
    )
);

/// Prints a debug-level message (level 7), only in debug builds.
#[macro_export]
macro_rules! pr_debug (
    ($($arg:tt)*) => (
        if cfg!(debug_assertions) {
            $crate::print_macro!($crate::print::format_strings::KERN_DEBUG, $($arg)*)
        }
    )
);

/// [`println!`] functions the same as it does in `std`, except instead of
/// printing to `stdout`, it writes to the kernel console at the `KERN_INFO`
/// level.
///
/// [`println!`]: https://doc.rust-lang.org/stable/std/macro.println.html
#[macro_export]
macro_rules! println {
    () => ({
        $crate::print::printk($crate::print::format_strings::KERN_INFO, "\n".as_bytes());
    });
    ($($arg:tt)*) => ({
        $crate::print_macro!($crate::print::format_strings::KERN_INFO, $($arg)*)
    });
}
