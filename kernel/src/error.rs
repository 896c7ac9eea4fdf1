// SPDX-License-Identifier: GPL-2.0

//! Kernel errors.
//!
//! C header: [`include/uapi/asm-generic/errno-base.h`](../../../include/uapi/asm-generic/errno-base.h)

use core::{convert::Infallible, fmt, num::TryFromIntError};

use crate::pr_warn;

/// Largest errno value, mirrors `MAX_ERRNO` from `include/linux/err.h`.
pub const MAX_ERRNO: i32 = 4095;

pub type KernelResult<T = ()> = Result<T, Error>;

/// Generic integer kernel error.
///
/// The kernel defines a set of integer generic error codes based on C and
/// POSIX ones. These codes may have a more specific meaning in some contexts.
///
/// # Invariants
///
/// The value is a valid `errno` (i.e. `>= -MAX_ERRNO && < 0`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Error(core::ffi::c_int);

impl Error {
    /// Creates an [`Error`] from a kernel error code.
    ///
    /// It is a bug to pass an out-of-range `errno`. `EINVAL` would
    /// be returned in such a case.
    pub fn from_errno(errno: core::ffi::c_int) -> Error {
        if errno < -MAX_ERRNO || errno >= 0 {
            pr_warn!(
                "attempted to create `Error` with out of range `errno`: {}",
                errno
            );
            return linux_err::EINVAL;
        }
        // INVARIANT: The check above ensures the type invariant
        // will hold.
        Error(errno)
    }

    /// Returns the kernel error code.
    pub fn to_errno(self) -> core::ffi::c_int {
        self.0
    }

    /// Returns a string representing the error, if one exists.
    pub fn name(&self) -> Option<&'static str> {
        linux_err::errname(-self.0)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            // Print out number if no name can be found.
            None => f.debug_tuple("Error").field(&-self.0).finish(),
            Some(name) => f.debug_tuple(name).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            None => write!(f, "error {}", -self.0),
            Some(name) => write!(f, "{} ({})", name, -self.0),
        }
    }
}

/// Contains the C-compatible error codes.
#[rustfmt::skip]
#[allow(unused)]
pub mod linux_err {
    macro_rules! declare_err {
        ($($err:tt = $num:literal, $doc:expr;)+) => {
            $(
            #[doc = $doc]
            pub const $err: super::Error = super::Error(-$num);
            )+

            /// Maps a positive errno to its symbolic name.
            pub(crate) fn errname(errno: core::ffi::c_int) -> Option<&'static str> {
                match errno {
                    $($num => Some(stringify!($err)),)+
                    _ => None,
                }
            }
        };
    }

    declare_err! {
        EPERM = 1, "Operation not permitted.";
        ENOENT = 2, "No such file or directory.";
        ESRCH = 3, "No such process.";
        EINTR = 4, "Interrupted system call.";
        EIO = 5, "I/O error.";
        ENXIO = 6, "No such device or address.";
        E2BIG = 7, "Argument list too long.";
        EBADF = 9, "Bad file number.";
        EAGAIN = 11, "Try again.";
        ENOMEM = 12, "Out of memory.";
        EACCES = 13, "Permission denied.";
        EFAULT = 14, "Bad address.";
        EBUSY = 16, "Device or resource busy.";
        EEXIST = 17, "File exists.";
        ENODEV = 19, "No such device.";
        ENOTDIR = 20, "Not a directory.";
        EISDIR = 21, "Is a directory.";
        EINVAL = 22, "Invalid argument.";
        ENFILE = 23, "File table overflow.";
        EMFILE = 24, "Too many open files.";
        ENOTTY = 25, "Not a typewriter.";
        ENOSPC = 28, "No space left on device.";
        ESPIPE = 29, "Illegal seek.";
        EROFS = 30, "Read-only file system.";
    }

    /// Operation would block, same value as [`EAGAIN`].
    pub const EWOULDBLOCK: super::Error = EAGAIN;
}

impl From<TryFromIntError> for Error {
    fn from(_: TryFromIntError) -> Error {
        linux_err::EINVAL
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Error {
        linux_err::EINVAL
    }
}

impl From<Infallible> for Error {
    fn from(e: Infallible) -> Error {
        match e {}
    }
}

#[cfg(test)]
mod tests {
    use super::{linux_err::*, *};

    #[test]
    fn errno_values_match_linux() {
        assert_eq!(EBUSY.to_errno(), -16);
        assert_eq!(EFAULT.to_errno(), -14);
        assert_eq!(EWOULDBLOCK, EAGAIN);
    }

    #[test]
    fn out_of_range_errno_becomes_einval() {
        assert_eq!(Error::from_errno(0), EINVAL);
        assert_eq!(Error::from_errno(5), EINVAL);
        assert_eq!(Error::from_errno(-MAX_ERRNO - 1), EINVAL);
        assert_eq!(Error::from_errno(-16), EBUSY);
    }

    #[test]
    fn debug_prints_symbolic_name() {
        assert_eq!(format!("{:?}", EBUSY), "EBUSY");
        assert_eq!(format!("{:?}", Error::from_errno(-200)), "Error(200)");
        assert_eq!(EFAULT.to_string(), "EFAULT (14)");
    }

    #[test]
    fn int_conversion_failure_is_einval() {
        let err: Error = u8::try_from(300u32).unwrap_err().into();
        assert_eq!(err, EINVAL);
    }
}
