// SPDX-License-Identifier: GPL-2.0

//! User space buffers.
//!
//! C header: [`include/linux/uaccess.h`](../../../../include/linux/uaccess.h)
//!
//! A [`UserSlice`] stands for the `char __user *buffer, size_t length` pair a
//! file operation receives. The memory behind it may be unmapped, in which
//! case every copy into it fails with [`EFAULT`] the way `copy_to_user` does.

use crate::{code::EFAULT, error::KernelResult as Result};

/// A pointer to an area in userspace memory, which can be either read-only or
/// read-write.
///
/// Only one reader or writer may exist for a given slice, which is enforced
/// by [`UserSlice::writer`] consuming the slice.
pub struct UserSlice<'a> {
    mem: Option<&'a mut [u8]>,
    length: usize,
}

impl<'a> UserSlice<'a> {
    /// Constructs a user slice backed by mapped, writable memory.
    pub fn new(buf: &'a mut [u8]) -> UserSlice<'a> {
        let length = buf.len();
        UserSlice {
            mem: Some(buf),
            length,
        }
    }

    /// Constructs a user slice of `length` bytes whose pages are not mapped.
    pub fn unmapped(length: usize) -> UserSlice<'a> {
        UserSlice { mem: None, length }
    }

    /// Returns the length in bytes the caller claimed for this buffer.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the buffer is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Constructs a [`UserSliceWriter`] that can incrementally write into the
    /// user slice.
    pub fn writer(self) -> UserSliceWriter<'a> {
        UserSliceWriter {
            mem: self.mem,
            pos: 0,
            length: self.length,
        }
    }
}

/// A writer for [`UserSlice`].
///
/// Used to incrementally write into the user slice.
pub struct UserSliceWriter<'a> {
    mem: Option<&'a mut [u8]>,
    pos: usize,
    length: usize,
}

impl UserSliceWriter<'_> {
    /// Returns the amount of space remaining in this buffer.
    ///
    /// Note that even writing less than this number of bytes may fail.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if no more data can be written to this buffer.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Writes raw data to this user pointer from a kernel buffer.
    ///
    /// Fails with [`EFAULT`] if the write happens on a bad address, or if the
    /// write goes out of bounds of this [`UserSliceWriter`]. Nothing is
    /// written on failure.
    pub fn write_slice(&mut self, data: &[u8]) -> Result {
        let len = data.len();
        if len > self.length {
            return Err(EFAULT);
        }
        if len == 0 {
            return Ok(());
        }
        let mem = self.mem.as_deref_mut().ok_or(EFAULT)?;
        mem[self.pos..self.pos + len].copy_from_slice(data);
        self.pos += len;
        self.length -= len;
        Ok(())
    }

    /// Returns the number of bytes written so far.
    pub fn written(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_advances() {
        let mut buf = [0u8; 8];
        let mut writer = UserSlice::new(&mut buf).writer();
        writer.write_slice(b"abc").unwrap();
        writer.write_slice(b"de").unwrap();
        assert_eq!(writer.len(), 3);
        assert_eq!(writer.written(), 5);
        assert_eq!(&buf[..5], b"abcde");
    }

    #[test]
    fn write_past_end_faults_without_copying() {
        let mut buf = [0u8; 2];
        let mut writer = UserSlice::new(&mut buf).writer();
        assert_eq!(writer.write_slice(b"abc"), Err(EFAULT));
        assert_eq!(writer.written(), 0);
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn unmapped_memory_faults() {
        let slice = UserSlice::unmapped(64);
        assert_eq!(slice.len(), 64);
        let mut writer = slice.writer();
        assert_eq!(writer.write_slice(b"x"), Err(EFAULT));
        assert_eq!(writer.len(), 64);
        // Empty copies never touch memory.
        assert!(writer.write_slice(b"").is_ok());
    }
}
