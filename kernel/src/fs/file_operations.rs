// SPDX-License-Identifier: GPL-2.0

//! File operations.
//!
//! Drivers describe the operations their character devices support by
//! implementing [`FileOperations`]. Optional handlers are `const` function
//! pointers that default to `None`, the way a C `struct file_operations`
//! leaves unsupported entries `NULL`.

use alloc::boxed::Box;

use bitflags::bitflags;

use crate::{
    buf::UserSliceWriter,
    chrdev::DevT,
    code::EINVAL,
    error::KernelResult,
};

bitflags! {
    /// Flags passed to `open(2)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for writing only.
        const O_WRONLY = 0o1;
        /// Open for reading and writing.
        const O_RDWR = 0o2;
        /// Do not block.
        const O_NONBLOCK = 0o4000;
    }
}

impl OpenFlags {
    /// Open for reading only.
    pub const O_RDONLY: OpenFlags = OpenFlags::empty();

    const O_ACCMODE: u32 = 0o3;

    /// Whether the access mode grants reads (`FMODE_READ`).
    pub fn readable(&self) -> bool {
        matches!(self.bits() & Self::O_ACCMODE, 0 | 2)
    }
}

/// An open file, as seen by a driver.
///
/// Equivalent to the parts of C's `struct file` a character device looks at.
#[derive(Debug)]
pub struct File {
    flags: OpenFlags,
    dev: DevT,
}

impl File {
    /// Describes a file opened with `flags` on device `dev`.
    pub fn new(flags: OpenFlags, dev: DevT) -> File {
        File { flags, dev }
    }

    /// Returns the flags the file was opened with.
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Returns the device number of the node that was opened.
    pub fn dev(&self) -> DevT {
        self.dev
    }
}

/// `read` handler: fills the user buffer and advances the file position.
///
/// Returns the number of bytes copied; 0 signals end of file.
pub type ReadFn<T> =
    Option<fn(&T, &File, &mut UserSliceWriter<'_>, &mut u64) -> KernelResult<usize>>;

/// Corresponds to the kernel's `struct file_operations`.
///
/// A value of the implementing type is created by [`FileOperations::open`]
/// for every successful `open(2)` and consumed by
/// [`FileOperations::release`] when the last handle to it goes away.
pub trait FileOperations: Sized + Send + Sync + 'static {
    /// Data shared by every open of the device, handed over at registration.
    type OpenData: Send + Sync + 'static;

    /// Creates the per-file state.
    fn open(data: &Self::OpenData, file: &File) -> KernelResult<Self>;

    /// Reads data from this file to user space.
    const READ: ReadFn<Self> = None;

    /// Cleans up after the last reference to the file goes away.
    fn release(self, _file: &File) {}
}

/// Type-erased registration of a [`FileOperations`] implementation, stored
/// in the cdev map.
pub(crate) trait Opener: Send + Sync {
    fn open(&self, file: &File) -> KernelResult<Box<dyn OpenedFile>>;
}

/// Type-erased per-open state.
pub(crate) trait OpenedFile: Send {
    fn read(
        &self,
        file: &File,
        buf: &mut UserSliceWriter<'_>,
        offset: &mut u64,
    ) -> KernelResult<usize>;

    fn release(self: Box<Self>, file: &File);
}

pub(crate) struct OperationsVtable<T: FileOperations> {
    data: T::OpenData,
}

impl<T: FileOperations> OperationsVtable<T> {
    pub(crate) fn new(data: T::OpenData) -> Self {
        OperationsVtable { data }
    }
}

impl<T: FileOperations> Opener for OperationsVtable<T> {
    fn open(&self, file: &File) -> KernelResult<Box<dyn OpenedFile>> {
        Ok(Box::new(FileState(T::open(&self.data, file)?)))
    }
}

struct FileState<T>(T);

impl<T: FileOperations> OpenedFile for FileState<T> {
    fn read(
        &self,
        file: &File,
        buf: &mut UserSliceWriter<'_>,
        offset: &mut u64,
    ) -> KernelResult<usize> {
        match T::READ {
            Some(read) => read(&self.0, file, buf, offset),
            // `vfs_read` with neither `read` nor `read_iter`.
            None => Err(EINVAL),
        }
    }

    fn release(self: Box<Self>, file: &File) {
        let FileState(inner) = *self;
        inner.release(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_modes() {
        assert!(OpenFlags::O_RDONLY.readable());
        assert!(OpenFlags::O_RDWR.readable());
        assert!((OpenFlags::O_RDONLY | OpenFlags::O_NONBLOCK).readable());
        assert!(!OpenFlags::O_WRONLY.readable());
    }
}
