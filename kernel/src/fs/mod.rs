// SPDX-License-Identifier: GPL-2.0

//! File systems and files.
//!
//! C header: [`include/linux/fs.h`](../../../../include/linux/fs.h)

pub mod file_operations;

pub use file_operations::{File, FileOperations, OpenFlags, ReadFn};
