// SPDX-License-Identifier: GPL-2.0

//! The `kernel` crate.
//!
//! Safe abstractions over the kernel services a character device driver
//! needs: device registration, file operations, user buffers, randomness,
//! module lifetime and printing. The device-management subsystem itself is
//! modelled in memory by [`sys`], so drivers built on this crate run and are
//! tested on an ordinary host.

extern crate alloc;

pub mod buf;
pub mod chrdev;
pub mod error;
pub mod fs;
pub mod logger;
pub mod module;
pub mod print;
pub mod random;
pub mod sys;

pub use error::linux_err as code;
pub use module::{LoadedModule, Module, ThisModule};

/// The crate prelude.
pub mod prelude {
    pub use crate::{
        code::*,
        error::{Error, KernelResult as Result},
        module, pr_debug, pr_err, pr_info, pr_warn, println, Module, ThisModule,
    };
}
