// SPDX-License-Identifier: GPL-2.0

//! Character devices.
//!
//! Also called "char devices", `chrdev`, `cdev`.
//!
//! C header: [`include/linux/cdev.h`](../../../../include/linux/cdev.h)
//!
//! Reference: <https://www.kernel.org/doc/html/latest/core-api/kernel-api.html#char-devices>
//!
//! Each resource a registration needs (device number region, cdevs, class,
//! device nodes) is held by its own guard that releases it when dropped. A
//! failing step therefore unwinds every earlier step, in reverse order,
//! without any explicit cleanup code.

use alloc::{boxed::Box, format, string::String, vec::Vec};
use core::{fmt, ops::Range};

use crate::{
    code::EINVAL,
    error::KernelResult,
    fs::{
        file_operations::{Opener, OperationsVtable},
        FileOperations,
    },
    module::ThisModule,
    sys::Kernel,
};

const MINORBITS: u32 = 20;
const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// A device number, equivalent to C's `dev_t`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevT(u32);

impl DevT {
    /// Equivalent to `MKDEV`.
    pub const fn new(major: u32, minor: u32) -> DevT {
        DevT((major << MINORBITS) | (minor & MINORMASK))
    }

    /// Equivalent to `MAJOR`.
    pub const fn major(self) -> u32 {
        self.0 >> MINORBITS
    }

    /// Equivalent to `MINOR`.
    pub const fn minor(self) -> u32 {
        self.0 & MINORMASK
    }

    fn offset(self, by: u32) -> DevT {
        DevT::new(self.major(), self.minor() + by)
    }
}

impl fmt::Debug for DevT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Starts a character device registration named `name` over the minors in
/// `minors`.
///
/// Fails with `EINVAL` if `minors` is empty. Any `u16` range fits in the
/// 20-bit minor space.
pub fn builder(name: &'static str, minors: Range<u16>, module: &ThisModule) -> KernelResult<Builder> {
    if minors.is_empty() {
        return Err(EINVAL);
    }
    Ok(Builder {
        name,
        minors,
        kernel: module.kernel().clone(),
        devices: Vec::new(),
        class: None,
    })
}

pub struct Builder {
    name: &'static str,
    minors: Range<u16>,
    kernel: Kernel,
    devices: Vec<Box<dyn Opener>>,
    class: Option<&'static str>,
}

impl Builder {
    /// Adds a device with file operations `T` at the next free minor.
    pub fn register_device<T: FileOperations>(mut self, data: T::OpenData) -> Builder {
        self.devices.push(Box::new(OperationsVtable::<T>::new(data)));
        self
    }

    /// Publishes a device node for every registered device under the device
    /// class `class`.
    ///
    /// With a single device the node is named after the registration, with
    /// several they get the minor index appended (`name0`, `name1`, ...).
    pub fn with_node(mut self, class: &'static str) -> Builder {
        self.class = Some(class);
        self
    }

    /// Performs the registration.
    ///
    /// Fails with `EINVAL` if more devices were registered than there are
    /// minors. Any failing step releases what earlier steps acquired.
    pub fn build(self) -> KernelResult<Registration> {
        let count = u32::from(self.minors.end - self.minors.start);
        if self.devices.len() > count as usize {
            return Err(EINVAL);
        }
        let kernel = self.kernel;
        let single = self.devices.len() == 1;

        let region = Region::alloc(&kernel, u32::from(self.minors.start), count, self.name)?;
        let mut cdevs = Vec::with_capacity(self.devices.len());
        for (minor, opener) in (0..).zip(self.devices) {
            cdevs.push(Cdev::add(&kernel, region.dev.offset(minor), opener)?);
        }
        let class = match self.class {
            Some(name) => Some(Class::create(&kernel, name)?),
            None => None,
        };
        let mut nodes = Vec::new();
        if let Some(class) = &class {
            for (index, cdev) in cdevs.iter().enumerate() {
                let node_name = if single {
                    String::from(self.name)
                } else {
                    format!("{}{}", self.name, index)
                };
                nodes.push(DeviceNode::create(&kernel, class, cdev.dev, node_name)?);
            }
        }

        log::info!(
            "registered {} ({:?}, {} device(s))",
            self.name,
            region.dev,
            cdevs.len()
        );
        Ok(Registration {
            name: self.name,
            nodes,
            class,
            cdevs,
            region,
        })
    }
}

/// A registered set of character devices.
///
/// Everything it registered is unregistered when it is dropped, in reverse
/// order of registration.
pub struct Registration {
    name: &'static str,
    nodes: Vec<DeviceNode>,
    class: Option<Class>,
    cdevs: Vec<Cdev>,
    // Must stay the last field: it is released after everything above.
    region: Region,
}

impl Registration {
    /// Returns the first device number of the region.
    pub fn dev(&self) -> DevT {
        self.region.dev
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        while let Some(node) = self.nodes.pop() {
            drop(node);
        }
        drop(self.class.take());
        while let Some(cdev) = self.cdevs.pop() {
            drop(cdev);
        }
        log::info!("unregistered {} ({:?})", self.name, self.region.dev);
    }
}

struct Region {
    kernel: Kernel,
    dev: DevT,
    count: u32,
}

impl Region {
    fn alloc(kernel: &Kernel, first_minor: u32, count: u32, name: &str) -> KernelResult<Region> {
        let dev = kernel.alloc_chrdev_region(first_minor, count, name)?;
        Ok(Region {
            kernel: kernel.clone(),
            dev,
            count,
        })
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        self.kernel.unregister_chrdev_region(self.dev, self.count);
    }
}

struct Cdev {
    kernel: Kernel,
    dev: DevT,
}

impl Cdev {
    fn add(kernel: &Kernel, dev: DevT, opener: Box<dyn Opener>) -> KernelResult<Cdev> {
        kernel.cdev_add(dev, opener)?;
        Ok(Cdev {
            kernel: kernel.clone(),
            dev,
        })
    }
}

impl Drop for Cdev {
    fn drop(&mut self) {
        self.kernel.cdev_del(self.dev);
    }
}

struct Class {
    kernel: Kernel,
    name: &'static str,
}

impl Class {
    fn create(kernel: &Kernel, name: &'static str) -> KernelResult<Class> {
        kernel.class_create(name)?;
        Ok(Class {
            kernel: kernel.clone(),
            name,
        })
    }
}

impl Drop for Class {
    fn drop(&mut self) {
        self.kernel.class_destroy(self.name);
    }
}

struct DeviceNode {
    kernel: Kernel,
    name: String,
}

impl DeviceNode {
    fn create(kernel: &Kernel, class: &Class, dev: DevT, name: String) -> KernelResult<DeviceNode> {
        kernel.device_create(class.name, dev, &name)?;
        Ok(DeviceNode {
            kernel: kernel.clone(),
            name,
        })
    }
}

impl Drop for DeviceNode {
    fn drop(&mut self) {
        self.kernel.device_destroy(&self.name);
    }
}
