// SPDX-License-Identifier: GPL-2.0

//! In-memory model of the kernel's device-management subsystem.
//!
//! A [`Kernel`] owns the tables a character device driver touches: the
//! char-device region map, the cdev map, the device classes and the nodes
//! published under `/dev`. Drivers reach it through [`crate::chrdev`] and
//! processes through [`Kernel::open`].
//!
//! Every registration step can be made to fail once with
//! [`Kernel::inject_fault`], which is how error unwinding is exercised.

use alloc::{
    boxed::Box,
    collections::{BTreeMap, BTreeSet},
    string::{String, ToString},
    sync::Arc,
};
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::{
    buf::UserSlice,
    chrdev::DevT,
    code::{EBADF, EBUSY, EEXIST, EINVAL, ENODEV, ENOENT, ENOMEM, ENXIO},
    error::KernelResult,
    fs::{
        file_operations::{Opener, OpenedFile},
        File, OpenFlags,
    },
};

/// Top of the dynamic major range, see `fs/char_dev.c`.
const CHRDEV_MAJOR_DYN_START: u32 = 254;
const CHRDEV_MAJOR_DYN_END: u32 = 234;
const CHRDEV_MAJOR_DYN_EXT_START: u32 = 511;
const CHRDEV_MAJOR_DYN_EXT_END: u32 = 384;

/// A registration step that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    /// `alloc_chrdev_region`.
    AllocRegion,
    /// `cdev_add`.
    AddCdev,
    /// `class_create`.
    CreateClass,
    /// `device_create`.
    CreateDevice,
}

impl FailPoint {
    /// All steps, in the order a driver performs them.
    pub const ALL: [FailPoint; 4] = [
        FailPoint::AllocRegion,
        FailPoint::AddCdev,
        FailPoint::CreateClass,
        FailPoint::CreateDevice,
    ];
}

/// Counts of live registrations, used to check for leaks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Resources {
    pub regions: usize,
    pub cdevs: usize,
    pub classes: usize,
    pub nodes: usize,
}

struct RegionEntry {
    name: String,
    count: u32,
}

pub(crate) struct CdevEntry {
    opener: Box<dyn Opener>,
    live: AtomicBool,
}

struct NodeEntry {
    dev: DevT,
    class: String,
}

#[derive(Default)]
struct Inner {
    regions: Mutex<BTreeMap<u32, RegionEntry>>,
    cdevs: Mutex<BTreeMap<DevT, Arc<CdevEntry>>>,
    classes: Mutex<BTreeSet<String>>,
    nodes: Mutex<BTreeMap<String, NodeEntry>>,
    faults: Mutex<BTreeSet<FailPoint>>,
}

/// Handle to one kernel instance. Clones refer to the same kernel.
#[derive(Clone, Default)]
pub struct Kernel {
    inner: Arc<Inner>,
}

impl Kernel {
    pub fn new() -> Kernel {
        Kernel::default()
    }

    /// Makes the next attempt of `point` fail with `ENOMEM`.
    pub fn inject_fault(&self, point: FailPoint) {
        self.inner.faults.lock().insert(point);
    }

    fn take_fault(&self, point: FailPoint) -> KernelResult {
        if self.inner.faults.lock().remove(&point) {
            log::warn!("injected failure at {:?}", point);
            return Err(ENOMEM);
        }
        Ok(())
    }

    /// Returns how many regions, cdevs, classes and nodes are registered.
    pub fn resources(&self) -> Resources {
        Resources {
            regions: self.inner.regions.lock().len(),
            cdevs: self.inner.cdevs.lock().len(),
            classes: self.inner.classes.lock().len(),
            nodes: self.inner.nodes.lock().len(),
        }
    }

    /// Returns the device number behind a `/dev` path.
    pub fn lookup(&self, path: &str) -> Option<DevT> {
        let name = path.strip_prefix("/dev/")?;
        self.inner.nodes.lock().get(name).map(|node| node.dev)
    }

    /// Returns the name a region was allocated under, like `/proc/devices`.
    pub fn region_name(&self, major: u32) -> Option<String> {
        self.inner
            .regions
            .lock()
            .get(&major)
            .map(|region| region.name.clone())
    }

    /// Opens a device node, like `open(2)`.
    ///
    /// Fails with `ENOENT` if no such node exists and with `ENXIO` if the
    /// node's device number has no character device behind it. Errors from
    /// the driver's `open` are returned as is.
    pub fn open(&self, path: &str, flags: OpenFlags) -> KernelResult<OpenFile> {
        let dev = self.lookup(path).ok_or(ENOENT)?;
        let cdev = self.inner.cdevs.lock().get(&dev).cloned().ok_or(ENXIO)?;
        let file = File::new(flags, dev);
        // The driver runs without any kernel table locked.
        let state = cdev.opener.open(&file)?;
        Ok(OpenFile {
            file,
            pos: 0,
            cdev,
            state: Some(state),
        })
    }

    pub(crate) fn alloc_chrdev_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> KernelResult<DevT> {
        self.take_fault(FailPoint::AllocRegion)?;
        let mut regions = self.inner.regions.lock();
        let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .chain((CHRDEV_MAJOR_DYN_EXT_END..=CHRDEV_MAJOR_DYN_EXT_START).rev())
            .find(|major| !regions.contains_key(major))
            .ok_or_else(|| {
                log::error!("no free dynamic major for {}", name);
                EBUSY
            })?;
        regions.insert(
            major,
            RegionEntry {
                name: name.to_string(),
                count,
            },
        );
        log::debug!("allocated major {} ({} minors) for {}", major, count, name);
        Ok(DevT::new(major, first_minor))
    }

    pub(crate) fn unregister_chrdev_region(&self, dev: DevT, count: u32) {
        let mut regions = self.inner.regions.lock();
        match regions.get(&dev.major()) {
            Some(region) if region.count == count => {
                regions.remove(&dev.major());
            }
            _ => log::warn!("unregistering unknown region {:?}", dev),
        }
    }

    pub(crate) fn cdev_add(&self, dev: DevT, opener: Box<dyn Opener>) -> KernelResult {
        self.take_fault(FailPoint::AddCdev)?;
        if !self.inner.regions.lock().contains_key(&dev.major()) {
            return Err(EINVAL);
        }
        let mut cdevs = self.inner.cdevs.lock();
        if cdevs.contains_key(&dev) {
            return Err(EBUSY);
        }
        cdevs.insert(
            dev,
            Arc::new(CdevEntry {
                opener,
                live: AtomicBool::new(true),
            }),
        );
        Ok(())
    }

    pub(crate) fn cdev_del(&self, dev: DevT) {
        if let Some(cdev) = self.inner.cdevs.lock().remove(&dev) {
            // Files still open on it keep the entry alive but can't use it.
            cdev.live.store(false, Ordering::Release);
        }
    }

    pub(crate) fn class_create(&self, name: &str) -> KernelResult {
        self.take_fault(FailPoint::CreateClass)?;
        if !self.inner.classes.lock().insert(name.to_string()) {
            return Err(EEXIST);
        }
        Ok(())
    }

    pub(crate) fn class_destroy(&self, name: &str) {
        self.inner.classes.lock().remove(name);
        self.inner.nodes.lock().retain(|_, node| node.class != name);
    }

    pub(crate) fn device_create(&self, class: &str, dev: DevT, name: &str) -> KernelResult {
        self.take_fault(FailPoint::CreateDevice)?;
        if !self.inner.classes.lock().contains(class) {
            return Err(EINVAL);
        }
        let mut nodes = self.inner.nodes.lock();
        if nodes.contains_key(name) {
            return Err(EEXIST);
        }
        nodes.insert(
            name.to_string(),
            NodeEntry {
                dev,
                class: class.to_string(),
            },
        );
        log::debug!("created /dev/{} ({:?})", name, dev);
        Ok(())
    }

    pub(crate) fn device_destroy(&self, name: &str) {
        self.inner.nodes.lock().remove(name);
    }
}

/// A file opened through [`Kernel::open`].
///
/// Dropping it closes the file and runs the driver's release handler.
pub struct OpenFile {
    file: File,
    pos: u64,
    cdev: Arc<CdevEntry>,
    state: Option<Box<dyn OpenedFile>>,
}

impl OpenFile {
    /// Reads into `buf`, like `read(2)`.
    pub fn read(&mut self, buf: &mut [u8]) -> KernelResult<usize> {
        self.read_user(UserSlice::new(buf))
    }

    /// Reads into an arbitrary user buffer, which may be unmapped.
    pub fn read_user(&mut self, buf: UserSlice<'_>) -> KernelResult<usize> {
        if !self.file.flags().readable() {
            return Err(EBADF);
        }
        if !self.cdev.live.load(Ordering::Acquire) {
            return Err(ENODEV);
        }
        let state = self.state.as_ref().ok_or(EBADF)?;
        let mut writer = buf.writer();
        state.read(&self.file, &mut writer, &mut self.pos)
    }

    /// Current file position.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Closes the file, like `close(2)`.
    pub fn close(self) {}
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.release(&self.file);
        }
    }
}
