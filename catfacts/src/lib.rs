//! A character device responding with cat facts.
//!
//! Every open of `/dev/catfacts` yields one random fact on its first read and
//! end of file after that. Only one process may have the device open at a
//! time, others get `EBUSY` until it is closed.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod device;
pub mod facts;

use alloc::sync::Arc;

use kernel::{chrdev, chrdev::DevT, prelude::*};

pub use device::{FactDevice, FactFile};
use facts::CAT_FACTS;

/// Name of the region, class and node.
pub const DEVICE_NAME: &str = "catfacts";

/// Where the node shows up.
pub const DEVICE_PATH: &str = "/dev/catfacts";

module! {
    type: CatFacts,
    name: "cat_facts",
    description: "A sample kernel module responding with cat facts",
    license: "GPL",
}

pub struct CatFacts {
    device: Arc<FactDevice>,
    chrdev: chrdev::Registration,
}

impl CatFacts {
    /// The device state shared by every open of the node.
    pub fn device(&self) -> &Arc<FactDevice> {
        &self.device
    }

    /// Device number of the node.
    pub fn dev(&self) -> DevT {
        self.chrdev.dev()
    }
}

impl kernel::Module for CatFacts {
    fn init(module: &ThisModule) -> Result<Self> {
        kernel::logger::init_logger();
        pr_info!("**cat_facts module is being initialized...\n");

        let device = Arc::new(FactDevice::new(&CAT_FACTS, module.clone()));
        let chrdev = chrdev::builder(DEVICE_NAME, 0..1, module)?
            .register_device::<FactFile>(device.clone())
            .with_node(DEVICE_NAME)
            .build()?;

        log::info!(
            "{} facts available at {} ({:?})",
            CAT_FACTS.len(),
            DEVICE_PATH,
            chrdev.dev()
        );
        Ok(CatFacts { device, chrdev })
    }
}

impl Drop for CatFacts {
    fn drop(&mut self) {
        if self.device.is_held() {
            log::warn!("{} is still open, tearing it down anyway", DEVICE_PATH);
        }
        pr_info!("Goodbye, cat_facts module is exiting...\n");
    }
}
