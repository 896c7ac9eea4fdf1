// SPDX-License-Identifier: GPL-2.0

//! Loadable modules.
//!
//! C header: [`include/linux/module.h`](../../../../include/linux/module.h)

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
    code::{ENOENT, EWOULDBLOCK},
    error::KernelResult as Result,
    sys::Kernel,
};

/// The top level entrypoint to implementing a kernel module.
///
/// For any teardown or cleanup operations, your type may implement [`Drop`].
pub trait Module: Sized + Send + Sync + 'static {
    /// Called at module initialization time.
    ///
    /// Use this method to perform whatever setup or registration your module
    /// should do.
    ///
    /// Equivalent to the `module_init` macro in the C API.
    fn init(module: &ThisModule) -> Result<Self>;
}

/// What `modinfo` shows about a module.
#[derive(Debug)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub author: Option<&'static str>,
    pub description: Option<&'static str>,
    pub license: &'static str,
}

struct ModuleInner {
    name: &'static str,
    refcnt: AtomicUsize,
    live: AtomicBool,
    kernel: Kernel,
}

/// Equivalent to `THIS_MODULE` in the C API.
///
/// Clones refer to the same module.
#[derive(Clone)]
pub struct ThisModule(Arc<ModuleInner>);

impl ThisModule {
    pub(crate) fn new(name: &'static str, kernel: Kernel) -> ThisModule {
        ThisModule(Arc::new(ModuleInner {
            name,
            refcnt: AtomicUsize::new(0),
            live: AtomicBool::new(true),
            kernel,
        }))
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// The kernel this module is loaded into.
    pub fn kernel(&self) -> &Kernel {
        &self.0.kernel
    }

    /// Takes a reference on the module, like `try_module_get`.
    ///
    /// Returns `None` once the module is being unloaded. The reference is
    /// dropped together with the returned guard.
    pub fn try_get(&self) -> Option<ModuleRef> {
        self.0.refcnt.fetch_add(1, Ordering::SeqCst);
        if !self.0.live.load(Ordering::SeqCst) {
            self.0.refcnt.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(ModuleRef(self.clone()))
    }

    /// Current number of references, like `module_refcount`.
    pub fn refcount(&self) -> usize {
        self.0.refcnt.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        self.0.live.load(Ordering::SeqCst)
    }
}

/// A reference on a module taken with [`ThisModule::try_get`].
///
/// Dropping it is `module_put`.
pub struct ModuleRef(ThisModule);

impl Drop for ModuleRef {
    fn drop(&mut self) {
        self.0 .0.refcnt.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A module that was loaded with [`Kernel::load_module`].
///
/// Dropping it unloads the module unconditionally.
pub struct LoadedModule<M: Module> {
    module: Option<M>,
    this: ThisModule,
}

impl<M: Module> LoadedModule<M> {
    pub fn this_module(&self) -> &ThisModule {
        &self.this
    }

    /// The module object, while loaded.
    pub fn get(&self) -> Option<&M> {
        self.module.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    /// Unloads the module, like `rmmod`.
    ///
    /// Refused with `EWOULDBLOCK` while references are held; the module
    /// keeps running in that case.
    pub fn unload(&mut self) -> Result {
        if self.module.is_none() {
            return Err(ENOENT);
        }
        let inner = &self.this.0;
        inner.live.store(false, Ordering::SeqCst);
        let refs = inner.refcnt.load(Ordering::SeqCst);
        if refs != 0 {
            inner.live.store(true, Ordering::SeqCst);
            log::warn!("{} is in use ({} references)", inner.name, refs);
            return Err(EWOULDBLOCK);
        }
        self.teardown();
        Ok(())
    }

    /// Unloads the module even if references are held, like `rmmod -f`.
    ///
    /// Files still open on its devices stop working.
    pub fn force_unload(&mut self) {
        if self.module.is_none() {
            return;
        }
        self.this.0.live.store(false, Ordering::SeqCst);
        let refs = self.this.refcount();
        if refs != 0 {
            log::warn!(
                "forcing unload of {} with {} references held",
                self.this.name(),
                refs
            );
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        // Runs the module's `Drop`, the `module_exit` equivalent.
        drop(self.module.take());
        log::info!("module {} unloaded", self.this.name());
    }
}

impl<M: Module> Drop for LoadedModule<M> {
    fn drop(&mut self) {
        self.force_unload();
    }
}

impl Kernel {
    /// Loads module `M`, like `insmod`.
    ///
    /// Nothing stays registered when `M::init` fails.
    pub fn load_module<M: Module>(&self, info: &'static ModuleInfo) -> Result<LoadedModule<M>> {
        let this = ThisModule::new(info.name, self.clone());
        log::info!(
            "loading module {} ({}, license {})",
            info.name,
            info.description.unwrap_or("no description"),
            info.license
        );
        match M::init(&this) {
            Ok(module) => Ok(LoadedModule {
                module: Some(module),
                this,
            }),
            Err(e) => {
                this.0.live.store(false, Ordering::SeqCst);
                log::error!("module {} failed to initialize: {:?}", info.name, e);
                Err(e)
            }
        }
    }
}

/// Declares a kernel module.
///
/// Expands to the module's [`ModuleInfo`] (`THIS_MODULE_INFO`) and an
/// `init_module(&Kernel)` function that loads it.
///
/// # Examples
///
/// ```ignore
/// use kernel::prelude::*;
///
/// module! {
///     type: MyModule,
///     name: "my_kernel_module",
///     author: "Rust for Linux Contributors",
///     description: "My very own kernel module!",
///     license: "GPL",
/// }
///
/// pub struct MyModule;
///
/// impl kernel::Module for MyModule {
///     fn init(_module: &ThisModule) -> Result<Self> {
///         pr_info!("Hello world!\n");
///         Ok(MyModule)
///     }
/// }
/// ```
#[macro_export]
macro_rules! module {
    (
        type: $type:ty,
        name: $name:literal,
        $(author: $author:literal,)?
        $(description: $description:literal,)?
        license: $license:literal $(,)?
    ) => {
        /// Metadata of this module.
        pub static THIS_MODULE_INFO: $crate::module::ModuleInfo = $crate::module::ModuleInfo {
            name: $name,
            author: $crate::__module_field!($($author)?),
            description: $crate::__module_field!($($description)?),
            license: $license,
        };

        /// Loads this module into `kernel`.
        pub fn init_module(
            kernel: &$crate::sys::Kernel,
        ) -> $crate::error::KernelResult<$crate::module::LoadedModule<$type>> {
            kernel.load_module::<$type>(&THIS_MODULE_INFO)
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __module_field {
    () => {
        None
    };
    ($value:literal) => {
        Some($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::EIO;

    struct Counting(Arc<AtomicUsize>);

    impl Drop for Counting {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    static INFO: ModuleInfo = ModuleInfo {
        name: "counting",
        author: None,
        description: None,
        license: "GPL",
    };

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Plain;

    impl Module for Plain {
        fn init(_module: &ThisModule) -> Result<Self> {
            Ok(Plain)
        }
    }

    impl Drop for Plain {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Failing;

    impl Module for Failing {
        fn init(_module: &ThisModule) -> Result<Self> {
            Err(EIO)
        }
    }

    #[test]
    fn refcount_blocks_unload() {
        let kernel = Kernel::new();
        let mut loaded = kernel.load_module::<Plain>(&INFO).unwrap();
        let reference = loaded.this_module().try_get().unwrap();
        assert_eq!(loaded.this_module().refcount(), 1);
        assert_eq!(loaded.unload(), Err(EWOULDBLOCK));
        assert!(loaded.is_loaded());
        assert!(loaded.this_module().is_live());

        drop(reference);
        let before = DROPS.load(Ordering::SeqCst);
        assert_eq!(loaded.unload(), Ok(()));
        assert!(!loaded.is_loaded());
        assert!(DROPS.load(Ordering::SeqCst) > before);
        assert_eq!(loaded.unload(), Err(ENOENT));
    }

    #[test]
    fn no_references_after_unload() {
        let kernel = Kernel::new();
        let mut loaded = kernel.load_module::<Plain>(&INFO).unwrap();
        let this = loaded.this_module().clone();
        loaded.force_unload();
        assert!(this.try_get().is_none());
        assert_eq!(this.refcount(), 0);
    }

    #[test]
    fn forced_unload_ignores_references() {
        let kernel = Kernel::new();
        let mut loaded = kernel.load_module::<Plain>(&INFO).unwrap();
        let reference = loaded.this_module().try_get().unwrap();
        loaded.force_unload();
        assert!(!loaded.is_loaded());
        drop(reference);
        assert_eq!(loaded.this_module().refcount(), 0);
    }

    #[test]
    fn failed_init_is_reported() {
        let kernel = Kernel::new();
        assert_eq!(kernel.load_module::<Failing>(&INFO).err(), Some(EIO));
    }

    #[test]
    fn dropping_loaded_module_tears_it_down() {
        let drops = Arc::new(AtomicUsize::new(0));
        let loaded = LoadedModule {
            module: Some(Counting(drops.clone())),
            this: ThisModule::new("counting", Kernel::new()),
        };
        drop(loaded);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    impl Module for Counting {
        fn init(_module: &ThisModule) -> Result<Self> {
            Ok(Counting(Arc::new(AtomicUsize::new(0))))
        }
    }
}
