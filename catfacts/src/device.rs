//! The `/dev/catfacts` character device.

use alloc::sync::Arc;
use core::{
    cmp,
    sync::atomic::{AtomicBool, Ordering},
};

use kernel::{
    buf::UserSliceWriter,
    code::{EBUSY, ENODEV},
    error::KernelResult,
    fs::{File, FileOperations, ReadFn},
    module::ModuleRef,
    random, ThisModule,
};

use crate::facts::FactTable;

/// State shared by every open of the device.
///
/// Only one file may have the device open at a time; `held` is claimed with
/// a compare-and-exchange on open and cleared on release.
pub struct FactDevice {
    facts: &'static FactTable,
    held: AtomicBool,
    owner: ThisModule,
}

impl FactDevice {
    /// Creates a free device serving `facts` on behalf of `owner`.
    pub fn new(facts: &'static FactTable, owner: ThisModule) -> FactDevice {
        FactDevice {
            facts,
            held: AtomicBool::new(false),
            owner,
        }
    }

    /// The table facts are picked from.
    pub fn facts(&self) -> &'static FactTable {
        self.facts
    }

    /// Whether a file currently has the device open.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn claim(&self) -> KernelResult {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| EBUSY)
    }

    fn free(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Serves one read of a session.
    ///
    /// The first non-empty read copies a random fact, cut to the buffer
    /// length, moves `offset` past it and marks the session `delivered`.
    /// Every read after that returns 0 and rewinds `offset`, so a session
    /// yields exactly one fact however often it is read.
    fn read_fact(
        &self,
        delivered: &AtomicBool,
        buf: &mut UserSliceWriter<'_>,
        offset: &mut u64,
    ) -> KernelResult<usize> {
        if delivered.load(Ordering::Acquire) {
            *offset = 0;
            return Ok(0);
        }

        let index = random::get_random_u32_below(u32::try_from(self.facts.len())?)?;
        let fact = self
            .facts
            .get(index as usize)
            .unwrap_or_default()
            .as_bytes();

        let to_copy = cmp::min(fact.len(), buf.len());
        if to_copy > 0 {
            buf.write_slice(&fact[..to_copy])?;
            *offset += to_copy as u64;
            delivered.store(true, Ordering::Release);
        }
        log::trace!("served fact {} ({} bytes)", index, to_copy);
        Ok(to_copy)
    }
}

/// An open `/dev/catfacts`.
pub struct FactFile {
    device: Arc<FactDevice>,
    // Set once this session has handed out its fact.
    delivered: AtomicBool,
    // Keeps the module loaded while the file is open.
    _module: ModuleRef,
}

impl FileOperations for FactFile {
    type OpenData = Arc<FactDevice>;

    fn open(device: &Arc<FactDevice>, _file: &File) -> KernelResult<Self> {
        device.claim()?;
        let Some(module) = device.owner.try_get() else {
            device.free();
            return Err(ENODEV);
        };
        log::debug!("{} opened", device.owner.name());
        Ok(FactFile {
            device: device.clone(),
            delivered: AtomicBool::new(false),
            _module: module,
        })
    }

    const READ: ReadFn<Self> = Some(
        |this: &Self,
         _file: &File,
         buf: &mut UserSliceWriter<'_>,
         offset: &mut u64|
         -> KernelResult<usize> { this.device.read_fact(&this.delivered, buf, offset) },
    );

    fn release(self, _file: &File) {
        self.device.free();
        log::debug!("{} released", self.device.owner.name());
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier},
        thread,
    };

    use kernel::{
        buf::UserSlice,
        code::{EBUSY, EFAULT, ENODEV},
        fs::{File, FileOperations, OpenFlags},
        sys::{Kernel, OpenFile},
    };

    use super::FactFile;
    use crate::{facts::CAT_FACTS, init_module, DEVICE_PATH};

    fn open(kernel: &Kernel) -> kernel::error::KernelResult<OpenFile> {
        kernel.open(DEVICE_PATH, OpenFlags::O_RDONLY)
    }

    #[test]
    fn second_open_is_busy_until_release() {
        let kernel = Kernel::new();
        let loaded = init_module(&kernel).unwrap();
        let device = loaded.get().unwrap().device();

        let first = open(&kernel).unwrap();
        assert!(device.is_held());
        assert_eq!(open(&kernel).err(), Some(EBUSY));
        assert!(device.is_held());

        first.close();
        assert!(!device.is_held());
        assert!(open(&kernel).is_ok());
    }

    #[test]
    fn one_fact_per_session() {
        let kernel = Kernel::new();
        let _loaded = init_module(&kernel).unwrap();
        let mut file = open(&kernel).unwrap();

        let mut buf = [0u8; 4096];
        let n = file.read(&mut buf).unwrap();
        assert!(CAT_FACTS.contains(&buf[..n]));
        assert_eq!(file.pos(), n as u64);

        for len in [4096, 1, 0] {
            assert_eq!(file.read(&mut buf[..len]), Ok(0));
            assert_eq!(file.pos(), 0);
        }
    }

    #[test]
    fn rewound_cursor_does_not_redeliver() {
        let kernel = Kernel::new();
        let _loaded = init_module(&kernel).unwrap();
        let mut file = open(&kernel).unwrap();

        let mut buf = [0u8; 4096];
        assert!(file.read(&mut buf).unwrap() > 0);
        // The second read rewinds the cursor to 0.
        assert_eq!(file.read(&mut buf), Ok(0));
        assert_eq!(file.pos(), 0);
        // Third and later reads still see end of file.
        assert_eq!(file.read(&mut buf), Ok(0));
        for _ in 3..9 {
            file.read(&mut buf).unwrap();
        }
        assert_eq!(file.read(&mut buf), Ok(0), "tenth read");
        assert_eq!(file.pos(), 0);
    }

    #[test]
    fn short_read_is_a_prefix() {
        let kernel = Kernel::new();
        let _loaded = init_module(&kernel).unwrap();
        for len in [1usize, 5, 20] {
            let mut file = open(&kernel).unwrap();
            let mut buf = vec![0u8; len];
            assert_eq!(file.read(&mut buf), Ok(len));
            assert!(CAT_FACTS.iter().any(|f| f.as_bytes().starts_with(&buf)));
            // The rest of a truncated fact is not delivered.
            assert_eq!(file.read(&mut [0u8; 4096]), Ok(0));
        }
    }

    #[test]
    fn empty_read_delivers_nothing_and_keeps_session_fresh() {
        let kernel = Kernel::new();
        let _loaded = init_module(&kernel).unwrap();
        let mut file = open(&kernel).unwrap();
        assert_eq!(file.read(&mut []), Ok(0));
        assert_eq!(file.pos(), 0);
        let mut buf = [0u8; 4096];
        let n = file.read(&mut buf).unwrap();
        assert!(CAT_FACTS.contains(&buf[..n]));
    }

    #[test]
    fn fault_copies_nothing() {
        let kernel = Kernel::new();
        let _loaded = init_module(&kernel).unwrap();
        let mut file = open(&kernel).unwrap();
        assert_eq!(file.read_user(UserSlice::unmapped(4096)), Err(EFAULT));
        assert_eq!(file.pos(), 0);
        // The session still has its fact to give.
        let mut buf = [0u8; 4096];
        let n = file.read(&mut buf).unwrap();
        assert!(n > 0);
    }

    #[test]
    fn open_holds_a_module_reference() {
        let kernel = Kernel::new();
        let loaded = init_module(&kernel).unwrap();
        let module = loaded.this_module().clone();
        assert_eq!(module.refcount(), 0);
        let file = open(&kernel).unwrap();
        assert_eq!(module.refcount(), 1);
        drop(file);
        assert_eq!(module.refcount(), 0);
    }

    #[test]
    fn open_fails_once_module_is_going() {
        let kernel = Kernel::new();
        let mut loaded = init_module(&kernel).unwrap();
        let device = loaded.get().unwrap().device().clone();
        let dev = loaded.get().unwrap().dev();
        loaded.force_unload();

        // The node is gone, so drive the file operations directly.
        let file = File::new(OpenFlags::O_RDONLY, dev);
        assert_eq!(FactFile::open(&device, &file).err(), Some(ENODEV));
        assert!(!device.is_held());
    }

    #[test]
    fn concurrent_opens_have_one_winner() {
        const THREADS: usize = 8;
        let kernel = Kernel::new();
        let _loaded = init_module(&kernel).unwrap();

        for _ in 0..50 {
            let barrier = Arc::new(Barrier::new(THREADS));
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let kernel = kernel.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        let res = open(&kernel);
                        // Hold on until everyone has tried.
                        barrier.wait();
                        res.map(|file| file.close())
                    })
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results.iter().filter(|r| r.is_err()).all(|r| *r == Err(EBUSY)));
        }
    }
}
