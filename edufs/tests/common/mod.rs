#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use block_dev::{BlockDevice, Error as DevError, RamDisk};
use edufs::layout::SuperBlock;
use edufs::{Clock, DeviceId, DiskGeometry, EduFileSystem, FixedClock, FormatOptions, MountOptions};
use vfs::Timespec;

pub const MIB: u64 = 1 << 20;

pub const T0: u32 = 1_700_000_000;

/// 每次读取前进一秒的时钟
#[derive(Debug)]
pub struct TickClock(pub AtomicU32);

impl Clock for TickClock {
    fn now(&self) -> Timespec {
        Timespec {
            sec: self.0.fetch_add(1, Ordering::Relaxed),
            nsec: 0,
        }
    }
}

pub fn disk(capacity: u64, sectors_per_track: u32, heads: u32) -> (Arc<RamDisk>, DiskGeometry) {
    let dev = Arc::new(RamDisk::new(capacity as usize, 512));
    let geo = DiskGeometry::from_device(&*dev, sectors_per_track, heads);
    (dev, geo)
}

/// 64MiB，每柱面256KiB，正好4组各16MiB
pub fn large() -> (Arc<RamDisk>, DiskGeometry) {
    disk(64 * MIB, 32, 16)
}

/// 1MiB：每组31个节点、58个数据块
pub fn small() -> (Arc<RamDisk>, DiskGeometry) {
    disk(MIB, 32, 2)
}

/// 4MiB：每组127个节点、244个数据块
pub fn medium() -> (Arc<RamDisk>, DiskGeometry) {
    disk(4 * MIB, 32, 2)
}

pub fn options() -> FormatOptions {
    FormatOptions::default()
        .volume_name("edu")
        .time(T0)
        .owner(1000, 1000)
        .seed(7)
}

pub fn format(dev: &RamDisk, geo: &DiskGeometry) -> SuperBlock {
    edufs::format(dev, geo, &options()).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Timespec {
        sec: T0 + 10,
        nsec: 0,
    }))
}

pub fn mount(dev: &Arc<RamDisk>) -> EduFileSystem {
    let opts = MountOptions::new(DeviceId::new(1))
        .path("/mnt/edu")
        .clock(fixed_clock());
    mount_with(dev, opts)
}

pub fn mount_with(dev: &Arc<RamDisk>, opts: MountOptions) -> EduFileSystem {
    let dev: Arc<dyn BlockDevice> = dev.clone();
    EduFileSystem::mount(dev, opts).unwrap()
}

pub fn formatted_small() -> (Arc<RamDisk>, EduFileSystem) {
    let (dev, geo) = small();
    format(&dev, &geo);
    let fs = mount(&dev);
    (dev, fs)
}

/// 打开闸门后，下一次写入先停住，等测试线程放行
#[derive(Debug)]
pub struct Gated {
    inner: Arc<RamDisk>,
    armed: AtomicBool,
    pub entered: Barrier,
    pub resume: Barrier,
}

impl Gated {
    pub fn new(inner: Arc<RamDisk>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            entered: Barrier::new(2),
            resume: Barrier::new(2),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl BlockDevice for Gated {
    fn sector_size(&self) -> usize {
        self.inner.sector_size()
    }

    fn capacity(&self) -> u64 {
        self.inner.capacity()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DevError> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), DevError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.resume.wait();
        }
        self.inner.write_at(offset, buf)
    }
}

/// 允许的写入次数用完后，写入一律失败
#[derive(Debug)]
pub struct Flaky {
    inner: Arc<RamDisk>,
    budget: AtomicUsize,
}

impl Flaky {
    pub fn new(inner: Arc<RamDisk>) -> Self {
        Self {
            inner,
            budget: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn fail_after(&self, writes: usize) {
        self.budget.store(writes, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.budget.store(usize::MAX, Ordering::SeqCst);
    }
}

impl BlockDevice for Flaky {
    fn sector_size(&self) -> usize {
        self.inner.sector_size()
    }

    fn capacity(&self) -> u64 {
        self.inner.capacity()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DevError> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), DevError> {
        self.budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| DevError::Device(-5))?;
        self.inner.write_at(offset, buf)
    }
}
