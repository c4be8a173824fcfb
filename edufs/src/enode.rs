use alloc::sync::Arc;
use core::ops::Deref;

use enumflags2::{bitflags, BitFlags};
use spin::{Mutex, MutexGuard};
use vfs::{FileKind, Timespec};

use crate::layout::Denode;
use crate::{DeviceId, NodeId};

/// 内存节点的状态位
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnodeFlag {
    /// 访问时间待更新
    Access = 0x0001,
    /// 状态改变时间待更新
    Change = 0x0002,
    /// 修改时间待更新
    Update = 0x0004,
    /// 记录已被修改，尚未写回
    Modified = 0x0008,
}

/// 磁盘节点在内存中的唯一代表
///
/// 通过(设备, 节点号)而不是指针指回所属的挂载。
#[derive(Debug)]
pub struct Enode {
    device: DeviceId,
    id: NodeId,
    inner: Mutex<EnodeInner>,
}

#[derive(Debug)]
pub struct EnodeInner {
    pub den: Denode,
    pub flags: BitFlags<EnodeFlag>,
}

impl Enode {
    pub fn new(device: DeviceId, id: NodeId, den: Denode) -> Self {
        Self {
            device,
            id,
            inner: Mutex::new(EnodeInner {
                den,
                flags: BitFlags::empty(),
            }),
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, EnodeInner> {
        self.inner.lock()
    }

    /// 记录的副本
    pub fn denode(&self) -> Denode {
        self.inner.lock().den
    }

    pub fn kind(&self) -> Option<FileKind> {
        self.inner.lock().den.kind()
    }

    pub fn touch(&self, flags: impl Into<BitFlags<EnodeFlag>>) {
        self.inner.lock().flags |= flags.into();
    }

    pub fn flags(&self) -> BitFlags<EnodeFlag> {
        self.inner.lock().flags
    }
}

impl EnodeInner {
    /// 把待更新的时间写进记录；只读挂载时只清除标记
    pub fn apply_times(&mut self, now: Timespec, read_only: bool) {
        let pending = EnodeFlag::Access | EnodeFlag::Change | EnodeFlag::Update;
        if !self.flags.intersects(pending) {
            return;
        }
        self.flags |= EnodeFlag::Modified;
        if !read_only {
            if self.flags.contains(EnodeFlag::Access) {
                self.den.set_atime(now);
            }
            if self.flags.contains(EnodeFlag::Update) {
                self.den.set_mtime(now);
            }
            if self.flags.contains(EnodeFlag::Change) {
                self.den.set_ctime(now);
            }
        }
        self.flags.remove(pending);
    }
}

/// 身份缓存发出的引用，归还时交回[`crate::IdentityCache::release`]
#[derive(Debug)]
pub struct EnodeRef(pub(crate) Arc<Enode>);

impl EnodeRef {
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for EnodeRef {
    type Target = Enode;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
