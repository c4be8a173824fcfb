//! 身份缓存：保证每个(设备, 节点号)在内存中至多一个实例

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::{Mutex, Once};

use crate::layout::Denode;
use crate::{DeviceId, Enode, EnodeRef, NodeId, Result};

type Key = (DeviceId, NodeId);

/// 缓存项：加载完成前`enode`为空，失败时`failed`置位
#[derive(Debug, Default)]
struct Slot {
    enode: Once<Arc<Enode>>,
    failed: AtomicBool,
}

#[derive(Debug)]
struct Entry {
    slot: Arc<Slot>,
    refs: usize,
}

impl Entry {
    fn holds(&self, node: &EnodeRef) -> bool {
        self.slot.enode.get().is_some_and(|e| Arc::ptr_eq(e, &node.0))
    }
}

#[derive(Debug, Default)]
pub struct IdentityCache {
    table: Mutex<BTreeMap<Key, Entry>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已有缓存项时等待其加载完成并返回同一实例；
    /// 否则先占位，再在锁外调用`load`构造实例。
    /// 加载失败时占位被撤销，等待者会重新尝试。
    pub fn resolve<F>(&self, device: DeviceId, id: NodeId, load: F) -> Result<EnodeRef>
    where
        F: FnOnce() -> Result<Denode>,
    {
        self.resolve_with(device, id, load)
    }

    /// 插入调用者新构造的实例；若已有实例，丢弃调用者的并返回已有的
    pub fn insert(&self, device: DeviceId, id: NodeId, den: Denode) -> EnodeRef {
        let Ok(enode) = self.resolve_with::<Infallible, _>(device, id, || Ok(den));
        enode
    }

    fn resolve_with<E, F>(&self, device: DeviceId, id: NodeId, load: F) -> Result<EnodeRef, E>
    where
        F: FnOnce() -> Result<Denode, E>,
    {
        let key = (device, id);
        let slot = loop {
            let mut table = self.table.lock();
            match table.get_mut(&key) {
                Some(entry) => {
                    entry.refs += 1;
                    let slot = entry.slot.clone();
                    drop(table);
                    if let Some(enode) = wait(&slot) {
                        return Ok(EnodeRef(enode));
                    }
                }
                None => {
                    let slot = Arc::new(Slot::default());
                    table.insert(
                        key,
                        Entry {
                            slot: slot.clone(),
                            refs: 1,
                        },
                    );
                    break slot;
                }
            }
        };

        match load() {
            Ok(den) => {
                let enode = slot.enode.call_once(|| Arc::new(Enode::new(device, id, den)));
                log::trace!("ehash: loaded {id} on device {device}");
                Ok(EnodeRef(enode.clone()))
            }
            Err(err) => {
                let mut table = self.table.lock();
                if table.get(&key).is_some_and(|e| Arc::ptr_eq(&e.slot, &slot)) {
                    table.remove(&key);
                }
                slot.failed.store(true, Ordering::Release);
                Err(err)
            }
        }
    }

    /// 只返回已加载完成的实例，不等待
    pub fn lookup(&self, device: DeviceId, id: NodeId) -> Option<EnodeRef> {
        let mut table = self.table.lock();
        let entry = table.get_mut(&(device, id))?;
        let enode = entry.slot.enode.get()?.clone();
        entry.refs += 1;
        Some(EnodeRef(enode))
    }

    /// 归还一个引用，返回实例是否已移出缓存
    ///
    /// 归还最后一个引用前先调用`flush`。此时缓存项仍在表中，
    /// 并发的解析拿到的仍是同一个实例。`flush`失败时缓存项保留，
    /// 留待下次归还或卸载时再写回。
    pub fn release<E, F>(&self, node: EnodeRef, flush: F) -> Result<bool, E>
    where
        F: FnOnce(&Enode) -> Result<(), E>,
    {
        let key = (node.device(), node.id());
        {
            let mut table = self.table.lock();
            let Some(entry) = table.get_mut(&key).filter(|e| e.holds(&node)) else {
                return Ok(false);
            };
            if entry.refs > 1 {
                entry.refs -= 1;
                return Ok(false);
            }
        }

        let flushed = flush(&node);
        let mut table = self.table.lock();
        let Some(entry) = table.get_mut(&key).filter(|e| e.holds(&node)) else {
            // 写回期间整个设备已被清出缓存
            return flushed.map(|()| false);
        };
        entry.refs -= 1;
        if entry.refs > 0 || flushed.is_err() {
            return flushed.map(|()| false);
        }
        table.remove(&key);
        log::trace!("ehash: evicted {} on device {}", key.1, key.0);
        Ok(true)
    }

    /// 某设备上已加载完成的全部实例
    pub fn loaded(&self, device: DeviceId) -> Vec<Arc<Enode>> {
        self.table
            .lock()
            .iter()
            .filter(|((dev, _), _)| *dev == device)
            .filter_map(|(_, entry)| entry.slot.enode.get().cloned())
            .collect()
    }

    /// 某设备上缓存的全部节点号
    pub fn cached(&self, device: DeviceId) -> Vec<NodeId> {
        self.table
            .lock()
            .keys()
            .filter(|(dev, _)| *dev == device)
            .map(|&(_, id)| id)
            .collect()
    }

    pub fn refs(&self, device: DeviceId, id: NodeId) -> usize {
        self.table.lock().get(&(device, id)).map_or(0, |e| e.refs)
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 移出某设备的全部缓存项，卸载时使用
    pub fn purge(&self, device: DeviceId) {
        self.table.lock().retain(|(dev, _), _| *dev != device);
    }
}

/// 等待加载者完成；加载失败返回`None`
fn wait(slot: &Slot) -> Option<Arc<Enode>> {
    loop {
        if let Some(enode) = slot.enode.get() {
            return Some(enode.clone());
        }
        if slot.failed.load(Ordering::Acquire) {
            return None;
        }
        core::hint::spin_loop();
    }
}
