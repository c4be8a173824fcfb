//! 空闲空间分配：扫描位图，找到并标记空闲的节点或块

use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::layout::{bitmap, CylinderGroup, SuperBlock};
use crate::{disk, BlockId, Error, NodeId, Result};

/// 挂载期间的超级块镜像与柱面组数组
///
/// 整个分配表处于同一把锁之下，查找与标记在一个临界区内完成，
/// 两个并发的分配不可能得到同一个位。
#[derive(Debug, Clone)]
pub struct AllocTable {
    pub sb: SuperBlock,
    pub groups: Vec<CylinderGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Node,
    Block,
}

impl AllocTable {
    pub fn new(sb: SuperBlock, groups: Vec<CylinderGroup>) -> Self {
        Self { sb, groups }
    }

    /// 节点只从同时还有空闲块的组中分配
    pub fn allocate_node(&mut self, dev: &dyn BlockDevice, time: u64) -> Result<NodeId> {
        if self.sb.totals.free_nodes < 1 || self.sb.totals.free_blocks < 1 {
            return Err(Error::NoSpace);
        }
        let raw = self.find_and_mark(dev, Kind::Node, time)?;
        Ok(NodeId::new(raw))
    }

    pub fn allocate_block(&mut self, dev: &dyn BlockDevice, time: u64) -> Result<BlockId> {
        if self.sb.totals.free_blocks < 1 {
            return Err(Error::NoSpace);
        }
        let raw = self.find_and_mark(dev, Kind::Block, time)?;
        Ok(BlockId::new(raw))
    }

    /// 新目录计入所在组与全卷的目录数
    pub fn note_directory(&mut self, dev: &dyn BlockDevice, id: NodeId, time: u64) -> Result<()> {
        let index = (id.get() / self.sb.nodes_per_group) as usize;
        let cg = self.groups.get_mut(index).ok_or(Error::NodeOutOfRange(id))?;
        let mut updated = *cg;
        updated.summary.dirs += 1;
        updated.time = time;
        disk::write_pod(dev, updated.offset, &updated)?;
        *cg = updated;
        self.sb.totals.dirs += 1;
        self.commit_super(dev, time)
    }

    pub fn commit_super(&mut self, dev: &dyn BlockDevice, time: u64) -> Result<()> {
        self.sb.time = time;
        self.sb.modified = 0;
        disk::write_pod(dev, 0, &self.sb)
    }

    fn find_and_mark(&mut self, dev: &dyn BlockDevice, kind: Kind, time: u64) -> Result<u32> {
        let mut map = vec![0u8; self.sb.block_size as usize];
        let Self { sb, groups } = self;
        for cg in groups.iter_mut() {
            let (free, offset, reserved, limit, per_group) = match kind {
                Kind::Node => {
                    if cg.summary.free_nodes == 0 || cg.summary.free_blocks == 0 {
                        continue;
                    }
                    let reserved = if cg.index == 0 {
                        NodeId::FIRST_FREE.get() as usize
                    } else {
                        0
                    };
                    (cg.summary.free_nodes, cg.node_map_offset, reserved, cg.nodes, sb.nodes_per_group)
                }
                Kind::Block => {
                    if cg.summary.free_blocks == 0 {
                        continue;
                    }
                    (cg.summary.free_blocks, cg.block_map_offset, 0, cg.data_blocks, sb.blocks_per_group)
                }
            };

            dev.read_at(offset, &mut map)?;
            let Some(local) = bitmap::find_clear(&map, reserved, limit as usize) else {
                log::warn!("cg {}: {free} free {kind:?}s recorded but bitmap is full", cg.index);
                continue;
            };
            bitmap::set(&mut map, local);

            let mut updated = *cg;
            updated.time = time;
            match kind {
                Kind::Node => {
                    updated.summary.free_nodes -= 1;
                    updated.node_rotor = local as u32;
                }
                Kind::Block => {
                    updated.summary.free_blocks -= 1;
                    updated.block_rotor = local as u32;
                }
            }
            dev.write_at(offset, &map)?;

            // 位图已落盘：先更新内存中的计数，组头与超级块写失败时由下次写入补齐
            *cg = updated;
            match kind {
                Kind::Node => sb.totals.free_nodes -= 1,
                Kind::Block => sb.totals.free_blocks -= 1,
            }
            sb.group_rotor = cg.index;
            sb.time = time;
            disk::write_pod(dev, updated.offset, &updated)?;
            disk::write_pod(dev, 0, &*sb)?;

            let raw = cg.index * per_group + local as u32;
            log::debug!("allocated {kind:?} {raw} in cg {}", cg.index);
            return Ok(raw);
        }
        Err(Error::NoSpace)
    }

    /// 各组计数之和是否与超级块一致
    pub fn is_consistent(&self) -> bool {
        let sum = |f: fn(&CylinderGroup) -> u32| self.groups.iter().map(|cg| f(cg) as u64).sum::<u64>();
        sum(|cg| cg.summary.free_nodes) == self.sb.totals.free_nodes
            && sum(|cg| cg.summary.free_blocks) == self.sb.totals.free_blocks
            && sum(|cg| cg.summary.dirs) == self.sb.totals.dirs
    }
}
