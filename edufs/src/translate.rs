//! 地址转换：节点号与逻辑块号到物理字节偏移

use alloc::vec::Vec;

use crate::layout::{CylinderGroup, SuperBlock, NODE_SIZE};
use crate::{BlockId, Error, NodeId, Result};

/// 由超级块与柱面组表得到的只读转换表
///
/// 组内的各个偏移在格式化后不再变化，挂载时取一次快照即可。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translator {
    block_size: u32,
    sector_size: u32,
    nodes_per_group: u32,
    blocks_per_group: u32,
    node_tables: Vec<u64>,
    data: Vec<u64>,
}

impl Translator {
    pub fn new(sb: &SuperBlock, groups: &[CylinderGroup]) -> Self {
        Self {
            block_size: sb.block_size,
            sector_size: sb.sector_size,
            nodes_per_group: sb.nodes_per_group,
            blocks_per_group: sb.blocks_per_group,
            node_tables: groups.iter().map(|cg| cg.node_table_offset).collect(),
            data: groups.iter().map(|cg| cg.data_offset).collect(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size as usize
    }

    pub fn node_count(&self) -> u64 {
        self.nodes_per_group as u64 * self.node_tables.len() as u64
    }

    pub fn block_count(&self) -> u64 {
        self.blocks_per_group as u64 * self.data.len() as u64
    }

    /// 节点记录的偏移：所在组的节点表起点 + 记录大小 × 组内序号
    pub fn node_offset(&self, id: NodeId) -> Result<u64> {
        let (group, local) = split(id.get(), self.nodes_per_group);
        let table = self.node_tables.get(group).ok_or(Error::NodeOutOfRange(id))?;
        Ok(table + NODE_SIZE as u64 * local)
    }

    /// 包含该节点记录的扇区的起点
    pub fn node_chunk_offset(&self, id: NodeId) -> Result<u64> {
        let offset = self.node_offset(id)?;
        Ok(offset - offset % self.sector_size as u64)
    }

    /// 数据块的偏移：所在组的首个数据块 + 块大小 × 组内序号
    pub fn block_offset(&self, id: BlockId) -> Result<u64> {
        let (group, local) = split(id.get(), self.blocks_per_group);
        let data = self.data.get(group).ok_or(Error::BlockOutOfRange(id))?;
        Ok(data + self.block_size as u64 * local)
    }
}

#[inline]
fn split(raw: u32, per_group: u32) -> (usize, u64) {
    ((raw / per_group) as usize, (raw % per_group) as u64)
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::layout::Pod;

    fn translator() -> Translator {
        let mut sb = SuperBlock::zeroed();
        sb.block_size = 4096;
        sb.sector_size = 512;
        sb.nodes_per_group = 10;
        sb.blocks_per_group = 20;
        let mut groups = vec![CylinderGroup::zeroed(); 2];
        groups[0].node_table_offset = 0x4000;
        groups[0].data_offset = 0x10000;
        groups[1].node_table_offset = 0x100000;
        groups[1].data_offset = 0x110000;
        Translator::new(&sb, &groups)
    }

    #[test]
    fn nodes() {
        let tr = translator();
        assert_eq!(Ok(0x4000 + 2 * 256), tr.node_offset(NodeId::ROOT));
        assert_eq!(Ok(0x4000 + 512), tr.node_chunk_offset(NodeId::new(3)));
        assert_eq!(Ok(0x100000 + 256), tr.node_offset(NodeId::new(11)));
        assert_eq!(Ok(0x100000), tr.node_chunk_offset(NodeId::new(11)));
        assert_eq!(
            Err(Error::NodeOutOfRange(NodeId::new(20))),
            tr.node_offset(NodeId::new(20))
        );
        assert_eq!(20, tr.node_count());
    }

    #[test]
    fn blocks() {
        let tr = translator();
        assert_eq!(Ok(0x10000), tr.block_offset(BlockId::new(0)));
        assert_eq!(Ok(0x10000 + 19 * 4096), tr.block_offset(BlockId::new(19)));
        assert_eq!(Ok(0x110000), tr.block_offset(BlockId::new(20)));
        assert_eq!(
            Err(Error::BlockOutOfRange(BlockId::new(40))),
            tr.block_offset(BlockId::new(40))
        );
    }

    #[test]
    fn injective_within_group() {
        let tr = translator();
        let offsets: Vec<_> = (0..20)
            .map(|n| tr.node_offset(NodeId::new(n)).unwrap())
            .collect();
        for (i, a) in offsets.iter().enumerate() {
            for b in &offsets[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
