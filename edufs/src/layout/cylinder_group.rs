use core::fmt;

use super::{Pod, MAGIC};

/// 柱面组头，位于每组的第一块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct CylinderGroup {
    /// 下一组组头的偏移，最后一组指向卷尾
    pub next: u64,

    /// 必须为[`MAGIC`]
    pub magic: u32,

    /// 组号，即在柱面组数组中的位置
    pub index: u32,

    /// 本组的柱面数
    pub cylinders: u32,

    /// 数据块数，各组相同
    pub data_blocks: u32,

    /// 节点数
    pub nodes: u32,

    pub summary: GroupSummary,

    /// 空闲块位图的偏移，置位表示已用
    pub block_map_offset: u64,

    /// 已用节点位图的偏移
    pub node_map_offset: u64,

    pub node_table_offset: u64,

    /// 首个数据块的偏移
    pub data_offset: u64,

    /// 最近分配的块，仅作提示
    pub block_rotor: u32,

    /// 最近分配的节点，仅作提示
    pub node_rotor: u32,

    pub time: u64,

    /// 组头自身的偏移
    pub offset: u64,

    _spare: [u32; 2],
}

unsafe impl Pod for CylinderGroup {}

/// 组内汇总计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct GroupSummary {
    pub dirs: u32,
    pub free_blocks: u32,
    pub free_nodes: u32,
}

impl CylinderGroup {
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// 数据区结束的偏移
    pub fn data_end(&self, block_size: u32) -> u64 {
        self.data_offset + self.data_blocks as u64 * block_size as u64
    }
}

impl fmt::Display for CylinderGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "cg {}:\tmagic\t{:#x}\ttime\t{}\toffset\t{:#x}\tnext\t{:#x}",
            self.index, self.magic, self.time, self.offset, self.next
        )?;
        writeln!(
            f,
            "\tncyl\t{}\tndblk\t{}\tneblk\t{}",
            self.cylinders, self.data_blocks, self.nodes
        )?;
        writeln!(
            f,
            "\tnbfree\t{}\tndir\t{}\tnefree\t{}",
            self.summary.free_blocks, self.summary.dirs, self.summary.free_nodes
        )?;
        write!(
            f,
            "\tfreeoff\t{:#x}\tusedoff\t{:#x}\tenodeoff\t{:#x}\tdboff\t{:#x}",
            self.block_map_offset, self.node_map_offset, self.node_table_offset, self.data_offset
        )
    }
}
