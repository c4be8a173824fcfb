//! 几何规划：由设备容量与扇区几何推导柱面组的数量与容量

use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::layout::{NODE_SIZE, SUPERBLOCK_SECTORS};
use crate::{Error, Result};

/// 初始的柱面组数
pub const DEFAULT_GROUPS: u32 = 4;

/// 柱面组数的上限
pub const MAX_GROUPS: u32 = 100;

/// 设备报告的几何参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    /// 总字节数
    pub capacity: u64,
    pub sector_size: u32,
    pub sectors_per_track: u32,
    /// 磁头数，即每柱面的磁道数
    pub heads: u32,
}

impl DiskGeometry {
    pub fn from_device(dev: &dyn BlockDevice, sectors_per_track: u32, heads: u32) -> Self {
        Self {
            capacity: dev.capacity(),
            sector_size: dev.sector_size() as u32,
            sectors_per_track,
            heads,
        }
    }

    pub fn total_sectors(&self) -> u64 {
        self.capacity / self.sector_size as u64
    }

    pub fn sectors_per_cylinder(&self) -> u64 {
        self.sectors_per_track as u64 * self.heads as u64
    }

    pub fn cylinders(&self) -> u64 {
        self.total_sectors() / self.sectors_per_cylinder()
    }

    fn validate(&self) -> Result<()> {
        let sector_ok = self.sector_size.is_power_of_two() && (512..=4096).contains(&self.sector_size);
        if !sector_ok || self.sectors_per_track == 0 || self.heads == 0 {
            return Err(vfs::Error::InvalidArgument.into());
        }
        Ok(())
    }
}

/// 单个柱面组的位置与容量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPlan {
    pub index: u32,
    /// 组头的偏移
    pub offset: u64,
    /// 下一组组头的偏移
    pub next: u64,
    pub cylinders: u32,
    pub block_map_offset: u64,
    pub node_map_offset: u64,
    pub node_table_offset: u64,
    pub data_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub block_size: u32,
    pub sector_size: u32,
    pub sectors_per_track: u32,
    pub sectors_per_cylinder: u32,
    pub cylinders: u32,
    pub cylinders_per_group: u32,
    pub nodes_per_group: u32,
    pub blocks_per_group: u32,
    pub node_table_blocks: u32,
    /// 超级块保留的字节数
    pub reserved: u64,
    pub groups: Vec<GroupPlan>,
}

impl Plan {
    pub fn group_count(&self) -> u32 {
        self.groups.len() as u32
    }

    /// 所有组中数据块的总数
    pub fn data_blocks(&self) -> u64 {
        self.blocks_per_group as u64 * self.group_count() as u64
    }
}

/// 从`groups`个组开始尝试，位图装不下时逐个增加组数，超过[`MAX_GROUPS`]即失败
pub fn plan(geo: &DiskGeometry, groups: u32, block_size: u32) -> Result<Plan> {
    geo.validate()?;
    if !block_size.is_power_of_two() || block_size < geo.sector_size || block_size as usize <= NODE_SIZE {
        return Err(vfs::Error::InvalidArgument.into());
    }

    let bs = block_size as u64;
    let bits = 8 * bs;
    let reserved = SUPERBLOCK_SECTORS * geo.sector_size as u64;
    let usable = (geo.total_sectors() * geo.sector_size as u64).saturating_sub(reserved);

    let mut ncg = groups.max(1);
    let (nodes, table_blocks) = loop {
        if ncg > MAX_GROUPS {
            log::error!("no layout fits within {MAX_GROUPS} cylinder groups");
            return Err(Error::LayoutInfeasible { groups: MAX_GROUPS });
        }
        let group_bytes = usable / ncg as u64;
        let nodes = group_bytes / (2 * bs);
        let table_blocks = (nodes * NODE_SIZE as u64).div_ceil(bs);
        let guess = group_bytes.saturating_sub((3 + table_blocks) * bs) / bs;
        if guess <= bits && nodes <= bits {
            break (nodes, table_blocks);
        }
        log::debug!("{ncg} groups need {guess} data blocks per bitmap, retrying");
        ncg += 1;
    };

    let infeasible = Error::LayoutInfeasible { groups: ncg };
    let spc = geo.sectors_per_cylinder();
    let cylinders = geo.cylinders();
    let cpg = cylinders / ncg as u64;
    // 0、1号保留，2号为根目录
    if cpg == 0 || nodes < 3 {
        return Err(infeasible);
    }

    let group_bytes = cpg * spc * geo.sector_size as u64;
    let overhead = (3 + table_blocks) * bs;
    let mut blocks_per_group = 0;
    let mut offset = reserved;
    let mut plans = Vec::with_capacity(ncg as usize);
    for index in 0..ncg {
        let budget = if index == 0 {
            group_bytes.checked_sub(reserved).ok_or(infeasible)?
        } else {
            group_bytes
        };
        let blocks = budget.checked_sub(overhead).ok_or(infeasible)? / bs;
        if index == 0 {
            if blocks == 0 || blocks > bits {
                return Err(infeasible);
            }
            blocks_per_group = blocks;
        } else if blocks < blocks_per_group {
            return Err(infeasible);
        }

        let block_map_offset = offset + bs;
        let node_map_offset = block_map_offset + bs;
        let node_table_offset = node_map_offset + bs;
        plans.push(GroupPlan {
            index,
            offset,
            next: offset + budget,
            cylinders: cpg as u32,
            block_map_offset,
            node_map_offset,
            node_table_offset,
            data_offset: node_table_offset + table_blocks * bs,
        });
        offset += budget;
    }

    Ok(Plan {
        block_size,
        sector_size: geo.sector_size,
        sectors_per_track: geo.sectors_per_track,
        sectors_per_cylinder: spc as u32,
        cylinders: cylinders as u32,
        cylinders_per_group: cpg as u32,
        nodes_per_group: nodes as u32,
        blocks_per_group: blocks_per_group as u32,
        node_table_blocks: table_blocks as u32,
        reserved,
        groups: plans,
    })
}
