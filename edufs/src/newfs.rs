//! 格式化：写出柱面组、节点表、根目录，最后提交超级块

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use block_dev::BlockDevice;
use enumflags2::BitFlags;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use vfs::{DirEntryType, FileKind, Timespec};

use crate::geometry::{self, DiskGeometry, Plan};
use crate::layout::{
    bitmap, CylinderGroup, Denode, DirSlot, GroupSummary, Pod, Summary, SuperBlock, DIRECT_COUNT,
    MAGIC, NODE_SIZE, SLOT_SIZE,
};
use crate::{disk, Error, NodeId, Result, Translator};

/// 格式化参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// 初始柱面组数，装不下时由规划自动增加
    pub groups: u32,
    pub block_size: u32,
    pub volume_name: String,
    /// 写入各结构的时间（秒）
    pub time: u32,
    pub uid: u32,
    pub gid: u32,
    /// 生成代号与卷标识的随机种子
    pub seed: u64,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            groups: geometry::DEFAULT_GROUPS,
            block_size: 4096,
            volume_name: String::new(),
            time: 0,
            uid: 0,
            gid: 0,
            seed: 0,
        }
    }
}

impl FormatOptions {
    pub fn groups(mut self, groups: u32) -> Self {
        self.groups = groups;
        self
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn volume_name(mut self, name: &str) -> Self {
        self.volume_name = String::from(name);
        self
    }

    pub fn time(mut self, time: u32) -> Self {
        self.time = time;
        self
    }

    pub fn owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn now(&self) -> Timespec {
        Timespec {
            sec: self.time,
            nsec: 0,
        }
    }
}

/// 根据规划得到的超级块与柱面组头，不触碰设备
pub fn build_layout(geo: &DiskGeometry, plan: &Plan, opts: &FormatOptions) -> (SuperBlock, Vec<CylinderGroup>) {
    let time = opts.time as u64;
    let groups: Vec<_> = plan
        .groups
        .iter()
        .map(|g| {
            let mut cg = CylinderGroup::zeroed();
            cg.magic = MAGIC;
            cg.index = g.index;
            cg.offset = g.offset;
            cg.next = g.next;
            cg.cylinders = g.cylinders;
            cg.data_blocks = plan.blocks_per_group;
            cg.nodes = plan.nodes_per_group;
            cg.block_map_offset = g.block_map_offset;
            cg.node_map_offset = g.node_map_offset;
            cg.node_table_offset = g.node_table_offset;
            cg.data_offset = g.data_offset;
            cg.time = time;
            cg.summary = if g.index == 0 {
                // 根目录占去一个节点与一个块
                GroupSummary {
                    dirs: 1,
                    free_blocks: plan.blocks_per_group - 1,
                    free_nodes: plan.nodes_per_group - 1,
                }
            } else {
                GroupSummary {
                    dirs: 0,
                    free_blocks: plan.blocks_per_group,
                    free_nodes: plan.nodes_per_group,
                }
            };
            cg
        })
        .collect();

    let mut sb = SuperBlock::zeroed();
    sb.magic = MAGIC;
    sb.block_size = plan.block_size;
    sb.sector_size = plan.sector_size;
    sb.sectors_per_track = plan.sectors_per_track;
    sb.sectors_per_cylinder = plan.sectors_per_cylinder;
    sb.cylinders = plan.cylinders;
    sb.cylinders_per_group = plan.cylinders_per_group;
    sb.group_count = plan.group_count();
    sb.nodes_per_group = plan.nodes_per_group;
    sb.blocks_per_group = plan.blocks_per_group;
    sb.first_group_offset = plan.reserved as u32;
    sb.node_table_blocks = plan.node_table_blocks;
    sb.total_blocks = geo.capacity / plan.block_size as u64;
    sb.data_blocks = plan.data_blocks();
    sb.max_file_size = (DIRECT_COUNT * plan.block_size as usize) as u64;
    sb.time = time;
    sb.totals = groups.iter().fold(Summary::default(), |acc, cg| Summary {
        dirs: acc.dirs + cg.summary.dirs as u64,
        free_blocks: acc.free_blocks + cg.summary.free_blocks as u64,
        free_nodes: acc.free_nodes + cg.summary.free_nodes as u64,
    });
    sb.clean = 1;
    sb.set_volume_name(&opts.volume_name);
    (sb, groups)
}

/// 格式化整个卷，成功时返回已提交的超级块
///
/// 超级块最后写入，之前任何一步失败都不会留下可挂载的卷。
pub fn format(dev: &dyn BlockDevice, geo: &DiskGeometry, opts: &FormatOptions) -> Result<SuperBlock> {
    if geo.capacity > dev.capacity() || geo.sector_size as usize != dev.sector_size() {
        return Err(vfs::Error::InvalidArgument.into());
    }
    let plan = geometry::plan(geo, opts.groups, opts.block_size)?;
    let (mut sb, groups) = build_layout(geo, &plan, opts);
    let mut rng = SmallRng::seed_from_u64(opts.seed);
    sb.id = [opts.time, rng.random()];

    let bs = plan.block_size as usize;
    let mut block = vec![0u8; bs];
    for cg in &groups {
        log::debug!("cg {}: {:#x}..{:#x}", cg.index, cg.offset, cg.next);

        block.fill(0);
        block[..mem::size_of::<CylinderGroup>()].copy_from_slice(cg.as_bytes());
        dev.write_at(cg.offset, &block)?;

        block.fill(0);
        if cg.index == 0 {
            bitmap::set(&mut block, 0);
        }
        dev.write_at(cg.block_map_offset, &block)?;

        block.fill(0);
        if cg.index == 0 {
            bitmap::set(&mut block, NodeId::ROOT.get() as usize);
        }
        dev.write_at(cg.node_map_offset, &block)?;

        write_node_table(dev, cg, &plan, opts, &mut rng, &mut block)?;
    }

    let tr = Translator::new(&sb, &groups);
    write_root(dev, &tr, opts, &mut block)?;

    disk::write_pod(dev, 0, &sb)?;
    dev.flush()?;
    log::info!(
        "formatted {} bytes: {} groups, {} nodes and {} blocks per group",
        geo.capacity,
        sb.group_count,
        sb.nodes_per_group,
        sb.blocks_per_group
    );
    Ok(sb)
}

/// 节点表按块写出，每条记录带随机代号
fn write_node_table(
    dev: &dyn BlockDevice,
    cg: &CylinderGroup,
    plan: &Plan,
    opts: &FormatOptions,
    rng: &mut SmallRng,
    block: &mut [u8],
) -> Result<()> {
    let now = opts.now();
    let mut index = 0;
    for nth in 0..plan.node_table_blocks as u64 {
        block.fill(0);
        for record in block.chunks_exact_mut(NODE_SIZE) {
            if index >= plan.nodes_per_group {
                break;
            }
            let generation = rng.random_range(1..=u32::MAX / 2);
            let den = Denode::blank(index, generation, now, opts.uid, opts.gid);
            record.copy_from_slice(den.as_bytes());
            index += 1;
        }
        dev.write_at(cg.node_table_offset + nth * block.len() as u64, block)?;
    }
    Ok(())
}

/// 根目录：2号节点，数据在0号块，只有"."与".."
fn write_root(dev: &dyn BlockDevice, tr: &Translator, opts: &FormatOptions, block: &mut [u8]) -> Result<()> {
    let data = tr.block_offset(crate::BlockId::new(0))?;
    block.fill(0);
    for (nth, name) in [".", ".."].into_iter().enumerate() {
        let slot = DirSlot::new(NodeId::ROOT, DirEntryType::Directory, name).map_err(Error::Vfs)?;
        block[nth * SLOT_SIZE..(nth + 1) * SLOT_SIZE].copy_from_slice(slot.as_bytes());
    }
    dev.write_at(data, block)?;

    let mut root = disk::read_node(dev, tr, NodeId::ROOT)?;
    root.set_mode(FileKind::Directory, BitFlags::from_bits_truncate(0o755));
    root.nlink = 2;
    root.size = 2 * SLOT_SIZE as u64;
    root.direct[0] = data;
    root.blocks = 1;
    root.uid = opts.uid;
    root.gid = opts.gid;
    disk::write_node(dev, tr, NodeId::ROOT, &root)
}
