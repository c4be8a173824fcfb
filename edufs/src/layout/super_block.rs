use core::fmt;

use super::{fixed_str, set_fixed_str, Pod, MAGIC};

pub const MOUNT_PATH_LEN: usize = 468;
pub const VOLUME_NAME_LEN: usize = 32;

/// 超级块，位于卷首，占两个扇区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SuperBlock {
    /// 必须为[`MAGIC`]
    pub magic: u32,

    /// 文件系统块的字节数
    pub block_size: u32,

    /// 扇区的字节数，也是设备的原生传输单元
    pub sector_size: u32,

    pub sectors_per_track: u32,

    pub sectors_per_cylinder: u32,

    /// 整个卷的柱面数
    pub cylinders: u32,

    pub cylinders_per_group: u32,

    /// 柱面组的数量
    pub group_count: u32,

    pub nodes_per_group: u32,

    /// 各组一致，使`块号 / 每组块数`恰好得到所属组
    pub blocks_per_group: u32,

    /// 柱面组0的组头偏移
    pub first_group_offset: u32,

    /// 每组节点表占用的块数
    pub node_table_blocks: u32,

    /// 卷的总块数（含元数据）
    pub total_blocks: u64,

    /// 数据块总数
    pub data_blocks: u64,

    /// 单个文件的最大字节数，只用直接块
    pub max_file_size: u64,

    /// 最后一次写入的时间（秒）
    pub time: u64,

    /// 各组计数之和
    pub totals: Summary,

    /// 卷的唯一标识
    pub id: [u32; 2],

    /// 上一次挂载的路径，0结尾
    pub mount_path: [u8; MOUNT_PATH_LEN],

    /// 卷名，0结尾
    pub volume_name: [u8; VOLUME_NAME_LEN],

    /// 非0表示干净卸载
    pub clean: u8,

    /// 只读挂载，仅在内存中有意义
    pub read_only: u8,

    /// 内存中的超级块已被修改
    pub modified: u8,

    _pad: u8,

    /// 最近一次分配所在的组
    pub group_rotor: u32,

    _spare: [u32; 3],
}

unsafe impl Pod for SuperBlock {}

/// 卷级汇总计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Summary {
    pub dirs: u64,
    pub free_blocks: u64,
    pub free_nodes: u64,
}

impl SuperBlock {
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn total_nodes(&self) -> u64 {
        self.group_count as u64 * self.nodes_per_group as u64
    }

    pub fn mount_path(&self) -> &str {
        fixed_str(&self.mount_path)
    }

    pub fn set_mount_path(&mut self, path: &str) {
        set_fixed_str(&mut self.mount_path, path);
    }

    pub fn volume_name(&self) -> &str {
        fixed_str(&self.volume_name)
    }

    pub fn set_volume_name(&mut self, name: &str) {
        set_fixed_str(&mut self.volume_name, name);
    }

    /// 超级块在卷首保留的字节数
    pub fn reserved_bytes(&self) -> u64 {
        super::SUPERBLOCK_SECTORS * self.sector_size as u64
    }
}

impl fmt::Display for SuperBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "magic\t{:#x}\ttime\t{}", self.magic, self.time)?;
        writeln!(f, "id\t[ {:#x} {:#x} ]", self.id[0], self.id[1])?;
        writeln!(
            f,
            "bsize\t{}\tbps\t{}\tnspt\t{}\tspc\t{}",
            self.block_size, self.sector_size, self.sectors_per_track, self.sectors_per_cylinder
        )?;
        writeln!(
            f,
            "ncyl\t{}\tcpg\t{}\tncg\t{}\tepg\t{}\tbpg\t{}",
            self.cylinders,
            self.cylinders_per_group,
            self.group_count,
            self.nodes_per_group,
            self.blocks_per_group
        )?;
        writeln!(
            f,
            "size\t{}\tdsize\t{}\tmaxfilesize\t{}",
            self.total_blocks, self.data_blocks, self.max_file_size
        )?;
        writeln!(
            f,
            "nbfree\t{}\tndir\t{}\tnefree\t{}",
            self.totals.free_blocks, self.totals.dirs, self.totals.free_nodes
        )?;
        write!(
            f,
            "clean\t{}\tvolname\t{:?}\tfsmnt\t{:?}",
            self.clean,
            self.volume_name(),
            self.mount_path()
        )
    }
}
