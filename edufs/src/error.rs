use derive_more::Display;

use crate::{BlockId, NodeId};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Error {
    /// 没有空闲节点或空闲块，不在内部重试
    #[display(fmt = "no space left on volume")]
    NoSpace,

    /// 设备错误，原样传递
    #[display(fmt = "I/O error: {}", _0)]
    Io(block_dev::Error),

    /// 组数达到上限仍无法满足位图容量约束
    #[display(fmt = "layout infeasible with {} groups", groups)]
    LayoutInfeasible { groups: u32 },

    #[display(fmt = "malformed volume: {}", _0)]
    Malformed(Malformed),

    #[display(fmt = "node {} out of range", _0)]
    NodeOutOfRange(NodeId),

    #[display(fmt = "block {} out of range", _0)]
    BlockOutOfRange(BlockId),

    #[display(fmt = "{}", _0)]
    Vfs(vfs::Error),
}

/// 磁盘上的元数据不可信
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Malformed {
    #[display(fmt = "bad superblock magic {:#x}", _0)]
    BadMagic(u32),

    #[display(fmt = "superblock geometry is inconsistent")]
    BadGeometry,

    #[display(fmt = "cylinder group {} has bad magic {:#x}", index, magic)]
    BadGroupMagic { index: u32, magic: u32 },

    #[display(fmt = "cylinder group {} at {:#x} lies outside the volume", index, offset)]
    GroupOutOfBounds { index: u32, offset: u64 },

    #[display(fmt = "cylinder group {} header disagrees with its position", index)]
    GroupMismatch { index: u32 },

    #[display(fmt = "bad directory slot at {:#x}", offset)]
    BadSlot { offset: u64 },

    #[display(fmt = "directory size {} exceeds direct blocks", _0)]
    DirectorySize(u64),
}

impl core::error::Error for Error {}

impl From<block_dev::Error> for Error {
    fn from(err: block_dev::Error) -> Self {
        Self::Io(err)
    }
}

impl From<vfs::Error> for Error {
    fn from(err: vfs::Error) -> Self {
        Self::Vfs(err)
    }
}

impl From<Malformed> for Error {
    fn from(err: Malformed) -> Self {
        Self::Malformed(err)
    }
}
