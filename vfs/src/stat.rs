use alloc::string::String;

use enumflags2::{bitflags, BitFlags};

use crate::DirEntryType;

/// 文件类型，对应`mode`的高位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Fifo,
    Char,
    Directory,
    Block,
    Regular,
    SymLink,
    Socket,
}

impl FileKind {
    pub const MASK: u16 = 0o170000;

    pub const fn mode_bits(self) -> u16 {
        match self {
            Self::Fifo => 0o010000,
            Self::Char => 0o020000,
            Self::Directory => 0o040000,
            Self::Block => 0o060000,
            Self::Regular => 0o100000,
            Self::SymLink => 0o120000,
            Self::Socket => 0o140000,
        }
    }

    pub fn from_mode(mode: u16) -> Option<Self> {
        Some(match mode & Self::MASK {
            0o010000 => Self::Fifo,
            0o020000 => Self::Char,
            0o040000 => Self::Directory,
            0o060000 => Self::Block,
            0o100000 => Self::Regular,
            0o120000 => Self::SymLink,
            0o140000 => Self::Socket,
            _ => return None,
        })
    }
}

impl From<FileKind> for DirEntryType {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Fifo => Self::Fifo,
            FileKind::Char => Self::Char,
            FileKind::Directory => Self::Directory,
            FileKind::Block => Self::Block,
            FileKind::Regular => Self::Regular,
            FileKind::SymLink => Self::SymLink,
            FileKind::Socket => Self::Socket,
        }
    }
}

/// `mode`的低12位
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OtherExec = 0o0001,
    OtherWrite = 0o0002,
    OtherRead = 0o0004,
    GroupExec = 0o0010,
    GroupWrite = 0o0020,
    GroupRead = 0o0040,
    OwnerExec = 0o0100,
    OwnerWrite = 0o0200,
    OwnerRead = 0o0400,
    Sticky = 0o1000,
    SetGid = 0o2000,
    SetUid = 0o4000,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    pub sec: u32,
    pub nsec: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub ino: u64,
    pub kind: FileKind,
    pub perm: BitFlags<Permission>,
    pub nlink: u16,
    pub uid: u32,
    pub gid: u32,
    /// File size
    pub size: u64,
    /// Occupying blocks
    pub blocks: u64,
    /// Optimal I/O block size
    pub block_size: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
    pub generation: u32,
}

/// 整个卷的统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u64,
    /// 数据块总数
    pub blocks: u64,
    pub free_blocks: u64,
    /// 节点总数
    pub files: u64,
    pub free_files: u64,
    pub dirs: u64,
    pub name_max: usize,
    pub fsid: [u32; 2],
    pub volume_name: String,
    pub mount_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits() {
        let mode = FileKind::Directory.mode_bits() | 0o755;
        assert_eq!(Some(FileKind::Directory), FileKind::from_mode(mode));
        let perm = BitFlags::<Permission>::from_bits_truncate(mode);
        assert!(perm.contains(Permission::OwnerWrite | Permission::OtherExec));
        assert!(!perm.contains(Permission::GroupWrite));
        assert_eq!(None, FileKind::from_mode(0o755));
    }
}
