use enumflags2::BitFlags;
use vfs::{FileKind, Permission, Timespec};

use super::Pod;

/// 直接块指针数，单个文件最多占用这么多块
pub const DIRECT_COUNT: usize = 12;

/// 间接块指针数，保留未用
pub const INDIRECT_COUNT: usize = 3;

/// 节点记录的字节数，整除任何扇区大小
pub const NODE_SIZE: usize = 256;

/// 磁盘上的节点记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Denode {
    /// 类型与权限位，0表示未使用
    pub mode: u16,
    pub nlink: u16,
    pub flags: u32,
    pub size: u64,
    pub atime: u32,
    pub atime_nsec: u32,
    pub mtime: u32,
    pub mtime_nsec: u32,
    pub ctime: u32,
    pub ctime_nsec: u32,
    /// 数据块的字节偏移，0表示空洞
    pub direct: [u64; DIRECT_COUNT],
    pub indirect: [u64; INDIRECT_COUNT],
    /// 已占用的块数
    pub blocks: u32,
    pub generation: u32,
    pub uid: u32,
    pub gid: u32,
    /// spare[0]记录格式化时在组内的序号
    pub spare: [u32; 20],
}

unsafe impl Pod for Denode {}

impl Denode {
    /// 格式化时写入节点表的空白记录
    pub fn blank(index: u32, generation: u32, now: Timespec, uid: u32, gid: u32) -> Self {
        let mut den = Self {
            generation,
            uid,
            gid,
            ..Default::default()
        };
        den.set_atime(now);
        den.set_mtime(now);
        den.set_ctime(now);
        den.spare[0] = index;
        den
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == Some(FileKind::Directory)
    }

    pub fn perm(&self) -> BitFlags<Permission> {
        BitFlags::from_bits_truncate(self.mode)
    }

    pub fn set_mode(&mut self, kind: FileKind, perm: BitFlags<Permission>) {
        self.mode = kind.mode_bits() | perm.bits();
    }

    pub fn atime(&self) -> Timespec {
        Timespec {
            sec: self.atime,
            nsec: self.atime_nsec,
        }
    }

    pub fn mtime(&self) -> Timespec {
        Timespec {
            sec: self.mtime,
            nsec: self.mtime_nsec,
        }
    }

    pub fn ctime(&self) -> Timespec {
        Timespec {
            sec: self.ctime,
            nsec: self.ctime_nsec,
        }
    }

    pub fn set_atime(&mut self, ts: Timespec) {
        self.atime = ts.sec;
        self.atime_nsec = ts.nsec;
    }

    pub fn set_mtime(&mut self, ts: Timespec) {
        self.mtime = ts.sec;
        self.mtime_nsec = ts.nsec;
    }

    pub fn set_ctime(&mut self, ts: Timespec) {
        self.ctime = ts.sec;
        self.ctime_nsec = ts.nsec;
    }
}
