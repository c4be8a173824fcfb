use alloc::string::String;

use vfs::{DirEntry, DirEntryType};

use super::Pod;
use crate::NodeId;

/// 目录槽的字节数
pub const SLOT_SIZE: usize = 32;

/// 名字缓冲区容量，最后一字节恒为0
pub const NAME_CAP: usize = 26;

/// 名字的最大长度
pub const NAME_MAX: usize = NAME_CAP - 1;

/// 定长目录槽，类型为0表示空槽
///
/// `name_len`是名字长度的唯一依据，缓冲区其余部分补0，
/// 因此名字后面总跟着一个0。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct DirSlot {
    pub inode: u32,
    pub ty: u8,
    pub name_len: u8,
    pub name: [u8; NAME_CAP],
}

unsafe impl Pod for DirSlot {}

impl DirSlot {
    pub const EMPTY: Self = Self {
        inode: 0,
        ty: 0,
        name_len: 0,
        name: [0; NAME_CAP],
    };

    pub fn new(inode: NodeId, ty: DirEntryType, name: &str) -> Result<Self, vfs::Error> {
        validate_name(name)?;
        let mut slot = Self {
            inode: inode.get(),
            ty: ty as u8,
            name_len: name.len() as u8,
            ..Self::EMPTY
        };
        slot.name[..name.len()].copy_from_slice(name.as_bytes());
        Ok(slot)
    }

    pub fn is_empty(&self) -> bool {
        self.ty == 0
    }

    pub fn node(&self) -> NodeId {
        NodeId::new(self.inode)
    }

    /// 名字的原始字节；长度不合法时返回`None`
    pub fn name(&self) -> Option<&[u8]> {
        let len = self.name_len as usize;
        (len <= NAME_MAX).then(|| &self.name[..len])
    }

    /// 空槽解码为`None`，损坏的槽解码为`Err`
    pub fn decode(&self) -> Result<Option<DirEntry>, ()> {
        if self.is_empty() {
            return Ok(None);
        }
        let ty = DirEntryType::try_from(self.ty).map_err(|_| ())?;
        let name = self.name().ok_or(())?;
        let name = core::str::from_utf8(name).map_err(|_| ())?;
        Ok(Some(DirEntry {
            inode: self.inode as u64,
            ty,
            name: String::from(name),
        }))
    }
}

/// 名字长度在`1..=NAME_MAX`之间，不含`/`与0
pub fn validate_name(name: &str) -> Result<(), vfs::Error> {
    if name.is_empty() || name.bytes().any(|b| b == b'/' || b == 0) {
        return Err(vfs::Error::InvalidArgument);
    }
    if name.len() > NAME_MAX {
        return Err(vfs::Error::NameTooLong);
    }
    Ok(())
}
