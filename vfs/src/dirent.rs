use alloc::string::String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode number
    pub inode: u64,
    pub ty: DirEntryType,
    pub name: String,
}

impl DirEntry {
    /// 该目录项交给调用者时占用的字节数：
    /// 8字节定长头部，加上NULL结尾的名字，按4字节对齐
    pub fn record_len(&self) -> usize {
        Self::record_len_of(self.name.len())
    }

    pub const fn record_len_of(name_len: usize) -> usize {
        8 + (name_len + 1).next_multiple_of(4)
    }
}

/// 目录项类型，取值与BSD的`DT_*`一致，0保留给空槽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DirEntryType {
    Fifo = 1,
    Char = 2,
    Directory = 4,
    Block = 6,
    #[default]
    Regular = 8,
    SymLink = 10,
    Socket = 12,
}

impl TryFrom<u8> for DirEntryType {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            1 => Self::Fifo,
            2 => Self::Char,
            4 => Self::Directory,
            6 => Self::Block,
            8 => Self::Regular,
            10 => Self::SymLink,
            12 => Self::Socket,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_len() {
        assert_eq!(12, DirEntry::record_len_of(1));
        assert_eq!(12, DirEntry::record_len_of(3));
        assert_eq!(16, DirEntry::record_len_of(4));
        assert_eq!(36, DirEntry::record_len_of(25));
    }

    #[test]
    fn dt_codes() {
        assert_eq!(Ok(DirEntryType::Directory), DirEntryType::try_from(4));
        assert_eq!(Err(0), DirEntryType::try_from(0));
        assert_eq!(8, DirEntryType::Regular as u8);
    }
}
