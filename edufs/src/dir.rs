//! 目录编解码：目录是一串数据块，每块由定长槽组成

use alloc::vec;
use alloc::vec::Vec;

use vfs::DirEntry;

use crate::layout::{Denode, DirSlot, Pod, DIRECT_COUNT, SLOT_SIZE};
use crate::{Malformed, Result};

/// 一次目录枚举的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readdir {
    pub entries: Vec<DirEntry>,
    /// 下次枚举的起点
    pub cursor: u64,
    /// 游标已到达目录大小
    pub eof: bool,
}

/// 按逻辑顺序读取目录块的游标
struct Blocks<'a, F> {
    den: &'a Denode,
    read: F,
    buf: Vec<u8>,
    loaded: Option<usize>,
}

impl<'a, F> Blocks<'a, F>
where
    F: FnMut(u64, &mut [u8]) -> Result<()>,
{
    fn new(den: &'a Denode, block_size: usize, read: F) -> Self {
        Self {
            den,
            read,
            buf: vec![0; block_size],
            loaded: None,
        }
    }

    /// 取出游标处的槽，游标必须小于目录大小
    fn slot(&mut self, cursor: u64) -> Result<DirSlot> {
        let bs = self.buf.len() as u64;
        let lbn = (cursor / bs) as usize;
        if lbn >= DIRECT_COUNT {
            return Err(Malformed::DirectorySize(self.den.size).into());
        }
        if self.loaded != Some(lbn) {
            match self.den.direct[lbn] {
                // 空洞读作全空槽
                0 => self.buf.fill(0),
                addr => (self.read)(addr, &mut self.buf)?,
            }
            self.loaded = Some(lbn);
        }
        let at = (cursor % bs) as usize;
        Ok(DirSlot::from_bytes(&self.buf[at..at + SLOT_SIZE]))
    }
}

/// 从`cursor`开始枚举目录项，直到目录末尾或`budget`字节装不下下一项
///
/// 空槽被跳过但仍推进游标；`read(偏移, 缓冲区)`读取一个完整的目录块。
pub fn enumerate<F>(den: &Denode, block_size: usize, cursor: u64, budget: usize, read: F) -> Result<Readdir>
where
    F: FnMut(u64, &mut [u8]) -> Result<()>,
{
    if cursor % SLOT_SIZE as u64 != 0 {
        return Err(vfs::Error::InvalidArgument.into());
    }
    let mut blocks = Blocks::new(den, block_size, read);
    let mut cursor = cursor;
    let mut used = 0;
    let mut entries = Vec::new();
    while cursor < den.size {
        let slot = blocks.slot(cursor)?;
        match slot.decode() {
            Ok(None) => {}
            Ok(Some(entry)) => {
                if used + entry.record_len() > budget {
                    break;
                }
                used += entry.record_len();
                log::trace!("readdir {cursor:#x}: {} -> {}", entry.name, entry.inode);
                entries.push(entry);
            }
            Err(()) => return Err(Malformed::BadSlot { offset: cursor }.into()),
        }
        cursor += SLOT_SIZE as u64;
    }
    Ok(Readdir {
        entries,
        cursor,
        eof: cursor >= den.size,
    })
}

/// 找到第一个满足条件的槽，返回其在目录内的偏移
pub fn find<F, P>(den: &Denode, block_size: usize, read: F, mut pred: P) -> Result<Option<(u64, DirSlot)>>
where
    F: FnMut(u64, &mut [u8]) -> Result<()>,
    P: FnMut(&DirSlot) -> bool,
{
    let mut blocks = Blocks::new(den, block_size, read);
    let mut cursor = 0;
    while cursor < den.size {
        let slot = blocks.slot(cursor)?;
        if pred(&slot) {
            return Ok(Some((cursor, slot)));
        }
        cursor += SLOT_SIZE as u64;
    }
    Ok(None)
}

/// 非空且名字相同
pub fn name_matches(slot: &DirSlot, name: &str) -> bool {
    !slot.is_empty() && slot.name() == Some(name.as_bytes())
}
