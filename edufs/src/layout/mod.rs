//! 卷的布局
//!
//! 超级块(2扇区) | 柱面组0 | 柱面组1 | ... | 柱面组N-1
//!
//! 每个柱面组：组头(1块) | 空闲块位图(1块) | 已用节点位图(1块) | 节点表(向上取整到块) | 数据块

pub mod bitmap;
mod cylinder_group;
mod denode;
mod dir_slot;
mod super_block;

use core::{mem, ptr, slice};

pub use self::{
    cylinder_group::{CylinderGroup, GroupSummary},
    denode::{Denode, DIRECT_COUNT, INDIRECT_COUNT, NODE_SIZE},
    dir_slot::{validate_name, DirSlot, NAME_CAP, NAME_MAX, SLOT_SIZE},
    super_block::{SuperBlock, Summary, MOUNT_PATH_LEN, VOLUME_NAME_LEN},
};

/// 超级块与柱面组头共用的魔数
pub const MAGIC: u32 = 0x5DFB;

/// 超级块在卷首占用的扇区数
pub const SUPERBLOCK_SECTORS: u64 = 2;

/// 能与磁盘字节直接互换的定长结构，字节序为本机序（小端）
///
/// # Safety
///
/// 实现者必须是`repr(C)`、没有隐式填充，且任意位模式都是合法值。
pub unsafe trait Pod: Copy + 'static {
    fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= mem::size_of::<Self>());
        unsafe { ptr::read_unaligned(bytes.as_ptr().cast()) }
    }

    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts((self as *const Self).cast(), mem::size_of::<Self>()) }
    }

    fn zeroed() -> Self {
        unsafe { mem::zeroed() }
    }
}

/// 把以0填充的定长字段还原成字符串
fn fixed_str(buf: &[u8]) -> &str {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    match core::str::from_utf8(&buf[..len]) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&buf[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// 写入定长字段，保留至少一个结尾0，不截断多字节字符
fn set_fixed_str(buf: &mut [u8], s: &str) {
    let mut len = s.len().min(buf.len() - 1);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    buf.fill(0);
    buf[..len].copy_from_slice(&s.as_bytes()[..len]);
}

#[cfg(test)]
mod tests {
    use core::mem;

    use super::*;

    #[test]
    fn volume() {
        assert_eq!(632, mem::size_of::<SuperBlock>());
        assert_eq!(104, mem::size_of::<CylinderGroup>());
        assert_eq!(NODE_SIZE, mem::size_of::<Denode>());
        assert_eq!(SLOT_SIZE, mem::size_of::<DirSlot>());
        // 超级块必须能放进两个最小扇区
        assert!(mem::size_of::<SuperBlock>() <= 2 * 512);
    }

    #[test]
    fn fixed_strings() {
        let mut buf = [0xFFu8; 8];
        set_fixed_str(&mut buf, "/mnt/edu");
        assert_eq!("/mnt/ed", fixed_str(&buf));
        assert_eq!(0, buf[7]);

        set_fixed_str(&mut buf, "卷标");
        assert_eq!("卷标", fixed_str(&buf));

        set_fixed_str(&mut buf, "ab卷标");
        assert_eq!("ab卷", fixed_str(&buf));
    }
}
