//! 块设备接口层：按字节偏移读写的随机访问存储设备

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod ram_disk;

pub use self::ram_disk::RamDisk;

use core::any::Any;

use derive_more::Display;

/// 设备访问失败的原因，由上层原样传递
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Error {
    /// 访问范围超出设备容量
    #[display(fmt = "access {:#x}+{} beyond device capacity", offset, len)]
    OutOfRange { offset: u64, len: usize },

    /// 实际传输的字节数少于请求
    #[display(fmt = "short transfer at {:#x}: {} of {} bytes", offset, done, len)]
    ShortTransfer { offset: u64, done: usize, len: usize },

    /// 底层驱动报告的错误码
    #[display(fmt = "device failure (code {})", _0)]
    Device(i32),
}

impl core::error::Error for Error {}

pub trait BlockDevice: Send + Sync + Any {
    /// 设备原生传输单元（扇区）的字节数
    fn sector_size(&self) -> usize;

    /// 设备的总字节数
    fn capacity(&self) -> u64;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error>;

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), Error>;

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// 检查`[offset, offset + len)`是否落在容量之内
pub fn check_range(capacity: u64, offset: u64, len: usize) -> Result<(), Error> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(Error::OutOfRange { offset, len }),
    }
}
