use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::{check_range, BlockDevice, Error};

/// 内存盘，供测试与试运行使用
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
    sector_size: usize,
    /// 置位后所有访问均失败
    faulty: AtomicBool,
}

impl RamDisk {
    pub fn new(capacity: usize, sector_size: usize) -> Self {
        assert!(sector_size.is_power_of_two());
        Self {
            data: Mutex::new(vec![0; capacity]),
            sector_size,
            faulty: AtomicBool::new(false),
        }
    }

    pub fn set_faulty(&self, faulty: bool) {
        self.faulty.store(faulty, Ordering::Relaxed);
    }

    /// 整个盘面的副本
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn check(&self, offset: u64, len: usize) -> Result<(), Error> {
        if self.faulty.load(Ordering::Relaxed) {
            return Err(Error::Device(-5));
        }
        check_range(self.capacity(), offset, len)
    }
}

impl BlockDevice for RamDisk {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn capacity(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.check(offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data.lock()[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), Error> {
        self.check(offset, buf.len())?;
        let start = offset as usize;
        self.data.lock()[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range() {
        let disk = RamDisk::new(4096, 512);
        let mut buf = [0u8; 512];
        assert!(disk.read_at(7 * 512, &mut buf).is_ok());
        assert_eq!(
            disk.read_at(8 * 512, &mut buf),
            Err(Error::OutOfRange { offset: 4096, len: 512 })
        );
    }

    #[test]
    fn faulty() {
        let disk = RamDisk::new(4096, 512);
        disk.write_at(10, b"edufs").unwrap();
        disk.set_faulty(true);
        let mut buf = [0u8; 5];
        assert_eq!(disk.read_at(10, &mut buf), Err(Error::Device(-5)));
        disk.set_faulty(false);
        disk.read_at(10, &mut buf).unwrap();
        assert_eq!(&buf, b"edufs");
    }
}
