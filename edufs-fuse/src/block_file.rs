use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use block_dev::{check_range, BlockDevice, Error};

/// 以宿主机文件为后端的块设备
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    sector_size: usize,
    capacity: u64,
}

impl BlockFile {
    /// 容量取文件当前长度
    pub fn new(file: File, sector_size: usize) -> io::Result<Self> {
        let capacity = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            sector_size,
            capacity,
        })
    }

    /// 创建（或截断）镜像并把长度设为`capacity`
    pub fn create(path: &Path, capacity: u64, sector_size: usize) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len(capacity)?;
        Self::new(fd, sector_size)
    }

    pub fn open(path: &Path, sector_size: usize, writable: bool) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(writable).open(path)?;
        Self::new(fd, sector_size)
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn device_error(err: io::Error) -> Error {
    Error::Device(-err.raw_os_error().unwrap_or(5))
}

impl BlockDevice for BlockFile {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        check_range(self.capacity, offset, buf.len())?;
        let mut file = self.lock();
        file.seek(SeekFrom::Start(offset)).map_err(device_error)?;
        let mut done = 0;
        while done < buf.len() {
            match file.read(&mut buf[done..]) {
                Ok(0) => {
                    return Err(Error::ShortTransfer {
                        offset,
                        done,
                        len: buf.len(),
                    });
                }
                Ok(n) => done += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(device_error(err)),
            }
        }
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), Error> {
        check_range(self.capacity, offset, buf.len())?;
        let mut file = self.lock();
        file.seek(SeekFrom::Start(offset)).map_err(device_error)?;
        file.write_all(buf).map_err(device_error)
    }

    fn flush(&self) -> Result<(), Error> {
        self.lock().sync_data().map_err(device_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use edufs::{DeviceId, DiskGeometry, EduFileSystem, FixedClock, FormatOptions, MountOptions};
    use tempfile::NamedTempFile;
    use vfs::{FileKind, Timespec};

    use super::*;

    const MIB: u64 = 1 << 20;

    #[test]
    fn read_write() {
        let tmp = NamedTempFile::new().unwrap();
        let dev = BlockFile::create(tmp.path(), 4096, 512).unwrap();
        assert_eq!(4096, dev.capacity());
        dev.write_at(1000, b"sector").unwrap();
        let mut buf = [0u8; 6];
        dev.read_at(1000, &mut buf).unwrap();
        assert_eq!(b"sector", &buf);

        let mut sector = [0xFFu8; 512];
        dev.read_at(512, &mut sector).unwrap();
        assert_eq!(b"sector", &sector[488..494]);
        assert!(sector[..488].iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_range() {
        let tmp = NamedTempFile::new().unwrap();
        let dev = BlockFile::create(tmp.path(), 1024, 512).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(
            Err(Error::OutOfRange { offset: 1020, len: 8 }),
            dev.read_at(1020, &mut buf)
        );
        assert_eq!(
            Err(Error::OutOfRange { offset: 1024, len: 8 }),
            dev.write_at(1024, &buf)
        );
    }

    #[test]
    fn short_file() {
        let tmp = NamedTempFile::new().unwrap();
        let dev = BlockFile::create(tmp.path(), 1024, 512).unwrap();
        tmp.as_file().set_len(512).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(
            Err(Error::ShortTransfer {
                offset: 504,
                done: 8,
                len: 16
            }),
            dev.read_at(504, &mut buf)
        );
    }

    #[test]
    fn image_round_trip() {
        let tmp = NamedTempFile::new().unwrap();
        let clock = Arc::new(FixedClock(Timespec { sec: 42, nsec: 0 }));
        {
            let dev = BlockFile::create(tmp.path(), 4 * MIB, 512).unwrap();
            let geo = DiskGeometry::from_device(&dev, 32, 2);
            EduFileSystem::format(&dev, &geo, &FormatOptions::default().volume_name("img")).unwrap();

            let fs = EduFileSystem::mount(
                Arc::new(dev),
                MountOptions::new(DeviceId::new(1)).clock(clock.clone()),
            )
            .unwrap();
            let root = fs.root().unwrap();
            let file = fs
                .create(&root, "a.txt", FileKind::Regular, Default::default(), 0, 0)
                .unwrap();
            fs.write_at(&file, 0, b"persisted").unwrap();
            fs.unmount().unwrap();
        }

        let dev = BlockFile::open(tmp.path(), 512, false).unwrap();
        let fs = EduFileSystem::mount(
            Arc::new(dev),
            MountOptions::new(DeviceId::new(1)).read_only(true).clock(clock),
        )
        .unwrap();
        assert_eq!("img", fs.statfs().volume_name);
        let file = fs.find("/a.txt").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(Ok(9), fs.read_at(&file, 0, &mut buf));
        assert_eq!(b"persisted", &buf[..9]);
    }
}
