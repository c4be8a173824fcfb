//! 宿主机工具：把普通文件当作块设备

mod block_file;

pub use self::block_file::BlockFile;
