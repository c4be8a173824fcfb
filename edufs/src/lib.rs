#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* edufs 的整体架构，自上而下 */

// 节点层：命名空间与文件数据的读写
mod inode;

// 挂载状态：分配表、身份缓存与超级块镜像的持有者
mod efs;

// 身份缓存：每个(设备, 节点号)至多一个内存节点
mod ehash;
mod enode;

// 目录编解码
mod dir;

// 空闲空间分配与地址转换
mod allocator;
mod translate;

// 格式化：几何规划与卷的构建
mod geometry;
mod newfs;

// 磁盘数据结构层
pub mod layout;

mod clock;
mod disk;
mod error;
mod id;

pub use self::{
    clock::{Clock, FixedClock},
    dir::Readdir,
    efs::{EduFileSystem, MountOptions},
    ehash::IdentityCache,
    enode::{Enode, EnodeFlag, EnodeInner, EnodeRef},
    error::{Error, Malformed, Result},
    geometry::{plan, DiskGeometry, GroupPlan, Plan, DEFAULT_GROUPS, MAX_GROUPS},
    id::{BlockId, DeviceId, NodeId},
    newfs::{build_layout, format, FormatOptions},
    translate::Translator,
};
