use derive_more::{Display, From, Into};

/// 卷内唯一的节点号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// 根目录，格式化时即已占用
    pub const ROOT: Self = Self(2);

    /// 0、1、2号节点永不参与分配
    pub const FIRST_FREE: Self = Self(3);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

/// 逻辑数据块号，`块号 / 每组块数`即所属柱面组
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

/// 宿主分配的设备标识，与节点号一起构成身份缓存的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[repr(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }
}
