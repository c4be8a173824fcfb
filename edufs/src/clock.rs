use vfs::Timespec;

/// 时间来源，由宿主提供
pub trait Clock: Send + Sync {
    fn now(&self) -> Timespec;
}

/// 固定不变的时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub Timespec);

impl Clock for FixedClock {
    fn now(&self) -> Timespec {
        self.0
    }
}
