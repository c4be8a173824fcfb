use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use spin::Mutex;
use vfs::{StatFs, Timespec};

use crate::allocator::AllocTable;
use crate::dir::{self, Readdir};
use crate::geometry::{DiskGeometry, MAX_GROUPS};
use crate::layout::{CylinderGroup, Denode, SuperBlock, NAME_MAX, NODE_SIZE};
use crate::{
    disk, newfs, BlockId, Clock, DeviceId, Enode, EnodeFlag, EnodeRef, FixedClock, FormatOptions,
    IdentityCache, Malformed, NodeId, Result, Translator,
};

/// 挂载参数
#[derive(Clone)]
pub struct MountOptions {
    pub device: DeviceId,
    /// 记入超级块的挂载路径
    pub path: String,
    pub read_only: bool,
    pub clock: Arc<dyn Clock>,
    /// 与其他挂载共享的身份缓存
    pub cache: Option<Arc<IdentityCache>>,
}

impl MountOptions {
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            path: String::new(),
            read_only: false,
            clock: Arc::new(FixedClock::default()),
            cache: None,
        }
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = String::from(path);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(mut self, cache: Arc<IdentityCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// 一个已挂载的卷
///
/// 持有分配表（超级块镜像与柱面组数组）、地址转换表与身份缓存，
/// 多个卷可以各自独立地挂载。
pub struct EduFileSystem {
    pub(crate) dev: Arc<dyn BlockDevice>,
    pub(crate) device: DeviceId,
    pub(crate) read_only: bool,
    clock: Arc<dyn Clock>,
    table: Mutex<AllocTable>,
    pub(crate) translator: Translator,
    pub(crate) cache: Arc<IdentityCache>,
}

impl EduFileSystem {
    pub fn format(dev: &dyn BlockDevice, geo: &DiskGeometry, opts: &FormatOptions) -> Result<SuperBlock> {
        newfs::format(dev, geo, opts)
    }

    /// 读出并校验超级块与整条柱面组链
    pub fn load(dev: &dyn BlockDevice) -> Result<(SuperBlock, Vec<CylinderGroup>)> {
        let sb: SuperBlock = disk::read_pod(dev, 0)?;
        if !sb.is_valid() {
            log::error!("bad superblock magic {:#x}", sb.magic);
            return Err(Malformed::BadMagic(sb.magic).into());
        }
        if !geometry_is_sane(&sb) {
            return Err(Malformed::BadGeometry.into());
        }

        let capacity = dev.capacity();
        let bs = sb.block_size as u64;
        let mut groups = Vec::with_capacity(sb.group_count as usize);
        let mut offset = sb.first_group_offset as u64;
        for index in 0..sb.group_count {
            if offset.checked_add(bs).is_none_or(|end| end > capacity) {
                return Err(Malformed::GroupOutOfBounds { index, offset }.into());
            }
            let cg: CylinderGroup = disk::read_pod(dev, offset)?;
            if !cg.is_valid() {
                log::error!("cg {index}: bad magic {:#x}", cg.magic);
                return Err(Malformed::BadGroupMagic { index, magic: cg.magic }.into());
            }
            let placed = cg.index == index
                && cg.offset == offset
                && cg.block_map_offset == offset + bs
                && cg.node_map_offset == offset + 2 * bs
                && cg.node_table_offset == offset + 3 * bs
                && cg.data_offset == cg.node_table_offset + sb.node_table_blocks as u64 * bs
                && cg.data_blocks == sb.blocks_per_group
                && cg.nodes == sb.nodes_per_group;
            if !placed {
                return Err(Malformed::GroupMismatch { index }.into());
            }
            if cg.data_end(sb.block_size) > cg.next || cg.next > capacity {
                return Err(Malformed::GroupOutOfBounds { index, offset: cg.next }.into());
            }
            offset = cg.next;
            groups.push(cg);
        }
        Ok((sb, groups))
    }

    pub fn mount(dev: Arc<dyn BlockDevice>, opts: MountOptions) -> Result<Self> {
        let (mut sb, groups) = Self::load(&*dev)?;
        let now = opts.clock.now();
        if sb.clean == 0 {
            log::warn!("volume was not cleanly unmounted");
        }
        sb.set_mount_path(&opts.path);
        sb.read_only = opts.read_only as u8;

        let translator = Translator::new(&sb, &groups);
        let mut table = AllocTable::new(sb, groups);
        if !table.is_consistent() {
            log::warn!("superblock totals disagree with cylinder groups");
        }
        if !opts.read_only {
            table.sb.clean = 0;
            table.commit_super(&*dev, now.sec as u64)?;
        }
        log::info!(
            "mounted {:?} at {:?}{}: {} free nodes, {} free blocks",
            table.sb.volume_name(),
            opts.path,
            if opts.read_only { " (read-only)" } else { "" },
            table.sb.totals.free_nodes,
            table.sb.totals.free_blocks
        );

        Ok(Self {
            dev,
            device: opts.device,
            read_only: opts.read_only,
            clock: opts.clock,
            table: Mutex::new(table),
            translator,
            cache: opts.cache.unwrap_or_default(),
        })
    }

    /// 写回缓存中待写的节点与超级块
    pub fn sync(&self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.write_back_cached()?;
        self.table.lock().commit_super(&*self.dev, self.time())?;
        self.dev.flush()?;
        Ok(())
    }

    /// 写回并丢弃本卷的缓存项，把超级块标记为干净后写回
    ///
    /// 调用者仍持有的引用会脱离缓存，之后的修改不再写回。
    pub fn unmount(self) -> Result<()> {
        if self.read_only {
            self.cache.purge(self.device);
            return Ok(());
        }
        self.write_back_cached()?;
        self.cache.purge(self.device);
        let mut table = self.table.lock();
        table.sb.clean = 1;
        table.commit_super(&*self.dev, self.time())?;
        self.dev.flush()?;
        log::info!("unmounted {:?}", table.sb.mount_path());
        Ok(())
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// 超级块镜像的副本
    pub fn superblock(&self) -> SuperBlock {
        self.table.lock().sb
    }

    pub fn groups(&self) -> Vec<CylinderGroup> {
        self.table.lock().groups.clone()
    }

    /// 汇总计数是否等于各组之和
    pub fn is_consistent(&self) -> bool {
        self.table.lock().is_consistent()
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub(crate) fn now(&self) -> Timespec {
        self.clock.now()
    }

    fn time(&self) -> u64 {
        self.now().sec as u64
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(vfs::Error::ReadOnly.into());
        }
        Ok(())
    }

    pub fn allocate_node(&self) -> Result<NodeId> {
        self.ensure_writable()?;
        self.table.lock().allocate_node(&*self.dev, self.time())
    }

    pub fn allocate_block(&self) -> Result<BlockId> {
        self.ensure_writable()?;
        self.table.lock().allocate_block(&*self.dev, self.time())
    }

    pub(crate) fn note_directory(&self, id: NodeId) -> Result<()> {
        self.table.lock().note_directory(&*self.dev, id, self.time())
    }

    pub fn read_node(&self, id: NodeId) -> Result<Denode> {
        disk::read_node(&*self.dev, &self.translator, id)
    }

    pub fn write_node(&self, id: NodeId, den: &Denode) -> Result<()> {
        self.ensure_writable()?;
        disk::write_node(&*self.dev, &self.translator, id, den)
    }

    pub fn translate_block(&self, id: BlockId) -> Result<u64> {
        self.translator.block_offset(id)
    }

    /// 读取一个完整目录块的回调
    pub(crate) fn reader(&self) -> impl FnMut(u64, &mut [u8]) -> Result<()> + '_ {
        move |addr: u64, buf: &mut [u8]| -> Result<()> {
            self.dev.read_at(addr, buf)?;
            Ok(())
        }
    }

    pub fn enumerate_directory(&self, den: &Denode, cursor: u64, budget: usize) -> Result<Readdir> {
        dir::enumerate(den, self.translator.block_size(), cursor, budget, self.reader())
    }

    pub fn resolve(&self, id: NodeId) -> Result<EnodeRef> {
        self.translator.node_offset(id)?;
        self.cache.resolve(self.device, id, || self.read_node(id))
    }

    /// 归还引用；最后一个引用归还时，先把待写的记录写回再移出缓存
    pub fn release(&self, node: EnodeRef) -> Result<()> {
        self.cache.release(node, |enode| self.write_back(enode))?;
        Ok(())
    }

    /// 折算待更新的时间，记录有改动时写回磁盘
    fn write_back(&self, enode: &Enode) -> Result<()> {
        let mut inner = enode.lock();
        inner.apply_times(self.now(), self.read_only);
        if inner.flags.contains(EnodeFlag::Modified) && !self.read_only {
            disk::write_node(&*self.dev, &self.translator, enode.id(), &inner.den)?;
            inner.flags.remove(EnodeFlag::Modified);
        }
        Ok(())
    }

    fn write_back_cached(&self) -> Result<()> {
        for enode in self.cache.loaded(self.device) {
            self.write_back(&enode)?;
        }
        Ok(())
    }

    pub fn root(&self) -> Result<EnodeRef> {
        self.resolve(NodeId::ROOT)
    }

    pub fn statfs(&self) -> StatFs {
        let sb = self.superblock();
        StatFs {
            block_size: sb.block_size as u64,
            blocks: sb.data_blocks,
            free_blocks: sb.totals.free_blocks,
            files: sb.total_nodes(),
            free_files: sb.totals.free_nodes,
            dirs: sb.totals.dirs,
            name_max: NAME_MAX,
            fsid: sb.id,
            volume_name: String::from(sb.volume_name()),
            mount_path: String::from(sb.mount_path()),
        }
    }
}

fn geometry_is_sane(sb: &SuperBlock) -> bool {
    let bs = sb.block_size as u64;
    let bits = 8 * bs;
    sb.block_size.is_power_of_two()
        && sb.sector_size.is_power_of_two()
        && bs >= sb.sector_size as u64
        && bs > NODE_SIZE as u64
        && (1..=MAX_GROUPS).contains(&sb.group_count)
        && (NodeId::FIRST_FREE.get()..=bits as u32).contains(&sb.nodes_per_group)
        && (1..=bits as u32).contains(&sb.blocks_per_group)
        && sb.first_group_offset as u64 >= sb.reserved_bytes()
}

impl Drop for EduFileSystem {
    fn drop(&mut self) {
        self.cache.purge(self.device);
    }
}
