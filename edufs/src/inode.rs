//! 命名空间与文件数据：在挂载状态之上实现查找、创建与读写

use alloc::vec;

use enumflags2::BitFlags;
use vfs::{DirEntryType, FileKind, Permission, Stat};

use crate::dir::{self, Readdir};
use crate::layout::{validate_name, Denode, DirSlot, Pod, DIRECT_COUNT, INDIRECT_COUNT, SLOT_SIZE};
use crate::{EduFileSystem, Enode, EnodeFlag, EnodeInner, EnodeRef, Error, NodeId, Result};

impl EduFileSystem {
    /// 按`/`分隔的路径从根目录逐级查找
    pub fn find(&self, path: &str) -> Result<EnodeRef> {
        let mut node = self.root()?;
        for name in path.split('/').filter(|name| !name.is_empty()) {
            let next = match self.lookup(&node, name) {
                Ok(Some(id)) => self.resolve(id),
                Ok(None) => Err(vfs::Error::NotFound.into()),
                Err(err) => Err(err),
            };
            self.release(node)?;
            node = next?;
        }
        Ok(node)
    }

    pub fn lookup(&self, dir: &Enode, name: &str) -> Result<Option<NodeId>> {
        let den = dir.denode();
        if !den.is_dir() {
            return Err(vfs::Error::NotADirectory.into());
        }
        let hit = dir::find(&den, self.translator.block_size(), self.reader(), |slot| {
            dir::name_matches(slot, name)
        })?;
        dir.touch(EnodeFlag::Access);
        Ok(hit.map(|(_, slot)| slot.node()))
    }

    pub fn readdir(&self, dir: &Enode, cursor: u64, budget: usize) -> Result<Readdir> {
        let den = dir.denode();
        if !den.is_dir() {
            return Err(vfs::Error::NotADirectory.into());
        }
        let entries = self.enumerate_directory(&den, cursor, budget)?;
        dir.touch(EnodeFlag::Access);
        Ok(entries)
    }

    /// 在`dir`中创建名为`name`的新节点
    ///
    /// 先在父目录中预留槽位，再分配节点；目录还会得到一个含"."与".."的数据块。
    /// 父目录的链接数与目录计数在槽写入之后才更新。
    pub fn create(
        &self,
        dir: &Enode,
        name: &str,
        kind: FileKind,
        perm: BitFlags<Permission>,
        uid: u32,
        gid: u32,
    ) -> Result<EnodeRef> {
        self.ensure_writable()?;
        validate_name(name)?;

        let bs = self.translator.block_size();
        let mut parent = dir.lock();
        if !parent.den.is_dir() {
            return Err(vfs::Error::NotADirectory.into());
        }
        if dir::find(&parent.den, bs, self.reader(), |slot| dir::name_matches(slot, name))?.is_some() {
            return Err(vfs::Error::AlreadyExists.into());
        }

        let pos = self.reserve_slot(&mut parent)?;
        let (id, den) = match self.init_node(dir.id(), kind, perm, uid, gid) {
            Ok(made) => made,
            Err(err) => {
                log::debug!("create {name:?} in {} failed: {err}", dir.id());
                return Err(err);
            }
        };

        let slot = DirSlot::new(id, kind.into(), name)?;
        let lbn = (pos / bs as u64) as usize;
        self.dev
            .write_at(parent.den.direct[lbn] + pos % bs as u64, slot.as_bytes())?;
        parent.den.size = parent.den.size.max(pos + SLOT_SIZE as u64);
        if kind == FileKind::Directory {
            parent.den.nlink += 1;
            self.note_directory(id)?;
        }
        parent.flags |= EnodeFlag::Change | EnodeFlag::Update;
        parent.apply_times(self.now(), false);
        self.write_node(dir.id(), &parent.den)?;
        parent.flags.remove(EnodeFlag::Modified);
        drop(parent);

        log::debug!("created {name:?} ({kind:?}) as node {id} in {}", dir.id());
        Ok(self.cache.insert(self.device, id, den))
    }

    pub fn mkdir(&self, dir: &Enode, name: &str, perm: BitFlags<Permission>, uid: u32, gid: u32) -> Result<EnodeRef> {
        self.create(dir, name, FileKind::Directory, perm, uid, gid)
    }

    /// 找到新槽的位置：优先复用空槽，否则追加到目录末尾
    ///
    /// 追加位置落在未分配的块上时，先为目录分配这一块并挂到记录上；
    /// 之后的步骤失败时，这一块随记录一起写回，仍归目录所有。
    fn reserve_slot(&self, parent: &mut EnodeInner) -> Result<u64> {
        let bs = self.translator.block_size() as u64;
        let den = &mut parent.den;
        if let Some((pos, _)) = dir::find(den, bs as usize, self.reader(), DirSlot::is_empty)? {
            return Ok(pos);
        }
        let pos = den.size;
        let lbn = (pos / bs) as usize;
        if lbn >= DIRECT_COUNT {
            return Err(vfs::Error::FileTooLarge.into());
        }
        if den.direct[lbn] == 0 {
            den.direct[lbn] = self.fresh_block()?;
            den.blocks += 1;
            parent.flags |= EnodeFlag::Modified;
        }
        Ok(pos)
    }

    /// 分配并初始化新节点的记录；目录先分配数据块
    fn init_node(
        &self,
        parent: NodeId,
        kind: FileKind,
        perm: BitFlags<Permission>,
        uid: u32,
        gid: u32,
    ) -> Result<(NodeId, Denode)> {
        let data = match kind {
            FileKind::Directory => Some(self.fresh_block()?),
            _ => None,
        };
        let id = self.allocate_node()?;
        let now = self.now();
        let mut den = self.read_node(id)?;
        den.generation = den.generation.wrapping_add(1).max(1);
        den.set_mode(kind, perm);
        den.nlink = 1;
        den.flags = 0;
        den.size = 0;
        den.direct = [0; DIRECT_COUNT];
        den.indirect = [0; INDIRECT_COUNT];
        den.blocks = 0;
        den.uid = uid;
        den.gid = gid;
        den.set_atime(now);
        den.set_mtime(now);
        den.set_ctime(now);

        if let Some(addr) = data {
            let mut block = vec![0u8; SLOT_SIZE * 2];
            let this = DirSlot::new(id, DirEntryType::Directory, ".")?;
            let up = DirSlot::new(parent, DirEntryType::Directory, "..")?;
            block[..SLOT_SIZE].copy_from_slice(this.as_bytes());
            block[SLOT_SIZE..].copy_from_slice(up.as_bytes());
            self.dev.write_at(addr, &block)?;
            den.direct[0] = addr;
            den.blocks = 1;
            den.size = block.len() as u64;
            den.nlink = 2;
        }
        self.write_node(id, &den)?;
        Ok((id, den))
    }

    /// 分配一块并清零，返回其偏移
    fn fresh_block(&self) -> Result<u64> {
        let id = self.allocate_block()?;
        let addr = self.translate_block(id)?;
        self.dev.write_at(addr, &vec![0u8; self.translator.block_size()])?;
        Ok(addr)
    }

    /// 读到文件末尾为止，空洞读作0
    pub fn read_at(&self, node: &Enode, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let den = node.denode();
        if den.is_dir() {
            return Err(vfs::Error::IsADirectory.into());
        }
        let bs = self.translator.block_size() as u64;
        let end = offset.saturating_add(buf.len() as u64).min(den.size);
        let mut pos = offset;
        let mut done = 0;
        while pos < end {
            let at = pos % bs;
            let len = (bs - at).min(end - pos) as usize;
            let dst = &mut buf[done..done + len];
            match den.direct.get((pos / bs) as usize) {
                Some(&addr) if addr != 0 => self.dev.read_at(addr + at, dst)?,
                _ => dst.fill(0),
            }
            pos += len as u64;
            done += len;
        }
        node.touch(EnodeFlag::Access);
        Ok(done)
    }

    /// 按需分配直接块；超出直接块能表示的大小即失败
    pub fn write_at(&self, node: &Enode, offset: u64, buf: &[u8]) -> Result<usize> {
        self.ensure_writable()?;
        let max = self.superblock().max_file_size;
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= max)
            .ok_or(vfs::Error::FileTooLarge)?;

        let mut inner = node.lock();
        if inner.den.is_dir() {
            return Err(vfs::Error::IsADirectory.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let bs = self.translator.block_size() as u64;
        let mut pos = offset;
        let mut done = 0;
        let mut failure = None;
        while pos < end {
            let lbn = (pos / bs) as usize;
            let at = pos % bs;
            let len = (bs - at).min(end - pos) as usize;
            if inner.den.direct[lbn] == 0 {
                match self.fresh_block() {
                    Ok(addr) => {
                        inner.den.direct[lbn] = addr;
                        inner.den.blocks += 1;
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            if let Err(err) = self.dev.write_at(inner.den.direct[lbn] + at, &buf[done..done + len]) {
                failure = Some(err.into());
                break;
            }
            pos += len as u64;
            done += len;
        }

        // 已写入的部分与新分配的块都要记入节点
        inner.den.size = inner.den.size.max(offset + done as u64);
        inner.flags |= EnodeFlag::Change | EnodeFlag::Update;
        inner.apply_times(self.now(), false);
        self.write_node(node.id(), &inner.den)?;
        inner.flags.remove(EnodeFlag::Modified);
        match failure {
            Some(err) if done == 0 => Err(err),
            _ => Ok(done),
        }
    }

    pub fn stat(&self, node: &Enode) -> Result<Stat> {
        let mut inner = node.lock();
        inner.apply_times(self.now(), self.read_only);
        let den = &inner.den;
        let kind = den.kind().ok_or(Error::Vfs(vfs::Error::NotFound))?;
        Ok(Stat {
            ino: node.id().get() as u64,
            kind,
            perm: den.perm(),
            nlink: den.nlink,
            uid: den.uid,
            gid: den.gid,
            size: den.size,
            blocks: den.blocks as u64,
            block_size: self.translator.block_size() as u64,
            atime: den.atime(),
            mtime: den.mtime(),
            ctime: den.ctime(),
            generation: den.generation,
        })
    }
}
