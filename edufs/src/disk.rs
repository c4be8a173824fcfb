//! 以字节偏移读写磁盘结构

use alloc::vec;
use core::mem;

use block_dev::BlockDevice;

use crate::layout::{Denode, Pod, NODE_SIZE};
use crate::{NodeId, Result, Translator};

pub fn read_pod<T: Pod>(dev: &dyn BlockDevice, offset: u64) -> Result<T> {
    let mut buf = vec![0u8; mem::size_of::<T>()];
    dev.read_at(offset, &mut buf)?;
    Ok(T::from_bytes(&buf))
}

pub fn write_pod<T: Pod>(dev: &dyn BlockDevice, offset: u64, value: &T) -> Result<()> {
    dev.write_at(offset, value.as_bytes())?;
    Ok(())
}

/// 读出节点记录所在的整个扇区，再从中取出该记录
pub fn read_node(dev: &dyn BlockDevice, tr: &Translator, id: NodeId) -> Result<Denode> {
    let chunk_offset = tr.node_chunk_offset(id)?;
    let at = (tr.node_offset(id)? - chunk_offset) as usize;
    let mut chunk = vec![0u8; tr.sector_size()];
    dev.read_at(chunk_offset, &mut chunk)?;
    log::trace!("read node {id} at {chunk_offset:#x}+{at}");
    Ok(Denode::from_bytes(&chunk[at..at + NODE_SIZE]))
}

/// 读-改-写节点记录所在的扇区，保留相邻记录
pub fn write_node(dev: &dyn BlockDevice, tr: &Translator, id: NodeId, den: &Denode) -> Result<()> {
    let chunk_offset = tr.node_chunk_offset(id)?;
    let at = (tr.node_offset(id)? - chunk_offset) as usize;
    let mut chunk = vec![0u8; tr.sector_size()];
    dev.read_at(chunk_offset, &mut chunk)?;
    chunk[at..at + NODE_SIZE].copy_from_slice(den.as_bytes());
    dev.write_at(chunk_offset, &chunk)?;
    log::trace!("wrote node {id} at {chunk_offset:#x}+{at}");
    Ok(())
}
