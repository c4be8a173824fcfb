mod common;

use block_dev::BlockDevice;
use edufs::layout::{bitmap, Pod, MAGIC, SLOT_SIZE};
use edufs::{EduFileSystem, Error, FormatOptions, Malformed, NodeId, Translator};
use vfs::{DirEntryType, FileKind};

use common::*;

#[test]
fn four_groups_of_64_mib() {
    let (dev, geo) = large();
    let sb = format(&dev, &geo);
    assert_eq!(MAGIC, sb.magic);
    assert_eq!(4, sb.group_count);
    assert_eq!(4096, sb.block_size);
    assert_eq!(2047, sb.nodes_per_group);
    assert_eq!(3964, sb.blocks_per_group);
    assert_eq!(4 * 2047 - 1, sb.totals.free_nodes);
    assert_eq!(4 * 3964 - 1, sb.totals.free_blocks);
    assert_eq!(1, sb.totals.dirs);
    assert_eq!(12 * 4096, sb.max_file_size);
    assert_eq!("edu", sb.volume_name());
    assert_eq!(1, sb.clean);

    let (_, groups) = EduFileSystem::load(&*dev).unwrap();
    assert_eq!(4, groups.len());
    for (index, cg) in groups.iter().enumerate() {
        assert_eq!(MAGIC, cg.magic);
        assert_eq!(index as u32, cg.index);
        assert_eq!(sb.blocks_per_group, cg.data_blocks);
        assert_eq!(sb.nodes_per_group, cg.nodes);
        assert_eq!(cg.node_map_offset + 4096, cg.node_table_offset);
    }
    assert_eq!(64 * MIB, groups[3].next);
    assert_eq!(1, groups[0].summary.dirs);
    assert_eq!(2046, groups[0].summary.free_nodes);
    assert_eq!(3964, groups[1].summary.free_blocks);
}

#[test]
fn totals_are_group_sums() {
    for (dev, geo) in [small(), medium(), large()] {
        let sb = format(&dev, &geo);
        let (_, groups) = EduFileSystem::load(&*dev).unwrap();
        let free_nodes: u64 = groups.iter().map(|cg| cg.summary.free_nodes as u64).sum();
        let free_blocks: u64 = groups.iter().map(|cg| cg.summary.free_blocks as u64).sum();
        let dirs: u64 = groups.iter().map(|cg| cg.summary.dirs as u64).sum();
        assert_eq!(sb.totals.free_nodes, free_nodes);
        assert_eq!(sb.totals.free_blocks, free_blocks);
        assert_eq!(sb.totals.dirs, dirs);
        assert_eq!(sb.data_blocks, groups.len() as u64 * sb.blocks_per_group as u64);
    }
}

#[test]
fn superblock_round_trip() {
    let (dev, geo) = medium();
    let sb = format(&dev, &geo);
    let (loaded, _) = EduFileSystem::load(&*dev).unwrap();
    assert_eq!(sb, loaded);
    assert_eq!(sb.as_bytes(), &dev.snapshot()[..sb.as_bytes().len()]);
    assert_eq!(T0, sb.id[0]);
}

#[test]
fn root_directory() {
    let (dev, geo) = large();
    let sb = format(&dev, &geo);
    let (_, groups) = EduFileSystem::load(&*dev).unwrap();
    let tr = Translator::new(&sb, &groups);
    assert_eq!(sb.data_blocks, tr.block_count());
    assert_eq!(sb.total_nodes(), tr.node_count());

    let mut map = vec![0u8; 4096];
    dev.read_at(groups[0].node_map_offset, &mut map).unwrap();
    assert_eq!(1 << 5, map[0]);
    assert_eq!(1, bitmap::count_set(&map, 2047));
    dev.read_at(groups[0].block_map_offset, &mut map).unwrap();
    assert_eq!(1 << 7, map[0]);
    dev.read_at(groups[1].node_map_offset, &mut map).unwrap();
    assert!(map.iter().all(|&b| b == 0));

    assert_eq!(Ok(groups[0].node_table_offset + 2 * 256), tr.node_offset(NodeId::ROOT));
    let fs = mount(&dev);
    let root = fs.read_node(NodeId::ROOT).unwrap();
    assert_eq!(Some(FileKind::Directory), root.kind());
    assert_eq!(0o040755, root.mode);
    assert_eq!(2, root.nlink);
    assert_eq!(2 * SLOT_SIZE as u64, root.size);
    assert_eq!(1, root.blocks);
    assert_eq!(groups[0].data_offset, root.direct[0]);
    assert_eq!(Ok(root.direct[0]), fs.translate_block(edufs::BlockId::new(0)));
    assert_eq!(1000, root.uid);

    let dir = fs.enumerate_directory(&root, 0, 4096).unwrap();
    let entries: Vec<_> = dir
        .entries
        .iter()
        .map(|e| (e.inode, e.ty, e.name.as_str()))
        .collect();
    assert_eq!(
        vec![(2, DirEntryType::Directory, "."), (2, DirEntryType::Directory, "..")],
        entries
    );
    assert_eq!(2 * SLOT_SIZE as u64, dir.cursor);
    assert!(dir.eof);
}

#[test]
fn node_table_records() {
    let (dev, geo) = small();
    let sb = format(&dev, &geo);
    let fs = mount(&dev);
    let den = fs.read_node(NodeId::new(5)).unwrap();
    assert_eq!(0, den.mode);
    assert_ne!(0, den.generation);
    assert_eq!(5, den.spare[0]);
    assert_eq!(T0, den.mtime);
    assert_eq!(1000, den.gid);

    let first_of_group_1 = fs.read_node(NodeId::new(sb.nodes_per_group + 1)).unwrap();
    assert_eq!(1, first_of_group_1.spare[0]);
    let last = NodeId::new(sb.group_count * sb.nodes_per_group);
    assert_eq!(Err(Error::NodeOutOfRange(last)), fs.read_node(last));
}

#[test]
fn generations_follow_the_seed() {
    let (a, geo) = small();
    let (b, _) = small();
    let (c, _) = small();
    format(&a, &geo);
    format(&b, &geo);
    edufs::format(&*c, &geo, &options().seed(8)).unwrap();
    assert_eq!(a.snapshot(), b.snapshot());
    assert_ne!(a.snapshot(), c.snapshot());
}

#[test]
fn infeasible_layout_writes_nothing() {
    let (dev, geo) = disk(128 * 1024, 32, 16);
    let err = edufs::format(&*dev, &geo, &options()).unwrap_err();
    assert_eq!(Error::LayoutInfeasible { groups: 4 }, err);
    assert!(dev.snapshot().iter().all(|&b| b == 0));
}

#[test]
fn geometry_must_match_device() {
    let (dev, mut geo) = small();
    geo.capacity *= 2;
    assert_eq!(
        Err(Error::Vfs(vfs::Error::InvalidArgument)),
        edufs::format(&*dev, &geo, &FormatOptions::default())
    );
}

#[test]
fn io_failure_is_propagated() {
    let (dev, geo) = small();
    dev.set_faulty(true);
    assert_eq!(
        Err(Error::Io(block_dev::Error::Device(-5))),
        edufs::format(&*dev, &geo, &options())
    );
}

#[test]
fn load_rejects_bad_magic() {
    let (dev, geo) = small();
    format(&dev, &geo);
    dev.write_at(0, &[0; 4]).unwrap();
    assert_eq!(
        Err(Error::Malformed(Malformed::BadMagic(0))),
        EduFileSystem::load(&*dev).map(|_| ())
    );
}

#[test]
fn load_rejects_bad_group() {
    let (dev, geo) = small();
    format(&dev, &geo);
    let (_, groups) = EduFileSystem::load(&*dev).unwrap();

    // magic位于组头偏移8处
    dev.write_at(groups[2].offset + 8, &[0; 4]).unwrap();
    assert_eq!(
        Err(Error::Malformed(Malformed::BadGroupMagic { index: 2, magic: 0 })),
        EduFileSystem::load(&*dev).map(|_| ())
    );
}

#[test]
fn load_rejects_chain_outside_volume() {
    let (dev, geo) = small();
    format(&dev, &geo);
    let (_, groups) = EduFileSystem::load(&*dev).unwrap();

    let beyond = 4 * MIB;
    dev.write_at(groups[1].offset, &beyond.to_le_bytes()).unwrap();
    assert_eq!(
        Err(Error::Malformed(Malformed::GroupOutOfBounds { index: 1, offset: beyond })),
        EduFileSystem::load(&*dev).map(|_| ())
    );
}

#[test]
fn load_rejects_nonsense_geometry() {
    let (dev, geo) = small();
    let mut sb = format(&dev, &geo);
    sb.group_count = 0;
    dev.write_at(0, sb.as_bytes()).unwrap();
    assert_eq!(
        Err(Error::Malformed(Malformed::BadGeometry)),
        EduFileSystem::load(&*dev).map(|_| ())
    );
}

#[test]
fn empty_device_is_not_a_volume() {
    let (dev, _) = small();
    assert!(matches!(
        EduFileSystem::load(&*dev),
        Err(Error::Malformed(Malformed::BadMagic(0)))
    ));
}
