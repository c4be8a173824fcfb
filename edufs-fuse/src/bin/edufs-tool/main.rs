mod cli;

use std::error::Error;
use std::fs::{self, File};
use std::io::Read;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use block_dev::BlockDevice;
use clap::Parser;
use edufs::layout::{CylinderGroup, SuperBlock};
use edufs::{Clock, DeviceId, DiskGeometry, EduFileSystem, Enode, FormatOptions, MountOptions};
use edufs_fuse::BlockFile;
use typed_bytesize::ByteSizeIec;
use vfs::{FileKind, Permission, Timespec};

use self::cli::{Cli, Command, FormatArgs, ImageArgs};

type Result<T = ()> = std::result::Result<T, Box<dyn Error>>;

#[derive(Debug)]
struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timespec {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timespec {
            sec: elapsed.as_secs() as u32,
            nsec: elapsed.subsec_nanos(),
        }
    }
}

fn main() -> Result {
    env_logger::init();

    match Cli::parse().command {
        Command::Format(args) => format(args),
        Command::Pack { image, source } => pack(&image, &source),
        Command::Ls { image, path } => ls(&image, &path),
        Command::Info { image } => info(&image),
    }
}

fn format(args: FormatArgs) -> Result {
    let now = SystemClock.now();
    let geo = DiskGeometry {
        capacity: ByteSizeIec::mib(args.size_mib).0,
        sector_size: args.image.sector_size,
        sectors_per_track: args.sectors_per_track,
        heads: args.heads,
    };
    let opts = FormatOptions::default()
        .groups(args.groups)
        .volume_name(&args.volume_name)
        .time(now.sec)
        .seed(((now.sec as u64) << 32) | now.nsec as u64);

    if args.dry_run {
        let plan = edufs::plan(&geo, opts.groups, opts.block_size)?;
        let (sb, groups) = edufs::build_layout(&geo, &plan, &opts);
        report(&sb, &groups, args.verbose);
        return Ok(());
    }

    let dev = BlockFile::create(&args.image.image, geo.capacity, geo.sector_size as usize)?;
    let sb = EduFileSystem::format(&dev, &geo, &opts)?;
    let (_, groups) = EduFileSystem::load(&dev)?;
    report(&sb, &groups, args.verbose);
    Ok(())
}

fn report(sb: &SuperBlock, groups: &[CylinderGroup], verbose: bool) {
    if verbose {
        println!("{sb}");
        for cg in groups {
            println!("{cg}");
        }
        return;
    }
    println!(
        "{} groups of {} cylinders: {} nodes and {} blocks per group",
        sb.group_count, sb.cylinders_per_group, sb.nodes_per_group, sb.blocks_per_group
    );
    for cg in groups {
        println!("cg {}: {:#x}..{:#x}", cg.index, cg.offset, cg.next);
    }
}

fn mount(args: &ImageArgs, read_only: bool) -> Result<EduFileSystem> {
    let dev: Arc<dyn BlockDevice> =
        Arc::new(BlockFile::open(&args.image, args.sector_size as usize, !read_only)?);
    let path = args.image.to_string_lossy();
    let opts = MountOptions::new(DeviceId::new(0))
        .path(&path)
        .read_only(read_only)
        .clock(Arc::new(SystemClock));
    Ok(EduFileSystem::mount(dev, opts)?)
}

fn pack(image: &ImageArgs, source: &std::path::Path) -> Result {
    let fs = mount(image, false)?;
    let root = fs.root()?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            log::warn!("skipping non-UTF-8 name {name:?}");
            continue;
        };

        let mut data = Vec::new();
        File::open(entry.path())?.read_to_end(&mut data)?;
        let written = pack_file(&fs, &root, name, &data)?;
        if written < data.len() {
            log::warn!("{name}: only {written} of {} bytes fit", data.len());
        }
    }

    fs.release(root)?;
    fs.unmount()?;
    Ok(())
}

/// 在根目录下建一个普通文件，超出最大文件大小的部分截掉
fn pack_file(fs: &EduFileSystem, root: &Enode, name: &str, data: &[u8]) -> Result<usize> {
    let perm = Permission::OwnerRead | Permission::OwnerWrite | Permission::GroupRead | Permission::OtherRead;
    let fit = data.len().min(fs.superblock().max_file_size as usize);
    let node = fs.create(root, name, FileKind::Regular, perm, 0, 0)?;
    let written = fs.write_at(&node, 0, &data[..fit]);
    log::info!("packed {name:?} as node {}", node.id());
    fs.release(node)?;
    Ok(written?)
}

fn ls(image: &ImageArgs, path: &str) -> Result {
    let fs = mount(image, true)?;
    let dir = fs.find(path)?;
    let mut cursor = 0;
    loop {
        let page = fs.readdir(&dir, cursor, 4096)?;
        for entry in &page.entries {
            let node = fs.resolve(edufs::NodeId::new(entry.inode as u32))?;
            let st = fs.stat(&node)?;
            fs.release(node)?;
            println!("{:>6} {:>4} {:>8} {}", entry.inode, st.nlink, st.size, entry.name);
        }
        cursor = page.cursor;
        if page.eof {
            break;
        }
    }
    fs.release(dir)?;
    Ok(())
}

fn info(image: &ImageArgs) -> Result {
    let fs = mount(image, true)?;
    println!("{}", fs.superblock());
    for cg in fs.groups() {
        println!("{cg}");
    }
    let st = fs.statfs();
    println!(
        "{}: {}/{} blocks free, {}/{} nodes free, {} directories",
        st.volume_name, st.free_blocks, st.blocks, st.free_files, st.files, st.dirs
    );
    if !fs.is_consistent() {
        println!("summary counts disagree with the cylinder groups");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;
    use edufs::FixedClock;

    use super::*;

    #[test]
    fn oversized_files_are_truncated() {
        let dev = RamDisk::new(1 << 20, 512);
        let geo = DiskGeometry::from_device(&dev, 32, 2);
        EduFileSystem::format(&dev, &geo, &FormatOptions::default()).unwrap();
        let clock = Arc::new(FixedClock(Timespec { sec: 42, nsec: 0 }));
        let fs = EduFileSystem::mount(Arc::new(dev), MountOptions::new(DeviceId::new(1)).clock(clock)).unwrap();
        let root = fs.root().unwrap();

        let max = fs.superblock().max_file_size as usize;
        let data = vec![0x5Au8; max + 100];
        assert_eq!(max, pack_file(&fs, &root, "big", &data).unwrap());

        let node = fs.find("/big").unwrap();
        assert_eq!(max as u64, fs.stat(&node).unwrap().size);
        let mut tail = [0u8; 4];
        fs.read_at(&node, max as u64 - 4, &mut tail).unwrap();
        assert_eq!([0x5A; 4], tail);
    }
}
