//! Joins directory entries with inode version chains into a coherent tree
//! and writes directories, symlinks, regular files, and device nodes to a
//! destination root.

use std::collections::HashMap;
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::warn;

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::node::{Dirent, Inode};
use crate::scanner::LogicalFilesystem;

const MAX_PATH_DEPTH: usize = 100;

const S_IFMT: u32 = 0o170000;
const S_IFSOCK: u32 = 0o140000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFBLK: u32 = 0o060000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFIFO: u32 = 0o010000;

/// Materializes one logical filesystem into `dest_root`. I/O and encoding
/// errors are caught per dirent, logged, and never abort the rest of the
/// tree.
pub fn materialize(fs_: &LogicalFilesystem, dest_root: &Path) {
    let node_dict = build_node_dict(&fs_.dirents);
    let version_chains = build_version_chains(&fs_.inodes);
    let endian = fs_.endian.unwrap_or(Endian::Little);

    for dirent in &fs_.dirents {
        if let Err(e) = materialize_one(dirent, &node_dict, &version_chains, dest_root, endian) {
            warn!(
                "skipping dirent '{}' (ino {}): {}",
                String::from_utf8_lossy(&dirent.name),
                dirent.ino,
                e
            );
        }
    }
}

/// Phase A: `ino -> dirent` naming it. First writer wins; a later dirent
/// claiming an already-mapped `ino` is logged and dropped from the map
/// (its own entry in `fs.dirents` is still visited and still written).
fn build_node_dict(dirents: &[Dirent]) -> HashMap<u32, &Dirent> {
    let mut map = HashMap::new();
    for dirent in dirents {
        if let Some(existing) = map.get(&dirent.ino) {
            let existing: &Dirent = existing;
            if existing.offset != dirent.offset {
                warn!(
                    "ino {} already named by dirent at {:#x}; keeping first, dropping dirent at {:#x} from the parent map",
                    dirent.ino, existing.offset, dirent.offset
                );
            }
            continue;
        }
        map.insert(dirent.ino, dirent);
    }
    map
}

/// Inode records attached to their owning `ino`, preserving scan order.
fn build_version_chains(inodes: &[Inode]) -> HashMap<u32, Vec<&Inode>> {
    let mut map: HashMap<u32, Vec<&Inode>> = HashMap::new();
    for inode in inodes {
        map.entry(inode.ino).or_default().push(inode);
    }
    map
}

/// Phase B: walks the `pino` chain through `node_dict`, reversing it into a
/// root-to-leaf path. A `pino` absent from the map is the implicit root.
fn resolve_path(node_dict: &HashMap<u32, &Dirent>, dirent: &Dirent) -> Result<PathBuf> {
    let mut components: Vec<&[u8]> = vec![&dirent.name];
    let mut pino = dirent.pino;

    for _ in 0..MAX_PATH_DEPTH {
        match node_dict.get(&pino) {
            None => {
                let mut path = PathBuf::new();
                for comp in components.iter().rev() {
                    let s = std::str::from_utf8(comp)
                        .map_err(|_| Error::Encoding(comp.to_vec()))?;
                    path.push(s);
                }
                return Ok(path);
            }
            Some(parent) => {
                components.push(&parent.name);
                pino = parent.pino;
            }
        }
    }

    Err(Error::Corruption {
        offset: dirent.offset,
        detail: "pino chain exceeds maximum resolution depth".to_string(),
    })
}

fn materialize_one(
    dirent: &Dirent,
    node_dict: &HashMap<u32, &Dirent>,
    version_chains: &HashMap<u32, Vec<&Inode>>,
    dest_root: &Path,
    endian: Endian,
) -> Result<()> {
    let rel_path = resolve_path(node_dict, dirent)?;
    let out_path = dest_root.join(&rel_path);
    let chain = version_chains.get(&dirent.ino).map(Vec::as_slice).unwrap_or(&[]);

    let Some(first) = chain.first() else {
        // An unlink marker (ino == 0) or an orphaned dirent with no inode
        // records: nothing to materialize.
        return Ok(());
    };

    match first.mode & S_IFMT {
        S_IFDIR => create_dir(&out_path),
        S_IFLNK => create_symlink(&out_path, first),
        S_IFREG => create_regular_file(&out_path, chain, first.mode),
        S_IFCHR | S_IFBLK => create_device(&out_path, first, endian),
        S_IFIFO | S_IFSOCK => {
            warn!("skipping FIFO/socket dirent '{}'", rel_path.display());
            Ok(())
        }
        other => {
            warn!(
                "skipping dirent '{}' with unrecognized mode {:#o}",
                rel_path.display(),
                other
            );
            Ok(())
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.display().to_string(),
        source,
    }
}

fn create_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| io_err(path, e))
}

fn create_symlink(path: &Path, first: &Inode) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        return Ok(());
    }
    ensure_parent(path)?;
    let target = std::str::from_utf8(&first.data)
        .map_err(|_| Error::Encoding(first.data.clone()))?;
    std::os::unix::fs::symlink(target, path).map_err(|e| io_err(path, e))
}

fn create_regular_file(path: &Path, chain: &[&Inode], mode: u32) -> Result<()> {
    ensure_parent(path)?;
    let mut file = fs::File::create(path).map_err(|e| io_err(path, e))?;
    for inode in chain {
        file.seek(SeekFrom::Start(inode.data_offset as u64))
            .map_err(|e| io_err(path, e))?;
        file.write_all(&inode.data).map_err(|e| io_err(path, e))?;
    }
    let perms = fs::Permissions::from_mode(mode & 0o7777);
    fs::set_permissions(path, perms).map_err(|e| io_err(path, e))
}

fn create_device(path: &Path, first: &Inode, endian: Endian) -> Result<()> {
    ensure_parent(path)?;
    let Some((major, minor)) = decode_device_id(first, endian) else {
        warn!("device dirent '{}' has unrecognized id payload size", path.display());
        return Ok(());
    };

    let kind = if first.mode & S_IFMT == S_IFCHR {
        nix::sys::stat::SFlag::S_IFCHR
    } else {
        nix::sys::stat::SFlag::S_IFBLK
    };
    let perm = nix::sys::stat::Mode::from_bits_truncate(first.mode & 0o7777);
    let dev = nix::sys::stat::makedev(major as u64, minor as u64);

    nix::sys::stat::mknod(path, kind, perm, dev)
        .map_err(|e| io_err(path, std::io::Error::from_raw_os_error(e as i32)))
}

/// Decodes the device id payload per §4.6: a 4-byte "new id" or a 2-byte
/// "old id", disambiguated by the inode's declared `dsize`.
fn decode_device_id(inode: &Inode, endian: Endian) -> Option<(u32, u32)> {
    match inode.dsize {
        4 => {
            if inode.data.len() < 4 {
                return None;
            }
            let id = endian.read_u32(&inode.data[0..4]);
            let major = (id & 0xFFF00) >> 8;
            let minor = (id & 0xFF) | ((id >> 12) & 0xFFF00);
            Some((major, minor))
        }
        2 => {
            if inode.data.len() < 2 {
                return None;
            }
            let id = endian.read_u16(&inode.data[0..2]) as u32;
            let major = (id >> 8) & 0xFF;
            let minor = id & 0xFF;
            Some((major, minor))
        }
        _ => None,
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Dirent;

    fn dirent(offset: usize, pino: u32, ino: u32, name: &str) -> Dirent {
        Dirent {
            offset,
            pino,
            version: 1,
            ino,
            mctime: 0,
            dtype: 0,
            name: name.as_bytes().to_vec(),
            node_crc_ok: true,
            name_crc_ok: true,
        }
    }

    #[test]
    fn resolve_path_joins_ancestor_chain() {
        let root_child = dirent(0, 1, 10, "etc");
        let leaf = dirent(1, 10, 11, "passwd");
        let mut map = HashMap::new();
        map.insert(10u32, &root_child);

        let path = resolve_path(&map, &leaf).unwrap();
        assert_eq!(path, PathBuf::from("etc/passwd"));
    }

    #[test]
    fn resolve_path_direct_child_of_root() {
        let leaf = dirent(0, 1, 2, "hello");
        let map: HashMap<u32, &Dirent> = HashMap::new();
        let path = resolve_path(&map, &leaf).unwrap();
        assert_eq!(path, PathBuf::from("hello"));
    }

    #[test]
    fn overlayed_inode_writes_take_last_writer_per_range() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("overlay_test");

        let first = Inode {
            offset: 0,
            ino: 2,
            version: 1,
            mode: S_IFREG | 0o644,
            uid: 0,
            gid: 0,
            isize_: 4,
            atime: 0,
            mtime: 0,
            ctime: 0,
            data_offset: 0,
            csize: 4,
            dsize: 4,
            compr: 0,
            usercompr: 0,
            flags: 0,
            data_crc_ok: true,
            node_crc_ok: true,
            data: b"AAAA".to_vec(),
        };
        let mut second = first.clone();
        second.data_offset = 2;
        second.data = b"BB".to_vec();

        create_regular_file(&out_path, &[&first, &second], S_IFREG | 0o644).unwrap();
        let contents = fs::read(&out_path).unwrap();
        assert_eq!(contents, b"AABB");
    }
}
