//! Offline extractor for JFFS2 (Journalling Flash File System v2) images.
//!
//! Given a byte image that may contain one or more JFFS2 filesystem
//! instances -- possibly concatenated, possibly of mixed endianness -- this
//! crate reconstructs the directory hierarchy and file contents onto a
//! host filesystem. Argument parsing and destination setup are the CLI
//! binary's job; this library only needs a byte slice and a destination
//! root (see [`driver::extract_all`]).

pub mod compress;
pub mod crc;
pub mod driver;
pub mod endian;
pub mod error;
pub mod materialize;
pub mod node;
pub mod scanner;

pub use driver::{extract_all, ExtractSummary};
pub use error::{Error, Result};

#[cfg(test)]
mod integration_tests {
    use std::fs;

    use crate::crc::mtd_crc;
    use crate::driver::extract_all;
    use crate::node::MAGIC;

    fn push_header(node: &mut Vec<u8>, nodetype: u16) {
        node.extend_from_slice(&MAGIC.to_le_bytes());
        node.extend_from_slice(&nodetype.to_le_bytes());
        node.extend_from_slice(&0u32.to_le_bytes()); // totlen placeholder
        node.extend_from_slice(&0u32.to_le_bytes()); // hdr_crc placeholder
    }

    fn finish_header(node: &mut [u8]) {
        let totlen = node.len() as u32;
        node[4..8].copy_from_slice(&totlen.to_le_bytes());
        let hdr_crc = mtd_crc(&node[0..8]);
        node[8..12].copy_from_slice(&hdr_crc.to_le_bytes());
    }

    fn dirent_node(pino: u32, version: u32, ino: u32, name: &[u8]) -> Vec<u8> {
        let mut node = Vec::new();
        push_header(&mut node, 0xE001);
        node.extend_from_slice(&pino.to_le_bytes());
        node.extend_from_slice(&version.to_le_bytes());
        node.extend_from_slice(&ino.to_le_bytes());
        node.extend_from_slice(&0u32.to_le_bytes()); // mctime
        node.push(name.len() as u8);
        node.push(8); // DT_REG
        node.extend_from_slice(&0u16.to_le_bytes()); // unused
        let node_crc = mtd_crc(&node[0..32]);
        node.extend_from_slice(&node_crc.to_le_bytes());
        let name_crc = mtd_crc(name);
        node.extend_from_slice(&name_crc.to_le_bytes());
        node.extend_from_slice(name);
        finish_header(&mut node);
        node
    }

    fn inode_node(
        ino: u32,
        version: u32,
        mode: u32,
        data_offset: u32,
        compr: u8,
        data: &[u8],
        dsize: u32,
    ) -> Vec<u8> {
        let mut node = Vec::new();
        push_header(&mut node, 0xE002);
        node.extend_from_slice(&ino.to_le_bytes());
        node.extend_from_slice(&version.to_le_bytes());
        node.extend_from_slice(&mode.to_le_bytes());
        node.extend_from_slice(&0u16.to_le_bytes()); // uid
        node.extend_from_slice(&0u16.to_le_bytes()); // gid
        node.extend_from_slice(&dsize.to_le_bytes()); // isize
        node.extend_from_slice(&0u32.to_le_bytes()); // atime
        node.extend_from_slice(&0u32.to_le_bytes()); // mtime
        node.extend_from_slice(&0u32.to_le_bytes()); // ctime
        node.extend_from_slice(&data_offset.to_le_bytes());
        node.extend_from_slice(&(data.len() as u32).to_le_bytes()); // csize
        node.extend_from_slice(&dsize.to_le_bytes());
        node.push(compr);
        node.push(compr); // usercompr
        node.extend_from_slice(&0u16.to_le_bytes()); // flags
        let data_crc = mtd_crc(data);
        node.extend_from_slice(&data_crc.to_le_bytes());
        let node_crc = mtd_crc(&node[0..60]);
        node.extend_from_slice(&node_crc.to_le_bytes());
        node.extend_from_slice(data);
        finish_header(&mut node);
        node
    }

    const S_IFREG: u32 = 0o100000;
    const S_IFLNK: u32 = 0o120000;

    #[test]
    fn single_uncompressed_file_end_to_end() {
        let mut image = dirent_node(1, 1, 2, b"hello");
        image.extend_from_slice(&inode_node(2, 1, S_IFREG | 0o644, 0, 0, b"world", 5));

        let dir = tempfile::tempdir().unwrap();
        let summary = extract_all(&image, dir.path());
        assert_eq!(summary.filesystem_count, 1);

        let contents = fs::read(dir.path().join("fs_1").join("hello")).unwrap();
        assert_eq!(contents, b"world");

        let mode = fs::metadata(dir.path().join("fs_1").join("hello"))
            .unwrap()
            .permissions();
        use std::os::unix::fs::PermissionsExt;
        assert_eq!(mode.mode() & 0o777, 0o644);
    }

    #[test]
    fn overlayed_writes_last_wins_per_range() {
        let mut image = dirent_node(1, 1, 2, b"overlay");
        image.extend_from_slice(&inode_node(2, 1, S_IFREG | 0o644, 0, 0, b"AAAA", 4));
        image.extend_from_slice(&inode_node(2, 2, S_IFREG | 0o644, 2, 0, b"BB", 4));

        let dir = tempfile::tempdir().unwrap();
        extract_all(&image, dir.path());

        let contents = fs::read(dir.path().join("fs_1").join("overlay")).unwrap();
        assert_eq!(contents, b"AABB");
    }

    #[test]
    fn symlink_extraction() {
        let mut image = dirent_node(1, 1, 2, b"link");
        image.extend_from_slice(&inode_node(2, 1, S_IFLNK, 0, 0, b"target", 6));

        let dir = tempfile::tempdir().unwrap();
        extract_all(&image, dir.path());

        let link_path = dir.path().join("fs_1").join("link");
        let target = fs::read_link(&link_path).unwrap();
        assert_eq!(target, std::path::PathBuf::from("target"));
    }

    #[test]
    fn duplicate_inode_splits_into_two_filesystems() {
        let mut image = dirent_node(1, 1, 5, b"first");
        image.extend_from_slice(&inode_node(5, 1, S_IFREG | 0o644, 0, 0, b"abc", 3));
        image.extend_from_slice(&dirent_node(1, 1, 6, b"unrelated"));
        image.extend_from_slice(&dirent_node(1, 1, 5, b"second"));
        image.extend_from_slice(&inode_node(5, 1, S_IFREG | 0o644, 0, 0, b"xyz", 3));

        let dir = tempfile::tempdir().unwrap();
        let summary = extract_all(&image, dir.path());
        assert_eq!(summary.filesystem_count, 2);

        assert!(dir.path().join("fs_1").join("first").exists());
        assert!(dir.path().join("fs_2").join("second").exists());
    }

    #[test]
    fn random_bytes_produce_no_filesystems() {
        let image: Vec<u8> = (0..(1024 * 1024)).map(|i| (i * 37 % 256) as u8).collect();
        let dir = tempfile::tempdir().unwrap();
        let summary = extract_all(&image, dir.path());
        assert_eq!(summary.filesystem_count, 0);
    }
}
