//! Runs the scanner twice (big-endian, then little-endian) over an image,
//! then materializes each non-empty logical filesystem into its own
//! `fs_N` subdirectory of the destination root.

use std::path::Path;

use log::info;

use crate::endian::Endian;
use crate::materialize;
use crate::scanner::{scan, LogicalFilesystem};

/// Summary of one extraction run.
#[derive(Debug)]
pub struct ExtractSummary {
    pub filesystem_count: usize,
}

/// Scans `image` for JFFS2 nodes under both endiannesses and materializes
/// every non-empty logical filesystem found into `dest_root/fs_N`.
pub fn extract_all(image: &[u8], dest_root: &Path) -> ExtractSummary {
    let mut filesystems = scan(image, Endian::Big);
    filesystems.extend(scan(image, Endian::Little));

    let nonempty: Vec<LogicalFilesystem> = filesystems
        .into_iter()
        .filter(|fs| !fs.dirents.is_empty())
        .collect();

    for (index, fs) in nonempty.iter().enumerate() {
        let name = format!("fs_{}", index + 1);
        let out_dir = dest_root.join(&name);
        info!(
            "materializing {} ({} dirents, {:?} endian) into {}",
            name,
            fs.dirents.len(),
            fs.endian,
            out_dir.display()
        );
        materialize::materialize(fs, &out_dir);
    }

    ExtractSummary {
        filesystem_count: nonempty.len(),
    }
}
