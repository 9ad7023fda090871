//! Walks a byte image, locates candidate nodes via the magic number,
//! validates header CRCs, classifies by node type, and accumulates typed
//! node lists per logical filesystem. A duplicate `ino` among dirents
//! starts a new logical filesystem.

use std::collections::HashSet;

use log::{debug, trace, warn};

use crate::compress;
use crate::endian::Endian;
use crate::error::Error;
use crate::node::{
    self, Catalogued, Dirent, Header, Inode, HEADER_LEN, NODETYPE_CLEANMARKER, NODETYPE_DIRENT,
    NODETYPE_INODE, NODETYPE_PADDING, NODETYPE_SUMMARY, NODETYPE_XATTR, NODETYPE_XREF,
};

/// One logical filesystem: a group of nodes the scanner treats as a single
/// mount image. Endianness is constant across everything it holds.
#[derive(Debug, Default)]
pub struct LogicalFilesystem {
    pub endian: Option<Endian>,
    pub dirents: Vec<Dirent>,
    pub inodes: Vec<Inode>,
    pub xattrs: Vec<Catalogued>,
    pub xrefs: Vec<Catalogued>,
    pub summaries: Vec<Catalogued>,
}

impl LogicalFilesystem {
    fn new(endian: Endian) -> Self {
        LogicalFilesystem {
            endian: Some(endian),
            ..Default::default()
        }
    }
}

/// Scans `image` under `endian`, returning every logical filesystem found
/// (including ones with zero dirents; the driver filters those out).
pub fn scan(image: &[u8], endian: Endian) -> Vec<LogicalFilesystem> {
    if image.len() < HEADER_LEN {
        return Vec::new();
    }

    let needle = endian.magic_bytes(node::MAGIC);
    let last_valid = image.len() - HEADER_LEN;

    let mut filesystems = vec![LogicalFilesystem::new(endian)];
    let mut seen_inos: HashSet<u32> = HashSet::new();

    let mut pos = 0usize;
    while let Some(candidate) = find_needle(image, pos, last_valid, needle) {
        let header_buf = &image[candidate..candidate + HEADER_LEN];
        let header = match Header::decode(header_buf, endian) {
            Some(h) => h,
            None => {
                trace!("{}", Error::Structural { offset: candidate });
                pos = candidate + 1;
                continue;
            }
        };

        if !header.hdr_crc_ok {
            trace!("{}, advancing one byte", Error::Structural { offset: candidate });
            pos = candidate + 1;
            continue;
        }

        // totlen is trusted only after the header CRC passes, and even then
        // only once it's checked against what's actually left in the image
        // -- a forged totlen near u32::MAX must neither walk decoding off
        // the end of the buffer nor overflow the pad-to-4 arithmetic below.
        let totlen = header.totlen as usize;
        if totlen < HEADER_LEN || candidate.checked_add(totlen).is_none_or(|end| end > image.len())
        {
            warn!(
                "node at {:#x} claims totlen {} beyond buffer, skipping body",
                candidate, totlen
            );
            pos = candidate + 1;
            continue;
        }

        let next = candidate + node::pad4(header.totlen) as usize;
        let body = &image[candidate..candidate + totlen];
        let fs = filesystems.last_mut().expect("at least one filesystem");

        match header.nodetype {
            NODETYPE_DIRENT => {
                match Dirent::decode(body, candidate, endian) {
                    Some(dirent) => {
                        if !dirent.node_crc_ok {
                            warn!("dirent at {:#x}: node_crc mismatch", candidate);
                        }
                        if !dirent.name_crc_ok {
                            warn!("dirent at {:#x}: name_crc mismatch", candidate);
                        }

                        if seen_inos.contains(&dirent.ino) {
                            debug!(
                                "duplicate ino {} among dirents, starting new logical filesystem",
                                dirent.ino
                            );
                            seen_inos.clear();
                            seen_inos.insert(dirent.ino);
                            let mut new_fs = LogicalFilesystem::new(endian);
                            new_fs.dirents.push(dirent);
                            filesystems.push(new_fs);
                        } else {
                            seen_inos.insert(dirent.ino);
                            fs.dirents.push(dirent);
                        }
                    }
                    None => warn!("dirent at {:#x}: truncated, dropping", candidate),
                }
            }
            NODETYPE_INODE => match Inode::decode(body, candidate, endian) {
                Some((mut inode, payload)) => {
                    if !inode.node_crc_ok {
                        warn!("inode at {:#x}: node_crc mismatch", candidate);
                    }
                    if !inode.data_crc_ok {
                        warn!("inode at {:#x}: data_crc mismatch", candidate);
                    }

                    match compress::decompress(inode.compr, payload, inode.dsize as usize) {
                        Ok(data) => {
                            if data.len() != inode.dsize as usize {
                                warn!(
                                    "inode at {:#x}: decompressed {} bytes, expected dsize {}",
                                    candidate,
                                    data.len(),
                                    inode.dsize
                                );
                            }
                            inode.data = data;
                        }
                        Err(e) => {
                            warn!("inode at {:#x}: {}", candidate, e);
                            // Deterministic placeholder that keeps later offsets
                            // consistent: zero-fill rather than drop the node.
                            inode.data = vec![0u8; inode.dsize as usize];
                        }
                    }

                    fs.inodes.push(inode);
                }
                None => warn!("inode at {:#x}: truncated, dropping", candidate),
            },
            NODETYPE_XATTR => fs.xattrs.push(Catalogued {
                offset: candidate,
                nodetype: header.nodetype,
                raw: body.to_vec(),
            }),
            NODETYPE_XREF => fs.xrefs.push(Catalogued {
                offset: candidate,
                nodetype: header.nodetype,
                raw: body.to_vec(),
            }),
            NODETYPE_SUMMARY => fs.summaries.push(Catalogued {
                offset: candidate,
                nodetype: header.nodetype,
                raw: body.to_vec(),
            }),
            NODETYPE_CLEANMARKER | NODETYPE_PADDING => {}
            other => debug!("skipping node type {:#06x} at {:#x}", other, candidate),
        }

        pos = if next > candidate { next } else { candidate + 1 };
    }

    filesystems
}

fn find_needle(image: &[u8], from: usize, last_valid: usize, needle: [u8; 2]) -> Option<usize> {
    if from > last_valid {
        return None;
    }
    (from..=last_valid).find(|&i| image[i] == needle[0] && image[i + 1] == needle[1])
}
