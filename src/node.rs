//! JFFS2 node layouts: the common header and the five typed bodies this
//! crate decodes (`DIRENT`, `INODE`, `XATTR`, `XREF`, `SUMMARY`).

use crate::crc::mtd_crc;
use crate::endian::{Cursor, Endian};

pub const MAGIC: u16 = 0x1985;
pub const HEADER_LEN: usize = 12;

pub const NODETYPE_DIRENT: u16 = 0xE001;
pub const NODETYPE_INODE: u16 = 0xE002;
pub const NODETYPE_CLEANMARKER: u16 = 0x2003;
pub const NODETYPE_PADDING: u16 = 0x2004;
pub const NODETYPE_SUMMARY: u16 = 0x2006;
pub const NODETYPE_XATTR: u16 = 0xE008;
pub const NODETYPE_XREF: u16 = 0xE009;

/// The 12-byte common header shared by every JFFS2 node.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub nodetype: u16,
    pub totlen: u32,
    pub hdr_crc_ok: bool,
}

impl Header {
    /// Decodes the header at the start of `buf` and checks `hdr_crc`
    /// against the preceding 8 bytes. Returns `None` only on a short
    /// buffer; a bad CRC is reported via `hdr_crc_ok`, not `None`, so
    /// callers can distinguish "too short to judge" from "rejected".
    pub fn decode(buf: &[u8], endian: Endian) -> Option<Header> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let magic = endian.read_u16(&buf[0..2]);
        if magic != MAGIC {
            return None;
        }
        let nodetype = endian.read_u16(&buf[2..4]);
        let totlen = endian.read_u32(&buf[4..8]);
        let hdr_crc = endian.read_u32(&buf[8..12]);
        let hdr_crc_ok = mtd_crc(&buf[0..8]) == hdr_crc;
        Some(Header { nodetype, totlen, hdr_crc_ok })
    }
}

/// Pads `n` up to the next 4-byte boundary.
pub fn pad4(n: u32) -> u32 {
    (n + 3) & !3
}

#[derive(Debug, Clone)]
pub struct Dirent {
    pub offset: usize,
    pub pino: u32,
    pub version: u32,
    pub ino: u32,
    pub mctime: u32,
    pub dtype: u8,
    pub name: Vec<u8>,
    pub node_crc_ok: bool,
    pub name_crc_ok: bool,
}

impl Dirent {
    /// `node` is the full node slice (header included), already clamped to
    /// `totlen` bytes by the scanner.
    pub fn decode(node: &[u8], offset: usize, endian: Endian) -> Option<Dirent> {
        let mut c = Cursor::new(node, endian);
        c.skip(HEADER_LEN)?;
        let pino = c.u32()?;
        let version = c.u32()?;
        let ino = c.u32()?;
        let mctime = c.u32()?;
        let nsize = c.u8()?;
        let dtype = c.u8()?;
        c.skip(2)?; // unused
        let node_crc = c.u32()?;
        let name_crc = c.u32()?;
        let name = c.bytes(nsize as usize)?.to_vec();

        let node_crc_ok = mtd_crc(&node[0..32]) == node_crc;
        let name_crc_ok = mtd_crc(&name) == name_crc;

        Some(Dirent {
            offset,
            pino,
            version,
            ino,
            mctime,
            dtype,
            name,
            node_crc_ok,
            name_crc_ok,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Inode {
    pub offset: usize,
    pub ino: u32,
    pub version: u32,
    pub mode: u32,
    pub uid: u16,
    pub gid: u16,
    pub isize_: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    /// Byte offset within the file where this node's data belongs.
    pub data_offset: u32,
    pub csize: u32,
    pub dsize: u32,
    pub compr: u8,
    pub usercompr: u8,
    pub flags: u16,
    pub data_crc_ok: bool,
    pub node_crc_ok: bool,
    /// Decompressed payload, or a deterministic placeholder (empty, or the
    /// raw compressed bytes) when decompression failed.
    pub data: Vec<u8>,
}

impl Inode {
    pub fn decode(node: &[u8], offset: usize, endian: Endian) -> Option<(Inode, &[u8])> {
        let mut c = Cursor::new(node, endian);
        c.skip(HEADER_LEN)?;
        let ino = c.u32()?;
        let version = c.u32()?;
        let mode = c.u32()?;
        let uid = c.u16()?;
        let gid = c.u16()?;
        let isize_ = c.u32()?;
        let atime = c.u32()?;
        let mtime = c.u32()?;
        let ctime = c.u32()?;
        let data_offset = c.u32()?;
        let csize = c.u32()?;
        let dsize = c.u32()?;
        let compr = c.u8()?;
        let usercompr = c.u8()?;
        let flags = c.u16()?;
        let data_crc = c.u32()?;
        let node_crc = c.u32()?;
        let payload = c.bytes(csize as usize)?;

        let node_crc_ok = mtd_crc(&node[0..60]) == node_crc;
        let data_crc_ok = mtd_crc(payload) == data_crc;

        let inode = Inode {
            offset,
            ino,
            version,
            mode,
            uid,
            gid,
            isize_,
            atime,
            mtime,
            ctime,
            data_offset,
            csize,
            dsize,
            compr,
            usercompr,
            flags,
            data_crc_ok,
            node_crc_ok,
            data: Vec::new(),
        };
        Some((inode, payload))
    }
}

/// A catalogued but non-driving node: summary, xattr, or xref.
#[derive(Debug, Clone)]
pub struct Catalogued {
    pub offset: usize,
    pub nodetype: u16,
    pub raw: Vec<u8>,
}
