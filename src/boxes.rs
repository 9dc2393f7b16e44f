use std::io::Read;

use serde::Serialize;

use crate::decoders::{WalkContext, decode_box};
use crate::error::{Error, Result};
use crate::fourcc::FourCC;
use crate::reader::BodyReader;
use crate::track::TrackRegistry;

/// Decoded box header geometry.
#[derive(Debug, Clone)]
pub struct BoxHeader {
    pub typ: FourCC,
    /// Total size including the header. Already resolved when the stream
    /// declared 0 (extends to the end of the enclosing region).
    pub size: u64,
    /// 8 bytes, 16 with an extended size, +8 with an extended type.
    pub header_size: u64,
}

/// One node of the captured box tree, suitable for printing or JSON
/// output. Field values that matter to extraction live in the
/// [`TrackRegistry`] instead; `summary` is a human-readable digest.
#[derive(Debug, Serialize)]
pub struct BoxNode {
    pub offset: u64,
    pub size: u64,
    pub header_size: u64,
    pub typ: FourCC,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BoxNode>,
}

impl BoxNode {
    /// Depth-first search for the first box of a given type.
    pub fn find(nodes: &[BoxNode], typ: FourCC) -> Option<&BoxNode> {
        for node in nodes {
            if node.typ == typ {
                return Some(node);
            }
            if let Some(hit) = BoxNode::find(&node.children, typ) {
                return Some(hit);
            }
        }
        None
    }

    /// File offset of the first body byte.
    pub fn body_offset(&self) -> u64 {
        self.offset + self.header_size
    }

    /// Body length in bytes.
    pub fn body_size(&self) -> u64 {
        self.size - self.header_size
    }
}

/// Typed view over the box types this crate decodes. Anything else
/// becomes `Unknown` and is skipped, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Ftyp,
    Moov,
    Mvhd,
    Trak,
    Tkhd,
    Edts,
    Elst,
    Mdia,
    Mdhd,
    Hdlr,
    Minf,
    Vmhd,
    Smhd,
    Dinf,
    Dref,
    Stbl,
    Stsd,
    Stts,
    Stss,
    Ctts,
    Stsc,
    Stsz,
    Stco,
    Sgpd,
    Sbgp,
    Udta,
    Meta,
    Mdat,
    Free,
    Skip,
    Unknown(FourCC),
}

impl From<FourCC> for BoxKind {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => BoxKind::Ftyp,
            b"moov" => BoxKind::Moov,
            b"mvhd" => BoxKind::Mvhd,
            b"trak" => BoxKind::Trak,
            b"tkhd" => BoxKind::Tkhd,
            b"edts" => BoxKind::Edts,
            b"elst" => BoxKind::Elst,
            b"mdia" => BoxKind::Mdia,
            b"mdhd" => BoxKind::Mdhd,
            b"hdlr" => BoxKind::Hdlr,
            b"minf" => BoxKind::Minf,
            b"vmhd" => BoxKind::Vmhd,
            b"smhd" => BoxKind::Smhd,
            b"dinf" => BoxKind::Dinf,
            b"dref" => BoxKind::Dref,
            b"stbl" => BoxKind::Stbl,
            b"stsd" => BoxKind::Stsd,
            b"stts" => BoxKind::Stts,
            b"stss" => BoxKind::Stss,
            b"ctts" => BoxKind::Ctts,
            b"stsc" => BoxKind::Stsc,
            b"stsz" => BoxKind::Stsz,
            b"stco" => BoxKind::Stco,
            b"sgpd" => BoxKind::Sgpd,
            b"sbgp" => BoxKind::Sbgp,
            b"udta" => BoxKind::Udta,
            b"meta" => BoxKind::Meta,
            b"mdat" => BoxKind::Mdat,
            b"free" => BoxKind::Free,
            b"skip" => BoxKind::Skip,
            _ => BoxKind::Unknown(cc),
        }
    }
}

/// Read one box header from the front of `region`.
///
/// Handles the 64-bit extended size (`size == 1`), the implicit
/// to-end-of-region size (`size == 0`), and the 8-byte extended-type
/// field after a `uuid` tag, which is consumed but not exposed. Fails
/// when the declared size does not fit the enclosing region.
pub fn read_box_header(region: &mut BodyReader<'_>) -> Result<BoxHeader> {
    let size32 = region.read_u32()?;
    let typ = region.read_fourcc()?;
    let mut header_size = 8u64;

    let mut size = size32 as u64;
    if size32 == 1 {
        size = region.read_u64()?;
        header_size += 8;
    }
    if &typ.0 == b"uuid" {
        let extended = region.read_hex(8)?;
        log::debug!("uuid box with extended type {extended}");
        header_size += 8;
    }
    if size32 == 0 {
        size = header_size + region.remaining();
    }

    if size < header_size {
        return Err(Error::Format(format!(
            "box `{typ}` declares size {size} smaller than its {header_size}-byte header"
        )));
    }
    if size - header_size > region.remaining() {
        return Err(Error::Format(format!(
            "box `{typ}` size {size} exceeds enclosing region ({} bytes)",
            header_size + region.remaining()
        )));
    }
    Ok(BoxHeader {
        typ,
        size,
        header_size,
    })
}

/// Walk the box sequence filling one region of `bytes_remaining` bytes.
///
/// Each box body is handed to its decoder under an exact byte budget, and
/// the walker verifies the budget came back fully consumed. The loop ends
/// only when the region reaches exactly zero, so a box overrunning the
/// region surfaces as an error rather than a silent stop. `base_offset`
/// is the absolute offset of the region start, carried for the tree and
/// for error context.
pub fn walk(
    r: &mut dyn Read,
    bytes_remaining: u64,
    base_offset: u64,
    ctx: &mut WalkContext,
) -> Result<Vec<BoxNode>> {
    let mut region = BodyReader::new(r, bytes_remaining);
    let mut nodes = Vec::new();
    let mut pos = base_offset;

    while region.remaining() > 0 {
        let hdr = read_box_header(&mut region)?;
        let body_size = hdr.size - hdr.header_size;
        let body_offset = pos + hdr.header_size;

        let mut body = BodyReader::new(&mut region, body_size);
        let decoded =
            decode_box(&hdr, &mut body, body_offset, ctx).map_err(|e| e.in_box(hdr.typ, pos))?;
        if body.remaining() != 0 {
            return Err(Error::Format(format!(
                "decoder left {} of {} body bytes unconsumed",
                body.remaining(),
                body_size
            ))
            .in_box(hdr.typ, pos));
        }

        nodes.push(BoxNode {
            offset: pos,
            size: hdr.size,
            header_size: hdr.header_size,
            typ: hdr.typ,
            summary: decoded.summary,
            children: decoded.children,
        });
        pos += hdr.size;
    }
    Ok(nodes)
}

/// One full parse pass over `size` bytes of container data.
///
/// Returns the captured box tree and the track registry. On any error the
/// registry is discarded; a partially populated one is never exposed.
pub fn parse<R: Read>(r: &mut R, size: u64) -> Result<(Vec<BoxNode>, TrackRegistry)> {
    let mut ctx = WalkContext::default();
    let nodes = walk(r, size, 0, &mut ctx)?;
    Ok((nodes, ctx.into_registry()))
}
