//! Per-box decoders and the dispatch the walker calls into.
//!
//! Every decoder consumes its whole body budget (directly or via
//! `skip_remaining`), records anything the track registry needs, and
//! returns an optional one-line summary for the tree view.

use crate::boxes::{BoxHeader, BoxKind, BoxNode, walk};
use crate::error::{Error, Result};
use crate::reader::{BodyReader, bits};
use crate::sample_table::expand_time_to_sample;
use crate::track::{MediaKind, TrackBuilder, TrackRegistry};

/// Mutable state threaded through one walk: the registry under
/// construction and the builder of the `trak` subtree currently open,
/// if any.
#[derive(Default)]
pub struct WalkContext {
    registry: TrackRegistry,
    current: Option<TrackBuilder>,
}

impl WalkContext {
    pub fn into_registry(self) -> TrackRegistry {
        self.registry
    }

    /// Apply `f` to the open track builder. Sample-table boxes found
    /// outside a `trak` subtree are decoded but contribute nothing.
    fn with_track(&mut self, f: impl FnOnce(&mut TrackBuilder)) {
        if let Some(builder) = self.current.as_mut() {
            f(builder);
        }
    }
}

/// What a decoder hands back to the walker.
pub struct DecodedBox {
    pub summary: Option<String>,
    pub children: Vec<BoxNode>,
}

impl DecodedBox {
    fn leaf(summary: Option<String>) -> Self {
        Self {
            summary,
            children: Vec::new(),
        }
    }
}

fn read_full_box(r: &mut BodyReader<'_>) -> Result<(u8, u32)> {
    let version = r.read_u8()?;
    let flags = r.read_u24()?;
    Ok((version, flags))
}

/// Upper bound on expanded per-sample vectors whose length is not backed
/// by table bytes (shared-size `stsz`, `stts` run totals).
const MAX_EXPANDED_ENTRIES: u64 = 1 << 24;

/// A declared entry count must be covered by the box body before any
/// allocation sized from it.
fn check_table(r: &BodyReader<'_>, entries: u32, entry_width: u64) -> Result<()> {
    let needed = entries as u64 * entry_width;
    if needed > r.remaining() {
        return Err(Error::Format(format!(
            "table of {entries} entries needs {needed} bytes, {} left in box",
            r.remaining()
        )));
    }
    Ok(())
}

/// Decode one box body. The body reader is scoped to exactly the box
/// body; the walker checks afterwards that nothing was left over.
pub fn decode_box(
    hdr: &BoxHeader,
    r: &mut BodyReader<'_>,
    body_offset: u64,
    ctx: &mut WalkContext,
) -> Result<DecodedBox> {
    match BoxKind::from(hdr.typ) {
        BoxKind::Moov
        | BoxKind::Edts
        | BoxKind::Mdia
        | BoxKind::Minf
        | BoxKind::Dinf
        | BoxKind::Stbl
        | BoxKind::Udta => {
            let n = r.remaining();
            let children = walk(r, n, body_offset, ctx)?;
            Ok(DecodedBox {
                summary: None,
                children,
            })
        }
        BoxKind::Trak => decode_trak(r, body_offset, ctx),
        BoxKind::Meta => {
            // A full box that then contains ordinary children.
            read_full_box(r)?;
            let n = r.remaining();
            let children = walk(r, n, body_offset + 4, ctx)?;
            Ok(DecodedBox {
                summary: None,
                children,
            })
        }
        BoxKind::Ftyp => Ok(DecodedBox::leaf(decode_ftyp(r)?)),
        BoxKind::Mvhd => Ok(DecodedBox::leaf(decode_mvhd(r)?)),
        BoxKind::Tkhd => Ok(DecodedBox::leaf(decode_tkhd(r, ctx)?)),
        BoxKind::Mdhd => Ok(DecodedBox::leaf(decode_mdhd(r)?)),
        BoxKind::Hdlr => Ok(DecodedBox::leaf(decode_hdlr(r)?)),
        BoxKind::Vmhd => Ok(DecodedBox::leaf(decode_vmhd(r, ctx)?)),
        BoxKind::Smhd => Ok(DecodedBox::leaf(decode_smhd(r, ctx)?)),
        BoxKind::Elst => Ok(DecodedBox::leaf(decode_elst(r)?)),
        BoxKind::Dref => Ok(DecodedBox::leaf(decode_dref(r)?)),
        BoxKind::Stsd => Ok(DecodedBox::leaf(decode_stsd(r)?)),
        BoxKind::Stts => Ok(DecodedBox::leaf(decode_stts(r, ctx)?)),
        BoxKind::Stss => Ok(DecodedBox::leaf(decode_stss(r)?)),
        BoxKind::Ctts => Ok(DecodedBox::leaf(decode_ctts(r)?)),
        BoxKind::Stsc => Ok(DecodedBox::leaf(decode_stsc(r, ctx)?)),
        BoxKind::Stsz => Ok(DecodedBox::leaf(decode_stsz(r, ctx)?)),
        BoxKind::Stco => Ok(DecodedBox::leaf(decode_stco(r, ctx)?)),
        BoxKind::Sgpd => Ok(DecodedBox::leaf(decode_sgpd(r)?)),
        BoxKind::Sbgp => Ok(DecodedBox::leaf(decode_sbgp(r)?)),
        BoxKind::Mdat => {
            ctx.registry.set_mdat_offset(body_offset);
            let n = r.remaining();
            r.skip_remaining()?;
            Ok(DecodedBox::leaf(Some(format!("{n} bytes"))))
        }
        BoxKind::Free | BoxKind::Skip => {
            r.skip_remaining()?;
            Ok(DecodedBox::leaf(None))
        }
        BoxKind::Unknown(typ) => {
            log::debug!("skipping unknown box `{typ}` ({} bytes)", r.remaining());
            r.skip_remaining()?;
            Ok(DecodedBox::leaf(None))
        }
    }
}

fn decode_trak(
    r: &mut BodyReader<'_>,
    body_offset: u64,
    ctx: &mut WalkContext,
) -> Result<DecodedBox> {
    // Nested trak boxes are malformed but harmless: the inner one simply
    // shadows the outer builder for the duration of its subtree.
    let parent = ctx.current.replace(TrackBuilder::default());
    let n = r.remaining();
    let walked = walk(r, n, body_offset, ctx);
    let builder = std::mem::replace(&mut ctx.current, parent);
    let children = walked?;

    let mut summary = None;
    if let Some(builder) = builder {
        let track = builder.finish()?;
        summary = Some(format!(
            "track_id={} samples={} chunks={}",
            track.track_id,
            track.sample_count(),
            track.chunk_count()
        ));
        ctx.registry.insert(track);
    }
    Ok(DecodedBox { summary, children })
}

fn decode_ftyp(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    let major = r.read_fourcc()?;
    let minor = r.read_u32()?;
    let mut brands = Vec::new();
    while r.remaining() >= 4 {
        brands.push(r.read_fourcc()?.as_str_lossy());
    }
    r.skip_remaining()?;
    Ok(Some(format!(
        "major={major} minor={minor} brands={}",
        brands.join(",")
    )))
}

fn decode_mvhd(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    let (version, _flags) = read_full_box(r)?;
    let (timescale, duration) = match version {
        1 => {
            r.read_u64()?; // creation time
            r.read_u64()?; // modification time
            let ts = r.read_u32()?;
            (ts, r.read_u64()?)
        }
        0 => {
            r.read_u32()?;
            r.read_u32()?;
            let ts = r.read_u32()?;
            (ts, r.read_u32()? as u64)
        }
        v => return Err(Error::Format(format!("unrecognized mvhd version {v}"))),
    };
    // rate, volume, reserved, matrix, pre_defined, next_track_ID
    r.skip_remaining()?;
    Ok(Some(format!("timescale={timescale} duration={duration}")))
}

fn decode_tkhd(r: &mut BodyReader<'_>, ctx: &mut WalkContext) -> Result<Option<String>> {
    let (version, _flags) = read_full_box(r)?;
    let (track_id, duration) = match version {
        1 => {
            r.read_u64()?;
            r.read_u64()?;
            let id = r.read_u32()?;
            r.read_u32()?; // reserved
            (id, r.read_u64()?)
        }
        0 => {
            r.read_u32()?;
            r.read_u32()?;
            let id = r.read_u32()?;
            r.read_u32()?;
            (id, r.read_u32()? as u64)
        }
        v => return Err(Error::Format(format!("unrecognized tkhd version {v}"))),
    };
    ctx.with_track(|t| t.set_track_id(track_id));
    // layer, alternate group, volume, matrix, width, height
    r.skip_remaining()?;
    Ok(Some(format!("track_id={track_id} duration={duration}")))
}

fn decode_mdhd(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    let (version, _flags) = read_full_box(r)?;
    let (timescale, duration) = match version {
        1 => {
            r.read_u64()?;
            r.read_u64()?;
            let ts = r.read_u32()?;
            (ts, r.read_u64()?)
        }
        0 => {
            r.read_u32()?;
            r.read_u32()?;
            let ts = r.read_u32()?;
            (ts, r.read_u32()? as u64)
        }
        v => return Err(Error::Format(format!("unrecognized mdhd version {v}"))),
    };
    // Packed ISO-639-2: a pad bit then three 5-bit letters, offset 0x60.
    let mut packed = [0u8; 2];
    r.read_exact(&mut packed)?;
    let language: String = (0..3)
        .map(|i| (0x60 + bits(&packed, 1 + 5 * i, 5) as u8) as char)
        .collect();
    r.read_u16()?; // pre_defined
    r.skip_remaining()?;
    Ok(Some(format!(
        "timescale={timescale} duration={duration} lang={language}"
    )))
}

fn decode_hdlr(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    read_full_box(r)?;
    r.read_u32()?; // pre_defined
    let handler = r.read_fourcc()?;
    r.skip(12)?; // reserved
    let name = r.read_str(r.remaining())?;
    Ok(Some(format!("handler={handler} name={name}")))
}

fn decode_vmhd(r: &mut BodyReader<'_>, ctx: &mut WalkContext) -> Result<Option<String>> {
    read_full_box(r)?;
    let graphicsmode = r.read_u16()?;
    r.skip(6)?; // opcolor
    ctx.with_track(|t| t.set_media(MediaKind::Video));
    r.skip_remaining()?;
    Ok(Some(format!("graphicsmode={graphicsmode}")))
}

fn decode_smhd(r: &mut BodyReader<'_>, ctx: &mut WalkContext) -> Result<Option<String>> {
    read_full_box(r)?;
    let balance = r.read_i16()?;
    r.read_u16()?; // reserved
    ctx.with_track(|t| t.set_media(MediaKind::Audio));
    r.skip_remaining()?;
    Ok(Some(format!("balance={balance}")))
}

fn decode_elst(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    let (version, _flags) = read_full_box(r)?;
    let entry_count = r.read_u32()?;
    for _ in 0..entry_count {
        match version {
            1 => {
                r.read_u64()?; // segment duration
                r.read_u64()?; // media time (signed, unused here)
            }
            0 => {
                r.read_u32()?;
                r.read_i32()?;
            }
            v => return Err(Error::Format(format!("unrecognized elst version {v}"))),
        }
        r.read_u16()?; // media rate integer
        r.read_u16()?; // media rate fraction
    }
    r.skip_remaining()?;
    Ok(Some(format!("entries={entry_count}")))
}

// Entries here are read as a 4-byte version/flags word followed by a
// NUL-terminated name, the layout legacy muxers actually emit.
fn decode_dref(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    read_full_box(r)?;
    let entry_count = r.read_u32()?;
    let mut names = Vec::new();
    for _ in 0..entry_count {
        if r.remaining() < 4 {
            break;
        }
        read_full_box(r)?;
        names.push(r.read_cstr()?);
    }
    r.skip_remaining()?;
    Ok(Some(format!("entries={entry_count} [{}]", names.join(","))))
}

fn decode_stsd(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    read_full_box(r)?;
    let entry_count = r.read_u32()?;
    let mut codecs = Vec::new();
    for _ in 0..entry_count {
        let entry_size = r.read_u32()?;
        let codec = r.read_fourcc()?;
        if entry_size < 16 {
            return Err(Error::Format(format!(
                "sample entry `{codec}` declares size {entry_size}, minimum is 16"
            )));
        }
        r.skip(6)?; // reserved
        r.read_u16()?; // data reference index
        r.skip(entry_size as u64 - 16)?; // codec-specific body
        codecs.push(codec.as_str_lossy());
    }
    r.skip_remaining()?;
    Ok(Some(format!("codecs={}", codecs.join(","))))
}

fn decode_stts(r: &mut BodyReader<'_>, ctx: &mut WalkContext) -> Result<Option<String>> {
    read_full_box(r)?;
    let entry_count = r.read_u32()?;
    check_table(r, entry_count, 8)?;
    let mut runs = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let count = r.read_u32()?;
        let delta = r.read_u32()?;
        runs.push((count, delta));
    }
    let total: u64 = runs.iter().map(|&(count, _)| count as u64).sum();
    if total > MAX_EXPANDED_ENTRIES {
        return Err(Error::Format(format!(
            "time-to-sample runs expand to {total} samples"
        )));
    }
    let (deltas, duration) = expand_time_to_sample(&runs);
    let samples = deltas.len();
    ctx.with_track(|t| t.set_time_deltas(deltas));
    r.skip_remaining()?;
    Ok(Some(format!(
        "runs={entry_count} samples={samples} duration={duration}"
    )))
}

fn decode_stss(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    read_full_box(r)?;
    let entry_count = r.read_u32()?;
    for _ in 0..entry_count {
        r.read_u32()?; // sync sample number
    }
    r.skip_remaining()?;
    Ok(Some(format!("sync_samples={entry_count}")))
}

fn decode_ctts(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    let (version, _flags) = read_full_box(r)?;
    let entry_count = r.read_u32()?;
    for _ in 0..entry_count {
        r.read_u32()?; // sample count
        match version {
            0 => {
                r.read_u32()?;
            }
            1 => {
                r.read_i32()?;
            }
            v => return Err(Error::Format(format!("unrecognized ctts version {v}"))),
        }
    }
    r.skip_remaining()?;
    Ok(Some(format!("entries={entry_count}")))
}

fn decode_stsc(r: &mut BodyReader<'_>, ctx: &mut WalkContext) -> Result<Option<String>> {
    read_full_box(r)?;
    let entry_count = r.read_u32()?;
    check_table(r, entry_count, 12)?;
    let mut runs = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let first_chunk = r.read_u32()?;
        let samples_per_chunk = r.read_u32()?;
        r.read_u32()?; // sample description index
        runs.push((first_chunk, samples_per_chunk));
    }
    ctx.with_track(|t| t.set_chunk_runs(runs));
    r.skip_remaining()?;
    Ok(Some(format!("runs={entry_count}")))
}

fn decode_stsz(r: &mut BodyReader<'_>, ctx: &mut WalkContext) -> Result<Option<String>> {
    read_full_box(r)?;
    let sample_size = r.read_u32()?;
    let sample_count = r.read_u32()?;
    let sizes = if sample_size != 0 {
        if sample_count as u64 > MAX_EXPANDED_ENTRIES {
            return Err(Error::Format(format!(
                "shared-size table declares {sample_count} samples"
            )));
        }
        vec![sample_size; sample_count as usize]
    } else {
        check_table(r, sample_count, 4)?;
        let mut sizes = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            sizes.push(r.read_u32()?);
        }
        sizes
    };
    ctx.with_track(|t| t.set_sample_sizes(sizes));
    r.skip_remaining()?;
    Ok(Some(if sample_size != 0 {
        format!("samples={sample_count} shared_size={sample_size}")
    } else {
        format!("samples={sample_count}")
    }))
}

fn decode_stco(r: &mut BodyReader<'_>, ctx: &mut WalkContext) -> Result<Option<String>> {
    read_full_box(r)?;
    let entry_count = r.read_u32()?;
    check_table(r, entry_count, 4)?;
    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(r.read_u32()? as u64);
    }
    ctx.with_track(|t| t.set_chunk_offsets(offsets));
    r.skip_remaining()?;
    Ok(Some(format!("chunks={entry_count}")))
}

fn decode_sgpd(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    let (version, _flags) = read_full_box(r)?;
    if version == 0 {
        // Version 0 carries no entry lengths, so the entries cannot be
        // delimited without grouping-type knowledge this crate lacks.
        return Err(Error::Format(
            "sgpd version 0 entries are not delimitable".into(),
        ));
    }
    let grouping_type = r.read_fourcc()?;
    let default_length = if version == 1 { r.read_u32()? } else { 0 };
    if version >= 2 {
        r.read_u32()?; // default sample description index
    }
    let entry_count = r.read_u32()?;
    if version == 1 {
        for _ in 0..entry_count {
            let len = if default_length == 0 {
                r.read_u32()?
            } else {
                default_length
            };
            r.skip(len as u64)?;
        }
    }
    r.skip_remaining()?;
    Ok(Some(format!(
        "grouping={grouping_type} entries={entry_count}"
    )))
}

fn decode_sbgp(r: &mut BodyReader<'_>) -> Result<Option<String>> {
    let (version, _flags) = read_full_box(r)?;
    let grouping_type = r.read_fourcc()?;
    if version == 1 {
        r.read_u32()?; // grouping type parameter
    }
    let entry_count = r.read_u32()?;
    for _ in 0..entry_count {
        r.read_u32()?; // sample count
        r.read_u32()?; // group description index
    }
    r.skip_remaining()?;
    Ok(Some(format!(
        "grouping={grouping_type} entries={entry_count}"
    )))
}
