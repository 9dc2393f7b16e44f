//! Elementary stream extraction: walk a track's sample descriptors over
//! the source file and write the raw stream to a sink, framing audio
//! samples with synthesized ADTS headers.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::adts;
use crate::error::{Error, Result};
use crate::sample_table::build_descriptors;
use crate::track::{MediaKind, Track, TrackRegistry};

/// Copy one track's samples from `src` to `sink` in sample order.
///
/// Audio samples are stored header-less in the container, so each one is
/// prefixed with a synthesized ADTS header; video samples are copied
/// byte-for-byte. Returns the number of bytes written. A sample whose
/// bytes run past the end of the source is a truncation error, and
/// nothing useful will have been written by then, so callers should
/// discard the sink on error.
pub fn extract_track<S, W>(track: &Track, src: &mut S, sink: &mut W) -> Result<u64>
where
    S: Read + Seek,
    W: Write,
{
    let descriptors = build_descriptors(track)?;
    let mut written = 0u64;
    let mut buf = Vec::new();

    // One seek per chunk; samples within a chunk are back-to-back.
    let mut current_chunk = None;
    for d in &descriptors {
        if current_chunk != Some(d.chunk_index) {
            src.seek(SeekFrom::Start(d.file_offset))?;
            current_chunk = Some(d.chunk_index);
        }
        buf.resize(d.byte_size as usize, 0);
        read_sample(src, &mut buf, d.byte_size)?;

        if track.media == MediaKind::Audio {
            let header = adts::synthesize(buf.len())?;
            sink.write_all(&header)?;
            written += header.len() as u64;
        }
        sink.write_all(&buf)?;
        written += buf.len() as u64;

        log::trace!(
            "track {} sample {}: {} bytes at {:#x}, head {}",
            track.track_id,
            d.sample_index,
            d.byte_size,
            d.file_offset,
            hex::encode(&buf[..buf.len().min(8)])
        );
    }
    Ok(written)
}

fn read_sample<S: Read>(src: &mut S, buf: &mut [u8], wanted: u32) -> Result<()> {
    let mut got = 0usize;
    while got < buf.len() {
        let n = src.read(&mut buf[got..])?;
        if n == 0 {
            return Err(Error::Truncated {
                needed: wanted as u64,
                available: got as u64,
            });
        }
        got += n;
    }
    Ok(())
}

/// Extract every track of `kind`, concatenated into `sink` in track-id
/// order.
pub fn extract_kind<S, W>(
    registry: &TrackRegistry,
    kind: MediaKind,
    src: &mut S,
    sink: &mut W,
) -> Result<u64>
where
    S: Read + Seek,
    W: Write,
{
    let mut written = 0u64;
    let mut matched = false;
    for track in registry.tracks_of(kind) {
        matched = true;
        log::info!(
            "extracting track {}: {} samples in {} chunks",
            track.track_id,
            track.sample_count(),
            track.chunk_count()
        );
        written += extract_track(track, src, sink)?;
    }
    if !matched {
        return Err(Error::Format(format!(
            "registry holds no {} track",
            match kind {
                MediaKind::Audio => "audio",
                MediaKind::Video => "video",
                MediaKind::Unknown => "unclassified",
            }
        )));
    }
    Ok(written)
}
