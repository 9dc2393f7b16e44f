//! Expansion of the run-length-encoded sample tables into flat sequences,
//! and assembly of per-sample descriptors from the expanded tables.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::track::Track;

/// Expand (count, delta) time-to-sample runs into one delta per sample.
///
/// Returns the expanded deltas and their sum, which is the track's decoded
/// duration.
pub fn expand_time_to_sample(runs: &[(u32, u32)]) -> (Vec<u32>, u64) {
    let total: usize = runs.iter().map(|&(count, _)| count as usize).sum();
    let mut deltas = Vec::with_capacity(total);
    let mut duration = 0u64;
    for &(count, delta) in runs {
        for _ in 0..count {
            deltas.push(delta);
        }
        duration += count as u64 * delta as u64;
    }
    (deltas, duration)
}

/// Expand (first_chunk, samples_per_chunk) runs into one count per chunk.
///
/// Chunk indices are 1-based in the runs. Each run applies from its
/// `first_chunk` up to (not including) the next run's; the final run has no
/// end marker and extends to `chunk_count`. Runs must start at chunk 1 and
/// be strictly increasing, and no run may begin past `chunk_count`.
pub fn expand_sample_to_chunk(runs: &[(u32, u32)], chunk_count: u32) -> Result<Vec<u32>> {
    if runs.is_empty() {
        if chunk_count == 0 {
            return Ok(Vec::new());
        }
        return Err(Error::Integrity(format!(
            "{} chunks but an empty sample-to-chunk table",
            chunk_count
        )));
    }
    if runs[0].0 != 1 {
        return Err(Error::Integrity(format!(
            "first sample-to-chunk run starts at chunk {}, expected 1",
            runs[0].0
        )));
    }

    let mut counts = Vec::with_capacity(chunk_count as usize);
    let mut chunk = 1u32;
    let mut samples = runs[0].1;
    for &(first_chunk, samples_per_chunk) in &runs[1..] {
        if first_chunk <= chunk {
            return Err(Error::Integrity(format!(
                "sample-to-chunk run at chunk {} does not advance past chunk {}",
                first_chunk, chunk
            )));
        }
        if first_chunk > chunk_count {
            return Err(Error::Integrity(format!(
                "sample-to-chunk run starts at chunk {} but only {} chunks exist",
                first_chunk, chunk_count
            )));
        }
        while chunk < first_chunk {
            counts.push(samples);
            chunk += 1;
        }
        samples = samples_per_chunk;
    }
    // Final run: no end marker, extends over every remaining chunk.
    while chunk <= chunk_count {
        counts.push(samples);
        chunk += 1;
    }
    Ok(counts)
}

/// Concrete location and timing of one sample, derived from the four
/// expanded tables. Never stored in the container itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleDescriptor {
    /// 0-based sample index.
    pub sample_index: u32,
    /// 0-based index of the chunk holding this sample.
    pub chunk_index: u32,
    /// Absolute file offset of the sample's first byte.
    pub file_offset: u64,
    /// Sample size in bytes.
    pub byte_size: u32,
    /// Sum of the time deltas of all preceding samples.
    pub decode_time: u64,
}

/// Combine a track's expanded tables into per-sample descriptors.
///
/// Pure post-processing: needs no further source bytes and can be
/// recomputed at any time from the stored tables. Fails when the tables
/// contradict each other (chunk or sample counts that do not line up).
pub fn build_descriptors(track: &Track) -> Result<Vec<SampleDescriptor>> {
    if track.stsc.len() != track.stco.len() {
        return Err(Error::Integrity(format!(
            "track {}: {} per-chunk counts but {} chunk offsets",
            track.track_id,
            track.stsc.len(),
            track.stco.len()
        )));
    }
    let implied: u64 = track.stsc.iter().map(|&n| n as u64).sum();
    if implied != track.stsz.len() as u64 {
        return Err(Error::Integrity(format!(
            "track {}: chunk layout implies {} samples but {} sizes are present",
            track.track_id,
            implied,
            track.stsz.len()
        )));
    }
    if !track.stts.is_empty() && track.stts.len() != track.stsz.len() {
        return Err(Error::Integrity(format!(
            "track {}: {} time deltas for {} samples",
            track.track_id,
            track.stts.len(),
            track.stsz.len()
        )));
    }

    let mut samples = Vec::with_capacity(track.stsz.len());
    let mut sample_index = 0u32;
    let mut decode_time = 0u64;
    for (chunk_index, (&offset, &per_chunk)) in
        track.stco.iter().zip(track.stsc.iter()).enumerate()
    {
        let mut file_offset = offset;
        for _ in 0..per_chunk {
            let byte_size = track.stsz[sample_index as usize];
            samples.push(SampleDescriptor {
                sample_index,
                chunk_index: chunk_index as u32,
                file_offset,
                byte_size,
                decode_time,
            });
            if let Some(&delta) = track.stts.get(sample_index as usize) {
                decode_time += delta as u64;
            }
            file_offset += byte_size as u64;
            sample_index += 1;
        }
    }
    Ok(samples)
}
