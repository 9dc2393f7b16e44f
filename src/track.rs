use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sample_table::expand_sample_to_chunk;

/// Media classification of a track, set by the presence of a sound or
/// video media header box in its subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Unknown,
}

/// One elementary stream's decoded timing and location tables.
///
/// All four tables are stored fully expanded: one entry per sample for
/// `stts`/`stsz`, one entry per chunk for `stsc`/`stco`. A `Track` is
/// immutable once its `trak` subtree has finished parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: u32,
    pub media: MediaKind,
    /// Per-sample duration deltas, expanded from (count, delta) runs.
    pub stts: Vec<u32>,
    /// Per-chunk sample counts, expanded from (first_chunk, samples) runs.
    pub stsc: Vec<u32>,
    /// Per-sample byte sizes.
    pub stsz: Vec<u32>,
    /// Absolute file offsets, one per chunk.
    pub stco: Vec<u64>,
}

impl Track {
    pub fn sample_count(&self) -> usize {
        self.stsz.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.stco.len()
    }

    /// Decoded duration: the sum of all expanded time deltas.
    pub fn duration(&self) -> u64 {
        self.stts.iter().map(|&d| d as u64).sum()
    }
}

/// Accumulates one track's fields while its `trak` subtree is walked.
///
/// Every setter is assign-if-absent: the first value encountered wins and
/// later assignments are no-ops. The sample-to-chunk table is kept as raw
/// runs until [`TrackBuilder::finish`], because expanding the final run
/// needs the chunk count, which only the chunk-offset table provides.
#[derive(Debug, Default)]
pub struct TrackBuilder {
    track_id: Option<u32>,
    media: Option<MediaKind>,
    stts: Option<Vec<u32>>,
    stsc_runs: Option<Vec<(u32, u32)>>,
    stsz: Option<Vec<u32>>,
    stco: Option<Vec<u64>>,
}

impl TrackBuilder {
    pub fn set_track_id(&mut self, id: u32) {
        self.track_id.get_or_insert(id);
    }

    pub fn set_media(&mut self, kind: MediaKind) {
        self.media.get_or_insert(kind);
    }

    pub fn set_time_deltas(&mut self, deltas: Vec<u32>) {
        self.stts.get_or_insert(deltas);
    }

    pub fn set_chunk_runs(&mut self, runs: Vec<(u32, u32)>) {
        self.stsc_runs.get_or_insert(runs);
    }

    pub fn set_sample_sizes(&mut self, sizes: Vec<u32>) {
        self.stsz.get_or_insert(sizes);
    }

    pub fn set_chunk_offsets(&mut self, offsets: Vec<u64>) {
        self.stco.get_or_insert(offsets);
    }

    pub fn finish(self) -> Result<Track> {
        let track_id = self
            .track_id
            .ok_or_else(|| Error::Format("trak subtree carries no track header".into()))?;
        let stco = self.stco.unwrap_or_default();
        let stsc = match self.stsc_runs {
            Some(runs) => expand_sample_to_chunk(&runs, stco.len() as u32)?,
            None => Vec::new(),
        };
        Ok(Track {
            track_id,
            media: self.media.unwrap_or(MediaKind::Unknown),
            stts: self.stts.unwrap_or_default(),
            stsc,
            stsz: self.stsz.unwrap_or_default(),
            stco,
        })
    }
}

/// All tracks recovered by one parse pass, plus the file offset of the
/// media-data body. Built once, then handed read-only to the extractor,
/// possibly via its JSON form.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRegistry {
    /// File offset of the `mdat` body, when one was seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mdat_offset: Option<u64>,
    /// Tracks keyed by track id.
    pub tracks: BTreeMap<u32, Track>,
}

impl TrackRegistry {
    /// Record a finished track. First value wins if a track id repeats.
    pub fn insert(&mut self, track: Track) {
        self.tracks.entry(track.track_id).or_insert(track);
    }

    /// Record the media-data body offset, once.
    pub fn set_mdat_offset(&mut self, offset: u64) {
        self.mdat_offset.get_or_insert(offset);
    }

    /// Tracks of one media kind, in track-id order.
    pub fn tracks_of(&self, kind: MediaKind) -> impl Iterator<Item = &Track> {
        self.tracks.values().filter(move |t| t.media == kind)
    }
}
