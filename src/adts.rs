//! ADTS frame header codec: parse, synthesize, and a resynchronization
//! scanner for corrupted or undelimited byte streams.
//!
//! Layout of the fixed 56-bit header (bit indices, MSB-first):
//!
//! ```text
//! AAAAAAAA AAAABCCD EEFFFFGH HHIJKLMM MMMMMMMM MMMOOOOO OOOOOOPP
//! A sync (12)  B version  C layer  D !crc  E profile  F frequency
//! G private  H channels  I original  J home  K/L copyright id/start
//! M frame length (13)  O buffer fullness (11)  P frame count - 1
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::reader::{bit, bits};

/// MPEG standard variant signalled by the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Mpeg2,
    Mpeg4,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Mpeg2 => "MP2",
            Variant::Mpeg4 => "MP4",
        })
    }
}

/// AAC object profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Main,
    Lc,
    Ssr,
    Ltp,
}

impl Profile {
    fn from_bits(v: u32) -> Self {
        match v & 0x3 {
            0 => Profile::Main,
            1 => Profile::Lc,
            2 => Profile::Ssr,
            _ => Profile::Ltp,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Profile::Main => "Main",
            Profile::Lc => "LC",
            Profile::Ssr => "SSR",
            Profile::Ltp => "LTP",
        })
    }
}

/// Sampling frequency index. Two codes are reserved and one defers the
/// rate to an explicit in-stream value; a header carrying any of those
/// three is rejected by the resynchronization filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Hz96000,
    Hz88200,
    Hz64000,
    Hz48000,
    Hz44100,
    Hz32000,
    Hz24000,
    Hz22050,
    Hz16000,
    Hz12000,
    Hz11025,
    Hz8000,
    Hz7350,
    Reserved,
    Explicit,
}

impl SampleRate {
    fn from_index(v: u32) -> Self {
        match v & 0xF {
            0 => SampleRate::Hz96000,
            1 => SampleRate::Hz88200,
            2 => SampleRate::Hz64000,
            3 => SampleRate::Hz48000,
            4 => SampleRate::Hz44100,
            5 => SampleRate::Hz32000,
            6 => SampleRate::Hz24000,
            7 => SampleRate::Hz22050,
            8 => SampleRate::Hz16000,
            9 => SampleRate::Hz12000,
            10 => SampleRate::Hz11025,
            11 => SampleRate::Hz8000,
            12 => SampleRate::Hz7350,
            15 => SampleRate::Explicit,
            _ => SampleRate::Reserved,
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SampleRate::Hz96000 => "96000Hz",
            SampleRate::Hz88200 => "88200Hz",
            SampleRate::Hz64000 => "64000Hz",
            SampleRate::Hz48000 => "48000Hz",
            SampleRate::Hz44100 => "44100Hz",
            SampleRate::Hz32000 => "32000Hz",
            SampleRate::Hz24000 => "24000Hz",
            SampleRate::Hz22050 => "22050Hz",
            SampleRate::Hz16000 => "16000Hz",
            SampleRate::Hz12000 => "12000Hz",
            SampleRate::Hz11025 => "11025Hz",
            SampleRate::Hz8000 => "8000Hz",
            SampleRate::Hz7350 => "7350Hz",
            SampleRate::Reserved => "RESERVED",
            SampleRate::Explicit => "EXPLICIT",
        })
    }
}

/// Channel configuration. Zero means the layout comes from a program
/// config element rather than the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelConfig {
    Pce,
    Mono,
    Stereo,
    Ch3,
    Ch4,
    Ch5,
    Ch5_1,
    Ch7_1,
}

impl ChannelConfig {
    fn from_bits(v: u32) -> Self {
        match v & 0x7 {
            0 => ChannelConfig::Pce,
            1 => ChannelConfig::Mono,
            2 => ChannelConfig::Stereo,
            3 => ChannelConfig::Ch3,
            4 => ChannelConfig::Ch4,
            5 => ChannelConfig::Ch5,
            6 => ChannelConfig::Ch5_1,
            _ => ChannelConfig::Ch7_1,
        }
    }
}

impl fmt::Display for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelConfig::Pce => "PCE",
            ChannelConfig::Mono => "1ch",
            ChannelConfig::Stereo => "2ch",
            ChannelConfig::Ch3 => "3ch",
            ChannelConfig::Ch4 => "4ch",
            ChannelConfig::Ch5 => "5ch",
            ChannelConfig::Ch5_1 => "5.1ch",
            ChannelConfig::Ch7_1 => "7.1ch",
        })
    }
}

/// A decoded ADTS frame header.
///
/// `frame_length` counts the header itself plus the payload and is the
/// byte stride to the next frame when walking a stream sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub variant: Variant,
    pub crc_absent: bool,
    pub profile: Profile,
    pub sample_rate: SampleRate,
    pub private_bit: bool,
    pub channels: ChannelConfig,
    pub originality: bool,
    pub home: bool,
    pub copyright_id: bool,
    pub copyright_id_start: bool,
    pub frame_length: u32,
    pub buffer_fullness: u32,
    pub frame_count: u32,
}

/// Size of a CRC-absent header, and of every synthesized one.
pub const HEADER_LEN: usize = 7;

/// Largest value the 13-bit frame length field can carry.
pub const MAX_FRAME_LENGTH: u32 = (1 << 13) - 1;

impl FrameHeader {
    /// Decode the first 7 bytes of `buf` as an ADTS header.
    ///
    /// Does not verify the sync word; callers that need alignment use
    /// [`FrameScanner`].
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::Truncated {
                needed: HEADER_LEN as u64,
                available: buf.len() as u64,
            });
        }
        Ok(FrameHeader {
            variant: if bit(buf, 12) {
                Variant::Mpeg4
            } else {
                Variant::Mpeg2
            },
            crc_absent: bit(buf, 15),
            profile: Profile::from_bits(bits(buf, 16, 2)),
            sample_rate: SampleRate::from_index(bits(buf, 18, 4)),
            private_bit: bit(buf, 22),
            channels: ChannelConfig::from_bits(bits(buf, 23, 3)),
            originality: bit(buf, 26),
            home: bit(buf, 27),
            copyright_id: bit(buf, 28),
            copyright_id_start: bit(buf, 29),
            frame_length: bits(buf, 30, 13),
            buffer_fullness: bits(buf, 43, 11),
            frame_count: 1 + bits(buf, 54, 2),
        })
    }

    /// Header length in bytes: 7, or 9 when a CRC follows.
    pub fn header_len(&self) -> usize {
        if self.crc_absent { 7 } else { 9 }
    }

    /// Sanity filter used by the scanner before it trusts `frame_length`.
    fn looks_valid(&self) -> bool {
        self.frame_length as usize > HEADER_LEN
            && !matches!(self.sample_rate, SampleRate::Reserved | SampleRate::Explicit)
            && self.profile == Profile::Lc
            && self.channels != ChannelConfig::Pce
    }
}

/// Build a 7-byte CRC-absent header for a payload of `payload_size` bytes.
///
/// The configuration is fixed (LC profile, 2 channels, the original
/// recovery template) regardless of what the source stream carried; only
/// the length field varies. Fails when the total length overflows the
/// 13-bit field.
pub fn synthesize(payload_size: usize) -> Result<[u8; HEADER_LEN]> {
    let frame_length = (HEADER_LEN + payload_size) as u64;
    if frame_length > MAX_FRAME_LENGTH as u64 {
        return Err(Error::Integrity(format!(
            "frame length {} overflows the 13-bit field (max {})",
            frame_length, MAX_FRAME_LENGTH
        )));
    }
    let len = frame_length as u32;
    Ok([
        0xFF,
        0xF1, // MPEG-2, layer 0, no CRC
        0x60, // LC profile, frequency index 8, 2ch high bit
        0x80 | ((len >> 11) & 0x03) as u8,
        ((len >> 3) & 0xFF) as u8,
        (((len & 0x07) << 5) as u8) | 0x1F, // buffer fullness 0x7FF
        0xFC,
    ])
}

/// Left-to-right resynchronization scanner.
///
/// At each byte offset it looks for the two-byte sync pattern, parses a
/// candidate header, and only trusts the length field once the header
/// passes [`FrameHeader::looks_valid`]; otherwise it advances a single
/// byte, so a mis-sync costs at most one byte of skew per step.
pub struct FrameScanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameScanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Start scanning at a byte offset instead of the buffer start.
    pub fn starting_at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn sync_at(&self, i: usize) -> bool {
        self.buf[i] == 0xFF && matches!(self.buf[i + 1], 0xF0 | 0xF1 | 0xF8 | 0xF9)
    }
}

impl Iterator for FrameScanner<'_> {
    type Item = (usize, FrameHeader);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos + 1 < self.buf.len() {
            let at = self.pos;
            if self.sync_at(at)
                && let Ok(hdr) = FrameHeader::parse(&self.buf[at..])
                && hdr.looks_valid()
            {
                self.pos = at + hdr.frame_length as usize;
                return Some((at, hdr));
            }
            self.pos += 1;
        }
        None
    }
}
