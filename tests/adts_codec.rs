use mp4carve::adts::{
    ChannelConfig, FrameHeader, FrameScanner, HEADER_LEN, MAX_FRAME_LENGTH, Profile, SampleRate,
    Variant, synthesize,
};
use mp4carve::error::Error;

#[test]
fn synthesized_header_parses_back() {
    let hdr_bytes = synthesize(100).expect("synthesize failed");
    let hdr = FrameHeader::parse(&hdr_bytes).expect("parse failed");

    // The recovery template keeps the MPEG-2 variant bit of the original
    // tool's header, sync byte 0xF1 with bit 12 clear.
    assert_eq!(hdr.variant, Variant::Mpeg2);
    assert!(hdr.crc_absent);
    assert_eq!(hdr.profile, Profile::Lc);
    assert_eq!(hdr.channels, ChannelConfig::Stereo);
    assert_eq!(hdr.frame_length, HEADER_LEN as u32 + 100);
    assert_eq!(hdr.buffer_fullness, 0x7FF);
    assert_eq!(hdr.frame_count, 1);
    assert_eq!(hdr.header_len(), 7);
}

#[test]
fn synthesized_length_round_trips_across_the_field() {
    for payload in [0usize, 1, 7, 255, 1000, MAX_FRAME_LENGTH as usize - HEADER_LEN] {
        let hdr_bytes = synthesize(payload).unwrap();
        let hdr = FrameHeader::parse(&hdr_bytes).unwrap();
        assert_eq!(hdr.frame_length as usize, HEADER_LEN + payload);
    }
}

#[test]
fn oversized_payload_is_an_integrity_error() {
    let too_big = MAX_FRAME_LENGTH as usize - HEADER_LEN + 1;
    assert!(matches!(synthesize(too_big), Err(Error::Integrity(_))));
}

#[test]
fn short_buffer_is_a_truncation_error() {
    let err = FrameHeader::parse(&[0xFF, 0xF1]).unwrap_err();
    assert!(matches!(
        err,
        Error::Truncated {
            needed: 7,
            available: 2
        }
    ));
}

#[test]
fn scanner_resyncs_past_garbage_prefix() {
    let mut stream = vec![0xAA]; // one junk byte before the first frame
    stream.extend_from_slice(&synthesize(5).unwrap());
    stream.extend_from_slice(&[0x11; 5]);
    stream.extend_from_slice(&synthesize(3).unwrap());
    stream.extend_from_slice(&[0x22; 3]);

    let frames: Vec<_> = FrameScanner::new(&stream).collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, 1);
    assert_eq!(frames[0].1.frame_length, 12);
    assert_eq!(frames[1].0, 13);
    assert_eq!(frames[1].1.frame_length, 10);
}

#[test]
fn scanner_rejects_reserved_sample_rate() {
    let mut frame = synthesize(5).unwrap().to_vec();
    frame[2] = 0x74; // frequency index 13, a reserved code
    frame.extend_from_slice(&[0u8; 5]);

    assert_eq!(FrameScanner::new(&frame).count(), 0);
}

#[test]
fn scanner_rejects_length_that_cannot_cover_a_header() {
    // Sync word followed by a frame length of 7 (header only, no payload).
    let mut frame = synthesize(0).unwrap().to_vec();
    frame.extend_from_slice(&[0u8; 8]);
    let hdr = FrameHeader::parse(&frame).unwrap();
    assert_eq!(hdr.frame_length, 7);

    assert_eq!(FrameScanner::new(&frame).count(), 0);
}

#[test]
fn scanner_walks_back_to_back_frames() {
    let mut stream = Vec::new();
    let payloads = [40usize, 1, 333, 12];
    for &p in &payloads {
        stream.extend_from_slice(&synthesize(p).unwrap());
        stream.extend(std::iter::repeat_n(0xC3u8, p));
    }

    let frames: Vec<_> = FrameScanner::new(&stream).collect();
    assert_eq!(frames.len(), payloads.len());
    let mut expect_at = 0usize;
    for ((at, hdr), &p) in frames.iter().zip(&payloads) {
        assert_eq!(*at, expect_at);
        assert_eq!(hdr.frame_length as usize, HEADER_LEN + p);
        expect_at += hdr.frame_length as usize;
    }
}

#[test]
fn starting_at_skips_earlier_frames() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&synthesize(4).unwrap());
    stream.extend_from_slice(&[0u8; 4]);
    stream.extend_from_slice(&synthesize(9).unwrap());
    stream.extend_from_slice(&[0u8; 9]);

    let frames: Vec<_> = FrameScanner::starting_at(&stream, 11).collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, 11);
}

#[test]
fn parse_reads_all_declared_fields() {
    // MPEG-2, CRC present, Main profile, 44100 Hz, 1 channel.
    // 1111 1111 1111 0000 | 00 0100 0 001 ...
    let buf = [0xFF, 0xF0, 0x10, 0x40, 0x01, 0x3F, 0xFD];
    let hdr = FrameHeader::parse(&buf).unwrap();
    assert_eq!(hdr.variant, Variant::Mpeg2);
    assert!(!hdr.crc_absent);
    assert_eq!(hdr.profile, Profile::Main);
    assert_eq!(hdr.sample_rate, SampleRate::Hz44100);
    assert_eq!(hdr.channels, ChannelConfig::Mono);
    assert_eq!(hdr.frame_length, 9);
    assert_eq!(hdr.buffer_fullness, 0x7FF);
    assert_eq!(hdr.header_len(), 9);
    assert_eq!(hdr.frame_count, 2);
}
