use std::io::Cursor;

use mp4carve::boxes::{BoxNode, parse, read_box_header};
use mp4carve::fourcc::FourCC;
use mp4carve::reader::BodyReader;
use mp4carve::track::MediaKind;

fn bx(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + payload.len());
    v.extend_from_slice(&(payload.len() as u32 + 8).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

// Version 0, flags 0 prefix for full boxes.
fn full(payload: &[u8]) -> Vec<u8> {
    let mut v = vec![0u8, 0, 0, 0];
    v.extend_from_slice(payload);
    v
}

fn u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// ftyp + mdat + moov holding one audio track:
/// 4 samples of 3/4/5/6 bytes in 2 chunks of 2.
fn audio_file() -> Vec<u8> {
    let ftyp = {
        let mut p = Vec::new();
        p.extend_from_slice(b"isom");
        p.extend_from_slice(&512u32.to_be_bytes());
        p.extend_from_slice(b"isom");
        bx(b"ftyp", &p)
    };
    assert_eq!(ftyp.len(), 20);

    let mdat_payload: Vec<u8> = (0..18u8).collect();
    let mdat = bx(b"mdat", &mdat_payload); // body at file offset 28

    let stts = bx(b"stts", &full(&u32s(&[1, 4, 1024])));
    let stsc = bx(b"stsc", &full(&u32s(&[1, 1, 2, 1])));
    let stsz = bx(b"stsz", &full(&u32s(&[0, 4, 3, 4, 5, 6])));
    let stco = bx(b"stco", &full(&u32s(&[2, 28, 35])));
    let stbl = bx(b"stbl", &[stts, stsc, stsz, stco].concat());

    let smhd = bx(b"smhd", &full(&[0u8; 4])); // balance + reserved
    let minf = bx(b"minf", &[smhd, stbl].concat());

    let mdhd = {
        let mut p = u32s(&[0, 0, 48000, 4096]);
        p.extend_from_slice(&[0x55, 0xC4]); // "und"
        p.extend_from_slice(&[0, 0]); // pre_defined
        bx(b"mdhd", &full(&p))
    };
    let hdlr = {
        let mut p = u32s(&[0]);
        p.extend_from_slice(b"soun");
        p.extend_from_slice(&[0u8; 12]);
        p.extend_from_slice(b"SoundHandler\0");
        bx(b"hdlr", &full(&p))
    };
    let mdia = bx(b"mdia", &[mdhd, hdlr, minf].concat());

    let tkhd = bx(b"tkhd", &full(&u32s(&[0, 0, 7, 0, 4096])));
    let trak = bx(b"trak", &[tkhd, mdia].concat());
    let mvhd = bx(b"mvhd", &full(&u32s(&[0, 0, 600, 1000])));
    let moov = bx(b"moov", &[mvhd, trak].concat());

    [ftyp, mdat, moov].concat()
}

fn parse_all(data: &[u8]) -> mp4carve::Result<(Vec<BoxNode>, mp4carve::TrackRegistry)> {
    let len = data.len() as u64;
    parse(&mut Cursor::new(data), len)
}

#[test]
fn full_file_yields_tree_and_registry() {
    let data = audio_file();
    let (tree, registry) = parse_all(&data).expect("parse failed");

    let top: Vec<FourCC> = tree.iter().map(|n| n.typ).collect();
    assert_eq!(
        top,
        vec![FourCC(*b"ftyp"), FourCC(*b"mdat"), FourCC(*b"moov")]
    );
    assert_eq!(tree[1].body_offset(), 28);

    assert_eq!(registry.mdat_offset, Some(28));
    assert_eq!(registry.tracks.len(), 1);
    let track = &registry.tracks[&7];
    assert_eq!(track.media, MediaKind::Audio);
    assert_eq!(track.stts, vec![1024; 4]);
    assert_eq!(track.stsc, vec![2, 2]);
    assert_eq!(track.stsz, vec![3, 4, 5, 6]);
    assert_eq!(track.stco, vec![28, 35]);
    assert_eq!(track.duration(), 4096);

    let trak = BoxNode::find(&tree, FourCC(*b"trak")).unwrap();
    assert_eq!(
        trak.summary.as_deref(),
        Some("track_id=7 samples=4 chunks=2")
    );
    let ftyp = BoxNode::find(&tree, FourCC(*b"ftyp")).unwrap();
    assert_eq!(
        ftyp.summary.as_deref(),
        Some("major=isom minor=512 brands=isom")
    );
}

#[test]
fn parsing_twice_gives_equal_registries() {
    let data = audio_file();
    let (_, first) = parse_all(&data).unwrap();
    let (_, second) = parse_all(&data).unwrap();
    assert_eq!(first, second);
}

#[test]
fn size_zero_extends_to_region_end() {
    let mut data = bx(b"ftyp", &[0u8; 12]);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"free");
    data.extend_from_slice(&[0xEE; 5]);

    let (tree, _) = parse_all(&data).unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[1].typ, FourCC(*b"free"));
    assert_eq!(tree[1].size, 13);
    assert_eq!(tree[1].offset, 20);
}

#[test]
fn extended_size_uses_the_64_bit_field() {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(b"free");
    data.extend_from_slice(&19u64.to_be_bytes());
    data.extend_from_slice(&[0; 3]);

    let (tree, _) = parse_all(&data).unwrap();
    assert_eq!(tree[0].size, 19);
    assert_eq!(tree[0].header_size, 16);
}

#[test]
fn uuid_extended_type_is_consumed() {
    let mut data = Vec::new();
    data.extend_from_slice(&24u32.to_be_bytes());
    data.extend_from_slice(b"uuid");
    data.extend_from_slice(&[0xAB; 8]); // extended type
    data.extend_from_slice(&[0xCD; 8]); // opaque body

    let (tree, _) = parse_all(&data).unwrap();
    assert_eq!(tree[0].typ, FourCC(*b"uuid"));
    assert_eq!(tree[0].header_size, 16);
    assert_eq!(tree[0].body_size(), 8);
}

#[test]
fn unknown_boxes_are_skipped_not_fatal() {
    let mut data = audio_file();
    let odd = bx(b"wxyz", &[9u8; 11]);
    data.extend_from_slice(&odd);

    let (tree, registry) = parse_all(&data).unwrap();
    assert_eq!(tree.len(), 4);
    assert_eq!(tree[3].typ, FourCC(*b"wxyz"));
    assert!(tree[3].summary.is_none());
    assert_eq!(registry.tracks.len(), 1);
}

#[test]
fn child_overrunning_its_parent_is_a_format_error() {
    // moov body of 8 bytes holding a child that claims 100.
    let mut inner = Vec::new();
    inner.extend_from_slice(&100u32.to_be_bytes());
    inner.extend_from_slice(b"trak");
    let data = bx(b"moov", &inner);

    let err = parse_all(&data).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("in box `moov`"), "{msg}");
    assert!(msg.contains("exceeds enclosing region"), "{msg}");
}

#[test]
fn cut_file_is_a_truncation_error() {
    let data = audio_file();
    let cut = &data[..data.len() - 10];
    let err = parse(&mut Cursor::new(cut), data.len() as u64).unwrap_err();
    assert!(err.to_string().contains("truncated"), "{err}");
}

#[test]
fn unrecognized_full_box_version_is_fatal() {
    let mut payload = vec![3u8, 0, 0, 0]; // version 3
    payload.extend_from_slice(&[0u8; 96]);
    let data = bx(b"moov", &bx(b"mvhd", &payload));

    let err = parse_all(&data).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("in box `mvhd` at offset 8"), "{msg}");
    assert!(msg.contains("unrecognized mvhd version 3"), "{msg}");
}

#[test]
fn table_counts_must_fit_the_box_body() {
    // 12-byte stsz body claiming 4 billion per-sample entries.
    let mut p = u32s(&[0, 0xFFFF_FFFF]);
    p.push(0); // one stray byte, nowhere near 16 GiB of table
    let data = bx(b"stsz", &full(&p));
    let err = parse_all(&data).unwrap_err();
    assert!(err.to_string().contains("table of 4294967295 entries"), "{err}");

    let data = bx(b"stts", &full(&u32s(&[0xFFFF_FFFF])));
    let err = parse_all(&data).unwrap_err();
    assert!(err.to_string().contains("format:"), "{err}");

    let data = bx(b"stco", &full(&u32s(&[0xFFFF_FFFF])));
    assert!(parse_all(&data).is_err());

    let data = bx(b"stsc", &full(&u32s(&[0xFFFF_FFFF])));
    assert!(parse_all(&data).is_err());
}

#[test]
fn shared_size_sample_count_is_bounded() {
    // sample_size != 0 carries no table bytes to check against, so the
    // declared count itself is capped.
    let data = bx(b"stsz", &full(&u32s(&[16, 0xFFFF_FFFF])));
    let err = parse_all(&data).unwrap_err();
    assert!(
        err.to_string().contains("declares 4294967295 samples"),
        "{err}"
    );
}

#[test]
fn time_runs_expanding_past_the_cap_are_rejected() {
    // One well-formed 8-byte run whose count alone implies 2 billion
    // expanded samples.
    let data = bx(b"stts", &full(&u32s(&[1, 0x7FFF_FFFF, 1])));
    let err = parse_all(&data).unwrap_err();
    assert!(err.to_string().contains("expand to"), "{err}");
}

#[test]
fn first_track_header_wins() {
    let tkhd_a = bx(b"tkhd", &full(&u32s(&[0, 0, 7, 0, 0])));
    let tkhd_b = bx(b"tkhd", &full(&u32s(&[0, 0, 9, 0, 0])));
    let trak = bx(b"trak", &[tkhd_a, tkhd_b].concat());
    let data = bx(b"moov", &trak);

    let (_, registry) = parse_all(&data).unwrap();
    assert_eq!(registry.tracks.len(), 1);
    assert!(registry.tracks.contains_key(&7));
}

#[test]
fn trak_without_tkhd_is_a_format_error() {
    let smhd = bx(b"smhd", &full(&[0u8; 4]));
    let minf = bx(b"minf", &smhd);
    let mdia = bx(b"mdia", &minf);
    let data = bx(b"moov", &bx(b"trak", &mdia));

    let err = parse_all(&data).unwrap_err();
    assert!(err.to_string().contains("no track header"), "{err}");
}

#[test]
fn header_reader_reports_geometry() {
    let data = bx(b"ftyp", &[0u8; 12]);
    let mut cur = Cursor::new(&data);
    let mut region = BodyReader::new(&mut cur, data.len() as u64);
    let hdr = read_box_header(&mut region).unwrap();
    assert_eq!(hdr.typ, FourCC(*b"ftyp"));
    assert_eq!(hdr.size, 20);
    assert_eq!(hdr.header_size, 8);
    assert_eq!(region.remaining(), 12);
}
