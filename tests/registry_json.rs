use mp4carve::track::{MediaKind, Track, TrackRegistry};

fn registry() -> TrackRegistry {
    let mut registry = TrackRegistry::default();
    registry.set_mdat_offset(4096);
    registry.insert(Track {
        track_id: 1,
        media: MediaKind::Video,
        stts: vec![512; 3],
        stsc: vec![1, 1, 1],
        stsz: vec![900, 40, 41],
        stco: vec![4096, 5000, 5100],
    });
    registry.insert(Track {
        track_id: 2,
        media: MediaKind::Audio,
        stts: vec![1024; 2],
        stsc: vec![2],
        stsz: vec![300, 310],
        stco: vec![6000],
    });
    registry
}

#[test]
fn registry_survives_a_json_round_trip() {
    let original = registry();
    let json = serde_json::to_string_pretty(&original).unwrap();
    let restored: TrackRegistry = serde_json::from_str(&json).unwrap();
    assert_eq!(original, restored);
}

#[test]
fn registry_json_is_keyed_by_track_id() {
    let json = serde_json::to_value(registry()).unwrap();
    assert_eq!(json["mdat_offset"], 4096);
    assert_eq!(json["tracks"]["1"]["media"], "video");
    assert_eq!(json["tracks"]["2"]["media"], "audio");
    assert_eq!(json["tracks"]["2"]["stco"][0], 6000);
}

#[test]
fn absent_mdat_offset_is_omitted() {
    let mut registry = registry();
    registry.mdat_offset = None;
    let json = serde_json::to_value(&registry).unwrap();
    assert!(json.get("mdat_offset").is_none());
}

#[test]
fn repeated_track_ids_keep_the_first_entry() {
    let mut registry = TrackRegistry::default();
    let mut track = Track {
        track_id: 5,
        media: MediaKind::Audio,
        stts: vec![],
        stsc: vec![],
        stsz: vec![],
        stco: vec![],
    };
    registry.insert(track.clone());
    track.media = MediaKind::Video;
    registry.insert(track);
    assert_eq!(registry.tracks[&5].media, MediaKind::Audio);
}

#[test]
fn repeated_mdat_offset_keeps_the_first_value() {
    let mut registry = TrackRegistry::default();
    registry.set_mdat_offset(100);
    registry.set_mdat_offset(200);
    assert_eq!(registry.mdat_offset, Some(100));
}
