//! Tag writer tests on real files

use id3::TagLike;
use tunepipe_dl::models::LyricLine;
use tunepipe_dl::services::{write_tags, CoverArt, TagWriteError, TrackTags};

fn audio_payload() -> Vec<u8> {
    let mut data = vec![0xFF, 0xFB, 0x90, 0x00];
    data.extend((0..4096u32).map(|i| (i % 200) as u8));
    data
}

fn full_tags() -> TrackTags {
    TrackTags {
        title: "Through the Night".to_string(),
        artist: "IU".to_string(),
        album: "Palette".to_string(),
        plain_lyrics: Some("line one\nline two".to_string()),
        synced_lyrics: vec![
            LyricLine::new("line one", 12_000),
            LyricLine::new("line two", 15_480),
        ],
        cover_art: Some(CoverArt {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3],
        }),
    }
}

#[test]
fn test_all_frames_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    std::fs::write(&path, audio_payload()).unwrap();

    write_tags(&path, &full_tags()).unwrap();

    let tag = id3::Tag::read_from_path(&path).unwrap();
    assert_eq!(tag.version(), id3::Version::Id3v24);
    assert_eq!(tag.title(), Some("Through the Night"));
    assert_eq!(tag.artist(), Some("IU"));
    assert_eq!(tag.album(), Some("Palette"));

    let lyrics: Vec<_> = tag.lyrics().collect();
    assert_eq!(lyrics.len(), 1);
    assert_eq!(lyrics[0].lang, "eng");
    assert_eq!(lyrics[0].text, "line one\nline two");

    let synced: Vec<_> = tag.synchronised_lyrics().collect();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].timestamp_format, id3::frame::TimestampFormat::Ms);
    assert_eq!(
        synced[0].content,
        vec![
            (12_000, "line one".to_string()),
            (15_480, "line two".to_string()),
        ]
    );

    let pictures: Vec<_> = tag.pictures().collect();
    assert_eq!(pictures.len(), 1);
    assert_eq!(pictures[0].picture_type, id3::frame::PictureType::CoverFront);
    assert_eq!(pictures[0].mime_type, "image/jpeg");
}

#[test]
fn test_audio_payload_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    let audio = audio_payload();
    std::fs::write(&path, &audio).unwrap();

    write_tags(&path, &full_tags()).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert!(written.starts_with(b"ID3"));
    assert!(written.ends_with(&audio));
}

#[test]
fn test_rewrite_replaces_previous_tag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    std::fs::write(&path, audio_payload()).unwrap();

    write_tags(&path, &full_tags()).unwrap();

    let minimal = TrackTags {
        title: "Through the Night".to_string(),
        artist: "IU".to_string(),
        ..Default::default()
    };
    write_tags(&path, &minimal).unwrap();

    let tag = id3::Tag::read_from_path(&path).unwrap();
    assert_eq!(tag.title(), Some("Through the Night"));
    assert_eq!(tag.album(), None);
    assert_eq!(tag.lyrics().count(), 0);
    assert_eq!(tag.synchronised_lyrics().count(), 0);
    assert_eq!(tag.pictures().count(), 0);
}

#[test]
fn test_empty_album_writes_no_album_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.mp3");
    std::fs::write(&path, audio_payload()).unwrap();

    let single = TrackTags {
        album: String::new(),
        ..full_tags()
    };
    write_tags(&path, &single).unwrap();

    let tag = id3::Tag::read_from_path(&path).unwrap();
    assert!(tag.get("TALB").is_none());
    assert_eq!(tag.album(), None);
    assert_eq!(tag.title(), Some("Through the Night"));
    assert_eq!(tag.artist(), Some("IU"));
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = write_tags(&dir.path().join("absent.mp3"), &full_tags()).unwrap_err();
    assert!(matches!(err, TagWriteError::MissingFile(_)));
}
