//! Transcoder tests with a scripted engine
//!
//! Each test writes a shell script in place of ffmpeg. Serialized so no
//! script is executed while another test still holds it open for writing.

#![cfg(unix)]

mod helpers;

use bytes::Bytes;
use helpers::{fake_ffmpeg, transcoder_config};
use serial_test::serial;
use tunepipe_dl::services::{FetchError, SourceStream, TranscodeError, Transcoder};

fn chunks() -> Vec<Bytes> {
    vec![
        Bytes::from_static(b"first-"),
        Bytes::from_static(b"second-"),
        Bytes::from_static(b"third"),
    ]
}

fn engine(dir: &std::path::Path, body: &str, timeout_secs: u64) -> Transcoder {
    let mut config = transcoder_config(fake_ffmpeg(dir, body));
    config.timeout_secs = timeout_secs;
    Transcoder::new(&config)
}

#[tokio::test]
#[serial]
async fn test_engine_output_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp3");

    let stats = engine(dir.path(), "cat", 30)
        .transcode(SourceStream::from_chunks(chunks()), &output)
        .await
        .unwrap();

    assert_eq!(stats.bytes_in, 18);
    assert_eq!(stats.bytes_out, 18);
    assert_eq!(std::fs::read(&output).unwrap(), b"first-second-third");
}

#[tokio::test]
#[serial]
async fn test_nonzero_exit_carries_stderr() {
    let dir = tempfile::tempdir().unwrap();

    let err = engine(
        dir.path(),
        "cat >/dev/null\necho 'Invalid data found when processing input' >&2\nexit 3",
        30,
    )
    .transcode(SourceStream::from_chunks(chunks()), &dir.path().join("out.mp3"))
    .await
    .unwrap_err();

    match err {
        TranscodeError::ExitStatus { code, stderr } => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "Invalid data found when processing input");
        }
        other => panic!("expected exit status error, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_empty_output_is_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = engine(dir.path(), "cat >/dev/null", 30)
        .transcode(SourceStream::from_chunks(chunks()), &dir.path().join("out.mp3"))
        .await
        .unwrap_err();

    assert!(matches!(err, TranscodeError::EmptyOutput), "{:?}", err);
}

#[tokio::test]
#[serial]
async fn test_source_failure_is_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = futures::stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(FetchError::Incomplete {
            received: 7,
            expected: 100,
        }),
    ]);

    let err = engine(dir.path(), "cat", 30)
        .transcode(source, &dir.path().join("out.mp3"))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            TranscodeError::Input(FetchError::Incomplete {
                received: 7,
                expected: 100
            })
        ),
        "{:?}",
        err
    );
}

#[tokio::test]
#[serial]
async fn test_hung_engine_times_out() {
    let dir = tempfile::tempdir().unwrap();

    let started = std::time::Instant::now();
    let err = engine(dir.path(), "exec sleep 30", 1)
        .transcode(SourceStream::from_chunks(chunks()), &dir.path().join("out.mp3"))
        .await
        .unwrap_err();

    assert!(matches!(err, TranscodeError::Timeout(1)), "{:?}", err);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
