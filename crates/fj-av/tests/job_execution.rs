//! End-to-end job execution against scripted stand-ins for ffmpeg.
//!
//! Each test writes a small shell script that mimics the behaviour of ffmpeg
//! it needs (writing the output file, printing a stats line, hanging) and
//! points the builder at it. Tests run serially so no script is executed
//! while another one is still open for writing.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use fj_av::{EncodingResult, JobBuilder, JobListener, StreamDestination};
use fj_core::{AudioCodec, Error};
use serial_test::serial;

const STATS_LINE: &str =
    "frame=  120 fps=0.0 q=-0.0 size=     256kB time=00:00:05.00 bitrate= 128.0kbits/s speed=2.5x";

/// Leaves the last argument in `$out` and the `-sdp_file` value in `$sdp`.
const ARG_SCAN: &str = r#"out=""
sdp=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-sdp_file" ]; then sdp="$arg"; fi
  prev="$arg"
  out="$arg"
done
"#;

fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{ARG_SCAN}{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn encoding_script() -> String {
    format!("printf '%s\\n' '{STATS_LINE}' >&2\nprintf 'encoded-audio' > \"$out\"\nexit 0")
}

#[test]
#[serial]
fn successful_run_reports_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), &encoding_script());
    let output = dir.path().join("nested").join("out.mp3");

    let stats = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stats);
    let frames = Arc::new(Mutex::new(Vec::new()));
    let frame_sink = Arc::clone(&frames);

    let result = JobBuilder::new("in.wav")
        .output(&output)
        .with_codec(AudioCodec::LibMp3Lame)
        .with_bitrate("128k")
        .unwrap()
        .with_ffmpeg_path(&ffmpeg)
        .on_stream_stats(move |bps: u64, speed: f64, dropped: u32| {
            sink.lock().unwrap().push((bps, speed, dropped));
        })
        .on_progress(move |pct: f64, frame: u64, kbps: f64| {
            frame_sink.lock().unwrap().push((pct, frame, kbps));
        })
        .execute()
        .unwrap();

    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    assert_eq!(result.file_size, "encoded-audio".len() as u64);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "encoded-audio");

    assert_eq!(*stats.lock().unwrap(), vec![(128_000, 2.5, 0)]);
    assert_eq!(*frames.lock().unwrap(), vec![(0.0, 120, 128.0)]);
}

#[test]
#[serial]
fn non_zero_exit_carries_output() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(
        dir.path(),
        "echo 'in.wav: Invalid data found when processing input' >&2\nexit 1",
    );

    let err = JobBuilder::new("in.wav")
        .output(dir.path().join("out.mp3"))
        .with_ffmpeg_path(&ffmpeg)
        .execute()
        .unwrap_err();

    assert_matches!(err, Error::Execution { exit_code: 1, ref output } if output.contains("Invalid data"));
}

#[test]
#[serial]
fn timeout_kills_hung_process() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "exec sleep 30");

    let started = Instant::now();
    let err = JobBuilder::new("in.wav")
        .output(dir.path().join("out.mp3"))
        .with_ffmpeg_path(&ffmpeg)
        .timeout(1)
        .execute()
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_matches!(err, Error::Timeout { secs: 1 });
    assert!(elapsed >= Duration::from_secs(1), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "took too long: {elapsed:?}");
}

#[tokio::test]
#[serial]
async fn spawned_job_can_be_awaited() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), &encoding_script());
    let output = dir.path().join("out.flac");

    let handle = JobBuilder::new("in.wav")
        .output(&output)
        .with_codec(AudioCodec::Flac)
        .with_ffmpeg_path(&ffmpeg)
        .spawn()
        .unwrap();

    assert!(handle.command_line().starts_with(&*ffmpeg.to_string_lossy()));
    assert!(handle.command_line().ends_with(&*output.to_string_lossy()));

    let result = handle.wait().await.unwrap();
    assert_eq!(result.file_size, 13);
}

#[tokio::test]
#[serial]
async fn cancelled_job_reports_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "exec sleep 30");

    let handle = JobBuilder::new("in.wav")
        .output(dir.path().join("out.mp3"))
        .with_ffmpeg_path(&ffmpeg)
        .spawn()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = Instant::now();
    handle.cancel();

    assert_matches!(handle.wait().await, Err(Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl JobListener for Recorder {
    fn on_start(&self, command_line: &str) {
        assert!(command_line.contains("-hide_banner"));
        self.events.lock().unwrap().push("start".into());
    }

    fn on_progress(&self, _percentage: f64, frame: u64, _bitrate_kbps: f64) {
        self.events.lock().unwrap().push(format!("progress {frame}"));
    }

    fn on_success(&self, result: &EncodingResult) {
        self.events
            .lock()
            .unwrap()
            .push(format!("success {}", result.file_size));
    }

    fn on_error(&self, error: &Error) {
        self.events.lock().unwrap().push(format!("error {error}"));
    }
}

#[tokio::test]
#[serial]
async fn listener_sees_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), &encoding_script());
    let recorder = Arc::new(Recorder::default());

    let handle = JobBuilder::new("in.wav")
        .output(dir.path().join("out.mp3"))
        .with_ffmpeg_path(&ffmpeg)
        .spawn_with_listener(recorder.clone())
        .unwrap();
    handle.wait().await.unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start", "progress 120", "success 13"]
    );
}

#[tokio::test]
#[serial]
async fn listener_hears_configuration_errors() {
    let recorder = Arc::new(Recorder::default());

    let result = JobBuilder::new("in.wav").spawn_with_listener(recorder.clone());

    assert!(result.unwrap_err().is_config());
    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("error Configuration error"));
}

#[tokio::test]
#[serial]
async fn session_description_callback_fires_while_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "printf 'v=0\\n' > \"$sdp\"\nexec sleep 30");
    let sdp = dir.path().join("stream.sdp");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = JobBuilder::new("in.wav")
        .as_live_source()
        .to_stream(StreamDestination::rtp("127.0.0.1", 5004))
        .save_sdp_to(&sdp)
        .on_sdp_created(move |path: &Path| {
            let _ = tx.send(path.to_path_buf());
        })
        .with_ffmpeg_path(&ffmpeg)
        .spawn()
        .unwrap();

    let ready = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("session description never reported");
    assert_eq!(ready.as_deref(), Some(sdp.as_path()));
    assert!(!handle.is_finished());

    handle.cancel();
    assert_matches!(handle.wait().await, Err(Error::Cancelled));
}

#[test]
#[serial]
fn blocking_execute_fires_session_description_callback_once() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "printf 'v=0\\n' > \"$sdp\"\nexit 0");
    let sdp = dir.path().join("stream.sdp");

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let result = JobBuilder::new("in.wav")
        .to_stream(StreamDestination::rtp("127.0.0.1", 5004))
        .save_sdp_to(&sdp)
        .on_sdp_created(move |_: &Path| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .with_ffmpeg_path(&ffmpeg)
        .execute()
        .unwrap();

    assert!(result.output_path.is_none());
    assert_eq!(result.file_size, 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
