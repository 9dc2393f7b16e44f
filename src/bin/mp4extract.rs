use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mp4carve::extract::extract_kind;
use mp4carve::track::{MediaKind, TrackRegistry};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Extract elementary streams from an MP4 using a saved track registry"
)]
struct Args {
    /// Track registry JSON, as written by `mp4dump --save-stbl`
    registry: PathBuf,

    /// Source MP4 file the registry was built from
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Write the audio stream (ADTS-framed AAC) to this path
    #[arg(long = "audio-file", value_name = "FILE")]
    audio_file: Option<PathBuf>,

    /// Write the raw video stream to this path
    #[arg(long = "video-file", value_name = "FILE")]
    video_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(
        args.audio_file.is_some() || args.video_file.is_some(),
        "nothing to do: pass --audio-file and/or --video-file"
    );

    let registry: TrackRegistry = serde_json::from_reader(BufReader::new(
        File::open(&args.registry)
            .with_context(|| format!("opening {}", args.registry.display()))?,
    ))
    .with_context(|| format!("decoding registry {}", args.registry.display()))?;

    let mut src = BufReader::new(
        File::open(&args.input).with_context(|| format!("opening {}", args.input.display()))?,
    );

    if let Some(out) = &args.audio_file {
        let written = write_stream(&registry, MediaKind::Audio, &mut src, out)?;
        println!("audio: {} bytes -> {}", written, out.display());
    }
    if let Some(out) = &args.video_file {
        let written = write_stream(&registry, MediaKind::Video, &mut src, out)?;
        println!("video: {} bytes -> {}", written, out.display());
    }

    Ok(())
}

fn write_stream(
    registry: &TrackRegistry,
    kind: MediaKind,
    src: &mut BufReader<File>,
    out: &PathBuf,
) -> anyhow::Result<u64> {
    let mut sink = BufWriter::new(
        File::create(out).with_context(|| format!("creating {}", out.display()))?,
    );
    let written = extract_kind(registry, kind, src, &mut sink)
        .with_context(|| format!("extracting to {}", out.display()))?;
    sink.flush()?;
    Ok(written)
}
