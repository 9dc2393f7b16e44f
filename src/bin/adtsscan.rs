use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mp4carve::adts::FrameScanner;

#[derive(Parser, Debug)]
#[command(version, about = "Scan a byte stream for ADTS frame headers")]
struct Args {
    /// AAC/ADTS (or arbitrary) file path
    path: PathBuf,

    /// Byte offset to start scanning at
    #[arg(long, default_value_t = 0)]
    start: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data =
        fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    anyhow::ensure!(
        args.start <= data.len(),
        "start offset {} past end of {}-byte file",
        args.start,
        data.len()
    );

    let mut frames = 0usize;
    let mut payload_bytes = 0u64;
    for (offset, hdr) in FrameScanner::starting_at(&data, args.start) {
        println!(
            "{:>10}  {}  crc={}  {}  {}  {}  len={}  fullness={}  frames={}",
            format!("{offset:#x}"),
            hdr.variant,
            if hdr.crc_absent { "no" } else { "yes" },
            hdr.profile,
            hdr.sample_rate,
            hdr.channels,
            hdr.frame_length,
            hdr.buffer_fullness,
            hdr.frame_count,
        );
        frames += 1;
        payload_bytes += hdr.frame_length as u64 - hdr.header_len() as u64;
    }
    println!("{frames} frame(s), {payload_bytes} payload bytes");

    Ok(())
}
