use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use mp4carve::boxes::{BoxNode, parse};
use mp4carve::fourcc::FourCC;

#[derive(Parser, Debug)]
#[command(version, about = "ISOBMFF box-tree explorer and sample-table carver")]
struct Args {
    /// MP4/ISOBMFF file path
    path: PathBuf,

    /// Emit JSON instead of a human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Write the decoded track registry as JSON (input for mp4extract)
    #[arg(long = "save-stbl", value_name = "FILE")]
    save_stbl: Option<PathBuf>,

    /// Copy the mdat body to a file
    #[arg(long = "save-mdat", value_name = "FILE")]
    save_mdat: Option<PathBuf>,

    /// Limit recursion depth (for text/tree output)
    #[arg(long, default_value_t = 64)]
    max_depth: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file =
        File::open(&args.path).with_context(|| format!("opening {}", args.path.display()))?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let (tree, registry) = parse(&mut reader, file_len)
        .with_context(|| format!("parsing {}", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        for node in &tree {
            print_node(node, 0, args.max_depth);
        }
    }

    if let Some(out) = &args.save_stbl {
        let sink =
            File::create(out).with_context(|| format!("creating {}", out.display()))?;
        serde_json::to_writer_pretty(sink, &registry)?;
        log::info!(
            "wrote registry with {} track(s) to {}",
            registry.tracks.len(),
            out.display()
        );
    }

    if let Some(out) = &args.save_mdat {
        let mdat = BoxNode::find(&tree, FourCC(*b"mdat"))
            .context("file carries no mdat box")?;
        let mut src = reader.into_inner();
        src.seek(SeekFrom::Start(mdat.body_offset()))?;
        let mut sink =
            File::create(out).with_context(|| format!("creating {}", out.display()))?;
        let copied = std::io::copy(&mut src.by_ref().take(mdat.body_size()), &mut sink)?;
        anyhow::ensure!(
            copied == mdat.body_size(),
            "mdat body truncated: copied {} of {} bytes",
            copied,
            mdat.body_size()
        );
        log::info!("wrote {} mdat bytes to {}", copied, out.display());
    }

    Ok(())
}

fn print_node(node: &BoxNode, depth: usize, max_depth: usize) {
    let indent = "  ".repeat(depth);
    match &node.summary {
        Some(s) => println!(
            "{indent}{:>8} {:>10} {}  {}",
            format!("{:#x}", node.offset),
            node.size,
            node.typ,
            s
        ),
        None => println!(
            "{indent}{:>8} {:>10} {}",
            format!("{:#x}", node.offset),
            node.size,
            node.typ
        ),
    }
    if depth + 1 <= max_depth {
        for child in &node.children {
            print_node(child, depth + 1, max_depth);
        }
    }
}
