//! Offline validator for a single scenery pack.
//!
//! Parses `sam.xml` and `Earth nav data/apt.dat` under the given
//! directory and prints a JSON summary. Exits non-zero if the manifest
//! root itself can't be parsed; per-entity rejections are reported but
//! don't fail the run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sam_core_plugin::registry::{parse_apt_dat, parse_sam_xml, Rejection};
use serde::Serialize;

#[derive(Parser)]
#[command(about = "Validate a scenery pack's sam.xml and apt.dat")]
struct Args {
    /// Path to the scenery pack directory (the one containing sam.xml)
    scenery_dir: PathBuf,
}

#[derive(Serialize)]
struct RejectionOut {
    reason: String,
    detail: String,
}

impl From<Rejection> for RejectionOut {
    fn from(r: Rejection) -> Self {
        RejectionOut { reason: r.reason, detail: r.detail }
    }
}

#[derive(Serialize)]
struct Summary {
    name: String,
    icao: Option<String>,
    jetway_count: usize,
    stand_count: usize,
    rejected: Vec<RejectionOut>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let xml_path = args.scenery_dir.join("sam.xml");
    let xml = std::fs::read_to_string(&xml_path).with_context(|| format!("reading {}", xml_path.display()))?;

    let mut rejections = Vec::new();
    let (mut scenery, _lib_jws) = parse_sam_xml(&xml, &mut rejections)
        .map_err(|reason| anyhow::anyhow!("{}: unparseable manifest root: {reason}", xml_path.display()))?;

    let apt_path = args.scenery_dir.join("Earth nav data/apt.dat");
    if let Ok(apt) = std::fs::read_to_string(&apt_path) {
        parse_apt_dat(&apt, &mut scenery);
    }

    let summary = Summary {
        name: args
            .scenery_dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        icao: scenery.arpt_icao.clone(),
        jetway_count: scenery.jetways.len(),
        stand_count: scenery.stands.len(),
        rejected: rejections.into_iter().map(RejectionOut::from).collect(),
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
