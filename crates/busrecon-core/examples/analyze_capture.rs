//! Analyze a capture file: parse frames under a layout hypothesis, print
//! field statistics, repeated patterns, and the checksum-candidate ranking.
//!
//! Usage: analyze_capture <capture.brc> [layout.json]
//!
//! With no capture on disk yet, record one from simulated traffic first:
//! see `TrafficSimulator` in the crate docs.

use std::env;
use std::fs;

use anyhow::{Context, Result};
use busrecon_core::analysis::PatternAnalyzer;
use busrecon_core::capture::{read_capture, read_capture_legacy};
use busrecon_core::decode::{ChecksumId, FrameParser, LayoutHypothesis};
use busrecon_core::names::NameTable;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: analyze_capture <capture.brc> [layout.json]");
        return Ok(());
    }

    let capture = read_capture(&args[1]).or_else(|_| {
        println!("(no container header, trying legacy format)");
        read_capture_legacy(&args[1])
    })
    .with_context(|| format!("loading {}", args[1]))?;

    let layout = match args.get(2) {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            LayoutHypothesis::from_json(&json).context("parsing layout hypothesis")?
        }
        None => LayoutHypothesis::net485_guess(),
    };

    println!(
        "Loaded {} frames, {} bytes, {:.1}s of traffic",
        capture.len(),
        capture.total_bytes(),
        capture.duration()
    );
    println!("Layout hypothesis: {}\n", layout.name);

    // Per-frame view through the hypothesis
    let names = NameTable::well_known_guesses();
    let parser = FrameParser::new(layout.clone());
    for (i, mut packet) in parser.parse_capture(&capture).into_iter().enumerate().take(20) {
        parser.evaluate_checksums(&mut packet, ChecksumId::all());
        println!("{:4} [{:10.3}s] {}", i, packet.timestamp, packet.summary(&names));
    }
    if capture.len() > 20 {
        println!("  ... and {} more", capture.len() - 20);
    }

    // Aggregate statistics
    let analyzer = PatternAnalyzer::default();
    let report = analyzer.analyze(&capture, &layout);

    println!("\nField value frequencies:");
    for table in &report.field_frequencies {
        println!("  {}:", table.role.label());
        for entry in table.entries.iter().take(8) {
            match entry.value {
                Some(v) => println!("    {:#06x}  x{}", v, entry.count),
                None => println!("    {:?}  x{}", entry.bytes, entry.count),
            }
        }
        if table.truncated > 0 {
            println!("    ({} frames truncated)", table.truncated);
        }
    }

    if !report.conversations.is_empty() {
        println!("\nConversations:");
        for conv in report.conversations.iter().take(10) {
            println!("  {:#06x} -> {:#06x}  x{}", conv.src, conv.dest, conv.count);
        }
    }

    if !report.repeated_patterns.is_empty() {
        println!("\nRepeated byte patterns:");
        for pattern in report.repeated_patterns.iter().take(10) {
            let hex: Vec<String> = pattern.bytes.iter().map(|b| format!("{:02x}", b)).collect();
            println!(
                "  {}  x{} (score {})",
                hex.join(" "),
                pattern.occurrences,
                pattern.score
            );
        }
    }

    println!("\nChecksum candidates (ranked, nothing here is confirmed):");
    let ranking = analyzer.search_checksums(&capture, &layout, ChecksumId::all());
    if ranking.is_empty() {
        println!("  no candidate matches the trailer width of this layout");
    }
    for candidate in &ranking {
        let status = if candidate.consistent {
            "consistent over this capture"
        } else {
            "partial"
        };
        println!(
            "  {:20} {:3}/{} ({:.0}%)  {}",
            candidate.id.name(),
            candidate.matched,
            candidate.evaluated,
            candidate.ratio() * 100.0,
            status
        );
    }

    Ok(())
}
