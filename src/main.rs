mod cli;

use anyhow::{Context, Result, bail};
use boundwalk::application::dto::{CarveReport, ScanOptions};
use boundwalk::application::{carve, extract_findings};
use boundwalk::core::{ByteSource, FileSource, MmapSource};
use boundwalk::domain::entities::{Finding, FindingResult, Format, ParsedModel, WalkLimits};
use boundwalk::domain::services::{SignatureRegistry, Walker};
use boundwalk::formats::iso::IsoImage;
use boundwalk::formats::png::PngImage;
use clap::Parser;
use cli::{Cli, Commands, parse_formats};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let source = open_source(&cli.command, cli.no_mmap)?;

    match cli.command {
        Commands::Scan {
            config,
            types,
            block_size,
            sequential,
            json,
            extract,
            ..
        } => {
            let mut options = match config {
                Some(path) => ScanOptions::from_json_file(&path)?,
                None => ScanOptions::default(),
            };
            let formats = parse_formats(types);
            if !formats.is_empty() {
                options = options.with_formats(formats);
            }
            if let Some(mib) = block_size {
                options = options.with_block_size(mib * 1024 * 1024);
            }
            if sequential {
                options = options.sequential();
            }
            run_scan(source.as_deref(), &options, json, extract.as_deref())
        }
        Commands::Inspect { offset, format, .. } => {
            run_inspect(source.as_deref(), offset, format.as_deref())
        }
        Commands::Tree { offset, path, .. } => run_tree(source.as_deref(), offset, path.as_deref()),
        Commands::Signatures => {
            list_signatures();
            Ok(())
        }
    }
}

fn open_source(command: &Commands, no_mmap: bool) -> Result<Option<Box<dyn ByteSource>>> {
    let path = match command {
        Commands::Scan { image, .. }
        | Commands::Inspect { image, .. }
        | Commands::Tree { image, .. } => image,
        Commands::Signatures => return Ok(None),
    };
    let source: Box<dyn ByteSource> = if no_mmap {
        Box::new(FileSource::open(path).with_context(|| format!("opening {}", path.display()))?)
    } else {
        Box::new(MmapSource::open(path).with_context(|| format!("mapping {}", path.display()))?)
    };
    Ok(Some(source))
}

fn require(source: Option<&dyn ByteSource>) -> Result<&dyn ByteSource> {
    source.context("no image given")
}

fn run_scan(
    source: Option<&dyn ByteSource>,
    options: &ScanOptions,
    json: bool,
    extract: Option<&Path>,
) -> Result<()> {
    let source = require(source)?;
    let report = carve(source, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(dir) = extract {
        let manifest = extract_findings(source, &report.findings, dir)?;
        println!(
            "\nExtracted {} files ({} bytes) to {}",
            manifest.files.len(),
            manifest.total_bytes,
            dir.display()
        );
    }
    Ok(())
}

fn print_report(report: &CarveReport) {
    println!(
        "Scanned {} bytes in {:.2}s: {} candidates, {} findings",
        report.source_size,
        report.duration.as_secs_f64(),
        report.candidates,
        report.findings.len()
    );
    println!();
    println!("{:<6} {:<14} {:>18} {:>12}  {}", "#", "FORMAT", "OFFSET", "SIZE", "NOTE");
    println!("{}", "-".repeat(64));
    for (index, finding) in report.findings.iter().enumerate() {
        let note = if finding.possibly_truncated() {
            "stopped at unknown tag"
        } else {
            ""
        };
        println!(
            "{:<6} {:<14} {:>#18x} {:>12}  {}",
            index,
            finding.format.name(),
            finding.start,
            finding.len(),
            note
        );
    }

    println!();
    for (format, count) in report.per_format() {
        println!("{:<14} {}", format.name(), count);
    }
    for (kind, count) in &report.rejections {
        println!("rejected ({kind}): {count}");
    }
    if report.overlapped > 0 {
        println!("dropped as overlapping: {}", report.overlapped);
    }
}

fn run_inspect(source: Option<&dyn ByteSource>, offset: u64, format: Option<&str>) -> Result<()> {
    let source = require(source)?;
    let formats = match format {
        Some(name) => match Format::from_name(name) {
            Some(format) => vec![format],
            None => bail!("unknown format '{name}'"),
        },
        None => SignatureRegistry::with_defaults().identify(source, offset),
    };
    if formats.is_empty() {
        bail!("no known signature at 0x{offset:X}");
    }

    for format in formats {
        match Walker::new(format, WalkLimits::default()).check(source, offset) {
            Ok(finding) => print_finding(&finding),
            Err(err) => println!("{}: rejected ({}): {err}", format.name(), err.kind()),
        }
    }
    Ok(())
}

fn print_finding(finding: &Finding) {
    println!(
        "{} at {:#x}..{:#x} ({} bytes)",
        finding.format.name(),
        finding.start,
        finding.end,
        finding.len()
    );
    if finding.possibly_truncated() {
        println!("  walk stopped at an unknown tag: {:?}", finding.termination);
    }
    if let FindingResult::StructuredObject(model) = &finding.result {
        match model {
            ParsedModel::Png(image) => print_png(image, finding.start),
            ParsedModel::Iso(summary) => {
                println!("  System:        {}", summary.system_identifier);
                println!("  Volume:        {}", summary.volume_identifier);
                println!(
                    "  Blocks:        {} x {}",
                    summary.volume_space_size, summary.logical_block_size
                );
                println!(
                    "  Volume set:    {} of {}",
                    summary.volume_sequence_number, summary.volume_set_size
                );
                println!("  Created:       {}", summary.creation_date);
                println!("  Descriptors:   {:?}", summary.descriptors);
                println!(
                    "  Root:          block {} ({} bytes)",
                    summary.root_extent, summary.root_size
                );
            }
        }
    }
}

fn print_png(image: &PngImage, base: u64) {
    if let Some(ihdr) = &image.ihdr {
        println!("  Width:         {}", ihdr.width);
        println!("  Height:        {}", ihdr.height);
        println!("  Bit depth:     {}", ihdr.bit_depth_description());
        println!("  Color type:    {}", ihdr.color_type_description());
        println!("  Compression:   {}", ihdr.compression_method_description());
        println!("  Filter:        {}", ihdr.filter_method_description());
        println!("  Interlace:     {}", ihdr.interlace_method_description());
    }
    for (keyword, text) in image.text_entries() {
        println!("  {keyword}: {text}");
    }
    for zone in image.layout() {
        println!(
            "  {:>#12x}..{:<#12x} {}",
            base + zone.range.start,
            base + zone.range.end,
            zone.label
        );
    }
    let mismatches = image.crc_mismatches().count();
    if mismatches > 0 {
        println!("  {mismatches} chunk(s) with a CRC mismatch");
    }
}

fn run_tree(source: Option<&dyn ByteSource>, offset: u64, path: Option<&str>) -> Result<()> {
    let source = require(source)?;
    let limits = WalkLimits::default();
    let image = IsoImage::open(source, offset, &limits)
        .with_context(|| format!("no ISO9660 image at 0x{offset:X}"))?;
    let mut tree = image.tree(source, limits);

    let items = match path {
        Some(path) => {
            if !tree.begin_iteration(path) {
                bail!("'{path}' is not a readable directory");
            }
            std::iter::from_fn(|| tree.next_item()).collect()
        }
        None => tree.walk_all(),
    };

    for item in items {
        let marker = if item.is_directory { "/" } else { "" };
        let (flags, recorded) = tree
            .record(item.node)
            .map(|r| (r.flags.to_string(), r.recorded_at.to_string()))
            .unwrap_or_default();
        println!(
            "{:<6} {:>12} {:<26} {}{}{}",
            flags,
            item.size,
            recorded,
            "  ".repeat(item.depth),
            item.name,
            marker
        );
    }
    println!("\n{} distinct records", tree.len());
    Ok(())
}

fn list_signatures() {
    println!(
        "{:<16} {:<9} {:<10} {:>8}  {}",
        "FORMAT", "CATEGORY", "EXTENSION", "OFFSET", "PATTERN"
    );
    println!("{}", "-".repeat(66));
    for sig in SignatureRegistry::with_defaults().signatures() {
        println!(
            "{:<16} {:<9} {:<10} {:>#8x}  {}",
            sig.format().name(),
            sig.format().category(),
            sig.format().extension(),
            sig.pattern_offset(),
            hex::encode_upper(sig.pattern())
        );
    }
}
