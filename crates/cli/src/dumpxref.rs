//! dumpxref - Inspect the cross-reference index of a PDF file
//!
//! Prints the merged trailer, the chain of sections that was followed and
//! every indexed object, either as text or as JSON. Broken files are
//! repaired unless `--strict` is given.

use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use memmap2::Mmap;
use pdfloc_core::xref::{CrossReferenceType, XrefEntry};
use pdfloc_core::{LinearizationParameters, ObjectId, ParsingOptions, PdfIndex};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Inspect the cross-reference index of a PDF file.
#[derive(Parser, Debug)]
#[command(name = "dumpxref")]
#[command(author, version, about = "Dump the cross-reference index of a PDF file", long_about = None)]
struct Args {
    /// Path to the PDF file
    file: PathBuf,

    /// Fail instead of repairing broken cross-reference data
    #[arg(short = 's', long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Emit JSON instead of text
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,

    /// Print these objects (`N` or `N.G`, comma-separated)
    #[arg(short = 'o', long = "object", value_delimiter = ',')]
    objects: Vec<String>,

    /// Print the linearization parameters, if any
    #[arg(short = 'l', long, action = ArgAction::SetTrue)]
    linearization: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Report {
    file: String,
    length: u64,
    kind: &'static str,
    fallback: bool,
    chain: Vec<ChainEntry>,
    trailer: Vec<(String, String)>,
    entries: Vec<EntryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linearization: Option<LinearizationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    objects: Vec<ObjectReport>,
}

#[derive(Serialize)]
struct ChainEntry {
    offset: u64,
    previous: Option<u64>,
    kind: &'static str,
}

#[derive(Serialize)]
struct EntryReport {
    objid: u32,
    genno: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<u32>,
}

#[derive(Serialize)]
struct LinearizationReport {
    object: String,
    version: f64,
    file_length: u64,
    length_matches: bool,
    hint_streams: Vec<(u64, u64)>,
    first_page_object: u32,
    first_page_end: u64,
    page_count: u32,
    main_xref_offset: u64,
}

#[derive(Serialize)]
struct ObjectReport {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

const fn kind_name(kind: CrossReferenceType) -> &'static str {
    match kind {
        CrossReferenceType::Table => "table",
        CrossReferenceType::Stream => "stream",
    }
}

/// Parse `N` or `N.G`.
fn parse_object_id(spec: &str) -> anyhow::Result<ObjectId> {
    let spec = spec.trim();
    let (objid, genno) = match spec.split_once('.') {
        Some((objid, genno)) => (objid, genno),
        None => (spec, "0"),
    };
    let objid = objid
        .parse()
        .with_context(|| format!("invalid object number in {spec:?}"))?;
    let genno = genno
        .parse()
        .with_context(|| format!("invalid generation in {spec:?}"))?;
    Ok(ObjectId::new(objid, genno))
}

fn log_dispatch(verbose: u8) -> Dispatch {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    Dispatch::new(subscriber)
}

fn linearization_report(params: &LinearizationParameters, length: u64) -> LinearizationReport {
    LinearizationReport {
        object: params.id.to_string(),
        version: params.version,
        file_length: params.file_length,
        length_matches: params.matches_length(length),
        hint_streams: params.hint_streams.clone(),
        first_page_object: params.first_page_objid,
        first_page_end: params.first_page_end,
        page_count: params.page_count,
        main_xref_offset: params.main_xref_offset,
    }
}

fn object_report(index: &PdfIndex, id: ObjectId) -> ObjectReport {
    match index.get_object(id) {
        Ok(object) => ObjectReport {
            id: id.to_string(),
            offset: Some(object.offset),
            value: Some(object.object.to_string()),
            error: None,
        },
        Err(err) => ObjectReport {
            id: id.to_string(),
            offset: None,
            value: None,
            error: Some(err.to_string()),
        },
    }
}

fn build_report(args: &Args, index: &PdfIndex, objects: &[ObjectId]) -> Report {
    let table = index.table();

    let chain = table
        .chain()
        .iter()
        .map(|section| ChainEntry {
            offset: section.offset,
            previous: section.previous,
            kind: kind_name(section.kind),
        })
        .collect();

    let trailer = table
        .trailer()
        .dictionary()
        .iter()
        .map(|(key, value)| (key.clone(), value.to_string()))
        .collect();

    let entries = table
        .object_ids()
        .into_iter()
        .filter_map(|id| {
            let entry = table.get(&id)?;
            Some(match *entry {
                XrefEntry::InFile(offset) => EntryReport {
                    objid: id.objid,
                    genno: id.genno,
                    offset: Some(offset),
                    stream: None,
                    index: None,
                },
                XrefEntry::Compressed {
                    stream_objid,
                    index,
                } => EntryReport {
                    objid: id.objid,
                    genno: id.genno,
                    offset: None,
                    stream: Some(stream_objid),
                    index: Some(index),
                },
            })
        })
        .collect();

    let linearization = if args.linearization {
        index
            .linearization()
            .map(|params| linearization_report(params, index.len()))
    } else {
        None
    };

    Report {
        file: args.file.display().to_string(),
        length: index.len(),
        kind: kind_name(table.kind()),
        fallback: table.is_fallback(),
        chain,
        trailer,
        entries,
        linearization,
        objects: objects.iter().map(|&id| object_report(index, id)).collect(),
    }
}

fn write_text<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
    writeln!(out, "file: {} ({} bytes)", report.file, report.length)?;
    if report.fallback {
        writeln!(out, "index: rebuilt from object headers")?;
    } else {
        writeln!(out, "index: {} ({} sections)", report.kind, report.chain.len())?;
    }
    for section in &report.chain {
        match section.previous {
            Some(previous) => writeln!(
                out,
                "  {} at {} -> prev {}",
                section.kind, section.offset, previous
            )?,
            None => writeln!(out, "  {} at {}", section.kind, section.offset)?,
        }
    }

    writeln!(out, "trailer:")?;
    for (key, value) in &report.trailer {
        writeln!(out, "  /{key} {value}")?;
    }

    if let Some(params) = &report.linearization {
        writeln!(out, "linearization: {} (version {})", params.object, params.version)?;
        writeln!(
            out,
            "  length {} ({})",
            params.file_length,
            if params.length_matches {
                "matches"
            } else {
                "stale"
            }
        )?;
        writeln!(
            out,
            "  pages {} first page {} ends {} main xref {}",
            params.page_count, params.first_page_object, params.first_page_end, params.main_xref_offset
        )?;
        for (offset, length) in &params.hint_streams {
            writeln!(out, "  hint stream at {offset} length {length}")?;
        }
    }

    writeln!(out, "objects: {}", report.entries.len())?;
    for entry in &report.entries {
        match (entry.offset, entry.stream, entry.index) {
            (Some(offset), _, _) => {
                writeln!(out, "  {:>6} {:>5} @ {offset}", entry.objid, entry.genno)?;
            }
            (None, Some(stream), Some(index)) => writeln!(
                out,
                "  {:>6} {:>5} in stream {stream}[{index}]",
                entry.objid, entry.genno
            )?,
            _ => {}
        }
    }

    for object in &report.objects {
        match (&object.value, &object.error) {
            (Some(value), _) => writeln!(
                out,
                "{} @ {}: {value}",
                object.id,
                object.offset.unwrap_or_default()
            )?,
            (None, Some(error)) => writeln!(out, "{}: error: {error}", object.id)?,
            _ => {}
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let objects = args
        .objects
        .iter()
        .map(|spec| parse_object_id(spec))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if !args.file.exists() {
        bail!("file not found: {}", args.file.display());
    }

    let options = if args.strict {
        ParsingOptions::strict()
    } else {
        ParsingOptions::default()
    }
    .with_dispatch(log_dispatch(args.verbose));

    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    // SAFETY: the mapping is read-only and lives as long as the index.
    let mmap = unsafe { Mmap::map(&file) }?;
    let index = PdfIndex::open_mmap(mmap, &options)
        .with_context(|| format!("cannot index {}", args.file.display()))?;

    let report = build_report(&args, &index, &objects);
    let mut out = BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        write_text(&mut out, &report)?;
    }
    out.flush()?;
    Ok(())
}
