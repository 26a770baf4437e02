//! pdfimages - Extract embedded images from PDF files
//!
//! Writes every image painted on every page, in page order, into an output
//! directory as `{prefix}_{page}_{index}.{ext}`. JPEG, JPEG 2000, CCITT and
//! JBIG2 payloads are written as is; other images are written as their
//! decoded sample bytes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use memmap2::Mmap;
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use pluck_core::api::{
    ExtractConfig, ExtractionReport, FsSink, ImageListing, extract_document, list_document_images,
};
use pluck_core::document::PDFDocument;

/// Extract embedded images from PDF files.
#[derive(Parser, Debug)]
#[command(name = "pdfimages")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory the images are written to
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// File name prefix (default: the stem of each input file)
    #[arg(short = 'p', long)]
    prefix: Option<String>,

    /// Replace files that already exist
    #[arg(long, action = ArgAction::SetTrue)]
    overwrite: bool,

    /// Page workers (1 = sequential, 0 = one per CPU)
    #[arg(short = 'j', long, default_value = "1")]
    jobs: usize,

    /// Print the images instead of writing them
    #[arg(long, action = ArgAction::SetTrue)]
    list: bool,

    /// Print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Maximum form XObject nesting depth
    #[arg(long = "max-depth", default_value = "64")]
    max_depth: usize,

    /// Rebuild broken cross-reference data by scanning the file
    #[arg(long, action = ArgAction::SetTrue)]
    recover: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config_for(&self, path: &Path) -> ExtractConfig {
        ExtractConfig {
            prefix: self
                .prefix
                .clone()
                .unwrap_or_else(|| ExtractConfig::prefix_from_path(path)),
            overwrite: self.overwrite,
            threads: self.jobs,
            max_form_depth: self.max_depth,
            recover_xref: self.recover,
            ..Default::default()
        }
    }
}

const fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[derive(Debug, Serialize)]
struct FileReport<'a> {
    file: &'a Path,
    report: ExtractionReport,
}

#[derive(Debug, Serialize)]
struct FileListing<'a> {
    file: &'a Path,
    images: Vec<ImageListing>,
}

fn open(path: &Path, config: &ExtractConfig) -> Result<PDFDocument> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    // SAFETY: the mapping is read-only and the file is not modified while mapped
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("cannot map {}", path.display()))?;
    PDFDocument::new_from_mmap(mmap, config.reader_options())
        .with_context(|| format!("cannot read {}", path.display()))
}

fn extract_file(path: &Path, args: &Args) -> Result<ExtractionReport> {
    let config = args.config_for(path);
    let doc = open(path, &config)?;
    let mut sink = FsSink::new(&args.output_dir, config.overwrite)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;
    extract_document(&doc, &config, &mut sink)
        .with_context(|| format!("extraction failed for {}", path.display()))
}

fn list_file(path: &Path, args: &Args) -> Result<Vec<ImageListing>> {
    let config = args.config_for(path);
    let doc = open(path, &config)?;
    Ok(list_document_images(&doc, &config))
}

fn write_summary<W: Write>(out: &mut W, path: &Path, report: &ExtractionReport) -> io::Result<()> {
    write!(
        out,
        "{}: {} images ({} written, {} skipped)",
        path.display(),
        report.count,
        report.written,
        report.skipped_existing
    )?;
    if report.images_failed > 0 {
        write!(out, ", {} failed", report.images_failed)?;
    }
    if report.write_failed > 0 {
        write!(out, ", {} write failures", report.write_failed)?;
    }
    if report.encrypted {
        write!(out, ", encrypted")?;
    }
    writeln!(out)
}

fn write_table<W: Write>(out: &mut W, images: &[ImageListing]) -> io::Result<()> {
    writeln!(
        out,
        "page   num  type   width height color comp bpc  object  filters"
    )?;
    writeln!(
        out,
        "-----------------------------------------------------------------"
    )?;
    for image in images {
        let object = image
            .objid
            .map_or_else(|| "inline".to_string(), |id| format!("{id} 0"));
        let bpc = image
            .bits_per_component
            .map_or_else(|| "-".to_string(), |bpc| bpc.to_string());
        let comp = image
            .components
            .map_or_else(|| "-".to_string(), |comp| comp.to_string());
        writeln!(
            out,
            "{:>4} {:>5}  {:<6} {:>5} {:>6} {:<5} {:>4} {:>3}  {:<7} {}",
            image.page,
            image.index,
            image.native.as_str(),
            image.width,
            image.height,
            image.color.as_deref().unwrap_or("-"),
            comp,
            bpc,
            object,
            image.filters.join(" ")
        )?;
    }
    Ok(())
}

/// Process every input file, returning how many failed.
fn run<W: Write>(args: &Args, out: &mut W) -> Result<usize> {
    let mut failures = 0;
    let mut reports = Vec::new();
    let mut listings = Vec::new();

    for path in &args.files {
        if args.list {
            match list_file(path, args) {
                Ok(images) if args.json => listings.push(FileListing { file: path, images }),
                Ok(images) => {
                    if args.files.len() > 1 {
                        writeln!(out, "{}:", path.display())?;
                    }
                    write_table(out, &images)?;
                }
                Err(err) => {
                    eprintln!("Error: {err:#}");
                    failures += 1;
                }
            }
            continue;
        }

        match extract_file(path, args) {
            Ok(report) if args.json => reports.push(FileReport { file: path, report }),
            Ok(report) => write_summary(out, path, &report)?,
            Err(err) => {
                eprintln!("Error: {err:#}");
                failures += 1;
            }
        }
    }

    if args.json {
        if args.list {
            serde_json::to_writer_pretty(&mut *out, &listings)?;
        } else {
            serde_json::to_writer_pretty(&mut *out, &reports)?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(failures)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(args.verbose))
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut out = BufWriter::new(io::stdout().lock());
    let failures = run(&args, &mut out)?;
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
