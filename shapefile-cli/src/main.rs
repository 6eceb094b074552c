//! Shapefile CLI - Command-line tool for reading ESRI Shapefiles
//!
//! This binary provides command-line interfaces for:
//! - info: header summary and attribute schema
//! - geojson: convert records to a GeoJSON FeatureCollection or NDJSON features
//! - validate: check every shape against its own and the file's bounding box

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use shapefile_io::{open, CharacterDecoder, DecodeOpts, FileScanner, Info, Validate};
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "shp")]
#[command(about = "Streaming ESRI Shapefile reader")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the shape type, record count, extent and fields
    ///
    /// Examples:
    ///   shp info countries.shp
    ///   shp info countries.zip --format json
    Info {
        /// Shapefile path (.shp, .dbf, or .zip)
        input: PathBuf,
        /// Output format (table, json)
        #[arg(long, value_enum, default_value_t = InfoFormat::Table)]
        format: InfoFormat,
    },
    /// Convert records to GeoJSON
    ///
    /// Examples:
    ///   shp geojson countries.zip -o countries.geojson
    ///   shp geojson countries.shp --ndjson --fields NAME,POP_EST --precision 6
    Geojson {
        /// Shapefile path (.shp, .dbf, or .zip)
        input: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write one Feature per line instead of a FeatureCollection
        #[arg(long)]
        ndjson: bool,
        /// Only include these attribute fields
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Round coordinates to this many decimal digits
        #[arg(long)]
        precision: Option<u32>,
        /// Character set for text fields when no .cpg is present
        #[arg(long)]
        charset: Option<String>,
        /// Show progress spinner while converting
        #[arg(long)]
        progress: bool,
    },
    /// Validate every shape against its bounding boxes
    Validate {
        /// Shapefile path (.shp, .dbf, or .zip)
        input: PathBuf,
        /// Character set for text fields when no .cpg is present
        #[arg(long)]
        charset: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum InfoFormat {
    Table,
    Json,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { input, format } => {
            handle_info(input, format)?;
        }
        Commands::Geojson {
            input,
            output,
            ndjson,
            fields,
            precision,
            charset,
            progress,
        } => {
            let opts = build_opts(fields, precision, charset.as_deref())?;
            handle_geojson(input, output, ndjson, opts, progress)?;
        }
        Commands::Validate { input, charset } => {
            let opts = build_opts(Vec::new(), None, charset.as_deref())?;
            handle_validate(input, opts)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn build_opts(
    fields: Vec<String>,
    precision: Option<u32>,
    charset: Option<&str>,
) -> Result<DecodeOpts, Box<dyn Error>> {
    let mut opts = DecodeOpts::default().with_fields(fields);
    if let Some(precision) = precision {
        opts = opts.with_precision(precision);
    }
    if let Some(label) = charset {
        let decoder = CharacterDecoder::for_label(label)
            .ok_or_else(|| format!("unknown charset '{}'", label))?;
        opts = opts.with_character_decoder(decoder);
    }
    Ok(opts)
}

/// Attach the input path to a library error.
fn in_path<T>(path: &Path, result: shapefile_io::Result<T>) -> Result<T, Box<dyn Error>> {
    result.map_err(|e| format!("{}: {}", path.display(), e).into())
}

fn open_scanner(path: &Path, opts: DecodeOpts) -> Result<(FileScanner, Info), Box<dyn Error>> {
    let mut scanner = in_path(path, open(path, opts))?;
    let info = in_path(path, scanner.info())?;
    Ok((scanner, info))
}

fn handle_info(input: PathBuf, format: InfoFormat) -> Result<(), Box<dyn Error>> {
    let (_, info) = open_scanner(&input, DecodeOpts::default())?;
    let summary = InfoSummary::from(&info);

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    match format {
        InfoFormat::Table => print_info_table(&mut writer, &summary)?,
        InfoFormat::Json => print_info_json(&mut writer, &summary)?,
    }
    Ok(())
}

fn handle_geojson(
    input: PathBuf,
    output: Option<PathBuf>,
    ndjson: bool,
    opts: DecodeOpts,
    show_progress: bool,
) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let requested = opts.fields.clone();
    let (mut scanner, info) = open_scanner(&input, opts)?;
    if let Some(missing) = requested.iter().find(|name| !info.field_exists(name)) {
        return Err(format!("{}: unknown field '{}'", input.display(), missing).into());
    }
    in_path(&input, scanner.scan())?;

    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    let format = if ndjson {
        GeoJsonFormat::Ndjson
    } else {
        GeoJsonFormat::FeatureCollection
    };
    let mut writer = FeatureWriter::with_writer(format, sink)?;

    let progress_bar = show_progress.then(|| create_spinner("Converting records"));
    let mut written = 0u64;
    for record in scanner.records() {
        let record = in_path(&input, record)?;
        writer.write_feature(&record.to_geojson_feature())?;
        written += 1;
        if let Some(pb) = &progress_bar {
            pb.inc(1);
        }
    }
    writer.finish()?;

    let elapsed = start.elapsed();
    if let Some(pb) = progress_bar {
        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        pb.finish_with_message(format!(
            "Converted {} records in {:.2?} ({:.1} rec/s)",
            written,
            elapsed,
            written as f64 / secs
        ));
    }
    tracing::debug!(records = written, elapsed = ?elapsed, "geojson conversion finished");
    Ok(())
}

fn handle_validate(input: PathBuf, opts: DecodeOpts) -> Result<(), Box<dyn Error>> {
    let (mut scanner, info) = open_scanner(&input, opts)?;
    let validator = in_path(&input, scanner.validator())?;
    in_path(&input, scanner.scan())?;

    let mut shapes = 0u32;
    let mut nulls = 0u32;
    for record in scanner.records() {
        let record = in_path(&input, record)?;
        match &record.shape {
            Some(shape) => {
                shape.validate(&validator).map_err(|e| {
                    format!("{}: record {}: {}", input.display(), record.number(), e)
                })?;
                shapes += 1;
            }
            None => nulls += 1,
        }
    }

    println!(
        "{}: {} {} shapes valid ({} null)",
        input.display(),
        shapes,
        info.shape_type,
        nulls
    );
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize)]
struct InfoSummary {
    shape_type: String,
    records: u32,
    bounding_box: [f64; 4],
    fields: Vec<FieldSummary>,
}

#[derive(Debug, Clone, serde::Serialize)]
struct FieldSummary {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    length: u8,
}

impl From<&Info> for InfoSummary {
    fn from(info: &Info) -> Self {
        Self {
            shape_type: info.shape_type.to_string(),
            records: info.num_records,
            bounding_box: info.bounding_box.to_array(),
            fields: info
                .fields
                .iter()
                .map(|f| FieldSummary {
                    name: f.name().to_string(),
                    field_type: f.field_type().to_string(),
                    length: f.length(),
                })
                .collect(),
        }
    }
}

fn print_info_table(writer: &mut dyn Write, summary: &InfoSummary) -> Result<(), Box<dyn Error>> {
    let [min_x, min_y, max_x, max_y] = summary.bounding_box;
    writeln!(writer, "Shape type:\t{}", summary.shape_type)?;
    writeln!(writer, "Records:\t{}", summary.records)?;
    writeln!(
        writer,
        "Bounding box:\t[{}, {}, {}, {}]",
        min_x, min_y, max_x, max_y
    )?;
    writeln!(writer)?;
    writeln!(writer, "Field\tType\tLength")?;
    for field in &summary.fields {
        writeln!(writer, "{}\t{}\t{}", field.name, field.field_type, field.length)?;
    }
    Ok(())
}

fn print_info_json(writer: &mut dyn Write, summary: &InfoSummary) -> Result<(), Box<dyn Error>> {
    serde_json::to_writer_pretty(&mut *writer, summary)?;
    writeln!(writer)?;
    Ok(())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum GeoJsonFormat {
    FeatureCollection,
    Ndjson,
}

struct FeatureWriter {
    format: GeoJsonFormat,
    writer: Box<dyn Write>,
    first: bool,
}

impl FeatureWriter {
    fn with_writer(format: GeoJsonFormat, mut writer: Box<dyn Write>) -> Result<Self, Box<dyn Error>> {
        if format == GeoJsonFormat::FeatureCollection {
            writer.write_all(br#"{"type":"FeatureCollection","features":["#)?;
        }

        Ok(Self {
            format,
            writer,
            first: true,
        })
    }

    fn write_feature(&mut self, feature: &Value) -> Result<(), Box<dyn Error>> {
        match self.format {
            GeoJsonFormat::Ndjson => {
                serde_json::to_writer(&mut self.writer, feature)?;
                self.writer.write_all(b"\n")?;
            }
            GeoJsonFormat::FeatureCollection => {
                if !self.first {
                    self.writer.write_all(b",")?;
                }
                serde_json::to_writer(&mut self.writer, feature)?;
            }
        }
        self.first = false;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn Error>> {
        if self.format == GeoJsonFormat::FeatureCollection {
            self.writer.write_all(b"]}\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {pos} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
