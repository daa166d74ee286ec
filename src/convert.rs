use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::lookup::ColorLookupTable;
use crate::core::mask::decode_mask_bytes;
use crate::core::palette::ClassPalette;
use crate::core::record::{build_record, BuildOutcome, SegmentationRecord};
use crate::core::tfrecord::RecordWriter;
use crate::manifest::{read_split, ImagePair};

/// Pairs between progress lines, counted by position in the manifest.
const PROGRESS_EVERY: usize = 100;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Dataset root containing ImageSets/, JPEGImages/ and SegmentationClass/
    #[arg(long)]
    pub data_dir: PathBuf,

    /// Directory for fcn_<split>.record files and summary.json
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Smallest accepted mask height and width (the training crop size)
    #[arg(long, default_value_t = 224)]
    pub min_dimension: u32,

    /// Splits to convert, each listed in ImageSets/Segmentation/<split>.txt
    #[arg(long, value_delimiter = ',', default_values = ["train", "val"])]
    pub splits: Vec<String>,

    /// JSON palette file: [{"name": .., "color": [r, g, b]}, ..] (default: PASCAL VOC)
    #[arg(long)]
    pub palette: Option<PathBuf>,

    /// Maximum number of pairs per split (0 = all, for testing)
    #[arg(long, default_value_t = 0)]
    pub max_pairs: usize,
}

/// Why a pair produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingFile(PathBuf),
    TooSmall { height: u32, width: u32 },
    InvalidPair(String),
}

/// What one pair turned into before it reaches the output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Ready(SegmentationRecord),
    Skipped(SkipReason),
}

/// Counters for one converted split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitStats {
    pub pairs: usize,
    pub written: usize,
    pub missing_file: usize,
    pub too_small: usize,
    pub invalid_pair: usize,
    pub bytes: u64,
}

impl SplitStats {
    pub fn skipped(&self) -> usize {
        self.missing_file + self.too_small + self.invalid_pair
    }

    fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::MissingFile(_) => self.missing_file += 1,
            SkipReason::TooSmall { .. } => self.too_small += 1,
            SkipReason::InvalidPair(_) => self.invalid_pair += 1,
        }
    }
}

/// Turns image/mask pairs into records. Holds the lookup table, which is
/// built once and only read afterwards, so one converter serves all workers.
pub struct Converter {
    table: ColorLookupTable,
    min_dimension: u32,
}

impl Converter {
    pub fn new(palette: &ClassPalette, min_dimension: u32) -> Self {
        Self {
            table: ColorLookupTable::build(palette),
            min_dimension,
        }
    }

    /// Validate, decode and build one pair. Every failure stays inside the
    /// returned outcome and is logged against this pair's paths.
    pub fn prepare_pair(&self, pair: &ImagePair) -> PairOutcome {
        for path in [&pair.image, &pair.mask] {
            if !path.exists() {
                warn!("Could not find {}, ignoring file pair.", path.display());
                return PairOutcome::Skipped(SkipReason::MissingFile(path.clone()));
            }
        }

        match self.decode_and_build(pair) {
            Ok(BuildOutcome::Record(record)) => PairOutcome::Ready(record),
            Ok(BuildOutcome::TooSmall { height, width }) => {
                info!(
                    "{}: mask is {}x{}, smaller than {}; skipping.",
                    pair.mask.display(),
                    width,
                    height,
                    self.min_dimension
                );
                PairOutcome::Skipped(SkipReason::TooSmall { height, width })
            }
            Err(e) => {
                warn!(
                    "Invalid file pair: {} & {} ({:#}), ignoring.",
                    pair.image.display(),
                    pair.mask.display(),
                    e
                );
                PairOutcome::Skipped(SkipReason::InvalidPair(format!("{:#}", e)))
            }
        }
    }

    fn decode_and_build(&self, pair: &ImagePair) -> Result<BuildOutcome> {
        let Some(filename) = pair.image.file_name().and_then(OsStr::to_str) else {
            bail!("image file name {} is not valid UTF-8", pair.image.display());
        };
        let image_bytes = fs::read(&pair.image)
            .with_context(|| format!("Failed to read image {}", pair.image.display()))?;
        let mask_bytes = fs::read(&pair.mask)
            .with_context(|| format!("Failed to read mask {}", pair.mask.display()))?;
        let labels = decode_mask_bytes(&mask_bytes, &self.table)
            .with_context(|| format!("Failed to decode mask {}", pair.mask.display()))?;
        Ok(build_record(image_bytes, labels, self.min_dimension, filename))
    }

    /// Convert `pairs` into a new record file at `output`.
    pub fn create_records(&self, output: &Path, pairs: &[ImagePair]) -> Result<SplitStats> {
        let writer = RecordWriter::create(output)?;
        let (stats, _) = self
            .write_records(writer, pairs)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        Ok(stats)
    }

    /// Convert pairs in parallel, streaming each finished record into `writer`.
    ///
    /// The writer sits behind a lock so frames are written whole; record order
    /// follows completion, not manifest order. Per-pair problems are counted
    /// and skipped. The first write error stops further work and is returned.
    pub fn write_records<W: Write + Send>(
        &self,
        writer: RecordWriter<W>,
        pairs: &[ImagePair],
    ) -> Result<(SplitStats, W)> {
        let total = pairs.len();

        struct WriteState<W: Write> {
            writer: RecordWriter<W>,
            stats: SplitStats,
            first_error: Option<anyhow::Error>,
        }
        let write_state = Mutex::new(WriteState {
            writer,
            stats: SplitStats { pairs: total, ..SplitStats::default() },
            first_error: None,
        });
        let lock = || write_state.lock().unwrap_or_else(PoisonError::into_inner);

        pairs.par_iter().enumerate().for_each(|(idx, pair)| {
            if lock().first_error.is_some() {
                return;
            }
            if idx % PROGRESS_EVERY == 0 {
                info!("On image {} of {}", idx, total);
            }
            debug!("pair {}: {} & {}", idx, pair.image.display(), pair.mask.display());

            let record = match self.prepare_pair(pair) {
                PairOutcome::Ready(record) => record,
                PairOutcome::Skipped(reason) => {
                    lock().stats.record_skip(&reason);
                    return;
                }
            };
            let bytes = record.serialize();

            let mut state = lock();
            if state.first_error.is_some() {
                return;
            }
            match state.writer.write_record(&bytes) {
                Ok(()) => state.stats.written += 1,
                Err(e) => {
                    state.first_error =
                        Some(e.context(format!("while writing record for {}", pair.image.display())));
                }
            }
        });

        let state = write_state.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = state.first_error {
            return Err(e);
        }
        let mut stats = state.stats;
        stats.bytes = state.writer.bytes_written();
        let out = state.writer.finish()?;
        Ok((stats, out))
    }
}

/// Output file for a split, e.g. `<out>/fcn_train.record`.
pub fn record_path(output_dir: &Path, split: &str) -> PathBuf {
    output_dir.join(format!("fcn_{}.record", split))
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let start = Instant::now();

    if args.splits.is_empty() {
        return Err(anyhow!("No splits given"));
    }

    let palette = match &args.palette {
        Some(path) => ClassPalette::from_json_file(path)?,
        None => ClassPalette::pascal_voc(),
    };
    info!("Palette: {} classes, min_dimension={}", palette.len(), args.min_dimension);

    let converter = Converter::new(&palette, args.min_dimension);
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    let mut splits = serde_json::Map::new();
    for split in &args.splits {
        let mut pairs = read_split(&args.data_dir, split)?;
        if args.max_pairs > 0 && pairs.len() > args.max_pairs {
            pairs.truncate(args.max_pairs);
            info!("Limited split '{}' to {} pairs (--max-pairs)", split, args.max_pairs);
        }

        let output = record_path(&args.output_dir, split);
        info!("Converting {} pairs of split '{}' into {}", pairs.len(), split, output.display());
        let split_start = Instant::now();
        let stats = converter.create_records(&output, &pairs)?;

        info!(
            "Split '{}': wrote {} of {} records ({:.1}MB) in {:.1}s, skipped {} (missing={} too_small={} invalid={})",
            split,
            stats.written,
            stats.pairs,
            stats.bytes as f64 / 1_048_576.0,
            split_start.elapsed().as_secs_f64(),
            stats.skipped(),
            stats.missing_file,
            stats.too_small,
            stats.invalid_pair,
        );
        splits.insert(split.clone(), serde_json::to_value(&stats)?);
    }

    let summary = serde_json::json!({
        "data_dir": args.data_dir.to_string_lossy(),
        "min_dimension": args.min_dimension,
        "classes": palette.entries().iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        "splits": splits,
        "elapsed_secs": start.elapsed().as_secs_f64(),
    });
    let summary_path = args.output_dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    info!("Wrote {}", summary_path.display());

    Ok(())
}
