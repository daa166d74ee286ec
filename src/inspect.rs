use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::core::palette::ClassPalette;
use crate::core::record::SegmentationRecord;
use crate::core::tfrecord::RecordReader;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Record file written by `convert`
    #[arg(long)]
    pub records: PathBuf,

    /// JSON palette used for class names in the histogram (default: PASCAL VOC)
    #[arg(long)]
    pub palette: Option<PathBuf>,

    /// Stop after this many records (0 = all)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ClassPixels {
    pub class_id: u8,
    pub name: String,
    pub pixels: u64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct InspectReport {
    pub records: usize,
    pub min_height: u32,
    pub max_height: u32,
    pub min_width: u32,
    pub max_width: u32,
    pub formats: Vec<String>,
    pub classes: Vec<ClassPixels>,
}

/// Read every record back, checking checksums and the label-length invariant,
/// and tally per-class pixel counts.
pub fn inspect_records<I>(records: I, palette: &ClassPalette, limit: usize) -> Result<InspectReport>
where
    I: IntoIterator<Item = Result<Vec<u8>>>,
{
    let mut histogram = [0u64; 256];
    let mut report = InspectReport {
        records: 0,
        min_height: u32::MAX,
        max_height: 0,
        min_width: u32::MAX,
        max_width: 0,
        formats: Vec::new(),
        classes: Vec::new(),
    };

    for (idx, data) in records.into_iter().enumerate() {
        if limit > 0 && idx >= limit {
            break;
        }
        let record = SegmentationRecord::deserialize(&data?)
            .with_context(|| format!("record {} is not a valid segmentation example", idx))?;

        report.records += 1;
        report.min_height = report.min_height.min(record.height);
        report.max_height = report.max_height.max(record.height);
        report.min_width = report.min_width.min(record.width);
        report.max_width = report.max_width.max(record.width);
        if !report.formats.contains(&record.format) {
            report.formats.push(record.format.clone());
        }
        for &class_id in &record.label {
            histogram[class_id as usize] += 1;
        }
    }

    if report.records == 0 {
        report.min_height = 0;
        report.min_width = 0;
    }
    report.classes = histogram
        .iter()
        .enumerate()
        .filter(|(_, &pixels)| pixels > 0)
        .map(|(id, &pixels)| ClassPixels {
            class_id: id as u8,
            name: palette
                .name(id as u8)
                .map(str::to_string)
                .unwrap_or_else(|| format!("class_{}", id)),
            pixels,
        })
        .collect();
    Ok(report)
}

pub fn run(args: InspectArgs) -> Result<()> {
    let palette = match &args.palette {
        Some(path) => ClassPalette::from_json_file(path)?,
        None => ClassPalette::pascal_voc(),
    };
    info!("Inspecting {}", args.records.display());

    let reader = RecordReader::open(&args.records)?;
    let report = inspect_records(reader, &palette, args.limit)
        .with_context(|| format!("Failed to inspect {}", args.records.display()))?;
    info!("{} records OK", report.records);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mask::LabelGrid;
    use crate::core::record::{build_record, BuildOutcome};
    use crate::core::tfrecord::RecordWriter;

    fn record_bytes(width: u32, height: u32, labels: Vec<u8>) -> Vec<u8> {
        let grid = LabelGrid::new(width, height, labels).unwrap();
        match build_record(vec![1, 2, 3], grid, 1, "img.jpg") {
            BuildOutcome::Record(r) => r.serialize(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_report_histogram_and_bounds() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&record_bytes(2, 2, vec![0, 7, 7, 7])).unwrap();
        writer.write_record(&record_bytes(3, 1, vec![15, 15, 0])).unwrap();
        let buf = writer.finish().unwrap();

        let report =
            inspect_records(RecordReader::new(&buf[..]), &ClassPalette::pascal_voc(), 0).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!((report.min_height, report.max_height), (1, 2));
        assert_eq!((report.min_width, report.max_width), (2, 3));
        assert_eq!(report.formats, vec!["jpeg".to_string()]);
        assert_eq!(
            report.classes,
            vec![
                ClassPixels { class_id: 0, name: "background".into(), pixels: 2 },
                ClassPixels { class_id: 7, name: "car".into(), pixels: 3 },
                ClassPixels { class_id: 15, name: "person".into(), pixels: 2 },
            ]
        );
    }

    #[test]
    fn test_limit_and_bad_payload() {
        let records = || -> Vec<Result<Vec<u8>>> {
            vec![Ok(record_bytes(1, 1, vec![3])), Ok(b"\x0a\x03junk".to_vec())]
        };
        let palette = ClassPalette::pascal_voc();

        let report = inspect_records(records(), &palette, 1).unwrap();
        assert_eq!(report.records, 1);

        let err = inspect_records(records(), &palette, 0).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }
}
