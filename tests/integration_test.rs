use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{Rgb, RgbImage};

use fcn_records::convert::{self, record_path, ConvertArgs};
use fcn_records::manifest::{manifest_path, pair_for};
use fcn_records::{ClassPalette, RecordReader, SegmentationRecord};

fn dataset_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("fcn_records_it_{}", name));
    let _ = fs::remove_dir_all(&root);
    root
}

/// Write a VOC-style sample: a textured JPEG plus a mask painted in one color.
fn write_sample(root: &Path, name: &str, width: u32, height: u32, mask_color: [u8; 3]) {
    let pair = pair_for(root, name);
    fs::create_dir_all(pair.image.parent().unwrap()).unwrap();
    fs::create_dir_all(pair.mask.parent().unwrap()).unwrap();

    let photo = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    photo.save(&pair.image).unwrap();
    RgbImage::from_pixel(width, height, Rgb(mask_color))
        .save(&pair.mask)
        .unwrap();
}

fn write_listing(root: &Path, split: &str, names: &[&str]) {
    let path = manifest_path(root, split);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, names.join("\n")).unwrap();
}

fn args(root: &Path, splits: &[&str]) -> ConvertArgs {
    ConvertArgs {
        data_dir: root.to_path_buf(),
        output_dir: root.join("out"),
        min_dimension: 224,
        splits: splits.iter().map(|s| s.to_string()).collect(),
        palette: None,
        max_pairs: 0,
    }
}

fn read_records(path: &Path) -> Result<Vec<SegmentationRecord>> {
    RecordReader::open(path)?
        .map(|data| SegmentationRecord::deserialize(&data?))
        .collect()
}

#[test]
fn test_uniform_car_mask_end_to_end() -> Result<()> {
    let root = dataset_root("car");
    let car = ClassPalette::pascal_voc().color(7).unwrap();
    write_sample(&root, "2008_000001", 500, 500, car);
    write_listing(&root, "train", &["2008_000001"]);

    convert::run(args(&root, &["train"]))?;

    let records = read_records(&record_path(&root.join("out"), "train"))?;
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert_eq!(rec.height, 500);
    assert_eq!(rec.width, 500);
    assert_eq!(rec.format, "jpeg");
    assert_eq!(rec.filename, "2008_000001.jpg");
    assert_eq!(rec.label.len(), 250_000);
    assert!(rec.label.iter().all(|&c| c == 7));
    assert_eq!(rec.encoded, fs::read(pair_for(&root, "2008_000001").image)?);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn test_missing_image_skips_only_that_pair() -> Result<()> {
    let root = dataset_root("missing");
    let person = [192, 128, 128];
    for name in ["a", "b", "c"] {
        write_sample(&root, name, 240, 230, person);
    }
    write_listing(&root, "val", &["a", "b", "c"]);
    fs::remove_file(pair_for(&root, "b").image)?;

    convert::run(args(&root, &["val"]))?;

    let records = read_records(&record_path(&root.join("out"), "val"))?;
    let mut names: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a.jpg", "c.jpg"]);

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("out").join("summary.json"))?)?;
    assert_eq!(summary["splits"]["val"]["written"], 2);
    assert_eq!(summary["splits"]["val"]["missing_file"], 1);
    assert_eq!(summary["splits"]["val"]["too_small"], 0);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn test_train_and_val_with_small_and_unknown_colors() -> Result<()> {
    let root = dataset_root("splits");
    // VOC paints object outlines in (224, 224, 192), which is not a class.
    write_sample(&root, "outline", 256, 256, [224, 224, 192]);
    write_sample(&root, "thumb", 300, 200, [0, 0, 128]);
    write_sample(&root, "boat", 320, 240, [0, 0, 128]);
    write_listing(&root, "train", &["outline", "thumb"]);
    write_listing(&root, "val", &["boat"]);

    convert::run(args(&root, &["train", "val"]))?;

    let out = root.join("out");
    let train = read_records(&record_path(&out, "train"))?;
    assert_eq!(train.len(), 1);
    assert_eq!(train[0].filename, "outline.jpg");
    assert!(train[0].label.iter().all(|&c| c == 0));

    let val = read_records(&record_path(&out, "val"))?;
    assert_eq!(val.len(), 1);
    assert_eq!((val[0].height, val[0].width), (240, 320));
    let grid = val[0].label_grid()?;
    assert_eq!(grid.get(319, 239), Some(4));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("summary.json"))?)?;
    assert_eq!(summary["splits"]["train"]["too_small"], 1);
    assert_eq!(summary["classes"].as_array().map(|a| a.len()), Some(21));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn test_missing_manifest_is_an_error() {
    let root = dataset_root("no_manifest");
    fs::create_dir_all(&root).unwrap();
    let err = convert::run(args(&root, &["train"])).unwrap_err();
    assert!(err.to_string().contains("Failed to read manifest"));
    let _ = fs::remove_dir_all(&root);
}
