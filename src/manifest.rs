use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// One sample: the photo and the color mask that labels it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub image: PathBuf,
    pub mask: PathBuf,
}

impl ImagePair {
    pub fn new(image: impl Into<PathBuf>, mask: impl Into<PathBuf>) -> Self {
        Self { image: image.into(), mask: mask.into() }
    }
}

/// Path of the split listing, e.g. `<root>/ImageSets/Segmentation/train.txt`.
pub fn manifest_path(root: &Path, split: &str) -> PathBuf {
    root.join("ImageSets")
        .join("Segmentation")
        .join(format!("{}.txt", split))
}

/// Image and mask paths for one sample name in a VOC-style tree.
pub fn pair_for(root: &Path, name: &str) -> ImagePair {
    ImagePair::new(
        root.join("JPEGImages").join(format!("{}.jpg", name)),
        root.join("SegmentationClass").join(format!("{}.png", name)),
    )
}

/// Parse a split listing: sample names separated by any whitespace.
pub fn parse_manifest(root: &Path, contents: &str) -> Vec<ImagePair> {
    contents
        .split_whitespace()
        .map(|name| pair_for(root, name))
        .collect()
}

/// Read the listing for `split` and build its image/mask pairs in listing order.
/// Files are not checked here; missing ones are skipped during conversion.
pub fn read_split(root: &Path, split: &str) -> Result<Vec<ImagePair>> {
    let path = manifest_path(root, split);
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    Ok(parse_manifest(root, &contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_layout() {
        let root = PathBuf::from("/voc");
        let pairs = parse_manifest(&root, "2007_000032\n2007_000039\r\n\n  2007_000063 ");
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].image, PathBuf::from("/voc/JPEGImages/2007_000032.jpg"));
        assert_eq!(pairs[0].mask, PathBuf::from("/voc/SegmentationClass/2007_000032.png"));
        assert_eq!(pairs[2].image, PathBuf::from("/voc/JPEGImages/2007_000063.jpg"));
    }

    #[test]
    fn test_read_split() {
        let root = std::env::temp_dir().join("fcn_records_test_manifest");
        let _ = fs::remove_dir_all(&root);
        let listing = manifest_path(&root, "val");
        fs::create_dir_all(listing.parent().unwrap()).unwrap();
        fs::write(&listing, "a\nb\n").unwrap();

        let pairs = read_split(&root, "val").unwrap();
        assert_eq!(pairs, vec![pair_for(&root, "a"), pair_for(&root, "b")]);

        let err = read_split(&root, "train").unwrap_err();
        assert!(err.to_string().contains("Failed to read manifest"));

        let _ = fs::remove_dir_all(&root);
    }
}
