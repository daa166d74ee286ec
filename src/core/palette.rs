use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Class ids are stored as one byte per pixel, so a palette holds at most 256 classes.
pub const MAX_CLASSES: usize = 256;

/// One class: its name and the RGB color it is painted with in masks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub name: String,
    pub color: [u8; 3],
}

/// Ordered list of classes. The position of an entry is its class id; id 0 is
/// background / unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPalette {
    entries: Vec<PaletteEntry>,
}

const VOC_CLASSES: [(&str, [u8; 3]); 21] = [
    ("background", [0, 0, 0]),
    ("aeroplane", [128, 0, 0]),
    ("bicycle", [0, 128, 0]),
    ("bird", [128, 128, 0]),
    ("boat", [0, 0, 128]),
    ("bottle", [128, 0, 128]),
    ("bus", [0, 128, 128]),
    ("car", [128, 128, 128]),
    ("cat", [64, 0, 0]),
    ("chair", [192, 0, 0]),
    ("cow", [64, 128, 0]),
    ("diningtable", [192, 128, 0]),
    ("dog", [64, 0, 128]),
    ("horse", [192, 0, 128]),
    ("motorbike", [64, 128, 128]),
    ("person", [192, 128, 128]),
    ("potted plant", [0, 64, 0]),
    ("sheep", [128, 64, 0]),
    ("sofa", [0, 192, 0]),
    ("train", [128, 192, 0]),
    ("tv/monitor", [0, 64, 128]),
];

impl ClassPalette {
    pub fn new(entries: Vec<PaletteEntry>) -> Result<Self> {
        if entries.is_empty() {
            bail!("palette must contain at least one class");
        }
        if entries.len() > MAX_CLASSES {
            bail!(
                "palette has {} classes, at most {} fit in a one-byte label",
                entries.len(),
                MAX_CLASSES
            );
        }
        Ok(Self { entries })
    }

    /// The 21-class PASCAL VOC segmentation palette.
    pub fn pascal_voc() -> Self {
        let entries = VOC_CLASSES
            .iter()
            .map(|(name, color)| PaletteEntry {
                name: (*name).to_string(),
                color: *color,
            })
            .collect();
        Self { entries }
    }

    /// Load a palette from a JSON array of `{"name": .., "color": [r, g, b]}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read palette {}", path.display()))?;
        let entries: Vec<PaletteEntry> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse palette {}", path.display()))?;
        Self::new(entries)
            .with_context(|| format!("Invalid palette {}", path.display()))
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn class_id(&self, name: &str) -> Option<u8> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(|i| i as u8)
    }

    pub fn name(&self, class_id: u8) -> Option<&str> {
        self.entries.get(class_id as usize).map(|e| e.name.as_str())
    }

    pub fn color(&self, class_id: u8) -> Option<[u8; 3]> {
        self.entries.get(class_id as usize).map(|e| e.color)
    }
}

impl Default for ClassPalette {
    fn default() -> Self {
        Self::pascal_voc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voc_palette_layout() {
        let palette = ClassPalette::pascal_voc();
        assert_eq!(palette.len(), 21);
        assert_eq!(palette.class_id("background"), Some(0));
        assert_eq!(palette.class_id("car"), Some(7));
        assert_eq!(palette.color(7), Some([128, 128, 128]));
        assert_eq!(palette.name(20), Some("tv/monitor"));
        assert_eq!(palette.name(21), None);
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(ClassPalette::new(Vec::new()).is_err());

        let too_many = (0..=MAX_CLASSES)
            .map(|i| PaletteEntry {
                name: format!("c{}", i),
                color: [i as u8, 0, 0],
            })
            .collect();
        let err = ClassPalette::new(too_many).unwrap_err();
        assert!(err.to_string().contains("at most 256"));
    }

    #[test]
    fn test_load_json_palette() {
        let dir = std::env::temp_dir().join("fcn_records_test_palette_json");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("palette.json");
        fs::write(
            &path,
            r#"[{"name": "void", "color": [0, 0, 0]}, {"name": "road", "color": [128, 64, 128]}]"#,
        )
        .unwrap();

        let palette = ClassPalette::from_json_file(&path).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.class_id("road"), Some(1));
        assert_eq!(palette.color(1), Some([128, 64, 128]));

        let _ = fs::remove_dir_all(&dir);
    }
}
