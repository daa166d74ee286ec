use anyhow::{anyhow, Context, Result};
use prost::Message as _;

use crate::core::example::{Example, Feature};
use crate::core::mask::LabelGrid;

pub const KEY_HEIGHT: &str = "image/height";
pub const KEY_WIDTH: &str = "image/width";
pub const KEY_FILENAME: &str = "image/filename";
pub const KEY_ENCODED: &str = "image/encoded";
pub const KEY_LABEL: &str = "image/label";
pub const KEY_FORMAT: &str = "image/format";

/// Format tag written into every record. Images are stored as read from disk.
pub const IMAGE_FORMAT: &str = "jpeg";

/// One training sample: the untouched image file and its per-pixel labels.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationRecord {
    pub height: u32,
    pub width: u32,
    pub filename: String,
    pub encoded: Vec<u8>,
    pub label: Vec<u8>,
    pub format: String,
}

/// Result of [`build_record`]: either a record or the reason it was filtered out.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Record(SegmentationRecord),
    TooSmall { height: u32, width: u32 },
}

/// Assemble a record from an image file's bytes and its decoded mask.
///
/// `filename` is the image's basename as stored in `image/filename`. Masks
/// narrower or shorter than `min_dimension` are rejected so that downstream
/// random crops of that size always fit.
pub fn build_record(
    image_bytes: Vec<u8>,
    labels: LabelGrid,
    min_dimension: u32,
    filename: &str,
) -> BuildOutcome {
    let height = labels.height();
    let width = labels.width();
    if height < min_dimension || width < min_dimension {
        return BuildOutcome::TooSmall { height, width };
    }

    BuildOutcome::Record(SegmentationRecord {
        height,
        width,
        filename: filename.to_string(),
        encoded: image_bytes,
        label: labels.into_bytes(),
        format: IMAGE_FORMAT.to_string(),
    })
}

impl SegmentationRecord {
    pub fn to_example(&self) -> Example {
        let mut ex = Example::default();
        ex.insert(KEY_HEIGHT, Feature::int64(self.height as i64))
            .insert(KEY_WIDTH, Feature::int64(self.width as i64))
            .insert(KEY_FILENAME, Feature::bytes(self.filename.as_bytes()))
            .insert(KEY_ENCODED, Feature::bytes(self.encoded.as_slice()))
            .insert(KEY_LABEL, Feature::bytes(self.label.as_slice()))
            .insert(KEY_FORMAT, Feature::bytes(self.format.as_bytes()));
        ex
    }

    /// Serialized `tf.train.Example` bytes, ready for a record container.
    pub fn serialize(&self) -> Vec<u8> {
        self.to_example().encode_to_vec()
    }

    pub fn from_example(ex: &Example) -> Result<Self> {
        let height = dimension(ex, KEY_HEIGHT)?;
        let width = dimension(ex, KEY_WIDTH)?;
        let label = ex.bytes(KEY_LABEL)?.to_vec();
        let expected = height as usize * width as usize;
        if label.len() != expected {
            return Err(anyhow!(
                "{} has {} bytes, expected {}x{} = {}",
                KEY_LABEL,
                label.len(),
                height,
                width,
                expected
            ));
        }
        Ok(Self {
            height,
            width,
            filename: String::from_utf8_lossy(ex.bytes(KEY_FILENAME)?).into_owned(),
            encoded: ex.bytes(KEY_ENCODED)?.to_vec(),
            label,
            format: String::from_utf8_lossy(ex.bytes(KEY_FORMAT)?).into_owned(),
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let ex = Example::decode(bytes).context("Failed to decode tf.train.Example")?;
        Self::from_example(&ex)
    }

    /// Rebuild the label grid stored in this record.
    pub fn label_grid(&self) -> Result<LabelGrid> {
        LabelGrid::new(self.width, self.height, self.label.clone())
    }
}

fn dimension(ex: &Example, key: &str) -> Result<u32> {
    let v = ex.int64(key)?;
    u32::try_from(v).map_err(|_| anyhow!("{} = {} is not a valid dimension", key, v))
}
