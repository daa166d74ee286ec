//! `tf.train.Example` messages.
//!
//! Only the message shapes TensorFlow's input readers rely on are modelled:
//!
//! ```text
//! Example   { Features features = 1; }
//! Features  { map<string, Feature> feature = 1; }
//! Feature   { oneof kind { BytesList bytes_list = 1; FloatList float_list = 2; Int64List int64_list = 3; } }
//! BytesList { repeated bytes value = 1; }
//! FloatList { repeated float value = 1 [packed = true]; }
//! Int64List { repeated int64 value = 1 [packed = true]; }
//! ```
//!
//! The feature map is a `BTreeMap`, so entries are written in key order and
//! identical examples serialize to identical bytes.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

#[derive(Clone, PartialEq, prost::Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Features {
    #[prost(btree_map = "string, message", tag = "1")]
    pub feature: BTreeMap<String, Feature>,
}

/// One named value list inside an example.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

impl Feature {
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: Some(feature::Kind::BytesList(BytesList { value: vec![value.into()] })),
        }
    }

    pub fn int64(value: i64) -> Self {
        Self {
            kind: Some(feature::Kind::Int64List(Int64List { value: vec![value] })),
        }
    }

    fn kind_name(&self) -> &'static str {
        match &self.kind {
            Some(feature::Kind::BytesList(_)) => "bytes_list",
            Some(feature::Kind::FloatList(_)) => "float_list",
            Some(feature::Kind::Int64List(_)) => "int64_list",
            None => "empty feature",
        }
    }
}

impl Example {
    pub fn insert(&mut self, key: impl Into<String>, feature: Feature) -> &mut Self {
        self.features
            .get_or_insert_with(Features::default)
            .feature
            .insert(key.into(), feature);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Feature> {
        self.features.as_ref()?.feature.get(key)
    }

    pub fn len(&self) -> usize {
        self.features.as_ref().map_or(0, |f| f.feature.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single int64 stored under `key`.
    pub fn int64(&self, key: &str) -> Result<i64> {
        let feature = self.get(key).ok_or_else(|| anyhow!("feature {} missing", key))?;
        match &feature.kind {
            Some(feature::Kind::Int64List(list)) => single(key, &list.value).copied(),
            _ => Err(anyhow!(
                "feature {} is a {}, expected int64_list",
                key,
                feature.kind_name()
            )),
        }
    }

    /// The single byte string stored under `key`.
    pub fn bytes(&self, key: &str) -> Result<&[u8]> {
        let feature = self.get(key).ok_or_else(|| anyhow!("feature {} missing", key))?;
        match &feature.kind {
            Some(feature::Kind::BytesList(list)) => single(key, &list.value).map(Vec::as_slice),
            _ => Err(anyhow!(
                "feature {} is a {}, expected bytes_list",
                key,
                feature.kind_name()
            )),
        }
    }
}

fn single<'a, T>(key: &str, values: &'a [T]) -> Result<&'a T> {
    match values {
        [v] => Ok(v),
        _ => Err(anyhow!("feature {} has {} values, expected 1", key, values.len())),
    }
}
