use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::PipelineError;

/// 以像素為單位的方框，原點在左上角
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxPoints {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelShape {
    pub label: String,
    #[serde(rename = "type")]
    pub shape_type: String,
    pub occluded: bool,
    pub points: Option<BoxPoints>,
    /// 依 CVAT 文件中的順序
    #[serde(default)]
    pub properties: IndexMap<String, String>,
}

impl LabelShape {
    pub fn is_box(&self) -> bool {
        self.shape_type == "box"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameLabels {
    pub clip: String,
    pub frame: String,
    pub width: u32,
    pub height: u32,
    pub labels: Vec<LabelShape>,
}

/// `labels.json` 的內容：`{clip}_{frame}` -> 該影格的標註
pub type DatasetLabels = BTreeMap<String, FrameLabels>;

pub fn dataset_key(clip: &str, frame: &str) -> String {
    format!("{}_{}", clip, frame)
}

#[derive(Debug, Clone)]
pub struct ClipAnnotations {
    pub clip_name: String,
    pub archive_path: String,
    pub frames: DatasetLabels,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelDefinitions {
    pub labels: Vec<LabelDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub tag: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Detection,
    Classification,
}

impl FromStr for ProjectKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detection" => Ok(Self::Detection),
            "classification" => Ok(Self::Classification),
            other => Err(PipelineError::InvalidConfigValueError {
                field: "type".to_string(),
                value: other.to_string(),
                reason: "Type of Custom Vision project must be detection or classification"
                    .to_string(),
            }),
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detection => write!(f, "detection"),
            Self::Classification => write!(f, "classification"),
        }
    }
}

// ---- Custom Vision training API ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub domain_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagType {
    Regular,
    Negative,
}

impl TagType {
    /// 名為 `?` 的標籤代表負樣本
    pub fn for_name(name: &str) -> Self {
        if name == "?" {
            Self::Negative
        } else {
            Self::Regular
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::Negative => "Negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_tag_type")]
    pub tag_type: TagType,
}

fn default_tag_type() -> TagType {
    TagType::Regular
}

pub type TagIndex = BTreeMap<String, Tag>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub tag_id: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageFileCreateEntry {
    pub name: String,
    pub contents: Vec<u8>,
    pub regions: Vec<Region>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCreateResult {
    #[serde(default)]
    pub source_url: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCreateSummary {
    pub is_batch_successful: bool,
    #[serde(default)]
    pub images: Vec<ImageCreateResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub batches: usize,
    pub entries: usize,
    pub failed_batches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_shape_serializes_type_key() {
        let shape = LabelShape {
            label: "pot".to_string(),
            shape_type: "box".to_string(),
            occluded: false,
            points: Some(BoxPoints {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
            }),
            properties: IndexMap::from([("state".to_string(), "full".to_string())]),
        };

        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["type"], "box");
        assert_eq!(json["points"]["width"], 3.0);
        assert_eq!(json["properties"]["state"], "full");
    }

    #[test]
    fn test_project_kind_parsing() {
        assert_eq!("detection".parse::<ProjectKind>().unwrap(), ProjectKind::Detection);
        assert_eq!(
            "Classification".parse::<ProjectKind>().unwrap(),
            ProjectKind::Classification
        );
        assert!("segmentation".parse::<ProjectKind>().is_err());
    }

    #[test]
    fn test_negative_tag_type() {
        assert_eq!(TagType::for_name("?"), TagType::Negative);
        assert_eq!(TagType::for_name("pot"), TagType::Regular);
    }

    #[test]
    fn test_summary_deserializes_service_payload() {
        let summary: ImageCreateSummary = serde_json::from_value(serde_json::json!({
            "isBatchSuccessful": false,
            "images": [{"sourceUrl": "\"clip_frame_000001.jpg\"", "status": "ErrorImageFormat"}]
        }))
        .unwrap();
        assert!(!summary.is_batch_successful);
        assert_eq!(summary.images[0].status, "ErrorImageFormat");
    }
}
