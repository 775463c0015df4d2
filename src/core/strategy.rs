//! Detection and classification flavours of a Custom Vision upload.

use crate::core::boxes::image_boxes;
use crate::domain::model::{
    BoundingBox, FrameLabels, ImageFileCreateEntry, LabelDefinitions, ProjectKind, Region,
    TagIndex,
};
use crate::utils::error::Result;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;

pub const DETECTION_PROJECT_NAME: &str = "PotDetection";
pub const CLASSIFICATION_PROJECT_NAME: &str = "PotClassification";
pub const DEFAULT_TARGET_LABEL: &str = "pot";

pub trait UploadStrategy: Send + Sync {
    fn kind(&self) -> ProjectKind;
    fn project_name(&self) -> &str;
    /// Custom Vision 的 domain 類型，例如 `ObjectDetection`
    fn domain_type(&self) -> &str;
    fn desired_tags(&self, definitions: &LabelDefinitions) -> Vec<String>;
    fn entries_for_image(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        frame: &FrameLabels,
        tags: &TagIndex,
    ) -> Result<Vec<ImageFileCreateEntry>>;
}

pub fn strategy_for(
    kind: ProjectKind,
    target_label: &str,
    include_all_labels: bool,
) -> Box<dyn UploadStrategy> {
    match kind {
        ProjectKind::Detection => Box::new(DetectionStrategy {
            target_label: target_label.to_string(),
            include_all_labels,
        }),
        ProjectKind::Classification => Box::new(ClassificationStrategy {
            target_label: target_label.to_string(),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct DetectionStrategy {
    pub target_label: String,
    pub include_all_labels: bool,
}

impl DetectionStrategy {
    fn boxes_to_regions(boxes: &[BoundingBox], tags: &TagIndex) -> Vec<Region> {
        boxes
            .iter()
            .filter_map(|b| {
                tags.get(&b.tag).map(|tag| Region {
                    tag_id: tag.id.clone(),
                    left: b.left,
                    top: b.top,
                    width: b.width,
                    height: b.height,
                })
            })
            .collect()
    }
}

impl UploadStrategy for DetectionStrategy {
    fn kind(&self) -> ProjectKind {
        ProjectKind::Detection
    }

    fn project_name(&self) -> &str {
        DETECTION_PROJECT_NAME
    }

    fn domain_type(&self) -> &str {
        "ObjectDetection"
    }

    fn desired_tags(&self, definitions: &LabelDefinitions) -> Vec<String> {
        if self.include_all_labels {
            definitions.labels.iter().map(|l| l.name.clone()).collect()
        } else {
            vec![self.target_label.clone()]
        }
    }

    fn entries_for_image(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        frame: &FrameLabels,
        tags: &TagIndex,
    ) -> Result<Vec<ImageFileCreateEntry>> {
        let allowed: Vec<&str> = tags.keys().map(String::as_str).collect();
        let boxes = image_boxes(frame, &allowed, true);
        let regions = Self::boxes_to_regions(&boxes, tags);

        // 沒有任何區域的影像不上傳
        if regions.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Yielding image {} ({} regions)", file_name, regions.len());
        Ok(vec![ImageFileCreateEntry {
            name: file_name.to_string(),
            contents,
            regions,
            tag_ids: vec![],
        }])
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationStrategy {
    pub target_label: String,
}

impl UploadStrategy for ClassificationStrategy {
    fn kind(&self) -> ProjectKind {
        ProjectKind::Classification
    }

    fn project_name(&self) -> &str {
        CLASSIFICATION_PROJECT_NAME
    }

    fn domain_type(&self) -> &str {
        "Classification"
    }

    /// 分類用的標籤來自目標標籤的屬性值
    fn desired_tags(&self, definitions: &LabelDefinitions) -> Vec<String> {
        definitions
            .labels
            .iter()
            .filter(|l| l.name == self.target_label)
            .flat_map(|l| l.attributes.iter())
            .flat_map(|a| a.values.iter().cloned())
            .collect()
    }

    fn entries_for_image(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        frame: &FrameLabels,
        tags: &TagIndex,
    ) -> Result<Vec<ImageFileCreateEntry>> {
        let boxes = image_boxes(frame, &[self.target_label.as_str()], false);
        if boxes.is_empty() {
            return Ok(vec![]);
        }

        let image = ImageReader::new(Cursor::new(contents))
            .with_guessed_format()?
            .decode()?;

        let mut entries = Vec::new();
        for (box_n, b) in boxes.iter().enumerate() {
            if b.properties.is_empty() {
                continue;
            }

            let tag_ids: Vec<String> = b
                .properties
                .iter()
                .filter_map(|name| match tags.get(name) {
                    Some(tag) => Some(tag.id.clone()),
                    None => {
                        tracing::warn!("⚠️ No project tag for attribute '{}' in {}", name, file_name);
                        None
                    }
                })
                .collect();
            if tag_ids.is_empty() {
                continue;
            }

            let Some(subimage) = crop_to_png(&image, b)? else {
                tracing::warn!("⚠️ Box {} of {} lies outside the image, skipped", box_n, file_name);
                continue;
            };

            let name = format!("{}_{}", file_name, box_n);
            tracing::debug!("Yielding box-image {}", name);
            entries.push(ImageFileCreateEntry {
                name,
                contents: subimage,
                regions: vec![],
                tag_ids,
            });
        }

        Ok(entries)
    }
}

/// 依方框裁切影像並編碼為 PNG；超出邊界的部分會被截掉，裁切後為空時回傳 `None`
pub fn crop_to_png(image: &DynamicImage, b: &BoundingBox) -> Result<Option<Vec<u8>>> {
    let (img_w, img_h) = image.dimensions();

    let left = b.left.max(0.0).min(f64::from(img_w)) as u32;
    let top = b.top.max(0.0).min(f64::from(img_h)) as u32;
    let right = (b.left + b.width).max(0.0).min(f64::from(img_w)) as u32;
    let bottom = (b.top + b.height).max(0.0).min(f64::from(img_h)) as u32;

    if right <= left || bottom <= top {
        return Ok(None);
    }

    let subimage = image.crop_imm(left, top, right - left, bottom - top);
    let mut buffer = Cursor::new(Vec::new());
    subimage.write_to(&mut buffer, ImageFormat::Png)?;

    Ok(Some(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        AttributeDefinition, BoxPoints, LabelDefinition, LabelShape, Tag, TagType,
    };
    use image::{ImageBuffer, Rgb};
    use indexmap::IndexMap;

    fn definitions() -> LabelDefinitions {
        LabelDefinitions {
            labels: vec![
                LabelDefinition {
                    name: "pot".to_string(),
                    attributes: vec![AttributeDefinition {
                        name: Some("state".to_string()),
                        values: vec!["empty".to_string(), "full".to_string(), "?".to_string()],
                    }],
                },
                LabelDefinition {
                    name: "plant".to_string(),
                    attributes: vec![],
                },
            ],
        }
    }

    fn tag(id: &str, name: &str) -> (String, Tag) {
        (
            name.to_string(),
            Tag {
                id: id.to_string(),
                name: name.to_string(),
                tag_type: TagType::for_name(name),
            },
        )
    }

    fn shape(label: &str, x: f64, y: f64, w: f64, h: f64, state: Option<&str>) -> LabelShape {
        LabelShape {
            label: label.to_string(),
            shape_type: "box".to_string(),
            occluded: false,
            points: Some(BoxPoints {
                x,
                y,
                width: w,
                height: h,
            }),
            properties: state
                .map(|s| IndexMap::from([("state".to_string(), s.to_string())]))
                .unwrap_or_default(),
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0u8]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_desired_tags() {
        let detection = strategy_for(ProjectKind::Detection, "pot", false);
        assert_eq!(detection.desired_tags(&definitions()), vec!["pot"]);

        let all = strategy_for(ProjectKind::Detection, "pot", true);
        assert_eq!(all.desired_tags(&definitions()), vec!["pot", "plant"]);

        let classification = strategy_for(ProjectKind::Classification, "pot", false);
        assert_eq!(
            classification.desired_tags(&definitions()),
            vec!["empty", "full", "?"]
        );
    }

    #[test]
    fn test_detection_entries_use_known_tags() {
        let frame = FrameLabels {
            clip: "c".to_string(),
            frame: "f.jpg".to_string(),
            width: 100,
            height: 50,
            labels: vec![
                shape("pot", 10.0, 5.0, 50.0, 25.0, None),
                shape("plant", 0.0, 0.0, 10.0, 10.0, None),
            ],
        };
        let tags: TagIndex = [tag("tag-pot", "pot")].into_iter().collect();

        let strategy = strategy_for(ProjectKind::Detection, "pot", false);
        let entries = strategy
            .entries_for_image("c_f.jpg", vec![1, 2, 3], &frame, &tags)
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "c_f.jpg");
        assert_eq!(entries[0].contents, vec![1, 2, 3]);
        assert_eq!(
            entries[0].regions,
            vec![Region {
                tag_id: "tag-pot".to_string(),
                left: 0.1,
                top: 0.1,
                width: 0.5,
                height: 0.5
            }]
        );
    }

    #[test]
    fn test_detection_skips_unlabelled_images() {
        let frame = FrameLabels {
            clip: "c".to_string(),
            frame: "f.jpg".to_string(),
            width: 100,
            height: 50,
            labels: vec![shape("plant", 0.0, 0.0, 10.0, 10.0, None)],
        };
        let tags: TagIndex = [tag("tag-pot", "pot")].into_iter().collect();

        let strategy = strategy_for(ProjectKind::Detection, "pot", false);
        assert!(strategy
            .entries_for_image("c_f.jpg", vec![], &frame, &tags)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_classification_crops_each_box() {
        let frame = FrameLabels {
            clip: "c".to_string(),
            frame: "f.png".to_string(),
            width: 40,
            height: 30,
            labels: vec![
                shape("pot", 2.0, 3.0, 10.0, 8.0, Some("full")),
                shape("pot", 0.0, 0.0, 5.0, 5.0, None),
                shape("pot", 30.0, 20.0, 20.0, 20.0, Some("empty")),
            ],
        };
        let tags: TagIndex = [tag("t-empty", "empty"), tag("t-full", "full")]
            .into_iter()
            .collect();

        let strategy = strategy_for(ProjectKind::Classification, "pot", false);
        let entries = strategy
            .entries_for_image("c_f.png", png(40, 30), &frame, &tags)
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "c_f.png_0");
        assert_eq!(entries[0].tag_ids, vec!["t-full".to_string()]);
        assert!(entries[0].regions.is_empty());

        let crop = image::load_from_memory(&entries[0].contents).unwrap();
        assert_eq!(crop.dimensions(), (10, 8));

        // 第三個方框超出影像邊界，裁切到 10x10
        assert_eq!(entries[1].name, "c_f.png_2");
        let clamped = image::load_from_memory(&entries[1].contents).unwrap();
        assert_eq!(clamped.dimensions(), (10, 10));
    }

    #[test]
    fn test_classification_drops_attributes_without_tag() {
        let mut mixed = shape("pot", 0.0, 0.0, 10.0, 10.0, Some("full"));
        mixed
            .properties
            .insert("material".to_string(), "weird".to_string());
        let mut unknown = shape("pot", 10.0, 10.0, 10.0, 10.0, None);
        unknown
            .properties
            .insert("state".to_string(), "weird".to_string());

        let frame = FrameLabels {
            clip: "c".to_string(),
            frame: "f.png".to_string(),
            width: 40,
            height: 30,
            labels: vec![mixed, unknown],
        };
        let tags: TagIndex = [tag("t-full", "full")].into_iter().collect();

        let strategy = strategy_for(ProjectKind::Classification, "pot", false);
        let entries = strategy
            .entries_for_image("c_f.png", png(40, 30), &frame, &tags)
            .unwrap();

        let named: Vec<(&str, &[String])> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.tag_ids.as_slice()))
            .collect();
        assert_eq!(named, vec![("c_f.png_0", &["t-full".to_string()][..])]);
    }

    #[test]
    fn test_crop_outside_image() {
        let image = DynamicImage::new_rgb8(10, 10);
        let b = BoundingBox {
            tag: "pot".to_string(),
            left: 20.0,
            top: 20.0,
            width: 5.0,
            height: 5.0,
            properties: vec![],
        };
        assert!(crop_to_png(&image, &b).unwrap().is_none());
    }
}
