//! CVAT "for images" XML dumps.

use crate::domain::model::{dataset_key, BoxPoints, DatasetLabels, FrameLabels, LabelShape};
use crate::utils::error::{PipelineError, Result};
use indexmap::IndexMap;
use roxmltree::{Document, Node};
use std::str::FromStr;

/// 解析單一影片片段的 CVAT 標註，只保留至少有一個標註的影格
pub fn parse_clip_labels(clip_name: &str, xml: &str) -> Result<DatasetLabels> {
    let doc = Document::parse(xml)?;
    let mut labels = DatasetLabels::new();

    for image in doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("image"))
    {
        let frame_name = required_attr(&image, "name")?.trim().to_string();

        let shapes = image
            .children()
            .filter(|n| n.is_element())
            .map(|shape| parse_shape(&shape))
            .collect::<Result<Vec<_>>>()?;

        if shapes.is_empty() {
            tracing::debug!("Skipped: {} - {}", clip_name, frame_name);
            continue;
        }

        labels.insert(
            dataset_key(clip_name, &frame_name),
            FrameLabels {
                clip: clip_name.to_string(),
                frame: frame_name,
                width: parse_attr(&image, "width")?,
                height: parse_attr(&image, "height")?,
                labels: shapes,
            },
        );
    }

    Ok(labels)
}

fn parse_shape(shape: &Node) -> Result<LabelShape> {
    let tag = shape.tag_name().name();

    let points = match tag {
        "box" => {
            let xtl: f64 = parse_attr(shape, "xtl")?;
            let ytl: f64 = parse_attr(shape, "ytl")?;
            let xbr: f64 = parse_attr(shape, "xbr")?;
            let ybr: f64 = parse_attr(shape, "ybr")?;
            BoxPoints {
                x: xtl,
                y: ytl,
                width: xbr - xtl,
                height: ybr - ytl,
            }
        }
        "polygon" | "polyline" | "points" => bounding_rect(required_attr(shape, "points")?)?,
        other => {
            return Err(PipelineError::processing(format!(
                "Unsupported CVAT shape '{}' on line {}",
                other,
                shape.document().text_pos_at(shape.range().start).row
            )))
        }
    };

    let occluded = required_attr(shape, "occluded")?
        .trim()
        .parse::<i64>()
        .map(|v| v == 1)
        .map_err(|_| invalid_attr(shape, "occluded"))?;

    let properties = shape
        .children()
        .filter(|n| n.has_tag_name("attribute"))
        .map(|attr| {
            let name = required_attr(&attr, "name")?.to_string();
            let value = attr.text().unwrap_or_default().trim().to_string();
            Ok((name, value))
        })
        .collect::<Result<IndexMap<_, _>>>()?;

    Ok(LabelShape {
        label: required_attr(shape, "label")?.trim().to_string(),
        shape_type: tag.trim().to_string(),
        occluded,
        points: Some(points),
        properties,
    })
}

/// `x1,y1;x2,y2;...` 轉為外接矩形
fn bounding_rect(points: &str) -> Result<BoxPoints> {
    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut seen = false;

    for pair in points.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (x, y) = pair
            .split_once(',')
            .and_then(|(x, y)| Some((x.trim().parse::<f64>().ok()?, y.trim().parse::<f64>().ok()?)))
            .ok_or_else(|| PipelineError::processing(format!("Invalid CVAT point '{}'", pair)))?;
        min = (min.0.min(x), min.1.min(y));
        max = (max.0.max(x), max.1.max(y));
        seen = true;
    }

    if !seen {
        return Err(PipelineError::processing("CVAT shape has no points"));
    }

    Ok(BoxPoints {
        x: min.0,
        y: min.1,
        width: max.0 - min.0,
        height: max.1 - min.1,
    })
}

fn required_attr<'a>(node: &Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        PipelineError::processing(format!(
            "<{}> is missing the '{}' attribute",
            node.tag_name().name(),
            name
        ))
    })
}

fn parse_attr<T: FromStr>(node: &Node, name: &str) -> Result<T> {
    required_attr(node, name)?
        .trim()
        .parse::<T>()
        .map_err(|_| invalid_attr(node, name))
}

fn invalid_attr(node: &Node, name: &str) -> PipelineError {
    PipelineError::processing(format!(
        "<{}> has an invalid '{}' attribute: {:?}",
        node.tag_name().name(),
        name,
        node.attribute(name).unwrap_or_default()
    ))
}
