use crate::domain::model::{BoundingBox, FrameLabels};

/// 取出影格中允許標籤的方框。
///
/// 只處理 `box` 形狀（Object Detection 不支援其他形狀）；被遮擋的方框目前一併保留。
/// `normalize` 時座標除以影像寬高落在 [0, 1]，否則截斷為整數像素。
pub fn image_boxes<S: AsRef<str>>(
    frame: &FrameLabels,
    allowed_tags: &[S],
    normalize: bool,
) -> Vec<BoundingBox> {
    let image_width = f64::from(frame.width);
    let image_height = f64::from(frame.height);

    frame
        .labels
        .iter()
        .filter(|label| allowed_tags.iter().any(|t| t.as_ref() == label.label))
        .filter(|label| label.is_box())
        .filter_map(|label| {
            let points = label.points?;

            let (left, top, width, height) = if normalize {
                (
                    points.x / image_width,
                    points.y / image_height,
                    points.width / image_width,
                    points.height / image_height,
                )
            } else {
                (
                    points.x.trunc(),
                    points.y.trunc(),
                    points.width.trunc(),
                    points.height.trunc(),
                )
            };

            Some(BoundingBox {
                tag: label.label.clone(),
                left,
                top,
                width,
                height,
                properties: label.properties.values().cloned().collect(),
            })
        })
        .collect()
}
