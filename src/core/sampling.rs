use crate::domain::model::DatasetLabels;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// CLI 慣例：`<= 0` 代表不限制影格數
pub fn max_frames_from_arg(value: i64) -> Option<usize> {
    if value <= 0 {
        None
    } else {
        usize::try_from(value).ok()
    }
}

pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// 一個片段的影格過多時隨機保留 `max_clip_frames` 張，減少相似影格
pub fn sample_frames<R: Rng + ?Sized>(
    labels: DatasetLabels,
    max_clip_frames: Option<usize>,
    rng: &mut R,
) -> DatasetLabels {
    let Some(max) = max_clip_frames else {
        return labels;
    };

    if labels.len() <= max {
        return labels;
    }

    let keep: Vec<usize> = index::sample(rng, labels.len(), max).into_vec();
    let mut keep_mask = vec![false; labels.len()];
    for i in keep {
        keep_mask[i] = true;
    }

    labels
        .into_iter()
        .zip(keep_mask)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::FrameLabels;

    fn labels(count: usize) -> DatasetLabels {
        (0..count)
            .map(|i| {
                let frame = format!("frame{:06}.jpg", i);
                (
                    format!("clip_{}", frame),
                    FrameLabels {
                        clip: "clip".to_string(),
                        frame,
                        width: 10,
                        height: 10,
                        labels: vec![],
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_max_frames_from_arg() {
        assert_eq!(max_frames_from_arg(-1), None);
        assert_eq!(max_frames_from_arg(0), None);
        assert_eq!(max_frames_from_arg(25), Some(25));
    }

    #[test]
    fn test_no_limit_keeps_everything() {
        let mut rng = rng_from_seed(Some(1));
        assert_eq!(sample_frames(labels(10), None, &mut rng).len(), 10);
        assert_eq!(sample_frames(labels(3), Some(5), &mut rng).len(), 3);
    }

    #[test]
    fn test_sampling_keeps_exact_subset() {
        let original = labels(50);
        let mut rng = rng_from_seed(Some(7));
        let sampled = sample_frames(original.clone(), Some(12), &mut rng);

        assert_eq!(sampled.len(), 12);
        for (key, frame) in &sampled {
            assert_eq!(original.get(key), Some(frame));
        }
    }

    #[test]
    fn test_same_seed_same_sample() {
        let a = sample_frames(labels(40), Some(5), &mut rng_from_seed(Some(42)));
        let b = sample_frames(labels(40), Some(5), &mut rng_from_seed(Some(42)));
        assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    }
}
