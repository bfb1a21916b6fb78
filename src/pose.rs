//! Pose data model: COCO-17 landmark schema, poses as produced by the detector,
//! and inter-frame movement measurement over a fixed set of core joints.

use serde::{Deserialize, Serialize};

/// One detected body point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Detector confidence in [0, 1].
    #[serde(alias = "score")]
    pub confidence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// True if the landmark clears `min_confidence` (strictly greater).
    #[inline]
    pub fn is_confident(&self, min_confidence: f32) -> bool {
        self.confidence > min_confidence
    }
}

/// Fixed landmark schema shared by every pose (COCO-17 ordering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LandmarkKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl LandmarkKind {
    pub const COUNT: usize = 17;

    /// Position of this landmark inside `Pose::keypoints`.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Joints compared when measuring movement: shoulders, elbows, wrists, knees.
/// Hips, ankles and the face are left out to keep the per-frame cost small.
pub const CORE_MOVEMENT_LANDMARKS: [LandmarkKind; 8] = [
    LandmarkKind::LeftShoulder,
    LandmarkKind::RightShoulder,
    LandmarkKind::LeftElbow,
    LandmarkKind::RightElbow,
    LandmarkKind::LeftWrist,
    LandmarkKind::RightWrist,
    LandmarkKind::LeftKnee,
    LandmarkKind::RightKnee,
];

/// One person's landmarks for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Landmark>,
}

/// Axis-aligned box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Pose {
    pub fn new(keypoints: Vec<Landmark>) -> Self {
        Self { keypoints }
    }

    #[inline]
    pub fn landmark(&self, kind: LandmarkKind) -> Option<&Landmark> {
        self.keypoints.get(kind.index())
    }

    #[inline]
    pub fn nose(&self) -> Option<&Landmark> {
        self.landmark(LandmarkKind::Nose)
    }

    /// A pose missing part of the schema is malformed and never tracked.
    pub fn is_complete(&self) -> bool {
        self.keypoints.len() >= LandmarkKind::COUNT
    }

    /// Box around every landmark above `min_confidence`, grown by `padding`
    /// on each side. None when no landmark qualifies.
    pub fn bounding_box(&self, min_confidence: f32, padding: f32) -> Option<BoundingBox> {
        let mut confident = self
            .keypoints
            .iter()
            .filter(|l| l.is_confident(min_confidence));
        let first = confident.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for l in confident {
            min_x = min_x.min(l.x);
            min_y = min_y.min(l.y);
            max_x = max_x.max(l.x);
            max_y = max_y.max(l.y);
        }
        Some(BoundingBox {
            x: min_x - padding,
            y: min_y - padding,
            width: (max_x - min_x) + padding * 2.0,
            height: (max_y - min_y) + padding * 2.0,
        })
    }
}

/// Mean L1 displacement of the core joints between two poses.
///
/// Only joints above `min_confidence` in both poses count. Returns 0 when no
/// joint pair qualifies. L1 (`|dx| + |dy|`) overestimates the Euclidean
/// distance; thresholds are tuned against it, so callers must not treat the
/// result as a true distance.
pub fn measure_movement(reference: &Pose, current: &Pose, min_confidence: f32) -> f32 {
    let mut total = 0.0f32;
    let mut valid = 0u32;

    for kind in CORE_MOVEMENT_LANDMARKS {
        let (Some(before), Some(after)) = (reference.landmark(kind), current.landmark(kind)) else {
            continue;
        };
        if !before.is_confident(min_confidence) || !after.is_confident(min_confidence) {
            continue;
        }
        total += (before.x - after.x).abs() + (before.y - after.y).abs();
        valid += 1;
    }

    if valid > 0 {
        total / valid as f32
    } else {
        0.0
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_identical_poses_do_not_move() {
        let pose = pose_at(400.0);
        assert_eq!(measure_movement(&pose, &pose.clone(), 0.2), 0.0);
    }

    #[test]
    fn test_single_wrist_move_is_l1_distance() {
        // Only the left wrist is confident on both sides.
        let base = uniform_pose(0.0, 0.0, 0.1);
        let reference = with_landmark(
            base.clone(),
            LandmarkKind::LeftWrist,
            Landmark::new(100.0, 100.0, 0.9),
        );
        let current = with_landmark(base, LandmarkKind::LeftWrist, Landmark::new(130.0, 100.0, 0.9));
        assert_eq!(measure_movement(&reference, &current, 0.2), 30.0);
    }

    #[test]
    fn test_movement_is_mean_over_valid_pairs() {
        let base = uniform_pose(0.0, 0.0, 0.1);
        let reference = with_landmark(
            with_landmark(base.clone(), LandmarkKind::LeftKnee, Landmark::new(10.0, 10.0, 0.8)),
            LandmarkKind::RightKnee,
            Landmark::new(10.0, 10.0, 0.8),
        );
        let current = with_landmark(
            with_landmark(base, LandmarkKind::LeftKnee, Landmark::new(13.0, 14.0, 0.8)),
            LandmarkKind::RightKnee,
            Landmark::new(10.0, 15.0, 0.8),
        );
        // (3 + 4) and (0 + 5) over two pairs.
        assert_eq!(measure_movement(&reference, &current, 0.2), 6.0);
    }

    #[test]
    fn test_low_confidence_pairs_are_ignored() {
        let reference = uniform_pose(0.0, 0.0, 0.9);
        // Exactly at the threshold does not count.
        let current = uniform_pose(500.0, 500.0, 0.2);
        assert_eq!(measure_movement(&reference, &current, 0.2), 0.0);
    }

    #[test]
    fn test_face_and_ankles_are_not_measured() {
        let reference = pose_at(400.0);
        let current = with_landmark(
            with_landmark(reference.clone(), LandmarkKind::Nose, Landmark::new(900.0, 0.0, 0.9)),
            LandmarkKind::LeftAnkle,
            Landmark::new(0.0, 900.0, 0.9),
        );
        assert_eq!(measure_movement(&reference, &current, 0.2), 0.0);
    }

    #[test]
    fn test_truncated_pose_counts_only_present_joints() {
        let reference = uniform_pose(0.0, 0.0, 0.9);
        let mut current = uniform_pose(10.0, 0.0, 0.9);
        current.keypoints.truncate(LandmarkKind::LeftElbow.index());
        assert!(!current.is_complete());
        // Only both shoulders survive the truncation.
        assert_eq!(measure_movement(&reference, &current, 0.2), 10.0);
    }

    #[test]
    fn test_bounding_box_uses_confident_landmarks() {
        let pose = with_landmark(
            with_landmark(
                uniform_pose(50.0, 50.0, 0.1),
                LandmarkKind::LeftShoulder,
                Landmark::new(100.0, 200.0, 0.9),
            ),
            LandmarkKind::RightKnee,
            Landmark::new(160.0, 400.0, 0.9),
        );
        let bbox = pose.bounding_box(0.2, 20.0).unwrap();
        assert_eq!(bbox.x, 80.0);
        assert_eq!(bbox.y, 180.0);
        assert_eq!(bbox.width, 100.0);
        assert_eq!(bbox.height, 240.0);

        assert!(uniform_pose(0.0, 0.0, 0.1).bounding_box(0.2, 20.0).is_none());
    }

    #[test]
    fn test_landmark_accepts_score_field() {
        let l: Landmark = serde_json::from_str(r#"{"x": 1.0, "y": 2.0, "score": 0.7}"#).unwrap();
        assert_eq!(l, Landmark::new(1.0, 2.0, 0.7));
    }
}
