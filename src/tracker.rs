//! Player tracker: maps each frame's detected poses onto persistent player
//! slots keyed by screen zone, and eliminates players who move while frozen.
//!
//! Slot assignment is by zone only. Poses are handled in detector order and
//! the first pose to claim a zone wins; later poses in the same zone are
//! dropped for that frame. There is no closest-match re-assignment across
//! frames, so two people sharing a zone will fight over one slot.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::pose::{measure_movement, BoundingBox, Pose};

/// Slot id in `1..=max_players`, numbered left to right across the frame.
pub type PlayerId = u8;

/// Padding around an eliminated player's overlay box.
const OVERLAY_PADDING_PX: f32 = 20.0;

/// Persistent tracking identity for one screen zone.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub id: PlayerId,
    pub current_pose: Option<Pose>,
    /// Movement baseline. Follows the live pose while unfrozen and holds
    /// still for the whole frozen phase.
    pub reference_pose: Option<Pose>,
    /// Sticky until the next game reset.
    pub eliminated: bool,
    pub last_seen_at: Instant,
}

impl PlayerSlot {
    fn new(id: PlayerId, now: Instant) -> Self {
        Self {
            id,
            current_pose: None,
            reference_pose: None,
            eliminated: false,
            last_seen_at: now,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        if self.eliminated {
            PlayerStatus::Eliminated
        } else {
            PlayerStatus::Active
        }
    }
}

/// What one `assign_slots` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Slot ids that received a pose, in claim order.
    pub assigned: Vec<PlayerId>,
    /// Slots eliminated by this frame with the movement that triggered it.
    pub eliminated: Vec<(PlayerId, f32)>,
    /// Slots dropped for staleness.
    pub removed: Vec<PlayerId>,
    /// Poses skipped as malformed, low-confidence, out of range or duplicate.
    pub discarded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerStatus {
    Waiting,
    Active,
    Eliminated,
}

/// Sidebar row: one per possible slot id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub status: PlayerStatus,
    pub label: String,
}

/// Renderer view of a live slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub id: PlayerId,
    pub eliminated: bool,
    pub label: String,
    pub pose: Option<Pose>,
    /// Dimming box drawn over eliminated players.
    pub overlay: Option<BoundingBox>,
}

/// All mutable game data. Owned by one controller; every mutation happens
/// through `&mut self`, so callers serialize access with a single lock.
#[derive(Debug)]
pub struct GameState {
    slots: BTreeMap<PlayerId, PlayerSlot>,
    frozen: bool,
    running: bool,
    config: GameConfig,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        Self {
            slots: BTreeMap::new(),
            frozen: false,
            running: false,
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn slot(&self, id: PlayerId) -> Option<&PlayerSlot> {
        self.slots.get(&id)
    }

    pub fn slots(&self) -> impl Iterator<Item = &PlayerSlot> {
        self.slots.values()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot id whose zone contains the pose's nose, if the pose is trackable.
    pub fn zone_for(&self, pose: &Pose, frame_width: f32) -> Option<PlayerId> {
        if !pose.is_complete() || !(frame_width > 0.0) {
            return None;
        }
        let nose = pose.nose()?;
        if !(nose.confidence >= self.config.detection_confidence) || !nose.x.is_finite() {
            return None;
        }
        let zone_width = frame_width / f32::from(self.config.max_players);
        let zone = (nose.x / zone_width).floor();
        if zone < 0.0 || zone >= f32::from(self.config.max_players) {
            return None;
        }
        Some(zone as PlayerId + 1)
    }

    /// Assign this frame's poses to slots, run elimination checks while
    /// frozen, and drop slots that have gone stale.
    pub fn assign_slots(&mut self, poses: &[Pose], frame_width: f32, now: Instant) -> FrameReport {
        let mut report = FrameReport::default();
        let frozen = self.frozen;
        let threshold = self.config.movement_threshold;
        let keypoint_confidence = self.config.keypoint_confidence;

        for pose in poses {
            let Some(id) = self.zone_for(pose, frame_width) else {
                report.discarded += 1;
                continue;
            };
            if report.assigned.contains(&id) {
                debug!(player_id = id, "zone already claimed this frame, pose dropped");
                report.discarded += 1;
                continue;
            }
            report.assigned.push(id);

            let slot = self
                .slots
                .entry(id)
                .or_insert_with(|| PlayerSlot::new(id, now));

            if frozen {
                if !slot.eliminated {
                    if let Some(reference) = &slot.reference_pose {
                        let movement = measure_movement(reference, pose, keypoint_confidence);
                        if movement > threshold {
                            slot.eliminated = true;
                            report.eliminated.push((id, movement));
                            info!(player_id = id, movement, threshold, "player_eliminated");
                        }
                    }
                }
            } else {
                slot.reference_pose = Some(pose.clone());
            }

            slot.current_pose = Some(pose.clone());
            slot.last_seen_at = now;
        }

        let stale_timeout = self.config.stale_timeout();
        let assigned = &report.assigned;
        let removed = &mut report.removed;
        self.slots.retain(|id, slot| {
            if assigned.contains(id) {
                return true;
            }
            let unseen = now.saturating_duration_since(slot.last_seen_at);
            if unseen > stale_timeout {
                info!(player_id = *id, unseen_ms = unseen.as_millis() as u64, "player_slot_expired");
                removed.push(*id);
                false
            } else {
                true
            }
        });

        report
    }

    /// Red light: raise the frozen flag and capture every slot's current pose
    /// as its movement baseline, in one step.
    pub fn freeze(&mut self) {
        self.frozen = true;
        for slot in self.slots.values_mut() {
            slot.reference_pose = slot.current_pose.clone();
        }
        debug!(slots = self.slots.len(), "reference_poses_captured");
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    /// Clear eliminations and baselines for a new game. Slots still in view
    /// are kept.
    pub fn reset_for_new_game(&mut self) {
        self.frozen = false;
        for slot in self.slots.values_mut() {
            slot.eliminated = false;
            slot.reference_pose = None;
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots.values().filter(|s| !s.eliminated).count()
    }

    pub fn eliminated_count(&self) -> usize {
        self.slots.values().filter(|s| s.eliminated).count()
    }

    /// True when players are tracked and every one of them is out.
    pub fn all_eliminated(&self) -> bool {
        !self.slots.is_empty() && self.active_count() == 0
    }

    /// Overlay data for the renderer.
    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        let keypoint_confidence = self.config.keypoint_confidence;
        self.slots
            .values()
            .map(|slot| SlotSnapshot {
                id: slot.id,
                eliminated: slot.eliminated,
                label: if slot.eliminated {
                    format!("Player {} (탈락)", slot.id)
                } else {
                    format!("Player {}", slot.id)
                },
                overlay: slot
                    .current_pose
                    .as_ref()
                    .filter(|_| slot.eliminated)
                    .and_then(|p| p.bounding_box(keypoint_confidence, OVERLAY_PADDING_PX)),
                pose: slot.current_pose.clone(),
            })
            .collect()
    }

    /// Sidebar rows for every slot id, tracked or not.
    pub fn roster(&self) -> Vec<RosterEntry> {
        (1..=self.config.max_players)
            .map(|id| match self.slots.get(&id) {
                Some(slot) => RosterEntry {
                    id,
                    status: slot.status(),
                    label: format!("Player {id}"),
                },
                None => RosterEntry {
                    id,
                    status: PlayerStatus::Waiting,
                    label: format!("Player {id} (대기중)"),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pose::test_support::*;
    use crate::pose::{Landmark, LandmarkKind};

    const WIDTH: f32 = 1280.0;

    fn state() -> GameState {
        GameState::new(GameConfig::default())
    }

    /// Pose at `nose_x` whose left wrist alone is measurable.
    fn wrist_pose(nose_x: f32, wrist_x: f32) -> Pose {
        let mut pose = uniform_pose(nose_x, 300.0, 0.1);
        pose.keypoints[LandmarkKind::Nose.index()] = Landmark::new(nose_x, 100.0, 0.9);
        with_landmark(pose, LandmarkKind::LeftWrist, Landmark::new(wrist_x, 100.0, 0.9))
    }

    #[test]
    fn test_zone_mapping() {
        let s = state();
        assert_eq!(s.zone_for(&pose_at(150.0), WIDTH), Some(1));
        assert_eq!(s.zone_for(&pose_at(500.0), WIDTH), Some(2));
        assert_eq!(s.zone_for(&pose_at(1279.0), WIDTH), Some(4));
        assert_eq!(s.zone_for(&pose_at(1280.0), WIDTH), None);
        assert_eq!(s.zone_for(&pose_at(-1.0), WIDTH), None);
        assert_eq!(s.zone_for(&pose_at(150.0), 0.0), None);
    }

    #[test]
    fn test_low_confidence_and_malformed_poses_dropped() {
        let mut s = state();
        let faint = with_landmark(pose_at(150.0), LandmarkKind::Nose, Landmark::new(150.0, 100.0, 0.49));
        let mut truncated = pose_at(500.0);
        truncated.keypoints.truncate(5);
        let report = s.assign_slots(&[faint, truncated], WIDTH, Instant::now());
        assert!(report.assigned.is_empty());
        assert_eq!(report.discarded, 2);
        assert_eq!(s.slot_count(), 0);
    }

    #[test]
    fn test_first_pose_claims_zone() {
        let mut s = state();
        let first = pose_at(100.0);
        let second = pose_at(200.0);
        let report = s.assign_slots(&[first.clone(), second, pose_at(700.0)], WIDTH, Instant::now());
        assert_eq!(report.assigned, vec![1, 3]);
        assert_eq!(report.discarded, 1);
        assert_eq!(s.slot(1).unwrap().current_pose.as_ref(), Some(&first));
    }

    #[test]
    fn test_unfrozen_tracks_reference_and_never_eliminates() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(500.0, 100.0)], WIDTH, t0);
        let moved = wrist_pose(500.0, 400.0);
        let report = s.assign_slots(&[moved.clone()], WIDTH, t0 + Duration::from_millis(33));
        assert!(report.eliminated.is_empty());
        let slot = s.slot(2).unwrap();
        assert!(!slot.eliminated);
        assert_eq!(slot.reference_pose.as_ref(), Some(&moved));
    }

    #[test]
    fn test_movement_while_frozen_eliminates() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0)], WIDTH, t0);
        s.freeze();

        let report = s.assign_slots(&[wrist_pose(150.0, 130.0)], WIDTH, t0 + Duration::from_millis(33));
        assert_eq!(report.eliminated, vec![(1, 30.0)]);
        assert!(s.slot(1).unwrap().eliminated);
    }

    #[test]
    fn test_small_movement_while_frozen_survives() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0)], WIDTH, t0);
        s.freeze();
        // Exactly at the threshold is not over it.
        s.assign_slots(&[wrist_pose(150.0, 115.0)], WIDTH, t0 + Duration::from_millis(33));
        assert!(!s.slot(1).unwrap().eliminated);
    }

    #[test]
    fn test_reference_fixed_during_frozen_phase() {
        let mut s = state();
        let t0 = Instant::now();
        let start = wrist_pose(150.0, 100.0);
        s.assign_slots(&[start.clone()], WIDTH, t0);
        s.freeze();
        // Creep 10px per frame: each step is under the threshold, the total is not.
        s.assign_slots(&[wrist_pose(150.0, 110.0)], WIDTH, t0 + Duration::from_millis(33));
        assert!(!s.slot(1).unwrap().eliminated);
        assert_eq!(s.slot(1).unwrap().reference_pose.as_ref(), Some(&start));
        s.assign_slots(&[wrist_pose(150.0, 120.0)], WIDTH, t0 + Duration::from_millis(66));
        assert!(s.slot(1).unwrap().eliminated);
    }

    #[test]
    fn test_elimination_is_sticky() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0)], WIDTH, t0);
        s.freeze();
        s.assign_slots(&[wrist_pose(150.0, 200.0)], WIDTH, t0 + Duration::from_millis(33));
        s.unfreeze();
        let report = s.assign_slots(&[wrist_pose(150.0, 100.0)], WIDTH, t0 + Duration::from_millis(66));
        assert!(report.eliminated.is_empty());
        assert!(s.slot(1).unwrap().eliminated);
        s.freeze();
        let report = s.assign_slots(&[wrist_pose(150.0, 900.0)], WIDTH, t0 + Duration::from_millis(99));
        // Already out: no second elimination report.
        assert!(report.eliminated.is_empty());
        assert!(s.slot(1).unwrap().eliminated);
    }

    #[test]
    fn test_slot_first_seen_while_frozen_is_not_checked() {
        let mut s = state();
        let t0 = Instant::now();
        s.freeze();
        s.assign_slots(&[wrist_pose(150.0, 100.0)], WIDTH, t0);
        s.assign_slots(&[wrist_pose(150.0, 500.0)], WIDTH, t0 + Duration::from_millis(33));
        let slot = s.slot(1).unwrap();
        assert!(!slot.eliminated);
        assert!(slot.reference_pose.is_none());
    }

    #[test]
    fn test_stale_slot_removed_after_timeout() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[pose_at(150.0), pose_at(500.0)], WIDTH, t0);

        let report = s.assign_slots(&[pose_at(500.0)], WIDTH, t0 + Duration::from_millis(5000));
        assert!(report.removed.is_empty());
        assert!(s.slot(1).is_some());

        let report = s.assign_slots(&[pose_at(500.0)], WIDTH, t0 + Duration::from_millis(5001));
        assert_eq!(report.removed, vec![1]);
        assert!(s.slot(1).is_none());
        assert!(s.slot(2).is_some());
    }

    #[test]
    fn test_unseen_slot_within_window_is_untouched() {
        let mut s = state();
        let t0 = Instant::now();
        let last = pose_at(150.0);
        s.assign_slots(&[last.clone()], WIDTH, t0);
        s.assign_slots(&[], WIDTH, t0 + Duration::from_millis(1000));
        let slot = s.slot(1).unwrap();
        assert_eq!(slot.current_pose.as_ref(), Some(&last));
        assert_eq!(slot.last_seen_at, t0);
    }

    #[test]
    fn test_reentry_after_removal_starts_fresh() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0)], WIDTH, t0);
        s.freeze();
        s.assign_slots(&[wrist_pose(150.0, 300.0)], WIDTH, t0 + Duration::from_millis(33));
        assert!(s.slot(1).unwrap().eliminated);

        s.assign_slots(&[], WIDTH, t0 + Duration::from_secs(6));
        assert!(s.slot(1).is_none());
        s.assign_slots(&[wrist_pose(150.0, 300.0)], WIDTH, t0 + Duration::from_secs(7));
        assert!(!s.slot(1).unwrap().eliminated);
    }

    #[test]
    fn test_freeze_snapshots_current_pose() {
        let mut s = state();
        let t0 = Instant::now();
        let pose = pose_at(700.0);
        s.assign_slots(&[pose.clone()], WIDTH, t0);
        s.freeze();
        assert!(s.is_frozen());
        assert_eq!(s.slot(3).unwrap().reference_pose.as_ref(), Some(&pose));
    }

    #[test]
    fn test_reset_keeps_slots_and_clears_state() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0), wrist_pose(500.0, 100.0)], WIDTH, t0);
        s.freeze();
        s.assign_slots(&[wrist_pose(150.0, 300.0)], WIDTH, t0 + Duration::from_millis(33));
        assert_eq!(s.eliminated_count(), 1);

        s.reset_for_new_game();
        assert!(!s.is_frozen());
        assert_eq!(s.slot_count(), 2);
        for slot in s.slots() {
            assert!(!slot.eliminated);
            assert!(slot.reference_pose.is_none());
        }
    }

    #[test]
    fn test_all_eliminated_requires_players() {
        let mut s = state();
        assert!(!s.all_eliminated());
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0)], WIDTH, t0);
        s.freeze();
        s.assign_slots(&[wrist_pose(150.0, 300.0)], WIDTH, t0 + Duration::from_millis(33));
        assert!(s.all_eliminated());
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn test_roster_lists_every_zone() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0), wrist_pose(1000.0, 100.0)], WIDTH, t0);
        s.freeze();
        s.assign_slots(&[wrist_pose(1000.0, 300.0)], WIDTH, t0 + Duration::from_millis(33));

        let roster = s.roster();
        let statuses: Vec<_> = roster.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                PlayerStatus::Active,
                PlayerStatus::Waiting,
                PlayerStatus::Waiting,
                PlayerStatus::Eliminated,
            ]
        );
        assert_eq!(roster[1].label, "Player 2 (대기중)");
    }

    #[test]
    fn test_snapshot_overlay_only_for_eliminated() {
        let mut s = state();
        let t0 = Instant::now();
        s.assign_slots(&[wrist_pose(150.0, 100.0), wrist_pose(500.0, 100.0)], WIDTH, t0);
        s.freeze();
        s.assign_slots(&[wrist_pose(150.0, 300.0)], WIDTH, t0 + Duration::from_millis(33));

        let snapshot = s.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].label, "Player 1 (탈락)");
        assert!(snapshot[0].overlay.is_some());
        assert_eq!(snapshot[1].label, "Player 2");
        assert!(snapshot[1].overlay.is_none());
    }
}
