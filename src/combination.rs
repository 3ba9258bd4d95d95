//! Multi-device combination
//!
//! Several surfaces connected at once can address one wider session grid.
//! Instances are kept in registration order; each one starts where the
//! previous one's session width ends. Every join or leave rebinds every
//! live instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Identity of one surface instance for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Feature flags controlling combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CombineFlags {
    /// Register instances at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bind each session view to its offset
    #[serde(default = "default_true")]
    pub session_link: bool,
    /// Bind each step sequencer to its offset
    #[serde(default = "default_true")]
    pub stepseq_link: bool,
}

impl Default for CombineFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            session_link: true,
            stepseq_link: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// What the coordinator needs from a surface instance
pub trait CombinationMember {
    /// Track columns this instance's session covers (usually 8)
    fn session_width(&self) -> u32;
    /// Whether a device-parameter component is active
    fn has_device_component(&self) -> bool;
    fn link_session(&mut self, track_offset: u32);
    fn unlink_session(&mut self);
    fn link_step_sequencer(&mut self, track_offset: u32);
    fn unlink_step_sequencer(&mut self);
    fn set_support_devices(&mut self, support_devices: bool);
}

/// Live instances in registration order
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    order: Vec<InstanceId>,
}

impl InstanceRegistry {
    pub fn contains(&self, id: InstanceId) -> bool {
        self.order.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.order.iter().copied()
    }
}

/// Result of a recompute
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Combination {
    /// Track offset per instance, in registration order
    pub offsets: Vec<(InstanceId, u32)>,
    /// True if any registered instance exposes device control
    pub support_devices: bool,
}

impl Combination {
    pub fn offset_of(&self, id: InstanceId) -> Option<u32> {
        self.offsets
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, offset)| *offset)
    }
}

/// Owns the registry and assigns offsets
#[derive(Debug, Clone, Default)]
pub struct CombinationCoordinator {
    flags: CombineFlags,
    registry: InstanceRegistry,
}

impl CombinationCoordinator {
    pub fn new(flags: CombineFlags) -> Self {
        Self {
            flags,
            registry: InstanceRegistry::default(),
        }
    }

    pub fn flags(&self) -> CombineFlags {
        self.flags
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Register `id` and rebind everyone
    ///
    /// Returns `None` when nothing changed (combining disabled or already
    /// registered).
    pub fn join<M: CombinationMember>(
        &mut self,
        id: InstanceId,
        members: &mut HashMap<InstanceId, M>,
    ) -> Option<Combination> {
        if !self.flags.enabled {
            debug!("Combining disabled, {} stays standalone", id);
            return None;
        }
        if self.registry.contains(id) {
            return None;
        }

        self.registry.order.push(id);
        info!("Instance {} joined ({} active)", id, self.registry.len());
        Some(self.recompute(members))
    }

    /// Unlink and unregister `id`, then rebind the rest
    ///
    /// Unknown ids are ignored.
    pub fn leave<M: CombinationMember>(
        &mut self,
        id: InstanceId,
        members: &mut HashMap<InstanceId, M>,
    ) -> Option<Combination> {
        let position = self.registry.order.iter().position(|c| *c == id)?;

        if let Some(member) = members.get_mut(&id) {
            if self.flags.session_link {
                member.unlink_session();
            }
            if self.flags.stepseq_link {
                member.unlink_step_sequencer();
            }
        }

        self.registry.order.remove(position);
        info!("Instance {} left ({} active)", id, self.registry.len());
        Some(self.recompute(members))
    }

    /// Rebind every registered instance from offset 0
    pub fn recompute<M: CombinationMember>(
        &self,
        members: &mut HashMap<InstanceId, M>,
    ) -> Combination {
        let support_devices = self
            .registry
            .iter()
            .filter_map(|id| members.get(&id))
            .any(|member| member.has_device_component());

        let mut offsets = Vec::with_capacity(self.registry.len());
        let mut offset = 0u32;

        for id in self.registry.iter() {
            let Some(member) = members.get_mut(&id) else {
                warn!("Registered instance {} has no surface, skipping", id);
                continue;
            };

            if self.flags.stepseq_link {
                member.link_step_sequencer(offset);
            }
            if self.flags.session_link {
                member.link_session(offset);
            }
            member.set_support_devices(support_devices);

            debug!("Instance {} bound at track offset {}", id, offset);
            offsets.push((id, offset));
            offset += member.session_width();
        }

        Combination {
            offsets,
            support_devices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Default)]
    struct FakeMember {
        width: u32,
        device: bool,
        session: Option<u32>,
        stepseq: Option<u32>,
        support_devices: bool,
        session_links: usize,
    }

    impl FakeMember {
        fn new(width: u32) -> Self {
            Self {
                width,
                ..Default::default()
            }
        }
    }

    impl CombinationMember for FakeMember {
        fn session_width(&self) -> u32 {
            self.width
        }
        fn has_device_component(&self) -> bool {
            self.device
        }
        fn link_session(&mut self, track_offset: u32) {
            self.session = Some(track_offset);
            self.session_links += 1;
        }
        fn unlink_session(&mut self) {
            self.session = None;
        }
        fn link_step_sequencer(&mut self, track_offset: u32) {
            self.stepseq = Some(track_offset);
        }
        fn unlink_step_sequencer(&mut self) {
            self.stepseq = None;
        }
        fn set_support_devices(&mut self, support_devices: bool) {
            self.support_devices = support_devices;
        }
    }

    fn members(widths: &[u32]) -> HashMap<InstanceId, FakeMember> {
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| (InstanceId(i as u32), FakeMember::new(*w)))
            .collect()
    }

    #[test]
    fn test_offsets_follow_join_order() {
        let mut members = members(&[8, 8, 4]);
        let mut coordinator = CombinationCoordinator::new(CombineFlags::default());

        for id in 0..3 {
            coordinator.join(InstanceId(id), &mut members);
        }

        assert_eq!(members[&InstanceId(0)].session, Some(0));
        assert_eq!(members[&InstanceId(1)].session, Some(8));
        assert_eq!(members[&InstanceId(2)].session, Some(16));
        assert_eq!(members[&InstanceId(2)].stepseq, Some(16));
    }

    #[test]
    fn test_join_twice_is_noop() {
        let mut members = members(&[8]);
        let mut coordinator = CombinationCoordinator::new(CombineFlags::default());

        assert!(coordinator.join(InstanceId(0), &mut members).is_some());
        assert!(coordinator.join(InstanceId(0), &mut members).is_none());
        assert_eq!(coordinator.registry().len(), 1);
        assert_eq!(members[&InstanceId(0)].session_links, 1);
    }

    #[test]
    fn test_disabled_combine_never_registers() {
        let mut members = members(&[8]);
        let flags = CombineFlags {
            enabled: false,
            ..Default::default()
        };
        let mut coordinator = CombinationCoordinator::new(flags);

        assert!(coordinator.join(InstanceId(0), &mut members).is_none());
        assert!(coordinator.registry().is_empty());
        assert_eq!(members[&InstanceId(0)].session, None);
    }

    #[test]
    fn test_link_flags_are_honoured() {
        let mut members = members(&[8, 8]);
        let flags = CombineFlags {
            enabled: true,
            session_link: true,
            stepseq_link: false,
        };
        let mut coordinator = CombinationCoordinator::new(flags);

        coordinator.join(InstanceId(0), &mut members);
        coordinator.join(InstanceId(1), &mut members);

        assert_eq!(members[&InstanceId(1)].session, Some(8));
        assert_eq!(members[&InstanceId(1)].stepseq, None);
    }

    #[test]
    fn test_leave_unlinks_and_compacts() {
        let mut members = members(&[8, 8, 8]);
        let mut coordinator = CombinationCoordinator::new(CombineFlags::default());
        for id in 0..3 {
            coordinator.join(InstanceId(id), &mut members);
        }

        let combination = coordinator.leave(InstanceId(1), &mut members).unwrap();

        assert_eq!(members[&InstanceId(1)].session, None);
        assert_eq!(members[&InstanceId(1)].stepseq, None);
        assert_eq!(
            combination.offsets,
            vec![(InstanceId(0), 0), (InstanceId(2), 8)]
        );
    }

    #[test]
    fn test_leave_unknown_is_noop() {
        let mut members = members(&[8]);
        let mut coordinator = CombinationCoordinator::new(CombineFlags::default());

        assert!(coordinator.leave(InstanceId(7), &mut members).is_none());
    }

    #[test]
    fn test_rejoin_moves_to_end() {
        let mut members = members(&[8, 4, 2]);
        let mut coordinator = CombinationCoordinator::new(CombineFlags::default());
        for id in 0..3 {
            coordinator.join(InstanceId(id), &mut members);
        }

        coordinator.leave(InstanceId(0), &mut members);
        let combination = coordinator.join(InstanceId(0), &mut members).unwrap();

        assert_eq!(
            combination.offsets,
            vec![(InstanceId(1), 0), (InstanceId(2), 4), (InstanceId(0), 6)]
        );
    }

    #[test]
    fn test_support_devices_is_fleet_wide() {
        let mut members = members(&[8, 8]);
        members.get_mut(&InstanceId(1)).unwrap().device = true;
        let mut coordinator = CombinationCoordinator::new(CombineFlags::default());

        coordinator.join(InstanceId(0), &mut members);
        assert!(!members[&InstanceId(0)].support_devices);

        let combination = coordinator.join(InstanceId(1), &mut members).unwrap();
        assert!(combination.support_devices);
        assert!(members[&InstanceId(0)].support_devices);
        assert!(members[&InstanceId(1)].support_devices);
    }

    proptest! {
        #[test]
        fn prop_offset_is_sum_of_earlier_widths(widths in prop::collection::vec(1u32..=16, 1..8)) {
            let mut members = members(&widths);
            let mut coordinator = CombinationCoordinator::new(CombineFlags::default());
            let mut combination = Combination::default();
            for id in 0..widths.len() {
                combination = coordinator.join(InstanceId(id as u32), &mut members).unwrap();
            }

            for (index, (id, offset)) in combination.offsets.iter().enumerate() {
                prop_assert_eq!(*id, InstanceId(index as u32));
                prop_assert_eq!(*offset, widths[..index].iter().sum::<u32>());
                prop_assert_eq!(members[id].session, Some(*offset));
            }
        }

        #[test]
        fn prop_rejoin_leaves_earlier_offsets_alone(
            widths in prop::collection::vec(1u32..=16, 2..8),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut members = members(&widths);
            let mut coordinator = CombinationCoordinator::new(CombineFlags::default());
            let mut before = Combination::default();
            for id in 0..widths.len() {
                before = coordinator.join(InstanceId(id as u32), &mut members).unwrap();
            }

            let moved = InstanceId(pick.index(widths.len()) as u32);
            coordinator.leave(moved, &mut members);
            let after = coordinator.join(moved, &mut members).unwrap();

            for (id, offset) in &before.offsets {
                if id.0 < moved.0 {
                    prop_assert_eq!(after.offset_of(*id), Some(*offset));
                }
            }
            prop_assert_eq!(after.offsets.last().map(|(id, _)| *id), Some(moved));
        }
    }
}
