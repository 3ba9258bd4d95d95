//! Surface host - owns every connected Launchpad
//!
//! The host plays the part of the DAW side: it registers surfaces with the
//! combination coordinator, runs the deferred hardware updates on its tick
//! clock and routes inbound MIDI to the right instance.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::combination::{Combination, CombinationCoordinator, CombineFlags, InstanceId};
use crate::error::{Result, SurfaceError};
use crate::launchpad::{Launchpad, ProbeRequest, SurfaceEvent};
use crate::scheduler::TickScheduler;


/// Deferred work queued on the host clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceTask {
    UpdateHardware { instance: InstanceId, epoch: u64 },
}

pub struct SurfaceHost {
    surfaces: HashMap<InstanceId, Launchpad>,
    coordinator: CombinationCoordinator,
    scheduler: TickScheduler<SurfaceTask>,
    next_id: u32,
}

impl SurfaceHost {
    pub fn new(flags: CombineFlags) -> Self {
        Self {
            surfaces: HashMap::new(),
            coordinator: CombinationCoordinator::new(flags),
            scheduler: TickScheduler::new(),
            next_id: 0,
        }
    }

    /// Hand out a fresh instance id
    pub fn next_instance_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn surface(&self, id: InstanceId) -> Option<&Launchpad> {
        self.surfaces.get(&id)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Launchpad> {
        self.surfaces.values()
    }

    pub fn coordinator(&self) -> &CombinationCoordinator {
        &self.coordinator
    }

    /// Take ownership of a surface, combine it and start its activation
    pub fn connect(&mut self, surface: Launchpad) -> Result<Option<Combination>> {
        let id = surface.id();
        if self.surfaces.contains_key(&id) {
            return Err(SurfaceError::DuplicateInstance(id));
        }

        info!("Connecting {} as {}", surface.name(), id);
        self.surfaces.insert(id, surface);

        let combination = self.coordinator.join(id, &mut self.surfaces);
        self.refresh(id)?;
        Ok(combination)
    }

    /// Re-sync one surface with its hardware
    pub fn refresh(&mut self, id: InstanceId) -> Result<()> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(SurfaceError::UnknownInstance(id))?;

        if let Some(ProbeRequest { delay_ticks, epoch }) = surface.refresh_state() {
            self.scheduler.schedule(
                delay_ticks,
                SurfaceTask::UpdateHardware {
                    instance: id,
                    epoch,
                },
            );
        }
        Ok(())
    }

    /// Route one inbound MIDI message to its surface
    pub fn handle_midi(&mut self, id: InstanceId, data: &[u8]) -> Result<Option<SurfaceEvent>> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(SurfaceError::UnknownInstance(id))?;
        Ok(surface.handle_midi(data))
    }

    /// Advance the host clock and run whatever fell due
    pub fn tick(&mut self, ticks: u64) {
        for task in self.scheduler.advance(ticks) {
            match task {
                SurfaceTask::UpdateHardware { instance, epoch } => {
                    match self.surfaces.get_mut(&instance) {
                        Some(surface) => surface.update_hardware(epoch),
                        None => debug!("Hardware update for gone instance {}", instance),
                    }
                }
            }
        }
    }

    /// Silence, uncombine and drop one surface
    pub fn disconnect(&mut self, id: InstanceId) -> Result<Option<Combination>> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(SurfaceError::UnknownInstance(id))?;
        surface.begin_disconnect();

        let combination = self.coordinator.leave(id, &mut self.surfaces);

        if let Some(mut surface) = self.surfaces.remove(&id) {
            surface.finish_disconnect();
            info!("{} ({}) disconnected", surface.name(), id);
        }
        Ok(combination)
    }

    /// Disconnect everything, in connection order
    pub fn disconnect_all(&mut self) {
        let mut ids: Vec<InstanceId> = self.surfaces.keys().copied().collect();
        ids.sort();
        for id in ids {
            if let Err(e) = self.disconnect(id) {
                warn!("Disconnect failed: {}", e);
            }
        }
    }
}
