//! Handoff to gameplay and the collaborators that receive it.

use std::fmt;
use std::sync::Arc;

use paddock_protocol::ConnectionId;

use crate::ParticipantRecord;

/// Frozen selections of one participant, produced once at expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRecord {
    connection: ConnectionId,
    name: String,
    vehicle_index: usize,
    map_index: usize,
}

impl HandoffRecord {
    pub(crate) fn freeze(record: &ParticipantRecord, map_index: usize) -> Self {
        Self {
            connection: record.connection,
            name: record.name.clone(),
            vehicle_index: record.vehicle_index,
            map_index,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vehicle_index(&self) -> usize {
        self.vehicle_index
    }

    pub fn map_index(&self) -> usize {
        self.map_index
    }
}

/// Gameplay spawn subsystem. Called exactly once per session generation.
pub trait SpawnCollaborator: Send + Sync {
    fn begin_gameplay(&self, records: &[HandoffRecord], scene_id: &str);
}

/// Scene loading. Called right after [`SpawnCollaborator::begin_gameplay`].
pub trait SceneTransport: Send + Sync {
    fn change_scene(&self, scene_id: &str);
}

/// The external collaborators a lobby hands off to.
#[derive(Clone)]
pub struct Collaborators {
    pub spawn: Arc<dyn SpawnCollaborator>,
    pub scene: Arc<dyn SceneTransport>,
}

impl Collaborators {
    pub fn new(
        spawn: impl SpawnCollaborator + 'static,
        scene: impl SceneTransport + 'static,
    ) -> Self {
        Self {
            spawn: Arc::new(spawn),
            scene: Arc::new(scene),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
