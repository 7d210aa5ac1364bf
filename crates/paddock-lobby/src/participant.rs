use paddock_protocol::{ConnectionId, ParticipantView};

/// Longest display name kept, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Replicated state of one admitted connection.
///
/// Owned by the [`SessionDirectory`](crate::SessionDirectory) and only
/// mutated through its command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub(crate) connection: ConnectionId,
    pub(crate) name: String,
    pub(crate) vehicle_index: usize,
    pub(crate) ready: bool,
    pub(crate) slot: usize,
    pub(crate) map_vote: usize,
}

impl ParticipantRecord {
    pub(crate) fn new(connection: ConnectionId, name: String, slot: usize) -> Self {
        Self {
            connection,
            name,
            vehicle_index: 0,
            ready: false,
            slot,
            map_vote: 0,
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

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn map_vote(&self) -> usize {
        self.map_vote
    }

    /// Wire representation.
    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            connection: self.connection,
            name: self.name.clone(),
            vehicle_index: self.vehicle_index,
            ready: self.ready,
            slot: self.slot,
            map_vote: self.map_vote,
        }
    }
}

/// Trims surrounding whitespace and truncates to [`MAX_NAME_LEN`] characters.
pub fn sanitize_name(raw: &str) -> String {
    let truncated: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    truncated.trim_end().to_string()
}

/// Name given to a participant who joined without one.
pub(crate) fn default_name(slot: usize) -> String {
    format!("Player {}", slot + 1)
}
