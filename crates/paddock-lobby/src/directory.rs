//! The session directory: sole owner of lobby state.
//!
//! Every operation runs to completion, including tally and gate
//! re-evaluation, and returns the messages to broadcast as
//! `(Recipient, ServerMessage)` pairs. The directory does no I/O; the
//! actor dispatches what it returns.

use paddock_protocol::{
    ConnectionId, CountdownState, Direction, LobbySnapshot, Recipient, ServerMessage,
};
use tracing::{debug, error, info};

use crate::countdown::{CountdownController, TickOutcome};
use crate::participant::{default_name, sanitize_name};
use crate::{
    Collaborators, ConfigError, HandoffRecord, LobbyConfig, LobbyError, ParticipantRecord,
    ReadyGate, SlotAllocator, VoteTally,
};

/// Messages produced by one directory operation, in send order.
pub type Outbound = Vec<(Recipient, ServerMessage)>;

/// Requests an admitted participant may make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Toggle the ready flag.
    SetReady,
    ChangeVehicle(Direction),
    VoteMap(usize),
    /// Host only.
    RequestStart,
    /// Host only.
    StopCountdown,
    SetName(String),
}

impl Command {
    fn kind(&self) -> &'static str {
        match self {
            Self::SetReady => "SetReady",
            Self::ChangeVehicle(_) => "ChangeVehicle",
            Self::VoteMap(_) => "VoteMap",
            Self::RequestStart => "RequestStart",
            Self::StopCountdown => "StopCountdown",
            Self::SetName(_) => "SetName",
        }
    }
}

/// One lobby session generation.
///
/// Created open; closed for good once the countdown expires and the
/// handoff ran. A subsequent lobby phase needs a fresh directory.
pub struct SessionDirectory {
    config: LobbyConfig,
    collaborators: Collaborators,
    /// Registration order. The only participant collection.
    participants: Vec<ParticipantRecord>,
    slots: SlotAllocator,
    gate: ReadyGate,
    countdown: CountdownController,
    tally: VoteTally,
    host: Option<ConnectionId>,
    handoff: Option<Vec<HandoffRecord>>,
}

impl SessionDirectory {
    pub fn new(config: LobbyConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config
            .validate()
            .inspect_err(|err| error!(%err, "invalid lobby configuration"))?;
        Ok(Self {
            slots: SlotAllocator::new(config.slot_count),
            gate: ReadyGate::new(config.min_players, config.max_players),
            countdown: CountdownController::new(config.countdown_duration, config.tick_interval),
            config,
            collaborators,
            participants: Vec::new(),
            tally: VoteTally::default(),
            host: None,
            handoff: None,
        })
    }

    // -----------------------------------------------------------------------
    // Join / Leave
    // -----------------------------------------------------------------------

    /// Admits `connection`, assigning the lowest free slot.
    ///
    /// The newcomer receives a full `Welcome` snapshot; everyone else gets
    /// deltas. Joining during a countdown cancels it, since the newcomer is
    /// not ready.
    pub fn join(&mut self, connection: ConnectionId, name: &str) -> Result<Outbound, LobbyError> {
        self.ensure_open()?;
        if self.index_of(connection).is_some() {
            return Err(LobbyError::AlreadyJoined(connection));
        }
        if self.participants.len() >= self.config.max_players {
            return Err(LobbyError::NoSlot);
        }
        let slot = self.slots.acquire().map_err(|_| LobbyError::NoSlot)?;
        let name = match sanitize_name(name) {
            empty if empty.is_empty() => default_name(slot),
            name => name,
        };

        let record = ParticipantRecord::new(connection, name, slot);
        let joined = record.view();
        self.participants.push(record);
        if self.host.is_none() {
            self.host = Some(connection);
        }
        info!(
            %connection,
            slot,
            name = %joined.name,
            participants = self.participants.len(),
            "participant joined"
        );

        let others = Recipient::AllExcept(connection);
        let mut out = vec![(
            others,
            ServerMessage::ParticipantJoined { participant: joined },
        )];
        self.refresh_tally(others, &mut out);
        self.revalidate_countdown(others, &mut out);
        out.insert(
            0,
            (
                Recipient::Connection(connection),
                ServerMessage::Welcome {
                    you: connection,
                    snapshot: self.snapshot(),
                },
            ),
        );
        Ok(out)
    }

    /// Removes `connection`, freeing its slot and vote.
    ///
    /// A second leave for the same connection is a no-op.
    pub fn leave(&mut self, connection: ConnectionId) -> Outbound {
        let Some(index) = self.index_of(connection) else {
            debug!(%connection, "leave for unknown connection ignored");
            return Vec::new();
        };
        let record = self.participants.remove(index);
        self.slots.release(record.slot);
        self.gate.note_removed(record.ready);
        info!(
            %connection,
            slot = record.slot,
            participants = self.participants.len(),
            "participant left"
        );

        let mut out = vec![(Recipient::All, ServerMessage::ParticipantLeft { connection })];
        if self.host == Some(connection) {
            self.host = self.participants.first().map(ParticipantRecord::connection);
            info!(host = ?self.host, "host migrated");
            out.push((Recipient::All, ServerMessage::HostChanged { host: self.host }));
        }
        self.refresh_tally(Recipient::All, &mut out);
        self.revalidate_countdown(Recipient::All, &mut out);
        out
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Runs one participant command.
    pub fn apply(
        &mut self,
        connection: ConnectionId,
        command: Command,
    ) -> Result<Outbound, LobbyError> {
        let kind = command.kind();
        self.dispatch_command(connection, command)
            .inspect_err(|err| debug!(%connection, command = kind, %err, "command rejected"))
    }

    fn dispatch_command(
        &mut self,
        connection: ConnectionId,
        command: Command,
    ) -> Result<Outbound, LobbyError> {
        self.ensure_open()?;
        let index = self
            .index_of(connection)
            .ok_or(LobbyError::UnknownConnection(connection))?;
        match command {
            Command::SetReady => Ok(self.toggle_ready(index)),
            Command::ChangeVehicle(direction) => self.change_vehicle(index, direction),
            Command::VoteMap(map_index) => self.vote_map(index, map_index),
            Command::RequestStart => self.request_start(connection),
            Command::StopCountdown => self.stop_countdown(connection),
            Command::SetName(name) => self.set_name(index, &name),
        }
    }

    fn toggle_ready(&mut self, index: usize) -> Outbound {
        let record = &mut self.participants[index];
        record.ready = !record.ready;
        let participant = record.view();
        self.gate.note_ready_changed(participant.ready);
        debug!(
            connection = %participant.connection,
            ready = participant.ready,
            "ready toggled"
        );

        let mut out = vec![(Recipient::All, ServerMessage::ParticipantUpdated { participant })];
        self.revalidate_countdown(Recipient::All, &mut out);
        out
    }

    fn change_vehicle(&mut self, index: usize, direction: Direction) -> Result<Outbound, LobbyError> {
        let catalog = self.config.vehicles.len() as isize;
        let record = &mut self.participants[index];
        if record.ready {
            return Err(LobbyError::LockedWhileReady);
        }
        record.vehicle_index =
            (record.vehicle_index as isize + direction.step()).rem_euclid(catalog) as usize;
        Ok(vec![(
            Recipient::All,
            ServerMessage::ParticipantUpdated {
                participant: record.view(),
            },
        )])
    }

    fn vote_map(&mut self, index: usize, map_index: usize) -> Result<Outbound, LobbyError> {
        let catalog = self.config.maps.len();
        let record = &mut self.participants[index];
        if record.ready {
            return Err(LobbyError::LockedWhileReady);
        }
        if map_index >= catalog {
            return Err(LobbyError::InvalidMap {
                index: map_index,
                len: catalog,
            });
        }
        if record.map_vote == map_index {
            return Ok(Vec::new());
        }
        record.map_vote = map_index;
        let participant = record.view();

        let mut out = vec![(Recipient::All, ServerMessage::ParticipantUpdated { participant })];
        self.refresh_tally(Recipient::All, &mut out);
        Ok(out)
    }

    fn request_start(&mut self, connection: ConnectionId) -> Result<Outbound, LobbyError> {
        self.ensure_host(connection)?;
        if self.countdown.is_counting() {
            return Err(LobbyError::CountdownActive);
        }
        self.gate.check(&self.participants)?;
        let generation = self.countdown.start()?;
        info!(
            generation,
            remaining_ms = self.countdown.status().remaining_ms,
            participants = self.participants.len(),
            "countdown started"
        );
        Ok(vec![(Recipient::All, self.countdown_message())])
    }

    fn stop_countdown(&mut self, connection: ConnectionId) -> Result<Outbound, LobbyError> {
        self.ensure_host(connection)?;
        let statuses = self.countdown.cancel()?;
        info!(generation = self.countdown.generation(), "countdown stopped by host");
        Ok(statuses
            .into_iter()
            .map(|status| {
                (
                    Recipient::All,
                    ServerMessage::Countdown {
                        state: status.state,
                        remaining_ms: status.remaining_ms,
                    },
                )
            })
            .collect())
    }

    fn set_name(&mut self, index: usize, raw: &str) -> Result<Outbound, LobbyError> {
        let name = sanitize_name(raw);
        if name.is_empty() {
            return Err(LobbyError::InvalidName);
        }
        let record = &mut self.participants[index];
        if record.name == name {
            return Ok(Vec::new());
        }
        record.name = name;
        Ok(vec![(
            Recipient::All,
            ServerMessage::ParticipantUpdated {
                participant: record.view(),
            },
        )])
    }

    // -----------------------------------------------------------------------
    // Countdown
    // -----------------------------------------------------------------------

    /// Feeds one tick of countdown `generation`.
    ///
    /// Ticks of a cancelled or superseded countdown are ignored. The tick
    /// that expires the countdown also runs the handoff and closes the
    /// session.
    pub fn tick(&mut self, generation: u64) -> Outbound {
        match self.countdown.tick(generation) {
            TickOutcome::Stale => {
                debug!(
                    generation,
                    current = self.countdown.generation(),
                    state = %self.countdown.state(),
                    "stale countdown tick ignored"
                );
                Vec::new()
            }
            TickOutcome::Counting(remaining) => {
                debug!(generation, remaining_ms = remaining.as_millis() as u64, "countdown tick");
                vec![(Recipient::All, self.countdown_message())]
            }
            TickOutcome::Expired => {
                info!(generation, "countdown expired");
                let mut out = vec![(Recipient::All, self.countdown_message())];
                self.hand_off(&mut out);
                out
            }
        }
    }

    /// Freezes every participant into a [`HandoffRecord`], publishes them to
    /// the spawn collaborator, starts the scene change and tears the
    /// session down. Runs once per directory.
    fn hand_off(&mut self, out: &mut Outbound) {
        let map_index = self.tally.map_index;
        let scene_id = match self.config.maps.get(map_index) {
            Some(map) => map.scene_id.clone(),
            None => {
                error!(map_index, "tallied map missing from catalog");
                String::new()
            }
        };
        let records: Vec<HandoffRecord> = self
            .participants
            .iter()
            .map(|record| HandoffRecord::freeze(record, map_index))
            .collect();

        info!(
            participants = records.len(),
            map_index,
            scene = %scene_id,
            "handing off to gameplay"
        );
        self.collaborators.spawn.begin_gameplay(&records, &scene_id);
        self.collaborators.scene.change_scene(&scene_id);
        out.push((
            Recipient::All,
            ServerMessage::SceneChange {
                scene_id,
                map_index,
            },
        ));

        for record in self.participants.drain(..) {
            self.slots.release(record.slot);
            self.gate.note_removed(record.ready);
        }
        self.host = None;
        self.handoff = Some(records);
    }

    /// Cancels a running countdown if the gate no longer holds.
    fn revalidate_countdown(&mut self, to: Recipient, out: &mut Outbound) {
        if !self.countdown.is_counting() {
            return;
        }
        let Err(blocker) = self.gate.check(&self.participants) else {
            return;
        };
        if let Ok(statuses) = self.countdown.cancel() {
            info!(
                generation = self.countdown.generation(),
                ?blocker,
                "countdown cancelled"
            );
            out.extend(statuses.into_iter().map(|status| {
                (
                    to,
                    ServerMessage::Countdown {
                        state: status.state,
                        remaining_ms: status.remaining_ms,
                    },
                )
            }));
        }
    }

    /// Recomputes the tally; emits a delta only if it changed.
    fn refresh_tally(&mut self, to: Recipient, out: &mut Outbound) {
        let tally = VoteTally::recompute(&self.participants);
        if tally != self.tally {
            self.tally = tally;
            out.push((
                to,
                ServerMessage::VoteTally {
                    map_index: tally.map_index,
                    votes: tally.votes,
                },
            ));
        }
    }

    fn countdown_message(&self) -> ServerMessage {
        let status = self.countdown.status();
        ServerMessage::Countdown {
            state: status.state,
            remaining_ms: status.remaining_ms,
        }
    }

    fn ensure_open(&self) -> Result<(), LobbyError> {
        if self.is_closed() {
            Err(LobbyError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_host(&self, connection: ConnectionId) -> Result<(), LobbyError> {
        if self.host == Some(connection) {
            Ok(())
        } else {
            Err(LobbyError::NotHost)
        }
    }

    fn index_of(&self, connection: ConnectionId) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.connection == connection)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Full state, as sent in `Welcome`.
    pub fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            participants: self.participants.iter().map(ParticipantRecord::view).collect(),
            host: self.host,
            countdown: self.countdown.status(),
            tally: self.tally.view(),
            maps: self.config.maps.clone(),
            vehicles: self.config.vehicles.clone(),
            min_players: self.config.min_players,
            max_players: self.config.max_players,
            slot_count: self.config.slot_count,
        }
    }

    /// Ready-quorum check against the current records.
    pub fn all_ready(&mut self) -> bool {
        self.gate.all_ready(&self.participants)
    }

    pub fn participants(&self) -> &[ParticipantRecord] {
        &self.participants
    }

    pub fn participant(&self, connection: ConnectionId) -> Option<&ParticipantRecord> {
        self.index_of(connection).map(|i| &self.participants[i])
    }

    pub fn host(&self) -> Option<ConnectionId> {
        self.host
    }

    pub fn tally(&self) -> VoteTally {
        self.tally
    }

    pub fn countdown_state(&self) -> CountdownState {
        self.countdown.state()
    }

    pub fn countdown_generation(&self) -> u64 {
        self.countdown.generation()
    }

    pub fn is_slot_occupied(&self, slot: usize) -> bool {
        self.slots.is_occupied(slot)
    }

    pub fn resync_count(&self) -> u64 {
        self.gate.resync_count()
    }

    /// `true` once the handoff ran.
    pub fn is_closed(&self) -> bool {
        self.handoff.is_some()
    }

    /// Records published at handoff, if it happened.
    pub fn handoff_records(&self) -> Option<&[HandoffRecord]> {
        self.handoff.as_deref()
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }
}
