use std::collections::{BTreeSet, HashMap};

use crate::entities::{
    ConnectionEvent, NotificationPayload, PlayerSession, PresenceCounts, SessionState,
    UNKNOWN_PLAYER_NAME,
};
use crate::services::classifier::is_valid_display_name;
use crate::value_objects::{GuildId, PlayerId, Platform, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Reconstructing state from a full log. Never notifies.
    Cold,
    /// Processing freshly appended bytes. Observable changes notify.
    Hot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Session after the event, `None` when the event referred to an unknown
    /// player and was ignored.
    pub session: Option<PlayerSession>,
    pub changed: bool,
    pub notification: Option<NotificationPayload>,
}

impl ApplyOutcome {
    fn ignored(session: Option<&PlayerSession>) -> Self {
        Self {
            session: session.cloned(),
            changed: false,
            notification: None,
        }
    }
}

/// Session table of one server for one ingestion pass.
///
/// Every call that mutates a session marks it dirty so the caller can persist
/// exactly the rows that changed.
#[derive(Debug, Clone)]
pub struct PlayerSessionTable {
    guild_id: GuildId,
    server_id: ServerId,
    sessions: HashMap<PlayerId, PlayerSession>,
    dirty: BTreeSet<PlayerId>,
}

impl PlayerSessionTable {
    pub fn new(guild_id: GuildId, server_id: ServerId) -> Self {
        Self {
            guild_id,
            server_id,
            sessions: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn from_sessions(guild_id: GuildId, server_id: ServerId, sessions: Vec<PlayerSession>) -> Self {
        let mut table = Self::new(guild_id, server_id);
        for session in sessions {
            if session.guild_id == table.guild_id && session.server_id == table.server_id {
                table.sessions.insert(session.player_id.clone(), session);
            }
        }
        table
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&PlayerSession> {
        self.sessions.get(player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn apply(&mut self, event: &ConnectionEvent, at: i64, mode: ApplyMode) -> ApplyOutcome {
        match event {
            ConnectionEvent::Queued {
                player_id,
                name,
                platform,
            } => self.apply_queue(player_id, name, *platform, at),
            ConnectionEvent::Connected { player_id } => self.apply_connect(player_id, at, mode),
            ConnectionEvent::Disconnected { player_id } => self.apply_disconnect(player_id, at, mode),
        }
    }

    fn apply_queue(&mut self, player_id: &PlayerId, name: &str, platform: Platform, at: i64) -> ApplyOutcome {
        let (guild_id, server_id) = (self.guild_id, self.server_id.clone());
        let session = self
            .sessions
            .entry(player_id.clone())
            .or_insert_with(|| PlayerSession::new(guild_id, server_id, player_id.clone(), at));

        merge_identity(session, name, platform);
        if session.state == SessionState::Offline {
            session.state = SessionState::Queued;
            session.last_transition_at = at;
            session.left_at = None;
        }
        let snapshot = session.clone();
        self.dirty.insert(player_id.clone());
        ApplyOutcome {
            session: Some(snapshot),
            changed: true,
            notification: None,
        }
    }

    fn apply_connect(&mut self, player_id: &PlayerId, at: i64, mode: ApplyMode) -> ApplyOutcome {
        let (guild_id, server_id) = (self.guild_id, self.server_id.clone());
        let session = self
            .sessions
            .entry(player_id.clone())
            .or_insert_with(|| PlayerSession::new(guild_id, server_id, player_id.clone(), at));

        if session.state == SessionState::Online {
            return ApplyOutcome::ignored(Some(&*session));
        }
        session.state = SessionState::Online;
        session.last_transition_at = at;
        session.joined_at = Some(at);
        session.left_at = None;

        let notification = (mode == ApplyMode::Hot).then(|| NotificationPayload::PlayerJoined {
            player_id: session.player_id.clone(),
            name: session.name.clone(),
            platform: session.platform,
        });
        let snapshot = session.clone();
        self.dirty.insert(player_id.clone());
        ApplyOutcome {
            session: Some(snapshot),
            changed: true,
            notification,
        }
    }

    fn apply_disconnect(&mut self, player_id: &PlayerId, at: i64, mode: ApplyMode) -> ApplyOutcome {
        let Some(session) = self.sessions.get_mut(player_id) else {
            return ApplyOutcome::ignored(None);
        };
        if !session.state.is_present() {
            return ApplyOutcome::ignored(Some(&*session));
        }
        session.state = SessionState::Offline;
        session.last_transition_at = at;
        session.left_at = Some(at);

        // Leaving the queue and leaving the server notify the same way.
        let notification = (mode == ApplyMode::Hot).then(|| NotificationPayload::PlayerLeft {
            player_id: session.player_id.clone(),
            name: session.name.clone(),
            platform: session.platform,
        });
        let snapshot = session.clone();
        self.dirty.insert(player_id.clone());
        ApplyOutcome {
            session: Some(snapshot),
            changed: true,
            notification,
        }
    }

    /// Marks every present session offline without notifying. Returns how many
    /// sessions changed.
    pub fn force_all_offline(&mut self, at: i64) -> usize {
        let mut changed = 0;
        for session in self.sessions.values_mut() {
            if session.state.is_present() {
                session.state = SessionState::Offline;
                session.last_transition_at = at;
                session.left_at = Some(at);
                self.dirty.insert(session.player_id.clone());
                changed += 1;
            }
        }
        changed
    }

    pub fn present_sessions(&self) -> Vec<PlayerSession> {
        let mut present: Vec<PlayerSession> = self
            .sessions
            .values()
            .filter(|session| session.state.is_present())
            .cloned()
            .collect();
        present.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        present
    }

    pub fn counts(&self) -> PresenceCounts {
        PresenceCounts::from_sessions(self.sessions.values())
    }

    /// Drains the set of sessions mutated since the last call.
    pub fn take_dirty(&mut self) -> Vec<PlayerSession> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|player_id| self.sessions.get(&player_id).cloned())
            .collect()
    }
}

fn merge_identity(session: &mut PlayerSession, name: &str, platform: Platform) {
    if prefers_name(&session.name, name) {
        session.name = name.trim().to_string();
    }
    if platform != Platform::Unknown {
        session.platform = platform;
    }
}

/// Whether `observed` should replace `stored`: valid names beat the
/// placeholder, longer names beat shorter ones.
pub fn prefers_name(stored: &str, observed: &str) -> bool {
    let observed = observed.trim();
    if observed == UNKNOWN_PLAYER_NAME || !is_valid_display_name(observed) {
        return false;
    }
    if stored == UNKNOWN_PLAYER_NAME || !is_valid_display_name(stored) {
        return true;
    }
    observed.chars().count() > stored.chars().count()
}
