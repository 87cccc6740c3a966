//! Pure client state and the reducer that applies wire events to it.
//!
//! The reducer owns everything a UI would render: both boards with
//! their derived effective states, the per-slot countdowns, and the
//! role ownership view. It is plain single-threaded code; only the
//! engine loop calls it, and every mutation goes through [`ClientState::apply`]
//! or one of the local mutators.

use std::collections::{BTreeMap, BTreeSet};

use capsync_types::{
    derive_effective, AssetIndex, AssetState, BoardSide, BoardState, CapperSlot, Envelope,
    RoleName, SenderId, ASSET_COUNT, CAPPER_SLOT_COUNT,
};

/// A running countdown for one capper slot. Ticking and display are
/// presentation concerns; the engine only records what was announced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    /// Duration the countdown was started with, in seconds.
    pub seconds: f64,
}

/// What a single applied event changed, for the status surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Nothing changed: own echo, or a frame with no client-side effect.
    Ignored,
    /// A countdown (re)started for a slot.
    CountdownStarted { slot: CapperSlot, seconds: f64 },
    /// A raw marker was written and the side's effective state recomputed.
    BoardChanged { side: BoardSide },
    /// The role ownership view was replaced.
    RolesChanged,
    /// Our pending locked-role claim was granted.
    RoleGranted { role: RoleName },
    /// Our pending locked-role claim was rejected.
    RoleDenied { role: RoleName },
}

/// All state one client holds about the session.
#[derive(Debug, Clone)]
pub struct ClientState {
    local_id: SenderId,
    boards: BoardState,
    effective: [[AssetState; ASSET_COUNT]; 2],
    countdowns: [Option<Countdown>; CAPPER_SLOT_COUNT],
    role_owners: BTreeMap<RoleName, Option<SenderId>>,
    local_roles: BTreeSet<RoleName>,
    pending_claim: Option<RoleName>,
}

impl ClientState {
    pub fn new(local_id: SenderId) -> Self {
        Self {
            local_id,
            boards: BoardState::default(),
            effective: [[AssetState::Normal; ASSET_COUNT]; 2],
            countdowns: [None; CAPPER_SLOT_COUNT],
            role_owners: BTreeMap::new(),
            local_roles: BTreeSet::new(),
            pending_claim: None,
        }
    }

    pub fn local_id(&self) -> SenderId {
        self.local_id
    }

    /// Display-facing state of one board.
    pub fn effective(&self, side: BoardSide) -> &[AssetState; ASSET_COUNT] {
        match side {
            BoardSide::Defense => &self.effective[0],
            BoardSide::Offense => &self.effective[1],
        }
    }

    /// Raw markers of one board, as they travel on the wire.
    pub fn raw(&self, side: BoardSide) -> &[AssetState; ASSET_COUNT] {
        self.boards.side(side)
    }

    pub fn countdown(&self, slot: CapperSlot) -> Option<Countdown> {
        self.countdowns[slot.index()]
    }

    pub fn role_owners(&self) -> &BTreeMap<RoleName, Option<SenderId>> {
        &self.role_owners
    }

    /// Roles this client currently holds, locked and unlocked alike.
    pub fn local_roles(&self) -> &BTreeSet<RoleName> {
        &self.local_roles
    }

    pub fn has_pending_claim(&self) -> bool {
        self.pending_claim.is_some()
    }

    /// Apply one remote event.
    ///
    /// Frames we sent ourselves are suppressed before anything else:
    /// the local mutators already applied the change, so an echo from
    /// the relay or the subnet must never double-apply.
    pub fn apply(&mut self, msg: &Envelope) -> Applied {
        if msg.sender() == Some(&self.local_id) {
            return Applied::Ignored;
        }

        match msg {
            Envelope::Start { seconds, capper, .. } => self.start_countdown(*capper, *seconds),
            Envelope::BoardUpdate { board, index, state, .. } => {
                self.write_board(*board, *index, *state)
            }
            Envelope::RoleStatus { roles } => self.replace_role_view(roles),
            Envelope::RoleResult { role, ok } => self.resolve_claim(role, *ok),
            // Handshake frames and other clients' claim traffic carry
            // no client-side state.
            _ => Applied::Ignored,
        }
    }

    /// Start a countdown locally and produce the event to announce it.
    pub fn local_start(&mut self, slot: CapperSlot, seconds: f64) -> Envelope {
        self.start_countdown(slot, seconds);
        Envelope::Start {
            seconds,
            sender: self.local_id,
            capper: slot,
        }
    }

    /// Write a marker locally and produce the event to announce it.
    pub fn local_board_set(
        &mut self,
        side: BoardSide,
        index: AssetIndex,
        state: AssetState,
    ) -> Envelope {
        self.write_board(side, index, state);
        Envelope::BoardUpdate {
            board: side,
            index,
            state,
            sender: self.local_id,
        }
    }

    /// Mark a locked-role claim as pending and produce the claim
    /// request. At most one claim is outstanding at a time; a second
    /// claim while one is pending returns `None`.
    pub fn begin_claim(&mut self, role: RoleName) -> Option<Envelope> {
        if self.pending_claim.is_some() {
            return None;
        }
        self.pending_claim = Some(role.clone());
        Some(Envelope::RoleClaim {
            role,
            sender: self.local_id,
        })
    }

    /// Deny the pending claim without relay involvement. Used when no
    /// relay link exists: exclusivity cannot be arbitrated locally.
    pub fn deny_pending_claim(&mut self) -> Option<RoleName> {
        self.pending_claim.take()
    }

    /// Adopt an unlocked role locally. Locked roles must go through
    /// [`Self::begin_claim`]; passing one here is a no-op.
    pub fn set_unlocked_role(&mut self, role: RoleName) -> bool {
        if role.is_locked() {
            return false;
        }
        self.local_roles.insert(role)
    }

    /// Drop a role. For locked roles the release request to send is
    /// returned so the relay can free the slot for others.
    pub fn release_role(&mut self, role: &RoleName) -> Option<Envelope> {
        let held = self.local_roles.remove(role);
        if held && role.is_locked() {
            Some(Envelope::RoleRelease {
                role: role.clone(),
                sender: self.local_id,
            })
        } else {
            None
        }
    }

    fn start_countdown(&mut self, slot: CapperSlot, seconds: f64) -> Applied {
        // A start for an already-running slot restarts it.
        self.countdowns[slot.index()] = Some(Countdown { seconds });
        Applied::CountdownStarted { slot, seconds }
    }

    fn write_board(&mut self, side: BoardSide, index: AssetIndex, state: AssetState) -> Applied {
        self.boards.set(side, index, state);
        let slot = match side {
            BoardSide::Defense => 0,
            BoardSide::Offense => 1,
        };
        self.effective[slot] = derive_effective(self.boards.side(side));
        Applied::BoardChanged { side }
    }

    fn replace_role_view(&mut self, roles: &BTreeMap<RoleName, Option<SenderId>>) -> Applied {
        self.role_owners = roles.clone();

        // Re-derive locked-role membership from the snapshot. A
        // snapshot that no longer lists us as owner revokes the local
        // adoption; unlocked roles are purely local and untouched.
        let local_id = self.local_id;
        let owners = &self.role_owners;
        self.local_roles
            .retain(|role| !role.is_locked() || owners.get(role) == Some(&Some(local_id)));
        for (role, owner) in &self.role_owners {
            if *owner == Some(local_id) {
                self.local_roles.insert(role.clone());
            }
        }
        Applied::RolesChanged
    }

    fn resolve_claim(&mut self, role: &RoleName, ok: bool) -> Applied {
        // A result resolves exactly one outstanding claim; anything
        // else is a stray frame.
        if self.pending_claim.as_ref() != Some(role) {
            return Applied::Ignored;
        }
        self.pending_claim = None;
        if ok {
            self.local_roles.insert(role.clone());
            Applied::RoleGranted { role: role.clone() }
        } else {
            Applied::RoleDenied { role: role.clone() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssetState::{Contested, Destroyed, Normal};

    fn index(i: u8) -> AssetIndex {
        AssetIndex::try_from(i).unwrap()
    }

    fn capper1() -> RoleName {
        RoleName::capper(CapperSlot::One)
    }

    #[test]
    fn own_echo_never_mutates() {
        let mut state = ClientState::new(SenderId::new());
        let echo = Envelope::BoardUpdate {
            board: BoardSide::Defense,
            index: index(1),
            state: Destroyed,
            sender: state.local_id(),
        };
        assert_eq!(state.apply(&echo), Applied::Ignored);
        assert_eq!(state.raw(BoardSide::Defense)[1], Normal);

        let echo = Envelope::Start {
            seconds: 35.0,
            sender: state.local_id(),
            capper: CapperSlot::One,
        };
        assert_eq!(state.apply(&echo), Applied::Ignored);
        assert!(state.countdown(CapperSlot::One).is_none());
    }

    #[test]
    fn remote_board_update_recomputes_effective() {
        let mut state = ClientState::new(SenderId::new());
        let peer = SenderId::new();

        let msg = Envelope::BoardUpdate {
            board: BoardSide::Defense,
            index: AssetIndex::GENERATOR,
            state: Destroyed,
            sender: peer,
        };
        assert_eq!(state.apply(&msg), Applied::BoardChanged { side: BoardSide::Defense });

        // Generator down forces every other defense asset to Contested.
        assert_eq!(
            *state.effective(BoardSide::Defense),
            [Destroyed, Contested, Contested, Contested]
        );
        // The offense board is untouched.
        assert_eq!(*state.effective(BoardSide::Offense), [Normal; ASSET_COUNT]);
    }

    #[test]
    fn last_write_wins_on_boards() {
        let mut state = ClientState::new(SenderId::new());
        let peer = SenderId::new();

        state.local_board_set(BoardSide::Offense, index(2), Destroyed);
        // A delayed remote write overwrites the newer local one.
        let msg = Envelope::BoardUpdate {
            board: BoardSide::Offense,
            index: index(2),
            state: Contested,
            sender: peer,
        };
        state.apply(&msg);
        assert_eq!(state.raw(BoardSide::Offense)[2], Contested);
        // Contested collapses to Normal for display.
        assert_eq!(state.effective(BoardSide::Offense)[2], Normal);
    }

    #[test]
    fn start_restarts_running_countdown() {
        let mut state = ClientState::new(SenderId::new());
        let peer = SenderId::new();

        state.apply(&Envelope::Start { seconds: 35.0, sender: peer, capper: CapperSlot::Two });
        state.apply(&Envelope::Start { seconds: 20.0, sender: peer, capper: CapperSlot::Two });
        assert_eq!(state.countdown(CapperSlot::Two), Some(Countdown { seconds: 20.0 }));
        assert!(state.countdown(CapperSlot::One).is_none());
    }

    #[test]
    fn claim_granted_adopts_role() {
        let mut state = ClientState::new(SenderId::new());
        let claim = state.begin_claim(capper1()).unwrap();
        assert!(matches!(claim, Envelope::RoleClaim { .. }));
        assert!(state.has_pending_claim());

        let applied = state.apply(&Envelope::RoleResult { role: capper1(), ok: true });
        assert_eq!(applied, Applied::RoleGranted { role: capper1() });
        assert!(state.local_roles().contains(&capper1()));
        assert!(!state.has_pending_claim());
    }

    #[test]
    fn claim_rejected_reverts() {
        let mut state = ClientState::new(SenderId::new());
        state.begin_claim(capper1()).unwrap();

        let applied = state.apply(&Envelope::RoleResult { role: capper1(), ok: false });
        assert_eq!(applied, Applied::RoleDenied { role: capper1() });
        assert!(!state.local_roles().contains(&capper1()));
        assert!(!state.has_pending_claim());
    }

    #[test]
    fn stray_role_result_is_ignored() {
        let mut state = ClientState::new(SenderId::new());
        let applied = state.apply(&Envelope::RoleResult { role: capper1(), ok: true });
        assert_eq!(applied, Applied::Ignored);
        assert!(state.local_roles().is_empty());
    }

    #[test]
    fn only_one_claim_outstanding() {
        let mut state = ClientState::new(SenderId::new());
        assert!(state.begin_claim(capper1()).is_some());
        assert!(state.begin_claim(RoleName::capper(CapperSlot::Two)).is_none());
    }

    #[test]
    fn role_status_revokes_lost_locked_role() {
        let mut state = ClientState::new(SenderId::new());
        state.begin_claim(capper1()).unwrap();
        state.apply(&Envelope::RoleResult { role: capper1(), ok: true });
        assert!(state.local_roles().contains(&capper1()));

        // The server now says someone else owns capper1.
        let mut roles = BTreeMap::new();
        roles.insert(capper1(), Some(SenderId::new()));
        roles.insert(RoleName::capper(CapperSlot::Two), None);
        state.apply(&Envelope::RoleStatus { roles });
        assert!(!state.local_roles().contains(&capper1()));
    }

    #[test]
    fn role_status_keeps_unlocked_roles() {
        let mut state = ClientState::new(SenderId::new());
        assert!(state.set_unlocked_role(RoleName::new("chaser")));

        let mut roles = BTreeMap::new();
        roles.insert(capper1(), None);
        roles.insert(RoleName::capper(CapperSlot::Two), None);
        state.apply(&Envelope::RoleStatus { roles });
        assert!(state.local_roles().contains(&RoleName::new("chaser")));
    }

    #[test]
    fn locked_role_cannot_be_set_locally() {
        let mut state = ClientState::new(SenderId::new());
        assert!(!state.set_unlocked_role(capper1()));
        assert!(state.local_roles().is_empty());
    }

    #[test]
    fn releasing_locked_role_produces_request() {
        let mut state = ClientState::new(SenderId::new());
        state.begin_claim(capper1()).unwrap();
        state.apply(&Envelope::RoleResult { role: capper1(), ok: true });

        let release = state.release_role(&capper1());
        assert!(matches!(release, Some(Envelope::RoleRelease { .. })));
        assert!(state.local_roles().is_empty());
    }

    #[test]
    fn releasing_unlocked_role_is_local_only() {
        let mut state = ClientState::new(SenderId::new());
        state.set_unlocked_role(RoleName::new("chaser"));
        assert!(state.release_role(&RoleName::new("chaser")).is_none());
        assert!(state.local_roles().is_empty());
    }
}
