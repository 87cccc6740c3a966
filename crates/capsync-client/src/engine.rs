//! Client engine: one event loop owning the client state.
//!
//! Every event source (relay receiver task, LAN listener task, local
//! actions from a UI or hotkey layer) funnels into a single mpsc
//! channel; the loop applies events to [`ClientState`] and publishes a
//! fresh [`ClientStatus`] snapshot through a watch channel after every
//! change. Nothing outside the loop ever touches the state.

use std::collections::{BTreeMap, BTreeSet};

use capsync_protocol::EventTransport;
use capsync_types::{
    AssetIndex, AssetState, BoardSide, CapperSlot, Envelope, RoleName, SenderId, ASSET_COUNT,
    CAPPER_SLOT_COUNT, DEFAULT_TIMER_CYCLE,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::reducer::{Applied, ClientState, Countdown};

/// Which path events currently travel on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStatus {
    /// Connected to the relay; full protocol available.
    Relay,
    /// Subnet broadcast only; no role arbitration, lossy delivery.
    LanOnly,
    /// No network path; local actions still apply locally.
    #[default]
    Local,
}

/// Events processed by the engine's main loop.
#[derive(Debug)]
pub enum EngineEvent {
    /// An event from the relay or the subnet.
    Remote(Envelope),
    /// Start hotkey: begin a countdown with the next duration in the
    /// configured cycle.
    LocalStart { slot: CapperSlot },
    /// Begin a countdown with an explicit duration.
    LocalStartSeconds { slot: CapperSlot, seconds: f64 },
    /// Write one raw board marker.
    LocalBoardSet {
        side: BoardSide,
        index: AssetIndex,
        state: AssetState,
    },
    /// Request a role. Locked roles go through relay arbitration;
    /// unlocked roles are adopted locally.
    ClaimRole(RoleName),
    /// Give up a role.
    ReleaseRole(RoleName),
    /// The relay link died.
    RelayClosed,
    /// Shutdown signal.
    Shutdown,
}

/// Snapshot of everything a front end renders, published after every
/// state change.
#[derive(Debug, Clone, Default)]
pub struct ClientStatus {
    pub link: LinkStatus,
    /// Connection count the relay reported at handshake time.
    pub client_count: usize,
    pub countdowns: [Option<Countdown>; CAPPER_SLOT_COUNT],
    pub effective_defense: [AssetState; ASSET_COUNT],
    pub effective_offense: [AssetState; ASSET_COUNT],
    pub role_owners: BTreeMap<RoleName, Option<SenderId>>,
    pub local_roles: BTreeSet<RoleName>,
    /// The most recently denied locked-role claim, cleared on the next
    /// grant. Front ends surface this as "slot taken".
    pub last_denied: Option<RoleName>,
}

/// The client engine.
pub struct Engine {
    state: ClientState,
    transport: Option<Box<dyn EventTransport>>,
    link: LinkStatus,
    client_count: usize,
    timer_cycle: Vec<f64>,
    cycle_position: usize,
    last_denied: Option<RoleName>,
    event_tx: mpsc::Sender<EngineEvent>,
    event_rx: mpsc::Receiver<EngineEvent>,
    status_tx: watch::Sender<ClientStatus>,
}

impl Engine {
    /// Create an engine with no network path attached.
    pub fn new(local_id: SenderId, timer_cycle: Vec<f64>) -> Self {
        let timer_cycle = if timer_cycle.is_empty() {
            DEFAULT_TIMER_CYCLE.to_vec()
        } else {
            timer_cycle
        };
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (status_tx, _) = watch::channel(ClientStatus::default());

        Self {
            state: ClientState::new(local_id),
            transport: None,
            link: LinkStatus::Local,
            client_count: 0,
            timer_cycle,
            cycle_position: 0,
            last_denied: None,
            event_tx,
            event_rx,
            status_tx,
        }
    }

    /// Get a clone of the event sender for feeding events into the engine.
    pub fn event_sender(&self) -> mpsc::Sender<EngineEvent> {
        self.event_tx.clone()
    }

    /// Subscribe to status snapshots.
    pub fn status_receiver(&self) -> watch::Receiver<ClientStatus> {
        self.status_tx.subscribe()
    }

    pub fn local_id(&self) -> SenderId {
        self.state.local_id()
    }

    /// Attach an authenticated relay link. `client_count` is the count
    /// the relay reported at handshake time.
    pub fn attach_relay(&mut self, transport: Box<dyn EventTransport>, client_count: usize) {
        self.transport = Some(transport);
        self.link = LinkStatus::Relay;
        self.client_count = client_count;
    }

    /// Attach the LAN fallback link.
    pub fn attach_lan(&mut self, transport: Box<dyn EventTransport>) {
        self.transport = Some(transport);
        self.link = LinkStatus::LanOnly;
        self.client_count = 0;
    }

    /// Run the engine event loop until shutdown.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        info!(id = %self.state.local_id(), link = ?self.link, "engine running");
        self.publish();

        while let Some(event) = self.event_rx.recv().await {
            match event {
                EngineEvent::Remote(msg) => self.handle_remote(&msg),
                EngineEvent::LocalStart { slot } => {
                    let seconds = self.next_cycle_duration();
                    self.handle_local_start(slot, seconds).await;
                }
                EngineEvent::LocalStartSeconds { slot, seconds } => {
                    self.handle_local_start(slot, seconds).await;
                }
                EngineEvent::LocalBoardSet { side, index, state } => {
                    let msg = self.state.local_board_set(side, index, state);
                    self.send_event(&msg).await;
                    self.publish();
                }
                EngineEvent::ClaimRole(role) => self.handle_claim(role).await,
                EngineEvent::ReleaseRole(role) => {
                    if let Some(msg) = self.state.release_role(&role) {
                        self.send_event(&msg).await;
                    }
                    self.publish();
                }
                EngineEvent::RelayClosed => self.handle_relay_closed(),
                EngineEvent::Shutdown => {
                    info!("engine shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_remote(&mut self, msg: &Envelope) {
        match self.state.apply(msg) {
            Applied::Ignored => {}
            Applied::RoleGranted { role } => {
                info!(%role, "role claim granted");
                self.last_denied = None;
                self.publish();
            }
            Applied::RoleDenied { role } => {
                info!(%role, "role claim denied, slot taken");
                self.last_denied = Some(role);
                self.publish();
            }
            applied => {
                debug!(?applied, "remote event applied");
                self.publish();
            }
        }
    }

    async fn handle_local_start(&mut self, slot: CapperSlot, seconds: f64) {
        let msg = self.state.local_start(slot, seconds);
        self.send_event(&msg).await;
        self.publish();
    }

    async fn handle_claim(&mut self, role: RoleName) {
        if !role.is_locked() {
            self.state.set_unlocked_role(role);
            self.publish();
            return;
        }

        // Exclusivity lives on the relay; without it a locked claim
        // cannot be granted.
        if self.link != LinkStatus::Relay {
            warn!(%role, "locked role claim without relay link, denying locally");
            self.last_denied = Some(role);
            self.publish();
            return;
        }

        if let Some(msg) = self.state.begin_claim(role) {
            self.send_event(&msg).await;
        }
        self.publish();
    }

    fn handle_relay_closed(&mut self) {
        if self.link == LinkStatus::Relay {
            warn!("relay link lost, continuing locally");
            self.transport = None;
            self.link = LinkStatus::Local;
            self.client_count = 0;
        }
        // A claim in flight can no longer be answered. This runs even
        // when a failed send already dropped the link, so a stale
        // pending claim never blocks claims after a reconnect.
        if let Some(role) = self.state.deny_pending_claim() {
            self.last_denied = Some(role);
        }
        self.publish();
    }

    /// Next duration in the configured cycle, advancing the position.
    fn next_cycle_duration(&mut self) -> f64 {
        let seconds = self.timer_cycle[self.cycle_position % self.timer_cycle.len()];
        self.cycle_position = (self.cycle_position + 1) % self.timer_cycle.len();
        seconds
    }

    async fn send_event(&mut self, msg: &Envelope) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send_event(msg).await {
            warn!(error = %e, "failed to send event, dropping link");
            self.transport = None;
            self.link = LinkStatus::Local;
            self.client_count = 0;
            // If this was a claim frame, the relay will never answer
            // it; deny it now so the claim slot frees up.
            if let Some(role) = self.state.deny_pending_claim() {
                self.last_denied = Some(role);
            }
        }
    }

    fn publish(&self) {
        let status = ClientStatus {
            link: self.link,
            client_count: self.client_count,
            countdowns: [
                self.state.countdown(CapperSlot::One),
                self.state.countdown(CapperSlot::Two),
            ],
            effective_defense: *self.state.effective(BoardSide::Defense),
            effective_offense: *self.state.effective(BoardSide::Offense),
            role_owners: self.state.role_owners().clone(),
            local_roles: self.state.local_roles().clone(),
            last_denied: self.last_denied.clone(),
        };
        let _ = self.status_tx.send(status);
    }
}
