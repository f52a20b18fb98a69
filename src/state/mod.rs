mod dispatch;
mod lobby;
mod timers;

pub use timers::spawn_timer_pump;

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::AbortHandle;

use crate::channel::ConnectionRegistry;
use crate::deck::{builtin_packs, CardPack};
use crate::host::{HostAction, HostError};
use crate::protocol::ServerMessage;
use crate::types::*;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("No lobby is open")]
    NoLobby,

    #[error(transparent)]
    Rejected(#[from] HostError),
}

/// The running lobby and what is tied to its lifetime
pub struct HostSession {
    pub lobby: Lobby,
    /// Connection of the host display that opened the lobby
    pub host_connection: ConnectionId,
    timer: Option<AbortHandle>,
}

impl HostSession {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Option<HostSession>>>,
    pub registry: ConnectionRegistry,
    /// Broadcast channel for sending lobby snapshots to host displays
    pub host_broadcast: broadcast::Sender<ServerMessage>,
    pub packs: Arc<Vec<CardPack>>,
    pub default_settings: GameSettings,
    timer_tx: mpsc::UnboundedSender<HostAction>,
    timer_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<HostAction>>>>,
}

impl AppState {
    pub fn new(packs: Vec<CardPack>, default_settings: GameSettings) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        Self {
            session: Arc::new(RwLock::new(None)),
            registry: ConnectionRegistry::new(),
            host_broadcast: tx,
            packs: Arc::new(packs),
            default_settings,
            timer_tx,
            timer_rx: Arc::new(Mutex::new(Some(timer_rx))),
        }
    }

    pub async fn get_lobby(&self) -> Option<Lobby> {
        self.session.read().await.as_ref().map(|s| s.lobby.clone())
    }

    pub async fn has_pending_timer(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.timer.as_ref())
            .is_some_and(|t| !t.is_finished())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(builtin_packs(), GameSettings::default())
    }
}
