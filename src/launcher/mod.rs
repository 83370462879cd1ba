// src/launcher/mod.rs

//! Out-of-thread launcher service.
//!
//! Callers never spawn processes themselves: they register a
//! `CallerHandle` under a process-unique token and send packets to the
//! service, which owns the children and routes their messages back to the
//! handle registered for that token.

mod service;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::Sender;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tracing::debug;

use crate::backend::{BackendMessage, ChildRequest};
use crate::errors::{ProcctlError, Result};
use crate::runtime::io_runtime;

pub type Token = u64;

pub(crate) type HandleRegistry = Arc<DashMap<Token, Sender<BackendMessage>>>;

#[derive(Debug)]
pub(crate) enum LauncherPacket {
    StartProcess { token: Token, request: ChildRequest },
    WriteIntoProcess { token: Token, data: Vec<u8> },
    CloseWriteChannel { token: Token },
    Terminate { token: Token },
    Kill { token: Token },
    /// Terminate, then kill after a grace period.
    Cancel { token: Token },
}

static INSTANCE: OnceCell<LauncherInterface> = OnceCell::new();
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

pub struct LauncherInterface {
    packets: mpsc::UnboundedSender<LauncherPacket>,
    handles: HandleRegistry,
}

impl LauncherInterface {
    /// The process-wide service, started on first use.
    pub fn instance() -> Result<&'static LauncherInterface> {
        INSTANCE.get_or_try_init(|| {
            let runtime = io_runtime()?;
            let handles: HandleRegistry = Arc::new(DashMap::new());
            let packets = service::spawn_launcher(runtime.handle(), handles.clone());
            Ok(LauncherInterface { packets, handles })
        })
    }

    pub fn next_token() -> Token {
        NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
    }

    /// Route messages for `token` to `sink` until the returned handle drops.
    pub fn register_handle(&'static self, token: Token, sink: Sender<BackendMessage>) -> CallerHandle {
        debug!(token, "registering launcher handle");
        self.handles.insert(token, sink);
        CallerHandle {
            token,
            interface: self,
        }
    }

    pub fn unregister_handle(&self, token: Token) {
        debug!(token, "unregistering launcher handle");
        self.handles.remove(&token);
    }

    pub fn is_registered(&self, token: Token) -> bool {
        self.handles.contains_key(&token)
    }

    fn send(&self, packet: LauncherPacket) -> Result<()> {
        self.packets
            .send(packet)
            .map_err(|_| ProcctlError::ChannelClosed)
    }
}

/// One caller's connection to the launcher, valid for a single run.
///
/// Dropping the handle cancels the process and unregisters the token.
pub struct CallerHandle {
    token: Token,
    interface: &'static LauncherInterface,
}

impl std::fmt::Debug for CallerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerHandle").field("token", &self.token).finish()
    }
}

impl CallerHandle {
    pub fn token(&self) -> Token {
        self.token
    }

    pub(crate) fn start(&self, request: ChildRequest) -> Result<()> {
        self.interface.send(LauncherPacket::StartProcess {
            token: self.token,
            request,
        })
    }

    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.interface.send(LauncherPacket::WriteIntoProcess {
            token: self.token,
            data: data.to_vec(),
        })
    }

    pub fn close_write_channel(&self) -> Result<()> {
        self.interface
            .send(LauncherPacket::CloseWriteChannel { token: self.token })
    }

    pub fn terminate(&self) -> Result<()> {
        self.interface
            .send(LauncherPacket::Terminate { token: self.token })
    }

    pub fn kill(&self) -> Result<()> {
        self.interface.send(LauncherPacket::Kill { token: self.token })
    }

    pub fn cancel(&self) -> Result<()> {
        self.interface
            .send(LauncherPacket::Cancel { token: self.token })
    }
}

impl Drop for CallerHandle {
    fn drop(&mut self) {
        let _ = self.cancel();
        self.interface.unregister_handle(self.token);
    }
}
