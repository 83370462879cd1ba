// src/launcher/service.rs

//! Packet loop of the launcher service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::{BackendMessage, ChildControl, ChildController, MessageSink, spawn_child};
use crate::launcher::{HandleRegistry, LauncherPacket, Token};

const CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Spawn the service loop and return the packet sender.
///
/// The loop owns every launched child, keyed by token, and lives for the
/// rest of the process.
pub(crate) fn spawn_launcher(
    handle: &Handle,
    handles: HandleRegistry,
) -> mpsc::UnboundedSender<LauncherPacket> {
    let (tx, mut rx) = mpsc::unbounded_channel::<LauncherPacket>();
    let runtime = handle.clone();

    handle.spawn(async move {
        info!("launcher service started");

        let mut active: HashMap<Token, ChildController> = HashMap::new();

        while let Some(packet) = rx.recv().await {
            handle_packet(packet, &mut active, &handles, &runtime);
        }

        info!("launcher service stopped (channel closed)");
    });

    tx
}

fn handle_packet(
    packet: LauncherPacket,
    active: &mut HashMap<Token, ChildController>,
    handles: &HandleRegistry,
    runtime: &Handle,
) {
    active.retain(|_, child| !child.is_finished());

    match packet {
        LauncherPacket::StartProcess { token, request } => {
            if active.contains_key(&token) {
                warn!(token, "token already has a running process; ignoring start");
                return;
            }
            debug!(token, program = %request.program.display(), "launching process");
            let child = spawn_child(runtime, request, route_to(token, handles.clone()));
            active.insert(token, child);
        }
        LauncherPacket::WriteIntoProcess { token, data } => {
            forward(active, token, ChildControl::Write(data));
        }
        LauncherPacket::CloseWriteChannel { token } => {
            forward(active, token, ChildControl::CloseWriteChannel);
        }
        LauncherPacket::Terminate { token } => {
            forward(active, token, ChildControl::Terminate);
        }
        LauncherPacket::Kill { token } => {
            forward(active, token, ChildControl::Kill);
        }
        LauncherPacket::Cancel { token } => {
            let Some(child) = active.remove(&token) else {
                return;
            };
            debug!(token, "cancelling process");
            child.send(ChildControl::Terminate);
            let control = child.control_sender();
            runtime.spawn(async move {
                tokio::time::sleep(CANCEL_GRACE).await;
                let _ = control.send(ChildControl::Kill);
            });
        }
    }
}

fn forward(active: &HashMap<Token, ChildController>, token: Token, control: ChildControl) {
    match active.get(&token) {
        Some(child) => {
            if !child.send(control) {
                debug!(token, "process already finished");
            }
        }
        None => debug!(token, ?control, "no process for token"),
    }
}

/// Sink that delivers messages to whichever handle is registered for
/// `token` at delivery time.
fn route_to(token: Token, handles: HandleRegistry) -> MessageSink {
    Arc::new(move |msg: BackendMessage| match handles.get(&token) {
        Some(sink) => {
            let _ = sink.send(msg);
        }
        None => debug!(token, "dropping message for unregistered token"),
    })
}
