// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Disconnect worker.
//!
//! A background thread drains disconnect requests in FIFO order and tears
//! each connection down: local binding or remote proxies first, then the
//! registry bookkeeping. Between requests it checks for pending connections
//! whose confirmation timed out.

use super::{
    ids_mut, ConnectionDescription, ConnectionId, InterfaceRef, InterfaceRole, Registry,
    RegistryEvent, Shared,
};
use crate::naming;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub(super) enum WorkerRequest {
    Disconnect(ConnectionId),
    /// Drops the execution layer and proxy of a removed process.
    Release(String),
    /// Acknowledged once every earlier request was handled.
    Flush(Sender<()>),
    Shutdown,
}

pub(super) fn spawn(
    shared: Weak<Shared>,
    requests: Receiver<WorkerRequest>,
    check_interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("taskmesh-disconnect".to_string())
        .spawn(move || run(&shared, &requests, check_interval))
}

fn run(shared: &Weak<Shared>, requests: &Receiver<WorkerRequest>, check_interval: Duration) {
    debug!("[disconnect-worker] started, timeout check every {:?}", check_interval);
    loop {
        let request = match requests.recv_timeout(check_interval) {
            Ok(request) => Some(request),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        // The strong handle only lives for one request so dropping the last
        // Registry can stop the thread.
        let Some(registry) = shared.upgrade().map(|shared| Registry { shared }) else {
            break;
        };
        match request {
            Some(WorkerRequest::Disconnect(id)) => registry.teardown(id),
            Some(WorkerRequest::Release(process)) => {
                registry.release_process_endpoints(&process);
            }
            Some(WorkerRequest::Flush(done)) => {
                let _ = done.send(());
            }
            Some(WorkerRequest::Shutdown) => break,
            None => {
                let expired = registry.check_connect_confirm_timeout();
                if expired > 0 {
                    debug!("[disconnect-worker] {expired} unconfirmed connection(s) queued");
                }
            }
        }
    }
    debug!("[disconnect-worker] stopped");
}

impl Registry {
    /// Tears down one queued connection. Bookkeeping is cleaned up even when
    /// the endpoint teardown fails.
    pub(super) fn teardown(&self, id: ConnectionId) {
        let Some(record) = self.connection(id) else {
            warn!("disconnect: [{id}] has no record, dropping request");
            self.mark_disconnected(id);
            return;
        };
        let description = record.description;

        self.release_endpoints(&description);
        self.remove_connection_ids(&description);
        self.remove_dedicated_interfaces(&description);

        self.shared.connections.write().remove(&id);
        self.mark_disconnected(id);
        info!("disconnect: {description} disconnected");
        self.emit(RegistryEvent::Disconnected(description));
    }

    fn release_endpoints(&self, description: &ConnectionDescription) {
        if description.is_local() {
            let process = &description.client.process;
            let Some(layer) = self.execution_layer(process) else {
                debug!("disconnect: no execution layer for \"{process}\", skipping local teardown");
                return;
            };
            if layer.disconnect_local(description) {
                let grace = self.shared.config.disconnect_grace();
                if !grace.is_zero() {
                    std::thread::sleep(grace);
                }
            } else {
                warn!("disconnect: local teardown of {description} failed");
            }
            return;
        }

        // The server side owns the binding for cross-process connections.
        let process = &description.server.process;
        match self.proxy(process) {
            Some(proxy) => {
                if let Err(e) = self.call_proxy(&proxy, |p| p.disconnect(description)) {
                    warn!("disconnect: remote teardown of {description} failed: {e}");
                }
            }
            None => error!("disconnect: no network proxy for \"{process}\" ({description})"),
        }
    }

    fn remove_connection_ids(&self, description: &ConnectionDescription) {
        let id = description.id;
        let mut processes = self.shared.processes.write();
        for (interface, role) in [
            (&description.client, InterfaceRole::Required),
            (&description.server, InterfaceRole::Provided),
        ] {
            match ids_mut(&mut processes, interface, role) {
                Some(list) => list.retain(|other| *other != id),
                None => debug!("disconnect: [{id}] {interface} already removed"),
            }
        }
    }

    /// Drops interfaces and component proxies that only existed for this
    /// connection.
    fn remove_dedicated_interfaces(&self, description: &ConnectionDescription) {
        let (client, server) = (&description.client, &description.server);

        if naming::is_manager_component_client(&client.component)
            && server.interface == naming::INTERFACE_INTERNAL_PROVIDED
        {
            let dedicated = naming::interface_component_required_for(&server.component);
            if self.find_interface_required(&client.process, &client.component, &dedicated) {
                if let Err(e) =
                    self.remove_interface_required(&client.process, &client.component, &dedicated)
                {
                    warn!("disconnect: removing {dedicated}: {e}");
                }
            }
        }

        for end in [client, server] {
            self.remove_empty_component_proxy(end);
        }
    }

    fn remove_empty_component_proxy(&self, end: &InterfaceRef) {
        if !naming::is_component_proxy(&end.component)
            || !self.find_component(&end.process, &end.component)
        {
            return;
        }
        if self.interface_count(&end.process, &end.component, false) == Some(0) {
            match self.remove_component(&end.process, &end.component) {
                Ok(()) => debug!(
                    "disconnect: removed empty component proxy {}:{}",
                    end.process, end.component
                ),
                Err(e) => warn!("disconnect: removing component proxy: {e}"),
            }
        }
    }

    fn mark_disconnected(&self, id: ConnectionId) {
        let mut waiting = self.shared.waiting.lock();
        let mut disconnected = self.shared.disconnected.lock();
        waiting.remove(&id);
        disconnected.insert(id);
    }
}
