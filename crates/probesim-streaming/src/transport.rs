// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process transport between clients and the streaming server.
//!
//! Clients push requests into one bounded queue drained by a dedicated
//! server thread. Each client owns a bounded response queue that only the
//! server's route for that client writes to.
//!
//! Requests never block the caller: a full queue is reported as
//! [`StreamingError::QueueFull`] and the request is lost, which leaves its
//! voxels outstanding on the client.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::StreamingError;
use crate::messages::{ClientId, StreamingRequest, StreamingResponse};
use crate::server::StreamingServer;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Dedicated thread applying a handler to every queued item.
///
/// Stops when the queue disconnects or [`QueueWorker::stop`] is called, and
/// joins on drop.
pub struct QueueWorker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    name: String,
}

impl QueueWorker {
    pub fn spawn<T, F, E>(name: &str, rx: Receiver<T>, mut handler: F) -> Result<Self, StreamingError>
    where
        T: Send + 'static,
        F: FnMut(T) -> Result<(), E> + Send + 'static,
        E: std::fmt::Display,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&shutdown);
        let worker_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(item) => {
                            if let Err(e) = handler(item) {
                                warn!(worker = %worker_name, error = %e, "Handler error");
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(worker = %worker_name, "Worker exiting");
            })
            .map_err(|e| StreamingError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            name: name.to_string(),
        })
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(worker = %self.name, "Worker thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A client's two queue endpoints.
pub struct ClientLink {
    client: ClientId,
    requests: Sender<StreamingRequest>,
    responses: Receiver<StreamingResponse>,
}

impl ClientLink {
    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn send(&self, request: StreamingRequest) -> Result<(), StreamingError> {
        self.requests.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => StreamingError::QueueFull,
            TrySendError::Disconnected(_) => StreamingError::Disconnected,
        })
    }

    /// Every response that has arrived so far, without blocking.
    pub fn drain(&self) -> Vec<StreamingResponse> {
        let mut out = Vec::new();
        loop {
            match self.responses.try_recv() {
                Ok(response) => out.push(response),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<StreamingResponse, StreamingError> {
        self.responses.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => StreamingError::Timeout,
            RecvTimeoutError::Disconnected => StreamingError::Disconnected,
        })
    }
}

/// Owns the server thread and hands out client links.
pub struct StreamingHub {
    server: Arc<StreamingServer>,
    requests: Sender<StreamingRequest>,
    response_capacity: usize,
    worker: QueueWorker,
}

impl StreamingHub {
    pub fn start(
        server: Arc<StreamingServer>,
        request_capacity: usize,
        response_capacity: usize,
    ) -> Result<Self, StreamingError> {
        let (tx, rx) = bounded::<StreamingRequest>(request_capacity);
        let handler_server = Arc::clone(&server);
        let worker = QueueWorker::spawn("probesim-streaming-server", rx, move |request| {
            handler_server.handle_request(request).map(|_| ())
        })?;
        Ok(Self {
            server,
            requests: tx,
            response_capacity,
            worker,
        })
    }

    pub fn connect(&self, client: ClientId) -> ClientLink {
        ClientLink {
            client,
            requests: self.requests.clone(),
            responses: self.server.connect(client, self.response_capacity),
        }
    }

    pub fn disconnect(&self, client: ClientId) -> bool {
        self.server.disconnect(client)
    }

    pub fn server(&self) -> &Arc<StreamingServer> {
        &self.server
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn shutdown(&mut self) {
        self.worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RequestId;
    use crate::oracle::OracleBuilder;
    use probesim_atlas::{GridDims, VoxelCoord};
    use std::sync::atomic::AtomicUsize;

    fn hub() -> StreamingHub {
        let oracle = OracleBuilder::new(GridDims::new(8, 8, 8)).initialize(3, 1.0).unwrap();
        let server = Arc::new(StreamingServer::new(Arc::new(oracle), vec![]));
        StreamingHub::start(server, 16, 16).unwrap()
    }

    #[test]
    fn test_worker_processes_items() {
        let (tx, rx) = bounded::<u32>(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let mut worker = QueueWorker::spawn("test-worker", rx, move |n| {
            counter.fetch_add(n as usize, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .unwrap();

        for n in 1..=4 {
            tx.send(n).unwrap();
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while seen.load(Ordering::SeqCst) < 10 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(seen.load(Ordering::SeqCst), 10);

        worker.stop();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_round_trip_through_server_thread() {
        let hub = hub();
        let link = hub.connect(ClientId(4));
        link.send(StreamingRequest {
            client: ClientId(4),
            request_id: RequestId(0),
            voxels: vec![VoxelCoord::new(1, 2, 3)],
        })
        .unwrap();

        let response = link.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(response.voxels, vec![VoxelCoord::new(1, 2, 3)]);
        assert!(link.drain().is_empty());
        assert!(hub.is_running());
    }

    #[test]
    fn test_disconnected_client_gets_nothing() {
        let hub = hub();
        let link = hub.connect(ClientId(1));
        assert!(hub.disconnect(ClientId(1)));
        link.send(StreamingRequest {
            client: ClientId(1),
            request_id: RequestId(0),
            voxels: vec![VoxelCoord::new(0, 0, 0)],
        })
        .unwrap();
        assert!(matches!(
            link.recv_timeout(Duration::from_millis(300)),
            Err(StreamingError::Disconnected)
        ));
    }
}
