//! # Live Worker
//!
//! Runs a [`Session`] on a dedicated thread between a frame source and a
//! consumer, both connected through single-slot handoffs:
//! - **Frame slot**: the capture callback publishes frames; if the worker
//!   has not picked up the previous frame yet, it is dropped.
//! - **Result slot**: the worker publishes one point per processed frame, in
//!   frame order; a consumer that falls behind only ever sees the newest.
//! - **Shutdown**: a bounded channel checked in the same `select!`.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, select};
use tracing::{debug, info, warn};

use crate::handoff::LatestSlot;
use crate::session::{Session, TakeSummary};
use crate::{AudioFrame, LivePitchPoint};

/// Handle to the processing thread.
#[derive(Debug)]
pub struct LiveWorker {
    frames: LatestSlot<AudioFrame>,
    results: LatestSlot<LivePitchPoint>,
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<Session>>,
}

impl LiveWorker {
    /// Moves `session` onto a new thread and starts processing.
    pub fn spawn(session: Session) -> Self {
        let frames: LatestSlot<AudioFrame> = LatestSlot::new();
        let results: LatestSlot<LivePitchPoint> = LatestSlot::new();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let worker_frames = frames.clone();
        let worker_results = results.clone();
        let thread_handle = thread::spawn(move || {
            info!("live worker started");
            let mut session = session;
            let mut last_start = None;
            loop {
                select! {
                    recv(worker_frames.receiver()) -> msg => match msg {
                        Ok(frame) => {
                            last_start = Some(frame.start_time());
                            let point = session.push_frame(&frame);
                            worker_results.publish(point);
                        }
                        Err(_) => {
                            warn!("frame slot closed");
                            break;
                        }
                    },
                    recv(shutdown_rx) -> _ => {
                        debug!("live worker received shutdown signal");
                        break;
                    },
                }
            }
            // Segments close on frame start times, the last one included.
            if let Some(end) = last_start {
                session.finish(end);
            }
            info!(dropped_frames = worker_frames.dropped(), "live worker finished");
            session
        });

        Self {
            frames,
            results,
            shutdown_tx,
            thread_handle: Some(thread_handle),
        }
    }

    /// Producer end for the frame source.
    pub fn frame_slot(&self) -> LatestSlot<AudioFrame> {
        self.frames.clone()
    }

    /// Consumer end for the visualization layer.
    pub fn result_slot(&self) -> LatestSlot<LivePitchPoint> {
        self.results.clone()
    }

    /// Frames evicted before the worker reached them.
    pub fn dropped_frames(&self) -> u64 {
        self.frames.dropped()
    }

    /// Stops the thread and hands back the session together with the summary
    /// of the take. The open segment is closed at the start of the last
    /// processed frame first, and the session is reset
    /// afterwards, so it can start a new take straight away.
    pub fn stop(mut self) -> Option<(Session, TakeSummary)> {
        let _ = self.shutdown_tx.send(());
        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(mut session) => {
                let summary = session.summary();
                session.reset();
                Some((session, summary))
            }
            Err(_) => {
                warn!("live worker panicked");
                None
            }
        }
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = self.shutdown_tx.send(());
            let _ = handle.join();
        }
    }
}
