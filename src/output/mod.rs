//! Output handoff: a bounded lock-free ring buffer between the pipeline
//! thread and a dedicated writer thread, plus the writer's sink trait and
//! its drain loop.

pub mod csv_sink;
pub mod serial;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use log::{error, warn};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::error::PipelineError;
use crate::event::Packet;

/// Bounded single-producer/single-consumer handoff. The producer never
/// blocks: on a full ring it drops the packet it was trying to send.
pub struct OutputRing {
    queue: ArrayQueue<Packet>,
}

impl OutputRing {
    pub fn new(capacity: usize) -> Self {
        OutputRing {
            queue: ArrayQueue::new(capacity),
        }
    }

    /// Returns the packet back on failure so the caller can decide whether
    /// to log and drop it.
    pub fn try_enqueue(&self, packet: Packet) -> Result<(), Packet> {
        self.queue.push(packet)
    }

    /// Pops one packet, discarding any further packets that are
    /// immediately available behind it so only the newest survives a
    /// backlog. Returns `None` when the ring is empty.
    fn coalesced_dequeue(&self) -> Option<Packet> {
        let mut latest = self.queue.pop()?;
        while let Some(newer) = self.queue.pop() {
            latest = newer;
        }
        Some(latest)
    }

    fn drain_all(&self) -> Vec<Packet> {
        let mut out = Vec::new();
        while let Some(p) = self.queue.pop() {
            out.push(p);
        }
        out
    }
}

/// A destination for flow-annotated packets. Implemented by the serial and
/// CSV file sinks; failures are logged by the writer loop and do not stop
/// the thread.
pub trait Sink: Send {
    fn write_packet(&mut self, packet: &Packet) -> std::io::Result<()>;
}

const WRITER_POLL: Duration = Duration::from_micros(500);

pub struct Writer {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    ring: Arc<OutputRing>,
}

impl Writer {
    /// Spawns the writer thread. `sinks` is the (possibly empty) set of
    /// destinations the thread dispatches each packet to in order. Thread
    /// creation failure is surfaced to the caller rather than panicking, so
    /// it can propagate out of `Pipeline::new` like any other init failure.
    pub fn spawn(
        ring: Arc<OutputRing>,
        mut sinks: Vec<Box<dyn Sink>>,
    ) -> Result<Self, PipelineError> {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let ring_thread = ring.clone();

        // Runs at elevated OS priority so the drain loop keeps up with the
        // pipeline thread's producer rate under load.
        let handle = std::thread::Builder::new()
            .name("opticflow-writer".into())
            .spawn_with_priority(ThreadPriority::Max, move |_| {
                let sleeper = spin_sleep::SpinSleeper::new(100_000)
                    .with_spin_strategy(spin_sleep::SpinStrategy::YieldThread);
                loop {
                    if !running_thread.load(Ordering::Acquire) {
                        for packet in ring_thread.drain_all() {
                            dispatch(&mut sinks, &packet);
                        }
                        break;
                    }
                    match ring_thread.coalesced_dequeue() {
                        Some(packet) => dispatch(&mut sinks, &packet),
                        None => sleeper.sleep(WRITER_POLL),
                    }
                }
            })
            .map_err(|e| PipelineError::Thread(e.to_string()))?;

        Ok(Writer {
            handle: Some(handle),
            running,
            ring,
        })
    }

    pub fn ring(&self) -> &Arc<OutputRing> {
        &self.ring
    }

    /// Signals shutdown and joins the writer thread, which drains any
    /// remaining packets before returning.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("writer thread panicked during shutdown");
            }
        }
    }
}

fn dispatch(sinks: &mut [Box<dyn Sink>], packet: &Packet) {
    for sink in sinks.iter_mut() {
        if let Err(e) = sink.write_packet(packet) {
            warn!("output sink write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn packet_with(n: usize) -> Packet {
        Packet::new(0, vec![Event::new(0, 0, n as i64, true); 1])
    }

    #[test]
    fn ring_respects_capacity() {
        let ring = OutputRing::new(2);
        assert!(ring.try_enqueue(packet_with(1)).is_ok());
        assert!(ring.try_enqueue(packet_with(2)).is_ok());
        assert!(ring.try_enqueue(packet_with(3)).is_err());
    }

    #[test]
    fn coalesced_dequeue_keeps_only_newest() {
        let ring = OutputRing::new(8);
        for i in 0..5 {
            ring.try_enqueue(packet_with(i)).unwrap();
        }
        let got = ring.coalesced_dequeue().unwrap();
        assert_eq!(got.events[0].t, 4);
        assert!(ring.coalesced_dequeue().is_none());
    }
}
