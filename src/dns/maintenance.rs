//! the periodic per-zone maintenance driver
//!
//! One named worker thread per zone drives the key lifecycle and the
//! signature refresh: an initial tick 30 seconds after sign/load, then
//! every 15 minutes. Tick failures are logged and never kill the timer.
//! Disposal signals a shutdown channel and joins the thread.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use crate::dns::zone::PrimaryZone;

/// Delay before the first tick after sign or load
pub const INITIAL_TICK: Duration = Duration::from_secs(30);

/// Steady-state tick interval
pub const TICK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Handle to a zone's maintenance thread.
pub struct MaintenanceDriver {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceDriver {
    /// Start the driver with the standard cadence.
    pub fn start(zone: Arc<PrimaryZone>) -> MaintenanceDriver {
        Self::start_with_intervals(zone, INITIAL_TICK, TICK_INTERVAL)
    }

    /// Start the driver with explicit intervals; the short-cadence seam
    /// tests run against.
    pub fn start_with_intervals(
        zone: Arc<PrimaryZone>,
        initial: Duration,
        steady: Duration,
    ) -> MaintenanceDriver {
        let (shutdown, signal) = channel();
        let thread_name = format!("zone-maintenance-{}", zone.name());
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run_loop(zone, signal, initial, steady));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("failed to spawn {}: {}", thread_name, e);
                None
            }
        };
        MaintenanceDriver { shutdown, handle }
    }

    /// Signal the thread and wait for it to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MaintenanceDriver {
    fn drop(&mut self) {
        // dropping without an explicit shutdown still stops the thread;
        // join only happens in shutdown()
        let _ = self.shutdown.send(());
    }
}

fn run_loop(zone: Arc<PrimaryZone>, signal: Receiver<()>, initial: Duration, steady: Duration) {
    let mut delay = initial;
    loop {
        match signal.recv_timeout(delay) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::debug!("zone {}: maintenance driver stopping", zone.name());
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                match zone.run_maintenance(Utc::now()) {
                    Ok(true) => log::debug!("zone {}: maintenance tick changed the zone", zone.name()),
                    Ok(false) => {}
                    // a failed tick must never abort the driver
                    Err(e) => log::error!("zone {}: maintenance tick failed: {}", zone.name(), e),
                }
                delay = steady;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::context::ZoneHost;

    #[test]
    fn test_driver_ticks_and_shuts_down() {
        let zone = Arc::new(
            PrimaryZone::create("example", "ns1.example", "admin.example", false, ZoneHost::detached())
                .unwrap(),
        );
        let driver = MaintenanceDriver::start_with_intervals(
            Arc::clone(&zone),
            Duration::from_millis(5),
            Duration::from_millis(5),
        );
        // unsigned zone: ticks are no-ops but the loop must keep running
        thread::sleep(Duration::from_millis(50));
        driver.shutdown();
        assert_eq!(zone.serial(), 1);
    }

    #[test]
    fn test_drop_stops_thread() {
        let zone = Arc::new(
            PrimaryZone::create("example", "ns1.example", "admin.example", false, ZoneHost::detached())
                .unwrap(),
        );
        let driver = MaintenanceDriver::start_with_intervals(
            Arc::clone(&zone),
            Duration::from_millis(5),
            Duration::from_millis(5),
        );
        drop(driver);
        thread::sleep(Duration::from_millis(20));
        // the zone handle is again uniquely held once the thread exits
        // (give it a few retries; the thread observes the signal on its
        // next wakeup)
        for _ in 0..100 {
            if Arc::strong_count(&zone) == 1 {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("maintenance thread kept running after drop");
    }
}
