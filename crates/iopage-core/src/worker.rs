//! Per-device background worker threads with cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, warn};

use crate::device::SharedDevice;

/// Handle to one running worker thread.
///
/// The worker loops: check the stop flag, lock the device for one
/// [`worker_poll`](crate::device::BusDevice::worker_poll), sleep for the
/// returned pause. Dropping the handle stops and joins the thread.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns the worker thread for an installed device.
    pub(crate) fn spawn(name: &str, device: SharedDevice) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread_name = format!("{name}.worker");
        let label = name.to_owned();
        let thread = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                debug!(target: "worker", "{label}: worker running");
                loop {
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    let pause = match device.lock() {
                        Ok(mut dev) => dev.worker_poll(),
                        Err(_) => {
                            warn!(target: "worker", "{label}: device wedged, worker exiting");
                            break;
                        }
                    };
                    std::thread::sleep(pause);
                }
                debug!(target: "worker", "{label}: worker stopped");
            })
            .expect("spawn device worker thread");
        Self {
            name: name.to_owned(),
            stop,
            thread: Some(thread),
        }
    }

    /// Signals the worker to stop and waits for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(target: "worker", "{}: worker panicked", self.name);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerHandle;
    use crate::bus::cycle::{BusControl, DatoAccess};
    use crate::device::base::DeviceBase;
    use crate::device::params::DeviceParams;
    use crate::device::register::RegisterCell;
    use crate::device::{shared, BusDevice};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Counting {
        base: DeviceBase,
        polls: Arc<Mutex<u32>>,
    }

    impl BusDevice for Counting {
        fn base(&self) -> &DeviceBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut DeviceBase {
            &mut self.base
        }
        fn on_after_register_access(&mut self, _: usize, _: BusControl, _: DatoAccess) {}
        fn worker_enabled(&self) -> bool {
            true
        }
        fn worker_poll(&mut self) -> Duration {
            *self.polls.lock().unwrap() += 1;
            Duration::from_millis(1)
        }
    }

    #[test]
    fn worker_polls_until_stopped() {
        let polls = Arc::new(Mutex::new(0));
        let device = shared(Counting {
            base: DeviceBase::new(
                "TEST",
                "test",
                DeviceParams::new("test0", 0o760100, 0, 5),
                vec![RegisterCell::passive("CSR", 0)],
            ),
            polls: Arc::clone(&polls),
        });

        let mut handle = WorkerHandle::spawn("test0", device);
        std::thread::sleep(Duration::from_millis(30));
        handle.stop();
        let seen = *polls.lock().unwrap();
        assert!(seen > 0, "worker never polled");

        // After stop the count stays put.
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(*polls.lock().unwrap(), seen);
    }

    #[test]
    fn stop_is_idempotent() {
        let device = shared(Counting {
            base: DeviceBase::new(
                "TEST",
                "test",
                DeviceParams::new("test1", 0o760200, 0, 5),
                vec![RegisterCell::passive("CSR", 0)],
            ),
            polls: Arc::new(Mutex::new(0)),
        });
        let mut handle = WorkerHandle::spawn("test1", device);
        handle.stop();
        handle.stop();
    }
}
