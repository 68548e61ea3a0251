//! Background capture service
//!
//! [`CaptureService`] owns one producer thread that repeatedly asks a
//! [`CaptureProvider`] for a frame, and any number of consumer threads that read
//! copies of the most recent frame.
//!
//! - The producer fills a private staging frame, then swaps it with the shared
//!   frame under the lock. Readers never see a partially written frame.
//! - [`CaptureService::take`] copies whatever is cached and never waits.
//! - [`CaptureService::take_new`] waits for a frame whose capture started after
//!   the call began.
//! - The first provider failure is recorded once and returned by every later
//!   call. The producer thread exits and the provider is not called again.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, trace_span, warn};

use super::{CaptureError, CaptureProvider, Dimensions, Frame, StartupError};
use crate::config;
use crate::platform_utils::validate_dimensions;
use crate::settings::ServiceSettings;

/// Current health of a capture service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    /// The producer thread stopped on this error; permanent
    Failed(CaptureError),
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running)
    }
}

/// State guarded by the frame lock
struct FrameSlot {
    /// Most recently published frame
    frame: Frame,
    /// Ticket handed to the next capture iteration when it starts
    next_ticket: u64,
    /// Ticket of the capture held in `frame`; 0 until the first publish
    published: u64,
}

struct Shared {
    slot: Mutex<FrameSlot>,
    cycle: Condvar,
    /// 0 while running, otherwise the code of the recorded failure
    status: AtomicU32,
    interval_nanos: AtomicU64,
    terminate: AtomicBool,
}

impl Shared {
    fn new(frame: Frame, interval: Duration) -> Self {
        Self {
            slot: Mutex::new(FrameSlot {
                frame,
                next_ticket: 1,
                published: 0,
            }),
            cycle: Condvar::new(),
            status: AtomicU32::new(0),
            interval_nanos: AtomicU64::new(duration_to_nanos(interval)),
            terminate: AtomicBool::new(false),
        }
    }

    // The slot is only mutated by swaps and counter updates, so its contents
    // stay consistent even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, FrameSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.status.load(Ordering::Acquire) == 0
    }

    fn check_running(&self) -> Result<(), CaptureError> {
        match self.status.load(Ordering::Acquire) {
            0 => Ok(()),
            code => Err(CaptureError::from_code(code)),
        }
    }

    fn status(&self) -> ServiceStatus {
        match self.check_running() {
            Ok(()) => ServiceStatus::Running,
            Err(err) => ServiceStatus::Failed(err),
        }
    }

    /// Record the first failure and wake every waiter. Later failures are ignored.
    fn record_failure(&self, err: CaptureError) {
        let _ = self
            .status
            .compare_exchange(0, err.code(), Ordering::AcqRel, Ordering::Acquire);
        // Waiters test the status while holding the lock; taking it here means
        // none of them can be between that test and the wait when we notify.
        drop(self.lock());
        self.cycle.notify_all();
    }

    fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos.load(Ordering::Relaxed))
    }

    fn set_interval(&self, interval: Duration) {
        self.interval_nanos
            .store(duration_to_nanos(interval), Ordering::Relaxed);
    }

    fn terminate_requested(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    fn start_capture(&self) -> u64 {
        let mut slot = self.lock();
        let ticket = slot.next_ticket;
        slot.next_ticket += 1;
        ticket
    }

    fn publish(&self, staging: &mut Frame, ticket: u64) {
        {
            let mut slot = self.lock();
            std::mem::swap(&mut slot.frame, staging);
            slot.published = ticket;
        }
        self.cycle.notify_all();
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Records a failure if the capture thread unwinds outside the provider call,
/// so the constructor and `take_new` callers are released.
struct UnwindGuard<'a> {
    shared: &'a Shared,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.record_failure(CaptureError::BadEnvironment);
        }
    }
}

/// Continuously refreshed frame source.
///
/// Dimensions are taken from the provider once, at construction, and never
/// re-queried.
pub struct CaptureService {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    dimensions: Dimensions,
}

impl CaptureService {
    /// Start capturing from `provider` every `interval`.
    ///
    /// Blocks until the first frame has been captured, so a returned service
    /// always has a valid frame cached. If the first capture fails, the
    /// background thread is joined before the error is returned.
    pub fn new<P: CaptureProvider>(provider: P, interval: Duration) -> Result<Self, StartupError> {
        let dimensions = provider.dimensions();
        if let Err(reason) = validate_dimensions(dimensions.width, dimensions.height) {
            error!(%reason, "Rejecting capture provider");
            return Err(StartupError::InvalidDimensions {
                width: dimensions.width,
                height: dimensions.height,
            });
        }

        let shared = Arc::new(Shared::new(Frame::new(dimensions), interval));
        let staging = Frame::new(dimensions);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(config::capture::THREAD_NAME.to_string())
            .spawn(move || run_capture_loop(&worker_shared, provider, staging))
            .map_err(StartupError::Spawn)?;

        // From here on, dropping `service` terminates and joins the thread.
        let service = Self {
            shared,
            worker: Some(worker),
            dimensions,
        };

        if let Err(err) = service.wait_for_first_frame() {
            error!(error = %err, code = err.code(), "Capture service failed to start");
            return Err(StartupError::Capture(err));
        }

        info!(
            width = dimensions.width,
            height = dimensions.height,
            ?interval,
            "Capture service started"
        );
        Ok(service)
    }

    /// Start with the default capture interval
    pub fn with_default_interval<P: CaptureProvider>(provider: P) -> Result<Self, StartupError> {
        Self::new(
            provider,
            Duration::from_millis(config::capture::DEFAULT_INTERVAL_MS),
        )
    }

    /// Start with the interval configured in `settings`
    pub fn from_settings<P: CaptureProvider>(
        provider: P,
        settings: &ServiceSettings,
    ) -> Result<Self, StartupError> {
        Self::new(provider, settings.interval())
    }

    /// Start capturing the primary display with the platform's default provider
    pub fn open_primary_display(interval: Duration) -> Result<Self, StartupError> {
        let provider = super::create_default_provider()?;
        Self::new(provider, interval)
    }

    fn wait_for_first_frame(&self) -> Result<(), CaptureError> {
        let slot = self.shared.lock();
        let slot = self
            .shared
            .cycle
            .wait_while(slot, |s| s.published == 0 && self.shared.is_running())
            .unwrap_or_else(PoisonError::into_inner);
        drop(slot);
        self.shared.check_running()
    }

    /// Copy of the cached frame. Does not wait for a new capture.
    pub fn take(&self) -> Result<Frame, CaptureError> {
        let mut output = Frame::new(self.dimensions);
        self.take_into(&mut output)?;
        Ok(output)
    }

    /// Copy the cached frame into `output`, reusing its allocation
    pub fn take_into(&self, output: &mut Frame) -> Result<(), CaptureError> {
        self.shared.check_running()?;
        let slot = self.shared.lock();
        output.copy_from(&slot.frame);
        Ok(())
    }

    /// Wait for the next frame whose capture started after this call began,
    /// and return a copy of it.
    pub fn take_new(&self) -> Result<Frame, CaptureError> {
        let mut output = Frame::new(self.dimensions);
        self.take_new_into(&mut output)?;
        Ok(output)
    }

    /// Like [`take_new`](Self::take_new), writing into `output`
    pub fn take_new_into(&self, output: &mut Frame) -> Result<(), CaptureError> {
        self.shared.check_running()?;

        let slot = self.shared.lock();
        // Any iteration that already holds a ticket started before this call.
        let wanted = slot.next_ticket;
        let slot = self
            .shared
            .cycle
            .wait_while(slot, |s| s.published < wanted && self.shared.is_running())
            .unwrap_or_else(PoisonError::into_inner);

        self.shared.check_running()?;
        output.copy_from(&slot.frame);
        Ok(())
    }

    /// Delay between the end of one capture and the start of the next
    pub fn interval(&self) -> Duration {
        self.shared.interval()
    }

    /// Takes effect from the next sleep; a sleep in progress is not shortened.
    pub fn set_interval(&self, interval: Duration) {
        self.shared.set_interval(interval);
        debug!(?interval, "Capture interval updated");
    }

    pub fn status(&self) -> ServiceStatus {
        self.shared.status()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }
}

impl std::fmt::Debug for CaptureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureService")
            .field("dimensions", &self.dimensions)
            .field("interval", &self.interval())
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for CaptureService {
    fn drop(&mut self) {
        self.shared.terminate.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            // Cuts the inter-capture sleep short; an in-flight capture still
            // runs to completion.
            worker.thread().unpark();
            if worker.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
        debug!("Capture service stopped");
    }
}

fn run_capture_loop<P: CaptureProvider>(shared: &Shared, mut provider: P, mut staging: Frame) {
    let _guard = UnwindGuard { shared };
    debug!(
        width = staging.width(),
        height = staging.height(),
        "Capture thread started"
    );

    while !shared.terminate_requested() {
        let _span = trace_span!("capture_iteration").entered();

        let ticket = shared.start_capture();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            provider.capture(staging.as_bytes_mut())
        }))
        .unwrap_or_else(|_| {
            error!("Capture provider panicked");
            Err(CaptureError::BadEnvironment)
        });

        if let Err(err) = result {
            error!(error = %err, code = err.code(), ticket, "Capture failed, stopping capture thread");
            shared.record_failure(err);
            return;
        }

        shared.publish(&mut staging, ticket);
        trace!(ticket, "Frame published");

        sleep_interval(shared);
    }

    debug!("Capture thread exiting on request");
}

/// Sleep for the current interval, returning early only if termination is
/// requested.
fn sleep_interval(shared: &Shared) {
    let interval = shared.interval();
    let deadline = Instant::now().checked_add(interval);

    while !shared.terminate_requested() {
        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return;
                }
                thread::park_timeout(deadline - now);
            }
            None => thread::park(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        dims: Dimensions,
        calls: Arc<AtomicUsize>,
    }

    impl CaptureProvider for CountingProvider {
        fn dimensions(&self) -> Dimensions {
            self.dims
        }

        fn capture(&mut self, destination: &mut [u8]) -> Result<(), CaptureError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u8;
            destination.fill(n);
            Ok(())
        }
    }

    fn counting(width: u32, height: u32) -> (CountingProvider, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingProvider {
                dims: Dimensions::new(width, height),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    struct PanickingProvider;

    impl CaptureProvider for PanickingProvider {
        fn dimensions(&self) -> Dimensions {
            Dimensions::new(1, 1)
        }

        fn capture(&mut self, _destination: &mut [u8]) -> Result<(), CaptureError> {
            panic!("provider blew up");
        }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let (provider, calls) = counting(0, 4);
        let err = CaptureService::new(provider, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(
            err,
            StartupError::InvalidDimensions { width: 0, height: 4 }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_interrupts_long_sleep() {
        let (provider, _calls) = counting(2, 2);
        let service = CaptureService::new(provider, Duration::from_secs(30)).unwrap();
        let started = Instant::now();
        drop(service);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn unbounded_interval_does_not_overflow() {
        let (provider, _calls) = counting(1, 1);
        let service = CaptureService::new(provider, Duration::MAX).unwrap();
        assert_eq!(service.interval(), Duration::from_nanos(u64::MAX));
        service.set_interval(Duration::MAX);
        assert_eq!(service.interval(), Duration::from_nanos(u64::MAX));
        drop(service);
    }

    #[test]
    fn provider_panic_becomes_startup_error() {
        let err = CaptureService::new(PanickingProvider, Duration::from_millis(1)).unwrap_err();
        assert_eq!(err.code(), Some(CaptureError::BadEnvironment.code()));
    }

    #[test]
    fn take_reuses_output_frame() {
        let (provider, _calls) = counting(3, 2);
        let service = CaptureService::new(provider, Duration::from_millis(5)).unwrap();
        let mut output = Frame::new(Dimensions::new(1, 1));
        service.take_into(&mut output).unwrap();
        assert_eq!(output.dimensions(), Dimensions::new(3, 2));
        assert_eq!(output.pixels().len(), 6);
    }

    #[test]
    fn take_new_sees_later_capture_than_take() {
        let (provider, _calls) = counting(1, 1);
        let service = CaptureService::new(provider, Duration::from_millis(5)).unwrap();
        let cached = service.take().unwrap().pixel(0, 0).unwrap();
        let fresh = service.take_new().unwrap().pixel(0, 0).unwrap();
        assert_ne!(cached, fresh);
        assert_eq!(service.status(), ServiceStatus::Running);
    }
}
