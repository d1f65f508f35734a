use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use bon::{Builder, bon};
use tokio::{
    sync::{Mutex, Notify, watch},
    time::{MissedTickBehavior, interval},
};

use crate::{
    api::solis::{ApiError, Registers},
    clock::{Clock, TokioClock},
    core::cid::Cid,
    prelude::*,
    retry::RetryPolicy,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The provider accepted the write, but the register still reads something else.
    #[error("register {cid} reads `{actual}` after writing `{expected}`")]
    ControlMismatch { cid: Cid, expected: String, actual: String },

    #[error("failed to update the register snapshot: {0}")]
    UpdateFailed(#[source] ApiError),
}

/// Point-in-time register values, `None` for registers which have not been read yet.
#[must_use]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Snapshot(BTreeMap<Cid, Option<String>>);

impl Snapshot {
    fn empty(cids: impl IntoIterator<Item = Cid>) -> Self {
        Self(cids.into_iter().map(|cid| (cid, None)).collect())
    }

    /// Known registers with the fetched values, values of unknown registers are dropped.
    fn merge(cids: impl IntoIterator<Item = Cid>, mut values: BTreeMap<Cid, String>) -> Self {
        Self(cids.into_iter().map(|cid| (cid, values.remove(&cid))).collect())
    }

    fn with(&self, cid: Cid, value: String) -> Self {
        let mut inner = self.0.clone();
        inner.insert(cid, Some(value));
        Self(inner)
    }

    #[must_use]
    pub fn get(&self, cid: Cid) -> Option<&str> {
        self.0.get(&cid).and_then(Option::as_deref)
    }

    #[must_use]
    pub fn contains(&self, cid: Cid) -> bool {
        self.0.contains_key(&cid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cid, Option<&str>)> {
        self.0.iter().map(|(cid, value)| (*cid, value.as_deref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[must_use]
#[derive(Copy, Clone, Debug, Builder)]
pub struct CoordinatorSettings {
    #[builder(default = RetryPolicy::deadline(Duration::from_secs(180)))]
    pub batch_read_retry: RetryPolicy,

    #[builder(default = RetryPolicy::deadline(Duration::from_secs(60)))]
    pub read_retry: RetryPolicy,

    #[builder(default = RetryPolicy::deadline(Duration::from_secs(30)))]
    pub control_retry: RetryPolicy,

    /// Write → verify rounds before giving up with [`Error::ControlMismatch`].
    #[builder(default = 3)]
    pub control_attempts: u32,

    /// Pause between a mismatching verification and the next write.
    #[builder(default = Duration::from_secs(5))]
    pub verify_delay: Duration,

    /// Requested refreshes arriving within this period are served by one refresh.
    #[builder(default = Duration::from_secs(10))]
    pub refresh_debounce: Duration,

    #[builder(default = Duration::from_secs(300))]
    pub update_interval: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Keeps the register snapshot of one inverter and performs verified writes.
///
/// The snapshot is never mutated in place: every refresh and every accepted write
/// publishes a new [`Snapshot`], so a reader holding an older one keeps a consistent view.
pub struct Coordinator {
    registers: Arc<dyn Registers>,
    clock: Arc<dyn Clock>,
    serial_number: String,
    batch_cids: Vec<Cid>,
    read_cids: Vec<Cid>,
    settings: CoordinatorSettings,
    snapshot: watch::Sender<Arc<Snapshot>>,

    /// Serializes refreshes and publishing.
    update_lock: Mutex<()>,

    /// Number of refreshes started so far.
    n_started: AtomicU64,

    /// Sequence number of the last successful refresh, as counted by `n_started`.
    last_succeeded: AtomicU64,

    is_stale: AtomicBool,
    is_refresh_pending: AtomicBool,
    refresh_requested: Notify,
}

#[bon]
impl Coordinator {
    #[builder]
    pub fn new(
        registers: Arc<dyn Registers>,
        #[builder(into)] serial_number: String,
        batch_cids: Vec<Cid>,
        #[builder(default)] read_cids: Vec<Cid>,
        #[builder(default)] settings: CoordinatorSettings,
        #[builder(default = Arc::new(TokioClock) as Arc<dyn Clock>)] clock: Arc<dyn Clock>,
    ) -> Self {
        let snapshot = Snapshot::empty(batch_cids.iter().chain(&read_cids).copied());
        Self {
            registers,
            clock,
            serial_number,
            batch_cids,
            read_cids,
            settings,
            snapshot: watch::Sender::new(Arc::new(snapshot)),
            update_lock: Mutex::new(()),
            n_started: AtomicU64::new(0),
            last_succeeded: AtomicU64::new(0),
            is_stale: AtomicBool::new(false),
            is_refresh_pending: AtomicBool::new(false),
            refresh_requested: Notify::new(),
        }
    }
}

impl Coordinator {
    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.borrow().clone()
    }

    /// Receive every newly published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    /// `true` when the last refresh failed and the snapshot may be outdated.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale.load(Ordering::Acquire)
    }

    /// Read one register bypassing the snapshot.
    pub async fn read(&self, cid: Cid) -> Result<String, Error> {
        Ok(self.registers.read(&self.serial_number, cid, &self.settings.read_retry).await?)
    }

    /// Read several registers at once bypassing the snapshot.
    pub async fn read_batch(&self, cids: &[Cid]) -> Result<BTreeMap<Cid, String>, Error> {
        Ok(self.registers.read_batch(&self.serial_number, cids, &self.settings.batch_read_retry).await?)
    }

    /// Refresh the whole snapshot.
    ///
    /// Callers waiting for the same in-flight refresh share the next one: a refresh which
    /// started after the call is as good as a new one. A refresh which started earlier
    /// may have fetched before the caller's writes, so it is never reused.
    /// On failure, the previous snapshot stays in place and is flagged as stale.
    #[instrument(skip_all, fields(serial_number = %self.serial_number))]
    pub async fn update_data(&self) -> Result<Arc<Snapshot>, Error> {
        let n_started = self.n_started.load(Ordering::Acquire);
        let _guard = self.update_lock.lock().await;
        if self.last_succeeded.load(Ordering::Acquire) > n_started {
            debug!("served by a concurrent update");
            return Ok(self.snapshot());
        }

        let sequence_number = self.n_started.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(sequence_number, "updating…");
        match self.fetch().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot.send_replace(Arc::clone(&snapshot));
                self.is_stale.store(false, Ordering::Release);
                self.last_succeeded.store(sequence_number, Ordering::Release);
                info!(n_registers = snapshot.len(), "updated");
                Ok(snapshot)
            }
            Err(error) => {
                warn!("update failed, keeping the previous snapshot: {error}");
                self.is_stale.store(true, Ordering::Release);
                Err(Error::UpdateFailed(error))
            }
        }
    }

    async fn fetch(&self) -> Result<Snapshot, ApiError> {
        let mut values = if self.batch_cids.is_empty() {
            BTreeMap::new()
        } else {
            self.registers
                .read_batch(&self.serial_number, &self.batch_cids, &self.settings.batch_read_retry)
                .await?
        };
        for &cid in &self.read_cids {
            let value = self.registers.read(&self.serial_number, cid, &self.settings.read_retry).await?;
            values.insert(cid, value);
        }
        Ok(Snapshot::merge(self.batch_cids.iter().chain(&self.read_cids).copied(), values))
    }

    /// Write the value and make sure it took effect.
    ///
    /// Every round writes, reads the register back, and compares. The snapshot is only
    /// updated once the read-back value matches, after any refresh in flight has published.
    #[instrument(skip_all, fields(serial_number = %self.serial_number, cid = %cid, value = value))]
    pub async fn control(&self, cid: Cid, value: &str, old_value: Option<&str>) -> Result<(), Error> {
        let max_attempts = self.settings.control_attempts.max(1);
        let mut n_attempts = 0;
        loop {
            n_attempts += 1;
            self.registers
                .control(&self.serial_number, cid, value, old_value, &self.settings.control_retry)
                .await?;
            let actual = self.registers.read(&self.serial_number, cid, &self.settings.read_retry).await?;
            if actual == value {
                info!(n_attempts, "accepted");
                self.publish(cid, actual).await;
                return Ok(());
            }
            if n_attempts >= max_attempts {
                warn!(n_attempts, %actual, "giving up");
                return Err(Error::ControlMismatch { cid, expected: value.to_owned(), actual });
            }
            warn!(n_attempts, %actual, "register reads a different value, retrying…");
            self.clock.sleep(self.settings.verify_delay).await;
        }
    }

    /// Write the value without reading it back, then refresh the snapshot.
    ///
    /// Meant for momentary commands whose register does not keep the written value.
    /// A failed refresh only marks the snapshot as stale.
    #[instrument(skip_all, fields(serial_number = %self.serial_number, cid = %cid, value = value))]
    pub async fn control_no_check(&self, cid: Cid, value: &str, old_value: Option<&str>) -> Result<(), Error> {
        self.registers
            .control(&self.serial_number, cid, value, old_value, &self.settings.control_retry)
            .await?;
        info!("written");
        let _ = self.update_data().await;
        Ok(())
    }

    /// Ask the [`Coordinator::run`] loop for a refresh.
    pub fn request_refresh(&self) {
        self.is_refresh_pending.store(true, Ordering::Release);
        self.refresh_requested.notify_one();
    }

    /// Refresh on the update interval and on request, forever.
    pub async fn run(&self) {
        let mut interval = interval(self.settings.update_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = self.refresh_requested.notified() => {
                    if !self.is_refresh_pending.load(Ordering::Acquire) {
                        continue;
                    }
                    debug!("refresh requested, debouncing…");
                    self.clock.sleep(self.settings.refresh_debounce).await;
                    interval.reset();

                    // Requests arriving during a tick refresh stay pending until this arm runs.
                    self.is_refresh_pending.store(false, Ordering::Release);
                }
            }
            let _ = self.update_data().await;
        }
    }

    /// Publish a verified value.
    ///
    /// A refresh in flight may have fetched before the write, so it must publish first.
    async fn publish(&self, cid: Cid, value: String) {
        let _guard = self.update_lock.lock().await;
        self.snapshot.send_modify(|snapshot| {
            *snapshot = Arc::new(snapshot.with(cid, value));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex as StdMutex, atomic::AtomicUsize};

    use async_trait::async_trait;

    use super::*;
    use crate::clock::FakeClock;

    /// In-memory registers. Writes land in `values` except for the next `n_ignored_writes`.
    ///
    /// While `is_holding_batch_reads` is set, a batch read takes its values, signals
    /// `batch_read_started`, and waits for `release_batch_read` before returning them.
    #[derive(Default)]
    struct FakeRegisters {
        values: StdMutex<BTreeMap<Cid, String>>,
        writes: StdMutex<Vec<(Cid, String, Option<String>)>>,
        n_ignored_writes: AtomicUsize,
        is_offline: AtomicBool,
        n_batch_reads: AtomicUsize,
        is_holding_batch_reads: AtomicBool,
        batch_read_started: Notify,
        release_batch_read: Notify,
    }

    impl FakeRegisters {
        fn with_values<const N: usize>(values: [(i32, &str); N]) -> Arc<Self> {
            let values = values.into_iter().map(|(cid, value)| (Cid(cid), value.to_string())).collect();
            Arc::new(Self { values: StdMutex::new(values), ..Self::default() })
        }

        fn check_online(&self) -> Result<(), ApiError> {
            if self.is_offline.load(Ordering::Relaxed) {
                Err(ApiError::new("Timeout accessing http://localhost/"))
            } else {
                Ok(())
            }
        }

        fn n_writes(&self) -> usize {
            self.writes.lock().unwrap().len()
        }

        fn set_value(&self, cid: i32, value: &str) {
            self.values.lock().unwrap().insert(Cid(cid), value.to_string());
        }
    }

    #[async_trait]
    impl Registers for FakeRegisters {
        async fn read(&self, _serial_number: &str, cid: Cid, _retry_policy: &RetryPolicy) -> Result<String, ApiError> {
            self.check_online()?;
            self.values
                .lock()
                .unwrap()
                .get(&cid)
                .cloned()
                .ok_or_else(|| ApiError::new("Read failed: missing 'msg' field"))
        }

        async fn read_batch(
            &self,
            _serial_number: &str,
            cids: &[Cid],
            _retry_policy: &RetryPolicy,
        ) -> Result<BTreeMap<Cid, String>, ApiError> {
            self.n_batch_reads.fetch_add(1, Ordering::Relaxed);
            self.check_online()?;
            let values: BTreeMap<Cid, String> = {
                let values = self.values.lock().unwrap();
                cids.iter().filter_map(|cid| Some((*cid, values.get(cid)?.clone()))).collect()
            };
            tokio::task::yield_now().await;
            if self.is_holding_batch_reads.load(Ordering::Relaxed) {
                self.batch_read_started.notify_one();
                self.release_batch_read.notified().await;
            }
            Ok(values)
        }

        async fn control(
            &self,
            _serial_number: &str,
            cid: Cid,
            value: &str,
            old_value: Option<&str>,
            _retry_policy: &RetryPolicy,
        ) -> Result<(), ApiError> {
            self.check_online()?;
            self.writes.lock().unwrap().push((cid, value.to_string(), old_value.map(str::to_string)));
            let is_ignored =
                self.n_ignored_writes.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1)).is_ok();
            if !is_ignored {
                self.values.lock().unwrap().insert(cid, value.to_string());
            }
            Ok(())
        }
    }

    fn coordinator(registers: &Arc<FakeRegisters>, clock: &Arc<FakeClock>, batch_cids: &[i32]) -> Coordinator {
        Coordinator::builder()
            .registers(registers.clone())
            .serial_number("1031234567890")
            .batch_cids(batch_cids.iter().copied().map(Cid).collect())
            .clock(clock.clone())
            .build()
    }

    #[tokio::test]
    async fn control_accepted_on_first_attempt() {
        let registers = FakeRegisters::with_values([(123, "10")]);
        let clock = Arc::new(FakeClock::new());
        let coordinator = coordinator(&registers, &clock, &[123]);

        coordinator.control(Cid(123), "50", Some("10")).await.unwrap();

        assert_eq!(coordinator.snapshot().get(Cid(123)), Some("50"));
        assert_eq!(*registers.writes.lock().unwrap(), [(Cid(123), "50".to_string(), Some("10".to_string()))]);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn control_mismatch_after_all_attempts() {
        let registers = FakeRegisters::with_values([(123, "40")]);
        registers.n_ignored_writes.store(usize::MAX, Ordering::Relaxed);
        let clock = Arc::new(FakeClock::new());
        let coordinator = coordinator(&registers, &clock, &[123]);
        let before = coordinator.update_data().await.unwrap();

        let error = coordinator.control(Cid(123), "50", None).await.unwrap_err();

        match error {
            Error::ControlMismatch { cid, expected, actual } => {
                assert_eq!(cid, Cid(123));
                assert_eq!(expected, "50");
                assert_eq!(actual, "40");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registers.n_writes(), 3);
        assert_eq!(clock.sleeps(), [Duration::from_secs(5), Duration::from_secs(5)]);
        assert!(Arc::ptr_eq(&before, &coordinator.snapshot()));
        assert_eq!(coordinator.snapshot().get(Cid(123)), Some("40"));
    }

    #[tokio::test]
    async fn control_accepted_on_retry() {
        let registers = FakeRegisters::with_values([(123, "40")]);
        registers.n_ignored_writes.store(1, Ordering::Relaxed);
        let clock = Arc::new(FakeClock::new());
        let settings = CoordinatorSettings::builder().control_attempts(2).verify_delay(Duration::from_secs(1)).build();
        let coordinator = Coordinator::builder()
            .registers(registers.clone())
            .serial_number("sn")
            .batch_cids(vec![Cid(123)])
            .settings(settings)
            .clock(clock.clone())
            .build();

        coordinator.control(Cid(123), "50", None).await.unwrap();

        assert_eq!(registers.n_writes(), 2);
        assert_eq!(clock.sleeps(), [Duration::from_secs(1)]);
        assert_eq!(coordinator.snapshot().get(Cid(123)), Some("50"));
    }

    #[tokio::test]
    async fn control_write_error_is_api_error() {
        let registers = FakeRegisters::with_values([(123, "40")]);
        registers.is_offline.store(true, Ordering::Relaxed);
        let coordinator = coordinator(&registers, &Arc::new(FakeClock::new()), &[123]);

        let error = coordinator.control(Cid(123), "50", None).await.unwrap_err();
        assert!(matches!(error, Error::Api(_)), "{error}");
    }

    #[tokio::test]
    async fn update_data_merges_batch_and_single_reads() {
        let registers = FakeRegisters::with_values([(1, "a"), (2, "b"), (103, "csv"), (999, "unknown")]);
        let coordinator = Coordinator::builder()
            .registers(registers.clone())
            .serial_number("sn")
            .batch_cids(vec![Cid(1), Cid(2), Cid(3)])
            .read_cids(vec![Cid(103)])
            .clock(Arc::new(FakeClock::new()))
            .build();
        assert_eq!(coordinator.snapshot().len(), 4);
        assert_eq!(coordinator.snapshot().get(Cid(1)), None);

        let snapshot = coordinator.update_data().await.unwrap();

        assert_eq!(
            snapshot.iter().collect::<Vec<_>>(),
            [(Cid(1), Some("a")), (Cid(2), Some("b")), (Cid(3), None), (Cid(103), Some("csv"))],
        );
        assert!(!snapshot.contains(Cid(999)));
        assert!(!coordinator.is_stale());
    }

    #[tokio::test]
    async fn update_failure_keeps_previous_snapshot() {
        let registers = FakeRegisters::with_values([(1, "a")]);
        let coordinator = coordinator(&registers, &Arc::new(FakeClock::new()), &[1]);
        let before = coordinator.update_data().await.unwrap();
        let receiver = coordinator.subscribe();

        registers.is_offline.store(true, Ordering::Relaxed);
        let error = coordinator.update_data().await.unwrap_err();

        assert!(matches!(error, Error::UpdateFailed(_)), "{error}");
        assert!(coordinator.is_stale());
        assert!(Arc::ptr_eq(&before, &coordinator.snapshot()));
        assert!(!receiver.has_changed().unwrap());

        registers.is_offline.store(false, Ordering::Relaxed);
        coordinator.update_data().await.unwrap();
        assert!(!coordinator.is_stale());
    }

    #[tokio::test]
    async fn updates_waiting_for_the_same_refresh_are_coalesced() {
        let registers = FakeRegisters::with_values([(1, "a")]);
        let coordinator = coordinator(&registers, &Arc::new(FakeClock::new()), &[1]);

        // The first one is in flight when the other two call, so those two share one more refresh:
        let (first, second, third) =
            tokio::join!(coordinator.update_data(), coordinator.update_data(), coordinator.update_data());

        let (first, second, third) = (first.unwrap(), second.unwrap(), third.unwrap());
        assert_eq!(registers.n_batch_reads.load(Ordering::Relaxed), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[tokio::test]
    async fn control_no_check_does_not_reuse_refresh_started_before_write() {
        let registers = FakeRegisters::with_values([(52, "0")]);
        registers.is_holding_batch_reads.store(true, Ordering::Relaxed);
        let coordinator = coordinator(&registers, &Arc::new(FakeClock::new()), &[52]);

        let write = async {
            // The refresh has already fetched `0`:
            registers.batch_read_started.notified().await;
            registers.is_holding_batch_reads.store(false, Ordering::Relaxed);
            let (result, ()) = tokio::join!(coordinator.control_no_check(Cid(52), "190", None), async {
                tokio::task::yield_now().await;
                registers.release_batch_read.notify_one();
            });
            result.unwrap();
        };
        let (refresh, ()) = tokio::join!(coordinator.update_data(), write);

        assert_eq!(refresh.unwrap().get(Cid(52)), Some("0"));
        assert_eq!(registers.n_batch_reads.load(Ordering::Relaxed), 2);
        assert_eq!(coordinator.snapshot().get(Cid(52)), Some("190"));
    }

    #[tokio::test]
    async fn verified_write_is_not_overwritten_by_earlier_refresh() {
        let registers = FakeRegisters::with_values([(123, "40")]);
        registers.is_holding_batch_reads.store(true, Ordering::Relaxed);
        let coordinator = coordinator(&registers, &Arc::new(FakeClock::new()), &[123]);

        let write = async {
            registers.batch_read_started.notified().await;
            let (result, ()) = tokio::join!(coordinator.control(Cid(123), "50", None), async {
                tokio::task::yield_now().await;
                registers.release_batch_read.notify_one();
            });
            result.unwrap();
        };
        let (refresh, ()) = tokio::join!(coordinator.update_data(), write);

        assert_eq!(refresh.unwrap().get(Cid(123)), Some("40"));
        assert_eq!(coordinator.snapshot().get(Cid(123)), Some("50"));
    }

    #[tokio::test]
    async fn refresh_requested_during_tick_refresh_is_kept() {
        let registers = FakeRegisters::with_values([(1, "a")]);
        registers.is_holding_batch_reads.store(true, Ordering::Relaxed);
        let clock = Arc::new(FakeClock::new());
        let settings = CoordinatorSettings::builder().update_interval(Duration::from_secs(3600)).build();
        let coordinator = Coordinator::builder()
            .registers(registers.clone())
            .serial_number("sn")
            .batch_cids(vec![Cid(1)])
            .settings(settings)
            .clock(clock.clone())
            .build();
        let mut receiver = coordinator.subscribe();

        let requests = async {
            // The first interval tick is refreshing with `a` already fetched:
            registers.batch_read_started.notified().await;
            registers.is_holding_batch_reads.store(false, Ordering::Relaxed);
            registers.set_value(1, "b");
            coordinator.request_refresh();
            registers.release_batch_read.notify_one();
            while receiver.borrow_and_update().get(Cid(1)) != Some("b") {
                receiver.changed().await.unwrap();
            }
        };
        let result = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::select! {
                () = coordinator.run() => unreachable!(),
                () = requests => {}
            }
        })
        .await;

        assert!(result.is_ok(), "the requested refresh never happened");
        assert_eq!(registers.n_batch_reads.load(Ordering::Relaxed), 2);
        assert_eq!(clock.sleeps(), [Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn requested_refreshes_are_debounced() {
        let registers = FakeRegisters::with_values([(1, "a")]);
        let clock = Arc::new(FakeClock::new());
        let settings = CoordinatorSettings::builder().update_interval(Duration::from_secs(3600)).build();
        let coordinator = Coordinator::builder()
            .registers(registers.clone())
            .serial_number("sn")
            .batch_cids(vec![Cid(1)])
            .settings(settings)
            .clock(clock.clone())
            .build();
        let mut receiver = coordinator.subscribe();

        let requests = async {
            // The first interval tick refreshes immediately:
            receiver.changed().await.unwrap();
            coordinator.request_refresh();
            coordinator.request_refresh();
            receiver.changed().await.unwrap();
        };
        tokio::select! {
            () = coordinator.run() => unreachable!(),
            () = requests => {}
        }

        assert_eq!(registers.n_batch_reads.load(Ordering::Relaxed), 2);
        assert_eq!(clock.sleeps(), [Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn control_no_check_refreshes() {
        let registers = FakeRegisters::with_values([(52, "0"), (636, "35")]);
        registers.n_ignored_writes.store(usize::MAX, Ordering::Relaxed);
        let coordinator = coordinator(&registers, &Arc::new(FakeClock::new()), &[52, 636]);

        coordinator.control_no_check(Cid(52), "190", None).await.unwrap();

        assert_eq!(registers.n_writes(), 1);
        assert_eq!(registers.n_batch_reads.load(Ordering::Relaxed), 1);
        assert_eq!(coordinator.snapshot().get(Cid(636)), Some("35"));
    }

    #[tokio::test]
    async fn control_no_check_tolerates_refresh_failure() {
        // Register 7 does not exist, so the refresh fails:
        let registers = FakeRegisters::with_values([(52, "0")]);
        let coordinator = Coordinator::builder()
            .registers(registers.clone())
            .serial_number("sn")
            .batch_cids(vec![Cid(52)])
            .read_cids(vec![Cid(7)])
            .clock(Arc::new(FakeClock::new()))
            .build();

        coordinator.control_no_check(Cid(52), "190", None).await.unwrap();

        assert_eq!(registers.n_writes(), 1);
        assert!(coordinator.is_stale());
        assert_eq!(coordinator.snapshot().get(Cid(52)), None);
    }
}
