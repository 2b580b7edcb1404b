//! The unified modulation bus (receiver side).
//!
//! [`UnifiedBus`] owns the registry, the base and offset stores and the
//! pending update queues. External callers only enqueue; the stores are
//! mutated exclusively from [`UnifiedBus::tick`], with the single exception
//! of the atomic disable in [`UnifiedBus::enable`].
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --[initialize]--> Initialized --[shutdown]--> Uninitialized
//! ```
//!
//! `enable` and `clear` issued while uninitialized are remembered and applied
//! by `initialize`. Base and offset updates issued while uninitialized are
//! dropped. A second `initialize` is a no-op.
//!
//! # Tick
//!
//! Each tick drains the queues, repairs any non-finite stored value, then
//! publishes `clamp(base + offset, min, max)` for every target. Nothing is
//! accumulated between ticks, so the effective value depends only on the
//! current base and offset.
//!
//! The bus is `!Sync` and lives on the thread that runs the apply tick.
//! Readers on other threads use the shared [`EffectiveTable`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::BusConfig;
use crate::effective::EffectiveTable;
use crate::registry::{Registry, TargetRef, TARGET_COUNT};
use crate::wire::OffsetFrame;

/// Hook invoked after every publish.
///
/// The bus is handed back to the observer, so an observer may enqueue
/// updates or even call [`UnifiedBus::tick`] again. A nested tick is not run
/// in place; it is turned into a single follow-up pass.
pub trait ApplyObserver {
    /// Called with the values that were just published.
    fn on_apply(&self, bus: &UnifiedBus, effective: &[f32; TARGET_COUNT]);
}

/// Counters describing one call to [`UnifiedBus::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Full apply passes executed (1, or 2 with a follow-up).
    pub passes: u32,
    /// Follow-up passes executed because of a nested tick request.
    pub follow_ups: u32,
    /// Whether a pending clear zeroed the offsets.
    pub cleared: bool,
    /// Base updates stored.
    pub bases_applied: u32,
    /// Offset updates stored (including non-finite ones replaced by 0).
    pub offsets_applied: u32,
    /// Inbound values discarded or replaced because they were non-finite.
    pub rejected: u32,
    /// Stored values fixed by the repair pass.
    pub repaired: u32,
}

/// Introspection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusStatus {
    /// Stores exist and ticks are processed.
    pub initialized: bool,
    /// Offsets contribute to effective values.
    pub enabled: bool,
    /// Configured apply period in milliseconds.
    pub tick_interval_ms: u64,
    /// Number of publishes so far.
    pub generation: u64,
    /// Queued base updates.
    pub pending_bases: usize,
    /// Queued offset updates.
    pub pending_offsets: usize,
    /// A clear is waiting for the next tick.
    pub clear_pending: bool,
}

/// Base and offset values, present only while initialized.
struct Stores {
    base: [f32; TARGET_COUNT],
    offset: [f32; TARGET_COUNT],
}

impl Stores {
    fn seeded(registry: &Registry) -> Self {
        let mut base = [0.0; TARGET_COUNT];
        for target in registry.iter() {
            base[target.index] = target.safe_default();
        }
        Self {
            base,
            offset: [0.0; TARGET_COUNT],
        }
    }
}

/// Last-write-wins queues, drained at tick boundaries.
#[derive(Default)]
struct PendingQueues {
    base: BTreeMap<usize, f32>,
    offset: BTreeMap<usize, f32>,
    clear: bool,
}

/// Resets the in-progress flag even if an observer panics.
struct ApplyGuard<'a>(&'a Cell<bool>);

impl<'a> ApplyGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Owned modulation bus context.
pub struct UnifiedBus {
    registry: Arc<Registry>,
    effective: Arc<EffectiveTable>,
    config: BusConfig,
    observer: Option<Box<dyn ApplyObserver>>,

    stores: RefCell<Option<Stores>>,
    pending: RefCell<PendingQueues>,
    enabled: Cell<bool>,

    /// `enable` issued before `initialize`.
    deferred_enable: Cell<Option<bool>>,
    /// `clear` issued before `initialize`.
    deferred_clear: Cell<bool>,

    apply_in_progress: Cell<bool>,
    follow_up_requested: Cell<bool>,
}

impl UnifiedBus {
    /// Create an uninitialized bus over a registry.
    pub fn new(registry: Arc<Registry>, config: BusConfig) -> Self {
        let effective = Arc::new(EffectiveTable::new(&registry));
        Self {
            registry,
            effective,
            enabled: Cell::new(config.enabled_at_start),
            config,
            observer: None,
            stores: RefCell::new(None),
            pending: RefCell::new(PendingQueues::default()),
            deferred_enable: Cell::new(None),
            deferred_clear: Cell::new(false),
            apply_in_progress: Cell::new(false),
            follow_up_requested: Cell::new(false),
        }
    }

    /// Create an uninitialized bus with a freshly built registry and default config.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(Registry::build()), BusConfig::new())
    }

    /// Attach an observer called after every publish.
    pub fn with_observer(mut self, observer: impl ApplyObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Seed the stores and apply requests made before initialization.
    ///
    /// Returns `false` (and changes nothing) if already initialized.
    pub fn initialize(&self) -> bool {
        if self.is_initialized() {
            log::debug!("bus already initialized, ignoring initialize");
            return false;
        }

        let stores = Stores::seeded(&self.registry);
        // Only enable and clear survive from before initialization
        *self.pending.borrow_mut() = PendingQueues::default();
        let mut effective = [0.0; TARGET_COUNT];
        for target in self.registry.iter() {
            effective[target.index] = target.clamp(stores.base[target.index]);
        }
        *self.stores.borrow_mut() = Some(stores);
        self.effective.publish(&effective);

        if let Some(flag) = self.deferred_enable.take() {
            self.enable(flag);
        }
        if self.deferred_clear.replace(false) {
            self.pending.borrow_mut().clear = true;
        }

        log::info!(
            "bus initialized: {} targets, offsets {}",
            self.registry.len(),
            if self.enabled.get() { "enabled" } else { "disabled" }
        );
        true
    }

    /// Tear down the stores and queues. `initialize` may be called again.
    pub fn shutdown(&self) {
        if self.stores.borrow_mut().take().is_none() {
            log::debug!("bus not initialized, ignoring shutdown");
            return;
        }
        *self.pending.borrow_mut() = PendingQueues::default();
        self.enabled.set(self.config.enabled_at_start);
        self.deferred_enable.set(None);
        self.deferred_clear.set(false);
        self.follow_up_requested.set(false);
        log::info!("bus shut down");
    }

    /// True between `initialize` and `shutdown`.
    pub fn is_initialized(&self) -> bool {
        self.stores.borrow().is_some()
    }

    // =========================================================================
    // Control surface
    // =========================================================================

    /// Enable or disable modulation offsets.
    ///
    /// Disabling zeroes every stored offset and empties the pending offset
    /// queue in the same call, before the flag flips, so no tick can observe
    /// one without the other.
    pub fn enable(&self, flag: bool) {
        if !self.is_initialized() {
            log::debug!("bus not initialized, deferring enable({flag})");
            self.deferred_enable.set(Some(flag));
            return;
        }

        if self.enabled.get() && !flag {
            if let Some(stores) = self.stores.borrow_mut().as_mut() {
                stores.offset = [0.0; TARGET_COUNT];
            }
            self.pending.borrow_mut().offset.clear();
            log::info!("modulation disabled, offsets cleared");
        } else if !self.enabled.get() && flag {
            log::info!("modulation enabled");
        }
        self.enabled.set(flag);
    }

    /// Request that all offsets be zeroed on the next tick.
    pub fn clear(&self) {
        if !self.is_initialized() {
            log::debug!("bus not initialized, deferring clear");
            self.deferred_clear.set(true);
            return;
        }
        self.pending.borrow_mut().clear = true;
    }

    /// Queue a new base value.
    ///
    /// Returns `false` if the target does not exist or the bus is not
    /// initialized.
    pub fn set_base<'a>(&self, target: impl Into<TargetRef<'a>>, value: f32) -> bool {
        let target = target.into();
        if !self.is_initialized() {
            log::debug!("set_base: bus not initialized, dropped {target}");
            return false;
        }
        let Some(resolved) = self.registry.resolve(target) else {
            log::warn!("set_base: unknown target {target}, dropped");
            return false;
        };
        self.pending.borrow_mut().base.insert(resolved.index, value);
        true
    }

    /// Queue a new offset value. Returns `false` if the update was dropped.
    ///
    /// Offsets sent while modulation is disabled or while the bus is not
    /// initialized are dropped, because such a bus holds no offsets.
    pub fn set_offset<'a>(&self, target: impl Into<TargetRef<'a>>, value: f32) -> bool {
        let target = target.into();
        if !self.is_initialized() {
            log::debug!("set_offset: bus not initialized, dropped {target}");
            return false;
        }
        let Some(resolved) = self.registry.resolve(target) else {
            log::warn!("set_offset: unknown target {target}, dropped");
            return false;
        };
        if !self.enabled.get() {
            log::trace!("set_offset: modulation disabled, dropped {target}");
            return false;
        }
        self.pending.borrow_mut().offset.insert(resolved.index, value);
        true
    }

    /// Queue a complete offset picture received from the network.
    ///
    /// Targets absent from the frame are queued as zero, replacing any
    /// offset updates still pending from earlier frames.
    pub fn submit_offset_frame(&self, frame: &OffsetFrame) {
        if !self.is_initialized() {
            log::debug!("offset frame dropped, bus not initialized");
            return;
        }
        if !self.enabled.get() {
            log::trace!("offset frame dropped, modulation disabled");
            return;
        }

        let mut queued: BTreeMap<usize, f32> = (0..TARGET_COUNT).map(|index| (index, 0.0)).collect();
        for &(index, value) in frame.pairs() {
            match usize::try_from(index).ok().filter(|&i| i < TARGET_COUNT) {
                Some(index) => {
                    queued.insert(index, value);
                }
                None => log::warn!("offset frame: index {index} out of range, dropped"),
            }
        }
        self.pending.borrow_mut().offset = queued;
    }

    // =========================================================================
    // Apply
    // =========================================================================

    /// Run the apply tick.
    ///
    /// Returns `None` when the bus is not initialized or when this call was
    /// nested inside a running tick (in which case the running tick performs
    /// one follow-up pass after it finishes).
    pub fn tick(&self) -> Option<ApplyReport> {
        if !self.is_initialized() {
            log::trace!("tick before initialize, skipped");
            return None;
        }
        if self.apply_in_progress.get() {
            self.follow_up_requested.set(true);
            log::trace!("tick requested during apply, deferring follow-up");
            return None;
        }

        let mut report = ApplyReport::default();
        self.apply_pass(&mut report);

        if self.follow_up_requested.replace(false) {
            report.follow_ups += 1;
            self.apply_pass(&mut report);
            // At most one follow-up per tick; later requests wait for the next
            // scheduled tick, which drains the same queues.
            if self.follow_up_requested.replace(false) {
                log::trace!("follow-up requested during follow-up, left to next tick");
            }
        }

        log::trace!("apply tick done: {report:?}");
        Some(report)
    }

    fn apply_pass(&self, report: &mut ApplyReport) {
        let guard = ApplyGuard::enter(&self.apply_in_progress);
        report.passes += 1;

        let (bases, offsets, clear) = {
            let mut pending = self.pending.borrow_mut();
            let clear = std::mem::take(&mut pending.clear);
            if clear {
                pending.offset.clear();
            }
            (
                std::mem::take(&mut pending.base),
                std::mem::take(&mut pending.offset),
                clear,
            )
        };

        let effective = {
            let mut stores = self.stores.borrow_mut();
            // Shut down from inside an observer before a follow-up pass
            let Some(stores) = stores.as_mut() else {
                return;
            };

            if clear {
                stores.offset = [0.0; TARGET_COUNT];
                report.cleared = true;
            }
            self.drain_bases(stores, bases, report);
            self.drain_offsets(stores, offsets, report);
            self.repair(stores, report);
            self.compute(stores)
        };

        self.effective.publish(&effective);
        if let Some(observer) = &self.observer {
            observer.on_apply(self, &effective);
        }
        drop(guard);
    }

    fn drain_bases(&self, stores: &mut Stores, updates: BTreeMap<usize, f32>, report: &mut ApplyReport) {
        for (index, value) in updates {
            let Some(target) = self.registry.lookup_by_index(index) else {
                continue;
            };
            if value.is_finite() {
                stores.base[index] = target.clamp(value);
                report.bases_applied += 1;
            } else {
                log::warn!("base for {} is {value}, discarded", target.key);
                report.rejected += 1;
            }
        }
    }

    fn drain_offsets(&self, stores: &mut Stores, updates: BTreeMap<usize, f32>, report: &mut ApplyReport) {
        for (index, value) in updates {
            if index >= TARGET_COUNT {
                continue;
            }
            if value.is_finite() {
                stores.offset[index] = value;
            } else {
                log::warn!("offset for target #{index} is {value}, stored 0");
                stores.offset[index] = 0.0;
                report.rejected += 1;
            }
            report.offsets_applied += 1;
        }
    }

    fn repair(&self, stores: &mut Stores, report: &mut ApplyReport) {
        for target in self.registry.iter() {
            let index = target.index;
            if !stores.base[index].is_finite() {
                log::warn!(
                    "repaired non-finite base {} for {}",
                    stores.base[index],
                    target.key
                );
                stores.base[index] = target.safe_default();
                report.repaired += 1;
            }
            if !stores.offset[index].is_finite() {
                log::warn!(
                    "repaired non-finite offset {} for {}",
                    stores.offset[index],
                    target.key
                );
                stores.offset[index] = 0.0;
                report.repaired += 1;
            }
        }
    }

    fn compute(&self, stores: &Stores) -> [f32; TARGET_COUNT] {
        let enabled = self.enabled.get();
        let mut effective = [0.0; TARGET_COUNT];
        for target in self.registry.iter() {
            let index = target.index;
            let offset = if enabled { stores.offset[index] } else { 0.0 };
            effective[index] = target.clamp(stores.base[index] + offset);
        }
        effective
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The registry this bus addresses.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Shared handle to the published effective values.
    pub fn effective(&self) -> Arc<EffectiveTable> {
        Arc::clone(&self.effective)
    }

    /// Whether offsets currently contribute.
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Stored base value (after the last tick).
    pub fn base(&self, index: usize) -> Option<f32> {
        self.stores
            .borrow()
            .as_ref()
            .and_then(|stores| stores.base.get(index).copied())
    }

    /// Stored offset value (after the last tick).
    pub fn offset(&self, index: usize) -> Option<f32> {
        self.stores
            .borrow()
            .as_ref()
            .and_then(|stores| stores.offset.get(index).copied())
    }

    /// Configured apply period.
    pub fn tick_interval(&self) -> Duration {
        self.config.apply_interval
    }

    /// Introspection snapshot.
    pub fn status(&self) -> BusStatus {
        let pending = self.pending.borrow();
        BusStatus {
            initialized: self.is_initialized(),
            enabled: self.enabled.get(),
            tick_interval_ms: self.config.apply_interval.as_millis() as u64,
            generation: self.effective.generation(),
            pending_bases: pending.base.len(),
            pending_offsets: pending.offset.len(),
            clear_pending: pending.clear || self.deferred_clear.get(),
        }
    }

    #[cfg(test)]
    fn corrupt(&self, index: usize, base: f32, offset: f32) {
        if let Some(stores) = self.stores.borrow_mut().as_mut() {
            stores.base[index] = base;
            stores.offset[index] = offset;
        }
    }
}

impl std::fmt::Debug for UnifiedBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedBus")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn ready_bus() -> UnifiedBus {
        let bus = UnifiedBus::with_defaults();
        assert!(bus.initialize());
        bus
    }

    fn effective(bus: &UnifiedBus, index: usize) -> f32 {
        bus.effective().get(index).unwrap()
    }

    #[test]
    fn test_initialize_seeds_defaults() {
        let bus = ready_bus();
        assert_eq!(bus.base(0), Some(440.0));
        assert_eq!(bus.offset(0), Some(0.0));
        assert_eq!(effective(&bus, 0), 440.0);
        assert!(bus.is_enabled());
    }

    #[test]
    fn test_double_initialize_is_noop() {
        let bus = ready_bus();
        bus.set_base(0usize, 500.0);
        bus.tick();
        assert!(!bus.initialize());
        assert_eq!(bus.base(0), Some(500.0));
    }

    #[test]
    fn test_tick_before_initialize_does_nothing() {
        let bus = UnifiedBus::with_defaults();
        assert!(bus.tick().is_none());
        assert_eq!(bus.base(0), None);
    }

    #[test]
    fn test_no_drift_over_ticks() {
        let bus = ready_bus();
        bus.set_offset(0usize, 10.0);
        bus.tick();
        assert_eq!(effective(&bus, 0), 450.0);

        for _ in 0..5 {
            bus.tick();
        }
        assert_eq!(effective(&bus, 0), 450.0);
        assert_eq!(bus.base(0), Some(440.0));
    }

    #[test]
    fn test_base_is_clamped_offset_is_not() {
        let bus = ready_bus();
        let cutoff = bus.registry().lookup_by_key("filter1.cutoff").unwrap().index;
        bus.set_base("filter1.cutoff", 30_000.0);
        bus.set_offset(cutoff, -50_000.0);
        bus.tick();

        assert_eq!(bus.base(cutoff), Some(20_000.0));
        assert_eq!(bus.offset(cutoff), Some(-50_000.0));
        assert_eq!(effective(&bus, cutoff), 20.0);
    }

    #[test]
    fn test_last_write_wins() {
        let bus = ready_bus();
        bus.set_base(1usize, 10.0);
        bus.set_base(1usize, -20.0);
        bus.tick();
        assert_eq!(bus.base(1), Some(-20.0));
    }

    #[test]
    fn test_invalid_targets_dropped() {
        let bus = ready_bus();
        assert!(!bus.set_base(149usize, 1.0));
        assert!(!bus.set_base(-1i64, 1.0));
        assert!(!bus.set_base("osc9.freq", 1.0));
        assert!(!bus.set_offset(1_000i32, 1.0));
        assert_eq!(bus.status().pending_bases, 0);
        assert_eq!(bus.status().pending_offsets, 0);
    }

    #[test]
    fn test_non_finite_inputs() {
        let bus = ready_bus();
        bus.set_base(0usize, f32::NAN);
        bus.set_offset(1usize, f32::INFINITY);
        bus.set_offset(2usize, 0.25);
        let report = bus.tick().unwrap();

        assert_eq!(bus.base(0), Some(440.0));
        assert_eq!(bus.offset(1), Some(0.0));
        assert_eq!(bus.offset(2), Some(0.25));
        assert_eq!(report.rejected, 2);
        assert_eq!(report.bases_applied, 0);
        assert_eq!(report.offsets_applied, 2);
    }

    #[test]
    fn test_repair_pass_fixes_stored_state() {
        let bus = ready_bus();
        bus.corrupt(3, f32::NAN, f32::NEG_INFINITY);
        let report = bus.tick().unwrap();

        assert_eq!(report.repaired, 2);
        assert_eq!(bus.base(3), Some(0.0));
        assert_eq!(bus.offset(3), Some(0.0));
        assert!(effective(&bus, 3).is_finite());
    }

    #[test]
    fn test_atomic_disable() {
        let bus = ready_bus();
        bus.set_offset(0usize, 100.0);
        bus.tick();
        assert_eq!(bus.offset(0), Some(100.0));

        bus.set_offset(1usize, 0.5);
        bus.enable(false);

        // Both observable immediately, before any tick
        assert_eq!(bus.offset(0), Some(0.0));
        assert!(!bus.is_enabled());
        assert_eq!(bus.status().pending_offsets, 0);

        bus.tick();
        assert_eq!(effective(&bus, 0), 440.0);
        assert_eq!(bus.offset(1), Some(0.0));
    }

    #[test]
    fn test_offsets_ignored_while_disabled() {
        let bus = ready_bus();
        bus.enable(false);
        assert!(!bus.set_offset(0usize, 5.0));
        bus.enable(true);
        bus.tick();
        assert_eq!(effective(&bus, 0), 440.0);
    }

    #[test]
    fn test_clear_zeroes_offsets_keeps_flag() {
        let bus = ready_bus();
        bus.set_offset(0usize, 7.0);
        bus.tick();
        bus.set_offset(1usize, 0.1);
        bus.clear();
        let report = bus.tick().unwrap();

        assert!(report.cleared);
        assert!(bus.is_enabled());
        assert_eq!(bus.offset(0), Some(0.0));
        assert_eq!(bus.offset(1), Some(0.0));
        assert_eq!(effective(&bus, 0), 440.0);
    }

    #[test]
    fn test_requests_before_initialize_are_buffered() {
        let bus = UnifiedBus::with_defaults();
        bus.enable(false);
        bus.clear();
        assert!(bus.is_enabled());
        assert!(bus.status().clear_pending);

        bus.initialize();
        assert!(!bus.is_enabled());
        let report = bus.tick().unwrap();
        assert!(report.cleared);
    }

    #[test]
    fn test_shutdown_and_reinitialize() {
        let bus = ready_bus();
        bus.set_base(0usize, 1_000.0);
        bus.set_offset(0usize, 3.0);
        bus.tick();
        bus.set_base(0usize, 2_000.0);
        bus.shutdown();

        assert!(!bus.is_initialized());
        assert!(bus.tick().is_none());

        assert!(bus.initialize());
        bus.tick();
        assert_eq!(bus.base(0), Some(440.0));
        assert_eq!(bus.offset(0), Some(0.0));
        assert_eq!(effective(&bus, 0), 440.0);
    }

    #[test]
    fn test_reinitialize_discards_updates_queued_while_down() {
        let bus = ready_bus();
        bus.shutdown();

        assert!(!bus.set_base(0usize, 1_000.0));
        assert!(!bus.set_offset(2usize, 3.0));
        bus.submit_offset_frame(&OffsetFrame::new(vec![(1, 7.0)]).unwrap());
        assert_eq!(bus.status().pending_bases, 0);
        assert_eq!(bus.status().pending_offsets, 0);

        assert!(bus.initialize());
        bus.tick();
        assert_eq!(bus.base(0), Some(440.0));
        assert_eq!(bus.offset(1), Some(0.0));
        assert_eq!(bus.offset(2), Some(0.0));
        assert_eq!(effective(&bus, 0), 440.0);
    }

    #[test]
    fn test_offset_frame_replaces_previous_picture() {
        let bus = ready_bus();
        bus.submit_offset_frame(&OffsetFrame::new(vec![(0, 10.0), (5, 0.5)]).unwrap());
        bus.tick();
        assert_eq!(bus.offset(0), Some(10.0));
        assert_eq!(bus.offset(5), Some(0.5));

        bus.submit_offset_frame(&OffsetFrame::new(vec![(5, 0.25)]).unwrap());
        bus.tick();
        assert_eq!(bus.offset(0), Some(0.0));
        assert_eq!(bus.offset(5), Some(0.25));
    }

    struct Reentrant {
        nested: Rc<Cell<u32>>,
    }

    impl ApplyObserver for Reentrant {
        fn on_apply(&self, bus: &UnifiedBus, _effective: &[f32; TARGET_COUNT]) {
            self.nested.set(self.nested.get() + 1);
            // Two nested requests still collapse into one follow-up
            assert!(bus.tick().is_none());
            assert!(bus.tick().is_none());
        }
    }

    #[test]
    fn test_reentrant_tick_runs_one_follow_up() {
        let calls = Rc::new(Cell::new(0));
        let bus = UnifiedBus::with_defaults().with_observer(Reentrant {
            nested: Rc::clone(&calls),
        });
        bus.initialize();

        let report = bus.tick().unwrap();

        assert_eq!(report.passes, 2);
        assert_eq!(report.follow_ups, 1);
        assert_eq!(calls.get(), 2);
        assert_eq!(bus.effective().generation(), 3); // initialize + two passes
        assert!(!bus.status().clear_pending);
    }

    struct EnqueueOnApply;

    impl ApplyObserver for EnqueueOnApply {
        fn on_apply(&self, bus: &UnifiedBus, effective: &[f32; TARGET_COUNT]) {
            if effective[0] == 440.0 {
                bus.set_base(0usize, 300.0);
                bus.tick();
            }
        }
    }

    #[test]
    fn test_follow_up_applies_updates_made_during_apply() {
        let bus = UnifiedBus::with_defaults().with_observer(EnqueueOnApply);
        bus.initialize();
        bus.tick();
        assert_eq!(bus.base(0), Some(300.0));
        assert_eq!(effective(&bus, 0), 300.0);
    }

    #[test]
    fn test_status_reports_state() {
        let bus = ready_bus();
        bus.set_base(0usize, 1.0);
        let status = bus.status();
        assert!(status.initialized);
        assert!(status.enabled);
        assert_eq!(status.tick_interval_ms, 30);
        assert_eq!(status.pending_bases, 1);
    }
}
