//! The parking ledger engine.
//!
//! [`ParkingLot`] owns every parked [`Vehicle`], the recent [`Transaction`]
//! history and the revenue total behind a single mutex. Two periodic tasks
//! share that state:
//!
//! - the billing task, running only while the park is non-empty. It is started
//!   by the admission into an empty park and stopped by the removal that empties it.
//! - the flush task, running for the whole engine lifetime. It appends the last
//!   minute's revenue to the [`RevenueLog`] and trims old history.
//!
//! Every public operation and every tick holds the lock for its full duration.

use crate::adapters::{FileRevenueLog, SystemClock};
use crate::config::Settings;
use crate::core::scheduler::{self, BillingTask};
use crate::domain::model::{display_amount, Transaction, Vehicle, VehicleCategory, VehicleId};
use crate::domain::ports::{Clock, RevenueLog};
use crate::utils::error::{ParkingError, Result};
use crate::utils::validation::Validate;
use chrono::{DateTime, Local, TimeDelta};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Transactions at most this old count towards "last minute" figures.
pub const LAST_MINUTE_WINDOW_SECS: i64 = 60;
/// Transactions older than this are purged on every flush.
pub const RETENTION_WINDOW_SECS: i64 = 120;

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of one billing tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub charged: usize,
    pub fined: usize,
    pub revenue: Decimal,
}

/// Outcome of one flush tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub revenue_last_minute: Decimal,
    pub logged: bool,
    pub purged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkSnapshot {
    pub capacity: usize,
    pub occupied: usize,
    pub free: usize,
    pub total_revenue: Decimal,
    pub revenue_last_minute: Decimal,
    pub billing_running: bool,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug)]
struct Ledger {
    // 依入場順序
    vehicles: Vec<Vehicle>,
    // 依時間排序，只從尾端新增
    transactions: VecDeque<Transaction>,
    total_revenue: Decimal,
    next_id: VehicleId,
    billing: Option<BillingTask>,
    billing_generation: u64,
}

impl Ledger {
    fn new(capacity: usize) -> Self {
        Self {
            vehicles: Vec::with_capacity(capacity),
            transactions: VecDeque::new(),
            total_revenue: Decimal::ZERO,
            next_id: 1,
            billing: None,
            billing_generation: 0,
        }
    }

    fn position(&self, id: VehicleId) -> Option<usize> {
        self.vehicles.iter().position(|v| v.id == id)
    }

    /// Most-recent-first walk, stopping at the first entry outside the window.
    fn last_minute(&self, now: DateTime<Local>) -> impl Iterator<Item = &Transaction> + '_ {
        let window = TimeDelta::seconds(LAST_MINUTE_WINDOW_SECS);
        self.transactions
            .iter()
            .rev()
            .take_while(move |tx| now - tx.timestamp() <= window)
    }

    fn revenue_last_minute(&self, now: DateTime<Local>) -> Decimal {
        self.last_minute(now).map(Transaction::amount).sum()
    }

    fn purge_expired(&mut self, now: DateTime<Local>) -> usize {
        let retention = TimeDelta::seconds(RETENTION_WINDOW_SECS);
        let mut purged = 0;
        while let Some(oldest) = self.transactions.front() {
            if now - oldest.timestamp() <= retention {
                break;
            }
            self.transactions.pop_front();
            purged += 1;
        }
        purged
    }
}

/// Pre-computed result of charging one vehicle in a tick.
enum Charge {
    Paid { balance: Decimal, tx: Transaction },
    Fined { balance: Decimal, fine: Decimal },
}

struct Shared {
    ledger: Mutex<Ledger>,
    settings: Settings,
    clock: Arc<dyn Clock>,
    log: Arc<dyn RevenueLog>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Charges every parked vehicle. `generation` is `Some` when called from a
    /// billing task; a stale generation turns the tick into a no-op.
    fn bill_tick(&self, generation: Option<u64>) -> Result<TickReport> {
        let mut guard = self.lock();
        if let Some(generation) = generation {
            if guard.billing.as_ref().map(|task| task.generation) != Some(generation) {
                tracing::debug!("Skipping tick from stopped billing task #{}", generation);
                return Ok(TickReport::default());
            }
        }

        let now = self.clock.now();
        let fine_multiplier = self.settings.fine_multiplier;

        // 先算完所有結果，缺價或溢位時整個 tick 不做任何異動
        let mut charges = Vec::with_capacity(guard.vehicles.len());
        let mut revenue_after = guard.total_revenue;
        for vehicle in &guard.vehicles {
            let price = self.settings.pricing.price_for(vehicle.category)?;
            let overflow = || ParkingError::BalanceOverflow { id: vehicle.id };
            let charge = if price <= vehicle.balance {
                let tx = Transaction::new(now, vehicle.id, price)
                    .ok_or(ParkingError::InvalidAmount { amount: price })?;
                revenue_after = revenue_after
                    .checked_add(price)
                    .ok_or(ParkingError::RevenueOverflow)?;
                Charge::Paid {
                    balance: vehicle.balance.checked_sub(price).ok_or_else(overflow)?,
                    tx,
                }
            } else {
                let fine = price.checked_mul(fine_multiplier).ok_or_else(overflow)?;
                Charge::Fined {
                    balance: vehicle.balance.checked_sub(fine).ok_or_else(overflow)?,
                    fine,
                }
            };
            charges.push(charge);
        }

        let Ledger {
            vehicles,
            transactions,
            total_revenue,
            ..
        } = &mut *guard;

        let mut report = TickReport::default();
        for (vehicle, charge) in vehicles.iter_mut().zip(charges) {
            match charge {
                Charge::Paid { balance, tx } => {
                    vehicle.balance = balance;
                    report.charged += 1;
                    report.revenue += tx.amount();
                    transactions.push_back(tx);
                }
                Charge::Fined { balance, fine } => {
                    vehicle.balance = balance;
                    report.fined += 1;
                    tracing::debug!(
                        "Vehicle {} fined {} (balance now {})",
                        vehicle.id,
                        display_amount(fine),
                        display_amount(vehicle.balance)
                    );
                }
            }
        }
        *total_revenue = revenue_after;

        tracing::debug!(
            "Billing tick: {} charged, {} fined, revenue +{}",
            report.charged,
            report.fined,
            display_amount(report.revenue)
        );
        Ok(report)
    }

    fn flush_tick(&self) -> FlushReport {
        let mut ledger = self.lock();
        let now = self.clock.now();
        let revenue = ledger.revenue_last_minute(now);
        let line = format!(
            "[{}]: {}",
            now.format(LOG_TIMESTAMP_FORMAT),
            display_amount(revenue)
        );

        // 寫檔失敗只記錄，不影響計費
        let logged = match self.log.append_line(&line) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not append to revenue log: {}", e);
                false
            }
        };

        let purged = ledger.purge_expired(now);
        tracing::debug!(
            "Flush tick: last minute revenue {}, {} old transactions purged",
            display_amount(revenue),
            purged
        );
        FlushReport {
            revenue_last_minute: revenue,
            logged,
            purged,
        }
    }
}

/// The car park engine. Create one per process with [`ParkingLot::start`] and
/// share it by reference (or `Arc`) with whatever drives it.
pub struct ParkingLot {
    shared: Arc<Shared>,
    runtime: Handle,
    flush_task: JoinHandle<()>,
}

impl ParkingLot {
    /// Builds the engine and starts the flush task. Must be called inside a
    /// tokio runtime; the billing task stays stopped until the first admission.
    pub fn start(
        settings: Settings,
        clock: Arc<dyn Clock>,
        log: Arc<dyn RevenueLog>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| ParkingError::RuntimeUnavailable)?;
        settings.validate()?;

        let flush_interval = settings.flush_interval;
        let shared = Arc::new(Shared {
            ledger: Mutex::new(Ledger::new(settings.capacity)),
            settings,
            clock,
            log,
        });

        let flush_shared = Arc::clone(&shared);
        let flush_task = scheduler::spawn_periodic(&runtime, "flush", flush_interval, move || {
            flush_shared.flush_tick();
        });

        tracing::info!(
            "Parking engine started: {} spaces, tick every {:?}",
            shared.settings.capacity,
            shared.settings.tick_interval
        );
        Ok(Self {
            shared,
            runtime,
            flush_task,
        })
    }

    /// Starts with the system clock and a file log at `settings.log_path`.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let log = Arc::new(FileRevenueLog::new(settings.log_path.clone()));
        tracing::info!("Revenue log: {}", log.path().display());
        Self::start(settings, Arc::new(SystemClock), log)
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    fn start_billing(&self, ledger: &mut Ledger) {
        if let Some(previous) = ledger.billing.take() {
            previous.stop();
        }
        ledger.billing_generation += 1;
        let generation = ledger.billing_generation;
        let shared = Arc::clone(&self.shared);
        let handle = scheduler::spawn_periodic(
            &self.runtime,
            "billing",
            self.shared.settings.tick_interval,
            move || {
                if let Err(e) = shared.bill_tick(Some(generation)) {
                    tracing::error!("Billing tick aborted: {}", e);
                }
            },
        );
        ledger.billing = Some(BillingTask::new(generation, handle));
        tracing::info!("Billing started (task #{})", generation);
    }

    fn stop_billing(ledger: &mut Ledger) {
        if let Some(task) = ledger.billing.take() {
            tracing::info!("Billing stopped (task #{})", task.generation);
            task.stop();
        }
    }

    /// Admits a new vehicle. Fails with `CapacityExceeded` when the park is full
    /// and `InvalidInitialBalance` for a negative starting balance.
    pub fn add_vehicle(&self, category: VehicleCategory, initial_balance: Decimal) -> Result<Vehicle> {
        if initial_balance < Decimal::ZERO {
            return Err(ParkingError::InvalidInitialBalance {
                balance: initial_balance,
            });
        }

        let mut ledger = self.shared.lock();
        let capacity = self.shared.settings.capacity;
        if ledger.vehicles.len() >= capacity {
            return Err(ParkingError::CapacityExceeded { capacity });
        }

        let vehicle = Vehicle::new(ledger.next_id, category, initial_balance);
        ledger.next_id += 1;
        ledger.vehicles.push(vehicle.clone());
        tracing::info!("Vehicle admitted: {}", vehicle);

        if ledger.vehicles.len() == 1 {
            self.start_billing(&mut ledger);
        }
        Ok(vehicle)
    }

    /// `Ok(false)` if no such vehicle; `OutstandingBalance` while its balance is negative.
    pub fn remove_vehicle(&self, id: VehicleId) -> Result<bool> {
        let mut ledger = self.shared.lock();
        let Some(index) = ledger.position(id) else {
            return Ok(false);
        };

        let vehicle = &ledger.vehicles[index];
        if vehicle.has_debt() {
            return Err(ParkingError::OutstandingBalance {
                id,
                balance: vehicle.balance,
            });
        }

        let removed = ledger.vehicles.remove(index);
        tracing::info!("Vehicle left: {}", removed);
        if ledger.vehicles.is_empty() {
            Self::stop_billing(&mut ledger);
        }
        Ok(true)
    }

    /// `InvalidAmount` for a non-positive amount, `Ok(false)` if no such vehicle,
    /// `BalanceOverflow` if the new balance is not representable.
    pub fn recharge(&self, id: VehicleId, amount: Decimal) -> Result<bool> {
        if amount <= Decimal::ZERO {
            return Err(ParkingError::InvalidAmount { amount });
        }

        let mut ledger = self.shared.lock();
        let Some(vehicle) = ledger.vehicles.iter_mut().find(|v| v.id == id) else {
            return Ok(false);
        };
        vehicle.balance = vehicle
            .balance
            .checked_add(amount)
            .ok_or(ParkingError::BalanceOverflow { id })?;
        tracing::info!(
            "Vehicle {} recharged by {} (balance now {})",
            id,
            display_amount(amount),
            display_amount(vehicle.balance)
        );
        Ok(true)
    }

    pub fn get_vehicle(&self, id: VehicleId) -> Option<Vehicle> {
        let ledger = self.shared.lock();
        ledger.vehicles.iter().find(|v| v.id == id).cloned()
    }

    /// Parked vehicles in admission order.
    pub fn list_vehicles(&self) -> Vec<Vehicle> {
        self.shared.lock().vehicles.clone()
    }

    pub fn revenue_total(&self) -> Decimal {
        self.shared.lock().total_revenue
    }

    pub fn revenue_last_minute(&self) -> Decimal {
        let ledger = self.shared.lock();
        ledger.revenue_last_minute(self.shared.clock.now())
    }

    /// Most recent first.
    pub fn transactions_last_minute(&self) -> Vec<Transaction> {
        let ledger = self.shared.lock();
        ledger
            .last_minute(self.shared.clock.now())
            .cloned()
            .collect()
    }

    /// Full contents of the revenue log, or an empty string if it cannot be read.
    pub fn read_log(&self) -> String {
        let _ledger = self.shared.lock();
        self.shared.log.read_all().unwrap_or_else(|e| {
            tracing::debug!("Revenue log unavailable: {}", e);
            String::new()
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.settings.capacity
    }

    pub fn occupied_spaces(&self) -> usize {
        self.shared.lock().vehicles.len()
    }

    pub fn free_spaces(&self) -> usize {
        self.capacity().saturating_sub(self.occupied_spaces())
    }

    pub fn is_billing_running(&self) -> bool {
        self.shared.lock().billing.is_some()
    }

    pub fn snapshot(&self) -> ParkSnapshot {
        let ledger = self.shared.lock();
        let capacity = self.shared.settings.capacity;
        ParkSnapshot {
            capacity,
            occupied: ledger.vehicles.len(),
            free: capacity.saturating_sub(ledger.vehicles.len()),
            total_revenue: ledger.total_revenue,
            revenue_last_minute: ledger.revenue_last_minute(self.shared.clock.now()),
            billing_running: ledger.billing.is_some(),
            vehicles: ledger.vehicles.clone(),
        }
    }

    /// Runs one billing tick right now, independent of the billing task.
    pub fn bill_once(&self) -> Result<TickReport> {
        self.shared.bill_tick(None)
    }

    /// Runs one flush tick right now, independent of the flush task.
    pub fn flush_once(&self) -> FlushReport {
        self.shared.flush_tick()
    }

    /// Stops both periodic tasks. Also happens on drop.
    pub fn shutdown(&self) {
        self.flush_task.abort();
        Self::stop_billing(&mut self.shared.lock());
    }
}

impl Drop for ParkingLot {
    fn drop(&mut self) {
        self.shutdown();
    }
}
