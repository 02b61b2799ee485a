//! Load simulation command implementation
//!
//! Builds a seeded random sponsor forest, then drives payment events through
//! several concurrent workers that share one database file, each over its own
//! connection. A fraction of the events are redeliveries of earlier ones so
//! dedup is exercised under contention. The run ends with the balance audit
//! and a partner cap check over every PARTNER member.

use crate::config::LedgerCliConfig;
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use referral_ledger::{CommissionReport, EngineConfig, Member, PaymentCompleted, ReferralEngine, Tier};
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Write as _,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info, warn};

/// Attempts per event when the store reports contention
const MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SimulationScenario {
    /// Mixed network: mostly BRONZE and SILVER, a few PARTNER members
    Normal,
    /// Half the network on PARTNER with large payments that hit the monthly cap
    PartnerCap,
    /// Long sponsor chains of GOLD and DIAMOND members reaching the level ceiling
    DeepChains,
}

/// Share of the network on each tier
#[derive(Clone, Debug)]
pub struct TierDistribution {
    pub free: f32,
    pub bronze: f32,
    pub silver: f32,
    pub gold: f32,
    pub diamond: f32,
    pub partner: f32,
}

impl TierDistribution {
    fn validate(&self) -> Result<()> {
        let total = self.free + self.bronze + self.silver + self.gold + self.diamond + self.partner;
        if (total - 1.0).abs() > 0.001 {
            return Err(anyhow!(
                "Tier distribution percentages must sum to 1.0, got: {}",
                total
            ));
        }
        Ok(())
    }

    fn pick(&self, value: f32) -> Tier {
        let weights = [
            (Tier::Free, self.free),
            (Tier::Bronze, self.bronze),
            (Tier::Silver, self.silver),
            (Tier::Gold, self.gold),
            (Tier::Diamond, self.diamond),
        ];
        let mut cumulative = 0.0;
        for (tier, weight) in weights {
            cumulative += weight;
            if value < cumulative {
                return tier;
            }
        }
        Tier::Partner
    }
}

impl From<SimulationScenario> for TierDistribution {
    fn from(scenario: SimulationScenario) -> Self {
        match scenario {
            SimulationScenario::Normal => Self {
                free: 0.10,
                bronze: 0.35,
                silver: 0.25,
                gold: 0.18,
                diamond: 0.07,
                partner: 0.05,
            },
            SimulationScenario::PartnerCap => Self {
                free: 0.05,
                bronze: 0.20,
                silver: 0.10,
                gold: 0.10,
                diamond: 0.05,
                partner: 0.50,
            },
            SimulationScenario::DeepChains => Self {
                free: 0.05,
                bronze: 0.10,
                silver: 0.15,
                gold: 0.35,
                diamond: 0.30,
                partner: 0.05,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulateCommand {
    pub db_path: String,
    pub scenario: SimulationScenario,
    pub members: usize,
    pub payments: u64,
    pub workers: usize,
    /// Share of events that redeliver an earlier event
    pub replay_rate: f32,
    pub seed: Option<u64>, // for reproducible randomness
}

impl SimulateCommand {
    /// Validate command parameters
    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() || self.db_path == ":memory:" {
            return Err(anyhow!(
                "Simulation needs a database file shared by its workers"
            ));
        }
        if self.members == 0 {
            return Err(anyhow!("Members must be greater than 0"));
        }
        if self.members > 100_000 {
            return Err(anyhow!("Members must not exceed 100,000"));
        }
        if self.payments == 0 {
            return Err(anyhow!("Payments must be greater than 0"));
        }
        if self.payments > 1_000_000 {
            return Err(anyhow!("Payments must not exceed 1,000,000"));
        }
        if self.workers == 0 || self.workers > 64 {
            return Err(anyhow!("Workers must be between 1 and 64"));
        }
        if !(0.0..=1.0).contains(&self.replay_rate) {
            return Err(anyhow!(
                "Replay rate must be between 0.0 and 1.0, got: {}",
                self.replay_rate
            ));
        }
        TierDistribution::from(self.scenario).validate()
    }
}

/// Members and payment events for one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationPlan {
    pub members: Vec<Member>,
    pub payments: Vec<PaymentCompleted>,
    /// Events in `payments` that redeliver an earlier event
    pub replays: u64,
}

/// Generates a sponsor forest and payment traffic from a seed
pub struct NetworkGenerator {
    scenario: SimulationScenario,
    distribution: TierDistribution,
    replay_rate: f32,
    base_seed: u64,
    seed: u64,
    generated_count: u64,
}

impl NetworkGenerator {
    /// Create a new generator
    pub fn new(command: &SimulateCommand) -> Self {
        let seed = command.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });

        Self {
            scenario: command.scenario,
            distribution: command.scenario.into(),
            replay_rate: command.replay_rate,
            base_seed: seed,
            seed,
            generated_count: 0,
        }
    }

    /// Linear congruential step
    fn next_random(&mut self) -> u64 {
        self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        self.seed
    }

    /// Uniform value in `[0, 1)` from the high bits of the next step
    #[allow(clippy::cast_precision_loss)]
    fn next_unit(&mut self) -> f32 {
        (self.next_random() >> 40) as f32 / (1_u64 << 24) as f32
    }

    /// Uniform index in `0..len`; `len` must be non-zero
    fn pick_index(&mut self, len: usize) -> usize {
        let bound = u64::try_from(len).unwrap_or(u64::MAX).max(1);
        usize::try_from((self.next_random() >> 16) % bound).unwrap_or_default()
    }

    fn amount_range(&self) -> (u64, u64) {
        match self.scenario {
            SimulationScenario::Normal => (1_000, 50_000),
            SimulationScenario::PartnerCap => (500_000, 5_000_000),
            SimulationScenario::DeepChains => (5_000, 20_000),
        }
    }

    /// Build `count` members; every sponsor precedes its recruits, so the forest has no cycles
    pub fn generate_members(&mut self, count: usize) -> Vec<Member> {
        let mut members: Vec<Member> = Vec::with_capacity(count);
        for i in 0..count {
            let sponsor_index = if i == 0 {
                None
            } else {
                let roll = self.next_unit();
                match self.scenario {
                    SimulationScenario::DeepChains if roll < 0.9 => Some(i - 1),
                    _ if roll < 0.05 => None,
                    _ => Some(self.pick_index(i)),
                }
            };
            let sponsor_id = sponsor_index.map(|s| members[s].id.clone());
            let unit = self.next_unit();
            let tier = self.distribution.pick(unit);
            members.push(Member {
                id: format!("m{i:06}"),
                tier,
                sponsor_id,
            });
        }
        members
    }

    /// Generate the next payment, either fresh or a redelivery of `emitted`
    fn generate_payment(
        &mut self,
        members: &[Member],
        emitted: &[PaymentCompleted],
    ) -> (PaymentCompleted, bool) {
        if !emitted.is_empty() && self.next_unit() < self.replay_rate {
            let original = &emitted[self.pick_index(emitted.len())];
            return (original.clone(), true);
        }

        self.generated_count += 1;
        let payer = &members[self.pick_index(members.len())];
        let (min, max) = self.amount_range();
        let amount = min + self.next_random() % (max - min + 1);

        (
            PaymentCompleted {
                event_id: format!("sim-{}-{}", self.base_seed, self.generated_count),
                payer_id: payer.id.clone(),
                amount_paid_minor: amount,
            },
            false,
        )
    }

    /// Generate the members and payment stream for a run
    pub fn plan(&mut self, members: usize, payments: u64) -> SimulationPlan {
        let members = self.generate_members(members);
        let mut events: Vec<PaymentCompleted> = Vec::new();
        let mut replays = 0;
        for _ in 0..payments {
            let (event, replay) = self.generate_payment(&members, &events);
            if replay {
                replays += 1;
            }
            events.push(event);
        }
        SimulationPlan {
            members,
            payments: events,
            replays,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimulationStats {
    pub members: u64,
    pub total_events: u64,
    pub replayed_events: u64,
    pub events_by_outcome: BTreeMap<String, u64>,
    pub entries_written: u64,
    pub duplicate_entries: u64,
    pub commission_total_minor: u64,
    pub clamped_minor: u64,
    pub retries: u64,
    pub errors: u64,
    pub audit_mismatches: usize,
    pub partners_at_cap: u64,
    pub cap_violations: Vec<String>,
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
}

impl SimulationStats {
    fn record_report(&mut self, report: &CommissionReport) {
        self.total_events += 1;
        let outcome = if report.is_replay() {
            "duplicate"
        } else if report.entries.is_empty() {
            "no_commission"
        } else {
            "paid"
        };
        *self.events_by_outcome.entry(outcome.to_string()).or_insert(0) += 1;
        self.entries_written += report.entries.len() as u64;
        self.duplicate_entries += u64::from(report.duplicates);
        for line in &report.entries {
            self.commission_total_minor += line.amount_minor;
            self.clamped_minor += line.clamped_minor;
        }
    }

    fn record_error(&mut self) {
        self.total_events += 1;
        self.errors += 1;
        *self.events_by_outcome.entry("failed".to_string()).or_insert(0) += 1;
    }

    fn record_retry(&mut self) {
        self.retries += 1;
    }

    fn merge(&mut self, other: Self) {
        self.total_events += other.total_events;
        for (outcome, count) in other.events_by_outcome {
            *self.events_by_outcome.entry(outcome).or_insert(0) += count;
        }
        self.entries_written += other.entries_written;
        self.duplicate_entries += other.duplicate_entries;
        self.commission_total_minor += other.commission_total_minor;
        self.clamped_minor += other.clamped_minor;
        self.retries += other.retries;
        self.errors += other.errors;
    }

    fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn end(&mut self) {
        self.end_time = Some(Instant::now());
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn events_per_second(&self) -> f64 {
        if let Some(duration) = self.duration() {
            if duration.as_secs_f64() > 0.0 {
                return self.total_events as f64 / duration.as_secs_f64();
            }
        }
        0.0
    }
}

/// Simulator orchestrates seeding, the worker pool and the final checks
pub struct Simulator {
    command: SimulateCommand,
    generator: NetworkGenerator,
    stats: SimulationStats,
}

impl Simulator {
    /// Create a new simulator
    pub fn new(command: SimulateCommand) -> Result<Self> {
        command.validate()?;
        let generator = NetworkGenerator::new(&command);

        Ok(Self {
            command,
            generator,
            stats: SimulationStats::default(),
        })
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig::new().with_database_path(self.command.db_path.clone())
    }

    /// Run the simulation
    pub async fn run(&mut self) -> Result<SimulationStats> {
        info!(
            "Starting simulation: {} members, {} payments, {} workers",
            self.command.members, self.command.payments, self.command.workers
        );
        self.stats.start();

        let plan = self.generator.plan(self.command.members, self.command.payments);
        self.stats.members = plan.members.len() as u64;
        self.stats.replayed_events = plan.replays;

        let mut engine = ReferralEngine::open(self.engine_config())
            .with_context(|| format!("Failed to open ledger at {}", self.command.db_path))?;
        for member in &plan.members {
            engine.register_member(member)?;
        }
        info!("Seeded {} members", plan.members.len());

        // Setup shutdown signal
        let shutdown = Arc::new(AtomicBool::new(false));
        let signal_task = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received interrupt, stopping workers after their current event");
                    shutdown.store(true, Ordering::SeqCst);
                }
            })
        };

        let mut shards: Vec<Vec<PaymentCompleted>> = vec![Vec::new(); self.command.workers];
        for (i, event) in plan.payments.into_iter().enumerate() {
            shards[i % self.command.workers].push(event);
        }

        let handles: Vec<_> = shards
            .into_iter()
            .enumerate()
            .map(|(worker, events)| {
                let config = self.engine_config();
                let shutdown = Arc::clone(&shutdown);
                tokio::task::spawn_blocking(move || run_worker(worker, config, &events, &shutdown))
            })
            .collect();

        for handle in handles {
            match handle.await {
                Ok(Ok(worker_stats)) => self.stats.merge(worker_stats),
                Ok(Err(e)) => {
                    error!("Worker failed: {}", e);
                    self.stats.errors += 1;
                }
                Err(e) => {
                    error!("Worker panicked: {}", e);
                    self.stats.errors += 1;
                }
            }
        }
        signal_task.abort();

        self.stats.audit_mismatches = engine.audit_balances()?.len();
        let (at_cap, violations) = check_partner_caps(&engine, &plan.members)?;
        self.stats.partners_at_cap = at_cap;
        self.stats.cap_violations = violations;

        self.stats.end();

        info!(
            "Simulation completed: {} events in {:.2}s ({:.2} events/sec)",
            self.stats.total_events,
            self.stats.duration().unwrap_or_default().as_secs_f64(),
            self.stats.events_per_second()
        );
        if self.stats.audit_mismatches > 0 || !self.stats.cap_violations.is_empty() {
            warn!(
                mismatches = self.stats.audit_mismatches,
                cap_violations = self.stats.cap_violations.len(),
                "Simulation ended with ledger inconsistencies"
            );
        }

        Ok(self.stats.clone())
    }
}

/// Process one shard of events over a dedicated connection
fn run_worker(
    worker: usize,
    config: EngineConfig,
    events: &[PaymentCompleted],
    shutdown: &AtomicBool,
) -> Result<SimulationStats> {
    let mut engine = ReferralEngine::open(config)?;
    let mut stats = SimulationStats::default();

    for event in events {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let mut attempt = 1;
        loop {
            match engine.process_payment(event) {
                Ok(report) => {
                    stats.record_report(&report);
                    break;
                }
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    debug!(worker, event_id = %event.event_id, attempt, "Store busy, retrying");
                    stats.record_retry();
                    std::thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
                    attempt += 1;
                }
                Err(e) => {
                    error!(worker, event_id = %event.event_id, error = %e, "Payment failed");
                    stats.record_error();
                    break;
                }
            }
        }
    }

    debug!(worker, events = stats.total_events, "Worker finished");
    Ok(stats)
}

/// Count partners at their monthly cap and list any month above it
fn check_partner_caps(engine: &ReferralEngine, members: &[Member]) -> Result<(u64, Vec<String>)> {
    let cap = engine.config().partner_monthly_cap_minor;
    let mut at_cap = 0;
    let mut violations = Vec::new();

    for partner in members.iter().filter(|m| m.tier == Tier::Partner) {
        let mut by_month: HashMap<String, u64> = HashMap::new();
        for entry in engine.ledger_entries(&partner.id)? {
            *by_month.entry(entry.period_month).or_insert(0) += entry.amount_minor;
        }
        for (month, total) in by_month {
            if total > cap {
                violations.push(format!("{} earned {} in {} (cap {})", partner.id, total, month, cap));
            } else if total == cap {
                at_cap += 1;
            }
        }
    }

    Ok((at_cap, violations))
}

/// Execute the simulate command
pub async fn execute(command: SimulateCommand, config: &LedgerCliConfig) -> Result<String> {
    let mut simulator = Simulator::new(command)?;
    let stats = simulator.run().await?;

    // Format results
    let duration = stats.duration().unwrap_or_default();
    let mut output = format!("Referral Ledger Simulation Results\n{}\n", "=".repeat(50));
    let _ = writeln!(output, "Members:           {}", stats.members);
    let _ = writeln!(output, "Total Events:      {}", stats.total_events);
    let _ = writeln!(output, "Replayed Events:   {}", stats.replayed_events);
    let _ = writeln!(output, "Duration:          {:.2}s", duration.as_secs_f64());
    let _ = writeln!(output, "Events/Second:     {:.2}", stats.events_per_second());
    let _ = writeln!(output, "Entries Written:   {}", stats.entries_written);
    let _ = writeln!(output, "Duplicate Entries: {}", stats.duplicate_entries);
    let _ = writeln!(
        output,
        "Commission Paid:   {:.2}",
        config.format_money(stats.commission_total_minor)
    );
    let _ = writeln!(
        output,
        "Clamped by Cap:    {:.2}",
        config.format_money(stats.clamped_minor)
    );
    let _ = writeln!(output, "Retries:           {}", stats.retries);
    let _ = writeln!(output, "Errors:            {}", stats.errors);

    output.push_str("\nEvents by Outcome:\n");
    for (outcome, count) in &stats.events_by_outcome {
        #[allow(clippy::cast_precision_loss)]
        let percentage = if stats.total_events > 0 {
            (*count as f64 / stats.total_events as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(output, "  {outcome:<15} {count:>8} ({percentage:>5.1}%)");
    }

    output.push_str("\nLedger Checks:\n");
    let _ = writeln!(output, "  Balance audit mismatches: {}", stats.audit_mismatches);
    let _ = writeln!(output, "  Partners at monthly cap:  {}", stats.partners_at_cap);
    let _ = writeln!(output, "  Cap violations:           {}", stats.cap_violations.len());
    for violation in &stats.cap_violations {
        let _ = writeln!(output, "    {violation}");
    }

    Ok(output)
}
