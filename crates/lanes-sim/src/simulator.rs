//! Single-seed simulation: one engine, one model server, one shuffled wire.
//!
//! The simulator plays host: it drains the engine's effects, executes them
//! against the [`ModelServer`], and queues the completions with randomized
//! delays so that REST responses, fetch results, and push frames interleave
//! in seed-determined orders. After the configured rounds it quiesces the
//! wire, applies one final authoritative fetch, and hands the pair to the
//! [`ConvergenceOracle`].

use anyhow::{Result, bail};
use chrono::Duration;
use chrono::{TimeZone, Utc};
use tracing::debug;

use lanes_core::{
    BoardEngine, ConnectionState, Credential, Effect, EngineConfig, Lane, ManualClock, MutationId,
    Priority, Role, TicketDraft, TicketFilter, TicketPatch,
};

use crate::oracle::{ConvergenceOracle, OracleResult};
use crate::rng::DeterministicRng;
use crate::schedule::{Delivery, DeliveryQueue};
use crate::server::ModelServer;

/// Parameters for one simulated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Seed; fully determines the run.
    pub seed: u64,
    /// Rounds of activity before quiescing.
    pub rounds: u64,
    /// Tickets pre-existing on the server.
    pub seed_tickets: usize,
    /// Chance per round of a local user action (percent).
    pub action_percent: u8,
    /// Chance per round of a foreign client write (percent).
    pub foreign_percent: u8,
    /// Chance that an issued REST call fails in transit (percent).
    pub failure_percent: u8,
    /// Chance per round that the push channel drops (percent).
    pub drop_channel_percent: u8,
    /// Maximum delivery delay, in rounds.
    pub max_delay_rounds: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            rounds: 48,
            seed_tickets: 6,
            action_percent: 60,
            foreign_percent: 35,
            failure_percent: 15,
            drop_channel_percent: 5,
            max_delay_rounds: 3,
        }
    }
}

/// Outcome of one simulated run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub rounds_run: u64,
    pub ops_issued: u64,
    pub failures_injected: u64,
    pub pushes_delivered: u64,
    pub oracle: OracleResult,
}

/// Drives one [`BoardEngine`] against one [`ModelServer`].
pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    clock: ManualClock,
    engine: BoardEngine,
    server: ModelServer,
    queue: DeliveryQueue,
    handles: Vec<MutationId>,
    round: u64,
    ops_issued: u64,
    failures_injected: u64,
    pushes_delivered: u64,
}

impl Simulator {
    /// Build a simulator: a seeded server and a signed-in engine that has
    /// requested its initial load.
    ///
    /// # Errors
    ///
    /// Returns an error for a degenerate configuration (`rounds == 0`).
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.rounds == 0 {
            bail!("rounds must be > 0");
        }
        let t0 = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid epoch"))?;
        let clock = ManualClock::new(t0);
        let mut engine = BoardEngine::new(EngineConfig::default(), Box::new(clock.clone()));
        engine.sign_in(Credential::new("sim-credential"));
        engine.set_project_role("core", Role::Editor);
        engine.load(TicketFilter::default());

        Ok(Self {
            config,
            rng: DeterministicRng::new(config.seed),
            clock,
            engine,
            server: ModelServer::new(t0, config.seed_tickets),
            queue: DeliveryQueue::new(),
            handles: Vec::new(),
            round: 0,
            ops_issued: 0,
            failures_injected: 0,
            pushes_delivered: 0,
        })
    }

    /// Run to quiescence and check every invariant.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine asks for something the scenario never
    /// provokes (a sign-out redirect, with auth failures not injected).
    pub fn run(&mut self) -> Result<SimulationResult> {
        for round in 0..self.config.rounds {
            self.round = round;
            if self.rng.hit_rate_percent(self.config.action_percent) {
                self.user_action();
            }
            if self.rng.hit_rate_percent(self.config.foreign_percent) {
                if let Some(event) = self.server.foreign_write(&mut self.rng) {
                    let due = round + self.delivery_delay();
                    self.queue.push(due, Delivery::Push(event));
                }
            }
            if self.rng.hit_rate_percent(self.config.drop_channel_percent) {
                self.engine.push_connection_lost();
            }

            self.pump_effects()?;
            let batch = self.queue.take_ready(round, &mut self.rng);
            for delivery in batch {
                self.deliver(delivery);
            }
            self.pump_effects()?;

            self.server.advance(1);
            self.clock.advance(Duration::seconds(1));
        }

        self.quiesce()?;
        self.final_fetch();

        Ok(SimulationResult {
            rounds_run: self.config.rounds,
            ops_issued: self.ops_issued,
            failures_injected: self.failures_injected,
            pushes_delivered: self.pushes_delivered,
            oracle: ConvergenceOracle::check_all(&self.engine, &self.server, &self.handles),
        })
    }

    /// Issue one random user action through the engine's public surface.
    fn user_action(&mut self) {
        let tickets = self.engine.tickets();
        let choice = if tickets.is_empty() {
            0
        } else {
            self.rng.next_bounded(5)
        };
        let outcome = match choice {
            0 => self.engine.create_ticket(TicketDraft {
                title: format!("task {}", self.rng.next_bounded(10_000)),
                project: "core".to_string(),
                body: "drafted in the simulator".to_string(),
                priority: Priority::ALL[self.rng.pick_index(Priority::ALL.len())],
                status: Lane::Backlog,
                assignee: None,
                estimate: None,
            }),
            1 => {
                let id = tickets[self.rng.pick_index(tickets.len())].id.clone();
                let to = Lane::ALL[self.rng.pick_index(Lane::ALL.len())];
                self.engine.move_ticket(id, to)
            }
            2 => {
                let id = tickets[self.rng.pick_index(tickets.len())].id.clone();
                let patch = TicketPatch {
                    title: Some(format!("retitled {}", self.rng.next_bounded(10_000))),
                    priority: Some(Priority::ALL[self.rng.pick_index(Priority::ALL.len())]),
                    ..TicketPatch::default()
                };
                self.engine.update_ticket(id, patch)
            }
            3 => {
                let id = tickets[self.rng.pick_index(tickets.len())].id.clone();
                self.engine.delete_ticket(id)
            }
            _ => {
                let id = tickets[self.rng.pick_index(tickets.len())].id.clone();
                self.engine.trigger_grooming(id)
            }
        };
        match outcome {
            Ok(handle) => self.handles.push(handle),
            Err(err) => debug!(%err, "user action rejected"),
        }
    }

    /// Drain queued effects and execute each against the wire.
    fn pump_effects(&mut self) -> Result<()> {
        while let Some(effect) = self.engine.next_effect() {
            self.execute(effect)?;
        }
        Ok(())
    }

    fn execute(&mut self, effect: Effect) -> Result<()> {
        let due = self.round + self.delivery_delay();
        match effect {
            Effect::CallRest { mutation, call } => {
                self.ops_issued += 1;
                let result = if self.rng.hit_rate_percent(self.config.failure_percent) {
                    self.failures_injected += 1;
                    Err(lanes_core::SyncError::network("injected transport failure"))
                } else {
                    self.server.apply(&call)
                };
                self.queue.push(due, Delivery::RestResult { mutation, result });
            }
            Effect::Fetch { generation, filter } => {
                let tickets = self.server.list(&filter);
                self.queue.push(due, Delivery::FetchResult { generation, tickets });
            }
            Effect::ConnectPush => {
                self.queue.push(due, Delivery::PushConnected);
            }
            Effect::RequestBulkInit => {
                let snapshot = self.server.snapshot();
                self.queue
                    .push(due, Delivery::Push(lanes_core::PushEvent::BulkInit(snapshot)));
            }
            Effect::ScheduleReconnect { .. } => {
                self.queue.push(self.round + 1, Delivery::RetryElapsed);
            }
            // Channel teardown and per-ticket interest are host bookkeeping
            // with no model-server counterpart.
            Effect::DisconnectPush | Effect::Subscribe { .. } | Effect::Unsubscribe { .. } => {}
            Effect::SignOutRedirect => {
                bail!("unexpected sign-out redirect at round {}", self.round)
            }
        }
        Ok(())
    }

    fn deliver(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::RestResult { mutation, result } => match result {
                Ok(response) => self.engine.rest_succeeded(mutation, response),
                Err(error) => self.engine.rest_failed(mutation, &error),
            },
            Delivery::FetchResult { generation, tickets } => {
                self.engine.fetch_completed(generation, Ok(tickets));
            }
            Delivery::Push(event) => {
                // A dropped channel loses frames; bulk-init on reconnect and
                // the final fetch make up for them. Frames travel as JSON so
                // the wire narrowing path is exercised too.
                if self.engine.connection_state() == ConnectionState::Connected {
                    self.pushes_delivered += 1;
                    self.engine.push_frame(&crate::server::frame_of(&event));
                }
            }
            Delivery::PushConnected => self.engine.push_connected(),
            Delivery::RetryElapsed => self.engine.push_retry_elapsed(),
        }
    }

    /// Deliver everything still on the wire until both sides go quiet.
    fn quiesce(&mut self) -> Result<()> {
        loop {
            self.pump_effects()?;
            if self.queue.is_empty() {
                return Ok(());
            }
            self.round += 1;
            let batch = self.queue.drain_all(&mut self.rng);
            for delivery in batch {
                self.deliver(delivery);
            }
        }
    }

    /// One last lossless authoritative fetch; afterwards the oracle compares
    /// the pair directly.
    fn final_fetch(&mut self) {
        self.engine.refresh();
        while let Some(effect) = self.engine.next_effect() {
            if let Effect::Fetch { generation, filter } = effect {
                let tickets = self.server.list(&filter);
                self.engine.fetch_completed(generation, Ok(tickets));
            }
        }
    }

    fn delivery_delay(&mut self) -> u64 {
        self.rng.next_bounded(self.config.max_delay_rounds + 1)
    }
}
