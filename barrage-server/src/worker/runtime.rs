//! The attack-owner task
//!
//! A single task owns the worker's attack state: it is the only place that
//! starts or stops attacks, so a new plan can never race a running one. The
//! control channel is polled ahead of every response (the `biased` arm
//! ordering) and once per idle tick, so a posted plan is picked up within
//! one response round trip.

use barrage_attack::{Attacker, AttackerConfig, MetricsWindow, Rate};
use barrage_core::{Targeter, TestPlan};
use barrage_generators::{Generator, TestTypeRegistry};
use barrage_metrics::MetricsSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

const IDLE_TICK: Duration = Duration::from_secs(1);
const METRICS_FLUSH: Duration = Duration::from_secs(1);

/// Owns the single in-flight attack of a worker process.
pub struct AttackRuntime {
    target_url: String,
    registry: Arc<TestTypeRegistry>,
    sink: Arc<dyn MetricsSink>,
    attacker_config: AttackerConfig,
}

impl AttackRuntime {
    pub fn new(
        target_url: String,
        registry: Arc<TestTypeRegistry>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            target_url,
            registry,
            sink,
            attacker_config: AttackerConfig::default(),
        }
    }

    fn generator_for(&self, plan: &TestPlan) -> Option<Arc<Generator>> {
        if plan.is_stop() {
            debug!("zero attack duration, stopping");
            return None;
        }
        match self
            .registry
            .generator(&plan.test_type, &self.target_url, plan.params.as_ref())
        {
            Some(generator) => Some(Arc::new(generator)),
            None => {
                error!(test_type = %plan.test_type, "invalid attack type");
                None
            }
        }
    }

    /// Run until the control channel closes. Every received plan replaces
    /// the current attack; a stop plan just drops it.
    pub async fn run(self, mut plans: mpsc::UnboundedReceiver<TestPlan>) {
        let mut next_plan: Option<TestPlan> = None;
        loop {
            let plan = match next_plan.take() {
                Some(plan) => plan,
                None => match self.idle(&mut plans).await {
                    Some(plan) => plan,
                    None => return,
                },
            };

            let Some(generator) = self.generator_for(&plan) else {
                continue;
            };
            next_plan = self.attack(&plan, generator, &mut plans).await;
        }
    }

    /// Wait for the next plan, waking every second so the wait never turns
    /// into a busy spin on a broken channel.
    async fn idle(&self, plans: &mut mpsc::UnboundedReceiver<TestPlan>) -> Option<TestPlan> {
        loop {
            tokio::select! {
                plan = plans.recv() => return plan,
                _ = tokio::time::sleep(IDLE_TICK) => trace!("idle"),
            }
        }
    }

    /// Drive one attack to completion or supersession. Returns the plan
    /// that superseded it, if any.
    async fn attack(
        &self,
        plan: &TestPlan,
        generator: Arc<Generator>,
        plans: &mut mpsc::UnboundedReceiver<TestPlan>,
    ) -> Option<TestPlan> {
        let attacker = match Attacker::new(self.attacker_config.clone()) {
            Ok(attacker) => attacker,
            Err(err) => {
                error!(%err, "could not build attacker");
                return None;
            }
        };
        let rate = Rate::new(plan.num_messages, plan.per);
        info!(
            name = %plan.name,
            test_type = %plan.test_type,
            rate = rate.per_second(),
            duration_secs = plan.attack_duration.as_secs(),
            "starting attack"
        );

        let mut attack = attacker.attack(
            Arc::clone(&generator) as Arc<dyn Targeter>,
            rate,
            plan.attack_duration,
        );
        let mut window = MetricsWindow::new();
        let mut flush_ticker = tokio::time::interval(METRICS_FLUSH);
        flush_ticker.tick().await; // the first tick is immediate
        let mut last_flush = Instant::now();

        enum Step {
            Superseded(Option<TestPlan>),
            Outcome(Option<barrage_core::Outcome>),
            Flush,
        }

        loop {
            let step = tokio::select! {
                biased;
                new_plan = plans.recv() => Step::Superseded(new_plan),
                outcome = attack.next() => Step::Outcome(outcome),
                _ = flush_ticker.tick() => Step::Flush,
            };
            match step {
                Step::Superseded(new_plan) => {
                    // supersede: stop the running attack, drain, swap
                    attack.shutdown().await;
                    window.reset();
                    if new_plan.is_some() {
                        info!("attack superseded by new plan");
                    }
                    return new_plan;
                }
                Step::Outcome(Some(outcome)) => {
                    generator.process_result(&outcome, outcome.seq);
                    window.add(&outcome);
                }
                Step::Outcome(None) => {
                    info!("attack finished");
                    self.emit_window(&mut window, last_flush.elapsed());
                    return None;
                }
                Step::Flush => {
                    self.emit_window(&mut window, last_flush.elapsed());
                    last_flush = Instant::now();
                }
            }
        }
    }

    fn emit_window(&self, window: &mut MetricsWindow, elapsed: Duration) {
        let snapshot = window.flush(elapsed);
        self.sink.gauge("vegeta.rate", snapshot.rate, &[]);
        self.sink.gauge("vegeta.throughput", snapshot.throughput, &[]);
        self.sink.gauge("vegeta.success_pct", snapshot.success_pct, &[]);
        self.sink.gauge("vegeta.requests", snapshot.requests as f64, &[]);
        self.sink.gauge(
            "vegeta.data_invalid",
            if snapshot.data_invalid { 1.0 } else { 0.0 },
            &[],
        );
    }
}
