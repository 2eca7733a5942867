//! The attacker: paced dispatch of generated requests

use crate::rate::Rate;
use barrage_core::{Outcome, Target, Targeter};
use barrage_http::{attack_client, HttpError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Attacker knobs; the defaults match the production profile.
#[derive(Debug, Clone)]
pub struct AttackerConfig {
    /// Per-request timeout, also the drain budget on stop.
    pub request_timeout: Duration,
    /// Maximum outstanding requests.
    pub max_in_flight: usize,
}

impl Default for AttackerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(500),
            max_in_flight: 1000,
        }
    }
}

/// Issues requests from a targeter at a fixed rate.
pub struct Attacker {
    client: reqwest::Client,
    config: AttackerConfig,
}

impl Attacker {
    pub fn new(config: AttackerConfig) -> Result<Self, HttpError> {
        let client = attack_client(config.request_timeout)?;
        Ok(Self { client, config })
    }

    /// Launch an attack. Requests are paced uniformly at `rate` until
    /// `duration` elapses or [`Attack::stop`] is called; outcomes stream to
    /// the returned handle in completion order.
    pub fn attack(&self, targeter: Arc<dyn Targeter>, rate: Rate, duration: Duration) -> Attack {
        let (outcome_tx, outcome_rx) = mpsc::channel(1024);
        let (stop_tx, stop_rx) = watch::channel(false);
        let driver = tokio::spawn(drive(
            self.client.clone(),
            targeter,
            rate,
            duration,
            self.config.clone(),
            outcome_tx,
            stop_rx,
        ));
        Attack {
            outcomes: outcome_rx,
            stop: stop_tx,
            driver,
        }
    }
}

/// Handle to a running attack.
pub struct Attack {
    outcomes: mpsc::Receiver<Outcome>,
    stop: watch::Sender<bool>,
    driver: tokio::task::JoinHandle<()>,
}

impl Attack {
    /// The next outcome; `None` once the attack finished and drained.
    pub async fn next(&mut self) -> Option<Outcome> {
        self.outcomes.recv().await
    }

    /// Stop issuing requests. In-flight requests are drained within the
    /// request timeout; already-queued outcomes remain readable.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Stop and wait for the driver to finish draining.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.driver.await;
    }
}

async fn drive(
    client: reqwest::Client,
    targeter: Arc<dyn Targeter>,
    rate: Rate,
    duration: Duration,
    config: AttackerConfig,
    outcome_tx: mpsc::Sender<Outcome>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let Some(interval) = rate.interval() else {
        debug!("degenerate rate, nothing to attack");
        return;
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let deadline = Instant::now() + duration;
    let semaphore = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep_until(deadline) => break,
            _ = ticker.tick() => {
                let permit = tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let mut target = Target::default();
                match targeter.next(&mut target) {
                    Ok(seq) => {
                        let client = client.clone();
                        let outcome_tx = outcome_tx.clone();
                        in_flight.spawn(async move {
                            let outcome = send_request(&client, target, seq).await;
                            drop(permit);
                            let _ = outcome_tx.send(outcome).await;
                        });
                    }
                    Err(err) => {
                        // a failed request build costs that request only
                        drop(permit);
                        let _ = outcome_tx
                            .send(Outcome {
                                error: Some(err.to_string()),
                                ..Default::default()
                            })
                            .await;
                    }
                }
                // reap whatever finished without blocking the pace
                while in_flight.try_join_next().is_some() {}
            }
        }
    }

    // await in-flight requests up to the per-request timeout, then abandon
    let drain = async {
        while in_flight.join_next().await.is_some() {}
    };
    if tokio::time::timeout(config.request_timeout, drain).await.is_err() {
        warn!("abandoning in-flight requests after drain timeout");
    }
}

async fn send_request(client: &reqwest::Client, target: Target, seq: u64) -> Outcome {
    let started = Instant::now();
    let request = client
        .request(target.method, target.url)
        .headers(target.headers)
        .body(target.body);

    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.bytes().await.unwrap_or_default().to_vec();
            Outcome {
                seq,
                status,
                latency: started.elapsed(),
                body,
                error: None,
            }
        }
        Err(err) => Outcome {
            seq,
            status: 0,
            latency: started.elapsed(),
            body: Vec::new(),
            error: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;
    use http::Method;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingTargeter {
        url: String,
        issued: AtomicU64,
        processed: AtomicU64,
    }

    impl Targeter for CountingTargeter {
        fn next(&self, target: &mut Target) -> Result<u64, barrage_core::TargetError> {
            let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            target.method = Method::POST;
            target.url = self.url.clone();
            target.body = b"ping".to_vec();
            Ok(seq)
        }

        fn process_result(&self, _outcome: &Outcome, _seq: u64) {
            self.processed.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn spawn_target() -> String {
        let app = Router::new().route("/", post(|| async { "ok" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn attack_runs_for_the_duration_and_paces() {
        let url = spawn_target().await;
        let targeter = Arc::new(CountingTargeter {
            url,
            issued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        });

        let attacker = Attacker::new(AttackerConfig::default()).unwrap();
        let mut attack = attacker.attack(
            Arc::clone(&targeter) as Arc<dyn Targeter>,
            Rate::new(50, Duration::from_secs(1)),
            Duration::from_millis(500),
        );

        let mut outcomes = 0u64;
        while let Some(outcome) = attack.next().await {
            assert_eq!(outcome.status, 200);
            assert!(outcome.seq > 0);
            outcomes += 1;
        }
        // 50/s over 500 ms is about 25 requests; allow generous slack for
        // scheduler jitter
        assert!((5..=40).contains(&outcomes), "got {outcomes} outcomes");
    }

    #[tokio::test]
    async fn stop_halts_issuance_and_drains() {
        let url = spawn_target().await;
        let targeter = Arc::new(CountingTargeter {
            url,
            issued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        });

        let attacker = Attacker::new(AttackerConfig::default()).unwrap();
        let mut attack = attacker.attack(
            Arc::clone(&targeter) as Arc<dyn Targeter>,
            Rate::new(20, Duration::from_secs(1)),
            Duration::from_secs(3600),
        );

        // let a few requests through, then stop
        let first = attack.next().await;
        assert!(first.is_some());
        attack.stop();

        // the stream must terminate promptly
        let drained =
            tokio::time::timeout(Duration::from_secs(2), async { while attack.next().await.is_some() {} })
                .await;
        assert!(drained.is_ok(), "attack did not stop in time");

        let issued_at_stop = targeter.issued.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            targeter.issued.load(Ordering::SeqCst),
            issued_at_stop,
            "requests were issued after stop"
        );
    }

    #[tokio::test]
    async fn transport_errors_become_outcomes() {
        // nothing listens on this port
        let targeter = Arc::new(CountingTargeter {
            url: "http://127.0.0.1:9/".to_string(),
            issued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        });

        let attacker = Attacker::new(AttackerConfig::default()).unwrap();
        let mut attack = attacker.attack(
            targeter as Arc<dyn Targeter>,
            Rate::new(10, Duration::from_secs(1)),
            Duration::from_millis(200),
        );

        let outcome = attack.next().await.expect("expected an outcome");
        assert_eq!(outcome.status, 0);
        assert!(outcome.error.is_some());
        while attack.next().await.is_some() {}
    }
}
