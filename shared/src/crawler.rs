use std::future::Future;
use std::sync::atomic::{self, AtomicBool, AtomicU32};
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::error::{Fatal, MainError};

/// Lets at most one tick of the jobs sharing it run at a time. Ticks that
/// find it busy are skipped and counted; once more than `skip_limit`
/// consecutive ticks were skipped the scheduler is considered hung.
#[derive(Debug)]
pub struct SingleFlight {
    busy: AtomicBool,
    skipped: AtomicU32,
    skip_limit: u32,
}

#[derive(Debug)]
pub enum Admission {
    Entered(FlightPermit),
    Skipped { skipped: u32 },
    Hung { skipped: u32 },
}

impl SingleFlight {
    pub fn new(skip_limit: u32) -> Arc<Self> {
        Arc::new(Self {
            busy: AtomicBool::new(false),
            skipped: AtomicU32::new(0),
            skip_limit,
        })
    }

    pub fn try_enter(self: &Arc<Self>) -> Admission {
        if self
            .busy
            .compare_exchange(
                false,
                true,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            )
            .is_ok()
        {
            return Admission::Entered(FlightPermit {
                flight: Arc::clone(self),
            });
        }

        let skipped = self.skipped.fetch_add(1, atomic::Ordering::AcqRel) + 1;
        if skipped > self.skip_limit {
            Admission::Hung { skipped }
        } else {
            Admission::Skipped { skipped }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(atomic::Ordering::Acquire)
    }

    pub fn skipped(&self) -> u32 {
        self.skipped.load(atomic::Ordering::Acquire)
    }
}

/// Held for the duration of a tick. Dropping it, whatever the outcome of
/// the tick, frees the guard and clears the skip counter.
#[derive(Debug)]
pub struct FlightPermit {
    flight: Arc<SingleFlight>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.flight.skipped.store(0, atomic::Ordering::Release);
        self.flight.busy.store(false, atomic::Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct Ticker {
    pub job: &'static str,
    pub period: Duration,
    pub flight: Arc<SingleFlight>,
}

impl Ticker {
    pub fn new(
        job: &'static str,
        period: Duration,
        flight: Arc<SingleFlight>,
    ) -> Self {
        Self {
            job,
            period,
            flight,
        }
    }
}

/// Owns every repeating job of the process. The first [`Fatal`] raised by a
/// job, or by the ticker loop itself, stops all jobs and is handed back to
/// the caller, which decides how the process ends.
pub struct Supervisor {
    jobs: JoinSet<Result<(), Fatal>>,
    fatal_tx: mpsc::UnboundedSender<Fatal>,
    fatal_rx: mpsc::UnboundedReceiver<Fatal>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            jobs: JoinSet::new(),
            fatal_tx,
            fatal_rx,
        }
    }

    pub fn every<F, Fut>(&mut self, ticker: Ticker, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), MainError>> + Send + 'static,
    {
        tracing::info!(
            job = ticker.job,
            period = ?ticker.period,
            "Scheduling job"
        );
        self.jobs
            .spawn(run_ticker(ticker, tick, self.fatal_tx.clone()));
    }

    /// Runs until a job turns fatal or every job has ended.
    pub async fn wait(mut self) -> Result<(), Fatal> {
        let result = loop {
            tokio::select! {
                Some(fatal) = self.fatal_rx.recv() => break Err(fatal),
                joined = self.jobs.join_next() => match joined {
                    None => break Ok(()),
                    Some(Ok(Ok(()))) => continue,
                    Some(Ok(Err(fatal))) => break Err(fatal),
                    Some(Err(e)) => {
                        tracing::error!(reason = %e, "Job task aborted");
                        continue;
                    }
                },
            }
        };
        self.jobs.abort_all();
        result
    }

    /// Like [`Supervisor::wait`] but returns cleanly on Ctrl-C.
    pub async fn run(self) -> Result<(), Fatal> {
        tokio::select! {
            result = self.wait() => result,
            _ = signal::ctrl_c() => {
                tracing::info!("Interrupt received, stopping jobs");
                Ok(())
            }
        }
    }
}

async fn run_ticker<F, Fut>(
    ticker: Ticker,
    tick: F,
    fatal_tx: mpsc::UnboundedSender<Fatal>,
) -> Result<(), Fatal>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), MainError>> + Send + 'static,
{
    let job = ticker.job;
    let mut interval = tokio::time::interval(ticker.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let permit = match ticker.flight.try_enter() {
            Admission::Entered(permit) => permit,
            Admission::Skipped { skipped } => {
                tracing::warn!(job, skipped, "Previous tick still running");
                continue;
            }
            Admission::Hung { skipped } => {
                tracing::error!(job, skipped, "Scheduler looks hung");
                return Err(Fatal::SchedulerHung {
                    job: job.to_string(),
                    skipped,
                });
            }
        };

        let fut = tick();
        let fatal_tx = fatal_tx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match fut.await {
                Ok(()) => {}
                Err(MainError::Fatal(fatal)) => {
                    // The receiver only goes away once the supervisor stops.
                    let _ = fatal_tx.send(fatal);
                }
                Err(error) => tracing::error!(job, %error, "Tick failed"),
            }
        });
    }
}
