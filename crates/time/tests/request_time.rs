use std::error::Error as _;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ippan_ntp_source::{
    ConfigError, NtpReading, NtpSourceConfig, NtpTimeSource, PoolResolver, QueryError,
    ResolutionError, TimeQuery, TimeSource, TimeSourceConfig, TimeSourceError, REQUEST_BATCH_SIZE,
};
use parking_lot::Mutex;

const POOL_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9));

#[derive(Clone)]
enum Scripted {
    Reading(i64),
    /// Answers with this round trip after sleeping for it
    Delayed(i64),
    IoError(&'static str),
    Hang,
}

fn reading_for(rtt: i64) -> NtpReading {
    NtpReading {
        ntp_time_ms: 1_700_000_000_000 + rtt * 10,
        uptime_reference_ms: 50_000 + rtt,
        round_trip_time_ms: rtt,
    }
}

/// Replays a fixed script, cycling across batches.
struct ScriptedQuery {
    script: Vec<Scripted>,
    calls: AtomicUsize,
    answered: AtomicUsize,
    targets: Mutex<Vec<IpAddr>>,
}

impl ScriptedQuery {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            answered: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeQuery for ScriptedQuery {
    async fn query_once(
        &self,
        addr: IpAddr,
        _port: u16,
        _timeout: Duration,
    ) -> Result<NtpReading, QueryError> {
        self.targets.lock().push(addr);
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script[call % self.script.len()].clone() {
            Scripted::Reading(rtt) => Ok(reading_for(rtt)),
            Scripted::Delayed(rtt) => {
                tokio::time::sleep(Duration::from_millis(rtt as u64)).await;
                self.answered.fetch_add(1, Ordering::SeqCst);
                Ok(reading_for(rtt))
            }
            Scripted::IoError(msg) => Err(QueryError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                msg,
            ))),
            Scripted::Hang => futures::future::pending().await,
        }
    }
}

struct FixedResolver {
    lookups: AtomicUsize,
}

#[async_trait]
impl PoolResolver for FixedResolver {
    async fn resolve(&self, _host: &str) -> Result<IpAddr, ResolutionError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(POOL_ADDR)
    }
}

struct FailingResolver;

#[async_trait]
impl PoolResolver for FailingResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolutionError> {
        Err(ResolutionError::NoAddress {
            host: host.to_string(),
        })
    }
}

fn source_with(
    resolver: Arc<dyn PoolResolver>,
    query: Arc<ScriptedQuery>,
    ntp: NtpSourceConfig,
) -> NtpTimeSource {
    NtpTimeSource::new(TimeSourceConfig::new("ntp-pool", 10), ntp, resolver, query).unwrap()
}

fn fixed_resolver() -> Arc<FixedResolver> {
    Arc::new(FixedResolver {
        lookups: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn selects_median_round_trip() {
    let query = ScriptedQuery::new(vec![
        Scripted::Reading(40),
        Scripted::Reading(10),
        Scripted::Reading(30),
        Scripted::Reading(50),
        Scripted::Reading(20),
    ]);
    let resolver = fixed_resolver();
    let source = source_with(resolver.clone(), query.clone(), NtpSourceConfig::default());

    let info = source.request_time().await.unwrap();

    assert_eq!(info.request_time, reading_for(30).ntp_time_ms);
    assert_eq!(info.request_uptime, reading_for(30).uptime_reference_ms);
    assert_eq!(query.calls(), REQUEST_BATCH_SIZE);
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
    assert!(query.targets.lock().iter().all(|addr| *addr == POOL_ADDR));
}

#[tokio::test]
async fn two_successes_pick_the_slower_one() {
    let query = ScriptedQuery::new(vec![
        Scripted::Reading(100),
        Scripted::IoError("refused"),
        Scripted::Reading(300),
        Scripted::IoError("refused"),
        Scripted::IoError("refused"),
    ]);
    let source = source_with(fixed_resolver(), query, NtpSourceConfig::default());

    let info = source.request_time().await.unwrap();
    assert_eq!(info.request_time, reading_for(300).ntp_time_ms);
}

#[tokio::test]
async fn all_slow_readings_fail_instead_of_picking_a_median() {
    let query = ScriptedQuery::new(vec![Scripted::Reading(1_500)]);
    let source = source_with(
        fixed_resolver(),
        query,
        NtpSourceConfig::default().with_max_round_trip_ms(1_000),
    );

    match source.request_time().await.unwrap_err() {
        TimeSourceError::AllRequestsFailed { message, cause } => {
            assert!(cause.is_none());
            assert_eq!(
                message.matches("Round trip time 1500 ms exceeds allowed maximum of 1000 ms").count(),
                5
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn network_failures_are_aggregated() {
    let query = ScriptedQuery::new(vec![
        Scripted::IoError("refused-0"),
        Scripted::IoError("refused-1"),
        Scripted::IoError("refused-2"),
        Scripted::IoError("refused-3"),
        Scripted::IoError("refused-4"),
    ]);
    let source = source_with(fixed_resolver(), query, NtpSourceConfig::default());

    let err = source.request_time().await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("All NTP requests failed: ["));
    assert!(message.ends_with(']'));
    for i in 0..5 {
        assert!(message.contains(&format!("NTP request I/O error: refused-{i}")));
    }
    assert_eq!(message.matches("; ").count(), 4);

    let cause = err.source().expect("first failure cause is attached");
    assert!(cause.to_string().starts_with("NTP request I/O error: refused-"));
}

#[tokio::test(start_paused = true)]
async fn hung_attempts_time_out_concurrently() {
    let query = ScriptedQuery::new(vec![
        Scripted::Hang,
        Scripted::Reading(25),
        Scripted::Hang,
        Scripted::Hang,
        Scripted::Hang,
    ]);
    let source = source_with(
        fixed_resolver(),
        query,
        NtpSourceConfig::default().with_timeout_ms(2_000),
    );

    let started = tokio::time::Instant::now();
    let info = source.request_time().await.unwrap();

    assert_eq!(info.request_time, reading_for(25).ntp_time_ms);
    assert!(started.elapsed() < Duration::from_millis(4_000));
}

#[tokio::test]
async fn repeated_requests_select_the_same_reading() {
    let query = ScriptedQuery::new(vec![
        Scripted::Reading(80),
        Scripted::IoError("refused"),
        Scripted::Reading(20),
        Scripted::Reading(60),
        Scripted::IoError("refused"),
    ]);
    let source = source_with(fixed_resolver(), query.clone(), NtpSourceConfig::default());

    let first = source.request_time().await.unwrap();
    let second = source.request_time().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.request_time, reading_for(60).ntp_time_ms);
    assert_eq!(query.calls(), 2 * REQUEST_BATCH_SIZE);
}

#[tokio::test]
async fn resolver_failure_short_circuits() {
    let query = ScriptedQuery::new(vec![Scripted::Reading(10)]);
    let source = source_with(Arc::new(FailingResolver), query.clone(), NtpSourceConfig::default());

    let err = source.request_time().await.unwrap_err();

    assert!(matches!(
        err,
        TimeSourceError::Resolution(ResolutionError::NoAddress { ref host }) if host == "pool.ntp.org"
    ));
    assert_eq!(query.calls(), 0);
}

#[tokio::test]
async fn exposes_framework_identity() {
    let source = NtpTimeSource::with_system_resolver(
        TimeSourceConfig::new("ntp-pool", 7),
        NtpSourceConfig::default().with_pool("192.0.2.44"),
        ScriptedQuery::new(vec![Scripted::Reading(5)]),
    )
    .unwrap();
    assert_eq!(source.id(), "ntp-pool");
    assert_eq!(source.priority(), 7);
    assert_eq!(source.ntp_config().ntp_pool, "192.0.2.44");

    let info = source.request_time().await.unwrap();
    assert_eq!(info.request_time, reading_for(5).ntp_time_ms);
}

#[tokio::test(start_paused = true)]
async fn cancelled_request_stops_its_attempts() {
    let query = ScriptedQuery::new(vec![Scripted::Delayed(200)]);
    let source = source_with(fixed_resolver(), query.clone(), NtpSourceConfig::default());

    let cancelled = tokio::time::timeout(Duration::from_millis(20), source.request_time()).await;
    assert!(cancelled.is_err());
    assert_eq!(query.calls(), REQUEST_BATCH_SIZE);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(query.answered.load(Ordering::SeqCst), 0);
}

#[test]
fn zero_timeout_is_rejected_at_construction() {
    let result = NtpTimeSource::new(
        TimeSourceConfig::new("ntp-pool", 10),
        NtpSourceConfig::default().with_timeout_ms(0),
        fixed_resolver(),
        ScriptedQuery::new(vec![Scripted::Reading(10)]),
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));

    let result = NtpTimeSource::with_system_resolver(
        TimeSourceConfig::new("ntp-pool", 10),
        NtpSourceConfig::default().with_pool(""),
        ScriptedQuery::new(vec![Scripted::Reading(10)]),
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}
