//! Shared connection registry.
//!
//! # Responsibilities
//! - Count open connections per (identifier, address)
//! - Decide admission against the identifier's distinct-address cap
//! - Panic on unmatched lost-connection events
//!
//! # Design Decisions
//! - One `RwLock` over all counters: admission checks share the read lock,
//!   every mutation takes the write lock
//! - Addresses are keyed in canonical form, so `::ffff:10.0.0.1` and
//!   `10.0.0.1` are the same peer
//! - The distinct active count is recomputed per check by scanning the
//!   identifier's counters

use std::collections::HashMap;
use std::net::IpAddr;

use parking_lot::RwLock;

use crate::limiter::{AllowedConnections, ConnLimit, PairingViolation, Policy};
use crate::observability::metrics;

/// Open connections per canonical address, for one identifier.
type AddressCounters = HashMap<IpAddr, u32>;

/// Outcome of one admission evaluation, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Admission {
    allowed: bool,
    has_connection: bool,
    size: usize,
    max: u32,
}

impl Admission {
    fn evaluate(counters: Option<&AddressCounters>, ip: IpAddr, max: u32) -> Self {
        let size = counters.map_or(0, |c| c.values().filter(|&&count| count > 0).count());
        let has_connection = counters
            .and_then(|c| c.get(&ip))
            .is_some_and(|&count| count > 0);

        Self {
            allowed: has_connection || size < max as usize,
            has_connection,
            size,
            max,
        }
    }
}

/// Registry of open connections, limiting distinct addresses per identifier.
///
/// Construct once and share through an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct ConnLimitRegistry {
    policy: Policy,
    connected: RwLock<HashMap<String, AddressCounters>>,
    debug_log: bool,
}

impl ConnLimitRegistry {
    /// Create a registry from policy entries. With `debug_log` set, every
    /// operation emits a `debug` event with its decision values.
    pub fn new(allowed: Vec<AllowedConnections>, debug_log: bool) -> Self {
        Self::with_policy(Policy::new(allowed), debug_log)
    }

    /// Create a registry over an already built policy.
    pub fn with_policy(policy: Policy, debug_log: bool) -> Self {
        Self {
            policy,
            connected: RwLock::new(HashMap::new()),
            debug_log,
        }
    }

    /// The immutable policy this registry enforces.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Configured maximum distinct addresses for `id`, 0 when unconfigured.
    pub fn max_allowed(&self, id: &str) -> u32 {
        self.policy.max_allowed(id)
    }

    /// Open connections from `addr` under `id`; 0 if never seen.
    pub fn connection_count(&self, id: &str, addr: IpAddr) -> u32 {
        let ip = addr.to_canonical();
        self.connected
            .read()
            .get(id)
            .and_then(|counters| counters.get(&ip))
            .copied()
            .unwrap_or(0)
    }

    /// Distinct addresses with at least one open connection under `id`.
    pub fn active_addresses(&self, id: &str) -> usize {
        self.connected
            .read()
            .get(id)
            .map_or(0, |counters| counters.values().filter(|&&count| count > 0).count())
    }

    /// All addresses ever recorded under `id`, including those at zero.
    pub fn known_addresses(&self, id: &str) -> usize {
        self.connected.read().get(id).map_or(0, HashMap::len)
    }

    fn log_admission(&self, op: &'static str, id: &str, ip: IpAddr, admission: Admission) {
        if self.debug_log {
            tracing::debug!(
                op,
                id,
                ip = %ip,
                result = admission.allowed,
                has_connection = admission.has_connection,
                size = admission.size,
                max = admission.max,
                "Admission evaluated"
            );
        }
    }

    fn log_counter(&self, op: &'static str, id: &str, ip: IpAddr, now_connections: u32) {
        if self.debug_log {
            tracing::debug!(op, id, ip = %ip, now_connections, "Connection counter updated");
        }
    }
}

fn increment(connected: &mut HashMap<String, AddressCounters>, id: &str, ip: IpAddr) -> u32 {
    let count = connected
        .entry(id.to_string())
        .or_default()
        .entry(ip)
        .or_insert(0);
    *count += 1;
    *count
}

fn decrement(
    connected: &mut HashMap<String, AddressCounters>,
    id: &str,
    ip: IpAddr,
) -> Result<u32, PairingViolation> {
    let counters = connected
        .get_mut(id)
        .ok_or_else(|| PairingViolation::UnknownIdentifier { id: id.to_string(), ip })?;
    let count = counters
        .get_mut(&ip)
        .ok_or_else(|| PairingViolation::UnknownAddress { id: id.to_string(), ip })?;

    if *count == 0 {
        return Err(PairingViolation::ZeroCounter { id: id.to_string(), ip });
    }

    *count -= 1;
    Ok(*count)
}

impl ConnLimit for ConnLimitRegistry {
    fn can_establish(&self, id: &str, addr: IpAddr) -> bool {
        let ip = addr.to_canonical();
        let max = self.policy.max_allowed(id);
        let admission = Admission::evaluate(self.connected.read().get(id), ip, max);

        self.log_admission("can_establish", id, ip, admission);
        metrics::record_admission(id, admission.allowed);
        admission.allowed
    }

    fn on_established(&self, id: &str, addr: IpAddr) -> bool {
        let ip = addr.to_canonical();
        let now_connections = increment(&mut self.connected.write(), id, ip);

        self.log_counter("on_established", id, ip, now_connections);
        metrics::record_established(id);
        true
    }

    fn on_lost(&self, id: &str, addr: IpAddr) {
        let ip = addr.to_canonical();
        let result = decrement(&mut self.connected.write(), id, ip);

        // Write guard already released. Binaries build with panic = "abort",
        // so this ends the process.
        let now_connections = match result {
            Ok(now_connections) => now_connections,
            Err(violation) => {
                tracing::error!(%violation, "Connection pairing violated");
                panic!("{violation}");
            }
        };

        self.log_counter("on_lost", id, ip, now_connections);
        metrics::record_lost(id);
    }

    fn try_establish(&self, id: &str, addr: IpAddr) -> bool {
        let ip = addr.to_canonical();
        let max = self.policy.max_allowed(id);

        let (admission, now_connections) = {
            let mut connected = self.connected.write();
            let admission = Admission::evaluate(connected.get(id), ip, max);
            let now_connections = admission
                .allowed
                .then(|| increment(&mut connected, id, ip));
            (admission, now_connections)
        };

        self.log_admission("try_establish", id, ip, admission);
        metrics::record_admission(id, admission.allowed);
        if let Some(now_connections) = now_connections {
            self.log_counter("try_establish", id, ip, now_connections);
            metrics::record_established(id);
        }
        admission.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::capture::CapturingRecorder;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};
    use std::thread;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn svc_registry() -> ConnLimitRegistry {
        ConnLimitRegistry::new(vec![AllowedConnections::new("svc", 2)], false)
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run `f` under a debug-level fmt subscriber and return what it wrote.
    fn capture_debug(f: impl FnOnce()) -> String {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(log.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = log.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn admits_up_to_max_distinct_addresses() {
        let registry = svc_registry();
        let (a, b, c) = (ip(1), ip(2), ip(3));

        assert!(registry.can_establish("svc", a));
        assert!(registry.on_established("svc", a));
        assert_eq!(registry.connection_count("svc", a), 1);

        assert!(registry.can_establish("svc", b));
        assert!(registry.on_established("svc", b));
        assert_eq!(registry.connection_count("svc", b), 1);

        assert!(!registry.can_establish("svc", c));

        // Already connected addresses bypass the cap.
        assert!(registry.can_establish("svc", a));
        registry.on_established("svc", a);
        assert_eq!(registry.connection_count("svc", a), 2);

        registry.on_lost("svc", a);
        assert_eq!(registry.connection_count("svc", a), 1);
        assert_eq!(registry.active_addresses("svc"), 2);

        registry.on_lost("svc", b);
        assert_eq!(registry.connection_count("svc", b), 0);
        assert_eq!(registry.active_addresses("svc"), 1);

        assert!(registry.can_establish("svc", c));
    }

    #[test]
    fn unknown_identifier_rejects_new_addresses() {
        let registry = svc_registry();
        assert_eq!(registry.max_allowed("other"), 0);
        assert!(!registry.can_establish("other", ip(1)));
    }

    #[test]
    fn on_established_is_not_idempotent() {
        let registry = svc_registry();
        registry.on_established("svc", ip(1));
        registry.on_established("svc", ip(1));
        assert_eq!(registry.connection_count("svc", ip(1)), 2);
        assert_eq!(registry.active_addresses("svc"), 1);
    }

    #[test]
    fn on_established_ignores_policy() {
        let registry = svc_registry();
        for last in 1..=4 {
            assert!(registry.on_established("svc", ip(last)));
        }
        assert_eq!(registry.active_addresses("svc"), 4);
        assert!(!registry.can_establish("svc", ip(5)));
    }

    #[test]
    fn zero_counters_are_kept() {
        let registry = svc_registry();
        registry.on_established("svc", ip(1));
        registry.on_lost("svc", ip(1));

        assert_eq!(registry.connection_count("svc", ip(1)), 0);
        assert_eq!(registry.active_addresses("svc"), 0);
        assert_eq!(registry.known_addresses("svc"), 1);

        // A zero counter can be reused without a new entry.
        registry.on_established("svc", ip(1));
        assert_eq!(registry.known_addresses("svc"), 1);
    }

    #[test]
    fn ipv4_mapped_address_is_same_peer() {
        let registry = svc_registry();
        let mapped: IpAddr = "::ffff:10.0.0.1".parse().unwrap();

        registry.on_established("svc", ip(1));
        assert_eq!(registry.connection_count("svc", mapped), 1);

        registry.on_lost("svc", mapped);
        assert_eq!(registry.connection_count("svc", ip(1)), 0);
        assert_eq!(registry.known_addresses("svc"), 1);
    }

    #[test]
    fn identifiers_are_independent() {
        let registry = ConnLimitRegistry::new(
            vec![AllowedConnections::new("a", 1), AllowedConnections::new("b", 1)],
            false,
        );
        registry.on_established("a", ip(1));
        assert!(!registry.can_establish("a", ip(2)));
        assert!(registry.can_establish("b", ip(2)));
    }

    #[test]
    #[should_panic(expected = "unknown identifier")]
    fn lost_for_unknown_identifier_panics() {
        svc_registry().on_lost("svc", ip(1));
    }

    #[test]
    #[should_panic(expected = "unrecorded address")]
    fn lost_for_unknown_address_panics() {
        let registry = svc_registry();
        registry.on_established("svc", ip(1));
        registry.on_lost("svc", ip(2));
    }

    #[test]
    #[should_panic(expected = "already at zero")]
    fn lost_below_zero_panics() {
        let registry = svc_registry();
        registry.on_established("svc", ip(1));
        registry.on_lost("svc", ip(1));
        registry.on_lost("svc", ip(1));
    }

    #[test]
    #[should_panic(expected = "id=svc, ip=10.0.0.9")]
    fn violation_names_identifier_and_address() {
        let registry = svc_registry();
        registry.on_established("svc", ip(1));
        registry.on_lost("svc", ip(9));
    }

    #[test]
    #[should_panic(expected = "id=svc, ip=10.0.0.1")]
    fn violation_reports_canonical_address() {
        let registry = svc_registry();
        registry.on_lost("svc", "::ffff:10.0.0.1".parse().unwrap());
    }

    #[test]
    fn debug_log_reports_decision_values() {
        let registry = ConnLimitRegistry::new(vec![AllowedConnections::new("svc", 2)], true);
        let output = capture_debug(|| {
            registry.on_established("svc", ip(1));
            registry.can_establish("svc", ip(2));
            registry.on_lost("svc", ip(1));
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3, "{output}");

        assert!(lines[0].contains("on_established"));
        assert!(lines[0].contains("ip=10.0.0.1"));
        assert!(lines[0].contains("now_connections=1"));

        assert!(lines[1].contains("can_establish"));
        assert!(lines[1].contains("svc"));
        assert!(lines[1].contains("ip=10.0.0.2"));
        assert!(lines[1].contains("result=true"));
        assert!(lines[1].contains("has_connection=false"));
        assert!(lines[1].contains("size=1"));
        assert!(lines[1].contains("max=2"));

        assert!(lines[2].contains("on_lost"));
        assert!(lines[2].contains("now_connections=0"));
    }

    #[test]
    fn debug_log_disabled_is_silent() {
        let registry = svc_registry();
        let output = capture_debug(|| {
            registry.on_established("svc", ip(1));
            registry.can_establish("svc", ip(2));
            registry.on_lost("svc", ip(1));
        });
        assert!(output.is_empty(), "{output}");
    }

    #[test]
    fn operations_record_metrics() {
        let registry = svc_registry();
        let recorder = CapturingRecorder::default();
        ::metrics::with_local_recorder(&recorder, || {
            registry.can_establish("svc", ip(1));
            registry.on_established("svc", ip(1));
            registry.try_establish("svc", ip(2));
            registry.try_establish("svc", ip(3));
            registry.on_lost("svc", ip(1));
        });

        assert_eq!(
            recorder.increments(),
            vec![
                "connlimit_admission_total{id=svc,result=allowed} +1",
                "connlimit_established_total{id=svc} +1",
                "connlimit_admission_total{id=svc,result=allowed} +1",
                "connlimit_established_total{id=svc} +1",
                "connlimit_admission_total{id=svc,result=denied} +1",
                "connlimit_lost_total{id=svc} +1",
            ]
        );
    }

    #[test]
    fn try_establish_records_only_when_admitted() {
        let registry = ConnLimitRegistry::new(vec![AllowedConnections::new("svc", 1)], true);
        assert!(registry.try_establish("svc", ip(1)));
        assert!(!registry.try_establish("svc", ip(2)));
        assert!(registry.try_establish("svc", ip(1)));

        assert_eq!(registry.connection_count("svc", ip(1)), 2);
        assert_eq!(registry.connection_count("svc", ip(2)), 0);
        assert_eq!(registry.known_addresses("svc"), 1);
    }

    #[test]
    fn concurrent_establish_and_lost_balance_out() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let registry = Arc::new(svc_registry());
        let addr = ip(7);

        let spawn_all = |f: fn(&ConnLimitRegistry, IpAddr)| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    thread::spawn(move || {
                        for _ in 0..PER_THREAD {
                            f(&registry, addr);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        };

        spawn_all(|r, a| {
            r.on_established("svc", a);
        });
        assert_eq!(registry.connection_count("svc", addr), (THREADS * PER_THREAD) as u32);

        spawn_all(|r, a| r.on_lost("svc", a));
        assert_eq!(registry.connection_count("svc", addr), 0);
    }

    #[test]
    fn concurrent_try_establish_never_exceeds_cap() {
        let registry = Arc::new(ConnLimitRegistry::new(
            vec![AllowedConnections::new("svc", 3)],
            false,
        ));

        let handles: Vec<_> = (1..=32u8)
            .map(|last| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.try_establish("svc", ip(last)))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(admitted, 3);
        assert_eq!(registry.active_addresses("svc"), 3);
    }
}
