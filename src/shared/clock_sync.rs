//! Ping/pong clock offset and RTT estimation (spec.md §4.2 "Clock sync
//! protocol").
//!
//! Grounded on the teacher's `PingManager::compute_stats` (mean / stdev /
//! pruned-mean pipeline) in `lightyear/src/shared/ping/manager.rs` and the
//! NTP offset formula in `client/src/sync.rs`'s `SyncManager::finalize`.

use crate::shared::id::ClientId;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Monotonic id for an in-flight ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PingId(pub u32);

/// `{clientTime}` sent C→S.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping {
    pub id: PingId,
    pub client_time: f64,
}

/// `{clientTime, serverTime}` sent S→C.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pong {
    pub id: PingId,
    pub client_time: f64,
    pub server_time: f64,
}

/// A reported clock offset/rtt estimate for one client (spec.md §4.2,
/// used by the Lag Compensator in §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClockSample {
    /// `serverTime - clientTime` estimate, in ms. A legitimate value of
    /// `0.0` must be distinguished from "no sample yet" by the caller
    /// checking map presence, not by comparing to zero (spec.md §4.11
    /// edge case).
    pub offset_ms: f64,
    pub rtt_ms: f64,
}

/// Tracks pings sent but not yet acknowledged by a pong.
#[derive(Debug, Default)]
struct PingStore {
    next_id: u32,
    sent: HashMap<PingId, f64>,
}

impl PingStore {
    fn push_new(&mut self, now: f64) -> PingId {
        let id = PingId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.sent.insert(id, now);
        id
    }

    fn remove(&mut self, id: PingId) -> Option<f64> {
        self.sent.remove(&id)
    }
}

/// Rolling window of raw `(offset_ms, rtt_ms)` samples, pruned by age, with
/// a trimmed-mean estimate (outliers beyond one stdev discarded).
#[derive(Debug)]
struct SampleWindow {
    samples: VecDeque<(f64, f64, f64)>, // (recorded_at, offset_ms, rtt_ms)
    window: Duration,
}

impl SampleWindow {
    fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
        }
    }

    fn push(&mut self, now: f64, offset_ms: f64, rtt_ms: f64) {
        self.samples.push_back((now, offset_ms, rtt_ms));
        let cutoff = now - self.window.as_secs_f64() * 1000.0;
        while matches!(self.samples.front(), Some((t, _, _)) if *t < cutoff) {
            self.samples.pop_front();
        }
    }

    /// Trimmed mean: keep samples within one standard deviation of the
    /// raw mean, then average the survivors. Falls back to the raw mean
    /// if pruning would empty the set.
    fn estimate(&self) -> Option<ClockSample> {
        let n = self.samples.len() as f64;
        if n == 0.0 {
            return None;
        }
        let offset_mean = self.samples.iter().map(|(_, o, _)| o).sum::<f64>() / n;
        let rtt_mean = self.samples.iter().map(|(_, _, r)| r).sum::<f64>() / n;
        let offset_var = self
            .samples
            .iter()
            .map(|(_, o, _)| (o - offset_mean).powi(2))
            .sum::<f64>()
            / n;
        let rtt_var = self
            .samples
            .iter()
            .map(|(_, _, r)| (r - rtt_mean).powi(2))
            .sum::<f64>()
            / n;
        let offset_stdev = offset_var.sqrt();
        let rtt_stdev = rtt_var.sqrt();

        let pruned: Vec<_> = self
            .samples
            .iter()
            .filter(|(_, o, r)| {
                (o - offset_mean).abs() <= offset_stdev + f64::EPSILON * 1000.0
                    && (r - rtt_mean).abs() <= rtt_stdev + f64::EPSILON * 1000.0
            })
            .collect();

        if pruned.is_empty() {
            return Some(ClockSample {
                offset_ms: offset_mean,
                rtt_ms: rtt_mean,
            });
        }
        let pn = pruned.len() as f64;
        Some(ClockSample {
            offset_ms: pruned.iter().map(|(_, o, _)| o).sum::<f64>() / pn,
            rtt_ms: pruned.iter().map(|(_, _, r)| r).sum::<f64>() / pn,
        })
    }
}

/// Client-side half of clock sync: sends pings at a fixed interval and
/// derives an EMA-smoothed offset/rtt from pongs.
pub struct ClockSyncClient {
    ping_interval: Duration,
    since_last_ping: Duration,
    store: PingStore,
    window: SampleWindow,
    latest: ClockSample,
}

impl ClockSyncClient {
    pub fn new(ping_interval: Duration, stats_window: Duration) -> Self {
        Self {
            ping_interval,
            since_last_ping: Duration::ZERO,
            store: PingStore::default(),
            window: SampleWindow::new(stats_window),
            latest: ClockSample::default(),
        }
    }

    /// Advance the internal ping timer; call once per client frame/tick
    /// with the real elapsed duration.
    pub fn advance(&mut self, dt: Duration) {
        self.since_last_ping += dt;
    }

    /// Returns a ping to send if the interval has elapsed.
    pub fn maybe_prepare_ping(&mut self, client_now: f64) -> Option<Ping> {
        if self.since_last_ping < self.ping_interval {
            return None;
        }
        self.since_last_ping = Duration::ZERO;
        let id = self.store.push_new(client_now);
        Some(Ping {
            id,
            client_time: client_now,
        })
    }

    /// Process a pong reply; `client_now` is this client's wall clock at
    /// receipt. Returns the updated clock sample.
    pub fn process_pong(&mut self, pong: Pong, client_now: f64) -> Option<ClockSample> {
        let _sent_at = self.store.remove(pong.id)?;
        // rtt = now - t_c (spec.md §4.2)
        let rtt = client_now - pong.client_time;
        // clockOffset = t_s + rtt/2 - now
        let offset = pong.server_time + rtt / 2.0 - client_now;
        self.window.push(client_now, offset, rtt);
        self.latest = self.window.estimate().unwrap_or(ClockSample {
            offset_ms: offset,
            rtt_ms: rtt,
        });
        Some(self.latest)
    }

    pub fn current(&self) -> ClockSample {
        self.latest
    }
}

/// Server-side half: answers pings and remembers the latest clock sample
/// each client has reported, for the Lag Compensator.
#[derive(Default)]
pub struct ClockSyncServer {
    records: HashMap<ClientId, ClockSample>,
}

impl ClockSyncServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pong reply to a client's ping.
    pub fn respond(&self, ping: Ping, server_now: f64) -> Pong {
        Pong {
            id: ping.id,
            client_time: ping.client_time,
            server_time: server_now,
        }
    }

    /// Record a client-reported clock sample (the client computes its own
    /// offset/rtt from the ping/pong round trip and reports it back so the
    /// Lag Compensator can use it).
    pub fn record_report(&mut self, client: ClientId, sample: ClockSample) {
        self.records.insert(client, sample);
    }

    pub fn get(&self, client: &ClientId) -> Option<ClockSample> {
        self.records.get(client).copied()
    }

    pub fn remove_client(&mut self, client: &ClientId) {
        self.records.remove(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_computes_offset_and_rtt() {
        let mut client = ClockSyncClient::new(Duration::from_millis(100), Duration::from_secs(4));
        client.advance(Duration::from_millis(100));
        let ping = client.maybe_prepare_ping(1000.0).unwrap();
        assert_eq!(ping.client_time, 1000.0);

        // server receives at server-time 1050 (synced clocks, pure one-way
        // latency of 50ms), replies immediately
        let server = ClockSyncServer::new();
        let pong = server.respond(ping, 1050.0);

        // client receives the pong at client wall-clock 1100 (rtt 100ms)
        let sample = client.process_pong(pong, 1100.0).unwrap();
        assert!((sample.rtt_ms - 100.0).abs() < 1e-6);
        // offset = 1050 + 50 - 1100 = 0
        assert!((sample.offset_ms - 0.0).abs() < 1e-6);
    }

    #[test]
    fn server_distinguishes_absent_from_zero_offset() {
        let mut server = ClockSyncServer::new();
        let c = ClientId::new("a");
        assert_eq!(server.get(&c), None);
        server.record_report(c.clone(), ClockSample {
            offset_ms: 0.0,
            rtt_ms: 40.0,
        });
        assert_eq!(
            server.get(&c),
            Some(ClockSample {
                offset_ms: 0.0,
                rtt_ms: 40.0
            })
        );
    }

    #[test]
    fn ping_not_sent_before_interval_elapses() {
        let mut client = ClockSyncClient::new(Duration::from_millis(100), Duration::from_secs(4));
        client.advance(Duration::from_millis(50));
        assert!(client.maybe_prepare_ping(500.0).is_none());
    }
}
