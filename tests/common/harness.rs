//! tests/common/harness.rs
use lark::congestion::lark::Lark;
use lark::congestion::CongestionOps;
use lark::transport::{CaEvent, CaState, TcpControlBlock};
use std::sync::Once;
use std::time::Duration;
use tokio::time::Instant;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lark=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

pub const MSS: u32 = 1448;

/// A test harness that plays the host transport: it owns the control block,
/// delivers callbacks in the order a real stack would, and applies returned
/// thresholds. Time is a base instant plus an explicit offset, so tests
/// control the clock exactly.
pub struct HostHarness {
    pub lark: Lark,
    pub tcb: TcpControlBlock,
    base: Instant,
    offset: Duration,
}

impl HostHarness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            lark: Lark::default(),
            tcb: TcpControlBlock::new(MSS),
            base: Instant::now(),
            offset: Duration::ZERO,
        }
    }

    /// The harness clock.
    pub fn now(&self) -> Instant {
        self.base + self.offset
    }

    /// Moves the clock forward.
    pub fn advance(&mut self, delta: Duration) {
        self.offset += delta;
    }

    /// Delivers an acknowledgement: the RTT sample first, then the growth
    /// opportunity invoked by the same ACK.
    pub fn ack(&mut self, segments: u32, rtt: Duration) {
        let now = self.now();
        self.tcb.last_rtt = rtt;
        self.tcb.min_rtt = Some(match self.tcb.min_rtt {
            Some(min) => min.min(rtt),
            None => rtt,
        });
        self.lark.pkts_acked(Some(&self.tcb), segments, rtt, now);
        self.lark.increase_window(Some(&mut self.tcb), segments, now);
    }

    /// Delivers a growth opportunity without a preceding RTT sample.
    pub fn increase(&mut self, segments: u32) {
        let now = self.now();
        self.lark.increase_window(Some(&mut self.tcb), segments, now);
    }

    /// Reports a congestion event and applies the returned threshold the way
    /// the host would.
    pub fn congestion_event(&mut self, bytes_in_flight: u32) -> u32 {
        let now = self.now();
        self.tcb.bytes_in_flight = bytes_in_flight;
        let ssthresh = self
            .lark
            .get_ssthresh(Some(&mut self.tcb), bytes_in_flight, now);
        self.tcb.ssthresh = ssthresh;
        ssthresh
    }

    /// Delivers a CE mark.
    pub fn ce_mark(&mut self) {
        let now = self.now();
        self.tcb.ca_event = CaEvent::EcnIsCe;
        self.lark.cwnd_event(Some(&self.tcb), CaEvent::EcnIsCe, now);
    }

    /// Moves the host congestion state machine.
    pub fn set_state(&mut self, state: CaState) {
        let now = self.now();
        self.tcb.ca_state = state;
        self.lark.congestion_state_set(Some(&self.tcb), state, now);
    }

    pub fn cwnd(&self) -> u32 {
        self.tcb.cwnd
    }
}
