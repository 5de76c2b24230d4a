//! Tests for the Lark congestion controller internals.
use super::alpha;
use super::fusion::{self, Verdict};
use super::lark::Lark;
use super::metrics::FlowMetrics;
use super::policy::{
    estimate_bdp, ExternalPolicy, PolicyInput, RulePolicy, WindowDecision, WindowPolicy,
};
use super::CongestionOps;
use crate::config::{AlphaConfig, Config, EcnConfig, RetentionConfig, WindowConfig};
use crate::observation::CallingContext;
use crate::transport::{CaState, EcnState, TcpControlBlock};
use std::time::Duration;
use tokio::time::Instant;

const MSS: u32 = 1448;

fn assert_f64_eq(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "Floats not equal: {} vs {}", a, b);
}

fn test_tcb() -> TcpControlBlock {
    TcpControlBlock::new(MSS)
}

fn fresh_metrics() -> FlowMetrics {
    FlowMetrics::new(&EcnConfig::default())
}

fn policy_input(cwnd: u32, ssthresh: u32, bdp: u64) -> PolicyInput {
    PolicyInput {
        cwnd,
        ssthresh,
        segment_size: MSS,
        segments_acked: 1,
        bytes_in_flight: cwnd,
        bdp,
        alpha: 1.25,
        consecutive_growth: 0,
    }
}

#[test]
fn test_fusion_explicit_loss() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    let mut tcb = test_tcb();
    tcb.ca_state = CaState::Recovery;

    let verdict = fusion::classify(
        CallingContext::LossSsThresh,
        &tcb,
        &mut metrics,
        &EcnConfig::default(),
        now,
    );
    assert_eq!(verdict, Verdict::Loss);
}

#[test]
fn test_fusion_loss_yields_to_live_ecn_mark() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    metrics.on_ce_mark(now);
    let tcb = test_tcb();

    // A single mark is below the burst threshold, so the verdict falls all
    // the way through to benign rather than claiming an explicit loss.
    let verdict = fusion::classify(
        CallingContext::LossSsThresh,
        &tcb,
        &mut metrics,
        &EcnConfig::default(),
        now,
    );
    assert_eq!(verdict, Verdict::Benign);
}

#[test]
fn test_fusion_ecn_burst() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    for _ in 0..30 {
        metrics.on_ce_mark(now);
    }
    let mut tcb = test_tcb();
    tcb.ecn_state = EcnState::CeRcvd;

    let verdict = fusion::classify(
        CallingContext::LossSsThresh,
        &tcb,
        &mut metrics,
        &EcnConfig::default(),
        now,
    );
    assert_eq!(verdict, Verdict::EcnBurst);
}

#[test]
fn test_fusion_timeout_owns_loss_state() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    let mut tcb = test_tcb();
    tcb.ca_state = CaState::Loss;

    let verdict = fusion::classify(
        CallingContext::LossSsThresh,
        &tcb,
        &mut metrics,
        &EcnConfig::default(),
        now,
    );
    assert_eq!(verdict, Verdict::Timeout);
}

#[test]
fn test_fusion_single_mark_suppressed_on_increase() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    metrics.on_ce_mark(now);
    let tcb = test_tcb();

    let verdict = fusion::classify(
        CallingContext::Increase,
        &tcb,
        &mut metrics,
        &EcnConfig::default(),
        now,
    );
    assert_eq!(verdict, Verdict::Benign);
}

#[test]
fn test_fusion_stale_marks_age_out() {
    let start = Instant::now();
    let mut metrics = fresh_metrics();
    for _ in 0..40 {
        metrics.on_ce_mark(start);
    }
    assert_eq!(metrics.ce_count_in_window(start), 40);

    // Two seconds later the whole burst has aged past the window.
    let later = start + Duration::from_secs(2);
    assert_eq!(metrics.ce_count_in_window(later), 0);

    let tcb = test_tcb();
    let verdict = fusion::classify(
        CallingContext::Increase,
        &tcb,
        &mut metrics,
        &EcnConfig::default(),
        later,
    );
    assert_eq!(verdict, Verdict::Benign);
}

#[test]
fn test_ecn_ring_is_bounded() {
    let now = Instant::now();
    let ecn = EcnConfig::default();
    let mut metrics = FlowMetrics::new(&ecn);
    for _ in 0..500 {
        metrics.on_ce_mark(now);
    }
    let bound = (ecn.rate_high * ecn.window.as_secs_f64()).ceil() as usize + 8;
    assert!(metrics.ce_count_in_window(now) <= bound);
    assert_eq!(metrics.ecn_total(), 500);
}

#[test]
fn test_ecn_window_edge_is_exclusive() {
    let start = Instant::now();
    let mut metrics = fresh_metrics();
    metrics.on_ce_mark(start);

    assert_eq!(
        metrics.ce_count_in_window(start + Duration::from_millis(999)),
        1
    );
    // A mark exactly one window old is no longer "within the last second".
    assert_eq!(metrics.ce_count_in_window(start + Duration::from_secs(1)), 0);
}

#[test]
fn test_alpha_rtt_headroom_and_open_state() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    metrics.on_pkts_acked(
        MSS as u64,
        Duration::from_micros(100),
        Some(Duration::from_micros(100)),
        now,
    );

    let adapted = alpha::adapt(
        1.25,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Open,
        &mut metrics,
        now,
    );
    // Headroom (+0.02) plus the open-state term (+0.01).
    assert_f64_eq(adapted, 1.28);
}

#[test]
fn test_alpha_rtt_inflated() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    metrics.on_pkts_acked(
        MSS as u64,
        Duration::from_micros(400),
        Some(Duration::from_micros(100)),
        now,
    );

    let adapted = alpha::adapt(
        1.25,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Open,
        &mut metrics,
        now,
    );
    // Inflation (-0.05) plus the open-state term (+0.01).
    assert_f64_eq(adapted, 1.21);
}

#[test]
fn test_alpha_rtt_neutral_zone() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    metrics.on_pkts_acked(
        MSS as u64,
        Duration::from_micros(200),
        Some(Duration::from_micros(100)),
        now,
    );

    let adapted = alpha::adapt(
        1.25,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Disorder,
        &mut metrics,
        now,
    );
    assert_f64_eq(adapted, 1.25);
}

#[test]
fn test_alpha_skips_rtt_terms_until_measured() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    metrics.on_ce_mark(now);

    let adapted = alpha::adapt(
        1.25,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Open,
        &mut metrics,
        now,
    );
    // Recent CE (-0.03) plus the open-state term (+0.01); no RTT terms.
    assert_f64_eq(adapted, 1.23);
}

#[test]
fn test_alpha_loss_state_penalty() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();

    let adapted = alpha::adapt(
        1.25,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Loss,
        &mut metrics,
        now,
    );
    assert_f64_eq(adapted, 1.15);
}

#[test]
fn test_alpha_growth_bonus_tiers() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();
    for _ in 0..3 {
        metrics.note_growth();
    }
    let first_tier = alpha::adapt(
        1.25,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Disorder,
        &mut metrics,
        now,
    );
    assert_f64_eq(first_tier, 1.27);

    for _ in 0..3 {
        metrics.note_growth();
    }
    let second_tier = alpha::adapt(
        1.25,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Disorder,
        &mut metrics,
        now,
    );
    assert_f64_eq(second_tier, 1.29);
}

#[test]
fn test_alpha_clamped_to_band() {
    let now = Instant::now();
    let mut metrics = fresh_metrics();

    let upper = alpha::adapt(
        1.50,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Open,
        &mut metrics,
        now,
    );
    assert_f64_eq(upper, 1.50);

    let lower = alpha::adapt(
        1.10,
        &AlphaConfig::default(),
        &EcnConfig::default(),
        CaState::Loss,
        &mut metrics,
        now,
    );
    assert_f64_eq(lower, 1.10);
}

#[test]
fn test_bdp_falls_back_to_cwnd() {
    let cwnd = 20 * MSS;
    assert_eq!(
        estimate_bdp(cwnd, 0.0, Duration::ZERO, Duration::ZERO),
        cwnd as u64
    );
}

#[test]
fn test_bdp_from_window_drain_rate() {
    // With a stable RTT and no recorded peak, the estimate is the window
    // itself: (cwnd / rtt) * rtt.
    let cwnd = 20 * MSS;
    let rtt = Duration::from_micros(100);
    let bdp = estimate_bdp(cwnd, 0.0, rtt, rtt);
    assert_eq!(bdp, cwnd as u64);
}

#[test]
fn test_bdp_peak_throughput_dominates() {
    let cwnd = 10 * MSS;
    let rtt = Duration::from_millis(1);
    // 100 MB/s over a 1 ms floor is 100_000 bytes of pipe.
    let bdp = estimate_bdp(cwnd, 100_000_000.0, rtt, rtt);
    assert_eq!(bdp, 100_000);
}

#[test]
fn test_rule_policy_slow_start_growth() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let cwnd = 10 * MSS;
    let input = policy_input(cwnd, u32::MAX, cwnd as u64);
    // One segment acked grows the window by two segments, well under the
    // three-BDP ceiling.
    assert_eq!(policy.increase(&input), cwnd + 2 * MSS);
}

#[test]
fn test_rule_policy_slow_start_streak_factor() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let cwnd = 10 * MSS;
    let mut input = policy_input(cwnd, u32::MAX, cwnd as u64);
    input.consecutive_growth = 3;
    assert_eq!(policy.increase(&input), cwnd + 3 * MSS);
}

#[test]
fn test_rule_policy_slow_start_ceiling() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let cwnd = 8 * MSS;
    // Three BDPs is nine segments; growth stops there.
    let input = policy_input(cwnd, u32::MAX, 3 * MSS as u64);
    assert_eq!(policy.increase(&input), 9 * MSS);
}

#[test]
fn test_rule_policy_avoidance_gamma_floor() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let cwnd = 50 * MSS;
    let mut input = policy_input(cwnd, 10 * MSS, 4 * MSS as u64);
    input.segments_acked = 0;
    // The rate target is far below the window, so growth is the linear
    // component alone, floored at one segment.
    assert_eq!(policy.increase(&input), cwnd + MSS);
}

#[test]
fn test_rule_policy_avoidance_rate_target() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let cwnd = 10 * MSS;
    let bdp = 20 * MSS as u64;
    let input = policy_input(cwnd, 4 * MSS, bdp);
    let expected = (1.25 * bdp as f64) as u64 + MSS as u64;
    assert_eq!(policy.increase(&input), expected as u32);
}

#[test]
fn test_rule_policy_floor_clamp() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let mut input = policy_input(MSS, u32::MAX, MSS as u64);
    input.segments_acked = 0;
    // Whatever the math says, the window never sinks below four segments.
    assert!(policy.increase(&input) >= 4 * MSS);
}

#[test]
fn test_rule_policy_segment_cap_when_bdp_small() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let cwnd = 200 * MSS;
    let mut input = policy_input(cwnd, 4 * MSS, MSS as u64);
    input.segments_acked = 50;
    // Cap is max(8 * bdp, 100 segments) = 100 segments here.
    assert_eq!(policy.increase(&input), 100 * MSS);
}

#[test]
fn test_rule_policy_congestion_retention() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let cwnd = 80 * MSS;
    let input = policy_input(cwnd, cwnd, cwnd as u64);

    assert_eq!(policy.congestion(&input, Verdict::Loss), 56 * MSS);
    assert_eq!(policy.congestion(&input, Verdict::Timeout), 60 * MSS);
    assert_eq!(policy.congestion(&input, Verdict::Benign), 72 * MSS);
}

#[test]
fn test_rule_policy_congestion_uses_flight_when_larger() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let mut input = policy_input(40 * MSS, 40 * MSS, 40 * MSS as u64);
    input.bytes_in_flight = 80 * MSS;
    assert_eq!(policy.congestion(&input, Verdict::Loss), 56 * MSS);
}

#[test]
fn test_rule_policy_congestion_ssthresh_floor() {
    let mut policy = RulePolicy::new(WindowConfig::default(), RetentionConfig::default());
    let mut input = policy_input(2 * MSS, 2 * MSS, 2 * MSS as u64);
    input.bytes_in_flight = 0;
    assert_eq!(policy.congestion(&input, Verdict::Loss), 2 * MSS);
}

#[test]
fn test_external_policy_applies_pending_decision() {
    let mut policy = ExternalPolicy::new();
    let input = policy_input(10 * MSS, 20 * MSS, 10 * MSS as u64);

    // Nothing pending: the window holds.
    assert_eq!(policy.increase(&input), 10 * MSS);
    assert_eq!(policy.congestion(&input, Verdict::Loss), 20 * MSS);

    policy.submit(WindowDecision {
        cwnd: 42 * MSS,
        ssthresh: 21 * MSS,
    });
    assert_eq!(policy.increase(&input), 42 * MSS);
    // The decision is consumed.
    assert_eq!(policy.increase(&input), 10 * MSS);
}

#[test]
fn test_controller_tolerates_missing_tcb() {
    let now = Instant::now();
    let mut lark = Lark::default();
    let alpha_before = lark.alpha();

    assert_eq!(lark.get_ssthresh(None, 80 * MSS, now), 40 * MSS);
    lark.increase_window(None, 4, now);
    lark.pkts_acked(None, 4, Duration::from_micros(100), now);
    lark.congestion_state_set(None, CaState::Loss, now);
    lark.cwnd_event(None, crate::transport::CaEvent::EcnIsCe, now);

    assert_f64_eq(lark.alpha(), alpha_before);
    assert_eq!(lark.metrics().total_bytes_acked(), 0);
    assert_eq!(lark.metrics().ecn_total(), 0);
}

#[test]
fn test_fork_inherits_alpha_and_resets_metrics() {
    let now = Instant::now();
    let mut lark = Lark::default();
    let mut tcb = test_tcb();

    lark.pkts_acked(
        Some(&tcb),
        4,
        Duration::from_micros(150),
        now,
    );
    tcb.min_rtt = Some(Duration::from_micros(100));
    lark.pkts_acked(
        Some(&tcb),
        4,
        Duration::from_micros(120),
        now + Duration::from_micros(150),
    );
    lark.increase_window(Some(&mut tcb), 4, now + Duration::from_micros(300));
    assert!(lark.alpha() != 1.25);
    assert!(lark.metrics().total_bytes_acked() > 0);

    let forked = lark.fork();
    assert_f64_eq(forked.alpha(), lark.alpha());
    assert_ne!(forked.uuid(), lark.uuid());
    assert_eq!(forked.metrics().total_bytes_acked(), 0);
    assert_eq!(forked.metrics().consecutive_growth(), 0);
}

#[test]
fn test_state_set_is_idempotent() {
    let now = Instant::now();
    let mut lark = Lark::default();
    let tcb = test_tcb();

    lark.congestion_state_set(Some(&tcb), CaState::Open, now);
    let stats = lark.stats();
    lark.congestion_state_set(Some(&tcb), CaState::Open, now);
    let again = lark.stats();

    assert_f64_eq(stats.alpha, again.alpha);
    assert_eq!(stats.consecutive_growth, again.consecutive_growth);
    assert_eq!(stats.total_bytes_acked, again.total_bytes_acked);
    assert_eq!(stats.ecn_marks, again.ecn_marks);
}

#[test]
fn test_externally_driven_controller() {
    let now = Instant::now();
    let mut lark = Lark::with_policy(Config::default(), ExternalPolicy::new())
        .expect("default config validates");
    let mut tcb = test_tcb();

    // No decision staged: the window holds through a growth opportunity.
    lark.increase_window(Some(&mut tcb), 1, now);
    assert_eq!(tcb.cwnd, 10 * MSS);

    lark.policy_mut().submit(WindowDecision {
        cwnd: 30 * MSS,
        ssthresh: 15 * MSS,
    });
    lark.increase_window(Some(&mut tcb), 1, now);
    assert_eq!(tcb.cwnd, 30 * MSS);

    lark.policy_mut().submit(WindowDecision {
        cwnd: 30 * MSS,
        ssthresh: 15 * MSS,
    });
    tcb.ca_state = CaState::Recovery;
    let ssthresh = lark.get_ssthresh(Some(&mut tcb), 30 * MSS, now);
    assert_eq!(ssthresh, 15 * MSS);
    assert_eq!(tcb.cwnd, 15 * MSS);
}

#[test]
fn test_stats_snapshot_renders() {
    let lark = Lark::default();
    let rendered = lark.stats().to_string();
    assert!(rendered.starts_with("Lark[uuid:"));
    assert!(rendered.contains("alpha:1.250"));
}

#[test]
fn test_config_validation() {
    let mut config = Config::default();
    config.alpha.min = 2.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retention.loss = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.ecn.window = Duration::ZERO;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.window.min_cwnd_segments = 0;
    assert!(config.validate().is_err());

    assert!(Config::default().validate().is_ok());
    assert!(Lark::new(Config::default()).is_ok());
}
