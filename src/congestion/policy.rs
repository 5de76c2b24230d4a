//! 窗口策略 - 产生新的拥塞窗口与慢启动阈值
//! Window policy - produces the new congestion window and slow-start
//! threshold
//!
//! The rule-based policy is the deployed controller. The external policy is
//! the seam through which a training harness can drive the window instead;
//! it ships no agent transport.
//!
//! 基于规则的策略是实际部署的控制器。外部策略是训练框架接管窗口的接缝；
//! 不包含任何代理传输。

use crate::config::{RetentionConfig, WindowConfig};
use crate::congestion::fusion::Verdict;
use std::time::Duration;
use tracing::{debug, trace};

/// Slow-start aims this many BDPs ahead of the estimate.
const SLOW_START_BDP_TARGET: u64 = 3;
/// Per-ACK slow-start growth, in segments per segment acked.
const SLOW_START_FACTOR: u64 = 2;
/// Slow-start growth once a growth streak is established.
const SLOW_START_FACTOR_STREAK: u64 = 3;
/// Streak length that unlocks the faster slow-start factor.
const SLOW_START_STREAK: u32 = 3;
/// The window ceiling, in BDPs, once the estimate is known.
const CWND_CAP_BDP: u64 = 8;
/// Floor on the returned slow-start threshold, in segments.
const MIN_SSTHRESH_SEGMENTS: u64 = 2;

/// Inputs to one window decision, assembled by the dispatcher. Sizes in
/// bytes.
///
/// 单次窗口决策的输入，由调度器装配。大小以字节为单位。
#[derive(Debug, Clone)]
pub struct PolicyInput {
    pub cwnd: u32,
    pub ssthresh: u32,
    pub segment_size: u32,
    pub segments_acked: u32,
    pub bytes_in_flight: u32,
    /// Bandwidth-delay-product estimate; `cwnd` when no RTT is known.
    /// 带宽时延积估计；RTT未知时为 `cwnd`。
    pub bdp: u64,
    pub alpha: f64,
    pub consecutive_growth: u32,
}

/// A window decision supplied by an external agent.
/// 外部代理提供的窗口决策。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub cwnd: u32,
    pub ssthresh: u32,
}

/// The strategy seam between the dispatcher and the window math.
///
/// 调度器与窗口计算之间的策略接缝。
pub trait WindowPolicy: Send + Sync + 'static {
    /// The new congestion window for an increase opportunity.
    ///
    /// 增长机会上的新拥塞窗口。
    fn increase(&mut self, input: &PolicyInput) -> u32;

    /// The new slow-start threshold for a congestion event.
    ///
    /// 拥塞事件上的新慢启动阈值。
    fn congestion(&mut self, input: &PolicyInput, verdict: Verdict) -> u32;
}

/// Estimates the bandwidth-delay product in bytes.
///
/// The delivery rate is the larger of the peak observed throughput and the
/// rate implied by draining the current window in one RTT. With no RTT
/// measured at all, the estimate degrades to the current window.
///
/// 以字节估计带宽时延积。
///
/// 交付速率取观测峰值吞吐与"当前窗口在一个RTT内排空"所隐含速率中的较大者。
/// 完全没有RTT测量时，估计退化为当前窗口。
pub fn estimate_bdp(cwnd: u32, peak_throughput: f64, min_rtt: Duration, last_rtt: Duration) -> u64 {
    let min_rtt_effective = if !min_rtt.is_zero() { min_rtt } else { last_rtt };
    if min_rtt_effective.is_zero() {
        return cwnd as u64;
    }
    let drain_rtt = min_rtt.max(last_rtt);
    let rate = (cwnd as f64 / drain_rtt.as_secs_f64()).max(peak_throughput);
    (rate * min_rtt_effective.as_secs_f64()).round() as u64
}

/// The rule-based window policy.
///
/// 基于规则的窗口策略。
#[derive(Debug, Clone)]
pub struct RulePolicy {
    window: WindowConfig,
    retention: RetentionConfig,
}

impl RulePolicy {
    pub fn new(window: WindowConfig, retention: RetentionConfig) -> Self {
        Self { window, retention }
    }

    // The authoritative output bound: floor of `min_cwnd_segments`, ceiling
    // of the larger of `CWND_CAP_BDP` BDPs and `cwnd_cap_segments`. The
    // floor wins if a configuration puts them in conflict.
    fn clamp_cwnd(&self, cwnd: u64, bdp: u64, segment_size: u32) -> u32 {
        let mss = segment_size as u64;
        let floor = self.window.min_cwnd_segments as u64 * mss;
        let cap = (CWND_CAP_BDP.saturating_mul(bdp)).max(self.window.cwnd_cap_segments as u64 * mss);
        cwnd.min(cap).max(floor).min(u32::MAX as u64) as u32
    }
}

impl WindowPolicy for RulePolicy {
    fn increase(&mut self, input: &PolicyInput) -> u32 {
        let mss = input.segment_size as u64;
        let cwnd = input.cwnd as u64;

        let target = if input.cwnd < input.ssthresh {
            // Slow start: exponential growth toward a multiple of the
            // estimated pipe size.
            let ceiling = SLOW_START_BDP_TARGET.saturating_mul(input.bdp);
            let factor = if input.consecutive_growth >= SLOW_START_STREAK {
                SLOW_START_FACTOR_STREAK
            } else {
                SLOW_START_FACTOR
            };
            let grown =
                cwnd.saturating_add(factor * input.segments_acked as u64 * mss);
            let next = grown.min(ceiling);
            trace!(
                cwnd = input.cwnd,
                next,
                ceiling,
                "slow start: window grown"
            );
            next
        } else {
            // Congestion avoidance: the rate-based target and the current
            // window race each other, plus a linear component.
            let gamma = input.segments_acked.max(1) as u64;
            let rate_target = (input.alpha * input.bdp as f64) as u64;
            let next = rate_target.max(cwnd).saturating_add(gamma * mss);
            trace!(
                cwnd = input.cwnd,
                next,
                rate_target,
                bdp = input.bdp,
                "congestion avoidance: window grown"
            );
            next
        };

        self.clamp_cwnd(target, input.bdp, input.segment_size)
    }

    fn congestion(&mut self, input: &PolicyInput, verdict: Verdict) -> u32 {
        let mss = input.segment_size as u64;
        let base = input.cwnd.max(input.bytes_in_flight) as u64;
        let lambda = verdict.retention(&self.retention);
        let floor = MIN_SSTHRESH_SEGMENTS * mss;
        // Retention factors carry two decimals; scaled integer math keeps
        // the floored product exact.
        let scaled = (lambda * 100.0).round() as u64;
        let new_ssthresh = (base.saturating_mul(scaled) / 100)
            .max(floor)
            .min(u32::MAX as u64) as u32;

        debug!(
            ?verdict,
            severity = verdict.severity(),
            cwnd = input.cwnd,
            bytes_in_flight = input.bytes_in_flight,
            new_ssthresh,
            retention = lambda,
            "congestion response"
        );
        new_ssthresh
    }
}

/// A policy that applies externally-supplied decisions. While no decision is
/// pending it holds the window at its current values.
///
/// 应用外部决策的策略。无待处理决策时维持窗口当前值。
#[derive(Debug, Clone, Default)]
pub struct ExternalPolicy {
    pending: Option<WindowDecision>,
}

impl ExternalPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a decision for the next decision point.
    ///
    /// 为下一个决策点暂存一个决策。
    pub fn submit(&mut self, decision: WindowDecision) {
        self.pending = Some(decision);
    }
}

impl WindowPolicy for ExternalPolicy {
    fn increase(&mut self, input: &PolicyInput) -> u32 {
        match self.pending.take() {
            Some(decision) => decision.cwnd,
            None => input.cwnd,
        }
    }

    fn congestion(&mut self, input: &PolicyInput, _verdict: Verdict) -> u32 {
        match self.pending.take() {
            Some(decision) => decision.ssthresh,
            None => input.ssthresh,
        }
    }
}
