//! 融合检测器 - 将丢包、ECN、超时与宿主状态合并为单一裁决
//! Fusion detector - folds loss, ECN, timeout and host state into a single
//! verdict
//!
//! The detector is throughput-first: only sustained, unambiguous signals
//! produce a congestion verdict. A lone CE mark, an ECN echo below the burst
//! threshold, transient CWR or Recovery states, and RTT inflation on its own
//! are all absorbed.
//!
//! 检测器以吞吐优先：只有持续且明确的信号才产生拥塞裁决。孤立的CE标记、
//! 低于突发阈值的ECN回显、短暂的CWR或Recovery状态以及单独的RTT膨胀都被吸收。

use crate::config::{EcnConfig, RetentionConfig};
use crate::congestion::metrics::FlowMetrics;
use crate::observation::CallingContext;
use crate::transport::{CaState, TcpControlBlock};
use tokio::time::Instant;
use tracing::debug;

/// The congestion classification of one decision point.
/// 单个决策点的拥塞分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No actionable congestion signal.
    /// 无可执行的拥塞信号。
    Benign,
    /// Explicit packet loss.
    /// 显式丢包。
    Loss,
    /// A sustained burst of CE marks.
    /// 持续的CE标记突发。
    EcnBurst,
    /// Timeout-driven loss recovery.
    /// 超时驱动的丢包恢复。
    Timeout,
}

impl Verdict {
    /// Whether the verdict calls for a congestion response.
    /// 该裁决是否要求拥塞响应。
    pub fn is_congestion(self) -> bool {
        !matches!(self, Verdict::Benign)
    }

    /// Relative severity of the signal, for diagnostics.
    /// 信号的相对严重度，用于诊断。
    pub fn severity(self) -> f64 {
        match self {
            Verdict::Benign => 0.0,
            Verdict::Loss => 0.7,
            Verdict::EcnBurst => 0.3,
            Verdict::Timeout => 0.6,
        }
    }

    /// The window retention factor this verdict selects.
    /// 该裁决选定的窗口保留因子。
    pub fn retention(self, cfg: &RetentionConfig) -> f64 {
        match self {
            Verdict::Loss => cfg.loss,
            Verdict::EcnBurst => cfg.ecn,
            Verdict::Timeout => cfg.timeout,
            Verdict::Benign => cfg.fallback,
        }
    }
}

/// Classifies one decision point. Rules are priority-ordered; the first
/// match wins.
///
/// An explicit-loss verdict requires that the loss not be attributable to a
/// live ECN mark (that path falls through to burst detection) nor to a
/// timeout (the Loss state owns that signal).
///
/// 对单个决策点进行分类。规则按优先级排列，先匹配者胜出。
///
/// 显式丢包裁决要求丢包既不能归因于有效的ECN标记（该路径落入突发检测），
/// 也不能归因于超时（Loss状态独占该信号）。
pub fn classify(
    context: CallingContext,
    tcb: &TcpControlBlock,
    metrics: &mut FlowMetrics,
    ecn: &EcnConfig,
    now: Instant,
) -> Verdict {
    let ecn_marked = tcb.ecn_state.is_marked() || metrics.ecn_recent();

    if context == CallingContext::LossSsThresh && !ecn_marked && tcb.ca_state != CaState::Loss {
        debug!(
            cwnd = tcb.cwnd,
            lifetime_losses = metrics.loss_total() + 1,
            "explicit packet loss detected"
        );
        return Verdict::Loss;
    }

    let ce_marks = metrics.ce_count_in_window(now);
    if ce_marks >= ecn.burst_threshold {
        debug!(
            window_marks = ce_marks,
            threshold = ecn.burst_threshold,
            "sustained CE burst detected"
        );
        return Verdict::EcnBurst;
    }

    if tcb.ca_state == CaState::Loss {
        debug!("timeout recovery state detected");
        return Verdict::Timeout;
    }

    Verdict::Benign
}
