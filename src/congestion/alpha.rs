//! 自适应乘性因子控制器
//! The adaptive multiplicative-factor controller
//!
//! The factor tracks how far beyond the BDP estimate the window may probe.
//! Adjustments are additive and then clamped to the configured band.
//!
//! 该因子决定窗口可以探测到BDP估计之外多远。调整以加性方式累积，
//! 然后钳制到配置的区间内。

use crate::config::{AlphaConfig, EcnConfig};
use crate::congestion::metrics::FlowMetrics;
use crate::transport::CaState;
use tokio::time::Instant;
use tracing::trace;

/// RTT inflation ratio below which the path shows headroom.
const RHO_LOW: f64 = 1.5;
/// RTT inflation ratio at which queuing delay dominates.
const RHO_HIGH: f64 = 3.0;

const DELTA_RTT_HEADROOM: f64 = 0.02;
const DELTA_RTT_INFLATED: f64 = -0.05;
const DELTA_CE_RECENT: f64 = -0.03;
const DELTA_CE_RATE_HIGH: f64 = -0.05;
const DELTA_STATE_LOSS: f64 = -0.10;
const DELTA_STATE_RECOVERY: f64 = -0.03;
const DELTA_STATE_OPEN: f64 = 0.01;
const DELTA_GROWTH_STREAK: f64 = 0.02;

/// Streak length that earns the first growth bonus.
const GROWTH_STREAK: u32 = 3;
/// Streak length that earns the second growth bonus.
const GROWTH_STREAK_LONG: u32 = 6;

/// Recomputes the multiplicative factor for one increase opportunity.
///
/// RTT terms are skipped while either RTT is unmeasured (defensive default,
/// not an error).
///
/// 为一次增长机会重新计算乘性因子。
///
/// 任一RTT未测量时跳过RTT项（防御性默认值，而非错误）。
pub fn adapt(
    alpha: f64,
    cfg: &AlphaConfig,
    ecn: &EcnConfig,
    ca_state: CaState,
    metrics: &mut FlowMetrics,
    now: Instant,
) -> f64 {
    let mut delta = 0.0;

    let last_rtt = metrics.last_rtt();
    let min_rtt = metrics.min_rtt();
    if !min_rtt.is_zero() && !last_rtt.is_zero() {
        let rho = last_rtt.as_secs_f64() / min_rtt.as_secs_f64();
        if rho < RHO_LOW {
            delta += DELTA_RTT_HEADROOM;
        } else if rho >= RHO_HIGH {
            delta += DELTA_RTT_INFLATED;
        }
    }

    if metrics.ce_count_in_window(now) > 0 {
        delta += DELTA_CE_RECENT;
    }
    if metrics.ce_rate(now) > ecn.rate_high {
        delta += DELTA_CE_RATE_HIGH;
    }

    match ca_state {
        CaState::Loss => delta += DELTA_STATE_LOSS,
        CaState::Recovery => delta += DELTA_STATE_RECOVERY,
        CaState::Open => delta += DELTA_STATE_OPEN,
        CaState::Disorder | CaState::Cwr => {}
    }

    let streak = metrics.consecutive_growth();
    if streak >= GROWTH_STREAK {
        delta += DELTA_GROWTH_STREAK;
    }
    if streak >= GROWTH_STREAK_LONG {
        delta += DELTA_GROWTH_STREAK;
    }

    let adapted = (alpha + delta).clamp(cfg.min, cfg.max);
    if adapted != alpha {
        trace!(
            old = alpha,
            new = adapted,
            growth_streak = streak,
            "multiplicative factor adjusted"
        );
    }
    adapted
}
