//! 定义了拥塞控制器的可配置参数。
//! Defines configurable parameters for the congestion controller.

use crate::error::{Error, Result};
use std::time::Duration;

/// A structure containing all configurable parameters for a controller.
/// Read once at instantiation; stable for the life of the connection.
///
/// 包含控制器所有可配置参数的结构体。实例化时读取一次，在连接生命周期内保持不变。
#[derive(Debug, Clone)]
pub struct Config {
    /// Adaptive multiplicative-factor parameters.
    /// 自适应乘性因子参数。
    pub alpha: AlphaConfig,

    /// ECN tracking and burst-detection parameters.
    /// ECN 跟踪与突发检测参数。
    pub ecn: EcnConfig,

    /// Window retention factors per congestion verdict.
    /// 按拥塞裁决划分的窗口保留因子。
    pub retention: RetentionConfig,

    /// Window floor and ceiling parameters.
    /// 窗口上下限参数。
    pub window: WindowConfig,
}

/// Adaptive multiplicative-factor parameters.
///
/// 自适应乘性因子参数。
#[derive(Debug, Clone)]
pub struct AlphaConfig {
    /// The starting multiplicative factor applied to the BDP target.
    /// 应用于BDP目标的初始乘性因子。
    pub initial: f64,
    /// The lower clamp for the multiplicative factor.
    /// 乘性因子的下限。
    pub min: f64,
    /// The upper clamp for the multiplicative factor.
    /// 乘性因子的上限。
    pub max: f64,
}

/// ECN tracking and burst-detection parameters.
///
/// ECN 跟踪与突发检测参数。
#[derive(Debug, Clone)]
pub struct EcnConfig {
    /// The sliding window over which CE marks are counted.
    /// 统计CE标记的滑动窗口。
    pub window: Duration,
    /// The number of CE marks within the window that constitutes a burst.
    /// 窗口内构成突发的CE标记数量。
    pub burst_threshold: usize,
    /// The CE rate (marks per second) above which the multiplicative factor
    /// takes an additional penalty.
    /// 高于此速率（每秒标记数）时，乘性因子会受到额外惩罚。
    pub rate_high: f64,
}

/// Window retention factors per congestion verdict. Each factor is the
/// fraction of the pre-congestion window that survives the event.
///
/// 按拥塞裁决划分的窗口保留因子。每个因子是拥塞事件后保留的窗口比例。
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Retention on explicit packet loss.
    /// 显式丢包时的保留比例。
    pub loss: f64,
    /// Retention on a sustained ECN burst. Deliberately mild: ECN is an
    /// early warning, not a failure.
    /// 持续ECN突发时的保留比例。刻意温和：ECN是预警而非故障。
    pub ecn: f64,
    /// Retention on timeout-driven loss recovery.
    /// 超时恢复时的保留比例。
    pub timeout: f64,
    /// Retention when the congestion path is taken without a matching
    /// verdict.
    /// 拥塞路径在没有匹配裁决时使用的保留比例。
    pub fallback: f64,
}

/// Window floor and ceiling parameters.
///
/// 窗口上下限参数。
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// The congestion window floor, in segments.
    /// 拥塞窗口下限（以报文段为单位）。
    pub min_cwnd_segments: u32,
    /// The congestion window ceiling when the BDP estimate is unknown or
    /// small, in segments.
    /// BDP估计未知或偏小时的拥塞窗口上限（以报文段为单位）。
    pub cwnd_cap_segments: u32,
}

impl Config {
    /// Checks that the configuration is internally consistent.
    ///
    /// 检查配置是否自洽。
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha.min > 0.0
            && self.alpha.min <= self.alpha.initial
            && self.alpha.initial <= self.alpha.max)
        {
            return Err(Error::InvalidAlphaBounds {
                min: self.alpha.min,
                initial: self.alpha.initial,
                max: self.alpha.max,
            });
        }

        for (name, value) in [
            ("loss", self.retention.loss),
            ("ecn", self.retention.ecn),
            ("timeout", self.retention.timeout),
            ("fallback", self.retention.fallback),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::InvalidRetention { name, value });
            }
        }

        if self.ecn.window.is_zero() {
            return Err(Error::ZeroEcnWindow);
        }

        if self.window.min_cwnd_segments == 0 {
            return Err(Error::ZeroCwndFloor);
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: AlphaConfig::default(),
            ecn: EcnConfig::default(),
            retention: RetentionConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for AlphaConfig {
    fn default() -> Self {
        Self {
            initial: 1.25,
            min: 1.10,
            max: 1.50,
        }
    }
}

impl Default for EcnConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            burst_threshold: 30,
            rate_high: 50.0,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            loss: 0.70,
            ecn: 0.92,
            timeout: 0.75,
            fallback: 0.90,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_cwnd_segments: 4,
            cwnd_cap_segments: 100,
        }
    }
}
