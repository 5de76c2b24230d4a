//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.
//!
//! The controller itself never surfaces errors to the host transport: a
//! malformed callback is logged and ignored. Errors exist only for
//! configuration validation at setup time.
//!
//! 控制器本身从不向宿主传输层抛出错误：畸形的回调会被记录并忽略。
//! 错误仅在初始化阶段的配置校验中产生。

use thiserror::Error;

/// The primary error type for the congestion control library.
/// 拥塞控制库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// The alpha band is inverted or otherwise unusable.
    /// alpha 区间颠倒或不可用。
    #[error("invalid alpha bounds: min={min}, initial={initial}, max={max}")]
    InvalidAlphaBounds { min: f64, initial: f64, max: f64 },

    /// A retention factor must preserve a positive fraction of the window.
    /// 保留因子必须保留窗口的一个正的比例。
    #[error("retention factor `{name}` must be within (0, 1], got {value}")]
    InvalidRetention { name: &'static str, value: f64 },

    /// The ECN observation window cannot be empty.
    /// ECN 观察窗口不能为空。
    #[error("ECN observation window must be positive")]
    ZeroEcnWindow,

    /// The congestion window floor must cover at least one segment.
    /// 拥塞窗口下限必须至少覆盖一个报文段。
    #[error("minimum congestion window must be at least one segment")]
    ZeroCwndFloor,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
