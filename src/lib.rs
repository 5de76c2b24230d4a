#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the fused-signal TCP congestion control library.
//! 融合信号TCP拥塞控制库的根。
//!
//! Lark is a sender-side congestion controller driven synchronously by host
//! transport callbacks. It fuses packet loss, ECN marks, RTT inflation and
//! the host's coarse congestion state into a single verdict, and answers two
//! questions per connection: how large the congestion window may grow on an
//! increase opportunity, and how much of it survives a congestion event.
//!
//! Lark 是一个由宿主传输层回调同步驱动的发送端拥塞控制器。它将丢包、ECN标记、
//! RTT膨胀与宿主的粗粒度拥塞状态融合为单一裁决，并为每条连接回答两个问题：
//! 增长机会上拥塞窗口可以长到多大，以及拥塞事件后窗口保留多少。

pub mod config;
pub mod error;
pub mod observation;
pub mod transport;

pub mod congestion;
