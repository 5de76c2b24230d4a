//! 宿主传输层契约：传输控制块及其状态机枚举。
//! The host transport contract: the transport control block and its state
//! machine enums.
//!
//! The host owns segmentation, retransmission, timers and ACK processing.
//! The controller only reads this record and, on the paths that permit it,
//! writes back a new congestion window.
//!
//! 宿主负责分段、重传、定时器与ACK处理。控制器只读取此记录，
//! 并在允许的路径上写回新的拥塞窗口。

use std::time::Duration;

/// The coarse congestion state machine maintained by the host.
/// 宿主维护的粗粒度拥塞状态机。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaState {
    /// Normal operation, no congestion observed.
    /// 正常运行，未观察到拥塞。
    Open,
    /// Duplicate ACKs received; potential reordering.
    /// 收到重复ACK；可能发生乱序。
    Disorder,
    /// Congestion window reduced, typically in response to ECN.
    /// 拥塞窗口已缩减，通常是对ECN的响应。
    Cwr,
    /// Fast recovery after triple duplicate ACK.
    /// 三次重复ACK后的快速恢复。
    Recovery,
    /// Timeout-based loss recovery.
    /// 基于超时的丢包恢复。
    Loss,
}

impl CaState {
    /// The numeric code used on the observation wire.
    /// 观测序列化使用的数值编码。
    pub const fn code(self) -> u64 {
        match self {
            CaState::Open => 0,
            CaState::Disorder => 1,
            CaState::Cwr => 2,
            CaState::Recovery => 3,
            CaState::Loss => 4,
        }
    }
}

/// Events surfaced by the host's congestion machinery.
/// 宿主拥塞机制上报的事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaEvent {
    /// First transmission on the connection.
    /// 连接上的首次发送。
    TxStart,
    /// Congestion window restart after idle.
    /// 空闲后的拥塞窗口重启。
    CwndRestart,
    /// The CWR phase has completed.
    /// CWR阶段已完成。
    CompleteCwr,
    /// Packet loss detected.
    /// 检测到丢包。
    Loss,
    /// An ECN-capable packet arrived without a CE mark.
    /// 收到未带CE标记的ECN包。
    EcnNoCe,
    /// An ECN-capable packet arrived carrying a CE mark.
    /// 收到带CE标记的ECN包。
    EcnIsCe,
    /// A delayed ACK was received.
    /// 收到延迟ACK。
    DelayedAck,
    /// A non-delayed ACK was received.
    /// 收到非延迟ACK。
    NonDelayedAck,
}

impl CaEvent {
    /// The numeric code used on the observation wire.
    /// 观测序列化使用的数值编码。
    pub const fn code(self) -> u64 {
        match self {
            CaEvent::TxStart => 0,
            CaEvent::CwndRestart => 1,
            CaEvent::CompleteCwr => 2,
            CaEvent::Loss => 3,
            CaEvent::EcnNoCe => 4,
            CaEvent::EcnIsCe => 5,
            CaEvent::DelayedAck => 6,
            CaEvent::NonDelayedAck => 7,
        }
    }
}

/// The ECN sub-state machine maintained by the host.
/// 宿主维护的ECN子状态机。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcnState {
    /// ECN functionality disabled.
    /// ECN功能已禁用。
    Disabled,
    /// ECN enabled, no congestion signals.
    /// ECN已启用，无拥塞信号。
    Idle,
    /// A Congestion Experienced codepoint was received.
    /// 收到CE（拥塞经历）码点。
    CeRcvd,
    /// Sending ECN-Echo to notify the peer.
    /// 正在发送ECN-Echo通知对端。
    SendingEce,
    /// An ECN-Echo was received from the peer.
    /// 收到对端的ECN-Echo。
    EceRcvd,
    /// The CWR flag was sent.
    /// 已发送CWR标志。
    CwrSent,
}

impl EcnState {
    /// The numeric code used on the observation wire.
    /// 观测序列化使用的数值编码。
    pub const fn code(self) -> u64 {
        match self {
            EcnState::Disabled => 0,
            EcnState::Idle => 1,
            EcnState::CeRcvd => 2,
            EcnState::SendingEce => 3,
            EcnState::EceRcvd => 4,
            EcnState::CwrSent => 5,
        }
    }

    /// Whether this state carries a live congestion mark.
    /// 此状态是否携带有效的拥塞标记。
    pub const fn is_marked(self) -> bool {
        matches!(self, EcnState::CeRcvd | EcnState::EceRcvd)
    }
}

/// The per-connection transport state exposed by the host. All sizes are in
/// bytes.
///
/// 宿主为每条连接暴露的传输状态。所有大小均以字节为单位。
#[derive(Debug, Clone)]
pub struct TcpControlBlock {
    /// Current congestion window.
    /// 当前拥塞窗口。
    pub cwnd: u32,
    /// Slow-start threshold.
    /// 慢启动阈值。
    pub ssthresh: u32,
    /// Maximum segment size chosen by the transport.
    /// 传输层选定的最大报文段大小。
    pub segment_size: u32,
    /// Bytes currently unacknowledged in the network.
    /// 当前在网络中未确认的字节数。
    pub bytes_in_flight: u32,
    /// The most recent RTT measurement. Zero until measured.
    /// 最近一次RTT测量值。测量前为零。
    pub last_rtt: Duration,
    /// Minimum RTT observed by the host. `None` until known.
    /// 宿主观察到的最小RTT。未知时为 `None`。
    pub min_rtt: Option<Duration>,
    /// Coarse congestion state.
    /// 粗粒度拥塞状态。
    pub ca_state: CaState,
    /// The most recent congestion event.
    /// 最近一次拥塞事件。
    pub ca_event: CaEvent,
    /// ECN sub-state.
    /// ECN子状态。
    pub ecn_state: EcnState,
}

impl TcpControlBlock {
    /// Creates a control block with a standard 10-segment initial window and
    /// an effectively unbounded slow-start threshold.
    ///
    /// 创建一个控制块，初始窗口为标准的10个报文段，慢启动阈值视为无界。
    pub fn new(segment_size: u32) -> Self {
        Self {
            cwnd: 10 * segment_size,
            ssthresh: u32::MAX,
            segment_size,
            bytes_in_flight: 0,
            last_rtt: Duration::ZERO,
            min_rtt: None,
            ca_state: CaState::Open,
            ca_event: CaEvent::TxStart,
            ecn_state: EcnState::Disabled,
        }
    }
}
