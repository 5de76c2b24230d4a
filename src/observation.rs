//! 每个决策点采样的15字段观测记录。
//! The 15-field observation record sampled at every decision point.
//!
//! Internally the observation is a typed record; the flat `u64` rendering
//! only exists at the wire boundary, where an external training or
//! monitoring channel consumes it.
//!
//! 观测在内部是带类型的记录；扁平的 `u64` 形式只存在于线缆边界，
//! 由外部训练或监控通道消费。

use crate::transport::{CaEvent, CaState, EcnState};
use bytes::BufMut;

/// Number of fields in the observation vector.
/// 观测向量的字段数。
pub const OBSERVATION_LEN: usize = 15;

/// Encoded size of one observation on the wire, in bytes.
/// 单条观测在线缆上的编码大小（字节）。
pub const OBSERVATION_ENCODED_SIZE: usize = OBSERVATION_LEN * 8;

/// Which dispatcher entry point produced the observation.
/// 产生该观测的调度入口。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingContext {
    /// The congestion-event path: a new slow-start threshold was requested.
    /// 拥塞事件路径：请求新的慢启动阈值。
    LossSsThresh,
    /// The increase path: a window-growth opportunity.
    /// 增长路径：窗口增长机会。
    Increase,
}

impl CallingContext {
    /// The numeric code used on the observation wire.
    /// 观测序列化使用的数值编码。
    pub const fn code(self) -> u64 {
        match self {
            CallingContext::LossSsThresh => 0,
            CallingContext::Increase => 1,
        }
    }
}

/// A snapshot of connection state at one decision point.
///
/// 某个决策点上连接状态的快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Controller identifier, unique within the process.
    /// 进程内唯一的控制器标识。
    pub uuid: u64,
    /// Environment kind; always 0 (event-driven).
    /// 环境类型；恒为0（事件驱动）。
    pub env_kind: u64,
    /// Microseconds since the controller observed its first callback.
    /// 自控制器观察到首个回调以来的微秒数。
    pub sim_time_us: u64,
    /// Identifier of the hosting node, for diagnostics.
    /// 宿主节点标识，用于诊断。
    pub node_id: u64,
    /// Slow-start threshold, bytes.
    /// 慢启动阈值（字节）。
    pub ssthresh: u64,
    /// Congestion window, bytes.
    /// 拥塞窗口（字节）。
    pub cwnd: u64,
    /// Maximum segment size, bytes.
    /// 最大报文段大小（字节）。
    pub segment_size: u64,
    /// Segments acknowledged by the triggering event.
    /// 触发事件确认的报文段数。
    pub segments_acked: u64,
    /// Bytes currently in flight.
    /// 当前在途字节数。
    pub bytes_in_flight: u64,
    /// Most recent RTT sample, microseconds. Zero until measured.
    /// 最近一次RTT采样（微秒）。测量前为零。
    pub last_rtt_us: u64,
    /// Minimum observed RTT, microseconds. Zero while unknown.
    /// 观察到的最小RTT（微秒）。未知时为零。
    pub min_rtt_us: u64,
    /// The dispatcher entry point that produced this snapshot.
    /// 产生此快照的调度入口。
    pub calling_context: CallingContext,
    /// Host congestion state.
    /// 宿主拥塞状态。
    pub ca_state: CaState,
    /// Most recent host congestion event.
    /// 宿主最近一次拥塞事件。
    pub ca_event: CaEvent,
    /// Host ECN sub-state.
    /// 宿主ECN子状态。
    pub ecn_state: EcnState,
}

impl Observation {
    /// Flattens the record into wire field order.
    ///
    /// 将记录展平为线缆字段顺序。
    pub fn to_vector(&self) -> [u64; OBSERVATION_LEN] {
        [
            self.uuid,
            self.env_kind,
            self.sim_time_us,
            self.node_id,
            self.ssthresh,
            self.cwnd,
            self.segment_size,
            self.segments_acked,
            self.bytes_in_flight,
            self.last_rtt_us,
            self.min_rtt_us,
            self.calling_context.code(),
            self.ca_state.code(),
            self.ca_event.code(),
            self.ecn_state.code(),
        ]
    }

    /// 将观测编码到缓冲区。
    /// Encodes the observation into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        for value in self.to_vector() {
            buf.put_u64(value);
        }
    }
}
