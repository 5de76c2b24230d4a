//! Lark拥塞控制器 - 状态持有与回调调度
//! The Lark congestion controller - state ownership and callback dispatch
//!
//! 职责：
//! - 每连接状态的唯一所有权
//! - 回调到各子模块的调度
//! - 决策点观测的装配与导出
//! - 连接克隆（fork）语义

use crate::config::Config;
use crate::congestion::alpha;
use crate::congestion::fusion;
use crate::congestion::metrics::FlowMetrics;
use crate::congestion::policy::{estimate_bdp, PolicyInput, RulePolicy, WindowPolicy};
use crate::congestion::CongestionOps;
use crate::error::Result;
use crate::observation::{CallingContext, Observation};
use crate::transport::{CaEvent, CaState, TcpControlBlock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

// The sole cross-connection shared mutation in the crate.
static NEXT_UUID: AtomicU64 = AtomicU64::new(1);

fn next_uuid() -> u64 {
    NEXT_UUID.fetch_add(1, Ordering::Relaxed)
}

/// A per-connection congestion controller. The host transport holds the
/// sole reference; one instance is owned by exactly one thread at a time.
///
/// 每连接的拥塞控制器。宿主传输层持有唯一引用；每个实例同一时刻恰好被
/// 一个线程拥有。
#[derive(Debug)]
pub struct Lark<P: WindowPolicy = RulePolicy> {
    /// Process-unique identifier, minted at construction.
    /// 进程内唯一标识，构造时铸造。
    uuid: u64,
    /// Identifier of the hosting node, for diagnostics.
    /// 宿主节点标识，用于诊断。
    node_id: u64,
    /// Configuration, read once and stable for the connection lifetime.
    /// 配置，读取一次并在连接生命周期内保持不变。
    config: Config,
    /// Current multiplicative factor.
    /// 当前乘性因子。
    alpha: f64,
    /// The window strategy in effect.
    /// 生效中的窗口策略。
    policy: P,
    /// Per-flow metrics.
    /// 每流度量。
    metrics: FlowMetrics,
    /// The entry point currently being serviced, for observation tagging.
    /// 当前服务的入口，用于观测标注。
    calling_context: CallingContext,
    /// Time of the first callback; the observation clock zero.
    /// 首个回调的时间；观测时钟的零点。
    started_at: Option<Instant>,
    /// Segments acknowledged by the most recent callback.
    /// 最近一次回调确认的报文段数。
    segments_acked: u32,
    /// In-flight bytes reported by the most recent callback.
    /// 最近一次回调报告的在途字节数。
    bytes_in_flight: u32,
    /// Optional export channel for decision-point observations.
    /// 决策点观测的可选导出通道。
    obs_sink: Option<mpsc::UnboundedSender<Observation>>,
}

impl Lark<RulePolicy> {
    /// Creates a rule-driven controller.
    ///
    /// 创建一个规则驱动的控制器。
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let policy = RulePolicy::new(config.window.clone(), config.retention.clone());
        Ok(Self::from_parts(config, policy))
    }
}

impl<P: WindowPolicy> Lark<P> {
    /// Creates a controller with an explicit window strategy.
    ///
    /// 使用显式窗口策略创建控制器。
    pub fn with_policy(config: Config, policy: P) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, policy))
    }

    fn from_parts(config: Config, policy: P) -> Self {
        let uuid = next_uuid();
        let alpha = config.alpha.initial;
        let metrics = FlowMetrics::new(&config.ecn);
        debug!(uuid, alpha, "congestion controller created");
        Self {
            uuid,
            node_id: 0,
            config,
            alpha,
            policy,
            metrics,
            calling_context: CallingContext::Increase,
            started_at: None,
            segments_acked: 0,
            bytes_in_flight: 0,
            obs_sink: None,
        }
    }

    /// Records the hosting node for diagnostics.
    ///
    /// 记录宿主节点，用于诊断。
    pub fn set_node_id(&mut self, node_id: u64) {
        self.node_id = node_id;
    }

    /// Connects an observation export channel. Every decision point emits a
    /// snapshot until the receiver goes away.
    ///
    /// 连接观测导出通道。每个决策点都会发出快照，直到接收端消失。
    pub fn set_observation_sink(&mut self, sink: mpsc::UnboundedSender<Observation>) {
        self.obs_sink = Some(sink);
    }

    pub fn uuid(&self) -> u64 {
        self.uuid
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn metrics(&self) -> &FlowMetrics {
        &self.metrics
    }

    /// The window strategy, for callers that feed it between decision
    /// points (an agent bridge staging external decisions).
    ///
    /// 窗口策略的可变引用，供在决策点之间喂入数据的调用方使用
    /// （如暂存外部决策的代理桥）。
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Snapshots the controller for logging and assertions.
    ///
    /// 为日志与断言生成控制器快照。
    pub fn stats(&self) -> LarkStats {
        LarkStats {
            uuid: self.uuid,
            node_id: self.node_id,
            alpha: self.alpha,
            peak_throughput: self.metrics.peak_throughput(),
            last_rtt: self.metrics.last_rtt(),
            min_rtt: self.metrics.min_rtt(),
            consecutive_growth: self.metrics.consecutive_growth(),
            total_bytes_acked: self.metrics.total_bytes_acked(),
            ecn_marks: self.metrics.ecn_total(),
            losses: self.metrics.loss_total(),
        }
    }

    /// Assembles the observation record for the current decision point.
    ///
    /// 为当前决策点装配观测记录。
    pub fn observation(&self, tcb: &TcpControlBlock, now: Instant) -> Observation {
        Observation {
            uuid: self.uuid,
            env_kind: 0,
            sim_time_us: self
                .started_at
                .map(|start| now.duration_since(start).as_micros() as u64)
                .unwrap_or(0),
            node_id: self.node_id,
            ssthresh: tcb.ssthresh as u64,
            cwnd: tcb.cwnd as u64,
            segment_size: tcb.segment_size as u64,
            segments_acked: self.segments_acked as u64,
            bytes_in_flight: self.bytes_in_flight as u64,
            last_rtt_us: self.metrics.last_rtt().as_micros() as u64,
            min_rtt_us: tcb
                .min_rtt
                .map(|rtt| rtt.as_micros() as u64)
                .unwrap_or(0),
            calling_context: self.calling_context,
            ca_state: tcb.ca_state,
            ca_event: tcb.ca_event,
            ecn_state: tcb.ecn_state,
        }
    }

    fn touch(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    fn policy_input(&self, tcb: &TcpControlBlock, bytes_in_flight: u32) -> PolicyInput {
        let bdp = estimate_bdp(
            tcb.cwnd,
            self.metrics.peak_throughput(),
            self.metrics.min_rtt(),
            self.metrics.last_rtt(),
        );
        PolicyInput {
            cwnd: tcb.cwnd,
            ssthresh: tcb.ssthresh,
            segment_size: tcb.segment_size,
            segments_acked: self.segments_acked,
            bytes_in_flight,
            bdp,
            alpha: self.alpha,
            consecutive_growth: self.metrics.consecutive_growth(),
        }
    }

    fn emit_observation(&mut self, tcb: &TcpControlBlock, now: Instant) {
        let Some(sink) = &self.obs_sink else {
            return;
        };
        if sink.send(self.observation(tcb, now)).is_err() {
            debug!(uuid = self.uuid, "observation channel closed, detaching sink");
            self.obs_sink = None;
        }
    }
}

impl<P: WindowPolicy + Clone> Lark<P> {
    /// Creates an independent controller for a connection clone. Metrics
    /// start fresh and a new identity is minted; the multiplicative factor
    /// carries over because the clone shares the path conditions that
    /// shaped it.
    ///
    /// 为连接克隆创建独立控制器。度量重新开始并铸造新标识；
    /// 乘性因子被继承，因为克隆共享塑造它的路径条件。
    pub fn fork(&self) -> Self {
        let uuid = next_uuid();
        debug!(parent = self.uuid, uuid, alpha = self.alpha, "controller forked");
        Self {
            uuid,
            node_id: self.node_id,
            config: self.config.clone(),
            alpha: self.alpha,
            policy: self.policy.clone(),
            metrics: FlowMetrics::new(&self.config.ecn),
            calling_context: CallingContext::Increase,
            started_at: None,
            segments_acked: 0,
            bytes_in_flight: 0,
            obs_sink: None,
        }
    }
}

impl Default for Lark<RulePolicy> {
    fn default() -> Self {
        let config = Config::default();
        let policy = RulePolicy::new(config.window.clone(), config.retention.clone());
        Self::from_parts(config, policy)
    }
}

impl<P: WindowPolicy + Clone> CongestionOps for Lark<P> {
    fn get_ssthresh(
        &mut self,
        tcb: Option<&mut TcpControlBlock>,
        bytes_in_flight: u32,
        now: Instant,
    ) -> u32 {
        let Some(tcb) = tcb else {
            warn!(callback = "get_ssthresh", "missing transport control block");
            return bytes_in_flight / 2;
        };
        self.touch(now);
        self.calling_context = CallingContext::LossSsThresh;
        self.segments_acked = 0;
        self.bytes_in_flight = bytes_in_flight;
        self.metrics.update_peak_throughput(now);
        self.emit_observation(tcb, now);

        let verdict = fusion::classify(
            self.calling_context,
            tcb,
            &mut self.metrics,
            &self.config.ecn,
            now,
        );
        let input = self.policy_input(tcb, bytes_in_flight);
        let new_ssthresh = self.policy.congestion(&input, verdict);
        self.metrics
            .on_congestion(verdict, verdict.retention(&self.config.retention), now);

        // The window itself keeps its own, higher floor.
        let floor = self
            .config
            .window
            .min_cwnd_segments
            .saturating_mul(tcb.segment_size);
        tcb.cwnd = new_ssthresh.max(floor);
        new_ssthresh
    }

    fn increase_window(
        &mut self,
        tcb: Option<&mut TcpControlBlock>,
        segments_acked: u32,
        now: Instant,
    ) {
        let Some(tcb) = tcb else {
            warn!(callback = "increase_window", "missing transport control block");
            return;
        };
        self.touch(now);
        self.calling_context = CallingContext::Increase;
        self.segments_acked = segments_acked;
        self.bytes_in_flight = tcb.bytes_in_flight;
        self.metrics.update_peak_throughput(now);
        self.emit_observation(tcb, now);

        let verdict = fusion::classify(
            self.calling_context,
            tcb,
            &mut self.metrics,
            &self.config.ecn,
            now,
        );
        if verdict.is_congestion() {
            self.metrics
                .on_congestion(verdict, verdict.retention(&self.config.retention), now);
        }

        self.alpha = alpha::adapt(
            self.alpha,
            &self.config.alpha,
            &self.config.ecn,
            tcb.ca_state,
            &mut self.metrics,
            now,
        );

        let input = self.policy_input(tcb, tcb.bytes_in_flight);
        tcb.cwnd = self.policy.increase(&input);

        if !verdict.is_congestion() {
            self.metrics.note_growth();
        }
    }

    fn pkts_acked(
        &mut self,
        tcb: Option<&TcpControlBlock>,
        segments_acked: u32,
        rtt: Duration,
        now: Instant,
    ) {
        let Some(tcb) = tcb else {
            warn!(callback = "pkts_acked", "missing transport control block");
            return;
        };
        self.touch(now);
        self.segments_acked = segments_acked;
        let bytes = segments_acked as u64 * tcb.segment_size as u64;
        self.metrics.on_pkts_acked(bytes, rtt, tcb.min_rtt, now);
        self.metrics.update_peak_throughput(now);
    }

    fn congestion_state_set(
        &mut self,
        tcb: Option<&TcpControlBlock>,
        new_state: CaState,
        now: Instant,
    ) {
        if tcb.is_none() {
            warn!(callback = "congestion_state_set", "missing transport control block");
            return;
        }
        self.touch(now);
        match new_state {
            CaState::Cwr => debug!(uuid = self.uuid, "entering window-reduced state"),
            CaState::Loss => debug!(uuid = self.uuid, "entering timeout recovery"),
            _ => trace!(uuid = self.uuid, state = ?new_state, "congestion state set"),
        }
    }

    fn cwnd_event(&mut self, tcb: Option<&TcpControlBlock>, event: CaEvent, now: Instant) {
        if tcb.is_none() {
            warn!(callback = "cwnd_event", "missing transport control block");
            return;
        }
        self.touch(now);
        match event {
            CaEvent::EcnIsCe => self.metrics.on_ce_mark(now),
            CaEvent::EcnNoCe => self.metrics.on_no_ce(),
            CaEvent::CompleteCwr => trace!(uuid = self.uuid, "window-reduced phase complete"),
            CaEvent::Loss => debug!(uuid = self.uuid, "loss event reported"),
            _ => {}
        }
    }

    fn fork(&self) -> Box<dyn CongestionOps> {
        Box::new(Lark::fork(self))
    }

    fn name(&self) -> &'static str {
        "Lark"
    }
}

/// A point-in-time snapshot of controller state.
/// 控制器状态的即时快照。
#[derive(Debug, Clone)]
pub struct LarkStats {
    pub uuid: u64,
    pub node_id: u64,
    pub alpha: f64,
    pub peak_throughput: f64,
    pub last_rtt: Duration,
    pub min_rtt: Duration,
    pub consecutive_growth: u32,
    pub total_bytes_acked: u64,
    pub ecn_marks: u64,
    pub losses: u64,
}

impl std::fmt::Display for LarkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lark[uuid:{}, node:{}, alpha:{:.3}, peak:{:.1}MB/s, growth:{}, acked:{}B, ce:{}, loss:{}]",
            self.uuid,
            self.node_id,
            self.alpha,
            self.peak_throughput / 1e6,
            self.consecutive_growth,
            self.total_bytes_acked,
            self.ecn_marks,
            self.losses
        )
    }
}
