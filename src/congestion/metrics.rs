//! 每流度量跟踪器 - 为拥塞决策维护连接级统计
//! Per-flow metrics tracker - connection-level statistics for congestion
//! decisions
//!
//! 职责：
//! - RTT 镜像（最近值与最小值）
//! - 累计确认字节与峰值吞吐
//! - 有界CE时间戳环及惰性按龄修剪
//! - 连续增长计数与拥塞时间戳

use crate::config::EcnConfig;
use crate::congestion::fusion::Verdict;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Slack on top of the rate-derived ring bound, absorbing arrival jitter at
/// the window edge.
const ECN_RING_MARGIN: usize = 8;

/// Per-flow metrics fed by the dispatcher callbacks.
///
/// 由调度回调喂入的每流度量。
#[derive(Debug, Clone)]
pub struct FlowMetrics {
    /// Most recent RTT sample. Zero until the first acknowledgement.
    /// 最近一次RTT采样。首次确认前为零。
    last_rtt: Duration,
    /// Mirror of the host's minimum RTT, kept strictly positive.
    /// 宿主最小RTT的镜像，保持严格为正。
    min_rtt: Duration,
    /// Cumulative delivered bytes.
    /// 累计交付字节数。
    total_bytes_acked: u64,
    /// Peak observed delivery rate, bytes per second.
    /// 观察到的峰值交付速率（字节/秒）。
    peak_throughput: f64,
    /// Time of the first acknowledgement; the epoch for throughput.
    /// 首次确认的时间；吞吐量计算的起点。
    first_ack_at: Option<Instant>,
    /// Recent CE mark timestamps, oldest first.
    /// 最近的CE标记时间戳，最旧的在前。
    ecn_events: VecDeque<Instant>,
    /// Capacity bound for the CE ring.
    /// CE环的容量上限。
    ecn_ring_capacity: usize,
    /// Sliding window for CE-rate calculations.
    /// CE速率计算的滑动窗口。
    ecn_window: Duration,
    /// Set on a CE mark, cleared when the path reports no congestion.
    /// CE标记时置位，路径报告无拥塞时清除。
    ecn_recent: bool,
    /// Time of the most recent CE mark.
    /// 最近一次CE标记的时间。
    last_ecn_time: Option<Instant>,
    /// Lifetime CE mark count, diagnostics only.
    /// CE标记的累计计数，仅用于诊断。
    ecn_total: u64,
    /// Count of successive non-congestion increase events.
    /// 连续无拥塞增长事件的计数。
    consecutive_growth: u32,
    /// Time of the last congestion verdict.
    /// 最近一次拥塞裁决的时间。
    last_congestion_time: Option<Instant>,
    /// Lifetime loss-verdict count, diagnostics only.
    /// 丢包裁决的累计计数，仅用于诊断。
    loss_total: u64,
}

impl FlowMetrics {
    /// Creates an empty tracker sized for the configured ECN window.
    ///
    /// 按配置的ECN窗口创建空跟踪器。
    pub fn new(ecn: &EcnConfig) -> Self {
        let ecn_ring_capacity =
            (ecn.rate_high * ecn.window.as_secs_f64()).ceil() as usize + ECN_RING_MARGIN;
        Self {
            last_rtt: Duration::ZERO,
            min_rtt: Duration::ZERO,
            total_bytes_acked: 0,
            peak_throughput: 0.0,
            first_ack_at: None,
            ecn_events: VecDeque::with_capacity(ecn_ring_capacity),
            ecn_ring_capacity,
            ecn_window: ecn.window,
            ecn_recent: false,
            last_ecn_time: None,
            ecn_total: 0,
            consecutive_growth: 0,
            last_congestion_time: None,
            loss_total: 0,
        }
    }

    /// Folds an acknowledgement into the tracker.
    ///
    /// 将一次确认并入跟踪器。
    pub fn on_pkts_acked(
        &mut self,
        bytes: u64,
        rtt: Duration,
        host_min_rtt: Option<Duration>,
        now: Instant,
    ) {
        self.last_rtt = rtt;
        if let Some(min) = host_min_rtt {
            if !min.is_zero() {
                self.min_rtt = min;
            }
        }
        self.total_bytes_acked = self.total_bytes_acked.saturating_add(bytes);
        if self.first_ack_at.is_none() {
            self.first_ack_at = Some(now);
        }

        trace!(
            rtt_us = rtt.as_micros() as u64,
            min_rtt_us = self.min_rtt.as_micros() as u64,
            total_bytes = self.total_bytes_acked,
            "acknowledgement recorded"
        );
    }

    /// Lifts the peak throughput to the current average delivery rate when
    /// that rate exceeds it.
    ///
    /// 当当前平均交付速率超过峰值时，将峰值吞吐抬升至该速率。
    pub fn update_peak_throughput(&mut self, now: Instant) {
        let Some(start) = self.first_ack_at else {
            return;
        };
        let elapsed = now.duration_since(start);
        if elapsed.is_zero() {
            return;
        }
        let rate = self.total_bytes_acked as f64 / elapsed.as_secs_f64();
        if rate > self.peak_throughput {
            self.peak_throughput = rate;
            trace!(peak_bytes_per_sec = rate as u64, "peak throughput raised");
        }
    }

    /// Appends a CE mark to the ring, displacing the oldest entry when full.
    ///
    /// 向环中追加一个CE标记，满时挤出最旧的条目。
    pub fn on_ce_mark(&mut self, now: Instant) {
        self.prune_ecn(now);
        if self.ecn_events.len() == self.ecn_ring_capacity {
            self.ecn_events.pop_front();
        }
        self.ecn_events.push_back(now);
        self.ecn_recent = true;
        self.last_ecn_time = Some(now);
        self.ecn_total += 1;

        trace!(
            window_marks = self.ecn_events.len(),
            lifetime_marks = self.ecn_total,
            "CE mark recorded"
        );
    }

    /// Clears the live-mark flag after the path reports no congestion.
    ///
    /// 路径报告无拥塞后清除有效标记标志。
    pub fn on_no_ce(&mut self) {
        self.ecn_recent = false;
    }

    /// CE marks within the sliding window, pruned lazily on read.
    ///
    /// 滑动窗口内的CE标记数，读取时惰性修剪。
    pub fn ce_count_in_window(&mut self, now: Instant) -> usize {
        self.prune_ecn(now);
        self.ecn_events.len()
    }

    /// CE marks per second over the sliding window.
    ///
    /// 滑动窗口上每秒的CE标记数。
    pub fn ce_rate(&mut self, now: Instant) -> f64 {
        self.ce_count_in_window(now) as f64 / self.ecn_window.as_secs_f64()
    }

    /// Registers a congestion verdict: the growth streak ends, the event
    /// time is recorded, and on a real congestion signal the peak-throughput
    /// estimate deflates by the verdict's retention factor.
    ///
    /// 登记一次拥塞裁决：增长连击终止，记录事件时间；对真实拥塞信号，
    /// 峰值吞吐估计按该裁决的保留因子回落。
    pub fn on_congestion(&mut self, verdict: Verdict, retention: f64, now: Instant) {
        self.consecutive_growth = 0;
        self.last_congestion_time = Some(now);
        if verdict.is_congestion() {
            self.peak_throughput *= retention;
        }
        if matches!(verdict, Verdict::Loss | Verdict::Timeout) {
            self.loss_total += 1;
        }
    }

    /// Extends the growth streak after a clean increase.
    ///
    /// 一次无拥塞增长后延长增长连击。
    pub fn note_growth(&mut self) {
        self.consecutive_growth += 1;
    }

    pub fn last_rtt(&self) -> Duration {
        self.last_rtt
    }

    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    pub fn total_bytes_acked(&self) -> u64 {
        self.total_bytes_acked
    }

    pub fn peak_throughput(&self) -> f64 {
        self.peak_throughput
    }

    pub fn ecn_recent(&self) -> bool {
        self.ecn_recent
    }

    pub fn last_ecn_time(&self) -> Option<Instant> {
        self.last_ecn_time
    }

    pub fn ecn_total(&self) -> u64 {
        self.ecn_total
    }

    pub fn consecutive_growth(&self) -> u32 {
        self.consecutive_growth
    }

    pub fn last_congestion_time(&self) -> Option<Instant> {
        self.last_congestion_time
    }

    pub fn loss_total(&self) -> u64 {
        self.loss_total
    }

    // Entries at exactly the window edge are dropped; the ring holds marks
    // strictly younger than the window.
    fn prune_ecn(&mut self, now: Instant) {
        while let Some(oldest) = self.ecn_events.front() {
            if now.duration_since(*oldest) >= self.ecn_window {
                self.ecn_events.pop_front();
            } else {
                break;
            }
        }
    }
}
