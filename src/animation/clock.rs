//! 动画时钟
//!
//! 把经过的毫秒数换算成固定帧率（默认 30 FPS）下的帧索引，与渲染帧率无关。
//! 超出动画时长时直接从 0 重新开始，不做取模回绕。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// 毫秒时间源
pub trait TimeSource {
    fn now_ms(&self) -> u64;
}

/// 系统单调时钟
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// 手动推进的时间源，克隆体共享同一时间
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Arc<AtomicU64>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Relaxed);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// 动画时钟
pub struct AnimationClock {
    source: Box<dyn TimeSource + Send>,
    start_ms: u64,
    frame_rate: u32,
}

impl AnimationClock {
    /// 使用系统时钟
    pub fn new(frame_rate: u32) -> Self {
        Self::with_source(SystemTimeSource::new(), frame_rate)
    }

    pub fn with_source(source: impl TimeSource + Send + 'static, frame_rate: u32) -> Self {
        let start_ms = source.now_ms();
        Self {
            source: Box::new(source),
            start_ms,
            frame_rate,
        }
    }

    #[inline]
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// 记录当前时间为起点
    pub fn start(&mut self) {
        self.start_ms = self.source.now_ms();
    }

    /// 重新从 0 帧开始
    #[inline]
    pub fn restart(&mut self) {
        self.start();
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.source.now_ms().saturating_sub(self.start_ms)
    }

    /// `floor(frame_rate * ms / 1000)`
    pub fn frame_at(&self, elapsed_ms: u64) -> u32 {
        let frame = elapsed_ms.saturating_mul(u64::from(self.frame_rate)) / 1000;
        u32::try_from(frame).unwrap_or(u32::MAX)
    }

    /// 当前帧索引；超过 `duration` 时重置起点并返回 0
    pub fn frame_number(&mut self, duration: u32) -> u32 {
        let frame = self.frame_at(self.elapsed_ms());
        if frame > duration {
            log::debug!("[Motion] 帧 {} 超出时长 {}，动画从头开始", frame, duration);
            self.restart();
            return 0;
        }
        frame
    }
}

impl std::fmt::Debug for AnimationClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationClock")
            .field("start_ms", &self.start_ms)
            .field("frame_rate", &self.frame_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_clock() -> (ManualTimeSource, AnimationClock) {
        let source = ManualTimeSource::new();
        let mut clock = AnimationClock::with_source(source.clone(), 30);
        clock.start();
        (source, clock)
    }

    #[test]
    fn test_frame_at() {
        let (_, clock) = manual_clock();
        assert_eq!(clock.frame_at(0), 0);
        assert_eq!(clock.frame_at(33), 0);
        assert_eq!(clock.frame_at(34), 1);
        assert_eq!(clock.frame_at(1000), 30);
        assert_eq!(clock.frame_at(u64::MAX), u32::MAX);
    }

    #[test]
    fn test_frame_number_follows_source() {
        let (source, mut clock) = manual_clock();
        assert_eq!(clock.frame_number(100), 0);
        source.advance(500);
        assert_eq!(clock.frame_number(100), 15);
        source.advance(500);
        assert_eq!(clock.frame_number(100), 30);
    }

    #[test]
    fn test_discrete_reset_past_duration() {
        let (source, mut clock) = manual_clock();
        // 41 帧 > 时长 40
        source.set(41 * 1000 / 30 + 1);
        assert_eq!(clock.frame_at(clock.elapsed_ms()), 41);
        assert_eq!(clock.frame_number(40), 0);
        // 起点已重置
        assert_eq!(clock.frame_number(40), 0);
        source.advance(100);
        assert_eq!(clock.frame_number(40), 3);
    }

    #[test]
    fn test_frame_equal_to_duration_is_kept() {
        let (source, mut clock) = manual_clock();
        source.set(40 * 1000 / 30 + 1);
        assert_eq!(clock.frame_number(40), 40);
    }
}
