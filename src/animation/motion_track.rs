//! 动画轨道
//!
//! 存储单个骨骼的所有关键帧，并提供查找和插值功能

use glam::{Quat, Vec3};

use super::bezier_curve::ease;
use super::keyframe::KeyFrame;

/// 骨骼帧变换结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneFrameTransform {
    /// 平移
    pub translation: Vec3,
    /// 旋转
    pub orientation: Quat,
}

impl Default for BoneFrameTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl From<&KeyFrame> for BoneFrameTransform {
    fn from(kf: &KeyFrame) -> Self {
        Self {
            translation: kf.translation,
            orientation: kf.rotation,
        }
    }
}

/// 骨骼动画轨道
///
/// 构建时按插入顺序追加，`finish` 后按帧索引升序排列（稳定排序，
/// 同一帧的多个关键帧保持插入顺序）。
#[derive(Debug, Clone, Default)]
pub struct BoneMotionTrack {
    keyframes: Vec<KeyFrame>,
}

impl BoneMotionTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加关键帧
    pub fn push(&mut self, keyframe: KeyFrame) {
        self.keyframes.push(keyframe);
    }

    /// 按帧索引排序
    pub fn finish(&mut self) {
        self.keyframes.sort_by_key(|kf| kf.frame_no);
    }

    #[inline]
    pub fn keyframes(&self) -> &[KeyFrame] {
        &self.keyframes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// 获取最大帧索引
    pub fn max_frame_index(&self) -> u32 {
        self.keyframes.last().map_or(0, |kf| kf.frame_no)
    }

    /// 求值指定帧
    ///
    /// 第一个关键帧之前没有结果（由调用方决定骨骼保持单位变换），
    /// 最后一个关键帧之后保持最后一帧。
    pub fn seek(&self, frame_no: u32, iterations: u32) -> Option<BoneFrameTransform> {
        // 从后往前找最后一个 frame_no <= 当前帧的关键帧
        let i = self.keyframes.iter().rposition(|kf| kf.frame_no <= frame_no)?;
        let k0 = &self.keyframes[i];

        let Some(k1) = self.keyframes.get(i + 1) else {
            return Some(k0.into());
        };

        // k0.frame_no <= frame_no < k1.frame_no
        let span = (k1.frame_no - k0.frame_no) as f32;
        let t = (frame_no - k0.frame_no) as f32 / span;
        let amount = ease(t, k1.p1, k1.p2, iterations);

        Some(BoneFrameTransform {
            translation: k0.translation.lerp(k1.translation, amount),
            orientation: k0.rotation.slerp(k1.rotation, amount),
        })
    }
}
