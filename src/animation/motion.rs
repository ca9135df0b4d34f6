//! 动画片段
//!
//! 由解码后的关键帧表构建，构建完成后只读，可通过 `Arc` 在多个实例间共享。

use std::collections::HashMap;

use super::ik_enable::{IkEnableEntry, IkEnableTrack};
use super::keyframe::KeyFrame;
use super::motion_track::{BoneFrameTransform, BoneMotionTrack};

/// 动画片段构建器
#[derive(Debug, Clone, Default)]
pub struct AnimationClipBuilder {
    bone_tracks: HashMap<String, BoneMotionTrack>,
    ik_enable: IkEnableTrack,
    bezier_iterations: Option<u32>,
}

impl AnimationClipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入骨骼关键帧
    pub fn add_keyframe(&mut self, bone_name: &str, keyframe: KeyFrame) -> &mut Self {
        self.bone_tracks
            .entry(bone_name.to_string())
            .or_default()
            .push(keyframe);
        self
    }

    /// 插入 IK 开关条目
    pub fn add_ik_enable(&mut self, entry: IkEnableEntry) -> &mut Self {
        self.ik_enable.push(entry);
        self
    }

    /// 覆盖贝塞尔修正步数（默认取全局配置）
    pub fn bezier_iterations(&mut self, iterations: u32) -> &mut Self {
        self.bezier_iterations = Some(iterations);
        self
    }

    /// 排序所有轨道并生成只读片段
    pub fn build(self) -> AnimationClip {
        let Self {
            mut bone_tracks,
            mut ik_enable,
            bezier_iterations,
        } = self;

        for track in bone_tracks.values_mut() {
            track.finish();
        }
        ik_enable.finish();

        // 时长只由骨骼关键帧决定，IK 开关条目不参与
        let duration = bone_tracks
            .values()
            .map(BoneMotionTrack::max_frame_index)
            .max()
            .unwrap_or(0);

        let keyframe_count: usize = bone_tracks.values().map(BoneMotionTrack::len).sum();
        log::info!(
            "[Motion] 动画构建完成: {} 条骨骼轨道, {} 个关键帧, {} 个 IK 开关条目, 时长 {} 帧",
            bone_tracks.len(),
            keyframe_count,
            ik_enable.entries().len(),
            duration
        );

        AnimationClip {
            bone_tracks,
            ik_enable,
            duration,
            bezier_iterations: bezier_iterations
                .unwrap_or_else(|| crate::config::get_config().bezier_iterations),
        }
    }
}

/// 动画片段
#[derive(Debug, Clone)]
pub struct AnimationClip {
    bone_tracks: HashMap<String, BoneMotionTrack>,
    ik_enable: IkEnableTrack,
    duration: u32,
    bezier_iterations: u32,
}

impl AnimationClip {
    pub fn builder() -> AnimationClipBuilder {
        AnimationClipBuilder::new()
    }

    /// 最大帧索引
    #[inline]
    pub fn duration(&self) -> u32 {
        self.duration
    }

    #[inline]
    pub fn bone_track(&self, bone_name: &str) -> Option<&BoneMotionTrack> {
        self.bone_tracks.get(bone_name)
    }

    pub fn bone_track_names(&self) -> impl Iterator<Item = &str> {
        self.bone_tracks.keys().map(String::as_str)
    }

    #[inline]
    pub fn ik_enable(&self) -> &IkEnableTrack {
        &self.ik_enable
    }

    /// 采样指定骨骼
    ///
    /// 没有该骨骼的轨道，或当前帧早于第一个关键帧时返回 None。
    pub fn sample(&self, bone_name: &str, frame_no: u32) -> Option<BoneFrameTransform> {
        self.bone_tracks
            .get(bone_name)?
            .seek(frame_no, self.bezier_iterations)
    }
}
