//! 动画实例
//!
//! 一个实例对应场景中的一个角色：共享骨骼层级与动画片段，独占姿势与时钟。
//! 每帧流程：时钟 → 帧索引 → 采样本地变换 → 合成世界变换 → IK → 导出。

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::animation::{AnimationClip, AnimationClock};
use crate::config::{get_config, AnimationConfig};
use crate::skeleton::{BoneHierarchy, IkConfig, IkOutcome, IkSolver, Pose};
use crate::{AnimError, Result};

/// 动画实例
#[derive(Debug)]
pub struct AnimatedInstance {
    hierarchy: Arc<BoneHierarchy>,
    solvers: Vec<IkSolver>,
    clip: Option<Arc<AnimationClip>>,
    /// (骨骼索引, 轨道名称)，只包含层级中存在的骨骼
    bindings: Vec<(usize, String)>,
    pose: Pose,
    clock: AnimationClock,
    config: AnimationConfig,
    root_bone: Option<usize>,
    frame_no: u32,
    ik_outcomes: Vec<IkOutcome>,
}

impl AnimatedInstance {
    /// 使用当前全局配置创建实例
    pub fn new(hierarchy: Arc<BoneHierarchy>, ik_configs: &[IkConfig]) -> Result<Self> {
        Self::with_config(hierarchy, ik_configs, get_config())
    }

    pub fn with_config(
        hierarchy: Arc<BoneHierarchy>,
        ik_configs: &[IkConfig],
        config: AnimationConfig,
    ) -> Result<Self> {
        let solvers = ik_configs
            .iter()
            .map(|ik| IkSolver::new(ik, &hierarchy, &config))
            .collect::<Result<Vec<_>>>()?;

        let root_bone = hierarchy.index_of(&config.root_bone_name);
        if root_bone.is_none() {
            log::warn!(
                "[Skeleton] 找不到根骨骼 '{}'，所有骨骼保持单位矩阵",
                config.root_bone_name
            );
        }

        log::info!(
            "[Skeleton] 实例创建: {} 个骨骼, {} 条 IK 链",
            hierarchy.len(),
            solvers.len()
        );

        let mut instance = Self {
            pose: Pose::new(hierarchy.len()),
            clock: AnimationClock::new(config.frame_rate),
            ik_outcomes: vec![IkOutcome::Skipped; solvers.len()],
            hierarchy,
            solvers,
            clip: None,
            bindings: Vec::new(),
            config,
            root_bone,
            frame_no: 0,
        };
        instance.evaluate(0);
        Ok(instance)
    }

    // ========================================
    // 动画控制
    // ========================================

    /// 替换时钟（例如测试用的手动时间源）
    pub fn set_clock(&mut self, clock: AnimationClock) {
        self.clock = clock;
    }

    /// 绑定动画片段并回到第 0 帧
    pub fn attach_clip(&mut self, clip: Arc<AnimationClip>) {
        let mut bindings = Vec::new();
        for name in clip.bone_track_names() {
            match self.hierarchy.index_of(name) {
                Some(index) => bindings.push((index, name.to_string())),
                None => log::debug!("[Motion] 轨道 '{}' 没有对应骨骼，已忽略", name),
            }
        }
        bindings.sort_unstable_by_key(|(index, _)| *index);

        for entry in clip.ik_enable().entries() {
            for name in entry.flags.keys() {
                if !self.solvers.iter().any(|s| &s.name == name) {
                    log::debug!("[Motion] IK 开关 '{}' (帧 {}) 没有对应 IK 链", name, entry.frame_no);
                }
            }
        }

        log::info!(
            "[Motion] 绑定动画: {}/{} 条轨道生效, 时长 {} 帧",
            bindings.len(),
            clip.bone_track_names().count(),
            clip.duration()
        );

        self.bindings = bindings;
        self.clip = Some(clip);
        self.clock.restart();
        self.evaluate(0);
    }

    /// 解除动画，回到初始姿势
    pub fn detach_clip(&mut self) {
        self.clip = None;
        self.bindings.clear();
        self.evaluate(0);
    }

    /// 从头播放
    pub fn play(&mut self) {
        self.clock.restart();
    }

    /// 按时钟推进一帧，返回本次求值的帧索引
    pub fn update(&mut self) -> u32 {
        let duration = self.clip.as_ref().map_or(0, |clip| clip.duration());
        let frame_no = self.clock.frame_number(duration);
        self.evaluate(frame_no);
        frame_no
    }

    /// 求值指定帧：采样 → 合成 → IK
    pub fn evaluate(&mut self, frame_no: u32) {
        self.frame_no = frame_no;
        self.pose.reset_locals();

        if let Some(clip) = &self.clip {
            for (index, name) in &self.bindings {
                // 第一个关键帧之前没有采样结果，骨骼保持单位变换
                if let Some(sample) = clip.sample(name, frame_no) {
                    let bone = &self.hierarchy.bones()[*index];
                    let local = bone.local_transform(sample.orientation, sample.translation);
                    self.pose.set_local(*index, local);
                }
            }
        }

        let Some(root) = self.root_bone else {
            self.pose.reset_worlds();
            return;
        };
        self.pose.compose_from(&self.hierarchy, root);

        let enable = self.clip.as_deref().map(AnimationClip::ik_enable);
        for (solver, outcome) in self.solvers.iter().zip(self.ik_outcomes.iter_mut()) {
            *outcome = solver.solve_at(&self.hierarchy, &mut self.pose, enable, frame_no);
            if self.config.debug_log {
                log::debug!("[IK] 帧 {} '{}': {:?}", frame_no, solver.name, outcome);
            }
        }
    }

    // ========================================
    // 输出
    // ========================================

    /// 设置整体变换（导出缓冲区的第 0 个矩阵）
    pub fn set_actor_transform(&mut self, transform: Mat4) {
        self.pose.set_actor_transform(transform);
    }

    /// 按骨骼索引排列的世界变换
    #[inline]
    pub fn bone_matrices(&self) -> &[Mat4] {
        self.pose.bone_matrices()
    }

    /// 导出给渲染端：`[actor, bone0, bone1, ...]`
    #[inline]
    pub fn export_matrices(&self) -> &[Mat4] {
        self.pose.export()
    }

    /// 按名称获取骨骼世界变换
    pub fn bone_world(&self, name: &str) -> Result<Mat4> {
        self.hierarchy
            .index_of(name)
            .and_then(|index| self.pose.world(index))
            .ok_or_else(|| AnimError::UnknownBone(name.to_string()))
    }

    /// 按名称获取骨骼当前位置
    pub fn bone_position(&self, name: &str) -> Result<Vec3> {
        self.hierarchy
            .index_of(name)
            .and_then(|index| self.pose.position(&self.hierarchy, index))
            .ok_or_else(|| AnimError::UnknownBone(name.to_string()))
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    #[inline]
    pub fn hierarchy(&self) -> &Arc<BoneHierarchy> {
        &self.hierarchy
    }

    #[inline]
    pub fn clip(&self) -> Option<&Arc<AnimationClip>> {
        self.clip.as_ref()
    }

    #[inline]
    pub fn ik_solvers(&self) -> &[IkSolver] {
        &self.solvers
    }

    /// 最近一次求值中每条 IK 链的结果，顺序与 IK 配置一致
    #[inline]
    pub fn ik_outcomes(&self) -> &[IkOutcome] {
        &self.ik_outcomes
    }

    #[inline]
    pub fn frame_no(&self) -> u32 {
        self.frame_no
    }

    #[inline]
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{IkEnableEntry, KeyFrame, ManualTimeSource};
    use crate::skeleton::{BoneRecord, BoneType};
    use glam::Quat;
    use std::f32::consts::FRAC_PI_2;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn arm_hierarchy() -> Arc<BoneHierarchy> {
        Arc::new(
            BoneHierarchy::build(&[
                BoneRecord::new("センター", -1, Vec3::ZERO),
                BoneRecord::new("arm", 0, Vec3::new(0.0, 1.0, 0.0)),
                BoneRecord::new("hand", 1, Vec3::new(0.0, 2.0, 0.0)),
            ])
            .unwrap(),
        )
    }

    fn arm_instance() -> AnimatedInstance {
        AnimatedInstance::with_config(arm_hierarchy(), &[], AnimationConfig::default()).unwrap()
    }

    fn leg_hierarchy() -> Arc<BoneHierarchy> {
        Arc::new(
            BoneHierarchy::build(&[
                BoneRecord::new("センター", -1, Vec3::ZERO),
                BoneRecord::new("thigh", 0, Vec3::new(0.0, 2.0, 0.0)),
                BoneRecord::new("ひざ", 1, Vec3::new(0.0, 1.0, 0.0)),
                BoneRecord::new("ankle", 2, Vec3::ZERO),
                BoneRecord::new("knee", 0, Vec3::ZERO).with_type(BoneType::Ik),
            ])
            .unwrap(),
        )
    }

    fn leg_ik() -> Vec<IkConfig> {
        vec![IkConfig {
            ik_bone: 4,
            target_bone: 3,
            links: vec![2, 1],
            iterations: 40,
            limit_angle: 0.5,
        }]
    }

    #[test]
    fn test_sample_and_compose() {
        init_logger();
        let mut builder = AnimationClip::builder();
        builder
            .add_keyframe("センター", KeyFrame::linear(0, Quat::IDENTITY, Vec3::X))
            .add_keyframe("arm", KeyFrame::linear(0, Quat::from_rotation_z(FRAC_PI_2), Vec3::ZERO))
            .add_keyframe("tail", KeyFrame::linear(0, Quat::from_rotation_x(1.0), Vec3::ONE));

        let mut instance = arm_instance();
        instance.attach_clip(Arc::new(builder.build()));

        let pose = instance.pose();
        let world_end = pose.world(0).unwrap() * pose.local(1).unwrap() * pose.local(2).unwrap();
        assert!(pose.world(2).unwrap().abs_diff_eq(world_end, 1e-6));

        let hand = instance.bone_position("hand").unwrap();
        assert!(hand.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5), "hand = {hand}");
        let arm = instance.bone_position("arm").unwrap();
        assert!(arm.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn test_missing_root_leaves_identity() {
        init_logger();
        let config = AnimationConfig {
            root_bone_name: "全ての親".to_string(),
            ..AnimationConfig::default()
        };
        let mut builder = AnimationClip::builder();
        builder.add_keyframe("センター", KeyFrame::linear(0, Quat::IDENTITY, Vec3::X));

        let mut instance = AnimatedInstance::with_config(arm_hierarchy(), &[], config).unwrap();
        instance.attach_clip(Arc::new(builder.build()));
        assert!(instance.bone_matrices().iter().all(|m| *m == Mat4::IDENTITY));
    }

    #[test]
    fn test_ik_enable_gating() {
        init_logger();
        let mut builder = AnimationClip::builder();
        builder
            .add_keyframe("knee", KeyFrame::linear(0, Quat::IDENTITY, Vec3::new(0.0, 0.5, 0.5)))
            .add_ik_enable(IkEnableEntry::new(0, [("knee", true)]))
            .add_ik_enable(IkEnableEntry::new(50, [("knee", false)]));

        let mut instance =
            AnimatedInstance::with_config(leg_hierarchy(), &leg_ik(), AnimationConfig::default())
                .unwrap();
        instance.attach_clip(Arc::new(builder.build()));

        instance.evaluate(10);
        assert!(matches!(instance.ik_outcomes()[0], IkOutcome::Solved { .. }));
        let ankle = instance.bone_position("ankle").unwrap();
        assert!(ankle.abs_diff_eq(Vec3::new(0.0, 0.5, 0.5), 1e-3), "ankle = {ankle}");

        instance.evaluate(60);
        assert_eq!(instance.ik_outcomes()[0], IkOutcome::Disabled);
        let ankle = instance.bone_position("ankle").unwrap();
        assert!(ankle.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(instance.pose().is_finite());
    }

    #[test]
    fn test_update_follows_clock() {
        let mut builder = AnimationClip::builder();
        builder
            .add_keyframe("arm", KeyFrame::linear(0, Quat::IDENTITY, Vec3::ZERO))
            .add_keyframe("arm", KeyFrame::linear(40, Quat::IDENTITY, Vec3::ZERO));

        let source = ManualTimeSource::new();
        let mut instance = arm_instance();
        instance.set_clock(AnimationClock::with_source(source.clone(), 30));
        instance.attach_clip(Arc::new(builder.build()));
        instance.play();

        assert_eq!(instance.update(), 0);
        source.advance(1000);
        assert_eq!(instance.update(), 30);
        assert_eq!(instance.frame_no(), 30);

        // 超出 40 帧后回到 0
        source.advance(500);
        assert_eq!(instance.update(), 0);
        assert_eq!(instance.update(), 0);
    }

    #[test]
    fn test_loop_ignores_late_ik_enable_entry() {
        let mut builder = AnimationClip::builder();
        builder
            .add_keyframe("arm", KeyFrame::linear(0, Quat::IDENTITY, Vec3::ZERO))
            .add_keyframe("arm", KeyFrame::linear(40, Quat::IDENTITY, Vec3::ZERO))
            .add_ik_enable(IkEnableEntry::new(100, [("knee", false)]));

        let source = ManualTimeSource::new();
        let mut instance = arm_instance();
        instance.set_clock(AnimationClock::with_source(source.clone(), 30));
        instance.attach_clip(Arc::new(builder.build()));

        // 41 帧的时间
        source.set(41 * 1000 / 30 + 1);
        assert_eq!(instance.update(), 0);
    }

    #[test]
    fn test_export_layout() {
        let mut instance = arm_instance();
        let actor = Mat4::from_scale(Vec3::splat(0.1));
        instance.set_actor_transform(actor);

        let exported = instance.export_matrices();
        assert_eq!(exported.len(), 4);
        assert_eq!(exported[0], actor);
        assert_eq!(&exported[1..], instance.bone_matrices());
    }

    #[test]
    fn test_unknown_bone() {
        let instance = arm_instance();
        assert_eq!(
            instance.bone_world("tail").unwrap_err(),
            AnimError::UnknownBone("tail".to_string())
        );
        assert_eq!(instance.bone_world("センター").unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn test_invalid_ik_config_fails() {
        let mut ik = leg_ik();
        ik[0].links.clear();
        let result =
            AnimatedInstance::with_config(leg_hierarchy(), &ik, AnimationConfig::default());
        assert!(matches!(result, Err(AnimError::EmptyIkChain { ik_bone: 4 })));
    }
}
