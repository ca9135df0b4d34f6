//! IK 求解器
//!
//! 每条 IK 链在加载时按关节数量确定求解方式：
//! - 1 个关节：LookAt，直接让关节朝向目标
//! - 2 个关节：两骨骼解析解（余弦定理）
//! - 3 个及以上：CCD 迭代
//!
//! 所有计算都在世界空间进行，修正量以左乘的方式作用于关节的整个子树，
//! 因此求解后子骨骼与关节保持一致。退化几何（零长度向量、平行基向量等）
//! 一律跳过或换用备用轴，不会把非有限值写进矩阵。

use std::f32::consts::PI;

use glam::{Mat3, Mat4, Quat, Vec3};

use super::hierarchy::BoneHierarchy;
use super::pose::Pose;
use crate::animation::IkEnableTrack;
use crate::config::AnimationConfig;
use crate::{AnimError, Result};

/// LookAt 基向量的 up 提示
const UP_HINT: Vec3 = Vec3::Y;
/// up 与前方向平行时改用的 right 提示
const RIGHT_HINT: Vec3 = Vec3::X;
/// 判定向量退化的长度平方阈值
const DEGENERATE_EPSILON: f32 = 1e-10;

// ============================================================================
// IK 配置
// ============================================================================

/// IK 表中的一条链，由模型解码器提供
#[derive(Clone, Debug, PartialEq)]
pub struct IkConfig {
    /// IK 骨骼（其姿势位置即目标位置）
    pub ik_bone: usize,
    /// 末端骨骼（需要到达目标的骨骼）
    pub target_bone: usize,
    /// 链上的关节，离末端最近的在前
    pub links: Vec<usize>,
    /// 迭代次数
    pub iterations: u32,
    /// 单次迭代角度限制（π 的倍数）
    pub limit_angle: f32,
}

/// 求解方式，加载时确定
#[derive(Clone, Debug, PartialEq)]
pub enum IkSolverKind {
    LookAt {
        joint: usize,
    },
    TwoBone {
        root: usize,
        mid: usize,
        /// 本地铰链轴
        hinge_axis: Vec3,
        /// 中间关节是否为膝盖（固定铰链轴）
        knee: bool,
    },
    Ccd {
        links: Vec<usize>,
        iterations: u32,
        /// 弧度
        limit_angle: f32,
    },
}

/// 单条链的求解结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IkOutcome {
    Solved {
        /// 实际执行的迭代次数
        iterations: u32,
        /// 末端骨骼与目标的剩余距离
        residual: f32,
    },
    /// 几何退化，本帧未修改姿势
    Skipped,
    /// IK 开关表中被关闭
    Disabled,
}

// ============================================================================
// 余弦定理
// ============================================================================

/// 三角形 (root, mid, goal) 的两个内角
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoBoneAngles {
    /// root 处的内角
    pub root: f32,
    /// mid 处的内角
    pub mid: f32,
}

impl TwoBoneAngles {
    /// `a` = |goal - root|，`b` = |mid - root|，`c` = |goal - mid|
    ///
    /// 余弦值会被限制到 [-1, 1]，任一边长为 0 时返回 None。
    pub fn solve(a: f32, b: f32, c: f32) -> Option<Self> {
        if a <= 0.0 || b <= 0.0 || c <= 0.0 {
            return None;
        }
        let cos_root = ((a * a + b * b - c * c) / (2.0 * a * b)).clamp(-1.0, 1.0);
        let cos_mid = ((b * b + c * c - a * a) / (2.0 * b * c)).clamp(-1.0, 1.0);
        Some(Self {
            root: cos_root.acos(),
            mid: cos_mid.acos(),
        })
    }

    /// mid 关节相对完全伸直状态的旋转角（伸直时为 0）
    #[inline]
    pub fn mid_rotation(&self) -> f32 {
        self.mid - PI
    }
}

// ============================================================================
// IK 求解器
// ============================================================================

/// IK 求解器
#[derive(Clone, Debug)]
pub struct IkSolver {
    /// IK 骨骼索引
    pub ik_bone: usize,
    /// 末端骨骼索引
    pub target_bone: usize,
    /// IK 骨骼名称（IK 开关表的键）
    pub name: String,
    /// 求解方式
    pub kind: IkSolverKind,
    /// 收敛阈值
    epsilon: f32,
}

impl IkSolver {
    /// 校验 IK 配置并确定求解方式
    pub fn new(
        config: &IkConfig,
        hierarchy: &BoneHierarchy,
        anim_config: &AnimationConfig,
    ) -> Result<Self> {
        let count = hierarchy.len();
        let check = |context: &'static str, index: usize| -> Result<usize> {
            if index < count {
                Ok(index)
            } else {
                Err(AnimError::BoneIndexOutOfRange { context, index, count })
            }
        };

        let ik_bone = check("IK bone", config.ik_bone)?;
        let target_bone = check("IK target", config.target_bone)?;
        for &link in &config.links {
            check("IK link", link)?;
        }

        let bones = hierarchy.bones();
        let kind = match config.links.as_slice() {
            [] => return Err(AnimError::EmptyIkChain { ik_bone }),
            [joint] => IkSolverKind::LookAt { joint: *joint },
            [mid, root] => IkSolverKind::TwoBone {
                root: *root,
                mid: *mid,
                hinge_axis: non_zero_or(anim_config.hinge_axis, Vec3::X),
                knee: anim_config.is_knee_name(&bones[*mid].name),
            },
            links => IkSolverKind::Ccd {
                links: links.to_vec(),
                iterations: config.iterations,
                limit_angle: config.limit_angle.max(0.0) * PI,
            },
        };

        let name = bones[ik_bone].name.clone();
        if !bones[ik_bone].is_ik() {
            log::debug!("[IK] 骨骼 '{}' 未标记为 IK 类型", name);
        }
        for &link in &config.links {
            if !hierarchy.is_in_subtree(link, target_bone) {
                log::warn!(
                    "[IK] '{}': 末端骨骼 '{}' 不在关节 '{}' 的子树中",
                    name,
                    bones[target_bone].name,
                    bones[link].name
                );
            }
        }

        Ok(Self {
            ik_bone,
            target_bone,
            name,
            kind,
            epsilon: anim_config.ik_epsilon,
        })
    }

    /// 当前帧是否启用
    #[inline]
    pub fn is_enabled(&self, track: &IkEnableTrack, frame_no: u32) -> bool {
        track.is_enabled(&self.name, frame_no)
    }

    /// 先查 IK 开关表，启用时才求解；没有开关表视为始终启用
    pub fn solve_at(
        &self,
        hierarchy: &BoneHierarchy,
        pose: &mut Pose,
        enable: Option<&IkEnableTrack>,
        frame_no: u32,
    ) -> IkOutcome {
        match enable {
            Some(track) if !self.is_enabled(track, frame_no) => IkOutcome::Disabled,
            _ => self.solve(hierarchy, pose),
        }
    }

    /// 求解并修改姿势，需在矩阵合成之后调用
    pub fn solve(&self, hierarchy: &BoneHierarchy, pose: &mut Pose) -> IkOutcome {
        let Some(goal) = pose.position(hierarchy, self.ik_bone) else {
            return IkOutcome::Skipped;
        };

        match &self.kind {
            IkSolverKind::LookAt { joint } => self.solve_look_at(hierarchy, pose, *joint, goal),
            IkSolverKind::TwoBone {
                root,
                mid,
                hinge_axis,
                knee,
            } => self.solve_two_bone(hierarchy, pose, *root, *mid, *hinge_axis, *knee, goal),
            IkSolverKind::Ccd {
                links,
                iterations,
                limit_angle,
            } => self.solve_ccd(hierarchy, pose, links, *iterations, *limit_angle, goal),
        }
    }

    /// 单关节：让 关节->末端 的初始方向转向 关节->目标
    fn solve_look_at(
        &self,
        hierarchy: &BoneHierarchy,
        pose: &mut Pose,
        joint: usize,
        goal: Vec3,
    ) -> IkOutcome {
        let bones = hierarchy.bones();
        let joint_rest = bones[joint].rest_position;
        let target_rest = bones[self.target_bone].rest_position;

        let (Some(world), Some(joint_pos)) = (pose.world(joint), pose.position(hierarchy, joint))
        else {
            return IkOutcome::Skipped;
        };
        if world.determinant().abs() <= DEGENERATE_EPSILON {
            return IkOutcome::Skipped;
        }

        let origin_dir = (target_rest - joint_rest).normalize_or_zero();
        let target_dir = (goal - joint_pos).normalize_or_zero();
        if origin_dir == Vec3::ZERO || target_dir == Vec3::ZERO {
            return IkOutcome::Skipped;
        }

        let (Some(from), Some(to)) = (look_basis(origin_dir), look_basis(target_dir)) else {
            return IkOutcome::Skipped;
        };
        let rotation = to * from.transpose();

        let corrected = Mat4::from_translation(joint_pos)
            * Mat4::from_mat3(rotation)
            * Mat4::from_translation(-joint_rest);
        if !apply_correction(hierarchy, pose, joint, corrected * world.inverse()) {
            return IkOutcome::Skipped;
        }

        self.outcome(hierarchy, pose, goal, 1)
    }

    /// 两骨骼：余弦定理求出 mid 的位置，再依次旋转 root 与 mid
    #[allow(clippy::too_many_arguments)]
    fn solve_two_bone(
        &self,
        hierarchy: &BoneHierarchy,
        pose: &mut Pose,
        root: usize,
        mid: usize,
        hinge_axis: Vec3,
        knee: bool,
        goal: Vec3,
    ) -> IkOutcome {
        let bones = hierarchy.bones();
        let (Some(p0), Some(p1), Some(p2), Some(root_world)) = (
            pose.position(hierarchy, root),
            pose.position(hierarchy, mid),
            pose.position(hierarchy, self.target_bone),
            pose.world(root),
        ) else {
            return IkOutcome::Skipped;
        };

        // 骨骼长度取初始姿势，不随动画变化
        let b = bones[mid].rest_position.distance(bones[root].rest_position);
        let c = bones[self.target_bone]
            .rest_position
            .distance(bones[mid].rest_position);
        let to_goal = goal - p0;
        let distance = to_goal.length();
        if b <= self.epsilon || c <= self.epsilon || distance <= self.epsilon {
            return IkOutcome::Skipped;
        }

        // 目标不可达时贴到可达范围的边界
        let a = distance.clamp((b - c).abs(), b + c);
        let Some(angles) = TwoBoneAngles::solve(a, b, c) else {
            return IkOutcome::Skipped;
        };
        let goal_dir = to_goal / distance;

        let hinge = root_world.transform_vector3(hinge_axis);
        let limb_normal = (p1 - p0).cross(p2 - p1);
        let axis = if knee {
            first_valid_axis(&[hinge, limb_normal])
        } else {
            let swing = (p2 - p0).normalize_or_zero().cross(goal_dir);
            first_valid_axis(&[swing, limb_normal, hinge])
        };
        let Some(axis) = axis else {
            return IkOutcome::Skipped;
        };

        // mid 放在与 root->goal 成 θ_root 的位置，两侧中取离当前 mid 较近的一侧
        let place = |angle: f32| p0 + Quat::from_axis_angle(axis, angle) * goal_dir * b;
        let bent_pos = place(angles.root);
        let bent_neg = place(-angles.root);
        let mid_goal = if bent_neg.distance_squared(p1) + DEGENERATE_EPSILON
            < bent_pos.distance_squared(p1)
        {
            bent_neg
        } else {
            bent_pos
        };

        if let Some(q_root) = rotation_arc(p1 - p0, mid_goal - p0) {
            if !apply_correction(hierarchy, pose, root, rotate_about(p0, q_root)) {
                return IkOutcome::Skipped;
            }
        }

        // root 修正后重新取 mid 与末端位置，此时 mid 处的夹角为 θ_mid
        let (Some(p1), Some(p2)) = (
            pose.position(hierarchy, mid),
            pose.position(hierarchy, self.target_bone),
        ) else {
            return IkOutcome::Skipped;
        };
        if let Some(q_mid) = rotation_arc(p2 - p1, goal - p1) {
            apply_correction(hierarchy, pose, mid, rotate_about(p1, q_mid));
        }

        self.outcome(hierarchy, pose, goal, 1)
    }

    /// CCD：按链表顺序逐个关节把末端转向目标
    fn solve_ccd(
        &self,
        hierarchy: &BoneHierarchy,
        pose: &mut Pose,
        links: &[usize],
        iterations: u32,
        limit_angle: f32,
        goal: Vec3,
    ) -> IkOutcome {
        let Some(mut end) = pose.position(hierarchy, self.target_bone) else {
            return IkOutcome::Skipped;
        };

        let mut performed = 0;
        'outer: for _ in 0..iterations {
            if end.distance(goal) <= self.epsilon {
                break;
            }
            performed += 1;

            for &link in links {
                let Some(pivot) = pose.position(hierarchy, link) else {
                    continue;
                };

                let to_end = (end - pivot).normalize_or_zero();
                let to_goal = (goal - pivot).normalize_or_zero();
                if to_end == Vec3::ZERO || to_goal == Vec3::ZERO {
                    continue;
                }
                if (to_end - to_goal).length() <= self.epsilon {
                    continue;
                }

                let cross = to_end.cross(to_goal);
                let axis = if cross.length_squared() <= DEGENERATE_EPSILON {
                    // 反向共线
                    to_end.any_orthonormal_vector()
                } else {
                    cross.normalize()
                };
                let angle = to_end.dot(to_goal).clamp(-1.0, 1.0).acos().min(limit_angle);

                let delta = rotate_about(pivot, Quat::from_axis_angle(axis, angle));
                if !apply_correction(hierarchy, pose, link, delta) {
                    continue;
                }
                end = delta.transform_point3(end);

                if end.distance(goal) <= self.epsilon {
                    break 'outer;
                }
            }
        }

        self.outcome(hierarchy, pose, goal, performed)
    }

    fn outcome(
        &self,
        hierarchy: &BoneHierarchy,
        pose: &Pose,
        goal: Vec3,
        iterations: u32,
    ) -> IkOutcome {
        let residual = pose
            .position(hierarchy, self.target_bone)
            .map_or(f32::MAX, |p| p.distance(goal));
        IkOutcome::Solved { iterations, residual }
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 以 `forward` 为 Z 轴构建正交基；forward 与 up 平行时改用 right 重建
fn look_basis(forward: Vec3) -> Option<Mat3> {
    let z = forward;
    let cross = UP_HINT.cross(z);
    let (x, y) = if cross.length_squared() <= DEGENERATE_EPSILON {
        let y = z.cross(RIGHT_HINT).normalize_or_zero();
        (y.cross(z).normalize_or_zero(), y)
    } else {
        let x = cross.normalize();
        (x, z.cross(x).normalize_or_zero())
    };

    if x == Vec3::ZERO || y == Vec3::ZERO {
        return None;
    }
    Some(Mat3::from_cols(x, y, z))
}

/// 绕世界空间中的 `pivot` 旋转
#[inline]
fn rotate_about(pivot: Vec3, rotation: Quat) -> Mat4 {
    Mat4::from_translation(pivot) * Mat4::from_quat(rotation) * Mat4::from_translation(-pivot)
}

/// 把 `from` 方向转到 `to` 方向的最短旋转
fn rotation_arc(from: Vec3, to: Vec3) -> Option<Quat> {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return None;
    }
    Some(Quat::from_rotation_arc(from, to))
}

/// 取第一个非退化的轴
fn first_valid_axis(candidates: &[Vec3]) -> Option<Vec3> {
    candidates
        .iter()
        .find(|v| v.is_finite() && v.length_squared() > DEGENERATE_EPSILON)
        .map(|v| v.normalize())
}

fn non_zero_or(v: Vec3, fallback: Vec3) -> Vec3 {
    first_valid_axis(&[v]).unwrap_or(fallback)
}

/// 修正量有限时作用到子树上
fn apply_correction(hierarchy: &BoneHierarchy, pose: &mut Pose, bone: usize, delta: Mat4) -> bool {
    if !delta.is_finite() {
        log::warn!("[IK] 骨骼 {} 的修正矩阵非有限值，已跳过", bone);
        return false;
    }
    pose.apply_delta(hierarchy, bone, delta);
    true
}
