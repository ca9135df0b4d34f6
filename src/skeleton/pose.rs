//! 姿势与矩阵合成
//!
//! Pose 是单个角色实例独占的可变状态：
//! - 每骨骼一个本地变换（默认单位矩阵）
//! - 每骨骼一个世界变换，外加一个整体变换槽位
//!
//! 导出布局：`[actor, bone0, bone1, ...]`，与渲染端的常量缓冲区一致。

use glam::{Mat4, Vec3};

use super::hierarchy::BoneHierarchy;

/// 单个实例的骨骼姿势
#[derive(Clone, Debug)]
pub struct Pose {
    locals: Vec<Mat4>,
    /// 槽位 0 为整体变换，其后按骨骼索引排列
    matrices: Vec<Mat4>,
}

impl Pose {
    pub fn new(bone_count: usize) -> Self {
        Self {
            locals: vec![Mat4::IDENTITY; bone_count],
            matrices: vec![Mat4::IDENTITY; bone_count + 1],
        }
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.locals.len()
    }

    // ========================================
    // 本地变换
    // ========================================

    /// 本地变换全部重置为单位矩阵
    pub fn reset_locals(&mut self) {
        self.locals.fill(Mat4::IDENTITY);
    }

    #[inline]
    pub fn local(&self, index: usize) -> Option<Mat4> {
        self.locals.get(index).copied()
    }

    #[inline]
    pub fn locals(&self) -> &[Mat4] {
        &self.locals
    }

    pub fn set_local(&mut self, index: usize, transform: Mat4) {
        if let Some(slot) = self.locals.get_mut(index) {
            *slot = transform;
        }
    }

    // ========================================
    // 世界变换
    // ========================================

    #[inline]
    pub fn world(&self, index: usize) -> Option<Mat4> {
        self.matrices.get(index + 1).copied()
    }

    pub fn set_world(&mut self, index: usize, transform: Mat4) {
        if let Some(slot) = self.matrices.get_mut(index + 1) {
            *slot = transform;
        }
    }

    /// 按骨骼索引排列的世界变换
    #[inline]
    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.matrices[1..]
    }

    /// 导出给渲染端的完整缓冲区（整体变换 + 骨骼）
    #[inline]
    pub fn export(&self) -> &[Mat4] {
        &self.matrices
    }

    #[inline]
    pub fn actor_transform(&self) -> Mat4 {
        self.matrices[0]
    }

    #[inline]
    pub fn set_actor_transform(&mut self, transform: Mat4) {
        self.matrices[0] = transform;
    }

    /// 骨骼当前姿势下的位置（初始位置经世界变换）
    pub fn position(&self, hierarchy: &BoneHierarchy, index: usize) -> Option<Vec3> {
        let bone = hierarchy.get(index)?;
        let world = self.world(index)?;
        Some(world.transform_point3(bone.rest_position))
    }

    /// 骨骼世界变换全部重置为单位矩阵（保留整体变换）
    pub fn reset_worlds(&mut self) {
        self.matrices[1..].fill(Mat4::IDENTITY);
    }

    // ========================================
    // 合成
    // ========================================

    /// 从 `root` 开始沿层级合成世界变换
    ///
    /// `world[root] = local[root]`，`world[c] = world[parent] * local[c]`。
    /// 不在 `root` 子树中的骨骼保持单位矩阵。
    pub fn compose_from(&mut self, hierarchy: &BoneHierarchy, root: usize) {
        self.reset_worlds();

        let subtree = hierarchy.subtree(root);
        let Some((&first, rest)) = subtree.split_first() else {
            return;
        };

        self.matrices[first + 1] = self.locals[first];
        for &idx in rest {
            // 子树中除根以外的骨骼必有父骨骼，且父骨骼已先处理
            let parent = hierarchy.bones()[idx].parent_id().unwrap_or(first);
            self.matrices[idx + 1] = self.matrices[parent + 1] * self.locals[idx];
        }
    }

    /// 按名称查找根骨骼并合成；找不到根骨骼时返回 false，世界变换全为单位矩阵
    pub fn compose(&mut self, hierarchy: &BoneHierarchy, root_name: &str) -> bool {
        match hierarchy.index_of(root_name) {
            Some(root) => {
                self.compose_from(hierarchy, root);
                true
            }
            None => {
                self.reset_worlds();
                false
            }
        }
    }

    /// 将世界空间的修正变换左乘到 `index` 的整个子树上
    ///
    /// IK 用它保持子骨骼与修正后的关节一致。
    pub fn apply_delta(&mut self, hierarchy: &BoneHierarchy, index: usize, delta: Mat4) {
        for &idx in hierarchy.subtree(index) {
            self.matrices[idx + 1] = delta * self.matrices[idx + 1];
        }
    }

    /// 所有矩阵是否都是有限值
    pub fn is_finite(&self) -> bool {
        self.matrices.iter().all(|m| m.is_finite())
    }
}
