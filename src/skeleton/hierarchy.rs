//! 骨骼层级
//!
//! 构建后不可变，可通过 `Arc` 在多个实例间共享。
//! 遍历顺序在构建时一次性计算（先序 DFS，父骨骼总在子骨骼之前），
//! 因此任意骨骼的子树在遍历顺序中是一段连续区间。

use std::collections::HashMap;

use super::bone::{Bone, BoneRecord};
use crate::{AnimError, Result};

/// 骨骼层级
#[derive(Clone, Debug)]
pub struct BoneHierarchy {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    /// 先序遍历顺序
    order: Vec<usize>,
    /// 每个骨骼在遍历顺序中的位置
    order_position: Vec<usize>,
    /// 每个骨骼子树（含自身）的大小
    subtree_len: Vec<usize>,
}

impl BoneHierarchy {
    /// 从骨骼表构建层级
    ///
    /// - 父索引越界的骨骼视为根骨骼
    /// - 会形成环的父链接被断开，该骨骼视为根骨骼
    /// - 重名骨骼只有第一个能通过名称查找到
    pub fn build(records: &[BoneRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(AnimError::EmptySkeleton);
        }

        let count = records.len();
        let mut bones: Vec<Bone> = records
            .iter()
            .enumerate()
            .map(|(i, record)| Bone::from_record(i, record, count))
            .collect();

        for (bone, record) in bones.iter().zip(records) {
            if bone.parent.is_none() && record.parent_index >= 0 {
                log::debug!(
                    "[Skeleton] 骨骼 '{}' 的父索引 {} 无效，视为根骨骼",
                    bone.name,
                    record.parent_index
                );
            }
        }

        Self::break_cycles(&mut bones);

        let mut name_to_index = HashMap::with_capacity(count);
        for bone in &bones {
            if name_to_index.contains_key(&bone.name) {
                log::warn!("[Skeleton] 骨骼名称重复: '{}' (索引 {})", bone.name, bone.index);
            } else {
                name_to_index.insert(bone.name.clone(), bone.index);
            }
        }

        for i in 0..count {
            if let Some(parent) = bones[i].parent {
                bones[parent].children.push(i);
            }
        }

        let (order, subtree_len) = Self::compute_order(&bones);
        let mut order_position = vec![0; count];
        for (pos, &idx) in order.iter().enumerate() {
            order_position[idx] = pos;
        }

        Ok(Self {
            bones,
            name_to_index,
            order,
            order_position,
            subtree_len,
        })
    }

    /// 断开父链中的环
    fn break_cycles(bones: &mut [Bone]) {
        let count = bones.len();
        for i in 0..count {
            let mut current = bones[i].parent;
            let mut steps = 0;
            while let Some(ancestor) = current {
                if ancestor == i {
                    log::warn!("[Skeleton] 骨骼 '{}' 的父链存在环，视为根骨骼", bones[i].name);
                    bones[i].parent = None;
                    break;
                }
                steps += 1;
                if steps > count {
                    // 环不经过 i，轮到环上的骨骼时再断开
                    break;
                }
                current = bones[ancestor].parent;
            }
        }
    }

    /// 先序 DFS（显式栈），返回遍历顺序和各子树大小
    fn compute_order(bones: &[Bone]) -> (Vec<usize>, Vec<usize>) {
        let count = bones.len();
        let mut order = Vec::with_capacity(count);
        let mut subtree_len = vec![1; count];
        let mut stack = Vec::new();

        for root in bones.iter().filter(|b| b.is_root()) {
            stack.push(root.index);
            while let Some(idx) = stack.pop() {
                order.push(idx);
                stack.extend(bones[idx].children.iter().rev());
            }
        }

        // 逆序累加，子骨骼总在父骨骼之后
        for &idx in order.iter().rev() {
            if let Some(parent) = bones[idx].parent {
                subtree_len[parent] += subtree_len[idx];
            }
        }

        (order, subtree_len)
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// 通过名称查找骨骼索引
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 通过名称查找骨骼
    pub fn find(&self, name: &str) -> Option<&Bone> {
        self.index_of(name).map(|i| &self.bones[i])
    }

    /// 父骨骼先于子骨骼的完整遍历顺序
    #[inline]
    pub fn traversal_order(&self) -> &[usize] {
        &self.order
    }

    /// 以 `index` 为根的子树（含自身），父骨骼在前
    pub fn subtree(&self, index: usize) -> &[usize] {
        match (self.order_position.get(index), self.subtree_len.get(index)) {
            (Some(&start), Some(&len)) => &self.order[start..start + len],
            _ => &[],
        }
    }

    /// `descendant` 是否位于 `ancestor` 的子树中（含自身）
    pub fn is_in_subtree(&self, ancestor: usize, descendant: usize) -> bool {
        match (
            self.order_position.get(ancestor),
            self.order_position.get(descendant),
        ) {
            (Some(&a), Some(&d)) => d >= a && d < a + self.subtree_len[ancestor],
            _ => false,
        }
    }

    /// 类型为 IK 的骨骼
    pub fn ik_bones(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(|b| b.is_ik())
    }
}
