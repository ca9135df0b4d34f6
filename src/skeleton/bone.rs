//! 骨骼节点
//!
//! Bone 只保存静态数据（名称、父子关系、初始位置等），
//! 每帧变化的矩阵全部放在 [`Pose`](super::Pose) 中。

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 骨骼类型与标志
// ============================================================================

/// 模型骨骼表中的骨骼类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BoneType {
    /// 旋转
    #[default]
    Rotation = 0,
    /// 旋转 + 移动
    RotAndMove = 1,
    /// IK
    Ik = 2,
    /// 未定义
    Undefined = 3,
    /// 受 IK 影响
    IkChild = 4,
    /// 受旋转影响
    RotationChild = 5,
    /// IK 接续目标
    IkDestination = 6,
    /// 不可见
    Invisible = 7,
}

impl BoneType {
    /// 从原始类型字节转换，未知值视为 Undefined
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Rotation,
            1 => Self::RotAndMove,
            2 => Self::Ik,
            4 => Self::IkChild,
            5 => Self::RotationChild,
            6 => Self::IkDestination,
            7 => Self::Invisible,
            _ => Self::Undefined,
        }
    }

    /// 由类型推导能力标志
    pub fn flags(self) -> BoneFlags {
        match self {
            Self::Rotation => BoneFlags::ROTATABLE | BoneFlags::VISIBLE,
            Self::RotAndMove => BoneFlags::ROTATABLE | BoneFlags::MOVABLE | BoneFlags::VISIBLE,
            Self::Ik => BoneFlags::MOVABLE | BoneFlags::IK | BoneFlags::VISIBLE,
            Self::IkChild => BoneFlags::ROTATABLE | BoneFlags::IK_LINK | BoneFlags::VISIBLE,
            Self::RotationChild => BoneFlags::VISIBLE,
            Self::IkDestination | Self::Invisible => BoneFlags::empty(),
            Self::Undefined => BoneFlags::ROTATABLE,
        }
    }
}

bitflags! {
    /// 骨骼能力标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 可旋转
        const ROTATABLE = 1 << 0;
        /// 可移动
        const MOVABLE = 1 << 1;
        /// 是 IK 骨骼
        const IK = 1 << 2;
        /// 属于 IK 链
        const IK_LINK = 1 << 3;
        /// 可见
        const VISIBLE = 1 << 4;
    }
}

// ============================================================================
// 骨骼记录（外部解码器输入）
// ============================================================================

/// 骨骼表中的一行，由模型解码器提供
///
/// 索引沿用模型格式的约定：负数或超出骨骼数量即表示“无”。
#[derive(Clone, Debug)]
pub struct BoneRecord {
    pub name: String,
    pub parent_index: i32,
    pub bone_type: BoneType,
    pub ik_parent_index: i32,
    pub position: Vec3,
}

impl BoneRecord {
    pub fn new(name: impl Into<String>, parent_index: i32, position: Vec3) -> Self {
        Self {
            name: name.into(),
            parent_index,
            bone_type: BoneType::Rotation,
            ik_parent_index: -1,
            position,
        }
    }

    pub fn with_type(mut self, bone_type: BoneType) -> Self {
        self.bone_type = bone_type;
        self
    }

    pub fn with_ik_parent(mut self, ik_parent_index: i32) -> Self {
        self.ik_parent_index = ik_parent_index;
        self
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct Bone {
    /// 骨骼名称
    pub name: String,

    /// 骨骼索引（按输入顺序分配）
    pub(crate) index: usize,

    /// 父骨骼索引
    pub(crate) parent: Option<usize>,

    /// IK 父骨骼索引
    ///
    /// 只随骨骼表原样保留，供外部查询；IK 求解全部在世界空间进行，不使用该坐标系。
    pub(crate) ik_parent: Option<usize>,

    /// 骨骼类型
    pub bone_type: BoneType,

    /// 由类型推导出的标志
    pub flags: BoneFlags,

    /// 初始位置（模型空间）
    pub rest_position: Vec3,

    /// 子骨骼索引
    pub(crate) children: Vec<usize>,
}

impl Bone {
    pub(crate) fn from_record(index: usize, record: &BoneRecord, bone_count: usize) -> Self {
        Self {
            name: record.name.clone(),
            index,
            parent: checked_index(record.parent_index, bone_count).filter(|&p| p != index),
            ik_parent: checked_index(record.ik_parent_index, bone_count),
            bone_type: record.bone_type,
            flags: record.bone_type.flags(),
            rest_position: record.position,
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    pub fn ik_parent_id(&self) -> Option<usize> {
        self.ik_parent
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    #[inline]
    pub fn is_ik(&self) -> bool {
        self.flags.contains(BoneFlags::IK)
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.flags.contains(BoneFlags::VISIBLE)
    }

    /// 由采样结果计算本地变换
    ///
    /// 绕初始位置旋转，再叠加动画平移：
    /// `T(translation) * T(rest) * R * T(-rest)`
    pub fn local_transform(&self, rotation: Quat, translation: Vec3) -> Mat4 {
        Mat4::from_translation(translation + self.rest_position)
            * Mat4::from_quat(rotation)
            * Mat4::from_translation(-self.rest_position)
    }
}

/// 将模型格式的有符号索引转换为有效索引
#[inline]
pub(crate) fn checked_index(raw: i32, count: usize) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&i| i < count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bone_type_flags() {
        assert!(BoneType::Ik.flags().contains(BoneFlags::IK));
        assert!(!BoneType::Rotation.flags().contains(BoneFlags::MOVABLE));
        assert_eq!(BoneType::from_raw(3), BoneType::Undefined);
        assert_eq!(BoneType::from_raw(200), BoneType::Undefined);
        assert!(!BoneType::Invisible.flags().contains(BoneFlags::VISIBLE));
    }

    #[test]
    fn test_checked_index() {
        assert_eq!(checked_index(-1, 4), None);
        assert_eq!(checked_index(4, 4), None);
        assert_eq!(checked_index(0xFFFF, 4), None);
        assert_eq!(checked_index(3, 4), Some(3));
    }

    #[test]
    fn test_ik_parent_index() {
        let record = BoneRecord::new("toe", -1, Vec3::ZERO).with_ik_parent(1);
        assert_eq!(Bone::from_record(0, &record, 2).ik_parent_id(), Some(1));

        let record = BoneRecord::new("toe", -1, Vec3::ZERO).with_ik_parent(0xFFFF);
        assert_eq!(Bone::from_record(0, &record, 2).ik_parent_id(), None);
    }

    #[test]
    fn test_self_parent_is_root() {
        let record = BoneRecord::new("loop", 0, Vec3::ZERO);
        let bone = Bone::from_record(0, &record, 1);
        assert!(bone.is_root());
    }

    #[test]
    fn test_local_transform_pivots_on_rest_position() {
        let record = BoneRecord::new("arm", -1, Vec3::new(0.0, 1.0, 0.0));
        let bone = Bone::from_record(0, &record, 1);
        let m = bone.local_transform(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 0.0, 2.0),
        );

        // 初始位置只受平移影响
        let pivot = m.transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!(pivot.abs_diff_eq(Vec3::new(0.0, 1.0, 2.0), 1e-5));

        // 绕初始位置旋转 90 度
        let tip = m.transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 2.0, 2.0), 1e-5));
    }
}
