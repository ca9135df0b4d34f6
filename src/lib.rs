//! MMD Motion - 骨骼动画与 IK 运行时核心
//!
//! 从已解码的骨骼表 / IK 表 / 关键帧表出发，每帧输出一组世界空间矩阵：
//! - 骨骼层级（arena + 索引子节点列表）
//! - VMD 风格的贝塞尔缓动与关键帧采样
//! - 层级矩阵合成
//! - IK 求解（LookAt / 两骨骼解析解 / CCD）
//! - 30 FPS 动画时钟
//!
//! 文件解析、GPU 资源与蒙皮计算不在本 crate 中。

pub mod animation;
pub mod config;
pub mod instance;
pub mod skeleton;

pub use animation::{
    AnimationClip, AnimationClipBuilder, AnimationClock, BezierCurve, IkEnableEntry,
    IkEnableTrack, KeyFrame, ManualTimeSource, TimeSource,
};
pub use config::AnimationConfig;
pub use instance::AnimatedInstance;
pub use skeleton::{
    Bone, BoneHierarchy, BoneRecord, BoneType, IkConfig, IkOutcome, IkSolver, IkSolverKind, Pose,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimError {
    #[error("skeleton has no bones")]
    EmptySkeleton,

    #[error("IK chain of bone {ik_bone} has no links")]
    EmptyIkChain { ik_bone: usize },

    #[error("{context}: bone index {index} out of range (bone count {count})")]
    BoneIndexOutOfRange {
        context: &'static str,
        index: usize,
        count: usize,
    },

    #[error("unknown bone: {0}")]
    UnknownBone(String),
}

pub type Result<T> = std::result::Result<T, AnimError>;
