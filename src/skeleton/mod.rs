//! 骨骼系统
//!
//! - Bone: 单个骨骼节点（静态数据）
//! - BoneHierarchy: 骨骼层级，构建后不可变，多个实例共享
//! - Pose: 单个实例的本地/世界变换
//! - IkSolver: IK 求解器

mod bone;
mod hierarchy;
mod ik_solver;
mod pose;

pub use bone::{Bone, BoneFlags, BoneRecord, BoneType};
pub use hierarchy::BoneHierarchy;
pub use ik_solver::{IkConfig, IkOutcome, IkSolver, IkSolverKind, TwoBoneAngles};
pub use pose::Pose;
