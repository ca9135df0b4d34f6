//! 动画系统
//!
//! - 贝塞尔缓动
//! - 关键帧与骨骼轨道
//! - IK 开关轨道
//! - 动画片段
//! - 动画时钟

mod bezier_curve;
mod clock;
mod ik_enable;
mod keyframe;
mod motion;
mod motion_track;

pub use bezier_curve::{ease, BezierCurve, Curve};
pub use clock::{AnimationClock, ManualTimeSource, SystemTimeSource, TimeSource};
pub use ik_enable::{IkEnableEntry, IkEnableTrack};
pub use keyframe::KeyFrame;
pub use motion::{AnimationClip, AnimationClipBuilder};
pub use motion_track::{BoneFrameTransform, BoneMotionTrack};
