//! IK 开关轨道
//!
//! 每个条目记录某一帧起各 IK 骨骼的开关状态。查找时使用不晚于当前帧的
//! 最后一个条目；条目中没有提到的骨骼视为启用。

use std::collections::HashMap;

/// IK 开关条目
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IkEnableEntry {
    pub frame_no: u32,
    /// IK 骨骼名称 -> 是否启用
    pub flags: HashMap<String, bool>,
}

impl IkEnableEntry {
    pub fn new<I, S>(frame_no: u32, flags: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self {
            frame_no,
            flags: flags.into_iter().map(|(name, on)| (name.into(), on)).collect(),
        }
    }
}

/// IK 开关轨道
#[derive(Debug, Clone, Default)]
pub struct IkEnableTrack {
    entries: Vec<IkEnableEntry>,
}

impl IkEnableTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: IkEnableEntry) {
        self.entries.push(entry);
    }

    /// 按帧索引稳定排序
    pub fn finish(&mut self) {
        self.entries.sort_by_key(|entry| entry.frame_no);
    }

    #[inline]
    pub fn entries(&self) -> &[IkEnableEntry] {
        &self.entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 不晚于 `frame_no` 的最后一个条目
    pub fn entry_at(&self, frame_no: u32) -> Option<&IkEnableEntry> {
        self.entries.iter().rev().find(|entry| entry.frame_no <= frame_no)
    }

    /// 指定 IK 骨骼在该帧是否启用
    pub fn is_enabled(&self, name: &str, frame_no: u32) -> bool {
        self.entry_at(frame_no)
            .and_then(|entry| entry.flags.get(name).copied())
            .unwrap_or(true)
    }

    pub fn max_frame_index(&self) -> u32 {
        self.entries.last().map_or(0, |entry| entry.frame_no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knee_track() -> IkEnableTrack {
        let mut track = IkEnableTrack::new();
        track.push(IkEnableEntry::new(50, [("knee", false)]));
        track.push(IkEnableEntry::new(0, [("knee", true)]));
        track.finish();
        track
    }

    #[test]
    fn test_gating_by_frame() {
        let track = knee_track();
        assert!(track.is_enabled("knee", 10));
        assert!(!track.is_enabled("knee", 50));
        assert!(!track.is_enabled("knee", 60));
        assert_eq!(track.entry_at(60).unwrap().frame_no, 50);
    }

    #[test]
    fn test_missing_name_is_enabled() {
        let track = knee_track();
        assert!(track.is_enabled("toe", 60));
        assert!(IkEnableTrack::new().is_enabled("knee", 0));
    }
}
