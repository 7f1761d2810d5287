//! Client build classification against the allowed version list.

/// Where a declared client build stands relative to what we accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    /// Build is on the allowed list.
    Ok,
    /// Older than an allowed build; a patch could bring it up to date.
    TooOld,
    /// Newer than everything we allow.
    TooNew,
}

/// The set of client builds this realm accepts. An empty list accepts any
/// build.
#[derive(Debug, Clone, Default)]
pub struct PatchLevel {
    allowed: Vec<u32>,
}

impl PatchLevel {
    pub fn new(allowed: Vec<u32>) -> Self {
        Self { allowed }
    }

    pub fn check(&self, build: u32) -> PatchState {
        if self.allowed.is_empty() || self.allowed.contains(&build) {
            return PatchState::Ok;
        }

        // any allowed build newer than the client means it can be patched up
        if self.allowed.iter().any(|allowed| *allowed > build) {
            PatchState::TooOld
        } else {
            PatchState::TooNew
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_build_is_ok() {
        let level = PatchLevel::new(vec![5875, 6005]);
        assert_eq!(level.check(5875), PatchState::Ok);
        assert_eq!(level.check(6005), PatchState::Ok);
    }

    #[test]
    fn older_build_is_patchable() {
        let level = PatchLevel::new(vec![5875]);
        assert_eq!(level.check(4544), PatchState::TooOld);
    }

    #[test]
    fn newer_build_is_too_new() {
        let level = PatchLevel::new(vec![5875]);
        assert_eq!(level.check(8606), PatchState::TooNew);
    }

    #[test]
    fn empty_list_accepts_any_build() {
        let level = PatchLevel::new(vec![]);
        assert_eq!(level.check(1), PatchState::Ok);
        assert_eq!(level.check(u32::MAX), PatchState::Ok);
    }
}
