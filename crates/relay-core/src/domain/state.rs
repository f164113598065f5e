//! Lifecycle of a task handler.

use serde::{Deserialize, Serialize};

/// LambdaState は handler の状態
///
/// # 遷移
/// ```text
/// Created ──launch──▶ Running ──complete──▶ CompletedDisposable
///                        │          └──────▶ CompletedPinned ──stop──▶ Stopped
///                        └──────────stop─────────────────────────────▶ Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LambdaState {
    /// Handler built, engine has not launched the program yet.
    Created,
    /// Registered, remote program executing.
    Running,
    /// Completed once and removed from the registry.
    CompletedDisposable,
    /// Completed once, stays registered for `call()` traffic.
    CompletedPinned,
    /// Terminated by `stop()`.
    Stopped,
}

impl LambdaState {
    /// State reached by the first completion delivery.
    pub fn completed(pinned: bool) -> Self {
        if pinned {
            Self::CompletedPinned
        } else {
            Self::CompletedDisposable
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, Self::CompletedDisposable | Self::CompletedPinned)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::CompletedDisposable | Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pinned(true, LambdaState::CompletedPinned)]
    #[case::disposable(false, LambdaState::CompletedDisposable)]
    fn completion_state_follows_pin_flag(#[case] pinned: bool, #[case] expected: LambdaState) {
        assert_eq!(LambdaState::completed(pinned), expected);
        assert!(expected.is_completed());
    }

    #[test]
    fn only_disposable_and_stopped_are_terminal() {
        assert!(LambdaState::Stopped.is_terminal());
        assert!(LambdaState::CompletedDisposable.is_terminal());
        assert!(!LambdaState::CompletedPinned.is_terminal());
        assert!(!LambdaState::Running.is_terminal());
    }
}
