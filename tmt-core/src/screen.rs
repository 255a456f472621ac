use crate::trial::TrialKind;

/// Views of the administration flow; exactly one is active at a time
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    Intro(TrialKind),
    Game,
    Final,
}

impl Default for Screen {
    fn default() -> Self {
        Screen::Welcome
    }
}

impl Screen {
    /// Where the flow goes once `kind` is finished or skipped
    pub fn after(kind: TrialKind) -> Self {
        match kind.next() {
            Some(next) => Screen::Intro(next),
            None => Screen::Final,
        }
    }

    pub fn allows_pointer(&self) -> bool {
        matches!(self, Screen::Game)
    }

    pub fn is_welcome(&self) -> bool {
        matches!(self, Screen::Welcome)
    }
}

/// "Activate view by identifier"
pub trait ScreenSelector {
    fn activate(&mut self, screen: Screen);
    fn active(&self) -> Screen;
}

/// Plain in-process selector; hosts read [`ScreenSelector::active`] to decide what to draw.
#[derive(Debug, Default, Clone)]
pub struct ScreenState {
    active: Screen,
    switches: usize,
}

impl ScreenState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of activations since creation
    pub fn switches(&self) -> usize {
        self.switches
    }
}

impl ScreenSelector for ScreenState {
    fn activate(&mut self, screen: Screen) {
        self.active = screen;
        self.switches += 1;
    }

    fn active(&self) -> Screen {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_after_each_trial() {
        assert_eq!(Screen::after(TrialKind::PracticeA), Screen::Intro(TrialKind::TestA));
        assert_eq!(Screen::after(TrialKind::TestA), Screen::Intro(TrialKind::PracticeB));
        assert_eq!(Screen::after(TrialKind::TestB), Screen::Final);
    }

    #[test]
    fn only_game_accepts_pointer() {
        assert!(Screen::Game.allows_pointer());
        assert!(!Screen::Intro(TrialKind::TestA).allows_pointer());
        assert!(!Screen::Final.allows_pointer());
    }

    #[test]
    fn state_tracks_single_active_screen() {
        let mut screens = ScreenState::new();
        assert!(screens.active().is_welcome());
        screens.activate(Screen::Game);
        screens.activate(Screen::Final);
        assert_eq!(screens.active(), Screen::Final);
        assert_eq!(screens.switches(), 2);
    }
}
