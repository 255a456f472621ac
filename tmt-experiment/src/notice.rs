use std::time::Duration;

/// Transient warning shown after a rejected click
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub shown_at_ns: u64,
    pub hide_after: Duration,
}

impl Notice {
    pub fn new(text: impl Into<String>, shown_at_ns: u64, hide_after: Duration) -> Self {
        Self {
            text: text.into(),
            shown_at_ns,
            hide_after,
        }
    }

    pub fn visible(&self, now_ns: u64) -> bool {
        now_ns.saturating_sub(self.shown_at_ns) < self.hide_after.as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hides_after_delay() {
        let notice = Notice::new("wrong", 1_000, Duration::from_millis(3000));
        assert!(notice.visible(1_000));
        assert!(notice.visible(1_000 + 2_999_999_999));
        assert!(!notice.visible(1_000 + 3_000_000_000));
    }
}
