//! Progress figures for goals and KAIs.

/// Whole-number percentage of `done` out of `total`, 0 when `total` is 0.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done.min(total) * 100) / total) as u8
}

/// Achievement of a KAI against its target, capped at 100.
///
/// `None` when there is no positive target to measure against.
pub fn achievement(achieved: Option<f64>, target: Option<f64>) -> Option<u8> {
    let target = target.filter(|t| *t > 0.0)?;
    let achieved = achieved.unwrap_or(0.0).max(0.0);
    Some(((achieved / target) * 100.0).min(100.0).floor() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_down_and_handles_empty() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(5, 3), 100);
    }

    #[test]
    fn achievement_needs_a_target() {
        assert_eq!(achievement(Some(5.0), None), None);
        assert_eq!(achievement(Some(5.0), Some(0.0)), None);
        assert_eq!(achievement(None, Some(10.0)), Some(0));
        assert_eq!(achievement(Some(7.5), Some(10.0)), Some(75));
        assert_eq!(achievement(Some(15.0), Some(10.0)), Some(100));
    }
}
