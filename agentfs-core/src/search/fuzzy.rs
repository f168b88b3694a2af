/// Similarity of `pattern` against `text` in `[0.0, 1.0]`, case-insensitive.
///
/// - equal strings score 1.0;
/// - containment scores 0.7 plus up to 0.3 for how much of `text` the
///   pattern covers;
/// - an in-order subsequence scores at most 0.6, weighted evenly between
///   coverage and the longest consecutive run;
/// - anything else scores 0.
pub fn fuzzy_score(pattern: &str, text: &str) -> f64 {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();
    if pattern.is_empty() || text.is_empty() {
        return 0.0;
    }
    if pattern == text {
        return 1.0;
    }

    let coverage = pattern.len() as f64 / text.len() as f64;
    if pattern.len() <= text.len() && text.windows(pattern.len()).any(|w| w == pattern.as_slice())
    {
        return 0.7 + 0.3 * coverage;
    }

    let mut matched = 0;
    let mut run = 0;
    let mut longest_run = 0;
    let mut last_match: Option<usize> = None;
    for (i, c) in text.iter().enumerate() {
        if matched == pattern.len() {
            break;
        }
        if *c != pattern[matched] {
            continue;
        }
        run = match last_match {
            Some(prev) if prev + 1 == i => run + 1,
            _ => 1,
        };
        longest_run = longest_run.max(run);
        last_match = Some(i);
        matched += 1;
    }

    if matched < pattern.len() {
        return 0.0;
    }

    let run_ratio = longest_run as f64 / pattern.len() as f64;
    0.6 * (0.5 * coverage.min(1.0) + 0.5 * run_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact() {
        assert_eq!(fuzzy_score("main.rs", "MAIN.rs"), 1.0);
    }

    #[test]
    fn test_substring_scores_above_subsequence() {
        let substring = fuzzy_score("user", "user_service.rs");
        assert!(substring > 0.7 && substring < 1.0);
        let subsequence = fuzzy_score("usrsvc", "user_service.rs");
        assert!(subsequence > 0.0 && subsequence <= 0.6);
        assert!(substring > subsequence);
    }

    #[test]
    fn test_coverage_bonus() {
        assert!(fuzzy_score("auth", "auth.ts") > fuzzy_score("auth", "authentication_middleware.ts"));
    }

    #[test]
    fn test_consecutive_runs_preferred() {
        assert!(fuzzy_score("cfgld", "cfg_loader") > fuzzy_score("cfgld", "c_f_g_l_d_xxxxx"));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(fuzzy_score("zebra", "main.rs"), 0.0);
        assert_eq!(fuzzy_score("", "main.rs"), 0.0);
        assert_eq!(fuzzy_score("longer than text", "short"), 0.0);
    }
}
