//! 在识别文本中检测题头

use regex::{Regex, RegexBuilder};

use crate::Result;

/// 未配置时使用的题头模式，不区分大小写
pub const DEFAULT_QUESTION_PATTERN: &str = r"(Question\s*\d+|Problem\s*\d+|Q\s*\d+)";

/// 判断页面文本是否开始新的题目
#[derive(Debug, Clone)]
pub struct BoundaryDetector {
    pattern: Regex,
}

impl BoundaryDetector {
    /// 以不区分大小写的方式编译 `pattern`
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { pattern })
    }

    pub fn is_boundary(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// `text` 中的第一个题头，用于诊断
    pub fn find_header<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern.find(text).map(|m| m.as_str())
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for BoundaryDetector {
    fn default() -> Self {
        Self::new(DEFAULT_QUESTION_PATTERN).expect("default question pattern is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_headers() {
        let detector = BoundaryDetector::default();
        assert!(detector.is_boundary("Question 1"));
        assert!(detector.is_boundary("PROBLEM 12: integrate"));
        assert!(detector.is_boundary("q3"));
        assert!(detector.is_boundary("see Q 7 below"));
        assert!(detector.is_boundary("question\n  4"));
        assert!(detector.is_boundary("Question4"));
    }

    #[test]
    fn test_default_pattern_rejects_plain_text() {
        let detector = BoundaryDetector::default();
        assert!(!detector.is_boundary(""));
        assert!(!detector.is_boundary("Questions are listed on the back"));
        assert!(!detector.is_boundary("Problem set, continued"));
        assert!(!detector.is_boundary("x = 42"));
    }

    #[test]
    fn test_find_header() {
        let detector = BoundaryDetector::default();
        assert_eq!(
            detector.find_header("Name: Alice\nQuestion 2 (10 pts)"),
            Some("Question 2")
        );
        assert_eq!(detector.find_header("no header"), None);
    }

    #[test]
    fn test_custom_pattern_is_case_insensitive() {
        let detector = BoundaryDetector::new(r"Part\s*[A-D]\b").unwrap();
        assert!(detector.is_boundary("PART B"));
        assert!(detector.is_boundary("part c."));
        assert!(!detector.is_boundary("Question 1"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(BoundaryDetector::new(r"(Question\s*\d+").is_err());
    }
}
