//! 操作按钮识别
//!
//! 页面主操作按钮的文本决定任务形态：
//! "提交"→ 单页作答，"下一题"→ 题中题，缺失 → 无作答控件，
//! 其他文本 → 未知状态，防御性中止而不是猜。

/// 页面主操作控件的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    /// 提交按钮
    Submit,
    /// 下一题按钮
    Next,
    /// 没有可见的操作按钮
    Missing,
    /// 无法归类的按钮文本
    Unknown(String),
}

impl Affordance {
    /// 从按钮文本归类（按钮文字常带排版空格，如"提 交"）
    pub fn classify(text: Option<&str>) -> Affordance {
        let text = match text {
            Some(t) => t,
            None => return Affordance::Missing,
        };
        let squashed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        match squashed.as_str() {
            "" => Affordance::Missing,
            "提交" => Affordance::Submit,
            "下一题" => Affordance::Next,
            _ => Affordance::Unknown(text.trim().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_variants() {
        assert_eq!(Affordance::classify(Some("提交")), Affordance::Submit);
        assert_eq!(Affordance::classify(Some("提 交")), Affordance::Submit);
        assert_eq!(Affordance::classify(Some(" 提交 ")), Affordance::Submit);
    }

    #[test]
    fn test_next_variants() {
        assert_eq!(Affordance::classify(Some("下一题")), Affordance::Next);
        assert_eq!(Affordance::classify(Some("下 一 题")), Affordance::Next);
    }

    #[test]
    fn test_missing() {
        assert_eq!(Affordance::classify(None), Affordance::Missing);
        assert_eq!(Affordance::classify(Some("   ")), Affordance::Missing);
    }

    #[test]
    fn test_unknown_preserves_text() {
        assert_eq!(
            Affordance::classify(Some("返 回")),
            Affordance::Unknown("返 回".to_string())
        );
    }
}
