//! 重试参数阶梯
//!
//! 每句语音按固定偏好顺序尝试不同的合成参数，依分数推进：
//!
//! - 分数 ≥ 85：优秀，立即接受，不再消耗后续尝试
//! - 分数 < 60：硬性失败，中止整页（明显的合成/评分不匹配是系统性的，
//!   继续尝试只会浪费调用）
//! - 60 ≤ 分数 < 85：换下一组参数继续
//! - 参数用尽后：历史最高分 ≥ 80 判定为可接受，否则中止整页

/// 优秀线：达到即停
pub const SCORE_EXCELLENT: u32 = 85;
/// 硬性失败线：低于即整页中止
pub const SCORE_HARD_FAIL: u32 = 60;
/// 用尽后的可接受线
pub const SCORE_ACCEPTABLE: u32 = 80;

/// 一组 TTS 合成参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthProfile {
    pub length_scale: f64,
    pub noise_scale: f64,
    pub noise_w: f64,
    pub description: &'static str,
}

/// 固定偏好顺序的重试参数表
pub const RETRY_PROFILES: [SynthProfile; 3] = [
    SynthProfile {
        length_scale: 1.0,
        noise_scale: 0.2,
        noise_w: 0.2,
        description: "正常语速，低噪声",
    },
    SynthProfile {
        length_scale: 0.9,
        noise_scale: 0.33,
        noise_w: 0.4,
        description: "稍快语速，中等噪声",
    },
    SynthProfile {
        length_scale: 1.1,
        noise_scale: 0.1,
        noise_w: 0.1,
        description: "稍慢语速，极低噪声",
    },
];

/// 单次打分后的阶梯推进
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderStep {
    /// 优秀，立即接受
    AcceptExcellent,
    /// 硬性失败，中止整页
    HardFail,
    /// 继续下一组参数
    Continue,
}

/// 参数用尽后的最终裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderVerdict {
    /// 最高分达到可接受线
    AcceptAcceptable { best_score: u32 },
    /// 最高分仍不达标，中止整页
    Abort { best_score: u32 },
}

/// 分数阶梯状态机
///
/// 显式状态而不是嵌套循环里的可变累加器，
/// 单调停止和硬性失败两条性质可以直接对照状态转移表检验。
#[derive(Debug, Default)]
pub struct ScoreLadder {
    best_score: u32,
    attempts: usize,
}

impl ScoreLadder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已消耗的尝试次数
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// 历史最高分
    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    /// 喂入一次打分，返回推进方向
    pub fn observe(&mut self, score: u32) -> LadderStep {
        self.attempts += 1;
        if score > self.best_score {
            self.best_score = score;
        }
        if score >= SCORE_EXCELLENT {
            LadderStep::AcceptExcellent
        } else if score < SCORE_HARD_FAIL {
            LadderStep::HardFail
        } else {
            LadderStep::Continue
        }
    }

    /// 参数用尽后的最终裁决
    pub fn finish(&self) -> LadderVerdict {
        if self.best_score >= SCORE_ACCEPTABLE {
            LadderVerdict::AcceptAcceptable {
                best_score: self.best_score,
            }
        } else {
            LadderVerdict::Abort {
                best_score: self.best_score,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 按顺序喂入分数，返回 (推进记录, 阶梯)
    fn feed(scores: &[u32]) -> (Vec<LadderStep>, ScoreLadder) {
        let mut ladder = ScoreLadder::new();
        let mut steps = Vec::new();
        for &s in scores {
            let step = ladder.observe(s);
            steps.push(step);
            if step != LadderStep::Continue {
                break;
            }
        }
        (steps, ladder)
    }

    #[test]
    fn test_monotonic_stop_at_excellent() {
        // [72, 68, 91]：第三次达到优秀线即停，不再有第四次
        let (steps, ladder) = feed(&[72, 68, 91]);
        assert_eq!(
            steps,
            vec![
                LadderStep::Continue,
                LadderStep::Continue,
                LadderStep::AcceptExcellent
            ]
        );
        assert_eq!(ladder.attempts(), 3);
    }

    #[test]
    fn test_first_attempt_excellent_stops_immediately() {
        let (steps, ladder) = feed(&[85]);
        assert_eq!(steps, vec![LadderStep::AcceptExcellent]);
        assert_eq!(ladder.attempts(), 1);
    }

    #[test]
    fn test_hard_fail_aborts_even_with_profiles_remaining() {
        // [82, 55]：第二次低于硬性失败线，即使还有参数未用也立即中止
        let (steps, _) = feed(&[82, 55]);
        assert_eq!(steps, vec![LadderStep::Continue, LadderStep::HardFail]);
    }

    #[test]
    fn test_boundary_scores() {
        let mut ladder = ScoreLadder::new();
        assert_eq!(ladder.observe(60), LadderStep::Continue);
        assert_eq!(ladder.observe(84), LadderStep::Continue);
        assert_eq!(ladder.observe(59), LadderStep::HardFail);
    }

    #[test]
    fn test_exhaustion_accepts_at_80() {
        let (steps, ladder) = feed(&[72, 81, 76]);
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| *s == LadderStep::Continue));
        assert_eq!(
            ladder.finish(),
            LadderVerdict::AcceptAcceptable { best_score: 81 }
        );
    }

    #[test]
    fn test_exhaustion_below_80_aborts() {
        let (_, ladder) = feed(&[72, 68, 79]);
        assert_eq!(ladder.finish(), LadderVerdict::Abort { best_score: 79 });
    }

    #[test]
    fn test_profiles_are_three_in_preference_order() {
        assert_eq!(RETRY_PROFILES.len(), 3);
        assert_eq!(RETRY_PROFILES[0].length_scale, 1.0);
        assert_eq!(RETRY_PROFILES[1].length_scale, 0.9);
        assert_eq!(RETRY_PROFILES[2].length_scale, 1.1);
    }
}
