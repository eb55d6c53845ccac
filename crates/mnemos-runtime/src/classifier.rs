//! Content classification and importance estimation.
//!
//! Both heuristics scan for fixed English and Chinese keyword sets.  They run
//! only when a caller of
//! [`MemoryManager::add_memory`][crate::manager::MemoryManager::add_memory]
//! leaves the memory type or importance unspecified.

use mnemos_types::{DEFAULT_IMPORTANCE, MemoryType, Metadata, clamp_unit};

const EPISODIC_CUES: &[&str] = &[
    "event", "meeting", "yesterday", "today", "happened", "occurred", "last week",
    "发生", "昨天", "今天", "会议", "上次", "经历",
];

const SEMANTIC_CUES: &[&str] = &[
    "definition", "concept", "means", "fact", "knowledge", "theory", "principle",
    "概念", "是指", "定义", "原理", "知识",
];

const HIGH_IMPORTANCE_CUES: &[&str] = &[
    "important", "critical", "urgent", "remember", "must", "key", "essential",
    "重要", "关键", "紧急", "必须", "记住",
];

const LOW_IMPORTANCE_CUES: &[&str] = &[
    "maybe", "perhaps", "trivial", "minor", "casual",
    "琐碎", "随便", "也许", "或许",
];

const KEYWORD_ADJUSTMENT: f32 = 0.15;
const PRIORITY_ADJUSTMENT: f32 = 0.2;

fn contains_any(haystack: &str, cues: &[&str]) -> bool {
    cues.iter().any(|c| haystack.contains(c))
}

/// Pick a tier for `content`.
///
/// Episodic cues are checked before semantic cues; anything else is working
/// memory.
///
/// ```
/// use mnemos_runtime::classifier::classify;
/// use mnemos_types::MemoryType;
///
/// assert_eq!(classify("We had a meeting yesterday"), MemoryType::Episodic);
/// assert_eq!(classify("The definition of AI is..."), MemoryType::Semantic);
/// assert_eq!(classify("anything else"), MemoryType::Working);
/// ```
pub fn classify(content: &str) -> MemoryType {
    let lowered = content.to_lowercase();
    if contains_any(&lowered, EPISODIC_CUES) {
        MemoryType::Episodic
    } else if contains_any(&lowered, SEMANTIC_CUES) {
        MemoryType::Semantic
    } else {
        MemoryType::Working
    }
}

/// Estimate the importance of `content` in `[0, 1]`.
///
/// A numeric `importance` in `metadata` is returned as-is (clamped).
/// Otherwise, starting from 0.5:
///
/// | Rule | Adjustment |
/// |------|------------|
/// | fewer than 20 characters | −0.1 |
/// | more than 200 characters | +0.1 |
/// | more than 500 characters | +0.2 (replaces the +0.1) |
/// | a high-importance keyword | +0.15 |
/// | otherwise a low-importance keyword | −0.15 |
/// | `priority` metadata `high` / `low` | ±0.2 |
pub fn estimate_importance(content: &str, metadata: &Metadata) -> f32 {
    if let Some(explicit) = metadata.get("importance").and_then(|v| v.as_f64()) {
        return clamp_unit(explicit as f32);
    }

    let mut score = DEFAULT_IMPORTANCE;
    let len = content.chars().count();
    if len < 20 {
        score -= 0.1;
    } else if len > 500 {
        score += 0.2;
    } else if len > 200 {
        score += 0.1;
    }

    let lowered = content.to_lowercase();
    if contains_any(&lowered, HIGH_IMPORTANCE_CUES) {
        score += KEYWORD_ADJUSTMENT;
    } else if contains_any(&lowered, LOW_IMPORTANCE_CUES) {
        score -= KEYWORD_ADJUSTMENT;
    }

    match metadata.get("priority").and_then(|v| v.as_str()) {
        Some(p) if p.eq_ignore_ascii_case("high") => score += PRIORITY_ADJUSTMENT,
        Some(p) if p.eq_ignore_ascii_case("low") => score -= PRIORITY_ADJUSTMENT,
        _ => {}
    }

    clamp_unit(score)
}
