//! Heuristic entity and relation extraction.
//!
//! [`PatternExtractor`] runs a fixed set of regular-expression recognizers
//! over English and Chinese text.  It is deliberately low-precision: the
//! [`EntityExtractor`] trait is the seam for swapping in a model-based
//! extractor without touching the stores.
//!
//! | Recognizer | Type | Confidence |
//! |------------|------|------------|
//! | English organization suffix (`Inc`, `Corp`, `University`, …) | organization | 0.8 |
//! | Chinese organization suffix (`公司`, `集团`, `大学`, …) | organization | 0.8 |
//! | Chinese location suffix (`省`, `市`, `县`, …) | location | 0.7 |
//! | Capitalized multi-word Latin name | person | 0.6 |
//! | Common Chinese surname + 1–2 characters | person | 0.7 |
//!
//! Recognizers run in table order.  A match overlapping an earlier match, or
//! repeating an earlier name case-insensitively, is dropped.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::graph::{EntityType, RelationType};

/// Confidence scaling applied to the mean entity confidence of a relation.
const RELATION_CONFIDENCE_FACTOR: f32 = 0.5;

// Han characters that are almost never part of a name.
const ZH_NAME_CHARS: &str = r"[\p{Han}&&[^的是在和与了于到从为被把给向我你他她它们也都就说这那有个]]";

static EN_ORG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:[A-Z][A-Za-z0-9&]*\s+){1,4}(?:Inc|Corp|Corporation|Ltd|LLC|Company|Co|Group|Foundation|University|Institute)\b",
    )
    .unwrap()
});

static ZH_ORG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{ZH_NAME_CHARS}{{2,8}}(?:公司|集团|大学|学院|研究所|银行|医院|协会|委员会)"
    ))
    .unwrap()
});

static ZH_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{ZH_NAME_CHARS}{{1,4}}(?:省|市|县|区|镇|村|州|国|岛|山|河|湖)"
    ))
    .unwrap()
});

static EN_PERSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").unwrap());

static ZH_PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "[王李张刘陈杨黄赵吴周徐孙马朱胡郭何高林罗郑梁谢宋唐许韩冯邓曹彭曾肖田董袁潘蒋蔡余杜叶程苏魏吕丁任沈姚卢姜崔钟谭陆汪范金石廖贾夏韦方白邹孟熊秦邱江尹薛段雷侯龙史陶黎贺顾毛郝龚邵万钱严武戴莫孔汤]{ZH_NAME_CHARS}{{1,2}}"
    ))
    .unwrap()
});

static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?。！？\n]+").unwrap());

/// Capitalized words that start sentences rather than names.
const LEADING_STOPWORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "A", "An", "In", "On", "At", "We", "I", "It",
    "Yesterday", "Today", "Tomorrow", "When", "After", "Before", "Then", "And", "But",
];

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f32,
}

/// A relation inferred between two extracted entities, addressed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub source: String,
    pub target: String,
    pub relation_type: RelationType,
    pub confidence: f32,
}

/// Turns free text into entity and relation candidates.
pub trait EntityExtractor: Send + Sync {
    fn extract_entities(&self, text: &str) -> Vec<ExtractedEntity>;

    /// Infer relations between `entities` that co-occur within a sentence of
    /// `text`.  The earlier mention in the sentence is the source.
    fn extract_relations(&self, text: &str, entities: &[ExtractedEntity]) -> Vec<ExtractedRelation>;
}

// ─────────────────────────────────────────────────────────────────────────────
// PatternExtractor
// ─────────────────────────────────────────────────────────────────────────────

/// Regex-based [`EntityExtractor`] for English and Chinese.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }
}

struct Recognizer {
    pattern: &'static LazyLock<Regex>,
    entity_type: EntityType,
    confidence: f32,
}

static RECOGNIZERS: [Recognizer; 5] = [
    Recognizer { pattern: &EN_ORG, entity_type: EntityType::Organization, confidence: 0.8 },
    Recognizer { pattern: &ZH_ORG, entity_type: EntityType::Organization, confidence: 0.8 },
    Recognizer { pattern: &ZH_LOCATION, entity_type: EntityType::Location, confidence: 0.7 },
    Recognizer { pattern: &EN_PERSON, entity_type: EntityType::Person, confidence: 0.6 },
    Recognizer { pattern: &ZH_PERSON, entity_type: EntityType::Person, confidence: 0.7 },
];

/// Drop leading sentence words; `None` when fewer than two words remain.
fn trim_person_candidate(candidate: &str) -> Option<(usize, &str)> {
    let mut offset = 0;
    let mut rest = candidate;
    while let Some((first, tail)) = rest.split_once(char::is_whitespace) {
        if !LEADING_STOPWORDS.contains(&first) {
            break;
        }
        let tail = tail.trim_start();
        offset += rest.len() - tail.len();
        rest = tail;
    }
    rest.contains(char::is_whitespace).then_some((offset, rest))
}

/// Keyword cues checked in order against the lowercased sentence.
fn infer_relation_type(sentence: &str) -> RelationType {
    let s = sentence.to_lowercase();
    let has = |cues: &[&str]| cues.iter().any(|c| s.contains(c));
    if has(&["work", "employ", "工作", "任职"]) {
        RelationType::WorksAt
    } else if has(&["located", " in ", "位于"]) {
        RelationType::LocatedIn
    } else if has(&["know", "meet", "met ", "认识"]) {
        RelationType::Knows
    } else if has(&["part of", "belong", "属于"]) {
        RelationType::PartOf
    } else if has(&["created", "founded", "创建", "创立"]) {
        RelationType::CreatedBy
    } else {
        RelationType::RelatedTo
    }
}

impl EntityExtractor for PatternExtractor {
    fn extract_entities(&self, text: &str) -> Vec<ExtractedEntity> {
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for recognizer in &RECOGNIZERS {
            for m in recognizer.pattern.find_iter(text) {
                let (mut start, mut name) = (m.start(), m.as_str());
                if recognizer.entity_type == EntityType::Person && name.is_ascii() {
                    let Some((offset, trimmed)) = trim_person_candidate(name) else {
                        continue;
                    };
                    start += offset;
                    name = trimmed;
                }
                let end = start + name.len();
                if taken.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                if !seen.insert(name.to_lowercase()) {
                    continue;
                }
                taken.push((start, end));
                out.push(ExtractedEntity {
                    name: name.to_string(),
                    entity_type: recognizer.entity_type,
                    confidence: recognizer.confidence,
                });
            }
        }
        out
    }

    fn extract_relations(&self, text: &str, entities: &[ExtractedEntity]) -> Vec<ExtractedRelation> {
        let mut out = Vec::new();
        for sentence in SENTENCE_SPLIT.split(text) {
            let lowered = sentence.to_lowercase();
            let mut located: Vec<(usize, &ExtractedEntity)> = entities
                .iter()
                .filter_map(|e| lowered.find(&e.name.to_lowercase()).map(|pos| (pos, e)))
                .collect();
            if located.len() < 2 {
                continue;
            }
            located.sort_by_key(|(pos, _)| *pos);
            let present: Vec<&ExtractedEntity> = located.into_iter().map(|(_, e)| e).collect();
            let relation_type = infer_relation_type(sentence);
            for (i, source) in present.iter().enumerate() {
                for target in &present[i + 1..] {
                    out.push(ExtractedRelation {
                        source: source.name.clone(),
                        target: target.name.clone(),
                        relation_type,
                        confidence: (source.confidence + target.confidence) / 2.0
                            * RELATION_CONFIDENCE_FACTOR,
                    });
                }
            }
        }
        out
    }
}
