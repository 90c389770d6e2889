//! Fuzzy and literal substring matching.
//!
//! The fuzzy matcher is a greedy forward scan followed by a backward scan
//! that shrinks the window to the shortest one ending at the same place.
//! The window is then scored: every matched character earns a base score
//! plus a bonus depending on where it sits (word start, camel hump,
//! consecutive run), gaps cost an opening and an extension penalty, and
//! case agreement, a match at the very start and a whole-field match add
//! small bonuses on top.

/// Scoring constants for a single match.
#[derive(Debug, Clone, Copy)]
pub struct Scoring {
    pub match_score: i32,
    pub gap_open_penalty: i32,
    pub gap_extend_penalty: i32,
    pub boundary_bonus: i32,
    pub non_word_bonus: i32,
    pub camel_bonus: i32,
    pub consecutive_bonus: i32,
    pub first_char_multiplier: i32,
    pub matching_case_bonus: i32,
    pub prefix_bonus: i32,
    pub exact_match_bonus: i32,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            match_score: 16,
            gap_open_penalty: 3,
            gap_extend_penalty: 1,
            boundary_bonus: 8,
            non_word_bonus: 8,
            camel_bonus: 7,
            consecutive_bonus: 4,
            first_char_multiplier: 2,
            matching_case_bonus: 1,
            prefix_bonus: 8,
            exact_match_bonus: 8,
        }
    }
}

/// A successful match: strength and matched character positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub score: u32,
    pub positions: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    NonWord,
    Lower,
    Upper,
    Letter,
    Number,
}

fn class_of(c: char) -> CharClass {
    if c.is_lowercase() {
        CharClass::Lower
    } else if c.is_uppercase() {
        CharClass::Upper
    } else if c.is_numeric() {
        CharClass::Number
    } else if c.is_alphabetic() {
        CharClass::Letter
    } else {
        CharClass::NonWord
    }
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn bonus_for(scoring: &Scoring, prev: CharClass, curr: CharClass) -> i32 {
    if prev == CharClass::NonWord && curr != CharClass::NonWord {
        scoring.boundary_bonus
    } else if (prev == CharClass::Lower && curr == CharClass::Upper)
        || (prev != CharClass::Number && curr == CharClass::Number)
    {
        scoring.camel_bonus
    } else if curr == CharClass::NonWord {
        scoring.non_word_bonus
    } else {
        0
    }
}

/// Fuzzy-match `needle` against `haystack`, case-insensitively.
///
/// Returns `None` when not every needle character appears in order.
pub fn fuzzy_match(needle: &str, haystack: &str) -> Option<Match> {
    fuzzy_match_with(needle, haystack, &Scoring::default())
}

pub fn fuzzy_match_with(needle: &str, haystack: &str, scoring: &Scoring) -> Option<Match> {
    let needle: Vec<char> = needle.chars().collect();
    let haystack: Vec<char> = haystack.chars().collect();

    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let folded_needle: Vec<char> = needle.iter().map(|&c| fold(c)).collect();

    // Forward: first place where the whole needle has been seen in order.
    let mut pidx = 0;
    let mut end = None;
    for (idx, &c) in haystack.iter().enumerate() {
        if fold(c) == folded_needle[pidx] {
            pidx += 1;
            if pidx == folded_needle.len() {
                end = Some(idx + 1);
                break;
            }
        }
    }
    let end = end?;

    // Backward: latest start that still contains the needle.
    let mut pidx = folded_needle.len();
    let mut start = 0;
    for idx in (0..end).rev() {
        if fold(haystack[idx]) == folded_needle[pidx - 1] {
            pidx -= 1;
            if pidx == 0 {
                start = idx;
                break;
            }
        }
    }

    Some(score_window(&needle, &haystack, start, end, scoring))
}

/// Literal, case-insensitive substring match that must begin at a word
/// boundary (start of the field or after a non-word character).
pub fn exact_match(needle: &str, haystack: &str) -> Option<Match> {
    exact_match_with(needle, haystack, &Scoring::default())
}

pub fn exact_match_with(needle: &str, haystack: &str, scoring: &Scoring) -> Option<Match> {
    let needle: Vec<char> = needle.chars().collect();
    let haystack: Vec<char> = haystack.chars().collect();

    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let folded_needle: Vec<char> = needle.iter().map(|&c| fold(c)).collect();
    let folded_haystack: Vec<char> = haystack.iter().map(|&c| fold(c)).collect();

    (0..=haystack.len() - needle.len())
        .filter(|&start| start == 0 || class_of(haystack[start - 1]) == CharClass::NonWord)
        .find(|&start| folded_haystack[start..start + needle.len()] == folded_needle[..])
        .map(|start| score_window(&needle, &haystack, start, start + needle.len(), scoring))
}

fn score_window(
    needle: &[char],
    haystack: &[char],
    start: usize,
    end: usize,
    scoring: &Scoring,
) -> Match {
    let mut score = 0i32;
    let mut positions = Vec::with_capacity(needle.len());
    let mut in_gap = false;
    let mut consecutive = 0;
    let mut first_bonus = 0;
    let mut pidx = 0;
    let mut prev_class = if start > 0 {
        class_of(haystack[start - 1])
    } else {
        CharClass::NonWord
    };

    for (idx, &c) in haystack.iter().enumerate().take(end).skip(start) {
        let class = class_of(c);

        if pidx < needle.len() && fold(c) == fold(needle[pidx]) {
            score += scoring.match_score;

            let mut bonus = bonus_for(scoring, prev_class, class);
            if consecutive == 0 {
                first_bonus = bonus;
            } else {
                if bonus >= scoring.boundary_bonus && bonus > first_bonus {
                    first_bonus = bonus;
                }
                bonus = bonus.max(first_bonus).max(scoring.consecutive_bonus);
            }

            if pidx == 0 {
                score += bonus * scoring.first_char_multiplier;
            } else {
                score += bonus;
            }

            if c == needle[pidx] {
                score += scoring.matching_case_bonus;
            }

            positions.push(idx);
            in_gap = false;
            consecutive += 1;
            pidx += 1;
        } else {
            score -= if in_gap {
                scoring.gap_extend_penalty
            } else {
                scoring.gap_open_penalty
            };
            in_gap = true;
            consecutive = 0;
            first_bonus = 0;
        }

        prev_class = class;
    }

    if start == 0 {
        score += scoring.prefix_bonus;
    }

    if needle.len() == haystack.len() {
        score += scoring.exact_match_bonus;
    }

    Match {
        // A match always has positive strength, however long its gaps.
        score: score.max(1) as u32,
        positions,
    }
}
