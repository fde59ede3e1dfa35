//! Week-space time interval algebra
//!
//! Call windows are expressed as `[start, end)` minute intervals in a week
//! of 10080 minutes starting Sunday 00:00. Each interval carries an opaque
//! value (a work grade or a byte-count limit) and a retry interval.
// (c) 2025 Ross Younger

use std::cmp::Ordering;

use serde::Serialize;

use crate::errors::{ErrorKind, Result};

/// Minutes in a day
pub const MINUTES_PER_DAY: u32 = 24 * 60;
/// Minutes in a week; the exclusive upper bound of week space
pub const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

/// The highest work grade
pub const GRADE_HIGH: char = '0';
/// The lowest work grade, used when a window does not specify one
pub const GRADE_LOW: char = 'z';

/// Whether `c` is a legal work grade (`0`-`9`, `A`-`Z`, `a`-`z`)
#[must_use]
pub fn valid_grade(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// A grade character as a span value
#[must_use]
pub fn grade_value(c: char) -> i64 {
    i64::from(u32::from(c))
}

/// Decides which of two span values takes precedence when intervals
/// overlap. `Less` means the first argument wins.
pub type PrecedenceCmp = fn(i64, i64) -> Ordering;

fn grade_class(g: i64) -> u8 {
    match u8::try_from(g) {
        Ok(c) if c.is_ascii_digit() => 0,
        Ok(c) if c.is_ascii_uppercase() => 1,
        _ => 2,
    }
}

/// Grade precedence: digits beat uppercase beat lowercase, ordered by
/// character code within each class. Lower wins.
#[must_use]
pub fn grade_cmp(a: i64, b: i64) -> Ordering {
    (grade_class(a), a).cmp(&(grade_class(b), b))
}

/// Size-limit precedence: plain numeric ordering; the smaller (more
/// restrictive) limit wins an overlap.
#[must_use]
pub fn size_cmp(a: i64, b: i64) -> Ordering {
    a.cmp(&b)
}

/// One `[start, end)` interval in week space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    /// Start minute, inclusive
    pub start: u32,
    /// End minute, exclusive
    pub end: u32,
    /// Opaque value: a grade character code, or a byte count
    pub value: i64,
    /// Retry interval in minutes; 0 means the caller's default backoff
    pub retry: u32,
}

const DAY_NAMES: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

impl TimeSpan {
    /// Renders the span back into expression syntax, one clause per day
    /// touched (`Tu0800-1200`, or a bare day name for a full day). The
    /// whole week renders as `Any`.
    #[must_use]
    pub fn expression(&self) -> String {
        if self.start == 0 && self.end == MINUTES_PER_WEEK {
            return "Any".to_string();
        }
        let mut clauses = Vec::new();
        let mut start = self.start;
        while start < self.end {
            let day = start / MINUTES_PER_DAY;
            let day_end = (day + 1) * MINUTES_PER_DAY;
            let end = self.end.min(day_end);
            let name = DAY_NAMES[day as usize];
            if start == day * MINUTES_PER_DAY && end == day_end {
                clauses.push(name.to_string());
            } else {
                let (sh, sm) = ((start % MINUTES_PER_DAY) / 60, start % 60);
                let (eh, em) = if end == day_end {
                    (24, 0)
                } else {
                    ((end % MINUTES_PER_DAY) / 60, end % 60)
                };
                clauses.push(format!("{name}{sh:02}{sm:02}-{eh:02}{em:02}"));
            }
            start = end;
        }
        clauses.join(",")
    }
}

/// An ordered list of non-overlapping spans.
///
/// Invariants, maintained by [`insert`](Self::insert): sorted by start,
/// pairwise disjoint, and no two touching members carry an identical
/// `(value, retry)` pair (those coalesce).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeSpanList(Vec<TimeSpan>);

impl TimeSpanList {
    /// An empty list (no permitted windows)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The spans, in start order
    #[must_use]
    pub fn spans(&self) -> &[TimeSpan] {
        &self.0
    }

    /// True when no window is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The span covering `minute`, if any
    #[must_use]
    pub fn covers(&self, minute: u32) -> Option<&TimeSpan> {
        self.0.iter().find(|s| s.start <= minute && minute < s.end)
    }

    /// Inserts `[start, end)` with the given value and retry, resolving
    /// overlaps left-to-right with `cmp` (equal values widen the existing
    /// span; a winning insert truncates or splits what it overlaps; a
    /// losing insert keeps only its non-overlapped remainder). Degenerate
    /// ranges are ignored; ends are clamped to week space.
    pub fn insert(&mut self, start: u32, end: u32, value: i64, retry: u32, cmp: PrecedenceCmp) {
        let mut start = start.min(MINUTES_PER_WEEK);
        let mut end = end.min(MINUTES_PER_WEEK);
        let mut value = value;
        let mut retry = retry;
        let mut i = 0;

        while start < end {
            if i == self.0.len() {
                self.0.push(TimeSpan {
                    start,
                    end,
                    value,
                    retry,
                });
                return;
            }
            let ex = self.0[i];

            if ex.end < start {
                // wholly before the candidate
                i += 1;
                continue;
            }
            if ex.end == start {
                if ex.value == value && ex.retry == retry {
                    // touching, identical tag: absorb the neighbour
                    start = ex.start;
                    let _ = self.0.remove(i);
                } else {
                    i += 1;
                }
                continue;
            }
            if end < ex.start {
                self.0.insert(
                    i,
                    TimeSpan {
                        start,
                        end,
                        value,
                        retry,
                    },
                );
                return;
            }
            if end == ex.start {
                if ex.value == value && ex.retry == retry {
                    end = ex.end;
                    let _ = self.0.remove(i);
                    continue;
                }
                self.0.insert(
                    i,
                    TimeSpan {
                        start,
                        end,
                        value,
                        retry,
                    },
                );
                return;
            }

            // genuine overlap: start < ex.end && end > ex.start
            match cmp(value, ex.value) {
                Ordering::Equal => {
                    // widen, keeping the existing span's tag, and keep
                    // sweeping in case the union reaches further spans
                    start = start.min(ex.start);
                    end = end.max(ex.end);
                    value = ex.value;
                    retry = ex.retry;
                    let _ = self.0.remove(i);
                }
                Ordering::Less => {
                    // candidate wins: existing survives only outside it
                    let _ = self.0.remove(i);
                    if ex.start < start {
                        self.0.insert(
                            i,
                            TimeSpan {
                                start: ex.start,
                                end: start,
                                value: ex.value,
                                retry: ex.retry,
                            },
                        );
                        i += 1;
                    }
                    if ex.end > end {
                        self.0.insert(
                            i,
                            TimeSpan {
                                start: end,
                                end: ex.end,
                                value: ex.value,
                                retry: ex.retry,
                            },
                        );
                    }
                }
                Ordering::Greater => {
                    // existing wins: keep the candidate's leading part and
                    // continue past the existing span
                    if start < ex.start {
                        self.0.insert(
                            i,
                            TimeSpan {
                                start,
                                end: ex.start,
                                value,
                                retry,
                            },
                        );
                        i += 1;
                    }
                    start = start.max(ex.end);
                    i += 1;
                }
            }
        }
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        for w in self.0.windows(2) {
            assert!(w[0].start < w[0].end, "degenerate span {:?}", w[0]);
            assert!(
                w[0].end <= w[1].start,
                "overlap between {:?} and {:?}",
                w[0],
                w[1]
            );
            if w[0].end == w[1].start {
                assert!(
                    (w[0].value, w[0].retry) != (w[1].value, w[1].retry),
                    "uncoalesced neighbours {:?} and {:?}",
                    w[0],
                    w[1]
                );
            }
        }
        if let Some(last) = self.0.last() {
            assert!(last.start < last.end);
            assert!(last.end <= MINUTES_PER_WEEK);
        }
    }
}

/// The timetable indirection layer: named expansions applied to bare
/// clause names before grammar parsing. Later definitions of the same
/// name shadow earlier ones; expansions re-expand recursively.
#[derive(Debug, Clone)]
pub struct Timetables {
    entries: Vec<(String, String)>,
}

impl Default for Timetables {
    /// The conventional built-in tables
    fn default() -> Self {
        Self {
            entries: vec![
                ("Evening".to_string(), "Wk1705-0755,Sa,Su".to_string()),
                ("Night".to_string(), "Wk2305-0755,Sa,Su2305-1655".to_string()),
                ("NonPeak".to_string(), "Wk1805-0655,Sa,Su".to_string()),
            ],
        }
    }
}

impl Timetables {
    /// Adds a definition; the newest definition of a name wins
    pub fn define<N: Into<String>, E: Into<String>>(&mut self, name: N, expansion: E) {
        self.entries.push((name.into(), expansion.into()));
    }

    /// Case-insensitive lookup
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, e)| e.as_str())
    }
}

const MAX_EXPANSION_DEPTH: usize = 32;

/// Parses a weekday/hour expression into `list`, tagging every produced
/// span with `value`.
///
/// Grammar: day tokens (`Su Mo Tu We Th Fr Sa Wk Any Never None`,
/// case-insensitive, concatenatable) followed by an optional `HHMM-HHMM`
/// hour range; `,` or `|` separates clauses; a `;N` suffix sets the retry
/// interval for the whole expression. A clause naming a timetable is
/// macro-expanded first. An hour range wrapping past midnight is split at
/// the day boundary, the tail landing on the following day (modulo the
/// week).
pub fn parse_time_expression(
    list: &mut TimeSpanList,
    expr: &str,
    value: i64,
    cmp: PrecedenceCmp,
    tables: &Timetables,
) -> Result<()> {
    parse_expression_inner(list, expr, value, None, cmp, tables, 0)
}

fn parse_expression_inner(
    list: &mut TimeSpanList,
    expr: &str,
    value: i64,
    retry: Option<u32>,
    cmp: PrecedenceCmp,
    tables: &Timetables,
    depth: usize,
) -> Result<()> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(ErrorKind::BadTime(format!("timetable recursion in `{expr}`")).into());
    }
    let (body, retry) = match expr.split_once(';') {
        Some((body, suffix)) => {
            let parsed: u32 = suffix
                .parse()
                .map_err(|_| ErrorKind::BadTime(format!("bad retry `{suffix}`")))?;
            // an outer expression's retry wins over an expanded one's
            (body, Some(retry.unwrap_or(parsed)))
        }
        None => (expr, retry),
    };

    for clause in body.split([',', '|']) {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        if let Some(expansion) = tables.lookup(clause) {
            let expansion = expansion.to_string();
            parse_expression_inner(list, &expansion, value, retry, cmp, tables, depth + 1)?;
            continue;
        }
        parse_clause(list, clause, value, retry.unwrap_or(0), cmp)?;
    }
    Ok(())
}

fn parse_clause(
    list: &mut TimeSpanList,
    clause: &str,
    value: i64,
    retry: u32,
    cmp: PrecedenceCmp,
) -> Result<()> {
    let mut days = [false; 7];
    let mut any_token = false;
    let mut rest = clause;
    loop {
        let lower = rest.to_ascii_lowercase();
        if lower.starts_with("never") {
            // contributes no windows
            rest = &rest[5..];
            any_token = true;
        } else if lower.starts_with("none") {
            rest = &rest[4..];
            any_token = true;
        } else if lower.starts_with("any") {
            days = [true; 7];
            rest = &rest[3..];
            any_token = true;
        } else if lower.starts_with("wk") {
            for d in &mut days[1..6] {
                *d = true;
            }
            rest = &rest[2..];
            any_token = true;
        } else if let Some(day) = DAY_NAMES
            .iter()
            .position(|n| lower.starts_with(&n.to_ascii_lowercase()))
        {
            days[day] = true;
            rest = &rest[2..];
            any_token = true;
        } else {
            break;
        }
    }
    if !any_token {
        return Err(ErrorKind::BadTime(clause.to_string()).into());
    }

    let hours = if rest.is_empty() {
        None
    } else {
        Some(parse_hour_range(rest).ok_or_else(|| ErrorKind::BadTime(clause.to_string()))?)
    };

    for (day, enabled) in days.iter().enumerate() {
        if !enabled {
            continue;
        }
        let day = u32::try_from(day).unwrap_or_default();
        let base = day * MINUTES_PER_DAY;
        match hours {
            None => list.insert(base, base + MINUTES_PER_DAY, value, retry, cmp),
            Some((s, e)) if s < e => list.insert(base + s, base + e, value, retry, cmp),
            Some((s, e)) if s == e => {}
            Some((s, e)) => {
                // wraps past midnight: split at the day boundary
                list.insert(base + s, base + MINUTES_PER_DAY, value, retry, cmp);
                let next = ((day + 1) % 7) * MINUTES_PER_DAY;
                list.insert(next, next + e, value, retry, cmp);
            }
        }
    }
    Ok(())
}

fn parse_hour_range(text: &str) -> Option<(u32, u32)> {
    let bytes = text.as_bytes();
    if bytes.len() != 9 || bytes[4] != b'-' {
        return None;
    }
    let start = parse_hhmm(&text[0..4])?;
    let end = parse_hhmm(&text[5..9])?;
    Some((start, end))
}

fn parse_hhmm(text: &str) -> Option<u32> {
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hh: u32 = text[0..2].parse().ok()?;
    let mm: u32 = text[2..4].parse().ok()?;
    // 2400 is accepted as end-of-day
    if hh > 24 || mm > 59 || (hh == 24 && mm != 0) {
        return None;
    }
    Some(hh * 60 + mm)
}
