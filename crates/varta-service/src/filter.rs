use std::str::FromStr;

use chrono::{Duration, Months, NaiveDateTime};

use crate::models::{ContentKind, Language};
use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Day,
    Week,
    Month,
    SixMonths,
    Year,
    TwoYears,
    ThreeYears,
}

impl Span {
    /// `now` moved back by this span. Months are calendar months.
    pub fn before(self, now: NaiveDateTime) -> NaiveDateTime {
        let months = |n: u32| {
            now.checked_sub_months(Months::new(n))
                .unwrap_or(NaiveDateTime::MIN)
        };
        match self {
            Span::Day => now - Duration::hours(24),
            Span::Week => now - Duration::days(7),
            Span::Month => months(1),
            Span::SixMonths => months(6),
            Span::Year => months(12),
            Span::TwoYears => months(24),
            Span::ThreeYears => months(36),
        }
    }
}

/// The `time` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Created within the last span.
    Within(Span),
    /// Created before the last span began.
    OlderThan(Span),
}

impl TimeWindow {
    /// `(created_from inclusive, created_before exclusive)`
    pub fn bounds(self, now: NaiveDateTime) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        match self {
            TimeWindow::Within(span) => (Some(span.before(now)), None),
            TimeWindow::OlderThan(span) => (None, Some(span.before(now))),
        }
    }
}

fn parse_span(s: &str) -> Option<Span> {
    Some(match s {
        "24h" | "last24h" => Span::Day,
        "week" | "1week" | "last1week" => Span::Week,
        "month" | "1month" | "last1month" => Span::Month,
        "6months" | "last6months" => Span::SixMonths,
        "1year" | "year" => Span::Year,
        "2years" => Span::TwoYears,
        "3years" => Span::ThreeYears,
        _ => return None,
    })
}

impl FromStr for TimeWindow {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ValidationError::UnknownTimeWindow(s.to_string());
        match s.strip_prefix("above") {
            Some(rest) => parse_span(rest).map(TimeWindow::OlderThan).ok_or_else(unknown),
            None => parse_span(s).map(TimeWindow::Within).ok_or_else(unknown),
        }
    }
}

/// Conjunction of the optional listing constraints for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFilter {
    pub kind: ContentKind,
    /// Matches the English or Telugu category exactly.
    pub category: Option<String>,
    pub author: Option<String>,
    /// Case-insensitive substring over titles, descriptions and tags.
    pub search: Option<String>,
    pub created_from: Option<NaiveDateTime>,
    pub created_before: Option<NaiveDateTime>,
}

impl ContentFilter {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            category: None,
            author: None,
            search: None,
            created_from: None,
            created_before: None,
        }
    }

    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = non_blank(category);
        self
    }

    pub fn author(mut self, author: Option<String>) -> Self {
        self.author = non_blank(author);
        self
    }

    pub fn search(mut self, search: Option<String>) -> Self {
        self.search = non_blank(search);
        self
    }

    pub fn time_window(mut self, window: Option<TimeWindow>, now: NaiveDateTime) -> Self {
        if let Some(window) = window {
            let (from, before) = window.bounds(now);
            self.created_from = from;
            self.created_before = before;
        }
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Comments of one content item in one language. `parent_id: None` selects
/// top-level comments, `Some(id)` the replies to `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentFilter {
    pub content_id: i32,
    pub language: Language,
    pub parent_id: Option<i32>,
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
