//! Keyset pagination over the primary key.
//!
//! A single signed cursor drives both directions: `cursor >= 0` scans
//! forward (`id > cursor`, ascending), `cursor < 0` scans backward
//! (`id < |cursor|`, descending). Every scan over-fetches one row so the
//! page can tell whether more rows exist past its boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 200;

/// Column the cursor is compared against.
pub const KEYSET_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// Ordered sort columns. A column appears at most once; the first
/// occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec(Vec<Order>);

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|order| order.column == column)
    }

    /// Appends `order` unless its column is already present.
    pub fn add(&mut self, order: Order) {
        if !self.contains(&order.column) {
            self.0.push(order);
        }
    }

    /// Parses comma separated tokens such as `-price,+name,id`.
    ///
    /// A `-` prefix sorts descending, `+` or no prefix ascending. A lone
    /// prefix and empty tokens are skipped.
    pub fn parse(raw: &str) -> Self {
        let mut spec = SortSpec::new();
        for token in raw.split(',').map(str::trim) {
            let (direction, column) = if let Some(rest) = token.strip_prefix('-')
            {
                (Direction::Desc, rest)
            } else if let Some(rest) = token.strip_prefix('+') {
                (Direction::Asc, rest)
            } else {
                (Direction::Asc, token)
            };
            if column.is_empty() {
                continue;
            }
            spec.add(Order::new(column, direction));
        }
        spec
    }

    pub fn orders(&self) -> &[Order] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `column DIRECTION` strings, in order.
    pub fn to_strings(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|order| format!("{} {}", order.column, order.direction))
            .collect()
    }
}

/// A normalized page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub cursor: i64,
    pub size: usize,
    pub sort: SortSpec,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            cursor: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: SortSpec::new(),
        }
    }
}

impl Paging {
    pub fn new(cursor: i64, size: usize) -> Self {
        Self {
            cursor,
            size: normalize_size(size),
            sort: SortSpec::new(),
        }
    }

    /// Builds a request from raw query values. Values that fail to parse
    /// are treated as absent.
    pub fn from_query(
        cursor: Option<&str>,
        page_size: Option<&str>,
        sort: Option<&str>,
    ) -> Self {
        let cursor = cursor
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let size = page_size
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(|size| size.clamp(0, MAX_PAGE_SIZE as i64) as usize)
            .unwrap_or(0);
        Self {
            cursor,
            size: normalize_size(size),
            sort: sort.map(SortSpec::parse).unwrap_or_default(),
        }
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn plan(&self) -> QueryPlan {
        QueryPlan::new(self)
    }
}

fn normalize_size(size: usize) -> usize {
    if size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        size.min(MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::LessThan => "<",
        }
    }

    fn admits(&self, key: i64, bound: i64) -> bool {
        match self {
            Comparison::GreaterThan => key > bound,
            Comparison::LessThan => key < bound,
        }
    }
}

/// Bounded, ordered scan derived from a [`Paging`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub direction: Direction,
    pub comparison: Comparison,
    pub bound: i64,
    pub limit: usize,
    pub sort: SortSpec,
}

impl QueryPlan {
    pub fn new(paging: &Paging) -> Self {
        let (direction, comparison) = if paging.cursor >= 0 {
            (Direction::Asc, Comparison::GreaterThan)
        } else {
            (Direction::Desc, Comparison::LessThan)
        };
        Self {
            direction,
            comparison,
            bound: paging.cursor.saturating_abs(),
            limit: paging.size + 1,
            sort: paging.sort.clone(),
        }
    }

    pub fn is_backward(&self) -> bool {
        self.direction == Direction::Desc
    }

    /// `WHERE` fragment with the bound as positional parameter `$n`.
    pub fn where_clause(&self, param: usize) -> String {
        format!("{KEYSET_COLUMN} {} ${param}", self.comparison.as_sql())
    }

    pub fn order_clause(&self) -> String {
        format!("ORDER BY {KEYSET_COLUMN} {}", self.direction)
    }

    pub fn limit_clause(&self) -> String {
        format!("LIMIT {}", self.limit)
    }

    /// Applies the plan to rows already in memory, in any order.
    pub fn select<T, F>(&self, rows: impl IntoIterator<Item = T>, key: F) -> Vec<T>
    where
        F: Fn(&T) -> i64,
    {
        let mut selected: Vec<T> = rows
            .into_iter()
            .filter(|row| self.comparison.admits(key(row), self.bound))
            .collect();
        match self.direction {
            Direction::Asc => selected.sort_by_key(|row| key(row)),
            Direction::Desc => {
                selected.sort_by_key(|row| std::cmp::Reverse(key(row)))
            }
        }
        selected.truncate(self.limit);
        selected
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub page_size: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub metadata: PageMetadata,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            metadata: self.metadata,
        }
    }
}

/// Turns the rows fetched by `paging.plan()` into a page.
///
/// `rows` must be in scan order (descending for backward pages). The
/// over-fetched row is dropped and backward pages are reversed so data is
/// always ascending by key.
pub fn paginate<T>(mut rows: Vec<T>, paging: &Paging) -> Page<T> {
    let mut metadata = PageMetadata {
        page_size: paging.size,
        ..Default::default()
    };
    if rows.is_empty() {
        return Page {
            data: rows,
            metadata,
        };
    }

    let backward = paging.cursor < 0;
    let has_more = rows.len() > paging.size;
    rows.truncate(paging.size);

    if backward {
        rows.reverse();
        metadata.has_next = true;
        metadata.has_previous = has_more;
    } else {
        metadata.has_next = has_more;
        metadata.has_previous = paging.cursor > 0;
    }

    Page {
        data: rows,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_tokens_first_wins_and_skip_lone_prefix() {
        let spec = SortSpec::parse("-price,+,name,price,-,+id");
        assert_eq!(
            spec.to_strings(),
            vec!["price DESC", "name ASC", "id ASC"]
        );
        assert!(SortSpec::parse("").is_empty());
    }

    #[test]
    fn page_size_is_normalized() {
        assert_eq!(Paging::from_query(None, None, None).size, DEFAULT_PAGE_SIZE);
        assert_eq!(
            Paging::from_query(None, Some("0"), None).size,
            DEFAULT_PAGE_SIZE
        );
        assert_eq!(
            Paging::from_query(None, Some("1000"), None).size,
            MAX_PAGE_SIZE
        );
        assert_eq!(
            Paging::from_query(None, Some("-3"), None).size,
            DEFAULT_PAGE_SIZE
        );
        assert_eq!(Paging::from_query(None, Some("7"), None).size, 7);
        assert_eq!(Paging::new(0, 500).size, MAX_PAGE_SIZE);
    }

    #[test]
    fn unparseable_cursor_means_first_page() {
        let paging = Paging::from_query(Some("abc"), Some("x"), None);
        assert_eq!(paging.cursor, 0);
        assert_eq!(paging.size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn plan_follows_cursor_sign() {
        let forward = Paging::new(20, 10).plan();
        assert_eq!(forward.direction, Direction::Asc);
        assert_eq!(forward.comparison, Comparison::GreaterThan);
        assert_eq!(forward.bound, 20);
        assert_eq!(forward.limit, 11);
        assert_eq!(forward.where_clause(1), "id > $1");
        assert_eq!(forward.order_clause(), "ORDER BY id ASC");

        let backward = Paging::new(-20, 10).plan();
        assert_eq!(backward.direction, Direction::Desc);
        assert_eq!(backward.bound, 20);
        assert_eq!(backward.where_clause(3), "id < $3");
        assert_eq!(backward.limit_clause(), "LIMIT 11");
    }

    #[test]
    fn forward_page_trims_extra_row() {
        let paging = Paging::new(0, 3);
        let rows = paging.plan().select(1..=10, |id| *id);
        let page = paginate(rows, &paging);
        assert_eq!(page.data, vec![1, 2, 3]);
        assert!(page.metadata.has_next);
        assert!(!page.metadata.has_previous);
    }

    #[test]
    fn exact_fit_has_no_next() {
        let paging = Paging::new(0, 3);
        let rows = paging.plan().select(1..=3, |id| *id);
        let page = paginate(rows, &paging);
        assert_eq!(page.data, vec![1, 2, 3]);
        assert!(!page.metadata.has_next);

        // one row more than the page is the only case that flips the flag
        let rows = paging.plan().select(1..=4, |id| *id);
        assert!(paginate(rows, &paging).metadata.has_next);
    }

    #[test]
    fn backward_page_is_reversed() {
        let paging = Paging::new(-8, 3);
        let rows = paging.plan().select(1..=10, |id| *id);
        assert_eq!(rows, vec![7, 6, 5, 4]);
        let page = paginate(rows, &paging);
        assert_eq!(page.data, vec![5, 6, 7]);
        assert!(page.metadata.has_next);
        assert!(page.metadata.has_previous);

        let paging = Paging::new(-3, 5);
        let rows = paging.plan().select(1..=10, |id| *id);
        let page = paginate(rows, &paging);
        assert_eq!(page.data, vec![1, 2]);
        assert!(page.metadata.has_next);
        assert!(!page.metadata.has_previous);
    }

    #[test]
    fn empty_result_clears_both_flags() {
        let paging = Paging::new(100, 5);
        let page = paginate(paging.plan().select(1..=10, |id| *id), &paging);
        assert!(page.data.is_empty());
        assert!(!page.metadata.has_next);
        assert!(!page.metadata.has_previous);

        let paging = Paging::new(-1, 5);
        let page = paginate(paging.plan().select(1..=10, |id| *id), &paging);
        assert!(!page.metadata.has_next);
        assert!(!page.metadata.has_previous);
    }

    #[test]
    fn metadata_is_camel_case() {
        let json = serde_json::to_value(PageMetadata {
            page_size: 20,
            has_next: true,
            has_previous: false,
        })
        .unwrap();
        assert_eq!(json["pageSize"], 20);
        assert_eq!(json["hasNext"], true);
        assert_eq!(json["hasPrevious"], false);
    }
}
