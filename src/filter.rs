// Query engine: search filtering and sorting over a snapshot of the collection

use crate::record::{Book, FieldValue, SortKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Asc => write!(f, "asc"),
            Direction::Desc => write!(f, "desc"),
        }
    }
}

/// Column and direction to order the view by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    #[serde(default)]
    pub direction: Direction,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Number,
            direction: Direction::Asc,
        }
    }
}

impl SortSpec {
    pub fn new(key: SortKey, direction: Direction) -> Self {
        Self { key, direction }
    }

    /// Clicking the active column flips direction; another column starts ascending
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = Direction::Asc;
        }
    }
}

/// Transient view state: search text plus sort spec
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub search: String,
    pub sort: SortSpec,
}

impl ViewState {
    pub fn new(sort: SortSpec) -> Self {
        Self {
            search: String::new(),
            sort,
        }
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    pub fn toggle_sort(&mut self, key: SortKey) {
        self.sort.toggle(key);
    }

    pub fn apply(&self, items: &[Book]) -> Vec<Book> {
        view(items, &self.search, self.sort)
    }
}

/// Filtered, sorted copy of `items`; the input is never touched
pub fn view(items: &[Book], search: &str, sort: SortSpec) -> Vec<Book> {
    let query = search.trim().to_lowercase();

    let mut out: Vec<Book> = if query.is_empty() {
        items.to_vec()
    } else {
        items
            .iter()
            .filter(|b| b.haystack().contains(&query))
            .cloned()
            .collect()
    };

    // sort_by is stable, so equal keys keep collection order
    out.sort_by(|a, b| {
        let cmp = compare_values(a.field(sort.key).as_ref(), b.field(sort.key).as_ref());
        match sort.direction {
            Direction::Asc => cmp,
            Direction::Desc => cmp.reverse(),
        }
    });

    out
}

/// Comparator shared by every sort column
///
/// Missing values sort first, then anything that reads as a number (compared
/// numerically), then the rest by case-insensitive natural text comparison.
/// Numbers and text never mix in one comparison, which keeps this a total order.
pub fn compare_values(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };

    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => natural_cmp(&a.to_string(), &b.to_string()),
    }
}

/// Case-insensitive comparison where digit runs compare by numeric value ("2" < "10")
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let start_a = i;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            let start_b = j;
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }

            let run_a = strip_leading_zeros(&a[start_a..i]);
            let run_b = strip_leading_zeros(&b[start_b..j]);
            let ord = run_a.len().cmp(&run_b.len()).then_with(|| run_a.cmp(run_b));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn strip_leading_zeros(digits: &[char]) -> &[char] {
    let first = digits.iter().position(|c| *c != '0').unwrap_or(digits.len());
    &digits[first..]
}

/// Human count for the list footer: "1 book", "3 books"
pub fn count_label(count: usize) -> String {
    format!("{} book{}", count, if count == 1 { "" } else { "s" })
}
