//! Catalog categories and the category filter.

use core::fmt;

/// Categories offered when creating or filtering catalog items.
pub const CATEGORIES: [&str; 12] = [
    "Action",
    "Adventure",
    "RPG",
    "Strategy",
    "Horror",
    "Racing",
    "Sports",
    "Puzzle",
    "Simulation",
    "Indie",
    "Multiplayer",
    "Casual",
];

/// Category selection for the catalog view.
///
/// `All` is the sentinel that disables category filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    /// No category filtering.
    #[default]
    All,
    /// Only items tagged with exactly this category.
    Only(String),
}

impl CategoryFilter {
    /// Sentinel label for [`CategoryFilter::All`].
    pub const ALL_LABEL: &'static str = "All";

    /// Parse a filter label; the sentinel (any case) or an empty string mean
    /// "all categories".
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case(Self::ALL_LABEL) {
            Self::All
        } else {
            Self::Only(label.to_owned())
        }
    }

    /// Whether an item carrying `tags` passes this filter.
    #[must_use]
    pub fn admits(&self, tags: &[String]) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => tags.iter().any(|tag| tag == category),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(Self::ALL_LABEL),
            Self::Only(category) => f.write_str(category),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(CategoryFilter::from_label("all"), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_label(""), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::from_label(" RPG "),
            CategoryFilter::Only("RPG".to_owned())
        );
    }

    #[test]
    fn test_admits_is_exact() {
        let tags = vec!["RPG".to_owned(), "Indie".to_owned()];
        assert!(CategoryFilter::All.admits(&tags));
        assert!(CategoryFilter::from_label("Indie").admits(&tags));
        assert!(!CategoryFilter::from_label("indie").admits(&tags));
        assert!(!CategoryFilter::from_label("Racing").admits(&tags));
    }
}
