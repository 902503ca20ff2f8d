//! Catalog query by category and free text.

use std::str::FromStr;
use crate::domain::aggregates::{Category, Product};

/// `All` or one concrete category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self { Self::All => true, Self::Only(c) => *c == category }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(Self::All),
            other => other.parse().map(Self::Only),
        }
    }
}

/// Stable filter: results keep catalog order.
///
/// A product matches when its category passes `category` and either `query`
/// is empty or the name or sub-category contains it, ignoring case.
pub fn filter<'a>(products: &'a [Product], category: CategoryFilter, query: &str) -> Vec<&'a Product> {
    let needle = query.to_lowercase();
    products
        .iter()
        .filter(|p| category.matches(p.category))
        .filter(|p| {
            needle.is_empty()
                || contains(Some(&p.name), &needle)
                || contains(p.sub_category.as_deref(), &needle)
        })
        .collect()
}

fn contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}
