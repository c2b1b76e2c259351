//! Top-level product categories.

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known [`ProductCategory`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown product category: {0}")]
pub struct UnknownCategory(pub String);

/// The three storefront departments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_category", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    /// Monitors.
    Displays,
    /// Keyboards, mice, headsets.
    Peripherals,
    /// PC components sold individually.
    Parts,
}

impl ProductCategory {
    /// Every category, in dashboard order.
    pub const ALL: [Self; 3] = [Self::Displays, Self::Peripherals, Self::Parts];

    /// The wire name of the category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Displays => "displays",
            Self::Peripherals => "peripherals",
            Self::Parts => "parts",
        }
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "displays" => Ok(Self::Displays),
            "peripherals" => Ok(Self::Peripherals),
            "parts" => Ok(Self::Parts),
            _ => Err(UnknownCategory(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("Parts".parse::<ProductCategory>().unwrap(), ProductCategory::Parts);
        assert_eq!(
            " displays ".parse::<ProductCategory>().unwrap(),
            ProductCategory::Displays
        );
    }

    #[test]
    fn test_unknown_category() {
        let err = "laptops".parse::<ProductCategory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown product category: laptops");
    }

    #[test]
    fn test_display_matches_serde() {
        for category in ProductCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{category}\""));
        }
    }
}
