//! Product schemas and required-field validation
//!
//! Each product type imports into a table of the same name and declares
//! the fields every record must carry with a non-empty value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::parser::Record;

/// Supported product types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Users,
    Organizations,
    Courses,
}

impl ProductType {
    pub const ALL: [ProductType; 3] = [
        ProductType::Users,
        ProductType::Organizations,
        ProductType::Courses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Users => "users",
            ProductType::Organizations => "organizations",
            ProductType::Courses => "courses",
        }
    }

    pub fn schema(&self) -> &'static ProductSchema {
        match self {
            ProductType::Users => &USERS,
            ProductType::Organizations => &ORGANIZATIONS,
            ProductType::Courses => &COURSES,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductType::ALL
            .into_iter()
            .find(|product| product.as_str() == s)
            .ok_or_else(|| ValidationError::UnsupportedProduct(s.to_string()))
    }
}

/// Destination table and required fields for one product type
#[derive(Debug, PartialEq, Eq)]
pub struct ProductSchema {
    pub product: ProductType,
    pub table: &'static str,
    pub required_fields: &'static [&'static str],
}

static USERS: ProductSchema = ProductSchema {
    product: ProductType::Users,
    table: "users",
    required_fields: &["id", "email", "name"],
};

static ORGANIZATIONS: ProductSchema = ProductSchema {
    product: ProductType::Organizations,
    table: "organizations",
    required_fields: &["id", "name"],
};

static COURSES: ProductSchema = ProductSchema {
    product: ProductType::Courses,
    table: "courses",
    required_fields: &["id", "title"],
};

impl ProductSchema {
    /// Check every record in a batch. `offset` is the file-wide index of the
    /// first record so errors point at the right row. Stops at the first
    /// missing field.
    pub fn validate(&self, offset: usize, records: &[Record]) -> Result<(), ValidationError> {
        for (position, record) in records.iter().enumerate() {
            for field in self.required_fields {
                let present = record
                    .get(field)
                    .is_some_and(|value| !value.trim().is_empty());

                if !present {
                    return Err(ValidationError::MissingField {
                        index: offset + position,
                        field: (*field).to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
