//! Organization models.

use serde::{Deserialize, Serialize};

/// An organization whose published documents are being collected.
///
/// Rows are created once from the organizations input file and never
/// modified afterwards; the primary key drives every join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i32,
    /// Title as registered in the transparency register (unique).
    pub registered_title: String,
    /// Title used as the search term and as the key in the search log.
    pub search_title: String,
    /// Register category.
    pub category: String,
}

/// One row of the organizations input file.
///
/// Column names follow the spreadsheet the list was exported from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    #[serde(rename = "org_title")]
    pub registered_title: String,
    pub search_title: String,
    #[serde(rename = "reg_category")]
    pub category: String,
}

impl NewOrganization {
    /// Trim surrounding whitespace from every field.
    pub fn normalized(self) -> Self {
        Self {
            registered_title: self.registered_title.trim().to_string(),
            search_title: self.search_title.trim().to_string(),
            category: self.category.trim().to_string(),
        }
    }

    /// A row is usable only if it has a registered title and a search title.
    pub fn is_complete(&self) -> bool {
        !self.registered_title.is_empty() && !self.search_title.is_empty()
    }
}
