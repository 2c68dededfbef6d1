/// Data layer: tabular metadata types, loading, and filtering.
///
/// Architecture:
/// ```text
///  tabular_data.csv / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse text → MetadataTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ MetadataTable │  Vec<MetadataRecord>, column index
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  scan number + project → selected rows → subject ids
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
