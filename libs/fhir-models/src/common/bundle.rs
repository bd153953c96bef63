//! FHIR Bundle model
//!
//! Version-agnostic model for search result Bundles that works across R4, R4B, and R5.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// FHIR Bundle resource
///
/// A container for a collection of resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Resource type - always "Bundle"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    /// Logical id of this artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Indicates the purpose of this bundle - how it was intended to be used
    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    /// If search, the total number of matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    /// Links related to this Bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Vec<BundleLink>>,

    /// Entry in the bundle - will have a resource or information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<Vec<BundleEntry>>,

    /// Additional content beyond core fields (extensions, version-specific fields)
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "Bundle".to_string()
}

/// Type of Bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Document,
    Message,
    Transaction,
    #[serde(rename = "transaction-response")]
    TransactionResponse,
    Batch,
    #[serde(rename = "batch-response")]
    BatchResponse,
    History,
    /// Search Results Bundle - Results of a search operation
    Searchset,
    Collection,
}

/// Links related to this Bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleLink {
    /// See http://www.iana.org/assignments/link-relations/link-relations.xhtml#link-relations-1
    pub relation: String,

    /// Reference details for the link
    pub url: String,
}

/// Entry in the bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Full URL for the entry (relative to the base URL, or absolute)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    /// A resource in this bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    /// Search-related information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,

    /// Additional content beyond core fields
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

/// Search-related information for a Bundle entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntrySearch {
    /// Why this entry is in the result set: a match, or pulled in by `_include`
    #[serde(rename = "mode", skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<BundleEntrySearchMode>,

    /// Search ranking (between 0 and 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Why an entry is in the result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleEntrySearchMode {
    /// This resource matched the search specification
    Match,
    /// This resource is returned because it is referred to from another resource in the search set
    Include,
    /// An OperationOutcome providing additional information about the processing of a search entry
    Outcome,
}

impl Bundle {
    /// Create a new Bundle with minimal required fields
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: None,
            bundle_type,
            total: None,
            link: None,
            entry: None,
            extensions: HashMap::new(),
        }
    }

    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    /// Check if this is a search result bundle
    pub fn is_searchset(&self) -> bool {
        matches!(self.bundle_type, BundleType::Searchset)
    }

    /// Get the number of entries in the bundle
    pub fn entry_count(&self) -> usize {
        self.entry.as_ref().map(|e| e.len()).unwrap_or(0)
    }

    /// Get entries as a slice
    pub fn entries(&self) -> &[BundleEntry] {
        self.entry.as_deref().unwrap_or(&[])
    }

    /// Add a resource entry to the bundle
    pub fn add_resource(&mut self, resource: Value) {
        self.entry.get_or_insert_with(Vec::new).push(BundleEntry {
            full_url: None,
            resource: Some(resource),
            search: None,
            extensions: HashMap::new(),
        });
    }

    /// Resources of `resource_type`, in entry order. Entries without a
    /// resource or with another type are skipped.
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<&Value> {
        self.entries()
            .iter()
            .filter_map(|e| e.resource.as_ref())
            .filter(|r| resource_type_of(r) == Some(resource_type))
            .collect()
    }
}

/// `resourceType` of a JSON resource, if present
pub fn resource_type_of(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(|v| v.as_str())
}

/// Flatten a read or search response into a plain list of resources.
///
/// A Bundle is unwrapped into its `entry[].resource` values; any other
/// resource becomes a single-element list. Either way, only resources whose
/// `resourceType` equals `expected` are kept.
///
/// Bundles are walked as plain JSON, so servers that omit `type` or send
/// partial `link`/`search` elements are still readable.
pub fn resources_from_response(mut response: Value, expected: &str) -> Result<Vec<Value>> {
    match resource_type_of(&response) {
        Some("Bundle") if expected != "Bundle" => {
            let entries = match response.get_mut("entry").map(Value::take) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    return Err(Error::InvalidResource(
                        "Bundle.entry is not an array".to_string(),
                    ))
                }
            };
            Ok(entries
                .into_iter()
                .filter_map(|mut entry| entry.get_mut("resource").map(Value::take))
                .filter(|r| resource_type_of(r) == Some(expected))
                .collect())
        }
        Some(actual) if actual == expected => Ok(vec![response]),
        Some(_) => Ok(Vec::new()),
        None => Err(Error::MissingField("resourceType".to_string())),
    }
}
