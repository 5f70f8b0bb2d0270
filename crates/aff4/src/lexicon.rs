//! AFF4 lexicon: the schema URIs used to describe streams, and the typed
//! attribute values returned by volume queries.

/// Predicate URI for a stream's category.
pub const CATEGORY: &str = "http://aff4.org/Schema#category";

/// Predicate URI for the original filesystem path of an acquired file.
pub const STREAM_ORIGINAL_FILENAME: &str = "http://aff4.org/Schema#original_filename";

/// Category value marking a stream as captured physical memory.
pub const MEMORY_PHYSICAL: &str = "http://aff4.org/Schema#memory/physical";

/// The attribute predicates a volume can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// What kind of artifact a stream contains (`aff4:category`).
    Category,
    /// The path the stream's contents were acquired from
    /// (`aff4:original_filename`).
    OriginalFilename,
}

impl Predicate {
    /// The schema URI this predicate corresponds to.
    pub fn uri(&self) -> &'static str {
        match self {
            Predicate::Category => CATEGORY,
            Predicate::OriginalFilename => STREAM_ORIGINAL_FILENAME,
        }
    }
}

/// A typed attribute value.
///
/// Every value kind a query can produce is enumerated here, so callers
/// match once on the variant instead of downcasting per use site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Plain text (filesystem paths, labels).
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// An unsigned integer.
    Integer(u64),
    /// A URN or schema URI.
    Urn(String),
}

impl AttrValue {
    /// The textual content for String and Urn values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            AttrValue::Urn(u) => Some(u),
            _ => None,
        }
    }
}
