//! Field mapping pushed to the index on every mapping refresh.

use serde_json::{json, Value};

/// Mapping of the `info` section of file documents.
#[must_use]
pub fn file_index_mapping() -> Value {
    json!({
        "properties": {
            "info": {
                "properties": {
                    // Identity
                    "name": { "type": "keyword" },
                    "name_auto": { "type": "search_as_you_type" },
                    "type": { "type": "keyword" },
                    "directory": { "type": "keyword" },
                    // File system
                    "size": { "type": "long" },
                    "location": { "type": "keyword" },
                    "user": { "type": "keyword" },
                    "group": { "type": "keyword" },
                    "last_modified": { "type": "date" },
                    "checksum": { "type": "keyword" },
                    // Enrichment
                    "spot_name": { "type": "keyword" },
                    "phenomena": {
                        "type": "nested",
                        "properties": {
                            "names": { "type": "keyword" }
                        }
                    },
                    "spatial": {
                        "properties": {
                            "coordinates": { "type": "geo_shape" }
                        }
                    }
                }
            }
        }
    })
}
