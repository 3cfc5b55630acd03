//! Label propagation between workload objects

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

/// Copy label `source_key` of `source` to label `target_key` of `target`
///
/// When the source label is absent the target is left as it was: an existing
/// target label is never cleared, and no empty label map is created.
/// Returns whether a value was copied.
pub fn copy_if_present(
    source: &ObjectMeta,
    target: &mut ObjectMeta,
    source_key: &str,
    target_key: &str,
) -> bool {
    let Some(value) = source.labels.as_ref().and_then(|labels| labels.get(source_key)) else {
        return false;
    };

    debug!(
        source_key = %source_key,
        target_key = %target_key,
        value = %value,
        "propagating label"
    );
    target
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(target_key.to_string(), value.clone());
    true
}

/// Whether `meta` carries label `key`, whatever its value
pub fn has_label(meta: &ObjectMeta, key: &str) -> bool {
    meta.labels
        .as_ref()
        .is_some_and(|labels| labels.contains_key(key))
}
