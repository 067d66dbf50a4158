const VENDOR_PREFIX: &str = "hystrix";
const META_NAME: &str = "meta";

/// Builds the dotted metric key for one field of one circuit or pool.
///
/// `HystrixThreadPool` becomes `threadpool`. Records named `meta` carry
/// cluster-wide values and skip the resource type segment.
pub fn metric_key(cluster: &str, name: &str, resource_type: &str, field: &str) -> String {
    if name == META_NAME {
        return format!("{cluster}.{name}.{field}");
    }

    let lowered = resource_type.to_lowercase();
    let normalized = lowered.strip_prefix(VENDOR_PREFIX).unwrap_or(&lowered);
    format!("{cluster}.{normalized}.{name}.{field}")
}

/// Suffix for one entry of a percentile table: `99.5` becomes `99_5_pct`.
pub fn percentile_suffix(label: &str) -> String {
    format!("{}_pct", label.replace('.', "_"))
}
