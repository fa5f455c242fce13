// ─── Version Codec ───
// Client versions arrive in whatever shape the server operator typed
// ("13.40.5500", "12.34-b5", "v1.2"). Ordering uses the digits-only
// projection; the release/build split uses the dotted structure.

use std::cmp::Ordering;

/// Release line and build of a raw version string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionComponents {
    /// `"major/minor"`, or whichever of the two exists.
    pub base_version: String,
    /// Every segment after the second, concatenated.
    pub timestamp: String,
}

impl VersionComponents {
    pub fn has_base_version(&self) -> bool {
        !self.base_version.is_empty()
    }

    pub fn has_timestamp(&self) -> bool {
        !self.timestamp.is_empty()
    }
}

/// Keep only ASCII digits: `"12.34-b5"` becomes `"12345"`.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Compare two normalized versions as arbitrary-precision integers.
///
/// Non-digit characters are ignored and an empty string counts as zero, so
/// `"9" < "10"` and `"007" == "7"`.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a = significant_digits(a);
    let b = significant_digits(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(&b))
}

fn significant_digits(value: &str) -> String {
    let digits = normalize(value);
    digits.trim_start_matches('0').to_string()
}

/// Split `"major.minor.build[.more]"` into release line and build.
pub fn split_components(raw: Option<&str>) -> VersionComponents {
    let Some(raw) = raw else {
        return VersionComponents::default();
    };

    let segments: Vec<&str> = raw
        .trim()
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let base_version = match segments.as_slice() {
        [] => String::new(),
        [major] => major.to_string(),
        [major, minor, ..] => format!("{major}/{minor}"),
    };
    let timestamp = segments.iter().skip(2).copied().collect::<String>();

    VersionComponents {
        base_version,
        timestamp,
    }
}
