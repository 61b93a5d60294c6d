//! Artifact filename conventions.
//!
//! Originals: `{slug}_{timestamp}_{resolution}_{duration}s.{ext}`
//! Derived outputs: `{source_slug}_{effect_kind}_{timestamp}.{ext}`
//!
//! Timestamps are UTC seconds since the epoch so filenames sort
//! chronologically without parsing.

use chrono::{DateTime, Utc};

use crate::effects::EffectKind;
use crate::generation::{ClipDuration, Resolution};

/// Maximum slug length in characters.
const MAX_SLUG_LEN: usize = 48;

/// Reduce a title to a filesystem-safe slug.
///
/// Lowercases, maps runs of non-alphanumeric characters to single
/// underscores, trims leading/trailing underscores, and truncates to
/// [`MAX_SLUG_LEN`]. An empty result falls back to `"video"`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_sep = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
        if slug.chars().count() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "video".to_string()
    } else {
        slug
    }
}

/// Filename for a freshly generated original.
pub fn original_filename(
    slug: &str,
    created_at: DateTime<Utc>,
    resolution: Resolution,
    duration: ClipDuration,
    ext: &str,
) -> String {
    format!(
        "{slug}_{ts}_{res}_{dur}s.{ext}",
        ts = created_at.timestamp(),
        res = resolution.label(),
        dur = duration.secs(),
    )
}

/// Filename for the output of an effect applied to an existing video.
pub fn derived_filename(
    source_slug: &str,
    kind: EffectKind,
    created_at: DateTime<Utc>,
    ext: &str,
) -> String {
    format!(
        "{source_slug}_{kind}_{ts}.{ext}",
        kind = kind.as_str(),
        ts = created_at.timestamp(),
    )
}

/// Extract the slug portion of a stored filename (everything before the
/// first numeric timestamp segment). Falls back to the whole stem.
pub fn slug_of_filename(filename: &str) -> &str {
    let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);
    for (idx, segment) in stem.match_indices('_') {
        let _ = segment;
        let rest = &stem[idx + 1..];
        let head = rest.split('_').next().unwrap_or("");
        if head.len() >= 10 && head.chars().all(|c| c.is_ascii_digit()) {
            return &stem[..idx];
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("A Neon City at Dusk"), "a_neon_city_at_dusk");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("rain -- on  glass!"), "rain_on_glass");
    }

    #[test]
    fn slugify_empty_falls_back() {
        assert_eq!(slugify("!!!"), "video");
        assert_eq!(slugify(""), "video");
    }

    #[test]
    fn slugify_truncates() {
        let slug = slugify(&"a".repeat(200));
        assert!(slug.chars().count() <= MAX_SLUG_LEN);
    }

    #[test]
    fn original_filename_convention() {
        let name = original_filename("neon_city", ts(), Resolution::R720p, ClipDuration::Ten, "mp4");
        assert_eq!(name, "neon_city_1700000000_720p_10s.mp4");
    }

    #[test]
    fn derived_filename_convention() {
        let name = derived_filename("neon_city", EffectKind::VhsV2, ts(), "mp4");
        assert_eq!(name, "neon_city_vhs_v2_1700000000.mp4");
    }

    #[test]
    fn slug_recovered_from_original_filename() {
        assert_eq!(
            slug_of_filename("neon_city_1700000000_720p_10s.mp4"),
            "neon_city"
        );
    }

    #[test]
    fn slug_recovered_from_derived_filename() {
        assert_eq!(
            slug_of_filename("neon_city_vhs_v2_1700000000.mp4"),
            "neon_city_vhs_v2"
        );
    }

    #[test]
    fn slug_of_filename_without_timestamp() {
        assert_eq!(slug_of_filename("plain_name.mp4"), "plain_name");
    }
}
