use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

const FALLBACK_SLUG: &str = "event";
const SUFFIX_LENGTH: usize = 8;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("Invalid regex pattern"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_]+").expect("Invalid regex pattern"));
static DASH_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-+").expect("Invalid regex pattern"));

/// Builds a URL-safe event slug from a display name, suffixed with eight random hex characters so
/// that events sharing a name still get distinct slugs.
///
/// `"Summer Games 2024!"` becomes something like `"summer-games-2024-1f0c9a3b"`.
pub fn generate_slug(name: &str) -> String {
    let base = slug_base(name);
    let uuid = Uuid::new_v4().simple().to_string();

    format!("{base}-{}", &uuid[..SUFFIX_LENGTH])
}

/// Lowercases, drops anything outside `[a-z0-9]`/whitespace/`-`, turns whitespace and `_` runs
/// into a single `-`, collapses repeated `-` and trims them from both ends.
fn slug_base(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = DISALLOWED.replace_all(&lowered, "");
    let dashed = SEPARATORS.replace_all(&stripped, "-");
    let collapsed = DASH_RUNS.replace_all(&dashed, "-");

    match collapsed.trim_matches('-') {
        "" => FALLBACK_SLUG.to_string(),
        slug => slug.to_string(),
    }
}
