//! Deterministic slug generation for CMDB entities.
//!
//! The destination requires a URL-safe slug alongside most entity names.
//! Slugs must be stable across runs: the same name always folds to the same
//! slug, so get-or-create lookups keyed by slug stay idempotent.

/// Fold a single non-ASCII character to its ASCII equivalent.
///
/// The table covers Latin-1 Supplement plus the Latin Extended-A characters
/// that show up in datacenter and cluster labels. Anything not listed is
/// dropped from the slug.
fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'ç' | 'ć' | 'č' => "c",
        'ď' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => "i",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'ř' => "r",
        'ś' | 'š' => "s",
        'ť' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        'đ' => "d",
        'ł' => "l",
        'þ' => "th",
        _ => return None,
    };
    Some(folded)
}

/// Build a slug from an entity name.
///
/// Lower-cases, folds accents via the fixed table, collapses whitespace and
/// separator runs into single hyphens, and drops every other character.
/// Total: any input produces a valid (possibly empty) slug.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if let Some(folded) = fold_char(c) {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push_str(folded);
        } else if c.is_whitespace() || matches!(c, '-' | '_' | '.' | '/') {
            pending_hyphen = true;
        }
        // Everything else (punctuation, symbols, unmapped scripts) is dropped.
    }

    slug
}

/// Build the slug for a tag from its (category, name) pair.
///
/// The category is part of the slug, so identically named tags from
/// different categories never collide.
pub fn tag_slug(category: &str, name: &str) -> String {
    slugify(&format!("{category} {name}"))
}
