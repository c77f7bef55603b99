//! Text formats shared by request validation and the fixture loaders.

use std::sync::LazyLock;

use regex::Regex;

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@(?:[^@\s.]+\.)+[^@\s.]{2,}$").expect("email pattern is valid")
});

static TAG_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("color pattern is valid"));

/// Letters, digits and `@ . + - _`.
pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME.is_match(username)
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub(crate) fn is_valid_slug(slug: &str) -> bool {
    TAG_SLUG.is_match(slug)
}

/// `#RRGGBB`
pub(crate) fn is_valid_color(color: &str) -> bool {
    HEX_COLOR.is_match(color)
}
