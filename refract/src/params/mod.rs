//! Request descriptor: the parsed form of a transformation URL.
//!
//! A path like `unsafe/fit-in/300x200/filters:format(webp)/img.jpg`
//! parses into a [`Params`] value carrying the source image key, the
//! transform specification and the signature material. Parsing and path
//! generation are mirror images: `generate_path` output re-parses to the
//! same value, which is what makes the canonical path usable as a cache
//! key.

mod generator;
mod parser;
mod signer;

use serde::Serialize;

pub use generator::generate_path;
pub use parser::{parse, parse_fragment};
pub use signer::{constant_time_eq, sign_path, HmacSigner, Signer};

/// A single filter invocation, e.g. `format(webp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub name: String,
    pub args: String,
}

impl Filter {
    pub fn new(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }
}

/// Parsed request descriptor. Immutable after parse; normalization
/// produces a copy with appended filters and a regenerated path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params {
    /// True when the request asks for params introspection
    /// (`params/...` prefix) rather than image bytes.
    #[serde(rename = "params", skip_serializing_if = "is_false")]
    pub introspect: bool,

    /// Canonical path: everything after the signature prefix. This is
    /// the string that gets signed and the default cache-key input.
    pub path: String,

    /// Source image key, possibly itself a URL.
    pub image: String,

    #[serde(rename = "unsafe", skip_serializing_if = "is_false")]
    pub unsafe_request: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub hash: String,

    #[serde(skip_serializing_if = "is_false")]
    pub meta: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub trim: bool,

    #[serde(skip_serializing_if = "is_zero")]
    pub crop_left: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub crop_top: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub crop_right: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub crop_bottom: u32,

    #[serde(skip_serializing_if = "is_false")]
    pub fit_in: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub stretch: bool,

    #[serde(skip_serializing_if = "is_zero")]
    pub width: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub height: u32,

    #[serde(skip_serializing_if = "is_false")]
    pub h_flip: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub v_flip: bool,

    /// `left` or `right`; empty means centered.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub h_align: String,
    /// `top` or `bottom`; empty means middle.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub v_align: String,

    #[serde(skip_serializing_if = "is_false")]
    pub smart: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

impl Params {
    /// Whether any crop region is set.
    pub fn has_crop(&self) -> bool {
        self.crop_left > 0 || self.crop_top > 0 || self.crop_right > 0 || self.crop_bottom > 0
    }

    /// Whether a dimensions segment is present.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 || self.height > 0 || self.h_flip || self.v_flip
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Merges configured base params into a request by syntactic prepending:
/// base filters run first, and base transform fields fill whatever the
/// request leaves unset. The canonical path is regenerated from the
/// merged value.
pub fn apply_base(base: &Params, p: &Params) -> Params {
    let mut merged = p.clone();

    let mut filters = base.filters.clone();
    filters.extend(p.filters.iter().cloned());
    merged.filters = filters;

    merged.meta = p.meta || base.meta;
    merged.trim = p.trim || base.trim;
    merged.fit_in = p.fit_in || base.fit_in;
    merged.stretch = p.stretch || base.stretch;
    merged.smart = p.smart || base.smart;

    if !p.has_crop() {
        merged.crop_left = base.crop_left;
        merged.crop_top = base.crop_top;
        merged.crop_right = base.crop_right;
        merged.crop_bottom = base.crop_bottom;
    }
    if !p.has_dimensions() {
        merged.width = base.width;
        merged.height = base.height;
        merged.h_flip = base.h_flip;
        merged.v_flip = base.v_flip;
    }
    if p.h_align.is_empty() {
        merged.h_align = base.h_align.clone();
    }
    if p.v_align.is_empty() {
        merged.v_align = base.v_align.clone();
    }

    merged.path = generate_path(&merged);
    merged
}
