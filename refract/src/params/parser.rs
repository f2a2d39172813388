//! Path parsing.
//!
//! Grammar, segments in canonical order (all optional except the image):
//!
//! ```text
//! [params/][unsafe/|<hash>/][meta/][trim/][AxB:CxD/][fit-in/][stretch/]
//! [-Wx-H/][left|right|center/][top|bottom|middle/][smart/]
//! [filters:name(args):.../]<image>
//! ```
//!
//! The signature prefix is peeled first; everything after it is the
//! canonical path recorded in [`Params::path`], which is what gets
//! signed.

use super::{Filter, Params};

/// Parses a request path into [`Params`].
///
/// Transform segments are consumed only while an image remainder exists,
/// so an image key that happens to look like a segment is left intact.
pub fn parse(path: &str) -> Params {
    parse_inner(path, true)
}

/// Parses a base-params fragment: same grammar, but without requiring a
/// trailing image, so a fragment like `fit-in/200x200` consumes fully.
pub fn parse_fragment(fragment: &str) -> Params {
    parse_inner(fragment, false)
}

fn parse_inner(path: &str, require_image: bool) -> Params {
    let mut p = Params::default();
    let mut rest = path.trim_start_matches('/');

    if let Some(r) = rest.strip_prefix("params/") {
        p.introspect = true;
        rest = r;
    }

    if let Some(r) = rest.strip_prefix("unsafe/") {
        p.unsafe_request = true;
        rest = r;
    } else if let Some((first, r)) = rest.split_once('/') {
        if looks_like_hash(first) {
            p.hash = first.to_string();
            rest = r;
        }
    }

    p.path = rest.to_string();

    if let Some(r) = take_flag(rest, "meta", require_image) {
        p.meta = true;
        rest = r;
    }
    if let Some(r) = take_flag(rest, "trim", require_image) {
        p.trim = true;
        rest = r;
    }
    if let Some((seg, r)) = next_segment(rest, require_image) {
        if let Some((left, top, right, bottom)) = parse_crop(seg) {
            p.crop_left = left;
            p.crop_top = top;
            p.crop_right = right;
            p.crop_bottom = bottom;
            rest = r;
        }
    }
    if let Some(r) = take_flag(rest, "fit-in", require_image) {
        p.fit_in = true;
        rest = r;
    }
    if let Some(r) = take_flag(rest, "stretch", require_image) {
        p.stretch = true;
        rest = r;
    }
    if let Some((seg, r)) = next_segment(rest, require_image) {
        if let Some((width, height, h_flip, v_flip)) = parse_dimensions(seg) {
            p.width = width;
            p.height = height;
            p.h_flip = h_flip;
            p.v_flip = v_flip;
            rest = r;
        }
    }
    if let Some((seg, r)) = next_segment(rest, require_image) {
        match seg {
            "left" | "right" => {
                p.h_align = seg.to_string();
                rest = r;
            }
            // Centered is the default; normalize it away so generated
            // paths are canonical.
            "center" => rest = r,
            _ => {}
        }
    }
    if let Some((seg, r)) = next_segment(rest, require_image) {
        match seg {
            "top" | "bottom" => {
                p.v_align = seg.to_string();
                rest = r;
            }
            "middle" => rest = r,
            _ => {}
        }
    }
    if let Some(r) = take_flag(rest, "smart", require_image) {
        p.smart = true;
        rest = r;
    }
    if let Some(spec_rest) = rest.strip_prefix("filters:") {
        // The filters segment ends at the first closing paren followed
        // by a slash, so arguments may themselves contain slashes
        // (e.g. watermark URLs).
        if let Some(end) = spec_rest.find(")/") {
            p.filters = parse_filters(&spec_rest[..=end]);
            rest = &spec_rest[end + 2..];
        } else if !require_image && spec_rest.ends_with(')') {
            p.filters = parse_filters(spec_rest);
            rest = "";
        }
    }

    p.image = rest.to_string();
    p
}

/// Splits off the next path segment. With `require_more` the segment is
/// only yielded when a non-empty remainder follows it.
fn next_segment(rest: &str, require_more: bool) -> Option<(&str, &str)> {
    match rest.split_once('/') {
        Some((seg, remainder)) => {
            if require_more && remainder.is_empty() {
                None
            } else {
                Some((seg, remainder))
            }
        }
        None => {
            if require_more || rest.is_empty() {
                None
            } else {
                Some((rest, ""))
            }
        }
    }
}

fn take_flag<'a>(rest: &'a str, flag: &str, require_more: bool) -> Option<&'a str> {
    let (seg, remainder) = next_segment(rest, require_more)?;
    if seg == flag {
        Some(remainder)
    } else {
        None
    }
}

/// Matches a crop segment `AxB:CxD`.
fn parse_crop(seg: &str) -> Option<(u32, u32, u32, u32)> {
    let (lt, rb) = seg.split_once(':')?;
    let (left, top) = lt.split_once('x')?;
    let (right, bottom) = rb.split_once('x')?;
    Some((
        left.parse().ok()?,
        top.parse().ok()?,
        right.parse().ok()?,
        bottom.parse().ok()?,
    ))
}

/// Matches a dimensions segment `[-]Wx[-]H`, where a leading minus flips
/// the respective axis and an absent number means "keep aspect".
fn parse_dimensions(seg: &str) -> Option<(u32, u32, bool, bool)> {
    let (w, h) = seg.split_once('x')?;
    let (width, h_flip) = parse_axis(w)?;
    let (height, v_flip) = parse_axis(h)?;
    if width == 0 && height == 0 && !h_flip && !v_flip {
        return None;
    }
    Some((width, height, h_flip, v_flip))
}

fn parse_axis(value: &str) -> Option<(u32, bool)> {
    let (digits, flip) = match value.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (value, false),
    };
    if digits.is_empty() {
        return Some((0, flip));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, flip))
}

/// Splits a filter spec on `:` outside parentheses, so arguments may
/// themselves contain colons (e.g. watermark URLs).
fn parse_filters(spec: &str) -> Vec<Filter> {
    let mut filters = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in spec.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                filters.extend(parse_filter(&spec[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    filters.extend(parse_filter(&spec[start..]));
    filters
}

fn parse_filter(token: &str) -> Option<Filter> {
    if token.is_empty() {
        return None;
    }
    match token.split_once('(') {
        Some((name, args)) => {
            let args = args.strip_suffix(')').unwrap_or(args);
            Some(Filter::new(name, args))
        }
        None => Some(Filter::new(token, "")),
    }
}

fn looks_like_hash(seg: &str) -> bool {
    (26..=32).contains(&seg.len())
        && seg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'=')
}

#[cfg(test)]
mod tests {
    use super::super::generate_path;
    use super::*;

    #[test]
    fn test_plain_image() {
        let p = parse("unsafe/foo.jpg");
        assert!(p.unsafe_request);
        assert_eq!(p.path, "foo.jpg");
        assert_eq!(p.image, "foo.jpg");
        assert!(!p.meta);
        assert!(p.filters.is_empty());
    }

    #[test]
    fn test_signed_path() {
        let p = parse("_-19cQt1szHeUV0WyWFntvTImDI=/foo.jpg");
        assert_eq!(p.hash, "_-19cQt1szHeUV0WyWFntvTImDI=");
        assert_eq!(p.path, "foo.jpg");
        assert_eq!(p.image, "foo.jpg");
        assert!(!p.unsafe_request);
    }

    #[test]
    fn test_unsigned_path_has_no_hash() {
        let p = parse("foo.jpg");
        assert_eq!(p.hash, "");
        assert_eq!(p.path, "foo.jpg");
        assert_eq!(p.image, "foo.jpg");
    }

    #[test]
    fn test_full_transform_path() {
        let p = parse("unsafe/meta/trim/10x20:300x400/fit-in/stretch/-100x-200/left/top/smart/filters:blur(2):format(webp)/some/dir/img.jpg");
        assert!(p.meta);
        assert!(p.trim);
        assert_eq!(
            (p.crop_left, p.crop_top, p.crop_right, p.crop_bottom),
            (10, 20, 300, 400)
        );
        assert!(p.fit_in);
        assert!(p.stretch);
        assert_eq!((p.width, p.height), (100, 200));
        assert!(p.h_flip);
        assert!(p.v_flip);
        assert_eq!(p.h_align, "left");
        assert_eq!(p.v_align, "top");
        assert!(p.smart);
        assert_eq!(p.filters.len(), 2);
        assert_eq!(p.filters[0], Filter::new("blur", "2"));
        assert_eq!(p.filters[1], Filter::new("format", "webp"));
        assert_eq!(p.image, "some/dir/img.jpg");
    }

    #[test]
    fn test_image_that_looks_like_a_segment_is_kept() {
        // No remainder after "200x300", so it must be the image.
        let p = parse("unsafe/200x300");
        assert_eq!(p.image, "200x300");
        assert_eq!(p.width, 0);
        assert_eq!(p.height, 0);
    }

    #[test]
    fn test_center_and_middle_are_normalized_away() {
        let p = parse("unsafe/100x100/center/middle/img.jpg");
        assert_eq!(p.h_align, "");
        assert_eq!(p.v_align, "");
        assert_eq!(generate_path(&p), "100x100/img.jpg");
    }

    #[test]
    fn test_params_introspection_prefix() {
        let p = parse("params/unsafe/fit-in/40x40/img.jpg");
        assert!(p.introspect);
        assert!(p.unsafe_request);
        assert!(p.fit_in);
        assert_eq!(p.path, "fit-in/40x40/img.jpg");
    }

    #[test]
    fn test_filter_args_with_colons_and_slashes() {
        let p = parse("unsafe/filters:watermark(https://example.com/l.png,10,10)/img.jpg");
        assert_eq!(p.filters.len(), 1);
        assert_eq!(p.filters[0].name, "watermark");
        assert_eq!(p.filters[0].args, "https://example.com/l.png,10,10");
        assert_eq!(p.image, "img.jpg");
    }

    #[test]
    fn test_filters_without_trailing_image_stay_in_the_image() {
        // A transform segment is only a transform when an image follows.
        let p = parse("unsafe/filters:blur(2)");
        assert!(p.filters.is_empty());
        assert_eq!(p.image, "filters:blur(2)");
    }

    #[test]
    fn test_url_image_key() {
        let p = parse("unsafe/500x500/https://example.com/pic.jpg");
        assert_eq!(p.width, 500);
        assert_eq!(p.image, "https://example.com/pic.jpg");
    }

    #[test]
    fn test_generate_is_fixed_point_under_reparse() {
        let paths = [
            "unsafe/foo.jpg",
            "unsafe/meta/foo.jpg",
            "unsafe/fit-in/300x200/filters:format(webp)/img.jpg",
            "unsafe/10x10:50x50/-0x0/right/bottom/smart/img.jpg",
            "unsafe/trim/stretch/x200/a/b/c.png",
            "unsafe/filters:watermark(https://e.com/a.png,0,0):blur(2)/img.jpg",
        ];
        for path in paths {
            let p = parse(path);
            let generated = generate_path(&p);
            let reparsed = parse(&format!("unsafe/{generated}"));
            assert_eq!(
                generate_path(&reparsed),
                generated,
                "path {path} did not settle"
            );
        }
    }

    #[test]
    fn test_fragment_without_image() {
        let p = parse_fragment("fit-in/200x200");
        assert!(p.fit_in);
        assert_eq!((p.width, p.height), (200, 200));
        assert_eq!(p.image, "");

        let p = parse_fragment("filters:watermark(logo.png)");
        assert_eq!(p.filters.len(), 1);
        assert_eq!(p.image, "");
    }
}
