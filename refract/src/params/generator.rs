//! Canonical path generation: the mirror image of the parser.

use super::Params;

/// Builds the canonical (unsigned) path for the given params.
///
/// Re-parsing the output yields an equivalent value, so the generated
/// path is stable under normalization and safe to use as a cache key.
pub fn generate_path(p: &Params) -> String {
    let mut segments: Vec<String> = Vec::new();

    if p.meta {
        segments.push("meta".into());
    }
    if p.trim {
        segments.push("trim".into());
    }
    if p.has_crop() {
        segments.push(format!(
            "{}x{}:{}x{}",
            p.crop_left, p.crop_top, p.crop_right, p.crop_bottom
        ));
    }
    if p.fit_in {
        segments.push("fit-in".into());
    }
    if p.stretch {
        segments.push("stretch".into());
    }
    if p.has_dimensions() {
        segments.push(format!(
            "{}{}x{}{}",
            if p.h_flip { "-" } else { "" },
            p.width,
            if p.v_flip { "-" } else { "" },
            p.height
        ));
    }
    if p.h_align == "left" || p.h_align == "right" {
        segments.push(p.h_align.clone());
    }
    if p.v_align == "top" || p.v_align == "bottom" {
        segments.push(p.v_align.clone());
    }
    if p.smart {
        segments.push("smart".into());
    }
    if !p.filters.is_empty() {
        let spec = p
            .filters
            .iter()
            .map(|f| format!("{}({})", f.name, f.args))
            .collect::<Vec<_>>()
            .join(":");
        segments.push(format!("filters:{spec}"));
    }
    if !p.image.is_empty() {
        segments.push(p.image.clone());
    }

    segments.join("/")
}
