use super::observe::FormatFingerprint;
use super::policy::{render_policy, FormatPolicy, PolicyError, MAX_SIZE_PT, MAX_TWIPS};

/// Derive a policy from what the template actually uses.
///
/// Values the template does not pin fall back to `base`. So do half-point
/// sizes without a whole-point equivalent and anything a policy file could
/// not hold.
pub fn suggest_policy(template: &FormatFingerprint, base: &FormatPolicy) -> FormatPolicy {
    let size_pt = template
        .dominant_size_half_points()
        .filter(|half_points| half_points % 2 == 0)
        .map(|half_points| half_points / 2)
        .filter(|size| (1..=MAX_SIZE_PT).contains(size));
    let storable = |value: Option<i64>| value.filter(|twips| (0..=MAX_TWIPS).contains(twips));
    FormatPolicy {
        forbid_tables: base.forbid_tables && !template.table_present,
        forbid_numbering: base.forbid_numbering,
        run_font_latin: template
            .dominant_latin_font()
            .map(str::to_string)
            .or_else(|| base.run_font_latin.clone()),
        run_font_east_asia: template
            .dominant_east_asia_font()
            .map(str::to_string)
            .or_else(|| base.run_font_east_asia.clone()),
        run_size_pt: size_pt.or(base.run_size_pt),
        line_spacing_twips: storable(template.dominant_line_spacing_twips)
            .or(base.line_spacing_twips),
        first_line_indent_twips: storable(template.dominant_first_line_indent_twips)
            .or(base.first_line_indent_twips),
        twips_tolerance: base.twips_tolerance,
        treat_inherited_as_error: base.treat_inherited_as_error,
        font_aliases: base.font_aliases.clone(),
    }
}

pub fn render_suggested_policy(
    template: &FormatFingerprint,
    base: &FormatPolicy,
) -> Result<String, PolicyError> {
    render_policy(&suggest_policy(template, base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::Document;
    use crate::fixtures::{docx_bytes, paragraph_with_props, styled_run, table};
    use crate::format::observe::observe;
    use crate::format::policy::{default_policy, parse_policy};
    use crate::substitute::TouchedRuns;

    #[test]
    fn suggests_template_dominants_and_allows_tables() {
        let body_paragraph = paragraph_with_props(
            r#"<w:spacing w:line="600" w:lineRule="exact"/><w:ind w:firstLine="420"/>"#,
            &[styled_run(
                "正文",
                r#"<w:rFonts w:ascii="Arial" w:eastAsia="宋体"/><w:sz w:val="28"/>"#,
            )],
        );
        let document = Document::from_bytes(docx_bytes(&[
            body_paragraph.clone(),
            body_paragraph,
            table(vec![vec![vec![paragraph_with_props("", &[])]]]),
        ]))
        .unwrap();
        let fingerprint = observe(document.body(), &TouchedRuns::default());
        let base = default_policy().unwrap();

        let text = render_suggested_policy(&fingerprint, &base).unwrap();
        let suggested = parse_policy(&text).unwrap();
        assert!(!suggested.forbid_tables);
        assert_eq!(suggested.first_line_indent_twips, Some(420));
        assert_eq!(suggested.line_spacing_twips, Some(600));
        assert_eq!(suggested.run_font_latin.as_deref(), Some("Arial"));
        assert_eq!(suggested.run_font_east_asia.as_deref(), Some("宋体"));
        assert_eq!(suggested.run_size_pt, Some(14));
        assert_eq!(suggested.twips_tolerance, base.twips_tolerance);
        assert_eq!(suggested.font_aliases, base.font_aliases);
    }

    #[test]
    fn odd_half_point_sizes_keep_the_base_size() {
        let fingerprint = FormatFingerprint {
            run_size_half_points_hist: [("21".to_string(), 3)].into_iter().collect(),
            ..FormatFingerprint::default()
        };
        let base = default_policy().unwrap();
        assert_eq!(suggest_policy(&fingerprint, &base).run_size_pt, base.run_size_pt);
    }

    #[test]
    fn out_of_range_template_values_keep_the_base_and_stay_loadable() {
        let fingerprint = FormatFingerprint {
            run_size_half_points_hist: [("1000".to_string(), 2)].into_iter().collect(),
            dominant_line_spacing_twips: Some(40_000),
            dominant_first_line_indent_twips: Some(-120),
            ..FormatFingerprint::default()
        };
        let base = default_policy().unwrap();
        let suggested = suggest_policy(&fingerprint, &base);
        assert_eq!(suggested.run_size_pt, base.run_size_pt);
        assert_eq!(suggested.line_spacing_twips, base.line_spacing_twips);
        assert_eq!(suggested.first_line_indent_twips, base.first_line_indent_twips);
        let text = render_suggested_policy(&fingerprint, &base).unwrap();
        let reloaded = parse_policy(&text).unwrap();
        assert_eq!(reloaded.run_size_pt, base.run_size_pt);
        assert_eq!(reloaded.line_spacing_twips, base.line_spacing_twips);
    }
}
