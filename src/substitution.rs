//! Placeholder matching over a paragraph's run texts.
//!
//! A paragraph's visible text is split across runs. Replacement works on the
//! concatenated text and maps every edit back onto the runs, so text that is
//! not part of a match keeps its run (and therefore its formatting).

use std::ops::Range;

/// How placeholders are matched inside one paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubstitutionMode {
    /// Scan the template text once. At each position the longest matching
    /// field name wins, and substituted values are never rescanned.
    #[default]
    SinglePass,

    /// Apply the fields one after another in column order, each as a
    /// whole-string replace. A later field can match inside an earlier
    /// field's value.
    Sequential,
}

/// Replace placeholders in `runs` in place. Returns `true` when any run
/// changed.
///
/// `fields` are `(name, value)` pairs in column order; empty names are
/// ignored.
pub(crate) fn substitute_runs(
    runs: &mut [String],
    fields: &[(String, String)],
    mode: SubstitutionMode,
) -> bool {
    match mode {
        SubstitutionMode::SinglePass => {
            let text = runs.concat();
            let matches = single_pass_matches(&text, fields);
            if matches.is_empty() {
                return false;
            }
            apply_matches(runs, &text, &matches);
            true
        }
        SubstitutionMode::Sequential => {
            let mut changed = false;
            for (name, value) in fields {
                if name.is_empty() {
                    continue;
                }
                let text = runs.concat();
                let matches: Vec<(Range<usize>, &str)> = text
                    .match_indices(name.as_str())
                    .map(|(start, m)| (start..start + m.len(), value.as_str()))
                    .collect();
                if matches.is_empty() {
                    continue;
                }
                apply_matches(runs, &text, &matches);
                changed = true;
            }
            changed
        }
    }
}

/// Non-overlapping matches found left to right in one scan of `text`.
fn single_pass_matches<'f>(
    text: &str,
    fields: &'f [(String, String)],
) -> Vec<(Range<usize>, &'f str)> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let best = fields
            .iter()
            .filter(|(name, _)| !name.is_empty() && rest.starts_with(name.as_str()))
            .max_by_key(|(name, _)| name.len());

        match best {
            Some((name, value)) => {
                out.push((pos..pos + name.len(), value.as_str()));
                pos += name.len();
            }
            None => {
                // advance one character, not one byte
                pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
            }
        }
    }

    out
}

/// Rewrite `runs` so their concatenation equals `text` with each match
/// replaced by its value.
///
/// `text` must be `runs.concat()` and `matches` must be sorted and
/// non-overlapping. A replacement lands in the run where its match starts;
/// the rest of the matched text is removed from whichever runs held it.
fn apply_matches(runs: &mut [String], text: &str, matches: &[(Range<usize>, &str)]) {
    let mut bounds = Vec::with_capacity(runs.len());
    let mut offset = 0;
    for run in runs.iter() {
        bounds.push(offset..offset + run.len());
        offset += run.len();
    }

    let mut rebuilt = vec![String::new(); runs.len()];
    let mut cursor = 0;

    for (range, value) in matches {
        copy_span(&mut rebuilt, &bounds, text, cursor..range.start);
        if let Some(idx) = bounds.iter().position(|b| b.contains(&range.start)) {
            rebuilt[idx].push_str(value);
        }
        cursor = range.end;
    }
    copy_span(&mut rebuilt, &bounds, text, cursor..text.len());

    for (run, new_text) in runs.iter_mut().zip(rebuilt) {
        *run = new_text;
    }
}

/// Copy `span` of `text` into the runs that originally held it.
fn copy_span(rebuilt: &mut [String], bounds: &[Range<usize>], text: &str, span: Range<usize>) {
    if span.is_empty() {
        return;
    }
    for (idx, b) in bounds.iter().enumerate() {
        let start = b.start.max(span.start);
        let end = b.end.min(span.end);
        if start < end {
            rebuilt[idx].push_str(&text[start..end]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn runs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn replaces_every_occurrence_in_one_run() {
        let mut r = runs(&["grantee_name and grantee_name"]);
        let f = fields(&[("grantee_name", "Acme")]);
        assert!(substitute_runs(&mut r, &f, SubstitutionMode::SinglePass));
        assert_eq!(r, runs(&["Acme and Acme"]));
    }

    #[test]
    fn match_split_across_runs_lands_in_first_run() {
        let mut r = runs(&["Dear grantee", "_na", "me, hello"]);
        let f = fields(&[("grantee_name", "Acme")]);
        assert!(substitute_runs(&mut r, &f, SubstitutionMode::SinglePass));
        assert_eq!(r, runs(&["Dear Acme", "", ", hello"]));
    }

    #[test]
    fn untouched_runs_keep_their_text() {
        let mut r = runs(&["Bold ", "grant_number", " tail"]);
        let f = fields(&[("grant_number", "G-7")]);
        substitute_runs(&mut r, &f, SubstitutionMode::SinglePass);
        assert_eq!(r, runs(&["Bold ", "G-7", " tail"]));
    }

    #[test]
    fn no_match_reports_unchanged() {
        let mut r = runs(&["nothing here"]);
        let f = fields(&[("grantee_name", "Acme")]);
        assert!(!substitute_runs(&mut r, &f, SubstitutionMode::SinglePass));
        assert!(!substitute_runs(&mut r, &f, SubstitutionMode::Sequential));
        assert_eq!(r, runs(&["nothing here"]));
    }

    #[test]
    fn single_pass_prefers_longest_name() {
        let mut r = runs(&["grant grant_number"]);
        let f = fields(&[("grant", "G"), ("grant_number", "42")]);
        substitute_runs(&mut r, &f, SubstitutionMode::SinglePass);
        assert_eq!(r, runs(&["G 42"]));
    }

    #[test]
    fn single_pass_never_rescans_values() {
        let mut r = runs(&["contact_name / sig_name"]);
        let f = fields(&[("contact_name", "sig_name"), ("sig_name", "Jane")]);
        substitute_runs(&mut r, &f, SubstitutionMode::SinglePass);
        assert_eq!(r, runs(&["sig_name / Jane"]));
    }

    #[test]
    fn sequential_rescans_earlier_values() {
        let mut r = runs(&["contact_name / sig_name"]);
        let f = fields(&[("contact_name", "sig_name"), ("sig_name", "Jane")]);
        substitute_runs(&mut r, &f, SubstitutionMode::Sequential);
        assert_eq!(r, runs(&["Jane / Jane"]));
    }

    #[test]
    fn empty_names_are_ignored() {
        let mut r = runs(&["abc"]);
        let f = fields(&[("", "x")]);
        assert!(!substitute_runs(&mut r, &f, SubstitutionMode::SinglePass));
        assert!(!substitute_runs(&mut r, &f, SubstitutionMode::Sequential));
    }

    #[test]
    fn multibyte_text_is_walked_by_char() {
        let mut r = runs(&["Grüße, grantee_name ok"]);
        let f = fields(&[("grantee_name", "Zoë")]);
        substitute_runs(&mut r, &f, SubstitutionMode::SinglePass);
        assert_eq!(r, runs(&["Grüße, Zoë ok"]));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let mut r = runs(&["Grantee_Name"]);
        let f = fields(&[("grantee_name", "Acme")]);
        assert!(!substitute_runs(&mut r, &f, SubstitutionMode::SinglePass));
    }
}
