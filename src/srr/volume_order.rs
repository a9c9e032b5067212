//! Volume ordering helper used by SFV-driven SRR creation and by callers
//! sequencing a volume set before calling `SrrWriter::create`. Grounded on
//! the `RarExt`/`extract_rar_number` pattern used to sort `.rNN` volumes
//! in the pack's NZB streamer example, generalized to the `partNN.rar` and
//! plain numeric `.001` conventions named in the spec.

use std::cmp::Ordering;
use std::path::Path;

mod part_pattern {
    //! Hand-rolled `\.part(\d+)\.rar$` matcher (case-insensitive), avoiding a
    //! regex dependency for a single fixed pattern.
    pub fn match_part_number(stem: &str) -> Option<u64> {
        let lower = stem.to_ascii_lowercase();
        let rest = lower.strip_suffix(".rar")?;
        let digits_start = rest.rfind(".part")? + ".part".len();
        let digits = &rest[digits_start..];
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            digits.parse().ok()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    /// `name.partNNN.rar`
    PartNumbered(u64),
    /// Classic `.rar`/`.rNN`/`.sNN` naming: `(letter - 'r') * 100 + digits`,
    /// with plain `.rar` sorting as the implicit `r`, no digits case.
    Classic(i64),
    /// Plain numeric extension: `.001`, `.002`, ...
    Numeric(u64),
    /// Anything else: falls back to a lexicographic comparison of the
    /// whole filename, after all recognized volumes.
    Unrecognized,
}

fn classify(filename: &str) -> SortKey {
    if let Some(n) = part_pattern::match_part_number(filename) {
        return SortKey::PartNumbered(n);
    }

    let lower = filename.to_ascii_lowercase();
    let Some(dot) = lower.rfind('.') else {
        return SortKey::Unrecognized;
    };
    let ext = &lower[dot + 1..];

    if ext == "rar" {
        // Strictly below every `(letter, digits)` pair below, including
        // `.r00`'s key of 0 (`(letter - 'r') * 100 + digits`), so `.rar`
        // always sorts first rather than tying with `.r00`.
        return SortKey::Classic(i64::MIN);
    }

    if ext.len() >= 2 {
        let (letter, digits) = ext.split_at(1);
        let letter = letter.chars().next().unwrap();
        if letter.is_ascii_alphabetic() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(digits) = digits.parse::<i64>() {
                let key = (letter as i64 - 'r' as i64) * 100 + digits;
                return SortKey::Classic(key);
            }
        }
    }

    if ext.chars().all(|c| c.is_ascii_digit()) && !ext.is_empty() {
        if let Ok(n) = ext.parse::<u64>() {
            return SortKey::Numeric(n);
        }
    }

    SortKey::Unrecognized
}

/// Total order on well-formed RAR volume filenames, per §4.3: `.rar` sorts
/// before `.r00 < .r01 < … < .r99 < .s00`; `partNN.rar` sorts by its
/// numeric part; plain numeric `.001`, `.002`, … sort numerically.
pub fn compare_rar_volume_names(a: &Path, b: &Path) -> Ordering {
    let a_name = a.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let b_name = b.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    let a_key = classify(a_name);
    let b_key = classify(b_name);

    match (a_key, b_key) {
        (SortKey::PartNumbered(x), SortKey::PartNumbered(y)) => x.cmp(&y),
        (SortKey::Classic(x), SortKey::Classic(y)) => x.cmp(&y),
        (SortKey::Numeric(x), SortKey::Numeric(y)) => x.cmp(&y),
        (SortKey::Unrecognized, SortKey::Unrecognized) => a_name.cmp(b_name),
        // Different categories: arbitrary but stable, prefer the more
        // specific classification (Part > Classic > Numeric) and push
        // Unrecognized names last.
        (SortKey::Unrecognized, _) => Ordering::Greater,
        (_, SortKey::Unrecognized) => Ordering::Less,
        (SortKey::PartNumbered(_), _) => Ordering::Less,
        (_, SortKey::PartNumbered(_)) => Ordering::Greater,
        (SortKey::Classic(_), SortKey::Numeric(_)) => Ordering::Less,
        (SortKey::Numeric(_), SortKey::Classic(_)) => Ordering::Greater,
    }
}

/// Sort a mutable slice of volume paths in place using
/// [`compare_rar_volume_names`].
pub fn sort_rar_volumes(paths: &mut [std::path::PathBuf]) {
    paths.sort_by(|a, b| compare_rar_volume_names(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classic_sort() {
        let mut files: Vec<PathBuf> = ["file.r02", "file.r00", "file.rar", "file.r10", "file.r01"]
            .iter()
            .map(PathBuf::from)
            .collect();

        sort_rar_volumes(&mut files);

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["file.rar", "file.r00", "file.r01", "file.r02", "file.r10"]
        );
    }

    #[test]
    fn test_rar_before_r00_before_s00() {
        let mut files: Vec<PathBuf> = ["show.s00", "show.r99", "show.rar", "show.r00"]
            .iter()
            .map(PathBuf::from)
            .collect();

        sort_rar_volumes(&mut files);

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["show.rar", "show.r00", "show.r99", "show.s00"]);
    }

    #[test]
    fn test_r00_before_rar_in_input_is_still_reordered() {
        // Regression for a key collision where `.rar` and `.r00` both
        // classified to `Classic(0)`: a stable sort over an input that
        // already lists `.r00` before `.rar` would then leave them
        // untouched instead of actually comparing `Less`.
        let mut files: Vec<PathBuf> = ["show.r00", "show.rar"]
            .iter()
            .map(PathBuf::from)
            .collect();

        sort_rar_volumes(&mut files);

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["show.rar", "show.r00"]);
    }

    #[test]
    fn test_part_numbered_sort() {
        let mut files: Vec<PathBuf> = ["x.part10.rar", "x.part2.rar", "x.part1.rar"]
            .iter()
            .map(PathBuf::from)
            .collect();

        sort_rar_volumes(&mut files);

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["x.part1.rar", "x.part2.rar", "x.part10.rar"]);
    }

    #[test]
    fn test_numeric_extension_sort() {
        let mut files: Vec<PathBuf> = ["a.003", "a.001", "a.002"]
            .iter()
            .map(PathBuf::from)
            .collect();

        sort_rar_volumes(&mut files);

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.001", "a.002", "a.003"]);
    }
}
