//! Turns untrusted object keys into a single safe file name.
//!
//! The output never contains a path separator, a `..` component, a control
//! character or any of `<>:"|?*`, and is at most [`MAX_NAME_LEN`] bytes.
//! Keys that reduce to nothing become [`FALLBACK_NAME`].

use std::path::{Component, Path, PathBuf};

pub const MAX_NAME_LEN: usize = 255;
pub const FALLBACK_NAME: &str = "unnamed";

/// Longest extension (dot included) that is still treated as one.
pub const MAX_EXTENSION_LEN: usize = 16;

const DISALLOWED: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

pub fn sanitize_key(key: &str) -> String {
    let mut name = key.to_string();

    // Removing one traversal sequence can splice a new one together
    // (`....//` -> `../`), so repeat until nothing changes.
    loop {
        let next = name.replace("../", "").replace("..\\", "");
        if next == name {
            break;
        }
        name = next;
    }

    let name = name.trim_start_matches(['/', '\\']);
    let mut name: String = name
        .chars()
        .map(|c| {
            if DISALLOWED.contains(&c) || c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if name.len() > MAX_NAME_LEN {
        name = truncate_preserving_extension(&name);
    }

    if name.is_empty() || name == "." || name == ".." {
        return FALLBACK_NAME.to_string();
    }
    name
}

/// Extension of a sanitized name including the leading dot, or empty.
///
/// A leading dot alone (`.bashrc`), a trailing dot and anything longer than
/// [`MAX_EXTENSION_LEN`] are not extensions.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => "",
        Some(pos) if pos + 1 == name.len() || name.len() - pos > MAX_EXTENSION_LEN => "",
        Some(pos) => &name[pos..],
    }
}

/// Extension of the key's last path segment, sanitized.
///
/// Dots in directory names never contribute, so `release-1.2/payload` has
/// no extension.
pub fn key_extension(key: &str) -> String {
    let segment = key.rfind(['/', '\\']).map_or(key, |pos| &key[pos + 1..]);
    extension_of(&sanitize_key(segment)).to_string()
}

/// Resolve `name` under `root` and confirm the result stays lexically inside
/// it. Returns `None` when any component would climb out or re-root.
pub fn resolve_within(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let resolved = root.join(relative);
    resolved.starts_with(root).then_some(resolved)
}

fn truncate_preserving_extension(name: &str) -> String {
    let ext = extension_of(name);
    let stem = &name[..name.len() - ext.len()];
    let budget = MAX_NAME_LEN - ext.len();
    let mut cut = budget.min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &stem[..cut], ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_safe(out: &str) {
        assert!(!out.is_empty());
        assert!(out.len() <= MAX_NAME_LEN, "too long: {}", out.len());
        assert!(!out.contains('/') && !out.contains('\\'), "separator in {out}");
        assert!(!out.chars().any(|c| DISALLOWED.contains(&c)), "bad char in {out}");
        assert!(out != "." && out != "..");
        assert!(!out.contains("../") && !out.contains("..\\"));
    }

    #[test]
    fn plain_keys_keep_their_name() {
        assert_eq!(sanitize_key("report.pdf"), "report.pdf");
        assert_eq!(sanitize_key("docs/2025/report.pdf"), "docs_2025_report.pdf");
    }

    #[test]
    fn traversal_is_removed_until_stable() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_key("....//etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_key(".../...//x"), "x");
        assert_eq!(sanitize_key("..\\..\\windows\\win.ini"), "windows_win.ini");

        for depth in 1..12 {
            let key = format!("{}{}", "..../".repeat(depth), "..//".repeat(depth)) + "secret";
            let out = sanitize_key(&key);
            assert_safe(&out);
        }
    }

    #[test]
    fn interleaved_patterns_never_leave_dotdot_segments() {
        let fragments = ["..", "../", "/", ".", "\\", "..\\", "a"];
        // Exhaustive over short combinations of the fragments.
        for a in fragments {
            for b in fragments {
                for c in fragments {
                    for d in fragments {
                        let out = sanitize_key(&format!("{a}{b}{c}{d}"));
                        assert_safe(&out);
                    }
                }
            }
        }
    }

    #[test]
    fn disallowed_characters_are_replaced() {
        assert_eq!(sanitize_key("a<b>c:d\"e|f?g*h.txt"), "a_b_c_d_e_f_g_h.txt");
        assert_eq!(sanitize_key("tab\there\0.bin"), "tab_here_.bin");
    }

    #[test]
    fn leading_separators_are_stripped() {
        assert_eq!(sanitize_key("///abs/path.txt"), "abs_path.txt");
        assert_eq!(sanitize_key("\\\\server\\share.txt"), "server_share.txt");
    }

    #[test]
    fn degenerate_keys_fall_back() {
        assert_eq!(sanitize_key(""), FALLBACK_NAME);
        assert_eq!(sanitize_key("../"), FALLBACK_NAME);
        assert_eq!(sanitize_key("../../"), FALLBACK_NAME);
        assert_eq!(sanitize_key("/"), FALLBACK_NAME);
        assert_eq!(sanitize_key(".."), FALLBACK_NAME);
        assert_eq!(sanitize_key("."), FALLBACK_NAME);
    }

    #[test]
    fn long_names_keep_extension() {
        let key = format!("{}.tar.gz", "a".repeat(400));
        let out = sanitize_key(&key);
        assert_eq!(out.len(), MAX_NAME_LEN);
        assert!(out.ends_with(".gz"));

        let key = format!("{}.pdf", "é".repeat(300));
        let out = sanitize_key(&key);
        assert!(out.len() <= MAX_NAME_LEN);
        assert!(out.ends_with(".pdf"));
    }

    #[test]
    fn extension_detection() {
        assert_eq!(extension_of("report.pdf"), ".pdf");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of(".bashrc"), "");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of(&format!("a.{}", "x".repeat(MAX_EXTENSION_LEN))), "");
    }

    #[test]
    fn key_extension_uses_last_segment_only() {
        assert_eq!(key_extension("docs/report.pdf"), ".pdf");
        assert_eq!(key_extension("release-1.2/payload"), "");
        assert_eq!(key_extension("win\\dir.d\\setup.exe"), ".exe");
        assert_eq!(key_extension("a/b.t?t"), ".t_t");
        assert_eq!(key_extension("x/.."), "");
        assert_eq!(key_extension(&format!("1.2/{}", "x".repeat(251))), "");
        assert_eq!(key_extension(&format!("a/b.{}", "y".repeat(300))), "");
    }

    #[test]
    fn resolved_names_stay_inside_root() {
        let root = Path::new("/tmp/ws-1234");
        for key in [
            "....//etc/passwd",
            "../../../../root/.ssh/id_rsa",
            "/etc/shadow",
            "..\\..\\boot.ini",
            "",
            "..",
            "a/../../b",
        ] {
            let name = sanitize_key(key);
            let resolved = resolve_within(root, &name).expect("sanitized name must resolve");
            assert!(resolved.starts_with(root), "{key} escaped to {resolved:?}");
            assert_eq!(resolved.parent(), Some(root));
        }
    }

    #[test]
    fn resolve_rejects_escaping_names() {
        let root = Path::new("/tmp/ws");
        assert!(resolve_within(root, "../x").is_none());
        assert!(resolve_within(root, "/etc/passwd").is_none());
        assert!(resolve_within(root, "ok.txt").is_some());
    }
}
