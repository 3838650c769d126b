//! Filename helpers shared by the API and the media pipeline.

/// Video container extensions accepted on upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "avi", "mkv", "webm"];

/// Extension of every produced output file.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Check whether a filename carries one of the allowed video extensions.
pub fn has_allowed_extension(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Reduce a client-supplied filename to a single safe path component.
///
/// Path separators become spaces, whitespace runs collapse into `_`, anything
/// outside `[A-Za-z0-9._-]` is dropped and leading/trailing `.`/`_` are trimmed.
/// The result may be empty.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Check that a name refers to a plain file inside a storage directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
}

/// Resolve the output filename for a processing run.
///
/// A non-blank custom name is sanitized, stripped of any trailing `.mp4`
/// suffixes and given exactly one. Otherwise `generate` supplies the stem.
pub fn output_file_name(custom_name: Option<&str>, generate: impl FnOnce() -> String) -> String {
    let suffix = format!(".{}", OUTPUT_EXTENSION);

    let stem = custom_name
        .map(sanitize_filename)
        .map(|name| strip_suffixes(&name, &suffix))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| strip_suffixes(&generate(), &suffix));

    format!("{}{}", stem, suffix)
}

fn strip_suffixes(name: &str, suffix: &str) -> String {
    let mut stem = name;
    while let Some(cut) = stem.len().checked_sub(suffix.len()) {
        match stem.get(cut..) {
            Some(tail) if tail.eq_ignore_ascii_case(suffix) => stem = &stem[..cut],
            _ => break,
        }
    }
    stem.to_string()
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert!(has_allowed_extension("holiday.mp4"));
        assert!(has_allowed_extension("HOLIDAY.MOV"));
        assert!(has_allowed_extension("a.b.webm"));
        assert!(!has_allowed_extension("notes.txt"));
        assert!(!has_allowed_extension("mp4"));
        assert!(!has_allowed_extension("clip.mp4.exe"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Video (final).mp4"), "My_Video_final.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename("clip-01.mov"), "clip-01.mov");
    }

    #[test]
    fn test_custom_output_name() {
        let never = || -> String { panic!("generator should not run") };
        assert_eq!(output_file_name(Some("holiday"), never), "holiday.mp4");
        assert_eq!(output_file_name(Some("holiday.mp4"), || unreachable!()), "holiday.mp4");
        assert_eq!(output_file_name(Some("holiday.mp4.mp4"), || unreachable!()), "holiday.mp4");
        assert_eq!(output_file_name(Some("../holiday"), || unreachable!()), "holiday.mp4");
    }

    #[test]
    fn test_generated_output_name() {
        assert_eq!(output_file_name(None, || "clip_abc123".to_string()), "clip_abc123.mp4");
        assert_eq!(output_file_name(Some("   "), || "take_x".to_string()), "take_x.mp4");
        assert_eq!(output_file_name(Some("..."), || "shot_y".to_string()), "shot_y.mp4");
    }

    #[test]
    fn test_safe_file_name() {
        assert!(is_safe_file_name("output.mp4"));
        assert!(!is_safe_file_name("../output.mp4"));
        assert!(!is_safe_file_name("dir/output.mp4"));
        assert!(!is_safe_file_name(""));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024), "2.00 GB");
    }
}
