use serde::{Deserialize, Serialize};

/// Longest filename (in bytes) passed on to the backend.
const MAX_FILENAME_BYTES: usize = 255;

/// Characters no common filesystem accepts in a filename.
const ILLEGAL_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Backend file category, derived from the uploaded file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Document,
    Image,
    Audio,
    Video,
    Custom,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Document => "document",
            FileCategory::Image => "image",
            FileCategory::Audio => "audio",
            FileCategory::Video => "video",
            FileCategory::Custom => "custom",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an extension (with or without the leading dot, any case) to its category.
pub fn file_type_for_extension(extension: &str) -> FileCategory {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "md" | "markdown" | "pdf" | "html" | "xlsx" | "xls" | "docx" | "csv" | "eml"
        | "msg" | "pptx" | "ppt" | "xml" | "epub" => FileCategory::Document,
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" => FileCategory::Image,
        "mp3" | "m4a" | "wav" | "webm" | "amr" => FileCategory::Audio,
        "mp4" | "mov" | "mpeg" | "mpga" => FileCategory::Video,
        _ => FileCategory::Custom,
    }
}

/// `<prefix>_<YYYYmmddHHMMSS>` in local time.
pub fn generated_filename(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Local::now().format("%Y%m%d%H%M%S"))
}

/// Replace filesystem-illegal characters with `_`, substitute a generated name
/// for empty input, and cap the length while keeping the extension.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if cleaned.is_empty() || cleaned == "." {
        return generated_filename("file");
    }

    if cleaned.len() <= MAX_FILENAME_BYTES {
        return cleaned;
    }

    let ext = match cleaned.rfind('.') {
        Some(idx) if cleaned.len() - idx < MAX_FILENAME_BYTES => &cleaned[idx..],
        _ => "",
    };
    let stem = truncate_to_char_boundary(&cleaned, MAX_FILENAME_BYTES - ext.len());
    format!("{stem}{ext}")
}

/// Last path segment of a URL, without query or fragment. Empty when the URL
/// has no usable segment.
pub fn filename_from_url(raw: &str) -> String {
    if let Ok(parsed) = url::Url::parse(raw) {
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
    }

    let without_query = raw.split(['?', '#']).next().unwrap_or_default();
    without_query
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Value of the `filename=` parameter in a Content-Disposition header.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let value = rest
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_to_categories() {
        assert_eq!(file_type_for_extension("pdf"), FileCategory::Document);
        assert_eq!(file_type_for_extension(".PNG"), FileCategory::Image);
        assert_eq!(file_type_for_extension("mp3"), FileCategory::Audio);
        assert_eq!(file_type_for_extension("mov"), FileCategory::Video);
    }

    #[test]
    fn unknown_extension_is_custom() {
        assert_eq!(file_type_for_extension("xyz"), FileCategory::Custom);
        assert_eq!(file_type_for_extension(""), FileCategory::Custom);
    }

    #[test]
    fn category_serializes_lowercase() {
        assert_eq!(serde_json::to_value(FileCategory::Document).unwrap(), "document");
        assert_eq!(FileCategory::Custom.to_string(), "custom");
    }

    #[test]
    fn illegal_characters_become_underscores() {
        assert_eq!(sanitize_filename(r#"a/b\c:d*e?f"g<h>i|j.txt"#), "a_b_c_d_e_f_g_h_i_j.txt");
    }

    #[test]
    fn empty_name_gets_generated_name() {
        let name = sanitize_filename("");
        assert!(name.starts_with("file_"));
        assert_eq!(name.len(), "file_".len() + 14);
        assert!(sanitize_filename(".").starts_with("file_"));
    }

    #[test]
    fn long_names_are_capped_and_keep_extension() {
        let long = format!("{}.pdf", "a".repeat(300));
        let name = sanitize_filename(&long);
        assert_eq!(name.len(), 255);
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn long_multibyte_names_stay_valid_utf8() {
        let long = format!("{}.txt", "文".repeat(120));
        let name = sanitize_filename(&long);
        assert!(name.len() <= 255);
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn url_filename_drops_query() {
        assert_eq!(filename_from_url("https://cdn.example.com/docs/report.pdf?sig=abc"), "report.pdf");
        assert_eq!(filename_from_url("https://cdn.example.com/"), "");
        assert_eq!(filename_from_url("not a url/file.txt?x=1"), "file.txt");
    }

    #[test]
    fn content_disposition_filename() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="q3 report.xlsx""#).as_deref(),
            Some("q3 report.xlsx")
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
    }
}
