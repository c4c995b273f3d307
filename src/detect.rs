/// Auto-detection of coverage report schemas.
///
/// Strategy:
///   1. Check file extension for strong hints
///   2. Peek at the root element in the first bytes of the file content
///   3. Fall back to CLI --format override (handled by caller)
use std::path::Path;

use crate::error::CovnormError;

/// Report schemas that have a preprocessing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    OpenCover,
    PartCover,
    DotCover,
    VisualStudio,
    JaCoCo,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::OpenCover => "opencover",
            Format::PartCover => "partcover",
            Format::DotCover => "dotcover",
            Format::VisualStudio => "visualstudio",
            Format::JaCoCo => "jacoco",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CovnormError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opencover" => Ok(Format::OpenCover),
            "partcover" => Ok(Format::PartCover),
            "dotcover" => Ok(Format::DotCover),
            "visualstudio" => Ok(Format::VisualStudio),
            "jacoco" => Ok(Format::JaCoCo),
            _ => Err(CovnormError::Parse(format!(
                "Unknown format: '{}'. Supported: opencover, partcover, dotcover, visualstudio, jacoco",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the report schema from filename and file content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    if let Some(fmt) = detect_by_extension(path) {
        return Some(fmt);
    }

    detect_by_content(content)
}

fn detect_by_extension(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "coveragexml" => Some(Format::VisualStudio),
        _ => None,
    }
}

fn detect_by_content(content: &[u8]) -> Option<Format> {
    let head_len = content.len().min(4096);
    let head = String::from_utf8_lossy(&content[..head_len]);

    if !(head.contains("<?xml") || head.trim_start().starts_with('<')) {
        return None;
    }

    // PartCover 2.2 carries a `ver` attribute on the root; only 2.3 is handled.
    if let Some(tag) = start_tag(&head, "PartCoverReport") {
        return (!tag.contains("ver=")).then_some(Format::PartCover);
    }
    if start_tag(&head, "CoverageSession").is_some() {
        return Some(Format::OpenCover);
    }
    if start_tag(&head, "CoverageDSPriv").is_some() {
        return Some(Format::VisualStudio);
    }
    if start_tag(&head, "Root").is_some_and(|tag| tag.contains("DetailedXml")) {
        return Some(Format::DotCover);
    }
    if start_tag(&head, "report").is_some_and(|tag| tag.contains("name=")) {
        return Some(Format::JaCoCo);
    }

    None
}

/// Text of the first start tag named `name`, without the angle brackets.
fn start_tag<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{}", name);
    let mut from = 0;
    while let Some(pos) = head[from..].find(&open) {
        let start = from + pos + 1;
        let rest = &head[start..];
        let after_name = rest[name.len()..].chars().next();
        if matches!(after_name, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            let end = rest.find('>').unwrap_or(rest.len());
            return Some(&rest[..end]);
        }
        from = start;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_root_element() {
        let path = Path::new("coverage.xml");
        assert_eq!(
            detect_format(path, b"<?xml version=\"1.0\"?>\n<CoverageSession xmlns:xsd=\"x\">"),
            Some(Format::OpenCover)
        );
        assert_eq!(
            detect_format(path, b"<PartCoverReport date=\"2011-01-01\">"),
            Some(Format::PartCover)
        );
        assert_eq!(detect_format(path, b"<CoverageDSPriv>"), Some(Format::VisualStudio));
        assert_eq!(
            detect_format(path, b"<Root CoveredStatements=\"1\" ReportType=\"DetailedXml\">"),
            Some(Format::DotCover)
        );
        assert_eq!(
            detect_format(path, b"<!DOCTYPE report><report name=\"app\"><package name=\"a\"/>"),
            Some(Format::JaCoCo)
        );
    }

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(
            detect_format(Path::new("run.coveragexml"), b""),
            Some(Format::VisualStudio)
        );
    }

    #[test]
    fn test_partcover_22_is_not_handled() {
        let path = Path::new("coverage.xml");
        assert_eq!(detect_format(path, b"<PartCoverReport ver=\"2.2\">"), None);
    }

    #[test]
    fn test_similar_names_do_not_match() {
        let path = Path::new("coverage.xml");
        assert_eq!(detect_format(path, b"<RootNode ReportType=\"DetailedXml\">"), None);
        assert_eq!(detect_format(path, b"<reports name=\"x\">"), None);
        assert_eq!(detect_format(path, b"<Root ReportType=\"Html\">"), None);
    }

    #[test]
    fn test_detect_unknown() {
        let path = Path::new("random.dat");
        assert_eq!(detect_format(path, b"hello world"), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("OpenCover".parse::<Format>().unwrap(), Format::OpenCover);
        assert_eq!(Format::JaCoCo.to_string(), "jacoco");
        assert!("lcov".parse::<Format>().is_err());
    }
}
