use super::mime_probe::MimeProbe;
use crate::error::{HashBakerError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Closed set of protected-file categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Pdf,
    Office,
    Zip,
    Rar,
    SevenZip,
    Pcap,
    Ntds,
    Unknown,
}

impl FormatTag {
    pub const SUPPORTED: [FormatTag; 7] = [
        FormatTag::Pdf,
        FormatTag::Office,
        FormatTag::Zip,
        FormatTag::Rar,
        FormatTag::SevenZip,
        FormatTag::Pcap,
        FormatTag::Ntds,
    ];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(FormatTag::Pdf),
            "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" => Some(FormatTag::Office),
            "zip" => Some(FormatTag::Zip),
            "rar" => Some(FormatTag::Rar),
            "7z" => Some(FormatTag::SevenZip),
            "pcap" | "cap" | "pcapng" => Some(FormatTag::Pcap),
            _ => None,
        }
    }

    /// Maps a sniffed MIME type onto a tag. First matching signature wins.
    pub fn from_mime(mime: &str) -> Option<Self> {
        const SIGNATURES: &[(&str, FormatTag)] = &[
            ("officedocument", FormatTag::Office),
            ("msword", FormatTag::Office),
            ("ms-excel", FormatTag::Office),
            ("ms-powerpoint", FormatTag::Office),
            ("cdfv2", FormatTag::Office),
            ("pdf", FormatTag::Pdf),
            ("pcap", FormatTag::Pcap),
            ("7z", FormatTag::SevenZip),
            ("rar", FormatTag::Rar),
            ("zip", FormatTag::Zip),
        ];

        let mime = mime.to_lowercase();
        SIGNATURES
            .iter()
            .find(|(needle, _)| mime.contains(needle))
            .map(|(_, tag)| *tag)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatTag::Pdf => "PDF",
            FormatTag::Office => "Office",
            FormatTag::Zip => "ZIP",
            FormatTag::Rar => "RAR",
            FormatTag::SevenZip => "7-Zip",
            FormatTag::Pcap => "PCAP",
            FormatTag::Ntds => "NTDS",
            FormatTag::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The file being processed in this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    pub path: PathBuf,
    pub extension: Option<String>,
    /// Only set when classification had to sniff the content.
    pub mime_type: Option<String>,
    pub size: u64,
}

impl TargetFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let not_found = || HashBakerError::FileNotFound {
            path: path.to_path_buf(),
        };

        let metadata = fs::metadata(path).map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        Ok(Self {
            path,
            extension,
            mime_type: None,
            size: metadata.len(),
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|s| s.to_str())
    }
}

/// A classified file, immutable from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub target: TargetFile,
    pub format: FormatTag,
}

pub struct FileTypeClassifier {
    probe: Box<dyn MimeProbe>,
}

impl FileTypeClassifier {
    pub fn new(probe: Box<dyn MimeProbe>) -> Self {
        Self { probe }
    }

    pub fn classify(&self, path: &Path) -> FormatTag {
        self.classify_with_mime(path).0
    }

    /// Classifies `target` and records the sniffed MIME type when the probe was consulted.
    pub fn request(&self, mut target: TargetFile) -> ExtractionRequest {
        let (format, mime) = self.classify_with_mime(&target.path);
        target.mime_type = mime;
        ExtractionRequest { target, format }
    }

    fn classify_with_mime(&self, path: &Path) -> (FormatTag, Option<String>) {
        if is_ntds_database(path) {
            return (FormatTag::Ntds, None);
        }

        if let Some(tag) = path
            .extension()
            .and_then(|s| s.to_str())
            .and_then(FormatTag::from_extension)
        {
            return (tag, None);
        }

        match self.probe.probe(path) {
            Some(mime) => {
                let tag = FormatTag::from_mime(&mime).unwrap_or(FormatTag::Unknown);
                debug!(path = %path.display(), %mime, format = %tag, "classified by content");
                (tag, Some(mime))
            }
            None => (FormatTag::Unknown, None),
        }
    }
}

fn is_ntds_database(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case("ntds.dit"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct FakeProbe {
        answers: Rc<RefCell<HashMap<String, String>>>,
        calls: Rc<Cell<usize>>,
    }

    impl FakeProbe {
        fn answering(file_name: &str, mime: &str) -> Self {
            let probe = Self::default();
            probe
                .answers
                .borrow_mut()
                .insert(file_name.to_string(), mime.to_string());
            probe
        }
    }

    impl MimeProbe for FakeProbe {
        fn probe(&self, path: &Path) -> Option<String> {
            self.calls.set(self.calls.get() + 1);
            let name = path.file_name()?.to_str()?;
            self.answers.borrow().get(name).cloned()
        }
    }

    fn classifier(probe: &FakeProbe) -> FileTypeClassifier {
        FileTypeClassifier::new(Box::new(probe.clone()))
    }

    #[test]
    fn test_extension_table() {
        let table = [
            ("pdf", FormatTag::Pdf),
            ("doc", FormatTag::Office),
            ("docx", FormatTag::Office),
            ("xls", FormatTag::Office),
            ("xlsx", FormatTag::Office),
            ("ppt", FormatTag::Office),
            ("pptx", FormatTag::Office),
            ("zip", FormatTag::Zip),
            ("rar", FormatTag::Rar),
            ("7z", FormatTag::SevenZip),
            ("pcap", FormatTag::Pcap),
            ("cap", FormatTag::Pcap),
            ("pcapng", FormatTag::Pcap),
        ];

        let probe = FakeProbe::default();
        let classifier = classifier(&probe);

        for (extension, expected) in table {
            let path = PathBuf::from(format!("/evidence/secret.{}", extension));
            assert_eq!(classifier.classify(&path), expected, "extension {}", extension);

            let upper = PathBuf::from(format!("/evidence/SECRET.{}", extension.to_uppercase()));
            assert_eq!(classifier.classify(&upper), expected, "extension {}", extension);
        }

        assert_eq!(probe.calls.get(), 0, "table hits must not probe content");
    }

    #[test]
    fn test_ntds_by_name_in_any_case() {
        let probe = FakeProbe::answering("ntds.dit", "application/zip");
        let classifier = classifier(&probe);

        for name in ["ntds.dit", "NTDS.DIT", "Ntds.Dit"] {
            let path = PathBuf::from("/dc/backup").join(name);
            assert_eq!(classifier.classify(&path), FormatTag::Ntds, "{}", name);
        }
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn test_ntds_requires_exact_basename() {
        let probe = FakeProbe::default();
        let classifier = classifier(&probe);

        assert_eq!(
            classifier.classify(Path::new("/ntds.dit/archive.zip")),
            FormatTag::Zip
        );
        assert_eq!(
            classifier.classify(Path::new("/dc/old_ntds.dit")),
            FormatTag::Unknown
        );
    }

    #[test]
    fn test_probe_used_for_missing_extension() {
        let probe = FakeProbe::answering("capture", "application/vnd.tcpdump.pcap");
        let classifier = classifier(&probe);

        assert_eq!(classifier.classify(Path::new("/tmp/capture")), FormatTag::Pcap);
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn test_probe_used_for_unlisted_extension() {
        let probe = FakeProbe::answering("backup.bak", "application/x-7z-compressed");
        let classifier = classifier(&probe);

        assert_eq!(
            classifier.classify(Path::new("/tmp/backup.bak")),
            FormatTag::SevenZip
        );
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn test_unrecognised_content_is_unknown() {
        let probe = FakeProbe::answering("data.bin", "application/octet-stream");
        let classifier = classifier(&probe);

        assert_eq!(classifier.classify(Path::new("/tmp/data.bin")), FormatTag::Unknown);
        assert_eq!(classifier.classify(Path::new("/tmp/other.bin")), FormatTag::Unknown);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let probe = FakeProbe::answering("blob", "application/pdf");
        let classifier = classifier(&probe);

        let first = classifier.classify(Path::new("/tmp/blob"));
        let second = classifier.classify(Path::new("/tmp/blob"));
        assert_eq!(first, FormatTag::Pdf);
        assert_eq!(first, second);
    }

    #[test]
    fn test_mime_signatures() {
        let cases = [
            ("application/pdf", Some(FormatTag::Pdf)),
            ("application/zip", Some(FormatTag::Zip)),
            ("application/x-rar", Some(FormatTag::Rar)),
            ("application/vnd.rar", Some(FormatTag::Rar)),
            ("application/x-7z-compressed", Some(FormatTag::SevenZip)),
            ("application/x-pcapng", Some(FormatTag::Pcap)),
            ("application/msword", Some(FormatTag::Office)),
            ("application/cdfv2", Some(FormatTag::Office)),
            (
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                Some(FormatTag::Office),
            ),
            ("text/plain", None),
        ];

        for (mime, expected) in cases {
            assert_eq!(FormatTag::from_mime(mime), expected, "{}", mime);
        }
    }

    #[test]
    fn test_request_records_probed_mime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mystery");
        fs::write(&path, b"%PDF-1.7").unwrap();

        let probe = FakeProbe::answering("mystery", "application/pdf");
        let request = classifier(&probe).request(TargetFile::open(&path).unwrap());

        assert_eq!(request.format, FormatTag::Pdf);
        assert_eq!(request.target.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(request.target.size, 8);
        assert_eq!(request.target.extension, None);
    }

    #[test]
    fn test_target_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = TargetFile::open(temp_dir.path().join("missing.zip")).unwrap_err();
        assert!(matches!(err, HashBakerError::FileNotFound { .. }));

        let err = TargetFile::open(temp_dir.path()).unwrap_err();
        assert!(matches!(err, HashBakerError::FileNotFound { .. }));
    }
}
