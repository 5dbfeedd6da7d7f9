use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use regex::Regex;
use x360mse_config::Patterns;

/// What an item found inside a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Descriptor,
    Save,
}

/// Recognises save files, metadata descriptors and archives by name.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    save: Regex,
    descriptor_marker: String,
    /// Lower-cased, each with its leading dot.
    archive_suffixes: Vec<String>,
}

impl PatternClassifier {
    /// Build a classifier. The save pattern always has to match a name in
    /// full, whether or not it is written with anchors.
    pub fn new(
        save_pattern: &str,
        descriptor_marker: impl Into<String>,
        archive_extensions: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let save = Regex::new(&format!("^(?:{save_pattern})$"))
            .or_raise(|| ErrorKind::Pattern(save_pattern.to_string()))?;
        let archive_suffixes = archive_extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .collect();
        Ok(Self {
            save,
            descriptor_marker: descriptor_marker.into(),
            archive_suffixes,
        })
    }

    pub fn from_config(patterns: &Patterns) -> Result<Self> {
        Self::new(&patterns.save, patterns.descriptor_marker.clone(), &patterns.archive_extensions)
    }

    /// `SaveWorld.bin`, but not `saveworld.bin` or `SaveWorld.bin.bak`.
    pub fn is_save_file(&self, name: &str) -> bool {
        self.save.is_match(name)
    }

    pub fn is_descriptor(&self, name: &str) -> bool {
        name.contains(&self.descriptor_marker)
    }

    /// Matches on the (case-insensitive) suffix, so compound suffixes such as
    /// `.tar.gz` are covered by their last extension.
    pub fn is_archive(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.archive_suffixes.iter().any(|suffix| name.len() > suffix.len() && name.ends_with(suffix.as_str()))
    }

    /// Classify an item inside a directory or archive by the final component
    /// of its name. Descriptors win over saves.
    pub fn classify_entry(&self, name: &str) -> Option<EntryKind> {
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        if self.is_descriptor(name) {
            Some(EntryKind::Descriptor)
        } else if self.is_save_file(name) {
            Some(EntryKind::Save)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn classifier() -> PatternClassifier {
        PatternClassifier::from_config(&Patterns::default()).unwrap()
    }

    #[rstest]
    #[case("SaveWorld.bin", true)]
    #[case("Save1.bin", true)]
    #[case("SaveProfile.bin", true)]
    #[case("Save.bin", false)]
    #[case("saveworld.bin", false)]
    #[case("SaveWorld.bin.bak", false)]
    #[case("MySaveWorld.bin", false)]
    #[case("SaveWorld.BIN", false)]
    fn test_is_save_file(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(classifier().is_save_file(name), expected);
    }

    #[rstest]
    #[case("backup.zip", true)]
    #[case("BACKUP.ZIP", true)]
    #[case("backup.tar.gz", true)]
    #[case("drive.vhdx", true)]
    #[case("backup.tgz", true)]
    #[case("SaveWorld.bin", false)]
    #[case("zip", false)]
    #[case(".zip", false)]
    #[case("notes.txt", false)]
    fn test_is_archive(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(classifier().is_archive(name), expected);
    }

    #[rstest]
    #[case("SaveInfo", Some(EntryKind::Descriptor))]
    #[case("Content/0000/SaveInfo.dat", Some(EntryKind::Descriptor))]
    #[case("Content/0000/SaveWorld.bin", Some(EntryKind::Save))]
    #[case(r"Backup\SaveWorld.bin", Some(EntryKind::Save))]
    #[case("Content/SaveWorld.bin/readme.txt", None)]
    // Matches both; descriptor takes precedence.
    #[case("SaveInfo.bin", Some(EntryKind::Descriptor))]
    fn test_classify_entry(#[case] name: &str, #[case] expected: Option<EntryKind>) {
        assert_eq!(classifier().classify_entry(name), expected);
    }

    #[test]
    fn test_custom_patterns() {
        let classifier = PatternClassifier::new(r"World\d+\.dat", "Meta", ["ZIP", ".7z", " "]).unwrap();
        assert!(classifier.is_save_file("World12.dat"));
        assert!(!classifier.is_save_file("World12.dat.old"));
        assert!(classifier.is_descriptor("Meta.bin"));
        assert!(classifier.is_archive("a.zip"));
        assert!(classifier.is_archive("a.7z"));
        assert!(!classifier.is_archive("a.tar"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatternClassifier::new("Save(", "SaveInfo", ["zip"]).unwrap_err();
        assert_eq!(*err, ErrorKind::Pattern("Save(".to_string()));
    }
}
