// Per-declaration reflection policy. Resolution order, first match
// wins: doc-comment tags walking out from the node, the session
// override, the nearest ancestor configuration file, then Never.

use crate::config::{self, ModeField, CONFIG_FILE};
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReflectionMode {
    Never,
    Default,
    Always,
}

impl ReflectionMode {
    pub fn parse(text: &str) -> Option<ReflectionMode> {
        match text {
            "never" | "false" => Some(ReflectionMode::Never),
            "default" | "true" => Some(ReflectionMode::Default),
            "always" => Some(ReflectionMode::Always),
            _ => None,
        }
    }

    pub fn from_field(field: &ModeField) -> Option<ReflectionMode> {
        match field {
            ModeField::Flag(true) => Some(ReflectionMode::Default),
            ModeField::Flag(false) => Some(ReflectionMode::Never),
            ModeField::Named(name) => ReflectionMode::parse(name),
        }
    }

    // Default and Always gate identically; only Never suppresses.
    pub fn enabled(self) -> bool {
        self != ReflectionMode::Never
    }
}


lazy_static! {
    static ref REFLECTION_TAG: Regex =
        Regex::new(r"@reflection\s+([A-Za-z]+)").unwrap();
}

// The mode named by a doc comment's @reflection tag, if recognized.
pub fn doc_mode(doc: &str) -> Option<ReflectionMode> {
    let captures = REFLECTION_TAG.captures(doc)?;
    ReflectionMode::parse(&captures[1].to_lowercase())
}


pub struct Oracle {
    session: Option<ReflectionMode>,
    // Probe results per directory, including absence. One read per
    // unique path for the life of the instance.
    cache: RefCell<HashMap<PathBuf, Option<ReflectionMode>>>,
}

impl Oracle {
    pub fn new() -> Oracle {
        Oracle { session: None, cache: RefCell::new(HashMap::new()) }
    }

    pub fn with_session(mode: ReflectionMode) -> Oracle {
        Oracle { session: Some(mode), cache: RefCell::new(HashMap::new()) }
    }

    // Effective mode for a declaration. `docs` is the doc-comment
    // chain walking outward from the node (member, declaration, file).
    pub fn mode(&self, docs: &[Option<&str>], path: &Path) -> ReflectionMode {
        for doc in docs.iter().flatten() {
            if let Some(mode) = doc_mode(doc) {
                return mode;
            }
        }
        if let Some(mode) = self.session {
            return mode;
        }
        if let Some(mode) = self.config_mode(path) {
            return mode;
        }
        ReflectionMode::Never
    }

    fn config_mode(&self, path: &Path) -> Option<ReflectionMode> {
        let mut dir = path.parent();
        while let Some(here) = dir {
            if let Some(mode) = self.probe(here) {
                return Some(mode);
            }
            dir = here.parent();
        }
        None
    }

    fn probe(&self, dir: &Path) -> Option<ReflectionMode> {
        if let Some(cached) = self.cache.borrow().get(dir) {
            return *cached;
        }
        let mode = read_dir_mode(dir);
        self.cache.borrow_mut().insert(dir.to_path_buf(), mode);
        mode
    }
}

fn read_dir_mode(dir: &Path) -> Option<ReflectionMode> {
    let path = dir.join(CONFIG_FILE);
    match config::load(&path) {
        Ok(cfg) => cfg.reflection.as_ref().and_then(ReflectionMode::from_field),
        Err(err) if err.is_missing() => None,
        Err(err) => {
            eprintln!("typepack: ignoring {}: {}", path.display(), err);
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, body: &str) {
        fs::write(dir.join(CONFIG_FILE), body).unwrap();
    }

    #[test]
    fn doc_tags_parse_known_modes() {
        assert_eq!(doc_mode("@reflection never"), Some(ReflectionMode::Never));
        assert_eq!(
            doc_mode("Widget state.\n@reflection always"),
            Some(ReflectionMode::Always)
        );
        assert_eq!(doc_mode("@reflection true"), Some(ReflectionMode::Default));
        assert_eq!(doc_mode("@reflection sometimes"), None);
        assert_eq!(doc_mode("no tags here"), None);
    }

    #[test]
    fn fallback_is_never() {
        let oracle = Oracle::new();
        let mode = oracle.mode(&[None, None], Path::new("/nonexistent/file"));
        assert_eq!(mode, ReflectionMode::Never);
    }

    #[test]
    fn innermost_doc_tag_wins() {
        let oracle = Oracle::with_session(ReflectionMode::Default);
        let docs = [
            Some("@reflection never"),
            Some("@reflection always"),
        ];
        let mode = oracle.mode(&docs, Path::new("/nonexistent/file"));
        assert_eq!(mode, ReflectionMode::Never);
    }

    #[test]
    fn session_override_beats_configuration() {
        let root = tempfile::tempdir().unwrap();
        write_config(root.path(), r#"{ "reflection": "never" }"#);
        let file = root.path().join("src").join("main");

        let oracle = Oracle::with_session(ReflectionMode::Always);
        assert_eq!(oracle.mode(&[None], &file), ReflectionMode::Always);
    }

    #[test]
    fn nearest_ancestor_with_field_wins() {
        let root = tempfile::tempdir().unwrap();
        let sub = root.path().join("pkg").join("src");
        fs::create_dir_all(&sub).unwrap();
        write_config(root.path(), r#"{ "reflection": true }"#);
        write_config(&sub, r#"{ "reflection": "never" }"#);

        let oracle = Oracle::new();
        let inner = sub.join("widget");
        let outer = root.path().join("pkg").join("other");
        assert_eq!(oracle.mode(&[None], &inner), ReflectionMode::Never);
        assert_eq!(oracle.mode(&[None], &outer), ReflectionMode::Default);
    }

    #[test]
    fn boolean_false_reads_as_never() {
        let root = tempfile::tempdir().unwrap();
        write_config(root.path(), r#"{ "reflection": false }"#);
        let oracle = Oracle::new();
        let file = root.path().join("main");
        assert_eq!(oracle.mode(&[None], &file), ReflectionMode::Never);
    }

    #[test]
    fn commented_json_is_accepted() {
        let root = tempfile::tempdir().unwrap();
        write_config(
            root.path(),
            "{\n  // whole tree\n  \"reflection\": \"always\"\n}",
        );
        let oracle = Oracle::new();
        let file = root.path().join("deep").join("main");
        assert_eq!(oracle.mode(&[None], &file), ReflectionMode::Always);
    }

    #[test]
    fn unparseable_configuration_falls_through() {
        let root = tempfile::tempdir().unwrap();
        let sub = root.path().join("src");
        fs::create_dir_all(&sub).unwrap();
        write_config(root.path(), r#"{ "reflection": "always" }"#);
        write_config(&sub, "{ not json");

        let oracle = Oracle::new();
        let file = sub.join("main");
        assert_eq!(oracle.mode(&[None], &file), ReflectionMode::Always);
    }

    #[test]
    fn probe_results_are_cached() {
        let root = tempfile::tempdir().unwrap();
        write_config(root.path(), r#"{ "reflection": "always" }"#);
        let oracle = Oracle::new();
        let file = root.path().join("main");
        assert_eq!(oracle.mode(&[None], &file), ReflectionMode::Always);

        // Removing the file does not change the cached answer.
        fs::remove_file(root.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(oracle.mode(&[None], &file), ReflectionMode::Always);
    }
}
