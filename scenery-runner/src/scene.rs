//! Render target detection
//!
//! The engine renders one named scene class from the scratch file. When the
//! caller does not name one, the first class deriving from a `*Scene` base is
//! used.

use regex::Regex;
use std::sync::OnceLock;

fn class_re() -> &'static Regex {
    static CLASS_RE: OnceLock<Regex> = OnceLock::new();
    CLASS_RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*class[ \t]+([A-Za-z_]\w*)[ \t]*\(([^)]*)\)[ \t]*:")
            .expect("class regex should compile")
    })
}

fn triple_quoted_re() -> &'static Regex {
    static TRIPLE_QUOTED_RE: OnceLock<Regex> = OnceLock::new();
    TRIPLE_QUOTED_RE.get_or_init(|| {
        Regex::new(r#"(?s)""".*?"""|'''.*?'''"#).expect("triple-quoted regex should compile")
    })
}

/// Finds the first class whose bases include something named like a scene
///
/// Bases may be qualified (`manim.Scene`) or specialised (`ThreeDScene`,
/// `MovingCameraScene`).
///
/// This is a line scan, not a parse. Triple-quoted strings are skipped, so a
/// docstring showing a scene class is not picked; a class statement built
/// at runtime (e.g. via `exec`) is not seen.
pub fn detect_scene_name(code: &str) -> Option<String> {
    let code = triple_quoted_re().replace_all(code, "");
    class_re().captures_iter(&code).find_map(|caps| {
        let bases = caps.get(2)?.as_str();
        let is_scene = bases
            .split(',')
            .map(|base| base.trim().rsplit('.').next().unwrap_or_default())
            .any(|base| base.contains("Scene"));
        is_scene.then(|| caps[1].to_string())
    })
}

/// Whether `name` is an identifier usable as a class and file name
pub fn is_valid_scene_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_scene_subclass() {
        let code = "from manim import *\n\nclass Helper:\n    pass\n\nclass CircleDemo(Scene):\n    def construct(self):\n        self.play(Create(Circle()))\n";
        assert_eq!(detect_scene_name(code), Some("CircleDemo".to_string()));
    }

    #[test]
    fn test_detects_specialised_and_qualified_bases() {
        assert_eq!(
            detect_scene_name("class Orbit(ThreeDScene):\n    pass"),
            Some("Orbit".to_string())
        );
        assert_eq!(
            detect_scene_name("class Pan(manim.MovingCameraScene):\n    pass"),
            Some("Pan".to_string())
        );
        assert_eq!(
            detect_scene_name("class Mixed(Base, Scene):\n    pass"),
            Some("Mixed".to_string())
        );
    }

    #[test]
    fn test_ignores_classes_in_docstrings() {
        let code = concat!(
            "\"\"\"Example:\n",
            "\n",
            "class Example(Scene):\n",
            "    pass\n",
            "\"\"\"\n",
            "class Real(Scene):\n",
            "    '''Not this: \n",
            "class Inner(Scene):\n",
            "    '''\n",
        );
        assert_eq!(detect_scene_name(code), Some("Real".to_string()));

        assert_eq!(
            detect_scene_name("'''\nclass OnlyDoc(Scene):\n'''\nx = 1\n"),
            None
        );
    }

    #[test]
    fn test_no_scene_class() {
        assert_eq!(detect_scene_name(""), None);
        assert_eq!(detect_scene_name("class Point(object):\n    pass"), None);
        assert_eq!(detect_scene_name("x = 1\nprint(x)"), None);
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_scene_name("GeneratedScene"));
        assert!(is_valid_scene_name("_Private2"));
        assert!(!is_valid_scene_name(""));
        assert!(!is_valid_scene_name("2Fast"));
        assert!(!is_valid_scene_name("../escape"));
        assert!(!is_valid_scene_name("Has Space"));
    }
}
