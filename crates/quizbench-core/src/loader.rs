use crate::errors::LoadError;
use crate::model::Quiz;
use std::collections::BTreeMap;
use std::path::Path;

pub fn load_quiz(path: &Path) -> Result<Quiz, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let quiz: Quiz = serde_json::from_str(&raw).map_err(|e| LoadError::Parse {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    quiz.validate().map_err(|e| LoadError::Invalid {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(quiz)
}

/// Every `*.json` in the directory, sorted by file name so quiz order is
/// deterministic across executions.
pub fn load_all_quizzes(dir: &Path) -> Result<Vec<Quiz>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|e| LoadError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut quizzes = Vec::with_capacity(paths.len());
    for path in paths {
        quizzes.push(load_quiz(&path)?);
    }
    tracing::info!(count = quizzes.len(), dir = %dir.display(), "loaded quizzes");
    Ok(quizzes)
}

/// Resolve each quiz's `source_material` to text. A missing or unreadable
/// source is logged and left absent; metrics that need it see `None`.
pub fn load_source_texts(dir: &Path, quizzes: &[Quiz]) -> BTreeMap<String, String> {
    let mut sources = BTreeMap::new();
    for quiz in quizzes {
        let path = dir.join(&quiz.source_material);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                sources.insert(quiz.quiz_id.clone(), text);
            }
            Err(e) => {
                tracing::warn!(
                    quiz = %quiz.quiz_id,
                    path = %path.display(),
                    "source material not available: {}", e
                );
            }
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ_JSON: &str = r#"{
        "quiz_id": "bio-01",
        "title": "Photosynthesis Basics",
        "source_material": "photosynthesis.md",
        "questions": [
            {
                "question_id": "q1",
                "question_type": "single_choice",
                "question_text": "Where does the Calvin cycle occur?",
                "options": ["Stroma", "Thylakoid", "Nucleus"],
                "correct_answer": "Stroma"
            },
            {
                "question_id": "q2",
                "question_type": "true_false",
                "question_text": "Chlorophyll absorbs green light most strongly.",
                "options": ["True", "False"],
                "correct_answer": "False"
            }
        ]
    }"#;

    #[test]
    fn load_quiz_parses_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bio-01.json");
        std::fs::write(&path, QUIZ_JSON).unwrap();

        let quiz = load_quiz(&path).unwrap();
        assert_eq!(quiz.quiz_id, "bio-01");
        assert_eq!(quiz.num_questions(), 2);
        assert!(quiz.question_by_id("q2").is_some());
    }

    #[test]
    fn load_quiz_rejects_invalid_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            QUIZ_JSON.replace(
                "\"correct_answer\": \"Stroma\"",
                "\"correct_answer\": \"Cytosol\"",
            ),
        )
        .unwrap();
        // correct_answer no longer among the options
        assert!(matches!(
            load_quiz(&path),
            Err(LoadError::Invalid { .. })
        ));
    }

    #[test]
    fn load_all_quizzes_is_sorted_and_skips_non_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            QUIZ_JSON.replace("bio-01", "bio-b"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            QUIZ_JSON.replace("bio-01", "bio-a"),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a quiz").unwrap();

        let quizzes = load_all_quizzes(dir.path()).unwrap();
        let ids: Vec<&str> = quizzes.iter().map(|q| q.quiz_id.as_str()).collect();
        assert_eq!(ids, vec!["bio-a", "bio-b"]);
    }

    #[test]
    fn missing_source_text_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let quiz_path = dir.path().join("bio-01.json");
        std::fs::write(&quiz_path, QUIZ_JSON).unwrap();
        let quiz = load_quiz(&quiz_path).unwrap();

        let sources = load_source_texts(dir.path(), std::slice::from_ref(&quiz));
        assert!(sources.is_empty());

        std::fs::write(dir.path().join("photosynthesis.md"), "# Photosynthesis").unwrap();
        let sources = load_source_texts(dir.path(), std::slice::from_ref(&quiz));
        assert_eq!(sources.get("bio-01").unwrap(), "# Photosynthesis");
    }
}
