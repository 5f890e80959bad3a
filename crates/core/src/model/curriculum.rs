use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LessonId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("lesson {0} appears more than once in the curriculum")]
    DuplicateLesson(LessonId),

    #[error("module {0} appears more than once in the curriculum")]
    DuplicateModule(ModuleId),

    #[error("question {index} of lesson {lesson} has no options")]
    QuestionWithoutOptions { lesson: LessonId, index: usize },

    #[error("question {index} of lesson {lesson} names an answer that is not one of its options")]
    AnswerNotAnOption { lesson: LessonId, index: usize },

    #[error("attempt limits must be > 0 (lesson {0})")]
    InvalidAttemptLimit(LessonId),
}

//
// ─── LESSON METADATA ───────────────────────────────────────────────────────────
//

/// Kind of a lesson, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonKind {
    Content,
    Quiz,
    Exercise,
}

/// Multiple-choice question as consumed by the quiz engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    /// Per-question override of the study-mode attempt limit.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl QuizQuestion {
    #[must_use]
    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_answer == option
    }

    /// Explanation text, if present and not blank.
    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    #[must_use]
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self { questions }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Free-form exercise judged by the external evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSpec {
    /// What the learner is asked to produce; forwarded verbatim to the evaluator.
    pub goal: String,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Engine-relevant payload of a lesson. Rendering content never lives here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LessonActivity {
    #[default]
    Content,
    Quiz(Quiz),
    Exercise(ExerciseSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub activity: LessonActivity,
}

impl Lesson {
    #[must_use]
    pub fn kind(&self) -> LessonKind {
        match self.activity {
            LessonActivity::Content => LessonKind::Content,
            LessonActivity::Quiz(_) => LessonKind::Quiz,
            LessonActivity::Exercise(_) => LessonKind::Exercise,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&Quiz> {
        match &self.activity {
            LessonActivity::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }

    #[must_use]
    pub fn exercise(&self) -> Option<&ExerciseSpec> {
        match &self.activity {
            LessonActivity::Exercise(spec) => Some(spec),
            _ => None,
        }
    }
}

//
// ─── MODULES ───────────────────────────────────────────────────────────────────
//

/// Ordered group of lessons; the unit of unlocking and progress reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Module {
    #[must_use]
    pub fn contains(&self, lesson_id: &LessonId) -> bool {
        self.lessons.iter().any(|lesson| &lesson.id == lesson_id)
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: &LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| &lesson.id == lesson_id)
    }

    pub fn lesson_ids(&self) -> impl Iterator<Item = &LessonId> {
        self.lessons.iter().map(|lesson| &lesson.id)
    }

    #[must_use]
    pub fn estimated_minutes(&self) -> u32 {
        self.lessons
            .iter()
            .map(|lesson| lesson.estimated_minutes)
            .sum()
    }
}

/// Read-only, validated snapshot of the content provider's modules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Curriculum {
    modules: Vec<Module>,
}

impl Curriculum {
    /// Validate the modules handed over by the content provider.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` on duplicate ids, questions whose answer is not
    /// among their options, or zero attempt limits.
    pub fn new(modules: Vec<Module>) -> Result<Self, CurriculumError> {
        let mut module_ids = HashSet::new();
        let mut lesson_ids = HashSet::new();

        for module in &modules {
            if !module_ids.insert(&module.id) {
                return Err(CurriculumError::DuplicateModule(module.id.clone()));
            }
            for lesson in &module.lessons {
                if !lesson_ids.insert(&lesson.id) {
                    return Err(CurriculumError::DuplicateLesson(lesson.id.clone()));
                }
                validate_activity(lesson)?;
            }
        }

        Ok(Self { modules })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Index of the module that owns the lesson.
    #[must_use]
    pub fn module_index_of(&self, lesson_id: &LessonId) -> Option<usize> {
        self.modules
            .iter()
            .position(|module| module.contains(lesson_id))
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: &LessonId) -> Option<&Lesson> {
        self.modules
            .iter()
            .find_map(|module| module.lesson(lesson_id))
    }

    /// All lessons in curriculum order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|module| module.lessons.iter())
    }
}

fn validate_activity(lesson: &Lesson) -> Result<(), CurriculumError> {
    match &lesson.activity {
        LessonActivity::Content => Ok(()),
        LessonActivity::Exercise(spec) => {
            if spec.max_attempts == Some(0) {
                return Err(CurriculumError::InvalidAttemptLimit(lesson.id.clone()));
            }
            Ok(())
        }
        LessonActivity::Quiz(quiz) => {
            for (index, question) in quiz.questions.iter().enumerate() {
                if question.options.is_empty() {
                    return Err(CurriculumError::QuestionWithoutOptions {
                        lesson: lesson.id.clone(),
                        index,
                    });
                }
                if !question.options.contains(&question.correct_answer) {
                    return Err(CurriculumError::AnswerNotAnOption {
                        lesson: lesson.id.clone(),
                        index,
                    });
                }
                if question.max_attempts == Some(0) {
                    return Err(CurriculumError::InvalidAttemptLimit(lesson.id.clone()));
                }
            }
            Ok(())
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str, activity: LessonActivity) -> Lesson {
        Lesson {
            id: LessonId::new(id).unwrap(),
            title: id.to_uppercase(),
            estimated_minutes: 5,
            activity,
        }
    }

    fn module(id: &str, lessons: Vec<Lesson>) -> Module {
        Module {
            id: ModuleId::new(id).unwrap(),
            title: id.to_string(),
            lessons,
        }
    }

    fn question(answer: &str) -> QuizQuestion {
        QuizQuestion {
            prompt: "Pick one".into(),
            options: vec!["A".into(), "B".into()],
            correct_answer: answer.into(),
            explanation: None,
            max_attempts: None,
        }
    }

    #[test]
    fn duplicate_lessons_are_rejected() {
        let err = Curriculum::new(vec![
            module("m1", vec![lesson("l1", LessonActivity::Content)]),
            module("m2", vec![lesson("l1", LessonActivity::Content)]),
        ])
        .unwrap_err();
        assert!(matches!(err, CurriculumError::DuplicateLesson(_)));
    }

    #[test]
    fn answer_must_be_one_of_the_options() {
        let quiz = LessonActivity::Quiz(Quiz::new(vec![question("C")]));
        let err = Curriculum::new(vec![module("m1", vec![lesson("q", quiz)])]).unwrap_err();
        assert!(matches!(err, CurriculumError::AnswerNotAnOption { index: 0, .. }));
    }

    #[test]
    fn lookups_follow_curriculum_order() {
        let curriculum = Curriculum::new(vec![
            module("m1", vec![lesson("a", LessonActivity::Content)]),
            module(
                "m2",
                vec![
                    lesson("b", LessonActivity::Content),
                    lesson("c", LessonActivity::Quiz(Quiz::new(vec![question("A")]))),
                ],
            ),
        ])
        .unwrap();

        let c = LessonId::new("c").unwrap();
        assert_eq!(curriculum.module_index_of(&c), Some(1));
        assert_eq!(curriculum.lesson(&c).unwrap().kind(), LessonKind::Quiz);
        let order: Vec<&str> = curriculum.lessons().map(|l| l.id.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert_eq!(curriculum.modules()[1].estimated_minutes(), 10);
    }

    #[test]
    fn lessons_deserialize_with_tagged_activity() {
        let json = r#"{
            "id": "ex-1",
            "title": "Write a loop",
            "estimated_minutes": 10,
            "activity": { "kind": "exercise", "goal": "Print 1..10", "max_attempts": 4 }
        }"#;
        let parsed: Lesson = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind(), LessonKind::Exercise);
        assert_eq!(parsed.exercise().unwrap().max_attempts, Some(4));

        let plain: Lesson = serde_json::from_str(r#"{"id": "c-1", "title": "Read"}"#).unwrap();
        assert_eq!(plain.kind(), LessonKind::Content);
    }
}
