use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Curriculum, Lesson, LessonId, Module, ProgressState};

//
// ─── MODULE STATUS ─────────────────────────────────────────────────────────────
//

/// Unlock state of a module as shown on the curriculum overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Locked,
    Current,
    Completed,
}

/// Aggregated completion numbers across the whole curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurriculumProgress {
    pub total_lessons: usize,
    pub completed_lessons: usize,
    /// Rounded completion percentage (0 for an empty curriculum).
    pub percent: u8,
    pub is_complete: bool,
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

/// Derives lock/unlock state for lessons and modules from a learner's
/// completed-lesson set.
///
/// Gating is module-level: once a module is reachable every lesson inside it
/// is unlocked, regardless of its position in the module.
///
/// # Examples
///
/// ```
/// # use learn_core::model::{Curriculum, Lesson, LessonActivity, LessonId, Module, ModuleId, ProgressState};
/// # use learn_core::progression::{ModuleStatus, ProgressionTracker};
/// # fn lesson(id: &str) -> Lesson {
/// #     Lesson { id: LessonId::new(id).unwrap(), title: id.into(), estimated_minutes: 5, activity: LessonActivity::Content }
/// # }
/// let curriculum = Curriculum::new(vec![
///     Module { id: ModuleId::new("m1").unwrap(), title: "Basics".into(), lessons: vec![lesson("a")] },
///     Module { id: ModuleId::new("m2").unwrap(), title: "Loops".into(), lessons: vec![lesson("b")] },
/// ]).unwrap();
/// let mut tracker = ProgressionTracker::new(curriculum, ProgressState::new());
/// assert!(!tracker.is_lesson_unlocked(&LessonId::new("b").unwrap()));
///
/// tracker.mark_complete(LessonId::new("a").unwrap(), chrono::Utc::now());
/// assert!(tracker.is_lesson_unlocked(&LessonId::new("b").unwrap()));
/// assert_eq!(tracker.module_statuses(), vec![ModuleStatus::Completed, ModuleStatus::Current]);
/// ```
#[derive(Debug, Clone)]
pub struct ProgressionTracker {
    curriculum: Curriculum,
    progress: ProgressState,
    active_lesson: Option<LessonId>,
}

impl ProgressionTracker {
    #[must_use]
    pub fn new(curriculum: Curriculum, progress: ProgressState) -> Self {
        Self {
            curriculum,
            progress,
            active_lesson: None,
        }
    }

    #[must_use]
    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    #[must_use]
    pub fn progress_state(&self) -> &ProgressState {
        &self.progress
    }

    #[must_use]
    pub fn active_lesson(&self) -> Option<&LessonId> {
        self.active_lesson.as_ref()
    }

    /// The lesson currently open in the host, which keeps its module current.
    pub fn set_active_lesson(&mut self, lesson_id: Option<LessonId>) {
        self.active_lesson = lesson_id;
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: &LessonId) -> bool {
        self.progress.is_completed(lesson_id)
    }

    /// Record a lesson as completed. Returns `true` if the state changed.
    ///
    /// Callers persist the state after a change; a repeated call is a no-op.
    pub fn mark_complete(&mut self, lesson_id: LessonId, at: DateTime<Utc>) -> bool {
        self.progress.mark_complete(lesson_id, at)
    }

    /// Whether the lesson's module is reachable. Unknown lessons are locked.
    #[must_use]
    pub fn is_lesson_unlocked(&self, lesson_id: &LessonId) -> bool {
        self.curriculum
            .module_index_of(lesson_id)
            .is_some_and(|index| self.status_at(index) != ModuleStatus::Locked)
    }

    /// Status of the given module, or `Locked` if it is not part of the curriculum.
    #[must_use]
    pub fn module_status(&self, module: &Module) -> ModuleStatus {
        self.curriculum
            .modules()
            .iter()
            .position(|candidate| candidate.id == module.id)
            .map_or(ModuleStatus::Locked, |index| self.status_at(index))
    }

    /// Status of every module, in curriculum order.
    #[must_use]
    pub fn module_statuses(&self) -> Vec<ModuleStatus> {
        (0..self.curriculum.modules().len())
            .map(|index| self.status_at(index))
            .collect()
    }

    fn module_completed(&self, module: &Module) -> bool {
        module
            .lesson_ids()
            .all(|lesson_id| self.progress.is_completed(lesson_id))
    }

    fn status_at(&self, index: usize) -> ModuleStatus {
        let modules = self.curriculum.modules();
        let module = &modules[index];

        if self.module_completed(module) {
            return ModuleStatus::Completed;
        }

        let started = module
            .lesson_ids()
            .any(|lesson_id| self.progress.is_completed(lesson_id));
        let holds_active = self
            .active_lesson
            .as_ref()
            .is_some_and(|active| module.contains(active));
        let predecessor_done = index == 0 || self.module_completed(&modules[index - 1]);

        if started || holds_active || predecessor_done {
            ModuleStatus::Current
        } else {
            ModuleStatus::Locked
        }
    }

    /// First unlocked lesson that is not completed yet, in curriculum order.
    #[must_use]
    pub fn next_lesson(&self) -> Option<&Lesson> {
        self.curriculum
            .modules()
            .iter()
            .enumerate()
            .filter(|(index, _)| self.status_at(*index) == ModuleStatus::Current)
            .flat_map(|(_, module)| module.lessons.iter())
            .find(|lesson| !self.progress.is_completed(&lesson.id))
    }

    #[must_use]
    pub fn progress(&self) -> CurriculumProgress {
        let total_lessons = self.curriculum.lessons().count();
        let completed_lessons = self
            .curriculum
            .lessons()
            .filter(|lesson| self.progress.is_completed(&lesson.id))
            .count();

        CurriculumProgress {
            total_lessons,
            completed_lessons,
            percent: rounded_percent(completed_lessons, total_lessons),
            is_complete: total_lessons > 0 && completed_lessons == total_lessons,
        }
    }
}

/// `part / whole` as a rounded percentage; 0 when `whole` is 0.
#[must_use]
pub fn rounded_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole);
    let scaled = (part * 200 + whole) / (whole * 2);
    u8::try_from(scaled).unwrap_or(100)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonActivity, ModuleId};
    use crate::time::fixed_now;

    fn id(raw: &str) -> LessonId {
        LessonId::new(raw).unwrap()
    }

    fn module(module_id: &str, lessons: &[&str]) -> Module {
        Module {
            id: ModuleId::new(module_id).unwrap(),
            title: module_id.to_string(),
            lessons: lessons
                .iter()
                .map(|lesson_id| Lesson {
                    id: id(lesson_id),
                    title: (*lesson_id).to_string(),
                    estimated_minutes: 5,
                    activity: LessonActivity::Content,
                })
                .collect(),
        }
    }

    fn tracker() -> ProgressionTracker {
        let curriculum = Curriculum::new(vec![
            module("m1", &["a1", "a2"]),
            module("m2", &["b1", "b2"]),
            module("m3", &["c1"]),
        ])
        .unwrap();
        ProgressionTracker::new(curriculum, ProgressState::new())
    }

    #[test]
    fn fresh_progress_unlocks_only_first_module() {
        let tracker = tracker();
        assert_eq!(
            tracker.module_statuses(),
            vec![
                ModuleStatus::Current,
                ModuleStatus::Locked,
                ModuleStatus::Locked
            ]
        );
        assert!(tracker.is_lesson_unlocked(&id("a2")));
        assert!(!tracker.is_lesson_unlocked(&id("b1")));
    }

    #[test]
    fn unknown_lessons_are_locked() {
        assert!(!tracker().is_lesson_unlocked(&id("missing")));
    }

    #[test]
    fn completing_a_module_makes_the_next_current() {
        let mut tracker = tracker();
        tracker.mark_complete(id("a1"), fixed_now());
        assert_eq!(tracker.module_statuses()[0], ModuleStatus::Current);
        assert_eq!(tracker.module_statuses()[1], ModuleStatus::Locked);

        tracker.mark_complete(id("a2"), fixed_now());
        assert_eq!(tracker.module_statuses()[0], ModuleStatus::Completed);
        assert_eq!(tracker.module_statuses()[1], ModuleStatus::Current);
        assert!(tracker.is_lesson_unlocked(&id("b2")));
        assert!(!tracker.is_lesson_unlocked(&id("c1")));
    }

    #[test]
    fn started_module_stays_current_even_if_predecessor_is_open() {
        let curriculum = Curriculum::new(vec![module("m1", &["a1"]), module("m2", &["b1", "b2"])])
            .unwrap();
        let progress = ProgressState::from_persisted([id("b1")], None);
        let tracker = ProgressionTracker::new(curriculum, progress);
        assert_eq!(
            tracker.module_statuses(),
            vec![ModuleStatus::Current, ModuleStatus::Current]
        );
    }

    #[test]
    fn active_lesson_keeps_its_module_current() {
        let mut tracker = tracker();
        tracker.set_active_lesson(Some(id("c1")));
        assert_eq!(tracker.module_statuses()[2], ModuleStatus::Current);
        tracker.set_active_lesson(None);
        assert_eq!(tracker.module_statuses()[2], ModuleStatus::Locked);
    }

    #[test]
    fn mark_complete_is_idempotent() {
        let mut once = tracker();
        assert!(once.mark_complete(id("a1"), fixed_now()));
        let mut twice = once.clone();
        assert!(!twice.mark_complete(id("a1"), fixed_now()));
        assert_eq!(once.progress_state(), twice.progress_state());
    }

    #[test]
    fn unlock_is_deterministic_for_the_same_snapshot() {
        let mut tracker = tracker();
        tracker.mark_complete(id("a1"), fixed_now());
        let first: Vec<bool> = ["a2", "b1", "c1"]
            .iter()
            .map(|raw| tracker.is_lesson_unlocked(&id(raw)))
            .collect();
        let second: Vec<bool> = ["a2", "b1", "c1"]
            .iter()
            .map(|raw| tracker.is_lesson_unlocked(&id(raw)))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn next_lesson_walks_unlocked_lessons_in_order() {
        let mut tracker = tracker();
        assert_eq!(tracker.next_lesson().unwrap().id, id("a1"));
        tracker.mark_complete(id("a1"), fixed_now());
        tracker.mark_complete(id("a2"), fixed_now());
        assert_eq!(tracker.next_lesson().unwrap().id, id("b1"));
    }

    #[test]
    fn progress_reports_rounded_percentage() {
        let mut tracker = tracker();
        tracker.mark_complete(id("a1"), fixed_now());
        tracker.mark_complete(id("a2"), fixed_now());
        let progress = tracker.progress();
        assert_eq!(progress.total_lessons, 5);
        assert_eq!(progress.completed_lessons, 2);
        assert_eq!(progress.percent, 40);
        assert!(!progress.is_complete);
    }

    #[test]
    fn empty_curriculum_has_no_modules() {
        let tracker = ProgressionTracker::new(Curriculum::empty(), ProgressState::new());
        assert!(tracker.module_statuses().is_empty());
        assert_eq!(tracker.progress().percent, 0);
        assert!(tracker.next_lesson().is_none());
    }

    #[test]
    fn rounded_percent_rounds_half_up() {
        assert_eq!(rounded_percent(2, 3), 67);
        assert_eq!(rounded_percent(1, 3), 33);
        assert_eq!(rounded_percent(1, 8), 13);
        assert_eq!(rounded_percent(3, 0), 0);
    }
}
