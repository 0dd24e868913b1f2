//! Dashboard aggregation over course and task lists.
//!
//! Everything here is pure: "today" is a parameter, so callers supply
//! [`syllatrack_shared::dates::today_local`] at the boundary and tests pin a date.

use std::collections::{BTreeMap, HashSet};

use chrono::{Days, NaiveDate};
use serde::Serialize;
use syllatrack_shared::dates::{format_date_short, parse_date_safe};
use syllatrack_shared::{Course, Task, TaskKind};

/// Window, in days after today, counted as "due soon".
pub const DUE_SOON_DAYS: u64 = 7;

/// Trimmed type label; blank or absent becomes `Other`.
pub fn normalize_type(kind: Option<&str>) -> String {
    match kind.map(str::trim) {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => TaskKind::Other.as_str().to_string(),
    }
}

/// Tasks whose course is present in `courses`.
pub fn filter_orphans(tasks: &[Task], courses: &[Course]) -> Vec<Task> {
    let known: HashSet<&str> = courses.iter().map(|c| c.id.as_str()).collect();
    tasks
        .iter()
        .filter(|t| known.contains(t.course_id.as_str()))
        .cloned()
        .collect()
}

/// Count `items` grouped by `key`.
pub fn count_by<T, K, F>(items: &[T], key: F) -> BTreeMap<K, usize>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(key(item)).or_insert(0) += 1;
    }
    counts
}

/// Deadline counters for the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    /// Due strictly before today.
    pub overdue: usize,
    /// Due within `[today, today + 7]`.
    pub due_next_7: usize,
}

/// Overdue and due-soon counts. Tasks without a parseable due date count toward neither.
pub fn compute_kpis(tasks: &[Task], today: NaiveDate) -> Kpis {
    let horizon = today
        .checked_add_days(Days::new(DUE_SOON_DAYS))
        .unwrap_or(NaiveDate::MAX);

    tasks
        .iter()
        .filter_map(|t| parse_date_safe(t.due_date.as_deref()))
        .fold(Kpis::default(), |mut kpis, due| {
            if due < today {
                kpis.overdue += 1;
            } else if due <= horizon {
                kpis.due_next_7 += 1;
            }
            kpis
        })
}

/// Tasks due today or later, earliest first, at most `limit`.
///
/// Tasks sharing a due date keep their input order.
pub fn upcoming_tasks(tasks: &[Task], today: NaiveDate, limit: usize) -> Vec<&Task> {
    let mut dated: Vec<(NaiveDate, &Task)> = tasks
        .iter()
        .filter_map(|t| parse_date_safe(t.due_date.as_deref()).map(|d| (d, t)))
        .filter(|(due, _)| *due >= today)
        .collect();

    // sort_by_key is stable
    dated.sort_by_key(|(due, _)| *due);
    dated.into_iter().take(limit).map(|(_, t)| t).collect()
}

/// Task count per course id.
pub fn tasks_per_course(tasks: &[Task]) -> BTreeMap<String, usize> {
    count_by(tasks, |t| t.course_id.clone())
}

/// Task count per normalized type label.
pub fn task_type_counts(tasks: &[Task]) -> BTreeMap<String, usize> {
    count_by(tasks, |t| normalize_type(t.kind.as_deref()))
}

// ---------------------------------------------------------------------------
// Dashboard view
// ---------------------------------------------------------------------------

/// Tasks of one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTaskCount {
    pub course_id: String,
    pub course_name: String,
    pub count: usize,
}

/// One row of the upcoming-deadlines list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingTask {
    pub id: String,
    pub course_id: String,
    pub course_name: String,
    pub title: String,
    pub due_date: String,
    /// Short display form such as `Dec 12`.
    pub due_label: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Everything the dashboard shows for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub today: NaiveDate,
    pub total_courses: usize,
    pub total_tasks: usize,
    /// Tasks left out because their course no longer exists.
    pub orphaned_tasks: usize,
    pub kpis: Kpis,
    pub tasks_per_course: Vec<CourseTaskCount>,
    pub task_type_counts: BTreeMap<String, usize>,
    pub upcoming: Vec<UpcomingTask>,
}

/// Build the dashboard view. Orphaned tasks are excluded from every figure.
pub fn build_insights(
    courses: &[Course],
    tasks: &[Task],
    today: NaiveDate,
    limit: usize,
) -> Insights {
    let live = filter_orphans(tasks, courses);
    let names: BTreeMap<&str, &str> = courses
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();
    let course_name = |id: &str| names.get(id).copied().unwrap_or_default().to_string();

    let per_course = tasks_per_course(&live);
    let tasks_per_course = courses
        .iter()
        .map(|c| CourseTaskCount {
            course_id: c.id.clone(),
            course_name: c.name.clone(),
            count: per_course.get(&c.id).copied().unwrap_or(0),
        })
        .collect();

    let upcoming = upcoming_tasks(&live, today, limit)
        .into_iter()
        .map(|t| UpcomingTask {
            id: t.id.clone(),
            course_id: t.course_id.clone(),
            course_name: course_name(&t.course_id),
            title: t.title.clone(),
            due_date: t.due_date.clone().unwrap_or_default(),
            due_label: format_date_short(t.due_date.as_deref()),
            kind: normalize_type(t.kind.as_deref()),
        })
        .collect();

    Insights {
        today,
        total_courses: courses.len(),
        total_tasks: live.len(),
        orphaned_tasks: tasks.len() - live.len(),
        kpis: compute_kpis(&live, today),
        tasks_per_course,
        task_type_counts: task_type_counts(&live),
        upcoming,
    }
}
