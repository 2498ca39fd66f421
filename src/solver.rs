use crate::constraints::{Assignment, ConstraintEngine};
use crate::data::{
    BlockedBlock, ClassSection, CourseKind, Domains, Lecturer, Placement, PreferenceTable,
    ProblemInstance, ScheduleMode,
};
use crate::diagnostics::{health_check, DiagnosticReport};
use crate::domain::build_domains;
use crate::error::ScheduleError;
use crate::scoring::{accuracy, unmet_availability, UnmetSoftConstraint};
use crate::validation::find_violations;
use itertools::Itertools;
use log::{debug, error, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

// value ordering weights
const AVAILABILITY_BONUS: f64 = 100.0;
const LECTURER_SLOT_FACTOR: f64 = 5.0;
const COURSE_ROOM_FACTOR: f64 = 2.0;
const JITTER: f64 = 0.1;

/// Search-level settings; the problem itself lives in [`ProblemInstance`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub mode: ScheduleMode,
    /// Wall-clock budget for the whole search.
    pub timeout: Duration,
    /// Emit a progress line every this many search iterations. 0 disables it.
    pub progress_interval: usize,
    /// Seed for the tie-breaking jitter.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::Class,
            timeout: DEFAULT_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn with_mode(mut self, mode: ScheduleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Fraction of sections placed at some point of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub placed: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.placed as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PROGRESS:{}/{}|{:.1}", self.placed, self.total, self.percent())
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub assignment: Assignment,
    /// Percentage of sections inside their lecturer's availability.
    pub accuracy: f64,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
    pub iterations: usize,
    pub elapsed: Duration,
}

/// Unwinds every active frame of the search at once.
#[derive(Debug, Error)]
enum SearchAbort {
    #[error("search deadline exceeded")]
    Timeout,
}

/// Solves an instance with default preferences and no blocked slots.
pub fn solve(instance: &ProblemInstance, config: &SearchConfig) -> Result<Solution, ScheduleError> {
    Scheduler::new(instance).with_config(config.clone()).solve()
}

/// Configures and runs one backtracking search.
pub struct Scheduler<'a> {
    instance: &'a ProblemInstance,
    preferences: Option<&'a PreferenceTable>,
    blocked: &'a [BlockedBlock],
    config: SearchConfig,
    observer: Option<Box<dyn FnMut(&Progress) + 'a>>,
}

impl<'a> Scheduler<'a> {
    pub fn new(instance: &'a ProblemInstance) -> Self {
        Self {
            instance,
            preferences: None,
            blocked: &[],
            config: SearchConfig::default(),
            observer: None,
        }
    }

    pub fn with_preferences(mut self, preferences: &'a PreferenceTable) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Slots of a previously published schedule to stay clear of.
    pub fn with_blocked_blocks(mut self, blocked: &'a [BlockedBlock]) -> Self {
        self.blocked = blocked;
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers an observer called with periodic progress.
    pub fn on_progress(mut self, observer: impl FnMut(&Progress) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn solve(self) -> Result<Solution, ScheduleError> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        self.solve_with_rng(&mut rng)
    }

    /// Runs the search drawing tie-break jitter from `rng`.
    pub fn solve_with_rng<R: Rng>(mut self, rng: &mut R) -> Result<Solution, ScheduleError> {
        let instance = self.instance;
        instance.validate()?;
        let mode = self.config.mode;

        info!(
            "Setting up {:?} search with {} sections, {} rooms and {} lecturers...",
            mode,
            instance.sections.len(),
            instance.rooms.len(),
            instance.lecturers.len()
        );
        if mode == ScheduleMode::Class {
            let issues = health_check(instance);
            if !issues.is_empty() {
                info!("Health check raised {} warnings before the search", issues.len());
            }
        }
        let domains = build_domains(instance, mode);
        trace!(
            "Generated {} candidate placements across {} sections.",
            domains.values().map(Vec::len).sum::<usize>(),
            domains.len()
        );

        let engine = ConstraintEngine::new(instance, mode, self.blocked);
        let lecturers = instance.lecturer_map();
        let variables = search_order(instance, mode);

        let mut search = Search {
            variables: &variables,
            domains: &domains,
            engine: &engine,
            lecturers: &lecturers,
            preferences: self.preferences,
            started: Instant::now(),
            timeout: self.config.timeout,
            progress_interval: self.config.progress_interval,
            rng,
            observer: self.observer.as_deref_mut(),
            iterations: 0,
        };

        info!("Starting backtracking search...");
        let mut assignment = Assignment::new();
        let outcome = search.backtrack(&mut assignment);
        let iterations = search.iterations;
        let elapsed = search.started.elapsed();

        match outcome {
            Ok(true) => {
                debug_assert!(find_violations(&variables, &domains, &engine, &assignment).is_empty());
                let accuracy = accuracy(instance, &assignment);
                info!(
                    "Solution found in {:.2?} after {} iterations, accuracy {:.2}%",
                    elapsed, iterations, accuracy
                );
                Ok(Solution {
                    unmet_soft_constraints: unmet_availability(instance, &assignment),
                    assignment,
                    accuracy,
                    iterations,
                    elapsed,
                })
            }
            Ok(false) => {
                error!("Search exhausted after {} iterations without a solution", iterations);
                let diagnosis =
                    DiagnosticReport::analyze(&variables, &domains, &engine, &lecturers, &instance.config);
                Err(ScheduleError::Unsatisfiable {
                    diagnosis: Box::new(diagnosis),
                })
            }
            Err(SearchAbort::Timeout) => {
                error!(
                    "Timeout exceeded ({:.2?}), stopping search after {} iterations",
                    self.config.timeout, iterations
                );
                let diagnosis =
                    DiagnosticReport::analyze(&variables, &domains, &engine, &lecturers, &instance.config);
                Err(ScheduleError::Timeout {
                    elapsed,
                    diagnosis: Box::new(diagnosis),
                })
            }
        }
    }
}

/// Variable order used to break most-constrained ties. Exams put general
/// courses first, then lower levels, then larger classes.
fn search_order(instance: &ProblemInstance, mode: ScheduleMode) -> Vec<&ClassSection> {
    match mode {
        ScheduleMode::Class => instance.sections.iter().collect(),
        ScheduleMode::Exam => {
            info!("Prioritising general courses for the exam timetable");
            instance
                .sections
                .iter()
                .sorted_by_key(|s| (s.kind != CourseKind::General, s.level, Reverse(s.enrollment)))
                .collect()
        }
    }
}

struct Search<'s, 'a, R> {
    variables: &'s [&'a ClassSection],
    domains: &'s Domains,
    engine: &'s ConstraintEngine<'a>,
    lecturers: &'s HashMap<&'a str, &'a Lecturer>,
    preferences: Option<&'a PreferenceTable>,
    started: Instant,
    timeout: Duration,
    progress_interval: usize,
    rng: &'s mut R,
    observer: Option<&'s mut (dyn FnMut(&Progress) + 'a)>,
    iterations: usize,
}

impl<'s, 'a, R: Rng> Search<'s, 'a, R> {
    fn backtrack(&mut self, assignment: &mut Assignment) -> Result<bool, SearchAbort> {
        if assignment.len() == self.variables.len() {
            return Ok(true);
        }

        self.iterations += 1;
        if self.progress_interval > 0 && self.iterations % self.progress_interval == 0 {
            self.report_progress(assignment.len());
        }

        let Some(section) = self.select_unassigned(assignment)? else {
            return Ok(false);
        };

        let candidates = self.ordered_values(section);
        for value in &candidates {
            if !self.is_consistent(assignment, section, value)? {
                continue;
            }
            assignment.insert(section.id.clone(), (*value).clone());
            match self.backtrack(assignment) {
                Ok(true) => return Ok(true),
                outcome => {
                    assignment.remove(&section.id);
                    outcome?;
                }
            }
        }

        debug!(
            "REJECTED: could not place {}. All {} candidate placements caused conflicts.",
            section.title,
            candidates.len()
        );
        Ok(false)
    }

    /// The single place the deadline is polled.
    fn is_consistent(
        &self,
        assignment: &Assignment,
        section: &ClassSection,
        value: &Placement,
    ) -> Result<bool, SearchAbort> {
        if self.started.elapsed() >= self.timeout {
            return Err(SearchAbort::Timeout);
        }
        Ok(self.engine.is_consistent(assignment, section, value))
    }

    fn domain(&self, section: &ClassSection) -> &'s [Placement] {
        let domains = self.domains;
        domains.get(&section.id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Most-constrained unassigned section, recounted from scratch. A section
    /// with no legal value is returned at once.
    fn select_unassigned(&self, assignment: &Assignment) -> Result<Option<&'a ClassSection>, SearchAbort> {
        let mut best: Option<(&'a ClassSection, usize)> = None;
        for &section in self.variables {
            if assignment.contains_key(&section.id) {
                continue;
            }
            let mut legal = 0;
            for value in self.domain(section) {
                if self.is_consistent(assignment, section, value)? {
                    legal += 1;
                }
            }
            if legal == 0 {
                trace!("Section {} has no legal values left", section.id);
                return Ok(Some(section));
            }
            if best.is_none_or(|(_, fewest)| legal < fewest) {
                best = Some((section, legal));
            }
        }
        Ok(best.map(|(section, _)| section))
    }

    fn value_score(&self, section: &ClassSection, value: &Placement) -> f64 {
        let mut score = 0.0;
        let available = self
            .lecturers
            .get(section.lecturer_id.as_str())
            .is_some_and(|l| l.is_available(value.day, value.slot));
        if available {
            score += AVAILABILITY_BONUS;
        }
        if let Some(prefs) = self.preferences.filter(|p| !p.is_empty()) {
            score += prefs.lecturer_slot_weight(&section.lecturer_id, value.day, value.slot)
                * LECTURER_SLOT_FACTOR;
            score += prefs.course_room_weight(&section.course_code, &value.room_id) * COURSE_ROOM_FACTOR;
        }
        score
    }

    /// Candidates best-first; jitter keeps equal scores from always
    /// resolving the same way.
    fn ordered_values(&mut self, section: &ClassSection) -> Vec<&'s Placement> {
        let values = self.domain(section);
        let mut scored = Vec::with_capacity(values.len());
        for value in values {
            let score = self.value_score(section, value);
            let jitter: f64 = self.rng.random_range(0.0..JITTER);
            scored.push((score + jitter, value));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, value)| value).collect()
    }

    fn report_progress(&mut self, placed: usize) {
        let progress = Progress {
            placed,
            total: self.variables.len(),
        };
        info!("{}", progress);
        if let Some(observer) = self.observer.as_deref_mut() {
            observer(&progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSlot;
    use crate::testing::{instance, lecturer, room, section, with_cohorts};
    use std::cell::RefCell;

    #[test]
    fn test_progress_line_format() {
        let progress = Progress { placed: 3, total: 8 };
        assert_eq!(progress.to_string(), "PROGRESS:3/8|37.5");
        assert_eq!(Progress { placed: 0, total: 0 }.percent(), 100.0);
    }

    #[test]
    fn test_empty_instance_solves_trivially() {
        let inst = instance(&["Mon"], 2, vec![], vec![room("A", 30)], vec![]);
        let solution = solve(&inst, &SearchConfig::default().with_seed(1)).unwrap();
        assert!(solution.assignment.is_empty());
        assert_eq!(solution.accuracy, 0.0);
    }

    #[test]
    fn test_prefers_lecturer_availability() {
        let inst = instance(
            &["Mon", "Tue", "Wed"],
            3,
            vec![lecturer("L1", &[(2, 1)])],
            vec![room("A", 30), room("B", 30)],
            vec![section("S1", "C1", "L1")],
        );
        for seed in 0..5 {
            let solution = solve(&inst, &SearchConfig::default().with_seed(seed)).unwrap();
            assert_eq!(solution.assignment["S1"].time(), TimeSlot::new(2, 1));
            assert_eq!(solution.accuracy, 100.0);
            assert!(solution.unmet_soft_constraints.is_empty());
        }
    }

    #[test]
    fn test_preference_weights_pick_room() {
        let inst = instance(
            &["Mon"],
            1,
            vec![lecturer("L1", &[(0, 0)])],
            vec![room("A", 30), room("B", 30)],
            vec![section("S1", "C1", "L1")],
        );
        let mut prefs = PreferenceTable::new();
        prefs.set_course_room("C1", "B", 1.0);
        let solution = Scheduler::new(&inst)
            .with_preferences(&prefs)
            .with_config(SearchConfig::default().with_seed(7))
            .solve()
            .unwrap();
        assert_eq!(solution.assignment["S1"], Placement::new(0, 0, "B"));
    }

    #[test]
    fn test_empty_preferences_match_no_preferences() {
        let sections = (0..4).map(|i| section(&format!("S{i}"), "C", &format!("L{i}"))).collect();
        let inst = instance(&["Mon", "Tue"], 2, vec![], vec![room("A", 30), room("B", 30)], sections);
        let prefs = PreferenceTable::new();
        let config = SearchConfig::default().with_seed(13);

        let plain = solve(&inst, &config).unwrap();
        let with_empty = Scheduler::new(&inst)
            .with_preferences(&prefs)
            .with_config(config)
            .solve()
            .unwrap();
        assert_eq!(plain.assignment, with_empty.assignment);
    }

    #[test]
    fn test_same_seed_same_solution() {
        let sections = (0..6)
            .map(|i| with_cohorts(section(&format!("S{i}"), "C", &format!("L{}", i % 2)), &["G"]))
            .collect();
        let inst = instance(
            &["Mon", "Tue", "Wed"],
            3,
            vec![lecturer("L0", &[]), lecturer("L1", &[])],
            vec![room("A", 30), room("B", 30)],
            sections,
        );
        let config = SearchConfig::default().with_seed(42);
        let first = solve(&inst, &config).unwrap();
        let second = solve(&inst, &config).unwrap();
        assert_eq!(first.assignment, second.assignment);
    }

    #[test]
    fn test_most_constrained_section_goes_first() {
        // S1 prefers (0,0) but S2 can only go there
        let mut s2 = section("S2", "C2", "L1");
        s2.fixed_day = Some(0);
        s2.fixed_slot = Some(0);
        let inst = instance(
            &["Mon"],
            2,
            vec![lecturer("L1", &[(0, 0)])],
            vec![room("A", 30)],
            vec![section("S1", "C1", "L1"), s2],
        );
        let solution = solve(&inst, &SearchConfig::default().with_seed(3)).unwrap();
        assert_eq!(solution.assignment["S2"], Placement::new(0, 0, "A"));
        assert_eq!(solution.assignment["S1"], Placement::new(0, 1, "A"));
        assert_eq!(solution.accuracy, 50.0);
        assert_eq!(solution.unmet_soft_constraints.len(), 1);
    }

    #[test]
    fn test_observer_receives_progress() {
        let sections = (0..4).map(|i| section(&format!("S{i}"), "C", &format!("L{i}"))).collect();
        let inst = instance(&["Mon"], 4, vec![], vec![room("A", 30)], sections);
        let seen = RefCell::new(Vec::new());
        let solution = Scheduler::new(&inst)
            .with_config(SearchConfig::default().with_seed(1).with_progress_interval(1))
            .on_progress(|p| seen.borrow_mut().push(*p))
            .solve()
            .unwrap();
        assert_eq!(solution.assignment.len(), 4);
        let seen = seen.into_inner();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], Progress { placed: 0, total: 4 });
        assert_eq!(seen[3], Progress { placed: 3, total: 4 });
    }

    #[test]
    fn test_exam_order_puts_general_courses_first() {
        let mut dept = section("S1", "CS 301", "L1");
        dept.level = 100;
        let mut gen_300 = section("S2", "ENGL 311", "L2");
        gen_300.kind = CourseKind::General;
        gen_300.level = 300;
        let mut gen_100_small = section("S3", "MATH 121", "L3");
        gen_100_small.kind = CourseKind::General;
        gen_100_small.enrollment = 10;
        let mut gen_100_big = section("S4", "ENGL 111", "L4");
        gen_100_big.kind = CourseKind::General;
        gen_100_big.enrollment = 90;
        let inst = instance(&["Mon"], 1, vec![], vec![], vec![dept, gen_300, gen_100_small, gen_100_big]);

        let order: Vec<&str> = search_order(&inst, ScheduleMode::Exam)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(order, vec!["S4", "S3", "S2", "S1"]);
        let order: Vec<&str> = search_order(&inst, ScheduleMode::Class)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(order, vec!["S1", "S2", "S3", "S4"]);
    }
}
