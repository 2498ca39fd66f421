//! Course-section timetabling as a constraint-satisfaction search.
//!
//! Sections are placed on (day, slot, room) triples. The [`domain`] builder
//! enumerates where each section may go, the [`constraints`] engine decides
//! whether a placement fits next to those already made, the [`solver`] runs a
//! most-constrained-first backtracking search under a wall-clock budget, and
//! [`diagnostics`] explains a failure when no timetable is found.

pub mod constraints;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod scoring;
pub mod solver;
pub mod validation;

#[cfg(test)]
mod testing;

pub use constraints::{Assignment, Constraint, ConstraintEngine};
pub use data::{
    BlockedBlock, ClassSection, Course, CourseKind, DepartmentalGroup, Domains, Lecturer,
    Placement, PreferenceRecords, PreferenceTable, ProblemInstance, Room, ScheduleConfig,
    ScheduleMode, SpecialRoomRule, TimeSlot,
};
pub use diagnostics::{health_check, BottleneckFinding, DiagnosticReport, HealthIssue};
pub use domain::build_domains;
pub use error::ScheduleError;
pub use solver::{solve, Progress, Scheduler, SearchConfig, Solution};
