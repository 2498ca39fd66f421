use crate::data::{
    BlockedBlock, ClassSection, Placement, ProblemInstance, Room, ScheduleMode, SectionId,
};
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A partial (or complete) mapping of sections to placements.
pub type Assignment = BTreeMap<SectionId, Placement>;

/// The hard constraints a placement must satisfy against everything already
/// placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Constraint {
    NoLecturerConflict,
    NoRoomConflict,
    NoCohortConflict,
    NoBlockedSlotConflict,
    NoExamLevelClash,
}

impl Constraint {
    pub fn name(self) -> &'static str {
        match self {
            Constraint::NoLecturerConflict => "no_lecturer_conflict",
            Constraint::NoRoomConflict => "no_room_conflict",
            Constraint::NoCohortConflict => "no_cohort_conflict",
            Constraint::NoBlockedSlotConflict => "no_blocked_slot_conflict",
            Constraint::NoExamLevelClash => "no_exam_level_clash",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Constraint::NoLecturerConflict => "Lecturer Availability/Conflict",
            Constraint::NoRoomConflict => "Room Occupied",
            Constraint::NoCohortConflict => "Student Cohort Conflict",
            Constraint::NoBlockedSlotConflict => "Clash With Existing Schedule",
            Constraint::NoExamLevelClash => "Exam Level Clash",
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Evaluates the mode's ordered constraint list against a read-only assignment.
#[derive(Debug)]
pub struct ConstraintEngine<'a> {
    sections: HashMap<&'a str, &'a ClassSection>,
    rooms: HashMap<&'a str, &'a Room>,
    blocked: &'a [BlockedBlock],
    active: Vec<Constraint>,
}

impl<'a> ConstraintEngine<'a> {
    pub fn new(instance: &'a ProblemInstance, mode: ScheduleMode, blocked: &'a [BlockedBlock]) -> Self {
        let active = match mode {
            ScheduleMode::Class => {
                let mut active = vec![
                    Constraint::NoLecturerConflict,
                    Constraint::NoRoomConflict,
                    Constraint::NoCohortConflict,
                ];
                if !blocked.is_empty() {
                    info!("Avoiding {} blocked slots from the existing schedule", blocked.len());
                    active.push(Constraint::NoBlockedSlotConflict);
                }
                active
            }
            ScheduleMode::Exam => {
                if !blocked.is_empty() {
                    warn!(
                        "Ignoring {} blocked slots: they describe a class week, not an exam period",
                        blocked.len()
                    );
                }
                vec![
                    Constraint::NoLecturerConflict,
                    Constraint::NoRoomConflict,
                    Constraint::NoExamLevelClash,
                ]
            }
        };

        Self {
            sections: instance.section_map(),
            rooms: instance.rooms.iter().map(|r| (r.id.as_str(), r)).collect(),
            blocked,
            active,
        }
    }

    /// Active constraints in evaluation order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.active
    }

    /// The first active constraint the candidate breaks, if any.
    pub fn first_violation(
        &self,
        assignment: &Assignment,
        section: &ClassSection,
        value: &Placement,
    ) -> Option<Constraint> {
        self.active
            .iter()
            .copied()
            .find(|&c| !self.check(c, assignment, section, value))
    }

    pub fn is_consistent(
        &self,
        assignment: &Assignment,
        section: &ClassSection,
        value: &Placement,
    ) -> bool {
        self.first_violation(assignment, section, value).is_none()
    }

    pub fn check(
        &self,
        constraint: Constraint,
        assignment: &Assignment,
        section: &ClassSection,
        value: &Placement,
    ) -> bool {
        match constraint {
            Constraint::NoLecturerConflict => self.no_lecturer_conflict(assignment, section, value),
            Constraint::NoRoomConflict => no_room_conflict(assignment, section, value),
            Constraint::NoCohortConflict => self.no_cohort_conflict(assignment, section, value),
            Constraint::NoBlockedSlotConflict => self.no_blocked_slot_conflict(section, value),
            Constraint::NoExamLevelClash => self.no_exam_level_clash(assignment, section, value),
        }
    }

    /// Other placed sections sharing the candidate's (day, slot).
    fn concurrent<'s>(
        &'s self,
        assignment: &'s Assignment,
        section: &'s ClassSection,
        value: &'s Placement,
    ) -> impl Iterator<Item = &'a ClassSection> + 's {
        assignment
            .iter()
            .filter(move |(id, placed)| **id != section.id && placed.same_time(value))
            .filter_map(move |(id, _)| self.sections.get(id.as_str()).copied())
    }

    fn no_lecturer_conflict(&self, assignment: &Assignment, section: &ClassSection, value: &Placement) -> bool {
        !self
            .concurrent(assignment, section, value)
            .any(|other| other.lecturer_id == section.lecturer_id)
    }

    /// Sections sharing a cohort may not meet together, unless both
    /// semesters are known and differ.
    fn no_cohort_conflict(&self, assignment: &Assignment, section: &ClassSection, value: &Placement) -> bool {
        !self.concurrent(assignment, section, value).any(|other| {
            !section.in_other_semester(other) && section.shares_cohort_with(other)
        })
    }

    fn no_exam_level_clash(&self, assignment: &Assignment, section: &ClassSection, value: &Placement) -> bool {
        !self
            .concurrent(assignment, section, value)
            .any(|other| other.level == section.level && other.semester == section.semester)
    }

    fn no_blocked_slot_conflict(&self, section: &ClassSection, value: &Placement) -> bool {
        let room = self.rooms.get(value.room_id.as_str());
        !self
            .blocked
            .iter()
            .filter(|block| block.day == value.day && block.slot == value.slot)
            .any(|block| {
                let room_taken = match (&block.room, room) {
                    (Some(blocked_room), Some(room)) => {
                        *blocked_room == room.id
                            || *blocked_room == room.name
                            || blocked_room.replace(' ', "_") == room.id
                    }
                    (Some(blocked_room), None) => *blocked_room == value.room_id,
                    (None, _) => false,
                };
                let cohort_busy = block.level == section.level
                    && match (&block.semester, &section.semester) {
                        (Some(a), Some(b)) => a == b,
                        _ => true,
                    };
                room_taken || cohort_busy
            })
    }
}

fn no_room_conflict(assignment: &Assignment, section: &ClassSection, value: &Placement) -> bool {
    !assignment
        .iter()
        .any(|(id, placed)| *id != section.id && placed.same_time(value) && placed.room_id == value.room_id)
}
