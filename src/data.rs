use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::error::ScheduleError;

// Type aliases for clarity
pub type SectionId = String;
pub type LecturerId = String;
pub type RoomId = String;
pub type CourseCode = String;

/// Number of largest rooms offered when no room can seat a section.
pub const DEFAULT_CAPACITY_FALLBACK_ROOMS: usize = 3;

/// A (day, slot) pair on the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct TimeSlot {
    pub day: usize,
    pub slot: usize,
}

impl TimeSlot {
    pub fn new(day: usize, slot: usize) -> Self {
        Self { day, slot }
    }
}

/// A lecturer and the slots they declared themselves available for.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecturer {
    pub id: LecturerId,
    pub name: String,
    #[serde(default)]
    pub available_slots: HashSet<TimeSlot>,
}

impl Lecturer {
    pub fn is_available(&self, day: usize, slot: usize) -> bool {
        self.available_slots.contains(&TimeSlot::new(day, slot))
    }
}

/// Represents a physical room with a given capacity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub room_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub code: CourseCode,
    pub title: String,
    pub credit_unit: String,
    #[serde(default)]
    pub required_room_type: String,
    pub lesson_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CourseKind {
    General,
    Departmental,
}

/// Department that owns a section; decides which rooms are tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum DepartmentalGroup {
    #[serde(rename = "CS")]
    Cs,
    Nursing,
    Theology,
    #[default]
    Other,
}

impl DepartmentalGroup {
    /// Substrings of an upper-cased room id that mark a room as belonging to the group.
    pub fn room_markers(self) -> &'static [&'static str] {
        match self {
            DepartmentalGroup::Cs => &["CS", "LAB"],
            DepartmentalGroup::Nursing => &["CH"],
            DepartmentalGroup::Theology => &["BULLEY"],
            DepartmentalGroup::Other => &[],
        }
    }
}

/// One schedulable teaching unit. This is the search variable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSection {
    pub id: SectionId,
    pub course_code: CourseCode,
    pub lecturer_id: LecturerId,
    pub title: String,
    pub kind: CourseKind,
    pub level: u32,
    #[serde(default)]
    pub requested_room: Option<String>,
    #[serde(default)]
    pub enrollment: u32,
    #[serde(default)]
    pub cohorts: BTreeSet<String>,
    #[serde(default)]
    pub fixed_day: Option<usize>,
    #[serde(default)]
    pub fixed_slot: Option<usize>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub group: DepartmentalGroup,
}

impl ClassSection {
    /// The pre-set placement time, only when both day and slot are fixed.
    pub fn fixed_time(&self) -> Option<TimeSlot> {
        match (self.fixed_day, self.fixed_slot) {
            (Some(day), Some(slot)) => Some(TimeSlot::new(day, slot)),
            _ => None,
        }
    }

    pub fn shares_cohort_with(&self, other: &ClassSection) -> bool {
        !self.cohorts.is_disjoint(&other.cohorts)
    }

    /// Both semesters are known and they differ.
    pub fn in_other_semester(&self, other: &ClassSection) -> bool {
        matches!((&self.semester, &other.semester), (Some(a), Some(b)) if a != b)
    }
}

/// A candidate placement: the value assigned to a section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub day: usize,
    pub slot: usize,
    pub room_id: RoomId,
}

impl Placement {
    pub fn new(day: usize, slot: usize, room_id: impl Into<RoomId>) -> Self {
        Self {
            day,
            slot,
            room_id: room_id.into(),
        }
    }

    pub fn time(&self) -> TimeSlot {
        TimeSlot::new(self.day, self.slot)
    }

    pub fn same_time(&self, other: &Placement) -> bool {
        self.day == other.day && self.slot == other.slot
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {} slot {} in {}", self.day, self.slot, self.room_id)
    }
}

/// Per-section ordered candidate lists.
pub type Domains = BTreeMap<SectionId, Vec<Placement>>;

/// Forces a course into a room, and optionally onto a day and/or slot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialRoomRule {
    pub room: String,
    #[serde(default)]
    pub day: Option<usize>,
    #[serde(default)]
    pub slot: Option<usize>,
}

/// An entry of an already-published schedule that new placements must avoid.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedBlock {
    pub level: u32,
    #[serde(default)]
    pub semester: Option<String>,
    pub day: usize,
    pub slot: usize,
    #[serde(default)]
    pub room: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleMode {
    #[default]
    Class,
    Exam,
}

fn default_capacity_fallback_rooms() -> usize {
    DEFAULT_CAPACITY_FALLBACK_ROOMS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub day_names: Vec<String>,
    pub slots_per_day: usize,
    #[serde(default)]
    pub strict_capacity: bool,
    #[serde(default = "default_capacity_fallback_rooms")]
    pub capacity_fallback_rooms: usize,
}

impl ScheduleConfig {
    pub fn new(day_names: &[&str], slots_per_day: usize) -> Self {
        Self {
            day_names: day_names.iter().map(|d| d.to_string()).collect(),
            slots_per_day,
            strict_capacity: false,
            capacity_fallback_rooms: DEFAULT_CAPACITY_FALLBACK_ROOMS,
        }
    }

    pub fn num_days(&self) -> usize {
        self.day_names.len()
    }

    pub fn day_name(&self, day: usize) -> String {
        self.day_names
            .get(day)
            .cloned()
            .unwrap_or_else(|| format!("Day {}", day + 1))
    }
}

/// The complete input for the scheduling problem.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInstance {
    pub config: ScheduleConfig,
    #[serde(default)]
    pub lecturers: Vec<Lecturer>,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub sections: Vec<ClassSection>,
    #[serde(default)]
    pub special_rooms: BTreeMap<CourseCode, SpecialRoomRule>,
    #[serde(default)]
    pub reserved_rooms: BTreeSet<RoomId>,
}

impl ProblemInstance {
    /// Parses and validates an instance from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self, ScheduleError> {
        let instance: ProblemInstance = serde_json::from_str(json)?;
        instance.validate()?;
        Ok(instance)
    }

    /// Checks the structural invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.config.day_names.is_empty() {
            return Err(ScheduleError::InvalidInstance(
                "at least one day must be configured".to_string(),
            ));
        }
        if self.config.slots_per_day == 0 {
            return Err(ScheduleError::InvalidInstance(
                "slots per day must be positive".to_string(),
            ));
        }

        let mut seen_rooms = HashSet::new();
        for room in &self.rooms {
            if !seen_rooms.insert(room.id.as_str()) {
                return Err(ScheduleError::InvalidInstance(format!(
                    "duplicate room id '{}'",
                    room.id
                )));
            }
        }

        let mut seen_sections = HashSet::new();
        for section in &self.sections {
            if !seen_sections.insert(section.id.as_str()) {
                return Err(ScheduleError::InvalidInstance(format!(
                    "duplicate section id '{}'",
                    section.id
                )));
            }
        }

        // slots may run past the grid for evening sessions, days may not
        let num_days = self.config.num_days();
        for section in &self.sections {
            if let Some(day) = section.fixed_day.filter(|&d| d >= num_days) {
                return Err(ScheduleError::InvalidInstance(format!(
                    "section '{}' is fixed to day {} but only {} days are configured",
                    section.id, day, num_days
                )));
            }
        }
        for (course, rule) in &self.special_rooms {
            if let Some(day) = rule.day.filter(|&d| d >= num_days) {
                return Err(ScheduleError::InvalidInstance(format!(
                    "special room rule for {} forces day {} but only {} days are configured",
                    course, day, num_days
                )));
            }
        }
        Ok(())
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Looks a room up by id, then by display name, then by the name with
    /// spaces turned into underscores.
    pub fn resolve_room(&self, name: &str) -> Option<&Room> {
        let underscored = name.replace(' ', "_");
        self.room(name)
            .or_else(|| self.rooms.iter().find(|r| r.name == name))
            .or_else(|| self.room(&underscored))
    }

    /// Rooms ordinary sections may not use: the configured reserved ids plus
    /// every room claimed by a special-room rule.
    pub fn reserved_room_ids(&self) -> HashSet<RoomId> {
        let mut reserved: HashSet<RoomId> = self.reserved_rooms.iter().cloned().collect();
        for rule in self.special_rooms.values() {
            match self.resolve_room(&rule.room) {
                Some(room) => {
                    reserved.insert(room.id.clone());
                }
                None => {
                    reserved.insert(rule.room.replace(' ', "_"));
                }
            }
        }
        reserved
    }

    pub fn lecturer_map(&self) -> HashMap<&str, &Lecturer> {
        self.lecturers.iter().map(|l| (l.id.as_str(), l)).collect()
    }

    pub fn section_map(&self) -> HashMap<&str, &ClassSection> {
        self.sections.iter().map(|s| (s.id.as_str(), s)).collect()
    }
}

/// Two-namespace weighting learned elsewhere; shifts value ordering only.
#[derive(Debug, Clone, Default)]
pub struct PreferenceTable {
    lecturer_slots: HashMap<(LecturerId, TimeSlot), f64>,
    course_rooms: HashMap<(CourseCode, RoomId), f64>,
}

impl PreferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lecturer_slot(&mut self, lecturer: &str, day: usize, slot: usize, weight: f64) {
        self.lecturer_slots
            .insert((lecturer.to_string(), TimeSlot::new(day, slot)), weight);
    }

    pub fn set_course_room(&mut self, course: &str, room: &str, weight: f64) {
        self.course_rooms
            .insert((course.to_string(), room.to_string()), weight);
    }

    pub fn lecturer_slot_weight(&self, lecturer: &str, day: usize, slot: usize) -> f64 {
        self.lecturer_slots
            .get(&(lecturer.to_string(), TimeSlot::new(day, slot)))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn course_room_weight(&self, course: &str, room: &str) -> f64 {
        self.course_rooms
            .get(&(course.to_string(), room.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.lecturer_slots.is_empty() && self.course_rooms.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturerSlotWeight {
    pub lecturer_id: LecturerId,
    pub day: usize,
    pub slot: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRoomWeight {
    pub course_code: CourseCode,
    pub room_id: RoomId,
    pub weight: f64,
}

/// Serialized form of a [`PreferenceTable`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRecords {
    #[serde(default)]
    pub lecturer_slots: Vec<LecturerSlotWeight>,
    #[serde(default)]
    pub course_rooms: Vec<CourseRoomWeight>,
}

impl From<PreferenceRecords> for PreferenceTable {
    fn from(records: PreferenceRecords) -> Self {
        let mut table = PreferenceTable::new();
        for w in records.lecturer_slots {
            table.set_lecturer_slot(&w.lecturer_id, w.day, w.slot, w.weight);
        }
        for w in records.course_rooms {
            table.set_course_room(&w.course_code, &w.room_id, w.weight);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_json() -> &'static str {
        r#"{
            "config": { "dayNames": ["Mon", "Tue"], "slotsPerDay": 3 },
            "lecturers": [
                { "id": "L1", "name": "Ada", "availableSlots": [ { "day": 0, "slot": 1 } ] }
            ],
            "rooms": [
                { "id": "Main_Hall", "name": "Main Hall", "capacity": 200 },
                { "id": "CS_LAB1", "name": "CS Lab 1", "capacity": 30, "roomType": "lab" }
            ],
            "sections": [
                {
                    "id": "S1", "courseCode": "CS 101", "lecturerId": "L1",
                    "title": "Intro", "kind": "Departmental", "level": 100,
                    "cohorts": ["CS_100"], "group": "CS"
                }
            ],
            "specialRooms": { "PEAC 100": { "room": "Main Hall", "slot": 3 } }
        }"#
    }

    #[test]
    fn test_parse_instance_with_defaults() {
        let instance = ProblemInstance::from_json_str(instance_json()).unwrap();
        assert_eq!(instance.config.num_days(), 2);
        assert!(!instance.config.strict_capacity);
        assert_eq!(
            instance.config.capacity_fallback_rooms,
            DEFAULT_CAPACITY_FALLBACK_ROOMS
        );
        let section = &instance.sections[0];
        assert_eq!(section.group, DepartmentalGroup::Cs);
        assert_eq!(section.fixed_time(), None);
        assert!(instance.lecturers[0].is_available(0, 1));
        assert!(!instance.lecturers[0].is_available(1, 1));
    }

    #[test]
    fn test_resolve_room_by_name_and_underscore() {
        let instance = ProblemInstance::from_json_str(instance_json()).unwrap();
        assert_eq!(instance.resolve_room("Main Hall").unwrap().id, "Main_Hall");
        assert_eq!(instance.resolve_room("CS_LAB1").unwrap().id, "CS_LAB1");
        assert!(instance.resolve_room("Nowhere").is_none());
    }

    #[test]
    fn test_special_rule_rooms_are_reserved() {
        let instance = ProblemInstance::from_json_str(instance_json()).unwrap();
        let reserved = instance.reserved_room_ids();
        assert!(reserved.contains("Main_Hall"));
        assert!(!reserved.contains("CS_LAB1"));
    }

    #[test]
    fn test_duplicate_room_rejected() {
        let mut instance = ProblemInstance::from_json_str(instance_json()).unwrap();
        let dup = instance.rooms[0].clone();
        instance.rooms.push(dup);
        assert!(matches!(
            instance.validate(),
            Err(ScheduleError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_days_outside_the_week_rejected() {
        let mut instance = ProblemInstance::from_json_str(instance_json()).unwrap();
        instance.sections[0].fixed_day = Some(2);
        instance.sections[0].fixed_slot = Some(0);
        assert!(matches!(
            instance.validate(),
            Err(ScheduleError::InvalidInstance(_))
        ));

        instance.sections[0].fixed_day = Some(1);
        assert!(instance.validate().is_ok());

        instance.special_rooms.insert(
            "BIOL 105".to_string(),
            SpecialRoomRule {
                room: "CS Lab 1".to_string(),
                day: Some(5),
                slot: Some(0),
            },
        );
        assert!(matches!(
            instance.validate(),
            Err(ScheduleError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_evening_slot_in_special_rule_is_valid() {
        // the fixture's PEAC rule uses slot 3 on a three-slot day
        let instance = ProblemInstance::from_json_str(instance_json()).unwrap();
        assert_eq!(instance.special_rooms["PEAC 100"].slot, Some(3));
        assert!(instance.validate().is_ok());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = ProblemInstance::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ScheduleError::Parse(_)));
    }

    #[test]
    fn test_semester_exemption_requires_both_defined() {
        let instance = ProblemInstance::from_json_str(instance_json()).unwrap();
        let mut a = instance.sections[0].clone();
        let mut b = a.clone();
        assert!(!a.in_other_semester(&b));
        a.semester = Some("1".to_string());
        assert!(!a.in_other_semester(&b));
        b.semester = Some("2".to_string());
        assert!(a.in_other_semester(&b));
        assert!(a.shares_cohort_with(&b));
    }

    #[test]
    fn test_preference_lookup_defaults_to_zero() {
        let records = PreferenceRecords {
            lecturer_slots: vec![LecturerSlotWeight {
                lecturer_id: "L1".to_string(),
                day: 0,
                slot: 2,
                weight: 4.0,
            }],
            course_rooms: vec![],
        };
        let table = PreferenceTable::from(records);
        assert_eq!(table.lecturer_slot_weight("L1", 0, 2), 4.0);
        assert_eq!(table.lecturer_slot_weight("L1", 0, 1), 0.0);
        assert_eq!(table.course_room_weight("CS 101", "CS_LAB1"), 0.0);
        assert!(!table.is_empty());
        assert!(PreferenceTable::from(PreferenceRecords::default()).is_empty());
    }
}
