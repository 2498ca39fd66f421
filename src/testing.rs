//! Small instance builders shared by the unit tests.

use crate::data::{
    ClassSection, CourseKind, DepartmentalGroup, Lecturer, ProblemInstance, Room, ScheduleConfig,
    TimeSlot,
};

pub(crate) fn room(id: &str, capacity: u32) -> Room {
    Room {
        id: id.to_string(),
        name: id.replace('_', " "),
        capacity,
        room_type: "lecture".to_string(),
    }
}

pub(crate) fn lecturer(id: &str, available: &[(usize, usize)]) -> Lecturer {
    Lecturer {
        id: id.to_string(),
        name: format!("Lecturer {id}"),
        available_slots: available
            .iter()
            .map(|&(day, slot)| TimeSlot::new(day, slot))
            .collect(),
    }
}

pub(crate) fn section(id: &str, course: &str, lecturer: &str) -> ClassSection {
    ClassSection {
        id: id.to_string(),
        course_code: course.to_string(),
        lecturer_id: lecturer.to_string(),
        title: format!("{course} section {id}"),
        kind: CourseKind::Departmental,
        level: 100,
        requested_room: None,
        enrollment: 20,
        cohorts: Default::default(),
        fixed_day: None,
        fixed_slot: None,
        semester: None,
        group: DepartmentalGroup::Other,
    }
}

pub(crate) fn with_cohorts(mut section: ClassSection, cohorts: &[&str]) -> ClassSection {
    section.cohorts = cohorts.iter().map(|c| c.to_string()).collect();
    section
}

pub(crate) fn instance(
    days: &[&str],
    slots_per_day: usize,
    lecturers: Vec<Lecturer>,
    rooms: Vec<Room>,
    sections: Vec<ClassSection>,
) -> ProblemInstance {
    ProblemInstance {
        config: ScheduleConfig::new(days, slots_per_day),
        lecturers,
        rooms,
        courses: Vec::new(),
        sections,
        special_rooms: Default::default(),
        reserved_rooms: Default::default(),
    }
}
