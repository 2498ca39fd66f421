#![allow(dead_code)]

use timetable_solver::{
    ClassSection, CourseKind, DepartmentalGroup, Lecturer, ProblemInstance, Room, ScheduleConfig,
    TimeSlot,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn room(id: &str, name: &str, capacity: u32) -> Room {
    Room {
        id: id.to_string(),
        name: name.to_string(),
        capacity,
        room_type: "lecture".to_string(),
    }
}

pub fn lecturer(id: &str, available: &[(usize, usize)]) -> Lecturer {
    Lecturer {
        id: id.to_string(),
        name: format!("Lecturer {id}"),
        available_slots: available
            .iter()
            .map(|&(day, slot)| TimeSlot::new(day, slot))
            .collect(),
    }
}

pub fn section(id: &str, course: &str, lecturer: &str, cohorts: &[&str]) -> ClassSection {
    ClassSection {
        id: id.to_string(),
        course_code: course.to_string(),
        lecturer_id: lecturer.to_string(),
        title: format!("{course} ({id})"),
        kind: CourseKind::Departmental,
        level: 100,
        requested_room: None,
        enrollment: 25,
        cohorts: cohorts.iter().map(|c| c.to_string()).collect(),
        fixed_day: None,
        fixed_slot: None,
        semester: None,
        group: DepartmentalGroup::Other,
    }
}

pub fn instance(
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

/// Ten sections over a full week sharing two cohorts and three lecturers.
pub fn busy_week() -> ProblemInstance {
    let sections = (0..10)
        .map(|i| {
            let cohort = if i % 2 == 0 { "CS_100" } else { "CS_200" };
            section(&format!("S{i}"), &format!("CS {}", 100 + i), &format!("L{}", i % 3), &[cohort])
        })
        .collect();
    instance(
        &["Mon", "Tue", "Wed", "Thu", "Fri"],
        3,
        vec![
            lecturer("L0", &[(0, 0), (1, 0), (2, 0)]),
            lecturer("L1", &[(0, 1), (3, 1)]),
            lecturer("L2", &[]),
        ],
        vec![room("R1", "Room 1", 40), room("R2", "Room 2", 60)],
        sections,
    )
}
