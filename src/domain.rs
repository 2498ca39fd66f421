//! Candidate generation: which (day, slot, room) placements each section may
//! take before any pairwise constraint is consulted.
//!
//! An empty candidate list is a legitimate result. It means the section can
//! never be placed and the search will fail on it immediately.

use crate::data::{
    ClassSection, Domains, Placement, ProblemInstance, Room, RoomId, ScheduleConfig,
    ScheduleMode, SpecialRoomRule, TimeSlot,
};
use itertools::Itertools;
use log::{debug, error, info, trace, warn};
use std::cmp::Reverse;
use std::collections::HashSet;

/// Slots offered on the short final weekday.
pub const SHORT_DAY_SLOTS: usize = 2;
/// Length of an examination period in days.
pub const EXAM_DAYS: usize = 14;
/// Morning and afternoon sittings.
pub const EXAM_SLOTS_PER_DAY: usize = 2;

/// Builds the domains for the given mode.
pub fn build_domains(instance: &ProblemInstance, mode: ScheduleMode) -> Domains {
    match mode {
        ScheduleMode::Class => build_class_domains(instance),
        ScheduleMode::Exam => build_exam_domains(instance),
    }
}

/// Domains for the weekly class timetable.
pub fn build_class_domains(instance: &ProblemInstance) -> Domains {
    let config = &instance.config;
    info!(
        "Strict capacity check: {}",
        if config.strict_capacity { "enabled" } else { "disabled" }
    );

    let reserved = instance.reserved_room_ids();
    let unreserved: Vec<&Room> = instance
        .rooms
        .iter()
        .filter(|r| !reserved.contains(&r.id))
        .collect();
    let grid = class_grid(config);

    let mut domains = Domains::new();
    for section in &instance.sections {
        let values = if let Some(time) = section.fixed_time() {
            fixed_candidate(instance, section, time)
        } else if let Some(rule) = instance.special_rooms.get(&section.course_code) {
            special_candidates(instance, section, rule, &grid)
        } else {
            let rooms = standard_room_pool(instance, section, &reserved, &unreserved);
            expand(&rooms, &grid)
        };
        trace!("Section {} has {} candidate placements", section.id, values.len());
        domains.insert(section.id.clone(), values);
    }
    domains
}

/// Domains for an examination period: two sittings a day over two weeks,
/// skipping the seventh day of each week.
pub fn build_exam_domains(instance: &ProblemInstance) -> Domains {
    let reserved = instance.reserved_room_ids();
    let unreserved: Vec<&Room> = instance
        .rooms
        .iter()
        .filter(|r| !reserved.contains(&r.id))
        .collect();
    let grid = exam_grid();
    let fallback = instance.config.capacity_fallback_rooms;

    let mut domains = Domains::new();
    for section in &instance.sections {
        let values = if let Some(time) = section.fixed_time() {
            fixed_candidate(instance, section, time)
        } else if let Some(rule) = instance.special_rooms.get(&section.course_code) {
            match instance.resolve_room(&rule.room) {
                Some(room) => expand(&[room], &grid),
                None => {
                    error!(
                        "Special room '{}' for {} not found among rooms",
                        rule.room, section.course_code
                    );
                    Vec::new()
                }
            }
        } else {
            let mut rooms: Vec<&Room> = unreserved
                .iter()
                .copied()
                .filter(|r| r.capacity >= section.enrollment)
                .collect();
            if rooms.is_empty() {
                warn!(
                    "No exam room seats {} ({} students), offering the {} largest rooms",
                    section.course_code, section.enrollment, fallback
                );
                rooms = largest_rooms(&unreserved, fallback);
            }
            expand(&rooms, &grid)
        };
        trace!("Exam section {} has {} candidate placements", section.id, values.len());
        domains.insert(section.id.clone(), values);
    }
    domains
}

/// Whether a configured day name denotes the shortened final weekday.
pub fn is_short_day(name: &str) -> bool {
    let name = name.trim();
    name.eq_ignore_ascii_case("fri") || name.eq_ignore_ascii_case("friday")
}

pub fn is_valid_config_slot(config: &ScheduleConfig, day: usize, slot: usize) -> bool {
    match config.day_names.get(day) {
        Some(name) if is_short_day(name) => slot < SHORT_DAY_SLOTS,
        Some(_) => slot < config.slots_per_day,
        None => false,
    }
}

fn class_grid(config: &ScheduleConfig) -> Vec<TimeSlot> {
    (0..config.num_days())
        .cartesian_product(0..config.slots_per_day)
        .filter(|&(day, slot)| is_valid_config_slot(config, day, slot))
        .map(|(day, slot)| TimeSlot::new(day, slot))
        .collect()
}

fn exam_grid() -> Vec<TimeSlot> {
    (0..EXAM_DAYS)
        .filter(|day| day % 7 != 6)
        .cartesian_product(0..EXAM_SLOTS_PER_DAY)
        .map(|(day, slot)| TimeSlot::new(day, slot))
        .collect()
}

/// Room-major expansion: every grid slot of the first room, then the next room.
fn expand(rooms: &[&Room], grid: &[TimeSlot]) -> Vec<Placement> {
    rooms
        .iter()
        .flat_map(|room| {
            grid.iter()
                .map(move |t| Placement::new(t.day, t.slot, room.id.clone()))
        })
        .collect()
}

fn largest_rooms<'a>(rooms: &[&'a Room], count: usize) -> Vec<&'a Room> {
    rooms
        .iter()
        .copied()
        .sorted_by_key(|r| Reverse(r.capacity))
        .take(count)
        .collect()
}

fn fixed_candidate(
    instance: &ProblemInstance,
    section: &ClassSection,
    time: TimeSlot,
) -> Vec<Placement> {
    let requested = section.requested_room.as_deref().and_then(|name| {
        let room = instance.resolve_room(name);
        if room.is_none() {
            warn!(
                "Requested room '{}' for fixed section {} not found, using any room",
                name, section.id
            );
        }
        room
    });

    match requested.or_else(|| instance.rooms.first()) {
        Some(room) => vec![Placement::new(time.day, time.slot, room.id.clone())],
        None => {
            error!("Fixed section {} cannot be placed: no rooms exist", section.id);
            Vec::new()
        }
    }
}

fn special_candidates(
    instance: &ProblemInstance,
    section: &ClassSection,
    rule: &SpecialRoomRule,
    grid: &[TimeSlot],
) -> Vec<Placement> {
    let Some(room) = instance.resolve_room(&rule.room) else {
        error!(
            "Special room '{}' for {} not found among rooms",
            rule.room, section.course_code
        );
        return Vec::new();
    };

    match (rule.day, rule.slot) {
        (Some(day), Some(slot)) => {
            info!(
                "Locking {} to {} slot {} in {}",
                section.course_code,
                instance.config.day_name(day),
                slot,
                room.name
            );
            vec![Placement::new(day, slot, room.id.clone())]
        }
        (_, Some(slot)) => {
            debug!("Forcing {} into {} at slot {}", section.course_code, room.name, slot);
            (0..instance.config.num_days())
                .map(|day| Placement::new(day, slot, room.id.clone()))
                .collect()
        }
        _ => expand(&[room], grid),
    }
}

/// Unreserved rooms in preference order: the department's own rooms first,
/// an explicitly requested room ahead of everything.
fn standard_room_pool<'a>(
    instance: &'a ProblemInstance,
    section: &ClassSection,
    reserved: &HashSet<RoomId>,
    unreserved: &[&'a Room],
) -> Vec<&'a Room> {
    let markers = section.group.room_markers();
    let (mut rooms, others): (Vec<&Room>, Vec<&Room>) =
        unreserved.iter().copied().partition(|r| {
            let id = r.id.to_uppercase();
            markers.iter().any(|m| id.contains(m))
        });
    rooms.extend(others);

    if let Some(requested) = section
        .requested_room
        .as_deref()
        .and_then(|name| instance.resolve_room(name))
        .filter(|r| !reserved.contains(&r.id))
    {
        rooms.retain(|r| r.id != requested.id);
        rooms.insert(0, requested);
    }

    if instance.config.strict_capacity {
        let original = rooms.len();
        rooms.retain(|r| r.capacity >= section.enrollment);
        if rooms.is_empty() && original > 0 {
            warn!(
                "No rooms large enough for {} ({} students), relaxing capacity to the {} largest",
                section.course_code, section.enrollment, instance.config.capacity_fallback_rooms
            );
            rooms = largest_rooms(unreserved, instance.config.capacity_fallback_rooms);
        }
    }
    rooms
}
