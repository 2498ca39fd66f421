use crate::constraints::Assignment;
use crate::data::ProblemInstance;
use serde::Serialize;
use std::fmt;

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// Percentage of placed sections that sit inside their lecturer's declared
/// availability. Unknown sections or lecturers count as misses.
pub fn accuracy(instance: &ProblemInstance, assignment: &Assignment) -> f64 {
    if assignment.is_empty() {
        return 0.0;
    }
    let matches = assignment.len() - unmet_availability(instance, assignment).len();
    matches as f64 / assignment.len() as f64 * 100.0
}

/// One entry per section placed outside its lecturer's availability.
pub fn unmet_availability(
    instance: &ProblemInstance,
    assignment: &Assignment,
) -> Vec<UnmetSoftConstraint> {
    let sections = instance.section_map();
    let lecturers = instance.lecturer_map();

    assignment
        .iter()
        .filter_map(|(id, placement)| {
            let section = sections.get(id.as_str());
            let available = section
                .and_then(|s| lecturers.get(s.lecturer_id.as_str()))
                .is_some_and(|l| l.is_available(placement.day, placement.slot));
            if available {
                return None;
            }
            let lecturer = section.map_or("unknown lecturer", |s| s.lecturer_id.as_str());
            Some(UnmetSoftConstraint {
                constraint_type: "Lecturer Availability".to_string(),
                description: format!(
                    "Section {} is scheduled on {} slot {}, outside the availability of {}.",
                    id,
                    instance.config.day_name(placement.day),
                    placement.slot,
                    lecturer
                ),
            })
        })
        .collect()
}
