//! Independent re-check of a finished timetable.

use crate::constraints::{Assignment, Constraint, ConstraintEngine};
use crate::data::{ClassSection, Domains, SectionId};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    Unassigned,
    OutsideDomain,
    Broken(Constraint),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub section_id: SectionId,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Unassigned => write!(f, "{} is not placed", self.section_id),
            ViolationKind::OutsideDomain => {
                write!(f, "{} is placed outside its candidate list", self.section_id)
            }
            ViolationKind::Broken(c) => write!(f, "{} breaks {}", self.section_id, c),
        }
    }
}

/// Lists every way the assignment fails to be a complete, consistent
/// timetable. An empty result means the timetable is valid.
pub fn find_violations(
    sections: &[&ClassSection],
    domains: &Domains,
    engine: &ConstraintEngine<'_>,
    assignment: &Assignment,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for section in sections {
        let Some(placement) = assignment.get(&section.id) else {
            violations.push(Violation {
                section_id: section.id.clone(),
                kind: ViolationKind::Unassigned,
            });
            continue;
        };

        let in_domain = domains
            .get(&section.id)
            .is_some_and(|values| values.contains(placement));
        if !in_domain {
            violations.push(Violation {
                section_id: section.id.clone(),
                kind: ViolationKind::OutsideDomain,
            });
        }

        // every predicate skips the section's own entry
        if let Some(constraint) = engine.first_violation(assignment, section, placement) {
            violations.push(Violation {
                section_id: section.id.clone(),
                kind: ViolationKind::Broken(constraint),
            });
        }
    }
    violations
}
