//! Failure analysis, run once a search has given up.
//!
//! Two independent views are produced: a heatmap of the (day, slot) pairs
//! the most sections are competing for, and a greedy first-fit pass that
//! finds the first section nothing can be placed for and says why.
//! [`health_check`] is the cheap counterpart run before a search starts.

use crate::constraints::{Assignment, Constraint, ConstraintEngine};
use crate::data::{ClassSection, Domains, Lecturer, ProblemInstance, ScheduleConfig, TimeSlot};
use crate::domain::is_valid_config_slot;
use itertools::Itertools;
use log::warn;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Rows kept in the contention heatmap.
pub const HEATMAP_ROWS: usize = 10;
/// Demand above this many sections marks a slot as critical.
pub const CRITICAL_DEMAND: usize = 5;
/// Lecturers with fewer available slots than this are flagged.
pub const LIMITED_AVAILABILITY: usize = 3;
/// Share of a lecturer's available slots above which the load is tight.
pub const TIGHT_WORKLOAD: f64 = 0.8;
/// Share of the weekly slots above which one level is crowded.
pub const CROWDED_LEVEL: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Critical,
    High,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => f.write_str("[CRITICAL]"),
            Severity::High => f.write_str("[HIGH]"),
            Severity::Warning => f.write_str("[WARNING]"),
        }
    }
}

/// How many distinct sections could use one (day, slot).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotContention {
    pub time: TimeSlot,
    pub day_name: String,
    pub demand: usize,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingTally {
    pub constraint: Constraint,
    pub blocked: usize,
    pub percent: f64,
}

/// The first section the greedy pass could not place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    pub section_id: String,
    pub title: String,
    pub course_code: String,
    pub lecturer_id: String,
    pub domain_size: usize,
    /// Candidates blocked per constraint, counting only the first failing
    /// constraint of each candidate.
    pub blocked_by: Vec<BlockingTally>,
    /// A single candidate usually means a special-room or fixed-time lock.
    pub single_option_lock: bool,
    pub lecturer_available_slots: Option<usize>,
    pub lecturer_limited: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BottleneckFinding {
    Blocked(Bottleneck),
    /// Greedy placement succeeded, so the search failed on deep interactions
    /// or its time budget rather than on one section.
    DeepInteraction { placed: usize },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub heatmap: Vec<SlotContention>,
    pub bottleneck: BottleneckFinding,
}

impl DiagnosticReport {
    /// Builds both reports from the domains and predicates the search used.
    pub fn analyze(
        sections: &[&ClassSection],
        domains: &Domains,
        engine: &ConstraintEngine<'_>,
        lecturers: &HashMap<&str, &Lecturer>,
        config: &ScheduleConfig,
    ) -> Self {
        let report = Self {
            heatmap: contention_heatmap(domains, config),
            bottleneck: locate_bottleneck(sections, domains, engine, lecturers),
        };
        for line in report.to_string().lines() {
            warn!("{}", line);
        }
        report
    }

    pub fn critical_slots(&self) -> impl Iterator<Item = &SlotContention> {
        self.heatmap.iter().filter(|c| c.severity == Severity::Critical)
    }
}

/// Counts, for every (day, slot), how many sections have at least one
/// candidate there, most contested first.
pub fn contention_heatmap(domains: &Domains, config: &ScheduleConfig) -> Vec<SlotContention> {
    let mut demand: BTreeMap<TimeSlot, usize> = BTreeMap::new();
    for values in domains.values() {
        let times: BTreeSet<TimeSlot> = values.iter().map(|v| v.time()).collect();
        for time in times {
            *demand.entry(time).or_insert(0) += 1;
        }
    }

    demand
        .into_iter()
        .sorted_by_key(|&(_, count)| Reverse(count))
        .take(HEATMAP_ROWS)
        .map(|(time, count)| SlotContention {
            time,
            day_name: config.day_name(time.day),
            demand: count,
            severity: if count > CRITICAL_DEMAND {
                Severity::Critical
            } else {
                Severity::High
            },
        })
        .collect()
}

/// First-fit placement in ascending domain-size order, on a private
/// assignment, stopping at the first section with no consistent value.
pub fn locate_bottleneck(
    sections: &[&ClassSection],
    domains: &Domains,
    engine: &ConstraintEngine<'_>,
    lecturers: &HashMap<&str, &Lecturer>,
) -> BottleneckFinding {
    let no_values = Vec::new();
    let domain_of = |id: &str| domains.get(id).unwrap_or(&no_values);

    let ordered = sections
        .iter()
        .copied()
        .sorted_by_key(|s| domain_of(&s.id).len());

    let mut assignment = Assignment::new();
    for section in ordered {
        let values = domain_of(&section.id);
        let mut tally: BTreeMap<Constraint, usize> = BTreeMap::new();
        let mut first_fit = None;

        for value in values {
            match engine.first_violation(&assignment, section, value) {
                Some(constraint) => *tally.entry(constraint).or_insert(0) += 1,
                None => {
                    if first_fit.is_none() {
                        first_fit = Some(value.clone());
                    }
                }
            }
        }

        if let Some(value) = first_fit {
            assignment.insert(section.id.clone(), value);
            continue;
        }

        let domain_size = values.len();
        let available = lecturers
            .get(section.lecturer_id.as_str())
            .map(|l| l.available_slots.len());
        return BottleneckFinding::Blocked(Bottleneck {
            section_id: section.id.clone(),
            title: section.title.clone(),
            course_code: section.course_code.clone(),
            lecturer_id: section.lecturer_id.clone(),
            domain_size,
            blocked_by: tally
                .into_iter()
                .map(|(constraint, blocked)| BlockingTally {
                    constraint,
                    blocked,
                    percent: if domain_size == 0 {
                        0.0
                    } else {
                        blocked as f64 / domain_size as f64 * 100.0
                    },
                })
                .collect(),
            single_option_lock: domain_size == 1,
            lecturer_available_slots: available,
            lecturer_limited: available.is_some_and(|n| n < LIMITED_AVAILABILITY),
        });
    }

    BottleneckFinding::DeepInteraction {
        placed: assignment.len(),
    }
}

/// A load problem visible before any search runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthIssue {
    LecturerWorkload {
        lecturer_id: String,
        needed: usize,
        available: usize,
        severity: Severity,
    },
    CrowdedLevel {
        level: u32,
        sections: usize,
        weekly_slots: usize,
        severity: Severity,
    },
}

impl HealthIssue {
    pub fn severity(&self) -> Severity {
        match self {
            HealthIssue::LecturerWorkload { severity, .. }
            | HealthIssue::CrowdedLevel { severity, .. } => *severity,
        }
    }
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthIssue::LecturerWorkload {
                lecturer_id,
                needed,
                available,
                severity,
            } => write!(
                f,
                "{severity} {lecturer_id}: needs {needed} slots, has {available} available"
            ),
            HealthIssue::CrowdedLevel {
                level,
                sections,
                weekly_slots,
                severity,
            } => write!(
                f,
                "{severity} Level {level}: {sections} sections for {weekly_slots} weekly slots"
            ),
        }
    }
}

/// Compares demand against supply for lecturers and levels. Lecturers
/// without an availability record are assumed free all week.
pub fn health_check(instance: &ProblemInstance) -> Vec<HealthIssue> {
    let config = &instance.config;
    let weekly_slots = (0..config.num_days())
        .cartesian_product(0..config.slots_per_day)
        .filter(|&(day, slot)| is_valid_config_slot(config, day, slot))
        .count();
    let lecturers = instance.lecturer_map();

    let workload = instance
        .sections
        .iter()
        .counts_by(|s| s.lecturer_id.as_str())
        .into_iter()
        .sorted();
    let mut issues = Vec::new();
    for (lecturer_id, needed) in workload {
        let available = lecturers
            .get(lecturer_id)
            .map_or(weekly_slots, |l| l.available_slots.len());
        let severity = if needed > available {
            Severity::Critical
        } else if needed as f64 > available as f64 * TIGHT_WORKLOAD {
            Severity::Warning
        } else {
            continue;
        };
        issues.push(HealthIssue::LecturerWorkload {
            lecturer_id: lecturer_id.to_string(),
            needed,
            available,
            severity,
        });
    }

    let levels = instance
        .sections
        .iter()
        .counts_by(|s| s.level)
        .into_iter()
        .sorted();
    for (level, sections) in levels {
        let severity = if sections > weekly_slots {
            Severity::Critical
        } else if sections as f64 > weekly_slots as f64 * CROWDED_LEVEL {
            Severity::Warning
        } else {
            continue;
        };
        issues.push(HealthIssue::CrowdedLevel {
            level,
            sections,
            weekly_slots,
            severity,
        });
    }

    for issue in &issues {
        warn!("{}", issue);
    }
    issues
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SCHEDULING FAILURE ANALYSIS")?;
        writeln!(f, "{:<10} | {:<6} | {:<18} | STATUS", "DAY", "SLOT", "DEMAND (Sections)")?;
        for row in &self.heatmap {
            writeln!(
                f,
                "{:<10} | {:<6} | {:<18} | {}",
                row.day_name, row.time.slot, row.demand, row.severity
            )?;
        }
        write!(f, "{}", self.bottleneck)
    }
}

impl fmt::Display for BottleneckFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BottleneckFinding::DeepInteraction { placed } => {
                writeln!(f, "Greedy placement succeeded for all {placed} sections.")?;
                writeln!(
                    f,
                    "The failure comes from deep interactions or the search time limit, not a single bottleneck."
                )
            }
            BottleneckFinding::Blocked(b) => {
                writeln!(f, "Could not schedule: {} ({})", b.title, b.course_code)?;
                writeln!(f, "  Lecturer: {}", b.lecturer_id)?;
                writeln!(f, "  Candidate placements in domain: {}", b.domain_size)?;
                for t in &b.blocked_by {
                    writeln!(
                        f,
                        "  - {}: blocked {} placements ({:.1}%)",
                        t.constraint, t.blocked, t.percent
                    )?;
                }
                if b.single_option_lock {
                    writeln!(
                        f,
                        "  Only one placement allowed: check special-room rules or fixed times."
                    )?;
                }
                if let Some(n) = b.lecturer_available_slots {
                    writeln!(f, "  Lecturer has {n} available slots in total.")?;
                }
                if b.lecturer_limited {
                    writeln!(f, "  Lecturer availability is very limited and likely the root cause.")?;
                }
                Ok(())
            }
        }
    }
}
