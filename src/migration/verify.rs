use std::collections::HashMap;

use crate::client::ReservationApi;
use crate::error::ApiError;
use crate::mapping::{MappingError, adjust_end_time};
use crate::migration::conflict::{PlannedWindows, ReservationSnapshot, find_overlap};
use crate::migration::orchestrator::{MigrationOrchestrator, PlannedUnit};
use crate::rooms::{RoomError, RoomMapping};
use crate::types::{
    FieldValidationError, IssueKind, LegacyReservation, MigrationIssue, ReservationCandidate,
    ReservationPayload, TimeWindow, VerificationRecord, VerificationReport,
};

struct Halt {
    index: usize,
    issue: MigrationIssue,
}

impl<A: ReservationApi + ?Sized + 'static> MigrationOrchestrator<A> {
    /// Read-only pass over `rows`. Returns the planned units, which are
    /// empty unless every candidate passed.
    pub(super) async fn verify(
        &self,
        rows: Vec<LegacyReservation>,
    ) -> (VerificationReport, Vec<PlannedUnit>) {
        let converted: Vec<Result<ReservationCandidate, FieldValidationError>> =
            rows.into_iter().map(ReservationCandidate::try_from).collect();

        let mut rooms: HashMap<String, Result<RoomMapping, ApiError>> = HashMap::new();
        for candidate in converted.iter().flatten() {
            if !rooms.contains_key(&candidate.room_label) {
                let mapping = self.resolver.mapping(&candidate.room_label).await;
                rooms.insert(candidate.room_label.clone(), mapping);
            }
        }

        let slots: Vec<(i64, chrono::NaiveDate)> = converted
            .iter()
            .flatten()
            .filter_map(|candidate| match rooms.get(&candidate.room_label) {
                Some(Ok(RoomMapping {
                    target_room_id: Some(room_id),
                    ..
                })) => Some((*room_id, candidate.date)),
                _ => None,
            })
            .collect();
        let snapshot = ReservationSnapshot::prefetch(self.api.as_ref(), slots).await;

        let (units, unit_of) = group_units(&converted);
        let mut planned = PlannedWindows::default();
        let mut plans: Vec<Option<PlannedUnit>> = units.iter().map(|_| None).collect();
        let mut passed = vec![false; converted.len()];
        let mut records: Vec<VerificationRecord> = Vec::new();
        let mut halt: Option<Halt> = None;

        for (index, entry) in converted.iter().enumerate() {
            let candidate = match entry {
                Ok(candidate) => candidate,
                Err(err) => {
                    halt = Some(Halt {
                        index,
                        issue: field_issue(err),
                    });
                    break;
                }
            };

            let unit = unit_of[index];
            let (room_id, window) =
                match check_candidate(candidate, unit, &rooms, &snapshot, &planned) {
                    Ok(checked) => checked,
                    Err(issue) => {
                        halt = Some(Halt { index, issue });
                        break;
                    }
                };
            planned.add((room_id, candidate.date), unit, &candidate.source_id, window);

            if units[unit].last() != Some(&index) {
                passed[index] = true;
                continue;
            }

            let members: Vec<ReservationCandidate> = units[unit]
                .iter()
                .filter_map(|member| converted[*member].as_ref().ok().cloned())
                .collect();
            match self.plan_unit(&members).await {
                Ok(payload) => {
                    for member in &units[unit] {
                        records.push(VerificationRecord {
                            index: *member,
                            source_id: source_id_of(&converted[*member]),
                            valid: true,
                            payload: Some(payload.clone()),
                            issues: Vec::new(),
                        });
                    }
                    plans[unit] = Some(PlannedUnit {
                        source_ids: members.iter().map(|m| m.source_id.clone()).collect(),
                        payload,
                    });
                }
                Err(issue) => {
                    halt = Some(Halt { index, issue });
                    break;
                }
            }
        }

        let mut report = VerificationReport::default();
        if let Some(Halt { index, issue }) = halt {
            // Members that passed but whose unit never completed.
            for (member, ok) in passed.iter().enumerate() {
                if *ok && plans[unit_of[member]].is_none() {
                    records.push(VerificationRecord {
                        index: member,
                        source_id: source_id_of(&converted[member]),
                        valid: true,
                        payload: None,
                        issues: Vec::new(),
                    });
                }
            }

            tracing::warn!(
                source_id = %issue.source_id,
                kind = ?issue.kind,
                message = %issue.message,
                "verification halted"
            );
            *report.errors_by_kind.entry(issue.kind).or_insert(0) += 1;
            report.halted_at = Some(issue.source_id.clone());
            records.push(VerificationRecord {
                index,
                source_id: issue.source_id.clone(),
                valid: false,
                payload: None,
                issues: vec![issue],
            });
        }

        records.sort_by_key(|record| record.index);
        report.processed = records.len();
        report.passed = records.iter().filter(|record| record.valid).count();
        report.failed = report.processed - report.passed;
        report.records = records;

        let units = if report.is_clean() {
            plans.into_iter().flatten().collect()
        } else {
            Vec::new()
        };
        tracing::info!(
            processed = report.processed,
            passed = report.passed,
            failed = report.failed,
            units = units.len(),
            "verification finished"
        );
        (report, units)
    }

    async fn plan_unit(
        &self,
        members: &[ReservationCandidate],
    ) -> Result<ReservationPayload, MigrationIssue> {
        let Some(last) = members.last() else {
            return Err(mapping_issue("<empty>", MappingError::EmptyGroup));
        };

        let single = members.len() == 1 && !(last.regular && self.config.term_end.is_some());
        let mapped = if single {
            self.mapper.map_single(last).await
        } else {
            self.mapper.map_group(members).await
        };
        let payload = mapped.map_err(|err| mapping_issue(&last.source_id, err))?;

        check_payload(&last.source_id, &payload, self.config.max_name_len)?;
        Ok(payload)
    }
}

/// Units in order of first appearance, plus the unit of every input index.
fn group_units(
    converted: &[Result<ReservationCandidate, FieldValidationError>],
) -> (Vec<Vec<usize>>, Vec<usize>) {
    let mut units: Vec<Vec<usize>> = Vec::new();
    let mut unit_of = Vec::with_capacity(converted.len());
    let mut by_group: HashMap<&str, usize> = HashMap::new();

    for (index, entry) in converted.iter().enumerate() {
        let group = entry
            .as_ref()
            .ok()
            .and_then(|candidate| candidate.group_id.as_deref());
        let unit = match group.and_then(|group| by_group.get(group)) {
            Some(unit) => *unit,
            None => {
                units.push(Vec::new());
                let unit = units.len() - 1;
                if let Some(group) = group {
                    by_group.insert(group, unit);
                }
                unit
            }
        };
        units[unit].push(index);
        unit_of.push(unit);
    }

    (units, unit_of)
}

fn check_candidate(
    candidate: &ReservationCandidate,
    unit: usize,
    rooms: &HashMap<String, Result<RoomMapping, ApiError>>,
    snapshot: &ReservationSnapshot,
    planned: &PlannedWindows,
) -> Result<(i64, TimeWindow), MigrationIssue> {
    let source_id = candidate.source_id.as_str();
    let mapping = match rooms.get(&candidate.room_label) {
        Some(Ok(mapping)) => mapping,
        Some(Err(err)) => return Err(api_issue(source_id, err)),
        None => {
            return Err(MigrationIssue::new(
                IssueKind::System,
                source_id,
                "room label was not resolved",
            ));
        }
    };
    let Some(room_id) = mapping.target_room_id else {
        return Err(MigrationIssue::new(
            IssueKind::UnmappableRoom,
            source_id,
            mapping
                .error
                .clone()
                .unwrap_or_else(|| format!("no target room for '{}'", mapping.label)),
        )
        .with_field("room_label", Some(candidate.room_label.clone())));
    };

    let window = TimeWindow::new(candidate.start_time, adjust_end_time(candidate.end_time));
    match snapshot.get(room_id, candidate.date) {
        Some(Ok(existing)) => {
            if let Some(hit) = find_overlap(existing, &window) {
                return Err(MigrationIssue::new(
                    IssueKind::TimeConflict,
                    source_id,
                    format!(
                        "{window} on {} overlaps existing reservation {} '{}' ({})",
                        candidate.date,
                        hit.id,
                        hit.name,
                        hit.window()
                    ),
                )
                .with_field("start_time", Some(window.to_string())));
            }
        }
        Some(Err(err)) => return Err(api_issue(source_id, err)),
        None => {
            return Err(MigrationIssue::new(
                IssueKind::System,
                source_id,
                format!("no snapshot for room {room_id} on {}", candidate.date),
            ));
        }
    }

    if let Some(other) = planned.conflict((room_id, candidate.date), unit, &window) {
        return Err(MigrationIssue::new(
            IssueKind::TimeConflict,
            source_id,
            format!(
                "{window} on {} overlaps {other}, planned earlier in this run",
                candidate.date
            ),
        )
        .with_field("start_time", Some(window.to_string())));
    }

    Ok((room_id, window))
}

/// Rules the target service enforces on creation, checked up front.
pub fn check_payload(
    source_id: &str,
    payload: &ReservationPayload,
    max_name_len: usize,
) -> Result<(), MigrationIssue> {
    let name_len = payload.name.trim().chars().count();
    if name_len == 0 {
        return Err(
            MigrationIssue::new(IssueKind::ApiValidation, source_id, "name must not be empty")
                .with_field("name", None),
        );
    }
    if name_len > max_name_len {
        return Err(MigrationIssue::new(
            IssueKind::ApiValidation,
            source_id,
            format!("name is {name_len} characters, limit is {max_name_len}"),
        )
        .with_field("name", Some(payload.name.clone())));
    }
    if let Some(until) = payload.schedule.repeat_until()
        && until < payload.start_date
    {
        return Err(MigrationIssue::new(
            IssueKind::ApiValidation,
            source_id,
            format!("repeat_until {until} is before start_date {}", payload.start_date),
        )
        .with_field("repeat_until", Some(until.to_string())));
    }
    Ok(())
}

fn field_issue(err: &FieldValidationError) -> MigrationIssue {
    MigrationIssue::new(IssueKind::FieldValidation, &err.source_id, &err.message)
        .with_field(err.field, err.value.clone())
}

fn api_issue(source_id: &str, err: &ApiError) -> MigrationIssue {
    let kind = match err {
        ApiError::Validation(_) => IssueKind::ApiValidation,
        _ => IssueKind::System,
    };
    MigrationIssue::new(kind, source_id, err.to_string())
}

fn mapping_issue(source_id: &str, err: MappingError) -> MigrationIssue {
    match &err {
        MappingError::EmptyGroup => {
            MigrationIssue::new(IssueKind::FieldValidation, source_id, err.to_string())
        }
        MappingError::MixedRooms { labels, .. } => {
            MigrationIssue::new(IssueKind::FieldValidation, source_id, err.to_string())
                .with_field("room_label", Some(labels.join(", ")))
        }
        MappingError::AmbiguousWeekday { weekday, .. } => {
            MigrationIssue::new(IssueKind::ApiValidation, source_id, err.to_string())
                .with_field("day_times", Some(weekday.to_string()))
        }
        MappingError::Room(RoomError::NotMappable { label, .. }) => {
            MigrationIssue::new(IssueKind::UnmappableRoom, source_id, err.to_string())
                .with_field("room_label", Some(label.clone()))
        }
        MappingError::Room(RoomError::Api(api)) => api_issue(source_id, api),
    }
}

fn source_id_of(entry: &Result<ReservationCandidate, FieldValidationError>) -> String {
    match entry {
        Ok(candidate) => candidate.source_id.clone(),
        Err(err) => err.source_id.clone(),
    }
}
