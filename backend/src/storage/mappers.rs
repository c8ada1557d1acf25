//! Conversions between the wire DTOs in `shared` and the domain models.
//!
//! Timestamps travel as RFC 3339 strings and dates as `YYYY-MM-DD`; a value
//! that does not parse is reported as `ApiError::Decode`.

use chrono::{DateTime, NaiveDate, Utc};
use shared::{AccessLinkResponse, AttendanceRecordDto, IntakeFormDto, IntakeProcessDto, KidInfoDto};

use crate::domain::models::{
    AttendanceRecord, FormId, IntakeForm, IntakeProcess, KidInfo, LinkTarget,
};
use crate::storage::{ApiError, ApiResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_timestamp(value: &str, field: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| ApiError::Decode(format!("invalid {} '{}': {}", field, value, e)))
}

fn parse_optional_timestamp(value: Option<&str>, field: &str) -> ApiResult<Option<DateTime<Utc>>> {
    match value.map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_timestamp(raw, field).map(Some),
        _ => Ok(None),
    }
}

pub fn parse_date(value: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| ApiError::Decode(format!("invalid date '{}': {}", value, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Mapper for intake processes and forms
pub struct IntakeMapper;

impl IntakeMapper {
    pub fn form_to_domain(dto: IntakeFormDto) -> ApiResult<IntakeForm> {
        Ok(IntakeForm {
            form_id: FormId(dto.form_id),
            kid_id: dto.kid_id,
            status: dto.status,
            last_updated: parse_optional_timestamp(Some(dto.last_updated.as_str()), "lastUpdated")?,
            start_date: parse_optional_timestamp(dto.start_date.as_deref(), "startDate")?,
        })
    }

    pub fn process_to_domain(dto: IntakeProcessDto) -> ApiResult<IntakeProcess> {
        let forms = dto
            .forms
            .into_iter()
            .map(Self::form_to_domain)
            .collect::<ApiResult<Vec<_>>>()?;

        Ok(IntakeProcess {
            kid_id: dto.kid_id,
            status: dto.status,
            created_at: parse_timestamp(&dto.created_at, "createdAt")?,
            forms,
        })
    }

    pub fn form_to_dto(form: &IntakeForm) -> IntakeFormDto {
        IntakeFormDto {
            form_id: form.form_id.0,
            kid_id: form.kid_id,
            status: form.status,
            last_updated: form.last_updated.map(|t| t.to_rfc3339()).unwrap_or_default(),
            start_date: form.start_date.map(|t| t.to_rfc3339()),
        }
    }
}

/// Mapper for attendance records
pub struct AttendanceMapper;

impl AttendanceMapper {
    pub fn to_domain(dto: AttendanceRecordDto) -> ApiResult<AttendanceRecord> {
        Ok(AttendanceRecord {
            attendance_id: Some(dto.attendance_id),
            kid_id: dto.kid_id,
            attendance_date: parse_date(&dto.attendance_date)?,
            is_present: dto.is_present,
            absence_reason: dto.absence_reason,
            reported_by: dto.reported_by,
        })
    }
}

/// Mapper for the parent access flow
pub struct ParentAccessMapper;

impl ParentAccessMapper {
    pub fn link_to_domain(dto: AccessLinkResponse) -> LinkTarget {
        LinkTarget {
            kid_id: dto.kid_id,
            kid_name: dto.kid_name,
            form_id: FormId(dto.form_id),
        }
    }

    pub fn kid_info_to_domain(dto: KidInfoDto) -> ApiResult<KidInfo> {
        let birth_date = match dto.birth_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_date(raw)?),
            _ => None,
        };

        Ok(KidInfo {
            kid_id: dto.kid_id,
            first_name: dto.first_name,
            last_name: dto.last_name,
            birth_date,
            class_name: dto.class_name,
            form_id: FormId(dto.form_id),
        })
    }
}
