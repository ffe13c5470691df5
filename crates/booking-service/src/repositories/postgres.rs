//! PostgreSQL implementation of [`BookingStore`].
//!
//! All queries are parameterized. Lead lookups dispatch on the lead source
//! to a fixed query per table; table names are never interpolated at
//! runtime.
//!
//! # Concurrency
//!
//! `commit_booking` and `cancel_booking` run inside a single transaction
//! using conditional updates checked by returned rows. Two simultaneous
//! commits against the same token or a nearly-full slot resolve to exactly
//! one winner without held locks.

use crate::models::{
    LeadInfo, LeadSourceType, MeetingBookingRow, MeetingSlotRow, ProposalTokenRow,
};
use crate::observability::metrics;
use crate::repositories::{
    BookingFilter, BookingStore, CancelOutcome, CommitOutcome, NewSlot, SlotFilter, SlotPatch,
    StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Columns selected for every slot query.
const SLOT_COLUMNS: &str = r#"
    id, title, description, meeting_type, start_time, end_time,
    duration_minutes, meeting_location, meeting_url, office_address,
    timezone, max_bookings, current_bookings, is_available,
    created_at, updated_at
"#;

/// Columns selected for every booking query.
const BOOKING_COLUMNS: &str = r#"
    id, meeting_slot_id, lead_type, lead_id, company_name, contact_name,
    email, phone, requested_agenda, booking_status, cancellation_reason,
    created_at, cancelled_at
"#;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip_all, name = "booking.repo.find_lead")]
    async fn find_lead(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
    ) -> Result<Option<LeadInfo>, StoreError> {
        let start = Instant::now();

        // Fixed dispatch table: one typed query per lead table.
        let query = match lead_type {
            LeadSourceType::ContactForm => {
                "SELECT company_name, contact_name, email, phone FROM contacts WHERE id = $1"
            }
            LeadSourceType::DemoRequest => {
                "SELECT company_name, contact_name, email, phone FROM demo_requests WHERE id = $1"
            }
            LeadSourceType::EventRegistration => {
                "SELECT company_name, contact_name, email, phone \
                 FROM event_registrations WHERE id = $1"
            }
            LeadSourceType::Partnership => {
                "SELECT company_name, contact_name, email, phone FROM partnerships WHERE id = $1"
            }
            LeadSourceType::LibraryLead => {
                "SELECT company_name, contact_name, email, phone FROM library_leads WHERE id = $1"
            }
        };

        let row = sqlx::query(query)
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("find_lead", "error", start.elapsed());
                backend(e)
            })?;

        metrics::record_db_query("find_lead", "success", start.elapsed());

        row.map(|row| {
            Ok(LeadInfo {
                company_name: try_get(&row, "company_name")?,
                contact_name: try_get(&row, "contact_name")?,
                email: try_get(&row, "email")?,
                phone: try_get(&row, "phone")?,
            })
        })
        .transpose()
    }

    async fn touch_lead_contacted(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
    ) -> Result<(), StoreError> {
        let query = match lead_type {
            LeadSourceType::ContactForm => {
                "UPDATE contacts SET last_contacted_at = NOW() WHERE id = $1"
            }
            LeadSourceType::DemoRequest => {
                "UPDATE demo_requests SET last_contacted_at = NOW() WHERE id = $1"
            }
            LeadSourceType::EventRegistration => {
                "UPDATE event_registrations SET last_contacted_at = NOW() WHERE id = $1"
            }
            LeadSourceType::Partnership => {
                "UPDATE partnerships SET last_contacted_at = NOW() WHERE id = $1"
            }
            LeadSourceType::LibraryLead => {
                "UPDATE library_leads SET last_contacted_at = NOW() WHERE id = $1"
            }
        };

        sqlx::query(query)
            .bind(lead_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip_all, name = "booking.repo.log_lead_activity")]
    async fn log_lead_activity(
        &self,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        activity_type: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lead_activities (
                lead_type, lead_id, activity_type, activity_description, metadata
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(lead_type.as_str())
        .bind(lead_id)
        .bind(activity_type)
        .bind(description)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip_all, name = "booking.repo.insert_token")]
    async fn insert_token(
        &self,
        token: &str,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<ProposalTokenRow, StoreError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            INSERT INTO meeting_proposal_tokens (token, lead_type, lead_id, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token, lead_type, lead_id, expires_at, used, used_at, created_at
            "#,
        )
        .bind(token)
        .bind(lead_type.as_str())
        .bind(lead_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("insert_token", "error", start.elapsed());
            classify(e)
        })?;

        metrics::record_db_query("insert_token", "success", start.elapsed());
        map_token_row(&row)
    }

    #[instrument(skip_all, name = "booking.repo.find_token")]
    async fn find_token(&self, token: &str) -> Result<Option<ProposalTokenRow>, StoreError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT id, token, lead_type, lead_id, expires_at, used, used_at, created_at
            FROM meeting_proposal_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_token", "error", start.elapsed());
            backend(e)
        })?;

        metrics::record_db_query("find_token", "success", start.elapsed());
        row.map(|row| map_token_row(&row)).transpose()
    }

    async fn count_open_slots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt
            FROM meeting_slots
            WHERE is_available = TRUE
              AND start_time >= $1
              AND start_time <= $2
              AND current_bookings < max_bookings
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        try_get(&row, "cnt")
    }

    #[instrument(skip_all, name = "booking.repo.list_open_slots")]
    async fn list_open_slots(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MeetingSlotRow>, StoreError> {
        let start = Instant::now();

        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM meeting_slots \
             WHERE is_available = TRUE \
               AND start_time >= $1 \
               AND start_time <= $2 \
               AND current_bookings < max_bookings \
             ORDER BY start_time ASC"
        );

        let rows = sqlx::query(&query)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("list_open_slots", "error", start.elapsed());
                backend(e)
            })?;

        metrics::record_db_query("list_open_slots", "success", start.elapsed());
        rows.iter().map(map_slot_row).collect()
    }

    #[instrument(skip_all, name = "booking.repo.insert_slot")]
    async fn insert_slot(&self, slot: NewSlot) -> Result<MeetingSlotRow, StoreError> {
        let query = format!(
            r#"
            INSERT INTO meeting_slots (
                title, description, meeting_type, start_time, end_time,
                duration_minutes, meeting_location, meeting_url, office_address,
                timezone, max_bookings
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {SLOT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(&slot.title)
            .bind(&slot.description)
            .bind(slot.meeting_type.as_str())
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.duration_minutes)
            .bind(slot.meeting_location.as_str())
            .bind(&slot.meeting_url)
            .bind(&slot.office_address)
            .bind(&slot.timezone)
            .bind(slot.max_bookings)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        map_slot_row(&row)
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<MeetingSlotRow>, StoreError> {
        let query = format!("SELECT {SLOT_COLUMNS} FROM meeting_slots WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(map_slot_row).transpose()
    }

    async fn slot_exists_at(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM meeting_slots WHERE start_time = $1 AND end_time = $2) AS present",
        )
        .bind(start_time)
        .bind(end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        try_get(&row, "present")
    }

    #[instrument(skip_all, name = "booking.repo.list_slots")]
    async fn list_slots(
        &self,
        filter: &SlotFilter,
    ) -> Result<(Vec<MeetingSlotRow>, i64), StoreError> {
        let meeting_type = filter.meeting_type.map(|t| t.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt
            FROM meeting_slots
            WHERE ($1::text IS NULL OR meeting_type = $1)
              AND ($2::boolean IS NULL OR is_available = $2)
            "#,
        )
        .bind(meeting_type)
        .bind(filter.is_available)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        let total: i64 = try_get(&count_row, "cnt")?;

        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM meeting_slots \
             WHERE ($1::text IS NULL OR meeting_type = $1) \
               AND ($2::boolean IS NULL OR is_available = $2) \
             ORDER BY start_time ASC \
             LIMIT $3 OFFSET $4"
        );

        let rows = sqlx::query(&query)
            .bind(meeting_type)
            .bind(filter.is_available)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let slots = rows.iter().map(map_slot_row).collect::<Result<_, _>>()?;
        Ok((slots, total))
    }

    #[instrument(skip_all, name = "booking.repo.update_slot")]
    async fn update_slot(
        &self,
        id: Uuid,
        patch: &SlotPatch,
    ) -> Result<Option<MeetingSlotRow>, StoreError> {
        // max_bookings never drops below the already committed bookings.
        let query = format!(
            r#"
            UPDATE meeting_slots
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                is_available = COALESCE($4, is_available),
                max_bookings = GREATEST(COALESCE($5, max_bookings), current_bookings),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SLOT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(&patch.title)
            .bind(&patch.description)
            .bind(patch.is_available)
            .bind(patch.max_bookings)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(map_slot_row).transpose()
    }

    #[instrument(skip_all, name = "booking.repo.commit_booking")]
    async fn commit_booking(
        &self,
        token_id: Uuid,
        slot_id: Uuid,
        lead_type: LeadSourceType,
        lead_id: Uuid,
        lead: &LeadInfo,
        agenda: Option<&str>,
    ) -> Result<CommitOutcome, StoreError> {
        let start = Instant::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        // (a) Consume the token. Zero rows means a concurrent commit won.
        let consumed = sqlx::query(
            r#"
            UPDATE meeting_proposal_tokens
            SET used = TRUE, used_at = NOW()
            WHERE id = $1 AND used = FALSE
            RETURNING used_at
            "#,
        )
        .bind(token_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            metrics::record_db_query("commit_booking", "error", start.elapsed());
            backend(e)
        })?;

        if consumed.is_none() {
            let row = sqlx::query("SELECT used_at FROM meeting_proposal_tokens WHERE id = $1")
                .bind(token_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            let used_at = row.map(|r| try_get(&r, "used_at")).transpose()?.flatten();
            let _ = tx.rollback().await;
            metrics::record_db_query("commit_booking", "token_used", start.elapsed());
            return Ok(CommitOutcome::TokenAlreadyUsed { used_at });
        }

        // (b) Claim one spot, guarded by the capacity check.
        let query = format!(
            r#"
            UPDATE meeting_slots
            SET current_bookings = current_bookings + 1, updated_at = NOW()
            WHERE id = $1
              AND is_available = TRUE
              AND current_bookings < max_bookings
            RETURNING {SLOT_COLUMNS}
            "#
        );
        let claimed = sqlx::query(&query)
            .bind(slot_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                metrics::record_db_query("commit_booking", "error", start.elapsed());
                backend(e)
            })?;

        if claimed.is_none() {
            let exists = sqlx::query(
                "SELECT is_available FROM meeting_slots WHERE id = $1",
            )
            .bind(slot_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;
            let _ = tx.rollback().await;

            let outcome = match exists {
                Some(row) if try_get::<bool>(&row, "is_available")? => CommitOutcome::SlotFull,
                _ => CommitOutcome::SlotNotFound,
            };
            metrics::record_db_query("commit_booking", "slot_rejected", start.elapsed());
            return Ok(outcome);
        }

        // (c) Record the confirmed booking.
        let query = format!(
            r#"
            INSERT INTO meeting_bookings (
                meeting_slot_id, lead_type, lead_id, company_name, contact_name,
                email, phone, requested_agenda, booking_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'CONFIRMED')
            RETURNING {BOOKING_COLUMNS}
            "#
        );
        let booking = sqlx::query(&query)
            .bind(slot_id)
            .bind(lead_type.as_str())
            .bind(lead_id)
            .bind(&lead.company_name)
            .bind(&lead.contact_name)
            .bind(&lead.email)
            .bind(&lead.phone)
            .bind(agenda)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                metrics::record_db_query("commit_booking", "error", start.elapsed());
                backend(e)
            })?;

        let booking = map_booking_row(&booking)?;

        tx.commit().await.map_err(|e| {
            metrics::record_db_query("commit_booking", "error", start.elapsed());
            backend(e)
        })?;

        metrics::record_db_query("commit_booking", "success", start.elapsed());
        Ok(CommitOutcome::Booked(booking))
    }

    #[instrument(skip_all, name = "booking.repo.list_bookings")]
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<(Vec<MeetingBookingRow>, i64), StoreError> {
        let status = filter.status.map(|s| s.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt
            FROM meeting_bookings
            WHERE ($1::text IS NULL OR booking_status = $1)
            "#,
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        let total: i64 = try_get(&count_row, "cnt")?;

        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM meeting_bookings \
             WHERE ($1::text IS NULL OR booking_status = $1) \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );

        let rows = sqlx::query(&query)
            .bind(status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let bookings = rows.iter().map(map_booking_row).collect::<Result<_, _>>()?;
        Ok((bookings, total))
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<MeetingBookingRow>, StoreError> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM meeting_bookings WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(map_booking_row).transpose()
    }

    #[instrument(skip_all, name = "booking.repo.cancel_booking")]
    async fn cancel_booking(
        &self,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<CancelOutcome, StoreError> {
        let start = Instant::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        let query = format!(
            r#"
            UPDATE meeting_bookings
            SET booking_status = 'CANCELLED',
                cancellation_reason = $2,
                cancelled_at = NOW()
            WHERE id = $1 AND booking_status = 'CONFIRMED'
            RETURNING {BOOKING_COLUMNS}
            "#
        );
        let cancelled = sqlx::query(&query)
            .bind(id)
            .bind(reason)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                metrics::record_db_query("cancel_booking", "error", start.elapsed());
                backend(e)
            })?;

        let Some(row) = cancelled else {
            let existing = sqlx::query("SELECT booking_status FROM meeting_bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            let _ = tx.rollback().await;

            return Ok(match existing {
                Some(_) => CancelOutcome::AlreadyCancelled,
                None => CancelOutcome::NotFound,
            });
        };
        let booking = map_booking_row(&row)?;

        // Release the spot so the capacity invariant keeps holding.
        sqlx::query(
            r#"
            UPDATE meeting_slots
            SET current_bookings = current_bookings - 1, updated_at = NOW()
            WHERE id = $1 AND current_bookings > 0
            "#,
        )
        .bind(booking.meeting_slot_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            metrics::record_db_query("cancel_booking", "error", start.elapsed());
            backend(e)
        })?;

        tx.commit().await.map_err(backend)?;

        metrics::record_db_query("cancel_booking", "success", start.elapsed());
        Ok(CancelOutcome::Cancelled(booking))
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Classify insert errors: unique violations become `Duplicate`.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(db.to_string());
        }
    }
    backend(err)
}

fn try_get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("column {column}: {e}")))
}

fn parse_enum<T: std::str::FromStr<Err = String>>(value: String) -> Result<T, StoreError> {
    value.parse().map_err(StoreError::Backend)
}

fn map_slot_row(row: &PgRow) -> Result<MeetingSlotRow, StoreError> {
    Ok(MeetingSlotRow {
        id: try_get(row, "id")?,
        title: try_get(row, "title")?,
        description: try_get(row, "description")?,
        meeting_type: parse_enum(try_get(row, "meeting_type")?)?,
        start_time: try_get(row, "start_time")?,
        end_time: try_get(row, "end_time")?,
        duration_minutes: try_get(row, "duration_minutes")?,
        meeting_location: parse_enum(try_get(row, "meeting_location")?)?,
        meeting_url: try_get(row, "meeting_url")?,
        office_address: try_get(row, "office_address")?,
        timezone: try_get(row, "timezone")?,
        max_bookings: try_get(row, "max_bookings")?,
        current_bookings: try_get(row, "current_bookings")?,
        is_available: try_get(row, "is_available")?,
        created_at: try_get(row, "created_at")?,
        updated_at: try_get(row, "updated_at")?,
    })
}

fn map_token_row(row: &PgRow) -> Result<ProposalTokenRow, StoreError> {
    Ok(ProposalTokenRow {
        id: try_get(row, "id")?,
        token: try_get(row, "token")?,
        lead_type: parse_enum(try_get(row, "lead_type")?)?,
        lead_id: try_get(row, "lead_id")?,
        expires_at: try_get(row, "expires_at")?,
        used: try_get(row, "used")?,
        used_at: try_get(row, "used_at")?,
        created_at: try_get(row, "created_at")?,
    })
}

fn map_booking_row(row: &PgRow) -> Result<MeetingBookingRow, StoreError> {
    Ok(MeetingBookingRow {
        id: try_get(row, "id")?,
        meeting_slot_id: try_get(row, "meeting_slot_id")?,
        lead_type: parse_enum(try_get(row, "lead_type")?)?,
        lead_id: try_get(row, "lead_id")?,
        company_name: try_get(row, "company_name")?,
        contact_name: try_get(row, "contact_name")?,
        email: try_get(row, "email")?,
        phone: try_get(row, "phone")?,
        requested_agenda: try_get(row, "requested_agenda")?,
        booking_status: parse_enum(try_get(row, "booking_status")?)?,
        cancellation_reason: try_get(row, "cancellation_reason")?,
        created_at: try_get(row, "created_at")?,
        cancelled_at: try_get(row, "cancelled_at")?,
    })
}
