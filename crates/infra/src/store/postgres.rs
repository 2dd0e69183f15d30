//! Postgres-backed stores.
//!
//! One [`PostgresStore`] implements every store trait over a shared pool.
//! Queries are built at runtime (no compile-time checked macros), rows are
//! mapped by hand.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError |
//! |------------|-----------------|------------|
//! | RowNotFound | N/A | `NotFound` |
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Validation` |
//! | anything else | any | `Transport` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use labstock_core::{ExpectedVersion, IntentId, MaterialId, MessageId, RecordId, UserId};
use labstock_inventory::{
    MaterialBatch, MaterialChanges, MaterialStatus, MovementKind, MovementRecord, NewMaterial,
    NewMovement,
};
use labstock_messages::{Message, NewMessage, Recipient};

use super::{
    IntentState, IssuanceIntent, IssuanceJournal, MaterialRepository, MessageStore, RecordStore,
    StoreError,
};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const MATERIAL_COLUMNS: &str = "id, name, code, batch_number, unique_id, manufacturer, concentration, \
     uncertainty, storage_condition, quantity, expiry_date, intake_status, images, created_by, \
     version, created_at, updated_at";

const RECORD_COLUMNS: &str = "id, type, material_id, material_name, quantity, operator, operator_id, \
     purpose, note, images, created_at";

const INTENT_COLUMNS: &str =
    "id, material_id, material_version, operator_id, record_id, state, opened_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, sender_id, sender_name, recipient, recipient_name, subject, content, read_by, created_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl MaterialRepository for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<MaterialBatch>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_materials", e))?;

        rows.iter().map(material_from_row).collect()
    }

    #[instrument(skip(self), fields(material_id = %id), err)]
    async fn get(&self, id: MaterialId) -> Result<MaterialBatch, StoreError> {
        let row = sqlx::query(&format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_material", e))?;

        material_from_row(&row)
    }

    #[instrument(skip(self, new), fields(name = %new.name), err)]
    async fn create(&self, new: NewMaterial) -> Result<MaterialBatch, StoreError> {
        let batch = MaterialBatch::from_new(MaterialId::new(), new, Utc::now());
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO materials ({MATERIAL_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(batch.id.as_uuid())
        .bind(&batch.name)
        .bind(&batch.code)
        .bind(&batch.batch_number)
        .bind(&batch.unique_id)
        .bind(&batch.manufacturer)
        .bind(&batch.concentration)
        .bind(&batch.uncertainty)
        .bind(&batch.storage_condition)
        .bind(quantity_to_db(batch.quantity)?)
        .bind(batch.expiry_date)
        .bind(batch.intake_status.as_str())
        .bind(&batch.images)
        .bind(batch.created_by.as_uuid())
        .bind(version_to_db(batch.version)?)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_material", e))?;

        material_from_row(&row)
    }

    #[instrument(skip(self, changes), fields(material_id = %id), err)]
    async fn update(&self, id: MaterialId, changes: MaterialChanges) -> Result<MaterialBatch, StoreError> {
        // Optional columns are cleared when touched with `None`; `$n` flags say "touched".
        let quantity = changes.quantity.map(quantity_to_db).transpose()?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE materials SET
                name = COALESCE($2, name),
                code = COALESCE($3, code),
                batch_number = CASE WHEN $4 THEN $5 ELSE batch_number END,
                unique_id = COALESCE($6, unique_id),
                manufacturer = CASE WHEN $7 THEN $8 ELSE manufacturer END,
                concentration = CASE WHEN $9 THEN $10 ELSE concentration END,
                uncertainty = CASE WHEN $11 THEN $12 ELSE uncertainty END,
                storage_condition = CASE WHEN $13 THEN $14 ELSE storage_condition END,
                quantity = COALESCE($15, quantity),
                expiry_date = COALESCE($16, expiry_date),
                images = COALESCE($17, images),
                version = version + 1,
                updated_at = now()
            WHERE id = $1
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(changes.name)
        .bind(changes.code)
        .bind(changes.batch_number.is_some())
        .bind(changes.batch_number.flatten())
        .bind(changes.unique_id)
        .bind(changes.manufacturer.is_some())
        .bind(changes.manufacturer.flatten())
        .bind(changes.concentration.is_some())
        .bind(changes.concentration.flatten())
        .bind(changes.uncertainty.is_some())
        .bind(changes.uncertainty.flatten())
        .bind(changes.storage_condition.is_some())
        .bind(changes.storage_condition.flatten())
        .bind(quantity)
        .bind(changes.expiry_date)
        .bind(changes.images)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_material", e))?;

        material_from_row(&row)
    }

    #[instrument(skip(self), fields(material_id = %id), err)]
    async fn delete(&self, id: MaterialId, expected: ExpectedVersion) -> Result<(), StoreError> {
        let expected_version = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(version_to_db(v)?),
        };

        let result = sqlx::query(
            "DELETE FROM materials WHERE id = $1 AND ($2::BIGINT IS NULL OR version = $2)",
        )
        .bind(id.as_uuid())
        .bind(expected_version)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_material", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing deleted: either the row is gone or its version moved on.
        let current = sqlx::query("SELECT version FROM materials WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_material", e))?;

        match current {
            None => Err(StoreError::NotFound),
            Some(row) => {
                let actual: i64 = row.try_get("version").map_err(decode_error)?;
                Err(StoreError::Conflict(format!(
                    "expected version {expected:?}, found {actual}"
                )))
            }
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    #[instrument(skip(self, new), fields(material_id = %new.material_id, kind = %new.kind), err)]
    async fn append(&self, new: NewMovement) -> Result<MovementRecord, StoreError> {
        let record = MovementRecord::from_new(RecordId::new(), new, Utc::now());
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO records ({RECORD_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(record.id.as_uuid())
        .bind(record.kind.as_str())
        .bind(record.material_id.as_uuid())
        .bind(&record.material_name)
        .bind(quantity_to_db(record.quantity)?)
        .bind(&record.operator)
        .bind(record.operator_id.as_uuid())
        .bind(&record.purpose)
        .bind(&record.note)
        .bind(&record.images)
        .bind(record.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_record", e))?;

        record_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<MovementRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM records ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_records", e))?;

        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self), fields(material_id = %material_id), err)]
    async fn list_for_material(&self, material_id: MaterialId) -> Result<Vec<MovementRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE material_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(material_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_records_for_material", e))?;

        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self), fields(record_id = %id), err)]
    async fn get(&self, id: RecordId) -> Result<MovementRecord, StoreError> {
        let row = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_record", e))?;

        record_from_row(&row)
    }

    #[instrument(skip(self), fields(record_id = %id), err)]
    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_record", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl IssuanceJournal for PostgresStore {
    #[instrument(skip(self), fields(material_id = %material_id), err)]
    async fn open(
        &self,
        material_id: MaterialId,
        material_version: u64,
        operator_id: UserId,
    ) -> Result<IssuanceIntent, StoreError> {
        let id = IntentId::new();
        let now = Utc::now();
        // The partial unique index turns a second live intent into 23505.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO issuance_intents ({INTENT_COLUMNS})
            VALUES ($1, $2, $3, $4, NULL, 'opened', $5, $5)
            RETURNING {INTENT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(material_id.as_uuid())
        .bind(version_to_db(material_version)?)
        .bind(operator_id.as_uuid())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("open_intent", e))?;

        intent_from_row(&row)
    }

    #[instrument(skip(self), fields(intent_id = %id, record_id = %record_id), err)]
    async fn mark_recorded(&self, id: IntentId, record_id: RecordId) -> Result<(), StoreError> {
        self.transition(id, &[IntentState::Opened], IntentState::Recorded, Some(record_id))
            .await
    }

    #[instrument(skip(self), fields(intent_id = %id), err)]
    async fn commit(&self, id: IntentId) -> Result<(), StoreError> {
        self.transition(
            id,
            &[IntentState::Opened, IntentState::Recorded],
            IntentState::Committed,
            None,
        )
        .await
    }

    #[instrument(skip(self), fields(intent_id = %id), err)]
    async fn abandon(&self, id: IntentId) -> Result<(), StoreError> {
        self.transition(
            id,
            &[IntentState::Opened, IntentState::Recorded],
            IntentState::Abandoned,
            None,
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn pending(&self) -> Result<Vec<IssuanceIntent>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM issuance_intents WHERE state IN ('opened', 'recorded') ORDER BY opened_at ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("pending_intents", e))?;

        rows.iter().map(intent_from_row).collect()
    }
}

impl PostgresStore {
    async fn transition(
        &self,
        id: IntentId,
        allowed_from: &[IntentState],
        to: IntentState,
        record_id: Option<RecordId>,
    ) -> Result<(), StoreError> {
        let from: Vec<String> = allowed_from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE issuance_intents
            SET state = $2, record_id = COALESCE($3, record_id), updated_at = now()
            WHERE id = $1 AND state = ANY($4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(to.as_str())
        .bind(record_id.map(uuid::Uuid::from))
        .bind(&from)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transition_intent", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT state FROM issuance_intents WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("transition_intent", e))?;

        match exists {
            None => Err(StoreError::NotFound),
            Some(row) => {
                let state: String = row.try_get("state").map_err(decode_error)?;
                Err(StoreError::Conflict(format!(
                    "intent {id} is {state} and cannot become {}",
                    to.as_str()
                )))
            }
        }
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    #[instrument(skip(self, new), err)]
    async fn insert(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = Message::from_new(MessageId::new(), new, Utc::now());
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO messages ({MESSAGE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.id.as_uuid())
        .bind(message.sender_id.as_uuid())
        .bind(&message.sender_name)
        .bind(String::from(message.recipient))
        .bind(&message.recipient_name)
        .bind(&message.subject)
        .bind(&message.content)
        .bind(Vec::<uuid::Uuid>::new())
        .bind(message.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_message", e))?;

        message_from_row(&row)
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn list_for(&self, user: UserId) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE recipient = $1 OR recipient = 'all' ORDER BY created_at DESC, id DESC"
        ))
        .bind(user.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_messages", e))?;

        rows.iter().map(message_from_row).collect()
    }

    #[instrument(skip(self), fields(message_id = %id), err)]
    async fn get(&self, id: MessageId) -> Result<Message, StoreError> {
        let row = sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_message", e))?;

        message_from_row(&row)
    }

    #[instrument(skip(self), fields(message_id = %id, user_id = %user), err)]
    async fn mark_read(&self, id: MessageId, user: UserId) -> Result<Message, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE messages
            SET read_by = CASE WHEN $2 = ANY(read_by) THEN read_by ELSE array_append(read_by, $2) END
            WHERE id = $1
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_message_read", e))?;

        message_from_row(&row)
    }

    #[instrument(skip(self), fields(message_id = %id), err)]
    async fn delete(&self, id: MessageId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_message", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn material_from_row(row: &PgRow) -> Result<MaterialBatch, StoreError> {
    let intake_status: String = row.try_get("intake_status").map_err(decode_error)?;
    let intake_status: MaterialStatus = intake_status
        .parse()
        .map_err(|e| StoreError::Transport(format!("corrupt intake_status: {e}")))?;
    let quantity: i32 = row.try_get("quantity").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    Ok(MaterialBatch {
        id: MaterialId::from_uuid(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        code: row.try_get("code").map_err(decode_error)?,
        batch_number: row.try_get("batch_number").map_err(decode_error)?,
        unique_id: row.try_get("unique_id").map_err(decode_error)?,
        manufacturer: row.try_get("manufacturer").map_err(decode_error)?,
        concentration: row.try_get("concentration").map_err(decode_error)?,
        uncertainty: row.try_get("uncertainty").map_err(decode_error)?,
        storage_condition: row.try_get("storage_condition").map_err(decode_error)?,
        quantity: quantity_from_db(quantity)?,
        expiry_date: row.try_get::<NaiveDate, _>("expiry_date").map_err(decode_error)?,
        intake_status,
        images: row.try_get("images").map_err(decode_error)?,
        created_by: UserId::from_uuid(row.try_get("created_by").map_err(decode_error)?),
        version: u64::try_from(version)
            .map_err(|_| StoreError::Transport(format!("corrupt version: {version}")))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_error)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode_error)?,
    })
}

fn record_from_row(row: &PgRow) -> Result<MovementRecord, StoreError> {
    let kind: String = row.try_get("type").map_err(decode_error)?;
    let kind: MovementKind = kind
        .parse()
        .map_err(|e| StoreError::Transport(format!("corrupt record type: {e}")))?;
    let quantity: i32 = row.try_get("quantity").map_err(decode_error)?;

    Ok(MovementRecord {
        id: RecordId::from_uuid(row.try_get("id").map_err(decode_error)?),
        kind,
        material_id: MaterialId::from_uuid(row.try_get("material_id").map_err(decode_error)?),
        material_name: row.try_get("material_name").map_err(decode_error)?,
        quantity: quantity_from_db(quantity)?,
        operator: row.try_get("operator").map_err(decode_error)?,
        operator_id: UserId::from_uuid(row.try_get("operator_id").map_err(decode_error)?),
        purpose: row.try_get("purpose").map_err(decode_error)?,
        note: row.try_get("note").map_err(decode_error)?,
        images: row.try_get("images").map_err(decode_error)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_error)?,
    })
}

fn intent_from_row(row: &PgRow) -> Result<IssuanceIntent, StoreError> {
    let state: String = row.try_get("state").map_err(decode_error)?;
    let state = IntentState::parse(&state)
        .ok_or_else(|| StoreError::Transport(format!("corrupt intent state: {state}")))?;
    let version: i64 = row.try_get("material_version").map_err(decode_error)?;
    let record_id: Option<uuid::Uuid> = row.try_get("record_id").map_err(decode_error)?;

    Ok(IssuanceIntent {
        id: IntentId::from_uuid(row.try_get("id").map_err(decode_error)?),
        material_id: MaterialId::from_uuid(row.try_get("material_id").map_err(decode_error)?),
        material_version: u64::try_from(version)
            .map_err(|_| StoreError::Transport(format!("corrupt material_version: {version}")))?,
        operator_id: UserId::from_uuid(row.try_get("operator_id").map_err(decode_error)?),
        record_id: record_id.map(RecordId::from_uuid),
        state,
        opened_at: row.try_get::<DateTime<Utc>, _>("opened_at").map_err(decode_error)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode_error)?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, StoreError> {
    let recipient: String = row.try_get("recipient").map_err(decode_error)?;
    let recipient = Recipient::try_from(recipient)
        .map_err(|e| StoreError::Transport(format!("corrupt recipient: {e}")))?;
    let read_by: Vec<uuid::Uuid> = row.try_get("read_by").map_err(decode_error)?;

    Ok(Message {
        id: MessageId::from_uuid(row.try_get("id").map_err(decode_error)?),
        sender_id: UserId::from_uuid(row.try_get("sender_id").map_err(decode_error)?),
        sender_name: row.try_get("sender_name").map_err(decode_error)?,
        recipient,
        recipient_name: row.try_get("recipient_name").map_err(decode_error)?,
        subject: row.try_get("subject").map_err(decode_error)?,
        content: row.try_get("content").map_err(decode_error)?,
        read_by: read_by.into_iter().map(UserId::from_uuid).collect(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_error)?,
    })
}

fn quantity_to_db(quantity: u32) -> Result<i32, StoreError> {
    i32::try_from(quantity).map_err(|_| StoreError::Validation(format!("quantity {quantity} is too large")))
}

fn quantity_from_db(quantity: i32) -> Result<u32, StoreError> {
    u32::try_from(quantity).map_err(|_| StoreError::Transport(format!("corrupt quantity: {quantity}")))
}

fn version_to_db(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Validation(format!("version {version} is too large")))
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Transport(format!("failed to decode row: {err}"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23514") => StoreError::Validation(msg),
                _ => StoreError::Transport(msg),
            }
        }
        other => StoreError::Transport(format!("{operation}: {other}")),
    }
}
