use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::model::{
    DeletionPolicy, FeatureAssignment, FeatureDefinition, FeatureError, FeatureResult,
    FeatureValue, Id, OnAssignmentDelete, ProductTemplate, ProductVariant, ProductionLot,
    SubjectKind, TableValue, ValueBody, ValueKind,
};
use crate::store::traits::{
    AssignmentStore, FeatureDefinitionStore, Store, SubjectStore, TableValueStore, ValueStore,
};

/// PostgreSQL store backend. Uniqueness tuples live as unique indexes and
/// surface as `ConstraintViolation`; the value body and the restricted
/// table-value list are JSONB payloads.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    deletion_policy: DeletionPolicy,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self {
            pool,
            deletion_policy: DeletionPolicy::default(),
        })
    }

    /// Create the schema if it does not exist. DDL is issued at runtime so
    /// the crate builds without database access.
    pub async fn migrate(&self) -> Result<()> {
        let ddl = [
            r#"CREATE TABLE IF NOT EXISTS features (
                id TEXT PRIMARY KEY,
                scope_id TEXT NOT NULL,
                code TEXT,
                name TEXT NOT NULL,
                value_kind TEXT NOT NULL,
                num_decimals INT NOT NULL DEFAULT 2,
                is_lot_feature BOOLEAN NOT NULL DEFAULT FALSE
            )"#,
            r#"CREATE UNIQUE INDEX IF NOT EXISTS features_uniq_key
                ON features (scope_id, coalesce(code, ''), name)"#,
            r#"CREATE TABLE IF NOT EXISTS table_values (
                id TEXT PRIMARY KEY,
                feature_id TEXT NOT NULL REFERENCES features(id) ON DELETE CASCADE,
                scope_id TEXT NOT NULL,
                code TEXT,
                name TEXT NOT NULL
            )"#,
            r#"CREATE UNIQUE INDEX IF NOT EXISTS table_values_uniq_key
                ON table_values (scope_id, feature_id, coalesce(code, ''), name)"#,
            r#"CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                scope_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
            r#"CREATE TABLE IF NOT EXISTS assignments (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                feature_id TEXT NOT NULL REFERENCES features(id),
                scope_id TEXT NOT NULL,
                sequence INT NOT NULL DEFAULT 0,
                default_table_value_id TEXT,
                default_text_value TEXT,
                default_number_value DOUBLE PRECISION,
                min_number_value DOUBLE PRECISION,
                max_number_value DOUBLE PRECISION,
                filtered_table_value_ids JSONB NOT NULL DEFAULT '[]'::jsonb
            )"#,
            r#"CREATE UNIQUE INDEX IF NOT EXISTS assignments_uniq_key
                ON assignments (scope_id, template_id, feature_id)"#,
            r#"CREATE TABLE IF NOT EXISTS variants (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                scope_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
            r#"CREATE TABLE IF NOT EXISTS lots (
                id TEXT PRIMARY KEY,
                scope_id TEXT NOT NULL,
                name TEXT NOT NULL,
                product_id TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
            r#"CREATE TABLE IF NOT EXISTS feature_values (
                id TEXT PRIMARY KEY,
                subject_kind TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                assignment_id TEXT,
                feature_id TEXT NOT NULL REFERENCES features(id),
                scope_id TEXT NOT NULL,
                sequence INT NOT NULL DEFAULT 0,
                body JSONB NOT NULL
            )"#,
            r#"CREATE UNIQUE INDEX IF NOT EXISTS feature_values_uniq_key
                ON feature_values (scope_id, subject_kind, subject_id, feature_id)"#,
        ];

        for statement in ddl {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to run schema migration")?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a unique-index violation to the domain taxonomy; everything else
/// stays a storage error.
fn map_db_err(err: sqlx::Error, constraint_msg: &str) -> FeatureError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return FeatureError::constraint(constraint_msg);
        }
    }
    FeatureError::Storage(anyhow!(err))
}

fn kind_to_str(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Table => "table",
        ValueKind::Text => "text",
        ValueKind::Number => "number",
    }
}

fn kind_from_str(s: &str) -> Result<ValueKind> {
    match s {
        "table" => Ok(ValueKind::Table),
        "text" => Ok(ValueKind::Text),
        "number" => Ok(ValueKind::Number),
        other => Err(anyhow!("unknown value kind '{}'", other)),
    }
}

fn subject_kind_to_str(kind: SubjectKind) -> &'static str {
    match kind {
        SubjectKind::Product => "product",
        SubjectKind::Lot => "lot",
    }
}

fn subject_kind_from_str(s: &str) -> Result<SubjectKind> {
    match s {
        "product" => Ok(SubjectKind::Product),
        "lot" => Ok(SubjectKind::Lot),
        other => Err(anyhow!("unknown subject kind '{}'", other)),
    }
}

fn feature_from_row(row: &sqlx::postgres::PgRow) -> Result<FeatureDefinition> {
    let kind: String = row.get("value_kind");
    let num_decimals: i32 = row.get("num_decimals");
    Ok(FeatureDefinition {
        id: row.get("id"),
        scope_id: row.get("scope_id"),
        code: row.get("code"),
        name: row.get("name"),
        value_kind: kind_from_str(&kind)?,
        num_decimals: num_decimals.max(0) as u32,
        is_lot_feature: row.get("is_lot_feature"),
    })
}

fn table_value_from_row(row: &sqlx::postgres::PgRow) -> TableValue {
    TableValue {
        id: row.get("id"),
        feature_id: row.get("feature_id"),
        scope_id: row.get("scope_id"),
        code: row.get("code"),
        name: row.get("name"),
    }
}

fn assignment_from_row(row: &sqlx::postgres::PgRow) -> Result<FeatureAssignment> {
    let filtered: serde_json::Value = row.get("filtered_table_value_ids");
    Ok(FeatureAssignment {
        id: row.get("id"),
        template_id: row.get("template_id"),
        feature_id: row.get("feature_id"),
        scope_id: row.get("scope_id"),
        sequence: row.get("sequence"),
        default_table_value_id: row.get("default_table_value_id"),
        default_text_value: row.get("default_text_value"),
        default_number_value: row.get("default_number_value"),
        min_number_value: row.get("min_number_value"),
        max_number_value: row.get("max_number_value"),
        filtered_table_value_ids: serde_json::from_value(filtered)
            .context("Failed to decode filtered table value ids")?,
    })
}

fn value_from_row(row: &sqlx::postgres::PgRow) -> Result<FeatureValue> {
    let subject_kind: String = row.get("subject_kind");
    let body: serde_json::Value = row.get("body");
    Ok(FeatureValue {
        id: row.get("id"),
        subject_kind: subject_kind_from_str(&subject_kind)?,
        subject_id: row.get("subject_id"),
        assignment_id: row.get("assignment_id"),
        feature_id: row.get("feature_id"),
        scope_id: row.get("scope_id"),
        sequence: row.get("sequence"),
        body: serde_json::from_value::<ValueBody>(body)
            .context("Failed to decode feature value body")?,
    })
}

#[async_trait::async_trait]
impl FeatureDefinitionStore for PostgresStore {
    async fn get_feature(&self, id: &Id) -> FeatureResult<Option<FeatureDefinition>> {
        let row = sqlx::query("SELECT * FROM features WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch feature")?;
        row.map(|r| feature_from_row(&r))
            .transpose()
            .map_err(FeatureError::Storage)
    }

    async fn list_features(&self, scope_id: &Id) -> FeatureResult<Vec<FeatureDefinition>> {
        let rows = sqlx::query("SELECT * FROM features WHERE scope_id = $1 ORDER BY code, name")
            .bind(scope_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list features")?;
        rows.iter()
            .map(feature_from_row)
            .collect::<Result<Vec<_>>>()
            .map_err(FeatureError::Storage)
    }

    async fn insert_feature(&self, feature: FeatureDefinition) -> FeatureResult<()> {
        sqlx::query(
            r#"
            INSERT INTO features (id, scope_id, code, name, value_kind, num_decimals, is_lot_feature)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&feature.id)
        .bind(&feature.scope_id)
        .bind(&feature.code)
        .bind(&feature.name)
        .bind(kind_to_str(feature.value_kind))
        .bind(feature.num_decimals as i32)
        .bind(feature.is_lot_feature)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_db_err(
                e,
                "you can not have two features with the same code and name",
            )
        })?;
        Ok(())
    }

    async fn update_feature(&self, feature: FeatureDefinition) -> FeatureResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE features
            SET code = $2, name = $3, value_kind = $4, num_decimals = $5, is_lot_feature = $6
            WHERE id = $1
            "#,
        )
        .bind(&feature.id)
        .bind(&feature.code)
        .bind(&feature.name)
        .bind(kind_to_str(feature.value_kind))
        .bind(feature.num_decimals as i32)
        .bind(feature.is_lot_feature)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_db_err(
                e,
                "you can not have two features with the same code and name",
            )
        })?;
        if result.rows_affected() == 0 {
            return Err(FeatureError::not_found("feature", &feature.id));
        }
        Ok(())
    }

    async fn delete_feature(&self, id: &Id) -> FeatureResult<bool> {
        let referenced: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM assignments WHERE feature_id = $1)
                 + (SELECT COUNT(*) FROM feature_values WHERE feature_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count feature references")?;
        if referenced > 0 {
            return Err(FeatureError::validation(
                "feature is referenced by assignments or values and can not be deleted",
            ));
        }
        let result = sqlx::query("DELETE FROM features WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete feature")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl TableValueStore for PostgresStore {
    async fn get_table_value(&self, id: &Id) -> FeatureResult<Option<TableValue>> {
        let row = sqlx::query("SELECT * FROM table_values WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch table value")?;
        Ok(row.map(|r| table_value_from_row(&r)))
    }

    async fn list_table_values(&self, feature_id: &Id) -> FeatureResult<Vec<TableValue>> {
        let rows =
            sqlx::query("SELECT * FROM table_values WHERE feature_id = $1 ORDER BY code, name")
                .bind(feature_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to list table values")?;
        Ok(rows.iter().map(table_value_from_row).collect())
    }

    async fn insert_table_value(&self, value: TableValue) -> FeatureResult<()> {
        sqlx::query(
            r#"
            INSERT INTO table_values (id, feature_id, scope_id, code, name)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&value.id)
        .bind(&value.feature_id)
        .bind(&value.scope_id)
        .bind(&value.code)
        .bind(&value.name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_db_err(
                e,
                "you can not have two values with the same code and name in the feature",
            )
        })?;
        Ok(())
    }

    async fn delete_table_value(&self, id: &Id) -> FeatureResult<bool> {
        // The binding lives inside the JSONB body, so the restrict check
        // is done here rather than with a foreign key.
        let referenced: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM feature_values WHERE body->>'table_value_id' = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count table value references")?;
        if referenced > 0 {
            return Err(FeatureError::validation(
                "table value is referenced by feature values and can not be deleted",
            ));
        }
        let result = sqlx::query("DELETE FROM table_values WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete table value")?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_table_value_by_code(
        &self,
        scope_id: &Id,
        feature_id: &Id,
        code: &str,
    ) -> FeatureResult<Option<TableValue>> {
        let row = sqlx::query(
            "SELECT * FROM table_values WHERE scope_id = $1 AND feature_id = $2 AND code = $3 LIMIT 1",
        )
        .bind(scope_id)
        .bind(feature_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find table value by code")?;
        Ok(row.map(|r| table_value_from_row(&r)))
    }

    async fn find_table_value_by_name(
        &self,
        scope_id: &Id,
        feature_id: &Id,
        name: &str,
    ) -> FeatureResult<Option<TableValue>> {
        let row = sqlx::query(
            "SELECT * FROM table_values WHERE scope_id = $1 AND feature_id = $2 AND name = $3 LIMIT 1",
        )
        .bind(scope_id)
        .bind(feature_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find table value by name")?;
        Ok(row.map(|r| table_value_from_row(&r)))
    }
}

#[async_trait::async_trait]
impl AssignmentStore for PostgresStore {
    async fn get_assignment(&self, id: &Id) -> FeatureResult<Option<FeatureAssignment>> {
        let row = sqlx::query("SELECT * FROM assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch assignment")?;
        row.map(|r| assignment_from_row(&r))
            .transpose()
            .map_err(FeatureError::Storage)
    }

    async fn list_assignments_for_template(
        &self,
        template_id: &Id,
    ) -> FeatureResult<Vec<FeatureAssignment>> {
        let rows =
            sqlx::query("SELECT * FROM assignments WHERE template_id = $1 ORDER BY sequence, id")
                .bind(template_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to list assignments")?;
        rows.iter()
            .map(assignment_from_row)
            .collect::<Result<Vec<_>>>()
            .map_err(FeatureError::Storage)
    }

    async fn insert_assignment(&self, assignment: FeatureAssignment) -> FeatureResult<()> {
        let filtered = serde_json::to_value(&assignment.filtered_table_value_ids)
            .context("Failed to encode filtered table value ids")?;
        sqlx::query(
            r#"
            INSERT INTO assignments
                (id, template_id, feature_id, scope_id, sequence,
                 default_table_value_id, default_text_value, default_number_value,
                 min_number_value, max_number_value, filtered_table_value_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&assignment.id)
        .bind(&assignment.template_id)
        .bind(&assignment.feature_id)
        .bind(&assignment.scope_id)
        .bind(assignment.sequence)
        .bind(&assignment.default_table_value_id)
        .bind(&assignment.default_text_value)
        .bind(assignment.default_number_value)
        .bind(assignment.min_number_value)
        .bind(assignment.max_number_value)
        .bind(filtered)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "you can not have the same feature two times on the template"))?;
        Ok(())
    }

    async fn update_assignment(&self, assignment: FeatureAssignment) -> FeatureResult<()> {
        let filtered = serde_json::to_value(&assignment.filtered_table_value_ids)
            .context("Failed to encode filtered table value ids")?;
        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET sequence = $2, default_table_value_id = $3, default_text_value = $4,
                default_number_value = $5, min_number_value = $6, max_number_value = $7,
                filtered_table_value_ids = $8
            WHERE id = $1
            "#,
        )
        .bind(&assignment.id)
        .bind(assignment.sequence)
        .bind(&assignment.default_table_value_id)
        .bind(&assignment.default_text_value)
        .bind(assignment.default_number_value)
        .bind(assignment.min_number_value)
        .bind(assignment.max_number_value)
        .bind(filtered)
        .execute(&self.pool)
        .await
        .context("Failed to update assignment")?;
        if result.rows_affected() == 0 {
            return Err(FeatureError::not_found("assignment", &assignment.id));
        }
        Ok(())
    }

    async fn delete_assignment(&self, id: &Id) -> FeatureResult<bool> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete assignment")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        // Per-subject-kind deletion policy; can not be a single FK clause
        // because the behavior differs per value row.
        for kind in [SubjectKind::Product, SubjectKind::Lot] {
            match self.deletion_policy.for_kind(kind) {
                OnAssignmentDelete::Cascade => {
                    sqlx::query(
                        "DELETE FROM feature_values WHERE assignment_id = $1 AND subject_kind = $2",
                    )
                    .bind(id)
                    .bind(subject_kind_to_str(kind))
                    .execute(&self.pool)
                    .await
                    .context("Failed to cascade assignment values")?;
                }
                OnAssignmentDelete::Detach => {
                    sqlx::query(
                        "UPDATE feature_values SET assignment_id = NULL WHERE assignment_id = $1 AND subject_kind = $2",
                    )
                    .bind(id)
                    .bind(subject_kind_to_str(kind))
                    .execute(&self.pool)
                    .await
                    .context("Failed to detach assignment values")?;
                }
            }
        }
        Ok(true)
    }
}

#[async_trait::async_trait]
impl SubjectStore for PostgresStore {
    async fn get_template(&self, id: &Id) -> FeatureResult<Option<ProductTemplate>> {
        let row = sqlx::query("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch template")?;
        Ok(row.map(|r| ProductTemplate {
            id: r.get("id"),
            scope_id: r.get("scope_id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_templates(&self, scope_id: &Id) -> FeatureResult<Vec<ProductTemplate>> {
        let rows = sqlx::query("SELECT * FROM templates WHERE scope_id = $1 ORDER BY name")
            .bind(scope_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list templates")?;
        Ok(rows
            .iter()
            .map(|r| ProductTemplate {
                id: r.get("id"),
                scope_id: r.get("scope_id"),
                name: r.get("name"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn insert_template(&self, template: ProductTemplate) -> FeatureResult<()> {
        sqlx::query(
            "INSERT INTO templates (id, scope_id, name, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&template.id)
        .bind(&template.scope_id)
        .bind(&template.name)
        .bind(template.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert template")?;
        Ok(())
    }

    async fn delete_template(&self, id: &Id) -> FeatureResult<bool> {
        let assignment_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM assignments WHERE template_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to list template assignments")?;
        for assignment_id in &assignment_ids {
            self.delete_assignment(assignment_id).await?;
        }
        let variant_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM variants WHERE template_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to list template variants")?;
        for variant_id in &variant_ids {
            self.delete_variant(variant_id).await?;
        }
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete template")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_variant(&self, id: &Id) -> FeatureResult<Option<ProductVariant>> {
        let row = sqlx::query("SELECT * FROM variants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch variant")?;
        Ok(row.map(|r| ProductVariant {
            id: r.get("id"),
            template_id: r.get("template_id"),
            scope_id: r.get("scope_id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_variants_for_template(
        &self,
        template_id: &Id,
    ) -> FeatureResult<Vec<ProductVariant>> {
        let rows = sqlx::query("SELECT * FROM variants WHERE template_id = $1 ORDER BY name")
            .bind(template_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list variants")?;
        Ok(rows
            .iter()
            .map(|r| ProductVariant {
                id: r.get("id"),
                template_id: r.get("template_id"),
                scope_id: r.get("scope_id"),
                name: r.get("name"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn insert_variant(&self, variant: ProductVariant) -> FeatureResult<()> {
        sqlx::query(
            "INSERT INTO variants (id, template_id, scope_id, name, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&variant.id)
        .bind(&variant.template_id)
        .bind(&variant.scope_id)
        .bind(&variant.name)
        .bind(variant.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert variant")?;
        Ok(())
    }

    async fn delete_variant(&self, id: &Id) -> FeatureResult<bool> {
        sqlx::query("DELETE FROM feature_values WHERE subject_kind = 'product' AND subject_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete variant values")?;
        sqlx::query("UPDATE lots SET product_id = NULL WHERE product_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to unlink lots from variant")?;
        let result = sqlx::query("DELETE FROM variants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete variant")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_lot(&self, id: &Id) -> FeatureResult<Option<ProductionLot>> {
        let row = sqlx::query("SELECT * FROM lots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch lot")?;
        Ok(row.map(|r| ProductionLot {
            id: r.get("id"),
            scope_id: r.get("scope_id"),
            name: r.get("name"),
            product_id: r.get("product_id"),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_lots(&self, scope_id: &Id) -> FeatureResult<Vec<ProductionLot>> {
        let rows = sqlx::query("SELECT * FROM lots WHERE scope_id = $1 ORDER BY name")
            .bind(scope_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list lots")?;
        Ok(rows
            .iter()
            .map(|r| ProductionLot {
                id: r.get("id"),
                scope_id: r.get("scope_id"),
                name: r.get("name"),
                product_id: r.get("product_id"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn insert_lot(&self, lot: ProductionLot) -> FeatureResult<()> {
        sqlx::query(
            "INSERT INTO lots (id, scope_id, name, product_id, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&lot.id)
        .bind(&lot.scope_id)
        .bind(&lot.name)
        .bind(&lot.product_id)
        .bind(lot.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert lot")?;
        Ok(())
    }

    async fn update_lot(&self, lot: ProductionLot) -> FeatureResult<()> {
        let result = sqlx::query("UPDATE lots SET name = $2, product_id = $3 WHERE id = $1")
            .bind(&lot.id)
            .bind(&lot.name)
            .bind(&lot.product_id)
            .execute(&self.pool)
            .await
            .context("Failed to update lot")?;
        if result.rows_affected() == 0 {
            return Err(FeatureError::not_found("lot", &lot.id));
        }
        Ok(())
    }

    async fn delete_lot(&self, id: &Id) -> FeatureResult<bool> {
        sqlx::query("DELETE FROM feature_values WHERE subject_kind = 'lot' AND subject_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete lot values")?;
        let result = sqlx::query("DELETE FROM lots WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete lot")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl ValueStore for PostgresStore {
    async fn get_value(&self, id: &Id) -> FeatureResult<Option<FeatureValue>> {
        let row = sqlx::query("SELECT * FROM feature_values WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch feature value")?;
        row.map(|r| value_from_row(&r))
            .transpose()
            .map_err(FeatureError::Storage)
    }

    async fn list_values_for_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &Id,
    ) -> FeatureResult<Vec<FeatureValue>> {
        let rows = sqlx::query(
            "SELECT * FROM feature_values WHERE subject_kind = $1 AND subject_id = $2 ORDER BY sequence, id",
        )
        .bind(subject_kind_to_str(subject_kind))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list feature values")?;
        rows.iter()
            .map(value_from_row)
            .collect::<Result<Vec<_>>>()
            .map_err(FeatureError::Storage)
    }

    async fn list_values_for_feature(&self, feature_id: &Id) -> FeatureResult<Vec<FeatureValue>> {
        let rows = sqlx::query("SELECT * FROM feature_values WHERE feature_id = $1")
            .bind(feature_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list feature values by feature")?;
        rows.iter()
            .map(value_from_row)
            .collect::<Result<Vec<_>>>()
            .map_err(FeatureError::Storage)
    }

    async fn insert_value(&self, value: FeatureValue) -> FeatureResult<()> {
        let body = serde_json::to_value(&value.body).context("Failed to encode value body")?;
        sqlx::query(
            r#"
            INSERT INTO feature_values
                (id, subject_kind, subject_id, assignment_id, feature_id, scope_id, sequence, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&value.id)
        .bind(subject_kind_to_str(value.subject_kind))
        .bind(&value.subject_id)
        .bind(&value.assignment_id)
        .bind(&value.feature_id)
        .bind(&value.scope_id)
        .bind(value.sequence)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "you can not have more than one value for a feature"))?;
        Ok(())
    }

    async fn update_value(&self, value: FeatureValue) -> FeatureResult<()> {
        let body = serde_json::to_value(&value.body).context("Failed to encode value body")?;
        let result = sqlx::query(
            "UPDATE feature_values SET assignment_id = $2, sequence = $3, body = $4 WHERE id = $1",
        )
        .bind(&value.id)
        .bind(&value.assignment_id)
        .bind(value.sequence)
        .bind(body)
        .execute(&self.pool)
        .await
        .context("Failed to update feature value")?;
        if result.rows_affected() == 0 {
            return Err(FeatureError::not_found("feature value", &value.id));
        }
        Ok(())
    }

    async fn delete_value(&self, id: &Id) -> FeatureResult<bool> {
        let result = sqlx::query("DELETE FROM feature_values WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete feature value")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_values_for_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &Id,
    ) -> FeatureResult<usize> {
        let result =
            sqlx::query("DELETE FROM feature_values WHERE subject_kind = $1 AND subject_id = $2")
                .bind(subject_kind_to_str(subject_kind))
                .bind(subject_id)
                .execute(&self.pool)
                .await
                .context("Failed to delete subject values")?;
        Ok(result.rows_affected() as usize)
    }
}

impl Store for PostgresStore {}
