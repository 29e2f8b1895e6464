//! Postgres-backed store for invoices-service.

use crate::models::{
    Invoice, InvoiceFilter, InvoiceTotals, NewInvoice, NewPerson, PartyRole, Person, PersonTotal,
    PersonYearTotal,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::search;
use crate::services::store::InvoiceStore;
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Upper bound on candidate rows fetched when a product search has to be
/// folded in application code.
const PRODUCT_SEARCH_SCAN_CAP: i64 = 10_000;

const PERSON_COLUMNS: &str = "id, name, identification_number, tax_number, account_number, \
     bank_code, iban, telephone, mail, street, zip, city, country, note, hidden";

const INVOICE_COLUMNS: &str =
    "id, invoice_number, seller_id, buyer_id, issued, due_date, product, price, vat, note, hidden";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoices-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Person operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_person(&self, input: &NewPerson) -> Result<Person, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_person"])
            .start_timer();

        let person = sqlx::query_as::<_, Person>(&format!(
            r#"
            INSERT INTO persons (name, identification_number, tax_number, account_number,
                                 bank_code, iban, telephone, mail, street, zip, city, country,
                                 note, hidden)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, FALSE)
            RETURNING {PERSON_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(&input.identification_number)
        .bind(&input.tax_number)
        .bind(&input.account_number)
        .bind(&input.bank_code)
        .bind(&input.iban)
        .bind(&input.telephone)
        .bind(&input.mail)
        .bind(&input.street)
        .bind(&input.zip)
        .bind(&input.city)
        .bind(&input.country)
        .bind(&input.note)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create person: {}", e)))?;

        timer.observe_duration();

        info!(person_id = person.id, name = %person.name, "Person created");
        Ok(person)
    }

    #[instrument(skip(self))]
    async fn find_active_person(&self, id: i64) -> Result<Option<Person>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_active_person"])
            .start_timer();

        let person = sqlx::query_as::<_, Person>(&format!(
            r#"
            SELECT {PERSON_COLUMNS}
            FROM persons
            WHERE id = $1 AND hidden = FALSE
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get person: {}", e)))?;

        timer.observe_duration();

        Ok(person)
    }

    #[instrument(skip(self))]
    async fn list_active_persons(&self) -> Result<Vec<Person>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_persons"])
            .start_timer();

        let persons = sqlx::query_as::<_, Person>(&format!(
            r#"
            SELECT {PERSON_COLUMNS}
            FROM persons
            WHERE hidden = FALSE
            ORDER BY id
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list persons: {}", e)))?;

        timer.observe_duration();

        Ok(persons)
    }

    #[instrument(skip(self))]
    async fn archive_person(&self, id: i64) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["archive_person"])
            .start_timer();

        let result = sqlx::query("UPDATE persons SET hidden = TRUE WHERE id = $1 AND hidden = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to archive person: {}", e))
            })?;

        timer.observe_duration();

        let archived = result.rows_affected() > 0;
        if archived {
            info!(person_id = id, "Person archived");
        }
        Ok(archived)
    }

    #[instrument(skip(self))]
    async fn persons_by_identification(
        &self,
        identification_number: &str,
    ) -> Result<Vec<Person>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["persons_by_identification"])
            .start_timer();

        let persons = sqlx::query_as::<_, Person>(&format!(
            r#"
            SELECT {PERSON_COLUMNS}
            FROM persons
            WHERE identification_number = $1 AND hidden = FALSE
            ORDER BY id
            "#
        ))
        .bind(identification_number)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to look up identification: {}", e))
        })?;

        timer.observe_duration();

        Ok(persons)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn persons_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Person>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["persons_by_ids"])
            .start_timer();

        let persons = sqlx::query_as::<_, Person>(&format!(
            r#"
            SELECT {PERSON_COLUMNS}
            FROM persons
            WHERE id = ANY($1)
            "#
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to batch persons: {}", e)))?;

        timer.observe_duration();

        Ok(persons.into_iter().map(|p| (p.id, p)).collect())
    }

    // -------------------------------------------------------------------------
    // Invoice operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(invoice_number = %input.invoice_number))]
    async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (invoice_number, seller_id, buyer_id, issued, due_date,
                                  product, price, vat, note, hidden)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(&input.invoice_number)
        .bind(input.seller_id)
        .bind(input.buyer_id)
        .bind(input.issued)
        .bind(input.due_date)
        .bind(&input.product)
        .bind(input.price)
        .bind(input.vat)
        .bind(&input.note)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::bad_request("Unknown seller or buyer reference")
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        timer.observe_duration();

        info!(
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn find_active_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_active_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE id = $1 AND hidden = FALSE
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Pushes every SQL-expressible predicate into the query; the product
    /// search, which needs diacritic folding, is applied to the fetched
    /// candidates afterwards.
    #[instrument(skip(self, filter))]
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let needs_fold = filter.product_search.is_some();
        let sql_limit: Option<i64> = if needs_fold {
            Some(PRODUCT_SEARCH_SCAN_CAP)
        } else {
            filter.limit.map(|n| n as i64)
        };

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices i
            WHERE hidden = FALSE
              AND ($1::BIGINT IS NULL OR buyer_id = $1)
              AND ($2::BIGINT IS NULL OR seller_id = $2)
              AND ($3::TEXT IS NULL OR product = $3)
              AND ($4::TEXT IS NULL OR EXISTS (
                    SELECT 1 FROM persons p
                    WHERE p.id = i.buyer_id
                      AND p.identification_number LIKE '%' || $4 || '%' ESCAPE '!'))
              AND ($5::TEXT IS NULL OR EXISTS (
                    SELECT 1 FROM persons p
                    WHERE p.id = i.seller_id
                      AND p.identification_number LIKE '%' || $5 || '%' ESCAPE '!'))
              AND ($6::NUMERIC IS NULL OR price >= $6)
              AND ($7::NUMERIC IS NULL OR price <= $7)
            ORDER BY id
            LIMIT $8
            "#
        ))
        .bind(filter.buyer_id)
        .bind(filter.seller_id)
        .bind(&filter.product)
        .bind(filter.buyer_ic.as_deref().map(search::escape_like))
        .bind(filter.seller_ic.as_deref().map(search::escape_like))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(sql_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        if !needs_fold {
            return Ok(invoices);
        }

        if invoices.len() as i64 == PRODUCT_SEARCH_SCAN_CAP {
            warn!(
                cap = PRODUCT_SEARCH_SCAN_CAP,
                "Product search candidate scan hit its cap; results may be truncated"
            );
        }

        let mut matched: Vec<Invoice> = invoices
            .into_iter()
            .filter(|invoice| search::matches_product_search(filter, &invoice.product))
            .collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    #[instrument(skip(self))]
    async fn list_archived_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_archived_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE hidden = TRUE
            ORDER BY id
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list archived invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn archive_invoice(&self, id: i64) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["archive_invoice"])
            .start_timer();

        let result =
            sqlx::query("UPDATE invoices SET hidden = TRUE WHERE id = $1 AND hidden = FALSE")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to archive invoice: {}", e))
                })?;

        timer.observe_duration();

        let archived = result.rows_affected() > 0;
        if archived {
            info!(invoice_id = id, "Invoice archived");
        }
        Ok(archived)
    }

    #[instrument(skip(self))]
    async fn unarchive_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["unarchive_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET hidden = FALSE
            WHERE id = $1 AND hidden = TRUE
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to restore invoice: {}", e))
        })?;

        timer.observe_duration();

        if let Some(restored) = &invoice {
            info!(invoice_id = restored.id, "Invoice restored from archive");
        }
        Ok(invoice)
    }

    #[instrument(skip(self, seller_ids, buyer_ids))]
    async fn invoices_by_party(
        &self,
        seller_ids: &[i64],
        buyer_ids: &[i64],
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoices_by_party"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE hidden = FALSE
              AND (seller_id = ANY($1) OR buyer_id = ANY($2))
            ORDER BY id
            "#
        ))
        .bind(seller_ids)
        .bind(buyer_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices by party: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn distinct_products(&self) -> Result<Vec<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["distinct_products"])
            .start_timer();

        let products = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT product FROM invoices WHERE hidden = FALSE ORDER BY product",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    // -------------------------------------------------------------------------
    // Aggregate operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn invoice_statistics(
        &self,
        include_archived: bool,
        current_year: i32,
    ) -> Result<InvoiceTotals, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_statistics"])
            .start_timer();

        let totals = sqlx::query_as::<_, InvoiceTotals>(
            r#"
            SELECT
                COALESCE(SUM(price) FILTER (WHERE EXTRACT(YEAR FROM issued)::INT >= $2), 0)
                    AS current_year_sum,
                COALESCE(SUM(price), 0) AS all_time_sum,
                COUNT(*) AS invoices_count
            FROM invoices
            WHERE ($1::BOOLEAN OR hidden = FALSE)
            "#,
        )
        .bind(include_archived)
        .bind(current_year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute statistics: {}", e))
        })?;

        timer.observe_duration();

        Ok(totals)
    }

    #[instrument(skip(self))]
    async fn revenue_by_seller(&self) -> Result<Vec<PersonTotal>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["revenue_by_seller"])
            .start_timer();

        let totals = sqlx::query_as::<_, PersonTotal>(
            r#"
            SELECT seller_id AS person_id, SUM(price) AS total
            FROM invoices
            WHERE hidden = FALSE
            GROUP BY seller_id
            ORDER BY seller_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute revenue: {}", e))
        })?;

        timer.observe_duration();

        Ok(totals)
    }

    #[instrument(skip(self))]
    async fn totals_by_party_and_year(
        &self,
        role: PartyRole,
        first_year: i32,
        last_year: i32,
    ) -> Result<Vec<PersonYearTotal>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["totals_by_party_and_year"])
            .start_timer();

        let sql = match role {
            PartyRole::Seller => {
                r#"
                SELECT seller_id AS person_id, EXTRACT(YEAR FROM issued)::INT AS year,
                       SUM(price) AS total
                FROM invoices
                WHERE hidden = FALSE
                  AND EXTRACT(YEAR FROM issued)::INT BETWEEN $1 AND $2
                GROUP BY seller_id, EXTRACT(YEAR FROM issued)
                ORDER BY person_id, year
                "#
            }
            PartyRole::Buyer => {
                r#"
                SELECT buyer_id AS person_id, EXTRACT(YEAR FROM issued)::INT AS year,
                       SUM(price) AS total
                FROM invoices
                WHERE hidden = FALSE
                  AND EXTRACT(YEAR FROM issued)::INT BETWEEN $1 AND $2
                GROUP BY buyer_id, EXTRACT(YEAR FROM issued)
                ORDER BY person_id, year
                "#
            }
        };

        let totals = sqlx::query_as::<_, PersonYearTotal>(sql)
            .bind(first_year)
            .bind(last_year)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to compute yearly totals: {}", e))
            })?;

        timer.observe_duration();

        Ok(totals)
    }
}
