use crate::domain::{
    CarListing, ListingMedia, ListingStatus, MediaKind, Plan, Role, Subscription,
    SubscriptionStatus, User, UserStatus,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;
    async fn get_by_id(&self, id: Uuid) -> Result<User, RepositoryError>;
    async fn get_by_email(&self, email: &str) -> Result<User, RepositoryError>;
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError>;
    async fn list_by_status(&self, status: UserStatus) -> Result<Vec<User>, RepositoryError>;
    /// Overwrites the profile columns (name, phone, company, address).
    async fn update(&self, user: &User) -> Result<(), RepositoryError>;
    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, subscription: &Subscription) -> Result<(), RepositoryError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Subscription, RepositoryError>;
    async fn get_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Subscription>, RepositoryError>;
    /// Writes every mutable column in one statement so plan and limit never diverge.
    async fn update(&self, subscription: &Subscription) -> Result<(), RepositoryError>;
    /// Rows still marked active whose end date is before `today`.
    async fn list_lapsed(&self, today: NaiveDate) -> Result<Vec<Subscription>, RepositoryError>;
}

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn create(&self, listing: &CarListing) -> Result<(), RepositoryError>;
    async fn get_by_id(&self, id: Uuid) -> Result<CarListing, RepositoryError>;
    async fn list(&self) -> Result<Vec<CarListing>, RepositoryError>;
    async fn list_by_status(&self, status: ListingStatus) -> Result<Vec<CarListing>, RepositoryError>;
    async fn list_by_dealer(&self, dealer_id: Uuid) -> Result<Vec<CarListing>, RepositoryError>;
    /// Count of a dealer's listings in any status.
    async fn count_by_dealer(&self, dealer_id: Uuid) -> Result<i64, RepositoryError>;
    async fn update(&self, listing: &CarListing) -> Result<(), RepositoryError>;
    async fn update_status(&self, id: Uuid, status: ListingStatus) -> Result<(), RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn add_media(&self, media: &ListingMedia) -> Result<(), RepositoryError>;
    async fn list_media(&self, listing_id: Uuid) -> Result<Vec<ListingMedia>, RepositoryError>;
}

fn parse_enum<T: FromStr>(value: &str, what: &str) -> Result<T, RepositoryError> {
    T::from_str(value).map_err(|_| RepositoryError::InvalidData(format!("Unknown {}: {}", what, value)))
}

fn not_found(what: &str, id: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    let label = format!("{} {}", what, id);
    move |e| match e {
        sqlx::Error::RowNotFound => RepositoryError::NotFound(label),
        _ => RepositoryError::DatabaseError(e),
    }
}

fn ensure_affected(rows: u64, what: &str, id: Uuid) -> Result<(), RepositoryError> {
    if rows == 0 {
        return Err(RepositoryError::NotFound(format!("{} {}", what, id)));
    }
    Ok(())
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, name, email, phone, role, status, company_name, address, created_at, updated_at";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, role, status, company_name, address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.to_string())
        .bind(user.status.to_string())
        .bind(&user.company_name)
        .bind(&user.address)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("User", id))?;

        row_to_user(&row)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("User", email))?;

        row_to_user(&row)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .bind(role.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn list_by_status(&self, status: UserStatus) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE status = $1 ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $1, phone = $2, company_name = $3, address = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.company_name)
        .bind(&user.address)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected(), "User", user.id)
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected(), "User", id)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected(), "User", id)
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, RepositoryError> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        role: parse_enum(&role, "role")?,
        status: parse_enum(&status, "user status")?,
        company_name: row.try_get("company_name")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan, status, listing_limit, start_date, end_date, created_at, updated_at";

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn create(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, plan, status, listing_limit, start_date, end_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.user_id)
        .bind(subscription.plan.to_string())
        .bind(subscription.status.to_string())
        .bind(subscription.listing_limit)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Subscription, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Subscription", id))?;

        row_to_subscription(&row)
    }

    async fn get_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn list(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions ORDER BY created_at DESC",
            SUBSCRIPTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_subscription).collect()
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET plan = $1, status = $2, listing_limit = $3, start_date = $4, end_date = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(subscription.plan.to_string())
        .bind(subscription.status.to_string())
        .bind(subscription.listing_limit)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.updated_at)
        .bind(subscription.id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected(), "Subscription", subscription.id)
    }

    async fn list_lapsed(&self, today: NaiveDate) -> Result<Vec<Subscription>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE status = 'active' AND end_date < $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_subscription).collect()
    }
}

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Result<Subscription, RepositoryError> {
    let plan: String = row.try_get("plan")?;
    let status: String = row.try_get("status")?;

    Ok(Subscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        plan: parse_enum::<Plan>(&plan, "plan")?,
        status: parse_enum::<SubscriptionStatus>(&status, "subscription status")?,
        listing_limit: row.try_get("listing_limit")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresListingRepository {
    pool: PgPool,
}

impl PostgresListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LISTING_COLUMNS: &str = r#"
    id, dealer_id, status, registration_year, manufacturing_year, brand, model,
    transmission_type, rto_number, images, color, ownership_history, kilometers_driven,
    fuel_type, insurance_validity, insurance_type, asking_price, whatsapp_number,
    repairs_needed_audio, repairs_completed_audio, created_at, updated_at
"#;

#[async_trait]
impl ListingRepository for PostgresListingRepository {
    async fn create(&self, listing: &CarListing) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO car_listings ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
            LISTING_COLUMNS
        ))
        .bind(listing.id)
        .bind(listing.dealer_id)
        .bind(listing.status.to_string())
        .bind(&listing.registration_year)
        .bind(&listing.manufacturing_year)
        .bind(&listing.brand)
        .bind(&listing.model)
        .bind(&listing.transmission_type)
        .bind(&listing.rto_number)
        .bind(&listing.images)
        .bind(&listing.color)
        .bind(&listing.ownership_history)
        .bind(&listing.kilometers_driven)
        .bind(&listing.fuel_type)
        .bind(&listing.insurance_validity)
        .bind(&listing.insurance_type)
        .bind(&listing.asking_price)
        .bind(&listing.whatsapp_number)
        .bind(&listing.repairs_needed_audio)
        .bind(&listing.repairs_completed_audio)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<CarListing, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM car_listings WHERE id = $1",
            LISTING_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Listing", id))?;

        row_to_listing(&row)
    }

    async fn list(&self) -> Result<Vec<CarListing>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM car_listings ORDER BY created_at DESC",
            LISTING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_listing).collect()
    }

    async fn list_by_status(&self, status: ListingStatus) -> Result<Vec<CarListing>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM car_listings WHERE status = $1 ORDER BY created_at DESC",
            LISTING_COLUMNS
        ))
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_listing).collect()
    }

    async fn list_by_dealer(&self, dealer_id: Uuid) -> Result<Vec<CarListing>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM car_listings WHERE dealer_id = $1 ORDER BY created_at DESC",
            LISTING_COLUMNS
        ))
        .bind(dealer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_listing).collect()
    }

    async fn count_by_dealer(&self, dealer_id: Uuid) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM car_listings
            WHERE dealer_id = $1
            "#,
        )
        .bind(dealer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn update(&self, listing: &CarListing) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE car_listings
            SET registration_year = $1, manufacturing_year = $2, brand = $3, model = $4,
                transmission_type = $5, rto_number = $6, images = $7, color = $8,
                ownership_history = $9, kilometers_driven = $10, fuel_type = $11,
                insurance_validity = $12, insurance_type = $13, asking_price = $14,
                whatsapp_number = $15, repairs_needed_audio = $16, repairs_completed_audio = $17,
                updated_at = $18
            WHERE id = $19
            "#,
        )
        .bind(&listing.registration_year)
        .bind(&listing.manufacturing_year)
        .bind(&listing.brand)
        .bind(&listing.model)
        .bind(&listing.transmission_type)
        .bind(&listing.rto_number)
        .bind(&listing.images)
        .bind(&listing.color)
        .bind(&listing.ownership_history)
        .bind(&listing.kilometers_driven)
        .bind(&listing.fuel_type)
        .bind(&listing.insurance_validity)
        .bind(&listing.insurance_type)
        .bind(&listing.asking_price)
        .bind(&listing.whatsapp_number)
        .bind(&listing.repairs_needed_audio)
        .bind(&listing.repairs_completed_audio)
        .bind(listing.updated_at)
        .bind(listing.id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected(), "Listing", listing.id)
    }

    async fn update_status(&self, id: Uuid, status: ListingStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE car_listings
            SET status = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected(), "Listing", id)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM car_listings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected(), "Listing", id)
    }

    async fn add_media(&self, media: &ListingMedia) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO listing_media (id, listing_id, file_url, file_type, file_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(media.id)
        .bind(media.listing_id)
        .bind(&media.url)
        .bind(media.kind.to_string())
        .bind(&media.file_name)
        .bind(media.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_media(&self, listing_id: Uuid) -> Result<Vec<ListingMedia>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, listing_id, file_url, file_type, file_name, created_at
            FROM listing_media
            WHERE listing_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("file_type")?;
                Ok(ListingMedia {
                    id: row.try_get("id")?,
                    listing_id: row.try_get("listing_id")?,
                    url: row.try_get("file_url")?,
                    kind: parse_enum::<MediaKind>(&kind, "media kind")?,
                    file_name: row.try_get("file_name")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

fn row_to_listing(row: &sqlx::postgres::PgRow) -> Result<CarListing, RepositoryError> {
    let status: String = row.try_get("status")?;

    Ok(CarListing {
        id: row.try_get("id")?,
        dealer_id: row.try_get("dealer_id")?,
        status: parse_enum(&status, "listing status")?,
        registration_year: row.try_get("registration_year")?,
        manufacturing_year: row.try_get("manufacturing_year")?,
        brand: row.try_get("brand")?,
        model: row.try_get("model")?,
        transmission_type: row.try_get("transmission_type")?,
        rto_number: row.try_get("rto_number")?,
        images: row.try_get("images")?,
        color: row.try_get("color")?,
        ownership_history: row.try_get("ownership_history")?,
        kilometers_driven: row.try_get("kilometers_driven")?,
        fuel_type: row.try_get("fuel_type")?,
        insurance_validity: row.try_get("insurance_validity")?,
        insurance_type: row.try_get("insurance_type")?,
        asking_price: row.try_get("asking_price")?,
        whatsapp_number: row.try_get("whatsapp_number")?,
        repairs_needed_audio: row.try_get("repairs_needed_audio")?,
        repairs_completed_audio: row.try_get("repairs_completed_audio")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_enum_reports_unknown_values() {
        let err = parse_enum::<Plan>("gold", "plan").unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidData(ref m) if m == "Unknown plan: gold"));
        assert_eq!(parse_enum::<ListingStatus>("approved", "status").unwrap(), ListingStatus::Approved);
    }

    #[test]
    fn ensure_affected_maps_zero_rows_to_not_found() {
        let id = Uuid::new_v4();
        assert!(matches!(
            ensure_affected(0, "Listing", id),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(ensure_affected(1, "Listing", id).is_ok());
    }
}
