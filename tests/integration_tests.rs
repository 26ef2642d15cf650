//! Integration tests for dealer-market
//! Covers dealer onboarding, the listing quota gate, listing review, search and
//! subscription administration against in-memory repositories.

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use dealer_market::{
    application::{
        AccountError, AccountService, DefaultSubscription, ListingError, ListingService,
        Registration, SubscriptionError, SubscriptionService,
    },
    domain::{
        Actor, CarListing, ListingDraft, ListingFilters, ListingMedia, ListingScope,
        ListingStatus, ListingUpdate, MediaKind, Plan, QuotaPolicy, Role, Subscription,
        SubscriptionStatus, User, UserStatus, ValidationRules,
    },
    infrastructure::{
        ListingRepository, MediaError, MediaStorage, RepositoryError, Session, SessionError,
        SessionGateway, SubscriptionRepository, UserRepository,
    },
};
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ============================================================================
// Mock Repositories for Testing
// ============================================================================

/// In-memory mock implementation of UserRepository
#[derive(Clone, Default)]
struct MockUserRepository {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.id) {
            return Err(RepositoryError::InvalidData("User already exists".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, RepositoryError> {
        self.users
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("User {}", id)))
    }

    async fn get_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("User {}", email)))
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by_key(|u| std::cmp::Reverse(u.created_at));
        Ok(users)
    }

    async fn list_by_status(&self, status: UserStatus) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.status == status)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("User {}", user.id)))?;
        stored.name = user.name.clone();
        stored.phone = user.phone.clone();
        stored.company_name = user.company_name.clone();
        stored.address = user.address.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("User {}", id)))?;
        user.status = status;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.users
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("User {}", id)))
    }
}

/// In-memory mock implementation of SubscriptionRepository
#[derive(Clone, Default)]
struct MockSubscriptionRepository {
    subscriptions: Arc<Mutex<HashMap<Uuid, Subscription>>>,
}

impl MockSubscriptionRepository {
    fn insert(&self, sub: Subscription) {
        self.subscriptions.lock().unwrap().insert(sub.id, sub);
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptionRepository {
    async fn create(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        self.insert(subscription.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Subscription, RepositoryError> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Subscription {}", id)))
    }

    async fn get_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, RepositoryError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let mut subs: Vec<Subscription> =
            self.subscriptions.lock().unwrap().values().cloned().collect();
        subs.sort_by_key(|s| std::cmp::Reverse(s.created_at));
        Ok(subs)
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        let mut subs = self.subscriptions.lock().unwrap();
        if !subs.contains_key(&subscription.id) {
            return Err(RepositoryError::NotFound(format!(
                "Subscription {}",
                subscription.id
            )));
        }
        subs.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn list_lapsed(&self, today: NaiveDate) -> Result<Vec<Subscription>, RepositoryError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == SubscriptionStatus::Active && s.end_date < today)
            .cloned()
            .collect())
    }
}

/// In-memory mock implementation of ListingRepository
#[derive(Clone, Default)]
struct MockListingRepository {
    listings: Arc<Mutex<HashMap<Uuid, CarListing>>>,
    media: Arc<Mutex<Vec<ListingMedia>>>,
    fail_media: bool,
}

impl MockListingRepository {
    fn failing_media() -> Self {
        Self {
            fail_media: true,
            ..Default::default()
        }
    }

    fn count(&self) -> usize {
        self.listings.lock().unwrap().len()
    }
}

#[async_trait]
impl ListingRepository for MockListingRepository {
    async fn create(&self, listing: &CarListing) -> Result<(), RepositoryError> {
        self.listings
            .lock()
            .unwrap()
            .insert(listing.id, listing.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<CarListing, RepositoryError> {
        self.listings
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Listing {}", id)))
    }

    async fn list(&self) -> Result<Vec<CarListing>, RepositoryError> {
        let mut listings: Vec<CarListing> =
            self.listings.lock().unwrap().values().cloned().collect();
        listings.sort_by_key(|l| std::cmp::Reverse(l.created_at));
        Ok(listings)
    }

    async fn list_by_status(&self, status: ListingStatus) -> Result<Vec<CarListing>, RepositoryError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|l| l.status == status)
            .collect())
    }

    async fn list_by_dealer(&self, dealer_id: Uuid) -> Result<Vec<CarListing>, RepositoryError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|l| l.dealer_id == dealer_id)
            .collect())
    }

    async fn count_by_dealer(&self, dealer_id: Uuid) -> Result<i64, RepositoryError> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.dealer_id == dealer_id)
            .count() as i64)
    }

    async fn update(&self, listing: &CarListing) -> Result<(), RepositoryError> {
        let mut listings = self.listings.lock().unwrap();
        if !listings.contains_key(&listing.id) {
            return Err(RepositoryError::NotFound(format!("Listing {}", listing.id)));
        }
        listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: ListingStatus) -> Result<(), RepositoryError> {
        let mut listings = self.listings.lock().unwrap();
        let listing = listings
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Listing {}", id)))?;
        listing.status = status;
        listing.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.listings
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("Listing {}", id)))
    }

    async fn add_media(&self, media: &ListingMedia) -> Result<(), RepositoryError> {
        if self.fail_media {
            return Err(RepositoryError::InvalidData("media table unavailable".to_string()));
        }
        self.media.lock().unwrap().push(media.clone());
        Ok(())
    }

    async fn list_media(&self, listing_id: Uuid) -> Result<Vec<ListingMedia>, RepositoryError> {
        Ok(self
            .media
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.listing_id == listing_id)
            .cloned()
            .collect())
    }
}

/// Session gateway backed by the mock user table; passwords kept in clear for tests.
#[derive(Clone, Default)]
struct MockSessionGateway {
    users: MockUserRepository,
    passwords: Arc<Mutex<HashMap<String, (Uuid, String)>>>,
    tokens: Arc<Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>>,
}

impl MockSessionGateway {
    fn insert_session(&self, token: &str, user_id: Uuid, expires_at: DateTime<Utc>) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), (user_id, expires_at));
    }
}

#[async_trait]
impl SessionGateway for MockSessionGateway {
    async fn sign_up(&self, user: &User, password: &str) -> Result<(), SessionError> {
        let mut passwords = self.passwords.lock().unwrap();
        if passwords.contains_key(&user.email) {
            return Err(SessionError::EmailTaken);
        }
        self.users
            .users
            .lock()
            .unwrap()
            .insert(user.id, user.clone());
        passwords.insert(user.email.clone(), (user.id, password.to_string()));
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let user_id = match self.passwords.lock().unwrap().get(email) {
            Some((id, stored)) if stored == password => *id,
            _ => return Err(SessionError::InvalidCredentials),
        };
        let user = self
            .users
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or(SessionError::InvalidCredentials)?;
        let token = Uuid::new_v4().to_string();
        self.insert_session(&token, user_id, Utc::now() + Duration::days(30));
        Ok(Session { token, user })
    }

    async fn current_user(&self, token: &str) -> Result<Option<User>, SessionError> {
        let user_id = match self.tokens.lock().unwrap().get(token).copied() {
            Some((id, expires_at)) if expires_at > Utc::now() => id,
            _ => return Ok(None),
        };
        Ok(self.users.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn sign_out(&self, token: &str) -> Result<(), SessionError> {
        self.tokens.lock().unwrap().remove(token);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let now = Utc::now();
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, (_, expires_at)| *expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }
}

mock! {
    pub Media {}

    #[async_trait]
    impl MediaStorage for Media {
        async fn upload(
            &self,
            bytes: Vec<u8>,
            path: &str,
            content_type: &str,
        ) -> Result<String, MediaError>;
    }
}

// ============================================================================
// Fixtures
// ============================================================================

type Accounts =
    AccountService<MockUserRepository, MockSubscriptionRepository, MockListingRepository, MockSessionGateway>;
type Listings = ListingService<MockListingRepository, MockSubscriptionRepository, MockMedia>;
type Subscriptions = SubscriptionService<MockSubscriptionRepository, MockUserRepository>;

struct Market {
    users: Arc<MockUserRepository>,
    subscriptions: Arc<MockSubscriptionRepository>,
    listings: Arc<MockListingRepository>,
    sessions: MockSessionGateway,
    accounts: Accounts,
    listing_service: Listings,
    subscription_service: Subscriptions,
    admin: Actor,
}

fn market_with(listing_repo: MockListingRepository, media: MockMedia, policy: QuotaPolicy) -> Market {
    let sessions = MockSessionGateway::default();
    let users = Arc::new(sessions.users.clone());
    let subscriptions = Arc::new(MockSubscriptionRepository::default());
    let listings = Arc::new(listing_repo);

    let mut admin = User::register("Admin".into(), "admin@example.com".into(), "9000000000".into());
    admin.role = Role::Admin;
    admin.status = UserStatus::Active;
    users.users.lock().unwrap().insert(admin.id, admin.clone());

    let accounts = AccountService::new(
        users.clone(),
        subscriptions.clone(),
        listings.clone(),
        Arc::new(sessions.clone()),
        DefaultSubscription::default(),
    );
    let listing_service = ListingService::new(
        listings.clone(),
        subscriptions.clone(),
        Arc::new(media),
        policy,
        ValidationRules::default(),
    );
    let subscription_service = SubscriptionService::new(subscriptions.clone(), users.clone());

    Market {
        users,
        subscriptions,
        listings,
        sessions,
        accounts,
        listing_service,
        subscription_service,
        admin: Actor::from(&admin),
    }
}

fn market() -> Market {
    market_with(
        MockListingRepository::default(),
        MockMedia::new(),
        QuotaPolicy::default(),
    )
}

fn registration(email: &str) -> Registration {
    Registration {
        name: "Asha Patil".into(),
        email: email.into(),
        phone: "9960456992".into(),
        password: "hunter22".into(),
    }
}

/// Registers and approves a dealer, returning them as an actor.
async fn approved_dealer(market: &Market, email: &str) -> Actor {
    let user = market
        .accounts
        .register(registration(email))
        .await
        .expect("Failed to register");
    let dealer = market
        .accounts
        .approve_user(&market.admin, user.id)
        .await
        .expect("Failed to approve");
    Actor::from(&dealer.user)
}

fn draft() -> ListingDraft {
    ListingDraft {
        dealer_id: None,
        registration_year: "2019".into(),
        manufacturing_year: "2018".into(),
        brand: "Honda".into(),
        model: "City".into(),
        transmission_type: "Manual".into(),
        rto_number: "MH12AB1234".into(),
        images: vec!["https://cdn.example.com/front.jpg".into()],
        color: "White".into(),
        ownership_history: "First".into(),
        kilometers_driven: "42000".into(),
        fuel_type: "Petrol".into(),
        insurance_validity: "2025-03-01".into(),
        insurance_type: "Comprehensive".into(),
        asking_price: "650000".into(),
        whatsapp_number: "9960456992".into(),
        repairs_needed_audio: None,
        repairs_completed_audio: None,
    }
}

fn draft_for(brand: &str, price: &str) -> ListingDraft {
    ListingDraft {
        brand: brand.into(),
        asking_price: price.into(),
        ..draft()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ============================================================================
// Test Cases
// ============================================================================

#[tokio::test]
async fn test_dealer_onboarding_provisions_basic_subscription() {
    let market = market();

    let user = market
        .accounts
        .register(registration("Asha@Example.com"))
        .await
        .expect("Failed to register");
    assert_eq!(user.status, UserStatus::Pending);
    assert_eq!(user.role, Role::Dealer);
    assert_eq!(user.email, "asha@example.com");

    let pending = market
        .accounts
        .pending_users(&market.admin)
        .await
        .expect("Failed to list pending");
    assert_eq!(pending.len(), 1);

    // Pending dealers cannot submit yet
    let err = market
        .listing_service
        .submit(&Actor::from(&user), draft())
        .await
        .unwrap_err();
    assert!(matches!(err, ListingError::Unauthorized(_)));

    let dealer = market
        .accounts
        .approve_user(&market.admin, user.id)
        .await
        .expect("Failed to approve");
    assert_eq!(dealer.user.status, UserStatus::Active);
    let sub = dealer.subscription.expect("subscription provisioned");
    assert_eq!(sub.plan, Plan::Basic);
    assert_eq!(sub.listing_limit, 15);
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.remaining_days(today()), 30);

    let again = market.accounts.approve_user(&market.admin, user.id).await;
    assert!(matches!(again, Err(AccountError::InvalidState(_))));
    assert_eq!(market.subscriptions.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_registration_and_bad_fields() {
    let market = market();
    market
        .accounts
        .register(registration("dup@example.com"))
        .await
        .expect("Failed to register");

    let dup = market.accounts.register(registration("dup@example.com")).await;
    assert!(matches!(dup, Err(AccountError::Session(SessionError::EmailTaken))));

    let bad = market
        .accounts
        .register(Registration {
            password: "123".into(),
            ..registration("other@example.com")
        })
        .await;
    match bad {
        Err(AccountError::Validation(fields)) => assert!(fields.contains_key("password")),
        other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
    }
}

#[tokio::test]
async fn test_sixteenth_listing_on_basic_plan_is_refused() {
    let market = market();
    let dealer = approved_dealer(&market, "quota@example.com").await;

    for i in 0..15 {
        market
            .listing_service
            .submit(&dealer, draft_for("Honda", &format!("{}", 500000 + i)))
            .await
            .unwrap_or_else(|e| panic!("listing {} refused: {}", i + 1, e));
    }

    let err = market
        .listing_service
        .submit(&dealer, draft())
        .await
        .unwrap_err();
    match &err {
        ListingError::QuotaExceeded { limit, used } => {
            assert_eq!((*limit, *used), (15, 15));
        }
        other => panic!("expected quota error, got {}", other),
    }
    assert_eq!(
        err.to_string(),
        "Listing limit reached: you have used 15 of 15 listings, contact admin to upgrade"
    );
    assert_eq!(market.listings.count(), 15);

    let quota = market.listing_service.quota(&dealer).await.unwrap();
    assert!(!quota.allowed);
    assert_eq!(quota.remaining(), 0);
}

#[tokio::test]
async fn test_plan_change_lifts_quota() {
    let market = market();
    let dealer = approved_dealer(&market, "upgrade@example.com").await;
    let sub = market
        .subscription_service
        .for_user(&dealer, dealer.id)
        .await
        .unwrap()
        .expect("subscription");

    let upgraded = market
        .subscription_service
        .change_plan(&market.admin, sub.id, Plan::Enterprise)
        .await
        .expect("Failed to change plan");
    assert_eq!(upgraded.plan, Plan::Enterprise);
    assert_eq!(upgraded.listing_limit, 100);

    let stored = market.subscriptions.get_by_id(sub.id).await.unwrap();
    assert_eq!((stored.plan, stored.listing_limit), (Plan::Enterprise, 100));

    let quota = market.listing_service.quota(&dealer).await.unwrap();
    assert_eq!(quota.limit, 100);
    assert!(quota.allowed);
}

#[tokio::test]
async fn test_dealer_without_subscription_uses_fallback() {
    let strict = market();
    let user = strict
        .accounts
        .register(registration("nosub@example.com"))
        .await
        .unwrap();
    strict
        .users
        .update_status(user.id, UserStatus::Active)
        .await
        .unwrap();
    let mut dealer = Actor::from(&user);
    dealer.status = UserStatus::Active;

    let err = strict.listing_service.submit(&dealer, draft()).await.unwrap_err();
    assert!(matches!(err, ListingError::QuotaExceeded { limit: 0, used: 0 }));

    let demo = market_with(
        MockListingRepository::default(),
        MockMedia::new(),
        QuotaPolicy {
            fallback_limit: 10,
            ..Default::default()
        },
    );
    let user = demo
        .accounts
        .register(registration("demo@example.com"))
        .await
        .unwrap();
    let mut dealer = Actor::from(&user);
    dealer.status = UserStatus::Active;
    assert!(demo.listing_service.submit(&dealer, draft()).await.is_ok());
}

#[tokio::test]
async fn test_invalid_draft_creates_nothing() {
    let market = market();
    let dealer = approved_dealer(&market, "invalid@example.com").await;

    let mut no_images = draft();
    no_images.images.clear();
    no_images.whatsapp_number = "12345".into();

    match market.listing_service.submit(&dealer, no_images).await {
        Err(ListingError::Validation(fields)) => {
            assert_eq!(fields["images"], "At least one image is required");
            assert!(fields.contains_key("whatsapp_number"));
        }
        other => panic!("expected validation error, got {:?}", other.map(|l| l.id)),
    }
    assert_eq!(market.listings.count(), 0);

    let mut foreign = draft();
    foreign.dealer_id = Some(Uuid::new_v4());
    let err = market.listing_service.submit(&dealer, foreign).await.unwrap_err();
    assert!(matches!(err, ListingError::Unauthorized(_)));
}

#[tokio::test]
async fn test_review_and_visibility() {
    let market = market();
    let owner = approved_dealer(&market, "owner@example.com").await;
    let other = approved_dealer(&market, "other@example.com").await;

    let listing = market.listing_service.submit(&owner, draft()).await.unwrap();
    assert_eq!(listing.status, ListingStatus::Pending);

    // Pending listings are hidden from other dealers
    let hidden = market.listing_service.get(&other, listing.id).await;
    assert!(matches!(hidden, Err(ListingError::Unauthorized(_))));
    assert!(market.listing_service.get(&owner, listing.id).await.is_ok());

    // Dealers cannot review, even their own listing
    let self_review = market.listing_service.approve(&owner, listing.id).await;
    assert!(matches!(self_review, Err(ListingError::Unauthorized(_))));

    let approved = market
        .listing_service
        .approve(&market.admin, listing.id)
        .await
        .expect("Failed to approve");
    assert_eq!(approved.status, ListingStatus::Approved);

    let seen = market.listing_service.get(&other, listing.id).await.unwrap();
    assert_eq!(seen.status, ListingStatus::Approved);

    // Non-owner still cannot edit or delete
    let edit = market
        .listing_service
        .update(&other, listing.id, ListingUpdate::default())
        .await;
    assert!(matches!(edit, Err(ListingError::Unauthorized(_))));
    let delete = market.listing_service.delete(&other, listing.id).await;
    assert!(matches!(delete, Err(ListingError::Unauthorized(_))));

    // Reviewed listings cannot be reviewed again
    match market.listing_service.reject(&market.admin, listing.id).await {
        Err(ListingError::IllegalTransition(t)) => {
            assert_eq!(t.from, ListingStatus::Approved);
            assert_eq!(t.to, ListingStatus::Rejected);
        }
        other => panic!("expected illegal transition, got {:?}", other.map(|l| l.status)),
    }

    let missing = market.listing_service.get(&owner, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(ListingError::NotFound(_))));
}

#[tokio::test]
async fn test_rejected_listings_keep_consuming_quota() {
    let market = market();
    let dealer = approved_dealer(&market, "rejected@example.com").await;

    let listing = market.listing_service.submit(&dealer, draft()).await.unwrap();
    market
        .listing_service
        .reject(&market.admin, listing.id)
        .await
        .unwrap();

    let quota = market.listing_service.quota(&dealer).await.unwrap();
    assert_eq!(quota.used, 1);
    assert_eq!(quota.remaining(), 14);
}

#[tokio::test]
async fn test_marketplace_search_with_filters() {
    let market = market();
    let dealer = approved_dealer(&market, "search@example.com").await;
    let viewer = approved_dealer(&market, "viewer@example.com").await;

    let mut ids = Vec::new();
    for (brand, price) in [
        ("Honda", "650000"),
        ("honda", "950000"),
        ("Hyundai", "700000"),
        ("HONDA CITY", "500000"),
    ] {
        let listing = market
            .listing_service
            .submit(&dealer, draft_for(brand, price))
            .await
            .unwrap();
        market
            .listing_service
            .approve(&market.admin, listing.id)
            .await
            .unwrap();
        ids.push(listing.id);
    }
    // Still pending, so invisible in the marketplace
    market
        .listing_service
        .submit(&dealer, draft_for("Honda", "600000"))
        .await
        .unwrap();

    let filters = ListingFilters {
        brand: "honda".into(),
        min_price: "500000".into(),
        max_price: "900000".into(),
        ..Default::default()
    };
    let found = market
        .listing_service
        .list(&viewer, ListingScope::Marketplace, &filters)
        .await
        .unwrap();
    let mut prices: Vec<&str> = found.iter().map(|l| l.asking_price.as_str()).collect();
    prices.sort();
    assert_eq!(prices, vec!["500000", "650000"]);

    let mine = market
        .listing_service
        .list(&dealer, ListingScope::Mine, &ListingFilters::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 5);

    let denied = market
        .listing_service
        .list(&viewer, ListingScope::All, &ListingFilters::default())
        .await;
    assert!(matches!(denied, Err(ListingError::Unauthorized(_))));

    let pending_tab = ListingFilters {
        status: Some(ListingStatus::Pending),
        ..Default::default()
    };
    let pending = market
        .listing_service
        .list(&market.admin, ListingScope::All, &pending_tab)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let brands = market
        .listing_service
        .field_options(&viewer, ListingScope::Marketplace, dealer_market::domain::ListingField::Brand)
        .await
        .unwrap();
    assert_eq!(brands, vec!["HONDA CITY", "Honda", "Hyundai", "honda"]);
}

#[tokio::test]
async fn test_owner_edit_revalidates_and_keeps_status() {
    let market = market();
    let dealer = approved_dealer(&market, "edit@example.com").await;
    let listing = market.listing_service.submit(&dealer, draft()).await.unwrap();
    market
        .listing_service
        .approve(&market.admin, listing.id)
        .await
        .unwrap();

    let updated = market
        .listing_service
        .update(
            &dealer,
            listing.id,
            ListingUpdate {
                asking_price: Some("700000".into()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update");
    assert_eq!(updated.asking_price, "700000");
    assert_eq!(updated.status, ListingStatus::Approved);

    let invalid = market
        .listing_service
        .update(
            &dealer,
            listing.id,
            ListingUpdate {
                images: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(invalid, Err(ListingError::Validation(_))));

    market
        .listing_service
        .delete(&dealer, listing.id)
        .await
        .expect("Failed to delete");
    assert_eq!(market.listings.count(), 0);
}

#[tokio::test]
async fn test_media_rows_attached_and_failures_do_not_roll_back() {
    let market = market();
    let dealer = approved_dealer(&market, "media@example.com").await;
    let mut with_audio = draft();
    with_audio.images.push("https://cdn.example.com/back.jpg".into());
    with_audio.repairs_needed_audio = Some("https://cdn.example.com/needed.m4a".into());

    let listing = market.listing_service.submit(&dealer, with_audio).await.unwrap();
    let media = market
        .listing_service
        .media(&dealer, listing.id)
        .await
        .unwrap();
    assert_eq!(media.len(), 3);
    assert_eq!(
        media.iter().filter(|m| m.kind == MediaKind::Image).count(),
        2
    );

    let failing = market_with(
        MockListingRepository::failing_media(),
        MockMedia::new(),
        QuotaPolicy::default(),
    );
    let dealer = approved_dealer(&failing, "media2@example.com").await;
    let listing = failing
        .listing_service
        .submit(&dealer, draft())
        .await
        .expect("listing survives media failure");
    assert!(failing.listings.get_by_id(listing.id).await.is_ok());
}

#[tokio::test]
async fn test_uploads_go_to_dealer_paths() {
    let mut media = MockMedia::new();
    media
        .expect_upload()
        .withf(|bytes, path, content_type| {
            !bytes.is_empty() && path.ends_with("/front.jpg") && content_type.starts_with("image/jpeg")
        })
        .times(1)
        .returning(|_, path, _| Ok(format!("https://cdn.example.com/{}", path)));
    media
        .expect_upload()
        .withf(|_, path, content_type| {
            path.ends_with("/audio_repairs_completed.m4a") && content_type.starts_with("audio/m4a")
        })
        .times(1)
        .returning(|_, path, _| Ok(format!("https://cdn.example.com/{}", path)));

    let market = market_with(MockListingRepository::default(), media, QuotaPolicy::default());
    let dealer = approved_dealer(&market, "upload@example.com").await;

    let url = market
        .listing_service
        .upload_image(&dealer, vec![0xFF, 0xD8], "front.jpg", "image/jpeg")
        .await
        .expect("Failed to upload");
    assert_eq!(url, format!("https://cdn.example.com/{}/front.jpg", dealer.id));

    let listing = market.listing_service.submit(&dealer, draft()).await.unwrap();
    let with_audio = market
        .listing_service
        .attach_audio(&dealer, listing.id, MediaKind::AudioRepairsCompleted, vec![1, 2, 3])
        .await
        .expect("Failed to attach audio");
    assert_eq!(
        with_audio.repairs_completed_audio,
        Some(format!(
            "https://cdn.example.com/{}/{}/audio_repairs_completed.m4a",
            dealer.id, listing.id
        ))
    );

    let wrong_kind = market
        .listing_service
        .attach_audio(&dealer, listing.id, MediaKind::Image, vec![1])
        .await;
    assert!(matches!(wrong_kind, Err(ListingError::Validation(_))));
}

#[tokio::test]
async fn test_media_store_failure_surfaces() {
    let mut media = MockMedia::new();
    media
        .expect_upload()
        .returning(|_, _, _| Err(MediaError::RateLimited));

    let market = market_with(MockListingRepository::default(), media, QuotaPolicy::default());
    let dealer = approved_dealer(&market, "ratelimit@example.com").await;
    let err = market
        .listing_service
        .upload_image(&dealer, vec![1], "a.jpg", "image/jpeg")
        .await
        .unwrap_err();
    assert!(matches!(err, ListingError::Media(MediaError::RateLimited)));
}

#[tokio::test]
async fn test_subscription_administration() {
    let market = market();
    let dealer = approved_dealer(&market, "subs@example.com").await;
    let sub = market
        .subscription_service
        .for_user(&market.admin, dealer.id)
        .await
        .unwrap()
        .unwrap();

    let extended = market
        .subscription_service
        .extend(&market.admin, sub.id, 30)
        .await
        .unwrap();
    assert_eq!(extended.end_date, sub.end_date.checked_add_days(Days::new(30)).unwrap());

    let inactive = market
        .subscription_service
        .deactivate(&market.admin, sub.id)
        .await
        .unwrap();
    assert_eq!(inactive.status, SubscriptionStatus::Inactive);
    assert!(!inactive.is_active(today()));

    let active = market
        .subscription_service
        .activate(&market.admin, sub.id)
        .await
        .unwrap();
    assert!(active.is_active(today()));

    // Already subscribed until cancelled
    let dup = market
        .subscription_service
        .assign(&market.admin, dealer.id, Plan::Premium, 30)
        .await;
    assert!(matches!(dup, Err(SubscriptionError::AlreadySubscribed(_))));

    market
        .subscription_service
        .cancel(&market.admin, sub.id)
        .await
        .unwrap();
    let fresh = market
        .subscription_service
        .assign(&market.admin, dealer.id, Plan::Premium, 30)
        .await
        .expect("Failed to assign after cancel");
    assert_eq!(fresh.listing_limit, 50);

    // Dealers manage nothing and only read their own record
    let forbidden = market
        .subscription_service
        .extend(&dealer, sub.id, 30)
        .await;
    assert!(matches!(forbidden, Err(SubscriptionError::Unauthorized(_))));
    let other = approved_dealer(&market, "nosy@example.com").await;
    let nosy = market.subscription_service.for_user(&other, dealer.id).await;
    assert!(matches!(nosy, Err(SubscriptionError::Unauthorized(_))));

    let zero = market
        .subscription_service
        .extend(&market.admin, sub.id, 0)
        .await;
    assert!(matches!(zero, Err(SubscriptionError::InvalidInput(_))));

    let missing = market
        .subscription_service
        .activate(&market.admin, Uuid::new_v4())
        .await;
    assert!(matches!(missing, Err(SubscriptionError::NotFound(_))));
}

#[tokio::test]
async fn test_sweep_expires_lapsed_subscriptions() {
    let market = market();
    let now = today();
    let lapsed = Subscription::provision(
        Uuid::new_v4(),
        Plan::Basic,
        now.checked_sub_days(Days::new(40)).unwrap(),
        30,
    );
    let current = Subscription::provision(Uuid::new_v4(), Plan::Premium, now, 30);
    let cancelled = Subscription::provision(
        Uuid::new_v4(),
        Plan::Basic,
        now.checked_sub_days(Days::new(40)).unwrap(),
        30,
    )
    .cancel();
    market.subscriptions.insert(lapsed.clone());
    market.subscriptions.insert(current.clone());
    market.subscriptions.insert(cancelled.clone());

    let swept = market.subscription_service.sweep_lapsed(now).await.unwrap();
    assert_eq!(swept, vec![lapsed.id]);

    let stored = market.subscriptions.get_by_id(lapsed.id).await.unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Expired);
    let untouched = market.subscriptions.get_by_id(cancelled.id).await.unwrap();
    assert_eq!(untouched.status, SubscriptionStatus::Cancelled);

    assert!(market
        .subscription_service
        .sweep_lapsed(now)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_dealer_administration_and_dashboard() {
    let market = market();
    let first = approved_dealer(&market, "first@example.com").await;
    let second = approved_dealer(&market, "second@example.com").await;
    let waiting = market
        .accounts
        .register(registration("waiting@example.com"))
        .await
        .unwrap();
    let refused = market
        .accounts
        .register(registration("refused@example.com"))
        .await
        .unwrap();
    let refused = market
        .accounts
        .reject_user(&market.admin, refused.id)
        .await
        .unwrap();
    assert_eq!(refused.status, UserStatus::Inactive);

    let listing = market.listing_service.submit(&first, draft()).await.unwrap();
    market.listing_service.submit(&second, draft()).await.unwrap();
    market
        .listing_service
        .approve(&market.admin, listing.id)
        .await
        .unwrap();

    let second_sub = market
        .subscription_service
        .for_user(&market.admin, second.id)
        .await
        .unwrap()
        .unwrap();
    market
        .subscription_service
        .change_plan(&market.admin, second_sub.id, Plan::Enterprise)
        .await
        .unwrap();

    let stats = market.accounts.dashboard(&market.admin).await.unwrap();
    assert_eq!(stats.total_dealers, 4);
    assert_eq!(stats.active_dealers, 2);
    assert_eq!(stats.pending_dealers, 1);
    assert_eq!(stats.total_listings, 2);
    assert_eq!(stats.pending_listings, 1);
    assert_eq!(stats.active_subscriptions, 2);
    assert_eq!(stats.monthly_revenue, 999 + 4999);

    let dealers = market.accounts.list_dealers(&market.admin).await.unwrap();
    assert_eq!(dealers.len(), 4);
    assert!(dealers
        .iter()
        .find(|d| d.user.id == waiting.id)
        .is_some_and(|d| d.subscription.is_none()));

    // Dealers can see and edit only themselves
    let me = market.accounts.get_dealer(&first, first.id).await.unwrap();
    assert_eq!(me.subscription.map(|s| s.plan), Some(Plan::Basic));
    let other = market.accounts.get_dealer(&first, second.id).await;
    assert!(matches!(other, Err(AccountError::Unauthorized(_))));

    let profile = market
        .accounts
        .update_dealer_profile(
            &first,
            first.id,
            dealer_market::domain::DealerProfileUpdate {
                company_name: Some("Mobi24 Motors".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.company_name.as_deref(), Some("Mobi24 Motors"));

    let not_admin = market.accounts.dashboard(&first).await;
    assert!(matches!(not_admin, Err(AccountError::Unauthorized(_))));

    market
        .accounts
        .delete_dealer(&market.admin, waiting.id)
        .await
        .unwrap();
    let gone = market.accounts.get_dealer(&market.admin, waiting.id).await;
    assert!(matches!(gone, Err(AccountError::NotFound(_))));
}

#[tokio::test]
async fn test_sessions_round_trip() {
    let market = market();
    let user = market
        .accounts
        .register(registration("session@example.com"))
        .await
        .unwrap();

    let wrong = market.accounts.sign_in("session@example.com", "nope").await;
    assert!(matches!(
        wrong,
        Err(AccountError::Session(SessionError::InvalidCredentials))
    ));

    let session = market
        .accounts
        .sign_in("session@example.com", "hunter22")
        .await
        .expect("Failed to sign in");
    assert_eq!(session.user.id, user.id);

    let current = market.accounts.current_user(&session.token).await.unwrap();
    assert_eq!(current.map(|u| u.id), Some(user.id));

    market.accounts.sign_out(&session.token).await.unwrap();
    assert!(market
        .accounts
        .current_user(&session.token)
        .await
        .unwrap()
        .is_none());
}

#[test]
fn test_quota_check_outside_async_runtime() {
    let market = market();
    let user = tokio_test::block_on(market.accounts.register(registration("sync@example.com")))
        .expect("Failed to register");
    let dealer = tokio_test::block_on(market.accounts.approve_user(&market.admin, user.id))
        .expect("Failed to approve");

    let quota = tokio_test::block_on(market.listing_service.quota(&Actor::from(&dealer.user)));
    let quota = tokio_test::assert_ok!(quota);
    assert_eq!((quota.limit, quota.used, quota.allowed), (15, 0, true));
}

fn image_urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://cdn.example.com/photo-{}.jpg", i))
        .collect()
}

#[tokio::test]
async fn test_image_cap_on_submit_and_edit() {
    let market = market();
    let dealer = approved_dealer(&market, "photos@example.com").await;

    let too_many = ListingDraft {
        images: image_urls(16),
        ..draft()
    };
    match market.listing_service.submit(&dealer, too_many).await {
        Err(ListingError::Validation(fields)) => {
            assert_eq!(fields["images"], "At most 15 images are allowed");
        }
        other => panic!("expected validation error, got {:?}", other.map(|l| l.id)),
    }
    assert_eq!(market.listings.count(), 0);

    let full = ListingDraft {
        images: image_urls(15),
        ..draft()
    };
    let listing = market
        .listing_service
        .submit(&dealer, full)
        .await
        .expect("Failed to submit 15 images");
    assert_eq!(listing.images.len(), 15);

    let grown = market
        .listing_service
        .update(
            &dealer,
            listing.id,
            ListingUpdate {
                images: Some(image_urls(16)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(grown, Err(ListingError::Validation(ref f)) if f.contains_key("images")));
    let stored = market.listings.get_by_id(listing.id).await.unwrap();
    assert_eq!(stored.images.len(), 15);

    let trimmed = market
        .listing_service
        .update(
            &dealer,
            listing.id,
            ListingUpdate {
                images: Some(image_urls(3)),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update images");
    assert_eq!(trimmed.images.len(), 3);
}

#[tokio::test]
async fn test_photo_names_cannot_leave_dealer_folder() {
    // No expectations: any upload reaching the store fails the test
    let market = market();
    let dealer = approved_dealer(&market, "paths@example.com").await;
    let victim = Uuid::new_v4();

    for name in [
        format!("../{}/front.jpg", victim),
        format!("{}/front.jpg", victim),
        "..\\front.jpg".to_string(),
        "..".to_string(),
    ] {
        match market
            .listing_service
            .upload_image(&dealer, vec![0xFF, 0xD8], &name, "image/jpeg")
            .await
        {
            Err(ListingError::Validation(fields)) => assert!(fields.contains_key("file_name")),
            other => panic!("{} should be refused, got {:?}", name, other),
        }
    }
}

#[tokio::test]
async fn test_reapproval_after_cancelled_plan_provisions_again() {
    let market = market();
    let dealer = approved_dealer(&market, "again@example.com").await;
    let first = market
        .subscription_service
        .for_user(&market.admin, dealer.id)
        .await
        .unwrap()
        .unwrap();
    market
        .subscription_service
        .cancel(&market.admin, first.id)
        .await
        .unwrap();
    market
        .accounts
        .reject_user(&market.admin, dealer.id)
        .await
        .unwrap();

    let approved = market
        .accounts
        .approve_user(&market.admin, dealer.id)
        .await
        .expect("Failed to re-approve");
    let fresh = approved.subscription.expect("subscription provisioned");
    assert_ne!(fresh.id, first.id);
    assert_eq!(fresh.status, SubscriptionStatus::Active);
    assert_eq!(fresh.plan, Plan::Basic);
    assert_eq!(market.subscriptions.list().await.unwrap().len(), 2);

    let quota = market.listing_service.quota(&dealer).await.unwrap();
    assert!(quota.allowed);
}

#[tokio::test]
async fn test_dashboard_skips_lapsed_subscriptions() {
    let market = market();
    approved_dealer(&market, "current@example.com").await;
    let stale = Subscription::provision(
        Uuid::new_v4(),
        Plan::Enterprise,
        today().checked_sub_days(Days::new(40)).unwrap(),
        30,
    );
    market.subscriptions.insert(stale);

    let stats = market.accounts.dashboard(&market.admin).await.unwrap();
    assert_eq!(stats.active_subscriptions, 1);
    assert_eq!(stats.monthly_revenue, 999);
}

#[tokio::test]
async fn test_expired_sessions_are_purged() {
    let market = market();
    let user = market
        .accounts
        .register(registration("purge@example.com"))
        .await
        .unwrap();
    let live = market
        .accounts
        .sign_in("purge@example.com", "hunter22")
        .await
        .unwrap();
    market
        .sessions
        .insert_session("stale-token", user.id, Utc::now() - Duration::days(1));

    assert!(market.accounts.current_user("stale-token").await.unwrap().is_none());
    assert_eq!(market.accounts.purge_expired_sessions().await.unwrap(), 1);
    assert_eq!(market.accounts.purge_expired_sessions().await.unwrap(), 0);

    let still_signed_in = market.accounts.current_user(&live.token).await.unwrap();
    assert_eq!(still_signed_in.map(|u| u.id), Some(user.id));
}
