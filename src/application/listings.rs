use crate::domain::{
    apply_filters, can_mutate, can_submit_listing, can_transition, can_view, distinct_values,
    Actor, CarListing, FieldErrors, IllegalTransition, ListingDraft, ListingField,
    ListingFilters, ListingMedia, ListingScope, ListingStatus, ListingUpdate, MediaKind,
    QuotaDecision, QuotaPolicy, ValidationRules, MAX_LISTING_IMAGES,
};
use crate::infrastructure::{
    audio_path, image_path, ListingRepository, MediaError, MediaStorage, RepositoryError,
    SubscriptionRepository,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Listing is invalid")]
    Validation(FieldErrors),
    #[error("Listing limit reached: you have used {used} of {limit} listings, contact admin to upgrade")]
    QuotaExceeded { limit: i64, used: i64 },
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    #[error("Not allowed: {0}")]
    Unauthorized(String),
    #[error("Listing not found: {0}")]
    NotFound(Uuid),
    #[error("Media error: {0}")]
    Media(#[from] MediaError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A single path component: uploads must stay under the dealer's own prefix.
fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\']) && !name.contains("..")
}

fn unauthorized(message: &str) -> ListingError {
    ListingError::Unauthorized(message.to_string())
}

pub struct ListingService<L, S, M>
where
    L: ListingRepository,
    S: SubscriptionRepository,
    M: MediaStorage,
{
    listing_repo: Arc<L>,
    subscription_repo: Arc<S>,
    media: Arc<M>,
    policy: QuotaPolicy,
    rules: ValidationRules,
}

impl<L, S, M> ListingService<L, S, M>
where
    L: ListingRepository,
    S: SubscriptionRepository,
    M: MediaStorage,
{
    pub fn new(
        listing_repo: Arc<L>,
        subscription_repo: Arc<S>,
        media: Arc<M>,
        policy: QuotaPolicy,
        rules: ValidationRules,
    ) -> Self {
        Self {
            listing_repo,
            subscription_repo,
            media,
            policy,
            rules,
        }
    }

    async fn load(&self, id: Uuid) -> Result<CarListing, ListingError> {
        match self.listing_repo.get_by_id(id).await {
            Ok(listing) => Ok(listing),
            Err(RepositoryError::NotFound(_)) => Err(ListingError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// The dealer's quota as of today.
    pub async fn quota(&self, actor: &Actor) -> Result<QuotaDecision, ListingError> {
        let subscription = self.subscription_repo.get_for_user(actor.id).await?;
        let used = if self.policy.count_rejected {
            self.listing_repo.count_by_dealer(actor.id).await?
        } else {
            let own = self.listing_repo.list_by_dealer(actor.id).await?;
            self.policy.count_used(&own)
        };

        let today = Utc::now().date_naive();
        Ok(self.policy.can_submit(used, subscription.as_ref(), today))
    }

    /// Capability, validation, quota, then the pending row and its media.
    pub async fn submit(
        &self,
        actor: &Actor,
        mut draft: ListingDraft,
    ) -> Result<CarListing, ListingError> {
        if !can_submit_listing(actor) {
            return Err(unauthorized("only approved dealers can submit listings"));
        }
        match draft.dealer_id {
            Some(dealer_id) if dealer_id != actor.id => {
                return Err(unauthorized("listings can only be submitted for yourself"));
            }
            _ => draft.dealer_id = Some(actor.id),
        }

        self.check_draft(&draft)?;

        let decision = self.quota(actor).await?;
        if !decision.allowed {
            warn!(
                dealer_id = %actor.id,
                limit = decision.limit,
                used = decision.used,
                "Listing submission refused by quota"
            );
            return Err(ListingError::QuotaExceeded {
                limit: decision.limit,
                used: decision.used,
            });
        }

        let listing = CarListing::from_draft(actor.id, draft);
        self.listing_repo.create(&listing).await?;
        info!(listing_id = %listing.id, dealer_id = %actor.id, "Listing submitted for review");

        self.attach_media(&listing).await;
        Ok(listing)
    }

    /// Media rows are best effort; the listing row stays even if they fail.
    async fn attach_media(&self, listing: &CarListing) {
        let mut media: Vec<ListingMedia> = listing
            .images
            .iter()
            .map(|url| ListingMedia::new(listing.id, url.clone(), MediaKind::Image, None))
            .collect();
        if let Some(url) = &listing.repairs_needed_audio {
            media.push(ListingMedia::new(
                listing.id,
                url.clone(),
                MediaKind::AudioRepairsNeeded,
                None,
            ));
        }
        if let Some(url) = &listing.repairs_completed_audio {
            media.push(ListingMedia::new(
                listing.id,
                url.clone(),
                MediaKind::AudioRepairsCompleted,
                None,
            ));
        }

        for item in media {
            if let Err(e) = self.listing_repo.add_media(&item).await {
                warn!(listing_id = %listing.id, url = %item.url, error = %e, "Failed to attach listing media");
            }
        }
    }

    /// Field rules plus the photo cap.
    fn check_draft(&self, draft: &ListingDraft) -> Result<(), ListingError> {
        let mut validation = draft.validate_with(&self.rules);
        if draft.images.len() > MAX_LISTING_IMAGES {
            validation.errors.insert(
                "images".to_string(),
                format!("At most {} images are allowed", MAX_LISTING_IMAGES),
            );
        }
        if !validation.is_valid() {
            return Err(ListingError::Validation(validation.errors));
        }
        Ok(())
    }

    /// Hidden listings are reported as not allowed, with no data.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<CarListing, ListingError> {
        let listing = self.load(id).await?;
        if !can_view(actor, &listing) {
            return Err(unauthorized("listing is not visible to you"));
        }
        Ok(listing)
    }

    pub async fn media(&self, actor: &Actor, id: Uuid) -> Result<Vec<ListingMedia>, ListingError> {
        self.get(actor, id).await?;
        Ok(self.listing_repo.list_media(id).await?)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        scope: ListingScope,
        filters: &ListingFilters,
    ) -> Result<Vec<CarListing>, ListingError> {
        let visible = self.scoped(actor, scope).await?;
        Ok(apply_filters(&visible, filters))
    }

    /// Picker options for one field, drawn from what the actor can see in `scope`.
    pub async fn field_options(
        &self,
        actor: &Actor,
        scope: ListingScope,
        field: ListingField,
    ) -> Result<Vec<String>, ListingError> {
        let visible = self.scoped(actor, scope).await?;
        Ok(distinct_values(&visible, field))
    }

    async fn scoped(
        &self,
        actor: &Actor,
        scope: ListingScope,
    ) -> Result<Vec<CarListing>, ListingError> {
        if !scope.allowed_for(actor) {
            return Err(unauthorized("only admins can list every listing"));
        }

        let listings = match scope {
            ListingScope::Marketplace => {
                self.listing_repo
                    .list_by_status(ListingStatus::Approved)
                    .await?
            }
            ListingScope::Mine => self.listing_repo.list_by_dealer(actor.id).await?,
            ListingScope::All => self.listing_repo.list().await?,
        };

        Ok(listings
            .into_iter()
            .filter(|l| scope.includes(actor, l))
            .collect())
    }

    /// Owner or admin edit. The merged draft must still validate; status never changes here.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        update: ListingUpdate,
    ) -> Result<CarListing, ListingError> {
        let listing = self.load(id).await?;
        if !can_mutate(actor, &listing) {
            return Err(unauthorized("only the owning dealer can edit this listing"));
        }

        let draft = update.apply(listing.to_draft());
        self.check_draft(&draft)?;

        let updated = listing.apply_draft(draft);
        self.listing_repo.update(&updated).await?;
        info!(listing_id = %id, actor_id = %actor.id, "Listing updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ListingError> {
        let listing = self.load(id).await?;
        if !can_mutate(actor, &listing) {
            return Err(unauthorized("only the owning dealer can delete this listing"));
        }

        self.listing_repo.delete(id).await?;
        info!(listing_id = %id, actor_id = %actor.id, "Listing deleted");
        Ok(())
    }

    pub async fn approve(&self, actor: &Actor, id: Uuid) -> Result<CarListing, ListingError> {
        self.review(actor, id, CarListing::approve).await
    }

    pub async fn reject(&self, actor: &Actor, id: Uuid) -> Result<CarListing, ListingError> {
        self.review(actor, id, CarListing::reject).await
    }

    async fn review(
        &self,
        actor: &Actor,
        id: Uuid,
        transition: fn(CarListing) -> Result<CarListing, IllegalTransition>,
    ) -> Result<CarListing, ListingError> {
        let listing = self.load(id).await?;
        if !can_transition(actor, &listing) {
            return Err(unauthorized("only admins can review listings"));
        }

        let reviewed = transition(listing)?;
        self.listing_repo.update_status(id, reviewed.status).await?;
        info!(listing_id = %id, status = %reviewed.status, admin_id = %actor.id, "Listing reviewed");
        Ok(reviewed)
    }

    /// Uploads a photo for a listing being drafted and returns its public URL.
    pub async fn upload_image(
        &self,
        actor: &Actor,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, ListingError> {
        if !can_submit_listing(actor) {
            return Err(unauthorized("only approved dealers can upload listing photos"));
        }
        let problem = if file_name.trim().is_empty() {
            Some("File name is required")
        } else if !is_plain_file_name(file_name) {
            Some("File name must not contain path separators or '..'")
        } else {
            None
        };
        if let Some(message) = problem {
            let mut errors = FieldErrors::new();
            errors.insert("file_name".to_string(), message.to_string());
            return Err(ListingError::Validation(errors));
        }

        let url = self
            .media
            .upload(bytes, &image_path(actor.id, file_name), content_type)
            .await?;
        info!(dealer_id = %actor.id, url = %url, "Listing photo uploaded");
        Ok(url)
    }

    /// Stores a repairs voice note and points the listing at it.
    pub async fn attach_audio(
        &self,
        actor: &Actor,
        id: Uuid,
        kind: MediaKind,
        bytes: Vec<u8>,
    ) -> Result<CarListing, ListingError> {
        if !matches!(
            kind,
            MediaKind::AudioRepairsNeeded | MediaKind::AudioRepairsCompleted
        ) {
            let mut errors = FieldErrors::new();
            errors.insert("kind".to_string(), "Expected a repairs audio kind".to_string());
            return Err(ListingError::Validation(errors));
        }

        let mut listing = self.load(id).await?;
        if !can_mutate(actor, &listing) {
            return Err(unauthorized("only the owning dealer can add audio"));
        }

        let path = audio_path(listing.dealer_id, id, &kind.to_string());
        let url = self.media.upload(bytes, &path, "audio/m4a").await?;

        match kind {
            MediaKind::AudioRepairsNeeded => listing.repairs_needed_audio = Some(url.clone()),
            _ => listing.repairs_completed_audio = Some(url.clone()),
        }
        listing.updated_at = Utc::now();
        self.listing_repo.update(&listing).await?;

        let media = ListingMedia::new(id, url, kind, Some(format!("{}.m4a", kind)));
        if let Err(e) = self.listing_repo.add_media(&media).await {
            warn!(listing_id = %id, error = %e, "Failed to record audio media row");
        }

        Ok(listing)
    }
}
