use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on photos per listing, enforced while the draft is being filled.
pub const MAX_LISTING_IMAGES: usize = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListingStatus {
    Pending,
    Approved,
    Rejected,
}

impl ListingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ListingStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    AudioRepairsNeeded,
    AudioRepairsCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarListing {
    pub id: Uuid,
    pub dealer_id: Uuid,
    pub status: ListingStatus,
    pub registration_year: String,
    pub manufacturing_year: String,
    pub brand: String,
    pub model: String,
    pub transmission_type: String,
    pub rto_number: String,
    pub images: Vec<String>,
    pub color: String,
    pub ownership_history: String,
    pub kilometers_driven: String,
    pub fuel_type: String,
    pub insurance_validity: String,
    pub insurance_type: String,
    pub asking_price: String,
    pub whatsapp_number: String,
    pub repairs_needed_audio: Option<String>,
    pub repairs_completed_audio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingMedia {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub url: String,
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ListingMedia {
    pub fn new(listing_id: Uuid, url: String, kind: MediaKind, file_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id,
            url,
            kind,
            file_name,
            created_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid transition: listing {listing_id} is {from}, cannot become {to}")]
pub struct IllegalTransition {
    pub listing_id: Uuid,
    pub from: ListingStatus,
    pub to: ListingStatus,
}

impl CarListing {
    /// Builds a pending listing. Callers must have validated the draft first.
    pub fn from_draft(dealer_id: Uuid, draft: ListingDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            dealer_id,
            status: ListingStatus::Pending,
            registration_year: draft.registration_year,
            manufacturing_year: draft.manufacturing_year,
            brand: draft.brand,
            model: draft.model,
            transmission_type: draft.transmission_type,
            rto_number: draft.rto_number,
            images: draft.images,
            color: draft.color,
            ownership_history: draft.ownership_history,
            kilometers_driven: draft.kilometers_driven,
            fuel_type: draft.fuel_type,
            insurance_validity: draft.insurance_validity,
            insurance_type: draft.insurance_type,
            asking_price: draft.asking_price,
            whatsapp_number: draft.whatsapp_number,
            repairs_needed_audio: draft.repairs_needed_audio,
            repairs_completed_audio: draft.repairs_completed_audio,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn approve(self) -> Result<Self, IllegalTransition> {
        self.transition(ListingStatus::Approved)
    }

    pub fn reject(self) -> Result<Self, IllegalTransition> {
        self.transition(ListingStatus::Rejected)
    }

    fn transition(mut self, to: ListingStatus) -> Result<Self, IllegalTransition> {
        if self.status != ListingStatus::Pending {
            return Err(IllegalTransition {
                listing_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// Current field values as a draft, for re-validating edits.
    pub fn to_draft(&self) -> ListingDraft {
        ListingDraft {
            dealer_id: Some(self.dealer_id),
            registration_year: self.registration_year.clone(),
            manufacturing_year: self.manufacturing_year.clone(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            transmission_type: self.transmission_type.clone(),
            rto_number: self.rto_number.clone(),
            images: self.images.clone(),
            color: self.color.clone(),
            ownership_history: self.ownership_history.clone(),
            kilometers_driven: self.kilometers_driven.clone(),
            fuel_type: self.fuel_type.clone(),
            insurance_validity: self.insurance_validity.clone(),
            insurance_type: self.insurance_type.clone(),
            asking_price: self.asking_price.clone(),
            whatsapp_number: self.whatsapp_number.clone(),
            repairs_needed_audio: self.repairs_needed_audio.clone(),
            repairs_completed_audio: self.repairs_completed_audio.clone(),
        }
    }

    /// Copies edited fields from a validated draft; status and ownership stay put.
    pub fn apply_draft(mut self, draft: ListingDraft) -> Self {
        self.registration_year = draft.registration_year;
        self.manufacturing_year = draft.manufacturing_year;
        self.brand = draft.brand;
        self.model = draft.model;
        self.transmission_type = draft.transmission_type;
        self.rto_number = draft.rto_number;
        self.images = draft.images;
        self.color = draft.color;
        self.ownership_history = draft.ownership_history;
        self.kilometers_driven = draft.kilometers_driven;
        self.fuel_type = draft.fuel_type;
        self.insurance_validity = draft.insurance_validity;
        self.insurance_type = draft.insurance_type;
        self.asking_price = draft.asking_price;
        self.whatsapp_number = draft.whatsapp_number;
        self.repairs_needed_audio = draft.repairs_needed_audio;
        self.repairs_completed_audio = draft.repairs_completed_audio;
        self.updated_at = Utc::now();
        self
    }
}

/// Listing form contents before submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingDraft {
    #[serde(default)]
    pub dealer_id: Option<Uuid>,
    #[serde(default)]
    pub registration_year: String,
    #[serde(default)]
    pub manufacturing_year: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub transmission_type: String,
    #[serde(default)]
    pub rto_number: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub ownership_history: String,
    #[serde(default)]
    pub kilometers_driven: String,
    #[serde(default)]
    pub fuel_type: String,
    #[serde(default)]
    pub insurance_validity: String,
    #[serde(default)]
    pub insurance_type: String,
    #[serde(default)]
    pub asking_price: String,
    #[serde(default)]
    pub whatsapp_number: String,
    #[serde(default)]
    pub repairs_needed_audio: Option<String>,
    #[serde(default)]
    pub repairs_completed_audio: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("A listing can hold at most {max} images")]
pub struct TooManyImages {
    pub max: usize,
}

pub type FieldErrors = BTreeMap<String, String>;

/// Outcome of checking a draft. Empty `errors` means the draft may become pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
    pub errors: FieldErrors,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.errors.insert(field.to_string(), message.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    /// Whether insurance validity and type must be filled in.
    pub require_insurance: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            require_insurance: true,
        }
    }
}

impl ListingDraft {
    pub fn add_image(&mut self, url: String) -> Result<(), TooManyImages> {
        if self.images.len() >= MAX_LISTING_IMAGES {
            return Err(TooManyImages {
                max: MAX_LISTING_IMAGES,
            });
        }
        self.images.push(url);
        Ok(())
    }

    pub fn remove_image(&mut self, index: usize) -> Option<String> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    pub fn validate(&self) -> Validation {
        self.validate_with(&ValidationRules::default())
    }

    /// Reports every failing field at once.
    pub fn validate_with(&self, rules: &ValidationRules) -> Validation {
        let mut v = Validation::default();

        if self.dealer_id.is_none() {
            v.fail("dealer_id", "Dealer is required");
        }

        let required = [
            ("registration_year", &self.registration_year, "Registration year is required"),
            ("manufacturing_year", &self.manufacturing_year, "Manufacturing year is required"),
            ("brand", &self.brand, "Brand is required"),
            ("model", &self.model, "Model is required"),
            ("transmission_type", &self.transmission_type, "Transmission type is required"),
            ("rto_number", &self.rto_number, "RTO number is required"),
            ("color", &self.color, "Color is required"),
            ("ownership_history", &self.ownership_history, "Ownership history is required"),
            ("kilometers_driven", &self.kilometers_driven, "Kilometers driven is required"),
            ("fuel_type", &self.fuel_type, "Fuel type is required"),
            ("asking_price", &self.asking_price, "Asking price is required"),
            ("whatsapp_number", &self.whatsapp_number, "WhatsApp number is required"),
        ];
        for (field, value, message) in required {
            if is_blank(value) {
                v.fail(field, message);
            }
        }

        if rules.require_insurance {
            if is_blank(&self.insurance_validity) {
                v.fail("insurance_validity", "Insurance validity is required");
            }
            if is_blank(&self.insurance_type) {
                v.fail("insurance_type", "Insurance type is required");
            }
        }

        for (field, value) in [
            ("registration_year", &self.registration_year),
            ("manufacturing_year", &self.manufacturing_year),
        ] {
            if !is_blank(value) && !is_digits(value, Some(4)) {
                v.fail(field, "Enter a valid 4-digit year");
            }
        }

        if !is_blank(&self.kilometers_driven) && !is_digits(&self.kilometers_driven, None) {
            v.fail("kilometers_driven", "Enter a valid number");
        }
        if !is_blank(&self.asking_price) && !is_digits(&self.asking_price, None) {
            v.fail("asking_price", "Enter a valid price");
        }
        if !is_blank(&self.whatsapp_number) && !is_digits(&self.whatsapp_number, Some(10)) {
            v.fail("whatsapp_number", "Enter a valid 10-digit number");
        }

        if self.images.is_empty() {
            v.fail("images", "At least one image is required");
        }

        v
    }
}

/// Partial edit of a listing's vehicle details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub registration_year: Option<String>,
    pub manufacturing_year: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub transmission_type: Option<String>,
    pub rto_number: Option<String>,
    pub images: Option<Vec<String>>,
    pub color: Option<String>,
    pub ownership_history: Option<String>,
    pub kilometers_driven: Option<String>,
    pub fuel_type: Option<String>,
    pub insurance_validity: Option<String>,
    pub insurance_type: Option<String>,
    pub asking_price: Option<String>,
    pub whatsapp_number: Option<String>,
}

impl ListingUpdate {
    pub fn apply(self, mut draft: ListingDraft) -> ListingDraft {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    draft.$field = value;
                })*
            };
        }
        set!(
            registration_year,
            manufacturing_year,
            brand,
            model,
            transmission_type,
            rto_number,
            images,
            color,
            ownership_history,
            kilometers_driven,
            fuel_type,
            insurance_validity,
            insurance_type,
            asking_price,
            whatsapp_number,
        );
        draft
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_digits(value: &str, len: Option<usize>) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && len.map_or(true, |n| value.len() == n)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_draft(dealer_id: Uuid) -> ListingDraft {
        ListingDraft {
            dealer_id: Some(dealer_id),
            registration_year: "2019".into(),
            manufacturing_year: "2018".into(),
            brand: "Honda".into(),
            model: "City".into(),
            transmission_type: "Manual".into(),
            rto_number: "MH12AB1234".into(),
            images: vec!["https://cdn.example.com/a.jpg".into()],
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

    #[test]
    fn valid_draft_passes() {
        let v = valid_draft(Uuid::new_v4()).validate();
        assert!(v.is_valid(), "{:?}", v.errors);
    }

    #[test]
    fn empty_images_fail_even_when_everything_else_is_fine() {
        let mut draft = valid_draft(Uuid::new_v4());
        draft.images.clear();
        let v = draft.validate();
        assert!(!v.is_valid());
        assert_eq!(v.errors.len(), 1);
        assert!(v.errors.contains_key("images"));
    }

    #[test]
    fn whatsapp_number_needs_ten_digits() {
        let mut draft = valid_draft(Uuid::new_v4());
        draft.whatsapp_number = "12345".into();
        assert!(draft.validate().errors.contains_key("whatsapp_number"));

        draft.whatsapp_number = "1234567890".into();
        assert!(!draft.validate().errors.contains_key("whatsapp_number"));

        draft.whatsapp_number = "12345abcde".into();
        assert!(draft.validate().errors.contains_key("whatsapp_number"));
    }

    #[test]
    fn years_need_four_digits() {
        let mut draft = valid_draft(Uuid::new_v4());
        draft.registration_year = "19".into();
        draft.manufacturing_year = "20x8".into();
        let v = draft.validate();
        assert_eq!(v.errors["registration_year"], "Enter a valid 4-digit year");
        assert_eq!(v.errors["manufacturing_year"], "Enter a valid 4-digit year");
    }

    #[test]
    fn numeric_fields_reject_signs_and_decimals() {
        let mut draft = valid_draft(Uuid::new_v4());
        draft.asking_price = "-5".into();
        draft.kilometers_driven = "12.5".into();
        let v = draft.validate();
        assert!(v.errors.contains_key("asking_price"));
        assert!(v.errors.contains_key("kilometers_driven"));
    }

    #[test]
    fn blank_draft_reports_every_required_field() {
        let v = ListingDraft::default().validate();
        for field in [
            "dealer_id",
            "registration_year",
            "manufacturing_year",
            "brand",
            "model",
            "transmission_type",
            "rto_number",
            "color",
            "ownership_history",
            "kilometers_driven",
            "fuel_type",
            "insurance_validity",
            "insurance_type",
            "asking_price",
            "whatsapp_number",
            "images",
        ] {
            assert!(v.errors.contains_key(field), "missing error for {field}");
        }
        assert_eq!(v.errors["brand"], "Brand is required");
    }

    #[test]
    fn insurance_optional_when_rules_relax_it() {
        let mut draft = valid_draft(Uuid::new_v4());
        draft.insurance_type.clear();
        draft.insurance_validity.clear();
        assert!(!draft.validate().is_valid());
        assert!(draft
            .validate_with(&ValidationRules {
                require_insurance: false
            })
            .is_valid());
    }

    #[test]
    fn image_collection_caps_at_fifteen() {
        let mut draft = ListingDraft::default();
        for i in 0..MAX_LISTING_IMAGES {
            draft.add_image(format!("img-{i}")).unwrap();
        }
        assert_eq!(
            draft.add_image("one-too-many".into()),
            Err(TooManyImages { max: 15 })
        );
        assert_eq!(draft.remove_image(0).as_deref(), Some("img-0"));
        assert_eq!(draft.remove_image(99), None);
        assert_eq!(draft.images.len(), 14);
    }

    #[test]
    fn pending_listing_approves_and_rejects_once() {
        let dealer = Uuid::new_v4();
        let listing = CarListing::from_draft(dealer, valid_draft(dealer));
        assert_eq!(listing.status, ListingStatus::Pending);

        let approved = listing.clone().approve().unwrap();
        assert_eq!(approved.status, ListingStatus::Approved);

        let rejected = listing.reject().unwrap();
        let err = rejected.clone().approve().unwrap_err();
        assert_eq!(err.from, ListingStatus::Rejected);
        assert_eq!(err.to, ListingStatus::Approved);
        assert!(approved.reject().is_err());
    }

    #[test]
    fn update_overrides_only_given_fields() {
        let dealer = Uuid::new_v4();
        let draft = valid_draft(dealer);
        let edited = ListingUpdate {
            asking_price: Some("700000".into()),
            color: Some("Red".into()),
            ..Default::default()
        }
        .apply(draft.clone());

        assert_eq!(edited.asking_price, "700000");
        assert_eq!(edited.color, "Red");
        assert_eq!(edited.brand, draft.brand);
    }
}
