use super::listing::{CarListing, ListingStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};

/// Search form state. Empty strings mean "not applied"; all set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilters {
    #[serde(default)]
    pub rto: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub fuel_type: String,
    #[serde(default)]
    pub transmission_type: String,
    #[serde(default)]
    pub min_price: String,
    #[serde(default)]
    pub max_price: String,
    /// Status tab on the admin screen. Not part of the badge count.
    #[serde(default)]
    pub status: Option<ListingStatus>,
}

impl ListingFilters {
    /// Number of filled-in filters, for the badge on the filter button.
    pub fn active_count(&self) -> usize {
        [
            &self.rto,
            &self.color,
            &self.brand,
            &self.fuel_type,
            &self.transmission_type,
            &self.min_price,
            &self.max_price,
        ]
        .iter()
        .filter(|v| !v.is_empty())
        .count()
    }

    pub fn matches(&self, listing: &CarListing) -> bool {
        if let Some(status) = self.status {
            if listing.status != status {
                return false;
            }
        }

        contains_ci(&listing.rto_number, &self.rto)
            && contains_ci(&listing.color, &self.color)
            && contains_ci(&listing.brand, &self.brand)
            && equals_ci(&listing.fuel_type, &self.fuel_type)
            && equals_ci(&listing.transmission_type, &self.transmission_type)
            && within_bound(&listing.asking_price, &self.min_price, |price, min| price >= min)
            && within_bound(&listing.asking_price, &self.max_price, |price, max| price <= max)
    }
}

/// Keeps listings matching every set filter, in their original order.
pub fn apply_filters(listings: &[CarListing], filters: &ListingFilters) -> Vec<CarListing> {
    listings
        .iter()
        .filter(|l| filters.matches(l))
        .cloned()
        .collect()
}

fn contains_ci(value: &str, needle: &str) -> bool {
    needle.is_empty() || value.to_lowercase().contains(&needle.to_lowercase())
}

fn equals_ci(value: &str, expected: &str) -> bool {
    expected.is_empty() || value.to_lowercase() == expected.to_lowercase()
}

/// A bound that is set but has no leading digits matches nothing.
fn within_bound(price: &str, bound: &str, cmp: impl Fn(i64, i64) -> bool) -> bool {
    if bound.is_empty() {
        return true;
    }
    match leading_int(bound) {
        Some(b) => cmp(parse_price(price), b),
        None => false,
    }
}

/// Integer value of an asking price; anything non-numeric counts as 0.
pub fn parse_price(value: &str) -> i64 {
    leading_int(value).unwrap_or(0)
}

/// Parses an optional sign and the leading run of digits, ignoring the rest.
fn leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = &rest[..rest.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListingField {
    Brand,
    Model,
    Color,
    FuelType,
    TransmissionType,
    RtoNumber,
}

impl ListingField {
    fn get(self, listing: &CarListing) -> &str {
        match self {
            ListingField::Brand => &listing.brand,
            ListingField::Model => &listing.model,
            ListingField::Color => &listing.color,
            ListingField::FuelType => &listing.fuel_type,
            ListingField::TransmissionType => &listing.transmission_type,
            ListingField::RtoNumber => &listing.rto_number,
        }
    }
}

/// Sorted, de-duplicated, non-empty values of one field; feeds picker options.
pub fn distinct_values(listings: &[CarListing], field: ListingField) -> Vec<String> {
    listings
        .iter()
        .map(|l| field.get(l))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
