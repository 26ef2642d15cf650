use crate::domain::{Area, ListingField, ListingScope, ListingStatus, MediaKind, Plan, RouteDecision};
use std::str::FromStr;

pub(super) fn parse_plan(plan: &str) -> Option<Plan> {
    Plan::from_str(plan.trim()).ok()
}

/// Missing or blank means the marketplace.
pub(super) fn parse_scope(scope: Option<&str>) -> Option<ListingScope> {
    match scope.map(str::trim) {
        None | Some("") => Some(ListingScope::default()),
        Some(s) => ListingScope::from_str(s).ok(),
    }
}

/// Missing, blank or `all` means no status tab.
pub(super) fn parse_status(status: Option<&str>) -> Result<Option<ListingStatus>, ()> {
    match status.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => ListingStatus::from_str(s).map(Some).map_err(|_| ()),
    }
}

pub(super) fn parse_listing_field(field: &str) -> Option<ListingField> {
    ListingField::from_str(field).ok()
}

pub(super) fn parse_audio_kind(kind: &str) -> Option<MediaKind> {
    match kind {
        "repairs_needed" | "audio_repairs_needed" => Some(MediaKind::AudioRepairsNeeded),
        "repairs_completed" | "audio_repairs_completed" => Some(MediaKind::AudioRepairsCompleted),
        _ => None,
    }
}

pub(super) fn parse_area(area: &str) -> Option<Area> {
    Area::from_str(area).ok()
}

pub(super) fn route_decision_label(decision: RouteDecision) -> &'static str {
    match decision {
        RouteDecision::Allow => "allow",
        RouteDecision::SignIn => "sign_in",
        RouteDecision::RedirectAdminHome => "redirect_admin_home",
        RouteDecision::RedirectDealerHome => "redirect_dealer_home",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_defaults_to_marketplace() {
        assert_eq!(parse_scope(None), Some(ListingScope::Marketplace));
        assert_eq!(parse_scope(Some(" ")), Some(ListingScope::Marketplace));
        assert_eq!(parse_scope(Some("mine")), Some(ListingScope::Mine));
        assert_eq!(parse_scope(Some("everything")), None);
    }

    #[test]
    fn status_all_means_no_tab() {
        assert_eq!(parse_status(Some("all")), Ok(None));
        assert_eq!(parse_status(Some("approved")), Ok(Some(ListingStatus::Approved)));
        assert!(parse_status(Some("sold")).is_err());
    }

    #[test]
    fn parse_invalid_inputs_return_none() {
        assert!(parse_plan("gold").is_none());
        assert!(parse_listing_field("price").is_none());
        assert!(parse_audio_kind("image").is_none());
        assert!(parse_area("guest").is_none());
        assert_eq!(parse_plan(" premium"), Some(Plan::Premium));
    }
}
