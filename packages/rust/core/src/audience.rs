//! Audience mapping: source segments and triggers to target segmentation.

use tracing::debug;

use migrator_shared::{AudienceFilters, Channel, ScheduleDescriptor, SegmentMap};

use crate::payload::{AudienceFilter, Segmentation};

const ALL_USERS_NAME: &str = "All Users";
const ALL_USERS_ID: &str = "moe_all_users";

/// The "everyone" segment.
pub fn all_users() -> Segmentation {
    Segmentation::new(
        "and",
        vec![AudienceFilter::CustomSegments {
            name: ALL_USERS_NAME.into(),
            id: ALL_USERS_ID.into(),
        }],
    )
}

/// Target audience for a campaign.
///
/// Source segments listed in `segment_map` become their target
/// `custom_segments` filters, OR-ed together. Unmapped segments are dropped;
/// with none mapped the audience is all users. Triggered SMS campaigns target
/// app-open actors instead.
pub fn map_audience(
    channel: Channel,
    schedule: &ScheduleDescriptor,
    audience: &AudienceFilters,
    segment_map: &SegmentMap,
) -> Segmentation {
    if channel == Channel::Sms && schedule.is_triggered() {
        return Segmentation::new("and", vec![AudienceFilter::app_opened()]);
    }

    let mut filters = Vec::new();
    for segment in &audience.segments {
        match segment_map.get(&segment.id) {
            Some(target) => filters.push(AudienceFilter::CustomSegments {
                name: target.name.clone(),
                id: target.id.clone(),
            }),
            None => debug!(
                segment = %segment.name,
                id = %segment.id,
                "source segment has no target mapping"
            ),
        }
    }

    if filters.is_empty() {
        if !audience.filters.is_empty() {
            debug!(
                filters = audience.filters.len(),
                "source filters have no target equivalent, targeting all users"
            );
        }
        return all_users();
    }

    Segmentation::new("or", filters)
}

/// Trigger condition attached to email and push drafts.
pub fn trigger_segmentation(channel: Channel) -> Segmentation {
    let filter = match channel {
        Channel::Email => AudienceFilter::app_opened_bare(),
        _ => AudienceFilter::app_opened(),
    };
    Segmentation::new("or", vec![filter])
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_shared::{SegmentRef, TriggeredSchedule};
    use serde_json::json;

    fn triggered() -> ScheduleDescriptor {
        ScheduleDescriptor::Triggered(TriggeredSchedule {
            delay_seconds: 0,
            window_start: None,
            window_end: None,
        })
    }

    fn segment(id: &str, name: &str) -> SegmentRef {
        SegmentRef { id: id.into(), name: name.into() }
    }

    #[test]
    fn defaults_to_all_users() {
        let seg = map_audience(
            Channel::Email,
            &ScheduleDescriptor::Immediate,
            &AudienceFilters {
                segments: Vec::new(),
                filters: vec![json!({"custom_attribute": "x"})],
            },
            &SegmentMap::new(),
        );
        assert_eq!(seg, all_users());
    }

    #[test]
    fn unmapped_segments_fall_back_to_all_users() {
        let audience = AudienceFilters {
            segments: vec![segment("s1", "VIP"), segment("s2", "Lapsed")],
            filters: Vec::new(),
        };
        let seg = map_audience(
            Channel::Push,
            &ScheduleDescriptor::Immediate,
            &audience,
            &SegmentMap::new(),
        );
        assert_eq!(seg, all_users());
    }

    #[test]
    fn mapped_segments_use_target_ids() {
        let audience = AudienceFilters {
            segments: vec![segment("s1", "VIP"), segment("s2", "Lapsed"), segment("s3", "Beta")],
            filters: Vec::new(),
        };
        let map = SegmentMap::from([
            ("s1".to_string(), segment("moe_vip", "VIP Customers")),
            ("s3".to_string(), segment("moe_beta", "Beta")),
        ]);
        let seg = map_audience(Channel::Push, &ScheduleDescriptor::Immediate, &audience, &map);
        assert_eq!(seg.included_filters.filter_operator, "or");
        assert_eq!(
            seg.filters(),
            &[
                AudienceFilter::CustomSegments { name: "VIP Customers".into(), id: "moe_vip".into() },
                AudienceFilter::CustomSegments { name: "Beta".into(), id: "moe_beta".into() },
            ]
        );
    }

    #[test]
    fn triggered_sms_targets_app_openers() {
        let none = SegmentMap::new();
        let seg = map_audience(Channel::Sms, &triggered(), &AudienceFilters::default(), &none);
        assert_eq!(seg.filters(), &[AudienceFilter::app_opened()]);

        let email = map_audience(Channel::Email, &triggered(), &AudienceFilters::default(), &none);
        assert_eq!(email, all_users());
    }

    #[test]
    fn email_trigger_uses_bare_action() {
        assert_eq!(
            trigger_segmentation(Channel::Email).filters(),
            &[AudienceFilter::app_opened_bare()]
        );
        assert_eq!(
            trigger_segmentation(Channel::Push).filters(),
            &[AudienceFilter::app_opened()]
        );
    }
}
