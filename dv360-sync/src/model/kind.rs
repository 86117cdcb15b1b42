//! Resource kinds and their declared field schemas
//!
//! Every entity the sync engine understands is a variant of [`ResourceKind`].
//! The variant carries everything the rest of the crate needs to know about
//! the entity: its identifier, where it lives in the REST API, which fields it
//! declares and how those fields are displayed in a sheet.

use serde::{Deserialize, Serialize};

use crate::codec::TranslatorKind;

/// Server-assigned modification timestamp, never part of a patch mask
pub const UPDATE_TIME_FIELD: &str = "updateTime";

/// Lifecycle status field shared by every writable kind
pub const ENTITY_STATUS_FIELD: &str = "entityStatus";

/// Status an entity must carry before the API accepts a hard delete
pub const ARCHIVED_STATUS: &str = "ENTITY_STATUS_ARCHIVED";

/// A kind of remote entity that can be synchronized with a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Advertiser,
    Campaign,
    InsertionOrder,
    LineItem,
    Creative,
    /// Catalog of targeting options available to an advertiser (read-only)
    TargetingOption,
    /// A targeting option attached to a line item
    AssignedTargetingOption,
}

const ADVERTISER_FIELDS: &[&str] = &[
    "name",
    "advertiserId",
    "partnerId",
    "displayName",
    "entityStatus",
    "updateTime",
    "generalConfig",
    "adServerConfig",
    "creativeConfig",
    "dataAccessConfig",
    "integrationDetails",
    "servingConfig",
    "billingConfig",
];

const CAMPAIGN_FIELDS: &[&str] = &[
    "name",
    "advertiserId",
    "campaignId",
    "displayName",
    "entityStatus",
    "updateTime",
    "campaignGoal",
    "campaignFlight",
    "frequencyCap",
    "campaignBudgets",
];

const INSERTION_ORDER_FIELDS: &[&str] = &[
    "name",
    "advertiserId",
    "campaignId",
    "insertionOrderId",
    "displayName",
    "insertionOrderType",
    "reservationType",
    "entityStatus",
    "updateTime",
    "partnerCosts",
    "pacing",
    "frequencyCap",
    "integrationDetails",
    "kpi",
    "budget",
    "bidStrategy",
    "billableOutcome",
];

const LINE_ITEM_FIELDS: &[&str] = &[
    "name",
    "advertiserId",
    "campaignId",
    "insertionOrderId",
    "lineItemId",
    "displayName",
    "lineItemType",
    "entityStatus",
    "updateTime",
    "partnerCosts",
    "flight",
    "budget",
    "pacing",
    "frequencyCap",
    "partnerRevenueModel",
    "conversionCounting",
    "creativeIds",
    "bidStrategy",
    "integrationDetails",
    "targetingExpansion",
    "warningMessages",
    "mobileApp",
    "reservationType",
    "excludeNewExchanges",
];

const CREATIVE_FIELDS: &[&str] = &[
    "name",
    "advertiserId",
    "creativeId",
    "cmPlacementId",
    "displayName",
    "entityStatus",
    "updateTime",
    "createTime",
    "creativeType",
    "hostingSource",
    "dynamic",
    "dimensions",
    "additionalDimensions",
    "mediaDuration",
    "creativeAttributes",
    "reviewStatus",
    "notes",
    "integrationCode",
    "appendedTag",
    "assets",
    "exitEvents",
    "timerEvents",
    "counterEvents",
    "trackerUrls",
    "thirdPartyTag",
    "vastTagUrl",
];

const TARGETING_OPTION_FIELDS: &[&str] = &["name", "targetingOptionId", "targetingType"];

const ASSIGNED_TARGETING_OPTION_FIELDS: &[&str] = &[
    "name",
    "assignedTargetingOptionId",
    "targetingType",
    "inheritance",
];

impl ResourceKind {
    /// All kinds, in parent-before-child order
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Advertiser,
            ResourceKind::Campaign,
            ResourceKind::InsertionOrder,
            ResourceKind::LineItem,
            ResourceKind::Creative,
            ResourceKind::TargetingOption,
            ResourceKind::AssignedTargetingOption,
        ]
    }

    /// Configuration name (matches the serde representation)
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Advertiser => "advertiser",
            ResourceKind::Campaign => "campaign",
            ResourceKind::InsertionOrder => "insertion_order",
            ResourceKind::LineItem => "line_item",
            ResourceKind::Creative => "creative",
            ResourceKind::TargetingOption => "targeting_option",
            ResourceKind::AssignedTargetingOption => "assigned_targeting_option",
        }
    }

    /// Human-readable label for logs and sheet names
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Advertiser => "Advertiser",
            ResourceKind::Campaign => "Campaign",
            ResourceKind::InsertionOrder => "Insertion Order",
            ResourceKind::LineItem => "Line Item",
            ResourceKind::Creative => "Creative",
            ResourceKind::TargetingOption => "Targeting Option",
            ResourceKind::AssignedTargetingOption => "Assigned Targeting Option",
        }
    }

    /// Parse a kind from its configuration name (`line_item`, `line-item`, `lineitem`)
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_lowercase();

        ResourceKind::all()
            .iter()
            .copied()
            .find(|kind| kind.name().replace('_', "") == normalized)
    }

    /// Primary identifier field, absent before creation
    pub fn id_field(&self) -> &'static str {
        match self {
            ResourceKind::Advertiser => "advertiserId",
            ResourceKind::Campaign => "campaignId",
            ResourceKind::InsertionOrder => "insertionOrderId",
            ResourceKind::LineItem => "lineItemId",
            ResourceKind::Creative => "creativeId",
            ResourceKind::TargetingOption => "targetingOptionId",
            ResourceKind::AssignedTargetingOption => "assignedTargetingOptionId",
        }
    }

    /// Key under which a paged list response nests its entities
    pub fn list_field(&self) -> &'static str {
        match self {
            ResourceKind::Advertiser => "advertisers",
            ResourceKind::Campaign => "campaigns",
            ResourceKind::InsertionOrder => "insertionOrders",
            ResourceKind::LineItem => "lineItems",
            ResourceKind::Creative => "creatives",
            ResourceKind::TargetingOption => "targetingOptions",
            ResourceKind::AssignedTargetingOption => "assignedTargetingOptions",
        }
    }

    /// URI template of the collection holding this kind
    pub fn collection_template(&self) -> &'static str {
        match self {
            ResourceKind::Advertiser => "advertisers",
            ResourceKind::Campaign => "advertisers/${advertiserId}/campaigns",
            ResourceKind::InsertionOrder => "advertisers/${advertiserId}/insertionOrders",
            ResourceKind::LineItem => "advertisers/${advertiserId}/lineItems",
            ResourceKind::Creative => "advertisers/${advertiserId}/creatives",
            ResourceKind::TargetingOption => "targetingTypes/${targetingType}/targetingOptions",
            ResourceKind::AssignedTargetingOption => {
                "advertisers/${advertiserId}/lineItems/${lineItemId}/targetingTypes/${targetingType}/assignedTargetingOptions"
            }
        }
    }

    /// Query string template naming the parent of a top-level collection
    pub fn list_query_template(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Advertiser => Some("partnerId=${partnerId}"),
            ResourceKind::TargetingOption => Some("advertiserId=${advertiserId}"),
            _ => None,
        }
    }

    /// URI template addressing a single entity
    pub fn single_template(&self) -> String {
        format!("{}/${{{}}}", self.collection_template(), self.id_field())
    }

    /// Declared top-level fields
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Advertiser => ADVERTISER_FIELDS,
            ResourceKind::Campaign => CAMPAIGN_FIELDS,
            ResourceKind::InsertionOrder => INSERTION_ORDER_FIELDS,
            ResourceKind::LineItem => LINE_ITEM_FIELDS,
            ResourceKind::Creative => CREATIVE_FIELDS,
            ResourceKind::TargetingOption => TARGETING_OPTION_FIELDS,
            ResourceKind::AssignedTargetingOption => ASSIGNED_TARGETING_OPTION_FIELDS,
        }
    }

    /// Whether `field` is a declared top-level field of this kind
    pub fn declares(&self, field: &str) -> bool {
        self.is_open() || self.fields().contains(&field)
    }

    /// Targeting options carry one details object per targeting type
    /// (`browserDetails`, `geoRegionDetails`, ...), so their schema stays open.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ResourceKind::TargetingOption | ResourceKind::AssignedTargetingOption
        )
    }

    /// Whether create/update/delete are supported
    pub fn is_writable(&self) -> bool {
        !matches!(self, ResourceKind::TargetingOption)
    }

    /// Whether rows of this kind may carry assigned targeting options
    pub fn owns_targeting(&self) -> bool {
        matches!(self, ResourceKind::LineItem)
    }

    /// Advertiser config objects mix mutable and immutable subfields, so their
    /// masks address leaves (`generalConfig.domainUrl`) instead of whole objects.
    pub fn masks_nested_fields(&self) -> bool {
        matches!(self, ResourceKind::Advertiser)
    }

    /// Display translators applied unless the configuration overrides them
    pub fn default_translators(&self) -> &'static [(&'static str, TranslatorKind)] {
        match self {
            ResourceKind::Campaign => &[
                ("campaignFlight.plannedDates.startDate", TranslatorKind::Date),
                ("campaignFlight.plannedDates.endDate", TranslatorKind::Date),
                (
                    "campaignGoal.performanceGoal.performanceGoalAmountMicros",
                    TranslatorKind::Micros,
                ),
            ],
            ResourceKind::LineItem => &[
                ("flight.dateRange.startDate", TranslatorKind::Date),
                ("flight.dateRange.endDate", TranslatorKind::Date),
                ("budget.maxAmount", TranslatorKind::Micros),
            ],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
