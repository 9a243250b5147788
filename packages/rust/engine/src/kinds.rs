//! Enrichment step definitions.
//!
//! All six steps run through one generic engine; a step is nothing more
//! than the parameter set collected in [`StepSpec`]: which columns it
//! reads and writes, how it builds its prompt, how it parses the
//! response, and which provider profile it needs.

use assetpilot_llm::ProviderPolicy;

use crate::parse::ResponseParser;
use crate::prompt::{self, JobFields};

// Column names as they appear on the asset sheets. Resolution is fuzzy
// (see `assetpilot_sheets::resolve_columns`), so suffixed variants like
// "YOM > OEM > MODEL (edited)" still match.
pub const ASSET_COLUMN: &str = "YOM > OEM > MODEL";
pub const RAW_DATA_COLUMN: &str = "Raw Trusted Data";
pub const AI_DATA_COLUMN: &str = "AI Data";
pub const DESCRIPTION_COLUMN: &str = "Script Technical Description";
pub const COMPARABLE_COLUMN: &str = "AI Comparable Price";
pub const PRICE_COLUMN: &str = "Price";

/// A source field extracted from a row into [`JobFields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Asset,
    Tech,
    AiData,
    Comparable,
}

/// The six enrichment steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentKind {
    /// Web research summary filling the "AI Data" column.
    AiData,
    /// Technical catalog description.
    Description,
    /// Comparable listings search.
    Comparables,
    /// Price selection from gathered comparables.
    ExtractPrice,
    /// Brand-new unit price lookup.
    NewPrice,
    /// Similar-asset listing search with price extraction.
    Similar,
}

/// Full parameter set for one enrichment step.
pub struct StepSpec {
    pub kind: EnrichmentKind,
    /// Display name used in events, history, and the HTTP surface.
    pub name: &'static str,
    /// Short CLI-friendly identifier.
    pub slug: &'static str,
    /// Column the step writes.
    pub target_column: &'static str,
    /// Columns that must exist on the sheet (including the target).
    pub required_columns: &'static [&'static str],
    /// Columns used when present.
    pub optional_columns: &'static [&'static str],
    /// Fields that must be non-empty for a row to be eligible.
    pub required_fields: &'static [Field],
    pub policy: ProviderPolicy,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<&'static str>,
    /// Default prompt builder; a caller-supplied template overrides it.
    pub prompt: fn(&JobFields) -> String,
    pub parser: ResponseParser,
    /// Background tint applied to successfully written cells.
    pub tint: Option<&'static str>,
}

static AI_DATA_SPEC: StepSpec = StepSpec {
    kind: EnrichmentKind::AiData,
    name: "Generate AI Data",
    slug: "ai_data",
    target_column: AI_DATA_COLUMN,
    required_columns: &[ASSET_COLUMN, RAW_DATA_COLUMN, AI_DATA_COLUMN],
    optional_columns: &[],
    required_fields: &[Field::Asset, Field::Tech],
    policy: ProviderPolicy::PreferSearch,
    temperature: 0.3,
    max_tokens: 1000,
    system_prompt: Some(prompt::AI_DATA_SYSTEM),
    prompt: prompt::ai_data_prompt,
    parser: ResponseParser::Verbatim,
    tint: None,
};

static DESCRIPTION_SPEC: StepSpec = StepSpec {
    kind: EnrichmentKind::Description,
    name: "Build Description",
    slug: "description",
    target_column: DESCRIPTION_COLUMN,
    required_columns: &[
        ASSET_COLUMN,
        RAW_DATA_COLUMN,
        AI_DATA_COLUMN,
        DESCRIPTION_COLUMN,
    ],
    optional_columns: &[],
    // The "AI Data" column must exist but its value is optional; only the
    // raw trusted data is required to have content.
    required_fields: &[Field::Tech],
    policy: ProviderPolicy::PreferSearch,
    temperature: 0.4,
    max_tokens: 300,
    system_prompt: None,
    prompt: prompt::description_prompt,
    parser: ResponseParser::Verbatim,
    tint: None,
};

static COMPARABLES_SPEC: StepSpec = StepSpec {
    kind: EnrichmentKind::Comparables,
    name: "AI Source Comparables",
    slug: "comparables",
    target_column: COMPARABLE_COLUMN,
    required_columns: &[ASSET_COLUMN, RAW_DATA_COLUMN, COMPARABLE_COLUMN],
    optional_columns: &[AI_DATA_COLUMN],
    required_fields: &[Field::Asset, Field::Tech],
    policy: ProviderPolicy::RequireSearch,
    temperature: 0.3,
    max_tokens: 1500,
    system_prompt: Some(prompt::COMPARABLES_SYSTEM),
    prompt: prompt::comparables_prompt,
    parser: ResponseParser::Listings,
    tint: None,
};

static EXTRACT_PRICE_SPEC: StepSpec = StepSpec {
    kind: EnrichmentKind::ExtractPrice,
    name: "Extract price from AI Comparable",
    slug: "extract_price",
    target_column: PRICE_COLUMN,
    required_columns: &[
        ASSET_COLUMN,
        RAW_DATA_COLUMN,
        COMPARABLE_COLUMN,
        PRICE_COLUMN,
    ],
    optional_columns: &[AI_DATA_COLUMN],
    required_fields: &[Field::Asset, Field::Tech, Field::Comparable],
    policy: ProviderPolicy::PreferSearch,
    temperature: 0.1,
    max_tokens: 50,
    system_prompt: Some(prompt::EXTRACT_PRICE_SYSTEM),
    prompt: prompt::extract_price_prompt,
    parser: ResponseParser::Price,
    tint: Some("#c9daf8"),
};

static NEW_PRICE_SPEC: StepSpec = StepSpec {
    kind: EnrichmentKind::NewPrice,
    name: "AI Source New Price",
    slug: "new_price",
    target_column: PRICE_COLUMN,
    required_columns: &[ASSET_COLUMN, RAW_DATA_COLUMN, PRICE_COLUMN],
    optional_columns: &[AI_DATA_COLUMN],
    required_fields: &[Field::Asset, Field::Tech],
    policy: ProviderPolicy::RequireSearch,
    temperature: 0.3,
    max_tokens: 50,
    system_prompt: Some(prompt::NEW_PRICE_SYSTEM),
    prompt: prompt::new_price_prompt,
    parser: ResponseParser::Price,
    tint: Some("#fff2cc"),
};

static SIMILAR_SPEC: StepSpec = StepSpec {
    kind: EnrichmentKind::Similar,
    name: "AI Similar Comparable",
    slug: "similar",
    target_column: PRICE_COLUMN,
    required_columns: &[ASSET_COLUMN, RAW_DATA_COLUMN, PRICE_COLUMN],
    optional_columns: &[AI_DATA_COLUMN],
    required_fields: &[Field::Asset, Field::Tech],
    policy: ProviderPolicy::RequireSearch,
    temperature: 0.3,
    max_tokens: 1000,
    system_prompt: Some(prompt::SIMILAR_SYSTEM),
    prompt: prompt::similar_prompt,
    parser: ResponseParser::ListingPrice,
    tint: Some("#e2c69b"),
};

impl EnrichmentKind {
    /// Every step, in pipeline order.
    pub const ALL: [EnrichmentKind; 6] = [
        Self::AiData,
        Self::Description,
        Self::Comparables,
        Self::ExtractPrice,
        Self::NewPrice,
        Self::Similar,
    ];

    /// The step's full parameter set.
    pub fn spec(&self) -> &'static StepSpec {
        match self {
            Self::AiData => &AI_DATA_SPEC,
            Self::Description => &DESCRIPTION_SPEC,
            Self::Comparables => &COMPARABLES_SPEC,
            Self::ExtractPrice => &EXTRACT_PRICE_SPEC,
            Self::NewPrice => &NEW_PRICE_SPEC,
            Self::Similar => &SIMILAR_SPEC,
        }
    }

    /// Look a step up by display name or slug, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Self::ALL.into_iter().find(|kind| {
            let spec = kind.spec();
            spec.name.eq_ignore_ascii_case(wanted) || spec.slug.eq_ignore_ascii_case(wanted)
        })
    }
}
