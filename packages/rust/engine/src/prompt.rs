//! Prompt construction for the enrichment steps.
//!
//! Each step has a tuned default prompt; callers may override it with a
//! template carrying `{asset}`, `{tech_specs}`, `{ai_data}`, and
//! `{comparable}` placeholders. Absent fields substitute the empty string,
//! so one template works across steps.

/// Source fields extracted from a row for prompt construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFields {
    pub asset: String,
    pub tech: String,
    pub ai_data: String,
    pub comparable: String,
}

// ---------------------------------------------------------------------------
// Custom templates
// ---------------------------------------------------------------------------

/// Substitute the named placeholders of a caller-supplied template.
pub fn apply_template(template: &str, fields: &JobFields) -> String {
    let ai_data_section = if fields.ai_data.is_empty() {
        String::new()
    } else {
        format!("\nAI Data: {}", fields.ai_data)
    };

    template
        .replace("{asset}", &fields.asset)
        .replace("{tech_specs}", &fields.tech)
        .replace("{ai_data}", &ai_data_section)
        .replace("{comparable}", &fields.comparable)
}

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

pub const AI_DATA_SYSTEM: &str = "You are an industrial equipment researcher. \
    Return only verified factual data about the requested asset, as plain text. \
    Never include commentary about your search process.";

pub const COMPARABLES_SYSTEM: &str = "You are an expert in construction equipment \
    valuation. Your task is to search thoroughly across multiple equipment \
    marketplaces and find as many comparable listings as possible. Always return \
    listings in the exact format specified: Condition: [condition], Price: [price], \
    URL: [link]. Search extensively - don't give up after finding just one or two \
    listings.";

pub const EXTRACT_PRICE_SYSTEM: &str =
    "You are a precise pricing analyst. Always return only numeric values in USD format.";

pub const NEW_PRICE_SYSTEM: &str = "You are an expert in construction equipment \
    valuation. Return only numeric prices in USD format (XXXXXX.XX), or nothing if \
    unavailable.";

pub const SIMILAR_SYSTEM: &str = "You are a web search assistant. Search for similar \
    equipment listings and return only Condition, Price, and URL for each listing, \
    formatted as specified.";

// ---------------------------------------------------------------------------
// Default prompt builders
// ---------------------------------------------------------------------------

pub fn ai_data_prompt(fields: &JobFields) -> String {
    format!(
        "Search the web for authoritative information about the industrial asset below. \
         Gather manufacturer specifications, engine and powertrain data, capacities, \
         dimensions, and notable configuration details. Return a concise plain-text \
         summary of verified facts only - no marketing language, no speculation, no \
         source commentary.\n\n\
         Asset: {}\n\
         Raw Trusted Data:\n{}",
        fields.asset, fields.tech
    )
}

pub fn description_prompt(fields: &JobFields) -> String {
    let ai_data_rule = if fields.ai_data.is_empty() {
        ""
    } else {
        " and AI Data sections"
    };
    let ai_data_section = if fields.ai_data.is_empty() {
        String::new()
    } else {
        format!("\n\nAI Data:\n{}", fields.ai_data)
    };

    format!(
        "You are a technical documentation engineer writing for an industrial machinery \
         catalog. For each item below, generate a single, objective technical description \
         (200-250 words).\n\
         Rules:\n\
         - Start with: 'The [Asset Name] is a...' where [Asset Name] MUST be taken \
         verbatim from the Asset Name field. Do NOT restate or reformat the name.\n\
         - Infer it from context if not explicit.\n\
         - Immediately state its primary industrial application (e.g., 'engineered for \
         quarry loading', 'designed for earthmoving in construction sites').\n\
         - Then describe technical systems in prose: engine, transmission, hydraulics, \
         capacities, dimensions, etc. - only if present in input.\n\
         - Integrate specs into sentences (e.g., 'Powered by a... delivering... hp').\n\
         - Use information from Raw Trusted Data{ai_data_rule}.\n\
         - NEVER use subjective, promotional, or evaluative language (e.g., 'robust', \
         'powerful', 'efficient', 'top-performing').\n\
         - Use only facts from the input. Do not invent data.\n\
         - Output must be one paragraph. No bullets, dashes, markdown, or lists.\n\
         - Output ONLY the description. No other text.\n\n\
         Asset Name: {}\n\n\
         Raw Trusted Data:\n{}{ai_data_section}",
        fields.asset, fields.tech
    )
}

pub fn comparables_prompt(fields: &JobFields) -> String {
    let ai_data_section = if fields.ai_data.is_empty() {
        String::new()
    } else {
        format!("\nAI Data: {}", fields.ai_data)
    };

    format!(
        "You are an expert in construction equipment valuation. Search the web \
         thoroughly for comparable listings of this equipment. You MUST find and return \
         at least 3-10 comparable listings if they exist online. For each comparable \
         listing found, return ONLY: Condition, Price, and the Listing URL. Format each \
         listing on one line exactly as: Condition: [condition], Price: [price], URL: [link].\n\n\
         IMPORTANT:\n\
         - Search multiple equipment marketplaces (Machinery Pete, IronPlanet, eBay, \
         Equipment Trader, etc.)\n\
         - Return up to 10 recent results if available\n\
         - If a listing doesn't have a price, use \"Not listed\" or \"Call for Price\" as \
         the price\n\
         - Only return listings that are actually for sale (not just specifications pages)\n\
         - If you cannot find any comparables after thorough searching, return a brief \
         explanation\n\n\
         Asset: {}\n\
         Raw Trusted Data: {}{ai_data_section}",
        fields.asset, fields.tech
    )
}

pub fn extract_price_prompt(fields: &JobFields) -> String {
    let ai_data_section = if fields.ai_data.is_empty() {
        String::new()
    } else {
        format!("AI Data:\n{}\n", fields.ai_data)
    };

    format!(
        "You are an expert in construction equipment valuation. Read the asset details, \
         technical specs, and comparable listings below. Choose the single most relevant \
         price, convert it to USD if needed, and return ONLY the final USD amount \
         formatted like 'XXXXXX.XX'. If no relevant price exists, return blank. Do not \
         add any explanation, note, or extra text.\n\
         Asset details:\n{}\n\
         Raw Trusted Data:\n{}\n\
         Comparable listings found online:\n{}\n{ai_data_section}",
        fields.asset, fields.tech, fields.comparable
    )
}

pub fn new_price_prompt(fields: &JobFields) -> String {
    let ai_data_section = if fields.ai_data.is_empty() {
        String::new()
    } else {
        format!("\nAdditional AI data: {}", fields.ai_data)
    };

    format!(
        "You are an expert in construction equipment valuation. Based ONLY on the asset \
         details below, return the current market price of a BRAND NEW unit in USD. \
         Return ONLY the price formatted exactly like this: 'XXXXXX.XX'. If no explicit \
         new price is available, return blank. Do not add any words, explanations, notes, \
         or symbols. Do not say 'blank', 'N/A', or anything else. Only output the price \
         or nothing.\n\
         Asset details:\n{}\n\
         Raw Trusted Data:\n{}{ai_data_section}",
        fields.asset, fields.tech
    )
}

pub fn similar_prompt(fields: &JobFields) -> String {
    let ai_data_section = if fields.ai_data.is_empty() {
        String::new()
    } else {
        format!("\nAI Data: {}", fields.ai_data)
    };

    format!(
        "You are an expert in construction equipment valuation. Search for similar \
         equipment based on the Raw Trusted Data and AI Data provided below. Find \
         comparable assets that match the specifications and characteristics. For each \
         similar asset found, return ONLY: Condition, Price, and the Listing URL. Format \
         each on one line as: Condition: [condition], Price: [price], URL: [link]. \
         Return up to 10 recent results. If no similar assets are found, return blank.\n\n\
         Asset: {}\n\
         Raw Trusted Data: {}{ai_data_section}",
        fields.asset, fields.tech
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> JobFields {
        JobFields {
            asset: "2015 > CAT > 950M".into(),
            tech: "173 hp, 18.2 t".into(),
            ai_data: String::new(),
            comparable: String::new(),
        }
    }

    #[test]
    fn template_substitution() {
        let f = JobFields {
            ai_data: "verified specs".into(),
            comparable: "Condition: used, Price: $100, URL: x".into(),
            ..fields()
        };
        let out = apply_template("A={asset} T={tech_specs}{ai_data} C={comparable}", &f);
        assert!(out.contains("A=2015 > CAT > 950M"));
        assert!(out.contains("T=173 hp"));
        assert!(out.contains("AI Data: verified specs"));
        assert!(out.contains("C=Condition: used"));
    }

    #[test]
    fn template_drops_empty_placeholders() {
        let out = apply_template("{asset}{ai_data}{comparable}", &fields());
        assert_eq!(out, "2015 > CAT > 950M");
    }

    #[test]
    fn description_prompt_folds_ai_data_only_when_present() {
        let without = description_prompt(&fields());
        assert!(!without.contains("AI Data:"));

        let with = description_prompt(&JobFields {
            ai_data: "extra".into(),
            ..fields()
        });
        assert!(with.contains("AI Data:\nextra"));
        assert!(with.contains("and AI Data sections"));
    }

    #[test]
    fn default_prompts_carry_the_asset() {
        for build in [
            ai_data_prompt,
            description_prompt,
            comparables_prompt,
            extract_price_prompt,
            new_price_prompt,
            similar_prompt,
        ] {
            let prompt = build(&fields());
            assert!(prompt.contains("2015 > CAT > 950M"));
            assert!(prompt.contains("173 hp"));
        }
    }

    #[test]
    fn price_prompts_demand_bare_numbers() {
        let prompt = extract_price_prompt(&JobFields {
            comparable: "Condition: used, Price: $90,000, URL: example".into(),
            ..fields()
        });
        assert!(prompt.contains("XXXXXX.XX"));
        assert!(prompt.contains("Condition: used"));
    }
}
